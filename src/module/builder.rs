//! Binary module emission.
//!
//! # Responsibilities
//! - Collect every constant the module needs into the pool
//! - Select per-kind instructions once pool indices are known
//! - Emit the initializer with a placeholder method reference and backfill it
//!   after the pool layout is fixed

use crate::codec::ScalarValue;
use crate::module::format::{
    self, ModuleWriter, ACC_FINAL, ACC_PUBLIC, CODE_ATTRIBUTE, CODE_ATTRIBUTE_OVERHEAD,
    INIT_DESCRIPTOR, INIT_NAME, INIT_PATCH_OFFSET, MAGIC, MAJOR_VERSION, MAX_LOCALS, MAX_STACK,
    MINOR_VERSION, OP_ICONST_0, OP_ICONST_1, OP_LDC, OP_LDC2_W, OP_LDC_W, SUPER_TYPE,
};
use crate::module::pool::{ConstantPool, FrozenPool};
use crate::module::BuildError;

/// An emitted module. Consumed by the activator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryModule {
    bytes: Vec<u8>,
}

impl BinaryModule {
    /// Wrap bytes read from elsewhere (e.g. a dump file).
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Turn a contract name into an internal type name (`a::b::C` → `a/b/C`).
pub fn internal_name(type_name: &str) -> String {
    type_name.replace("::", "/").replace('.', "/")
}

/// Builds one module implementing a contract with constant-returning methods.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    this_type: String,
    interface: Option<String>,
    methods: Vec<(String, ScalarValue)>,
}

impl ModuleBuilder {
    pub fn new(this_type: impl Into<String>) -> Self {
        Self {
            this_type: this_type.into(),
            interface: None,
            methods: Vec::new(),
        }
    }

    /// Declare the capability interface this module implements.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interface = Some(interface.into());
        self
    }

    /// Add a zero-argument method returning `value`.
    pub fn method(mut self, name: impl Into<String>, value: ScalarValue) -> Self {
        self.methods.push((name.into(), value));
        self
    }

    pub fn build(self) -> Result<BinaryModule, BuildError> {
        let pool = self.layout_pool()?;
        let mut w = ModuleWriter::new();

        w.u32(MAGIC);
        w.u16(MINOR_VERSION);
        w.u16(MAJOR_VERSION);
        pool.write(&mut w, SUPER_TYPE)?;

        w.u16(ACC_PUBLIC | ACC_FINAL);
        w.u16(required(pool.class_index(&self.this_type), &self.this_type)?);
        w.u16(required(pool.class_index(SUPER_TYPE), SUPER_TYPE)?);
        match &self.interface {
            Some(interface) => {
                w.u16(1);
                w.u16(required(pool.class_index(interface), interface)?);
            }
            None => w.u16(0),
        }
        w.u16(0); // fields

        let method_count = u16::try_from(self.methods.len() + 1)
            .map_err(|_| BuildError::TooManyMethods(self.methods.len()))?;
        w.u16(method_count);

        let init_code = format::initializer_code();
        let code_start = write_method(&mut w, &pool, INIT_NAME, INIT_DESCRIPTOR, &init_code)?;
        let patch_at = code_start + INIT_PATCH_OFFSET;

        for (name, value) in &self.methods {
            let code = accessor_code(&pool, value)?;
            write_method(&mut w, &pool, name, format::descriptor(value.kind()), &code)?;
        }

        w.u16(0); // module attributes

        w.patch_u16(patch_at, pool.method_ref_index());

        Ok(BinaryModule { bytes: w.finish() })
    }

    fn layout_pool(&self) -> Result<FrozenPool, BuildError> {
        let mut pool = ConstantPool::new();
        pool.add_utf8(CODE_ATTRIBUTE);
        pool.add_class(&self.this_type);
        pool.add_class(SUPER_TYPE);
        if let Some(interface) = &self.interface {
            pool.add_class(interface);
        }
        pool.add_utf8(INIT_NAME);
        pool.add_utf8(INIT_DESCRIPTOR);

        for (name, value) in &self.methods {
            pool.add_utf8(name);
            pool.add_utf8(format::descriptor(value.kind()));
            match value {
                ScalarValue::Bool(_) => {}
                ScalarValue::String(s) => pool.add_string(s),
                ScalarValue::Int64(v) => pool.add_long(*v),
                ScalarValue::Float64(v) => pool.add_double(*v),
                narrow => pool.add_int(narrow_bits(narrow)),
            }
        }
        pool.freeze()
    }
}

fn required(index: Option<u16>, what: &str) -> Result<u16, BuildError> {
    index.ok_or_else(|| BuildError::MissingConstant(what.to_string()))
}

/// 32-bit pool representation of the narrow non-string kinds.
fn narrow_bits(value: &ScalarValue) -> i32 {
    match value {
        ScalarValue::Int32(v) => *v,
        ScalarValue::Int16(v) => *v as i32,
        ScalarValue::Byte(v) => *v as i32,
        ScalarValue::Char(c) => *c as i32,
        ScalarValue::Float32(f) => f.to_bits() as i32,
        ScalarValue::Bool(b) => *b as i32,
        ScalarValue::String(_) | ScalarValue::Int64(_) | ScalarValue::Float64(_) => 0,
    }
}

/// Instructions returning `value`.
fn accessor_code(pool: &FrozenPool, value: &ScalarValue) -> Result<Vec<u8>, BuildError> {
    let ret = format::return_opcode(value.kind());
    let index = match value {
        ScalarValue::Bool(false) => return Ok(vec![OP_ICONST_0, ret]),
        ScalarValue::Bool(true) => return Ok(vec![OP_ICONST_1, ret]),
        ScalarValue::String(s) => pool.string_index(s),
        ScalarValue::Int64(v) => pool.long_index(*v),
        ScalarValue::Float64(v) => pool.double_index(*v),
        narrow => pool.int_index(narrow_bits(narrow)),
    };
    let index = required(index, &value.to_string())?;
    let [hi, lo] = index.to_be_bytes();

    let code = if value.kind().is_wide() {
        vec![OP_LDC2_W, hi, lo, ret]
    } else if let Ok(narrow) = u8::try_from(index) {
        vec![OP_LDC, narrow, ret]
    } else {
        vec![OP_LDC_W, hi, lo, ret]
    };
    Ok(code)
}

/// Write one method with a single code block. Returns the offset of its first instruction.
fn write_method(
    w: &mut ModuleWriter,
    pool: &FrozenPool,
    name: &str,
    descriptor: &str,
    code: &[u8],
) -> Result<usize, BuildError> {
    w.u16(ACC_PUBLIC);
    w.u16(required(pool.utf8_index(name), name)?);
    w.u16(required(pool.utf8_index(descriptor), descriptor)?);
    w.u16(1); // attributes: Code only
    w.u16(required(pool.utf8_index(CODE_ATTRIBUTE), CODE_ATTRIBUTE)?);
    w.u32(code.len() as u32 + CODE_ATTRIBUTE_OVERHEAD);
    w.u16(MAX_STACK);
    w.u16(MAX_LOCALS);
    w.u32(code.len() as u32);
    let start = w.position();
    w.bytes(code);
    w.u16(0); // exception table
    w.u16(0); // attributes
    Ok(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::format::{OP_ALOAD_0, OP_INVOKESPECIAL, OP_RETURN, TAG_UTF8};

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn test_header() {
        let module = ModuleBuilder::new("T$CG1").implements("T").build().unwrap();
        let bytes = module.as_bytes();
        assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 52]);
        // Code, T$CG1, java/lang/Object, T, <init>, ()V, 3 classes, NameAndType, MethodRef
        assert_eq!(u16::from_be_bytes([bytes[8], bytes[9]]), 12);
        assert_eq!(bytes[10], TAG_UTF8);
        assert_eq!(&bytes[11..13], &[0, 4]);
        assert_eq!(&bytes[13..17], b"Code");
    }

    #[test]
    fn test_initializer_is_patched() {
        let module = ModuleBuilder::new("T$CG1").implements("T").build().unwrap();
        // pool count 12 → method ref at index 11
        let patched = [OP_ALOAD_0, OP_INVOKESPECIAL, 0, 11, OP_RETURN];
        assert!(find(module.as_bytes(), &patched).is_some());
        let unpatched = format::initializer_code();
        assert!(find(module.as_bytes(), &unpatched).is_none());
    }

    #[test]
    fn test_bool_needs_no_constant() {
        let with_bools = ModuleBuilder::new("T$CG1")
            .method("a", ScalarValue::Bool(true))
            .method("b", ScalarValue::Bool(false))
            .build()
            .unwrap();
        let bytes = with_bools.as_bytes();
        // Code, T$CG1, Object, <init>, ()V, a, ()Z, b; 2 classes; 2 synthesized
        assert_eq!(u16::from_be_bytes([bytes[8], bytes[9]]), 13);
        assert!(find(bytes, &[0x04, 0xAC, 0, 0, 0, 0]).is_some());
        assert!(find(bytes, &[0x03, 0xAC, 0, 0, 0, 0]).is_some());
    }

    #[test]
    fn test_wide_kinds_use_ldc2_w() {
        let module = ModuleBuilder::new("T$CG1")
            .method("l", ScalarValue::Int64(281_474_976_710_655))
            .build()
            .unwrap();
        // Code, T$CG1, Object, <init>, ()V, l, ()J = 7 utf8; 2 classes → long at 10
        assert!(find(module.as_bytes(), &[OP_LDC2_W, 0, 10, format::OP_LRETURN]).is_some());
    }

    #[test]
    fn test_identical_values_share_an_entry() {
        let a = ModuleBuilder::new("T$CG1")
            .method("x", ScalarValue::Float64(123456.4444444))
            .method("y", ScalarValue::Float64(123456.4444444))
            .build()
            .unwrap();
        let b = ModuleBuilder::new("T$CG1")
            .method("x", ScalarValue::Float64(123456.4444444))
            .build()
            .unwrap();
        let count = |m: &BinaryModule| u16::from_be_bytes([m.as_bytes()[8], m.as_bytes()[9]]);
        // the extra method adds only its name
        assert_eq!(count(&a), count(&b) + 1);
    }

    #[test]
    fn test_internal_name() {
        assert_eq!(internal_name("app::config::Flags"), "app/config/Flags");
        assert_eq!(internal_name("de.example.Flags"), "de/example/Flags");
    }
}
