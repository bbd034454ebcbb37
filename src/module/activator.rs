//! Module activation.
//!
//! # Responsibilities
//! - Parse an emitted module and verify its structure
//! - Check it implements the requested contract and nothing else
//! - Decode each accessor's instructions into the constant it returns
//! - Assign a fresh `InstanceId` per activation
//!
//! # Design Decisions
//! - Activation is strict: any structural surprise is an `ActivationError`
//! - Instructions are decoded once; calls afterwards are table lookups

use std::collections::HashSet;

use crate::codec::{ScalarKind, ScalarValue};
use crate::contract::ContractDescriptor;
use crate::module::builder::{internal_name, BinaryModule};
use crate::module::format::{
    self, decode_modified_utf8, ModuleReader, CODE_ATTRIBUTE, CODE_ATTRIBUTE_OVERHEAD,
    INIT_DESCRIPTOR, INIT_NAME, MAGIC, MAJOR_VERSION, OP_ALOAD_0, OP_ICONST_0, OP_ICONST_1,
    OP_INVOKESPECIAL, OP_LDC, OP_LDC2_W, OP_LDC_W, OP_RETURN, SUPER_TYPE, TAG_CLASS, TAG_DOUBLE,
    TAG_INT, TAG_LONG, TAG_METHOD_REF, TAG_NAME_AND_TYPE, TAG_STRING, TAG_UTF8, UNPATCHED_INDEX,
};
use crate::module::instance::{LoadedModule, Slot};
use crate::module::ActivationError;

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Utf8(String),
    Class(u16),
    String(u16),
    Int(i32),
    Long(i64),
    Double(f64),
    NameAndType { name: u16, descriptor: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    /// Second slot of a long or double.
    Continuation,
}

#[derive(Debug)]
struct Pool {
    entries: Vec<Entry>,
}

impl Pool {
    fn read(r: &mut ModuleReader<'_>) -> Result<Self, ActivationError> {
        let count = r.u16()?;
        // index 0 is unused
        let mut entries = vec![Entry::Continuation];
        while entries.len() < count as usize {
            let offset = r.position();
            let tag = r.u8()?;
            let entry = match tag {
                TAG_UTF8 => {
                    let len = r.u16()? as usize;
                    let raw = r.take(len)?;
                    let text = decode_modified_utf8(raw).ok_or(ActivationError::BadUtf8 { offset })?;
                    Entry::Utf8(text)
                }
                TAG_CLASS => Entry::Class(r.u16()?),
                TAG_STRING => Entry::String(r.u16()?),
                TAG_INT => Entry::Int(r.u32()? as i32),
                TAG_LONG => Entry::Long(r.u64()? as i64),
                TAG_DOUBLE => Entry::Double(f64::from_bits(r.u64()?)),
                TAG_NAME_AND_TYPE => Entry::NameAndType {
                    name: r.u16()?,
                    descriptor: r.u16()?,
                },
                TAG_METHOD_REF => Entry::MethodRef {
                    class: r.u16()?,
                    name_and_type: r.u16()?,
                },
                other => return Err(ActivationError::UnknownTag { tag: other, offset }),
            };
            let wide = matches!(entry, Entry::Long(_) | Entry::Double(_));
            entries.push(entry);
            if wide {
                entries.push(Entry::Continuation);
            }
        }
        if entries.len() != count as usize {
            return Err(ActivationError::Malformed(
                "wide constant overruns the pool".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Entry, ActivationError> {
        match self.entries.get(index as usize) {
            Some(Entry::Continuation) | None => Err(ActivationError::BadIndex(index)),
            Some(entry) => Ok(entry),
        }
    }

    fn utf8(&self, index: u16) -> Result<&str, ActivationError> {
        match self.get(index)? {
            Entry::Utf8(text) => Ok(text),
            _ => Err(ActivationError::WrongEntry { index, expected: "utf8" }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ActivationError> {
        match self.get(index)? {
            Entry::Class(name) => self.utf8(*name),
            _ => Err(ActivationError::WrongEntry { index, expected: "class" }),
        }
    }
}

struct RawMethod {
    name: String,
    descriptor: String,
    code: Vec<u8>,
}

/// A module that parsed and verified, before any contract is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedModule {
    pub this_type: String,
    pub interface: Option<String>,
    /// Accessors in module order.
    pub slots: Vec<Slot>,
}

/// Activate `module` as an implementation of `descriptor`.
pub fn activate(
    module: BinaryModule,
    descriptor: &ContractDescriptor,
) -> Result<LoadedModule, ActivationError> {
    let parsed = parse_module(module.as_bytes())?;

    let expected = internal_name(&descriptor.type_name);
    if parsed.interface.as_deref() != Some(expected.as_str()) {
        return Err(ActivationError::InterfaceMismatch {
            expected,
            found: parsed.interface,
        });
    }

    let slots = match_contract(parsed.slots, descriptor)?;
    Ok(LoadedModule::new(parsed.this_type, descriptor.type_name.clone(), slots))
}

/// Activate `module` without a contract, naming it after its interface.
///
/// Used for offline inspection; structural checks still apply.
pub fn inspect(module: &BinaryModule) -> Result<LoadedModule, ActivationError> {
    let parsed = parse_module(module.as_bytes())?;
    let contract = parsed.interface.unwrap_or_default().replace('/', "::");
    Ok(LoadedModule::new(parsed.this_type, contract, parsed.slots))
}

/// Parse and verify module bytes, decoding every accessor.
pub fn parse_module(bytes: &[u8]) -> Result<ParsedModule, ActivationError> {
    let mut r = ModuleReader::new(bytes);

    let magic = r.u32()?;
    if magic != MAGIC {
        return Err(ActivationError::BadMagic(magic));
    }
    let _minor = r.u16()?;
    let major = r.u16()?;
    if major != MAJOR_VERSION {
        return Err(ActivationError::UnsupportedVersion(major));
    }

    let pool = Pool::read(&mut r)?;

    let _access = r.u16()?;
    let this_type = pool.class_name(r.u16()?)?.to_string();
    let super_index = r.u16()?;
    let super_type = pool.class_name(super_index)?;
    if super_type != SUPER_TYPE {
        return Err(ActivationError::Malformed(format!("unexpected super type {super_type}")));
    }

    let interface = match r.u16()? {
        0 => None,
        1 => Some(pool.class_name(r.u16()?)?.to_string()),
        n => {
            return Err(ActivationError::Malformed(format!("{n} interfaces, expected at most one")));
        }
    };

    let fields = r.u16()?;
    if fields != 0 {
        return Err(ActivationError::Malformed(format!("{fields} fields, expected none")));
    }

    let method_count = r.u16()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(read_method(&mut r, &pool)?);
    }

    let attributes = r.u16()?;
    if attributes != 0 {
        return Err(ActivationError::Malformed(format!("{attributes} module attributes")));
    }
    if r.remaining() != 0 {
        return Err(ActivationError::TrailingBytes(r.remaining()));
    }

    let mut saw_init = false;
    let mut seen = HashSet::new();
    let mut slots = Vec::with_capacity(methods.len());
    for method in methods {
        if method.name == INIT_NAME {
            check_initializer(&method, &pool, super_index)?;
            saw_init = true;
            continue;
        }
        if !seen.insert(method.name.clone()) {
            return Err(ActivationError::Malformed(format!("method {} defined twice", method.name)));
        }
        let value = decode_accessor(&method, &pool)?;
        slots.push(Slot {
            name: method.name,
            value,
        });
    }
    if !saw_init {
        return Err(ActivationError::MissingInitializer);
    }

    Ok(ParsedModule {
        this_type,
        interface,
        slots,
    })
}

fn read_method(r: &mut ModuleReader<'_>, pool: &Pool) -> Result<RawMethod, ActivationError> {
    let _access = r.u16()?;
    let name = pool.utf8(r.u16()?)?.to_string();
    let descriptor = pool.utf8(r.u16()?)?.to_string();

    let attribute_count = r.u16()?;
    if attribute_count != 1 {
        return Err(ActivationError::Malformed(format!(
            "method {name} has {attribute_count} attributes, expected one code block"
        )));
    }
    let attribute_name = pool.utf8(r.u16()?)?;
    if attribute_name != CODE_ATTRIBUTE {
        return Err(ActivationError::Malformed(format!(
            "method {name} carries attribute {attribute_name}"
        )));
    }
    let attribute_len = r.u32()?;
    let _max_stack = r.u16()?;
    let _max_locals = r.u16()?;
    let code_len = r.u32()?;
    if attribute_len != code_len.saturating_add(CODE_ATTRIBUTE_OVERHEAD) {
        return Err(ActivationError::Malformed(format!(
            "method {name}: code attribute length {attribute_len} does not match code length {code_len}"
        )));
    }
    let code = r.take(code_len as usize)?.to_vec();
    let exception_table = r.u16()?;
    let code_attributes = r.u16()?;
    if exception_table != 0 || code_attributes != 0 {
        return Err(ActivationError::Malformed(format!(
            "method {name} has exception handlers or nested attributes"
        )));
    }
    Ok(RawMethod {
        name,
        descriptor,
        code,
    })
}

fn check_initializer(method: &RawMethod, pool: &Pool, super_index: u16) -> Result<(), ActivationError> {
    let bad = || ActivationError::BadInitializer(method.code.clone());
    if method.descriptor != INIT_DESCRIPTOR {
        return Err(bad());
    }
    let [OP_ALOAD_0, OP_INVOKESPECIAL, hi, lo, OP_RETURN] = method.code[..] else {
        return Err(bad());
    };
    let index = u16::from_be_bytes([hi, lo]);
    if index == UNPATCHED_INDEX {
        return Err(ActivationError::UnpatchedInitializer);
    }
    let Entry::MethodRef { class, name_and_type } = pool.get(index)? else {
        return Err(ActivationError::WrongEntry {
            index,
            expected: "method reference",
        });
    };
    if *class != super_index {
        return Err(bad());
    }
    let Entry::NameAndType { name, descriptor } = pool.get(*name_and_type)? else {
        return Err(ActivationError::WrongEntry {
            index: *name_and_type,
            expected: "name and type",
        });
    };
    if pool.utf8(*name)? != INIT_NAME || pool.utf8(*descriptor)? != INIT_DESCRIPTOR {
        return Err(bad());
    }
    Ok(())
}

fn decode_accessor(method: &RawMethod, pool: &Pool) -> Result<ScalarValue, ActivationError> {
    let kind = format::kind_from_descriptor(&method.descriptor).ok_or_else(|| {
        ActivationError::UnsupportedDescriptor {
            method: method.name.clone(),
            descriptor: method.descriptor.clone(),
        }
    })?;
    let bad = || ActivationError::BadInstructions {
        method: method.name.clone(),
        code: method.code.clone(),
    };

    let (value, ret) = match method.code[..] {
        [OP_ICONST_0, ret] if kind == ScalarKind::Bool => (ScalarValue::Bool(false), ret),
        [OP_ICONST_1, ret] if kind == ScalarKind::Bool => (ScalarValue::Bool(true), ret),
        [OP_LDC, index, ret] if !kind.is_wide() => (constant(pool, index as u16, kind, &method.name)?, ret),
        [OP_LDC_W, hi, lo, ret] if !kind.is_wide() => {
            (constant(pool, u16::from_be_bytes([hi, lo]), kind, &method.name)?, ret)
        }
        [OP_LDC2_W, hi, lo, ret] if kind.is_wide() => {
            (constant(pool, u16::from_be_bytes([hi, lo]), kind, &method.name)?, ret)
        }
        _ => return Err(bad()),
    };
    if ret != format::return_opcode(kind) {
        return Err(bad());
    }
    Ok(value)
}

/// Interpret a pool constant as a value of `kind`.
fn constant(pool: &Pool, index: u16, kind: ScalarKind, method: &str) -> Result<ScalarValue, ActivationError> {
    let out_of_range = |raw: i64| ActivationError::ConstantOutOfRange {
        method: method.to_string(),
        kind,
        raw,
    };
    let value = match (kind, pool.get(index)?) {
        (ScalarKind::String, Entry::String(utf8)) => ScalarValue::String(pool.utf8(*utf8)?.to_string()),
        (ScalarKind::Int32, Entry::Int(v)) => ScalarValue::Int32(*v),
        (ScalarKind::Int16, Entry::Int(v)) => {
            ScalarValue::Int16(i16::try_from(*v).map_err(|_| out_of_range(*v as i64))?)
        }
        (ScalarKind::Byte, Entry::Int(v)) => {
            ScalarValue::Byte(i8::try_from(*v).map_err(|_| out_of_range(*v as i64))?)
        }
        (ScalarKind::Char, Entry::Int(v)) => ScalarValue::Char(
            u32::try_from(*v)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| out_of_range(*v as i64))?,
        ),
        (ScalarKind::Float32, Entry::Int(v)) => ScalarValue::Float32(f32::from_bits(*v as u32)),
        (ScalarKind::Int64, Entry::Long(v)) => ScalarValue::Int64(*v),
        (ScalarKind::Float64, Entry::Double(v)) => ScalarValue::Float64(*v),
        _ => {
            return Err(ActivationError::WrongEntry {
                index,
                expected: kind.type_name(),
            })
        }
    };
    Ok(value)
}

/// Order slots as the contract declares them and reject gaps or extras.
fn match_contract(decoded: Vec<Slot>, descriptor: &ContractDescriptor) -> Result<Vec<Slot>, ActivationError> {
    let mut decoded = decoded;
    let mut slots = Vec::with_capacity(descriptor.accessors.len());
    for accessor in &descriptor.accessors {
        let Some(pos) = decoded.iter().position(|s| s.name == accessor.name) else {
            return Err(ActivationError::MissingAccessor(accessor.name.clone()));
        };
        let slot = decoded.swap_remove(pos);
        if slot.value.kind() != accessor.kind {
            return Err(ActivationError::KindMismatch {
                method: slot.name,
                expected: accessor.kind,
                found: slot.value.kind(),
            });
        }
        slots.push(slot);
    }
    if let Some(extra) = decoded.into_iter().next() {
        return Err(ActivationError::UnexpectedAccessor(extra.name));
    }
    Ok(slots)
}
