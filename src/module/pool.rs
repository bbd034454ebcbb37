//! Constant pool layout.
//!
//! # Layout
//! ```text
//! index 1 ..                    Utf8 texts, first-seen order
//!       .. class references
//!       .. string references
//!       .. 32-bit integer literals
//!       .. 64-bit doubles (two slots each)
//!       .. 64-bit longs   (two slots each)
//! end+1                         NameAndType  <init>:()V
//! end+2                         MethodRef    super.<init>
//! ```
//!
//! # Design Decisions
//! - Two phases: `ConstantPool` collects entries, `FrozenPool` answers index
//!   queries. An index is only meaningful once every group size is fixed.
//! - Identical entries collapse; lookups return the first match
//! - Doubles compare by bit pattern

use crate::module::format::{
    encode_modified_utf8, ModuleWriter, INIT_DESCRIPTOR, INIT_NAME, TAG_CLASS, TAG_DOUBLE, TAG_INT,
    TAG_LONG, TAG_METHOD_REF, TAG_NAME_AND_TYPE, TAG_STRING, TAG_UTF8,
};
use crate::module::BuildError;

/// Collects pool entries before layout.
#[derive(Debug, Default)]
pub struct ConstantPool {
    utf8: Vec<String>,
    classes: Vec<String>,
    strings: Vec<String>,
    ints: Vec<i32>,
    doubles: Vec<u64>,
    longs: Vec<i64>,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_utf8(&mut self, text: &str) {
        if !self.utf8.iter().any(|t| t == text) {
            self.utf8.push(text.to_string());
        }
    }

    pub fn add_class(&mut self, name: &str) {
        self.add_utf8(name);
        push_unique(&mut self.classes, name.to_string());
    }

    pub fn add_string(&mut self, text: &str) {
        self.add_utf8(text);
        push_unique(&mut self.strings, text.to_string());
    }

    pub fn add_int(&mut self, value: i32) {
        push_unique(&mut self.ints, value);
    }

    pub fn add_double(&mut self, value: f64) {
        push_unique(&mut self.doubles, value.to_bits());
    }

    pub fn add_long(&mut self, value: i64) {
        push_unique(&mut self.longs, value);
    }

    /// Fix the layout. Fails if the pool no longer fits 16-bit indices.
    pub fn freeze(self) -> Result<FrozenPool, BuildError> {
        let end = self.utf8.len()
            + self.classes.len()
            + self.strings.len()
            + self.ints.len()
            + 2 * self.doubles.len()
            + 2 * self.longs.len();
        // two synthesized entries plus the count's off-by-one
        let count = end + 3;
        if count > u16::MAX as usize {
            return Err(BuildError::PoolOverflow { entries: count });
        }
        for text in &self.utf8 {
            let len = encode_modified_utf8(text).len();
            if len > u16::MAX as usize {
                return Err(BuildError::TextTooLong { len });
            }
        }
        Ok(FrozenPool {
            pool: self,
            end: end as u16,
        })
    }
}

/// A pool whose layout is final.
#[derive(Debug)]
pub struct FrozenPool {
    pool: ConstantPool,
    end: u16,
}

fn position<T: PartialEq>(list: &[T], value: &T) -> Option<u16> {
    list.iter().position(|v| v == value).map(|p| p as u16)
}

fn text_position(list: &[String], text: &str) -> Option<u16> {
    list.iter().position(|v| v == text).map(|p| p as u16)
}

impl FrozenPool {
    fn utf8_base(&self) -> u16 {
        0
    }

    fn class_base(&self) -> u16 {
        self.utf8_base() + self.pool.utf8.len() as u16
    }

    fn string_base(&self) -> u16 {
        self.class_base() + self.pool.classes.len() as u16
    }

    fn int_base(&self) -> u16 {
        self.string_base() + self.pool.strings.len() as u16
    }

    fn double_base(&self) -> u16 {
        self.int_base() + self.pool.ints.len() as u16
    }

    fn long_base(&self) -> u16 {
        self.double_base() + 2 * self.pool.doubles.len() as u16
    }

    pub fn utf8_index(&self, text: &str) -> Option<u16> {
        text_position(&self.pool.utf8, text).map(|p| self.utf8_base() + p + 1)
    }

    pub fn class_index(&self, name: &str) -> Option<u16> {
        text_position(&self.pool.classes, name).map(|p| self.class_base() + p + 1)
    }

    pub fn string_index(&self, text: &str) -> Option<u16> {
        text_position(&self.pool.strings, text).map(|p| self.string_base() + p + 1)
    }

    pub fn int_index(&self, value: i32) -> Option<u16> {
        position(&self.pool.ints, &value).map(|p| self.int_base() + p + 1)
    }

    pub fn double_index(&self, value: f64) -> Option<u16> {
        position(&self.pool.doubles, &value.to_bits()).map(|p| self.double_base() + 2 * p + 1)
    }

    pub fn long_index(&self, value: i64) -> Option<u16> {
        position(&self.pool.longs, &value).map(|p| self.long_base() + 2 * p + 1)
    }

    pub fn name_and_type_index(&self) -> u16 {
        self.end + 1
    }

    /// Index of the super-type initializer reference.
    pub fn method_ref_index(&self) -> u16 {
        self.end + 2
    }

    /// Value written as the pool count (last index + 1).
    pub fn count(&self) -> u16 {
        self.end + 3
    }

    /// Emit the count followed by every entry in layout order.
    pub fn write(&self, w: &mut ModuleWriter, super_type: &str) -> Result<(), BuildError> {
        w.u16(self.count());

        for text in &self.pool.utf8 {
            let bytes = encode_modified_utf8(text);
            w.u8(TAG_UTF8);
            w.u16(bytes.len() as u16);
            w.bytes(&bytes);
        }
        for name in &self.pool.classes {
            w.u8(TAG_CLASS);
            w.u16(self.require(self.utf8_index(name), name)?);
        }
        for text in &self.pool.strings {
            w.u8(TAG_STRING);
            w.u16(self.require(self.utf8_index(text), text)?);
        }
        for value in &self.pool.ints {
            w.u8(TAG_INT);
            w.u32(*value as u32);
        }
        for bits in &self.pool.doubles {
            w.u8(TAG_DOUBLE);
            w.u32((bits >> 32) as u32);
            w.u32(*bits as u32);
        }
        for value in &self.pool.longs {
            let bits = *value as u64;
            w.u8(TAG_LONG);
            w.u32((bits >> 32) as u32);
            w.u32(bits as u32);
        }

        w.u8(TAG_NAME_AND_TYPE);
        w.u16(self.require(self.utf8_index(INIT_NAME), INIT_NAME)?);
        w.u16(self.require(self.utf8_index(INIT_DESCRIPTOR), INIT_DESCRIPTOR)?);

        w.u8(TAG_METHOD_REF);
        w.u16(self.require(self.class_index(super_type), super_type)?);
        w.u16(self.name_and_type_index());
        Ok(())
    }

    fn require(&self, index: Option<u16>, what: &str) -> Result<u16, BuildError> {
        index.ok_or_else(|| BuildError::MissingConstant(what.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_order_and_dedup() {
        let mut pool = ConstantPool::new();
        pool.add_utf8("Code");
        pool.add_class("A");
        pool.add_class("A");
        pool.add_string("hello");
        pool.add_string("Code");
        pool.add_int(7);
        pool.add_int(7);
        pool.add_double(1.5);
        pool.add_double(1.5);
        pool.add_long(9);
        pool.add_utf8(INIT_NAME);
        pool.add_utf8(INIT_DESCRIPTOR);
        let frozen = pool.freeze().unwrap();

        // utf8: Code, A, hello, <init>, ()V
        assert_eq!(frozen.utf8_index("Code"), Some(1));
        assert_eq!(frozen.utf8_index("A"), Some(2));
        assert_eq!(frozen.utf8_index("()V"), Some(5));
        assert_eq!(frozen.class_index("A"), Some(6));
        assert_eq!(frozen.string_index("hello"), Some(7));
        assert_eq!(frozen.string_index("Code"), Some(8));
        assert_eq!(frozen.int_index(7), Some(9));
        assert_eq!(frozen.double_index(1.5), Some(10));
        assert_eq!(frozen.long_index(9), Some(12));
        assert_eq!(frozen.name_and_type_index(), 14);
        assert_eq!(frozen.method_ref_index(), 15);
        assert_eq!(frozen.count(), 16);
    }

    #[test]
    fn test_wide_entries_take_two_slots() {
        let mut pool = ConstantPool::new();
        pool.add_double(1.0);
        pool.add_double(2.0);
        pool.add_long(1);
        pool.add_long(2);
        let frozen = pool.freeze().unwrap();
        assert_eq!(frozen.double_index(1.0), Some(1));
        assert_eq!(frozen.double_index(2.0), Some(3));
        assert_eq!(frozen.long_index(1), Some(5));
        assert_eq!(frozen.long_index(2), Some(7));
        assert_eq!(frozen.count(), 11);
    }

    #[test]
    fn test_signed_zero_stays_distinct() {
        let mut pool = ConstantPool::new();
        pool.add_double(0.0);
        pool.add_double(-0.0);
        let frozen = pool.freeze().unwrap();
        assert_ne!(frozen.double_index(0.0), frozen.double_index(-0.0));
    }

    #[test]
    fn test_missing_lookup() {
        let frozen = ConstantPool::new().freeze().unwrap();
        assert_eq!(frozen.utf8_index("nope"), None);
        assert_eq!(frozen.int_index(1), None);
    }

    #[test]
    fn test_text_too_long() {
        let mut pool = ConstantPool::new();
        pool.add_string(&"x".repeat(70_000));
        assert!(matches!(pool.freeze(), Err(BuildError::TextTooLong { len: 70_000 })));
    }
}
