//! Binary module format: constants, modified UTF-8, byte cursors.
//!
//! All multi-byte integers are big-endian.

use crate::codec::ScalarKind;
use crate::module::ActivationError;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MINOR_VERSION: u16 = 0;
pub const MAJOR_VERSION: u16 = 52;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_FINAL: u16 = 0x0010;

// Pool entry tags.
pub const TAG_UTF8: u8 = 1;
pub const TAG_INT: u8 = 3;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_METHOD_REF: u8 = 10;
pub const TAG_NAME_AND_TYPE: u8 = 12;

// Opcodes.
pub const OP_ICONST_0: u8 = 0x03;
pub const OP_ICONST_1: u8 = 0x04;
pub const OP_LDC: u8 = 0x12;
pub const OP_LDC_W: u8 = 0x13;
pub const OP_LDC2_W: u8 = 0x14;
pub const OP_ALOAD_0: u8 = 0x2A;
pub const OP_IRETURN: u8 = 0xAC;
pub const OP_LRETURN: u8 = 0xAD;
pub const OP_FRETURN: u8 = 0xAE;
pub const OP_DRETURN: u8 = 0xAF;
pub const OP_ARETURN: u8 = 0xB0;
pub const OP_RETURN: u8 = 0xB1;
pub const OP_INVOKESPECIAL: u8 = 0xB7;

pub const CODE_ATTRIBUTE: &str = "Code";
pub const SUPER_TYPE: &str = "java/lang/Object";
pub const INIT_NAME: &str = "<init>";
pub const INIT_DESCRIPTOR: &str = "()V";

pub const MAX_STACK: u16 = 2;
pub const MAX_LOCALS: u16 = 1;

/// Bytes of a code attribute body besides the instructions themselves.
pub const CODE_ATTRIBUTE_OVERHEAD: u32 = 12;

/// Placeholder for the initializer's method reference, patched after layout.
pub const UNPATCHED_INDEX: u16 = 0xFFFF;

/// Offset of the method-reference operand inside the initializer code.
pub const INIT_PATCH_OFFSET: usize = 2;

/// `aload_0; invokespecial #????; return`
pub fn initializer_code() -> [u8; 5] {
    let [hi, lo] = UNPATCHED_INDEX.to_be_bytes();
    [OP_ALOAD_0, OP_INVOKESPECIAL, hi, lo, OP_RETURN]
}

/// Method descriptor for a zero-argument accessor of this kind.
pub fn descriptor(kind: ScalarKind) -> &'static str {
    match kind {
        ScalarKind::String => "()Ljava/lang/String;",
        ScalarKind::Bool => "()Z",
        ScalarKind::Int32 => "()I",
        ScalarKind::Int64 => "()J",
        ScalarKind::Float64 => "()D",
        ScalarKind::Float32 => "()F",
        ScalarKind::Int16 => "()S",
        ScalarKind::Char => "()C",
        ScalarKind::Byte => "()B",
    }
}

pub fn kind_from_descriptor(descriptor: &str) -> Option<ScalarKind> {
    ScalarKind::ALL
        .into_iter()
        .find(|kind| self::descriptor(*kind) == descriptor)
}

pub fn return_opcode(kind: ScalarKind) -> u8 {
    match kind {
        ScalarKind::String => OP_ARETURN,
        ScalarKind::Int64 => OP_LRETURN,
        ScalarKind::Float64 => OP_DRETURN,
        ScalarKind::Float32 => OP_FRETURN,
        ScalarKind::Bool | ScalarKind::Int32 | ScalarKind::Int16 | ScalarKind::Char | ScalarKind::Byte => {
            OP_IRETURN
        }
    }
}

/// Encode text as modified UTF-8 over UTF-16 code units.
///
/// NUL becomes the overlong pair `C0 80`; supplementary characters become two
/// three-byte surrogate encodings.
pub fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + text.len() / 2);
    for unit in text.encode_utf16() {
        let c = unit as u32;
        match c {
            0x0001..=0x007F => out.push(c as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (c >> 6) as u8);
                out.push(0x80 | (c & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (c >> 12) as u8);
                out.push(0x80 | ((c >> 6) & 0x3F) as u8);
                out.push(0x80 | (c & 0x3F) as u8);
            }
        }
    }
    out
}

/// Decode modified UTF-8 back into a string.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b != 0 && b < 0x80 {
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            if b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return None;
            }
            units.push((((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16);
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

/// Growable big-endian output buffer with backfill support.
#[derive(Debug, Default)]
pub struct ModuleWriter {
    buf: Vec<u8>,
}

impl ModuleWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(1024),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    /// Overwrite two bytes already written at `offset`.
    pub fn patch_u16(&mut self, offset: usize, v: u16) {
        self.buf[offset..offset + 2].copy_from_slice(&v.to_be_bytes());
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked big-endian cursor over module bytes.
#[derive(Debug)]
pub struct ModuleReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ModuleReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ActivationError> {
        if self.remaining() < len {
            return Err(ActivationError::Truncated { offset: self.pos });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, ActivationError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ActivationError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32, ActivationError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> Result<u64, ActivationError> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }
}
