//! Scalar conversion.
//!
//! # Responsibilities
//! - Name the scalar kinds an accessor may return
//! - Convert raw configuration text into a typed `ScalarValue`
//! - Map typed values back out of a dispatch table (`FromScalar`)
//!
//! # Design Decisions
//! - Pure and stateless: `convert` never touches I/O or shared state
//! - Text is parsed exactly as given; the source reader owns trimming
//! - Empty text for `Char` is reported as `ConversionError::Absent` so the
//!   caller picks the fallback
//! - Adding a kind means touching `module::format` instruction selection too

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The scalar return kinds an accessor may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScalarKind {
    String,
    Bool,
    Int32,
    Int64,
    Float64,
    Float32,
    Int16,
    Char,
    Byte,
}

impl ScalarKind {
    /// Every supported kind.
    pub const ALL: [ScalarKind; 9] = [
        ScalarKind::String,
        ScalarKind::Bool,
        ScalarKind::Int32,
        ScalarKind::Int64,
        ScalarKind::Float64,
        ScalarKind::Float32,
        ScalarKind::Int16,
        ScalarKind::Char,
        ScalarKind::Byte,
    ];

    /// Map a declared Rust return type (as written in source) to a kind.
    ///
    /// `str`, `&str` and `&'static str` name the string kind for hand-written
    /// declarations. Accessors generated by `contract!` must return `String`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        match name.as_str() {
            "String" | "std::string::String" | "str" | "&str" | "&'staticstr" => Some(ScalarKind::String),
            "bool" => Some(ScalarKind::Bool),
            "i32" => Some(ScalarKind::Int32),
            "i64" => Some(ScalarKind::Int64),
            "f64" => Some(ScalarKind::Float64),
            "f32" => Some(ScalarKind::Float32),
            "i16" => Some(ScalarKind::Int16),
            "char" => Some(ScalarKind::Char),
            "i8" => Some(ScalarKind::Byte),
            _ => None,
        }
    }

    /// The canonical Rust type name for this kind.
    pub fn type_name(self) -> &'static str {
        match self {
            ScalarKind::String => "String",
            ScalarKind::Bool => "bool",
            ScalarKind::Int32 => "i32",
            ScalarKind::Int64 => "i64",
            ScalarKind::Float64 => "f64",
            ScalarKind::Float32 => "f32",
            ScalarKind::Int16 => "i16",
            ScalarKind::Char => "char",
            ScalarKind::Byte => "i8",
        }
    }

    /// True for kinds whose pool entries take two slots.
    pub fn is_wide(self) -> bool {
        matches!(self, ScalarKind::Int64 | ScalarKind::Float64)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A converted configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScalarValue {
    String(String),
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Float32(f32),
    Int16(i16),
    Char(char),
    Byte(i8),
}

impl ScalarValue {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::String(_) => ScalarKind::String,
            ScalarValue::Bool(_) => ScalarKind::Bool,
            ScalarValue::Int32(_) => ScalarKind::Int32,
            ScalarValue::Int64(_) => ScalarKind::Int64,
            ScalarValue::Float64(_) => ScalarKind::Float64,
            ScalarValue::Float32(_) => ScalarKind::Float32,
            ScalarValue::Int16(_) => ScalarKind::Int16,
            ScalarValue::Char(_) => ScalarKind::Char,
            ScalarValue::Byte(_) => ScalarKind::Byte,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::String(v) => f.write_str(v),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int32(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Float32(v) => write!(f, "{}", v),
            ScalarValue::Int16(v) => write!(f, "{}", v),
            ScalarValue::Char(v) => write!(f, "{}", v),
            ScalarValue::Byte(v) => write!(f, "{}", v),
        }
    }
}

/// Errors raised while converting text to a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The text does not parse as the requested kind.
    #[error("cannot convert {text:?} to {kind}: {reason}")]
    Invalid {
        text: String,
        kind: ScalarKind,
        reason: String,
    },

    /// The text is empty and the kind has no empty representation.
    #[error("empty text carries no {kind} value")]
    Absent { kind: ScalarKind },
}

fn invalid(text: &str, kind: ScalarKind, reason: impl fmt::Display) -> ConversionError {
    ConversionError::Invalid {
        text: text.to_string(),
        kind,
        reason: reason.to_string(),
    }
}

/// Convert raw configuration text into a value of the given kind.
pub fn convert(text: &str, kind: ScalarKind) -> Result<ScalarValue, ConversionError> {
    match kind {
        ScalarKind::String => Ok(ScalarValue::String(text.to_string())),
        ScalarKind::Bool => {
            if text.eq_ignore_ascii_case("true") {
                Ok(ScalarValue::Bool(true))
            } else if text.eq_ignore_ascii_case("false") {
                Ok(ScalarValue::Bool(false))
            } else {
                Err(invalid(text, kind, "expected true or false"))
            }
        }
        ScalarKind::Int32 => text
            .parse::<i32>()
            .map(ScalarValue::Int32)
            .map_err(|e| invalid(text, kind, e)),
        ScalarKind::Int64 => text
            .parse::<i64>()
            .map(ScalarValue::Int64)
            .map_err(|e| invalid(text, kind, e)),
        ScalarKind::Float64 => float_text(text)
            .parse::<f64>()
            .map(ScalarValue::Float64)
            .map_err(|e| invalid(text, kind, e)),
        ScalarKind::Float32 => float_text(text)
            .parse::<f32>()
            .map(ScalarValue::Float32)
            .map_err(|e| invalid(text, kind, e)),
        ScalarKind::Int16 => text
            .parse::<i16>()
            .map(ScalarValue::Int16)
            .map_err(|e| invalid(text, kind, e)),
        ScalarKind::Byte => text
            .parse::<i8>()
            .map(ScalarValue::Byte)
            .map_err(|e| invalid(text, kind, e)),
        // Only the first character counts; the rest of the text is ignored.
        ScalarKind::Char => text
            .chars()
            .next()
            .map(ScalarValue::Char)
            .ok_or(ConversionError::Absent { kind }),
    }
}

/// Float text as floating literals are written: surrounding whitespace and
/// one `f`/`F`/`d`/`D` suffix after a digit or point are ignored.
fn float_text(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_suffix(['f', 'F', 'd', 'D']) {
        Some(body) if body.ends_with(|c: char| c.is_ascii_digit() || c == '.') => body,
        _ => trimmed,
    }
}

/// Rust types that can be read back out of a `ScalarValue`.
pub trait FromScalar: Sized + Default {
    const KIND: ScalarKind;

    fn from_scalar(value: &ScalarValue) -> Option<Self>;
}

macro_rules! impl_from_scalar {
    ($ty:ty, $kind:ident) => {
        impl FromScalar for $ty {
            const KIND: ScalarKind = ScalarKind::$kind;

            fn from_scalar(value: &ScalarValue) -> Option<Self> {
                match value {
                    ScalarValue::$kind(v) => Some(*v),
                    _ => None,
                }
            }
        }
    };
}

impl_from_scalar!(bool, Bool);
impl_from_scalar!(i32, Int32);
impl_from_scalar!(i64, Int64);
impl_from_scalar!(f64, Float64);
impl_from_scalar!(f32, Float32);
impl_from_scalar!(i16, Int16);
impl_from_scalar!(char, Char);
impl_from_scalar!(i8, Byte);

impl FromScalar for String {
    const KIND: ScalarKind = ScalarKind::String;

    fn from_scalar(value: &ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}
