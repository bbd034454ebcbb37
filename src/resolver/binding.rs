//! Resolution results.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::codec::{ScalarKind, ScalarValue};

/// One accessor with the text it resolved to and the converted value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAccessor {
    pub name: String,
    pub kind: ScalarKind,
    pub key: String,
    pub text: String,
    pub value: ScalarValue,
    /// True when the declared default supplied the text.
    pub from_default: bool,
}

/// Non-fatal problems met while resolving. The build continues on defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ResolutionWarning {
    UnresolvedVariable { locator: String, variable: String },
    MissingSource { path: PathBuf },
    UnreadableSource { path: PathBuf, reason: String },
    WatchFailed { path: PathBuf, reason: String },
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionWarning::UnresolvedVariable { locator, variable } => {
                write!(f, "variable {variable} in locator {locator} is not set, using defaults")
            }
            ResolutionWarning::MissingSource { path } => {
                write!(f, "configuration source {} not found, using defaults", path.display())
            }
            ResolutionWarning::UnreadableSource { path, reason } => {
                write!(f, "configuration source {} unreadable ({reason}), using defaults", path.display())
            }
            ResolutionWarning::WatchFailed { path, reason } => {
                write!(f, "changes to {} will not be picked up: {reason}", path.display())
            }
        }
    }
}

/// Everything needed to build one instance of a contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedBinding {
    pub contract: String,
    pub accessors: Vec<ResolvedAccessor>,
    /// `key=text` lines in declaration order.
    pub fingerprint: String,
    /// Resolved source file, if the locator named one.
    pub source: Option<PathBuf>,
    /// Whether watch-triggered reloads should re-check this contract.
    pub watchable: bool,
    pub warnings: Vec<ResolutionWarning>,
}

impl ResolvedBinding {
    pub fn value(&self, name: &str) -> Option<&ScalarValue> {
        self.accessors.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

pub(crate) fn fingerprint(accessors: &[ResolvedAccessor]) -> String {
    let mut out = String::new();
    for accessor in accessors {
        out.push_str(&accessor.key);
        out.push('=');
        out.push_str(&accessor.text);
        out.push('\n');
    }
    out
}
