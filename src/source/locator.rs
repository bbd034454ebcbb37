//! Source locator resolution.
//!
//! A locator wrapped in the marker character at both ends (`@NAME@`) names a
//! variable whose value is the real path. Variables come from the service's
//! own table first, then the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default indirection marker.
pub const DEFAULT_MARKER: char = '@';

/// The outcome of resolving a locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// The locator points at this file.
    Path(PathBuf),
    /// The locator names a variable that is not defined.
    Unresolved { variable: String },
}

/// Resolves locators to file paths.
#[derive(Debug, Clone)]
pub struct LocatorResolver {
    marker: char,
    variables: HashMap<String, String>,
    base_dir: Option<PathBuf>,
}

impl Default for LocatorResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER, HashMap::new(), None)
    }
}

impl LocatorResolver {
    pub fn new(marker: char, variables: HashMap<String, String>, base_dir: Option<PathBuf>) -> Self {
        Self {
            marker,
            variables,
            base_dir,
        }
    }

    /// Resolve a locator to a path. Relative paths are joined to the base dir.
    pub fn resolve(&self, locator: &str) -> Located {
        let raw = match self.indirect_name(locator) {
            Some(variable) => match self.lookup(variable) {
                Some(value) => value,
                None => {
                    return Located::Unresolved {
                        variable: variable.to_string(),
                    }
                }
            },
            None => locator.to_string(),
        };
        Located::Path(self.anchor(Path::new(&raw)))
    }

    fn indirect_name<'a>(&self, locator: &'a str) -> Option<&'a str> {
        let marker_len = self.marker.len_utf8();
        if locator.len() >= 2 * marker_len
            && locator.starts_with(self.marker)
            && locator.ends_with(self.marker)
        {
            Some(&locator[marker_len..locator.len() - marker_len])
        } else {
            None
        }
    }

    fn lookup(&self, variable: &str) -> Option<String> {
        if variable.is_empty() {
            return None;
        }
        self.variables
            .get(variable)
            .cloned()
            .or_else(|| std::env::var(variable).ok())
    }

    fn anchor(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_locator() {
        let resolver = LocatorResolver::default();
        assert_eq!(
            resolver.resolve("conf/app.properties"),
            Located::Path(PathBuf::from("conf/app.properties"))
        );
    }

    #[test]
    fn test_base_dir_applies_to_relative_only() {
        let resolver = LocatorResolver::new('@', HashMap::new(), Some(PathBuf::from("/etc/app")));
        assert_eq!(
            resolver.resolve("app.properties"),
            Located::Path(PathBuf::from("/etc/app/app.properties"))
        );
        assert_eq!(
            resolver.resolve("/opt/x.properties"),
            Located::Path(PathBuf::from("/opt/x.properties"))
        );
    }

    #[test]
    fn test_indirect_from_table() {
        let mut vars = HashMap::new();
        vars.insert("CFG".to_string(), "/tmp/cfg.properties".to_string());
        let resolver = LocatorResolver::new('@', vars, None);
        assert_eq!(
            resolver.resolve("@CFG@"),
            Located::Path(PathBuf::from("/tmp/cfg.properties"))
        );
    }

    #[test]
    fn test_indirect_unresolved() {
        let resolver = LocatorResolver::default();
        assert_eq!(
            resolver.resolve("@CAPCONF_SURELY_UNDEFINED_VARIABLE@"),
            Located::Unresolved {
                variable: "CAPCONF_SURELY_UNDEFINED_VARIABLE".into()
            }
        );
        assert_eq!(
            resolver.resolve("@@"),
            Located::Unresolved { variable: String::new() }
        );
    }

    #[test]
    fn test_single_marker_is_a_path() {
        let resolver = LocatorResolver::default();
        assert_eq!(resolver.resolve("@"), Located::Path(PathBuf::from("@")));
    }

    #[test]
    fn test_custom_marker() {
        let mut vars = HashMap::new();
        vars.insert("P".to_string(), "p.properties".to_string());
        let resolver = LocatorResolver::new('%', vars, None);
        assert_eq!(resolver.resolve("%P%"), Located::Path(PathBuf::from("p.properties")));
        assert_eq!(resolver.resolve("@P@"), Located::Path(PathBuf::from("@P@")));
    }
}
