//! Flat `key=value` configuration files.
//!
//! Lines starting with `#` or `!` are comments. Keys end at the first
//! unescaped `=`, `:` or whitespace; surrounding whitespace of the key and
//! leading whitespace of the value are dropped. A trailing backslash continues
//! the value on the next line. Later duplicates win.
//!
//! Escapes apply to keys and values alike: `\t`, `\n`, `\r`, `\f` are control
//! characters, `\uXXXX` is a UTF-16 code unit (surrogate pairs combine), and a
//! backslash before any other character yields that character. A malformed
//! `\u` escape is kept as written.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use crate::source::{SourceError, SourceReader};

/// Reads `.properties`-style files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesReader;

impl SourceReader for PropertiesReader {
    fn read(&self, path: &Path) -> Result<HashMap<String, String>, SourceError> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
            _ => SourceError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Ok(parse_properties(&content))
    }
}

/// Parse properties text into a flat mapping.
pub fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        map.insert(unescape(key), unescape(value));
    }

    map
}

/// An odd number of trailing backslashes means the last one escapes the newline.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let end = line.char_indices().find_map(|(i, c)| {
        if escaped {
            escaped = false;
            return None;
        }
        match c {
            '\\' => {
                escaped = true;
                None
            }
            '=' | ':' => Some(i),
            c if c.is_whitespace() => Some(i),
            _ => None,
        }
    });
    let Some(end) = end else {
        return (line, "");
    };
    let key = &line[..end];
    let mut rest = line[end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(|c: char| c == '=' || c == ':') {
        rest = stripped.trim_start();
    }
    (key, rest)
}

/// Decode escape sequences in a key or value.
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_units(&mut out, &mut units);
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('u') => {
                let rest = chars.as_str();
                match rest.get(..4).filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit())) {
                    Some(hex) => {
                        // Four ASCII hex digits always fit a u16.
                        units.push(u16::from_str_radix(hex, 16).unwrap_or_default());
                        chars = rest[4..].chars();
                    }
                    None => {
                        flush_units(&mut out, &mut units);
                        out.push_str("\\u");
                    }
                }
            }
            Some(other) => {
                flush_units(&mut out, &mut units);
                out.push(match other {
                    't' => '\t',
                    'n' => '\n',
                    'r' => '\r',
                    'f' => '\u{c}',
                    literal => literal,
                });
            }
            // A lone trailing backslash is dropped.
            None => {}
        }
    }
    flush_units(&mut out, &mut units);
    out
}

fn flush_units(out: &mut String, units: &mut Vec<u16>) {
    if units.is_empty() {
        return;
    }
    out.extend(char::decode_utf16(units.drain(..)).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_entries() {
        let map = parse_properties("a=1\nb = two\nc:3\nd 4\n");
        assert_eq!(map["a"], "1");
        assert_eq!(map["b"], "two");
        assert_eq!(map["c"], "3");
        assert_eq!(map["d"], "4");
    }

    #[test]
    fn test_comments_and_blanks() {
        let map = parse_properties("# comment\n! also\n\n   \n#IGNORE=COMMENTS\nkey=value\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map["key"], "value");
    }

    #[test]
    fn test_trailing_whitespace_kept() {
        let map = parse_properties("k=  v  \n");
        assert_eq!(map["k"], "v  ");
    }

    #[test]
    fn test_empty_value_and_bare_key() {
        let map = parse_properties("empty=\nbare\n");
        assert_eq!(map["empty"], "");
        assert_eq!(map["bare"], "");
    }

    #[test]
    fn test_continuation() {
        let map = parse_properties("long=one \\\n    two\nnext=x\n");
        assert_eq!(map["long"], "one two");
        assert_eq!(map["next"], "x");
    }

    #[test]
    fn test_later_duplicate_wins() {
        let map = parse_properties("k=1\nk=2\n");
        assert_eq!(map["k"], "2");
    }

    #[test]
    fn test_backslash_and_control_escapes() {
        let map = parse_properties("path=C:\\\\temp\nmsg=a\\tb\\nc\\rd\\fe\nplain=\\q\\#x\n");
        assert_eq!(map["path"], "C:\\temp");
        assert_eq!(map["msg"], "a\tb\nc\rd\u{c}e");
        assert_eq!(map["plain"], "q#x");
    }

    #[test]
    fn test_unicode_escapes() {
        let map = parse_properties("name=M\\u00fcller\nclef=\\uD834\\uDD1E!\nbroken=\\u12x\n");
        assert_eq!(map["name"], "Müller");
        assert_eq!(map["clef"], "\u{1D11E}!");
        assert_eq!(map["broken"], "\\u12x");
    }

    #[test]
    fn test_escaped_separators_in_key() {
        let map = parse_properties("key\\ with\\ space=v\na\\=b=c\nx\\:y:z\n");
        assert_eq!(map["key with space"], "v");
        assert_eq!(map["a=b"], "c");
        assert_eq!(map["x:y"], "z");
    }

    #[test]
    fn test_escaped_leading_space_in_value() {
        let map = parse_properties("k=\\  padded\n");
        assert_eq!(map["k"], "  padded");
    }

    #[test]
    fn test_missing_file() {
        let err = PropertiesReader
            .read(Path::new("/definitely/not/here.properties"))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }
}
