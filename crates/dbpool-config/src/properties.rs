//! Key/value properties source.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

/// A flat set of string properties.
///
/// The text format is the familiar `.properties` layout:
///
/// ```text
/// # comment
/// ! also a comment
/// url = jdbc\:postgresql\://localhost:5432/flights
/// login: app
/// pool.size 4
/// description = first line \
///               second line
/// ```
///
/// The key ends at the first unescaped `=`, `:` or whitespace. Whitespace
/// after the key is skipped, together with one `=` or `:` following it.
/// Leading whitespace is stripped from every line; trailing whitespace in
/// a value is kept. A line ending in an odd number of backslashes continues
/// on the next line. Keys and values understand the escapes `\t`, `\n`,
/// `\r`, `\f` and `\uXXXX`; any other escaped character stands for
/// itself. A line with no separator defines its key with an empty value,
/// and later entries override earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    /// Create an empty property set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse properties from text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut properties = Self::new();
        let mut lines = text.lines();

        while let Some(line) = lines.next() {
            let line = line.trim_start_matches(is_blank);
            if line.is_empty() || line.starts_with(['#', '!']) {
                continue;
            }

            let mut logical = line.to_string();
            while continues(&logical) {
                logical.pop();
                match lines.next() {
                    Some(next) => logical.push_str(next.trim_start_matches(is_blank)),
                    None => break,
                }
            }

            let (key, value) = split_entry(&logical);
            let key = unescape(key);
            if key.is_empty() {
                tracing::debug!(line = %logical, "skipping property line without a key");
                continue;
            }

            properties.set(key, unescape(value));
        }

        properties
    }

    /// Read and parse a properties file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let properties = Self::parse(&text);
        tracing::debug!(
            path = %path.display(),
            entries = properties.len(),
            "loaded properties"
        );
        Ok(properties)
    }

    /// Look up a property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Insert or replace a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no properties are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Self::new();
        for (key, value) in iter {
            properties.set(key, value);
        }
        properties
    }
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

/// Whether a line ends in an unescaped backslash.
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line into its raw key and raw value.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (pos, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..pos], line[pos + 1..].trim_start_matches(is_blank)),
            c if is_blank(c) => {
                key_end = pos;
                break;
            }
            _ => {}
        }
    }

    let rest = line[key_end..].trim_start_matches(is_blank);
    let value = rest
        .strip_prefix(['=', ':'])
        .map_or(rest, |after| after.trim_start_matches(is_blank));
    (&line[..key_end], value)
}

/// Resolve backslash escapes.
///
/// A malformed `\u` escape is kept as written.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                let decoded = (hex.len() == 4 && hex.chars().all(|h| h.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match decoded {
                    Some(decoded) => {
                        out.push(decoded);
                        chars.nth(3);
                    }
                    None => {
                        tracing::debug!(escape = %hex, "keeping malformed unicode escape");
                        out.push_str("\\u");
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separators() {
        let props = Properties::parse("url=postgres://db:5432/flights\nlogin: app\npassword = s3cret");

        assert_eq!(props.get("url"), Some("postgres://db:5432/flights"));
        assert_eq!(props.get("login"), Some("app"));
        assert_eq!(props.get("password"), Some("s3cret"));
        assert_eq!(props.len(), 3);
    }

    #[test]
    fn test_first_separator_wins() {
        // The URL contains both ':' and '=' after the key separator.
        let props = Properties::parse("url=jdbc:postgresql://h/db?ssl=true");
        assert_eq!(props.get("url"), Some("jdbc:postgresql://h/db?ssl=true"));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let props = Properties::parse("# header\n\n   ! bang comment\npool.size=3\n");
        assert_eq!(props.len(), 1);
        assert_eq!(props.get("pool.size"), Some("3"));
    }

    #[test]
    fn test_key_without_value() {
        let props = Properties::parse("standalone\nempty=");
        assert_eq!(props.get("standalone"), Some(""));
        assert_eq!(props.get("empty"), Some(""));
    }

    #[test]
    fn test_later_entries_override() {
        let props = Properties::parse("pool.size=2\npool.size=8");
        assert_eq!(props.get("pool.size"), Some("8"));
    }

    #[test]
    fn test_missing_key_line_skipped() {
        let props = Properties::parse("=value\n :other");
        assert!(props.is_empty());
    }

    #[test]
    fn test_whitespace_separator() {
        let props = Properties::parse("url mock://db\nlogin app\npassword pw\npool.size 4\n");

        assert_eq!(props.get("url"), Some("mock://db"));
        assert_eq!(props.get("login"), Some("app"));
        assert_eq!(props.get("password"), Some("pw"));
        assert_eq!(props.get("pool.size"), Some("4"));
    }

    #[test]
    fn test_separator_after_whitespace() {
        let props = Properties::parse("login   =   app\npassword\t:pw\nflag  value=with=equals");

        assert_eq!(props.get("login"), Some("app"));
        assert_eq!(props.get("password"), Some("pw"));
        assert_eq!(props.get("flag"), Some("value=with=equals"));
    }

    #[test]
    fn test_escaped_separators() {
        let props = Properties::parse("url=jdbc\\:postgresql\\://h/db\nkey\\=with\\ space=1\nbackslash=C\\\\data");

        assert_eq!(props.get("url"), Some("jdbc:postgresql://h/db"));
        assert_eq!(props.get("key=with space"), Some("1"));
        assert_eq!(props.get("backslash"), Some("C\\data"));
    }

    #[test]
    fn test_control_and_unicode_escapes() {
        let props = Properties::parse("tabs=a\\tb\\nc\ncity=Mosk\\u0077a\nbroken=\\u00zz");

        assert_eq!(props.get("tabs"), Some("a\tb\nc"));
        assert_eq!(props.get("city"), Some("Moskwa"));
        assert_eq!(props.get("broken"), Some("\\u00zz"));
    }

    #[test]
    fn test_line_continuation() {
        let props = Properties::parse("url=mock://db/\\\n    flights\nlogin=app\n");

        assert_eq!(props.get("url"), Some("mock://db/flights"));
        assert_eq!(props.get("login"), Some("app"));
    }

    #[test]
    fn test_even_backslashes_do_not_continue() {
        let props = Properties::parse("dir=C\\\\\nlogin=app");

        assert_eq!(props.get("dir"), Some("C\\"));
        assert_eq!(props.get("login"), Some("app"));
    }

    #[test]
    fn test_continuation_at_end_of_input() {
        let props = Properties::parse("url=mock://db\\");
        assert_eq!(props.get("url"), Some("mock://db"));
    }

    #[test]
    fn test_trailing_whitespace_in_value_kept() {
        let props = Properties::parse("  login = app  ");
        assert_eq!(props.get("login"), Some("app  "));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Properties::load("/nonexistent/application.properties").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("application.properties"));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("dbpool-config-{}.properties", std::process::id()));
        std::fs::write(&path, "url=postgres://localhost/test\npool.size=5\n").unwrap();

        let props = Properties::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(props.get("url"), Some("postgres://localhost/test"));
        assert_eq!(props.get("pool.size"), Some("5"));
    }

    #[test]
    fn test_from_iter() {
        let props: Properties = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), Some("2"));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parsed_entries_round_trip(
                key in "[a-z][a-z0-9.]{0,15}",
                value in "[a-zA-Z0-9/._-]{0,24}",
            ) {
                let props = Properties::parse(&format!("{key}={value}"));
                prop_assert_eq!(props.get(&key), Some(value.as_str()));
            }

            #[test]
            fn parse_never_panics(text in "\\PC{0,200}") {
                let _ = Properties::parse(&text);
            }
        }
    }
}
