//! Valve key/value text blocks
//!
//! Parses the flat `"key" "value"` blocks found in the BSP entity lump:
//!
//! ```text
//! {
//! "classname" "worldspawn"
//! "skyname" "sky_day01_01"
//! }
//! ```
//!
//! Keys are case-insensitive and stored lower-cased. Values are kept as
//! written. When a key repeats inside one block the first value wins.
//! Nested `{ }` branches are skipped unless the block is parsed with
//! [`KeyValues::parse_flat`].

use indexmap::IndexMap;
use serde::Serialize;

/// One parsed key/value block, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeyValues {
    pairs: IndexMap<String, String>,
}

impl KeyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a block that starts with an opening brace. Lines before the
    /// first `{` are ignored, parsing stops at the matching `}`.
    pub fn parse(text: &str) -> Self {
        Self::parse_lines(text, false)
    }

    /// Parse the body of a block whose braces were already stripped.
    pub fn parse_flat(text: &str) -> Self {
        Self::parse_lines(text, true)
    }

    fn parse_lines(text: &str, started: bool) -> Self {
        let mut kv = Self::new();
        let mut started = started;
        let mut depth = 0usize;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if !started {
                if line.starts_with('{') {
                    started = true;
                }
                continue;
            }

            if line.starts_with('}') {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            } else if line.starts_with('{') {
                depth += 1;
            } else if depth == 0 {
                if let Some((key, value)) = split_pair(line) {
                    kv.insert(key, value);
                }
            }
        }

        kv
    }

    /// Insert unless the key is already present.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.pairs
            .entry(key.to_ascii_lowercase())
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.contains_key(&key.to_ascii_lowercase())
    }

    /// Shorthand for the `classname` key.
    pub fn classname(&self) -> Option<&str> {
        self.get("classname")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Split `"key" "value" // comment` into its two quoted tokens.
fn split_pair(line: &str) -> Option<(&str, &str)> {
    if line.starts_with("//") {
        return None;
    }
    let mut parts = line.split('"');
    parts.next()?;
    let key = parts.next()?;
    parts.next()?;
    let value = parts.next()?;
    // the closing quote of the value must exist
    parts.next()?;
    Some((key, value))
}

/// Split an entity lump into blocks and parse each one.
///
/// The lump is a sequence of `{ ... }` blocks; any fragment between braces
/// shorter than three characters is whitespace or padding and is dropped.
pub fn parse_entities(text: &str) -> Vec<KeyValues> {
    text.split(['{', '}'])
        .filter(|fragment| fragment.len() > 2)
        .map(KeyValues::parse_flat)
        .filter(|kv| !kv.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block() {
        let text = "{\n\"classname\" \"worldspawn\"\n\"SkyName\" \"sky_day01_01\"\n}\n";
        let kv = KeyValues::parse(text);
        assert_eq!(kv.len(), 2);
        assert_eq!(kv.classname(), Some("worldspawn"));
        assert_eq!(kv.get("skyname"), Some("sky_day01_01"));
        assert_eq!(kv.get("SKYNAME"), Some("sky_day01_01"));
    }

    #[test]
    fn test_first_value_wins() {
        let kv = KeyValues::parse_flat("\"origin\" \"0 0 0\"\n\"origin\" \"1 1 1\"\n");
        assert_eq!(kv.get("origin"), Some("0 0 0"));
    }

    #[test]
    fn test_nested_branch_skipped() {
        let text = "{\n\"a\" \"1\"\n{\n\"b\" \"2\"\n}\n\"c\" \"3\"\n}\n\"d\" \"4\"\n";
        let kv = KeyValues::parse(text);
        assert_eq!(kv.get("a"), Some("1"));
        assert_eq!(kv.get("b"), None);
        assert_eq!(kv.get("c"), Some("3"));
        assert_eq!(kv.get("d"), None);
    }

    #[test]
    fn test_comments_and_url_values() {
        let text = "// header\n\"url\" \"http://example.com\" // trailing\n\"broken \n";
        let kv = KeyValues::parse_flat(text);
        assert_eq!(kv.len(), 1);
        assert_eq!(kv.get("url"), Some("http://example.com"));
    }

    #[test]
    fn test_parse_entities() {
        let lump = "{\n\"classname\" \"worldspawn\"\n}\n{\n\"classname\" \"light\"\n\"_light\" \"255 255 255 200\"\n}\n\0";
        let ents = parse_entities(lump);
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[0].classname(), Some("worldspawn"));
        assert_eq!(ents[1].get("_light"), Some("255 255 255 200"));
        let keys: Vec<_> = ents[1].iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["classname", "_light"]);
    }
}
