//! Ordered string-keyed dictionaries of values.

use std::fmt;

use super::value::CrateValue;

/// Dictionary value: key-value pairs in file order.
///
/// Lookups are linear; dictionaries in scene files are small.
#[derive(Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(String, CrateValue)>,
}

impl Dictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with room for `n` entries.
    pub fn with_capacity(n: usize) -> Self {
        Self { entries: Vec::with_capacity(n) }
    }

    /// Set a value, keeping the position of an existing key.
    ///
    /// Returns the previous value if the key was present.
    pub fn insert(&mut self, key: impl Into<String>, value: CrateValue) -> Option<CrateValue> {
        let key = key.into();
        for (k, v) in &mut self.entries {
            if *k == key {
                return Some(std::mem::replace(v, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&CrateValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over key-value pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CrateValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over keys in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k:?}: {v}")?;
        }
        f.write_str("}")
    }
}

impl FromIterator<(String, CrateValue)> for Dictionary {
    fn from_iter<T: IntoIterator<Item = (String, CrateValue)>>(iter: T) -> Self {
        let mut dict = Self::new();
        for (k, v) in iter {
            dict.insert(k, v);
        }
        dict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order() {
        let mut d = Dictionary::new();
        d.insert("b", CrateValue::Int(1));
        d.insert("a", CrateValue::Int(2));
        assert_eq!(d.keys().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(d.get("a"), Some(&CrateValue::Int(2)));
        assert!(d.get("c").is_none());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut d = Dictionary::new();
        d.insert("x", CrateValue::Int(1));
        d.insert("y", CrateValue::Int(2));
        let old = d.insert("x", CrateValue::Float(3.0));
        assert_eq!(old, Some(CrateValue::Int(1)));
        assert_eq!(d.len(), 2);
        assert_eq!(d.iter().next(), Some(("x", &CrateValue::Float(3.0))));
    }

    #[test]
    fn test_display() {
        let d: Dictionary = [
            ("name".to_string(), CrateValue::String("a".into())),
            ("n".to_string(), CrateValue::Int(4)),
        ]
        .into_iter()
        .collect();
        assert_eq!(d.to_string(), r#"{"name": "a", "n": 4}"#);
        assert!(d.contains_key("n"));
    }
}
