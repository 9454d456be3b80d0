//! Key-value attributes with a lazily synchronized string form
//!
//! FEATS and MISC columns are stored as `DualDict`s. Most nodes in a treebank
//! are only read and written back, never inspected, so a dictionary built from
//! a string keeps that string and parses it on the first key access. A
//! dictionary that was mutated drops its cached string and rebuilds it on the
//! next serialization.
//!
//! States: string-only (fresh from a file), map-only (mutated since the last
//! serialization) and both (either one derived from the other).

use rustc_hash::FxHashMap;
use std::cell::OnceCell;
use std::fmt;

/// Value of one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictValue {
    /// Bare key without `=value`
    Flag,
    Text(String),
}

impl DictValue {
    /// Text of the value, empty for flags
    pub fn as_str(&self) -> &str {
        match self {
            DictValue::Flag => "",
            DictValue::Text(s) => s,
        }
    }
}

type Map = FxHashMap<String, DictValue>;

#[derive(Clone, Default)]
pub struct DualDict {
    map: OnceCell<Map>,
    string: OnceCell<String>,
}

impl DualDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a serialized `key=value|key` string without parsing it
    pub fn from_string(s: &str) -> Self {
        let dict = Self::default();
        let _ = dict.string.set(normalize(s));
        dict
    }

    /// Replace the whole content by a serialized string
    pub fn set_string(&mut self, s: &str) {
        self.map.take();
        self.string.take();
        let _ = self.string.set(normalize(s));
    }

    /// Canonical serialization (`_` when empty)
    pub fn as_str(&self) -> &str {
        self.string.get_or_init(|| serialize(self.map()))
    }

    fn map(&self) -> &Map {
        self.map.get_or_init(|| match self.string.get() {
            Some(s) => parse(s),
            None => Map::default(),
        })
    }

    fn update<R>(&mut self, f: impl FnOnce(&mut Map) -> R) -> R {
        let mut map = match self.map.take() {
            Some(map) => map,
            None => match self.string.get() {
                Some(s) => parse(s),
                None => Map::default(),
            },
        };
        self.string.take();
        let result = f(&mut map);
        self.map = OnceCell::from(map);
        result
    }

    pub fn get(&self, key: &str) -> Option<&DictValue> {
        self.map().get(key)
    }

    /// Text value of `key`; `None` when absent or a bare flag
    pub fn value(&self, key: &str) -> Option<&str> {
        match self.map().get(key) {
            Some(DictValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map().contains_key(key)
    }

    /// Set `key` to `value`. `None` and `""` delete the key.
    pub fn set(&mut self, key: &str, value: Option<&str>) {
        match value {
            None | Some("") => self.remove(key),
            Some(v) => {
                self.update(|map| map.insert(key.to_string(), DictValue::Text(v.to_string())));
            }
        }
    }

    pub fn set_flag(&mut self, key: &str) {
        self.update(|map| map.insert(key.to_string(), DictValue::Flag));
    }

    /// Delete `key`; absent keys are ignored
    pub fn remove(&mut self, key: &str) {
        if self.contains_key(key) {
            self.update(|map| map.remove(key));
        }
    }

    pub fn clear(&mut self) {
        self.string.take();
        self.map = OnceCell::from(Map::default());
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Entries in canonical (case-insensitive key) order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DictValue)> {
        sorted_entries(self.map()).into_iter()
    }
}

fn normalize(s: &str) -> String {
    if s.is_empty() { "_".to_string() } else { s.to_string() }
}

fn parse(s: &str) -> Map {
    let mut map = Map::default();
    if s == "_" {
        return map;
    }
    for pair in s.split('|') {
        if pair.is_empty() {
            continue;
        }
        match pair.split_once('=') {
            Some((_, "")) => {}
            Some((key, value)) => {
                map.insert(key.to_string(), DictValue::Text(value.to_string()));
            }
            None => {
                map.insert(pair.to_string(), DictValue::Flag);
            }
        }
    }
    map
}

fn sorted_entries(map: &Map) -> Vec<(&str, &DictValue)> {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), v)).collect();
    entries.sort_by(|(a, _), (b, _)| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    entries
}

fn serialize(map: &Map) -> String {
    if map.is_empty() {
        return "_".to_string();
    }
    sorted_entries(map)
        .into_iter()
        .map(|(key, value)| match value {
            DictValue::Flag => key.to_string(),
            DictValue::Text(v) => format!("{key}={v}"),
        })
        .collect::<Vec<_>>()
        .join("|")
}

impl PartialEq for DualDict {
    fn eq(&self, other: &Self) -> bool {
        self.map() == other.map()
    }
}

impl Eq for DualDict {}

impl fmt::Display for DualDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for DualDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DualDict").field(&self.as_str()).finish()
    }
}

impl From<&str> for DualDict {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}
