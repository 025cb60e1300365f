//! Flat scraped records
//!
//! A [`Record`] is an ordered list of field/value pairs. Field order is the
//! insertion order and becomes the column order of a fresh sheet header.

/// Capture timestamp injected into every record
pub const TIMESTAMP_FIELD: &str = "fecha_scraping";

/// 1-based ordinal of the record within one page extraction
pub const POSITION_FIELD: &str = "posicion";

/// Headline text in simple mode
pub const TITLE_FIELD: &str = "titulo";

/// Headline link target in simple mode
pub const LINK_FIELD: &str = "enlace";

/// Format of [`TIMESTAMP_FIELD`] values
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fields the extractor injects itself. Field mappings may not reuse them.
pub const SYSTEM_FIELDS: [&str; 2] = [TIMESTAMP_FIELD, POSITION_FIELD];

/// Current local wall clock, second precision
pub fn timestamp_now() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record pre-filled with the timestamp and position system fields
    pub fn stamped(timestamp: impl Into<String>, position: usize) -> Self {
        let mut record = Self::new();
        record.insert(TIMESTAMP_FIELD, timestamp);
        record.insert(POSITION_FIELD, position.to_string());
        record
    }

    /// Insert a field, replacing the value in place if the key exists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The record's position, if it carries a parseable one
    pub fn position(&self) -> Option<usize> {
        self.get(POSITION_FIELD).and_then(|p| p.parse().ok())
    }

    /// Shape the record into a sheet row following `header`.
    ///
    /// Header fields the record lacks become empty cells.
    pub fn to_row<S: AsRef<str>>(&self, header: &[S]) -> Vec<String> {
        header
            .iter()
            .map(|field| self.get(field.as_ref()).unwrap_or_default().to_string())
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}
