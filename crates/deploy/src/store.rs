//! Per-destination record of what has already been deployed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use cdnpush_transfer::{fingerprint, strip_query};

/// A file that survived change detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// Filename as submitted, query suffix included.
    pub raw: String,
    /// Filename without the query suffix.
    pub stripped: String,
    pub fingerprint: String,
    /// `false` for the empty "no content" marker.
    pub has_content: bool,
}

/// Maps stripped filename -> fingerprint of the last content that was
/// uploaded successfully.
///
/// Entries are only ever inserted or overwritten. Thread-safe: the
/// filter and record passes each run under one lock.
#[derive(Debug, Default)]
pub struct FingerprintStore {
    records: Mutex<HashMap<String, String>>,
}

impl FingerprintStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `records`.
    pub fn from_records(records: HashMap<String, String>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    /// Returns the recorded fingerprint for a stripped filename.
    pub fn get(&self, key: &str) -> Option<String> {
        self.records.lock().unwrap().get(key).cloned()
    }

    /// Filters `files` down to the entries whose fingerprint differs from
    /// the recorded one (or that were never recorded).
    pub fn changed_files(&self, files: &BTreeMap<String, Vec<u8>>) -> Vec<ChangedFile> {
        let records = self.records.lock().unwrap();
        files
            .iter()
            .filter_map(|(raw, content)| {
                let stripped = strip_query(raw);
                let fp = fingerprint(content);
                if records.get(stripped) == Some(&fp) {
                    return None;
                }
                Some(ChangedFile {
                    raw: raw.clone(),
                    stripped: stripped.to_string(),
                    fingerprint: fp,
                    has_content: !content.is_empty(),
                })
            })
            .collect()
    }

    /// Records the fingerprints of delivered files. Empty-content entries
    /// are skipped. Returns the number of entries written.
    pub fn record_delivered(&self, files: &[ChangedFile]) -> usize {
        let mut records = self.records.lock().unwrap();
        let mut written = 0;
        for file in files.iter().filter(|f| f.has_content) {
            records.insert(file.stripped.clone(), file.fingerprint.clone());
            written += 1;
        }
        written
    }

    /// Number of recorded files.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of all records.
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.records.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(entries: &[(&str, &str)]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn unrecorded_files_are_changed() {
        let store = FingerprintStore::new();
        let changed = store.changed_files(&files(&[("a.js", "1"), ("b.css", "2")]));
        assert_eq!(changed.len(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn recorded_files_are_skipped() {
        let store = FingerprintStore::new();
        let input = files(&[("a.js", "1"), ("b.css", "2")]);
        let changed = store.changed_files(&input);
        assert_eq!(store.record_delivered(&changed), 2);

        assert!(store.changed_files(&input).is_empty());
    }

    #[test]
    fn single_byte_change_is_detected() {
        let store = FingerprintStore::new();
        let changed = store.changed_files(&files(&[("a.js", "abc"), ("b.js", "xyz")]));
        store.record_delivered(&changed);

        let changed = store.changed_files(&files(&[("a.js", "abd"), ("b.js", "xyz")]));
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].stripped, "a.js");
    }

    #[test]
    fn query_suffix_shares_key() {
        let store = FingerprintStore::new();
        let changed = store.changed_files(&files(&[("a.js?v=1", "same")]));
        assert_eq!(changed[0].raw, "a.js?v=1");
        assert_eq!(changed[0].stripped, "a.js");
        store.record_delivered(&changed);

        assert!(store.get("a.js").is_some());
        assert!(store.changed_files(&files(&[("a.js?v=2", "same")])).is_empty());
    }

    #[test]
    fn empty_content_is_never_recorded() {
        let store = FingerprintStore::new();
        let input = files(&[("empty.tpl", ""), ("full.tpl", "x")]);
        let changed = store.changed_files(&input);
        assert_eq!(store.record_delivered(&changed), 1);
        assert!(store.get("empty.tpl").is_none());

        // Still sent on the next pass.
        let changed = store.changed_files(&input);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].stripped, "empty.tpl");
        assert!(!changed[0].has_content);
    }

    #[test]
    fn from_records_seeds_store() {
        let mut seed = HashMap::new();
        seed.insert("a.js".to_string(), fingerprint(b"1"));
        let store = FingerprintStore::from_records(seed);
        assert_eq!(store.len(), 1);
        assert!(store.changed_files(&files(&[("a.js", "1")])).is_empty());
        assert_eq!(store.snapshot().len(), 1);
    }
}
