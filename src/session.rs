use std::collections::HashSet;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{Error, Result};

/// The persisted form of a session.
pub type SessionData = serde_json::Map<String, Value>;

/// A session record for the duration of one request.
///
/// Flash values are readable once per record: the first [`get`](Self::get) returns the value
/// and marks it consumed, later reads return `None`. Consumed flash values are dropped from the
/// stored data the next time the session is committed, so a handler that reads a flash value
/// without committing leaves it in place for the next request.
#[derive(Debug, Clone, Default)]
pub struct Session {
    id: Option<String>,
    data: SessionData,
    consumed_flash: HashSet<String>,
    modified: bool,
}

pub(crate) fn flash_key(name: &str) -> String {
    format!("__flash_{name}__")
}

impl Session {
    /// An empty session that has not been persisted yet.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(id: Option<String>, data: SessionData) -> Self {
        Self {
            id,
            data,
            ..Self::default()
        }
    }

    /// Identifier assigned by the storage backend, absent until first commit.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Raw session data, including unconsumed flash entries.
    pub fn data(&self) -> &SessionData {
        &self.data
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn is_empty(&self) -> bool {
        self.data
            .keys()
            .all(|key| self.consumed_flash.contains(key))
    }

    pub fn has(&self, key: &str) -> bool {
        if self.data.contains_key(key) {
            return true;
        }

        let flash = flash_key(key);
        self.data.contains_key(&flash) && !self.consumed_flash.contains(&flash)
    }

    /// Get the raw value for `key`, consuming it if it was flashed.
    pub fn get_value(&mut self, key: &str) -> Option<Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value.clone());
        }

        let flash = flash_key(key);
        if self.consumed_flash.contains(&flash) {
            return None;
        }

        let value = self.data.get(&flash)?.clone();
        self.consumed_flash.insert(flash);
        self.modified = true;
        Some(value)
    }

    /// Get the value for `key` deserialized as `T`, consuming it if it was flashed.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        self.get_value(key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(|err| Error::Decode(err.to_string()))
    }

    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| Error::Encode(err.to_string()))?;
        self.set_value(key, value);
        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
        self.modified = true;
    }

    /// Set a value that will be returned by the next read of `key` only.
    pub fn flash<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|err| Error::Encode(err.to_string()))?;
        let flash = flash_key(key);
        self.consumed_flash.remove(&flash);
        self.data.insert(flash, value);
        self.modified = true;
        Ok(())
    }

    pub fn unset(&mut self, key: &str) {
        if self.data.remove(key).is_some() {
            self.modified = true;
        }
    }

    /// Data to persist: everything except flash values consumed by this record.
    pub(crate) fn data_to_commit(&self) -> SessionData {
        self.data
            .iter()
            .filter(|(key, _)| !self.consumed_flash.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub(crate) fn committed(&mut self, id: Option<String>) {
        let consumed = std::mem::take(&mut self.consumed_flash);
        self.data.retain(|key, _| !consumed.contains(key));
        self.id = id;
        self.modified = false;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_get_has_unset() {
        let mut session = Session::new();
        assert!(session.is_empty());
        assert!(!session.is_modified());

        session.set("userId", "42").expect("value serializes");
        assert!(session.has("userId"));
        assert!(session.is_modified());
        assert_eq!(
            session.get::<String>("userId").expect("value decodes"),
            Some("42".to_string())
        );
        // Plain values can be read repeatedly.
        assert_eq!(session.get_value("userId"), Some(json!("42")));

        session.unset("userId");
        assert!(!session.has("userId"));
        assert_eq!(session.get_value("userId"), None);
        assert!(session.is_empty());
    }

    #[test]
    fn get_with_wrong_type_is_decode_error() {
        let mut session = Session::new();
        session.set("n", "not a number").expect("value serializes");

        assert!(matches!(session.get::<u32>("n"), Err(Error::Decode(_))));
    }

    #[test]
    fn flash_reads_once_per_record() {
        let mut session = Session::new();
        session.flash("notice", "saved").expect("value serializes");
        assert!(session.has("notice"));

        assert_eq!(session.get_value("notice"), Some(json!("saved")));
        assert_eq!(session.get_value("notice"), None);
        assert!(!session.has("notice"));
    }

    #[test]
    fn flash_stays_stored_until_commit() {
        let mut session = Session::new();
        session.flash("notice", "saved").expect("value serializes");
        session.committed(Some("abc".to_string()));

        let mut reloaded = Session::from_parts(Some("abc".to_string()), session.data().clone());
        assert!(!reloaded.is_modified());
        assert_eq!(reloaded.get_value("notice"), Some(json!("saved")));
        assert!(reloaded.is_modified());

        // Still in the raw data, but excluded from what gets persisted.
        assert!(reloaded.data().contains_key("__flash_notice__"));
        assert!(!reloaded.data_to_commit().contains_key("__flash_notice__"));

        reloaded.committed(Some("abc".to_string()));
        assert!(reloaded.data().is_empty());
    }

    #[test]
    fn plain_key_shadows_flash() {
        let mut session = Session::new();
        session.flash("k", 1).expect("value serializes");
        session.set("k", 2).expect("value serializes");

        assert_eq!(session.get_value("k"), Some(json!(2)));
        assert_eq!(session.get_value("k"), Some(json!(2)));

        session.unset("k");
        assert_eq!(session.get_value("k"), Some(json!(1)));
        assert_eq!(session.get_value("k"), None);
    }

    #[test]
    fn reflash_after_read() {
        let mut session = Session::new();
        session.flash("k", 1).expect("value serializes");
        assert_eq!(session.get_value("k"), Some(json!(1)));

        session.flash("k", 2).expect("value serializes");
        assert_eq!(session.get_value("k"), Some(json!(2)));
    }

    #[test]
    fn consumed_flash_counts_as_empty() {
        let mut session = Session::new();
        session.flash("k", 1).expect("value serializes");
        assert!(!session.is_empty());

        session.get_value("k");
        assert!(session.is_empty());
    }

    #[test]
    fn unset_missing_key_is_not_a_modification() {
        let mut session = Session::new();
        session.unset("missing");

        assert!(!session.is_modified());
    }
}
