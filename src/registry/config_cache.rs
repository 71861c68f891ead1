use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::RegistryError;
use crate::Result;

/// Raw business configuration mirrored from the store, keyed by dotted key.
///
/// Values are the raw bytes written to the store. Local writes through
/// [`ConfigCache::store`] are overwritten by the next change under the same key.
#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: DashMap<String, Vec<u8>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(
        &self,
        key: &str,
    ) -> Option<Vec<u8>> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// Like [`ConfigCache::load`] but a missing or empty value is an error.
    pub fn load_bytes(
        &self,
        key: &str,
    ) -> Result<Vec<u8>> {
        let value = self
            .load(key)
            .ok_or_else(|| RegistryError::MissingKey { key: key.to_string() })?;
        if value.is_empty() {
            return Err(RegistryError::EmptyValue { key: key.to_string() }.into());
        }
        Ok(value)
    }

    /// `Ok(None)` when the key is absent; an empty value is an error.
    pub fn load_string(
        &self,
        key: &str,
    ) -> Result<Option<String>> {
        match self.load(key) {
            None => Ok(None),
            Some(v) if v.is_empty() => Err(RegistryError::EmptyValue { key: key.to_string() }.into()),
            Some(v) => Ok(Some(String::from_utf8_lossy(&v).into_owned())),
        }
    }

    pub fn store(
        &self,
        key: impl Into<String>,
        value: Vec<u8>,
    ) {
        self.entries.insert(key.into(), value);
    }

    pub fn delete(
        &self,
        key: &str,
    ) {
        self.entries.remove(key);
    }

    /// Returns the existing value and `true`, or stores `value` and returns it with `false`.
    pub fn load_or_store(
        &self,
        key: impl Into<String>,
        value: Vec<u8>,
    ) -> (Vec<u8>, bool) {
        match self.entries.entry(key.into()) {
            Entry::Occupied(existing) => (existing.get().clone(), true),
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
                (value, false)
            }
        }
    }

    /// Visits entries until `f` returns `false`. Iteration order is unspecified.
    pub fn range<F>(
        &self,
        mut f: F,
    ) where
        F: FnMut(&str, &[u8]) -> bool,
    {
        for entry in self.entries.iter() {
            if !f(entry.key(), entry.value()) {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
