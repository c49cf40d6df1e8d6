//! Keyspace
//!
//! Type metadata tracking shared by every record type.

use crate::engine::Engine;
use crate::error::Result;
use crate::keys;

use super::DataType;

/// Records of one database, stored in one engine.
///
/// Methods that write take `&mut self`; see the module docs of
/// [`crate::db`] for how that maps onto the database lock.
pub struct Keyspace {
    engine: Engine,
}

impl Keyspace {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Type of the record stored at `key`, or `None` if it does not exist.
    ///
    /// Only the metadata entry is consulted; stray field entries without
    /// metadata do not make a key exist.
    pub fn has_record(&self, key: &[u8]) -> Result<Option<DataType>> {
        match self.engine.get(&keys::encode_meta(key))? {
            Some(value) => Ok(Some(keys::decode_metadata(&value)?)),
            None => Ok(None),
        }
    }

    /// Remove a record of any type: all of its field entries and its
    /// metadata, in one atomic batch.
    ///
    /// Returns whether the record existed.
    pub fn delete_record(&mut self, key: &[u8]) -> Result<bool> {
        let existed = self.has_record(key)?.is_some();

        let entries = self.engine.scan_prefix(&keys::field_prefix(key))?;
        if !existed && entries.is_empty() {
            return Ok(false);
        }

        let doomed = entries.into_iter().map(|(encoded, _)| encoded);
        self.engine
            .delete_batch(std::iter::once(keys::encode_meta(key)).chain(doomed))?;

        Ok(existed)
    }

    pub(super) fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(super) fn into_engine(self) -> Engine {
        self.engine
    }
}
