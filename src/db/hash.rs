//! Field-map (hash) records
//!
//! A hash is one metadata entry tagged [`DataType::Hash`] plus one field
//! entry per field. All field entries of a key share one prefix, so a
//! single prefix scan enumerates them in encoded-key order.

use std::collections::{HashMap, HashSet};

use crate::batch::WriteBatch;
use crate::error::{EmberError, Result};
use crate::keys;

use super::{DataType, Keyspace};

/// A stored field and its value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl Keyspace {
    /// Write the metadata entry and every given field in one atomic batch.
    ///
    /// Existing fields of the same name are overwritten; other fields are
    /// untouched. Metadata is written even when `fields` is empty, leaving
    /// an existing record with no fields until something is added.
    pub fn put_record<I, F, V>(&mut self, key: &[u8], data_type: DataType, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = (F, V)>,
        F: AsRef<[u8]>,
        V: Into<Vec<u8>>,
    {
        let mut batch = WriteBatch::new();
        batch.put(keys::encode_meta(key), keys::encode_metadata(data_type));
        for (field, value) in fields {
            batch.put(keys::encode_field(key, field.as_ref()), value);
        }
        self.engine().write_batch(batch)
    }

    /// Look up exactly the requested fields; absent fields map to `None`
    pub fn get_fields<F: AsRef<[u8]>>(
        &self,
        key: &[u8],
        fields: &[F],
    ) -> Result<HashMap<Vec<u8>, Option<Vec<u8>>>> {
        let mut found = HashMap::with_capacity(fields.len());
        for field in fields {
            let field = field.as_ref();
            let value = self.engine().get(&keys::encode_field(key, field))?;
            found.insert(field.to_vec(), value);
        }
        Ok(found)
    }

    /// Look up one field
    pub fn get_field(&self, key: &[u8], field: &[u8]) -> Result<Option<Vec<u8>>> {
        self.engine().get(&keys::encode_field(key, field))
    }

    /// Like [`get_fields`](Self::get_fields), keeping the requested order
    /// (duplicates included)
    pub fn get_fields_ordered<F: AsRef<[u8]>>(
        &self,
        key: &[u8],
        fields: &[F],
    ) -> Result<Vec<(Vec<u8>, Option<Vec<u8>>)>> {
        fields
            .iter()
            .map(|field| {
                let field = field.as_ref();
                let value = self.engine().get(&keys::encode_field(key, field))?;
                Ok((field.to_vec(), value))
            })
            .collect()
    }

    /// Names of all fields, in store order
    pub fn enumerate_fields(&self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .enumerate_fields_ordered(key)?
            .into_iter()
            .map(|field| field.name)
            .collect())
    }

    /// All fields with their values, in store order
    pub fn enumerate_fields_ordered(&self, key: &[u8]) -> Result<Vec<Field>> {
        self.engine()
            .scan_prefix(&keys::field_prefix(key))?
            .into_iter()
            .map(|(encoded, value)| {
                let name = keys::decode_field(&encoded).ok_or_else(|| {
                    EmberError::Storage(format!(
                        "malformed field entry key {:?}",
                        String::from_utf8_lossy(&encoded)
                    ))
                })?;
                Ok(Field {
                    name: name.to_vec(),
                    value,
                })
            })
            .collect()
    }

    /// Number of fields stored for `key`
    pub fn field_count(&self, key: &[u8]) -> Result<usize> {
        Ok(self.engine().scan_prefix(&keys::field_prefix(key))?.len())
    }

    /// Delete the named fields.
    ///
    /// When no field would survive, the metadata entry is deleted in the
    /// same batch, so the record never lingers with zero fields.
    pub fn delete_fields<F: AsRef<[u8]>>(&mut self, key: &[u8], fields: &[F]) -> Result<()> {
        let doomed: HashSet<Vec<u8>> = fields
            .iter()
            .map(|field| keys::encode_field(key, field.as_ref()))
            .collect();

        let survivors = self
            .engine()
            .scan_prefix(&keys::field_prefix(key))?
            .into_iter()
            .filter(|(encoded, _)| !doomed.contains(encoded))
            .count();

        let mut batch = WriteBatch::with_capacity(doomed.len() + 1);
        for encoded in doomed {
            batch.delete(encoded);
        }
        if survivors == 0 {
            batch.delete(keys::encode_meta(key));
        }
        self.engine().write_batch(batch)
    }
}
