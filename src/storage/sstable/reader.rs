//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups and prefix scans
//! via an in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::error::{EmberError, Result};

use super::{
    read_u32_le, read_u64_le, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION,
};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    /// Path of the underlying file (for diagnostics)
    path: PathBuf,
    /// File handle for reading entries
    file: BufReader<File>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    /// Metadata
    entry_count: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header, footer and the data-block checksum, then loads the
    /// entire index into memory for fast lookups.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(EmberError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(EmberError::Storage(format!(
                "Invalid SSTable magic: expected EMKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(EmberError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64_le(&header, 6);

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64_le(&footer, 0);
        let data_crc = read_u32_le(&footer, 8);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(EmberError::Storage(format!(
                "SSTable {} has invalid index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Verify the data block before trusting any offsets into it
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != data_crc {
            return Err(EmberError::Storage(format!(
                "SSTable {} data checksum mismatch: expected {:08x}, got {:08x}",
                path.display(),
                data_crc,
                actual_crc
            )));
        }
        drop(data);

        // Load index into memory
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(EmberError::Storage(format!(
                    "SSTable {} index truncated at byte {}",
                    path.display(),
                    pos
                )));
            }
            let key_len = read_u32_le(&index_data, pos) as usize;
            let offset = read_u64_le(&index_data, pos + 4);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(EmberError::Storage(format!(
                    "SSTable {} index key truncated at byte {}",
                    path.display(),
                    pos
                )));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(EmberError::Storage(format!(
                "SSTable {} header claims {} entries, index holds {}",
                path.display(),
                entry_count,
                index.len()
            )));
        }

        // Reset file to start for reading
        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
        })
    }

    /// Get a value by key: O(log n) lookup via in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone (deleted)
    /// - `Err(KeyNotFound)`: key not in this SSTable
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(EmberError::KeyNotFound),
        };

        self.read_value_at(offset)
    }

    /// All entries whose key starts with `prefix`, in key order.
    ///
    /// Tombstones are included as `None` so the caller can shadow older
    /// tables.
    pub fn scan_prefix(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Option<Vec<u8>>)>> {
        let matches: Vec<(Vec<u8>, u64)> = self
            .index
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, &offset)| (key.clone(), offset))
            .collect();

        let mut entries = Vec::with_capacity(matches.len());
        for (key, offset) in matches {
            let value = self.read_value_at(offset)?;
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Read the value of the entry starting at `offset` (`None` = tombstone)
    fn read_value_at(&mut self, offset: u64) -> Result<Option<Vec<u8>>> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = read_u32_le(&header, 0);
        let val_len = read_u32_le(&header, 4);

        // Skip the key (the index already matched it)
        self.file.seek_relative(key_len as i64)?;

        if val_len == TOMBSTONE_MARKER {
            return Ok(None);
        }

        let mut value = vec![0u8; val_len as usize];
        self.file.read_exact(&mut value)?;
        Ok(Some(value))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Quick check if any key with `prefix` might be in this SSTable
    pub fn might_contain_prefix(&self, prefix: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => {
                // Prefixed keys sort at or after `prefix`; a min past all of
                // them rules the table out
                max >= prefix && (min <= prefix || min.starts_with(prefix))
            }
            _ => false,
        }
    }
}
