//! Persistence collaborators for the address cache.
//!
//! The cache treats its store as an atomic blob: it only ever loads everything
//! or saves everything.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::Address;
use crate::error::{GeoSyncError, Result};
use crate::GpsPoint;

/// Load-all / save-all persistence for cached addresses.
pub trait AddressStore {
    fn load(&self) -> Result<Vec<(GpsPoint, Address)>>;

    fn save(&mut self, entries: &[(GpsPoint, Address)]) -> Result<()>;
}

#[derive(Serialize, Deserialize)]
struct CacheRecord {
    latitude: f64,
    longitude: f64,
    address: Address,
}

/// Stores the cache as a JSON array of `{latitude, longitude, address}`.
///
/// A missing file loads as an empty cache. Saves go through a temporary file
/// that is renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AddressStore for JsonFileStore {
    fn load(&self) -> Result<Vec<(GpsPoint, Address)>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(GeoSyncError::io(&self.path, e)),
        };
        let records: Vec<CacheRecord> = serde_json::from_reader(BufReader::new(file))?;
        Ok(records
            .into_iter()
            .map(|r| (GpsPoint::new(r.latitude, r.longitude), r.address))
            .collect())
    }

    fn save(&mut self, entries: &[(GpsPoint, Address)]) -> Result<()> {
        let records: Vec<CacheRecord> = entries
            .iter()
            .map(|(point, address)| CacheRecord {
                latitude: point.latitude,
                longitude: point.longitude,
                address: address.clone(),
            })
            .collect();

        let tmp_path = self.path.with_extension("json.tmp");
        let file = File::create(&tmp_path).map_err(|e| GeoSyncError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &records)?;
        writer.flush().map_err(|e| GeoSyncError::io(&tmp_path, e))?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(|e| GeoSyncError::io(&self.path, e))
    }
}

/// Keeps the "persisted" entries in memory. Useful when nothing should touch
/// the disk, and for inspecting what a cache flushed.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub entries: Vec<(GpsPoint, Address)>,
    pub save_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: Vec<(GpsPoint, Address)>) -> Self {
        Self {
            entries,
            save_count: 0,
        }
    }
}

impl AddressStore for MemoryStore {
    fn load(&self) -> Result<Vec<(GpsPoint, Address)>> {
        Ok(self.entries.clone())
    }

    fn save(&mut self, entries: &[(GpsPoint, Address)]) -> Result<()> {
        self.entries = entries.to_vec();
        self.save_count += 1;
        Ok(())
    }
}
