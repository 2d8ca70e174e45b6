//! # Address Cache
//!
//! Reuses previously resolved addresses for nearby coordinates.
//!
//! The cache keeps every resolved coordinate in an R-tree. A lookup finds the
//! cached coordinate nearest by haversine distance and reuses its address when
//! it is closer than `min_distance` meters. Misses are resolved through an [`AddressResolver`]
//! (a reverse geocoder) and the result is cached. The whole map is persisted
//! through an [`AddressStore`]: periodically while entries are added, and at
//! explicit [`AddressCache::save`] points.

mod rtree;
mod store;

pub use rtree::{CoordKey, IndexedCoord};
pub use store::{AddressStore, JsonFileStore, MemoryStore};

use std::collections::HashMap;

use log::{debug, info, warn};
use rstar::RTree;
use serde::{Deserialize, Serialize};

use crate::config::AddressCacheConfig;
use crate::error::Result;
use crate::geo_utils::{haversine_distance, meters_to_degrees};
use crate::GpsPoint;

/// A resolved postal address: ordered `(kind, value)` components plus the
/// name of the source that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub components: Vec<(String, String)>,
    pub source: String,
}

impl Address {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            components: Vec::new(),
            source: source.into(),
        }
    }

    /// Builder-style [`Address::push`].
    pub fn with_component(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(kind, value);
        self
    }

    /// Append a component, replacing the value of an existing one of the same kind.
    pub fn push(&mut self, kind: impl Into<String>, value: impl Into<String>) {
        let kind = kind.into();
        let value = value.into();
        match self.components.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, v)) => *v = value,
            None => self.components.push((kind, value)),
        }
    }

    pub fn get(&self, kind: &str) -> Option<&str> {
        self.components
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Values of the requested component kinds, in the requested order.
    /// Missing kinds are skipped.
    pub fn tags(&self, kinds: &[&str]) -> Vec<&str> {
        kinds.iter().filter_map(|kind| self.get(kind)).collect()
    }

    /// Pseudo-address `"<lat> <lon>"` used when nothing better is known.
    pub fn geo_point(coordinate: &GpsPoint) -> Self {
        Self::new("geo_point").with_component(
            "geo_point",
            format!("{} {}", coordinate.latitude, coordinate.longitude),
        )
    }
}

/// Reverse geocoding collaborator.
///
/// `None` or an empty address means "could not resolve". Implementations own
/// their own retries and rate limiting.
pub trait AddressResolver {
    fn resolve(&mut self, coordinate: &GpsPoint) -> Option<Address>;
}

impl<F> AddressResolver for F
where
    F: FnMut(&GpsPoint) -> Option<Address>,
{
    fn resolve(&mut self, coordinate: &GpsPoint) -> Option<Address> {
        self(coordinate)
    }
}

#[derive(Debug, Clone)]
struct CachedAddress {
    coordinate: GpsPoint,
    address: Address,
}

/// Coordinate to address cache with nearest-neighbor reuse.
///
/// The cache never shrinks: entries are only added or refreshed.
pub struct AddressCache<S: AddressStore = JsonFileStore> {
    entries: HashMap<CoordKey, CachedAddress>,
    index: RTree<IndexedCoord>,
    config: AddressCacheConfig,
    since_last_flush: usize,
    store: S,
}

impl<S: AddressStore> AddressCache<S> {
    /// Create an empty cache backed by `store`, without loading it.
    pub fn new(config: AddressCacheConfig, store: S) -> Self {
        Self {
            entries: HashMap::new(),
            index: RTree::new(),
            config,
            since_last_flush: 0,
            store,
        }
    }

    /// Create a cache with everything `store` holds.
    ///
    /// A store that fails to load is logged and the cache starts empty.
    pub fn load(config: AddressCacheConfig, store: S) -> Self {
        let mut cache = Self::new(config, store);
        match cache.store.load() {
            Ok(loaded) => {
                for (coordinate, address) in loaded {
                    cache
                        .entries
                        .insert(coordinate.into(), CachedAddress { coordinate, address });
                }
                let coords: Vec<IndexedCoord> = cache
                    .entries
                    .values()
                    .map(|e| IndexedCoord::from(e.coordinate))
                    .collect();
                cache.index = RTree::bulk_load(coords);
                if cache.entries.is_empty() {
                    info!("[AddressCache] Address cache loaded, but it is empty");
                } else {
                    info!(
                        "[AddressCache] Loaded {} cached addresses",
                        cache.entries.len()
                    );
                }
            }
            Err(e) => warn!("[AddressCache] Could not load address cache: {}", e),
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &AddressCacheConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of entries added since the last flush.
    pub fn pending(&self) -> usize {
        self.since_last_flush
    }

    /// All cached `(coordinate, address)` pairs, in no particular order.
    pub fn entries(&self) -> impl Iterator<Item = (&GpsPoint, &Address)> {
        self.entries.values().map(|e| (&e.coordinate, &e.address))
    }

    /// Address of the nearest cached coordinate, if it is closer than
    /// `min_distance` meters.
    ///
    /// The R-tree narrows the search to a degree window wide enough for the
    /// latitude; the nearest entry is then picked by haversine distance.
    pub fn lookup(&self, coordinate: &GpsPoint) -> Option<&Address> {
        // 1% pad: haversine uses a smaller earth radius than meters_to_degrees
        let radius_deg = meters_to_degrees(self.config.min_distance, coordinate.latitude) * 1.01;
        let (nearest_point, distance) = self
            .index
            .locate_within_distance(
                [coordinate.latitude, coordinate.longitude],
                radius_deg * radius_deg,
            )
            .map(|entry| {
                let point = entry.point();
                (point, haversine_distance(&point, coordinate))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        if distance < self.config.min_distance {
            self.entries
                .get(&CoordKey::from(nearest_point))
                .map(|e| &e.address)
        } else {
            None
        }
    }

    /// Cache an address for `coordinate`.
    ///
    /// An exact duplicate coordinate has its address replaced. Once more than
    /// `flush_threshold` entries were added since the last flush, the whole
    /// cache is written to the store.
    pub fn insert(&mut self, coordinate: GpsPoint, address: Address) {
        let key = CoordKey::from(coordinate);
        if let Some(existing) = self.entries.get_mut(&key) {
            existing.address = address;
        } else {
            self.entries.insert(key, CachedAddress { coordinate, address });
            self.index.insert(IndexedCoord::from(coordinate));
        }

        self.since_last_flush += 1;
        if self.since_last_flush > self.config.flush_threshold {
            self.flush();
        }
    }

    /// Address for `coordinate`: from the cache when possible, otherwise from
    /// `resolver` (and then cached).
    ///
    /// When the resolver has nothing and `use_geo_point` is enabled, a
    /// `geo_point` pseudo-address is cached and returned instead.
    pub fn resolve(
        &mut self,
        coordinate: &GpsPoint,
        resolver: &mut dyn AddressResolver,
    ) -> Option<Address> {
        if !coordinate.is_valid() {
            return None;
        }
        if let Some(address) = self.lookup(coordinate) {
            return Some(address.clone());
        }

        let address = resolver
            .resolve(coordinate)
            .filter(|a| !a.is_empty())
            .or_else(|| {
                self.config
                    .use_geo_point
                    .then(|| Address::geo_point(coordinate))
            })?;
        self.insert(*coordinate, address.clone());
        Some(address)
    }

    /// Re-resolve every cached coordinate.
    ///
    /// An entry is only replaced when the resolver returns a non-empty
    /// address; failed refreshes keep the old value. The cache is flushed once
    /// at the end. Returns the number of replaced entries.
    pub fn bulk_refresh(&mut self, resolver: &mut dyn AddressResolver) -> usize {
        info!(
            "[AddressCache] Start refreshing {} cached addresses",
            self.entries.len()
        );
        let total = self.entries.len();
        let mut replaced = 0;

        for (n, entry) in self.entries.values_mut().enumerate() {
            if let Some(address) = resolver
                .resolve(&entry.coordinate)
                .filter(|a| !a.is_empty())
            {
                entry.address = address;
                replaced += 1;
            }
            debug!(
                "[AddressCache] Refreshed {} of {}: {:?}",
                n + 1,
                total,
                entry.coordinate
            );
        }

        self.flush();
        info!(
            "[AddressCache] Refreshed {} of {} cached addresses",
            replaced, total
        );
        replaced
    }

    /// Write the whole cache to the store and reset the flush counter.
    pub fn save(&mut self) -> Result<()> {
        let snapshot: Vec<(GpsPoint, Address)> = self
            .entries
            .values()
            .map(|e| (e.coordinate, e.address.clone()))
            .collect();
        self.store.save(&snapshot)?;
        self.since_last_flush = 0;
        Ok(())
    }

    fn flush(&mut self) {
        if let Err(e) = self.save() {
            warn!("[AddressCache] Could not save address cache: {}", e);
            self.since_last_flush = 0;
        }
    }
}
