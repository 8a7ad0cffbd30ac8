//! Session entry list joined with live car state.
//!
//! Keyed by car index, like every other tracker; descriptors and realtime
//! samples are merged here and joined by index at read time. Reads hand
//! out cloned snapshots so callers never touch tracker internals.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::protocol::types::{CarEntry, CarUpdate};

/// Merged static descriptor and latest realtime sample for one car.
#[derive(Debug, Clone)]
pub struct CarRecord {
    pub index: u16,
    pub entry: Option<CarEntry>,
    pub sample: Option<CarUpdate>,
    pub last_seen: Instant,
}

impl CarRecord {
    fn new(index: u16) -> Self {
        CarRecord { index, entry: None, sample: None, last_seen: Instant::now() }
    }

    pub fn driver_name(&self) -> String {
        self.entry.as_ref().map(|e| e.current_driver_name()).unwrap_or_default()
    }
}

/// All cars currently known to the session.
#[derive(Debug, Default)]
pub struct EntryList {
    cars: HashMap<u16, CarRecord>,
}

impl EntryList {
    pub fn new() -> Self {
        EntryList::default()
    }

    pub fn update_descriptor(&mut self, entry: CarEntry) {
        let record =
            self.cars.entry(entry.car_index).or_insert_with(|| CarRecord::new(entry.car_index));
        record.entry = Some(entry);
        record.last_seen = Instant::now();
    }

    pub fn update_sample(&mut self, sample: CarUpdate) {
        let record =
            self.cars.entry(sample.car_index).or_insert_with(|| CarRecord::new(sample.car_index));
        record.sample = Some(sample);
        record.last_seen = Instant::now();
    }

    pub fn get(&self, index: u16) -> Option<CarRecord> {
        self.cars.get(&index).cloned()
    }

    pub fn snapshot(&self) -> Vec<CarRecord> {
        self.cars.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }

    /// Removes cars unseen for longer than `max_age`. Used between
    /// sessions, where the server stops updating leavers.
    pub fn prune(&mut self, max_age: Duration) {
        self.cars.retain(|_, record| record.last_seen.elapsed() <= max_age);
    }

    pub fn clear(&mut self) {
        self.cars.clear();
    }
}
