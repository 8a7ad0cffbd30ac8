//! Shared-memory sampling service.
//!
//! Keeps the region mapping alive behind a reader-writer lock (the lock
//! protects the mapping lifetime only; the bytes themselves are guarded by
//! the packet-id consistency check). Repeated read failures force a remap,
//! which covers the simulator recreating its regions between runs.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::shmem::layout::{Graphics, Physics, StaticData};
use crate::shmem::reader::SharedMemoryLink;
use crate::supervisor::{FeedSnapshot, StatusSource};

/// Consecutive read failures that force a remap.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// One coherent sample of all three regions.
#[derive(Debug, Clone, Copy)]
pub struct TelemetrySnapshot {
    pub physics: Physics,
    pub graphics: Graphics,
    pub static_data: StaticData,
}

/// Lazily-mapped access to the simulator's shared memory.
#[derive(Default)]
pub struct SharedMemoryService {
    link: RwLock<Option<SharedMemoryLink>>,
    consecutive_errors: AtomicU32,
}

impl SharedMemoryService {
    pub fn new() -> Self {
        SharedMemoryService::default()
    }

    pub fn is_mapped(&self) -> bool {
        self.link.read().expect("mapping lock poisoned").is_some()
    }

    /// Maps the regions if they are not mapped yet. Returns whether a
    /// mapping is available afterwards.
    pub fn ensure_mapped(&self) -> bool {
        if self.is_mapped() {
            return true;
        }
        match SharedMemoryLink::open() {
            Ok(link) => {
                debug!("shared memory link established");
                *self.link.write().expect("mapping lock poisoned") = Some(link);
                self.consecutive_errors.store(0, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    /// Drops and re-establishes the mapping.
    pub fn remap(&self) -> bool {
        *self.link.write().expect("mapping lock poisoned") = None;
        self.consecutive_errors.store(0, Ordering::Relaxed);
        self.ensure_mapped()
    }

    /// Reads all three regions. Read failures count towards the remap
    /// threshold; any success resets it.
    pub fn snapshot(&self) -> Result<TelemetrySnapshot> {
        let result = {
            let guard = self.link.read().expect("mapping lock poisoned");
            match guard.as_ref() {
                None => Err(crate::error::TelemetryError::NotMapped),
                Some(link) => read_all(link),
            }
        };

        match result {
            Ok(snapshot) => {
                self.consecutive_errors.store(0, Ordering::Relaxed);
                Ok(snapshot)
            }
            Err(e) => {
                let failures = self.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= MAX_CONSECUTIVE_ERRORS {
                    warn!(failures, "too many shared memory read errors, remapping");
                    self.remap();
                }
                Err(e)
            }
        }
    }
}

fn read_all(link: &SharedMemoryLink) -> Result<TelemetrySnapshot> {
    Ok(TelemetrySnapshot {
        physics: link.physics()?,
        graphics: link.graphics()?,
        static_data: link.static_data()?,
    })
}

/// Feeds the connection supervisor from the shared-memory pages.
pub struct MemoryStatusProbe {
    service: std::sync::Arc<SharedMemoryService>,
}

impl MemoryStatusProbe {
    pub fn new(service: std::sync::Arc<SharedMemoryService>) -> Self {
        MemoryStatusProbe { service }
    }
}

#[async_trait]
impl StatusSource for MemoryStatusProbe {
    async fn sample(&mut self) -> FeedSnapshot {
        if !self.service.ensure_mapped() {
            return FeedSnapshot::unreadable();
        }
        match self.service.snapshot() {
            Ok(snapshot) => FeedSnapshot {
                readable: true,
                status: snapshot.graphics.status(),
                packet_id: snapshot.physics.packet_id,
            },
            Err(_) => FeedSnapshot::unreadable(),
        }
    }
}
