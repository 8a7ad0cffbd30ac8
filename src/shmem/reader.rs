//! Read-only mapping of the simulator's shared-memory regions.
//!
//! The simulator writes the pages without any synchronization, so every
//! read of a live page is validated against its packet id: a copy whose id
//! changed mid-read is torn and retried.

use crate::error::{Result, TelemetryError};
use crate::shmem::layout::{Graphics, Physics, StaticData};

/// Retry budget for a consistent snapshot of a live page.
const TORN_READ_ATTEMPTS: usize = 3;

/// Copies a page until its packet id is stable across the copy.
///
/// `read_id` must observe the region's leading packet id; `copy` takes the
/// full snapshot. Used by the Windows reader and exercised directly in
/// tests, where the "region" is a plain buffer.
pub(crate) fn read_consistent<T>(
    region: &'static str,
    mut read_id: impl FnMut() -> i32,
    mut copy: impl FnMut() -> T,
) -> Result<T> {
    for _ in 0..TORN_READ_ATTEMPTS {
        let before = read_id();
        let value = copy();
        if read_id() == before {
            return Ok(value);
        }
    }
    Err(TelemetryError::shared_memory(region, "packet id unstable across read"))
}

#[cfg(windows)]
mod mapping {
    use std::ptr::NonNull;

    use tracing::{debug, trace};
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Memory::{
        MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_READ,
        MEMORY_MAPPED_VIEW_ADDRESS,
    };

    use super::*;
    use crate::shmem::layout::{GRAPHICS_REGION, PHYSICS_REGION, STATIC_REGION};

    /// One mapped region.
    struct Region {
        name: &'static str,
        mapping: HANDLE,
        base: NonNull<u8>,
    }

    impl Region {
        fn open(name: &'static str, len: usize) -> Result<Self> {
            trace!(region = name, "mapping shared memory region");

            let mapping = unsafe {
                let wide = wide_string(name);
                OpenFileMappingW(FILE_MAP_READ.0, false, PCWSTR::from_raw(wide.as_ptr()))
                    .map_err(|e| {
                        TelemetryError::shared_memory(name, format!("region not found: {e}"))
                    })?
            };

            let base = unsafe {
                let view = MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, len);
                NonNull::new(view.Value as *mut u8).ok_or_else(|| {
                    let _ = CloseHandle(mapping);
                    TelemetryError::shared_memory(name, "mapping failed")
                })?
            };

            Ok(Region { name, mapping, base })
        }

        fn packet_id(&self) -> i32 {
            // packet_id is the leading i32 of every live page.
            unsafe { std::ptr::read_volatile(self.base.as_ptr() as *const i32) }
        }

        fn snapshot<T: Copy>(&self) -> T {
            unsafe { std::ptr::read_volatile(self.base.as_ptr() as *const T) }
        }
    }

    impl Drop for Region {
        fn drop(&mut self) {
            unsafe {
                let addr = MEMORY_MAPPED_VIEW_ADDRESS { Value: self.base.as_ptr() as *mut _ };
                let _ = UnmapViewOfFile(addr);
                let _ = CloseHandle(self.mapping);
            }
        }
    }

    // SAFETY: the region holds a read-only view and a kernel handle; both
    // are safe to move and share across threads.
    unsafe impl Send for Region {}
    unsafe impl Sync for Region {}

    /// Mapped views of all three regions.
    pub struct SharedMemoryLink {
        physics: Region,
        graphics: Region,
        static_data: Region,
    }

    impl SharedMemoryLink {
        /// Maps all three regions; fails if the simulator has not created
        /// them yet.
        pub fn open() -> Result<Self> {
            let link = SharedMemoryLink {
                physics: Region::open(PHYSICS_REGION, std::mem::size_of::<Physics>())?,
                graphics: Region::open(GRAPHICS_REGION, std::mem::size_of::<Graphics>())?,
                static_data: Region::open(STATIC_REGION, std::mem::size_of::<StaticData>())?,
            };
            debug!("shared memory regions mapped");
            Ok(link)
        }

        /// Consistent snapshot of the physics page.
        pub fn physics(&self) -> Result<Physics> {
            read_consistent(
                self.physics.name,
                || self.physics.packet_id(),
                || self.physics.snapshot::<Physics>(),
            )
        }

        /// Consistent snapshot of the graphics page.
        pub fn graphics(&self) -> Result<Graphics> {
            read_consistent(
                self.graphics.name,
                || self.graphics.packet_id(),
                || self.graphics.snapshot::<Graphics>(),
            )
        }

        /// Snapshot of the static page. It changes only between sessions,
        /// so no consistency guard is needed.
        pub fn static_data(&self) -> Result<StaticData> {
            Ok(self.static_data.snapshot::<StaticData>())
        }
    }

    fn wide_string(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }
}

#[cfg(windows)]
pub use mapping::SharedMemoryLink;

/// Non-Windows stub; the simulator only exists on Windows.
#[cfg(not(windows))]
pub struct SharedMemoryLink {
    _private: (),
}

#[cfg(not(windows))]
impl SharedMemoryLink {
    pub fn open() -> Result<Self> {
        Err(TelemetryError::unsupported_platform("Shared memory telemetry", "Windows"))
    }

    pub fn physics(&self) -> Result<Physics> {
        Err(TelemetryError::NotMapped)
    }

    pub fn graphics(&self) -> Result<Graphics> {
        Err(TelemetryError::NotMapped)
    }

    pub fn static_data(&self) -> Result<StaticData> {
        Err(TelemetryError::NotMapped)
    }
}
