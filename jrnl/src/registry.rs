//! Fixed-size handle table mapping small integer handles to journal
//! instances.
//!
//! The owned [`Journal`](crate::Journal) is the preferred unit of
//! ownership; this table is a thin adapter for FFI-style callers (e.g. a
//! FAT `DiskIO` callback layer that can only carry a small integer per
//! volume). Instantiate one table per disk capability type, typically as a
//! `static`.

use alloc::sync::Arc;

use async_lock::Mutex;
use jrnl_diskio::DiskIo;

use crate::config::{JrnlConfig, VolumeGeometry};
use crate::error::Error;
use crate::journal::Journal;

/// Maximum number of simultaneously mounted journal instances per table.
pub const JRNL_MAX_HANDLES: usize = 8;

/// Opaque journal instance handle. Valid handles are small non-negative
/// integers.
pub type JrnlHandle = i32;

/// Sentinel for a handle that does not reference any instance.
pub const INVALID_HANDLE: JrnlHandle = -1;

fn slot_index<E>(handle: JrnlHandle) -> Result<usize, Error<E>> {
    if handle == INVALID_HANDLE {
        error!("invalid jrnl handle");
        return Err(Error::InvalidState);
    }
    let index = usize::try_from(handle).map_err(|_| Error::InvalidInput)?;
    if index >= JRNL_MAX_HANDLES {
        error!("jrnl handle {} out of range", handle);
        return Err(Error::InvalidInput);
    }
    Ok(index)
}

/// A process-wide table of up to [`JRNL_MAX_HANDLES`] journal instances,
/// guarded by a single lock used only on mount and unmount.
pub struct HandleTable<IO> {
    slots: Mutex<[Option<Arc<Journal<IO>>>; JRNL_MAX_HANDLES]>,
}

impl<IO: DiskIo> HandleTable<IO> {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new([const { None }; JRNL_MAX_HANDLES]),
        }
    }

    /// Mount a journal store (see [`Journal::mount`]) into the first free
    /// slot and return its handle. Fails with `NoMem` when all slots are
    /// taken.
    pub async fn mount(
        &self,
        config: &JrnlConfig,
        volume: VolumeGeometry,
        volume_id: u8,
        io: IO,
    ) -> Result<JrnlHandle, Error<IO::Error>> {
        let mut slots = self.slots.lock().await;

        let Some(index) = slots.iter().position(Option::is_none) else {
            error!("all {} jrnl instance slots already allocated", JRNL_MAX_HANDLES);
            return Err(Error::NoMem);
        };

        let journal = Journal::mount(config, volume, volume_id, io).await?;
        slots[index] = Some(Arc::new(journal));

        trace!("jrnl mount succeeded (handle: {})", index as JrnlHandle);
        Ok(index as JrnlHandle)
    }

    /// Release the slot and destroy the instance.
    ///
    /// Does not flush or finalize an in-progress transaction; callers are
    /// expected to commit or cancel first.
    pub async fn unmount(&self, handle: JrnlHandle) -> Result<(), Error<IO::Error>> {
        trace!("jrnl unmount (handle: {})", handle);
        let mut slots = self.slots.lock().await;

        let index = slot_index(handle)?;
        if slots[index].take().is_none() {
            error!("jrnl instance [{}] not initialized", handle);
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Look up the instance behind `handle`.
    pub async fn get(&self, handle: JrnlHandle) -> Result<Arc<Journal<IO>>, Error<IO::Error>> {
        let slots = self.slots.lock().await;

        let index = slot_index(handle)?;
        slots[index].clone().ok_or_else(|| {
            error!("jrnl instance [{}] not initialized", handle);
            Error::NotFound
        })
    }
}

impl<IO: DiskIo> Default for HandleTable<IO> {
    fn default() -> Self {
        Self::new()
    }
}
