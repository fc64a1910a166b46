//! RAM-backed flash partition simulator for the jrnl ecosystem.
//!
//! [`RamDisk`] stands in for a wear-levelled flash partition in tests and
//! examples: byte-addressed like the real capability, erased state `0xFF`,
//! sector-aligned erases, strict bounds checking.
//!
//! Handles are cheap clones sharing one backing store, so a test can keep a
//! view of the media while a journal instance owns another - dropping the
//! instance "powers off the board" without losing the disk contents. Use
//! [`RamDisk::duplicate`] to fork an independent deep copy of the current
//! state when a crash scenario must be replayed more than once.

#![warn(missing_docs)]

use std::sync::{Arc, Mutex};

use jrnl_diskio::DiskIo;

/// Error type for [`RamDisk`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamDiskError {
    /// Access past the end of the simulated partition.
    OutOfRange,
    /// Erase address or length not aligned to the sector size.
    Unaligned,
}

impl core::fmt::Display for RamDiskError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RamDiskError::OutOfRange => write!(f, "access out of partition range"),
            RamDiskError::Unaligned => write!(f, "erase range not sector aligned"),
        }
    }
}

impl std::error::Error for RamDiskError {}

#[derive(Debug)]
struct Backing {
    sector_size: u32,
    data: Vec<u8>,
}

/// An in-memory flash partition.
///
/// Cloning returns another handle to the same backing store (the moral
/// equivalent of a `wl_handle` copy); the media outlives any single owner.
#[derive(Clone, Debug)]
pub struct RamDisk {
    backing: Arc<Mutex<Backing>>,
}

impl RamDisk {
    /// Create a partition of `sector_count` sectors, fully erased (`0xFF`).
    ///
    /// # Panics
    ///
    /// Panics if `sector_size` or `sector_count` is zero.
    #[must_use]
    pub fn new(sector_size: u32, sector_count: u32) -> Self {
        assert!(sector_size > 0 && sector_count > 0);
        let size = sector_size as usize * sector_count as usize;
        Self {
            backing: Arc::new(Mutex::new(Backing {
                sector_size,
                data: vec![0xFF; size],
            })),
        }
    }

    /// Sector size in bytes.
    #[must_use]
    pub fn sector_size(&self) -> u32 {
        self.backing.lock().unwrap().sector_size
    }

    /// Total partition size in bytes.
    #[must_use]
    pub fn volume_size(&self) -> u64 {
        self.backing.lock().unwrap().data.len() as u64
    }

    /// Copy of the whole partition contents.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.backing.lock().unwrap().data.clone()
    }

    /// Copy of a single sector's contents.
    ///
    /// # Panics
    ///
    /// Panics if `sector` is out of range.
    #[must_use]
    pub fn sector(&self, sector: u32) -> Vec<u8> {
        let backing = self.backing.lock().unwrap();
        let size = backing.sector_size as usize;
        let start = sector as usize * size;
        backing.data[start..start + size].to_vec()
    }

    /// Fork an independent deep copy of the current media state.
    ///
    /// Unlike [`Clone::clone`], the returned disk has its own backing store;
    /// crash-recovery tests use this to replay the same pre-crash image
    /// several times.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let backing = self.backing.lock().unwrap();
        Self {
            backing: Arc::new(Mutex::new(Backing {
                sector_size: backing.sector_size,
                data: backing.data.clone(),
            })),
        }
    }

    fn check_range(backing: &Backing, addr: u64, len: u64) -> Result<(), RamDiskError> {
        let end = addr.checked_add(len).ok_or(RamDiskError::OutOfRange)?;
        if end > backing.data.len() as u64 {
            return Err(RamDiskError::OutOfRange);
        }
        Ok(())
    }
}

impl DiskIo for RamDisk {
    type Error = RamDiskError;

    async fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
        let backing = self.backing.lock().unwrap();
        Self::check_range(&backing, addr, buf.len() as u64)?;
        let start = addr as usize;
        buf.copy_from_slice(&backing.data[start..start + buf.len()]);
        Ok(())
    }

    async fn write(&mut self, addr: u64, buf: &[u8]) -> Result<(), Self::Error> {
        let mut backing = self.backing.lock().unwrap();
        Self::check_range(&backing, addr, buf.len() as u64)?;
        let start = addr as usize;
        backing.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    async fn erase_range(&mut self, addr: u64, len: u64) -> Result<(), Self::Error> {
        let mut backing = self.backing.lock().unwrap();
        Self::check_range(&backing, addr, len)?;
        let sector_size = u64::from(backing.sector_size);
        if addr % sector_size != 0 || len % sector_size != 0 {
            return Err(RamDiskError::Unaligned);
        }
        let start = addr as usize;
        backing.data[start..start + len as usize].fill(0xFF);
        Ok(())
    }
}
