//! A crash-safe write-ahead sector journal implemented in Rust.
//!
//! `jrnl` sits between a file system and a wear-levelled flash partition and
//! makes multi-sector disk mutations atomic with respect to power loss: a
//! transaction either appears fully applied to the target region, or not at
//! all - never partially.
//!
//! The tail of the partition is reserved as the *journal store*: a log of
//! operation records (one header sector plus the payload sectors, both
//! CRC-protected) and a single *master record* sector holding the store
//! geometry, the transaction status and the log tail pointer. While a
//! transaction is open, sector writes are appended to the log; committing
//! persists the `Commit` status and then replays the log onto the target
//! region. Recovery after power loss is driven entirely by the persisted
//! status: an interrupted open transaction is rolled back, an interrupted
//! commit is replayed to completion on the next mount.
//!
//! # Usage
//!
//! ```rust,ignore
//! use jrnl::{Journal, JrnlConfig, VolumeGeometry};
//! use jrnl_ramdisk::RamDisk;
//!
//! let disk = RamDisk::new(4096, 64);
//! let geometry = VolumeGeometry::new(disk.volume_size(), disk.sector_size());
//!
//! // Fresh store; the file system formats the target region via direct I/O
//! let config = JrnlConfig::new().overwrite_existing(true);
//! let journal = Journal::mount(&config, geometry, 0, disk.clone()).await?;
//! journal.write(0, &boot_sector).await?; // passthrough while initializing
//! journal.set_direct_io(false).await?;   // arm the journal
//!
//! // Atomic multi-sector mutation
//! journal.start().await?;
//! journal.write(20, &payload).await?;
//! journal.stop(true).await?;             // commit + replay
//! ```
//!
//! # Threading and Concurrency
//!
//! A journal instance serializes its transactions under an internal async
//! mutex; all methods take `&self`. The design assumes a single logical
//! writer (the file system mounted on top) - concurrent calls are
//! serialized but not expected to interleave at transaction granularity.
//!
//! # Crate features
//!
//! - `std` (default): std support; disable for `no_std` + `alloc` targets
//! - `log` (default) / `defmt`: logging backends
//! - `test-hooks`: runtime power-cut injection for crash-recovery tests

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc
)]

extern crate alloc;

// MUST be the first module listed
mod fmt;

mod config;
mod error;
mod journal;
mod master;
mod record;
mod registry;

#[cfg(feature = "test-hooks")]
mod hooks;

pub use crate::config::{JrnlConfig, VolumeGeometry, DEFAULT_STORE_SECTORS, MIN_STORE_SECTORS};
pub use crate::error::Error;
pub use crate::journal::Journal;
pub use crate::master::{MasterRecord, TransStatus, STORE_MAGIC};
pub use crate::record::{crc32, OpHeader};
pub use crate::registry::{HandleTable, JrnlHandle, INVALID_HANDLE, JRNL_MAX_HANDLES};

#[cfg(feature = "test-hooks")]
pub use crate::hooks::{CrashPoint, TestFlags};
