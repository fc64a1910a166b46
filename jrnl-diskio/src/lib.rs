//! Core disk access abstraction for the jrnl ecosystem.
//!
//! This crate provides the fundamental [`DiskIo`] trait that defines the
//! capability a journal instance needs from the device below it: reading,
//! writing and erasing ranges of a flash-like partition.
//!
//! # Features
//!
//! - `no_std` compatible by default
//! - Async-first design using native async fn in traits
//! - Byte addressing with sector-granular semantics left to the caller
//! - Two trait variants: [`DiskIo`] (single-threaded) and [`SendDiskIo`] (multi-threaded)
//!
//! # Example
//!
//! ```ignore
//! use jrnl_diskio::DiskIo;
//!
//! struct MyPartition;
//!
//! impl DiskIo for MyPartition {
//!     type Error = std::io::Error;
//!
//!     async fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Self::Error> {
//!         // Read implementation
//!         Ok(())
//!     }
//!
//!     async fn write(&mut self, addr: u64, buf: &[u8]) -> Result<(), Self::Error> {
//!         // Write implementation
//!         Ok(())
//!     }
//!
//!     async fn erase_range(&mut self, addr: u64, len: u64) -> Result<(), Self::Error> {
//!         // Erase implementation
//!         Ok(())
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

/// A capability for raw access to a wear-levelled disk partition.
///
/// All addresses are in **bytes** from the start of the partition. Callers
/// (the journal core) only ever issue sector-aligned addresses and sizes
/// that are multiples of the device sector size; implementations may rely
/// on that but should reject violations rather than round.
///
/// `erase_range` models flash semantics: after a successful erase the range
/// reads back as the device's erased pattern and may be rewritten. The
/// journal always erases a range before writing into it, and recovery may
/// erase-then-write the same content repeatedly, so implementations must
/// tolerate both.
///
/// # Thread Safety
///
/// This trait generates two variants via [`trait_variant::make`]:
/// - [`DiskIo`] - For single-threaded or `no_std` embedded contexts (no `Send` requirement)
/// - [`SendDiskIo`] - For multi-threaded contexts where futures must be `Send`
///
/// When using with async runtimes that require `Send` futures, use
/// [`SendDiskIo`] as your trait bound instead.
#[trait_variant::make(SendDiskIo: Send)]
pub trait DiskIo {
    /// The error type for the DiskIo implementation.
    type Error: core::fmt::Debug;

    /// Read `buf.len()` bytes starting at byte address `addr`.
    async fn read(&mut self, addr: u64, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Write `buf` starting at byte address `addr`.
    ///
    /// The destination range is expected to have been erased beforehand.
    async fn write(&mut self, addr: u64, buf: &[u8]) -> Result<(), Self::Error>;

    /// Erase `len` bytes starting at byte address `addr`.
    ///
    /// Both `addr` and `len` are multiples of the device sector size.
    async fn erase_range(&mut self, addr: u64, len: u64) -> Result<(), Self::Error>;
}

/// Byte address of a zero-indexed sector.
#[must_use]
pub const fn sector_addr(sector: u32, sector_size: u32) -> u64 {
    sector as u64 * sector_size as u64
}

/// Byte length of a span of `count` sectors.
#[must_use]
pub const fn sector_span(count: u32, sector_size: u32) -> u64 {
    count as u64 * sector_size as u64
}
