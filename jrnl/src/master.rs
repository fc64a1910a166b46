//! The on-disk master record: one sector at the end of the journal store
//! holding identity, geometry, transaction status and the log tail pointer.

use crate::config::VolumeGeometry;

/// Journal store identifier, first 32 bits of the master sector.
pub const STORE_MAGIC: u32 = 0x6A6B_6C6D;

/// Journaling transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum TransStatus {
    /// The file system is being mounted/formatted on the journaled volume;
    /// writes bypass the journal (direct I/O).
    FsDirect = 0,
    /// Journal armed, log empty, no transaction in progress.
    Ready = 1,
    /// A transaction is running; writes are appended to the log.
    Open = 2,
    /// Commit in progress; log contents are being copied to the target.
    Commit = 3,
}

impl TransStatus {
    fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(TransStatus::FsDirect),
            1 => Some(TransStatus::Ready),
            2 => Some(TransStatus::Open),
            3 => Some(TransStatus::Commit),
            _ => None,
        }
    }

    /// Human-readable status name for log output.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransStatus::FsDirect => "Initialize/FS-direct",
            TransStatus::Ready => "Ready",
            TransStatus::Open => "Open",
            TransStatus::Commit => "Commit",
        }
    }
}

/// The journal store master record. One instance per journaled partition,
/// stored in the last sector of the store.
///
/// On-disk layout (little-endian, packed at sector start, 32 bytes):
/// - Magic (4 bytes): [`STORE_MAGIC`]
/// - Store size (4 bytes): journal store size in sectors
/// - Store offset (4 bytes): index of the first store sector in the volume
/// - Next free sector (4 bytes): log tail, relative to the store start
/// - Status (4 bytes): [`TransStatus`]
/// - Volume size (8 bytes)
/// - Sector size (4 bytes)
///
/// The remainder of the sector is zeroed on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterRecord {
    /// Store identification stamp, [`STORE_MAGIC`] once initialized.
    pub magic: u32,
    /// Size of the journal store in sectors (log + master).
    pub store_size_sectors: u32,
    /// Index of the first store sector within the volume; equals the
    /// sector count available to the file system.
    pub store_volume_offset_sector: u32,
    /// Offset of the next free log slot within the store, in sectors.
    /// Zero means the log is empty.
    pub next_free_sector: u32,
    /// Current transaction status.
    pub status: TransStatus,
    /// Disk volume properties, copied from the mount geometry.
    pub volume: VolumeGeometry,
}

impl MasterRecord {
    /// Encoded length of the record at the start of the master sector.
    pub const ENCODED_LEN: usize = 32;

    /// Build a record for a store of `store_size_sectors` at the end of
    /// `volume`, with an empty log and the given status.
    pub(crate) fn init(volume: VolumeGeometry, store_size_sectors: u32, status: TransStatus) -> Self {
        let offset = volume.total_sectors() as u32 - store_size_sectors;
        Self {
            magic: STORE_MAGIC,
            store_size_sectors,
            store_volume_offset_sector: offset,
            next_free_sector: 0,
            status,
            volume,
        }
    }

    /// Serialize into `buf` (at least one sector); bytes past the record
    /// are zeroed so the master sector never carries stale contents.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`Self::ENCODED_LEN`].
    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.store_size_sectors.to_le_bytes());
        buf[8..12].copy_from_slice(&self.store_volume_offset_sector.to_le_bytes());
        buf[12..16].copy_from_slice(&self.next_free_sector.to_le_bytes());
        buf[16..20].copy_from_slice(&(self.status as u32).to_le_bytes());
        buf[20..28].copy_from_slice(&self.volume.volume_size.to_le_bytes());
        buf[28..32].copy_from_slice(&self.volume.sector_size.to_le_bytes());
    }

    /// Check for the store identification stamp without decoding.
    #[must_use]
    pub fn has_magic(buf: &[u8]) -> bool {
        buf.len() >= 4 && buf[0..4] == STORE_MAGIC.to_le_bytes()
    }

    /// Deserialize from the start of a master sector.
    ///
    /// Returns `None` when the magic is absent or the status field does not
    /// name a known state (a corrupted or foreign record).
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::ENCODED_LEN || !Self::has_magic(buf) {
            return None;
        }
        let le_u32 = |at: usize| u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        let status = TransStatus::from_u32(le_u32(16))?;
        Some(Self {
            magic: le_u32(0),
            store_size_sectors: le_u32(4),
            store_volume_offset_sector: le_u32(8),
            next_free_sector: le_u32(12),
            status,
            volume: VolumeGeometry {
                volume_size: u64::from_le_bytes(buf[20..28].try_into().unwrap()),
                sector_size: le_u32(28),
            },
        })
    }
}
