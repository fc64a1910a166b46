//! Operation records: one log entry per intercepted `disk_write`, a header
//! sector followed by the payload sectors verbatim.

use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 used for all journal checksums (standard reflected CRC-32,
/// seed all-ones).
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Header of one journaled operation.
///
/// On-disk layout at the log sector start (little-endian, 16 bytes):
/// - Target sector (4 bytes): first sector of the sequence in the target region
/// - Sector count (4 bytes): payload sectors that follow the header
/// - Data CRC (4 bytes): CRC-32 over all payload bytes in order
/// - Header CRC (4 bytes): CRC-32 over the 12 bytes above
///
/// The remainder of the header sector is zeroed on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OpHeader {
    /// First target sector of the journaled write.
    pub target_sector: u32,
    /// Number of payload sectors.
    pub sector_count: u32,
    /// Checksum of the payload.
    pub crc32_data: u32,
}

impl OpHeader {
    /// Encoded length, including the trailing header checksum.
    pub const ENCODED_LEN: usize = 16;
    const CRC_COVERED_LEN: usize = 12;

    /// Describe a write of `sector_count` sectors at `target_sector` whose
    /// payload checksum is `crc32_data`.
    #[must_use]
    pub fn new(target_sector: u32, sector_count: u32, crc32_data: u32) -> Self {
        Self {
            target_sector,
            sector_count,
            crc32_data,
        }
    }

    /// Serialize into `buf` (at least one sector), appending the header
    /// checksum; bytes past the record are zeroed.
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`Self::ENCODED_LEN`].
    pub fn encode(&self, buf: &mut [u8]) {
        buf.fill(0);
        buf[0..4].copy_from_slice(&self.target_sector.to_le_bytes());
        buf[4..8].copy_from_slice(&self.sector_count.to_le_bytes());
        buf[8..12].copy_from_slice(&self.crc32_data.to_le_bytes());
        let crc32_header = crc32(&buf[..Self::CRC_COVERED_LEN]);
        buf[12..16].copy_from_slice(&crc32_header.to_le_bytes());
    }

    /// Deserialize from the start of a header sector, verifying the header
    /// checksum. Returns `None` on mismatch.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::ENCODED_LEN {
            return None;
        }
        let le_u32 = |at: usize| u32::from_le_bytes(buf[at..at + 4].try_into().unwrap());
        if crc32(&buf[..Self::CRC_COVERED_LEN]) != le_u32(12) {
            return None;
        }
        Some(Self {
            target_sector: le_u32(0),
            sector_count: le_u32(4),
            crc32_data: le_u32(8),
        })
    }
}
