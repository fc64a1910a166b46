//! Mount configuration and volume geometry.

/// Minimum applicable journal store size in sectors (master + header + data).
pub const MIN_STORE_SECTORS: u32 = 3;

/// Default journal store size in sectors.
pub const DEFAULT_STORE_SECTORS: u32 = 32;

/// User configuration for [`Journal::mount`](crate::Journal::mount).
///
/// Built in the builder style:
///
/// ```rust
/// use jrnl::JrnlConfig;
///
/// let config = JrnlConfig::new()
///     .overwrite_existing(true)
///     .store_size_sectors(16);
/// ```
#[derive(Debug, Clone)]
pub struct JrnlConfig {
    pub(crate) overwrite_existing: bool,
    pub(crate) replay_journal_after_mount: bool,
    pub(crate) force_fs_format: bool,
    pub(crate) store_size_sectors: u32,
}

impl Default for JrnlConfig {
    fn default() -> Self {
        Self {
            overwrite_existing: false,
            replay_journal_after_mount: true,
            force_fs_format: false,
            store_size_sectors: DEFAULT_STORE_SECTORS,
        }
    }
}

impl JrnlConfig {
    /// Default configuration: keep an existing store, replay it on mount,
    /// 32 store sectors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore any existing master record and create a fresh store.
    #[must_use]
    pub fn overwrite_existing(mut self, overwrite: bool) -> Self {
        self.overwrite_existing = overwrite;
        self
    }

    /// Apply an unfinished-commit transaction found during mount.
    #[must_use]
    pub fn replay_journal_after_mount(mut self, replay: bool) -> Self {
        self.replay_journal_after_mount = replay;
        self
    }

    /// Signal the file-system collaborator to reformat. Implies
    /// fresh-store semantics for the journal itself.
    #[must_use]
    pub fn force_fs_format(mut self, format: bool) -> Self {
        self.force_fs_format = format;
        self
    }

    /// Journal store size in sectors, deducted from the partition end.
    /// Must be at least [`MIN_STORE_SECTORS`].
    #[must_use]
    pub fn store_size_sectors(mut self, sectors: u32) -> Self {
        self.store_size_sectors = sectors;
        self
    }

    /// True when the mount must ignore on-disk state and start fresh.
    pub(crate) fn needs_fresh_store(&self) -> bool {
        self.force_fs_format || self.overwrite_existing
    }
}

/// Geometry of the journaled disk volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeGeometry {
    /// Partition space in bytes available to the journal and the file
    /// system together (wear-levelling overhead already deducted).
    pub volume_size: u64,
    /// Disk sector size in bytes.
    pub sector_size: u32,
}

impl VolumeGeometry {
    /// Describe a volume of `volume_size` bytes with `sector_size` sectors.
    #[must_use]
    pub fn new(volume_size: u64, sector_size: u32) -> Self {
        Self {
            volume_size,
            sector_size,
        }
    }

    /// Total sector count of the volume.
    #[must_use]
    pub fn total_sectors(&self) -> u64 {
        self.volume_size / u64::from(self.sector_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = JrnlConfig::new();
        assert!(!config.overwrite_existing);
        assert!(config.replay_journal_after_mount);
        assert!(!config.force_fs_format);
        assert_eq!(config.store_size_sectors, DEFAULT_STORE_SECTORS);
        assert!(!config.needs_fresh_store());
    }

    #[test]
    fn test_fresh_store_flags() {
        assert!(JrnlConfig::new().overwrite_existing(true).needs_fresh_store());
        assert!(JrnlConfig::new().force_fs_format(true).needs_fresh_store());
    }

    #[test]
    fn test_total_sectors() {
        let volume = VolumeGeometry::new(64 * 4096, 4096);
        assert_eq!(volume.total_sectors(), 64);
    }
}
