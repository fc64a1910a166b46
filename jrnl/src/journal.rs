//! The journal instance: transaction state machine, write router and
//! log replayer.

use alloc::vec;
use alloc::vec::Vec;

use async_lock::Mutex;
use jrnl_diskio::{sector_addr, sector_span, DiskIo};

use crate::config::{JrnlConfig, VolumeGeometry, MIN_STORE_SECTORS};
use crate::error::Error;
#[cfg(feature = "test-hooks")]
use crate::hooks::{CrashPoint, TestFlags, TestHooks};
use crate::master::{MasterRecord, TransStatus, STORE_MAGIC};
use crate::record::{crc32, OpHeader};

/// Mutable instance state, guarded by the transaction lock.
#[derive(Debug)]
struct Inner<IO> {
    io: IO,
    master: MasterRecord,
    #[cfg(feature = "test-hooks")]
    hooks: TestHooks,
}

impl<IO: DiskIo> Inner<IO> {
    fn sector_size(&self) -> u32 {
        self.master.volume.sector_size
    }

    /// Byte address of a journal store sector on the parent volume.
    fn store_addr(&self, store_sector: u32) -> u64 {
        sector_addr(
            self.master.store_volume_offset_sector + store_sector,
            self.sector_size(),
        )
    }

    fn check_store_span(&self, store_sector: u32, len: usize) -> Result<(), Error<IO::Error>> {
        let sectors = (len / self.sector_size() as usize) as u64;
        if u64::from(store_sector) + sectors > u64::from(self.master.store_size_sectors) {
            return Err(Error::InvalidInput);
        }
        Ok(())
    }

    /// Read `buf.len()` bytes from the store starting at `store_sector`.
    async fn store_read(
        &mut self,
        store_sector: u32,
        buf: &mut [u8],
    ) -> Result<(), Error<IO::Error>> {
        self.check_store_span(store_sector, buf.len())?;
        let addr = self.store_addr(store_sector);
        self.io.read(addr, buf).await?;
        Ok(())
    }

    /// Erase-then-write `buf` into the store starting at `store_sector`.
    async fn store_write(&mut self, store_sector: u32, buf: &[u8]) -> Result<(), Error<IO::Error>> {
        self.check_store_span(store_sector, buf.len())?;
        let addr = self.store_addr(store_sector);
        self.io.erase_range(addr, buf.len() as u64).await?;
        self.io.write(addr, buf).await?;
        Ok(())
    }

    /// Persist the cached master record. This is the atomic step of every
    /// state transition.
    async fn update_master(&mut self) -> Result<(), Error<IO::Error>> {
        debug!(
            "updating jrnl master record (status: {})",
            self.master.status.as_str()
        );
        let mut buf = vec![0u8; self.sector_size() as usize];
        self.master.encode(&mut buf);
        let master_sector = self.master.store_size_sectors - 1;
        self.store_write(master_sector, &buf).await
    }

    /// Reset the master to an empty log with the given access mode and
    /// persist it. Geometry fields are left untouched.
    async fn reset_master(&mut self, fs_direct: bool) -> Result<(), Error<IO::Error>> {
        trace!("resetting jrnl master record");
        self.master.magic = STORE_MAGIC;
        self.master.next_free_sector = 0;
        self.master.status = if fs_direct {
            TransStatus::FsDirect
        } else {
            TransStatus::Ready
        };
        self.update_master().await
    }

    /// Append one operation record (header sector + `count` payload
    /// sectors) to the log tail.
    async fn append(
        &mut self,
        target_sector: u32,
        count: u32,
        buf: &[u8],
    ) -> Result<(), Error<IO::Error>> {
        // operation footprint: header sector + count data sectors
        if u64::from(self.master.next_free_sector) + 1 + u64::from(count)
            >= u64::from(self.master.store_size_sectors - 1)
        {
            error!("jrnl write refused: not enough journal store space left");
            return Err(Error::NoMem);
        }

        let sector_size = self.sector_size();
        let mut header = vec![0u8; sector_size as usize];
        OpHeader::new(target_sector, count, crc32(buf)).encode(&mut header);

        trace!(
            "logging jrnl operation (target sector {}, {} sectors)",
            target_sector,
            count
        );

        // Header and payload must be on media before the tail pointer
        // moves; the master update below is the linearization point.
        let addr = self.store_addr(self.master.next_free_sector);
        self.io
            .erase_range(addr, sector_span(1 + count, sector_size))
            .await?;
        self.io.write(addr, &header).await?;
        self.io.write(addr + u64::from(sector_size), buf).await?;

        self.master.next_free_sector += 1 + count;
        self.update_master().await
    }

    /// Apply all operations stored in the log, in order, then reset the
    /// master. Invoked on commit and during mount-time recovery.
    async fn replay(&mut self) -> Result<(), Error<IO::Error>> {
        trace!("replaying journaled log");

        // clean possibly uncommitted transactions
        match self.master.status {
            TransStatus::Ready | TransStatus::FsDirect => {
                debug!("jrnl replay: journaling log empty");
                return Ok(());
            }
            TransStatus::Open => {
                debug!("jrnl replay: found unfinished transaction, cleaning journaling log");
                return self.reset_master(false).await;
            }
            TransStatus::Commit => {}
        }

        let sector_size = self.sector_size();
        let mut header = vec![0u8; sector_size as usize];
        let mut cursor = 0u32;
        while cursor < self.master.next_free_sector {
            self.store_read(cursor, &mut header).await?;
            let Some(op) = OpHeader::decode(&header) else {
                error!("jrnl replay: operation header checksum mismatch");
                return Err(Error::InvalidCrc);
            };

            let mut data = vec![0u8; op.sector_count as usize * sector_size as usize];
            self.store_read(cursor + 1, &mut data).await?;
            if crc32(&data) != op.crc32_data {
                error!("jrnl replay: operation data checksum mismatch");
                return Err(Error::InvalidCrc);
            }

            // copy the data back to its original location
            let target_addr = sector_addr(op.target_sector, sector_size);
            self.io.erase_range(target_addr, data.len() as u64).await?;
            #[cfg(feature = "test-hooks")]
            if self.power_cut(TestFlags::REPLAY_ERASE_AND_EXIT, CrashPoint::ReplayErase) {
                return Ok(());
            }

            self.io.write(target_addr, &data).await?;
            #[cfg(feature = "test-hooks")]
            if self.power_cut(TestFlags::REPLAY_WRITE_AND_EXIT, CrashPoint::ReplayWrite) {
                return Ok(());
            }

            cursor += 1 + op.sector_count;
        }

        #[cfg(feature = "test-hooks")]
        if self.power_cut(
            TestFlags::REPLAY_EXIT_BEFORE_CLOSE,
            CrashPoint::ReplayBeforeClose,
        ) {
            return Ok(());
        }

        self.reset_master(false).await
    }

    /// Power-off emulation: interrupt only once data sits in the journal.
    #[cfg(feature = "test-hooks")]
    fn power_cut(&self, flag: TestFlags, point: CrashPoint) -> bool {
        self.master.next_free_sector > 0 && self.hooks.power_cut(flag, point)
    }
}

/// A mounted journal instance for one wear-levelled partition.
///
/// The instance owns the disk capability and serializes all operations
/// under an internal transaction lock; methods take `&self` so the journal
/// can sit behind an `Arc` shared with a file-system adapter. See the
/// [crate docs](crate) for the transaction lifecycle.
#[derive(Debug)]
pub struct Journal<IO> {
    volume_id: u8,
    sector_size: u32,
    fs_sector_count: u32,
    inner: Mutex<Inner<IO>>,
}

impl<IO: DiskIo> Journal<IO> {
    /// Mount a journal store on `io`, checking for a previously created
    /// log and possibly applying the operations found in it.
    ///
    /// Unless `config` requests a fresh store, the master sector is read
    /// back first: a valid record must match the configured geometry
    /// (`InvalidState` otherwise) and, with `replay_journal_after_mount`
    /// set, an interrupted transaction is rolled back or replayed before
    /// the mount completes. The master is then re-initialized and
    /// persisted with status `FsDirect` (fresh store) or `Ready`.
    ///
    /// `volume_id` is an opaque tag for the file-system adapter above; the
    /// journal only reports it back via [`Journal::volume_id`].
    pub async fn mount(
        config: &JrnlConfig,
        volume: VolumeGeometry,
        volume_id: u8,
        mut io: IO,
    ) -> Result<Self, Error<IO::Error>> {
        trace!("mounting journaling store...");

        let sector_size = volume.sector_size;
        if config.store_size_sectors < MIN_STORE_SECTORS
            || (sector_size as usize) < MasterRecord::ENCODED_LEN
        {
            return Err(Error::InvalidInput);
        }
        // the store must leave at least one target sector below it
        let total_sectors = volume.total_sectors();
        if total_sectors <= u64::from(config.store_size_sectors)
            || total_sectors > u64::from(u32::MAX)
        {
            return Err(Error::InvalidInput);
        }

        let fresh = config.needs_fresh_store();
        let mut master = MasterRecord::init(volume, config.store_size_sectors, TransStatus::Ready);
        let mut found_existing = false;

        if !fresh {
            // master record lives in the last sector of the volume
            let mut buf = vec![0u8; sector_size as usize];
            io.read(volume.volume_size - u64::from(sector_size), &mut buf)
                .await?;

            if MasterRecord::has_magic(&buf) {
                trace!("found journal record, verifying consistency...");
                let Some(found) = MasterRecord::decode(&buf) else {
                    error!("journal master record unreadable (record corrupted?)");
                    return Err(Error::InvalidState);
                };
                if found.volume != volume
                    || found.store_size_sectors != config.store_size_sectors
                {
                    error!("journaling configuration inconsistent with found master record");
                    return Err(Error::InvalidState);
                }
                master = found;
                found_existing = true;
            } else {
                trace!("no valid journaling record found");
            }
        }

        let mut inner = Inner {
            io,
            master,
            #[cfg(feature = "test-hooks")]
            hooks: TestHooks::default(),
        };

        if found_existing && config.replay_journal_after_mount {
            // repeat an interrupted transaction, if any
            inner.replay().await?;
            trace!("journaling store successfully resumed from disk");
        }

        trace!("creating fresh journaling store...");
        inner.master = MasterRecord::init(volume, config.store_size_sectors, TransStatus::Ready);
        inner.reset_master(fresh).await?;

        Ok(Self {
            volume_id,
            sector_size,
            fs_sector_count: inner.master.store_volume_offset_sector,
            inner: Mutex::new(inner),
        })
    }

    /// Open a new transaction. Requires status `Ready` (empty log);
    /// subsequent [`Journal::write`] calls are appended to the log until
    /// [`Journal::stop`].
    pub async fn start(&self) -> Result<(), Error<IO::Error>> {
        let mut inner = self.inner.lock().await;

        #[cfg(feature = "test-hooks")]
        if inner.hooks.suspended() {
            debug!("jrnl start suspended");
            return Ok(());
        }

        debug!("jrnl start (current status: {})", inner.master.status.as_str());
        if inner.master.status != TransStatus::Ready {
            error!(
                "can't open a new journaling transaction (status: {})",
                inner.master.status.as_str()
            );
            return Err(Error::InvalidState);
        }
        debug_assert_eq!(inner.master.next_free_sector, 0);

        inner.master.status = TransStatus::Open;
        inner.update_master().await
    }

    /// Close the running transaction: cancel it (`commit == false`,
    /// discarding the log), or persist status `Commit` and replay the log
    /// onto the target region. Requires status `Open`.
    pub async fn stop(&self, commit: bool) -> Result<(), Error<IO::Error>> {
        let mut inner = self.inner.lock().await;

        #[cfg(feature = "test-hooks")]
        if inner.hooks.suspended() {
            debug!("jrnl stop suspended");
            return Ok(());
        }

        debug!("jrnl stop (commit: {})", commit);
        if inner.master.status != TransStatus::Open {
            error!("journaling transaction not open");
            return Err(Error::InvalidState);
        }

        if !commit {
            trace!("canceling current jrnl transaction");
            return inner.reset_master(false).await;
        }

        #[cfg(feature = "test-hooks")]
        if inner.power_cut(TestFlags::STOP_SKIP_COMMIT, CrashPoint::StopSkipCommit) {
            return Ok(());
        }

        trace!("committing current jrnl transaction");
        inner.master.status = TransStatus::Commit;
        inner.update_master().await?;

        #[cfg(feature = "test-hooks")]
        if inner.power_cut(TestFlags::STOP_SET_COMMIT_AND_EXIT, CrashPoint::StopSetCommit) {
            return Ok(());
        }

        // transfer the logged operations to the target disk
        inner.replay().await
    }

    /// Switch between direct disk access (`FsDirect`) and journaled access
    /// (`Ready`). Only valid while no transaction is in flight.
    ///
    /// Direct access bypasses the journaling mechanism entirely; it exists
    /// for file-system mounting, formatting and similar maintenance, and
    /// should not be used while the volume holds data worth protecting.
    pub async fn set_direct_io(&self, direct: bool) -> Result<(), Error<IO::Error>> {
        let mut inner = self.inner.lock().await;
        trace!("jrnl set_direct_io (on: {})", direct);

        // access mode switching cannot happen during a transaction lifetime
        if inner.master.status != TransStatus::FsDirect
            && inner.master.status != TransStatus::Ready
        {
            return Err(Error::InvalidState);
        }
        inner.master.status = if direct {
            TransStatus::FsDirect
        } else {
            TransStatus::Ready
        };
        inner.update_master().await
    }

    /// Write `buf` (a non-zero multiple of the sector size) to the target
    /// disk starting at `sector` - the write router.
    ///
    /// With a transaction open the data goes to the journal store, one
    /// extra header sector per call (`NoMem` when the log cannot hold the
    /// operation). Under `FsDirect` the write passes straight through to
    /// the target. Any other status fails with `InvalidState` - the
    /// router never guesses.
    pub async fn write(&self, sector: u32, buf: &[u8]) -> Result<(), Error<IO::Error>> {
        let mut inner = self.inner.lock().await;

        let sector_size = inner.sector_size();
        if buf.is_empty() || buf.len() % sector_size as usize != 0 {
            return Err(Error::InvalidInput);
        }
        let count = (buf.len() / sector_size as usize) as u32;

        match inner.master.status {
            TransStatus::FsDirect => {
                trace!("jrnl write: direct write ({} sectors at {})", count, sector);
                let addr = sector_addr(sector, sector_size);
                inner.io.erase_range(addr, buf.len() as u64).await?;
                inner.io.write(addr, buf).await?;
                Ok(())
            }
            TransStatus::Open => inner.append(sector, count, buf).await,
            _ => {
                // any other case must fail to avoid journal corruption
                error!(
                    "jrnl write refused under status {}",
                    inner.master.status.as_str()
                );
                Err(Error::InvalidState)
            }
        }
    }

    /// Read `buf.len()` bytes from the target region starting at `sector`.
    ///
    /// A plain redirection to the underlying partition read, bounded to
    /// the sectors exposed to the file system; the log is never consulted.
    pub async fn read(&self, sector: u32, buf: &mut [u8]) -> Result<(), Error<IO::Error>> {
        let mut inner = self.inner.lock().await;

        let sector_size = inner.sector_size();
        if buf.is_empty() || buf.len() % sector_size as usize != 0 {
            return Err(Error::InvalidInput);
        }
        let count = (buf.len() / sector_size as usize) as u64;
        if u64::from(sector) + count > u64::from(inner.master.store_volume_offset_sector) {
            return Err(Error::InvalidInput);
        }

        inner.io.read(sector_addr(sector, sector_size), buf).await?;
        Ok(())
    }

    /// Target disk sector count, i.e. the sectors available to the file
    /// system above (the journal store is not included).
    #[must_use]
    pub fn sector_count(&self) -> u32 {
        self.fs_sector_count
    }

    /// Target disk sector size in bytes.
    #[must_use]
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Opaque file-system volume tag supplied at mount.
    #[must_use]
    pub fn volume_id(&self) -> u8 {
        self.volume_id
    }

    /// Copy of the cached master record, for diagnostics and adapters.
    pub async fn master_record(&self) -> MasterRecord {
        self.inner.lock().await.master
    }

    /// Current transaction status.
    pub async fn status(&self) -> TransStatus {
        self.inner.lock().await.master.status
    }

    /// Decode the headers of all operations currently sitting in the log,
    /// in order. Fails with `InvalidCrc` on a corrupted header.
    pub async fn log_entries(&self) -> Result<Vec<OpHeader>, Error<IO::Error>> {
        let mut inner = self.inner.lock().await;

        let mut buf = vec![0u8; inner.sector_size() as usize];
        let mut entries = Vec::new();
        let mut cursor = 0u32;
        while cursor < inner.master.next_free_sector {
            inner.store_read(cursor, &mut buf).await?;
            let Some(op) = OpHeader::decode(&buf) else {
                return Err(Error::InvalidCrc);
            };
            cursor += 1 + op.sector_count;
            entries.push(op);
        }
        Ok(entries)
    }

    /// Destroy the instance and hand the disk capability back.
    ///
    /// Like unmounting, this does not finalize an in-progress transaction;
    /// commit or cancel first.
    #[must_use]
    pub fn release(self) -> IO {
        self.inner.into_inner().io
    }
}

#[cfg(feature = "test-hooks")]
impl<IO: DiskIo> Journal<IO> {
    /// Replace the runtime test flag word.
    pub async fn set_test_flags(&self, flags: TestFlags) {
        self.inner.lock().await.hooks.flags = flags;
    }

    /// Current runtime test flag word.
    pub async fn test_flags(&self) -> TestFlags {
        self.inner.lock().await.hooks.flags
    }

    /// Install the power-cut callback invoked at armed injection points.
    pub async fn on_power_cut(&self, hook: impl Fn(CrashPoint) + Send + 'static) {
        self.inner.lock().await.hooks.on_power_cut = Some(alloc::boxed::Box::new(hook));
    }
}
