//! Mount-time recovery tests: rollback of interrupted transactions,
//! roll-forward of interrupted commits, replay idempotence and checksum
//! verification.
//!
//! Power loss is simulated by dropping the journal instance (the media
//! lives on in the shared [`RamDisk`] backing) or by forking the disk with
//! an edited master record, standing in for a crash between two disk
//! operations.

use jrnl::{Error, Journal, JrnlConfig, MasterRecord, TransStatus, VolumeGeometry};
use jrnl_diskio::DiskIo;
use jrnl_ramdisk::RamDisk;

const SECTOR_SIZE: u32 = 4096;
const DISK_SECTORS: u32 = 64;
const STORE_SECTORS: u32 = 16;
const FS_SECTORS: u32 = DISK_SECTORS - STORE_SECTORS;

fn test_disk() -> RamDisk {
    let _ = env_logger::builder().is_test(true).try_init();
    RamDisk::new(SECTOR_SIZE, DISK_SECTORS)
}

fn pattern_sectors(count: usize) -> Vec<u8> {
    b"ABCDEFGHABCDEFGH"
        .iter()
        .copied()
        .cycle()
        .take(count * SECTOR_SIZE as usize)
        .collect()
}

fn read_master(disk: &RamDisk) -> MasterRecord {
    MasterRecord::decode(&disk.sector(DISK_SECTORS - 1)).expect("valid master record on disk")
}

/// Rewrite the on-disk master with `status`, emulating the exact crash
/// point right after that status was persisted.
async fn force_status(disk: &RamDisk, status: TransStatus) {
    let mut master = read_master(disk);
    master.status = status;
    let mut buf = vec![0u8; SECTOR_SIZE as usize];
    master.encode(&mut buf);
    let addr = u64::from(DISK_SECTORS - 1) * u64::from(SECTOR_SIZE);
    let mut raw = disk.clone();
    raw.erase_range(addr, u64::from(SECTOR_SIZE)).await.unwrap();
    raw.write(addr, &buf).await.unwrap();
}

async fn mount(disk: &RamDisk) -> Result<Journal<RamDisk>, Error<jrnl_ramdisk::RamDiskError>> {
    let volume = VolumeGeometry::new(disk.volume_size(), disk.sector_size());
    Journal::mount(
        &JrnlConfig::new().store_size_sectors(STORE_SECTORS),
        volume,
        0,
        disk.clone(),
    )
    .await
}

/// Build a disk whose journal holds one logged write of `pattern` to
/// `target`, with an open (uncommitted) transaction, then "power off".
async fn crash_with_open_transaction(target: u32, baseline: &[u8], pattern: &[u8]) -> RamDisk {
    let disk = test_disk();
    let journal = mount(&disk).await.unwrap();

    journal.set_direct_io(true).await.unwrap();
    journal.write(target, baseline).await.unwrap();
    journal.set_direct_io(false).await.unwrap();

    journal.start().await.unwrap();
    journal.write(target, pattern).await.unwrap();
    drop(journal); // power loss before stop()

    disk
}

#[tokio::test]
async fn test_rollback_after_open_crash() -> anyhow::Result<()> {
    let baseline = vec![0x5A; SECTOR_SIZE as usize];
    let pattern = pattern_sectors(1);
    let disk = crash_with_open_transaction(12, &baseline, &pattern).await;

    assert_eq!(read_master(&disk).status, TransStatus::Open);

    // remount with replay rolls the unfinished transaction back
    let journal = mount(&disk).await?;
    let mut readback = vec![0u8; SECTOR_SIZE as usize];
    journal.read(12, &mut readback).await?;
    assert_eq!(readback, baseline);

    let master = read_master(&disk);
    assert_eq!(master.status, TransStatus::Ready);
    assert_eq!(master.next_free_sector, 0);
    Ok(())
}

#[tokio::test]
async fn test_roll_forward_after_commit_crash() -> anyhow::Result<()> {
    let baseline = vec![0x5A; SECTOR_SIZE as usize];
    let pattern = pattern_sectors(1);
    let disk = crash_with_open_transaction(15, &baseline, &pattern).await;

    // crash landed right after the COMMIT master update
    force_status(&disk, TransStatus::Commit).await;

    let journal = mount(&disk).await?;
    let mut readback = vec![0u8; SECTOR_SIZE as usize];
    journal.read(15, &mut readback).await?;
    assert_eq!(readback, pattern);

    let master = read_master(&disk);
    assert_eq!(master.status, TransStatus::Ready);
    assert_eq!(master.next_free_sector, 0);
    Ok(())
}

#[tokio::test]
async fn test_recovered_state_matches_clean_commit() -> anyhow::Result<()> {
    let baseline = vec![0x5A; SECTOR_SIZE as usize];
    let pattern = pattern_sectors(2);

    // one shared pre-crash image, two futures: clean commit vs recovery
    let disk = test_disk();
    let journal = mount(&disk).await?;
    journal.set_direct_io(true).await?;
    journal.write(15, &baseline).await?;
    journal.set_direct_io(false).await?;
    journal.start().await?;
    journal.write(15, &pattern).await?;

    let crashed = disk.duplicate();
    force_status(&crashed, TransStatus::Commit).await;

    journal.stop(true).await?; // the clean path
    drop(mount(&crashed).await?); // the recovery path

    assert_eq!(disk.snapshot(), crashed.snapshot());
    Ok(())
}

#[tokio::test]
async fn test_replay_is_idempotent() -> anyhow::Result<()> {
    let baseline = vec![0x5A; SECTOR_SIZE as usize];
    let pattern = pattern_sectors(1);
    let disk = crash_with_open_transaction(17, &baseline, &pattern).await;
    force_status(&disk, TransStatus::Commit).await;

    drop(mount(&disk).await?);
    let after_first = disk.snapshot();

    drop(mount(&disk).await?);
    assert_eq!(disk.snapshot(), after_first);

    let mut readback = vec![0u8; SECTOR_SIZE as usize];
    let journal = mount(&disk).await?;
    journal.read(17, &mut readback).await?;
    assert_eq!(readback, pattern);
    Ok(())
}

#[tokio::test]
async fn test_corrupted_data_halts_replay() -> anyhow::Result<()> {
    let baseline = vec![0x5A; SECTOR_SIZE as usize];
    let pattern = pattern_sectors(1);
    let disk = crash_with_open_transaction(9, &baseline, &pattern).await;
    force_status(&disk, TransStatus::Commit).await;

    // flip one payload byte in the log (store sector 1 = first data sector)
    let mut sector = disk.sector(FS_SECTORS + 1);
    sector[100] ^= 0xFF;
    let mut raw = disk.clone();
    let addr = u64::from(FS_SECTORS + 1) * u64::from(SECTOR_SIZE);
    raw.erase_range(addr, u64::from(SECTOR_SIZE)).await?;
    raw.write(addr, &sector).await?;

    assert_eq!(mount(&disk).await.unwrap_err(), Error::InvalidCrc);

    // the store stays in COMMIT for a later retry; target untouched
    assert_eq!(read_master(&disk).status, TransStatus::Commit);
    assert_eq!(disk.sector(9), baseline);
    Ok(())
}

#[tokio::test]
async fn test_corrupted_header_halts_replay() -> anyhow::Result<()> {
    let baseline = vec![0x5A; SECTOR_SIZE as usize];
    let pattern = pattern_sectors(1);
    let disk = crash_with_open_transaction(9, &baseline, &pattern).await;
    force_status(&disk, TransStatus::Commit).await;

    let mut sector = disk.sector(FS_SECTORS);
    sector[0] ^= 0xFF;
    let mut raw = disk.clone();
    let addr = u64::from(FS_SECTORS) * u64::from(SECTOR_SIZE);
    raw.erase_range(addr, u64::from(SECTOR_SIZE)).await?;
    raw.write(addr, &sector).await?;

    assert_eq!(mount(&disk).await.unwrap_err(), Error::InvalidCrc);
    assert_eq!(read_master(&disk).status, TransStatus::Commit);
    Ok(())
}

#[tokio::test]
async fn test_mount_without_replay_discards_log() -> anyhow::Result<()> {
    let baseline = vec![0x5A; SECTOR_SIZE as usize];
    let pattern = pattern_sectors(1);
    let disk = crash_with_open_transaction(12, &baseline, &pattern).await;

    let volume = VolumeGeometry::new(disk.volume_size(), disk.sector_size());
    let journal = Journal::mount(
        &JrnlConfig::new()
            .store_size_sectors(STORE_SECTORS)
            .replay_journal_after_mount(false),
        volume,
        0,
        disk.clone(),
    )
    .await?;

    // mount re-initializes the master; the stale log is simply dropped
    let master = read_master(&disk);
    assert_eq!(master.status, TransStatus::Ready);
    assert_eq!(master.next_free_sector, 0);

    let mut readback = vec![0u8; SECTOR_SIZE as usize];
    journal.read(12, &mut readback).await?;
    assert_eq!(readback, baseline);
    Ok(())
}
