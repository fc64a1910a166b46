//! Handle-table adapter tests: slot allocation and reuse, exhaustion,
//! handle validation, operations through a handle.

use jrnl::{
    Error, HandleTable, JrnlConfig, VolumeGeometry, INVALID_HANDLE, JRNL_MAX_HANDLES, TransStatus,
};
use jrnl_ramdisk::RamDisk;

const SECTOR_SIZE: u32 = 4096;
const DISK_SECTORS: u32 = 64;

fn test_disk() -> RamDisk {
    let _ = env_logger::builder().is_test(true).try_init();
    RamDisk::new(SECTOR_SIZE, DISK_SECTORS)
}

fn volume(disk: &RamDisk) -> VolumeGeometry {
    VolumeGeometry::new(disk.volume_size(), disk.sector_size())
}

async fn table_mount(table: &HandleTable<RamDisk>, disk: &RamDisk, volume_id: u8) -> i32 {
    table
        .mount(
            &JrnlConfig::new().store_size_sectors(16),
            volume(disk),
            volume_id,
            disk.clone(),
        )
        .await
        .expect("mount")
}

#[tokio::test]
async fn test_slot_allocation_and_reuse() -> anyhow::Result<()> {
    let table = HandleTable::new();
    let disks: Vec<_> = (0..3).map(|_| test_disk()).collect();

    assert_eq!(table_mount(&table, &disks[0], 0).await, 0);
    assert_eq!(table_mount(&table, &disks[1], 1).await, 1);

    table.unmount(0).await?;
    assert_eq!(table.get(0).await.unwrap_err(), Error::NotFound);

    // the freed slot is handed out first
    assert_eq!(table_mount(&table, &disks[2], 2).await, 0);
    assert_eq!(table.get(0).await?.volume_id(), 2);
    Ok(())
}

#[tokio::test]
async fn test_table_exhaustion() -> anyhow::Result<()> {
    let table = HandleTable::new();
    let disks: Vec<_> = (0..=JRNL_MAX_HANDLES).map(|_| test_disk()).collect();

    for (i, disk) in disks.iter().take(JRNL_MAX_HANDLES).enumerate() {
        assert_eq!(table_mount(&table, disk, i as u8).await, i as i32);
    }

    let err = table
        .mount(
            &JrnlConfig::new().store_size_sectors(16),
            volume(&disks[JRNL_MAX_HANDLES]),
            0,
            disks[JRNL_MAX_HANDLES].clone(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::NoMem);
    Ok(())
}

#[tokio::test]
async fn test_handle_validation() -> anyhow::Result<()> {
    let table: HandleTable<RamDisk> = HandleTable::new();

    assert_eq!(
        table.get(INVALID_HANDLE).await.unwrap_err(),
        Error::InvalidState
    );
    assert_eq!(table.get(-2).await.unwrap_err(), Error::InvalidInput);
    assert_eq!(
        table.get(JRNL_MAX_HANDLES as i32).await.unwrap_err(),
        Error::InvalidInput
    );
    assert_eq!(table.get(3).await.unwrap_err(), Error::NotFound);

    assert_eq!(
        table.unmount(INVALID_HANDLE).await.unwrap_err(),
        Error::InvalidState
    );
    assert_eq!(table.unmount(5).await.unwrap_err(), Error::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_double_unmount() -> anyhow::Result<()> {
    let table = HandleTable::new();
    let disk = test_disk();

    let handle = table_mount(&table, &disk, 0).await;
    table.unmount(handle).await?;
    assert_eq!(table.unmount(handle).await.unwrap_err(), Error::NotFound);
    Ok(())
}

#[tokio::test]
async fn test_transaction_through_handle() -> anyhow::Result<()> {
    let table = HandleTable::new();
    let disk = test_disk();
    let pattern: Vec<u8> = b"ABCDEFGHABCDEFGH"
        .iter()
        .copied()
        .cycle()
        .take(SECTOR_SIZE as usize)
        .collect();

    let handle = table_mount(&table, &disk, 0).await;
    let journal = table.get(handle).await?;

    journal.start().await?;
    journal.write(20, &pattern).await?;
    journal.stop(true).await?;

    let mut readback = vec![0u8; SECTOR_SIZE as usize];
    journal.read(20, &mut readback).await?;
    assert_eq!(readback, pattern);
    assert_eq!(journal.status().await, TransStatus::Ready);

    // the instance dies with the last reference after the slot is freed
    drop(journal);
    table.unmount(handle).await?;
    Ok(())
}

#[tokio::test]
async fn test_mount_failure_keeps_slot_free() -> anyhow::Result<()> {
    let table: HandleTable<RamDisk> = HandleTable::new();
    let disk = test_disk();

    let err = table
        .mount(
            &JrnlConfig::new().store_size_sectors(2),
            volume(&disk),
            0,
            disk.clone(),
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::InvalidInput);

    // the failed mount must not leak its slot
    assert_eq!(table_mount(&table, &disk, 0).await, 0);
    Ok(())
}
