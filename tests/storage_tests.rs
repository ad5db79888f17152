use anyhow::Result;
use chefcode::inventory::InventoryItem;
use chefcode::state::{AppData, STORAGE_KEY};
use chefcode::storage::{BlobStore, FileStore, MemoryStore};
use std::fs;
use tempfile::TempDir;

fn setup_file_store() -> Result<(TempDir, FileStore)> {
    let dir = TempDir::new()?;
    let store = FileStore::open(dir.path().join("data"))?;
    Ok((dir, store))
}

#[test]
fn test_open_creates_directory() -> Result<()> {
    let (dir, _store) = setup_file_store()?;
    assert!(dir.path().join("data").is_dir());
    Ok(())
}

#[test]
fn test_missing_key_loads_none() -> Result<()> {
    let (_dir, store) = setup_file_store()?;
    assert_eq!(store.load("nothing-here")?, None);
    assert!(!store.remove("nothing-here")?);
    Ok(())
}

#[test]
fn test_save_load_remove() -> Result<()> {
    let (_dir, store) = setup_file_store()?;

    store.save(STORAGE_KEY, r#"{"inventory":[]}"#)?;
    assert_eq!(store.load(STORAGE_KEY)?.as_deref(), Some(r#"{"inventory":[]}"#));

    store.save(STORAGE_KEY, "{}")?;
    assert_eq!(store.load(STORAGE_KEY)?.as_deref(), Some("{}"));

    assert!(store.remove(STORAGE_KEY)?);
    assert_eq!(store.load(STORAGE_KEY)?, None);
    Ok(())
}

#[test]
fn test_key_is_sanitized_into_file_name() -> Result<()> {
    let (dir, store) = setup_file_store()?;

    let path = store.path_for("chefcode:v1");
    assert_eq!(path, dir.path().join("data").join("chefcode_v1.json"));

    let escaped = store.path_for("../../etc/passwd");
    assert_eq!(escaped.parent(), Some(dir.path().join("data").as_path()));
    Ok(())
}

#[test]
fn test_save_leaves_no_staging_file() -> Result<()> {
    let (dir, store) = setup_file_store()?;
    store.save(STORAGE_KEY, "{}")?;

    let names: Vec<String> = fs::read_dir(dir.path().join("data"))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["chefcode_v1.json".to_string()]);
    Ok(())
}

#[test]
fn test_snapshot_persists_across_reopen() -> Result<()> {
    let (dir, store) = setup_file_store()?;

    let mut data = AppData::default();
    data.inventory
        .push(InventoryItem::new("Pomodori", 3.0, "kg").with_price(2.4));
    data.save(&store)?;

    let reopened = FileStore::open(dir.path().join("data"))?;
    assert_eq!(AppData::load(&reopened)?, data);
    Ok(())
}

#[test]
fn test_corrupt_snapshot_is_an_error() -> Result<()> {
    let (_dir, store) = setup_file_store()?;
    store.save(STORAGE_KEY, "{not json")?;
    assert!(AppData::load(&store).is_err());
    Ok(())
}

#[test]
fn test_memory_store() -> Result<()> {
    let store = MemoryStore::new();
    assert_eq!(store.load("k")?, None);
    store.save("k", "v")?;
    assert_eq!(store.load("k")?.as_deref(), Some("v"));
    assert!(store.remove("k")?);
    assert!(!store.remove("k")?);
    Ok(())
}
