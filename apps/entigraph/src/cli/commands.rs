//! # CLI Command Implementations

use crate::api;
use crate::config::AppConfig;
use entigraph_core::{
    EntigraphError, Fixture, FixtureWriter, LoadReport, Lookup, NamespaceResolver, Registry,
    Store, load_fixture,
};
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum fixture file size (100 MB).
const MAX_FIXTURE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Reject files larger than `max_size` before reading them.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), EntigraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| EntigraphError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(EntigraphError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize `path` and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, EntigraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        EntigraphError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(EntigraphError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), EntigraphError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| EntigraphError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig) -> Result<(), EntigraphError> {
    let store = Store::open(&config.database)?;
    let addr = config.server.addr();

    println!("Entigraph Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", addr);
    println!("  Database: {}", config.database.display());
    println!();
    println!("Endpoints:");
    println!("  GET /entities/details?id=<id>&datasets=a,b");
    println!("  GET /status");
    println!("  GET /health");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&addr, store, &config.api).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show store table counts plus the registered datasets and namespaces.
pub fn cmd_status(db_path: &Path, json_mode: bool) -> Result<(), EntigraphError> {
    let store = Store::open(db_path)?;
    let stats = store.stats()?;
    let (datasets, namespaces) = {
        let txn = store.begin_read()?;
        (
            Registry::open(&txn)?.datasets()?,
            NamespaceResolver::open(&txn)?.namespaces()?,
        )
    };

    if json_mode {
        let datasets: Vec<_> = datasets
            .iter()
            .map(|(id, record)| {
                serde_json::json!({"id": id, "name": record.name, "deleted": record.deleted})
            })
            .collect();
        return print_json(&serde_json::json!({
            "database": db_path.to_string_lossy(),
            "entities": stats.entities,
            "datasets": stats.datasets,
            "namespaces": stats.namespaces,
            "locator_entries": stats.locator_entries,
            "change_entries": stats.change_entries,
            "registered_datasets": datasets,
            "registered_namespaces": namespaces,
        }));
    }

    println!("Entigraph Store Status");
    println!("======================");
    println!("Database: {}", db_path.display());
    println!();
    println!("Entities:        {}", stats.entities);
    println!("Datasets:        {}", stats.datasets);
    println!("Namespaces:      {}", stats.namespaces);
    println!("Locator entries: {}", stats.locator_entries);
    println!("Change entries:  {}", stats.change_entries);

    if !datasets.is_empty() {
        println!();
        println!("Datasets:");
        for (id, record) in &datasets {
            let flag = if record.deleted { " (deleted)" } else { "" };
            println!("  {:>5}  {}{}", id, record.name, flag);
        }
    }
    if !namespaces.is_empty() {
        println!();
        println!("Namespaces:");
        for ns in &namespaces {
            println!("  {:<10} {}", ns.prefix, ns.expansion);
        }
    }

    Ok(())
}

// =============================================================================
// DETAILS COMMAND
// =============================================================================

/// Print the details document of one entity as JSON.
pub fn cmd_details(db_path: &Path, id: &str, datasets: &[String]) -> Result<(), EntigraphError> {
    let store = Store::open(db_path)?;
    let details = Lookup::new(&store).details(id, datasets)?;
    print_json(&details)
}

// =============================================================================
// INSPECT-KEY COMMAND
// =============================================================================

/// Explain a hex index key, such as the one named by a `Corrupt` error.
pub fn cmd_inspect_key(db_path: &Path, json_mode: bool, key: &str) -> Result<(), EntigraphError> {
    let store = Store::open(db_path)?;
    let description = Lookup::new(&store).describe_key(key)?;

    if json_mode {
        return print_json(&description);
    }

    let unknown = "<unregistered>";
    println!("Key:      {}", key);
    println!("Family:   {}", description.family);
    println!(
        "Entity:   {} ({})",
        description.curie.as_deref().unwrap_or(unknown),
        description.entity
    );
    println!(
        "Dataset:  {} ({})",
        description.dataset_name.as_deref().unwrap_or(unknown),
        description.dataset
    );
    println!("Position: {}", description.position);
    println!("Present:  {}", description.present);
    Ok(())
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// Read and parse a fixture file.
pub fn read_fixture(path: &Path) -> Result<Fixture, EntigraphError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_FIXTURE_FILE_SIZE)?;

    let data = std::fs::read(&path)
        .map_err(|e| EntigraphError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    serde_json::from_slice(&data).map_err(|e| {
        EntigraphError::Serialization(format!("Invalid fixture '{}': {}", path.display(), e))
    })
}

/// Seed the store from a fixture file in one transaction.
pub fn cmd_load(db_path: &Path, json_mode: bool, file: &Path) -> Result<(), EntigraphError> {
    let fixture = read_fixture(file)?;
    let store = Store::open(db_path)?;
    let LoadReport {
        namespaces,
        versions,
        tombstones,
    } = load_fixture(&store, &fixture)?;

    if json_mode {
        return print_json(&serde_json::json!({
            "namespaces": namespaces,
            "versions": versions,
            "tombstones": tombstones,
        }));
    }

    println!(
        "Loaded {} namespaces, {} versions, {} tombstones into {}",
        namespaces,
        versions,
        tombstones,
        db_path.display()
    );
    Ok(())
}

// =============================================================================
// TOMBSTONE COMMAND
// =============================================================================

/// Flag `dataset` as deleted.
pub fn cmd_tombstone(db_path: &Path, dataset: &str) -> Result<(), EntigraphError> {
    let store = Store::open(db_path)?;
    let mut writer = FixtureWriter::new(&store)?;
    let id = writer.mark_dataset_deleted(dataset)?;
    writer.commit()?;

    tracing::info!(dataset, %id, "dataset tombstoned");
    println!("Dataset '{}' ({}) marked deleted", dataset, id);
    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create an empty database, replacing an existing one only with `force`.
pub fn cmd_init(db_path: &Path, force: bool) -> Result<(), EntigraphError> {
    if db_path.exists() {
        if !force {
            return Err(EntigraphError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path)
            .map_err(|e| EntigraphError::Io(format!("Cannot remove old database: {}", e)))?;
    }

    Store::open(db_path)?;
    println!("Initialized new database at {}", db_path.display());
    Ok(())
}

// =============================================================================
// COMPACT COMMAND
// =============================================================================

/// Compact the database file.
pub fn cmd_compact(db_path: &Path) -> Result<(), EntigraphError> {
    let mut store = Store::open(db_path)?;
    store.compact()?;
    println!("Compacted {}", db_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entigraph_core::InternalDatasetId;
    use tempfile::tempdir;

    const FIXTURE: &str = r#"{
        "namespaces": {"ex": "http://example.com/"},
        "datasets": {
            "people": [
                {"id": "ex:3", "recorded": 1, "refs": {}, "props": {}},
                {"id": "http://example.com/3", "recorded": 2, "refs": {}, "props": {}}
            ]
        },
        "deleted": ["stale"]
    }"#;

    #[test]
    fn load_then_query() {
        let temp = tempdir().expect("temp dir");
        let db = temp.path().join("store.redb");
        let file = temp.path().join("fixture.json");
        std::fs::write(&file, FIXTURE).expect("write");

        cmd_load(&db, true, &file).expect("load");

        let store = Store::open(&db).expect("open");
        let stats = store.stats().expect("stats");
        assert_eq!(stats.entities, 1);
        assert_eq!(stats.datasets, 2);
        assert_eq!(stats.change_entries, 2);

        let details = Lookup::new(&store).details("ex:3", &["people"]).expect("details");
        assert_eq!(details["people"].changes().map(<[_]>::len), Some(2));
    }

    #[test]
    fn load_rejects_missing_and_malformed_files() {
        let temp = tempdir().expect("temp dir");
        let db = temp.path().join("store.redb");

        let missing = cmd_load(&db, true, &temp.path().join("nope.json"));
        assert!(matches!(missing, Err(EntigraphError::Io(_))));

        let bad = temp.path().join("bad.json");
        std::fs::write(&bad, "{\"datasets\": 3}").expect("write");
        assert!(matches!(
            cmd_load(&db, true, &bad),
            Err(EntigraphError::Serialization(_))
        ));

        assert!(matches!(
            cmd_load(&db, true, temp.path()),
            Err(EntigraphError::Io(_))
        ));
    }

    #[test]
    fn tombstone_flags_dataset() {
        let temp = tempdir().expect("temp dir");
        let db = temp.path().join("store.redb");

        cmd_tombstone(&db, "old").expect("tombstone");

        let store = Store::open(&db).expect("open");
        let txn = store.begin_read().expect("read");
        let registry = entigraph_core::Registry::open(&txn).expect("registry");
        assert!(registry.is_dataset_deleted(InternalDatasetId(1)).expect("flag"));
    }

    #[test]
    fn status_lists_registry() {
        let temp = tempdir().expect("temp dir");
        let db = temp.path().join("store.redb");
        let file = temp.path().join("fixture.json");
        std::fs::write(&file, FIXTURE).expect("write");
        cmd_load(&db, true, &file).expect("load");

        cmd_status(&db, true).expect("json status");
        cmd_status(&db, false).expect("text status");
    }

    #[test]
    fn inspect_key_resolves_names() {
        let temp = tempdir().expect("temp dir");
        let db = temp.path().join("store.redb");
        let file = temp.path().join("fixture.json");
        std::fs::write(&file, FIXTURE).expect("write");
        cmd_load(&db, true, &file).expect("load");

        let key = entigraph_core::LocatorKey::new(
            entigraph_core::InternalId(1),
            InternalDatasetId(1),
            2,
        );
        let hex = entigraph_core::keys::key_hex(&key.encode());
        cmd_inspect_key(&db, true, &hex).expect("inspect");
        cmd_inspect_key(&db, false, &hex).expect("inspect text");

        assert!(matches!(
            cmd_inspect_key(&db, true, "xyz"),
            Err(EntigraphError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn init_refuses_existing_without_force() {
        let temp = tempdir().expect("temp dir");
        let db = temp.path().join("store.redb");

        cmd_init(&db, false).expect("first init");
        assert!(cmd_init(&db, false).is_err());
        cmd_init(&db, true).expect("forced init");
        cmd_compact(&db).expect("compact");
    }
}
