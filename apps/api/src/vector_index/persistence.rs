//! On-disk layout for a [`VectorIndex`](super::VectorIndex): an opaque index blob
//! plus a JSON metadata sidecar holding `next_id` and the id → metadata table.
//!
//! Both files are replaced atomically (temp file in the same directory, fsync,
//! rename). The blob is written first and the sidecar second, so the sidecar is
//! the commit record: a blob carrying rows the sidecar does not know about is the
//! remains of an interrupted batch and is truncated back on load. A blob with no
//! sidecar at all is an interrupted first batch and loads as an empty index.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::flat::FlatIpIndex;
use super::IndexError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub blob: PathBuf,
    pub sidecar: PathBuf,
}

impl IndexPaths {
    /// `data/resume_index.bin` → blob `data/resume_index.bin`,
    /// sidecar `data/resume_index_meta.json`.
    pub fn from_blob_path(path: impl AsRef<Path>) -> Self {
        let blob = path.as_ref().to_path_buf();
        let stem = blob
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index".to_string());
        let sidecar = blob.with_file_name(format!("{stem}_meta.json"));
        Self { blob, sidecar }
    }
}

/// Metadata sidecar. Map keys serialize as decimal strings and parse back as
/// `i64`, so ids never pass through a float.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataSidecar<M> {
    pub next_id: i64,
    pub metadata: BTreeMap<i64, M>,
}

pub struct Snapshot<M> {
    pub index: FlatIpIndex,
    pub metadata: BTreeMap<i64, M>,
    pub next_id: i64,
    /// Rows dropped from the blob because the sidecar never committed them.
    pub discarded_rows: usize,
}

pub enum LoadOutcome<M> {
    /// Neither file exists: a first run.
    Missing,
    Loaded(Snapshot<M>),
    /// Files exist but cannot be trusted.
    Corrupt(IndexError),
}

pub fn load<M: DeserializeOwned>(paths: &IndexPaths, dimension: usize) -> LoadOutcome<M> {
    let blob_exists = paths.blob.exists();
    let sidecar_exists = paths.sidecar.exists();

    match (blob_exists, sidecar_exists) {
        (false, false) => LoadOutcome::Missing,
        (true, true) => match read_snapshot(paths, dimension) {
            Ok(snapshot) => LoadOutcome::Loaded(snapshot),
            Err(e) => LoadOutcome::Corrupt(e),
        },
        (true, false) => match read_blob(paths, dimension) {
            Ok(mut index) => {
                let discarded_rows = index.ntotal();
                index.truncate(0);
                LoadOutcome::Loaded(Snapshot {
                    index,
                    metadata: BTreeMap::new(),
                    next_id: 0,
                    discarded_rows,
                })
            }
            Err(e) => LoadOutcome::Corrupt(e),
        },
        (false, true) => LoadOutcome::Corrupt(IndexError::Corrupt(format!(
            "metadata sidecar {} has no index blob",
            paths.sidecar.display()
        ))),
    }
}

fn read_blob(paths: &IndexPaths, dimension: usize) -> Result<FlatIpIndex, IndexError> {
    let blob = fs::read(&paths.blob)?;
    let index = FlatIpIndex::from_bytes(&blob)?;
    if index.dimension() != dimension {
        return Err(IndexError::Corrupt(format!(
            "index blob has dimension {} but {dimension} was configured",
            index.dimension()
        )));
    }
    Ok(index)
}

fn read_snapshot<M: DeserializeOwned>(
    paths: &IndexPaths,
    dimension: usize,
) -> Result<Snapshot<M>, IndexError> {
    let mut index = read_blob(paths, dimension)?;

    let sidecar_text = fs::read_to_string(&paths.sidecar)?;
    let sidecar: MetadataSidecar<M> = serde_json::from_str(&sidecar_text)
        .map_err(|e| IndexError::Corrupt(format!("metadata sidecar is unreadable: {e}")))?;

    let committed = sidecar.metadata.len();
    let ids = index.ids();
    if ids.len() < committed {
        return Err(IndexError::Corrupt(format!(
            "metadata sidecar lists {committed} records but the index blob holds {}",
            ids.len()
        )));
    }
    if !ids[..committed].iter().eq(sidecar.metadata.keys()) {
        return Err(IndexError::Corrupt(
            "index blob ids do not match metadata sidecar ids".to_string(),
        ));
    }
    let expected_next = sidecar.metadata.keys().next_back().map_or(0, |max| max + 1);
    if sidecar.next_id != expected_next {
        return Err(IndexError::Corrupt(format!(
            "metadata sidecar next_id is {} but the highest id implies {expected_next}",
            sidecar.next_id
        )));
    }

    let discarded_rows = ids.len() - committed;
    index.truncate(committed);

    Ok(Snapshot {
        index,
        metadata: sidecar.metadata,
        next_id: sidecar.next_id,
        discarded_rows,
    })
}

/// Writes the blob and then the sidecar, each atomically.
pub fn save<M: Serialize>(
    paths: &IndexPaths,
    index: &FlatIpIndex,
    metadata: &BTreeMap<i64, M>,
    next_id: i64,
) -> Result<(), IndexError> {
    #[derive(Serialize)]
    struct SidecarRef<'a, M> {
        next_id: i64,
        metadata: &'a BTreeMap<i64, M>,
    }

    let sidecar = serde_json::to_vec(&SidecarRef { next_id, metadata })?;
    write_atomic(&paths.blob, &index.to_bytes())?;
    write_atomic(&paths.sidecar, &sidecar)?;
    Ok(())
}

fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn sample_index() -> (FlatIpIndex, BTreeMap<i64, Value>) {
        let mut index = FlatIpIndex::new(2);
        index.add_with_ids(&[vec![1.0, 0.0], vec![0.0, 1.0]], &[0, 1]);
        let metadata = BTreeMap::from([
            (0, json!({"text": "first"})),
            (1, json!({"text": "second"})),
        ]);
        (index, metadata)
    }

    #[test]
    fn test_sidecar_path_derived_from_blob() {
        let paths = IndexPaths::from_blob_path("data/resume_index.bin");
        assert_eq!(paths.sidecar, PathBuf::from("data/resume_index_meta.json"));
    }

    #[test]
    fn test_missing_files_are_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        assert!(matches!(load::<Value>(&paths, 2), LoadOutcome::Missing));
    }

    #[test]
    fn test_sidecar_keys_are_decimal_strings() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        let (index, metadata) = sample_index();
        save(&paths, &index, &metadata, 2).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&paths.sidecar).unwrap()).unwrap();
        assert_eq!(raw["next_id"], json!(2));
        assert_eq!(raw["metadata"]["1"]["text"], json!("second"));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("nested/idx.bin"));
        let (index, metadata) = sample_index();
        save(&paths, &index, &metadata, 2).unwrap();

        let LoadOutcome::Loaded(snapshot) = load::<Value>(&paths, 2) else {
            panic!("expected a loaded snapshot");
        };
        assert_eq!(snapshot.index, index);
        assert_eq!(snapshot.metadata, metadata);
        assert_eq!(snapshot.next_id, 2);
        assert_eq!(snapshot.discarded_rows, 0);
    }

    #[test]
    fn test_uncommitted_blob_rows_are_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        let (index, metadata) = sample_index();
        save(&paths, &index, &metadata, 2).unwrap();

        // Simulate a crash between the blob write and the sidecar write.
        let mut grown = index.clone();
        grown.add_with_ids(&[vec![0.6, 0.8]], &[2]);
        write_atomic(&paths.blob, &grown.to_bytes()).unwrap();

        let LoadOutcome::Loaded(snapshot) = load::<Value>(&paths, 2) else {
            panic!("expected a loaded snapshot");
        };
        assert_eq!(snapshot.discarded_rows, 1);
        assert_eq!(snapshot.index, index);
        assert_eq!(snapshot.next_id, 2);
    }

    #[test]
    fn test_first_batch_without_sidecar_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        // Crash during the very first add: blob renamed, sidecar never written.
        let (index, _) = sample_index();
        write_atomic(&paths.blob, &index.to_bytes()).unwrap();

        let LoadOutcome::Loaded(snapshot) = load::<Value>(&paths, 2) else {
            panic!("expected an empty committed snapshot");
        };
        assert_eq!(snapshot.discarded_rows, 2);
        assert_eq!(snapshot.index.ntotal(), 0);
        assert!(snapshot.metadata.is_empty());
        assert_eq!(snapshot.next_id, 0);
    }

    #[test]
    fn test_unreadable_blob_without_sidecar_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        fs::write(&paths.blob, b"garbage").unwrap();
        assert!(matches!(load::<Value>(&paths, 2), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_garbage_sidecar_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        let (index, metadata) = sample_index();
        save(&paths, &index, &metadata, 2).unwrap();
        fs::write(&paths.sidecar, b"{\"next_id\": 2, \"metadata\": ").unwrap();
        assert!(matches!(load::<Value>(&paths, 2), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_inconsistent_next_id_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        let (index, metadata) = sample_index();
        save(&paths, &index, &metadata, 5).unwrap();
        assert!(matches!(load::<Value>(&paths, 2), LoadOutcome::Corrupt(_)));
    }

    #[test]
    fn test_dimension_change_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_blob_path(dir.path().join("idx.bin"));
        let (index, metadata) = sample_index();
        save(&paths, &index, &metadata, 2).unwrap();
        assert!(matches!(load::<Value>(&paths, 3), LoadOutcome::Corrupt(_)));
    }
}
