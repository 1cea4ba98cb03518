//! Atomic, compressed state persistence.
//!
//! `StateStore` saves a serializable object graph as a gzip-compressed CBOR
//! archive and loads it back, remapping legacy type identities on the way.
//! CBOR carries NaN and infinite floats, so masked numeric arrays survive a
//! round trip unchanged.
//!
//! ## Save protocol
//!
//! 1. Create `<stem>-<8 hex>.tmp` next to the destination (never reusing an
//!    existing file) and write through a gzip encoder
//! 2. Finish the encoder and sync the file
//! 3. Rename the temp file over the destination
//! 4. Remove the temp file on every exit path if it still exists
//!
//! A reader opening the destination sees either the previous archive or the
//! new one, never a partial write. Concurrent writers to the same
//! destination are not coordinated: the last rename wins.
//!
//! ## Load protocol
//!
//! Decompress, parse the envelope, resolve every `$type` tag through the
//! [`RemapTable`] and [`TypeRegistry`], then deserialize the root. An empty
//! registry leaves identity checks to the target type.

mod archive;
mod atomic;
pub mod remap;
pub mod typed;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use archive::{Envelope, EnvelopeRef, TypeResolver};
use atomic::{create_temp, publish};

pub use archive::{ARCHIVE_FORMAT, ARCHIVE_VERSION};
pub use remap::{RemapTable, TypeRegistry};
pub use typed::{Persist, TypeName, Typed, DATA_KEY, TYPE_KEY};

/// Origin reported for archives read from a caller-supplied stream.
pub const READER_ORIGIN: &str = "<reader>";

/// Default gzip compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Error type for state store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Decompression, parsing or deserialization failed.
    #[error("Corrupt archive {origin}: {reason}")]
    CorruptArchive {
        /// Path of the archive, or `<reader>` for streams.
        origin: String,
        /// What went wrong.
        reason: String,
    },
    /// A type identity (after remapping) is not registered.
    #[error("Unknown type in archive: {0}")]
    UnknownType(TypeName),
    /// Filesystem failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
    /// The value could not be serialized.
    #[error("Failed to encode state: {0}")]
    Encode(String),
    /// The blocking task running a save or load did not complete.
    #[cfg(feature = "tokio")]
    #[error("Blocking task failed: {0}")]
    TaskFailed(String),
}

impl StoreError {
    pub(crate) fn corrupt(origin: &str, reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            origin: origin.to_string(),
            reason: reason.into(),
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Saves and loads compressed state archives.
///
/// Holds no mutable state; clone it freely across threads.
#[derive(Debug, Clone)]
pub struct StateStore {
    remap: RemapTable,
    registry: TypeRegistry,
    compression: u32,
}

impl StateStore {
    /// Create a store with an empty remap table and an open registry.
    pub fn new() -> Self {
        Self {
            remap: RemapTable::new(),
            registry: TypeRegistry::new(),
            compression: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Set the legacy remap table consulted on load.
    pub fn with_remap(mut self, remap: RemapTable) -> Self {
        self.remap = remap;
        self
    }

    /// Set the registry of resolvable type identities.
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the gzip level (0-9).
    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = level.clamp(0, 9);
        self
    }

    /// Get the remap table.
    pub fn remap(&self) -> &RemapTable {
        &self.remap
    }

    /// Get the type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Atomically write `value` to `destination`.
    ///
    /// Missing parent directories are created. On failure the destination
    /// is left as it was.
    pub fn save<T: Serialize + ?Sized>(&self, value: &T, destination: impl AsRef<Path>) -> Result<(), StoreError> {
        let destination = destination.as_ref();
        if destination.file_name().is_none() {
            return Err(StoreError::io(
                destination,
                io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"),
            ));
        }

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let (guard, file) = create_temp(destination).map_err(|e| StoreError::io(destination, e))?;
        let temp_path = guard.path();
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::new(self.compression));

        ciborium::ser::into_writer(&EnvelopeRef::new(value), &mut encoder).map_err(|e| match e {
            ciborium::ser::Error::Io(e) => StoreError::io(temp_path, e),
            ciborium::ser::Error::Value(reason) => StoreError::Encode(reason),
            #[allow(unreachable_patterns)]
            other => StoreError::Encode(other.to_string()),
        })?;

        let writer = encoder.finish().map_err(|e| StoreError::io(temp_path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| StoreError::io(temp_path, e.into_error()))?;
        file.sync_all().map_err(|e| StoreError::io(temp_path, e))?;
        drop(file);

        publish(temp_path, destination).map_err(|e| StoreError::io(destination, e))?;

        info!(path = %destination.display(), "State saved");
        Ok(())
    }

    /// Load an archive from `source`.
    pub fn load<T: DeserializeOwned>(&self, source: impl AsRef<Path>) -> Result<T, StoreError> {
        let source = source.as_ref();
        let file = File::open(source).map_err(|e| StoreError::io(source, e))?;
        let value = self.decode(file, &source.display().to_string())?;
        info!(path = %source.display(), "State loaded");
        Ok(value)
    }

    /// Load an archive from an already-open byte stream.
    pub fn load_from_reader<T: DeserializeOwned, R: Read>(&self, reader: R) -> Result<T, StoreError> {
        self.decode(reader, READER_ORIGIN)
    }

    fn decode<T: DeserializeOwned, R: Read>(&self, reader: R, origin: &str) -> Result<T, StoreError> {
        let decoder = MultiGzDecoder::new(BufReader::new(reader));
        let mut envelope: Envelope = ciborium::de::from_reader(decoder)
            .map_err(|e| StoreError::corrupt(origin, e.to_string()))?;
        envelope.check(origin)?;

        let mut resolver = TypeResolver::new(&self.remap, &self.registry, origin);
        resolver.resolve(&mut envelope.root)?;

        debug!(
            origin,
            saved_at = %envelope.saved_at,
            remapped = resolver.remapped,
            "Decoded archive"
        );

        envelope
            .root
            .deserialized()
            .map_err(|e| StoreError::corrupt(origin, e.to_string()))
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "tokio")]
impl StateStore {
    /// Run [`save`](Self::save) on the blocking thread pool.
    pub async fn save_async<T>(&self, value: T, destination: PathBuf) -> Result<(), StoreError>
    where
        T: Serialize + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save(&value, &destination))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }

    /// Run [`load`](Self::load) on the blocking thread pool.
    pub async fn load_async<T>(&self, source: PathBuf) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load(&source))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Axis {
        label: String,
        values: Vec<f64>,
    }

    impl Persist for Axis {
        const NAMESPACE: &'static str = "geometry.space";
        const TYPE_NAME: &'static str = "Axis";
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct LegacyAxis {
        label: String,
        values: Vec<f64>,
    }

    impl Persist for LegacyAxis {
        const NAMESPACE: &'static str = "__main__";
        const TYPE_NAME: &'static str = "Axis";
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("refusing to encode"))
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Masked {
        values: Vec<Option<f64>>,
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_round_trip_nested_arrays() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.zpi");
        let value: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::from([
            ("grid".to_string(), vec![vec![0.1, 0.2], vec![1e-300, -3.5]]),
            ("empty".to_string(), vec![]),
        ]);

        let store = StateStore::new();
        store.save(&value, &path).unwrap();
        let loaded: BTreeMap<String, Vec<Vec<f64>>> = store.load(&path).unwrap();

        assert_eq!(loaded, value);
        assert_eq!(files_in(dir.path()), vec!["state.zpi"]);
    }

    #[test]
    fn test_non_finite_floats_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.zpi");
        let store = StateStore::new();

        store
            .save(&vec![1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY, -0.0], &path)
            .unwrap();
        let loaded: Vec<f64> = store.load(&path).unwrap();

        assert_eq!(loaded.len(), 5);
        assert_eq!(loaded[0], 1.0);
        assert!(loaded[1].is_nan());
        assert_eq!(loaded[2], f64::INFINITY);
        assert_eq!(loaded[3], f64::NEG_INFINITY);
        assert!(loaded[4] == 0.0 && loaded[4].is_sign_negative());
    }

    #[test]
    fn test_masked_values_keep_nan() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.zpi");
        let store = StateStore::new();

        store
            .save(&Masked { values: vec![Some(f64::NAN), Some(1.0), None] }, &path)
            .unwrap();
        let loaded: Masked = store.load(&path).unwrap();

        assert!(matches!(loaded.values[0], Some(v) if v.is_nan()));
        assert_eq!(loaded.values[1], Some(1.0));
        assert_eq!(loaded.values[2], None);
    }

    #[test]
    fn test_default_store_round_trips_typed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("axis.zpi");
        let axis = Typed(Axis {
            label: "x".to_string(),
            values: vec![0.5, f64::INFINITY],
        });

        let store = StateStore::new();
        store.save(&axis, &path).unwrap();
        let loaded: Typed<Axis> = store.load(&path).unwrap();

        assert_eq!(loaded, axis);
    }

    #[test]
    fn test_default_store_rejects_mismatched_typed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("axis.zpi");
        let legacy = Typed(LegacyAxis {
            label: "x".to_string(),
            values: vec![],
        });

        let store = StateStore::new();
        store.save(&legacy, &path).unwrap();
        let err = store.load::<Typed<Axis>>(&path).unwrap_err();

        assert!(matches!(err, StoreError::CorruptArchive { .. }));
    }

    #[test]
    fn test_file_is_gzip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.zpi");
        StateStore::new().save(&vec![1u32, 2, 3], &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn test_legacy_type_is_remapped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("axis.zpi");
        let legacy = Typed(LegacyAxis {
            label: "x".to_string(),
            values: vec![1.0, 2.0],
        });
        StateStore::new().save(&legacy, &path).unwrap();

        let store = StateStore::new()
            .with_remap(RemapTable::new().with_moved_namespace("__main__", "geometry.space", &["Axis"]))
            .with_registry(TypeRegistry::new().register::<Axis>());
        let loaded: Typed<Axis> = store.load(&path).unwrap();

        assert_eq!(loaded.label, "x");
        assert_eq!(loaded.values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_unregistered_type_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("axis.zpi");
        let legacy = Typed(LegacyAxis {
            label: "x".to_string(),
            values: vec![],
        });
        StateStore::new().save(&legacy, &path).unwrap();

        let store = StateStore::new().with_registry(TypeRegistry::new().register::<Axis>());
        let err = store.load::<Typed<Axis>>(&path).unwrap_err();
        assert!(matches!(err, StoreError::UnknownType(t) if t == LegacyAxis::type_name()));
    }

    #[test]
    fn test_encode_failure_leaves_destination() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.zpi");
        let store = StateStore::new();
        store.save(&vec![1u32], &path).unwrap();

        let err = store.save(&Unencodable, &path).unwrap_err();
        assert!(matches!(err, StoreError::Encode(_)));

        let loaded: Vec<u32> = store.load(&path).unwrap();
        assert_eq!(loaded, vec![1]);
        assert_eq!(files_in(dir.path()), vec!["state.zpi"]);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = StateStore::new()
            .load::<Vec<u32>>(dir.path().join("missing.zpi"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn test_load_plain_bytes_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.zpi");
        fs::write(&path, b"[1, 2, 3]").unwrap();

        let err = StateStore::new().load::<Vec<u32>>(&path).unwrap_err();
        match err {
            StoreError::CorruptArchive { origin, .. } => assert_eq!(origin, path.display().to_string()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("state.zpi");
        StateStore::new().save(&"hello", &path).unwrap();

        let loaded: String = StateStore::new().load(&path).unwrap();
        assert_eq!(loaded, "hello");
    }

    #[test]
    fn test_compression_level_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.zpi");
        let store = StateStore::new().with_compression(42);
        store.save(&vec![0u8; 1024], &path).unwrap();
        let loaded: Vec<u8> = store.load(&path).unwrap();
        assert_eq!(loaded.len(), 1024);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_async_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.zpi");
        let store = StateStore::new();

        store.save_async(vec![1.5f64, 2.5], path.clone()).await.unwrap();
        let loaded: Vec<f64> = store.load_async(path).await.unwrap();
        assert_eq!(loaded, vec![1.5, 2.5]);
    }
}
