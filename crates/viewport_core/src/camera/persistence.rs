//! Per-document camera state
//!
//! The editor remembers where each camera was for every open document and
//! restores it when the document is shown again. Only the position and the
//! fov / field size are restored; orientation always starts from the camera's
//! current rotation.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::projection::{Camera, ProjectionKind};
use crate::foundation::math::Vec3;

/// Saved camera state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    /// World position
    pub position: Vec3,
    /// Vertical fov in degrees or orthographic field size
    pub fov: f64,
}

impl CameraSnapshot {
    /// Capture the persisted parts of a camera
    pub fn capture(camera: &Camera) -> Self {
        Self { position: camera.position(), fov: camera.fov() }
    }

    /// Write position and fov back; rotation, planes and aspect are untouched
    pub fn apply(&self, camera: &mut Camera) {
        camera.set_position(self.position);
        camera.set_fov(self.fov);
    }
}

/// Key a snapshot is stored under
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CameraStateKey {
    /// Document path or other stable document identifier
    pub document: String,
    /// Which of the two editor cameras
    pub kind: ProjectionKind,
}

impl CameraStateKey {
    /// Build a key
    pub fn new(document: impl Into<String>, kind: ProjectionKind) -> Self {
        Self { document: document.into(), kind }
    }
}

/// Persistence errors
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored state could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// State could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(String),
}

/// Storage for camera snapshots
pub trait CameraStateStore {
    /// Fetch a stored snapshot
    fn get(&self, key: &CameraStateKey) -> Option<CameraSnapshot>;

    /// Store or replace a snapshot
    fn put(&mut self, key: CameraStateKey, snapshot: CameraSnapshot) -> Result<(), PersistError>;
}

/// Session-lifetime store
#[derive(Debug, Clone, Default)]
pub struct MemoryCameraStore {
    entries: HashMap<CameraStateKey, CameraSnapshot>,
}

impl MemoryCameraStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CameraStateStore for MemoryCameraStore {
    fn get(&self, key: &CameraStateKey) -> Option<CameraSnapshot> {
        self.entries.get(key).copied()
    }

    fn put(&mut self, key: CameraStateKey, snapshot: CameraSnapshot) -> Result<(), PersistError> {
        self.entries.insert(key, snapshot);
        Ok(())
    }
}

/// Store backed by a RON file, rewritten on every `put`
#[derive(Debug, Clone)]
pub struct RonCameraStore {
    path: PathBuf,
    entries: BTreeMap<CameraStateKey, CameraSnapshot>,
}

impl RonCameraStore {
    /// Open the store at `path`; a missing file starts empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            let list: Vec<(CameraStateKey, CameraSnapshot)> =
                ron::from_str(&contents).map_err(|e| PersistError::Parse(e.to_string()))?;
            list.into_iter().collect()
        } else {
            BTreeMap::new()
        };

        log::debug!("Opened camera state store {} ({} entries)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), PersistError> {
        let list: Vec<(&CameraStateKey, &CameraSnapshot)> = self.entries.iter().collect();
        let contents = ron::ser::to_string_pretty(&list, ron::ser::PrettyConfig::default())
            .map_err(|e| PersistError::Serialize(e.to_string()))?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl CameraStateStore for RonCameraStore {
    fn get(&self, key: &CameraStateKey) -> Option<CameraSnapshot> {
        self.entries.get(key).copied()
    }

    fn put(&mut self, key: CameraStateKey, snapshot: CameraSnapshot) -> Result<(), PersistError> {
        self.entries.insert(key, snapshot);
        self.flush()
    }
}

/// Save `camera` for `document` under its projection kind
pub fn save_camera(
    store: &mut dyn CameraStateStore,
    document: &str,
    camera: &Camera,
) -> Result<(), PersistError> {
    store.put(CameraStateKey::new(document, camera.kind()), CameraSnapshot::capture(camera))
}

/// Restore `camera` for `document`. Returns `false` when nothing was stored.
pub fn restore_camera(store: &dyn CameraStateStore, document: &str, camera: &mut Camera) -> bool {
    match store.get(&CameraStateKey::new(document, camera.kind())) {
        Some(snapshot) => {
            snapshot.apply(camera);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn test_restore_is_partial() {
        let mut store = MemoryCameraStore::new();
        let mut camera = Camera::perspective(45.0, 1.0, 1.0, 100.0);
        camera.set_position(Vec3::new(1.0, 2.0, 3.0));
        camera.set_rotation(Quat::from_euler_angles(0.0, 0.5, 0.0));
        save_camera(&mut store, "/main/level.collection", &camera).unwrap();

        let mut restored = Camera::perspective(30.0, 1.0, 1.0, 100.0);
        assert!(restore_camera(&store, "/main/level.collection", &mut restored));
        assert_relative_eq!(restored.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(restored.fov(), 45.0);
        assert_relative_eq!(restored.rotation(), Quat::identity());
    }

    #[test]
    fn test_keys_separate_documents_and_kinds() {
        let mut store = MemoryCameraStore::new();
        let perspective = Camera::perspective(45.0, 1.0, 1.0, 100.0);
        let orthographic = Camera::orthographic(12.0, 1.0, -10.0, 10.0);
        save_camera(&mut store, "a", &perspective).unwrap();
        save_camera(&mut store, "a", &orthographic).unwrap();
        assert_eq!(store.len(), 2);

        let mut other = Camera::orthographic(100.0, 1.0, -10.0, 10.0);
        assert!(!restore_camera(&store, "b", &mut other));
        assert!(restore_camera(&store, "a", &mut other));
        assert_relative_eq!(other.fov(), 12.0);
    }

    #[test]
    fn test_ron_store_persists_across_open() {
        let path = std::env::temp_dir().join(format!("viewport_core_{}_cameras.ron", std::process::id()));
        std::fs::remove_file(&path).ok();

        let snapshot = CameraSnapshot { position: Vec3::new(-4.0, 0.5, 9.0), fov: 60.0 };
        {
            let mut store = RonCameraStore::open(&path).unwrap();
            store.put(CameraStateKey::new("scene", ProjectionKind::Perspective), snapshot).unwrap();
        }

        let store = RonCameraStore::open(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(store.get(&CameraStateKey::new("scene", ProjectionKind::Perspective)), Some(snapshot));
        assert_eq!(store.get(&CameraStateKey::new("scene", ProjectionKind::Orthographic)), None);
    }
}
