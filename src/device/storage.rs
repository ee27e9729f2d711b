//! Storage: external storage discovery and capacity reporting.
//!
//! Discovery prefers a removable card and falls back to the default
//! external storage:
//!
//! 1. Non-default children of the storage root (`/storage/XXXX-XXXX`)
//! 2. Vendor-specific card mount points
//! 3. Storage environment variables
//! 4. Fallback directories (app files dir, `/sdcard`)

use crate::error::StorageError;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Bytes per gigabyte as reported by the `*_gb` accessors.
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Children of the storage root that belong to the platform, not a card.
const DEFAULT_EXCLUDED: &[&str] = &[
    // stock
    "emulated",
    "self",
    "sdcard0",
    // Samsung
    "Private",
    "UsbDriveA",
    "UsbDriveB",
    "UsbDriveC",
    "UsbDriveD",
    "UsbDriveE",
    "UsbDriveF",
    "knox-emulated",
];

/// Vendor-specific card mount points.
const DEFAULT_CUSTOM_PATHS: &[&str] = &["/mnt/sdcard/external_sd", "/storage/extSdCard"];

/// Environment variables that may name the external storage.
const DEFAULT_ENV_VARS: &[&str] = &["EXTERNAL_ALT_STORAGE", "EXTERNAL_STORAGE2", "EXTERNAL_STORAGE"];

/// Capacity of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceInfo {
    /// Total bytes.
    pub total: u64,
    /// Free bytes.
    pub free: u64,
}

/// Source of filesystem capacity figures.
pub trait FsStat {
    /// Capacity of the filesystem that contains `path`.
    fn stat(&self, path: &Path) -> Result<SpaceInfo, StorageError>;
}

/// [`FsStat`] backed by the mounted disk list from `sysinfo`.
///
/// Picks the disk whose mount point is the longest prefix of the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStat;

impl FsStat for DiskStat {
    fn stat(&self, path: &Path) -> Result<SpaceInfo, StorageError> {
        let path = path.canonicalize()?;
        let disks = Disks::new_with_refreshed_list();

        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| SpaceInfo {
                total: disk.total_space(),
                free: disk.available_space(),
            })
            .ok_or(StorageError::NoDisk(path))
    }
}

/// A storage root with its capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    root: PathBuf,
    max_size: u64,
    free_size: u64,
    sdcard: bool,
}

impl Storage {
    /// Read the capacity of the filesystem holding `root`.
    pub fn open(root: impl Into<PathBuf>, stat: &impl FsStat) -> Result<Self, StorageError> {
        Self::open_as(root.into(), false, stat)
    }

    fn open_as(root: PathBuf, sdcard: bool, stat: &impl FsStat) -> Result<Self, StorageError> {
        let info = stat.stat(&root)?;
        Ok(Self {
            root,
            max_size: info.total,
            free_size: info.free.min(info.total),
            sdcard,
        })
    }

    /// Refresh the free size. The total from the first reading is kept.
    pub fn reload(&mut self, stat: &impl FsStat) -> Result<&mut Self, StorageError> {
        let info = stat.stat(&self.root)?;
        self.free_size = info.free.min(self.max_size);
        Ok(self)
    }

    /// Storage root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Total bytes.
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Free bytes.
    pub const fn free_size(&self) -> u64 {
        self.free_size
    }

    /// Bytes in use.
    pub const fn used_size(&self) -> u64 {
        self.max_size.saturating_sub(self.free_size)
    }

    /// Total size in GB.
    #[allow(clippy::cast_precision_loss)]
    pub fn max_size_gb(&self) -> f64 {
        self.max_size as f64 / GIB
    }

    /// Free size in GB.
    #[allow(clippy::cast_precision_loss)]
    pub fn free_size_gb(&self) -> f64 {
        self.free_size as f64 / GIB
    }

    /// Used size in GB.
    #[allow(clippy::cast_precision_loss)]
    pub fn used_size_gb(&self) -> f64 {
        self.used_size() as f64 / GIB
    }

    /// Whether discovery found a removable card rather than the default
    /// external storage.
    pub const fn is_sdcard(&self) -> bool {
        self.sdcard
    }
}

/// A directory picked by [`StorageLocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCandidate {
    /// The directory.
    pub path: PathBuf,
    /// Found through the card lookups (steps 1 and 2).
    pub sdcard: bool,
}

/// Where to look for external storage.
#[derive(Debug, Clone)]
pub struct StorageLocator {
    /// Directory whose children may be card mounts.
    pub storage_root: PathBuf,
    /// Children of `storage_root` to skip.
    pub excluded_names: BTreeSet<String>,
    /// Vendor-specific card mount points.
    pub custom_paths: Vec<PathBuf>,
    /// Environment variables naming the external storage, in priority order.
    pub env_vars: Vec<String>,
    /// Last-resort directories, in priority order.
    pub fallback_paths: Vec<PathBuf>,
}

impl Default for StorageLocator {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("/storage"),
            excluded_names: DEFAULT_EXCLUDED.iter().map(|s| (*s).to_string()).collect(),
            custom_paths: DEFAULT_CUSTOM_PATHS.iter().map(PathBuf::from).collect(),
            env_vars: DEFAULT_ENV_VARS.iter().map(|s| (*s).to_string()).collect(),
            fallback_paths: vec![PathBuf::from("/sdcard")],
        }
    }
}

impl StorageLocator {
    /// Prefer the app's external files directory over the generic fallbacks.
    #[must_use]
    pub fn with_app_files_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fallback_paths.insert(0, dir.into());
        self
    }

    /// Find a storage directory using the process environment.
    pub fn find(&self) -> Option<StorageCandidate> {
        self.find_with_env(|name| std::env::var(name).ok())
    }

    /// Find a storage directory, reading variables through `env`.
    pub fn find_with_env<E>(&self, env: E) -> Option<StorageCandidate>
    where
        E: Fn(&str) -> Option<String>,
    {
        self.find_card()
            .map(|path| StorageCandidate { path, sdcard: true })
            .or_else(|| {
                self.env_vars
                    .iter()
                    .filter_map(|name| env(name))
                    .filter(|value| !value.is_empty())
                    .map(PathBuf::from)
                    .chain(self.fallback_paths.iter().cloned())
                    .find(|path| path.is_dir())
                    .map(|path| StorageCandidate { path, sdcard: false })
            })
    }

    /// Find a storage directory and read its capacity.
    pub fn locate(&self, stat: &impl FsStat) -> Result<Storage, StorageError> {
        let candidate = self.find().ok_or(StorageError::NotFound)?;
        tracing::debug!(path = %candidate.path.display(), sdcard = candidate.sdcard, "external storage found");
        Storage::open_as(candidate.path, candidate.sdcard, stat)
    }

    fn find_card(&self) -> Option<PathBuf> {
        let mut children: Vec<PathBuf> = fs::read_dir(&self.storage_root)
            .map(|entries| entries.filter_map(Result::ok).map(|entry| entry.path()).collect())
            .unwrap_or_default();
        children.sort();

        children
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| !self.excluded_names.contains(name))
            })
            .chain(self.custom_paths.iter().cloned())
            .find(|path| path.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Fixed total, adjustable free space.
    struct FakeStat {
        total: u64,
        free: std::cell::Cell<u64>,
    }

    impl FakeStat {
        fn new(total: u64, free: u64) -> Self {
            Self {
                total,
                free: std::cell::Cell::new(free),
            }
        }
    }

    impl FsStat for FakeStat {
        fn stat(&self, _path: &Path) -> Result<SpaceInfo, StorageError> {
            Ok(SpaceInfo {
                total: self.total,
                free: self.free.get(),
            })
        }
    }

    fn locator(root: &Path) -> StorageLocator {
        StorageLocator {
            storage_root: root.to_path_buf(),
            custom_paths: Vec::new(),
            fallback_paths: Vec::new(),
            ..StorageLocator::default()
        }
    }

    #[test]
    fn test_sizes_and_gb_conversion() {
        let stat = FakeStat::new(8 * 1024 * 1024 * 1024, 2 * 1024 * 1024 * 1024);
        let storage = Storage::open("/data", &stat).unwrap();

        assert_eq!(storage.path(), Path::new("/data"));
        assert!((storage.max_size_gb() - 8.0).abs() < f64::EPSILON);
        assert!((storage.free_size_gb() - 2.0).abs() < f64::EPSILON);
        assert!((storage.used_size_gb() - 6.0).abs() < f64::EPSILON);
        assert!(storage.max_size() >= storage.free_size());
        assert!(!storage.is_sdcard());
    }

    #[test]
    fn test_reload_keeps_total_and_clamps_free() {
        let stat = FakeStat::new(1000, 400);
        let mut storage = Storage::open("/data", &stat).unwrap();

        stat.free.set(100);
        storage.reload(&stat).unwrap();
        assert_eq!(storage.max_size(), 1000);
        assert_eq!(storage.free_size(), 100);
        assert_eq!(storage.used_size(), 900);

        stat.free.set(5000);
        storage.reload(&stat).unwrap();
        assert_eq!(storage.free_size(), 1000);
    }

    #[test]
    fn test_card_directory_wins() {
        let root = TempDir::new().unwrap();
        for name in ["emulated", "self", "knox-emulated", "ABCD-1234"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        fs::write(root.path().join("0000-file"), b"not a dir").unwrap();

        let found = locator(root.path()).find_with_env(|_| None).unwrap();
        assert_eq!(found.path, root.path().join("ABCD-1234"));
        assert!(found.sdcard);
    }

    #[test]
    fn test_custom_path_after_root_children() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("emulated")).unwrap();
        let vendor = TempDir::new().unwrap();

        let mut locator = locator(root.path());
        locator.custom_paths = vec![root.path().join("missing"), vendor.path().to_path_buf()];

        let found = locator.find_with_env(|_| None).unwrap();
        assert_eq!(found.path, vendor.path());
        assert!(found.sdcard);
    }

    #[test]
    fn test_env_vars_in_priority_order() {
        let root = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();
        let primary = TempDir::new().unwrap();

        let env: HashMap<&str, String> = HashMap::from([
            ("EXTERNAL_ALT_STORAGE", String::new()),
            ("EXTERNAL_STORAGE2", alt.path().display().to_string()),
            ("EXTERNAL_STORAGE", primary.path().display().to_string()),
        ]);

        let found = locator(root.path())
            .find_with_env(|name| env.get(name).cloned())
            .unwrap();
        assert_eq!(found.path, alt.path());
        assert!(!found.sdcard);
    }

    #[test]
    fn test_fallback_and_not_found() {
        let root = TempDir::new().unwrap();
        let app_dir = TempDir::new().unwrap();

        let found = locator(root.path())
            .with_app_files_dir(app_dir.path())
            .find_with_env(|_| None)
            .unwrap();
        assert_eq!(found.path, app_dir.path());

        let missing = locator(&root.path().join("nope"));
        assert!(missing.find_with_env(|_| None).is_none());
    }

    #[test]
    fn test_locate_reports_not_found() {
        let root = TempDir::new().unwrap();
        let mut locator = locator(root.path());
        locator.env_vars.clear();

        let err = locator.locate(&FakeStat::new(1, 1)).unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[test]
    fn test_disk_stat_on_temp_dir() {
        let dir = TempDir::new().unwrap();
        // Some sandboxes mount nothing sysinfo reports; only check consistency.
        if let Ok(info) = DiskStat.stat(dir.path()) {
            assert!(info.total >= info.free);
        }

        let missing = dir.path().join("missing");
        assert!(matches!(DiskStat.stat(&missing), Err(StorageError::Io(_))));
    }
}
