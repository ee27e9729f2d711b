//! Device: host storage discovery.

mod storage;

pub use storage::{DiskStat, FsStat, SpaceInfo, Storage, StorageCandidate, StorageLocator};
