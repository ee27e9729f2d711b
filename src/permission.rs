//! Runtime permission groups and grant checks.
//!
//! Grant state lives with the platform. It is reached through
//! [`PermissionChecker`].

use bitflags::bitflags;
use std::collections::BTreeSet;

/// First SDK level with runtime permissions.
pub const RUNTIME_PERMISSION_SDK: u32 = 23;

/// Last SDK level without usage-stats app ops.
const LEGACY_USAGE_STATS_SDK: u32 = 19;

/// Manifest permission names.
pub mod manifest {
    /// Precise location.
    pub const ACCESS_FINE_LOCATION: &str = "android.permission.ACCESS_FINE_LOCATION";
    /// Approximate location.
    pub const ACCESS_COARSE_LOCATION: &str = "android.permission.ACCESS_COARSE_LOCATION";
    /// Network state.
    pub const ACCESS_NETWORK_STATE: &str = "android.permission.ACCESS_NETWORK_STATE";
    /// App usage statistics.
    pub const PACKAGE_USAGE_STATS: &str = "android.permission.PACKAGE_USAGE_STATS";
    /// Bluetooth connections.
    pub const BLUETOOTH: &str = "android.permission.BLUETOOTH";
    /// Bluetooth discovery and pairing.
    pub const BLUETOOTH_ADMIN: &str = "android.permission.BLUETOOTH_ADMIN";
    /// Write shared storage.
    pub const WRITE_EXTERNAL_STORAGE: &str = "android.permission.WRITE_EXTERNAL_STORAGE";
    /// Read shared storage.
    pub const READ_EXTERNAL_STORAGE: &str = "android.permission.READ_EXTERNAL_STORAGE";
    /// Camera.
    pub const CAMERA: &str = "android.permission.CAMERA";
    /// Microphone capture.
    pub const RECORD_AUDIO: &str = "android.permission.RECORD_AUDIO";
}

bitflags! {
    /// Feature-level permission groups.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PermissionType: u8 {
        /// Own location.
        const SELF_LOCATION = 1 << 0;
        /// App usage statistics.
        const USAGE_STATUS = 1 << 1;
        /// Bluetooth LE scanning.
        const BLUETOOTH_LE = 1 << 2;
        /// Map display with location and tile cache.
        const GOOGLE_MAP = 1 << 3;
        /// Shared storage access.
        const EXTERNAL_STORAGE = 1 << 4;
        /// Camera.
        const CAMERA = 1 << 5;
        /// Microphone capture.
        const RECORD_AUDIO = 1 << 6;
    }
}

/// Manifest permissions behind each group.
const GROUPS: &[(PermissionType, &[&str])] = {
    use manifest::*;
    &[
        (PermissionType::SELF_LOCATION, &[ACCESS_FINE_LOCATION, ACCESS_COARSE_LOCATION]),
        (PermissionType::USAGE_STATUS, &[PACKAGE_USAGE_STATS]),
        (PermissionType::BLUETOOTH_LE, &[BLUETOOTH, BLUETOOTH_ADMIN]),
        (
            PermissionType::GOOGLE_MAP,
            &[
                ACCESS_FINE_LOCATION,
                ACCESS_COARSE_LOCATION,
                ACCESS_NETWORK_STATE,
                WRITE_EXTERNAL_STORAGE,
            ],
        ),
        (PermissionType::EXTERNAL_STORAGE, &[WRITE_EXTERNAL_STORAGE, READ_EXTERNAL_STORAGE]),
        (PermissionType::CAMERA, &[CAMERA]),
        (PermissionType::RECORD_AUDIO, &[RECORD_AUDIO]),
    ]
};

impl PermissionType {
    /// Manifest permissions needed by every group in `self`, de-duplicated.
    pub fn permissions(self) -> BTreeSet<&'static str> {
        GROUPS
            .iter()
            .filter(|(group, _)| self.contains(*group))
            .flat_map(|(_, names)| names.iter().copied())
            .collect()
    }
}

/// Platform side of permission checks.
pub trait PermissionChecker {
    /// SDK level of the running platform.
    fn sdk_level(&self) -> u32;

    /// Whether `permission` is granted to this app.
    fn check_self_permission(&self, permission: &str) -> bool;

    /// Whether drawing over other apps is allowed.
    fn overlay_allowed(&self) -> bool {
        false
    }

    /// Whether the usage-stats app op is allowed.
    fn usage_stats_allowed(&self) -> bool {
        false
    }
}

/// Whether `sdk` has runtime permissions.
pub const fn supports_runtime_permission(sdk: u32) -> bool {
    sdk >= RUNTIME_PERMISSION_SDK
}

/// Union of the manifest permissions behind `types`.
pub fn list_permissions<I>(types: I) -> BTreeSet<&'static str>
where
    I: IntoIterator<Item = PermissionType>,
{
    types.into_iter().flat_map(PermissionType::permissions).collect()
}

/// Whether every permission behind `types` is granted.
///
/// Always true before runtime permissions existed.
pub fn is_runtime_permission_granted<C>(checker: &C, types: PermissionType) -> bool
where
    C: PermissionChecker + ?Sized,
{
    all_granted(checker, types.permissions())
}

/// Whether every named permission is granted.
///
/// Always true before runtime permissions existed.
pub fn all_granted<'a, C, I>(checker: &C, permissions: I) -> bool
where
    C: PermissionChecker + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    if !supports_runtime_permission(checker.sdk_level()) {
        return true;
    }
    permissions
        .into_iter()
        .all(|permission| checker.check_self_permission(permission))
}

/// Whether the app may draw over other apps.
pub fn can_draw_overlays<C>(checker: &C) -> bool
where
    C: PermissionChecker + ?Sized,
{
    !supports_runtime_permission(checker.sdk_level()) || checker.overlay_allowed()
}

/// Whether the app may read usage statistics.
pub fn is_usage_stats_allowed<C>(checker: &C) -> bool
where
    C: PermissionChecker + ?Sized,
{
    checker.sdk_level() <= LEGACY_USAGE_STATS_SDK || checker.usage_stats_allowed()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Platform {
        sdk: u32,
        granted: BTreeSet<&'static str>,
    }

    impl PermissionChecker for Platform {
        fn sdk_level(&self) -> u32 {
            self.sdk
        }

        fn check_self_permission(&self, permission: &str) -> bool {
            self.granted.contains(permission)
        }
    }

    #[test]
    fn test_group_union_is_deduplicated() {
        let names = (PermissionType::SELF_LOCATION | PermissionType::GOOGLE_MAP).permissions();
        assert_eq!(names.len(), 4);
        assert!(names.contains(manifest::ACCESS_NETWORK_STATE));

        let listed = list_permissions([PermissionType::EXTERNAL_STORAGE, PermissionType::GOOGLE_MAP]);
        assert_eq!(listed.len(), 5);
        assert!(list_permissions(Vec::<PermissionType>::new()).is_empty());
        assert!(PermissionType::empty().permissions().is_empty());
    }

    #[test]
    fn test_legacy_sdk_always_granted() {
        let platform = Platform {
            sdk: 22,
            granted: BTreeSet::new(),
        };
        assert!(is_runtime_permission_granted(&platform, PermissionType::all()));
        assert!(can_draw_overlays(&platform));
    }

    #[test]
    fn test_runtime_grants_checked() {
        let platform = Platform {
            sdk: 26,
            granted: PermissionType::CAMERA.permissions(),
        };
        assert!(is_runtime_permission_granted(&platform, PermissionType::CAMERA));
        assert!(!is_runtime_permission_granted(
            &platform,
            PermissionType::CAMERA | PermissionType::RECORD_AUDIO
        ));
        assert!(all_granted(&platform, [manifest::CAMERA]));
        assert!(!can_draw_overlays(&platform));
        assert!(!is_usage_stats_allowed(&platform));
    }

    #[test]
    fn test_runtime_support_boundary() {
        assert!(!supports_runtime_permission(22));
        assert!(supports_runtime_permission(RUNTIME_PERMISSION_SDK));
    }
}
