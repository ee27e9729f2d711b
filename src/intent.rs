//! Settings intents and launching them with a fallback.

use std::fmt;

/// Open the details screen of one app.
pub const ACTION_APPLICATION_DETAILS_SETTINGS: &str = "android.settings.APPLICATION_DETAILS_SETTINGS";
/// Open the "draw over other apps" screen of one app.
pub const ACTION_MANAGE_OVERLAY_PERMISSION: &str = "android.settings.action.MANAGE_OVERLAY_PERMISSION";
/// Open the usage access screen.
pub const ACTION_USAGE_ACCESS_SETTINGS: &str = "android.settings.USAGE_ACCESS_SETTINGS";

/// An action plus optional data URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Intent {
    /// Action name.
    pub action: String,
    /// Data URI, if any.
    pub data: Option<String>,
}

impl Intent {
    /// Create an intent without data.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            data: None,
        }
    }

    /// Attach a data URI.
    #[must_use]
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// App details settings for `package`.
    pub fn app_settings(package: &str) -> Self {
        Self::new(ACTION_APPLICATION_DETAILS_SETTINGS).with_data(package_uri(package))
    }

    /// Overlay permission settings for `package`.
    pub fn overlay_settings(package: &str) -> Self {
        Self::new(ACTION_MANAGE_OVERLAY_PERMISSION).with_data(package_uri(package))
    }

    /// Usage access settings.
    pub fn usage_access_settings() -> Self {
        Self::new(ACTION_USAGE_ACCESS_SETTINGS)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(data) => write!(f, "{} ({data})", self.action),
            None => f.write_str(&self.action),
        }
    }
}

/// `package:` URI for an application id.
pub fn package_uri(package: &str) -> String {
    format!("package:{package}")
}

/// Something that can start an activity for an intent.
pub trait ActivityLauncher {
    /// Launch failure.
    type Error: fmt::Debug;

    /// Start the activity that handles `intent`.
    fn start_activity(&self, intent: &Intent) -> Result<(), Self::Error>;
}

/// Open a settings screen, falling back to the app details screen.
///
/// Some vendors ship without the more specific screens. When `intent`
/// cannot be launched, the app details settings for `package` are opened
/// instead and that launch's result is returned.
pub fn show_app_setting<L>(launcher: &L, package: &str, intent: &Intent) -> Result<(), L::Error>
where
    L: ActivityLauncher + ?Sized,
{
    match launcher.start_activity(intent) {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(%intent, error = ?e, "settings screen unavailable, opening app details");
            launcher.start_activity(&Intent::app_settings(package))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Records launches and rejects one action.
    struct Recorder {
        rejected: &'static str,
        launched: RefCell<Vec<Intent>>,
    }

    impl ActivityLauncher for Recorder {
        type Error = String;

        fn start_activity(&self, intent: &Intent) -> Result<(), String> {
            if intent.action == self.rejected {
                return Err(format!("no activity for {}", intent.action));
            }
            self.launched.borrow_mut().push(intent.clone());
            Ok(())
        }
    }

    #[test]
    fn test_settings_intents() {
        let intent = Intent::app_settings("com.example.app");
        assert_eq!(intent.action, ACTION_APPLICATION_DETAILS_SETTINGS);
        assert_eq!(intent.data.as_deref(), Some("package:com.example.app"));

        let overlay = Intent::overlay_settings("com.example.app");
        assert_eq!(overlay.action, ACTION_MANAGE_OVERLAY_PERMISSION);

        let usage = Intent::usage_access_settings();
        assert!(usage.data.is_none());
        assert_eq!(usage.to_string(), ACTION_USAGE_ACCESS_SETTINGS);
    }

    #[test]
    fn test_launch_without_fallback() {
        let launcher = Recorder {
            rejected: "none",
            launched: RefCell::new(Vec::new()),
        };
        let overlay = Intent::overlay_settings("com.example.app");

        show_app_setting(&launcher, "com.example.app", &overlay).unwrap();
        assert_eq!(launcher.launched.borrow().as_slice(), &[overlay]);
    }

    #[test]
    fn test_falls_back_to_app_details() {
        let launcher = Recorder {
            rejected: ACTION_USAGE_ACCESS_SETTINGS,
            launched: RefCell::new(Vec::new()),
        };

        show_app_setting(&launcher, "com.example.app", &Intent::usage_access_settings()).unwrap();
        assert_eq!(
            launcher.launched.borrow().as_slice(),
            &[Intent::app_settings("com.example.app")]
        );
    }

    #[test]
    fn test_fallback_failure_is_returned() {
        let launcher = Recorder {
            rejected: ACTION_APPLICATION_DETAILS_SETTINGS,
            launched: RefCell::new(Vec::new()),
        };
        let intent = Intent::app_settings("com.example.app");
        assert!(show_app_setting(&launcher, "com.example.app", &intent).is_err());
    }
}
