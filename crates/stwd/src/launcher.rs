//! Home-screen launcher classification.

use std::collections::HashSet;

use stw_core::AppId;

/// Decides whether an application is the home screen / launcher.
///
/// A launcher in the foreground does not count as usage and never
/// starts a session.
pub trait LauncherClassifier: Send + Sync {
    fn is_home_launcher(&self, app: &AppId) -> bool;
}

/// Launchers listed in the configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLaunchers {
    apps: HashSet<AppId>,
}

impl ConfiguredLaunchers {
    pub fn new<I, S>(apps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<AppId>,
    {
        Self {
            apps: apps
                .into_iter()
                .map(Into::into)
                .filter(|app: &AppId| !app.is_blank())
                .collect(),
        }
    }
}

impl LauncherClassifier for ConfiguredLaunchers {
    fn is_home_launcher(&self, app: &AppId) -> bool {
        self.apps.contains(app)
    }
}
