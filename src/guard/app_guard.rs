use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::driver::selector::{BUTTON_CLASS, Selector, text_contains_any_xpath};
use crate::driver::Driver;

/// Phrasings Android uses for crash and ANR dialogs.
pub const CRASH_PHRASES: &[&str] = &[
    "has stopped",
    "keeps stopping",
    "isn't responding",
    "Unfortunately",
];

/// Dismiss buttons tried in order before falling back to any button.
pub const DISMISS_TEXTS: &[&str] = &["Close app", "Close", "OK", "Force close", "Wait"];

/// Crash recoveries tolerated within one run.
pub const MAX_CRASH_RECOVERY: u32 = 3;

/// Foreground activities that mean the device fell back to its home surface.
const HOME_ACTIVITY_MARKERS: &[&str] = &[
    ".Launcher",
    "launcher3",
    "NexusLauncher",
    "FallbackHome",
    "RecentsActivity",
];

/// Foreground activities that mean the app handed off to system settings.
const SETTINGS_ACTIVITY_MARKERS: &[&str] = &["com.android.settings"];

/// Foreground packages that only show up once the app's task is gone.
const HOME_PACKAGE_MARKERS: &[&str] = &["launcher", "com.android.systemui", "miui.home"];

fn is_home_activity(activity: &str) -> bool {
    HOME_ACTIVITY_MARKERS.iter().any(|m| activity.contains(m))
}

/// Whether `package` is a launcher or system UI rather than another app.
pub fn is_home_package(package: &str) -> bool {
    HOME_PACKAGE_MARKERS.iter().any(|m| package.contains(m))
}

/// Selector matching any visible crash or ANR message.
pub fn crash_text_selector() -> Selector {
    Selector::ByXPath(text_contains_any_xpath(CRASH_PHRASES))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Healthy,
    CrashDialogDetected,
    OutsideApp,
    FatallyUnrecoverable,
}

/// How thorough a health check `recover` should run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDepth {
    /// Package check only; used around every interaction
    Quick,
    /// Package plus foreground-activity check; used on screen entry
    Deep,
}

/// Something the guard did that the run log should record.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardEvent {
    /// Another app or a settings screen took the foreground
    LeftApp { package: Option<String> },
    /// The device fell back to the launcher: the app's task is gone
    AppDied { package: Option<String> },
    CrashDismissed { crash_count: u32 },
    CeilingReached { crash_count: u32 },
    Restarted,
    RestartFailed,
}

// ============================================================================
// AppGuard
// ============================================================================

/// Crash detection and recovery for one exploration run.
///
/// The guard never touches the navigation graph. It reports what it did as
/// `GuardEvent`s, which the explorer drains into its incident log.
#[derive(Debug)]
pub struct AppGuard {
    target_package: String,
    max_crashes: u32,
    crash_count: u32,
    retry_pause_ms: u64,
    restart_settle_ms: u64,
    events: Vec<GuardEvent>,
}

impl AppGuard {
    pub fn new(target_package: &str) -> Self {
        Self {
            target_package: target_package.to_string(),
            max_crashes: MAX_CRASH_RECOVERY,
            crash_count: 0,
            retry_pause_ms: 500,
            restart_settle_ms: 3000,
            events: Vec::new(),
        }
    }

    pub fn with_max_crashes(mut self, max_crashes: u32) -> Self {
        self.max_crashes = max_crashes;
        self
    }

    pub fn with_pacing(mut self, retry_pause_ms: u64, restart_settle_ms: u64) -> Self {
        self.retry_pause_ms = retry_pause_ms;
        self.restart_settle_ms = restart_settle_ms;
        self
    }

    pub fn crash_count(&self) -> u32 {
        self.crash_count
    }

    /// Count a crash without touching the driver.
    pub fn record_crash(&mut self) {
        self.crash_count += 1;
        self.events.push(GuardEvent::CrashDismissed {
            crash_count: self.crash_count,
        });
    }

    pub fn ceiling_reached(&self) -> bool {
        self.crash_count >= self.max_crashes
    }

    /// Drain the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<GuardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether `package` belongs to the app under test.
    pub fn owns_package(&self, package: &str) -> bool {
        package == self.target_package
            || package
                .strip_prefix(self.target_package.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
    }

    // ------------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------------

    /// Cheap package check run before and after every interaction.
    pub fn quick_health_check(&self, driver: &mut dyn Driver) -> HealthState {
        let package = match driver.current_package() {
            Ok(Some(p)) => Some(p),
            _ => {
                driver.settle(self.retry_pause_ms);
                driver.current_package().ok().flatten()
            }
        };

        match package {
            Some(p) if self.owns_package(&p) => HealthState::Healthy,
            Some(p) => {
                debug!(package = %p, "foreground package is not the target");
                HealthState::OutsideApp
            }
            // Package unknown twice; the raw hierarchy still names its owner
            None => match driver.page_source() {
                Ok(source) if source.contains(&format!("package=\"{}\"", self.target_package)) => {
                    HealthState::Healthy
                }
                _ => HealthState::OutsideApp,
            },
        }
    }

    /// Quick check plus detection of launcher/home/settings surfaces.
    pub fn deep_health_check(&self, driver: &mut dyn Driver) -> HealthState {
        let quick = self.quick_health_check(driver);
        if quick != HealthState::Healthy {
            return quick;
        }

        match driver.current_activity() {
            Ok(Some(activity))
                if is_home_activity(&activity)
                    || SETTINGS_ACTIVITY_MARKERS.iter().any(|m| activity.contains(m)) =>
            {
                debug!(%activity, "foreground activity is a system surface");
                HealthState::OutsideApp
            }
            _ => HealthState::Healthy,
        }
    }

    /// Run a check of the given depth, short-circuiting once the crash ceiling is reached.
    pub fn check(&self, driver: &mut dyn Driver, depth: CheckDepth) -> HealthState {
        if self.ceiling_reached() {
            return HealthState::FatallyUnrecoverable;
        }
        match depth {
            CheckDepth::Quick => self.quick_health_check(driver),
            CheckDepth::Deep => self.deep_health_check(driver),
        }
    }

    /// Look for an OS crash/ANR dialog. A failed query is not proof of a crash.
    pub fn crash_dialog_check(&self, driver: &mut dyn Driver) -> HealthState {
        match driver.find_all(&crash_text_selector()) {
            Ok(found) if !found.is_empty() => HealthState::CrashDialogDetected,
            Ok(_) => HealthState::Healthy,
            Err(e) => {
                debug!("crash dialog query failed: {}", e);
                HealthState::OutsideApp
            }
        }
    }

    /// Best-effort dismissal. Returns whether anything was tapped.
    pub fn dismiss_crash_dialog(&self, driver: &mut dyn Driver) -> bool {
        for text in DISMISS_TEXTS {
            if let Ok(found) = driver.find_all(&Selector::ByText(text.to_string())) {
                if let Some(button) = found.first() {
                    if driver.tap(button).is_ok() {
                        debug!(button = %text, "dismissed crash dialog");
                        driver.settle(self.retry_pause_ms);
                        return true;
                    }
                }
            }
        }

        if let Ok(found) = driver.find_all(&Selector::ByClass(BUTTON_CLASS.to_string())) {
            if let Some(button) = found.first() {
                if driver.tap(button).is_ok() {
                    driver.settle(self.retry_pause_ms);
                    return true;
                }
            }
        }

        warn!("crash dialog detected but nothing could be tapped");
        false
    }

    // ------------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------------

    /// Bring the app back to a usable state. `false` means give up on this branch.
    pub fn recover(&mut self, driver: &mut dyn Driver, depth: CheckDepth) -> bool {
        let health = self.check(driver, depth);
        if health == HealthState::FatallyUnrecoverable {
            return false;
        }

        if health == HealthState::Healthy {
            match self.crash_dialog_check(driver) {
                HealthState::Healthy => return true,
                HealthState::CrashDialogDetected => {
                    self.dismiss_crash_dialog(driver);
                    self.record_crash();
                    warn!(crash_count = self.crash_count, "app crashed; dialog dismissed");
                    if self.ceiling_reached() {
                        warn!("crash ceiling reached, exploration branch is unrecoverable");
                        self.events.push(GuardEvent::CeilingReached {
                            crash_count: self.crash_count,
                        });
                        return false;
                    }
                    return true;
                }
                _ => {}
            }
        }

        let exit = self.classify_exit(driver);
        match &exit {
            GuardEvent::AppDied { package } => {
                warn!(package = ?package, "app died, device is back on the home screen")
            }
            other => warn!(event = ?other, "app is not in the foreground"),
        }
        self.events.push(exit);

        // Not counted: the restart below resets the counter anyway
        if self.crash_dialog_check(driver) == HealthState::CrashDialogDetected {
            self.dismiss_crash_dialog(driver);
            self.events.push(GuardEvent::CrashDismissed {
                crash_count: self.crash_count,
            });
        }

        self.restart_app(driver)
    }

    /// Tell a dead app apart from a hand-off to another package.
    ///
    /// A launcher in front means the task is gone, which on Android is what a
    /// silent crash looks like. Any other package is an ordinary hand-off. An
    /// unknown package proves nothing either way.
    pub fn classify_exit(&self, driver: &mut dyn Driver) -> GuardEvent {
        let package = driver.current_package().ok().flatten();
        let died = match package.as_deref() {
            // Still ours, so the deep check flagged the foreground activity
            Some(p) if self.owns_package(p) => {
                matches!(driver.current_activity(), Ok(Some(a)) if is_home_activity(&a))
            }
            Some(p) => is_home_package(p),
            None => false,
        };

        if died {
            GuardEvent::AppDied { package }
        } else {
            GuardEvent::LeftApp { package }
        }
    }

    /// Activate the app, escalating to terminate + activate. Resets the crash
    /// counter when the app comes back healthy.
    pub fn restart_app(&mut self, driver: &mut dyn Driver) -> bool {
        info!(package = %self.target_package, "restarting app");

        if let Err(e) = driver.activate_app(&self.target_package) {
            debug!("activate failed: {}", e);
        }
        driver.settle(self.restart_settle_ms);

        if self.quick_health_check(driver) != HealthState::Healthy {
            if let Err(e) = driver.terminate_app(&self.target_package) {
                debug!("terminate failed: {}", e);
            }
            driver.settle(self.retry_pause_ms);
            if let Err(e) = driver.activate_app(&self.target_package) {
                debug!("activate after terminate failed: {}", e);
            }
            driver.settle(self.restart_settle_ms);

            if self.quick_health_check(driver) != HealthState::Healthy {
                warn!(package = %self.target_package, "app could not be restarted");
                self.events.push(GuardEvent::RestartFailed);
                return false;
            }
        }

        self.crash_count = 0;
        self.events.push(GuardEvent::Restarted);
        true
    }
}
