use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::driver::selector::TEXT_VIEW_CLASS;
use crate::driver::{Driver, DriverError, Selector};

/// Labels contributing to a signature after the activity.
pub const MAX_SIGNATURE_LABELS: usize = 2;

/// Labels at or above this many characters are content, not chrome.
pub const MAX_LABEL_CHARS: usize = 30;

const UNKNOWN_ACTIVITY: &str = "unknown";
const FALLBACK_PREFIX: &str = "screen_";

static FALLBACK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Identity of one logical screen: `activity|label|label`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenSignature(String);

impl ScreenSignature {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Activity component (everything before the first `|`).
    pub fn activity(&self) -> &str {
        self.0.split('|').next().unwrap_or_default()
    }

    /// Text labels that followed the activity.
    pub fn labels(&self) -> Vec<&str> {
        self.0.split('|').skip(1).collect()
    }

    /// Whether this value came from a failed measurement.
    pub fn is_fallback(&self) -> bool {
        self.0.starts_with(FALLBACK_PREFIX) && !self.0.contains('|')
    }

    /// Short stable hash, used where the signature itself is not a usable name.
    pub fn fingerprint(&self) -> String {
        use sha1::{Digest, Sha1};

        let mut hasher = Sha1::new();
        hasher.update(self.0.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..12].to_string()
    }

    /// Process-unique placeholder for a screen that could not be measured.
    pub fn fallback() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let seq = FALLBACK_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}{}_{}", FALLBACK_PREFIX, millis, seq))
    }
}

impl fmt::Display for ScreenSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScreenSignature {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Short, non-numeric text that plausibly names the screen.
pub fn is_signature_label(text: &str) -> bool {
    !text.is_empty()
        && text.chars().count() < MAX_LABEL_CHARS
        && !text.chars().all(|c| c.is_ascii_digit())
}

/// Measure the current screen. Never fails: a driver error yields a fresh fallback.
pub fn compute_signature(driver: &mut dyn Driver) -> ScreenSignature {
    match measure(driver) {
        Ok(signature) => signature,
        Err(e) => {
            let fallback = ScreenSignature::fallback();
            debug!(%fallback, "signature measurement failed: {}", e);
            fallback
        }
    }
}

fn measure(driver: &mut dyn Driver) -> Result<ScreenSignature, DriverError> {
    let activity = driver
        .current_activity()?
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_ACTIVITY.to_string());

    let mut parts = vec![activity];
    let labels = driver.find_all(&Selector::ByClass(TEXT_VIEW_CLASS.to_string()))?;

    for handle in labels {
        if parts.len() > MAX_SIGNATURE_LABELS {
            break;
        }
        // A label that vanished mid-scan just doesn't count
        let Ok(Some(text)) = driver.text(&handle) else {
            continue;
        };
        let text = text.trim();
        if is_signature_label(text) {
            parts.push(text.to_string());
        }
    }

    Ok(ScreenSignature(parts.join("|")))
}
