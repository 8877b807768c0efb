use std::collections::HashSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::screen::ScreenSignature;

use super::nav_graph::DedupMode;

// ============================================================================
// Bookkeeping keys
// ============================================================================

/// Key under which a screen visit is deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VisitKey {
    pub signature: ScreenSignature,
    pub depth: Option<usize>,
}

impl VisitKey {
    pub fn new(mode: DedupMode, signature: &ScreenSignature, depth: usize) -> Self {
        Self {
            signature: signature.clone(),
            depth: match mode {
                DedupMode::Signature => None,
                DedupMode::SignatureAndDepth => Some(depth),
            },
        }
    }
}

/// Where an element was interacted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementNamespace {
    /// Tapped straight from the screen
    Direct,
    /// Tapped after re-opening the popup/menu that reveals it
    Menu,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementKey {
    pub screen: ScreenSignature,
    pub namespace: ElementNamespace,
    pub element_id: String,
}

impl ElementKey {
    pub fn direct(screen: &ScreenSignature, element_id: &str) -> Self {
        Self {
            screen: screen.clone(),
            namespace: ElementNamespace::Direct,
            element_id: element_id.to_string(),
        }
    }

    pub fn menu(screen: &ScreenSignature, element_id: &str) -> Self {
        Self {
            screen: screen.clone(),
            namespace: ElementNamespace::Menu,
            element_id: element_id.to_string(),
        }
    }
}

// ============================================================================
// Interaction and incident logs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionOutcome {
    Navigated { to: ScreenSignature },
    Popup { revealed: usize },
    NoChange,
    Filled { value: String },
    Toggled,
    Crashed,
    Failed { reason: String },
}

/// One action the engine performed on an element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub screen: ScreenSignature,
    pub element_id: String,
    /// Trigger re-opened before the tap, for popup items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_trigger: Option<String>,
    pub depth: usize,
    pub outcome: InteractionOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentKind {
    /// The OS showed a crash or ANR dialog
    Crash,
    /// Crash recoveries exhausted
    CrashCeiling,
    /// The app could not be brought back to the foreground
    RestartFailed,
    /// Another package took the foreground
    LeftApp,
    /// The device fell back to the launcher mid-run
    AppDied,
    /// The app was restarted successfully
    Restarted,
    /// The same screen kept coming back
    Stuck,
    /// Back did not lead to the expected screen
    ReturnFailed,
    /// An element could not be resolved or tapped
    InteractionFailed,
    /// A driver query failed outright
    DriverError,
    /// The run hit its wall-clock budget
    Timeout,
}

impl IncidentKind {
    /// Crash-grade incidents point at app instability; the rest is automation noise.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            IncidentKind::Crash
                | IncidentKind::AppDied
                | IncidentKind::CrashCeiling
                | IncidentKind::RestartFailed
        )
    }

    /// Incidents that count as one crash of the app under test.
    pub fn is_crash(&self) -> bool {
        matches!(self, IncidentKind::Crash | IncidentKind::AppDied)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub kind: IncidentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<ScreenSignature>,
    pub detail: String,
    pub elapsed_ms: u128,
}

impl Incident {
    pub fn is_critical(&self) -> bool {
        self.kind.is_critical()
    }
}

// ============================================================================
// ExplorationState
// ============================================================================

/// Mutable bookkeeping for one `explore()` call.
#[derive(Debug)]
pub struct ExplorationState {
    pub visited: HashSet<VisitKey>,
    pub interacted: HashSet<ElementKey>,
    pub interactions: Vec<Interaction>,
    pub incidents: Vec<Incident>,
    pub stuck_count: u32,
    pub stuck_escapes: u32,
    pub last_signature: Option<ScreenSignature>,
    pub depth: usize,
    pub started: Instant,
    pub timed_out: bool,
    /// Set once the guard gave up on the app
    pub fatal: bool,
}

impl Default for ExplorationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ExplorationState {
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            interacted: HashSet::new(),
            interactions: Vec::new(),
            incidents: Vec::new(),
            stuck_count: 0,
            stuck_escapes: 0,
            last_signature: None,
            depth: 0,
            started: Instant::now(),
            timed_out: false,
            fatal: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Returns false when the key was already visited.
    pub fn mark_visited(&mut self, key: VisitKey) -> bool {
        self.visited.insert(key)
    }

    pub fn has_interacted(&self, key: &ElementKey) -> bool {
        self.interacted.contains(key)
    }

    pub fn mark_interacted(&mut self, key: ElementKey) -> bool {
        self.interacted.insert(key)
    }

    /// Track consecutive visits to the same signature.
    ///
    /// Returns true when `threshold` repeats in a row have been seen; the
    /// counter restarts after each such escape. Only the signature sequence is
    /// visible here, so several siblings opening the same detail screen look
    /// exactly like a modal that keeps reopening itself, and both trip it.
    pub fn observe_visit(&mut self, signature: &ScreenSignature, threshold: u32) -> bool {
        if self.last_signature.as_ref() == Some(signature) {
            self.stuck_count += 1;
        } else {
            self.stuck_count = 0;
            self.last_signature = Some(signature.clone());
        }

        if threshold > 0 && self.stuck_count >= threshold {
            self.stuck_count = 0;
            self.stuck_escapes += 1;
            return true;
        }
        false
    }

    pub fn record_interaction(
        &mut self,
        screen: &ScreenSignature,
        element_id: &str,
        via_trigger: Option<&str>,
        outcome: InteractionOutcome,
    ) {
        self.interactions.push(Interaction {
            screen: screen.clone(),
            element_id: element_id.to_string(),
            via_trigger: via_trigger.map(str::to_string),
            depth: self.depth,
            outcome,
        });
    }

    pub fn record_incident(
        &mut self,
        kind: IncidentKind,
        screen: Option<&ScreenSignature>,
        detail: impl Into<String>,
    ) {
        self.incidents.push(Incident {
            kind,
            screen: screen.cloned(),
            detail: detail.into(),
            elapsed_ms: self.elapsed().as_millis(),
        });
    }
}
