use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::screen::{ElementDescriptor, ScreenSignature};

// ============================================================================
// Explorer configuration
// ============================================================================

/// How the engine decides a screen has already been covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DedupMode {
    /// A screen is explored once per run, whatever the depth it is reached at
    #[default]
    Signature,
    /// A screen is re-explored each time it is reached at a new depth
    SignatureAndDepth,
}

/// Settle pauses, in milliseconds, after each kind of mutating action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub after_tap_ms: u64,
    pub after_type_ms: u64,
    pub after_back_ms: u64,
    pub after_scroll_ms: u64,
    pub after_restart_ms: u64,
    pub retry_pause_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            after_tap_ms: 1000,
            after_type_ms: 300,
            after_back_ms: 800,
            after_scroll_ms: 500,
            after_restart_ms: 3000,
            retry_pause_ms: 500,
        }
    }
}

impl Pacing {
    /// No pauses at all; for scripted drivers.
    pub fn none() -> Self {
        Self {
            after_tap_ms: 0,
            after_type_ms: 0,
            after_back_ms: 0,
            after_scroll_ms: 0,
            after_restart_ms: 0,
            retry_pause_ms: 0,
        }
    }
}

/// Configuration for one exploration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Package of the app under test
    pub app_package: String,

    /// Maximum recursion depth (default 5)
    pub max_depth: usize,

    /// Type generated values into text fields (default true)
    pub fill_forms: bool,

    /// Scroll each screen to reveal elements below the fold (default true)
    pub scroll_to_discover: bool,

    /// Flip each switch/checkbox and flip it back (default true)
    pub toggle_switches: bool,

    /// Wall-clock budget for the whole run (default 300)
    pub timeout_secs: u64,

    /// Consecutive identical visits before backing out (default 3)
    pub stuck_threshold: u32,

    /// Crash recoveries tolerated per run (default 3)
    pub max_crash_recoveries: u32,

    pub dedup: DedupMode,

    pub pacing: Pacing,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            app_package: String::new(),
            max_depth: 5,
            fill_forms: true,
            scroll_to_discover: true,
            toggle_switches: true,
            timeout_secs: 300,
            stuck_threshold: 3,
            max_crash_recoveries: 3,
            dedup: DedupMode::Signature,
            pacing: Pacing::default(),
        }
    }
}

impl ExplorerConfig {
    pub fn for_package(app_package: &str) -> Self {
        Self {
            app_package: app_package.to_string(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Navigation graph data model
// ============================================================================

/// One observed transition: tapping `element_tapped` on `from_screen` led to `to_screen`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavigationStep {
    pub from_screen: ScreenSignature,
    pub element_tapped: String,
    pub to_screen: ScreenSignature,
}

/// A discovered screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenNode {
    pub id: ScreenSignature,

    /// Shortest known path from the root screen; empty for the root itself
    pub path_from_root: Option<Vec<NavigationStep>>,

    /// Known elements, unique by id, in discovery order
    pub elements: Vec<ElementDescriptor>,

    /// Transitions out of this screen, unique, in discovery order
    pub outgoing_edges: Vec<NavigationStep>,
}

impl ScreenNode {
    pub fn new(id: ScreenSignature) -> Self {
        Self {
            id,
            path_from_root: None,
            elements: Vec::new(),
            outgoing_edges: Vec::new(),
        }
    }

    /// Record `path` if it is the first known path or strictly shorter than the current one.
    pub fn offer_path(&mut self, path: &[NavigationStep]) -> bool {
        let shorter = match &self.path_from_root {
            None => true,
            Some(existing) => path.len() < existing.len(),
        };
        if shorter {
            self.path_from_root = Some(path.to_vec());
        }
        shorter
    }

    /// Add unseen elements; known ones absorb any new role flags. Returns how many were new.
    pub fn merge_elements(&mut self, elements: &[ElementDescriptor]) -> usize {
        let mut added = 0;
        for element in elements {
            match self.elements.iter_mut().find(|e| e.id == element.id) {
                Some(existing) => existing.merge(element),
                None => {
                    self.elements.push(element.clone());
                    added += 1;
                }
            }
        }
        added
    }

    pub fn add_edge(&mut self, step: NavigationStep) -> bool {
        if self.outgoing_edges.contains(&step) {
            return false;
        }
        self.outgoing_edges.push(step);
        true
    }

    pub fn element(&self, id: &str) -> Option<&ElementDescriptor> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn clickables(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.elements.iter().filter(|e| e.is_clickable)
    }

    pub fn text_fields(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.elements.iter().filter(|e| e.is_text_field)
    }
}

/// Every screen discovered in a run and the edges between them.
///
/// Grows monotonically; nodes are keyed by signature alone, so a screen is
/// never represented twice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationGraph {
    pub root: Option<ScreenSignature>,
    pub screens: BTreeMap<ScreenSignature, ScreenNode>,
}

impl NavigationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the node for `signature`, creating it on first sight.
    pub fn node_mut(&mut self, signature: &ScreenSignature) -> &mut ScreenNode {
        self.screens
            .entry(signature.clone())
            .or_insert_with(|| ScreenNode::new(signature.clone()))
    }

    pub fn node(&self, signature: &ScreenSignature) -> Option<&ScreenNode> {
        self.screens.get(signature)
    }

    pub fn has_screen(&self, signature: &ScreenSignature) -> bool {
        self.screens.contains_key(signature)
    }

    pub fn screen_count(&self) -> usize {
        self.screens.len()
    }

    pub fn total_elements(&self) -> usize {
        self.screens.values().map(|n| n.elements.len()).sum()
    }

    /// All edges, grouped by source screen in signature order.
    pub fn edges(&self) -> impl Iterator<Item = &NavigationStep> {
        self.screens.values().flat_map(|n| n.outgoing_edges.iter())
    }

    /// Element `element_id` as known on `screen`.
    pub fn element(&self, screen: &ScreenSignature, element_id: &str) -> Option<&ElementDescriptor> {
        self.node(screen).and_then(|n| n.element(element_id))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
