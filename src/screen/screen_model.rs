use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::explorer::nav_graph::NavigationStep;

/// Id characters taken from an element's text when nothing better exists.
const TEXT_ID_CHARS: usize = 20;

pub const UNKNOWN_ELEMENT_ID: &str = "unknown";

/// Attributes read off one native element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawElement {
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub content_desc: Option<String>,
    pub class_name: Option<String>,
}

impl RawElement {
    /// Stable id by precedence: resource id, text, description, class.
    pub fn derive_id(&self) -> String {
        if let Some(rid) = non_empty(&self.resource_id) {
            return short_name(rid, '/').to_string();
        }
        if let Some(text) = non_empty(&self.text) {
            let head: String = text.chars().take(TEXT_ID_CHARS).collect();
            return format!("text:{}", head);
        }
        if let Some(desc) = non_empty(&self.content_desc) {
            return format!("desc:{}", desc);
        }
        if let Some(class) = non_empty(&self.class_name) {
            return format!("class:{}", short_name(class, '.'));
        }
        UNKNOWN_ELEMENT_ID.to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn short_name(value: &str, separator: char) -> &str {
    value.rsplit(separator).next().unwrap_or(value)
}

/// Which discovery query surfaced an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRole {
    Clickable,
    TextField,
    TextView,
}

// ============================================================================
// ElementDescriptor
// ============================================================================

/// One interactive or text-bearing element of a screen.
///
/// Two descriptors are the same element iff their ids match; role flags and
/// trigger metadata do not take part in equality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: String,
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub content_desc: Option<String>,
    pub class_name: Option<String>,
    pub is_clickable: bool,
    pub is_text_field: bool,
    pub is_text_view: bool,

    /// Element that must be tapped first to make this one appear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_by: Option<String>,

    /// Path from the root to the screen hosting the trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_to_trigger: Option<Vec<NavigationStep>>,
}

impl ElementDescriptor {
    pub fn from_raw(raw: RawElement, role: ElementRole) -> Self {
        let id = raw.derive_id();
        let mut descriptor = Self {
            id,
            resource_id: raw.resource_id.filter(|v| !v.is_empty()),
            text: raw.text.filter(|v| !v.is_empty()),
            content_desc: raw.content_desc.filter(|v| !v.is_empty()),
            class_name: raw.class_name.filter(|v| !v.is_empty()),
            ..Default::default()
        };
        descriptor.add_role(role);
        descriptor
    }

    pub fn add_role(&mut self, role: ElementRole) {
        match role {
            ElementRole::Clickable => self.is_clickable = true,
            ElementRole::TextField => self.is_text_field = true,
            ElementRole::TextView => self.is_text_view = true,
        }
    }

    /// Fold another sighting of the same element into this one.
    pub fn merge(&mut self, other: &ElementDescriptor) {
        self.is_clickable |= other.is_clickable;
        self.is_text_field |= other.is_text_field;
        self.is_text_view |= other.is_text_view;
        if self.resource_id.is_none() {
            self.resource_id = other.resource_id.clone();
        }
        if self.text.is_none() {
            self.text = other.text.clone();
        }
        if self.content_desc.is_none() {
            self.content_desc = other.content_desc.clone();
        }
        if self.class_name.is_none() {
            self.class_name = other.class_name.clone();
        }
        if self.triggered_by.is_none() && other.triggered_by.is_some() {
            self.triggered_by = other.triggered_by.clone();
            self.path_to_trigger = other.path_to_trigger.clone();
        }
    }

    /// Human-facing name: text, then description, then id.
    pub fn label(&self) -> &str {
        self.text
            .as_deref()
            .or(self.content_desc.as_deref())
            .unwrap_or(&self.id)
    }

    pub fn is_unidentified(&self) -> bool {
        self.id == UNKNOWN_ELEMENT_ID && self.text.is_none() && self.content_desc.is_none()
    }
}

impl PartialEq for ElementDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ElementDescriptor {}

impl Hash for ElementDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
