use std::collections::HashSet;

use serde::Serialize;

use crate::screen::{ElementDescriptor, ScreenSignature};

use super::nav_graph::{NavigationGraph, NavigationStep, ScreenNode};
use super::policy::{generate_test_value, is_crash_artifact, should_skip};

pub const MAX_NAVIGATION_SCENARIOS: usize = 20;
pub const MAX_ELEMENT_SCENARIOS: usize = 30;
pub const MAX_JOURNEY_SCREENS: usize = 3;

/// Widget-type suffixes dropped from ids when building readable names.
const WIDGET_SUFFIXES: &[&str] = &["Button", "Btn", "IV", "Bt", "RL", "TV", "ET"];

const GIVEN_APP_RUNNING: &str = "Given the app is running";

// ============================================================================
// Generated artifacts
// ============================================================================

/// One Gherkin scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub tag: String,
    pub name: String,
    pub comments: Vec<String>,
    /// Full step lines, keyword included
    pub steps: Vec<String>,
}

/// One `.feature` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub file_name: String,
    pub tags: Vec<String>,
    pub title: String,
    pub description: Vec<String>,
    pub scenarios: Vec<Scenario>,
}

impl Feature {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.tags.join(" "));
        out.push('\n');
        out.push_str(&format!("Feature: {}\n", self.title));
        for line in &self.description {
            out.push_str(&format!("  {}\n", line));
        }
        out.push('\n');

        for scenario in &self.scenarios {
            out.push_str(&format!("  {}\n", scenario.tag));
            out.push_str(&format!("  Scenario: {}\n", scenario.name));
            for comment in &scenario.comments {
                out.push_str(&format!("    # {}\n", comment));
            }
            for step in &scenario.steps {
                out.push_str(&format!("    {}\n", step));
            }
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenObjectElement {
    pub constant: String,
    pub locator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreenOperation {
    Tap { name: String, element: String },
    EnterText { name: String, element: String },
}

/// Reusable description of one screen: its locators, the operations on
/// them, how to reach it, and how to tell it is showing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenObject {
    pub name: String,
    pub signature: ScreenSignature,
    pub elements: Vec<ScreenObjectElement>,
    pub operations: Vec<ScreenOperation>,
    /// Ids to tap from the root, menu triggers included
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub navigate_here: Vec<String>,
    pub is_displayed: Option<String>,
}

impl ScreenObject {
    pub fn file_name(&self) -> String {
        format!("{}.yaml", self.name)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedSuite {
    pub features: Vec<Feature>,
    pub screen_objects: Vec<ScreenObject>,
}

impl GeneratedSuite {
    pub fn scenario_count(&self) -> usize {
        self.features.iter().map(|f| f.scenarios.len()).sum()
    }
}

// ============================================================================
// Suite generation from a NavigationGraph
// ============================================================================

/// Generate the regression suite for a finished crawl.
///
/// Produces navigation, element-interaction, form and smoke features plus one
/// screen object per screen that has known elements. Output order follows the
/// graph's signature order, so the same graph always yields the same suite.
pub fn generate_suite(graph: &NavigationGraph) -> GeneratedSuite {
    let mut features = vec![navigation_feature(graph), element_feature(graph)];
    features.extend(form_feature(graph));
    features.push(smoke_feature(graph));

    GeneratedSuite {
        features,
        screen_objects: screen_objects(graph),
    }
}

/// Path-replay scenarios: one per reachable screen, then one per outgoing edge.
pub fn navigation_feature(graph: &NavigationGraph) -> Feature {
    let mut scenarios = Vec::new();

    'screens: for (signature, node) in &graph.screens {
        let path = node.path_from_root.as_deref().unwrap_or_default();

        if !path.is_empty() {
            if scenarios.len() >= MAX_NAVIGATION_SCENARIOS {
                break;
            }
            let mut steps = vec![GIVEN_APP_RUNNING.to_string()];
            steps.extend(replay_steps(graph, path));
            steps.push("Then I should see a screen".to_string());

            scenarios.push(Scenario {
                tag: format!("@nav{}", scenarios.len() + 1),
                name: format!("Navigate to {}", describe_screen(signature)),
                comments: vec![format!("Path: {} \u{2192} Screen", path_summary(path))],
                steps,
            });
        }

        for edge in &node.outgoing_edges {
            if scenarios.len() >= MAX_NAVIGATION_SCENARIOS {
                break 'screens;
            }
            if is_backtracking(&edge.element_tapped) {
                continue;
            }
            let mut steps = vec![GIVEN_APP_RUNNING.to_string()];
            steps.extend(replay_steps(graph, path));
            steps.extend(tap_with_trigger(node, &edge.element_tapped));
            steps.push("Then I should see a screen".to_string());
            steps.push("And I go back".to_string());

            scenarios.push(Scenario {
                tag: format!("@nav{}", scenarios.len() + 1),
                name: format!("Tap {} navigates correctly", sanitize_name(&edge.element_tapped)),
                comments: Vec::new(),
                steps,
            });
        }
    }

    Feature {
        file_name: "Navigation.feature".to_string(),
        tags: vec!["@generated".to_string(), "@navigation".to_string()],
        title: "Navigation Tests".to_string(),
        description: vec![
            "Verify all discovered screens are accessible with navigation paths".to_string(),
        ],
        scenarios,
    }
}

/// One "tap it and don't crash" scenario per distinct clickable id.
pub fn element_feature(graph: &NavigationGraph) -> Feature {
    let mut scenarios = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    'screens: for node in graph.screens.values() {
        let path = node.path_from_root.as_deref().unwrap_or_default();

        for element in node.clickables() {
            if scenarios.len() >= MAX_ELEMENT_SCENARIOS {
                break 'screens;
            }
            // The explorer never taps these, so neither does the suite
            if !is_addressable(element)
                || should_skip(element)
                || !seen.insert(element.id.as_str())
            {
                continue;
            }

            let mut comments = Vec::new();
            if let Some(trigger) = &element.triggered_by {
                comments.push(format!("This element appears after tapping: {}", trigger));
            }

            let mut steps = vec![GIVEN_APP_RUNNING.to_string()];
            steps.extend(replay_steps(graph, path));
            steps.extend(tap_with_trigger(node, &element.id));
            steps.push("Then the app should not crash".to_string());

            scenarios.push(Scenario {
                tag: format!("@elem{}", scenarios.len() + 1),
                name: format!("Tap {} element", sanitize_name(&element.id)),
                comments,
                steps,
            });
        }
    }

    Feature {
        file_name: "Elements.feature".to_string(),
        tags: vec!["@generated".to_string(), "@elements".to_string()],
        title: "Element Interaction Tests".to_string(),
        description: vec![
            "Verify all discovered elements are interactive".to_string(),
            "Includes elements that appear after other actions (popups, menus)".to_string(),
        ],
        scenarios,
    }
}

/// One fill-and-verify scenario per distinct text field; `None` when there are no fields.
pub fn form_feature(graph: &NavigationGraph) -> Option<Feature> {
    let mut scenarios = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for node in graph.screens.values() {
        let path = node.path_from_root.as_deref().unwrap_or_default();

        for field in node.text_fields() {
            if !is_addressable(field) || !seen.insert(field.id.as_str()) {
                continue;
            }
            let value = generate_test_value(&field.id);

            let mut comments = Vec::new();
            if !path.is_empty() {
                comments.push(format!("Navigate to screen: {}", path_summary(path)));
            }

            let mut steps = vec![GIVEN_APP_RUNNING.to_string()];
            steps.extend(replay_steps(graph, path));
            steps.push(format!("When I enter \"{}\" in \"{}\"", value, field.id));
            steps.push(format!("Then the field should contain \"{}\"", value));

            scenarios.push(Scenario {
                tag: format!("@form{}", scenarios.len() + 1),
                name: format!("Fill {} field", sanitize_name(&field.id)),
                comments,
                steps,
            });
        }
    }

    if scenarios.is_empty() {
        return None;
    }

    Some(Feature {
        file_name: "Forms.feature".to_string(),
        tags: vec!["@generated".to_string(), "@forms".to_string()],
        title: "Form Tests".to_string(),
        description: vec!["Verify all discovered input fields work correctly".to_string()],
        scenarios,
    })
}

/// Menu open/close check plus a journey through the first few reachable screens.
pub fn smoke_feature(graph: &NavigationGraph) -> Feature {
    let mut scenarios = Vec::new();

    let menu = graph.screens.values().find_map(|node| {
        node.clickables()
            .find(|e| e.id.to_lowercase().contains("menu") && e.triggered_by.is_none())
            .map(|e| (node, e))
    });
    if let Some((node, menu)) = menu {
        let path = node.path_from_root.as_deref().unwrap_or_default();
        let mut steps = vec![GIVEN_APP_RUNNING.to_string()];
        steps.extend(replay_steps(graph, path));
        steps.push(format!("When I tap on \"{}\"", menu.id));
        steps.push("Then I should see a screen".to_string());
        steps.push("And I go back".to_string());

        scenarios.push(Scenario {
            tag: format!("@smoke-gen{}", scenarios.len() + 1),
            name: "Open and close menu".to_string(),
            comments: Vec::new(),
            steps,
        });
    }

    let mut steps = vec![GIVEN_APP_RUNNING.to_string()];
    let mut comments = Vec::new();
    let reachable = graph
        .screens
        .values()
        .filter(|n| n.path_from_root.as_ref().is_some_and(|p| !p.is_empty()))
        .take(MAX_JOURNEY_SCREENS);

    for node in reachable {
        let path = node.path_from_root.as_deref().unwrap_or_default();
        comments.push(format!("Journey to: {}", truncate(node.id.as_str(), 40)));
        steps.extend(replay_steps(graph, path));
        steps.push("Then I should see a screen".to_string());
        steps.extend(path.iter().map(|_| "And I go back".to_string()));
    }

    scenarios.push(Scenario {
        tag: format!("@smoke-gen{}", scenarios.len() + 1),
        name: "Full app journey".to_string(),
        comments,
        steps,
    });

    Feature {
        file_name: "SmokeGenerated.feature".to_string(),
        tags: vec!["@generated".to_string(), "@smoke-generated".to_string()],
        title: "Smoke Tests".to_string(),
        description: vec![
            "Critical path tests with full navigation paths from exploration".to_string(),
        ],
        scenarios,
    }
}

// ============================================================================
// Screen objects
// ============================================================================

/// One screen object per screen with at least one addressable element.
pub fn screen_objects(graph: &NavigationGraph) -> Vec<ScreenObject> {
    let mut used_names: HashSet<String> = HashSet::new();
    let mut objects = Vec::new();

    for (signature, node) in &graph.screens {
        let addressable: Vec<&ElementDescriptor> =
            node.elements.iter().filter(|e| is_addressable(e)).collect();
        if addressable.is_empty() {
            continue;
        }

        let mut name = screen_name(signature);
        if !used_names.insert(name.clone()) {
            name = format!("{}{}", name, signature.fingerprint());
            used_names.insert(name.clone());
        }

        let elements = addressable
            .iter()
            .map(|e| ScreenObjectElement {
                constant: to_constant_name(&e.id),
                locator: format!("id:{}", e.id),
            })
            .collect();

        let mut operations: Vec<ScreenOperation> = addressable
            .iter()
            .filter(|e| e.is_clickable)
            .map(|e| ScreenOperation::Tap {
                name: format!("tap{}", to_camel_case(&e.id)),
                element: to_constant_name(&e.id),
            })
            .collect();
        operations.extend(addressable.iter().filter(|e| e.is_text_field).map(|e| {
            ScreenOperation::EnterText {
                name: format!("enterIn{}", to_camel_case(&e.id)),
                element: to_constant_name(&e.id),
            }
        }));

        let navigate_here = node
            .path_from_root
            .as_deref()
            .unwrap_or_default()
            .iter()
            .flat_map(|step| replay_ids(graph, step))
            .collect();

        objects.push(ScreenObject {
            name,
            signature: signature.clone(),
            elements,
            operations,
            navigate_here,
            is_displayed: addressable.first().map(|e| format!("id:{}", e.id)),
        });
    }

    objects
}

/// Class-style name for a screen, e.g. `.MainActivity|Products` → `MainProductsScreen`.
pub fn screen_name(signature: &ScreenSignature) -> String {
    let activity = signature.activity();
    let short = activity
        .rsplit('.')
        .next()
        .unwrap_or(activity)
        .replace("Activity", "")
        .replace("Fragment", "");
    let name: String = std::iter::once(short.as_str())
        .chain(signature.labels())
        .flat_map(|part| part.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) || signature.is_fallback() {
        return format!("Screen{}", signature.fingerprint());
    }
    if name.ends_with("Screen") {
        name
    } else {
        format!("{}Screen", name)
    }
}

// ============================================================================
// Naming helpers
// ============================================================================

/// Readable lower-case name for scenario titles: `sortByNameBtn` → `sort by name`.
pub fn sanitize_name(id: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for c in strip_widget_suffix(id).chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = c.is_ascii_lowercase();
        out.push(c.to_ascii_lowercase());
    }
    out
}

fn strip_widget_suffix(id: &str) -> &str {
    WIDGET_SUFFIXES
        .iter()
        .find_map(|s| id.strip_suffix(s).filter(|rest| !rest.is_empty()))
        .unwrap_or(id)
}

fn to_constant_name(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn to_camel_case(id: &str) -> String {
    strip_widget_suffix(id)
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max).collect::<String>())
    } else {
        s.to_string()
    }
}

fn describe_screen(signature: &ScreenSignature) -> String {
    let labels = signature.labels();
    if labels.is_empty() {
        screen_name(signature)
    } else {
        labels.join(" ")
    }
}

fn path_summary(path: &[NavigationStep]) -> String {
    path.iter()
        .map(|s| s.element_tapped.as_str())
        .collect::<Vec<_>>()
        .join(" \u{2192} ")
}

fn is_addressable(element: &ElementDescriptor) -> bool {
    !element.id.is_empty() && element.id != "unknown" && !is_crash_artifact(element)
}

fn is_backtracking(id: &str) -> bool {
    let lower = id.to_lowercase();
    ["back", "close", "cancel", "dismiss"]
        .iter()
        .any(|p| lower.contains(p))
}

// ============================================================================
// Path replay
// ============================================================================

/// Ids to tap for one recorded step, with the menu trigger first when needed.
fn replay_ids(graph: &NavigationGraph, step: &NavigationStep) -> Vec<String> {
    let trigger = graph
        .element(&step.from_screen, &step.element_tapped)
        .and_then(|e| e.triggered_by.clone());
    trigger
        .into_iter()
        .chain(std::iter::once(step.element_tapped.clone()))
        .collect()
}

fn replay_steps(graph: &NavigationGraph, path: &[NavigationStep]) -> Vec<String> {
    path.iter()
        .flat_map(|step| replay_ids(graph, step))
        .map(|id| format!("When I tap on \"{}\"", id))
        .collect()
}

fn tap_with_trigger(node: &ScreenNode, element_id: &str) -> Vec<String> {
    let trigger = node
        .element(element_id)
        .and_then(|e| e.triggered_by.as_deref());
    trigger
        .into_iter()
        .chain(std::iter::once(element_id))
        .map(|id| format!("When I tap on \"{}\"", id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_name_splits_camel_case_and_drops_widget_suffix() {
        assert_eq!(sanitize_name("cartIV"), "cart");
        assert_eq!(sanitize_name("sortByNameBtn"), "sort by name");
        assert_eq!(sanitize_name("Button"), "button");
    }

    #[test]
    fn camel_case_handles_prefixed_ids() {
        assert_eq!(to_camel_case("text:Add to cart"), "TextAddToCart");
        assert_eq!(to_camel_case("loginBtn"), "Login");
        assert_eq!(to_constant_name("desc:Open menu"), "DESC_OPEN_MENU");
    }

    #[test]
    fn screen_name_uses_activity_and_labels() {
        assert_eq!(
            screen_name(&ScreenSignature::new(".MainActivity|Products")),
            "MainProductsScreen"
        );
        assert_eq!(
            screen_name(&ScreenSignature::new("com.shop.ui.CartFragment")),
            "CartScreen"
        );
    }

    #[test]
    fn unusable_screen_names_fall_back_to_fingerprint() {
        let sig = ScreenSignature::new("|||");
        assert_eq!(screen_name(&sig), format!("Screen{}", sig.fingerprint()));

        let fallback = ScreenSignature::fallback();
        assert!(screen_name(&fallback).starts_with("Screen"));
    }
}
