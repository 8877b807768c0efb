use app_explorer::explorer::nav_graph::{
    DedupMode, ExplorerConfig, NavigationGraph, NavigationStep, ScreenNode,
};
use app_explorer::explorer::state::{
    ElementKey, ExplorationState, IncidentKind, InteractionOutcome, VisitKey,
};
use app_explorer::screen::{ElementDescriptor, ScreenSignature};

fn sig(value: &str) -> ScreenSignature {
    ScreenSignature::new(value)
}

fn step(from: &str, element: &str, to: &str) -> NavigationStep {
    NavigationStep {
        from_screen: sig(from),
        element_tapped: element.to_string(),
        to_screen: sig(to),
    }
}

fn clickable(id: &str) -> ElementDescriptor {
    ElementDescriptor {
        id: id.to_string(),
        resource_id: Some(id.to_string()),
        is_clickable: true,
        ..Default::default()
    }
}

// ============================================================================
// ScreenNode
// ============================================================================

#[test]
fn first_path_is_always_taken() {
    let mut node = ScreenNode::new(sig(".CartActivity|Cart"));
    assert!(node.path_from_root.is_none());
    assert!(node.offer_path(&[step(".Main", "a", ".CartActivity|Cart")]));
    assert_eq!(node.path_from_root.as_ref().map(|p| p.len()), Some(1));
}

#[test]
fn only_strictly_shorter_paths_replace() {
    let mut node = ScreenNode::new(sig(".Y"));
    let long = [step(".R", "toX", ".X"), step(".X", "toY", ".Y")];
    let short = [step(".R", "toY", ".Y")];
    let other_short = [step(".R", "alsoY", ".Y")];

    assert!(node.offer_path(&long));
    assert!(node.offer_path(&short));
    assert!(!node.offer_path(&other_short));
    assert!(!node.offer_path(&long));

    let path = node.path_from_root.as_ref().unwrap();
    assert_eq!(path[0].element_tapped, "toY");
}

#[test]
fn merge_elements_keeps_ids_unique() {
    let mut node = ScreenNode::new(sig(".Main"));
    assert_eq!(node.merge_elements(&[clickable("a"), clickable("b")]), 2);

    let field = ElementDescriptor {
        id: "a".into(),
        is_text_field: true,
        ..Default::default()
    };
    assert_eq!(node.merge_elements(&[field, clickable("c")]), 1);

    assert_eq!(node.elements.len(), 3);
    let a = node.element("a").unwrap();
    assert!(a.is_clickable && a.is_text_field);
    assert_eq!(node.text_fields().count(), 1);
    assert_eq!(node.clickables().count(), 3);
}

#[test]
fn trigger_metadata_is_adopted_once() {
    let mut node = ScreenNode::new(sig(".Main"));
    node.merge_elements(&[clickable("sortAsc")]);

    let from_popup = ElementDescriptor {
        triggered_by: Some("menuBtn".into()),
        path_to_trigger: Some(vec![]),
        ..clickable("sortAsc")
    };
    node.merge_elements(&[from_popup]);
    assert_eq!(
        node.element("sortAsc").unwrap().triggered_by.as_deref(),
        Some("menuBtn")
    );

    let other = ElementDescriptor {
        triggered_by: Some("overflow".into()),
        ..clickable("sortAsc")
    };
    node.merge_elements(&[other]);
    assert_eq!(
        node.element("sortAsc").unwrap().triggered_by.as_deref(),
        Some("menuBtn")
    );
}

#[test]
fn edges_are_unique() {
    let mut node = ScreenNode::new(sig(".Main"));
    assert!(node.add_edge(step(".Main", "cartIV", ".Cart")));
    assert!(!node.add_edge(step(".Main", "cartIV", ".Cart")));
    assert!(node.add_edge(step(".Main", "cartIV", ".Login")));
    assert_eq!(node.outgoing_edges.len(), 2);
}

// ============================================================================
// NavigationGraph
// ============================================================================

#[test]
fn graph_creates_nodes_on_demand() {
    let mut graph = NavigationGraph::new();
    assert!(!graph.has_screen(&sig(".Main")));

    graph.node_mut(&sig(".Main")).merge_elements(&[clickable("a")]);
    graph.node_mut(&sig(".Main")).merge_elements(&[clickable("b")]);
    graph.node_mut(&sig(".Cart")).merge_elements(&[clickable("c")]);

    assert_eq!(graph.screen_count(), 2);
    assert_eq!(graph.total_elements(), 3);
    assert!(graph.element(&sig(".Main"), "b").is_some());
    assert!(graph.element(&sig(".Cart"), "b").is_none());
}

#[test]
fn graph_json_round_trip_preserves_structure() {
    let mut graph = NavigationGraph::new();
    graph.root = Some(sig(".Main|Home"));
    let main = graph.node_mut(&sig(".Main|Home"));
    main.offer_path(&[]);
    main.merge_elements(&[
        clickable("cartIV"),
        ElementDescriptor {
            triggered_by: Some("menuBtn".into()),
            path_to_trigger: Some(vec![]),
            ..clickable("sortAsc")
        },
    ]);
    main.add_edge(step(".Main|Home", "cartIV", ".Cart|Cart"));

    let json = graph.to_json().unwrap();
    // Direct elements carry no trigger fields at all
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let elements = &value["screens"][".Main|Home"]["elements"];
    assert!(elements[0].get("triggered_by").is_none());
    assert_eq!(elements[1]["triggered_by"], "menuBtn");

    let restored = NavigationGraph::from_json(&json).unwrap();
    assert_eq!(restored.root, graph.root);
    assert_eq!(restored.edges().count(), 1);
    assert_eq!(
        restored
            .element(&sig(".Main|Home"), "sortAsc")
            .and_then(|e| e.triggered_by.clone()),
        Some("menuBtn".to_string())
    );
}

#[test]
fn explorer_config_defaults() {
    let config = ExplorerConfig::for_package("com.example.shop");
    assert_eq!(config.app_package, "com.example.shop");
    assert_eq!(config.max_depth, 5);
    assert_eq!(config.timeout_secs, 300);
    assert_eq!(config.stuck_threshold, 3);
    assert_eq!(config.max_crash_recoveries, 3);
    assert_eq!(config.dedup, DedupMode::Signature);
    assert!(config.fill_forms && config.scroll_to_discover && config.toggle_switches);
}

#[test]
fn explorer_config_accepts_partial_json() {
    let config: ExplorerConfig =
        serde_json::from_str(r#"{"app_package":"com.x","dedup":"signature-and-depth"}"#).unwrap();
    assert_eq!(config.dedup, DedupMode::SignatureAndDepth);
    assert_eq!(config.max_depth, 5);
    assert_eq!(config.pacing.after_tap_ms, 1000);
}

// ============================================================================
// Exploration bookkeeping
// ============================================================================

#[test]
fn visit_keys_follow_dedup_mode() {
    let screen = sig(".Main");
    assert_eq!(
        VisitKey::new(DedupMode::Signature, &screen, 1),
        VisitKey::new(DedupMode::Signature, &screen, 3)
    );
    assert_ne!(
        VisitKey::new(DedupMode::SignatureAndDepth, &screen, 1),
        VisitKey::new(DedupMode::SignatureAndDepth, &screen, 3)
    );
}

#[test]
fn direct_and_menu_keys_are_distinct() {
    let mut state = ExplorationState::new();
    let screen = sig(".Main");
    assert!(state.mark_interacted(ElementKey::direct(&screen, "sortAsc")));
    assert!(state.mark_interacted(ElementKey::menu(&screen, "sortAsc")));
    assert!(!state.mark_interacted(ElementKey::direct(&screen, "sortAsc")));
    assert!(state.has_interacted(&ElementKey::menu(&screen, "sortAsc")));
}

#[test]
fn stuck_counter_fires_at_threshold_and_restarts() {
    let mut state = ExplorationState::new();
    let detail = sig(".Detail");

    assert!(!state.observe_visit(&detail, 3));
    assert!(!state.observe_visit(&detail, 3));
    assert!(!state.observe_visit(&detail, 3));
    assert!(state.observe_visit(&detail, 3));
    assert_eq!(state.stuck_escapes, 1);
    assert_eq!(state.stuck_count, 0);

    // A different screen resets the run of repeats
    assert!(!state.observe_visit(&detail, 3));
    assert!(!state.observe_visit(&sig(".Main"), 3));
    assert!(!state.observe_visit(&detail, 3));
    assert_eq!(state.stuck_count, 0);
}

#[test]
fn incidents_split_into_critical_and_noise() {
    let mut state = ExplorationState::new();
    state.record_incident(IncidentKind::Crash, Some(&sig(".Main")), "dialog");
    state.record_incident(IncidentKind::InteractionFailed, None, "stale");
    state.record_incident(IncidentKind::RestartFailed, None, "gone");

    let critical: Vec<_> = state.incidents.iter().filter(|i| i.is_critical()).collect();
    assert_eq!(critical.len(), 2);
    assert!(!IncidentKind::Stuck.is_critical());
    assert!(!IncidentKind::LeftApp.is_critical());
}

#[test]
fn interaction_outcome_serializes_with_kind_tag() {
    let json = serde_json::to_value(InteractionOutcome::Navigated { to: sig(".Cart") }).unwrap();
    assert_eq!(json["kind"], "navigated");
    assert_eq!(json["to"], ".Cart");

    let json = serde_json::to_value(InteractionOutcome::NoChange).unwrap();
    assert_eq!(json["kind"], "no_change");
}
