use app_explorer::explorer::nav_graph::NavigationGraph;
use app_explorer::explorer::test_generator::{
    ScreenOperation, element_feature, form_feature, generate_suite, navigation_feature,
    screen_objects, smoke_feature,
};

mod common;

use common::fixtures::{config, login_app, menu_app, run, shop_app};

fn menu_graph() -> NavigationGraph {
    let mut driver = menu_app();
    run(&mut driver, config()).graph
}

fn login_graph() -> NavigationGraph {
    let mut driver = login_app();
    run(&mut driver, config()).graph
}

// ============================================================================
// Navigation feature
// ============================================================================

#[test]
fn navigation_replays_menu_trigger_before_item() {
    let feature = navigation_feature(&menu_graph());

    assert_eq!(feature.scenarios.len(), 2);
    let edge = feature
        .scenarios
        .iter()
        .find(|s| s.name == "Tap sort asc navigates correctly")
        .unwrap();
    assert_eq!(
        edge.steps,
        vec![
            "Given the app is running",
            "When I tap on \"menuBtn\"",
            "When I tap on \"sortAsc\"",
            "Then I should see a screen",
            "And I go back",
        ]
    );

    let reach = feature
        .scenarios
        .iter()
        .find(|s| s.name == "Navigate to Sorted")
        .unwrap();
    assert_eq!(reach.comments, vec!["Path: sortAsc \u{2192} Screen"]);
    assert!(reach.steps.contains(&"When I tap on \"menuBtn\"".to_string()));
}

#[test]
fn backtracking_edges_get_no_scenario() {
    let mut driver = shop_app();
    let graph = run(&mut driver, config()).graph;
    let feature = navigation_feature(&graph);
    assert!(feature.scenarios.iter().all(|s| !s.name.contains("back")));
}

// ============================================================================
// Element and form features
// ============================================================================

#[test]
fn element_scenarios_mention_popup_trigger() {
    let feature = element_feature(&menu_graph());

    let names: Vec<&str> = feature.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Tap menu element", "Tap sort asc element", "Tap sort desc element"]
    );

    let sort_desc = &feature.scenarios[2];
    assert_eq!(
        sort_desc.comments,
        vec!["This element appears after tapping: menuBtn"]
    );
    assert_eq!(
        sort_desc.steps[1..3],
        ["When I tap on \"menuBtn\"", "When I tap on \"sortDesc\""]
    );
    assert_eq!(sort_desc.steps.last().unwrap(), "Then the app should not crash");
}

#[test]
fn element_scenarios_leave_out_skipped_controls() {
    let mut driver = shop_app();
    let graph = run(&mut driver, config()).graph;
    let feature = element_feature(&graph);

    let names: Vec<&str> = feature.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Tap cart element"]);

    // Still addressable from the screen object
    let objects = screen_objects(&graph);
    let main = objects.iter().find(|o| o.name == "MainProductsScreen").unwrap();
    assert!(main.elements.iter().any(|e| e.locator == "id:backIV"));
}

#[test]
fn form_feature_fills_each_field_once() {
    let feature = form_feature(&login_graph()).unwrap();

    assert_eq!(feature.scenarios.len(), 2);
    assert!(
        feature.scenarios[0]
            .steps
            .contains(&"When I enter \"test@example.com\" in \"et_email\"".to_string())
    );
    assert!(
        feature.scenarios[1]
            .steps
            .contains(&"Then the field should contain \"Test123!\"".to_string())
    );
}

#[test]
fn no_fields_means_no_form_feature() {
    assert!(form_feature(&menu_graph()).is_none());
}

// ============================================================================
// Smoke feature
// ============================================================================

#[test]
fn smoke_opens_menu_and_walks_reachable_screens() {
    let feature = smoke_feature(&menu_graph());

    assert_eq!(feature.scenarios.len(), 2);
    assert_eq!(feature.scenarios[0].name, "Open and close menu");
    assert!(
        feature.scenarios[0]
            .steps
            .contains(&"When I tap on \"menuBtn\"".to_string())
    );

    let journey = &feature.scenarios[1];
    assert_eq!(journey.name, "Full app journey");
    assert_eq!(journey.comments, vec!["Journey to: .SortedActivity|Sorted"]);
    assert_eq!(journey.steps.last().unwrap(), "And I go back");
}

#[test]
fn smoke_on_empty_graph_still_has_journey() {
    let feature = smoke_feature(&NavigationGraph::new());
    assert_eq!(feature.scenarios.len(), 1);
    assert_eq!(feature.scenarios[0].steps, vec!["Given the app is running"]);
}

// ============================================================================
// Suite and screen objects
// ============================================================================

#[test]
fn suite_for_login_app_has_all_features() {
    let suite = generate_suite(&login_graph());

    let files: Vec<&str> = suite.features.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(
        files,
        vec![
            "Navigation.feature",
            "Elements.feature",
            "Forms.feature",
            "SmokeGenerated.feature"
        ]
    );
    assert_eq!(
        suite.scenario_count(),
        suite.features.iter().map(|f| f.scenarios.len()).sum::<usize>()
    );
}

#[test]
fn suite_is_deterministic() {
    let graph = menu_graph();
    let a = generate_suite(&graph);
    let b = generate_suite(&graph);
    assert_eq!(a.features, b.features);
    assert_eq!(a.screen_objects, b.screen_objects);
}

#[test]
fn rendered_feature_is_gherkin() {
    let feature = navigation_feature(&menu_graph());
    let text = feature.render();

    assert!(text.starts_with("@generated @navigation\nFeature: Navigation Tests\n"));
    assert!(text.contains("  Scenario: Tap sort asc navigates correctly\n"));
    assert!(text.contains("    When I tap on \"sortAsc\"\n"));
}

#[test]
fn screen_objects_carry_locators_and_paths() {
    let objects = screen_objects(&menu_graph());
    assert_eq!(objects.len(), 2);

    let main = objects.iter().find(|o| o.name == "MainShopScreen").unwrap();
    assert!(main.navigate_here.is_empty());
    assert!(
        main.elements
            .iter()
            .any(|e| e.constant == "MENUBTN" && e.locator == "id:menuBtn")
    );
    assert!(main.operations.contains(&ScreenOperation::Tap {
        name: "tapMenu".into(),
        element: "MENUBTN".into(),
    }));

    let sorted = objects.iter().find(|o| o.name == "SortedSortedScreen").unwrap();
    assert_eq!(sorted.navigate_here, vec!["menuBtn", "sortAsc"]);
    assert_eq!(sorted.file_name(), "SortedSortedScreen.yaml");

    let yaml = sorted.to_yaml().unwrap();
    assert!(yaml.contains("name: SortedSortedScreen"));
}

#[test]
fn text_fields_get_enter_text_operations() {
    let objects = screen_objects(&login_graph());
    let login = objects.iter().find(|o| o.name == "LoginLoginScreen").unwrap();

    assert!(login.operations.contains(&ScreenOperation::EnterText {
        name: "enterInEtEmail".into(),
        element: "ET_EMAIL".into(),
    }));
}
