use app_explorer::driver::session::{
    Point, SessionConfig, WindowRect, scroll_gesture, swipe_actions,
};
use app_explorer::driver::selector::{text_contains_any_xpath, xpath_literal};
use app_explorer::driver::{DriverError, ScrollDirection, Selector};

// ============================================================================
// Selectors
// ============================================================================

#[test]
fn selectors_map_to_w3c_locators() {
    assert_eq!(
        Selector::ById("com.example.shop:id/cartIV".into()).locator(),
        ("id", "com.example.shop:id/cartIV".to_string())
    );
    assert_eq!(
        Selector::ByClass("android.widget.EditText".into()).locator(),
        ("class name", "android.widget.EditText".to_string())
    );
    assert_eq!(
        Selector::ByDescription("Open menu".into()).locator(),
        ("accessibility id", "Open menu".to_string())
    );
    assert_eq!(
        Selector::ByText("Close app".into()).locator(),
        ("xpath", "//*[@text='Close app']".to_string())
    );
    assert_eq!(Selector::clickable().locator().1, "//*[@clickable='true']");
}

#[test]
fn xpath_literals_survive_quotes() {
    assert_eq!(xpath_literal("Cart"), "'Cart'");
    assert_eq!(xpath_literal("Don't"), "\"Don't\"");
    assert_eq!(
        xpath_literal(r#"Say "hi" it's me"#),
        r#"concat('Say "hi" it', "'", 's me')"#
    );
}

#[test]
fn crash_phrase_xpath_ors_predicates() {
    let xpath = text_contains_any_xpath(&["has stopped", "isn't responding"]);
    assert_eq!(
        xpath,
        "//*[contains(@text, 'has stopped') or contains(@text, \"isn't responding\")]"
    );
}

#[test]
fn selector_display_and_serde() {
    let selector = Selector::ById("cartIV".into());
    assert_eq!(selector.to_string(), "id:cartIV");

    let json = serde_json::to_value(&selector).unwrap();
    assert_eq!(json, serde_json::json!({ "by": "id", "value": "cartIV" }));
    let back: Selector = serde_json::from_value(json).unwrap();
    assert_eq!(back, selector);
}

// ============================================================================
// Session capabilities
// ============================================================================

#[test]
fn capabilities_for_installed_package() {
    let config = SessionConfig {
        app_package: "com.example.shop".into(),
        app_activity: Some(".MainActivity".into()),
        platform_version: Some("14".into()),
        ..Default::default()
    };
    let caps = config.capabilities();
    let always = &caps["capabilities"]["alwaysMatch"];

    assert_eq!(always["platformName"], "Android");
    assert_eq!(always["appium:automationName"], "UiAutomator2");
    assert_eq!(always["appium:appPackage"], "com.example.shop");
    assert_eq!(always["appium:appActivity"], ".MainActivity");
    assert_eq!(always["appium:platformVersion"], "14");
    assert_eq!(always["appium:appWaitDuration"], 90_000);
    assert!(always.get("appium:app").is_none());
}

#[test]
fn capabilities_for_apk_skip_package() {
    let config = SessionConfig {
        app: Some("/tmp/shop.apk".into()),
        app_package: "com.example.shop".into(),
        ..Default::default()
    };
    let caps = config.capabilities();
    let always = &caps["capabilities"]["alwaysMatch"];

    assert_eq!(always["appium:app"], "/tmp/shop.apk");
    assert_eq!(always["appium:appWaitActivity"], "*");
    assert!(always.get("appium:appPackage").is_none());
    assert!(always.get("appium:platformVersion").is_none());
}

// ============================================================================
// Gestures
// ============================================================================

#[test]
fn scroll_down_swipes_upward_through_center() {
    let rect = WindowRect {
        x: 0.0,
        y: 0.0,
        width: 1000.0,
        height: 2000.0,
    };
    let (from, to) = scroll_gesture(&rect, ScrollDirection::Down, 0.5);
    assert_eq!(from, Point { x: 500, y: 1500 });
    assert_eq!(to, Point { x: 500, y: 500 });

    let (from, to) = scroll_gesture(&rect, ScrollDirection::Up, 0.5);
    assert_eq!(from, Point { x: 500, y: 500 });
    assert_eq!(to, Point { x: 500, y: 1500 });
}

#[test]
fn scroll_distance_is_clamped() {
    let rect = WindowRect {
        x: 0.0,
        y: 100.0,
        width: 1000.0,
        height: 1000.0,
    };
    let (from, to) = scroll_gesture(&rect, ScrollDirection::Down, 5.0);
    assert!(from.y <= 1100 && to.y >= 100);
    assert!((from.y - to.y - 900).abs() <= 1);
}

#[test]
fn swipe_is_a_single_touch_pointer() {
    let actions = swipe_actions(Point { x: 1, y: 2 }, Point { x: 3, y: 4 }, 300);
    let pointer = &actions["actions"][0];
    assert_eq!(pointer["type"], "pointer");
    assert_eq!(pointer["parameters"]["pointerType"], "touch");

    let steps = pointer["actions"].as_array().unwrap();
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0]["x"], 1);
    assert_eq!(steps[2]["duration"], 300);
    assert_eq!(steps[2]["y"], 4);
    assert_eq!(steps[3]["type"], "pointerUp");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn missing_element_errors_are_recognized() {
    assert!(DriverError::ElementNotFound("x".into()).is_missing_element());
    assert!(
        DriverError::Command {
            command: "click".into(),
            error: "stale element reference".into(),
            message: String::new(),
        }
        .is_missing_element()
    );
    assert!(!DriverError::NoSession.is_missing_element());
}
