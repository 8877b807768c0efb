use app_explorer::driver::mock::{MockDriver, MockElement, MockScreen};
use app_explorer::driver::{Driver, DriverError};
use app_explorer::screen::classifier::{discover, resolve_element};
use app_explorer::screen::screen_model::UNKNOWN_ELEMENT_ID;
use app_explorer::screen::signature::is_signature_label;
use app_explorer::screen::{ElementDescriptor, RawElement, ScreenSignature, compute_signature};

fn single_screen(screen: MockScreen) -> MockDriver {
    MockDriver::new("com.example.shop", "main").screen("main", screen)
}

// ============================================================================
// Signatures
// ============================================================================

#[test]
fn signature_is_activity_plus_first_two_labels() {
    let mut driver = single_screen(
        MockScreen::new(".MainActivity")
            .with(MockElement::label("Products"))
            .with(MockElement::label("Featured"))
            .with(MockElement::label("On sale")),
    );
    let signature = compute_signature(&mut driver);

    assert_eq!(signature.as_str(), ".MainActivity|Products|Featured");
    assert_eq!(signature.activity(), ".MainActivity");
    assert_eq!(signature.labels(), vec!["Products", "Featured"]);
    assert!(!signature.is_fallback());
}

#[test]
fn signature_ignores_counters_and_body_text() {
    let mut driver = single_screen(
        MockScreen::new(".CartActivity")
            .with(MockElement::label("3"))
            .with(MockElement::label(
                "Free shipping on all orders over fifty dollars this week",
            ))
            .with(MockElement::label("  Cart  ")),
    );
    assert_eq!(compute_signature(&mut driver).as_str(), ".CartActivity|Cart");
}

#[test]
fn signature_is_stable_across_measurements() {
    let mut driver = single_screen(
        MockScreen::new(".MainActivity")
            .with(MockElement::label("Products"))
            .with(MockElement::button("cartIV")),
    );
    let first = compute_signature(&mut driver);
    let second = compute_signature(&mut driver);
    assert_eq!(first, second);
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn screen_without_labels_is_just_its_activity() {
    let mut driver = single_screen(MockScreen::new(".SplashActivity"));
    assert_eq!(compute_signature(&mut driver).as_str(), ".SplashActivity");
}

#[test]
fn failed_measurements_never_collide() {
    let mut driver = single_screen(MockScreen::new(".MainActivity"));
    driver.set_failing(true);

    let a = compute_signature(&mut driver);
    let b = compute_signature(&mut driver);
    assert!(a.is_fallback());
    assert!(b.is_fallback());
    assert_ne!(a, b);
}

#[test]
fn label_rules() {
    assert!(is_signature_label("Products"));
    assert!(is_signature_label("Step 2"));
    assert!(!is_signature_label(""));
    assert!(!is_signature_label("1234"));
    assert!(!is_signature_label("This label is far too long to be chrome"));
}

#[test]
fn fingerprint_is_short_hex() {
    let fp = ScreenSignature::new(".MainActivity|Products").fingerprint();
    assert_eq!(fp.len(), 12);
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(fp, ScreenSignature::new(".MainActivity|Cart").fingerprint());
}

// ============================================================================
// Element ids
// ============================================================================

#[test]
fn id_prefers_short_resource_id() {
    let raw = RawElement {
        resource_id: Some("com.example.shop:id/cartIV".into()),
        text: Some("Cart".into()),
        content_desc: Some("Open cart".into()),
        class_name: Some("android.widget.ImageView".into()),
    };
    assert_eq!(raw.derive_id(), "cartIV");
}

#[test]
fn id_falls_back_through_text_description_class() {
    let text = RawElement {
        text: Some("Add to cart and keep shopping".into()),
        ..Default::default()
    };
    assert_eq!(text.derive_id(), "text:Add to cart and keep");

    let desc = RawElement {
        resource_id: Some(String::new()),
        content_desc: Some("Open menu".into()),
        ..Default::default()
    };
    assert_eq!(desc.derive_id(), "desc:Open menu");

    let class = RawElement {
        class_name: Some("android.widget.ImageButton".into()),
        ..Default::default()
    };
    assert_eq!(class.derive_id(), "class:ImageButton");

    assert_eq!(RawElement::default().derive_id(), UNKNOWN_ELEMENT_ID);
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
fn discovery_merges_roles_by_id() {
    let mut driver = single_screen(
        MockScreen::new(".LoginActivity")
            .with(MockElement::label("Login"))
            .with(MockElement::field("et_email"))
            .with(MockElement::button("loginBtn")),
    );
    let elements = discover(&mut driver);

    assert_eq!(elements.len(), 3);
    let email = elements.iter().find(|e| e.id == "et_email").unwrap();
    assert!(email.is_clickable);
    assert!(email.is_text_field);

    let label = elements.iter().find(|e| e.id == "text:Login").unwrap();
    assert!(label.is_text_view);
    assert!(!label.is_clickable);
}

#[test]
fn discovery_skips_hidden_elements_and_long_text() {
    let mut driver = single_screen(
        MockScreen::new(".MainActivity")
            .with(MockElement::button("ghost").hidden())
            .with(MockElement::label(
                "A very long product description that nobody would ever tap on purpose",
            ))
            .with(MockElement::label("Price")),
    );
    let ids: Vec<String> = discover(&mut driver).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["text:Price".to_string()]);
}

#[test]
fn discovery_on_broken_driver_is_empty() {
    let mut driver = single_screen(MockScreen::new(".MainActivity").with(MockElement::button("a")));
    driver.set_failing(true);
    assert!(discover(&mut driver).is_empty());
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn resolution_falls_back_from_id_to_text() {
    let mut driver = single_screen(
        MockScreen::new(".MainActivity")
            .with(MockElement::button("buyBtn").with_text("Buy now")),
    );
    // Stale resource id, but the text still matches
    let element = ElementDescriptor {
        id: "oldBuyBtn".into(),
        resource_id: Some("oldBuyBtn".into()),
        text: Some("Buy now".into()),
        is_clickable: true,
        ..Default::default()
    };

    let handle = resolve_element(&mut driver, &element).unwrap();
    driver.tap(&handle).unwrap();
    assert_eq!(driver.history(), ["tap:buyBtn"]);
}

#[test]
fn resolution_by_description() {
    let mut driver = single_screen(
        MockScreen::new(".MainActivity")
            .with(MockElement::button("").with_desc("Open menu")),
    );
    let element = ElementDescriptor {
        id: "desc:Open menu".into(),
        content_desc: Some("Open menu".into()),
        ..Default::default()
    };
    assert!(resolve_element(&mut driver, &element).is_ok());
}

#[test]
fn unresolvable_element_is_not_found() {
    let mut driver = single_screen(MockScreen::new(".MainActivity"));
    let element = ElementDescriptor {
        id: "missing".into(),
        resource_id: Some("missing".into()),
        ..Default::default()
    };
    let err = resolve_element(&mut driver, &element).unwrap_err();
    assert!(matches!(err, DriverError::ElementNotFound(_)));
    assert!(err.is_missing_element());
}

#[test]
fn descriptors_compare_by_id_only() {
    let a = ElementDescriptor {
        id: "cartIV".into(),
        is_clickable: true,
        ..Default::default()
    };
    let b = ElementDescriptor {
        id: "cartIV".into(),
        text: Some("Cart".into()),
        ..Default::default()
    };
    assert_eq!(a, b);

    let mut merged = a.clone();
    merged.merge(&b);
    assert!(merged.is_clickable);
    assert_eq!(merged.text.as_deref(), Some("Cart"));
    assert_eq!(merged.label(), "Cart");
}
