use crate::guard::app_guard::CRASH_PHRASES;
use crate::screen::ElementDescriptor;

/// Fallback typed into fields whose id matches no keyword.
pub const DEFAULT_TEST_VALUE: &str = "test123";

/// Id fragments of controls that would backtrack or close something.
pub const SKIP_PATTERNS: &[&str] = &["back", "home", "navigate_up", "close", "cancel", "dismiss"];

/// Resource-id prefix Android uses for crash/ANR dialog controls.
const CRASH_ARTIFACT_PREFIX: &str = "aerr_";

pub const SWITCH_CLASS: &str = "android.widget.Switch";
pub const CHECK_BOX_CLASS: &str = "android.widget.CheckBox";

// ============================================================================
// Test-value generation
// ============================================================================

/// Plausible input for a text field, chosen from its id. First match wins.
pub fn generate_test_value(field_id: &str) -> &'static str {
    let id = field_id.to_lowercase();
    let has = |k: &str| id.contains(k);

    if has("email") || has("mail") {
        "test@example.com"
    } else if has("password") || has("pass") {
        "Test123!"
    } else if has("phone") || has("mobile") {
        "1234567890"
    } else if has("first") && has("name") {
        "John"
    } else if has("last") && has("name") {
        "Doe"
    } else if has("name") {
        "Test User"
    } else if has("address") {
        "123 Test Street"
    } else if has("city") {
        "Test City"
    } else if has("zip") || has("postal") {
        "12345"
    } else if has("country") {
        "USA"
    } else if has("card") || has("credit") {
        "4111111111111111"
    } else if has("cvv") || has("cvc") {
        "123"
    } else if has("expir") {
        "12/25"
    } else if has("quantity") || has("qty") {
        "2"
    } else if has("search") {
        "test"
    } else {
        DEFAULT_TEST_VALUE
    }
}

// ============================================================================
// Skip policy
// ============================================================================

/// Elements the crawler must never tap on its own.
pub fn should_skip(element: &ElementDescriptor) -> bool {
    let id = element.id.to_lowercase();

    if SKIP_PATTERNS.iter().any(|p| id.contains(p)) {
        return true;
    }
    if element.is_unidentified() {
        return true;
    }
    is_crash_artifact(element)
}

/// Controls belonging to an OS crash dialog; only the guard touches those.
pub fn is_crash_artifact(element: &ElementDescriptor) -> bool {
    element.id.starts_with(CRASH_ARTIFACT_PREFIX)
        || element
            .text
            .as_deref()
            .is_some_and(|t| CRASH_PHRASES.iter().any(|p| t.contains(p)))
}

/// Two-state controls handled by the toggle phase instead of the tap loop.
pub fn is_toggle(element: &ElementDescriptor) -> bool {
    matches!(
        element.class_name.as_deref(),
        Some(SWITCH_CLASS) | Some(CHECK_BOX_CLASS)
    )
}
