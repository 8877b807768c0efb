use std::thread;
use std::time::Duration;

pub mod error;
pub mod mock;
pub mod selector;
pub mod session;

pub use error::DriverError;
pub use selector::{ElementHandle, ScrollDirection, Selector};

pub const ATTR_RESOURCE_ID: &str = "resource-id";
pub const ATTR_CONTENT_DESC: &str = "content-desc";
pub const ATTR_CLASS: &str = "class";
pub const ATTR_CLICKABLE: &str = "clickable";

// ============================================================================
// Automation Driver capability
// ============================================================================

/// Remote automation capability the explorer drives.
///
/// One implementation talks to a live Appium server (`AppiumSession`), the
/// other replays a scripted app in memory (`MockDriver`). The explorer owns
/// the driver exclusively for the duration of a run, so every method takes
/// `&mut self` and no call is ever issued concurrently.
pub trait Driver {
    /// All elements matching `selector`, in hierarchy traversal order.
    fn find_all(&mut self, selector: &Selector) -> Result<Vec<ElementHandle>, DriverError>;

    fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, DriverError>;

    /// Visible text of the element, `None` when it has none.
    fn text(&mut self, element: &ElementHandle) -> Result<Option<String>, DriverError>;

    /// Native attribute value (`resource-id`, `content-desc`, `class`, `clickable`, ...).
    fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    fn tap(&mut self, element: &ElementHandle) -> Result<(), DriverError>;

    /// Clear the field, then type `text` into it.
    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError>;

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), DriverError>;

    fn hide_keyboard(&mut self) -> Result<(), DriverError>;

    fn navigate_back(&mut self) -> Result<(), DriverError>;

    fn current_activity(&mut self) -> Result<Option<String>, DriverError>;

    fn current_package(&mut self) -> Result<Option<String>, DriverError>;

    /// Raw hierarchy dump, used as a last-resort check.
    fn page_source(&mut self) -> Result<String, DriverError>;

    fn activate_app(&mut self, app_id: &str) -> Result<(), DriverError>;

    fn terminate_app(&mut self, app_id: &str) -> Result<(), DriverError>;

    /// Give the remote UI time to settle after a mutating action.
    fn settle(&mut self, ms: u64) {
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }
}
