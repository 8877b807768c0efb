use tracing::debug;

use crate::driver::selector::{EDIT_TEXT_CLASS, TEXT_VIEW_CLASS};
use crate::driver::{
    ATTR_CLASS, ATTR_CONTENT_DESC, ATTR_RESOURCE_ID, Driver, DriverError, ElementHandle, Selector,
};
use crate::screen::screen_model::{ElementDescriptor, ElementRole, RawElement};

/// Text views longer than this are body copy, not addressable elements.
pub const MAX_TEXT_VIEW_CHARS: usize = 50;

// ============================================================================
// Discovery
// ============================================================================

/// Enumerate the interactive and short-text elements of the current screen.
///
/// Runs three queries (clickables, text inputs, short text views) and
/// deduplicates by derived id, merging role flags into the first sighting.
/// A failing query is skipped; if every query fails the result is empty.
pub fn discover(driver: &mut dyn Driver) -> Vec<ElementDescriptor> {
    let queries = [
        (Selector::clickable(), ElementRole::Clickable),
        (
            Selector::ByClass(EDIT_TEXT_CLASS.to_string()),
            ElementRole::TextField,
        ),
        (
            Selector::ByClass(TEXT_VIEW_CLASS.to_string()),
            ElementRole::TextView,
        ),
    ];

    let mut found: Vec<ElementDescriptor> = Vec::new();

    for (selector, role) in queries {
        let handles = match driver.find_all(&selector) {
            Ok(h) => h,
            Err(e) => {
                debug!(%selector, "discovery query failed: {}", e);
                continue;
            }
        };

        for handle in handles {
            if !driver.is_visible(&handle).unwrap_or(false) {
                continue;
            }
            let raw = match read_element(driver, &handle) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("element went stale during discovery: {}", e);
                    continue;
                }
            };
            if role == ElementRole::TextView && !is_short_text(raw.text.as_deref()) {
                continue;
            }

            let descriptor = ElementDescriptor::from_raw(raw, role);
            match found.iter_mut().find(|d| d.id == descriptor.id) {
                Some(existing) => existing.merge(&descriptor),
                None => found.push(descriptor),
            }
        }
    }

    found
}

fn is_short_text(text: Option<&str>) -> bool {
    text.is_some_and(|t| !t.is_empty() && t.chars().count() <= MAX_TEXT_VIEW_CHARS)
}

/// Read the identifying attributes of one element.
pub fn read_element(
    driver: &mut dyn Driver,
    handle: &ElementHandle,
) -> Result<RawElement, DriverError> {
    Ok(RawElement {
        text: driver.text(handle)?,
        resource_id: driver.attribute(handle, ATTR_RESOURCE_ID)?,
        content_desc: driver.attribute(handle, ATTR_CONTENT_DESC)?,
        class_name: driver.attribute(handle, ATTR_CLASS)?,
    })
}

// ============================================================================
// Resolution
// ============================================================================

/// Find a live, visible handle for `element`.
///
/// Tries resource id, then exact text, then content description.
pub fn resolve_element(
    driver: &mut dyn Driver,
    element: &ElementDescriptor,
) -> Result<ElementHandle, DriverError> {
    let candidates = [
        element.resource_id.clone().map(Selector::ById),
        element.text.clone().map(Selector::ByText),
        element.content_desc.clone().map(Selector::ByDescription),
    ];

    for selector in candidates.into_iter().flatten() {
        let handles = match driver.find_all(&selector) {
            Ok(h) => h,
            Err(e) => {
                debug!(%selector, "lookup failed: {}", e);
                continue;
            }
        };
        for handle in handles {
            if driver.is_visible(&handle).unwrap_or(false) {
                return Ok(handle);
            }
        }
    }

    Err(DriverError::ElementNotFound(element.id.clone()))
}
