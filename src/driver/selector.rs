use std::fmt;

use serde::{Deserialize, Serialize};

pub const CLICKABLE_XPATH: &str = "//*[@clickable='true']";
pub const EDIT_TEXT_CLASS: &str = "android.widget.EditText";
pub const TEXT_VIEW_CLASS: &str = "android.widget.TextView";
pub const BUTTON_CLASS: &str = "android.widget.Button";

/// How to locate elements in the UI hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value")]
pub enum Selector {
    /// Full or short resource id
    #[serde(rename = "id")]
    ById(String),

    /// Raw XPath over the native hierarchy
    #[serde(rename = "xpath")]
    ByXPath(String),

    /// Exact native class name
    #[serde(rename = "class")]
    ByClass(String),

    /// Exact visible text
    #[serde(rename = "text")]
    ByText(String),

    /// Exact content description (accessibility id)
    #[serde(rename = "description")]
    ByDescription(String),
}

impl Selector {
    /// Every element whose native `clickable` attribute is true.
    pub fn clickable() -> Self {
        Selector::ByXPath(CLICKABLE_XPATH.to_string())
    }

    /// W3C locator strategy and value for this selector.
    pub fn locator(&self) -> (&'static str, String) {
        match self {
            Selector::ById(id) => ("id", id.clone()),
            Selector::ByXPath(xpath) => ("xpath", xpath.clone()),
            Selector::ByClass(class) => ("class name", class.clone()),
            Selector::ByText(text) => ("xpath", format!("//*[@text={}]", xpath_literal(text))),
            Selector::ByDescription(desc) => ("accessibility id", desc.clone()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::ById(v) => write!(f, "id:{}", v),
            Selector::ByXPath(v) => write!(f, "xpath:{}", v),
            Selector::ByClass(v) => write!(f, "class:{}", v),
            Selector::ByText(v) => write!(f, "text:{}", v),
            Selector::ByDescription(v) => write!(f, "desc:{}", v),
        }
    }
}

/// Quote a string for use inside an XPath expression.
///
/// XPath 1.0 has no escape sequences, so a value holding both quote kinds
/// is assembled with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|p| format!("'{}'", p))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// XPath matching any element whose text contains one of `phrases`.
pub fn text_contains_any_xpath(phrases: &[&str]) -> String {
    let predicates: Vec<String> = phrases
        .iter()
        .map(|p| format!("contains(@text, {})", xpath_literal(p)))
        .collect();
    format!("//*[{}]", predicates.join(" or "))
}

/// Direction the content moves into view from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Opaque reference to an element inside the live session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
