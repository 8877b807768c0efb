use std::collections::{HashMap, HashSet};

use crate::driver::error::DriverError;
use crate::driver::selector::{
    BUTTON_CLASS, CLICKABLE_XPATH, EDIT_TEXT_CLASS, ElementHandle, ScrollDirection, Selector,
    TEXT_VIEW_CLASS,
};
use crate::driver::{ATTR_CLASS, ATTR_CLICKABLE, ATTR_CONTENT_DESC, ATTR_RESOURCE_ID, Driver};
use crate::guard::app_guard::{CRASH_PHRASES, crash_text_selector};

pub const LAUNCHER_PACKAGE: &str = "com.android.launcher3";
pub const LAUNCHER_ACTIVITY: &str = ".Launcher";

// ============================================================================
// Scripted app model
// ============================================================================

/// One element of a scripted screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockElement {
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub content_desc: Option<String>,
    pub class_name: String,
    pub clickable: bool,
    pub visible: bool,
}

impl MockElement {
    /// Clickable button identified by resource id (`com.example:id/<id>` is fine).
    pub fn button(resource_id: &str) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            class_name: BUTTON_CLASS.to_string(),
            clickable: true,
            visible: true,
            ..Default::default()
        }
    }

    /// Non-clickable text label.
    pub fn label(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            class_name: TEXT_VIEW_CLASS.to_string(),
            visible: true,
            ..Default::default()
        }
    }

    /// Editable text field identified by resource id.
    pub fn field(resource_id: &str) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            class_name: EDIT_TEXT_CLASS.to_string(),
            clickable: true,
            visible: true,
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.content_desc = Some(desc.to_string());
        self
    }

    pub fn with_class(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Key used to script tap effects: short resource id, else text, else description.
    pub fn key(&self) -> String {
        if let Some(rid) = self.resource_id.as_deref().filter(|r| !r.is_empty()) {
            return rid.rsplit('/').next().unwrap_or(rid).to_string();
        }
        self.text
            .clone()
            .or_else(|| self.content_desc.clone())
            .unwrap_or_default()
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::ById(id) => self.resource_id.as_deref().is_some_and(|rid| {
                rid == id || rid.rsplit('/').next() == Some(id.as_str())
            }),
            Selector::ByText(text) => self.text.as_deref() == Some(text.as_str()),
            Selector::ByDescription(desc) => self.content_desc.as_deref() == Some(desc.as_str()),
            Selector::ByClass(class) => &self.class_name == class,
            Selector::ByXPath(xpath) if xpath == CLICKABLE_XPATH => self.clickable,
            Selector::ByXPath(xpath) if *xpath == crash_text_selector_xpath() => self
                .text
                .as_deref()
                .is_some_and(|t| CRASH_PHRASES.iter().any(|p| t.contains(p))),
            // Only the expressions the explorer issues are understood
            Selector::ByXPath(_) => false,
        }
    }
}

fn crash_text_selector_xpath() -> String {
    match crash_text_selector() {
        Selector::ByXPath(xpath) => xpath,
        other => other.to_string(),
    }
}

/// One scripted screen.
#[derive(Debug, Clone, Default)]
pub struct MockScreen {
    pub activity: String,
    pub elements: Vec<MockElement>,
    /// Elements that only become visible after scrolling down
    pub below_fold: Vec<MockElement>,
}

impl MockScreen {
    pub fn new(activity: &str) -> Self {
        Self {
            activity: activity.to_string(),
            ..Default::default()
        }
    }

    pub fn with(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_below_fold(mut self, element: MockElement) -> Self {
        self.below_fold.push(element);
        self
    }
}

/// What tapping an element does.
#[derive(Debug, Clone)]
pub enum TapEffect {
    /// Push another screen onto the back stack
    Navigate(String),
    /// Finish the current screen and open another in its place
    Replace(String),
    /// Show popup/menu items over the current screen
    Reveal(Vec<MockElement>),
    /// Hand the foreground to another package
    Leave(String),
    /// Show an OS crash dialog over the app
    Crash,
    /// Replace the whole app with the launcher (process died)
    Kill,
}

#[derive(Debug, Clone, PartialEq)]
enum Foreground {
    App,
    Other(String),
}

// ============================================================================
// MockDriver
// ============================================================================

/// In-memory scripted app implementing `Driver`.
///
/// Screens live on a back stack; taps apply scripted `TapEffect`s keyed by
/// `(screen, element key)`. Every mutating call is appended to `history`
/// (`tap:<key>`, `type:<key>=<value>`, `back`, `scroll:down`, `activate:<pkg>`, ...)
/// so tests can assert on exactly what the explorer did.
#[derive(Debug)]
pub struct MockDriver {
    package: String,
    launch_screen: String,
    screens: HashMap<String, MockScreen>,
    effects: HashMap<(String, String), TapEffect>,
    one_shot: HashSet<(String, String)>,
    stack: Vec<String>,
    popup: Vec<MockElement>,
    crash_dialog: bool,
    foreground: Foreground,
    scrolled: bool,
    handles: HashMap<String, MockElement>,
    next_handle: u64,
    field_values: HashMap<String, String>,
    history: Vec<String>,
    failing: bool,
    restartable: bool,
}

impl MockDriver {
    /// A running app showing `launch_screen`.
    pub fn new(package: &str, launch_screen: &str) -> Self {
        Self {
            package: package.to_string(),
            launch_screen: launch_screen.to_string(),
            screens: HashMap::new(),
            effects: HashMap::new(),
            one_shot: HashSet::new(),
            stack: vec![launch_screen.to_string()],
            popup: Vec::new(),
            crash_dialog: false,
            foreground: Foreground::App,
            scrolled: false,
            handles: HashMap::new(),
            next_handle: 0,
            field_values: HashMap::new(),
            history: Vec::new(),
            failing: false,
            restartable: true,
        }
    }

    pub fn screen(mut self, name: &str, screen: MockScreen) -> Self {
        self.screens.insert(name.to_string(), screen);
        self
    }

    pub fn on_tap(mut self, screen: &str, element_key: &str, effect: TapEffect) -> Self {
        self.effects
            .insert((screen.to_string(), element_key.to_string()), effect);
        self
    }

    /// Like `on_tap`, but the effect only fires the first time.
    pub fn on_tap_once(mut self, screen: &str, element_key: &str, effect: TapEffect) -> Self {
        self.one_shot
            .insert((screen.to_string(), element_key.to_string()));
        self.on_tap(screen, element_key, effect)
    }

    /// Make activation/termination unable to bring the app back.
    pub fn unrestartable(mut self) -> Self {
        self.restartable = false;
        self
    }

    /// Make every driver call fail (or stop failing).
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Put another package in the foreground right now.
    pub fn leave_app(&mut self, package: &str) {
        self.foreground = Foreground::Other(package.to_string());
    }

    /// Show a crash dialog right now.
    pub fn show_crash_dialog(&mut self) {
        self.crash_dialog = true;
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// How many history entries equal `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.history.iter().filter(|h| h.as_str() == entry).count()
    }

    pub fn was_called(&self, prefix: &str) -> bool {
        self.history.iter().any(|h| h.starts_with(prefix))
    }

    /// Name of the screen on top of the back stack, if the app is in front.
    pub fn current_screen(&self) -> Option<&str> {
        match self.foreground {
            Foreground::App => self.stack.last().map(|s| s.as_str()),
            Foreground::Other(_) => None,
        }
    }

    pub fn field_value(&self, key: &str) -> Option<&str> {
        self.field_values.get(key).map(|s| s.as_str())
    }

    pub fn crash_dialog_showing(&self) -> bool {
        self.crash_dialog
    }

    fn check(&self, call: &str) -> Result<(), DriverError> {
        if self.failing {
            Err(DriverError::Scripted(format!("{} unavailable", call)))
        } else {
            Ok(())
        }
    }

    fn crash_dialog_elements(&self) -> Vec<MockElement> {
        vec![
            MockElement::label(&format!("{} has stopped", self.package)),
            MockElement::button("android:id/aerr_close").with_text("Close app"),
            MockElement::button("android:id/aerr_app_info").with_text("App info"),
        ]
    }

    /// Elements currently on screen, in traversal order.
    fn visible_elements(&self) -> Vec<MockElement> {
        let mut out = Vec::new();
        if self.crash_dialog {
            out.extend(self.crash_dialog_elements());
        }
        if let Some(name) = self.current_screen() {
            if let Some(screen) = self.screens.get(name) {
                out.extend(screen.elements.iter().cloned());
                if self.scrolled {
                    out.extend(screen.below_fold.iter().cloned());
                }
            }
            out.extend(self.popup.iter().cloned());
        }
        out
    }

    fn lookup(&self, element: &ElementHandle) -> Result<MockElement, DriverError> {
        self.handles
            .get(element.as_str())
            .cloned()
            .ok_or_else(|| DriverError::ElementNotFound(element.0.clone()))
    }

    /// A handle is live only while its element is still on screen.
    fn live(&self, element: &ElementHandle) -> Result<MockElement, DriverError> {
        let el = self.lookup(element)?;
        if self.visible_elements().contains(&el) {
            Ok(el)
        } else {
            Err(DriverError::ElementNotFound(element.0.clone()))
        }
    }

    fn relaunch(&mut self) {
        self.stack = vec![self.launch_screen.clone()];
        self.popup.clear();
        self.scrolled = false;
        self.foreground = Foreground::App;
    }
}

impl Driver for MockDriver {
    fn find_all(&mut self, selector: &Selector) -> Result<Vec<ElementHandle>, DriverError> {
        self.check("find_all")?;
        let matches: Vec<MockElement> = self
            .visible_elements()
            .into_iter()
            .filter(|el| el.matches(selector))
            .collect();

        Ok(matches
            .into_iter()
            .map(|el| {
                self.next_handle += 1;
                let id = format!("el-{}", self.next_handle);
                self.handles.insert(id.clone(), el);
                ElementHandle(id)
            })
            .collect())
    }

    fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        self.check("is_visible")?;
        Ok(self.live(element)?.visible)
    }

    fn text(&mut self, element: &ElementHandle) -> Result<Option<String>, DriverError> {
        self.check("text")?;
        Ok(self.live(element)?.text)
    }

    fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>, DriverError> {
        self.check("attribute")?;
        let el = self.live(element)?;
        Ok(match name {
            ATTR_RESOURCE_ID => el.resource_id,
            ATTR_CONTENT_DESC => el.content_desc,
            ATTR_CLASS => Some(el.class_name),
            ATTR_CLICKABLE => Some(el.clickable.to_string()),
            _ => None,
        })
    }

    fn tap(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        self.check("tap")?;
        let el = self.live(element)?;
        let key = el.key();
        self.history.push(format!("tap:{}", key));

        if self.crash_dialog && self.crash_dialog_elements().contains(&el) {
            self.crash_dialog = false;
            return Ok(());
        }

        let Some(screen) = self.current_screen().map(|s| s.to_string()) else {
            return Ok(());
        };

        let effect_key = (screen, key);
        let effect = if self.one_shot.remove(&effect_key) {
            self.effects.remove(&effect_key)
        } else {
            self.effects.get(&effect_key).cloned()
        };

        match effect {
            Some(TapEffect::Navigate(target)) => {
                self.popup.clear();
                self.scrolled = false;
                self.stack.push(target);
            }
            Some(TapEffect::Replace(target)) => {
                self.popup.clear();
                self.scrolled = false;
                self.stack.pop();
                self.stack.push(target);
            }
            Some(TapEffect::Reveal(items)) => self.popup = items,
            Some(TapEffect::Leave(package)) => self.foreground = Foreground::Other(package),
            Some(TapEffect::Crash) => self.crash_dialog = true,
            Some(TapEffect::Kill) => {
                self.stack.clear();
                self.popup.clear();
                self.foreground = Foreground::Other(LAUNCHER_PACKAGE.to_string());
            }
            None => {}
        }
        Ok(())
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.check("type_text")?;
        let key = self.live(element)?.key();
        self.history.push(format!("type:{}={}", key, text));
        self.field_values.insert(key, text.to_string());
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), DriverError> {
        self.check("scroll")?;
        match direction {
            ScrollDirection::Down => {
                self.history.push("scroll:down".into());
                self.scrolled = true;
            }
            ScrollDirection::Up => {
                self.history.push("scroll:up".into());
                self.scrolled = false;
            }
        }
        Ok(())
    }

    fn hide_keyboard(&mut self) -> Result<(), DriverError> {
        self.check("hide_keyboard")?;
        self.history.push("hide_keyboard".into());
        Ok(())
    }

    fn navigate_back(&mut self) -> Result<(), DriverError> {
        self.check("navigate_back")?;
        self.history.push("back".into());

        if self.crash_dialog {
            self.crash_dialog = false;
        } else if !self.popup.is_empty() {
            self.popup.clear();
        } else if self.foreground == Foreground::App {
            if self.stack.len() > 1 {
                self.stack.pop();
                self.scrolled = false;
            } else {
                // Backing out of the root screen closes the app
                self.stack.clear();
                self.foreground = Foreground::Other(LAUNCHER_PACKAGE.to_string());
            }
        }
        Ok(())
    }

    fn current_activity(&mut self) -> Result<Option<String>, DriverError> {
        self.check("current_activity")?;
        Ok(match &self.foreground {
            Foreground::App => self
                .current_screen()
                .and_then(|name| self.screens.get(name))
                .map(|s| s.activity.clone()),
            Foreground::Other(_) => Some(LAUNCHER_ACTIVITY.to_string()),
        })
    }

    fn current_package(&mut self) -> Result<Option<String>, DriverError> {
        self.check("current_package")?;
        Ok(Some(match &self.foreground {
            Foreground::App => self.package.clone(),
            Foreground::Other(package) => package.clone(),
        }))
    }

    fn page_source(&mut self) -> Result<String, DriverError> {
        self.check("page_source")?;
        let package = self.current_package()?.unwrap_or_default();
        Ok(format!(
            "<hierarchy rotation=\"0\"><node package=\"{}\" class=\"android.widget.FrameLayout\"/></hierarchy>",
            package
        ))
    }

    fn activate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.check("activate_app")?;
        self.history.push(format!("activate:{}", app_id));
        if app_id == self.package && self.restartable {
            if self.stack.is_empty() {
                self.relaunch();
            } else {
                self.foreground = Foreground::App;
            }
        }
        Ok(())
    }

    fn terminate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.check("terminate_app")?;
        self.history.push(format!("terminate:{}", app_id));
        if app_id == self.package {
            self.stack.clear();
            self.popup.clear();
            self.crash_dialog = false;
            self.foreground = Foreground::Other(LAUNCHER_PACKAGE.to_string());
        }
        Ok(())
    }

    fn settle(&mut self, _ms: u64) {}
}
