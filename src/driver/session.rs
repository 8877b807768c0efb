use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::driver::error::DriverError;
use crate::driver::selector::{ElementHandle, ScrollDirection, Selector};
use crate::driver::Driver;

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Legacy JSONWP key some older servers still send.
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

// ============================================================================
// Session configuration
// ============================================================================

/// Everything needed to start a UiAutomator2 session on an Appium server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Appium server base URL
    pub server_url: String,

    /// Device name or serial
    pub device_name: String,

    /// Android platform version, if pinned
    pub platform_version: Option<String>,

    /// Path to an APK to install; when set, package/activity are not sent
    pub app: Option<String>,

    /// Package of the app under test
    pub app_package: String,

    /// Launch activity, when starting an installed app
    pub app_activity: Option<String>,

    /// Idle seconds before the server reaps the session
    pub new_command_timeout_secs: u64,

    /// Seconds to wait for the app and the UiAutomator2 server to come up
    pub app_wait_secs: u64,

    /// Per-request HTTP timeout
    pub request_timeout_secs: u64,

    /// Fraction of the viewport height a scroll gesture travels
    pub scroll_distance: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4723".to_string(),
            device_name: "emulator-5554".to_string(),
            platform_version: None,
            app: None,
            app_package: String::new(),
            app_activity: None,
            new_command_timeout_secs: 300,
            app_wait_secs: 90,
            request_timeout_secs: 120,
            scroll_distance: 0.4,
        }
    }
}

impl SessionConfig {
    /// W3C `capabilities` payload for `POST /session`.
    pub fn capabilities(&self) -> Value {
        let wait_ms = self.app_wait_secs * 1000;
        let mut always = json!({
            "platformName": "Android",
            "appium:automationName": "UiAutomator2",
            "appium:deviceName": self.device_name,
            "appium:autoGrantPermissions": true,
            "appium:newCommandTimeout": self.new_command_timeout_secs,
            "appium:appWaitDuration": wait_ms,
            "appium:uiautomator2ServerLaunchTimeout": wait_ms,
            "appium:uiautomator2ServerInstallTimeout": wait_ms,
            "appium:adbExecTimeout": 60_000,
        });

        if let Some(version) = &self.platform_version {
            always["appium:platformVersion"] = json!(version);
        }

        match &self.app {
            Some(app) if !app.is_empty() => {
                always["appium:app"] = json!(app);
                // Splash screens launch through a different activity
                always["appium:appWaitActivity"] = json!("*");
            }
            _ => {
                always["appium:appPackage"] = json!(self.app_package);
                if let Some(activity) = &self.app_activity {
                    always["appium:appActivity"] = json!(activity);
                }
            }
        }

        json!({ "capabilities": { "alwaysMatch": always, "firstMatch": [{}] } })
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Envelope of every W3C response.
#[derive(Debug, Deserialize)]
pub struct W3cResponse {
    #[serde(default)]
    pub value: Value,
}

/// Error payload carried in `value` on failure.
#[derive(Debug, Deserialize)]
pub struct W3cError {
    pub error: String,
    #[serde(default)]
    pub message: String,
}

/// Viewport rectangle from `GET /window/rect`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct WindowRect {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

/// Start and end of a vertical swipe that scrolls content in `direction`.
///
/// The gesture runs along the horizontal center and travels `distance`
/// (a fraction of the height, clamped to 0.1..=0.9) around the vertical center.
pub fn scroll_gesture(rect: &WindowRect, direction: ScrollDirection, distance: f64) -> (Point, Point) {
    let distance = distance.clamp(0.1, 0.9);
    let x = (rect.x + rect.width / 2.0) as i64;
    let low = (rect.y + rect.height * (0.5 + distance / 2.0)) as i64;
    let high = (rect.y + rect.height * (0.5 - distance / 2.0)) as i64;

    match direction {
        // Finger moves up to reveal content below
        ScrollDirection::Down => (Point { x, y: low }, Point { x, y: high }),
        ScrollDirection::Up => (Point { x, y: high }, Point { x, y: low }),
    }
}

/// W3C pointer action sequence for a single-finger swipe.
pub fn swipe_actions(from: Point, to: Point, duration_ms: u64) -> Value {
    json!({
        "actions": [{
            "type": "pointer",
            "id": "finger",
            "parameters": { "pointerType": "touch" },
            "actions": [
                { "type": "pointerMove", "duration": 0, "x": from.x, "y": from.y, "origin": "viewport" },
                { "type": "pointerDown", "button": 0 },
                { "type": "pointerMove", "duration": duration_ms, "x": to.x, "y": to.y, "origin": "viewport" },
                { "type": "pointerUp", "button": 0 }
            ]
        }]
    })
}

/// Pull an element id out of a W3C element reference object.
fn element_id(value: &Value) -> Option<String> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn optional_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        _ => None,
    }
}

// ============================================================================
// Appium session
// ============================================================================

/// A live UiAutomator2 session on an Appium server.
///
/// Every driver call is one blocking HTTP round-trip; the explorer is the
/// only caller, so no request is ever in flight concurrently.
pub struct AppiumSession {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    scroll_distance: f64,
}

impl AppiumSession {
    /// Create a new session from `config`.
    pub fn launch(config: &SessionConfig) -> Result<Self, DriverError> {
        let base_url = config.server_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DriverError::Http {
                endpoint: base_url.clone(),
                source: e,
            })?;

        let mut session = AppiumSession {
            client,
            base_url,
            session_id: None,
            scroll_distance: config.scroll_distance,
        };

        let value = session.send(Method::POST, "/session", Some(config.capabilities()), "new_session")?;
        let id = value
            .get("sessionId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DriverError::Protocol {
                command: "new_session".into(),
                detail: "no sessionId in response".into(),
            })?
            .to_string();

        info!(session = %id, package = %config.app_package, "Appium session started");
        session.session_id = Some(id);
        Ok(session)
    }

    /// Session id, if the session is still alive.
    pub fn id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Delete the session on the server.
    pub fn quit(&mut self) -> Result<(), DriverError> {
        if self.session_id.is_none() {
            return Ok(());
        }
        let path = self.session_path("")?;
        let result = self.send(Method::DELETE, &path, None, "delete_session");
        self.session_id = None;
        result.map(|_| ())
    }

    fn session_path(&self, suffix: &str) -> Result<String, DriverError> {
        let id = self.session_id.as_deref().ok_or(DriverError::NoSession)?;
        Ok(format!("/session/{}{}", id, suffix))
    }

    /// Send a request and unwrap the W3C `value`, mapping error payloads.
    fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Value>,
        command: &str,
    ) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, command, "driver request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().map_err(|e| DriverError::Http {
            endpoint: url.clone(),
            source: e,
        })?;
        let status = response.status();
        let text = response.text().map_err(|e| DriverError::Http {
            endpoint: url.clone(),
            source: e,
        })?;

        let parsed: W3cResponse = serde_json::from_str(&text).map_err(|e| DriverError::JsonParse {
            context: format!("{} response", command),
            source: e,
        })?;

        if !status.is_success() || parsed.value.get("error").is_some() {
            let err: W3cError = serde_json::from_value(parsed.value.clone()).unwrap_or(W3cError {
                error: format!("http {}", status.as_u16()),
                message: text.clone(),
            });
            return Err(DriverError::Command {
                command: command.to_string(),
                error: err.error,
                message: err.message,
            });
        }

        Ok(parsed.value)
    }

    fn element_get(&mut self, element: &ElementHandle, suffix: &str, command: &str) -> Result<Value, DriverError> {
        let path = self.session_path(&format!("/element/{}{}", element.as_str(), suffix))?;
        self.send(Method::GET, &path, None, command)
    }

    fn element_post(&mut self, element: &ElementHandle, suffix: &str, body: Value, command: &str) -> Result<Value, DriverError> {
        let path = self.session_path(&format!("/element/{}{}", element.as_str(), suffix))?;
        self.send(Method::POST, &path, Some(body), command)
    }

    fn device_get(&mut self, suffix: &str, command: &str) -> Result<Value, DriverError> {
        let path = self.session_path(&format!("/appium/device/{}", suffix))?;
        self.send(Method::GET, &path, None, command)
    }

    fn device_post(&mut self, suffix: &str, body: Value, command: &str) -> Result<Value, DriverError> {
        let path = self.session_path(&format!("/appium/device/{}", suffix))?;
        self.send(Method::POST, &path, Some(body), command)
    }

    fn window_rect(&mut self) -> Result<WindowRect, DriverError> {
        let path = self.session_path("/window/rect")?;
        let value = self.send(Method::GET, &path, None, "window_rect")?;
        serde_json::from_value(value).map_err(|e| DriverError::JsonParse {
            context: "window rect".into(),
            source: e,
        })
    }
}

impl Driver for AppiumSession {
    fn find_all(&mut self, selector: &Selector) -> Result<Vec<ElementHandle>, DriverError> {
        let (using, value) = selector.locator();
        let path = self.session_path("/elements")?;
        let found = self.send(
            Method::POST,
            &path,
            Some(json!({ "using": using, "value": value })),
            "find_elements",
        )?;

        let refs = found.as_array().ok_or_else(|| DriverError::Protocol {
            command: "find_elements".into(),
            detail: "value is not an array".into(),
        })?;

        Ok(refs
            .iter()
            .filter_map(element_id)
            .map(ElementHandle)
            .collect())
    }

    fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, DriverError> {
        let value = self.element_get(element, "/displayed", "is_displayed")?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn text(&mut self, element: &ElementHandle) -> Result<Option<String>, DriverError> {
        let value = self.element_get(element, "/text", "get_text")?;
        Ok(optional_string(value).filter(|s| !s.is_empty()))
    }

    fn attribute(&mut self, element: &ElementHandle, name: &str) -> Result<Option<String>, DriverError> {
        let value = self.element_get(element, &format!("/attribute/{}", name), "get_attribute")?;
        Ok(optional_string(value))
    }

    fn tap(&mut self, element: &ElementHandle) -> Result<(), DriverError> {
        self.element_post(element, "/click", json!({}), "click")?;
        Ok(())
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> Result<(), DriverError> {
        self.element_post(element, "/clear", json!({}), "clear")?;
        self.element_post(element, "/value", json!({ "text": text }), "send_keys")?;
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), DriverError> {
        let rect = self.window_rect()?;
        let (from, to) = scroll_gesture(&rect, direction, self.scroll_distance);
        let path = self.session_path("/actions")?;
        self.send(Method::POST, &path, Some(swipe_actions(from, to, 500)), "perform_actions")?;
        Ok(())
    }

    fn hide_keyboard(&mut self) -> Result<(), DriverError> {
        self.device_post("hide_keyboard", json!({}), "hide_keyboard")?;
        Ok(())
    }

    fn navigate_back(&mut self) -> Result<(), DriverError> {
        let path = self.session_path("/back")?;
        self.send(Method::POST, &path, Some(json!({})), "back")?;
        Ok(())
    }

    fn current_activity(&mut self) -> Result<Option<String>, DriverError> {
        let value = self.device_get("current_activity", "current_activity")?;
        Ok(optional_string(value))
    }

    fn current_package(&mut self) -> Result<Option<String>, DriverError> {
        let value = self.device_get("current_package", "current_package")?;
        Ok(optional_string(value))
    }

    fn page_source(&mut self) -> Result<String, DriverError> {
        let path = self.session_path("/source")?;
        let value = self.send(Method::GET, &path, None, "page_source")?;
        optional_string(value).ok_or_else(|| DriverError::Protocol {
            command: "page_source".into(),
            detail: "source is not a string".into(),
        })
    }

    fn activate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.device_post("activate_app", json!({ "appId": app_id }), "activate_app")?;
        Ok(())
    }

    fn terminate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.device_post("terminate_app", json!({ "appId": app_id }), "terminate_app")?;
        Ok(())
    }
}

impl Drop for AppiumSession {
    fn drop(&mut self) {
        if let Err(e) = self.quit() {
            warn!("failed to delete Appium session: {}", e);
        }
    }
}
