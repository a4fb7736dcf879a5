use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state::hash::PageSnapshot;
use crate::state::identity::ElementAttributes;

// ============================================================================
// Driver errors
// ============================================================================

#[derive(Debug, Error)]
pub enum DriverError {
    /// Transport-level failure talking to the automation server
    #[error("request to {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered but reported a command failure
    #[error("command '{command}' failed: {message}")]
    Command { command: String, message: String },

    /// Response body was not the JSON we expected
    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Element reference no longer resolves to anything on screen
    #[error("element {0} is stale or gone")]
    StaleElement(String),

    #[error("unexpected response shape for '{command}': {detail}")]
    Protocol { command: String, detail: String },

    #[error("screenshot payload is not valid base64: {0}")]
    ScreenshotDecode(#[from] base64::DecodeError),
}

// ============================================================================
// Element model handed to the crawler
// ============================================================================

/// Opaque handle to an element on the current screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

/// How the crawler should activate an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementCapability {
    Clickable,
    TextInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredElement {
    pub element: ElementRef,
    pub attributes: ElementAttributes,
    pub capability: ElementCapability,
}

/// App lifecycle state as reported by the device (`mobile: queryAppState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AppState {
    NotInstalled = 0,
    NotRunning = 1,
    BackgroundSuspended = 2,
    Background = 3,
    Foreground = 4,
}

impl AppState {
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(AppState::NotInstalled),
            1 => Some(AppState::NotRunning),
            2 => Some(AppState::BackgroundSuspended),
            3 => Some(AppState::Background),
            4 => Some(AppState::Foreground),
            _ => None,
        }
    }

    pub fn ordinal(self) -> i64 {
        self as i64
    }
}

// ============================================================================
// DriverAdapter trait: the device automation seam
// ============================================================================

/// Blocking device-automation backend.
///
/// Every call is bounded by the backend's own timeouts. `pause` is the only
/// way the crawler waits, so simulated drivers can advance virtual time.
pub trait DriverAdapter {
    /// Serialized UI tree of the current screen.
    fn snapshot(&mut self) -> Result<PageSnapshot, DriverError>;

    /// Clickable and enabled elements, in on-screen enumeration order.
    fn find_interactable(&mut self) -> Result<Vec<DiscoveredElement>, DriverError>;

    /// Find an element again by its recorded attributes.
    fn locate(&mut self, target: &ElementAttributes) -> Result<Option<ElementRef>, DriverError>;

    fn attribute(&mut self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError>;

    fn text(&mut self, element: &ElementRef) -> Result<String, DriverError>;

    fn click(&mut self, element: &ElementRef) -> Result<(), DriverError>;

    fn set_value(&mut self, element: &ElementRef, value: &str) -> Result<(), DriverError>;

    /// One forward scroll of the first scrollable container.
    fn scroll_forward_once(&mut self) -> Result<(), DriverError>;

    /// PNG bytes of the current screen.
    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError>;

    fn query_app_state(&mut self, app_id: &str) -> Result<AppState, DriverError>;

    fn activate_app(&mut self, app_id: &str) -> Result<(), DriverError>;

    fn terminate_app(&mut self, app_id: &str) -> Result<(), DriverError>;

    /// `Ok(false)` when the element never became visible within `timeout`.
    fn wait_for_displayed(&mut self, element: &ElementRef, timeout: Duration) -> Result<bool, DriverError>;

    fn pause(&mut self, duration: Duration);

    /// Release the automation session.
    fn quit(&mut self) -> Result<(), DriverError>;
}

/// Read the identity triple of an element through the generic attribute calls.
pub fn read_attributes<D: DriverAdapter + ?Sized>(
    driver: &mut D,
    element: &ElementRef,
) -> Result<ElementAttributes, DriverError> {
    let resource_id = driver.attribute(element, "resource-id")?.unwrap_or_default();
    let label = driver.attribute(element, "content-desc")?.unwrap_or_default();
    let text = driver.text(element)?;
    Ok(ElementAttributes {
        resource_id,
        label,
        text,
    })
}
