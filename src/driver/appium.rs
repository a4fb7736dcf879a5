use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::driver::adapter::{
    AppState, DiscoveredElement, DriverAdapter, DriverError, ElementCapability, ElementRef,
    read_attributes,
};
use crate::state::hash::PageSnapshot;
use crate::state::identity::ElementAttributes;

/// W3C key under which element ids are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const UIAUTOMATOR: &str = "-android uiautomator";
const INTERACTABLE_SELECTOR: &str = "new UiSelector().clickable(true).enabled(true)";
const SCROLL_FORWARD_SELECTOR: &str =
    "new UiScrollable(new UiSelector().scrollable(true)).scrollForward()";

const DISPLAYED_POLL: Duration = Duration::from_millis(250);

/// Response envelope of every WebDriver endpoint.
#[derive(Debug, Deserialize)]
pub struct WebDriverResponse {
    #[serde(default)]
    pub value: Value,
}

impl WebDriverResponse {
    /// W3C errors come back as `{ "value": { "error": ..., "message": ... } }`.
    fn error(&self) -> Option<(String, String)> {
        let obj = self.value.as_object()?;
        let error = obj.get("error")?.as_str()?.to_string();
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        Some((error, message))
    }
}

/// A live Appium session over the WebDriver HTTP protocol.
///
/// Commands are plain blocking HTTP calls; the session is deleted on `quit`
/// or drop.
pub struct AppiumSession {
    client: Client,
    server_url: String,
    session_id: Option<String>,
}

impl AppiumSession {
    /// Open a new session on `server_url` with the given capabilities.
    pub fn connect(server_url: &str, capabilities: &Map<String, Value>) -> Result<Self, DriverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| DriverError::Http {
                endpoint: server_url.to_string(),
                source: e,
            })?;

        let mut session = AppiumSession {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            session_id: None,
        };

        info!(server = %session.server_url, "opening Appium session");
        let body = json!({ "capabilities": { "alwaysMatch": capabilities } });
        let response = session.send_ok("new_session", reqwest::Method::POST, "/session", Some(body))?;

        let session_id = response
            .value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol {
                command: "new_session".into(),
                detail: "no sessionId in response".into(),
            })?;

        info!(session_id, "Appium session ready");
        session.session_id = Some(session_id.to_string());
        Ok(session)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn session_path(&self, suffix: &str) -> Result<String, DriverError> {
        let id = self.session_id.as_deref().ok_or_else(|| DriverError::Command {
            command: suffix.to_string(),
            message: "session already closed".into(),
        })?;
        Ok(format!("/session/{id}{suffix}"))
    }

    /// Send a request and parse the response envelope.
    fn send(
        &self,
        command: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<WebDriverResponse, DriverError> {
        let url = format!("{}{}", self.server_url, path);
        debug!(command, %url, "webdriver request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().map_err(|e| DriverError::Http {
            endpoint: url.clone(),
            source: e,
        })?;

        let text = response.text().map_err(|e| DriverError::Http {
            endpoint: url.clone(),
            source: e,
        })?;

        serde_json::from_str(&text).map_err(|e| DriverError::JsonParse {
            context: format!("{command} response"),
            source: e,
        })
    }

    /// Send a request and verify it succeeded.
    fn send_ok(
        &self,
        command: &str,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<WebDriverResponse, DriverError> {
        let response = self.send(command, method, path, body)?;
        match response.error() {
            Some((error, message)) if error == "stale element reference" => {
                Err(DriverError::StaleElement(message))
            }
            Some((error, message)) => Err(DriverError::Command {
                command: command.into(),
                message: format!("{error}: {message}"),
            }),
            None => Ok(response),
        }
    }

    fn execute(&self, script: &str, args: Value) -> Result<Value, DriverError> {
        let path = self.session_path("/execute/sync")?;
        let body = json!({ "script": script, "args": [args] });
        let response = self.send_ok(script, reqwest::Method::POST, &path, Some(body))?;
        Ok(response.value)
    }

    fn find_elements(&self, using: &str, selector: &str) -> Result<Vec<ElementRef>, DriverError> {
        let path = self.session_path("/elements")?;
        let body = json!({ "using": using, "value": selector });
        let response = self.send_ok("find_elements", reqwest::Method::POST, &path, Some(body))?;

        let items = response.value.as_array().ok_or_else(|| DriverError::Protocol {
            command: "find_elements".into(),
            detail: "value is not an array".into(),
        })?;

        Ok(items.iter().filter_map(element_ref_from).collect())
    }

    /// `Ok(None)` on "no such element".
    fn find_element(&self, using: &str, selector: &str) -> Result<Option<ElementRef>, DriverError> {
        let path = self.session_path("/element")?;
        let body = json!({ "using": using, "value": selector });
        let response = self.send("find_element", reqwest::Method::POST, &path, Some(body))?;

        match response.error() {
            Some((error, _)) if error == "no such element" => Ok(None),
            Some((error, message)) => Err(DriverError::Command {
                command: "find_element".into(),
                message: format!("{error}: {message}"),
            }),
            None => Ok(element_ref_from(&response.value)),
        }
    }

    fn element_path(&self, element: &ElementRef, suffix: &str) -> Result<String, DriverError> {
        self.session_path(&format!("/element/{}{}", element.0, suffix))
    }

    fn is_displayed(&self, element: &ElementRef) -> Result<bool, DriverError> {
        let path = self.element_path(element, "/displayed")?;
        let response = self.send_ok("displayed", reqwest::Method::GET, &path, None)?;
        Ok(response.value.as_bool().unwrap_or(false))
    }
}

impl DriverAdapter for AppiumSession {
    fn snapshot(&mut self) -> Result<PageSnapshot, DriverError> {
        let path = self.session_path("/source")?;
        let response = self.send_ok("source", reqwest::Method::GET, &path, None)?;
        let source = response.value.as_str().ok_or_else(|| DriverError::Protocol {
            command: "source".into(),
            detail: "page source is not a string".into(),
        })?;
        Ok(PageSnapshot::from(source))
    }

    fn find_interactable(&mut self) -> Result<Vec<DiscoveredElement>, DriverError> {
        let refs = self.find_elements(UIAUTOMATOR, INTERACTABLE_SELECTOR)?;
        Ok(describe_elements(self, refs))
    }

    fn locate(&mut self, target: &ElementAttributes) -> Result<Option<ElementRef>, DriverError> {
        self.find_element(UIAUTOMATOR, &ui_selector_for(target))
    }

    fn attribute(&mut self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
        let path = self.element_path(element, &format!("/attribute/{name}"))?;
        let response = self.send_ok("attribute", reqwest::Method::GET, &path, None)?;
        Ok(response
            .value
            .as_str()
            .filter(|v| *v != "null")
            .map(str::to_string))
    }

    fn text(&mut self, element: &ElementRef) -> Result<String, DriverError> {
        let path = self.element_path(element, "/text")?;
        let response = self.send_ok("text", reqwest::Method::GET, &path, None)?;
        Ok(response.value.as_str().unwrap_or_default().to_string())
    }

    fn click(&mut self, element: &ElementRef) -> Result<(), DriverError> {
        let path = self.element_path(element, "/click")?;
        self.send_ok("click", reqwest::Method::POST, &path, Some(json!({})))?;
        Ok(())
    }

    fn set_value(&mut self, element: &ElementRef, value: &str) -> Result<(), DriverError> {
        let clear = self.element_path(element, "/clear")?;
        self.send_ok("clear", reqwest::Method::POST, &clear, Some(json!({})))?;

        let path = self.element_path(element, "/value")?;
        self.send_ok("value", reqwest::Method::POST, &path, Some(json!({ "text": value })))?;
        Ok(())
    }

    fn scroll_forward_once(&mut self) -> Result<(), DriverError> {
        // The UiScrollable lookup performs the scroll; a miss means nothing scrollable.
        if self.find_element(UIAUTOMATOR, SCROLL_FORWARD_SELECTOR)?.is_none() {
            debug!("no scrollable container matched");
        }
        Ok(())
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        let path = self.session_path("/screenshot")?;
        let response = self.send_ok("screenshot", reqwest::Method::GET, &path, None)?;
        let encoded = response.value.as_str().ok_or_else(|| DriverError::Protocol {
            command: "screenshot".into(),
            detail: "screenshot is not a string".into(),
        })?;
        Ok(STANDARD.decode(encoded)?)
    }

    fn query_app_state(&mut self, app_id: &str) -> Result<AppState, DriverError> {
        let value = self.execute("mobile: queryAppState", json!({ "appId": app_id }))?;
        value
            .as_i64()
            .and_then(AppState::from_ordinal)
            .ok_or_else(|| DriverError::Protocol {
                command: "mobile: queryAppState".into(),
                detail: format!("unexpected app state {value}"),
            })
    }

    fn activate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.execute("mobile: activateApp", json!({ "appId": app_id }))?;
        Ok(())
    }

    fn terminate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.execute("mobile: terminateApp", json!({ "appId": app_id }))?;
        Ok(())
    }

    fn wait_for_displayed(&mut self, element: &ElementRef, timeout: Duration) -> Result<bool, DriverError> {
        let polls = (timeout.as_millis() / DISPLAYED_POLL.as_millis()).max(1);
        for _ in 0..polls {
            match self.is_displayed(element) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(DriverError::StaleElement(_)) => return Ok(false),
                Err(e) => return Err(e),
            }
            self.pause(DISPLAYED_POLL);
        }
        Ok(false)
    }

    fn pause(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };
        info!(session_id = %id, "closing Appium session");
        self.send_ok(
            "delete_session",
            reqwest::Method::DELETE,
            &format!("/session/{id}"),
            None,
        )?;
        Ok(())
    }
}

impl Drop for AppiumSession {
    fn drop(&mut self) {
        if let Err(e) = self.quit() {
            warn!(error = %e, "failed to close Appium session");
        }
    }
}

fn element_ref_from(value: &Value) -> Option<ElementRef> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(|id| ElementRef(id.to_string()))
}

/// Read identity and class for each element, dropping the ones that went
/// stale part-way through.
fn describe_elements<D: DriverAdapter + ?Sized>(driver: &mut D, refs: Vec<ElementRef>) -> Vec<DiscoveredElement> {
    let mut discovered = Vec::with_capacity(refs.len());

    for element in refs {
        match describe_element(driver, &element) {
            Ok((attributes, capability)) => discovered.push(DiscoveredElement {
                element,
                attributes,
                capability,
            }),
            Err(e) => {
                debug!(element = %element.0, error = %e, "skipping unreadable element");
            }
        }
    }

    discovered
}

fn describe_element<D: DriverAdapter + ?Sized>(
    driver: &mut D,
    element: &ElementRef,
) -> Result<(ElementAttributes, ElementCapability), DriverError> {
    let attributes = read_attributes(driver, element)?;
    let class = driver.attribute(element, "class")?.unwrap_or_default();
    Ok((attributes, capability_for_class(&class)))
}

/// Text-entry widgets are typed in, everything else is tapped.
pub fn capability_for_class(class: &str) -> ElementCapability {
    if class.ends_with("EditText") || class.ends_with("AutoCompleteTextView") {
        ElementCapability::TextInput
    } else {
        ElementCapability::Clickable
    }
}

/// Build a UiSelector from the non-empty parts of an attribute triple.
pub fn ui_selector_for(target: &ElementAttributes) -> String {
    let mut selector = String::from("new UiSelector()");
    if !target.resource_id.is_empty() {
        selector.push_str(&format!(".resourceId(\"{}\")", escape(&target.resource_id)));
    }
    if !target.label.is_empty() {
        selector.push_str(&format!(".description(\"{}\")", escape(&target.label)));
    }
    if !target.text.is_empty() {
        selector.push_str(&format!(".text(\"{}\")", escape(&target.text)));
    }
    selector
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::{MockDriver, MockElement, MockScreen};

    #[test]
    fn selector_skips_empty_parts() {
        let target = ElementAttributes::new("com.app:id/ok", "", "OK");
        assert_eq!(
            ui_selector_for(&target),
            "new UiSelector().resourceId(\"com.app:id/ok\").text(\"OK\")"
        );
    }

    #[test]
    fn selector_escapes_quotes() {
        let target = ElementAttributes::new("", "say \"hi\"", "");
        assert_eq!(
            ui_selector_for(&target),
            "new UiSelector().description(\"say \\\"hi\\\"\")"
        );
    }

    #[test]
    fn edit_text_is_text_input() {
        assert_eq!(capability_for_class("android.widget.EditText"), ElementCapability::TextInput);
        assert_eq!(capability_for_class("android.widget.Button"), ElementCapability::Clickable);
    }

    #[test]
    fn enumeration_skips_element_that_goes_stale_mid_read() {
        let mut driver = MockDriver::new("com.example.app", "home").with_screen(
            MockScreen::new("home")
                .with(MockElement::button("first"))
                .with(MockElement::button("flaky"))
                .with(MockElement::text_field("last")),
        );
        // Identity reads succeed, the class read does not
        driver.vanish_after_reads(MockElement::button("flaky").identity(), 3);
        let refs: Vec<ElementRef> = driver
            .find_interactable()
            .unwrap()
            .into_iter()
            .map(|d| d.element)
            .collect();

        let described = describe_elements(&mut driver, refs);

        let ids: Vec<&str> = described
            .iter()
            .map(|d| d.attributes.resource_id.as_str())
            .collect();
        assert_eq!(ids, vec!["first", "last"]);
        assert_eq!(described[1].capability, ElementCapability::TextInput);
    }

    #[test]
    fn parses_w3c_element_refs() {
        let value = json!({ ELEMENT_KEY: "abc-123" });
        assert_eq!(element_ref_from(&value), Some(ElementRef("abc-123".into())));
        assert_eq!(element_ref_from(&json!({})), None);
    }

    #[test]
    fn detects_w3c_error_envelope() {
        let response: WebDriverResponse = serde_json::from_value(json!({
            "value": { "error": "no such element", "message": "not found" }
        }))
        .unwrap();
        assert_eq!(
            response.error(),
            Some(("no such element".to_string(), "not found".to_string()))
        );
    }
}
