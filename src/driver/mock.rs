use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::driver::adapter::{
    AppState, DiscoveredElement, DriverAdapter, DriverError, ElementCapability, ElementRef,
};
use crate::state::hash::PageSnapshot;
use crate::state::identity::{ElementAttributes, ElementIdentity};

// ============================================================================
// Scripted app model
// ============================================================================

/// What happens when a mock element is activated.
#[derive(Debug, Clone, PartialEq)]
pub enum MockAction {
    /// No visible effect
    Nothing,
    /// Move to another screen
    Navigate(String),
    /// Flip some on-screen state without navigating
    Toggle,
    /// Kill the app process
    Crash,
    /// Send the app to the background
    Background,
}

#[derive(Debug, Clone)]
pub struct MockElement {
    pub attributes: ElementAttributes,
    pub capability: ElementCapability,
    pub action: MockAction,
    /// Scroll offset at which the element becomes visible
    pub page: usize,
    /// Never reports as displayed
    pub hidden: bool,
}

impl MockElement {
    pub fn button(resource_id: &str) -> Self {
        Self {
            attributes: ElementAttributes::new(resource_id, "", ""),
            capability: ElementCapability::Clickable,
            action: MockAction::Nothing,
            page: 0,
            hidden: false,
        }
    }

    pub fn text_field(resource_id: &str) -> Self {
        Self {
            capability: ElementCapability::TextInput,
            ..Self::button(resource_id)
        }
    }

    pub fn with_attributes(mut self, attributes: ElementAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn navigates_to(mut self, screen: &str) -> Self {
        self.action = MockAction::Navigate(screen.to_string());
        self
    }

    pub fn toggles(mut self) -> Self {
        self.action = MockAction::Toggle;
        self
    }

    pub fn crashes(mut self) -> Self {
        self.action = MockAction::Crash;
        self
    }

    pub fn backgrounds(mut self) -> Self {
        self.action = MockAction::Background;
        self
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn identity(&self) -> ElementIdentity {
        self.attributes.identity()
    }
}

#[derive(Debug, Clone)]
pub struct MockScreen {
    pub name: String,
    pub elements: Vec<MockElement>,
    /// How many forward scrolls actually move this screen
    pub scroll_pages: usize,
}

impl MockScreen {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            elements: Vec::new(),
            scroll_pages: 0,
        }
    }

    pub fn with(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn scrollable(mut self, pages: usize) -> Self {
        self.scroll_pages = pages;
        self
    }
}

// ============================================================================
// MockDriver
// ============================================================================

/// In-memory `DriverAdapter` over a scripted screen graph.
///
/// Time is virtual: `pause` only advances a counter. Every state-changing
/// command is appended to `commands` so tests can assert on replays.
#[derive(Debug)]
pub struct MockDriver {
    screens: HashMap<String, MockScreen>,
    launch_screen: String,
    app_id: String,

    current: String,
    scroll: usize,
    toggles: usize,
    values: HashMap<ElementIdentity, String>,
    app_state: AppState,

    forced_states: VecDeque<AppState>,
    failed_activations: usize,
    locate_disabled: bool,
    broken: HashSet<ElementIdentity>,
    vanishing: HashMap<ElementIdentity, usize>,

    elapsed: Duration,
    screenshots: usize,
    quit: bool,
    pub commands: Vec<String>,
}

impl MockDriver {
    pub fn new(app_id: &str, launch_screen: &str) -> Self {
        Self {
            screens: HashMap::new(),
            launch_screen: launch_screen.to_string(),
            app_id: app_id.to_string(),
            current: launch_screen.to_string(),
            scroll: 0,
            toggles: 0,
            values: HashMap::new(),
            app_state: AppState::Foreground,
            forced_states: VecDeque::new(),
            failed_activations: 0,
            locate_disabled: false,
            broken: HashSet::new(),
            vanishing: HashMap::new(),
            elapsed: Duration::ZERO,
            screenshots: 0,
            quit: false,
            commands: Vec::new(),
        }
    }

    pub fn with_screen(mut self, screen: MockScreen) -> Self {
        self.screens.insert(screen.name.clone(), screen);
        self
    }

    /// Small demo app used by `crawl --demo`.
    pub fn demo(app_id: &str) -> Self {
        MockDriver::new(app_id, "home")
            .with_screen(
                MockScreen::new("home")
                    .with(MockElement::button("tab_login").navigates_to("login"))
                    .with(MockElement::button("tab_forms").navigates_to("forms"))
                    .with(MockElement::button("tab_swipe").navigates_to("swipe"))
                    .with(MockElement::button("dark_mode").toggles()),
            )
            .with_screen(
                MockScreen::new("login")
                    .with(MockElement::text_field("input_email"))
                    .with(MockElement::button("btn_login").navigates_to("welcome")),
            )
            .with_screen(
                MockScreen::new("welcome").with(MockElement::button("btn_logout").navigates_to("home")),
            )
            .with_screen(
                MockScreen::new("forms")
                    .with(MockElement::button("switch").toggles())
                    .with(MockElement::button("btn_active").navigates_to("dialog"))
                    .with(MockElement::button("btn_crash").crashes().on_page(1))
                    .scrollable(1),
            )
            .with_screen(MockScreen::new("dialog").with(MockElement::button("dialog_ok").navigates_to("forms")))
            .with_screen(
                MockScreen::new("swipe")
                    .with(MockElement::button("card_1"))
                    .with(MockElement::button("card_2").on_page(1))
                    .with(MockElement::button("card_3").on_page(2))
                    .scrollable(2),
            )
    }

    // ------------------------------------------------------------------
    // Test knobs
    // ------------------------------------------------------------------

    /// Answer the next `query_app_state` calls with these states, applying each.
    pub fn queue_app_states(&mut self, states: impl IntoIterator<Item = AppState>) {
        self.forced_states.extend(states);
    }

    /// The next `n` activations leave the app in the background.
    pub fn fail_activations(&mut self, n: usize) {
        self.failed_activations = n;
    }

    /// Make every `locate` miss, so no replay can succeed.
    pub fn disable_locate(&mut self) {
        self.locate_disabled = true;
    }

    /// Clicking these identities fails at the driver level.
    pub fn break_element(&mut self, identity: ElementIdentity) {
        self.broken.insert(identity);
    }

    /// The element answers `reads` attribute or text reads, then goes stale.
    pub fn vanish_after_reads(&mut self, identity: ElementIdentity, reads: usize) {
        self.vanishing.insert(identity, reads);
    }

    pub fn set_app_state(&mut self, state: AppState) {
        self.app_state = state;
    }

    pub fn current_screen(&self) -> &str {
        &self.current
    }

    pub fn app_state(&self) -> AppState {
        self.app_state
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn screenshot_count(&self) -> usize {
        self.screenshots
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    pub fn count_commands(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn screen(&self) -> Option<&MockScreen> {
        self.screens.get(&self.current)
    }

    fn visible(&self) -> Vec<(usize, &MockElement)> {
        if self.app_state != AppState::Foreground {
            return Vec::new();
        }
        self.screen()
            .map(|s| {
                s.elements
                    .iter()
                    .enumerate()
                    .filter(|(_, el)| el.page <= self.scroll)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn element_ref(&self, index: usize) -> ElementRef {
        ElementRef(format!("{}#{}", self.current, index))
    }

    fn resolve(&self, element: &ElementRef) -> Result<MockElement, DriverError> {
        let (screen, index) = element
            .0
            .split_once('#')
            .ok_or_else(|| DriverError::StaleElement(element.0.clone()))?;
        if screen != self.current {
            return Err(DriverError::StaleElement(element.0.clone()));
        }
        let index: usize = index
            .parse()
            .map_err(|_| DriverError::StaleElement(element.0.clone()))?;
        self.visible()
            .into_iter()
            .find(|(i, _)| *i == index)
            .map(|(_, el)| el.clone())
            .ok_or_else(|| DriverError::StaleElement(element.0.clone()))
    }

    fn read(&mut self, element: &ElementRef) -> Result<MockElement, DriverError> {
        let el = self.resolve(element)?;
        if let Some(left) = self.vanishing.get_mut(&el.identity()) {
            if *left == 0 {
                return Err(DriverError::StaleElement(element.0.clone()));
            }
            *left -= 1;
        }
        Ok(el)
    }

    fn relaunch(&mut self) {
        self.current = self.launch_screen.clone();
        self.scroll = 0;
        self.toggles = 0;
        self.values.clear();
    }
}

impl DriverAdapter for MockDriver {
    fn snapshot(&mut self) -> Result<PageSnapshot, DriverError> {
        if self.app_state != AppState::Foreground {
            return Ok(PageSnapshot::from("<launcher/>"));
        }

        let mut source = format!(
            "<screen name=\"{}\" scroll=\"{}\" toggles=\"{}\">",
            self.current, self.scroll, self.toggles
        );
        for (_, el) in self.visible() {
            let value = self.values.get(&el.identity()).map(String::as_str).unwrap_or("");
            source.push_str(&format!(
                "<node id=\"{}\" value=\"{}\"/>",
                el.attributes.resource_id, value
            ));
        }
        source.push_str("</screen>");
        Ok(PageSnapshot::from(source))
    }

    fn find_interactable(&mut self) -> Result<Vec<DiscoveredElement>, DriverError> {
        Ok(self
            .visible()
            .into_iter()
            .map(|(i, el)| DiscoveredElement {
                element: self.element_ref(i),
                attributes: el.attributes.clone(),
                capability: el.capability,
            })
            .collect())
    }

    fn locate(&mut self, target: &ElementAttributes) -> Result<Option<ElementRef>, DriverError> {
        if self.locate_disabled {
            return Ok(None);
        }
        Ok(self
            .visible()
            .into_iter()
            .find(|(_, el)| &el.attributes == target)
            .map(|(i, _)| self.element_ref(i)))
    }

    fn attribute(&mut self, element: &ElementRef, name: &str) -> Result<Option<String>, DriverError> {
        let el = self.read(element)?;
        let value = match name {
            "resource-id" => Some(el.attributes.resource_id),
            "content-desc" => Some(el.attributes.label),
            "class" => Some(match el.capability {
                ElementCapability::TextInput => "android.widget.EditText".to_string(),
                ElementCapability::Clickable => "android.widget.Button".to_string(),
            }),
            _ => None,
        };
        Ok(value.filter(|v| !v.is_empty()))
    }

    fn text(&mut self, element: &ElementRef) -> Result<String, DriverError> {
        Ok(self.read(element)?.attributes.text)
    }

    fn click(&mut self, element: &ElementRef) -> Result<(), DriverError> {
        let el = self.resolve(element)?;
        let identity = el.identity();
        if self.broken.contains(&identity) {
            return Err(DriverError::Command {
                command: "click".into(),
                message: format!("{identity} refused the tap"),
            });
        }
        self.commands.push(format!("click:{identity}"));

        match el.action {
            MockAction::Nothing => {}
            MockAction::Navigate(target) => {
                self.current = target;
                self.scroll = 0;
            }
            MockAction::Toggle => self.toggles += 1,
            MockAction::Crash => self.app_state = AppState::NotRunning,
            MockAction::Background => self.app_state = AppState::Background,
        }
        Ok(())
    }

    fn set_value(&mut self, element: &ElementRef, value: &str) -> Result<(), DriverError> {
        let el = self.resolve(element)?;
        let identity = el.identity();
        self.commands.push(format!("set_value:{identity}={value}"));
        self.values.insert(identity, value.to_string());
        Ok(())
    }

    fn scroll_forward_once(&mut self) -> Result<(), DriverError> {
        self.commands.push("scroll".into());
        let pages = self.screen().map(|s| s.scroll_pages).unwrap_or(0);
        if self.app_state == AppState::Foreground && self.scroll < pages {
            self.scroll += 1;
        }
        Ok(())
    }

    fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.screenshots += 1;
        Ok(format!("PNG:{}:{}", self.current, self.screenshots).into_bytes())
    }

    fn query_app_state(&mut self, app_id: &str) -> Result<AppState, DriverError> {
        if app_id != self.app_id {
            return Ok(AppState::NotInstalled);
        }
        if let Some(forced) = self.forced_states.pop_front() {
            self.app_state = forced;
        }
        Ok(self.app_state)
    }

    fn activate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.commands.push("activate".into());
        if app_id != self.app_id {
            return Err(DriverError::Command {
                command: "activate".into(),
                message: format!("{app_id} is not installed"),
            });
        }
        if self.failed_activations > 0 {
            self.failed_activations -= 1;
            self.app_state = AppState::Background;
            return Ok(());
        }
        if matches!(self.app_state, AppState::NotRunning | AppState::NotInstalled) {
            self.relaunch();
        }
        self.app_state = AppState::Foreground;
        Ok(())
    }

    fn terminate_app(&mut self, app_id: &str) -> Result<(), DriverError> {
        self.commands.push("terminate".into());
        if app_id == self.app_id {
            self.app_state = AppState::NotRunning;
        }
        Ok(())
    }

    fn wait_for_displayed(&mut self, element: &ElementRef, timeout: Duration) -> Result<bool, DriverError> {
        match self.resolve(element) {
            Ok(el) if !el.hidden => Ok(true),
            _ => {
                self.pause(timeout);
                Ok(false)
            }
        }
    }

    fn pause(&mut self, duration: Duration) {
        self.elapsed += duration;
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        self.quit = true;
        Ok(())
    }
}
