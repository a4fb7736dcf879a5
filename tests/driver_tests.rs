use std::time::Duration;

use app_crawler::{
    driver::{
        adapter::{AppState, DriverAdapter, DriverError, ElementCapability, read_attributes},
        mock::{MockDriver, MockElement, MockScreen},
    },
    state::{
        hash::snapshot_hash,
        identity::ElementAttributes,
    },
};

const APP: &str = "com.example.test";

fn app() -> MockDriver {
    MockDriver::new(APP, "home")
        .with_screen(
            MockScreen::new("home")
                .with(MockElement::button("go").navigates_to("list"))
                .with(
                    MockElement::button("labelled")
                        .with_attributes(ElementAttributes::new("labelled", "Help", "?")),
                )
                .with(MockElement::text_field("search")),
        )
        .with_screen(
            MockScreen::new("list")
                .with(MockElement::button("row_1"))
                .with(MockElement::button("row_2").on_page(1))
                .scrollable(1),
        )
}

// ============================================================================
// App state
// ============================================================================

#[test]
fn app_state_ordinals_match_query_app_state() {
    assert_eq!(AppState::from_ordinal(0), Some(AppState::NotInstalled));
    assert_eq!(AppState::from_ordinal(1), Some(AppState::NotRunning));
    assert_eq!(AppState::from_ordinal(3), Some(AppState::Background));
    assert_eq!(AppState::from_ordinal(4), Some(AppState::Foreground));
    assert_eq!(AppState::from_ordinal(7), None);
    assert_eq!(AppState::BackgroundSuspended.ordinal(), 2);
}

#[test]
fn unknown_app_is_not_installed() {
    let mut driver = app();
    assert_eq!(driver.query_app_state("com.other").unwrap(), AppState::NotInstalled);
    assert!(driver.activate_app("com.other").is_err());
}

#[test]
fn queued_states_are_applied_in_order() {
    let mut driver = app();
    driver.queue_app_states([AppState::Background, AppState::NotRunning]);

    assert_eq!(driver.query_app_state(APP).unwrap(), AppState::Background);
    assert_eq!(driver.query_app_state(APP).unwrap(), AppState::NotRunning);
    assert_eq!(driver.query_app_state(APP).unwrap(), AppState::NotRunning, "Last one sticks");
}

// ============================================================================
// Enumeration
// ============================================================================

#[test]
fn enumeration_reports_capability_and_attributes() {
    let mut driver = app();
    let elements = driver.find_interactable().unwrap();

    assert_eq!(elements.len(), 3);
    assert_eq!(elements[0].capability, ElementCapability::Clickable);
    assert_eq!(elements[2].capability, ElementCapability::TextInput);

    let attrs = read_attributes(&mut driver, &elements[1].element).unwrap();
    assert_eq!(attrs, ElementAttributes::new("labelled", "Help", "?"));
    assert_eq!(attrs.identity().as_str(), "labelled-Help-?");
}

#[test]
fn stale_text_read_fails_attribute_read() {
    let mut driver = app();
    let labelled = driver.find_interactable().unwrap().remove(1);
    driver.vanish_after_reads(labelled.attributes.identity(), 2);

    let err = read_attributes(&mut driver, &labelled.element).unwrap_err();

    assert!(matches!(err, DriverError::StaleElement(_)), "got {err:?}");
}

#[test]
fn class_attribute_reflects_capability() {
    let mut driver = app();
    let elements = driver.find_interactable().unwrap();

    let button = driver.attribute(&elements[0].element, "class").unwrap();
    let field = driver.attribute(&elements[2].element, "class").unwrap();

    assert_eq!(button.as_deref(), Some("android.widget.Button"));
    assert_eq!(field.as_deref(), Some("android.widget.EditText"));
}

#[test]
fn scrolling_reveals_elements_and_changes_source() {
    let mut driver = app();
    let go = driver.find_interactable().unwrap().remove(0);
    driver.click(&go.element).unwrap();
    assert_eq!(driver.current_screen(), "list");
    assert_eq!(driver.find_interactable().unwrap().len(), 1);

    let before = snapshot_hash(&driver.snapshot().unwrap());
    driver.scroll_forward_once().unwrap();
    let after = snapshot_hash(&driver.snapshot().unwrap());
    assert_ne!(before, after);
    assert_eq!(driver.find_interactable().unwrap().len(), 2);

    driver.scroll_forward_once().unwrap();
    assert_eq!(snapshot_hash(&driver.snapshot().unwrap()), after, "End of list");
}

#[test]
fn locate_finds_by_attributes_on_current_screen() {
    let mut driver = app();
    let target = ElementAttributes::new("go", "", "");
    assert!(driver.locate(&target).unwrap().is_some());
    assert!(driver.locate(&ElementAttributes::new("row_1", "", "")).unwrap().is_none());

    driver.disable_locate();
    assert!(driver.locate(&target).unwrap().is_none());
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn terminate_then_activate_returns_to_launch_screen() {
    let mut driver = app();
    let go = driver.find_interactable().unwrap().remove(0);
    driver.click(&go.element).unwrap();

    driver.terminate_app(APP).unwrap();
    assert_eq!(driver.app_state(), AppState::NotRunning);
    assert!(driver.find_interactable().unwrap().is_empty());

    driver.activate_app(APP).unwrap();
    assert_eq!(driver.app_state(), AppState::Foreground);
    assert_eq!(driver.current_screen(), "home");
}

#[test]
fn non_foreground_snapshot_is_the_launcher() {
    let mut driver = app();
    let home = snapshot_hash(&driver.snapshot().unwrap());
    driver.set_app_state(AppState::Background);
    assert_ne!(snapshot_hash(&driver.snapshot().unwrap()), home);
}

#[test]
fn hidden_element_times_out_in_virtual_time() {
    let mut driver = MockDriver::new(APP, "home")
        .with_screen(MockScreen::new("home").with(MockElement::button("ghost").hidden()));
    let ghost = driver.find_interactable().unwrap().remove(0);

    let shown = driver
        .wait_for_displayed(&ghost.element, Duration::from_secs(5))
        .unwrap();

    assert!(!shown);
    assert_eq!(driver.elapsed(), Duration::from_secs(5));
}

#[test]
fn screenshot_and_quit_are_tracked() {
    let mut driver = app();
    assert!(!driver.screenshot().unwrap().is_empty());
    assert_eq!(driver.screenshot_count(), 1);

    driver.quit().unwrap();
    assert!(driver.is_quit());
}
