use super::{init_tracing, navigator};
use crate::context::ContextLevel;
use crate::errors::{ErrorKind, NavigationError};
use crate::navigator::RefreshOutcome;
use crate::platforms::actions;
use crate::value::AttributeValue;

#[test]
fn test_back_three_times_returns_to_empty() -> Result<(), NavigationError> {
    init_tracing();
    let (_provider, mut navigator) = navigator();

    navigator.select_application(Some("textedit"))?;
    navigator.select_window("Main")?;
    navigator.select_element("button[OK]")?;
    assert_eq!(navigator.level(), ContextLevel::Element);

    assert_eq!(navigator.back(), ContextLevel::Window);
    assert_eq!(navigator.back(), ContextLevel::Application);
    assert_eq!(navigator.back(), ContextLevel::Empty);
    assert_eq!(navigator.back(), ContextLevel::Empty);
    assert_eq!(navigator.breadcrumb(), "(no application)");
    Ok(())
}

#[test]
fn test_application_selection_enters_focused_window() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(None)?;
    assert_eq!(navigator.level(), ContextLevel::Window);
    assert_eq!(navigator.breadcrumb(), "TextEdit > Main");
    Ok(())
}

#[test]
fn test_application_by_pid_without_focused_window() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("200"))?;
    assert_eq!(navigator.level(), ContextLevel::Application);
    assert_eq!(navigator.breadcrumb(), "Busy App");
    Ok(())
}

#[test]
fn test_reselecting_application_discards_deeper_levels() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.select_element("group[Toolbar]")?;
    navigator.select_application(Some("Broken"))?;
    assert_eq!(navigator.level(), ContextLevel::Application);
    assert!(navigator.context().element().is_none());
    Ok(())
}

#[test]
fn test_failed_transitions_leave_context_unchanged() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.select_element("group[Toolbar]/button[Bold]")?;
    let before = navigator.breadcrumb();

    let missing = navigator.select_element("button[Nope]").unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
    let malformed = navigator.select_element("button[OK").unwrap_err();
    assert_eq!(malformed.kind(), ErrorKind::InvalidSelector);
    let window = navigator.select_window("Inspector").unwrap_err();
    assert_eq!(window.kind(), ErrorKind::NotFound);
    let app = navigator.select_application(Some("Safari")).unwrap_err();
    assert_eq!(app.kind(), ErrorKind::NotFound);

    assert_eq!(navigator.level(), ContextLevel::Element);
    assert_eq!(navigator.breadcrumb(), before);
    Ok(())
}

#[test]
fn test_transitions_require_parent_level() {
    let (_provider, mut navigator) = navigator();
    assert_eq!(
        navigator.select_window("0").unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(
        navigator.select_element("0").unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(navigator.press().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(
        navigator.context_info().unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(navigator.level(), ContextLevel::Empty);
}

#[test]
fn test_index_is_relative_to_current_element() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;

    navigator.select_element("1")?;
    navigator.select_element("0")?;
    assert_eq!(
        navigator.breadcrumb(),
        "TextEdit > Main > AXGroup[Toolbar] > AXButton[Bold]"
    );

    let err = navigator.select_element("9").unwrap_err();
    assert_eq!(err, NavigationError::IndexOutOfRange { index: 9, len: 0 });
    Ok(())
}

#[test]
fn test_window_timeout_offers_placeholder() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("busy"))?;

    let err = navigator.select_window("Busy").unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert_eq!(navigator.level(), ContextLevel::Application);
    assert_eq!(navigator.placeholder_offer(), Some("Busy"));

    navigator.accept_placeholder()?;
    assert_eq!(navigator.level(), ContextLevel::Window);
    assert!(navigator.context().window().unwrap().is_placeholder());

    let children = navigator.list_children()?;
    assert_eq!(children.len(), 1);
    assert!(children[0].line.starts_with("[AXStaticText] window could not be loaded"));
    assert!(children[0].line.ends_with("(placeholder)"));

    navigator.select_element("0")?;
    assert_eq!(navigator.press().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(
        navigator.refresh().unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    Ok(())
}

#[test]
fn test_provider_error_offers_no_placeholder() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("Broken App"))?;

    let err = navigator.select_window("0").unwrap_err();
    assert_eq!(
        err,
        NavigationError::ProviderError("kAXErrorCannotComplete".into())
    );
    assert_eq!(navigator.placeholder_offer(), None);
    assert_eq!(
        navigator.accept_placeholder().unwrap_err().kind(),
        ErrorKind::InvalidState
    );
    assert_eq!(navigator.level(), ContextLevel::Application);
    Ok(())
}

#[test]
fn test_inaccessible_children_surface_as_error() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.select_element("group[Sidebar]")?;

    let err = navigator.list_children().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provider);
    assert_eq!(navigator.level(), ContextLevel::Element);

    let info = navigator.context_info()?;
    assert!(info
        .iter()
        .any(|(label, value)| label == "Children" && value == "has children, not accessible"));
    Ok(())
}

#[test]
fn test_find_under_dialog() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.select_window("dialog")?;

    let buttons = navigator.find(Some("button"), None)?;
    let lines: Vec<&str> = buttons.iter().map(|listed| listed.line.as_str()).collect();
    assert_eq!(lines, ["[AXButton] OK", "[AXButton] Cancel"]);
    assert_eq!(buttons[1].index, 1);

    let cancel = navigator.find(Some("button"), Some("can"))?;
    assert_eq!(cancel.len(), 1);
    assert_eq!(cancel[0].line, "[AXButton] Cancel");
    Ok(())
}

#[test]
fn test_press_performs_action_once() -> Result<(), NavigationError> {
    let (provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.select_element("button[OK]")?;

    navigator.press()?;
    let performed = provider.performed_actions();
    assert_eq!(performed.len(), 1);
    assert_eq!(performed[0].action, actions::PRESS);
    Ok(())
}

#[test]
fn test_type_text_replaces_value() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.select_element("textarea[body]")?;

    navigator.type_text("Goodbye")?;
    assert_eq!(
        navigator.current_element().unwrap().value,
        AttributeValue::String("Goodbye".into())
    );
    let info = navigator.context_info()?;
    assert!(info
        .iter()
        .any(|(label, value)| label == "AXValue" && value == "Goodbye"));
    Ok(())
}

#[test]
fn test_refresh_finds_selected_element_again() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.select_element("group[Toolbar]/button[Italic]")?;
    navigator.show_tree(None)?;
    assert!(!navigator.registry().is_empty());

    match navigator.refresh()? {
        RefreshOutcome::Reresolved(path) => {
            assert_eq!(path.to_string(), "AXWindow[Main]/AXGroup[Toolbar]/AXButton[Italic]")
        }
        other => panic!("expected re-resolution, got {other:?}"),
    }
    assert_eq!(navigator.current_element().unwrap().title, "Italic");
    assert!(navigator.registry().is_empty());
    Ok(())
}

#[test]
fn test_interrupt_resets_everything() -> Result<(), NavigationError> {
    let (_provider, mut navigator) = navigator();
    navigator.select_application(Some("TextEdit"))?;
    navigator.show_tree(None)?;
    navigator.select_element("#1")?;

    navigator.interrupt();
    assert_eq!(navigator.level(), ContextLevel::Empty);
    assert!(navigator.registry().is_empty());
    assert!(navigator.tree().is_none());
    Ok(())
}
