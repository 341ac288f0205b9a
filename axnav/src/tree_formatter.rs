use crate::element::{ChildrenState, Element, ElementTree, NodeId};
use crate::registry::SessionIdRegistry;
use crate::value::AttributeValue;

const MAX_VALUE_CHARS: usize = 40;

/// Format one element as `[ROLE] title #id (context)`.
pub fn format_element_line(element: &Element, session_id: Option<usize>) -> String {
    let mut output = format!("[{}]", element.role);

    if let Some(name) = element.name() {
        output.push_str(&format!(" {name}"));
    }

    if let Some(id) = session_id {
        output.push_str(&format!(" #{id}"));
    }

    let mut context_parts = Vec::new();

    if let Some(subrole) = &element.subrole {
        context_parts.push(subrole.clone());
    }

    match &element.value {
        AttributeValue::Absent => {}
        AttributeValue::String(text) if text.is_empty() => {}
        value => context_parts.push(format!("value: {}", truncate(&value.display()))),
    }

    if element.is_synthetic() {
        context_parts.push("placeholder".to_string());
    }

    if element.has_children_hint && element.children().is_empty() {
        match element.children_state() {
            ChildrenState::Failed(_) => context_parts.push("has children, not accessible".to_string()),
            ChildrenState::NotLoaded => context_parts.push("more…".to_string()),
            ChildrenState::Loaded => context_parts.push("no children reported".to_string()),
        }
    }

    if !context_parts.is_empty() {
        output.push_str(&format!(" ({})", context_parts.join(", ")));
    }

    output
}

/// Render the elements of the last registry rebuild, indented by depth.
/// Every line carries the session ID the registry assigned.
pub fn format_registry_tree(tree: &ElementTree, registry: &SessionIdRegistry) -> String {
    let mut output = String::new();
    for entry in registry.entries() {
        let Some(element) = tree.get(entry.node) else {
            continue;
        };
        output.push_str(&"  ".repeat(entry.depth));
        output.push_str(&format_element_line(element, Some(entry.id)));
        output.push('\n');
    }
    output
}

/// `App > Window > AXGroup > AXButton[OK]`, skipping the window root since
/// the window is already named.
pub fn format_breadcrumb(
    application: Option<&str>,
    window: Option<&str>,
    tree: Option<&ElementTree>,
    element: Option<NodeId>,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    match application {
        Some(name) => parts.push(name.to_string()),
        None => return "(no application)".to_string(),
    }
    if let Some(title) = window {
        parts.push(if title.is_empty() {
            "(untitled window)".to_string()
        } else {
            title.to_string()
        });
    }
    if let (Some(tree), Some(element)) = (tree, element) {
        parts.extend(
            tree.lineage(element)
                .into_iter()
                .skip(1)
                .filter_map(|id| tree.get(id))
                .map(|element| element.to_string()),
        );
    }
    parts.join(" > ")
}

fn truncate(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() > MAX_VALUE_CHARS {
        let cut: String = single_line.chars().take(MAX_VALUE_CHARS).collect();
        format!("{cut}…")
    } else {
        single_line
    }
}
