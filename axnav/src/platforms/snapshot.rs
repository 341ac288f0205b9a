//! In-memory provider serving a recorded accessibility tree.
//!
//! A snapshot is a JSON document listing applications, their windows and the
//! element tree under each window. Nodes can carry fault injection fields
//! (`delay_ms`, `error`, `unreadable`, `children_hint`) so slow, failing or
//! inconsistent providers can be reproduced without a live desktop.

use super::attributes;
use super::{
    AccessibilityProvider, ApplicationHandle, ApplicationInfo, ElementHandle,
    WindowHandle,
};
use crate::errors::NavigationError;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, RwLock};
use std::thread;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub applications: Vec<SnapshotApplication>,
    /// PID of the focused application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused_application: Option<i32>,
    #[serde(default = "default_true")]
    pub authorized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotApplication {
    pub pid: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
    /// Index into `windows` of the focused window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focused_window: Option<usize>,
    #[serde(default)]
    pub windows: Vec<SnapshotNode>,
    /// Applies to window listing: sleep this long before answering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// Applies to window listing: fail with this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subrole: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Extra attributes beyond the standard ones.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SnapshotNode>,
    /// Overrides the reported child count, to model a provider whose hint is wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children_hint: Option<bool>,
    /// Applies to the children query: sleep this long before answering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    /// Applies to the children query: fail with this message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Attribute names that are listed but fail to read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<String>,
}

impl SnapshotNode {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    pub fn titled(role: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            title: Some(title.into()),
            ..Default::default()
        }
    }

    pub fn with_children(mut self, children: Vec<SnapshotNode>) -> Self {
        self.children = children;
        self
    }
}

fn default_true() -> bool {
    true
}

/// A recorded action, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformedAction {
    pub element: ElementHandle,
    pub action: String,
}

struct Entry {
    node: SnapshotNode,
    children: Vec<ElementHandle>,
}

struct AppEntry {
    info: ApplicationInfo,
    element: ElementHandle,
    windows: Vec<ElementHandle>,
    focused_window: Option<usize>,
    delay_ms: Option<u64>,
    error: Option<String>,
}

pub struct SnapshotProvider {
    entries: Vec<Entry>,
    applications: Vec<AppEntry>,
    focused_application: Option<i32>,
    authorized: bool,
    values: RwLock<HashMap<ElementHandle, AttributeValue>>,
    performed: Mutex<Vec<PerformedAction>>,
}

impl std::fmt::Debug for SnapshotProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotProvider")
            .field("elements", &self.entries.len())
            .field("applications", &self.applications.len())
            .finish()
    }
}

impl SnapshotProvider {
    pub fn new(snapshot: Snapshot) -> Self {
        let mut entries = Vec::new();
        let mut applications = Vec::with_capacity(snapshot.applications.len());

        for app in snapshot.applications {
            let app_node = SnapshotNode::titled("AXApplication", app.name.clone());
            let element = push_entry(&mut entries, app_node);
            let windows: Vec<ElementHandle> = app
                .windows
                .into_iter()
                .map(|window| flatten(&mut entries, window))
                .collect();
            entries[element.raw() as usize].children = windows.clone();

            applications.push(AppEntry {
                info: ApplicationInfo {
                    pid: app.pid,
                    name: app.name,
                    bundle_id: app.bundle_id,
                },
                element,
                windows,
                focused_window: app.focused_window,
                delay_ms: app.delay_ms,
                error: app.error,
            });
        }

        Self {
            entries,
            applications,
            focused_application: snapshot.focused_application,
            authorized: snapshot.authorized,
            values: RwLock::new(HashMap::new()),
            performed: Mutex::new(Vec::new()),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, NavigationError> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| NavigationError::Validation(format!("invalid snapshot: {e}")))?;
        Ok(Self::new(snapshot))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NavigationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            NavigationError::ProviderUnavailable(format!(
                "cannot read snapshot {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Actions performed so far, oldest first.
    pub fn performed_actions(&self) -> Vec<PerformedAction> {
        self.performed
            .lock()
            .map(|performed| performed.clone())
            .unwrap_or_default()
    }

    fn entry(&self, element: &ElementHandle) -> Result<&Entry, NavigationError> {
        self.entries.get(element.raw() as usize).ok_or_else(|| {
            NavigationError::ProviderError(format!(
                "invalid element reference {}",
                element.raw()
            ))
        })
    }

    fn app_by_element(&self, app: &ApplicationHandle) -> Result<&AppEntry, NavigationError> {
        self.applications
            .iter()
            .find(|entry| entry.element == app.element)
            .ok_or_else(|| {
                NavigationError::ProviderError(format!(
                    "application {} is no longer running",
                    app.info.name
                ))
            })
    }

    fn window_handle(&self, element: ElementHandle) -> WindowHandle {
        let title = self
            .entries
            .get(element.raw() as usize)
            .and_then(|entry| entry.node.title.clone())
            .unwrap_or_default();
        WindowHandle { title, element }
    }

    fn handle_for(&self, app: &AppEntry) -> ApplicationHandle {
        ApplicationHandle {
            info: app.info.clone(),
            element: app.element,
        }
    }

    fn current_value(&self, element: &ElementHandle, node: &SnapshotNode) -> AttributeValue {
        let overridden = self
            .values
            .read()
            .ok()
            .and_then(|values| values.get(element).cloned());
        overridden.unwrap_or_else(|| {
            node.value
                .as_ref()
                .map(AttributeValue::from)
                .unwrap_or(AttributeValue::Absent)
        })
    }
}

fn push_entry(entries: &mut Vec<Entry>, node: SnapshotNode) -> ElementHandle {
    let handle = ElementHandle::new(entries.len() as u64);
    entries.push(Entry {
        node,
        children: Vec::new(),
    });
    handle
}

fn flatten(entries: &mut Vec<Entry>, mut node: SnapshotNode) -> ElementHandle {
    let children = std::mem::take(&mut node.children);
    let handle = push_entry(entries, node);
    let child_handles: Vec<ElementHandle> = children
        .into_iter()
        .map(|child| flatten(entries, child))
        .collect();
    entries[handle.raw() as usize].children = child_handles;
    handle
}

fn simulate_latency(delay_ms: Option<u64>) {
    if let Some(ms) = delay_ms {
        debug!("snapshot: simulating {ms}ms of provider latency");
        thread::sleep(Duration::from_millis(ms));
    }
}

fn optional_text(value: &Option<String>) -> AttributeValue {
    match value {
        Some(text) => AttributeValue::String(text.clone()),
        None => AttributeValue::Absent,
    }
}

impl AccessibilityProvider for SnapshotProvider {
    fn list_applications(&self) -> Result<Vec<ApplicationInfo>, NavigationError> {
        Ok(self.applications.iter().map(|app| app.info.clone()).collect())
    }

    fn get_application(&self, pid: i32) -> Result<ApplicationHandle, NavigationError> {
        match self.applications.iter().find(|app| app.info.pid == pid) {
            Some(app) => Ok(self.handle_for(app)),
            None => Err(NavigationError::NotFound(format!(
                "no running application has pid {pid}"
            ))),
        }
    }

    fn focused_application(&self) -> Result<Option<ApplicationHandle>, NavigationError> {
        Ok(self.focused_application.and_then(|pid| {
            self.applications
                .iter()
                .find(|app| app.info.pid == pid)
                .map(|app| self.handle_for(app))
        }))
    }

    fn windows(&self, app: &ApplicationHandle) -> Result<Vec<WindowHandle>, NavigationError> {
        let entry = self.app_by_element(app)?;
        simulate_latency(entry.delay_ms);
        if let Some(message) = &entry.error {
            return Err(NavigationError::ProviderError(message.clone()));
        }
        Ok(entry
            .windows
            .iter()
            .map(|element| self.window_handle(*element))
            .collect())
    }

    fn focused_window(
        &self,
        app: &ApplicationHandle,
    ) -> Result<Option<WindowHandle>, NavigationError> {
        let entry = self.app_by_element(app)?;
        Ok(entry
            .focused_window
            .and_then(|index| entry.windows.get(index))
            .map(|element| self.window_handle(*element)))
    }

    fn attribute_names(&self, element: &ElementHandle) -> Result<Vec<String>, NavigationError> {
        let entry = self.entry(element)?;
        let node = &entry.node;
        let mut names = vec![attributes::ROLE.to_string()];
        if node.subrole.is_some() {
            names.push(attributes::SUBROLE.to_string());
        }
        if node.title.is_some() {
            names.push(attributes::TITLE.to_string());
        }
        if node.role_description.is_some() {
            names.push(attributes::ROLE_DESCRIPTION.to_string());
        }
        if node.identifier.is_some() {
            names.push(attributes::IDENTIFIER.to_string());
        }
        if !self.current_value(element, node).is_absent() {
            names.push(attributes::VALUE.to_string());
        }
        names.push(attributes::CHILDREN.to_string());
        names.extend(node.attributes.keys().cloned());
        for name in &node.unreadable {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        Ok(names)
    }

    fn attribute_value(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<AttributeValue, NavigationError> {
        let entry = self.entry(element)?;
        let node = &entry.node;
        if node.unreadable.iter().any(|unreadable| unreadable == name) {
            return Err(NavigationError::ProviderError(format!(
                "attribute {name} cannot be read"
            )));
        }
        let value = match name {
            attributes::ROLE => AttributeValue::String(node.role.clone()),
            attributes::SUBROLE => optional_text(&node.subrole),
            attributes::TITLE => optional_text(&node.title),
            attributes::ROLE_DESCRIPTION => optional_text(&node.role_description),
            attributes::IDENTIFIER => optional_text(&node.identifier),
            attributes::VALUE => self.current_value(element, node),
            attributes::CHILDREN => AttributeValue::Opaque("AXUIElement array".to_string()),
            other => node
                .attributes
                .get(other)
                .map(AttributeValue::from)
                .unwrap_or(AttributeValue::Absent),
        };
        Ok(value)
    }

    fn children(&self, element: &ElementHandle) -> Result<Vec<ElementHandle>, NavigationError> {
        let entry = self.entry(element)?;
        simulate_latency(entry.node.delay_ms);
        if let Some(message) = &entry.node.error {
            return Err(NavigationError::ProviderError(message.clone()));
        }
        Ok(entry.children.clone())
    }

    fn child_count(&self, element: &ElementHandle) -> Result<usize, NavigationError> {
        let entry = self.entry(element)?;
        Ok(match entry.node.children_hint {
            Some(true) => entry.children.len().max(1),
            Some(false) => 0,
            None => entry.children.len(),
        })
    }

    fn action_names(&self, element: &ElementHandle) -> Result<Vec<String>, NavigationError> {
        Ok(self.entry(element)?.node.actions.clone())
    }

    fn perform_action(&self, element: &ElementHandle, action: &str) -> Result<(), NavigationError> {
        let entry = self.entry(element)?;
        simulate_latency(entry.node.delay_ms);
        if !entry.node.actions.iter().any(|supported| supported == action) {
            return Err(NavigationError::ProviderError(format!(
                "{} does not support {action}",
                entry.node.role
            )));
        }
        let mut performed = self
            .performed
            .lock()
            .map_err(|_| NavigationError::ProviderError("snapshot state poisoned".into()))?;
        performed.push(PerformedAction {
            element: *element,
            action: action.to_string(),
        });
        Ok(())
    }

    fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), NavigationError> {
        let entry = self.entry(element)?;
        simulate_latency(entry.node.delay_ms);
        if entry.node.unreadable.iter().any(|name| name == attributes::VALUE) {
            return Err(NavigationError::ProviderError(format!(
                "{} value is not settable",
                entry.node.role
            )));
        }
        let mut values = self
            .values
            .write()
            .map_err(|_| NavigationError::ProviderError("snapshot state poisoned".into()))?;
        values.insert(*element, AttributeValue::String(value.to_string()));
        Ok(())
    }

    fn is_accessibility_authorized(&self) -> bool {
        self.authorized
    }

    fn request_authorization(&self) -> bool {
        self.authorized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> SnapshotProvider {
        let snapshot = json!({
            "focused_application": 42,
            "applications": [{
                "pid": 42,
                "name": "TextEdit",
                "bundle_id": "com.apple.TextEdit",
                "focused_window": 1,
                "windows": [
                    {"role": "AXWindow", "title": "Notes"},
                    {"role": "AXWindow", "title": "Untitled", "children": [
                        {"role": "AXButton", "title": "OK", "actions": ["AXPress"]},
                        {"role": "AXTextArea", "value": "hello", "unreadable": ["AXFrame"]}
                    ]}
                ]
            }]
        });
        SnapshotProvider::from_json_str(&snapshot.to_string()).unwrap()
    }

    #[test]
    fn test_focused_application_and_window() {
        let provider = provider();
        let app = provider.focused_application().unwrap().unwrap();
        assert_eq!(app.info.name, "TextEdit");
        let window = provider.focused_window(&app).unwrap().unwrap();
        assert_eq!(window.title, "Untitled");
        assert_eq!(provider.windows(&app).unwrap().len(), 2);
    }

    #[test]
    fn test_children_keep_document_order() {
        let provider = provider();
        let app = provider.focused_application().unwrap().unwrap();
        let window = provider.focused_window(&app).unwrap().unwrap();
        let children = provider.children(&window.element).unwrap();
        let roles: Vec<AttributeValue> = children
            .iter()
            .map(|child| provider.attribute_value(child, attributes::ROLE).unwrap())
            .collect();
        assert_eq!(
            roles,
            vec![
                AttributeValue::String("AXButton".into()),
                AttributeValue::String("AXTextArea".into())
            ]
        );
    }

    #[test]
    fn test_unreadable_attribute_is_listed_but_fails() {
        let provider = provider();
        let app = provider.focused_application().unwrap().unwrap();
        let window = provider.focused_window(&app).unwrap().unwrap();
        let text_area = provider.children(&window.element).unwrap()[1];
        let names = provider.attribute_names(&text_area).unwrap();
        assert!(names.contains(&"AXFrame".to_string()));
        assert!(provider.attribute_value(&text_area, "AXFrame").is_err());
    }

    #[test]
    fn test_set_value_and_actions_are_recorded() {
        let provider = provider();
        let app = provider.focused_application().unwrap().unwrap();
        let window = provider.focused_window(&app).unwrap().unwrap();
        let children = provider.children(&window.element).unwrap();

        provider.perform_action(&children[0], "AXPress").unwrap();
        assert_eq!(provider.performed_actions().len(), 1);
        assert!(provider.perform_action(&children[1], "AXPress").is_err());

        provider.set_value(&children[1], "world").unwrap();
        assert_eq!(
            provider
                .attribute_value(&children[1], attributes::VALUE)
                .unwrap(),
            AttributeValue::String("world".into())
        );
    }

    #[test]
    fn test_unknown_application_is_not_found() {
        let provider = provider();
        let err = provider
            .get_application(4242)
            .unwrap_err();
        assert!(matches!(err, NavigationError::NotFound(_)));
    }

    #[test]
    fn test_malformed_snapshot_is_a_validation_error() {
        let err = SnapshotProvider::from_json_str("{\"applications\": 3}").unwrap_err();
        assert!(matches!(err, NavigationError::Validation(_)));
    }
}
