use crate::errors::{ErrorKind, NavigationError};
use crate::executor::{run_with_timeout, Deadline, ExecutorConfig};
use crate::platforms::{attributes, AccessibilityProvider, ElementHandle};
use crate::value::AttributeValue;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Index of an element inside its [`ElementTree`]. Only meaningful for the
/// tree that produced it; a rebuilt tree hands out new ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn index(&self) -> usize {
        self.0
    }
}

/// Whether the children of an element have been materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildrenState {
    NotLoaded,
    Loaded,
    /// The last load attempt failed; the provider may still claim children.
    Failed(ErrorKind),
}

/// One node of the accessibility tree.
#[derive(Debug, Clone)]
pub struct Element {
    pub role: String,
    pub subrole: Option<String>,
    pub title: String,
    pub role_description: String,
    pub identifier: Option<String>,
    pub value: AttributeValue,
    /// What the provider claimed about children. May be wrong.
    pub has_children_hint: bool,
    handle: Option<ElementHandle>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    children_state: ChildrenState,
}

impl Element {
    fn from_description(description: ElementDescription, parent: Option<NodeId>) -> Self {
        Self {
            role: description.role,
            subrole: description.subrole,
            title: description.title,
            role_description: description.role_description,
            identifier: description.identifier,
            value: description.value,
            has_children_hint: description.child_count > 0,
            handle: Some(description.handle),
            parent,
            children: Vec::new(),
            children_state: ChildrenState::NotLoaded,
        }
    }

    fn synthetic(role: &str, title: &str, parent: Option<NodeId>) -> Self {
        Self {
            role: role.to_string(),
            subrole: None,
            title: title.to_string(),
            role_description: String::new(),
            identifier: None,
            value: AttributeValue::Absent,
            has_children_hint: false,
            handle: None,
            parent,
            children: Vec::new(),
            children_state: ChildrenState::Loaded,
        }
    }

    pub fn handle(&self) -> Option<ElementHandle> {
        self.handle
    }

    /// Placeholder fabricated locally because the provider could not supply it.
    pub fn is_synthetic(&self) -> bool {
        self.handle.is_none()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn children_state(&self) -> ChildrenState {
        self.children_state
    }

    /// The provider says there are children but none could be loaded.
    pub fn children_inaccessible(&self) -> bool {
        self.has_children_hint
            && self.children.is_empty()
            && matches!(self.children_state, ChildrenState::Failed(_))
    }

    /// Title when present, otherwise the identifier.
    pub fn name(&self) -> Option<&str> {
        if !self.title.is_empty() {
            Some(&self.title)
        } else {
            self.identifier.as_deref().filter(|id| !id.is_empty())
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}[{}]", self.role, name),
            None => f.write_str(&self.role),
        }
    }
}

/// Role comparison used by filters and paths. Case-insensitive, and a bare
/// role matches its `AX`-prefixed form (`button` matches `AXButton`).
pub fn role_matches(actual: &str, wanted: &str) -> bool {
    actual.eq_ignore_ascii_case(wanted)
        || actual
            .strip_prefix("AX")
            .is_some_and(|bare| bare.eq_ignore_ascii_case(wanted))
}

/// Role and title filter for [`ElementTree::find_descendants`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementFilter {
    pub role: Option<String>,
    pub title: Option<String>,
}

impl ElementFilter {
    pub fn new(role: Option<String>, title: Option<String>) -> Self {
        Self { role, title }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            title: None,
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        let role_ok = self
            .role
            .as_deref()
            .map_or(true, |role| role_matches(&element.role, role));
        let title_ok = self.title.as_deref().map_or(true, |needle| {
            let needle = needle.to_lowercase();
            element.title.to_lowercase().contains(&needle)
                || element.role_description.to_lowercase().contains(&needle)
        });
        role_ok && title_ok
    }
}

/// Core attributes read from the provider in one worker round trip.
struct ElementDescription {
    handle: ElementHandle,
    role: String,
    subrole: Option<String>,
    title: String,
    role_description: String,
    identifier: Option<String>,
    value: AttributeValue,
    child_count: usize,
    /// Optional attributes that failed to read.
    skipped: Vec<(&'static str, NavigationError)>,
}

fn describe(
    provider: &dyn AccessibilityProvider,
    handle: ElementHandle,
) -> Result<ElementDescription, NavigationError> {
    let role = match provider.attribute_value(&handle, attributes::ROLE)? {
        AttributeValue::String(role) if !role.is_empty() => role,
        other => {
            return Err(NavigationError::ProviderError(format!(
                "element has no role (got {other:?})"
            )))
        }
    };

    let mut skipped = Vec::new();
    let mut text = |name: &'static str| -> Option<String> {
        match provider.attribute_value(&handle, name) {
            Ok(value) => value.as_text().map(str::to_string),
            Err(e) => {
                skipped.push((name, e));
                None
            }
        }
    };
    let subrole = text(attributes::SUBROLE);
    let title = text(attributes::TITLE).unwrap_or_default();
    let role_description = text(attributes::ROLE_DESCRIPTION).unwrap_or_default();
    let identifier = text(attributes::IDENTIFIER);

    let value = match provider.attribute_value(&handle, attributes::VALUE) {
        Ok(value) => value,
        Err(e) => {
            skipped.push((attributes::VALUE, e));
            AttributeValue::Absent
        }
    };
    let child_count = match provider.child_count(&handle) {
        Ok(count) => count,
        Err(e) => {
            skipped.push((attributes::CHILDREN, e));
            0
        }
    };

    Ok(ElementDescription {
        handle,
        role,
        subrole,
        title,
        role_description,
        identifier,
        value,
        child_count,
        skipped,
    })
}

fn log_skipped(description: &ElementDescription) {
    for (name, error) in &description.skipped {
        warn!(
            "Skipping unreadable attribute {name} on {}: {error}",
            description.role
        );
    }
}

/// Arena holding the materialized part of one window's element tree.
///
/// Children are loaded lazily, one provider round trip per expansion. The
/// whole arena is thrown away on refresh or when the window changes.
pub struct ElementTree {
    provider: Arc<dyn AccessibilityProvider>,
    config: ExecutorConfig,
    nodes: Vec<Element>,
}

impl fmt::Debug for ElementTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementTree")
            .field("nodes", &self.nodes.len())
            .field("root", &self.nodes.first())
            .finish()
    }
}

impl ElementTree {
    /// Materializes the root element behind `handle`.
    #[instrument(level = "debug", skip(provider, config))]
    pub fn load(
        provider: Arc<dyn AccessibilityProvider>,
        config: ExecutorConfig,
        handle: ElementHandle,
    ) -> Result<Self, NavigationError> {
        let worker_provider = Arc::clone(&provider);
        let description = config.call("describe root element", move || {
            describe(worker_provider.as_ref(), handle)
        })?;
        log_skipped(&description);
        Ok(Self {
            provider,
            config,
            nodes: vec![Element::from_description(description, None)],
        })
    }

    /// A locally fabricated tree standing in for one the provider could not
    /// supply. The root carries a single explanatory placeholder child so
    /// navigation never dead-ends.
    pub fn placeholder(
        provider: Arc<dyn AccessibilityProvider>,
        config: ExecutorConfig,
        role: &str,
        title: &str,
        note: &str,
    ) -> Self {
        let mut tree = Self {
            provider,
            config,
            nodes: vec![Element::synthetic(role, title, None)],
        };
        let root = tree.root();
        tree.push_synthetic_child(root, "AXStaticText", note);
        tree
    }

    /// Appends a synthetic child. The parent's hint is raised only together
    /// with an actual child.
    pub fn push_synthetic_child(&mut self, parent: NodeId, role: &str, title: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element::synthetic(role, title, Some(parent)));
        if let Some(parent_element) = self.nodes.get_mut(parent.0) {
            parent_element.children.push(id);
            parent_element.has_children_hint = true;
            parent_element.children_state = ChildrenState::Loaded;
        }
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.0)
    }

    pub fn element(&self, id: NodeId) -> Result<&Element, NavigationError> {
        self.get(id).ok_or_else(|| {
            NavigationError::NotFound(format!(
                "element {} is not part of the current tree",
                id.0
            ))
        })
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Element::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Element::children).unwrap_or(&[])
    }

    /// Chain from the root down to `id`, both included.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.get(id).map(|_| id);
        while let Some(node) = current {
            chain.push(node);
            current = self.parent(node);
        }
        chain.reverse();
        chain
    }

    /// Loads the immediate children of `id` unless it already has some.
    ///
    /// Failures leave the children empty, keep the provider's hint and are
    /// recorded in [`Element::children_state`]; they never propagate.
    pub fn load_children(&mut self, id: NodeId) -> ChildrenState {
        let timeout = self.config.element_timeout;
        self.load_children_within(id, timeout)
    }

    fn load_children_within(&mut self, id: NodeId, timeout: Duration) -> ChildrenState {
        let Some(element) = self.nodes.get(id.0) else {
            return ChildrenState::NotLoaded;
        };
        if !element.children.is_empty() {
            return element.children_state;
        }
        let Some(handle) = element.handle else {
            return element.children_state;
        };

        let provider = Arc::clone(&self.provider);
        let result = run_with_timeout("load children", timeout, move || {
            let handles = provider.children(&handle)?;
            Ok(handles
                .into_iter()
                .map(|child| describe(provider.as_ref(), child))
                .collect::<Vec<_>>())
        });

        let state = match result {
            Ok(described) => {
                let mut loaded = Vec::with_capacity(described.len());
                for description in described {
                    match description {
                        Ok(description) => {
                            log_skipped(&description);
                            let child = NodeId(self.nodes.len());
                            self.nodes
                                .push(Element::from_description(description, Some(id)));
                            loaded.push(child);
                        }
                        Err(e) => warn!("Skipping unreadable child element: {e}"),
                    }
                }
                debug!("Loaded {} children for node {}", loaded.len(), id.0);
                if let Some(element) = self.nodes.get_mut(id.0) {
                    element.children = loaded;
                }
                ChildrenState::Loaded
            }
            Err(e) => {
                warn!("Could not load children of node {}: {e}", id.0);
                ChildrenState::Failed(e.kind())
            }
        };

        if let Some(element) = self.nodes.get_mut(id.0) {
            element.children_state = state;
        }
        state
    }

    /// Deterministic pre-order walk from `start`: the node, then each child
    /// left to right. Children are loaded on the way down unless the node is
    /// at `max_depth`. The whole walk is bounded by `deadline`.
    pub fn walk<F>(
        &mut self,
        start: NodeId,
        max_depth: Option<usize>,
        deadline: &Deadline,
        mut visit: F,
    ) -> Result<(), NavigationError>
    where
        F: FnMut(&ElementTree, NodeId, usize),
    {
        let mut stack = vec![(start, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            deadline.check("tree walk")?;
            if self.get(id).is_none() {
                continue;
            }
            visit(self, id, depth);

            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let timeout = self.config.element_timeout.min(deadline.remaining());
            self.load_children_within(id, timeout);
            for child in self.children(id).iter().rev() {
                stack.push((*child, depth + 1));
            }
        }
        Ok(())
    }

    /// Every node under `root` (root included) matching `filter`, in
    /// pre-order. The walk is bounded by the configured walk timeout.
    #[instrument(level = "debug", skip(self))]
    pub fn find_descendants(
        &mut self,
        root: NodeId,
        filter: &ElementFilter,
    ) -> Result<Vec<NodeId>, NavigationError> {
        let deadline = Deadline::after(self.config.walk_timeout);
        let mut found = Vec::new();
        self.walk(root, None, &deadline, |tree, id, _| {
            if tree.get(id).is_some_and(|element| filter.matches(element)) {
                found.push(id);
            }
        })?;
        Ok(found)
    }

    /// All readable attributes of `id` as display strings. Unreadable ones
    /// are skipped with a warning.
    pub fn attributes(&self, id: NodeId) -> Result<Vec<(String, String)>, NavigationError> {
        let element = self.element(id)?;
        let Some(handle) = element.handle else {
            let mut synthesized = vec![(attributes::ROLE.to_string(), element.role.clone())];
            if !element.title.is_empty() {
                synthesized.push((attributes::TITLE.to_string(), element.title.clone()));
            }
            return Ok(synthesized);
        };

        let provider = Arc::clone(&self.provider);
        let read = self.config.call("read attributes", move || {
            let names = provider.attribute_names(&handle)?;
            Ok(names
                .into_iter()
                .map(|name| {
                    let value = provider.attribute_value(&handle, &name);
                    (name, value)
                })
                .collect::<Vec<_>>())
        })?;

        let mut readable = Vec::with_capacity(read.len());
        for (name, value) in read {
            match value {
                Ok(value) => readable.push((name, value.display())),
                Err(e) => warn!("Skipping unreadable attribute {name}: {e}"),
            }
        }
        Ok(readable)
    }

    pub fn action_names(&self, id: NodeId) -> Result<Vec<String>, NavigationError> {
        let handle = self.live_handle(id)?;
        let provider = Arc::clone(&self.provider);
        self.config
            .call("list actions", move || provider.action_names(&handle))
    }

    /// Performs `action` once. Never retried: a timeout means the action may
    /// or may not have happened.
    #[instrument(level = "debug", skip(self))]
    pub fn perform_action(&self, id: NodeId, action: &str) -> Result<(), NavigationError> {
        let handle = self.live_handle(id)?;
        let provider = Arc::clone(&self.provider);
        let action_name = action.to_string();
        run_with_timeout(
            &format!("perform {action}"),
            self.config.call_timeout,
            move || provider.perform_action(&handle, &action_name),
        )
    }

    /// Sets the element's value once. Same outcome rules as
    /// [`ElementTree::perform_action`].
    pub fn set_value(&mut self, id: NodeId, text: &str) -> Result<(), NavigationError> {
        let handle = self.live_handle(id)?;
        let provider = Arc::clone(&self.provider);
        let value = text.to_string();
        run_with_timeout("set value", self.config.call_timeout, move || {
            provider.set_value(&handle, &value)
        })?;
        if let Some(element) = self.nodes.get_mut(id.0) {
            element.value = AttributeValue::String(text.to_string());
        }
        Ok(())
    }

    fn live_handle(&self, id: NodeId) -> Result<ElementHandle, NavigationError> {
        let element = self.element(id)?;
        element.handle.ok_or_else(|| {
            NavigationError::InvalidState(format!(
                "{element} is a placeholder and cannot be acted on"
            ))
        })
    }
}
