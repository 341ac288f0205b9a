//! The navigation state machine: application, then window, then element.
//!
//! Every transition resolves its target completely before touching the
//! context, so a failed command leaves the user exactly where they were.

use crate::context::{ContextLevel, NavigationContext, WindowContext};
use crate::element::{ChildrenState, Element, ElementFilter, ElementTree, NodeId};
use crate::errors::{ErrorKind, NavigationError};
use crate::executor::ExecutorConfig;
use crate::platforms::{
    actions, AccessibilityProvider, ApplicationHandle, ApplicationInfo, WindowHandle,
};
use crate::registry::SessionIdRegistry;
use crate::resolver::{
    child_positions, path_to, resolve_by_id, resolve_by_index, resolve_by_path,
    resolve_by_positions, resolve_path_unique,
};
use crate::selector::{ElementSelector, PathExpression};
use crate::tree_formatter::{format_element_line, format_registry_tree};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Depth limit for tree displays unless the caller asks for another one.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// One row of an `ls` or `find` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedElement {
    pub node: NodeId,
    /// Position in the listing.
    pub index: usize,
    /// ID from the last tree display, when the element was part of it.
    pub session_id: Option<usize>,
    pub line: String,
}

/// Output of [`Navigator::show_tree`].
#[derive(Debug, Clone, PartialEq)]
pub struct TreeDisplay {
    pub text: String,
    /// Number of IDs assigned.
    pub count: usize,
    /// Set when the walk hit its deadline; `text` then holds what was reached.
    pub interrupted: Option<NavigationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Only a window was selected; its tree was rebuilt.
    Window,
    /// The selected element was found again at the same path.
    Reresolved(PathExpression),
    /// The selected element is gone; the context fell back to the window.
    ElementLost {
        path: PathExpression,
        error: NavigationError,
    },
}

#[derive(Debug, Clone)]
struct PlaceholderOffer {
    app: ApplicationHandle,
    title: String,
    reason: NavigationError,
}

pub struct Navigator {
    provider: Arc<dyn AccessibilityProvider>,
    config: ExecutorConfig,
    context: NavigationContext,
    registry: SessionIdRegistry,
    max_depth: Option<usize>,
    placeholder_offer: Option<PlaceholderOffer>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("config", &self.config)
            .field("context", &self.context)
            .field("registry", &self.registry.len())
            .finish()
    }
}

impl Navigator {
    pub fn new(provider: Arc<dyn AccessibilityProvider>, config: ExecutorConfig) -> Self {
        Self {
            provider,
            config,
            context: NavigationContext::Empty,
            registry: SessionIdRegistry::new(),
            max_depth: Some(DEFAULT_MAX_DEPTH),
            placeholder_offer: None,
        }
    }

    /// Default depth for [`Navigator::show_tree`]. `None` walks everything.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn context(&self) -> &NavigationContext {
        &self.context
    }

    pub fn level(&self) -> ContextLevel {
        self.context.level()
    }

    pub fn registry(&self) -> &SessionIdRegistry {
        &self.registry
    }

    pub fn tree(&self) -> Option<&ElementTree> {
        self.context.window().map(|window| &window.tree)
    }

    pub fn current_element(&self) -> Option<&Element> {
        let tree = self.tree()?;
        tree.get(self.context.element()?)
    }

    pub fn breadcrumb(&self) -> String {
        self.context.breadcrumb()
    }

    /// Title of the placeholder window on offer after a timed-out window
    /// selection.
    pub fn placeholder_offer(&self) -> Option<&str> {
        self.placeholder_offer
            .as_ref()
            .map(|offer| offer.title.as_str())
    }

    #[instrument(skip(self))]
    pub fn list_applications(&self) -> Result<Vec<ApplicationInfo>, NavigationError> {
        let provider = Arc::clone(&self.provider);
        self.config
            .call("list applications", move || provider.list_applications())
    }

    /// Selects an application by name (exact, then substring, both
    /// case-insensitive) or PID, or the focused application when
    /// `identifier` is empty. Then tries to enter its focused window.
    #[instrument(skip(self))]
    pub fn select_application(&mut self, identifier: Option<&str>) -> Result<(), NavigationError> {
        let app = match identifier.map(str::trim).filter(|s| !s.is_empty()) {
            None => {
                let provider = Arc::clone(&self.provider);
                self.config
                    .call("get focused application", move || {
                        provider.focused_application()
                    })?
                    .ok_or_else(|| {
                        NavigationError::NotFound("no application is focused".to_string())
                    })?
            }
            Some(identifier) => {
                let applications = self.list_applications()?;
                let info = match_application(&applications, identifier)?;
                let pid = info.pid;
                let provider = Arc::clone(&self.provider);
                self.config
                    .call("get application", move || provider.get_application(pid))?
            }
        };

        info!("Selected application {}", app.info);
        self.registry.clear();
        self.placeholder_offer = None;
        self.context = NavigationContext::Application { app: app.clone() };

        let provider = Arc::clone(&self.provider);
        let query_app = app.clone();
        let focused = self.config.call("get focused window", move || {
            provider.focused_window(&query_app)
        });
        match focused {
            Ok(Some(handle)) => {
                let title = handle.title.clone();
                match self.open_window(handle) {
                    Ok(window) => {
                        debug!("Entered focused window '{title}'");
                        self.context = NavigationContext::Window { app, window };
                    }
                    Err(e) => {
                        warn!("Could not open focused window '{title}': {e}");
                        self.offer_placeholder_on_timeout(&app, &title, &e);
                    }
                }
            }
            Ok(None) => debug!("{} has no focused window", app.info.name),
            Err(e) => warn!("Could not query focused window of {}: {e}", app.info.name),
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn list_windows(&self) -> Result<Vec<WindowHandle>, NavigationError> {
        let app = self.require_application()?.clone();
        self.fetch_windows(app)
    }

    /// Selects a window by index into the window list or by case-insensitive
    /// title substring. A timeout puts a placeholder window on offer.
    #[instrument(skip(self))]
    pub fn select_window(&mut self, selector: &str) -> Result<(), NavigationError> {
        let app = self.require_application()?.clone();
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(NavigationError::InvalidSelector(
                "window selector is empty".to_string(),
            ));
        }

        let windows = match self.fetch_windows(app.clone()) {
            Ok(windows) => windows,
            Err(e) => return Err(self.offer_placeholder_on_timeout(&app, selector, &e)),
        };
        let handle = pick_window(&windows, selector)?.clone();
        let title = handle.title.clone();
        let window = match self.open_window(handle) {
            Ok(window) => window,
            Err(e) => return Err(self.offer_placeholder_on_timeout(&app, &title, &e)),
        };

        info!("Selected window '{title}'");
        self.registry.clear();
        self.placeholder_offer = None;
        self.context = NavigationContext::Window { app, window };
        Ok(())
    }

    /// Enters the placeholder window put on offer by the last timed-out
    /// window selection.
    #[instrument(skip(self))]
    pub fn accept_placeholder(&mut self) -> Result<(), NavigationError> {
        let offer = self.placeholder_offer.take().ok_or_else(|| {
            NavigationError::InvalidState("no placeholder window is on offer".to_string())
        })?;
        if self.context.application() != Some(&offer.app) {
            return Err(NavigationError::InvalidState(format!(
                "the placeholder for '{}' belongs to an application that is no longer selected",
                offer.title
            )));
        }

        let note = format!("window could not be loaded: {}", offer.reason);
        let tree = ElementTree::placeholder(
            Arc::clone(&self.provider),
            self.config,
            "AXWindow",
            &offer.title,
            &note,
        );
        info!("Entered placeholder window '{}'", offer.title);
        self.registry.clear();
        self.context = NavigationContext::Window {
            app: offer.app,
            window: WindowContext::placeholder(offer.title, tree),
        };
        Ok(())
    }

    /// Selects an element by index among the children of the current root,
    /// by `#id` from the last tree display, or by path from the current root.
    #[instrument(skip(self))]
    pub fn select_element(&mut self, selector: &str) -> Result<NodeId, NavigationError> {
        let selector = ElementSelector::parse(selector)?;
        let root = self.require_root()?;
        let window = self.context.window_mut().ok_or_else(no_window)?;
        let tree = &mut window.tree;

        let node = match &selector {
            ElementSelector::Index(index) => {
                let candidates = load_candidates(tree, root)?;
                resolve_by_index(*index, &candidates)?
            }
            ElementSelector::SessionId(id) => resolve_by_id(*id, &self.registry)?,
            ElementSelector::Path(path) => resolve_by_path(tree, path, root)?,
        };

        if let Some(element) = tree.get(node) {
            info!("Selected element {element} via {selector}");
        }
        self.enter_element(node);
        Ok(node)
    }

    /// Strips one level of context.
    #[instrument(skip(self))]
    pub fn back(&mut self) -> ContextLevel {
        self.context.back();
        self.placeholder_offer = None;
        let level = self.context.level();
        if level < ContextLevel::Window {
            self.registry.clear();
        }
        debug!("Back to {level} level");
        level
    }

    pub fn reset(&mut self) {
        self.context = NavigationContext::Empty;
        self.registry.clear();
        self.placeholder_offer = None;
        debug!("Context reset");
    }

    /// Process-level interrupt: drop all state before the loop exits.
    pub fn interrupt(&mut self) {
        info!("Interrupted at {}", self.breadcrumb());
        self.reset();
    }

    /// Children of the current root, loaded if needed. Like a tree display
    /// one level deep, this renumbers the session IDs: the root gets `#0` and
    /// the children follow in order.
    #[instrument(skip(self))]
    pub fn list_children(&mut self) -> Result<Vec<ListedElement>, NavigationError> {
        let root = self.require_root()?;
        let window = self.context.window_mut().ok_or_else(no_window)?;
        let children = load_candidates(&mut window.tree, root)?;
        if let Err(e) = self.registry.rebuild(&mut window.tree, root, Some(1)) {
            warn!("Listing assigned IDs to {} elements only: {e}", self.registry.len());
        }
        Ok(listing(&window.tree, &self.registry, children))
    }

    /// Pre-order search below the current root. Role and title filters are
    /// both optional.
    #[instrument(skip(self))]
    pub fn find(
        &mut self,
        role: Option<&str>,
        title: Option<&str>,
    ) -> Result<Vec<ListedElement>, NavigationError> {
        let root = self.require_root()?;
        let filter = ElementFilter::new(role.map(str::to_string), title.map(str::to_string));
        let registry = &self.registry;
        let window = self.context.window_mut().ok_or_else(no_window)?;
        let found = window.tree.find_descendants(root, &filter)?;
        debug!("find {filter:?} matched {} elements", found.len());
        Ok(listing(&window.tree, registry, found))
    }

    /// Rebuilds the session IDs from the current root and renders the tree
    /// they describe. IDs from earlier displays stop being valid.
    #[instrument(skip(self))]
    pub fn show_tree(&mut self, max_depth: Option<usize>) -> Result<TreeDisplay, NavigationError> {
        let root = self.require_root()?;
        let max_depth = max_depth.or(self.max_depth);
        let window = self.context.window_mut().ok_or_else(no_window)?;

        let rebuilt = self.registry.rebuild(&mut window.tree, root, max_depth);
        Ok(TreeDisplay {
            text: format_registry_tree(&window.tree, &self.registry),
            count: self.registry.len(),
            interrupted: rebuilt.err(),
        })
    }

    /// Label and value pairs describing the current context, ending with the
    /// attributes and actions of the current root element.
    #[instrument(skip(self))]
    pub fn context_info(&self) -> Result<Vec<(String, String)>, NavigationError> {
        let app = self.require_application()?;
        let mut info = vec![("Application".to_string(), app.info.to_string())];

        let Some(window) = self.context.window() else {
            return Ok(info);
        };
        let mut title = window.title.clone();
        if window.is_placeholder() {
            title.push_str(" (placeholder)");
        }
        info.push(("Window".to_string(), title));

        let node = self.context.current_root().ok_or_else(no_window)?;
        let tree = &window.tree;
        info.push(("Path".to_string(), path_to(tree, node)?.to_string()));
        let element = tree.element(node)?;
        if element.children_inaccessible() {
            info.push((
                "Children".to_string(),
                "has children, not accessible".to_string(),
            ));
        }
        info.extend(tree.attributes(node)?);
        if !element.is_synthetic() {
            let actions = tree.action_names(node)?;
            if !actions.is_empty() {
                info.push(("Actions".to_string(), actions.join(", ")));
            }
        }
        Ok(info)
    }

    /// Presses the selected element. Not retried.
    #[instrument(skip(self))]
    pub fn press(&self) -> Result<(), NavigationError> {
        let node = self.require_element()?;
        let tree = self.tree().ok_or_else(no_window)?;
        tree.perform_action(node, actions::PRESS)?;
        info!("Pressed {}", tree.element(node)?);
        Ok(())
    }

    /// Replaces the value of the selected element. Not retried.
    #[instrument(skip(self, text))]
    pub fn type_text(&mut self, text: &str) -> Result<(), NavigationError> {
        let node = self.require_element()?;
        let window = self.context.window_mut().ok_or_else(no_window)?;
        window.tree.set_value(node, text)?;
        debug!("Set value of node {} ({} chars)", node.index(), text.chars().count());
        Ok(())
    }

    /// Throws the window tree away and loads it again. A selected element is
    /// looked up again at the same child positions, each checked against its
    /// path component. If it moved, its path is used instead, but only when
    /// every component names exactly one sibling. Otherwise the context falls
    /// back to the window.
    #[instrument(skip(self))]
    pub fn refresh(&mut self) -> Result<RefreshOutcome, NavigationError> {
        let (handle, previous) = {
            let window = self.context.window().ok_or_else(no_window)?;
            let handle = window.handle.clone().ok_or_else(|| {
                NavigationError::InvalidState(
                    "a placeholder window cannot be refreshed; select the window again"
                        .to_string(),
                )
            })?;
            let previous = match self.context.element() {
                Some(node) => Some((
                    path_to(&window.tree, node)?,
                    child_positions(&window.tree, node),
                )),
                None => None,
            };
            (handle, previous)
        };

        let mut window = self.open_window(handle)?;
        self.registry.clear();
        self.placeholder_offer = None;
        let app = match std::mem::take(&mut self.context) {
            NavigationContext::Window { app, .. } | NavigationContext::Element { app, .. } => app,
            other => {
                self.context = other;
                return Err(no_window());
            }
        };

        let Some((path, positions)) = previous else {
            self.context = NavigationContext::Window { app, window };
            info!("Refreshed window tree");
            return Ok(RefreshOutcome::Window);
        };

        let root = window.tree.root();
        let below_root = path.components().get(1..).unwrap_or_default();
        let found = resolve_by_positions(&mut window.tree, below_root, &positions, root)
            .or_else(|moved| {
                if moved.is_timeout() {
                    return Err(moved);
                }
                debug!("{path} is not where it was ({moved}), matching by path");
                resolve_path_unique(&mut window.tree, below_root, root)
            });
        match found {
            Ok(element) => {
                self.context = NavigationContext::Element {
                    app,
                    window,
                    element,
                };
                info!("Refreshed and found {path} again");
                Ok(RefreshOutcome::Reresolved(path))
            }
            Err(error) => {
                warn!("Selected element {path} is gone after refresh, staying at the window: {error}");
                self.context = NavigationContext::Window { app, window };
                Ok(RefreshOutcome::ElementLost { path, error })
            }
        }
    }

    fn fetch_windows(&self, app: ApplicationHandle) -> Result<Vec<WindowHandle>, NavigationError> {
        let provider = Arc::clone(&self.provider);
        self.config
            .call("list windows", move || provider.windows(&app))
    }

    fn open_window(&self, handle: WindowHandle) -> Result<WindowContext, NavigationError> {
        let tree = ElementTree::load(Arc::clone(&self.provider), self.config, handle.element)?;
        Ok(WindowContext::new(handle, tree))
    }

    /// Records a placeholder offer when `error` is a timeout and clears any
    /// older offer otherwise. Hands the error back for propagation.
    fn offer_placeholder_on_timeout(
        &mut self,
        app: &ApplicationHandle,
        title: &str,
        error: &NavigationError,
    ) -> NavigationError {
        if error.is_timeout() {
            info!("Offering placeholder for window '{title}' after: {error}");
            self.placeholder_offer = Some(PlaceholderOffer {
                app: app.clone(),
                title: title.to_string(),
                reason: error.clone(),
            });
        } else {
            self.placeholder_offer = None;
        }
        error.clone()
    }

    fn enter_element(&mut self, element: NodeId) {
        self.placeholder_offer = None;
        self.context = match std::mem::take(&mut self.context) {
            NavigationContext::Window { app, window }
            | NavigationContext::Element { app, window, .. } => NavigationContext::Element {
                app,
                window,
                element,
            },
            other => other,
        };
    }

    fn require_application(&self) -> Result<&ApplicationHandle, NavigationError> {
        self.context.application().ok_or_else(|| {
            NavigationError::InvalidState("no application selected; use `app` first".to_string())
        })
    }

    fn require_root(&self) -> Result<NodeId, NavigationError> {
        self.context.current_root().ok_or_else(no_window)
    }

    fn require_element(&self) -> Result<NodeId, NavigationError> {
        self.context.element().ok_or_else(|| {
            NavigationError::InvalidState("no element selected; use `select` first".to_string())
        })
    }
}

fn no_window() -> NavigationError {
    NavigationError::InvalidState("no window selected; use `window` first".to_string())
}

/// Name exact match first, then name substring, then PID. Names compare
/// case-insensitively.
pub fn match_application<'a>(
    applications: &'a [ApplicationInfo],
    identifier: &str,
) -> Result<&'a ApplicationInfo, NavigationError> {
    let wanted = identifier.trim().to_lowercase();
    let by_name = applications
        .iter()
        .find(|app| app.name.to_lowercase() == wanted)
        .or_else(|| {
            applications
                .iter()
                .find(|app| app.name.to_lowercase().contains(&wanted))
        });
    if let Some(app) = by_name {
        return Ok(app);
    }
    if let Ok(pid) = wanted.parse::<i32>() {
        if let Some(app) = applications.iter().find(|app| app.pid == pid) {
            return Ok(app);
        }
    }
    Err(NavigationError::NotFound(format!(
        "no running application matches '{identifier}'"
    )))
}

/// Index into `windows` when `selector` is all digits, else the first title
/// containing it case-insensitively.
pub fn pick_window<'a>(
    windows: &'a [WindowHandle],
    selector: &str,
) -> Result<&'a WindowHandle, NavigationError> {
    if !selector.is_empty() && selector.chars().all(|c| c.is_ascii_digit()) {
        let index: usize = selector.parse().map_err(|_| {
            NavigationError::InvalidSelector(format!("window index {selector} is too large"))
        })?;
        return windows.get(index).ok_or(NavigationError::IndexOutOfRange {
            index,
            len: windows.len(),
        });
    }
    let wanted = selector.to_lowercase();
    windows
        .iter()
        .find(|window| window.title.to_lowercase().contains(&wanted))
        .ok_or_else(|| NavigationError::NotFound(format!("no window title contains '{selector}'")))
}

/// Children of `node`, loading them first. A failed load surfaces as an
/// error instead of an empty list.
fn load_candidates(tree: &mut ElementTree, node: NodeId) -> Result<Vec<NodeId>, NavigationError> {
    let state = tree.load_children(node);
    let children = tree.children(node).to_vec();
    if children.is_empty() {
        if let ChildrenState::Failed(kind) = state {
            let element = tree.element(node)?.to_string();
            return Err(match kind {
                ErrorKind::Timeout => NavigationError::timeout(
                    format!("load children of {element}"),
                    tree.config().element_timeout,
                ),
                _ => NavigationError::ProviderError(format!(
                    "{element} has children, but they are not accessible"
                )),
            });
        }
    }
    Ok(children)
}

fn listing(
    tree: &ElementTree,
    registry: &SessionIdRegistry,
    nodes: Vec<NodeId>,
) -> Vec<ListedElement> {
    nodes
        .into_iter()
        .enumerate()
        .filter_map(|(index, node)| {
            let element = tree.get(node)?;
            let session_id = registry.index_of(node);
            Some(ListedElement {
                node,
                index,
                session_id,
                line: format_element_line(element, session_id),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::ElementHandle;

    fn apps() -> Vec<ApplicationInfo> {
        vec![
            ApplicationInfo {
                pid: 10,
                name: "Finder".into(),
                bundle_id: None,
            },
            ApplicationInfo {
                pid: 20,
                name: "TextEdit Helper".into(),
                bundle_id: None,
            },
            ApplicationInfo {
                pid: 30,
                name: "TextEdit".into(),
                bundle_id: None,
            },
        ]
    }

    #[test]
    fn test_exact_name_beats_substring() {
        let apps = apps();
        assert_eq!(match_application(&apps, "textedit").unwrap().pid, 30);
        assert_eq!(match_application(&apps, "help").unwrap().pid, 20);
        assert_eq!(match_application(&apps, "10").unwrap().name, "Finder");
        assert!(matches!(
            match_application(&apps, "Safari"),
            Err(NavigationError::NotFound(_))
        ));
    }

    #[test]
    fn test_pick_window_by_index_or_title() {
        let windows = vec![
            WindowHandle {
                title: "Inbox".into(),
                element: ElementHandle::new(1),
            },
            WindowHandle {
                title: "Draft Reply".into(),
                element: ElementHandle::new(2),
            },
        ];
        assert_eq!(pick_window(&windows, "1").unwrap().title, "Draft Reply");
        assert_eq!(pick_window(&windows, "draft").unwrap().title, "Draft Reply");
        assert_eq!(
            pick_window(&windows, "5").unwrap_err(),
            NavigationError::IndexOutOfRange { index: 5, len: 2 }
        );
        assert!(matches!(
            pick_window(&windows, "Outbox"),
            Err(NavigationError::NotFound(_))
        ));
    }
}
