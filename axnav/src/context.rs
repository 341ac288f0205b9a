use crate::element::{ElementTree, NodeId};
use crate::platforms::{ApplicationHandle, WindowHandle};
use crate::tree_formatter::format_breadcrumb;
use std::fmt;

/// How deep the current context reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContextLevel {
    Empty,
    Application,
    Window,
    Element,
}

impl fmt::Display for ContextLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextLevel::Empty => "empty",
            ContextLevel::Application => "application",
            ContextLevel::Window => "window",
            ContextLevel::Element => "element",
        };
        f.write_str(name)
    }
}

/// A selected window together with the materialized part of its tree.
#[derive(Debug)]
pub struct WindowContext {
    pub title: String,
    /// `None` for a placeholder window.
    pub handle: Option<WindowHandle>,
    pub tree: ElementTree,
}

impl WindowContext {
    pub fn new(handle: WindowHandle, tree: ElementTree) -> Self {
        Self {
            title: handle.title.clone(),
            handle: Some(handle),
            tree,
        }
    }

    pub fn placeholder(title: impl Into<String>, tree: ElementTree) -> Self {
        Self {
            title: title.into(),
            handle: None,
            tree,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.handle.is_none()
    }
}

/// Where the user currently is. A window cannot exist without its
/// application, nor an element without its window.
#[derive(Debug, Default)]
pub enum NavigationContext {
    #[default]
    Empty,
    Application {
        app: ApplicationHandle,
    },
    Window {
        app: ApplicationHandle,
        window: WindowContext,
    },
    Element {
        app: ApplicationHandle,
        window: WindowContext,
        element: NodeId,
    },
}

impl NavigationContext {
    pub fn level(&self) -> ContextLevel {
        match self {
            NavigationContext::Empty => ContextLevel::Empty,
            NavigationContext::Application { .. } => ContextLevel::Application,
            NavigationContext::Window { .. } => ContextLevel::Window,
            NavigationContext::Element { .. } => ContextLevel::Element,
        }
    }

    pub fn application(&self) -> Option<&ApplicationHandle> {
        match self {
            NavigationContext::Empty => None,
            NavigationContext::Application { app }
            | NavigationContext::Window { app, .. }
            | NavigationContext::Element { app, .. } => Some(app),
        }
    }

    pub fn window(&self) -> Option<&WindowContext> {
        match self {
            NavigationContext::Window { window, .. } | NavigationContext::Element { window, .. } => {
                Some(window)
            }
            _ => None,
        }
    }

    pub fn window_mut(&mut self) -> Option<&mut WindowContext> {
        match self {
            NavigationContext::Window { window, .. } | NavigationContext::Element { window, .. } => {
                Some(window)
            }
            _ => None,
        }
    }

    pub fn element(&self) -> Option<NodeId> {
        match self {
            NavigationContext::Element { element, .. } => Some(*element),
            _ => None,
        }
    }

    /// The element selectors resolve against: the selected element, else the
    /// window root.
    pub fn current_root(&self) -> Option<NodeId> {
        match self {
            NavigationContext::Element { element, .. } => Some(*element),
            NavigationContext::Window { window, .. } => Some(window.tree.root()),
            _ => None,
        }
    }

    /// Strips exactly one level, never going below `Empty`.
    pub fn back(&mut self) {
        *self = match std::mem::take(self) {
            NavigationContext::Empty | NavigationContext::Application { .. } => {
                NavigationContext::Empty
            }
            NavigationContext::Window { app, .. } => NavigationContext::Application { app },
            NavigationContext::Element { app, window, .. } => {
                NavigationContext::Window { app, window }
            }
        };
    }

    pub fn breadcrumb(&self) -> String {
        let window = self.window();
        format_breadcrumb(
            self.application().map(|app| app.info.name.as_str()),
            window.map(|window| window.title.as_str()),
            window.map(|window| &window.tree),
            self.element(),
        )
    }
}
