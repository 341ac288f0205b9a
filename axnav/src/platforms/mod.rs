use crate::errors::NavigationError;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub mod snapshot;

pub use snapshot::{Snapshot, SnapshotNode, SnapshotProvider};

/// Attribute names shared by all providers.
pub mod attributes {
    pub const ROLE: &str = "AXRole";
    pub const SUBROLE: &str = "AXSubrole";
    pub const TITLE: &str = "AXTitle";
    pub const ROLE_DESCRIPTION: &str = "AXRoleDescription";
    pub const IDENTIFIER: &str = "AXIdentifier";
    pub const VALUE: &str = "AXValue";
    pub const CHILDREN: &str = "AXChildren";
}

/// Action names shared by all providers.
pub mod actions {
    pub const PRESS: &str = "AXPress";
}

/// Opaque reference to a provider-side element. Only the provider that handed
/// it out can interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(u64);

impl ElementHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub pid: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
}

impl fmt::Display for ApplicationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.name, self.pid)?;
        if let Some(bundle_id) = &self.bundle_id {
            write!(f, " [{bundle_id}]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationHandle {
    pub info: ApplicationInfo,
    pub element: ElementHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    pub title: String,
    pub element: ElementHandle,
}

/// The operations the navigation core needs from an accessibility service.
///
/// Implementations may block for an arbitrary time; callers always go through
/// the executor, so nothing here has to enforce its own deadline.
pub trait AccessibilityProvider: Send + Sync {
    fn list_applications(&self) -> Result<Vec<ApplicationInfo>, NavigationError>;

    /// Exact lookup by PID. Name matching is the caller's job.
    fn get_application(&self, pid: i32) -> Result<ApplicationHandle, NavigationError>;

    fn focused_application(&self) -> Result<Option<ApplicationHandle>, NavigationError>;

    fn windows(&self, app: &ApplicationHandle) -> Result<Vec<WindowHandle>, NavigationError>;

    fn focused_window(
        &self,
        app: &ApplicationHandle,
    ) -> Result<Option<WindowHandle>, NavigationError>;

    fn attribute_names(&self, element: &ElementHandle) -> Result<Vec<String>, NavigationError>;

    fn attribute_value(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<AttributeValue, NavigationError>;

    fn children(&self, element: &ElementHandle) -> Result<Vec<ElementHandle>, NavigationError>;

    /// Cheap child count used for the "has children" hint. Providers that can
    /// answer without materializing the children should override this.
    fn child_count(&self, element: &ElementHandle) -> Result<usize, NavigationError> {
        Ok(self.children(element)?.len())
    }

    fn action_names(&self, element: &ElementHandle) -> Result<Vec<String>, NavigationError>;

    fn perform_action(&self, element: &ElementHandle, action: &str) -> Result<(), NavigationError>;

    fn set_value(&self, element: &ElementHandle, value: &str) -> Result<(), NavigationError>;

    fn is_accessibility_authorized(&self) -> bool;

    fn request_authorization(&self) -> bool;
}

/// Where the provider gets its tree from.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// JSON snapshot to serve instead of a live accessibility service.
    pub snapshot: Option<PathBuf>,
}

/// Builds the provider described by `config`.
pub fn create_provider(
    config: &ProviderConfig,
) -> Result<Arc<dyn AccessibilityProvider>, NavigationError> {
    match &config.snapshot {
        Some(path) => {
            info!("Loading accessibility snapshot from {}", path.display());
            let provider = SnapshotProvider::from_file(path)?;
            Ok(Arc::new(provider))
        }
        None => Err(NavigationError::ProviderUnavailable(
            "no live accessibility provider is available on this build".to_string(),
        )),
    }
}
