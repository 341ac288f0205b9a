//! Navigation engine for live accessibility trees.
//!
//! The crate tracks where the user is (application, window, element),
//! resolves element selectors (child index, session `#id`, slash-delimited
//! path) and materializes the provider's tree lazily. Every call into the
//! provider runs under a deadline so a hung accessibility service cannot
//! freeze the caller.

pub mod context;
pub mod element;
pub mod errors;
pub mod executor;
pub mod navigator;
pub mod platforms;
pub mod registry;
pub mod resolver;
pub mod selector;
#[cfg(test)]
mod tests;
pub mod tree_formatter;
pub mod value;

pub use context::{ContextLevel, NavigationContext, WindowContext};
pub use element::{ChildrenState, Element, ElementFilter, ElementTree, NodeId};
pub use errors::{ErrorKind, NavigationError};
pub use executor::{
    run_with_retry, run_with_timeout, run_with_timeout_and_retry, Deadline, ExecutorConfig,
    RetryPolicy,
};
pub use navigator::{ListedElement, Navigator, RefreshOutcome, TreeDisplay};
pub use platforms::{
    create_provider, AccessibilityProvider, ApplicationHandle, ApplicationInfo, ElementHandle,
    ProviderConfig, SnapshotProvider, WindowHandle,
};
pub use registry::SessionIdRegistry;
pub use selector::{ElementSelector, PathComponent, PathExpression};
pub use value::AttributeValue;
