mod navigation_tests;

use crate::element::ElementTree;
use crate::executor::{ExecutorConfig, RetryPolicy};
use crate::navigator::Navigator;
use crate::platforms::{AccessibilityProvider, SnapshotProvider};
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Log sink for a scoped subscriber.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|bytes| bytes.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a subscriber that records everything it logs on this
/// thread, returning the result and the log text.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

/// Short deadlines so fault injection in the fixture trips them quickly.
pub fn test_config() -> ExecutorConfig {
    ExecutorConfig {
        call_timeout: Duration::from_millis(200),
        element_timeout: Duration::from_millis(100),
        walk_timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(2, Duration::from_millis(10)).unwrap(),
    }
}

/// TextEdit (focused, window "Main" focused) with a second window
/// "Dialog"; "Busy App" whose window listing hangs; "Broken App" whose
/// window listing fails.
pub fn fixture() -> serde_json::Value {
    json!({
        "focused_application": 100,
        "applications": [
            {
                "pid": 100,
                "name": "TextEdit",
                "bundle_id": "com.apple.TextEdit",
                "focused_window": 0,
                "windows": [
                    {"role": "AXWindow", "title": "Main", "children": [
                        {"role": "AXButton", "title": "OK", "actions": ["AXPress"]},
                        {"role": "AXGroup", "title": "Toolbar", "children": [
                            {"role": "AXButton", "title": "Bold", "actions": ["AXPress"]},
                            {"role": "AXButton", "title": "Italic", "actions": ["AXPress"]}
                        ]},
                        {"role": "AXTextArea", "identifier": "body", "value": "Hello",
                         "unreadable": ["AXFrame"]},
                        {"role": "AXGroup", "title": "Sidebar",
                         "error": "kAXErrorCannotComplete", "children_hint": true},
                        {"role": "AXGroup", "title": "Slow Panel", "delay_ms": 400, "children": [
                            {"role": "AXButton", "title": "Hidden"}
                        ]}
                    ]},
                    {"role": "AXWindow", "title": "Dialog", "children": [
                        {"role": "AXButton", "title": "OK"},
                        {"role": "AXButton", "title": "Cancel"},
                        {"role": "AXTextField", "title": "Search"}
                    ]}
                ]
            },
            {
                "pid": 200,
                "name": "Busy App",
                "delay_ms": 400,
                "windows": [{"role": "AXWindow", "title": "Busy"}]
            },
            {
                "pid": 300,
                "name": "Broken App",
                "error": "kAXErrorCannotComplete",
                "windows": [{"role": "AXWindow", "title": "Unreachable"}]
            }
        ]
    })
}

pub fn fixture_provider() -> Arc<SnapshotProvider> {
    Arc::new(SnapshotProvider::from_json_str(&fixture().to_string()).unwrap())
}

pub fn navigator() -> (Arc<SnapshotProvider>, Navigator) {
    let provider = fixture_provider();
    let navigator = Navigator::new(provider.clone(), test_config());
    (provider, navigator)
}

/// Tree of the TextEdit window titled `title`, root only.
pub fn window_tree(title: &str) -> ElementTree {
    let provider: Arc<dyn AccessibilityProvider> = fixture_provider();
    let app = provider.focused_application().unwrap().unwrap();
    let window = provider
        .windows(&app)
        .unwrap()
        .into_iter()
        .find(|window| window.title == title)
        .unwrap();
    ElementTree::load(provider, test_config(), window.element).unwrap()
}
