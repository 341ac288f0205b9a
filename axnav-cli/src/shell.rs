use crate::commands::{parse_command, Command};
use crate::display;
use axnav::{ContextLevel, NavigationError, Navigator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    navigator: Navigator,
}

impl Shell {
    pub fn new(navigator: Navigator) -> Self {
        Self { navigator }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Reads commands until `quit`, end of input or Ctrl-C.
    ///
    /// Each command runs on a blocking worker so Ctrl-C is noticed while it is
    /// stuck in a provider call or a retry. An interrupted command's worker is
    /// abandoned together with the context it holds; `main` exits the process
    /// without waiting for it.
    pub async fn run(self) -> anyhow::Result<()> {
        display::print_banner();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut ctrl_c_armed = true;
        let mut shell = self;

        loop {
            display::print_prompt(&shell.navigator.breadcrumb())?;
            let line = tokio::select! {
                signal = &mut ctrl_c, if ctrl_c_armed => {
                    match signal {
                        Ok(()) => {
                            shell.navigator.interrupt();
                            display::print_goodbye(true);
                            return Ok(());
                        }
                        Err(e) => {
                            warn!("Cannot listen for Ctrl-C: {e}");
                            ctrl_c_armed = false;
                            continue;
                        }
                    }
                }
                line = lines.next_line() => line?,
            };

            let Some(line) = line else {
                debug!("End of input");
                shell.navigator.reset();
                println!();
                display::print_goodbye(false);
                return Ok(());
            };

            let mut command = tokio::task::spawn_blocking(move || {
                let flow = shell.handle_line(&line);
                (shell, flow)
            });
            let (returned, flow) = loop {
                tokio::select! {
                    signal = &mut ctrl_c, if ctrl_c_armed => {
                        match signal {
                            Ok(()) => {
                                warn!("Interrupted while a command was running");
                                display::print_goodbye(true);
                                return Ok(());
                            }
                            Err(e) => {
                                warn!("Cannot listen for Ctrl-C: {e}");
                                ctrl_c_armed = false;
                            }
                        }
                    }
                    joined = &mut command => break joined?,
                }
            };
            shell = returned;

            if flow == Flow::Quit {
                shell.navigator.reset();
                display::print_goodbye(false);
                return Ok(());
            }
        }
    }

    /// Parses and runs one line. Errors are printed, never propagated.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        match parse_command(line) {
            Ok(None) => Flow::Continue,
            Ok(Some(command)) => {
                debug!(?command, "Running command");
                match self.execute(command) {
                    Ok(flow) => flow,
                    Err(e) => {
                        display::print_error(&e);
                        Flow::Continue
                    }
                }
            }
            Err(e) => {
                display::print_parse_error(&e);
                Flow::Continue
            }
        }
    }

    pub fn execute(&mut self, command: Command) -> Result<Flow, NavigationError> {
        let navigator = &mut self.navigator;
        match command {
            Command::Apps => display::print_applications(&navigator.list_applications()?),
            Command::App(identifier) => {
                let selected = navigator.select_application(identifier.as_deref());
                if self.report_transition(selected)
                    && self.navigator.level() == ContextLevel::Application
                {
                    println!("No focused window; use `windows` and `window <index|title>`.");
                }
            }
            Command::Windows => display::print_windows(&navigator.list_windows()?),
            Command::Window(selector) => {
                let selected = navigator.select_window(&selector);
                self.report_transition(selected);
            }
            Command::List => display::print_children(&navigator.list_children()?),
            Command::Select(selector) => {
                navigator.select_element(&selector)?;
                println!("{}", navigator.breadcrumb());
            }
            Command::Find { role, title } => {
                let found = navigator.find(role.as_deref(), title.as_deref())?;
                display::print_listing(&found, "Nothing matched.");
            }
            Command::Tree(depth) => display::print_tree(&navigator.show_tree(depth)?),
            Command::Info => display::print_info(&navigator.context_info()?),
            Command::Where => println!("{}", navigator.breadcrumb()),
            Command::Back => {
                navigator.back();
                println!("{}", navigator.breadcrumb());
            }
            Command::Reset => navigator.reset(),
            Command::Refresh => display::print_refresh(&navigator.refresh()?),
            Command::Placeholder => {
                navigator.accept_placeholder()?;
                println!("{}", navigator.breadcrumb());
            }
            Command::Press => {
                navigator.press()?;
                println!("Pressed.");
            }
            Command::Type(text) => {
                navigator.type_text(&text)?;
                println!("Value set.");
            }
            Command::Clear => display::clear_screen(),
            Command::Help => display::print_help(),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Prints the new location, or the error plus any placeholder offer.
    /// Returns whether the transition happened.
    fn report_transition(&self, result: Result<(), NavigationError>) -> bool {
        match result {
            Ok(()) => {
                println!("{}", self.navigator.breadcrumb());
                true
            }
            Err(e) => {
                display::print_error(&e);
                if let Some(title) = self.navigator.placeholder_offer() {
                    display::print_placeholder_offer(title);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axnav::{ExecutorConfig, SnapshotProvider};
    use std::sync::Arc;

    fn shell() -> Shell {
        let snapshot = r#"{
            "focused_application": 1,
            "applications": [{
                "pid": 1, "name": "Notes", "focused_window": 0,
                "windows": [{"role": "AXWindow", "title": "Notes", "children": [
                    {"role": "AXButton", "title": "New Note", "actions": ["AXPress"]},
                    {"role": "AXTextArea", "identifier": "editor", "value": ""}
                ]}]
            }]
        }"#;
        let provider = Arc::new(SnapshotProvider::from_json_str(snapshot).unwrap());
        Shell::new(Navigator::new(provider, ExecutorConfig::default()))
    }

    #[test]
    fn test_errors_do_not_end_the_session() {
        let mut shell = shell();
        assert_eq!(shell.handle_line("select 0"), Flow::Continue);
        assert_eq!(shell.handle_line("bogus"), Flow::Continue);
        assert_eq!(shell.handle_line("window"), Flow::Continue);
        assert_eq!(shell.navigator().level(), ContextLevel::Empty);
    }

    #[test]
    fn test_navigation_commands() {
        let mut shell = shell();
        shell.handle_line("app notes");
        assert_eq!(shell.navigator().breadcrumb(), "Notes > Notes");
        shell.handle_line("tree");
        shell.handle_line("el #2");
        assert_eq!(shell.navigator().level(), ContextLevel::Element);
        shell.handle_line("type hello");
        assert_eq!(
            shell.navigator().current_element().unwrap().value.display(),
            "hello"
        );
        shell.handle_line("back");
        shell.handle_line("back");
        assert_eq!(shell.navigator().level(), ContextLevel::Application);
        shell.handle_line("reset");
        assert_eq!(shell.navigator().level(), ContextLevel::Empty);
    }

    #[test]
    fn test_listing_ids_can_be_selected() {
        let mut shell = shell();
        shell.handle_line("app notes");
        shell.handle_line("ls");
        shell.handle_line("el #2");
        assert_eq!(
            shell.navigator().current_element().unwrap().identifier.as_deref(),
            Some("editor")
        );
    }

    #[tokio::test]
    async fn test_commands_run_on_a_blocking_worker() {
        let mut shell = shell();
        let (shell, flow) = tokio::task::spawn_blocking(move || {
            let flow = shell.handle_line("app notes");
            (shell, flow)
        })
        .await
        .unwrap();
        assert_eq!(flow, Flow::Continue);
        assert_eq!(shell.navigator().breadcrumb(), "Notes > Notes");
    }

    #[test]
    fn test_quit_stops_the_loop() {
        let mut shell = shell();
        assert_eq!(shell.handle_line("exit"), Flow::Quit);
        assert_eq!(shell.handle_line("help"), Flow::Continue);
    }
}
