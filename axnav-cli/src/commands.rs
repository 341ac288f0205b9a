use axnav::{ElementSelector, NavigationError};
use thiserror::Error;

/// One line of shell input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Apps,
    /// `None` selects the focused application.
    App(Option<String>),
    Windows,
    Window(String),
    List,
    Select(String),
    Find {
        role: Option<String>,
        title: Option<String>,
    },
    Tree(Option<usize>),
    Info,
    Where,
    Back,
    Reset,
    Refresh,
    Placeholder,
    Press,
    Type(String),
    Clear,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error(transparent)]
    Selector(#[from] NavigationError),
}

impl ParseError {
    pub fn hint(&self) -> &'static str {
        match self {
            ParseError::Unknown(_) | ParseError::Usage(_) => "type `help` to list commands",
            ParseError::Selector(e) => e.hint(),
        }
    }
}

/// Parses one input line. Blank lines parse to `None`.
///
/// Arguments are trimmed, except the text of `type`, which keeps everything
/// after the single separator following the command name.
pub fn parse_command(line: &str) -> Result<Option<Command>, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']).trim_start();
    if line.trim_end().is_empty() {
        return Ok(None);
    }
    let (name, raw_rest) = match line.find(char::is_whitespace) {
        Some(at) => {
            let separator = line[at..].chars().next().map_or(1, char::len_utf8);
            (&line[..at], &line[at + separator..])
        }
        None => (line, ""),
    };
    let rest = raw_rest.trim();

    let command = match name.to_lowercase().as_str() {
        "apps" => Command::Apps,
        "app" => Command::App(non_empty(rest)),
        "windows" => Command::Windows,
        "window" | "win" => {
            Command::Window(non_empty(rest).ok_or(ParseError::Usage("window <index|title>"))?)
        }
        "ls" | "elements" => Command::List,
        "select" | "el" => {
            let selector = non_empty(rest).ok_or(ParseError::Usage("select <index|#id|path>"))?;
            ElementSelector::parse(&selector)?;
            Command::Select(selector)
        }
        "find" => {
            let mut words = rest.split_whitespace();
            let role = words
                .next()
                .filter(|role| *role != "*")
                .map(str::to_string);
            let title = non_empty(&words.collect::<Vec<_>>().join(" "));
            Command::Find { role, title }
        }
        "tree" => match non_empty(rest) {
            None => Command::Tree(None),
            Some(depth) => Command::Tree(Some(
                depth
                    .parse()
                    .map_err(|_| ParseError::Usage("tree [depth]"))?,
            )),
        },
        "info" => Command::Info,
        "where" | "pwd" => Command::Where,
        "back" | ".." => Command::Back,
        "reset" => Command::Reset,
        "refresh" => Command::Refresh,
        "placeholder" => Command::Placeholder,
        "press" | "click" => Command::Press,
        "type" => {
            if raw_rest.is_empty() {
                return Err(ParseError::Usage("type <text>"));
            }
            Command::Type(raw_rest.to_string())
        }
        "clear" => Command::Clear,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub const HELP: &[(&str, &str)] = &[
    ("apps", "list running applications"),
    ("app [name|pid]", "select an application (focused one if omitted)"),
    ("windows", "list windows of the current application"),
    ("window <index|title>", "select a window"),
    ("ls, elements", "list children of the current element and number them"),
    ("select <index|#id|path>", "select an element (alias: el)"),
    ("find [role|*] [title…]", "search below the current element"),
    ("tree [depth]", "show the tree and assign #ids"),
    ("info", "show attributes of the current element"),
    ("where", "show the current location"),
    ("back", "go up one level"),
    ("reset", "clear the whole context"),
    ("refresh", "reload the window tree"),
    ("placeholder", "enter the placeholder offered after a timeout"),
    ("press, click", "press the current element"),
    ("type <text>", "set the value of the current element"),
    ("clear", "clear the screen"),
    ("help", "show this list"),
    ("quit, exit", "leave the shell"),
];
