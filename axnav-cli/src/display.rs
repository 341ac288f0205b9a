use crate::commands::{ParseError, HELP};
use axnav::{
    ApplicationInfo, ListedElement, NavigationError, RefreshOutcome, TreeDisplay, WindowHandle,
};
use colored::*;
use std::io::{self, Write};

pub fn print_banner() {
    println!("{}", "axnav - accessibility tree navigator".bold());
    println!("Type 'help' to see all commands, 'quit' to exit\n");
}

pub fn print_prompt(breadcrumb: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{} {} ", breadcrumb.cyan(), ">".bold())?;
    stdout.flush()
}

pub fn print_error(error: &NavigationError) {
    print_failure(&error.to_string(), error.hint());
}

pub fn print_parse_error(error: &ParseError) {
    print_failure(&error.to_string(), error.hint());
}

fn print_failure(message: &str, hint: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
    eprintln!("  {} {}", "hint:".yellow(), hint);
}

pub fn print_placeholder_offer(title: &str) {
    println!(
        "{} a placeholder for '{}' is available; type `placeholder` to enter it",
        "note:".yellow().bold(),
        title
    );
}

pub fn print_applications(applications: &[ApplicationInfo]) {
    if applications.is_empty() {
        println!("No applications.");
        return;
    }
    println!("{}", format!("Applications ({}):", applications.len()).bold());
    for app in applications {
        let bundle = app
            .bundle_id
            .as_deref()
            .map(|id| format!(" [{id}]").dimmed().to_string())
            .unwrap_or_default();
        println!("  {:>7}  {}{}", app.pid, app.name, bundle);
    }
}

pub fn print_windows(windows: &[WindowHandle]) {
    if windows.is_empty() {
        println!("No windows.");
        return;
    }
    println!("{}", format!("Windows ({}):", windows.len()).bold());
    for (index, window) in windows.iter().enumerate() {
        let title = if window.title.is_empty() {
            "(untitled)".dimmed().to_string()
        } else {
            window.title.clone()
        };
        println!("  {index:>3}  {title}");
    }
}

pub fn print_listing(elements: &[ListedElement], empty: &str) {
    if elements.is_empty() {
        println!("{empty}");
        return;
    }
    for element in elements {
        println!("  {}  {}", format!("{:>3}", element.index).bold(), element.line);
    }
}

pub fn print_tree(display: &TreeDisplay) {
    print!("{}", display.text);
    if let Some(error) = &display.interrupted {
        println!(
            "{} tree walk stopped early after {} elements: {}",
            "warning:".yellow().bold(),
            display.count,
            error
        );
    }
    print_id_warning();
}

/// `ls` output. Listing renumbers the `#id`s, so it carries the same warning
/// as a tree display.
pub fn print_children(elements: &[ListedElement]) {
    print_listing(elements, "No children.");
    if !elements.is_empty() {
        print_id_warning();
    }
}

fn print_id_warning() {
    println!(
        "{}",
        "#ids are valid until the next `tree` or `ls` and may point elsewhere if the application changed"
            .dimmed()
    );
}

pub fn print_info(info: &[(String, String)]) {
    let width = info.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in info {
        println!("  {}  {}", format!("{label:<width$}").bold(), value);
    }
}

pub fn print_refresh(outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Window => println!("Window tree reloaded."),
        RefreshOutcome::Reresolved(path) => println!("Reloaded; still at {path}."),
        RefreshOutcome::ElementLost { path, error } => println!(
            "{} {} is gone ({}); back at the window",
            "warning:".yellow().bold(),
            path,
            error
        ),
    }
}

pub fn print_help() {
    let width = HELP.iter().map(|(usage, _)| usage.chars().count()).max().unwrap_or(0);
    println!("{}", "Commands:".bold());
    for (usage, description) in HELP {
        println!("  {:<width$}  {}", usage, description.dimmed());
    }
    println!(
        "\nPaths look like {} (role[title or identifier], slash-separated).",
        "window[Main]/group/button[OK]".cyan()
    );
}

pub fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
    let _ = io::stdout().flush();
}

pub fn print_goodbye(interrupted: bool) {
    if interrupted {
        println!("\n{}", "Interrupted, context cleared. Goodbye!".yellow());
    } else {
        println!("Goodbye!");
    }
}
