use crate::errors::NavigationError;
use std::fmt;
use std::str::FromStr;

/// One `role[identifier]` step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathComponent {
    pub role: String,
    /// Title or `AXIdentifier` to match; `None` matches by role only.
    pub identifier: Option<String>,
}

impl PathComponent {
    pub fn new(role: impl Into<String>, identifier: Option<String>) -> Self {
        Self {
            role: role.into(),
            identifier,
        }
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(identifier) => write!(f, "{}[{}]", self.role, identifier),
            None => f.write_str(&self.role),
        }
    }
}

/// Slash-delimited element path, e.g. `window[Main]/group/button[OK]`.
///
/// Identifiers may contain `/` since brackets are scanned before slashes.
/// A path always has at least one component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathExpression {
    components: Vec<PathComponent>,
}

impl PathExpression {
    pub fn new(components: Vec<PathComponent>) -> Result<Self, NavigationError> {
        if components.is_empty() {
            return Err(NavigationError::InvalidSelector(
                "path must have at least one component".to_string(),
            ));
        }
        Ok(Self { components })
    }

    pub fn parse(input: &str) -> Result<Self, NavigationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(NavigationError::InvalidSelector("empty path".to_string()));
        }

        let mut components = Vec::new();
        let mut role = String::new();
        let mut identifier: Option<String> = None;
        let mut chars = input.chars();

        while let Some(c) = chars.next() {
            match c {
                '[' => {
                    if identifier.is_some() {
                        return Err(invalid(input, "a component can only have one [identifier]"));
                    }
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(invalid(input, "unclosed '['"));
                    }
                    identifier = Some(inner);
                }
                ']' => return Err(invalid(input, "unexpected ']'")),
                '/' => {
                    components.push(finish_component(input, &mut role, &mut identifier)?);
                }
                c if c.is_whitespace() && identifier.is_some() => {}
                c => {
                    if identifier.is_some() {
                        return Err(invalid(input, "text after ']' must be followed by '/'"));
                    }
                    role.push(c);
                }
            }
        }
        components.push(finish_component(input, &mut role, &mut identifier)?);

        Self::new(components)
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

fn finish_component(
    input: &str,
    role: &mut String,
    identifier: &mut Option<String>,
) -> Result<PathComponent, NavigationError> {
    let trimmed = role.trim();
    if trimmed.is_empty() {
        return Err(invalid(input, "every component needs a role"));
    }
    let component = PathComponent::new(trimmed, identifier.take());
    role.clear();
    Ok(component)
}

fn invalid(input: &str, reason: &str) -> NavigationError {
    NavigationError::InvalidSelector(format!("{input:?}: {reason}"))
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl FromStr for PathExpression {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How the user points at a single element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementSelector {
    /// Position among the children of the current root.
    Index(usize),
    /// Session ID from the last tree display, written `#N`.
    SessionId(usize),
    Path(PathExpression),
}

impl ElementSelector {
    pub fn parse(input: &str) -> Result<Self, NavigationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(NavigationError::InvalidSelector(
                "empty selector".to_string(),
            ));
        }
        if let Some(id) = input.strip_prefix('#') {
            return id
                .parse::<usize>()
                .map(ElementSelector::SessionId)
                .map_err(|_| invalid(input, "expected a number after '#'"));
        }
        if input.chars().all(|c| c.is_ascii_digit()) {
            return input
                .parse::<usize>()
                .map(ElementSelector::Index)
                .map_err(|_| invalid(input, "index is too large"));
        }
        PathExpression::parse(input).map(ElementSelector::Path)
    }
}

impl fmt::Display for ElementSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementSelector::Index(index) => write!(f, "{index}"),
            ElementSelector::SessionId(id) => write!(f, "#{id}"),
            ElementSelector::Path(path) => write!(f, "{path}"),
        }
    }
}

impl FromStr for ElementSelector {
    type Err = NavigationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
