use std::fmt;
use std::path::{Component, Path};

/// Characters that never appear in a value handed to the runner, even though
/// no shell is involved.
const FORBIDDEN_CHARS: &[char] = &[';', '&', '|', '`', '$', '<', '>', '\\', '"', '\''];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathRejection {
    Empty,
    Absolute,
    Traversal,
    LeadingDash,
    UnsafeChar(char),
    BadSelector,
    NotFound,
    Escapes,
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("path is empty"),
            Self::Absolute => f.write_str("absolute paths are not allowed; use a project-relative path"),
            Self::Traversal => f.write_str("'..' segments are not allowed; stay inside the project root"),
            Self::LeadingDash => f.write_str("value must not start with '-'"),
            Self::UnsafeChar(ch) => write!(f, "character {ch:?} is not allowed"),
            Self::BadSelector => f.write_str("node id selector segments must not be empty"),
            Self::NotFound => f.write_str("path does not exist under the project root"),
            Self::Escapes => f.write_str("path resolves outside the project root"),
        }
    }
}

/// A project-relative test selection: a normalized path plus an optional
/// `::Class::test[param]` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    path: String,
    selector: Option<String>,
}

impl TestTarget {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    pub fn render(&self) -> String {
        match &self.selector {
            Some(selector) => format!("{}::{}", self.path, selector),
            None => self.path.clone(),
        }
    }
}

pub(crate) fn resolve_target(root: &Path, raw: &str) -> Result<TestTarget, PathRejection> {
    let (path_part, selector) = match raw.split_once("::") {
        Some((path, selector)) => (path, Some(selector)),
        None => (raw, None),
    };
    let path = resolve_project_path(root, path_part)?;
    let selector = match selector {
        Some(selector) => Some(check_selector(selector)?),
        None => None,
    };
    Ok(TestTarget { path, selector })
}

/// Lexically normalizes `raw`, then confirms the canonical location stays
/// under `root`. `root` must already be canonical.
pub(crate) fn resolve_project_path(root: &Path, raw: &str) -> Result<String, PathRejection> {
    if raw.trim().is_empty() {
        return Err(PathRejection::Empty);
    }
    if raw.starts_with('-') {
        return Err(PathRejection::LeadingDash);
    }
    check_chars(raw)?;

    let mut parts: Vec<&str> = Vec::new();
    for component in Path::new(raw).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return Err(PathRejection::Absolute),
            Component::ParentDir => return Err(PathRejection::Traversal),
            Component::CurDir => {}
            Component::Normal(part) => {
                let part = part.to_str().ok_or(PathRejection::UnsafeChar('\u{fffd}'))?;
                parts.push(part);
            }
        }
    }
    let normalized = if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    };

    let candidate = root.join(&normalized);
    let canonical = candidate
        .canonicalize()
        .map_err(|_| PathRejection::NotFound)?;
    if !canonical.starts_with(root) {
        return Err(PathRejection::Escapes);
    }
    Ok(normalized)
}

fn check_selector(selector: &str) -> Result<String, PathRejection> {
    if selector.split("::").any(|segment| segment.trim().is_empty()) {
        return Err(PathRejection::BadSelector);
    }
    check_chars(selector)?;
    Ok(selector.to_string())
}

fn check_chars(value: &str) -> Result<(), PathRejection> {
    match value
        .chars()
        .find(|ch| ch.is_control() || FORBIDDEN_CHARS.contains(ch))
    {
        Some(ch) => Err(PathRejection::UnsafeChar(ch)),
        None => Ok(()),
    }
}
