//! Site data components and `--components` parsing.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of site data that can be backed up, restored or synced on
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "codebase")]
    Codebase,
    #[serde(rename = "database")]
    Database,
    #[serde(rename = "public files")]
    PublicFiles,
    #[serde(rename = "private files")]
    PrivateFiles,
    #[serde(rename = "themes")]
    Themes,
}

impl Component {
    pub const ALL: [Component; 5] = [
        Component::Codebase,
        Component::Database,
        Component::PublicFiles,
        Component::PrivateFiles,
        Component::Themes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Codebase => "codebase",
            Component::Database => "database",
            Component::PublicFiles => "public files",
            Component::PrivateFiles => "private files",
            Component::Themes => "themes",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Component {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::config(format!("Unknown component: {}", s)))
    }
}

/// Parse a comma separated component list, keeping the given order and
/// dropping repeated names.
///
/// Every unrecognised name is reported at once. An empty input yields an
/// empty list, which callers read as "no restriction".
pub fn parse_components(input: &str) -> Result<Vec<Component>> {
    let mut components = Vec::new();
    let mut unknown = Vec::new();

    for name in input.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name.parse::<Component>() {
            Ok(component) => {
                if !components.contains(&component) {
                    components.push(component);
                }
            }
            Err(_) => unknown.push(name.to_string()),
        }
    }

    if !unknown.is_empty() {
        let allowed: Vec<&str> = Component::ALL.iter().map(Component::as_str).collect();
        return Err(Error::config(format!(
            "Unsupported component(s): {}. Allowed components: {}",
            unknown.join(", "),
            allowed.join(", ")
        )));
    }

    Ok(components)
}

/// Join components for display and for API payloads.
pub fn join(components: &[Component]) -> String {
    components
        .iter()
        .map(Component::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Same members regardless of order.
pub fn same_set(a: &[Component], b: &[Component]) -> bool {
    a.iter().all(|c| b.contains(c)) && b.iter().all(|c| a.contains(c))
}

/// Every member of `subset` is in `superset`.
pub fn is_subset(subset: &[Component], superset: &[Component]) -> bool {
    subset.iter().all(|c| superset.contains(c))
}
