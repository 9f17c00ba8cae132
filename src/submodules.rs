//! Submodule registry.
//!
//! Reads a checkout's `.gitmodules` once into an immutable lookup table
//! keyed by submodule path. Relative submodule URLs (`./x`, `../x`) are
//! resolved against the containing project's URL the same way git does:
//! the project URL is treated as a directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ini::Ini;
use log::warn;
use url::Url;

use crate::error::{Error, Result};
use crate::reference::Target;

/// File that lists a repository's submodules.
pub const GITMODULES: &str = ".gitmodules";

/// One `[submodule "..."]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleEntry {
    pub name: String,
    pub path: String,
    /// The URL as written in `.gitmodules`, possibly relative.
    pub url: String,
}

/// Path-keyed view of a `.gitmodules` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmoduleRegistry {
    by_path: BTreeMap<String, SubmoduleEntry>,
}

impl SubmoduleRegistry {
    /// Load the registry of the checkout at `worktree`. A missing
    /// `.gitmodules` yields an empty registry.
    pub fn load(worktree: &Path, target: &Target) -> Result<Self> {
        let path = worktree.join(GITMODULES);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::parse(&content).map_err(|message| Error::SubmoduleResolutionFailed {
            url: target.clone_url().to_string(),
            r#ref: target.ref_spec().to_string(),
            message: format!("cannot parse {}: {}", GITMODULES, message),
        })
    }

    /// Parse `.gitmodules` content.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let ini = Ini::load_from_str(content).map_err(|e| e.to_string())?;
        let mut by_path = BTreeMap::new();
        for (section, properties) in ini.iter() {
            let Some(name) = section.and_then(submodule_name) else {
                continue;
            };
            match (properties.get("path"), properties.get("url")) {
                (Some(path), Some(url)) => {
                    let path = path.trim_end_matches('/').to_string();
                    by_path.insert(
                        path.clone(),
                        SubmoduleEntry {
                            name: name.to_string(),
                            path,
                            url: url.to_string(),
                        },
                    );
                }
                _ => warn!("Ignoring submodule '{}' without both path and url", name),
            }
        }
        Ok(Self { by_path })
    }

    pub fn get(&self, path: &str) -> Option<&SubmoduleEntry> {
        self.by_path.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubmoduleEntry> {
        self.by_path.values()
    }
}

/// Extract `name` from a section header `submodule "name"`.
fn submodule_name(section: &str) -> Option<&str> {
    let rest = section.trim().strip_prefix("submodule")?;
    let name = rest.trim().trim_matches('"');
    (!name.is_empty()).then_some(name)
}

/// Resolve a submodule URL against the containing project's URL.
pub fn resolve_remote(url: &str, project_url: &str) -> std::result::Result<String, String> {
    if !(url.starts_with("./") || url.starts_with("../")) {
        return Ok(url.to_string());
    }
    let base = format!("{}/", project_url.trim_end_matches('/'));
    let base = Url::parse(&base).map_err(|e| format!("invalid project url '{}': {}", project_url, e))?;
    let resolved = base
        .join(url)
        .map_err(|e| format!("cannot resolve '{}' against '{}': {}", url, project_url, e))?;
    Ok(resolved.as_str().trim_end_matches('/').to_string())
}
