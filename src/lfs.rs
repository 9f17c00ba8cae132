//! Large-file storage detection.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

/// First line of every LFS pointer file.
pub const POINTER_HEADER: &str = "version https://git-lfs.github.com/spec/v1";

/// Whether any `.gitattributes` in the checkout routes paths through the
/// LFS filter.
pub fn uses_lfs(worktree: &Path) -> bool {
    WalkDir::new(worktree)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == ".gitattributes")
        .any(|e| {
            fs::read_to_string(e.path())
                .map(|content| declares_lfs(&content))
                .unwrap_or(false)
        })
}

fn declares_lfs(attributes: &str) -> bool {
    attributes
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .any(|line| line.split_whitespace().any(|attr| attr == "filter=lfs"))
}

/// Whether `content` is an LFS pointer rather than the real payload.
pub fn is_pointer(content: &[u8]) -> bool {
    content.starts_with(POINTER_HEADER.as_bytes())
}
