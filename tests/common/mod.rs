//! Shared test utilities for the end-to-end tests.
//!
//! The fixtures build small git repositories on the local filesystem so the
//! binary can be exercised through `file://` URLs without network access.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let Some(fixture) = GitFixture::new() else { return };
//!     let repo = fixture.repo("pkg", &[("pkg.spec", "Name: pkg\n")]);
//!     // ... run the binary against fixture.url(&repo)
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::GitFixture;
}

/// Identity and transport settings applied to every fixture git call.
const GIT_CONFIG: &[&str] = &[
    "-c",
    "user.name=scm-bridge tests",
    "-c",
    "user.email=tests@example.com",
    "-c",
    "protocol.file.allow=always",
    "-c",
    "init.defaultBranch=main",
    "-c",
    "commit.gpgsign=false",
];

/// Whether a usable `git` is on the `PATH`.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking with its stderr on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(GIT_CONFIG)
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A directory of source repositories plus an output area.
pub struct GitFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl GitFixture {
    /// Create a fixture, or `None` when git is not installed.
    pub fn new() -> Option<Self> {
        if !git_available() {
            eprintln!("git not found, skipping");
            return None;
        }
        Some(Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        })
    }

    /// Directory that holds the source repositories.
    pub fn sources(&self) -> PathBuf {
        self.temp_dir.path().join("src/rpms")
    }

    /// A path below the fixture for the binary to write into.
    pub fn out(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join("out").join(name)
    }

    /// `file://` URL of a repository.
    pub fn url(&self, repo: &Path) -> String {
        format!("file://{}", repo.display())
    }

    /// Create a repository named `name` with one commit holding `files`.
    pub fn repo(&self, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let path = self.sources().join(name);
        fs::create_dir_all(&path).expect("Failed to create repository directory");
        git(&path, &["init", "--quiet"]);
        self.commit(&path, files, "initial");
        path
    }

    /// Like [`GitFixture::repo`] but with SHA-256 object ids. `None` when the
    /// installed git cannot create such repositories.
    pub fn sha256_repo(&self, name: &str, files: &[(&str, &str)]) -> Option<PathBuf> {
        let path = self.sources().join(name);
        fs::create_dir_all(&path).expect("Failed to create repository directory");
        let supported = Command::new("git")
            .args(["init", "--quiet", "--object-format=sha256"])
            .current_dir(&path)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if !supported {
            eprintln!("git cannot create sha256 repositories, skipping");
            return None;
        }
        self.commit(&path, files, "initial");
        Some(path)
    }

    /// Write `files` into `repo` and commit them. Returns the new commit id.
    pub fn commit(&self, repo: &Path, files: &[(&str, &str)], message: &str) -> String {
        for (name, content) in files {
            let file = repo.join(name);
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent).expect("Failed to create directory");
            }
            fs::write(&file, content).expect("Failed to write file");
        }
        git(repo, &["add", "--all"]);
        git(repo, &["commit", "--quiet", "--allow-empty", "-m", message]);
        self.head(repo)
    }

    /// Commit id at `HEAD` of `repo`.
    pub fn head(&self, repo: &Path) -> String {
        git(repo, &["rev-parse", "HEAD"])
    }

    /// Root commit of `repo`.
    pub fn first_commit(&self, repo: &Path) -> String {
        git(repo, &["rev-list", "--max-parents=0", "HEAD"])
    }

    /// Register `url` as a submodule at `path` of `repo` and commit it.
    pub fn add_submodule(&self, repo: &Path, url: &str, path: &str) {
        git(repo, &["submodule", "--quiet", "add", url, path]);
        git(repo, &["commit", "--quiet", "-m", &format!("add {}", path)]);
    }

    /// A project with one submodule given by a relative URL, one given by
    /// an absolute URL and one plain directory. Returns the project path.
    pub fn ring0(&self) -> PathBuf {
        self.repo("libeconf", &[("libeconf.spec", "Name: libeconf\n")]);
        let aaa_base = self.repo("aaa_base", &[("aaa_base.spec", "Name: aaa_base\n")]);
        let ring0 = self.repo("ring0", &[("README", "ring0\n"), ("docs/index.md", "# ring0\n")]);

        self.add_submodule(&ring0, "../libeconf", "libeconf");
        self.add_submodule(&ring0, &self.url(&aaa_base), "aaa_base");
        ring0
    }

    /// A project made of plain package directories.
    pub fn proj(&self) -> PathBuf {
        self.repo(
            "proj",
            &[
                ("README.md", "packages\n"),
                ("pkg-a/pkg-a.spec", "Name: pkg-a\n"),
                ("pkg-b/pkg-b.spec", "Name: pkg-b\n"),
            ],
        )
    }

    /// Every file below `dir` outside `.git`, as sorted relative paths with
    /// their contents.
    pub fn tree(&self, dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<(String, Vec<u8>)> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
            .map(|e| e.expect("Failed to walk directory"))
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let relative = e.path().strip_prefix(dir).expect("Entry below root");
                let content = fs::read(e.path()).expect("Failed to read file");
                (relative.to_string_lossy().into_owned(), content)
            })
            .collect();
        files.sort();
        files
    }

    /// Sorted file names directly inside `dir`.
    pub fn listing(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("Failed to read directory")
            .map(|e| e.expect("Failed to read entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_repo_has_commit() {
        let Some(fixture) = GitFixture::new() else {
            return;
        };
        let repo = fixture.repo("one", &[("a.txt", "a\n")]);
        assert_eq!(fixture.head(&repo).len(), 40);
        assert!(repo.join("a.txt").is_file());
    }
}
