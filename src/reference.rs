//! # Source Reference Parsing
//!
//! Turns a raw source reference of the form
//!
//! ```text
//! scheme://host/path[?subdir=<relpath>][&lfs=<0|1>][#<ref-or-commit>]
//! ```
//!
//! into a [`Target`]. The fragment selects what to check out: nothing
//! (the remote's default branch), a full 40 character lowercase commit id,
//! or any other branch or tag name. The commit/ref decision is made purely
//! on the shape of the fragment, so a ref whose name is 40 hex digits is
//! always read as a commit.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use url::Url;

/// Characters escaped in a `subdir` value so it reads back unchanged.
/// `+` is left alone: it is common in package names and never means a space.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'<')
    .add(b'>');

use crate::error::{Error, Result};

/// URL schemes that can be cloned.
pub const SUPPORTED_SCHEMES: &[&str] = &["file", "http", "https", "ssh", "git"];

static COMMIT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^[0-9a-f]{40}$").expect("commit id pattern is valid")
});

static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("^(?:[0-9a-f]{40}|[0-9a-f]{64})$").expect("object id pattern is valid")
});

/// Returns true if `value` is exactly 40 lowercase hexadecimal characters.
pub fn is_commit_id(value: &str) -> bool {
    COMMIT_ID.is_match(value)
}

/// Returns true if `value` looks like a full SHA-1 or SHA-256 object id.
///
/// Only the SHA-1 form is classified as [`RefSpec::Commit`]; a SHA-256 id
/// stays a named ref and is resolved by fetching it once `--branch` fails.
pub fn is_object_id(value: &str) -> bool {
    OBJECT_ID.is_match(value)
}

/// What to check out once the repository is cloned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefSpec {
    /// Stay on the remote's default branch.
    Unspecified,
    /// A branch or tag name.
    NamedRef(String),
    /// A full commit id.
    Commit(String),
}

impl RefSpec {
    /// Classify a URL fragment.
    pub fn from_fragment(fragment: Option<&str>) -> Self {
        match fragment {
            None | Some("") => RefSpec::Unspecified,
            Some(value) if is_commit_id(value) => RefSpec::Commit(value.to_string()),
            Some(value) => RefSpec::NamedRef(value.to_string()),
        }
    }
}

impl fmt::Display for RefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefSpec::Unspecified => f.write_str("HEAD"),
            RefSpec::NamedRef(name) => f.write_str(name),
            RefSpec::Commit(id) => f.write_str(id),
        }
    }
}

/// Large-file storage policy selected by the `lfs` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfsMode {
    /// Materialize large files when the repository uses LFS.
    #[default]
    Auto,
    /// Always run the LFS download.
    ForceOn,
    /// Leave pointer files in place.
    ForceOff,
}

/// A parsed source reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    source: Url,
    clone_url: String,
    subdir: Option<String>,
    ref_spec: RefSpec,
    lfs_mode: LfsMode,
}

impl Target {
    /// The URL handed to `git clone`: the reference without query or fragment.
    pub fn clone_url(&self) -> &str {
        &self.clone_url
    }

    /// Relative path inside the repository, if one was requested.
    pub fn subdir(&self) -> Option<&str> {
        self.subdir.as_deref()
    }

    pub fn ref_spec(&self) -> &RefSpec {
        &self.ref_spec
    }

    pub fn lfs_mode(&self) -> LfsMode {
        self.lfs_mode
    }

    /// The reference as originally given, normalized by URL parsing.
    pub fn source(&self) -> &Url {
        &self.source
    }

    /// Build the reference of a package that lives at `subdir` inside this
    /// repository.
    ///
    /// The `subdir` query parameter is replaced (or added first when absent),
    /// all other query parameters and the fragment are kept as given.
    pub fn with_subdir(&self, subdir: &str) -> String {
        let mut url = self.source.clone();
        let param = format!("subdir={}", utf8_percent_encode(subdir, QUERY_VALUE));
        let mut pairs = vec![param.clone()];
        let mut replaced = false;
        if let Some(query) = self.source.query() {
            pairs.clear();
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let key = pair.split('=').next().unwrap_or_default();
                if percent_decode_str(key).decode_utf8_lossy() == "subdir" {
                    pairs.push(param.clone());
                    replaced = true;
                } else {
                    pairs.push(pair.to_string());
                }
            }
            if !replaced {
                pairs.insert(0, param);
            }
        }
        url.set_query(Some(&pairs.join("&")));
        url.to_string()
    }
}

/// Split a query string into decoded `key=value` pairs.
///
/// Only percent escapes are decoded. Unlike form decoding, `+` stays a
/// literal plus so `subdir=gtk+` names the `gtk+` directory.
fn query_params(query: &str) -> impl Iterator<Item = (Cow<'_, str>, Cow<'_, str>)> {
    query.split('&').filter(|p| !p.is_empty()).map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (
            percent_decode_str(key).decode_utf8_lossy(),
            percent_decode_str(value).decode_utf8_lossy(),
        )
    })
}

/// Parse a raw reference string into a [`Target`].
pub fn parse(reference: &str) -> Result<Target> {
    let invalid = |message: String| Error::InvalidReference {
        reference: reference.to_string(),
        message,
    };

    let source = Url::parse(reference.trim()).map_err(|e| invalid(e.to_string()))?;

    if !SUPPORTED_SCHEMES.contains(&source.scheme()) {
        return Err(Error::UnsupportedScheme {
            scheme: source.scheme().to_string(),
            reference: reference.to_string(),
        });
    }

    let mut subdir = None;
    let mut lfs_mode = LfsMode::Auto;
    for (key, value) in query_params(source.query().unwrap_or_default()) {
        match key.as_ref() {
            "subdir" => {
                if subdir.is_some() {
                    return Err(invalid("subdir given more than once".to_string()));
                }
                subdir = Some(normalize_subdir(&value).map_err(invalid)?);
            }
            "lfs" => {
                lfs_mode = match value.as_ref() {
                    "1" => LfsMode::ForceOn,
                    "0" => LfsMode::ForceOff,
                    other => return Err(invalid(format!("lfs must be 0 or 1, got '{}'", other))),
                };
            }
            _ => {}
        }
    }

    let ref_spec = RefSpec::from_fragment(source.fragment());

    let mut bare = source.clone();
    bare.set_query(None);
    bare.set_fragment(None);

    Ok(Target {
        clone_url: bare.to_string(),
        source,
        subdir,
        ref_spec,
        lfs_mode,
    })
}

/// Validate a `subdir` value and return it with empty and `.` segments
/// removed.
fn normalize_subdir(value: &str) -> std::result::Result<String, String> {
    if value.starts_with('/') {
        return Err(format!("subdir must be a relative path, got '{}'", value));
    }
    let mut segments = Vec::new();
    for segment in value.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(format!("subdir must not contain '..', got '{}'", value)),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err("subdir must not be empty".to_string());
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SHA: &str = "892dc9b83009c859ecfde218566a242241b95ad7";

    #[test]
    fn test_parse_plain_https() {
        let target = parse("https://github.com/openSUSE/libeconf").unwrap();
        assert_eq!(target.clone_url(), "https://github.com/openSUSE/libeconf");
        assert_eq!(target.subdir(), None);
        assert_eq!(target.ref_spec(), &RefSpec::Unspecified);
        assert_eq!(target.lfs_mode(), LfsMode::Auto);
    }

    #[test]
    fn test_parse_commit_fragment() {
        let target = parse(&format!("https://github.com/openSUSE/libeconf#{}", SHA)).unwrap();
        assert_eq!(target.ref_spec(), &RefSpec::Commit(SHA.to_string()));
        assert_eq!(target.clone_url(), "https://github.com/openSUSE/libeconf");
    }

    #[test]
    fn test_parse_named_ref_fragments() {
        for name in ["main", "master", "v0.4.5", "feature/x"] {
            let target = parse(&format!("https://example.com/r#{}", name)).unwrap();
            assert_eq!(target.ref_spec(), &RefSpec::NamedRef(name.to_string()));
        }
    }

    #[test]
    fn test_uppercase_or_short_hex_is_named_ref() {
        let upper = SHA.to_uppercase();
        let target = parse(&format!("https://example.com/r#{}", upper)).unwrap();
        assert_eq!(target.ref_spec(), &RefSpec::NamedRef(upper));

        let target = parse("https://example.com/r#892dc9b").unwrap();
        assert_eq!(target.ref_spec(), &RefSpec::NamedRef("892dc9b".to_string()));
    }

    #[test]
    fn test_empty_fragment_is_unspecified() {
        let target = parse("https://example.com/r#").unwrap();
        assert_eq!(target.ref_spec(), &RefSpec::Unspecified);
    }

    #[test]
    fn test_parse_subdir_and_lfs() {
        let target = parse("https://example.com/r?subdir=test&lfs=0#main").unwrap();
        assert_eq!(target.subdir(), Some("test"));
        assert_eq!(target.lfs_mode(), LfsMode::ForceOff);
        assert_eq!(target.clone_url(), "https://example.com/r");

        let target = parse("https://example.com/r?lfs=1").unwrap();
        assert_eq!(target.lfs_mode(), LfsMode::ForceOn);
    }

    #[test]
    fn test_subdir_normalization() {
        let target = parse("file:///src/proj?subdir=./pkgs//a/").unwrap();
        assert_eq!(target.subdir(), Some("pkgs/a"));
    }

    #[test]
    fn test_subdir_parent_traversal_rejected() {
        for bad in ["../x", "a/../b", "a/..", "/abs", ""] {
            let err = parse(&format!("https://example.com/r?subdir={}", bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidReference, "subdir={}", bad);
        }
    }

    #[test]
    fn test_duplicate_subdir_rejected() {
        let err = parse("https://example.com/r?subdir=a&subdir=b").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
    }

    #[test]
    fn test_bad_lfs_value_rejected() {
        let err = parse("https://example.com/r?lfs=yes").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = parse("ftp://example.com/r").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedScheme);
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_not_a_url() {
        let err = parse("git@github.com:openSUSE/libeconf.git").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidReference);
    }

    #[test]
    fn test_supported_schemes() {
        for scheme in SUPPORTED_SCHEMES {
            let reference = format!("{}://host/path", scheme);
            assert!(parse(&reference).is_ok(), "{}", reference);
        }
        assert_eq!(
            parse("file:///src/rpms/ring0").unwrap().clone_url(),
            "file:///src/rpms/ring0"
        );
    }

    #[test]
    fn test_with_subdir_plain_url() {
        let target = parse("file:///src/rpms/proj").unwrap();
        assert_eq!(
            target.with_subdir("aaa_base"),
            "file:///src/rpms/proj?subdir=aaa_base"
        );
    }

    #[test]
    fn test_with_subdir_keeps_fragment_and_other_query() {
        let target = parse("https://example.com/proj?lfs=0#main").unwrap();
        assert_eq!(
            target.with_subdir("libeconf"),
            "https://example.com/proj?subdir=libeconf&lfs=0#main"
        );
    }

    #[test]
    fn test_with_subdir_replaces_existing() {
        let target = parse("https://example.com/proj?lfs=1&subdir=pkgs").unwrap();
        assert_eq!(
            target.with_subdir("pkgs/a"),
            "https://example.com/proj?lfs=1&subdir=pkgs/a"
        );
    }

    #[test]
    fn test_plus_in_subdir_is_literal() {
        let target = parse("https://example.com/proj.git?subdir=gtk+").unwrap();
        assert_eq!(target.subdir(), Some("gtk+"));

        let target = parse("https://example.com/proj.git?subdir=gtk%2B3").unwrap();
        assert_eq!(target.subdir(), Some("gtk+3"));
    }

    #[test]
    fn test_with_subdir_keeps_plus_and_escapes_separators() {
        let target = parse("https://example.com/proj#main").unwrap();
        let derived = target.with_subdir("libsigc++2");
        assert_eq!(derived, "https://example.com/proj?subdir=libsigc++2#main");
        assert_eq!(parse(&derived).unwrap().subdir(), Some("libsigc++2"));

        let derived = target.with_subdir("a&b");
        assert_eq!(derived, "https://example.com/proj?subdir=a%26b#main");
        assert_eq!(parse(&derived).unwrap().subdir(), Some("a&b"));
    }

    #[test]
    fn test_ref_spec_display() {
        assert_eq!(RefSpec::Unspecified.to_string(), "HEAD");
        assert_eq!(RefSpec::NamedRef("main".into()).to_string(), "main");
        assert_eq!(RefSpec::Commit(SHA.into()).to_string(), SHA);
    }
}
