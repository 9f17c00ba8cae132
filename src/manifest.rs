//! # Manifest Writer
//!
//! Each package is written as a pair of files in the output directory:
//!
//! - `<name>.xml`: `<package name="NAME"><scmsync>TEXT</scmsync></package>`,
//!   where `TEXT` is `<remote>#<commit>` for a submodule and the unmodified
//!   remote (already carrying its `subdir`) for a plain directory.
//! - `<name>.info`: the package's commit id and a newline. Plain packages
//!   use the project's own commit.
//!
//! Every file is written to a temporary file in the output directory and
//! renamed over its final name, so a half-written manifest is never visible.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::NamedTempFile;
use xot::Xot;

use crate::error::{Error, Result};
use crate::scanner::Package;

pub const PACKAGE_ELEMENT: &str = "package";
pub const SCMSYNC_ELEMENT: &str = "scmsync";
pub const NAME_ATTRIBUTE: &str = "name";

/// Commit the package resolves to: its own pin, or the project's.
pub fn resolvable_commit<'a>(package: &'a Package, project_head: &'a str) -> &'a str {
    package.head_commit.as_deref().unwrap_or(project_head)
}

/// Text of the `scmsync` element.
pub fn scmsync_text(package: &Package) -> String {
    match &package.head_commit {
        Some(commit) => format!("{}#{}", package.remote_url, commit),
        None => package.remote_url.clone(),
    }
}

/// Render the package descriptor.
pub fn render_xml(package: &Package) -> std::result::Result<String, String> {
    let mut xot = Xot::new();
    let package_name = xot.add_name(PACKAGE_ELEMENT);
    let scmsync_name = xot.add_name(SCMSYNC_ELEMENT);
    let name_attr = xot.add_name(NAME_ATTRIBUTE);

    let root = xot.new_element(package_name);
    xot.attributes_mut(root).insert(name_attr, package.name.clone());
    let scmsync = xot.new_element(scmsync_name);
    let text = xot.new_text(&scmsync_text(package));
    xot.append(scmsync, text).map_err(|e| e.to_string())?;
    xot.append(root, scmsync).map_err(|e| e.to_string())?;
    let document = xot.new_document_with_element(root).map_err(|e| e.to_string())?;

    let mut xml = xot.to_string(document).map_err(|e| e.to_string())?;
    xml.push('\n');
    Ok(xml)
}

/// Write both manifest files for `package` into `outdir`.
pub fn write_package(package: &Package, project_head: &str, outdir: &Path) -> Result<()> {
    let xml_path = outdir.join(format!("{}.xml", package.name));
    let xml = render_xml(package).map_err(|message| Error::ManifestWriteFailed {
        package: package.name.clone(),
        path: xml_path.clone(),
        message,
    })?;
    write_atomic(&package.name, &xml_path, xml.as_bytes())?;

    let info_path = outdir.join(format!("{}.info", package.name));
    let info = format!("{}\n", resolvable_commit(package, project_head));
    write_atomic(&package.name, &info_path, info.as_bytes())?;

    debug!("Wrote manifests for {}", package.name);
    Ok(())
}

/// Write all packages, one after the other.
pub fn write_all(packages: &[Package], project_head: &str, outdir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(outdir).map_err(|e| Error::ManifestWriteFailed {
        package: String::new(),
        path: outdir.to_path_buf(),
        message: format!("cannot create output directory: {}", e),
    })?;
    let mut written = Vec::with_capacity(packages.len() * 2);
    for package in packages {
        write_package(package, project_head, outdir)?;
        written.push(outdir.join(format!("{}.xml", package.name)));
        written.push(outdir.join(format!("{}.info", package.name)));
    }
    Ok(written)
}

/// Write `content` to a sibling temp file and rename it onto `path`.
fn write_atomic(package: &str, path: &Path, content: &[u8]) -> Result<()> {
    let failed = |message: String| Error::ManifestWriteFailed {
        package: package.to_string(),
        path: path.to_path_buf(),
        message,
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(|e| failed(e.to_string()))?;
    file.write_all(content).map_err(|e| failed(e.to_string()))?;
    file.as_file().sync_all().map_err(|e| failed(e.to_string()))?;

    // Temp files are created 0600; manifests are read by other users.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(file.path(), fs::Permissions::from_mode(0o644))
            .map_err(|e| failed(e.to_string()))?;
    }

    file.persist(path).map_err(|e| failed(e.error.to_string()))?;
    Ok(())
}
