//! Thin wrappers around the system `git` command.
//!
//! Using the system binary means authentication works the way the user
//! already configured it:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig
//!
//! Every invocation is polled against a [`Cancellation`] token and killed
//! when it fires. A non-zero exit is not an error at this level; callers
//! decide which failure kind it maps to.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use log::debug;
use semver::Version;

use crate::cancel::Cancellation;
use crate::error::{Error, Result};
use crate::strategy::Depth;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tree entry mode git uses for submodule commits.
const GITLINK_MODE: &str = "160000";

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Run `git` with `args` in `dir`.
///
/// `url` only labels diagnostics.
pub fn run(
    dir: Option<&Path>,
    args: &[String],
    envs: &[(&str, &str)],
    cancel: &Cancellation,
    url: &str,
) -> Result<GitOutput> {
    let command_line = args.join(" ");
    debug!("git {}", command_line);

    if cancel.is_cancelled() {
        return Err(Error::Cancelled {
            url: url.to_string(),
            operation: format!("git {}", command_line),
        });
    }

    let mut command = Command::new("git");
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let mut child = command
        .args(args)
        .envs(envs.iter().copied())
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::GitCommand {
            command: command_line.clone(),
            url: url.to_string(),
            stderr: e.to_string(),
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if cancel.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Cancelled {
                url: url.to_string(),
                operation: format!("git {}", command_line),
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let output = GitOutput {
        success: status.success(),
        stdout: String::from_utf8_lossy(&stdout.join().unwrap_or_default()).into_owned(),
        stderr: String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned(),
    };
    if !output.success {
        debug!("git {} exited with {}: {}", command_line, status, output.stderr.trim());
    }
    Ok(output)
}

/// Read a child pipe to the end on a helper thread so the child never
/// blocks on a full pipe while we poll it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

/// Options for [`clone`].
#[derive(Debug, Clone)]
pub struct CloneOptions<'a> {
    pub depth: Depth,
    pub branch: Option<&'a str>,
    pub all_branches: bool,
    /// Allow `file://` transports for local remotes and submodules.
    pub allow_file: bool,
}

/// Clone `url` into `dest`. Large-file smudging is always skipped here and
/// done explicitly afterwards.
pub fn clone(url: &str, dest: &Path, options: &CloneOptions<'_>, cancel: &Cancellation) -> Result<GitOutput> {
    let mut argv = Vec::new();
    if options.allow_file {
        argv.extend(args(["-c", "protocol.file.allow=always"]));
    }
    argv.extend(args(["clone", "--quiet"]));
    if options.depth == Depth::Shallow {
        argv.push("--depth=1".to_string());
        if options.all_branches {
            argv.push("--no-single-branch".to_string());
        }
    }
    if let Some(branch) = options.branch {
        argv.extend(args(["--branch", branch]));
    }
    argv.push("--".to_string());
    argv.push(url.to_string());
    argv.push(dest.to_string_lossy().into_owned());

    run(None, &argv, &[("GIT_LFS_SKIP_SMUDGE", "1")], cancel, url)
}

/// Check whether `commit` exists as a commit object in the repository.
pub fn has_commit(repo: &Path, commit: &str, cancel: &Cancellation, url: &str) -> Result<bool> {
    let output = run(
        Some(repo),
        &args(["cat-file", "-e", format!("{}^{{commit}}", commit).as_str()]),
        &[],
        cancel,
        url,
    )?;
    Ok(output.success)
}

/// Fetch a single commit by id from `origin`.
pub fn fetch_commit(repo: &Path, commit: &str, shallow: bool, cancel: &Cancellation, url: &str) -> Result<GitOutput> {
    let mut argv = args(["-c", "protocol.file.allow=always", "fetch", "--quiet"]);
    if shallow {
        argv.push("--depth=1".to_string());
    }
    argv.extend(args(["origin", commit]));
    run(Some(repo), &argv, &[("GIT_LFS_SKIP_SMUDGE", "1")], cancel, url)
}

/// Extend the history of every fetched branch by `by` commits.
pub fn deepen(repo: &Path, by: u32, cancel: &Cancellation, url: &str) -> Result<GitOutput> {
    run(
        Some(repo),
        &args([
            "-c".to_string(),
            "protocol.file.allow=always".to_string(),
            "fetch".to_string(),
            "--quiet".to_string(),
            format!("--deepen={}", by),
            "origin".to_string(),
        ]),
        &[("GIT_LFS_SKIP_SMUDGE", "1")],
        cancel,
        url,
    )
}

/// Check out `rev` in detached form.
pub fn checkout_detached(repo: &Path, rev: &str, cancel: &Cancellation, url: &str) -> Result<GitOutput> {
    run(
        Some(repo),
        &args(["-c", "advice.detachedHead=false", "checkout", "--quiet", "--detach", rev]),
        &[("GIT_LFS_SKIP_SMUDGE", "1")],
        cancel,
        url,
    )
}

/// Restrict the working tree to `subdir` using cone-mode sparse checkout.
pub fn sparse_checkout(repo: &Path, subdir: &str, cancel: &Cancellation, url: &str) -> Result<GitOutput> {
    let env = [("GIT_LFS_SKIP_SMUDGE", "1")];
    let init = run(Some(repo), &args(["sparse-checkout", "init", "--cone"]), &env, cancel, url)?;
    if !init.success {
        return Ok(init);
    }
    run(Some(repo), &args(["sparse-checkout", "set", subdir]), &env, cancel, url)
}

/// Initialize and update submodules recursively to the commits recorded by
/// the containing tree. `paths` limits the update to those pathspecs.
pub fn submodule_update(
    repo: &Path,
    paths: &[&str],
    allow_file: bool,
    cancel: &Cancellation,
    url: &str,
) -> Result<GitOutput> {
    let mut argv = Vec::new();
    if allow_file {
        argv.extend(args(["-c", "protocol.file.allow=always"]));
    }
    argv.extend(args(["submodule", "--quiet", "update", "--init", "--recursive"]));
    if !paths.is_empty() {
        argv.push("--".to_string());
        argv.extend(args(paths.iter().copied()));
    }
    run(Some(repo), &argv, &[("GIT_LFS_SKIP_SMUDGE", "1")], cancel, url)
}

/// Download and materialize large-file content, optionally inside every
/// submodule as well.
pub fn lfs_pull(repo: &Path, recursive: bool, cancel: &Cancellation, url: &str) -> Result<GitOutput> {
    let output = run(Some(repo), &args(["lfs", "pull"]), &[], cancel, url)?;
    if !output.success || !recursive {
        return Ok(output);
    }
    run(
        Some(repo),
        &args(["submodule", "--quiet", "foreach", "--recursive", "git lfs pull"]),
        &[],
        cancel,
        url,
    )
}

/// The commit currently checked out.
pub fn head_commit(repo: &Path, cancel: &Cancellation, url: &str) -> Result<String> {
    let output = run(Some(repo), &args(["rev-parse", "HEAD"]), &[], cancel, url)?;
    if !output.success {
        return Err(Error::GitCommand {
            command: "rev-parse HEAD".to_string(),
            url: url.to_string(),
            stderr: output.stderr,
        });
    }
    Ok(output.stdout.trim().to_string())
}

/// Whether the repository has truncated history.
pub fn is_shallow(repo: &Path, cancel: &Cancellation, url: &str) -> Result<bool> {
    let output = run(
        Some(repo),
        &args(["rev-parse", "--is-shallow-repository"]),
        &[],
        cancel,
        url,
    )?;
    if !output.success {
        return Err(Error::GitCommand {
            command: "rev-parse --is-shallow-repository".to_string(),
            url: url.to_string(),
            stderr: output.stderr,
        });
    }
    Ok(output.stdout.trim() == "true")
}

/// Submodule commits pinned by `HEAD` directly below `prefix` (the
/// repository root when `None`), keyed by path relative to the root.
pub fn gitlinks(
    repo: &Path,
    prefix: Option<&str>,
    cancel: &Cancellation,
    url: &str,
) -> Result<BTreeMap<String, String>> {
    let mut argv = args(["ls-tree", "-z", "HEAD"]);
    if let Some(prefix) = prefix {
        argv.push("--".to_string());
        argv.push(format!("{}/", prefix.trim_end_matches('/')));
    }
    let output = run(Some(repo), &argv, &[], cancel, url)?;
    if !output.success {
        return Err(Error::GitCommand {
            command: argv.join(" "),
            url: url.to_string(),
            stderr: output.stderr,
        });
    }
    Ok(parse_ls_tree_gitlinks(&output.stdout))
}

/// Pick the gitlink entries out of `git ls-tree -z` output.
///
/// Each record is `<mode> SP <type> SP <object> TAB <path>` terminated by NUL.
pub fn parse_ls_tree_gitlinks(output: &str) -> BTreeMap<String, String> {
    output
        .split('\0')
        .filter_map(|record| {
            let (meta, path) = record.split_once('\t')?;
            let mut fields = meta.split(' ');
            let mode = fields.next()?;
            let _kind = fields.next()?;
            let object = fields.next()?;
            (mode == GITLINK_MODE).then(|| (path.to_string(), object.to_string()))
        })
        .collect()
}

/// The installed git version, if it can be determined.
pub fn version(cancel: &Cancellation) -> Result<Option<Version>> {
    let output = run(None, &args(["--version"]), &[], cancel, "git")?;
    Ok(output.success.then(|| parse_git_version(&output.stdout)).flatten())
}

/// Parse `git --version` output such as `git version 2.43.0` or
/// `git version 2.39.3 (Apple Git-146)` into a semantic version.
pub fn parse_git_version(output: &str) -> Option<Version> {
    let raw = output.trim().strip_prefix("git version ")?;
    let raw = raw.split_whitespace().next()?;
    let mut numbers = raw.split('.').map_while(|part| part.parse::<u64>().ok());
    let major = numbers.next()?;
    let minor = numbers.next().unwrap_or(0);
    let patch = numbers.next().unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// True if the clone failed because the requested branch or tag does not
/// exist upstream.
pub fn is_missing_ref(stderr: &str) -> bool {
    stderr.contains("not found in upstream")
        || stderr.contains("couldn't find remote ref")
        || stderr.contains("not our ref")
}

/// Turn clone stderr into a diagnostic, with a pointer at credentials for
/// the common auth failures.
pub fn describe_clone_failure(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.contains("Authentication failed")
        || stderr.contains("Permission denied")
        || stderr.contains("Could not read from remote repository")
    {
        format!(
            "Authentication failed. Make sure you have access to the repository.\n\
            For private repos, ensure you have:\n\
            - SSH key added to ssh-agent\n\
            - Git credentials configured\n\
            - Personal access token set up\n\
            Error: {}",
            stderr
        )
    } else {
        stderr.to_string()
    }
}
