//! Git-subprocess change provider (`spec.md` §4.9 "Git").
//!
//! Runs `git merge-base base head` then `git diff --name-only
//! --diff-filter=ACMR merge-base..head` in the project root, exactly as
//! `spec.md` §4.9 specifies — deliberately `std::process::Command` rather
//! than `git2`, since the spec names the literal invocation and flags.
//! Deleted files are excluded by `--diff-filter=ACMR`; renames and copies
//! are included (`A`dded, `C`opied, `M`odified, `R`enamed).

use super::ChangeProvider;
use crate::enrich::{changed_files_from_git, ChangedFiles};
use crate::error::PathfinderError;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::mpsc;
use std::time::Duration;

/// Per-invocation timeout for git subprocess calls (`spec.md` §5).
const GIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Computes changed files via `git merge-base`/`git diff` (`spec.md` §4.9).
pub struct GitChangeProvider {
    /// The repository root `git` is invoked in.
    pub repo_root: PathBuf,
    /// Base ref (e.g. `origin/main`).
    pub base: String,
    /// Head ref (e.g. `HEAD`).
    pub head: String,
}

impl ChangeProvider for GitChangeProvider {
    fn changed_files(&self) -> Result<ChangedFiles, PathfinderError> {
        let merge_base = run_git(&self.repo_root, &["merge-base", &self.base, &self.head])?;
        let merge_base = merge_base.trim();
        if merge_base.is_empty() {
            return Err(invalid_ref_error(&self.base, &self.head));
        }

        let range = format!("{merge_base}..{}", self.head);
        let diff = run_git(
            &self.repo_root,
            &["diff", "--name-only", "--diff-filter=ACMR", &range],
        )?;

        Ok(changed_files_from_git(
            diff.lines().map(str::to_owned).filter(|l| !l.is_empty()),
        ))
    }
}

fn invalid_ref_error(base: &str, head: &str) -> PathfinderError {
    PathfinderError::Vcs(format!(
        "could not resolve merge-base between '{base}' and '{head}'; if this is a shallow \
         clone, fetch with --unshallow or increase fetch-depth so the base ref is reachable"
    ))
}

/// Runs `git <args>` in `cwd`, bounded by [`GIT_TIMEOUT`]. Uses a watchdog
/// thread rather than a crate dependency: `git` is spawned, a helper thread
/// blocks on `wait_with_output`, and the caller `recv_timeout`s on a
/// channel, killing the child if the deadline passes.
fn run_git(cwd: &Path, args: &[&str]) -> Result<String, PathfinderError> {
    let mut child = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| PathfinderError::Vcs(format!("failed to spawn git: {e}")))?;

    let (tx, rx) = mpsc::channel::<std::io::Result<Output>>();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let mut child_for_wait = child;
    std::thread::spawn(move || {
        use std::io::Read;
        let mut out = String::new();
        let mut err = String::new();
        if let Some(mut s) = stdout {
            let _ = s.read_to_string(&mut out);
        }
        if let Some(mut s) = stderr {
            let _ = s.read_to_string(&mut err);
        }
        let status = child_for_wait.wait();
        let result = status.map(|status| Output {
            status,
            stdout: out.into_bytes(),
            stderr: err.into_bytes(),
        });
        let _ = tx.send(result);
    });

    match rx.recv_timeout(GIT_TIMEOUT) {
        Ok(Ok(output)) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(Ok(output)) => Err(PathfinderError::Vcs(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        ))),
        Ok(Err(e)) => Err(PathfinderError::Vcs(format!("git {} failed: {e}", args.join(" ")))),
        Err(_) => Err(PathfinderError::Vcs(format!(
            "git {} timed out after {GIT_TIMEOUT:?}",
            args.join(" ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::tempdir;

    fn git(repo: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(args)
            .current_dir(repo)
            .status()
            .expect("git must be on PATH for this test");
        assert!(status.success(), "git {args:?} failed");
    }

    #[test]
    fn computes_changed_files_between_two_commits() -> anyhow::Result<()> {
        let Ok(_) = StdCommand::new("git").arg("--version").output() else {
            return Ok(()); // no git binary available in this environment
        };

        let temp = tempdir()?;
        let repo = temp.path();
        git(repo, &["init", "-q"]);
        git(repo, &["config", "user.email", "test@example.com"]);
        git(repo, &["config", "user.name", "test"]);

        std::fs::write(repo.join("a.py"), "x = 1\n")?;
        git(repo, &["add", "."]);
        git(repo, &["commit", "-q", "-m", "init"]);
        git(repo, &["branch", "-f", "base"]);

        std::fs::write(repo.join("a.py"), "x = 2\n")?;
        std::fs::write(repo.join("b.py"), "y = 1\n")?;
        git(repo, &["add", "."]);
        git(repo, &["commit", "-q", "-m", "change"]);

        let provider = GitChangeProvider {
            repo_root: repo.to_path_buf(),
            base: "base".to_owned(),
            head: "HEAD".to_owned(),
        };
        let changed = provider.changed_files()?;
        assert!(changed.contains("a.py"));
        assert!(changed.contains("b.py"));
        Ok(())
    }

    #[test]
    fn invalid_ref_surfaces_vcs_error() -> anyhow::Result<()> {
        let Ok(_) = StdCommand::new("git").arg("--version").output() else {
            return Ok(());
        };
        let temp = tempdir()?;
        git(temp.path(), &["init", "-q"]);

        let provider = GitChangeProvider {
            repo_root: temp.path().to_path_buf(),
            base: "nonexistent-ref".to_owned(),
            head: "HEAD".to_owned(),
        };
        assert!(provider.changed_files().is_err());
        Ok(())
    }
}
