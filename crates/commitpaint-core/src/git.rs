use crate::config::{Author, Config};
use crate::error::{PaintError, Result};
use crate::paths;
use crate::schedule::CommitDirective;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// ---------------------------------------------------------------------------
// VersionControl
// ---------------------------------------------------------------------------

/// The operations a generation run needs from a repository.
///
/// Every method takes `&mut self`: a run holds the only handle to the
/// working tree and branch tip for its whole duration.
pub trait VersionControl {
    /// Check out `branch`, creating it when it does not exist yet.
    fn ensure_branch(&mut self, branch: &str) -> Result<()>;

    /// Make a trivial tracked change so the next commit has content.
    fn stage_change(&mut self, directive: &CommitDirective) -> Result<()>;

    /// Record the staged change with author and committer dates set to the
    /// directive's timestamp.
    fn commit(&mut self, directive: &CommitDirective) -> Result<()>;
}

// ---------------------------------------------------------------------------
// RepoLock
// ---------------------------------------------------------------------------

/// Marker file that keeps a second process from running against the same
/// repository. Removed on drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
}

impl RepoLock {
    pub fn acquire(root: &Path) -> Result<Self> {
        let path = paths::lock_path(root);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut f) => {
                use std::io::Write as _;
                writeln!(f, "{}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(PaintError::RepositoryLocked(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

// ---------------------------------------------------------------------------
// GitRepo
// ---------------------------------------------------------------------------

/// An existing git working tree driven through the `git` binary.
#[derive(Debug)]
pub struct GitRepo {
    root: PathBuf,
    commit_file: String,
    author: Option<Author>,
    _lock: RepoLock,
}

impl GitRepo {
    /// Open the repository at `root` and take the run lock.
    ///
    /// Never initializes a repository: `root` must already contain `.git/`.
    pub fn open(root: &Path, config: &Config) -> Result<Self> {
        which::which("git").map_err(|_| PaintError::GitNotFound)?;
        if !paths::git_dir(root).is_dir() {
            return Err(PaintError::NotARepository(root.display().to_string()));
        }
        let probe = run_git(root, ["rev-parse", "--is-inside-work-tree"], &[])?;
        if !probe.status.success() {
            return Err(PaintError::NotARepository(root.display().to_string()));
        }
        let lock = RepoLock::acquire(root)?;
        tracing::debug!(root = %root.display(), "opened repository");
        Ok(Self {
            root: root.to_path_buf(),
            commit_file: config.commit_file.clone(),
            author: config.author.clone(),
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the checked-out branch, including an unborn one. `None` when
    /// HEAD is detached.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let out = self.git(["symbolic-ref", "--quiet", "--short", "HEAD"], &[])?;
        if !out.status.success() {
            return Ok(None);
        }
        let name = stdout_of(&out);
        Ok((!name.is_empty()).then_some(name))
    }

    pub fn branch_exists(&self, branch: &str) -> Result<bool> {
        let reference = format!("refs/heads/{branch}");
        let out = self.git(["show-ref", "--verify", "--quiet", reference.as_str()], &[])?;
        Ok(out.status.success())
    }

    /// Number of commits reachable from HEAD; zero on an unborn branch.
    pub fn commit_count(&self) -> Result<usize> {
        let out = self.git(["rev-list", "--count", "HEAD"], &[])?;
        if !out.status.success() {
            return Ok(0);
        }
        Ok(stdout_of(&out).parse().unwrap_or(0))
    }

    /// Push `branch` to `remote`, setting upstream on first push.
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        tracing::info!(remote, branch, "pushing");
        self.check(["push", "--set-upstream", remote, branch], &[])?;
        Ok(())
    }

    /// Point `name` at `url`, adding the remote if it does not exist yet.
    /// Returns true when an existing remote was changed.
    pub fn set_remote(&self, name: &str, url: &str) -> Result<bool> {
        let existing = self.git(["remote", "get-url", name], &[])?;
        let changed = existing.status.success();
        if changed {
            tracing::info!(name, url, "changing remote url");
            self.check(["remote", "set-url", name, url], &[])?;
        } else {
            tracing::info!(name, url, "adding remote");
            self.check(["remote", "add", name, url], &[])?;
        }
        Ok(changed)
    }

    /// URL of remote `name`, if configured.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        let out = self.git(["remote", "get-url", name], &[])?;
        Ok(out.status.success().then(|| stdout_of(&out)))
    }

    fn commit_path(&self) -> PathBuf {
        self.root.join(&self.commit_file)
    }

    fn identity_env(&self) -> Vec<(&'static str, String)> {
        match &self.author {
            Some(a) => vec![
                ("GIT_AUTHOR_NAME", a.name.clone()),
                ("GIT_AUTHOR_EMAIL", a.email.clone()),
                ("GIT_COMMITTER_NAME", a.name.clone()),
                ("GIT_COMMITTER_EMAIL", a.email.clone()),
            ],
            None => Vec::new(),
        }
    }

    fn git<I, S>(&self, args: I, envs: &[(&str, String)]) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run_git(&self.root, args, envs)
    }

    /// Run git and turn a non-zero exit into [`PaintError::Git`].
    fn check<I, S>(&self, args: I, envs: &[(&str, String)]) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        let out = self.git(args.iter().map(|a| a.as_ref()), envs)?;
        if !out.status.success() {
            return Err(PaintError::Git {
                command: args
                    .iter()
                    .map(|a| a.as_ref().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(" "),
                stderr: stderr_of(&out),
            });
        }
        Ok(stdout_of(&out))
    }
}

impl VersionControl for GitRepo {
    fn ensure_branch(&mut self, branch: &str) -> Result<()> {
        let invalid = |reason: String| PaintError::InvalidBranch {
            branch: branch.to_string(),
            reason,
        };

        let format = self.git(["check-ref-format", "--branch", branch], &[])?;
        if !format.status.success() {
            return Err(invalid("not a valid branch name".to_string()));
        }
        if self.current_branch()?.as_deref() == Some(branch) {
            tracing::debug!(branch, "already on branch");
            return Ok(());
        }

        let out = if self.branch_exists(branch)? {
            tracing::info!(branch, "switching to branch");
            self.git(["checkout", "--quiet", branch], &[])?
        } else {
            tracing::info!(branch, "creating branch");
            self.git(["checkout", "--quiet", "-b", branch], &[])?
        };
        if !out.status.success() {
            return Err(invalid(stderr_of(&out)));
        }
        Ok(())
    }

    fn stage_change(&mut self, directive: &CommitDirective) -> Result<()> {
        let failed = |reason: String| PaintError::CommitFailed {
            timestamp: directive.git_date(),
            reason,
        };
        let line = format!("{} ({})\n", directive.message, directive.git_date());
        crate::io::append_text(&self.commit_path(), &line)
            .map_err(|e| failed(format!("cannot write {}: {e}", self.commit_file)))?;
        let out = self.git(["add", "--", self.commit_file.as_str()], &[])?;
        if !out.status.success() {
            return Err(failed(stderr_of(&out)));
        }
        Ok(())
    }

    fn commit(&mut self, directive: &CommitDirective) -> Result<()> {
        let date = directive.git_date();
        let mut envs = self.identity_env();
        envs.push(("GIT_AUTHOR_DATE", date.clone()));
        envs.push(("GIT_COMMITTER_DATE", date.clone()));
        let out = self.git(
            [
                "commit",
                "--quiet",
                "--only",
                "-m",
                directive.message.as_str(),
                "--date",
                date.as_str(),
                "--",
                self.commit_file.as_str(),
            ],
            &envs,
        )?;
        if !out.status.success() {
            return Err(PaintError::CommitFailed {
                timestamp: date,
                reason: stderr_of(&out),
            });
        }
        tracing::debug!(timestamp = %date, "committed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn run_git<I, S>(root: &Path, args: I, envs: &[(&str, String)]) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(root);
    for (key, value) in envs {
        cmd.env(key, value);
    }
    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PaintError::GitNotFound
        } else {
            PaintError::Io(e)
        }
    })?;
    Ok(output)
}

fn stdout_of(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn stderr_of(out: &Output) -> String {
    let err = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if err.is_empty() {
        format!("exited with {}", out.status)
    } else {
        err
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;
    use crate::schedule::plan;
    use crate::types::Intensity;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn git_available() -> bool {
        which::which("git").is_ok()
    }

    fn init_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        for args in [
            vec!["init", "--quiet"],
            vec!["config", "user.name", "Painter"],
            vec!["config", "user.email", "painter@example.com"],
            vec!["config", "commit.gpgsign", "false"],
        ] {
            let out = run_git(dir.path(), args, &[]).unwrap();
            assert!(out.status.success(), "{}", stderr_of(&out));
        }
        dir
    }

    fn config() -> Config {
        Config {
            utc_offset: Some("+00:00".to_string()),
            ..Config::default()
        }
    }

    fn one_day_plan(level: u8) -> Vec<CommitDirective> {
        let mut pattern = Pattern::blank(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), 1);
        pattern
            .set(
                NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                Intensity::new(level).unwrap(),
            )
            .unwrap();
        plan(&pattern, &config()).unwrap()
    }

    #[test]
    fn open_rejects_plain_directory() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            GitRepo::open(dir.path(), &config()),
            Err(PaintError::NotARepository(_))
        ));
    }

    #[test]
    fn lock_blocks_second_handle_until_dropped() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let first = GitRepo::open(dir.path(), &config()).unwrap();
        assert!(matches!(
            GitRepo::open(dir.path(), &config()),
            Err(PaintError::RepositoryLocked(_))
        ));
        drop(first);
        assert!(!paths::lock_path(dir.path()).exists());
        GitRepo::open(dir.path(), &config()).unwrap();
    }

    #[test]
    fn ensure_branch_creates_and_switches() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let mut repo = GitRepo::open(dir.path(), &config()).unwrap();
        repo.ensure_branch("paint").unwrap();
        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("paint"));
        // Idempotent on the current branch.
        repo.ensure_branch("paint").unwrap();
    }

    #[test]
    fn ensure_branch_rejects_bad_names() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let mut repo = GitRepo::open(dir.path(), &config()).unwrap();
        assert!(matches!(
            repo.ensure_branch("bad..name"),
            Err(PaintError::InvalidBranch { .. })
        ));
    }

    #[test]
    fn commits_carry_directive_dates() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let mut repo = GitRepo::open(dir.path(), &config()).unwrap();
        repo.ensure_branch("main").unwrap();

        let directives = one_day_plan(1);
        for d in &directives {
            repo.stage_change(d).unwrap();
            repo.commit(d).unwrap();
        }
        assert_eq!(repo.commit_count().unwrap(), directives.len());

        let log = repo.check(["log", "--reverse", "--format=%aI %cI"], &[]).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), directives.len());
        for (line, d) in lines.iter().zip(&directives) {
            let expected = d.git_date();
            assert_eq!(*line, format!("{expected} {expected}"));
        }
        let content = std::fs::read_to_string(dir.path().join("commit.txt")).unwrap();
        assert_eq!(content.lines().count(), directives.len());
    }

    #[test]
    fn commits_leave_other_staged_files_alone() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        std::fs::write(dir.path().join("notes.md"), "draft\n").unwrap();
        let out = run_git(dir.path(), ["add", "notes.md"], &[]).unwrap();
        assert!(out.status.success());

        let mut repo = GitRepo::open(dir.path(), &config()).unwrap();
        repo.ensure_branch("main").unwrap();
        for d in &one_day_plan(1) {
            repo.stage_change(d).unwrap();
            repo.commit(d).unwrap();
        }

        let files = repo
            .check(["log", "--format=", "--name-only"], &[])
            .unwrap();
        assert!(files.lines().filter(|l| !l.is_empty()).all(|l| l == "commit.txt"));
        let staged = repo
            .check(["diff", "--cached", "--name-only"], &[])
            .unwrap();
        assert_eq!(staged, "notes.md");
    }

    #[test]
    fn set_remote_adds_then_changes() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let repo = GitRepo::open(dir.path(), &config()).unwrap();
        assert_eq!(repo.remote_url("origin").unwrap(), None);

        assert!(!repo.set_remote("origin", "https://example.com/a.git").unwrap());
        assert_eq!(
            repo.remote_url("origin").unwrap().as_deref(),
            Some("https://example.com/a.git")
        );

        assert!(repo.set_remote("origin", "https://example.com/b.git").unwrap());
        assert_eq!(
            repo.remote_url("origin").unwrap().as_deref(),
            Some("https://example.com/b.git")
        );
    }

    #[test]
    fn commit_without_staged_change_fails() {
        if !git_available() {
            return;
        }
        let dir = init_repo();
        let mut repo = GitRepo::open(dir.path(), &config()).unwrap();
        let directives = one_day_plan(1);
        assert!(matches!(
            repo.commit(&directives[0]),
            Err(PaintError::CommitFailed { .. })
        ));
    }
}
