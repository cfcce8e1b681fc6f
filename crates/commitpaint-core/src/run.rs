use crate::config::Config;
use crate::error::Result;
use crate::git::VersionControl;
use crate::pattern::Pattern;
use crate::schedule::{self, CommitDirective};
use crate::types::{FailurePolicy, RunPhase};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ScheduleResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub timestamp: DateTime<FixedOffset>,
    pub reason: String,
}

/// Outcome of applying one plan. Partial application is a valid outcome and
/// is reported here, never rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub branch: String,
    pub planned: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub first_failure: Option<FailureDetail>,
    pub phase: RunPhase,
}

impl ScheduleResult {
    fn new(branch: &str, planned: usize) -> Self {
        Self {
            branch: branch.to_string(),
            planned,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            first_failure: None,
            phase: RunPhase::Applying,
        }
    }

    /// Every planned directive was committed.
    pub fn is_clean(&self) -> bool {
        self.phase == RunPhase::Completed && self.failed == 0 && self.succeeded == self.planned
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives one generation run:
/// `Idle → Validating → Scheduling → Applying → {Completed | Aborted}`.
#[derive(Debug)]
pub struct Scheduler<'a> {
    config: &'a Config,
    phase: RunPhase,
}

impl<'a> Scheduler<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Validate `pattern`, plan its commits and apply them to `repo` one at a
    /// time.
    ///
    /// Errors before the first commit (invalid pattern or config, bad branch)
    /// are returned as `Err` with nothing written. Commit failures are
    /// recorded in the result according to the configured failure policy.
    pub fn run<V: VersionControl>(
        &mut self,
        pattern: &Pattern,
        repo: &mut V,
    ) -> Result<ScheduleResult> {
        self.phase = RunPhase::Idle;

        self.transition(RunPhase::Validating);
        if let Err(e) = pattern.validate().and_then(|_| self.config.ensure_valid()) {
            self.transition(RunPhase::Aborted);
            return Err(e);
        }

        self.transition(RunPhase::Scheduling);
        let directives = match schedule::plan_validated(pattern, self.config) {
            Ok(d) => d,
            Err(e) => {
                self.transition(RunPhase::Aborted);
                return Err(e);
            }
        };

        self.transition(RunPhase::Applying);
        let branch = &self.config.branch;
        if let Err(e) = repo.ensure_branch(branch) {
            self.transition(RunPhase::Aborted);
            return Err(e);
        }
        tracing::info!(
            branch = %branch,
            commits = directives.len(),
            policy = %self.config.on_failure,
            "applying directives"
        );

        let result = self.apply(&directives, repo);
        tracing::info!(
            succeeded = result.succeeded,
            failed = result.failed,
            phase = %result.phase,
            "run finished"
        );
        Ok(result)
    }

    fn apply<V: VersionControl>(
        &mut self,
        directives: &[CommitDirective],
        repo: &mut V,
    ) -> ScheduleResult {
        let mut result = ScheduleResult::new(&self.config.branch, directives.len());
        for directive in directives {
            result.attempted += 1;
            tracing::debug!(
                timestamp = %directive.git_date(),
                sequence = directive.sequence,
                "applying directive"
            );
            match repo
                .stage_change(directive)
                .and_then(|_| repo.commit(directive))
            {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    tracing::warn!(timestamp = %directive.git_date(), error = %e, "commit failed");
                    result.failed += 1;
                    result.first_failure.get_or_insert_with(|| FailureDetail {
                        timestamp: directive.timestamp,
                        reason: e.to_string(),
                    });
                    if self.config.on_failure == FailurePolicy::Abort {
                        self.transition(RunPhase::Aborted);
                        result.phase = self.phase;
                        return result;
                    }
                }
            }
        }
        self.transition(RunPhase::Completed);
        result.phase = self.phase;
        result
    }

    fn transition(&mut self, next: RunPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal run transition {} -> {}",
            self.phase,
            next
        );
        self.phase = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommitCountMap;
    use crate::error::PaintError;
    use crate::types::Intensity;
    use chrono::NaiveDate;

    /// In-memory repository that fails chosen commit attempts (1-based).
    #[derive(Default)]
    struct FakeRepo {
        fail_on: Vec<usize>,
        reject_branch: bool,
        branch: Option<String>,
        attempts: usize,
        committed: Vec<CommitDirective>,
    }

    impl VersionControl for FakeRepo {
        fn ensure_branch(&mut self, branch: &str) -> Result<()> {
            if self.reject_branch {
                return Err(PaintError::InvalidBranch {
                    branch: branch.to_string(),
                    reason: "rejected".to_string(),
                });
            }
            self.branch = Some(branch.to_string());
            Ok(())
        }

        fn stage_change(&mut self, _directive: &CommitDirective) -> Result<()> {
            Ok(())
        }

        fn commit(&mut self, directive: &CommitDirective) -> Result<()> {
            self.attempts += 1;
            if self.fail_on.contains(&self.attempts) {
                return Err(PaintError::CommitFailed {
                    timestamp: directive.git_date(),
                    reason: "hook rejected".to_string(),
                });
            }
            self.committed.push(directive.clone());
            Ok(())
        }
    }

    fn sunday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
    }

    /// One day painted at intensity 3 with the identity map: 3 directives.
    fn three_commit_pattern() -> Pattern {
        let mut p = Pattern::blank(sunday(), 1);
        p.set(
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            Intensity::new(3).unwrap(),
        )
        .unwrap();
        p
    }

    fn config(policy: FailurePolicy) -> Config {
        Config {
            intensity_commits: CommitCountMap::identity(),
            on_failure: policy,
            utc_offset: Some("+00:00".to_string()),
            ..Config::default()
        }
    }

    #[test]
    fn clean_run_completes() {
        let cfg = config(FailurePolicy::Abort);
        let mut repo = FakeRepo::default();
        let mut scheduler = Scheduler::new(&cfg);
        let result = scheduler.run(&three_commit_pattern(), &mut repo).unwrap();

        assert_eq!(result.planned, 3);
        assert_eq!(result.succeeded, 3);
        assert_eq!(result.failed, 0);
        assert_eq!(result.phase, RunPhase::Completed);
        assert!(result.is_clean());
        assert_eq!(scheduler.phase(), RunPhase::Completed);
        assert_eq!(repo.branch.as_deref(), Some("main"));
    }

    #[test]
    fn abort_stops_at_first_failure() {
        let cfg = config(FailurePolicy::Abort);
        let mut repo = FakeRepo {
            fail_on: vec![2],
            ..FakeRepo::default()
        };
        let mut scheduler = Scheduler::new(&cfg);
        let result = scheduler.run(&three_commit_pattern(), &mut repo).unwrap();

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.attempted, 2);
        assert_eq!(result.phase, RunPhase::Aborted);
        assert_eq!(repo.attempts, 2, "third directive must never be attempted");
        let failure = result.first_failure.unwrap();
        assert!(failure.reason.contains("hook rejected"));
        assert_eq!(failure.timestamp.format("%H:%M:%S").to_string(), "13:00:00");
    }

    #[test]
    fn continue_records_and_proceeds() {
        let cfg = config(FailurePolicy::Continue);
        let mut repo = FakeRepo {
            fail_on: vec![2],
            ..FakeRepo::default()
        };
        let mut scheduler = Scheduler::new(&cfg);
        let result = scheduler.run(&three_commit_pattern(), &mut repo).unwrap();

        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.attempted, 3);
        assert_eq!(result.phase, RunPhase::Completed);
        assert!(!result.is_clean());
        assert!(result.first_failure.is_some());
    }

    #[test]
    fn invalid_pattern_aborts_before_touching_repo() {
        let cfg = config(FailurePolicy::Abort);
        let mut repo = FakeRepo::default();
        let mut scheduler = Scheduler::new(&cfg);
        let broken = Pattern::blank(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 1);

        let err = scheduler.run(&broken, &mut repo).unwrap_err();
        assert!(matches!(err, PaintError::Validation(_)));
        assert_eq!(scheduler.phase(), RunPhase::Aborted);
        assert!(repo.branch.is_none());
        assert_eq!(repo.attempts, 0);
    }

    #[test]
    fn invalid_branch_makes_no_commits() {
        let cfg = config(FailurePolicy::Continue);
        let mut repo = FakeRepo {
            reject_branch: true,
            ..FakeRepo::default()
        };
        let mut scheduler = Scheduler::new(&cfg);
        let err = scheduler.run(&three_commit_pattern(), &mut repo).unwrap_err();

        assert!(matches!(err, PaintError::InvalidBranch { .. }));
        assert_eq!(scheduler.phase(), RunPhase::Aborted);
        assert_eq!(repo.attempts, 0);
    }

    #[test]
    fn empty_pattern_completes_with_nothing_to_do() {
        let cfg = config(FailurePolicy::Abort);
        let mut repo = FakeRepo::default();
        let result = Scheduler::new(&cfg)
            .run(&Pattern::blank(sunday(), 2), &mut repo)
            .unwrap();
        assert_eq!(result.planned, 0);
        assert_eq!(result.phase, RunPhase::Completed);
        assert!(result.is_clean());
    }

    #[test]
    fn repeated_runs_agree_on_counts_and_order() {
        let cfg = Config {
            jitter: crate::config::Jitter::Seeded { seed: 5 },
            ..config(FailurePolicy::Abort)
        };
        let mut pattern = Pattern::blank(sunday(), 6);
        pattern.randomize(9).unwrap();

        let mut first = FakeRepo::default();
        let mut second = FakeRepo::default();
        let a = Scheduler::new(&cfg).run(&pattern, &mut first).unwrap();
        let b = Scheduler::new(&cfg).run(&pattern, &mut second).unwrap();

        assert_eq!(a, b);
        let times = |r: &FakeRepo| r.committed.iter().map(|d| d.timestamp).collect::<Vec<_>>();
        assert_eq!(times(&first), times(&second));
        assert!(times(&first).windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn scheduler_can_run_again_after_abort() {
        let cfg = config(FailurePolicy::Abort);
        let mut scheduler = Scheduler::new(&cfg);
        let mut failing = FakeRepo {
            fail_on: vec![1],
            ..FakeRepo::default()
        };
        let first = scheduler.run(&three_commit_pattern(), &mut failing).unwrap();
        assert_eq!(first.phase, RunPhase::Aborted);

        let mut healthy = FakeRepo::default();
        let second = scheduler.run(&three_commit_pattern(), &mut healthy).unwrap();
        assert_eq!(second.phase, RunPhase::Completed);
    }
}
