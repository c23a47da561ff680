//! Ordered step execution.
//!
//! The [`Sequencer`] walks a fixed list of [`ProvisioningStep`]s. Each step's
//! guard is evaluated first; a satisfied guard skips the step. The first
//! fatal action error aborts the run with [`ProvisionError::StepFailed`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::{Layout, ProvisionConfig};
use crate::environment::{DurableStore, EnvironmentContext};
use crate::error::{ProvisionError, Result};
use crate::fetch::ResourceFetcher;
use crate::runlog::RunLog;
use crate::shell::CommandRunner;
use crate::ui::{format_duration, Theme};

use super::guard::{Precondition, Probe};

/// Everything a step may use.
pub struct StepContext<'a> {
    pub config: &'a ProvisionConfig,
    pub layout: &'a Layout,
    pub runner: &'a CommandRunner,
    pub store: &'a dyn DurableStore,
    pub fetcher: &'a ResourceFetcher,
    /// Variables and search-path entries set earlier in this run.
    pub env: EnvironmentContext,
}

impl<'a> StepContext<'a> {
    pub fn log(&self) -> &RunLog {
        self.runner.log()
    }

    /// View for guard evaluation.
    pub fn probe(&self) -> Probe<'_> {
        Probe {
            runner: self.runner,
            store: self.store,
            env: &self.env,
        }
    }

    /// Overlay for child processes started by a step.
    pub fn overlay(&self) -> HashMap<String, String> {
        self.env.overlay()
    }
}

/// One unit of the provisioning pipeline.
pub trait ProvisioningStep {
    /// Stable identifier.
    fn id(&self) -> &'static str;

    /// What the step does, for progress output.
    fn description(&self) -> String;

    /// Condition that holds once the step's effect is in place.
    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition;

    /// Perform the step.
    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()>;
}

/// Sequencer state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running { index: usize },
    Completed,
    Aborted { step: String, reason: String },
}

/// What happened to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    /// The action ran.
    Applied,
    /// The guard already held.
    Skipped { reason: String },
    /// The action hit a best-effort failure and the run continued.
    Warned { message: String },
}

/// Per-step record in a [`RunSummary`].
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub id: String,
    pub description: String,
    pub status: StepStatus,
    pub duration: Duration,
}

/// Result of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<StepOutcome>,
    /// Instructions for the user once provisioning is done.
    pub next_actions: Vec<String>,
    pub duration: Duration,
}

impl RunSummary {
    /// Steps whose action ran.
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == StepStatus::Applied)
            .count()
    }

    /// Steps skipped by their guard.
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Skipped { .. }))
            .count()
    }

    /// Render the summary for the console.
    pub fn render(&self, theme: &Theme) -> String {
        let mut lines = Vec::new();
        let total = self.outcomes.len();
        for (index, outcome) in self.outcomes.iter().enumerate() {
            let line = match &outcome.status {
                StepStatus::Applied => theme.format_success(&format!(
                    "{} ({})",
                    outcome.description,
                    format_duration(outcome.duration)
                )),
                StepStatus::Skipped { reason } => {
                    theme.format_skipped(&format!("{} - {}", outcome.description, reason))
                }
                StepStatus::Warned { message } => {
                    theme.format_warning(&format!("{} - {}", outcome.description, message))
                }
            };
            lines.push(theme.format_counter(index + 1, total, &line));
        }

        lines.push(String::new());
        lines.push(format!(
            "{} applied, {} already in place ({})",
            self.applied(),
            self.skipped(),
            format_duration(self.duration)
        ));

        if !self.next_actions.is_empty() {
            lines.push(String::new());
            lines.push(format!("{}", theme.highlight.apply_to("Next steps:")));
            for (i, action) in self.next_actions.iter().enumerate() {
                lines.push(format!("  {}. {}", i + 1, theme.format_command(action)));
            }
        }
        lines.join("\n")
    }
}

/// Runs steps in order, stopping at the first fatal failure.
pub struct Sequencer {
    steps: Vec<Box<dyn ProvisioningStep>>,
    next_actions: Vec<String>,
    state: RunState,
}

impl Sequencer {
    pub fn new(steps: Vec<Box<dyn ProvisioningStep>>) -> Self {
        Self {
            steps,
            next_actions: Vec::new(),
            state: RunState::NotStarted,
        }
    }

    /// Instructions copied into the summary on success.
    pub fn with_next_actions(mut self, actions: Vec<String>) -> Self {
        self.next_actions = actions;
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Run every step.
    pub fn run(&mut self, ctx: &mut StepContext<'_>) -> Result<RunSummary> {
        let started = Instant::now();
        let total = self.steps.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, step) in self.steps.iter().enumerate() {
            self.state = RunState::Running { index };
            let description = step.description();
            ctx.log()
                .info(&format!("[{}/{}] {}", index + 1, total, description));

            let precondition = step.precondition(ctx);
            match precondition.evaluate(&ctx.probe()) {
                Ok(check) if check.complete => {
                    ctx.log().info(&format!("Skipped: {}", check.description));
                    outcomes.push(StepOutcome {
                        id: step.id().to_string(),
                        description,
                        status: StepStatus::Skipped {
                            reason: check.description,
                        },
                        duration: Duration::ZERO,
                    });
                    continue;
                }
                Ok(check) => {
                    let details = check.details.unwrap_or_default();
                    ctx.log()
                        .record(&format!("Needed: {} {}", check.description, details));
                }
                Err(e) => ctx.log().warn(&format!("{}; running the step anyway", e)),
            }

            let step_started = Instant::now();
            let status = match step.apply(ctx) {
                Ok(()) => StepStatus::Applied,
                Err(e) if !e.is_fatal() => {
                    ctx.log().warn(&format!("{}: {}", step.id(), e));
                    StepStatus::Warned {
                        message: e.to_string(),
                    }
                }
                Err(e) => {
                    ctx.log().warn(&format!("Step {} failed: {}", step.id(), e));
                    self.state = RunState::Aborted {
                        step: step.id().to_string(),
                        reason: e.to_string(),
                    };
                    return Err(ProvisionError::StepFailed {
                        step: step.id().to_string(),
                        index,
                        completed: index,
                        source: Box::new(e),
                    });
                }
            };

            outcomes.push(StepOutcome {
                id: step.id().to_string(),
                description,
                status,
                duration: step_started.elapsed(),
            });
        }

        self.state = RunState::Completed;
        Ok(RunSummary {
            outcomes,
            next_actions: self.next_actions.clone(),
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryStore;
    use crate::fetch::{Downloader, ResourceFetcher};
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct NoDownloads;

    impl Downloader for NoDownloads {
        fn download(&self, locator: &str, _dest: &Path) -> anyhow::Result<u64> {
            anyhow::bail!("unexpected download of {}", locator)
        }
    }

    /// Step guarded by a file; its action creates the file or fails.
    struct FileStep {
        id: &'static str,
        path: std::path::PathBuf,
        fail_with: Option<fn() -> ProvisionError>,
        guard: Option<Precondition>,
        runs: Rc<Cell<usize>>,
    }

    impl ProvisioningStep for FileStep {
        fn id(&self) -> &'static str {
            self.id
        }

        fn description(&self) -> String {
            format!("Create {}", self.id)
        }

        fn precondition(&self, _ctx: &StepContext<'_>) -> Precondition {
            self.guard
                .clone()
                .unwrap_or_else(|| Precondition::FileExists(self.path.clone()))
        }

        fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            ctx.env.set(self.id.to_uppercase(), "done");
            std::fs::write(&self.path, "")?;
            Ok(())
        }
    }

    struct Harness {
        temp: TempDir,
        config: ProvisionConfig,
        layout: Layout,
        runner: CommandRunner,
        store: MemoryStore,
        fetcher: ResourceFetcher,
    }

    impl Harness {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let layout = Layout::new(temp.path());
            Self {
                config: ProvisionConfig::default(),
                layout,
                runner: CommandRunner::new(
                    Box::new(crate::shell::ScriptedExecutor::new()),
                    RunLog::discard(),
                ),
                store: MemoryStore::new(),
                fetcher: ResourceFetcher::new(Box::new(NoDownloads), RunLog::discard()),
                temp,
            }
        }

        fn ctx(&self) -> StepContext<'_> {
            StepContext {
                config: &self.config,
                layout: &self.layout,
                runner: &self.runner,
                store: &self.store,
                fetcher: &self.fetcher,
                env: EnvironmentContext::new(),
            }
        }

        fn step(
            &self,
            id: &'static str,
            fail_with: Option<fn() -> ProvisionError>,
        ) -> (Box<dyn ProvisioningStep>, Rc<Cell<usize>>) {
            let runs = Rc::new(Cell::new(0));
            let step = FileStep {
                id,
                path: self.temp.path().join(id),
                fail_with,
                guard: None,
                runs: Rc::clone(&runs),
            };
            (Box::new(step), runs)
        }
    }

    fn command_failed() -> ProvisionError {
        ProvisionError::CommandFailed {
            command: "sdkmanager emulator".to_string(),
            code: Some(1),
        }
    }

    fn persist_failed() -> ProvisionError {
        ProvisionError::EnvironmentPersistError {
            name: "ANDROID_HOME".to_string(),
            message: "access denied".to_string(),
        }
    }

    #[test]
    fn runs_steps_in_order_and_completes() {
        let h = Harness::new();
        let (a, a_runs) = h.step("a", None);
        let (b, b_runs) = h.step("b", None);
        let mut seq = Sequencer::new(vec![a, b]).with_next_actions(vec!["Go".to_string()]);
        let mut ctx = h.ctx();

        assert_eq!(seq.state(), &RunState::NotStarted);
        let summary = seq.run(&mut ctx).unwrap();

        assert_eq!(seq.state(), &RunState::Completed);
        assert_eq!(a_runs.get(), 1);
        assert_eq!(b_runs.get(), 1);
        assert_eq!(summary.applied(), 2);
        assert_eq!(summary.next_actions, vec!["Go"]);
        assert_eq!(ctx.env.get("A"), Some("done"));
    }

    #[test]
    fn satisfied_guard_skips_action() {
        let h = Harness::new();
        std::fs::write(h.temp.path().join("a"), "").unwrap();
        let (a, a_runs) = h.step("a", None);
        let mut seq = Sequencer::new(vec![a]);

        let summary = seq.run(&mut h.ctx()).unwrap();

        assert_eq!(a_runs.get(), 0);
        assert_eq!(summary.skipped(), 1);
    }

    #[test]
    fn second_run_skips_everything() {
        let h = Harness::new();
        let (a, a_runs) = h.step("a", None);
        let (b, b_runs) = h.step("b", None);
        let mut seq = Sequencer::new(vec![a, b]);

        seq.run(&mut h.ctx()).unwrap();
        let summary = seq.run(&mut h.ctx()).unwrap();

        assert_eq!(a_runs.get(), 1);
        assert_eq!(b_runs.get(), 1);
        assert_eq!(summary.skipped(), 2);
    }

    #[test]
    fn fatal_error_aborts_remaining_steps() {
        let h = Harness::new();
        let (a, _) = h.step("a", None);
        let (b, _) = h.step("b", Some(command_failed));
        let (c, c_runs) = h.step("c", None);
        let mut seq = Sequencer::new(vec![a, b, c]);

        let err = seq.run(&mut h.ctx()).unwrap_err();

        assert_eq!(c_runs.get(), 0);
        match err {
            ProvisionError::StepFailed {
                step,
                index,
                completed,
                source,
            } => {
                assert_eq!(step, "b");
                assert_eq!(index, 1);
                assert_eq!(completed, 1);
                assert!(matches!(*source, ProvisionError::CommandFailed { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(seq.state(), RunState::Aborted { step, .. } if step == "b"));
    }

    #[test]
    fn best_effort_error_continues() {
        let h = Harness::new();
        let (a, _) = h.step("a", Some(persist_failed));
        let (b, b_runs) = h.step("b", None);
        let mut seq = Sequencer::new(vec![a, b]);

        let summary = seq.run(&mut h.ctx()).unwrap();

        assert_eq!(b_runs.get(), 1);
        assert!(matches!(
            summary.outcomes[0].status,
            StepStatus::Warned { .. }
        ));
    }

    #[test]
    fn indeterminate_guard_runs_the_step() {
        let mut h = Harness::new();
        h.store = MemoryStore::new()
            .with("ANDROID_HOME", "/sdk")
            .failing_reads();
        let runs = Rc::new(Cell::new(0));
        let step = FileStep {
            id: "env",
            path: h.temp.path().join("env"),
            fail_with: None,
            guard: Some(Precondition::DurableValue {
                name: "ANDROID_HOME".to_string(),
                value: "/sdk".to_string(),
            }),
            runs: Rc::clone(&runs),
        };
        let mut seq = Sequencer::new(vec![Box::new(step)]);

        let summary = seq.run(&mut h.ctx()).unwrap();

        assert_eq!(runs.get(), 1);
        assert_eq!(summary.applied(), 1);
        assert_eq!(summary.skipped(), 0);
        assert!(h.temp.path().join("env").exists());
        assert_eq!(seq.state(), &RunState::Completed);
    }

    #[test]
    fn summary_lists_next_actions() {
        let summary = RunSummary {
            outcomes: vec![StepOutcome {
                id: "dirs".to_string(),
                description: "Create directories".to_string(),
                status: StepStatus::Skipped {
                    reason: "Found /rn".to_string(),
                },
                duration: Duration::ZERO,
            }],
            next_actions: vec!["Open a new terminal".to_string()],
            duration: Duration::from_secs(2),
        };

        let text = summary.render(&Theme::plain());

        assert!(text.contains("[1/1] ○ Create directories - Found /rn"));
        assert!(text.contains("0 applied, 1 already in place"));
        assert!(text.contains("1. Open a new terminal"));
    }
}
