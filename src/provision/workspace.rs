//! Directory layout and the application scaffold.

use std::fs;

use crate::error::Result;
use crate::shell::CommandInvocation;
use crate::steps::{Precondition, ProvisioningStep, StepContext};

/// Create the fixed directory layout.
pub struct CreateDirectories;

impl ProvisioningStep for CreateDirectories {
    fn id(&self) -> &'static str {
        "directories"
    }

    fn description(&self) -> String {
        "Create the directory layout".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        Precondition::All(
            ctx.layout
                .directories()
                .iter()
                .map(|d| Precondition::FileExists(d.to_path_buf()))
                .collect(),
        )
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        ctx.layout.ensure()?;
        ctx.log().info(&format!(
            "Folders ensured under {}",
            ctx.layout.root.display()
        ));
        Ok(())
    }
}

/// Scaffold the Expo application.
pub struct ScaffoldApp;

impl ProvisioningStep for ScaffoldApp {
    fn id(&self) -> &'static str {
        "app"
    }

    fn description(&self) -> String {
        "Scaffold the Expo application".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        let project = ctx.layout.project_dir(&ctx.config.app.name);
        Precondition::FileExists(project.join("package.json"))
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let app = &ctx.config.app;
        let Some((program, args)) = app.scaffold.split_first() else {
            return Err(anyhow::anyhow!("app.scaffold must name a program").into());
        };

        fs::create_dir_all(&ctx.layout.apps)?;
        ctx.log()
            .info("Scaffolding Expo app... this can take a few minutes.");
        let invocation = CommandInvocation::new(program)
            .args(args)
            .arg(app.name.as_str())
            .current_dir(&ctx.layout.apps)
            .envs(&ctx.overlay());
        ctx.runner.run(&invocation)?;

        ctx.log().info(&format!(
            "Project ready at: {}",
            ctx.layout.project_dir(&app.name).display()
        ));
        Ok(())
    }
}

/// What the user should do once provisioning succeeds.
pub fn next_actions(ctx: &StepContext<'_>) -> Vec<String> {
    let project = ctx.layout.project_dir(&ctx.config.app.name);
    vec![
        "Open a NEW terminal so the updated PATH is picked up.".to_string(),
        format!(
            "cd {} && {}",
            project.display(),
            ctx.config.app.start_command
        ),
        "Press 'a' for the Android emulator, scan the QR code with Expo Go on iOS, or press 'w' for web.".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Layout, ProvisionConfig};
    use crate::environment::{EnvironmentContext, MemoryStore};
    use crate::fetch::{Downloader, ResourceFetcher};
    use crate::runlog::RunLog;
    use crate::shell::{CommandOutput, CommandRunner, ScriptedExecutor};
    use std::path::Path;
    use tempfile::TempDir;

    struct NoDownloads;

    impl Downloader for NoDownloads {
        fn download(&self, _locator: &str, _dest: &Path) -> anyhow::Result<u64> {
            anyhow::bail!("offline")
        }
    }

    fn parts(temp: &TempDir) -> (ProvisionConfig, Layout, ScaffoldHarness) {
        let mut config = ProvisionConfig::default();
        config.root = temp.path().to_path_buf();
        let layout = Layout::new(temp.path());
        let executor = ScriptedExecutor::new();
        let harness = ScaffoldHarness {
            runner: CommandRunner::new(Box::new(executor.clone()), RunLog::discard()),
            executor,
            store: MemoryStore::new(),
            fetcher: ResourceFetcher::new(Box::new(NoDownloads), RunLog::discard()),
        };
        (config, layout, harness)
    }

    struct ScaffoldHarness {
        executor: ScriptedExecutor,
        runner: CommandRunner,
        store: MemoryStore,
        fetcher: ResourceFetcher,
    }

    impl ScaffoldHarness {
        fn ctx<'a>(&'a self, config: &'a ProvisionConfig, layout: &'a Layout) -> StepContext<'a> {
            StepContext {
                config,
                layout,
                runner: &self.runner,
                store: &self.store,
                fetcher: &self.fetcher,
                env: EnvironmentContext::new(),
            }
        }
    }

    #[test]
    fn directories_step_creates_layout() {
        let temp = TempDir::new().unwrap();
        let (config, layout, h) = parts(&temp);
        let mut ctx = h.ctx(&config, &layout);

        assert!(!CreateDirectories
            .precondition(&ctx)
            .evaluate(&ctx.probe())
            .unwrap()
            .complete);
        CreateDirectories.apply(&mut ctx).unwrap();
        assert!(CreateDirectories
            .precondition(&ctx)
            .evaluate(&ctx.probe())
            .unwrap()
            .complete);
    }

    #[test]
    fn scaffold_runs_in_workspace() {
        let temp = TempDir::new().unwrap();
        let (config, layout, h) = parts(&temp);

        ScaffoldApp.apply(&mut h.ctx(&config, &layout)).unwrap();

        let calls = h.executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "npx");
        assert_eq!(calls[0].args, vec!["create-expo-app@latest", "universal-app"]);
        assert_eq!(calls[0].cwd.as_deref(), Some(layout.apps.as_path()));
    }

    #[test]
    fn scaffold_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let (config, layout, h) = parts(&temp);
        h.executor
            .respond("npx", CommandOutput::failed(1, "npm ERR! network"));

        let err = ScaffoldApp.apply(&mut h.ctx(&config, &layout)).unwrap_err();

        assert!(err.is_fatal());
    }

    #[test]
    fn next_actions_name_project_and_start_command() {
        let temp = TempDir::new().unwrap();
        let (config, layout, h) = parts(&temp);
        let actions = next_actions(&h.ctx(&config, &layout));

        assert!(actions[0].contains("NEW terminal"));
        assert!(actions[1].ends_with("&& npx expo start"));
        assert!(actions[1].contains("universal-app"));
    }
}
