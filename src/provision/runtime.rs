//! Language runtimes installed through the package manager.

use anyhow::anyhow;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::config::ProvisionConfig;
use crate::environment::set_persistent;
use crate::error::{ProvisionError, Result};
use crate::shell::{CommandInvocation, CommandRunner};
use crate::steps::{parse_version, Precondition, ProvisioningStep, StepContext};

/// Install `package_id` with the configured package manager.
///
/// A missing package manager or a non-zero exit is only a warning; the
/// version check that follows decides whether the runtime is usable.
pub fn install_package(ctx: &StepContext<'_>, package_id: &str) -> Result<()> {
    let manager = &ctx.config.package_manager;
    let env = ctx.overlay();
    if !ctx.runner.is_available(&manager.program, &env) {
        ctx.log().warn(&format!(
            "{} not found. Skipping install of {}.",
            manager.program, package_id
        ));
        return Ok(());
    }

    let invocation = CommandInvocation::new(&manager.program)
        .args(&manager.install_args)
        .arg(package_id)
        .envs(&env)
        .lenient();
    let output = ctx.runner.run(&invocation)?;
    if !output.success() {
        ctx.log().warn(&format!(
            "{} install {} exited with code {:?}",
            manager.program, package_id, output.exit_code
        ));
    }
    Ok(())
}

/// Build an invocation from a `[program, args...]` list.
fn command_from(parts: &[String], key: &str) -> Result<CommandInvocation> {
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| anyhow!("{} must name a program", key))?;
    Ok(CommandInvocation::new(program).args(args))
}

/// Node.js at or above the configured major version.
pub struct NodeRuntime;

impl NodeRuntime {
    fn query(config: &ProvisionConfig) -> Result<CommandInvocation> {
        command_from(&config.node.version_command, "node.version_command")
    }
}

impl ProvisioningStep for NodeRuntime {
    fn id(&self) -> &'static str {
        "node"
    }

    fn description(&self) -> String {
        "Install Node.js LTS".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        match Self::query(ctx.config) {
            Ok(invocation) => Precondition::MinVersion {
                invocation,
                minimum_major: ctx.config.node.min_major,
            },
            Err(e) => Precondition::Never {
                reason: e.to_string(),
            },
        }
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let node = &ctx.config.node;
        let query = Self::query(ctx.config)?;
        ctx.log()
            .info("Installing Node.js LTS via the package manager (if missing)...");
        install_package(ctx, &node.package_id)?;

        let tool = query.program.clone();
        let output = match ctx.runner.run(&query.envs(&ctx.overlay()).lenient()) {
            Ok(output) => output,
            Err(ProvisionError::ExternalToolMissing { .. }) => {
                return Err(ProvisionError::ExternalToolMissing {
                    tool,
                    message: "not found on PATH after installation; open a new terminal and run again"
                        .to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        let reported = output.stdout.trim().to_string();
        ctx.log()
            .info(&format!("Detected Node version: {}", reported));
        let Some(version) = parse_version(&reported) else {
            return Err(ProvisionError::ExternalToolMissing {
                tool,
                message: "no version reported after installation".to_string(),
            });
        };
        if version.major < node.min_major {
            return Err(ProvisionError::RuntimeTooOld {
                tool,
                found: reported,
                required: node.min_major,
            });
        }
        Ok(())
    }
}

/// Find a JDK home directory.
///
/// Configured candidates come first; otherwise `java` is resolved on the
/// search path and its grandparent (`<home>/bin/java`) is used.
pub fn detect_java_home(
    config: &ProvisionConfig,
    runner: &CommandRunner,
    env: &HashMap<String, String>,
) -> Option<PathBuf> {
    if let Some(home) = config.java.home_candidates.iter().find(|c| c.is_dir()) {
        return Some(home.clone());
    }

    let java = runner.locate("java", env)?;
    let java = fs::canonicalize(&java).unwrap_or(java);
    let home = java.parent()?.parent()?;
    if home.as_os_str().is_empty() || !home.is_dir() {
        return None;
    }
    Some(home.to_path_buf())
}

/// JDK installed and `JAVA_HOME` recorded.
pub struct JavaRuntime;

impl ProvisioningStep for JavaRuntime {
    fn id(&self) -> &'static str {
        "java"
    }

    fn description(&self) -> String {
        "Install a JDK and record JAVA_HOME".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        let invocation = match command_from(&ctx.config.java.version_command, "java.version_command")
        {
            Ok(invocation) => invocation,
            Err(e) => {
                return Precondition::Never {
                    reason: e.to_string(),
                }
            }
        };
        let mut checks = vec![Precondition::MinVersion {
            invocation,
            minimum_major: ctx.config.java.min_major,
        }];
        if let Some(home) = detect_java_home(ctx.config, ctx.runner, &ctx.overlay()) {
            checks.push(Precondition::DurableValue {
                name: "JAVA_HOME".to_string(),
                value: home.display().to_string(),
            });
        }
        Precondition::All(checks)
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        ctx.log().info(&format!(
            "Installing JDK {} via the package manager (if missing)...",
            ctx.config.java.min_major
        ));
        install_package(ctx, &ctx.config.java.package_id)?;

        let Some(home) = detect_java_home(ctx.config, ctx.runner, &ctx.overlay()) else {
            ctx.log().warn(&format!(
                "Could not locate JAVA_HOME automatically. Please install JDK {} manually.",
                ctx.config.java.min_major
            ));
            return Ok(());
        };

        let value = home.display().to_string();
        ctx.env.prepend_path([home.join("bin").display().to_string()]);
        ctx.log().info(&format!("Using JAVA_HOME={}", value));
        set_persistent(&mut ctx.env, ctx.store, "JAVA_HOME", &value)
    }
}
