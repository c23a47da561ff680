//! Android SDK tooling, packages and the virtual device.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::environment::{append_to_path_variable, set_persistent};
use crate::error::{ProvisionError, Result};
use crate::fetch::ArchiveResource;
use crate::shell::{script_name, CommandInvocation};
use crate::steps::{Precondition, ProvisioningStep, StepContext};

use super::runtime::detect_java_home;

/// File the SDK manager writes once the SDK license is accepted.
const LICENSE_FILE: [&str; 2] = ["licenses", "android-sdk-license"];

/// Overlay for SDK and device manager commands.
pub fn android_overlay(ctx: &StepContext<'_>) -> HashMap<String, String> {
    let mut env = ctx.overlay();
    let sdk = ctx.layout.sdk_root.display().to_string();
    env.insert("ANDROID_HOME".to_string(), sdk.clone());
    env.insert("ANDROID_SDK_ROOT".to_string(), sdk);
    env.insert(
        "ANDROID_AVD_HOME".to_string(),
        ctx.layout.avd_home.display().to_string(),
    );
    if !env.contains_key("JAVA_HOME") {
        if let Some(home) = detect_java_home(ctx.config, ctx.runner, &env) {
            env.insert("JAVA_HOME".to_string(), home.display().to_string());
        }
    }
    env
}

/// Launcher script in the installed command-line tools.
pub fn sdk_tool(ctx: &StepContext<'_>, base: &str) -> Result<PathBuf> {
    let path = ctx.layout.tool_script(base);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ProvisionError::ExternalToolMissing {
            tool: base.to_string(),
            message: format!("not found at {}", path.display()),
        })
    }
}

/// Command-line tools archive as configured.
pub fn cmdline_tools_resource(ctx: &StepContext<'_>) -> ArchiveResource {
    ArchiveResource {
        name: "Android command-line tools".to_string(),
        candidates: ctx.config.sdk.archive_candidates.clone(),
        root_name: ctx.config.sdk.archive_root.clone(),
        marker_dir: "bin".to_string(),
        marker_file: PathBuf::from("bin").join(script_name("sdkmanager")),
    }
}

/// Download and install the command-line tools.
pub struct CommandLineTools;

impl ProvisioningStep for CommandLineTools {
    fn id(&self) -> &'static str {
        "cmdline-tools"
    }

    fn description(&self) -> String {
        "Install Android command-line tools".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        Precondition::FileExists(ctx.layout.tool_script("sdkmanager"))
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let resource = cmdline_tools_resource(ctx);
        ctx.fetcher.fetch(&resource, &ctx.layout.cmdline_tools())?;
        Ok(())
    }
}

/// Record the SDK locations and tool directories durably.
pub struct PersistEnvironment;

impl PersistEnvironment {
    fn variables(ctx: &StepContext<'_>) -> [(&'static str, String); 2] {
        [
            ("ANDROID_HOME", ctx.layout.sdk_root.display().to_string()),
            ("ANDROID_AVD_HOME", ctx.layout.avd_home.display().to_string()),
        ]
    }

    fn path_entries(ctx: &StepContext<'_>) -> Vec<String> {
        ctx.layout
            .path_entries()
            .iter()
            .map(|p| p.display().to_string())
            .collect()
    }
}

impl ProvisioningStep for PersistEnvironment {
    fn id(&self) -> &'static str {
        "environment"
    }

    fn description(&self) -> String {
        "Persist ANDROID_HOME, ANDROID_AVD_HOME and PATH".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        let mut checks: Vec<Precondition> = Self::variables(ctx)
            .into_iter()
            .map(|(name, value)| Precondition::DurableValue {
                name: name.to_string(),
                value,
            })
            .collect();
        checks.push(Precondition::DurablePathContains(Self::path_entries(ctx)));
        Precondition::All(checks)
    }

    /// Every write is attempted; the first failure is returned afterwards.
    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let mut first_error = None;

        for (name, value) in Self::variables(ctx) {
            match set_persistent(&mut ctx.env, ctx.store, name, &value) {
                Ok(()) => ctx.log().info(&format!("Set {}={}", name, value)),
                Err(e) => {
                    ctx.log().warn(&e.to_string());
                    first_error.get_or_insert(e);
                }
            }
        }

        let entries = Self::path_entries(ctx);
        let (store, runner) = (ctx.store, ctx.runner);
        let log = runner.log();
        match append_to_path_variable(&mut ctx.env, store, log, &entries) {
            Ok(added) if added.is_empty() => {
                log.info("PATH already contains the Android SDK tools.")
            }
            Ok(added) => log.info(&format!(
                "Updated user PATH with {} (new terminals will pick this up).",
                added.join(", ")
            )),
            Err(e) => {
                log.warn(&e.to_string());
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Accept SDK licenses by answering the prompts.
pub struct AcceptLicenses;

impl ProvisioningStep for AcceptLicenses {
    fn id(&self) -> &'static str {
        "licenses"
    }

    fn description(&self) -> String {
        "Accept Android SDK licenses".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        let [dir, file] = LICENSE_FILE;
        Precondition::FileExists(ctx.layout.sdk_root.join(dir).join(file))
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let sdkmanager = sdk_tool(ctx, "sdkmanager")?;
        let invocation = CommandInvocation::new(sdkmanager.display().to_string())
            .arg("--licenses")
            .arg(format!("--sdk_root={}", ctx.layout.sdk_root.display()))
            .envs(&android_overlay(ctx));

        ctx.log().info("Accepting Android SDK licenses...");
        let outcome = ctx
            .runner
            .negotiate(&invocation, &ctx.config.licenses.policy())?;
        if outcome.timed_out {
            ctx.log()
                .warn("License prompt did not finish in time; continuing.");
        } else {
            ctx.log().info(&format!(
                "License prompt finished with code {:?} after {} response(s).",
                outcome.exit_code, outcome.feeds_sent
            ));
        }
        Ok(())
    }
}

/// Install the configured SDK packages.
pub struct SdkPackages;

impl ProvisioningStep for SdkPackages {
    fn id(&self) -> &'static str {
        "sdk-packages"
    }

    fn description(&self) -> String {
        "Install Android SDK packages".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        Precondition::All(
            ctx.config
                .sdk
                .packages
                .iter()
                .map(|p| Precondition::FileExists(ctx.layout.package_dir(p).join("package.xml")))
                .collect(),
        )
    }

    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let sdkmanager = sdk_tool(ctx, "sdkmanager")?;
        let env = android_overlay(ctx);
        let sdk_root = format!("--sdk_root={}", ctx.layout.sdk_root.display());

        for package in &ctx.config.sdk.packages {
            if ctx.layout.package_dir(package).join("package.xml").is_file() {
                ctx.log()
                    .info(&format!("Android package already installed: {}", package));
                continue;
            }
            ctx.log()
                .info(&format!("Installing Android package: {}", package));
            let invocation = CommandInvocation::new(sdkmanager.display().to_string())
                .arg(package.as_str())
                .arg(sdk_root.as_str())
                .envs(&env);
            ctx.runner.run(&invocation)?;
        }
        Ok(())
    }
}

/// Create the named virtual device.
pub struct VirtualDevice;

impl VirtualDevice {
    fn avdmanager(ctx: &StepContext<'_>) -> String {
        ctx.layout.tool_script("avdmanager").display().to_string()
    }

    fn create(ctx: &StepContext<'_>, program: &str, profile: Option<&str>) -> Result<()> {
        let device = &ctx.config.device;
        let mut invocation = CommandInvocation::new(program)
            .args(["create", "avd", "-n"])
            .arg(device.name.as_str())
            .arg("-k")
            .arg(device.image.as_str());
        if let Some(profile) = profile {
            invocation = invocation.arg("--device").arg(profile);
        }
        ctx.runner
            .run(&invocation.envs(&android_overlay(ctx)))
            .map(|_| ())
    }
}

impl ProvisioningStep for VirtualDevice {
    fn id(&self) -> &'static str {
        "device"
    }

    fn description(&self) -> String {
        "Create the Android virtual device".to_string()
    }

    fn precondition(&self, ctx: &StepContext<'_>) -> Precondition {
        Precondition::ListingContains {
            invocation: CommandInvocation::new(Self::avdmanager(ctx))
                .args(["list", "avd"])
                .envs(&android_overlay(ctx)),
            needle: ctx.config.device.name.clone(),
        }
    }

    /// A failed creation with a hardware profile is retried once without it.
    fn apply(&self, ctx: &mut StepContext<'_>) -> Result<()> {
        let program = sdk_tool(ctx, "avdmanager")?.display().to_string();
        let device = &ctx.config.device;
        ctx.log().info(&format!(
            "Creating AVD '{}' (system image: {})...",
            device.name, device.image
        ));

        let Some(profile) = device.profile.as_deref() else {
            return Self::create(ctx, &program, None);
        };
        match Self::create(ctx, &program, Some(profile)) {
            Err(ProvisionError::CommandFailed { .. }) => {
                ctx.log()
                    .warn("Retrying AVD creation without --device...");
                Self::create(ctx, &program, None)
            }
            other => other,
        }
    }
}
