//! The React Native + Android provisioning pipeline.
//!
//! Steps run in this order:
//!
//! 1. `directories` - fixed layout under the root
//! 2. `node` - Node.js LTS through the package manager
//! 3. `java` - JDK and `JAVA_HOME`
//! 4. `cmdline-tools` - Android command-line tools from ranked mirrors
//! 5. `environment` - `ANDROID_HOME`, `ANDROID_AVD_HOME` and `PATH`
//! 6. `licenses` - SDK license prompts
//! 7. `sdk-packages` - platform tools, platform, emulator, system image
//! 8. `device` - the named virtual device
//! 9. `app` - Expo application scaffold

pub mod android;
pub mod runtime;
pub mod workspace;

pub use android::{
    android_overlay, sdk_tool, AcceptLicenses, CommandLineTools, PersistEnvironment, SdkPackages,
    VirtualDevice,
};
pub use runtime::{detect_java_home, install_package, JavaRuntime, NodeRuntime};
pub use workspace::{next_actions, CreateDirectories, ScaffoldApp};

use crate::error::Result;
use crate::runlog::RunLog;
use crate::shell::is_elevated;
use crate::steps::{ProvisioningStep, RunSummary, Sequencer, StepContext};

/// Every step, in run order.
pub fn pipeline() -> Vec<Box<dyn ProvisioningStep>> {
    vec![
        Box::new(CreateDirectories),
        Box::new(NodeRuntime),
        Box::new(JavaRuntime),
        Box::new(CommandLineTools),
        Box::new(PersistEnvironment),
        Box::new(AcceptLicenses),
        Box::new(SdkPackages),
        Box::new(VirtualDevice),
        Box::new(ScaffoldApp),
    ]
}

/// Run the whole pipeline.
pub fn provision(ctx: &mut StepContext<'_>) -> Result<RunSummary> {
    let actions = next_actions(ctx);
    let mut sequencer = Sequencer::new(pipeline()).with_next_actions(actions);
    let summary = sequencer.run(ctx)?;

    ctx.log().info("Next steps:");
    for (i, action) in summary.next_actions.iter().enumerate() {
        ctx.log().info(&format!("  {}. {}", i + 1, action));
    }
    Ok(summary)
}

/// Warn about a privilege level that commonly breaks installs.
///
/// Windows package installs and user environment edits want an elevated
/// shell; Homebrew refuses to run as root.
pub fn check_privileges(log: &RunLog) {
    match (cfg!(windows), is_elevated()) {
        (true, Some(false)) => log.warn(
            "Not running as Administrator. Some installs and PATH edits may fail.",
        ),
        (false, Some(true)) => {
            log.warn("Running as root. Homebrew and npm installs may refuse or misbehave.")
        }
        (_, None) => log.info("Could not determine administrator status. Proceeding..."),
        _ => {}
    }
}
