//! CLI argument definitions.

use clap::Parser;

/// Provision a React Native and Android emulator development environment.
///
/// Running without arguments performs every step that is not already in
/// place. Set `DEVPROV_CONFIG` to a YAML file to override defaults and
/// `DEVPROV_ROOT` to change the install root.
#[derive(Debug, Parser)]
#[command(name = "devprov")]
#[command(author, version, about, long_about = None)]
pub struct Cli {}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_arguments_parse() {
        assert!(Cli::try_parse_from(["devprov"]).is_ok());
    }

    #[test]
    fn unknown_arguments_rejected() {
        assert!(Cli::try_parse_from(["devprov", "--force"]).is_err());
    }
}
