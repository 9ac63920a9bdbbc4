//! Command line interface.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "meetrelay")]
#[command(about = "Meeting bot relay with live status streaming", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bare_invocation() {
        let cli = Cli::try_parse_from(["meetrelay"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parses_version_subcommand() {
        let cli = Cli::try_parse_from(["meetrelay", "--verbose", "version"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(CliCommand::Version)));
    }
}
