//! CLI command handling.
//!
//! Provides subcommands for:
//! - Running a command and streaming its output (`exec`)

mod exec;

pub use exec::{ExecArgs, exit_code, parse_env_pair, run_exec_command};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "labelkit")]
#[command(about = "Run commands for the translation label editor and stream their output")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command, forwarding its output as it arrives
    Exec(ExecArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec_with_flags() {
        let cli = Cli::try_parse_from([
            "labelkit",
            "--verbose",
            "exec",
            "--timeout-ms",
            "500",
            "--env",
            "LANG=C",
            "ls",
            "-la",
        ])
        .unwrap();

        assert!(cli.verbose);
        let Command::Exec(args) = cli.command;
        assert_eq!(args.command, "ls");
        assert_eq!(args.args, vec!["-la".to_string()]);
        assert_eq!(args.timeout_ms, Some(500));
        assert_eq!(args.env, vec![("LANG".to_string(), "C".to_string())]);
    }

    #[test]
    fn test_hyphen_args_after_command_are_passed_through() {
        let cli = Cli::try_parse_from(["labelkit", "exec", "grep", "-r", "--count", "key"]).unwrap();
        let Command::Exec(args) = cli.command;
        assert_eq!(args.command, "grep");
        assert_eq!(args.args, vec!["-r", "--count", "key"]);
        assert!(!args.json);
    }

    #[test]
    fn test_exec_requires_command() {
        assert!(Cli::try_parse_from(["labelkit", "exec"]).is_err());
    }

    #[test]
    fn test_bad_env_pair_is_rejected() {
        assert!(Cli::try_parse_from(["labelkit", "exec", "--env", "NOEQUALS", "true"]).is_err());
    }

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
