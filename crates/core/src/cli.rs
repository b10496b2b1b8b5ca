//! Command-line surface.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt;

use crate::shell::Dialect;

/// Shell dialect selector as it appears on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ShellArg {
    Bash,
    Tcsh,
    Elisp,
}

impl From<ShellArg> for Dialect {
    fn from(value: ShellArg) -> Self {
        match value {
            ShellArg::Bash => Dialect::Bash,
            ShellArg::Tcsh => Dialect::Tcsh,
            ShellArg::Elisp => Dialect::Elisp,
        }
    }
}

impl fmt::Display for ShellArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Dialect::from(*self).as_str())
    }
}

#[derive(Parser, Debug)]
#[command(name = "pyenv")]
#[command(version, about = "Environment-modules manager: emits a command script for the parent shell to evaluate", long_about = None)]
pub struct Cli {
    /// Shell dialect to emit commands for
    #[arg(
        short = 's',
        long = "shell",
        value_enum,
        value_name = "SHELL",
        default_value_t = ShellArg::Bash,
        global = true
    )]
    pub shell: ShellArg,

    /// Mirror the emitted command script to stderr
    #[arg(long = "dump", global = true)]
    pub dump: bool,

    /// Emit the command script to stderr only and skip state persistence
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,

    /// Emit message text bare instead of wrapping it in (message ...) (elisp only)
    #[arg(long = "raw-msg-dump", global = true)]
    pub raw_msg_dump: bool,

    #[command(subcommand)]
    pub action: Action,
}

#[derive(Subcommand, Debug)]
pub enum Action {
    /// Load one or more modules into the parent shell
    Load(LoadArgs),
    /// Unload one or more loaded modules
    Unload(UnloadArgs),
    /// List the currently loaded modules
    Loaded,
    /// List every module known to the database
    Avail(AvailArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// Prefix to prepend to module names; should probably end with "."
    #[arg(long = "prefix", value_name = "STR", default_value = "")]
    pub prefix: String,

    /// Forcibly load the module, even if it is already loaded
    #[arg(long = "force")]
    pub force: bool,

    /// Modules to load
    #[arg(required = true, value_name = "MODULE")]
    pub modules: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UnloadArgs {
    /// Prefix to prepend to module names; should probably end with "."
    #[arg(long = "prefix", value_name = "STR", default_value = "")]
    pub prefix: String,

    /// Modules to unload
    #[arg(required = true, value_name = "MODULE")]
    pub modules: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AvailArgs {
    /// Only list modules whose recipe files parse
    #[arg(long = "check")]
    pub check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_global_stanza_before_the_action() {
        let cli = Cli::try_parse_from(["pyenv", "-s", "tcsh", "--dump", "load", "foo", "bar"])
            .unwrap();
        assert_eq!(cli.shell, ShellArg::Tcsh);
        assert!(cli.dump);
        assert!(!cli.dry_run);
        match cli.action {
            Action::Load(args) => {
                assert_eq!(args.modules, vec!["foo".to_string(), "bar".to_string()]);
                assert!(!args.force);
                assert_eq!(args.prefix, "");
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn defaults_to_bash() {
        let cli = Cli::try_parse_from(["pyenv", "loaded"]).unwrap();
        assert_eq!(cli.shell, ShellArg::Bash);
    }

    #[test]
    fn accepts_action_specific_flags() {
        let cli = Cli::try_parse_from([
            "pyenv", "load", "--prefix", "tools.", "--force", "cmake",
        ])
        .unwrap();
        match cli.action {
            Action::Load(args) => {
                assert_eq!(args.prefix, "tools.");
                assert!(args.force);
                assert_eq!(args.modules, vec!["cmake".to_string()]);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn global_flags_are_accepted_after_the_action() {
        let cli = Cli::try_parse_from(["pyenv", "avail", "--check", "-s", "elisp"]).unwrap();
        assert_eq!(cli.shell, ShellArg::Elisp);
        assert!(matches!(cli.action, Action::Avail(AvailArgs { check: true })));
    }

    #[test]
    fn rejects_missing_modules_and_unknown_actions() {
        assert!(Cli::try_parse_from(["pyenv", "load"]).is_err());
        assert!(Cli::try_parse_from(["pyenv", "explode"]).is_err());
        assert!(Cli::try_parse_from(["pyenv"]).is_err());
        assert!(Cli::try_parse_from(["pyenv", "-s", "fish", "loaded"]).is_err());
    }
}
