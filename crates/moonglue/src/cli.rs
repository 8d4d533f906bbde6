//! CLI argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "moonglue")]
#[command(author, version, about = "Lua script runner with pretty printing and host plugins")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    /// Lua file to execute (shorthand for `moonglue run <file>`)
    pub file: Option<String>,

    /// Arguments to pass to the Lua script
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Disable colored output (NO_COLOR is honoured as well)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Root directory for the fs plugin (defaults to the script's directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub sandbox: Option<PathBuf>,

    /// Expose shell execution and environment hooks in `os`
    #[arg(long = "unsafe", global = true)]
    pub unsafe_os: bool,
}

impl Settings {
    /// Whether output should carry ANSI colors.
    pub fn use_colors(&self) -> bool {
        !self.no_color && colored::control::SHOULD_COLORIZE.should_colorize()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a Lua file
    Run {
        /// The Lua file to execute
        file: String,

        /// Arguments to pass to the script
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },

    /// Start the interactive REPL
    Repl,

    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_shorthand() {
        let cli = Cli::try_parse_from(["moonglue", "script.lua", "a", "b"]).unwrap();
        assert_eq!(cli.file.as_deref(), Some("script.lua"));
        assert_eq!(cli.args, vec!["a", "b"]);
        assert!(!cli.settings.unsafe_os);
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "moonglue",
            "--no-color",
            "--unsafe",
            "--sandbox",
            "/tmp/box",
            "run",
            "main.lua",
        ])
        .unwrap();
        assert!(cli.settings.no_color);
        assert!(cli.settings.unsafe_os);
        assert_eq!(cli.settings.sandbox, Some(PathBuf::from("/tmp/box")));
        assert!(!cli.settings.use_colors());
        match cli.command {
            Some(Commands::Run { file, .. }) => assert_eq!(file, "main.lua"),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_repl() {
        let cli = Cli::try_parse_from(["moonglue", "repl", "--no-color"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Repl)));
        assert!(cli.settings.no_color);
    }
}
