//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// hist - shell history scoped to session, directory and everything else
#[derive(Parser, Debug)]
#[command(name = "hist", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.hist/data/history.db)
    #[arg(long, global = true, env = "HIST_DB")]
    pub db: Option<PathBuf>,

    /// Shell application name of the calling session (zsh, bash, ...)
    #[arg(long, global = true, env = "HIST_APP")]
    pub app: Option<String>,

    /// Process id of the calling shell
    #[arg(long, global = true, env = "HIST_PID")]
    pub pid: Option<i64>,

    /// How long to wait on a locked database, in milliseconds
    #[arg(long, global = true, env = "HIST_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the history database, or upgrade an existing one
    Init,

    /// Show schema version and row counts
    Status,

    /// Record a command (called from the shell hook)
    Record(RecordArgs),

    /// Most recent command starting with a prefix
    Search(SearchArgs),

    /// Recent commands for this session, directory, then everywhere
    Recent(RecentArgs),

    /// Commands in an id range, one per distinct text
    List(ListArgs),

    /// Show a single command by id
    Show {
        /// Command id
        id: i64,
    },

    /// Stream every distinct command, newest first (for fzf)
    Export {
        /// Prefix each line with the command id and a tab
        #[arg(long)]
        with_id: bool,
    },

    /// Session registry
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// History Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Command text, as typed
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Exit status of the command
    #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
    pub exit_status: i64,

    /// Run time in milliseconds
    #[arg(short, long)]
    pub duration_ms: Option<i64>,

    /// Seconds since the epoch (defaults to now)
    #[arg(long)]
    pub timestamp: Option<i64>,

    /// Working directory (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<String>,

    /// Don't look up the git remote and branch
    #[arg(long)]
    pub no_git: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Text the command starts with
    #[arg(default_value = "", allow_hyphen_values = true)]
    pub prefix: String,

    /// Working directory for directory scope (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<String>,

    /// Skip directory scope
    #[arg(long, conflicts_with = "cwd")]
    pub no_cwd: bool,

    /// Also match invocations of hist itself
    #[arg(long)]
    pub include_self: bool,
}

#[derive(Args, Debug)]
pub struct RecentArgs {
    /// Maximum commands to return
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Return only the command at this 0-based position
    #[arg(short, long, conflicts_with = "limit")]
    pub offset: Option<usize>,

    /// Only commands starting with this text
    #[arg(short, long, allow_hyphen_values = true)]
    pub prefix: Option<String>,

    /// Working directory for directory scope (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<String>,

    /// Also include invocations of hist itself
    #[arg(long)]
    pub include_self: bool,
}

/// How `list` removes repeated commands.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DedupArg {
    /// Use the stored duplicate flag when it applies
    #[default]
    Flag,
    /// Always group the range by text
    Aggregate,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// First id; zero or negative counts back from the latest
    #[arg(default_value_t = -9, allow_negative_numbers = true)]
    pub first: i64,

    /// Last id; zero or negative counts back from the latest
    #[arg(default_value_t = 0, allow_negative_numbers = true)]
    pub last: i64,

    /// Shell glob the command must match (`*`, `?`)
    #[arg(short, long)]
    pub pattern: Option<String>,

    /// Only commands from the calling session (needs --app and --pid)
    #[arg(short, long)]
    pub session: bool,

    /// Dedup strategy
    #[arg(long, value_enum, default_value_t)]
    pub dedup: DedupArg,
}

// ============================================================================
// Session Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Show whether the calling session is active
    Status,

    /// Close every active session for a pid (called when the shell exits)
    Close {
        /// Process id (defaults to --pid)
        pid: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_accepts_negative_bounds() {
        let cli = Cli::try_parse_from(["hist", "list", "-20", "-5"]).unwrap();
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.first, -20);
                assert_eq!(args.last, -5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_record_joins_words() {
        let cli = Cli::try_parse_from(["hist", "record", "-e", "1", "--", "git", "commit", "-m", "x"])
            .unwrap();
        match cli.command {
            Commands::Record(args) => {
                assert_eq!(args.command.join(" "), "git commit -m x");
                assert_eq!(args.exit_status, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
