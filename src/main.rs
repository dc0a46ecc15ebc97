//! hist CLI entry point.

use clap::Parser;
use hist::cli::commands::{self, Globals};
use hist::cli::{Cli, Commands};
use hist::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Effective JSON mode: --json, or stdout is not a terminal and the
    // command produces structured output.
    let json = cli.json || (wants_structured(&cli.command) && !is_stdout_tty());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn is_stdout_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stdout())
}

/// Commands whose plain output is meant for pipes (shell widgets, fzf) keep
/// it when stdout is redirected.
const fn wants_structured(command: &Commands) -> bool {
    !matches!(
        command,
        Commands::Search(_)
            | Commands::Recent(_)
            | Commands::List(_)
            | Commands::Export { .. }
            | Commands::Record(_)
            | Commands::Completions { .. }
    )
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    let globals = Globals::from_cli(cli, json);

    match &cli.command {
        Commands::Init => commands::init::execute(&globals),
        Commands::Status => commands::status::execute(&globals),
        Commands::Version => commands::version::execute(json),

        // History
        Commands::Record(args) => commands::record::execute(args, &globals),
        Commands::Search(args) => commands::search::execute(args, &globals),
        Commands::Recent(args) => commands::recent::execute(args, &globals),
        Commands::List(args) => commands::list::execute(args, &globals),
        Commands::Show { id } => commands::show::execute(*id, &globals),
        Commands::Export { with_id } => commands::export::execute(*with_id, &globals),

        // Sessions
        Commands::Session { command } => commands::session::execute(command, &globals),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
