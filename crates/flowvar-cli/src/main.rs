mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, run::RunInput};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "flowvar",
    about = "Run flow actions against typed variables: set, increment, flip, trigger, evaluate",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .flowvar/)
    #[arg(long, global = true, env = "FLOWVAR_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log skipped actions and store updates
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .flowvar/ with a config and an empty variable snapshot
    Init,

    /// List all variables in store order
    List,

    /// List the action kinds and the variable type each one accepts
    Actions,

    /// Run one action against the variable snapshot
    Run {
        /// Action id, e.g. increment_number_variable
        action: String,

        /// Target variable name
        #[arg(long)]
        variable: Option<String>,

        /// New value or delta (passed as text)
        #[arg(long, allow_hyphen_values = true)]
        value: Option<String>,

        /// Text compared case-insensitively to "true" (set_boolean_variable)
        #[arg(long)]
        boolean_value: Option<String>,

        /// Expression with {name} references (execute_expression)
        #[arg(long, allow_hyphen_values = true)]
        expression: Option<String>,

        /// Full argument object as JSON, e.g. '{"variable":{"name":"x"},"value":3}'
        #[arg(long = "args", value_name = "JSON")]
        args_json: Option<String>,
    },

    /// Find variables selectable for an action (case-insensitive name match)
    Search {
        /// Action id
        action: String,

        /// Part of the variable name (omit to list every candidate)
        query: Option<String>,
    },

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::List => cmd::list::run(&root, cli.json),
        Commands::Actions => cmd::actions::run(cli.json),
        Commands::Run {
            action,
            variable,
            value,
            boolean_value,
            expression,
            args_json,
        } => cmd::run::run(
            &root,
            &action,
            RunInput {
                args_json,
                variable,
                value,
                boolean_value,
                expression,
            },
            cli.json,
        ),
        Commands::Search { action, query } => {
            cmd::search::run(&root, &action, query.as_deref(), cli.json)
        }
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
