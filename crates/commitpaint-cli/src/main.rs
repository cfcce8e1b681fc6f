mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, pattern::PatternSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "commitpaint",
    about = "Paint a contribution graph and turn it into backdated git commits",
    version,
    propagate_version = true
)]
struct Cli {
    /// Working root (default: auto-detect from .commitpaint/ or .git/)
    #[arg(long, global = true, env = "COMMITPAINT_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and ignore .commitpaint/ in git
    Init,

    /// Create, paint and inspect save slots
    Pattern {
        #[command(subcommand)]
        subcommand: PatternSubcommand,
    },

    /// Show the commits a slot would produce, without touching the repository
    Plan {
        /// Save slot to plan
        slot: String,
        /// Seed for pseudo-random placement inside working hours
        #[arg(long)]
        seed: Option<u64>,
        /// Print at most this many directives (0 = all)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Create the backdated commits for a slot in the current repository
    Generate {
        /// Save slot to generate
        slot: String,
        /// Target branch (created if missing)
        #[arg(long)]
        branch: Option<String>,
        /// What to do when a commit fails: abort or continue
        #[arg(long, value_name = "POLICY")]
        on_failure: Option<String>,
        /// Seed for pseudo-random placement inside working hours
        #[arg(long)]
        seed: Option<u64>,
        /// Push the branch to origin after a clean run (set the remote with
        /// `commitpaint config remote <URL>`)
        #[arg(long)]
        push: bool,
    },

    /// Inspect and validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::Pattern { subcommand } => cmd::pattern::run(&root, subcommand, cli.json),
        Commands::Plan { slot, seed, limit } => cmd::plan::run(&root, &slot, seed, limit, cli.json),
        Commands::Generate {
            slot,
            branch,
            on_failure,
            seed,
            push,
        } => cmd::generate::run(
            &root,
            &slot,
            cmd::Overrides {
                branch,
                on_failure,
                seed,
            },
            push,
            cli.json,
        ),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
