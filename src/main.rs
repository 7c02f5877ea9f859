use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use sous::commands::{info, run, validate};
use sous::completions::generate_completions;

#[derive(Parser)]
#[command(name = "sous")]
#[command(about = "Guided cooking sessions in the terminal", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cook a recipe interactively (defaults to the bundled sample)
    Run {
        /// Path to an authored recipe file
        recipe: Option<PathBuf>,

        /// Disable colored output
        #[arg(long)]
        plain: bool,
    },

    /// Check an authored recipe file and show the resolved graph
    Validate {
        /// Path to an authored recipe file
        recipe: PathBuf,

        /// Print the resolved recipe as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a recipe overview
    Info {
        /// Path to an authored recipe file (defaults to the bundled sample)
        recipe: Option<PathBuf>,

        /// Print the resolved recipe as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { recipe, plain } => run::execute(recipe, plain),
        Commands::Validate { recipe, json } => validate::execute(recipe, json),
        Commands::Info { recipe, json } => info::execute(recipe, json),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate_completions(shell, &mut cmd);
            Ok(())
        }
    }
}
