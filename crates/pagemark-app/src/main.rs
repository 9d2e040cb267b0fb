//! Main application entry point.

use clap::{Parser, Subcommand};
use pagemark_app::{App, AppResult, load_record, summarize};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pagemark", about = "Flatten and inspect PDF page annotations", version)]
struct Cli {
    /// JSON editor config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite annotations over page images, one PNG per page
    Flatten {
        /// Page images, in page order
        #[arg(required = true)]
        pages: Vec<PathBuf>,

        /// Annotation record (defaults to the auto-saved record of the first page file)
        #[arg(short, long)]
        annotations: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "flattened")]
        out: PathBuf,

        /// Device pixel ratio of the output
        #[arg(long)]
        dpr: Option<f64>,
    },

    /// Print per-page annotation counts
    Inspect {
        /// Annotation record
        #[arg(short, long)]
        annotations: PathBuf,
    },

    /// List auto-saved documents
    List,
}

fn run(cli: Cli) -> AppResult<()> {
    let app = App::from_config_file(cli.config.as_deref())?;
    match cli.command {
        Commands::Flatten {
            pages,
            annotations,
            out,
            dpr,
        } => {
            let record = match annotations {
                Some(path) => load_record(&path)?,
                None => app.restore_saved(&pages[0])?,
            };
            let written = app.flatten(&pages, record, &out, dpr)?;
            println!("Wrote {} page(s) to {}", written.len(), out.display());
        }
        Commands::Inspect { annotations } => {
            let record = load_record(&annotations)?;
            println!("{} ({} annotation(s))", record.key(), record.annotation_count());
            for summary in summarize(&record.pages) {
                println!("{summary}");
            }
        }
        Commands::List => {
            for key in app.saved_documents()? {
                println!("{key}");
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("pagemark: {e}");
            ExitCode::FAILURE
        }
    }
}
