use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tei_linker::{db, Compiler, DocumentCache, Indexer, Settings, UrnResolver};

#[derive(Parser)]
#[command(name = "tei-link")]
#[command(about = "Index and compile cross-referenced TEI projects")]
struct Cli {
    /// Directory holding one subdirectory per project
    #[arg(long, env = "TEI_LINKER_PROJECTS", default_value = "project")]
    projects: PathBuf,

    /// Index database (defaults to the user data directory)
    #[arg(long, env = "TEI_LINKER_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring the index in line with the project directory
    Sync,
    /// Scan every file of one project into the index
    Index { project: String },
    /// Show where a URN or URN range is defined
    Resolve { urn: String },
    /// Compile a source file into a self-contained document
    Compile {
        project: String,
        file_name: String,

        /// YAML settings file (defaults to trusting only PROJECT)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Count indexed files, URNs and references per project
    Stats,
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "tei_linker=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let db = match path {
        Some(path) => db::Database::open(path.clone())
            .with_context(|| format!("opening index database {}", path.display()))?,
        None => db::Database::open_default().context("opening default index database")?,
    };
    db.migrate().context("migrating index database")?;
    Ok(db)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let db = open_database(cli.database)?;

    match cli.command {
        Commands::Sync => {
            let report = Indexer::new(&db)
                .sync_projects(&cli.projects)
                .with_context(|| format!("syncing {}", cli.projects.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Index { project } => {
            let count = Indexer::new(&db)
                .index_project(&project, &cli.projects)
                .with_context(|| format!("indexing project {}", project))?;
            println!("Indexed {} rows from {}", count, project);
        }
        Commands::Resolve { urn } => {
            let resolutions = UrnResolver::new(&db)
                .resolve_range(&urn)
                .with_context(|| format!("resolving {}", urn))?;
            let located: Vec<_> = resolutions
                .iter()
                .map(|resolution| {
                    let path = UrnResolver::path_of(resolution.start(), &cli.projects);
                    serde_json::json!({
                        "resolution": resolution,
                        "path": path.display().to_string(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&located)?);
        }
        Commands::Compile {
            project,
            file_name,
            settings,
            output,
        } => {
            let settings = match settings {
                Some(path) => Settings::load(&path)?,
                None => Settings::for_project(&project),
            };
            settings.validate(&cli.projects)?;

            let cache = Arc::new(DocumentCache::new(&cli.projects));
            let compiler = Compiler::new(cache, db, settings);
            let xml = compiler
                .compile_to_string(&project, &file_name)
                .with_context(|| format!("compiling {}/{}", project, file_name))?;

            match output {
                Some(path) => {
                    std::fs::write(&path, xml)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!("Wrote {}", path.display());
                }
                None => println!("{}", xml),
            }
        }
        Commands::Stats => {
            let stats = db
                .list_projects()?
                .iter()
                .map(|project| db.project_stats(project))
                .collect::<Result<Vec<_>, _>>()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
