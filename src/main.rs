//! `loaddata` command-line tool.
//!
//! Loads fixtures into, dumps and flushes the datastore named by the
//! settings.

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use loaddata::Result;
use loaddata::commands;
use loaddata::deserialize::DeserializeOptions;
use loaddata::persist::SqliteDatastore;
use loaddata::registry::Registry;
use loaddata::settings::Settings;

#[derive(Parser)]
#[command(name = "loaddata")]
#[command(author, version, about = "Load, dump and flush datastore fixtures")]
struct Cli {
    /// Settings file (toml, yaml or json); LOADDATA_* variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON schema describing the models fixtures may contain.
    #[arg(long, global = true, default_value = "schema.json")]
    schema: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one or more fixtures, in order.
    Load {
        #[arg(required = true)]
        fixtures: Vec<PathBuf>,
        /// Charset of byte-string values, overriding the configured default.
        #[arg(long)]
        encoding: Option<String>,
        /// Skip records that fail to load instead of stopping at the first one.
        #[arg(long)]
        keep_going: bool,
    },
    /// Write every stored entity as a JSON array of records.
    Dump {
        /// Defaults to standard output.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete every stored entity, then reinstall the initial data fixture if it exists.
    Flush,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();

    match run(cli, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, settings: &Settings) -> Result<()> {
    let store = SqliteDatastore::new(settings.persistence_mode())?;
    match cli.command {
        Commands::Load {
            fixtures,
            encoding,
            keep_going,
        } => {
            let registry = open_registry(&cli.schema)?;
            let options = DeserializeOptions { encoding };
            commands::load_fixtures(&store, &registry, &settings.context()?, &fixtures, &options, keep_going)?;
            Ok(())
        }
        Commands::Dump { output } => {
            let registry = open_registry(&cli.schema)?;
            match output {
                Some(path) => commands::dump(&store, &registry, BufWriter::new(File::create(path)?))?,
                None => commands::dump(&store, &registry, BufWriter::new(io::stdout().lock()))?,
            };
            Ok(())
        }
        Commands::Flush => {
            let initial_data = Path::new(&settings.initial_data);
            // the schema is only needed to reinstall the initial data
            let registry = if initial_data.is_file() {
                open_registry(&cli.schema)?
            } else {
                Registry::new()
            };
            commands::flush(
                &store,
                &registry,
                &settings.context()?,
                initial_data,
                &DeserializeOptions::default(),
            )?;
            Ok(())
        }
    }
}

fn open_registry(schema: &Path) -> Result<Registry> {
    let registry = Registry::from_schema(BufReader::new(File::open(schema)?))?;
    info!(schema = %schema.display(), models = registry.len(), "loaded schema");
    Ok(registry)
}
