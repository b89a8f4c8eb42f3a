//! Command-line interface for `schemamap`, which converts GeMS habitat layers into the
//! JNCC attribute schema.
//!
//! This binary provides a thin CLI over the [`schemamap_core`] library, operating on a
//! workspace directory whose `.geojson` files are the feature collections.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! It parses arguments, configures logging, and delegates to command handlers. Library
//! errors are reported with their user message and recovery suggestion.
//!
//! # Available Commands
//!
//! - `map` - Copy a GeMS collection into a new JNCC-schema collection
//! - `schema` - Show the target schema and how each field is filled
//! - `fields` - List the fields of a collection
//! - `list` - List the collections of a workspace

mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{Level, debug, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use schemamap_core::config::{MappingConfig, MappingOptions, MappingPlan};
use schemamap_core::error::SchemaMapError;
use schemamap_core::mapper::SchemaMapper;
use schemamap_core::schema::GeometryKind;
use schemamap_core::store::{FeatureStore, GeoJsonWorkspace};

#[derive(Parser)]
#[command(
    name = "schemamap",
    version,
    about = "Map GeMS habitat layers onto the JNCC schema",
    long_about = "schemamap copies the GeMS fields of a habitat layer into a new collection,\n\
                  renames them, and adds and populates the fields the JNCC schema requires."
)]
/// Command-line arguments and options for the `schemamap` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `schemamap` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Maps a GeMS collection into a new JNCC-schema collection.
    Map {
        /// Workspace directory holding the collections.
        #[arg(short, long, value_name = "DIR")]
        workspace: PathBuf,

        /// Name of the GeMS input collection.
        #[arg(short, long, value_name = "NAME")]
        input: String,

        /// Name of the collection to create.
        #[arg(short, long, value_name = "NAME")]
        output: String,

        /// Geometry kind of the layer: point, line, pointline or polygon.
        #[arg(short, long, value_name = "KIND")]
        geometry: GeometryKind,

        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Shows the schema a geometry kind maps onto.
    Schema {
        /// Geometry kind of the layer: point, line, pointline or polygon.
        #[arg(short, long, value_name = "KIND")]
        geometry: GeometryKind,

        #[command(flatten)]
        mapping: MappingArgs,
    },

    /// Lists the fields of a collection.
    Fields {
        /// Workspace directory holding the collections.
        #[arg(short, long, value_name = "DIR")]
        workspace: PathBuf,

        /// Collection name.
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Lists the collections of a workspace.
    List {
        /// Workspace directory holding the collections.
        #[arg(short, long, value_name = "DIR")]
        workspace: PathBuf,
    },
}

/// Options shared by commands that build a mapping plan.
#[derive(Args, Debug, Default, Clone)]
struct MappingArgs {
    /// JSON file replacing the field mapping, values or schemas.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Date the GeMS data was downloaded (YYYY-MM-DD).
    #[arg(long, value_name = "DATE")]
    source_date: Option<String>,

    /// Code written to FeaturCode.
    #[arg(long, value_name = "CODE")]
    feature_code: Option<String>,

    /// Relation written to TranRelate (maerl layers use '=').
    #[arg(long, value_name = "REL")]
    tran_relate: Option<String>,

    /// Authority written to SNCB_Auth and FeaDetName.
    #[arg(long, value_name = "NAME")]
    authority: Option<String>,

    /// Read FeaturName from ANNEX_I_PH (lagoon layers).
    #[arg(long)]
    lagoon: bool,
}

impl MappingArgs {
    fn options(&self) -> MappingOptions {
        let mut options = MappingOptions::new().with_lagoon(self.lagoon);
        if let Some(date) = &self.source_date {
            options = options.with_source_date(date);
        }
        if let Some(code) = &self.feature_code {
            options = options.with_feature_code(code);
        }
        if let Some(relation) = &self.tran_relate {
            options = options.with_tran_relate(relation);
        }
        if let Some(authority) = &self.authority {
            options = options.with_authority(authority);
        }
        options
    }

    fn plan(&self) -> schemamap_core::Result<MappingPlan> {
        let options = self.options();
        match &self.config {
            Some(path) => MappingConfig::from_file(path)?.resolve(&options),
            None => MappingPlan::from_options(&options),
        }
    }
}

/// Entry point for the `schemamap` command-line interface.
///
/// Parses arguments, configures logging from the verbosity flags, and dispatches
/// to the command handler. Exits non-zero when the command fails.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.debug) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: bool, debug: bool) -> Result<()> {
    let log_level = if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn report_error(error: &SchemaMapError) {
    eprintln!("Error: {}", error.user_message());
    if let Some(suggestion) = error.recovery_suggestion() {
        eprintln!("Hint: {suggestion}");
    }
}

fn run(command: Commands) -> schemamap_core::Result<()> {
    match command {
        Commands::Map {
            workspace,
            input,
            output,
            geometry,
            mapping,
        } => {
            info!("Mapping {input} to {output}");
            handle_map(&workspace, &input, &output, geometry, &mapping)
        },
        Commands::Schema { geometry, mapping } => handle_schema(geometry, &mapping),
        Commands::Fields { workspace, name } => handle_fields(&workspace, &name),
        Commands::List { workspace } => handle_list(&workspace),
    }
}

fn handle_map(
    workspace: &Path,
    input: &str,
    output: &str,
    geometry: GeometryKind,
    mapping: &MappingArgs,
) -> schemamap_core::Result<()> {
    let plan = mapping.plan()?;
    debug!("Mapping plan: {plan:?}");

    let mut store = GeoJsonWorkspace::open(workspace)?;
    let report = SchemaMapper::from_plan(&plan).run(&mut store, input, output, geometry)?;
    info!("Mapping complete.");

    display::display_report(&report);
    Ok(())
}

fn handle_schema(geometry: GeometryKind, mapping: &MappingArgs) -> schemamap_core::Result<()> {
    let plan = mapping.plan()?;
    display::display_schema(&plan, geometry);
    Ok(())
}

fn handle_fields(workspace: &Path, name: &str) -> schemamap_core::Result<()> {
    let store = GeoJsonWorkspace::open(workspace)?;
    let info = store.describe_collection(name)?;
    display::display_collection_info(&info);
    Ok(())
}

fn handle_list(workspace: &Path) -> schemamap_core::Result<()> {
    let store = GeoJsonWorkspace::open(workspace)?;
    let collections = store
        .collection_names()?
        .iter()
        .map(|name| store.describe_collection(name))
        .collect::<schemamap_core::Result<Vec<_>>>()?;
    display::display_collections(&store.root().display().to_string(), &collections);
    Ok(())
}
