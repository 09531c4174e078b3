#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the deforestation dashboard.
//!
//! Lists the embedded datasets, prints a pipeline summary for a filter
//! selection, exports the map layers as `GeoJSON`, or starts the API
//! server.

mod export;
mod summary;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use deforest_map_loader::{Layers, registry};
use deforest_map_pipeline::{FilterOptions, FilterSelection, PropertySelector};
use deforest_map_property_models::{AttributionStrategy, DatasetDefinition, PropertyAttribute};
use deforest_map_server::ServerConfig;

#[derive(Parser)]
#[command(name = "deforest_map", about = "Deforestation attribution dashboard")]
struct Cli {
    /// Dataset id (e.g. "feijo") or path to a dataset definition `.toml`
    #[arg(long, global = true, env = "DATASET", default_value = "feijo")]
    dataset: String,

    /// Directory the dataset's layer paths are relative to. Defaults to
    /// the definition's directory for `.toml` paths, `data` otherwise.
    #[arg(long, global = true, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the embedded dataset definitions
    Datasets,
    /// Print headline metrics and both tables for a selection
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Write every map layer as `GeoJSON` plus `dashboard.json`
    Export {
        /// Output directory (created if missing)
        #[arg(long)]
        out: PathBuf,
        /// Export only the deforestation inside the selected properties
        #[arg(long)]
        overlap_only: bool,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1")]
        bind: String,
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },
}

/// Filter selection flags. A filter that is not given selects every value.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Property size class to include (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Registration status to include (repeatable)
    #[arg(long = "status")]
    statuses: Vec<String>,
    /// Registration type to include (repeatable)
    #[arg(long = "type")]
    types: Vec<String>,
    /// A single property id, or "all"
    #[arg(long)]
    property: Option<String>,
    /// Attribution strategy (auto, overlay or precomputed). Defaults to
    /// the dataset's setting.
    #[arg(long)]
    strategy: Option<AttributionStrategy>,
}

impl FilterArgs {
    fn selection(&self, layers: &Layers) -> FilterSelection {
        let mut selection = FilterSelection::defaults(&FilterOptions::from_layers(layers));
        let filters = [
            (PropertyAttribute::Category, &self.categories),
            (PropertyAttribute::Status, &self.statuses),
            (PropertyAttribute::PropertyType, &self.types),
        ];
        for (attribute, values) in filters {
            if !values.is_empty() {
                selection.restrict(attribute, values.iter().cloned());
            }
        }
        if let Some(property) = &self.property {
            selection.property = PropertySelector::from(property.as_str());
        }
        selection
    }

    fn strategy(&self, definition: &DatasetDefinition) -> AttributionStrategy {
        self.strategy.unwrap_or(definition.attribution)
    }
}

/// Data directory for a dataset argument.
fn resolve_data_dir(dataset: &str, data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        let path = Path::new(dataset);
        if path.extension().is_some_and(|ext| ext == "toml") {
            path.parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        } else {
            PathBuf::from("data")
        }
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(&cli.dataset, cli.data_dir);

    match cli.command {
        Commands::Datasets => {
            for definition in registry::all_definitions() {
                println!(
                    "{:<10} {} (working CRS {}, attribution {})",
                    definition.id, definition.name, definition.working_crs, definition.attribution
                );
            }
        }
        Commands::Summary { filters } => {
            let definition = registry::resolve(&cli.dataset)?;
            let layers = deforest_map_loader::load(&definition, &data_dir)?;
            let dashboard = deforest_map_report::build(
                &layers,
                &filters.selection(&layers),
                filters.strategy(&definition),
                deforest_map_report::DashboardOptions::default(),
            )?;
            summary::print(&dashboard);
        }
        Commands::Export {
            out,
            overlap_only,
            filters,
        } => {
            let definition = registry::resolve(&cli.dataset)?;
            let layers = deforest_map_loader::load(&definition, &data_dir)?;
            let dashboard = deforest_map_report::build(
                &layers,
                &filters.selection(&layers),
                filters.strategy(&definition),
                deforest_map_report::DashboardOptions { overlap_only },
            )?;
            export::write(&dashboard, &out)?;
        }
        Commands::Serve { bind, port } => {
            let config = ServerConfig {
                bind_addr: bind,
                port,
                dataset: cli.dataset,
                data_dir,
            };
            actix_web::rt::System::new().block_on(deforest_map_server::run_server(config))?;
        }
    }

    Ok(())
}
