#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Turns a pipeline run into the dashboard payload.
//!
//! Reprojects geometry to the display CRS, styles the map layers, builds
//! the condition summary and per-property tables, and formats the
//! headline numbers. Nothing here feeds back into the pipeline.

pub mod format;
pub mod map;
pub mod tables;

use deforest_map_loader::Layers;
use deforest_map_pipeline::{FilterSelection, Metrics, PipelineError, PipelineOutput};
use deforest_map_property_models::AttributionStrategy;
use serde::Serialize;

pub use format::{format_br, group_thousands};
pub use map::MapView;
pub use tables::{ConditionRow, PropertyRow};

/// Presentation toggles that do not affect the computed figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardOptions {
    /// Draw only the deforestation inside surviving properties.
    pub overlap_only: bool,
}

/// Headline numbers as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricLabels {
    pub municipality_total_ha: String,
    pub properties_total_ha: String,
    pub property_count: String,
}

impl From<&Metrics> for MetricLabels {
    fn from(metrics: &Metrics) -> Self {
        Self {
            municipality_total_ha: format_br(metrics.municipality_total_ha),
            properties_total_ha: format_br(metrics.properties_total_ha),
            property_count: group_thousands(metrics.property_count),
        }
    }
}

/// The full dashboard for one selection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub dataset_id: String,
    pub title: String,
    /// Strategy used for this run.
    pub strategy: AttributionStrategy,
    pub metrics: Metrics,
    pub metric_labels: MetricLabels,
    pub map: MapView,
    pub condition_summary: Vec<ConditionRow>,
    pub property_table: Vec<PropertyRow>,
}

/// Runs the pipeline and presents the result.
///
/// # Errors
///
/// Returns [`PipelineError`] if the pipeline run fails.
pub fn build(
    layers: &Layers,
    selection: &FilterSelection,
    strategy: AttributionStrategy,
    options: DashboardOptions,
) -> Result<Dashboard, PipelineError> {
    let output = deforest_map_pipeline::run(layers, selection, strategy)?;
    Ok(present(layers, &output, selection, options))
}

/// Presents an already computed run.
#[must_use]
pub fn present(
    layers: &Layers,
    output: &PipelineOutput<'_>,
    selection: &FilterSelection,
    options: DashboardOptions,
) -> Dashboard {
    log::debug!(
        "Presenting {} properties (overlap only: {})",
        output.properties.len(),
        options.overlap_only
    );

    Dashboard {
        dataset_id: layers.definition.id.clone(),
        title: format!("Análise de Desmatamento — {}", layers.definition.name),
        strategy: output.strategy,
        metrics: output.metrics,
        metric_labels: MetricLabels::from(&output.metrics),
        map: map::build(layers, output, selection, options.overlap_only),
        condition_summary: tables::condition_summary(&output.properties),
        property_table: tables::property_table(&output.properties),
    }
}
