#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The attribution pipeline: filter, attribute, aggregate.
//!
//! [`run`] is a pure function of the loaded layers and the current
//! selection. It is re-run to completion on every filter change and
//! borrows from the layers instead of copying geometry.

pub mod aggregate;
pub mod attribution;
pub mod filter;

use deforest_map_loader::Layers;
use deforest_map_property_models::AttributionStrategy;
use thiserror::Error;

pub use aggregate::Metrics;
pub use attribution::{AttributedProperty, Fragment, Percent};
pub use filter::{FilterOptions, FilterSelection, PropertySelector};

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The precomputed strategy needs an intersection layer.
    #[error("Dataset '{dataset}' has no precomputed intersection layer")]
    MissingIntersections {
        /// Dataset id.
        dataset: String,
    },
}

/// Everything one run derives from the layers.
#[derive(Debug, Clone)]
pub struct PipelineOutput<'a> {
    /// The strategy actually used (never [`AttributionStrategy::Auto`]).
    pub strategy: AttributionStrategy,
    /// Filtered properties in layer order, with their deforestation.
    pub properties: Vec<AttributedProperty<'a>>,
    /// Overlap fragments of the filtered properties.
    pub fragments: Vec<Fragment<'a>>,
    pub metrics: Metrics,
}

/// Runs filter, attribution and aggregation over `layers`.
///
/// # Errors
///
/// Returns [`PipelineError::MissingIntersections`] if the precomputed
/// strategy is requested for a dataset without an intersection layer.
pub fn run<'a>(
    layers: &'a Layers,
    selection: &FilterSelection,
    strategy: AttributionStrategy,
) -> Result<PipelineOutput<'a>, PipelineError> {
    let strategy = attribution::resolve_strategy(strategy, layers)?;
    let filtered = selection.apply(&layers.properties);

    let fragments = match (&layers.intersections, strategy) {
        (Some(intersections), AttributionStrategy::Precomputed) => {
            attribution::precomputed_fragments(&filtered, intersections)
        }
        _ => attribution::overlay_fragments(&filtered, &layers.deforestation),
    };

    let areas = attribution::area_by_property(&fragments);
    let properties = attribution::attribute(&filtered, &areas);
    let metrics = aggregate::aggregate(&layers.deforestation, &layers.municipality, &properties);

    log::info!(
        "Pipeline run on '{}' ({strategy}): {} of {} properties, {} fragments, \
         {:.2} ha in properties, {:.2} ha in municipality",
        layers.definition.id,
        metrics.property_count,
        layers.properties.len(),
        fragments.len(),
        metrics.properties_total_ha,
        metrics.municipality_total_ha
    );

    Ok(PipelineOutput {
        strategy,
        properties,
        fragments,
        metrics,
    })
}
