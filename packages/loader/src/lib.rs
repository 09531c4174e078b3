#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dataset definitions and layer loading.
//!
//! Reads the layers named by a [`DatasetDefinition`] from single-layer
//! `GeoJSON` files, normalizes property attributes through the definition's
//! [`FieldMapping`](deforest_map_property_models::FieldMapping), and
//! reprojects every geometry into the definition's planar working CRS.
//! CRS alignment happens here, once, so nothing downstream ever mixes
//! coordinate systems.
//!
//! Definitions are TOML files embedded at compile time (see [`registry`])
//! or read from disk. Loaded layers are memoized per dataset identity by
//! [`cache::LayerCache`].

pub mod cache;
pub mod layer;
pub mod normalize;
pub mod registry;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use deforest_map_property_models::{
    DatasetDefinition, DeforestationFeature, IntersectionFeature, LayerSource, MunicipalBoundary,
    Property,
};
use deforest_map_spatial::{Crs, SpatialError, overlay};
use geo::MultiPolygon;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// The named layers of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum LayerKind {
    Properties,
    Deforestation,
    Municipality,
    Intersections,
    Country,
}

/// Errors that can occur while loading a dataset.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// A layer or definition file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A layer file is not valid `GeoJSON`.
    #[error("Invalid GeoJSON in {path}: {source}")]
    GeoJson {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: geojson::Error,
    },

    /// A layer file holds a bare geometry instead of features.
    #[error("{layer} layer is not a FeatureCollection")]
    NotFeatureCollection {
        /// Offending layer.
        layer: LayerKind,
    },

    /// A feature has no geometry.
    #[error("{layer} layer, feature {index}: missing geometry")]
    MissingGeometry {
        /// Offending layer.
        layer: LayerKind,
        /// Zero-based feature position.
        index: usize,
    },

    /// A feature's geometry could not be converted.
    #[error("{layer} layer, feature {index}: {source}")]
    Geometry {
        /// Offending layer.
        layer: LayerKind,
        /// Zero-based feature position.
        index: usize,
        /// Underlying error.
        source: SpatialError,
    },

    /// A required attribute is absent or null.
    #[error("{layer} layer, feature {index}: missing required field '{field}'")]
    MissingField {
        /// Offending layer.
        layer: LayerKind,
        /// Zero-based feature position.
        index: usize,
        /// Column name from the field mapping.
        field: String,
    },

    /// Two properties share an id.
    #[error("Duplicate property id '{id}'")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },

    /// A layer that must contain at least one feature is empty.
    #[error("{layer} layer has no features")]
    EmptyLayer {
        /// Offending layer.
        layer: LayerKind,
    },

    /// A CRS code could not be used.
    #[error("CRS error in {context}: {source}")]
    Crs {
        /// Where the code came from (e.g. `working_crs`).
        context: String,
        /// Underlying error.
        source: SpatialError,
    },

    /// A dataset definition is not valid TOML or does not match the schema.
    #[error("Invalid dataset definition: {0}")]
    Definition(#[from] toml::de::Error),

    /// No embedded definition has this id and it is not a `.toml` path.
    #[error("Unknown dataset '{id}'")]
    UnknownDataset {
        /// The requested id.
        id: String,
    },
}

/// Every layer of one dataset, reprojected to its working CRS.
#[derive(Debug, Clone)]
pub struct Layers {
    /// The definition the layers were loaded from.
    pub definition: DatasetDefinition,
    /// Planar CRS all geometries below are expressed in.
    pub working_crs: Crs,
    /// Geographic CRS for map output.
    pub display_crs: Crs,
    pub properties: Vec<Property>,
    pub deforestation: Vec<DeforestationFeature>,
    pub municipality: MunicipalBoundary,
    pub intersections: Option<Vec<IntersectionFeature>>,
    pub country: Option<MultiPolygon<f64>>,
}

/// Resolves the working and display systems of a definition.
///
/// # Errors
///
/// Returns [`LoaderError::Crs`] if a code is unsupported, the working CRS
/// is geographic, or the display CRS is projected.
pub fn definition_crs(definition: &DatasetDefinition) -> Result<(Crs, Crs), LoaderError> {
    let working_crs = parse_crs(&definition.working_crs, "working_crs")
        .and_then(|crs| crs_context(crs.require_projected(), "working_crs"))?;
    let display_crs = parse_crs(&definition.display_crs, "display_crs")
        .and_then(|crs| crs_context(crs.require_geographic(), "display_crs"))?;
    Ok((working_crs, display_crs))
}

pub(crate) fn parse_crs(code: &str, context: &str) -> Result<Crs, LoaderError> {
    crs_context(code.parse(), context)
}

fn crs_context(result: Result<Crs, SpatialError>, context: &str) -> Result<Crs, LoaderError> {
    result.map_err(|source| LoaderError::Crs {
        context: context.to_string(),
        source,
    })
}

/// Loads every layer of a dataset from `data_dir`.
///
/// Any unreadable or malformed layer aborts the whole load.
///
/// # Errors
///
/// Returns [`LoaderError`] if a CRS is unusable, a file cannot be read or
/// parsed, a feature is malformed, property ids repeat, or the municipal
/// layer is empty.
pub fn load(definition: &DatasetDefinition, data_dir: &Path) -> Result<Layers, LoaderError> {
    let (working_crs, display_crs) = definition_crs(definition)?;
    let sources = &definition.layers;
    let fields = &definition.fields;

    log::info!(
        "Loading dataset '{}' from {} (working CRS {working_crs})",
        definition.id,
        data_dir.display()
    );

    let properties = layer::read(
        data_dir,
        &sources.properties,
        LayerKind::Properties,
        working_crs,
    )?
    .into_iter()
    .map(|feature| normalize::property(feature, fields))
    .collect::<Result<Vec<_>, _>>()?;
    ensure_unique_ids(&properties)?;

    let deforestation = layer::read(
        data_dir,
        &sources.deforestation,
        LayerKind::Deforestation,
        working_crs,
    )?
    .into_iter()
    .map(|feature| DeforestationFeature {
        boundary: feature.boundary,
    })
    .collect::<Vec<_>>();

    let municipality = MunicipalBoundary {
        boundary: read_outline(
            data_dir,
            &sources.municipality,
            LayerKind::Municipality,
            working_crs,
        )?,
    };

    let intersections = sources
        .intersections
        .as_ref()
        .map(|source| {
            layer::read(data_dir, source, LayerKind::Intersections, working_crs)?
                .into_iter()
                .map(|feature| normalize::intersection(feature, fields))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let country = sources
        .country
        .as_ref()
        .map(|source| read_outline(data_dir, source, LayerKind::Country, working_crs))
        .transpose()?;

    log::info!(
        "Loaded dataset '{}': {} properties, {} deforestation patches, {} intersection fragments",
        definition.id,
        properties.len(),
        deforestation.len(),
        intersections.as_ref().map_or(0, Vec::len)
    );

    Ok(Layers {
        definition: definition.clone(),
        working_crs,
        display_crs,
        properties,
        deforestation,
        municipality,
        intersections,
        country,
    })
}

/// Reads an outline layer and unions its features into one geometry.
fn read_outline(
    data_dir: &Path,
    source: &LayerSource,
    kind: LayerKind,
    working_crs: Crs,
) -> Result<MultiPolygon<f64>, LoaderError> {
    let mut features = layer::read(data_dir, source, kind, working_crs)?;
    if features.len() > 1 {
        return Ok(overlay::dissolve(features.iter().map(|f| &f.boundary)));
    }
    features
        .pop()
        .map(|feature| feature.boundary)
        .ok_or(LoaderError::EmptyLayer { layer: kind })
}

fn ensure_unique_ids(properties: &[Property]) -> Result<(), LoaderError> {
    let mut seen = BTreeSet::new();
    for property in properties {
        if !seen.insert(property.id.as_str()) {
            return Err(LoaderError::DuplicateId {
                id: property.id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deforest_map_spatial::overlay::area_ha;

    fn fixtures_dir() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn fixture_definition() -> DatasetDefinition {
        registry::read_definition(&fixtures_dir().join("dataset.toml")).unwrap()
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn loads_fixture_dataset() {
        let layers = load(&fixture_definition(), &fixtures_dir()).unwrap();

        assert_eq!(layers.working_crs.epsg(), 31979);
        assert_eq!(layers.display_crs.epsg(), 4326);
        assert_eq!(layers.properties.len(), 4);
        assert_eq!(layers.deforestation.len(), 3);
        assert_eq!(layers.intersections.as_ref().map(Vec::len), Some(3));

        let ids: Vec<&str> = layers.properties.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["1001", "1002", "1003", "1004"]);

        let p1 = &layers.properties[0];
        assert_eq!(p1.category.as_deref(), Some("Pequena Propriedade"));
        assert_eq!(p1.declared_area, Some(100.0));
        assert_close(area_ha(&p1.boundary), 100.0, 1e-9);

        // null condition and textual declared area
        let p3 = &layers.properties[2];
        assert!(p3.condition.is_none());
        assert_eq!(p3.declared_area, Some(0.0));
    }

    #[test]
    fn reprojects_geographic_layers_into_working_crs() {
        let layers = load(&fixture_definition(), &fixtures_dir()).unwrap();
        let country = layers.country.expect("fixture has a country layer");
        let rect = deforest_map_spatial::total_bounds([&country]).unwrap();

        // lon -72..-66 / lat -12..-6 straddles the zone 19S central meridian
        assert!(rect.min().x > 0.0 && rect.max().x < 1_100_000.0);
        assert!(rect.min().y > 8_600_000.0 && rect.max().y < 9_400_000.0);
    }

    #[test]
    fn municipality_features_are_unioned() {
        let layers = load(&fixture_definition(), &fixtures_dir()).unwrap();
        // two 3500 m x 3000 m halves of a 7000 m x 3000 m box
        assert_close(area_ha(&layers.municipality.boundary), 2100.0, 1e-6);
    }

    #[test]
    fn missing_layer_file_is_fatal() {
        let mut definition = fixture_definition();
        definition.layers.deforestation.path = "does-not-exist.geojson".to_string();
        let err = load(&definition, &fixtures_dir()).unwrap_err();
        assert!(matches!(err, LoaderError::Io { .. }), "{err}");
    }

    #[test]
    fn geographic_working_crs_is_rejected() {
        let mut definition = fixture_definition();
        definition.working_crs = "EPSG:4326".to_string();
        let err = load(&definition, &fixtures_dir()).unwrap_err();
        assert!(
            matches!(
                err,
                LoaderError::Crs {
                    source: SpatialError::NotProjected { .. },
                    ..
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut definition = fixture_definition();
        definition.layers.properties.path = "properties_duplicate_ids.geojson".to_string();
        let err = load(&definition, &fixtures_dir()).unwrap_err();
        assert!(
            matches!(err, LoaderError::DuplicateId { ref id } if id == "1001"),
            "{err}"
        );
    }

    #[test]
    fn empty_municipality_is_rejected() {
        let mut definition = fixture_definition();
        definition.layers.municipality.path = "empty.geojson".to_string();
        let err = load(&definition, &fixtures_dir()).unwrap_err();
        assert!(
            matches!(
                err,
                LoaderError::EmptyLayer {
                    layer: LayerKind::Municipality
                }
            ),
            "{err}"
        );
    }
}
