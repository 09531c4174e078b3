//! Reads single-layer `GeoJSON` files into reprojected raw features.

use std::path::Path;

use deforest_map_property_models::LayerSource;
use deforest_map_spatial::{Crs, crs, geometry_to_multipolygon};
use geo::MultiPolygon;
use geojson::{FeatureCollection, GeoJson, JsonObject};

use crate::{LayerKind, LoaderError, parse_crs};

/// A feature with its attributes untouched and its geometry already in
/// the working CRS.
#[derive(Debug, Clone)]
pub struct RawFeature {
    /// Zero-based position in the source file.
    pub index: usize,
    /// The layer the feature was read from.
    pub layer: LayerKind,
    /// `GeoJSON` `properties` member (empty when null).
    pub attributes: JsonObject,
    /// Geometry in the working CRS.
    pub boundary: MultiPolygon<f64>,
}

/// Reads a layer file and reprojects every feature into `working_crs`.
///
/// # Errors
///
/// Returns [`LoaderError`] if the file cannot be read or parsed, is not a
/// feature collection, declares an unsupported CRS, or contains a feature
/// without polygonal geometry.
pub fn read(
    data_dir: &Path,
    source: &LayerSource,
    layer: LayerKind,
    working_crs: Crs,
) -> Result<Vec<RawFeature>, LoaderError> {
    let path = data_dir.join(&source.path);
    let text = std::fs::read_to_string(&path).map_err(|e| LoaderError::Io {
        path: path.clone(),
        source: e,
    })?;
    let geojson: GeoJson = text.parse().map_err(|e| LoaderError::GeoJson {
        path: path.clone(),
        source: e,
    })?;

    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => return Err(LoaderError::NotFeatureCollection { layer }),
    };

    let source_crs = source_crs(source, &collection, layer)?;
    log::debug!(
        "Read {} features from {layer} layer {} ({source_crs} -> {working_crs})",
        collection.features.len(),
        path.display()
    );

    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| {
            let geometry = feature
                .geometry
                .ok_or(LoaderError::MissingGeometry { layer, index })?;
            let boundary = geometry_to_multipolygon(geometry).map_err(|e| {
                LoaderError::Geometry {
                    layer,
                    index,
                    source: e,
                }
            })?;

            Ok(RawFeature {
                index,
                layer,
                attributes: feature.properties.unwrap_or_default(),
                boundary: crs::reproject(&boundary, source_crs, working_crs),
            })
        })
        .collect()
}

/// Source CRS resolution order: the definition's override, then the
/// file's legacy `crs` member, then `EPSG:4326`.
fn source_crs(
    source: &LayerSource,
    collection: &FeatureCollection,
    layer: LayerKind,
) -> Result<Crs, LoaderError> {
    if let Some(code) = &source.crs {
        return parse_crs(code, &format!("{layer} layer"));
    }

    let declared = collection
        .foreign_members
        .as_ref()
        .and_then(|members| members.get("crs"))
        .and_then(|crs| crs.pointer("/properties/name"))
        .and_then(serde_json::Value::as_str);

    declared.map_or(Ok(Crs::WGS84), |code| {
        parse_crs(code, &format!("{layer} layer crs member"))
    })
}
