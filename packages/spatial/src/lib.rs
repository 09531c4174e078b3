#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry kernels for deforestation attribution.
//!
//! Provides coordinate reference system handling ([`crs`]), R-tree backed
//! polygon overlay and dissolve ([`overlay`]), and the `GeoJSON` geometry
//! conversions shared by the loader and the presentation layer.
//!
//! All area math assumes the input geometry is in a projected CRS whose
//! units are metres.

pub mod crs;
pub mod overlay;

use geo::{BoundingRect, MultiPolygon, Rect};
use thiserror::Error;

pub use crs::Crs;

/// Square metres in one hectare.
pub const SQUARE_METRES_PER_HECTARE: f64 = 10_000.0;

/// Errors that can occur while parsing CRS codes or geometries.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The CRS code is not one of the supported EPSG codes.
    #[error("Unsupported CRS: {code}")]
    UnsupportedCrs {
        /// The code as written in the source.
        code: String,
    },

    /// A geographic CRS was given where area math needs a projected one.
    #[error("CRS {code} is geographic; a projected CRS is required for area computation")]
    NotProjected {
        /// The offending CRS code.
        code: String,
    },

    /// A projected CRS was given where lon/lat output is required.
    #[error("CRS {code} is projected; a geographic CRS is required for display")]
    NotGeographic {
        /// The offending CRS code.
        code: String,
    },

    /// The geometry is not a polygon or multipolygon.
    #[error("Unsupported geometry type: {kind}")]
    UnsupportedGeometry {
        /// `GeoJSON` geometry type name.
        kind: String,
    },

    /// `GeoJSON` to `geo` conversion failed.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(#[from] geojson::Error),
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
///
/// Handles `Polygon`, `MultiPolygon`, and geometry collections made only
/// of those.
///
/// # Errors
///
/// Returns [`SpatialError`] if the geometry is malformed or contains
/// non-polygonal members.
pub fn geometry_to_multipolygon(
    geometry: geojson::Geometry,
) -> Result<MultiPolygon<f64>, SpatialError> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into()?;
    into_multipolygon(geo_geom)
}

fn into_multipolygon(geometry: geo::Geometry<f64>) -> Result<MultiPolygon<f64>, SpatialError> {
    match geometry {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        geo::Geometry::GeometryCollection(collection) => {
            let mut polygons = Vec::new();
            for member in collection {
                polygons.extend(into_multipolygon(member)?);
            }
            Ok(MultiPolygon(polygons))
        }
        other => Err(SpatialError::UnsupportedGeometry {
            kind: geometry_kind(&other).to_string(),
        }),
    }
}

const fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

/// Converts a [`MultiPolygon`] into a `GeoJSON` geometry.
#[must_use]
pub fn multipolygon_to_geometry(geometry: &MultiPolygon<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

/// Bounding rectangle covering every geometry, or `None` when all of them
/// are empty.
pub fn total_bounds<'a>(
    geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>,
) -> Option<Rect<f64>> {
    geometries
        .into_iter()
        .filter_map(BoundingRect::bounding_rect)
        .reduce(|acc, rect| {
            Rect::new(
                geo::coord! { x: acc.min().x.min(rect.min().x), y: acc.min().y.min(rect.min().y) },
                geo::coord! { x: acc.max().x.max(rect.max().x), y: acc.max().y.max(rect.max().y) },
            )
        })
}
