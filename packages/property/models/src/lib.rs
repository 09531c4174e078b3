#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Rural property, deforestation and dataset definition types.
//!
//! These types describe the layers the attribution pipeline consumes
//! (registered properties, deforestation patches, municipal boundary and
//! precomputed intersections) and the TOML schema that tells the loader
//! where those layers live and how their columns are named.
//!
//! Geometries are always expressed in the dataset's working CRS once a
//! layer has been loaded.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A registered rural property (one CAR parcel).
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Stable unique identifier, used as the join key.
    pub id: String,
    /// Size class (e.g. "Pequena Propriedade").
    pub category: Option<String>,
    /// Registration status (e.g. "Ativo", "Pendente").
    pub status: Option<String>,
    /// Registration type (e.g. "IRU", "AST").
    pub property_type: Option<String>,
    /// Analysis condition label, used to group the condition summary.
    pub condition: Option<String>,
    /// Self-declared area in hectares. Denominator for percentages.
    pub declared_area: Option<f64>,
    /// Parcel boundary.
    pub boundary: MultiPolygon<f64>,
}

impl Property {
    /// Returns the value of a categorical attribute.
    #[must_use]
    pub fn attribute(&self, attribute: PropertyAttribute) -> Option<&str> {
        match attribute {
            PropertyAttribute::Category => self.category.as_deref(),
            PropertyAttribute::Status => self.status.as_deref(),
            PropertyAttribute::PropertyType => self.property_type.as_deref(),
            PropertyAttribute::Condition => self.condition.as_deref(),
        }
    }
}

/// One mapped deforestation patch. Patches may overlap each other.
#[derive(Debug, Clone, PartialEq)]
pub struct DeforestationFeature {
    pub boundary: MultiPolygon<f64>,
}

/// One (property, deforestation patch) overlap fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionFeature {
    /// Foreign key to [`Property::id`].
    pub property_id: String,
    /// Geometry clipped to both parent polygons.
    pub boundary: MultiPolygon<f64>,
}

/// The municipality outline. Used as a reference layer and as the clip
/// region for municipality-wide totals.
#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalBoundary {
    pub boundary: MultiPolygon<f64>,
}

/// Categorical property attributes that can be filtered or grouped on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PropertyAttribute {
    Category,
    Status,
    PropertyType,
    Condition,
}

impl PropertyAttribute {
    /// Attributes exposed as multi-select filters.
    pub const FILTERABLE: &[Self] = &[Self::Category, Self::Status, Self::PropertyType];
}

/// How per-property deforested area is attributed.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AttributionStrategy {
    /// Use the precomputed intersection layer when the dataset has one,
    /// otherwise compute the overlay.
    #[default]
    Auto,
    /// Intersect properties with deforestation patches on every run.
    Overlay,
    /// Consume the dataset's precomputed intersection layer.
    Precomputed,
}

/// A dataset definition, deserialized from TOML.
///
/// Describes where each named layer lives (relative to a data directory),
/// which CRS the geometry math runs in, and how the property layer's
/// columns map onto [`Property`] fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetDefinition {
    /// Unique dataset identifier (e.g. `"feijo"`).
    pub id: String,
    /// Human-readable name (e.g. "CAR Feijó (AC)").
    pub name: String,
    /// Planar CRS every layer is reprojected to before any area math
    /// (e.g. `"EPSG:31979"`).
    pub working_crs: String,
    /// Geographic CRS used for map output only. Defaults to `EPSG:4326`.
    #[serde(default = "default_display_crs")]
    pub display_crs: String,
    /// Attribution strategy to use when a run does not override it.
    #[serde(default)]
    pub attribution: AttributionStrategy,
    /// Layer file locations.
    pub layers: LayerSources,
    /// Property layer column names.
    pub fields: FieldMapping,
}

fn default_display_crs() -> String {
    "EPSG:4326".to_string()
}

/// File locations for every layer of a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSources {
    pub properties: LayerSource,
    pub deforestation: LayerSource,
    pub municipality: LayerSource,
    /// Precomputed (property, patch) intersection fragments.
    pub intersections: Option<LayerSource>,
    /// Country outline, drawn as a reference layer only.
    pub country: Option<LayerSource>,
}

/// A single-layer `GeoJSON` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSource {
    /// Path relative to the data directory.
    pub path: String,
    /// Source CRS override. When absent the file's `crs` member is used,
    /// falling back to `EPSG:4326`.
    pub crs: Option<String>,
}

/// Column names on the property layer (and the foreign key column on the
/// intersection layer).
///
/// Categorical fields left unset are not filtered on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Property identifier column (e.g. `"Codigo"` or `"cod_imovel"`).
    pub id: String,
    /// Declared area column in hectares (e.g. `"Area"` or `"area_ha"`).
    pub declared_area: String,
    pub category: Option<String>,
    pub status: Option<String>,
    pub property_type: Option<String>,
    pub condition: Option<String>,
    /// Property id column on the intersection layer. Defaults to [`Self::id`].
    pub intersection_id: Option<String>,
}

impl FieldMapping {
    /// Returns the source column mapped to a categorical attribute.
    #[must_use]
    pub fn column(&self, attribute: PropertyAttribute) -> Option<&str> {
        match attribute {
            PropertyAttribute::Category => self.category.as_deref(),
            PropertyAttribute::Status => self.status.as_deref(),
            PropertyAttribute::PropertyType => self.property_type.as_deref(),
            PropertyAttribute::Condition => self.condition.as_deref(),
        }
    }

    /// Returns the property id column on the intersection layer.
    #[must_use]
    pub fn intersection_id(&self) -> &str {
        self.intersection_id.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!(
            AttributionStrategy::from_str("Precomputed").unwrap(),
            AttributionStrategy::Precomputed
        );
        assert_eq!(
            AttributionStrategy::from_str("overlay").unwrap(),
            AttributionStrategy::Overlay
        );
        assert!(AttributionStrategy::from_str("dissolved").is_err());
    }

    #[test]
    fn attribute_names_round_trip() {
        for attribute in PropertyAttribute::FILTERABLE {
            let parsed = PropertyAttribute::from_str(attribute.as_ref()).unwrap();
            assert_eq!(parsed, *attribute);
        }
        assert_eq!(PropertyAttribute::PropertyType.to_string(), "property_type");
    }

    #[test]
    fn intersection_id_defaults_to_property_id() {
        let mapping: FieldMapping = toml::de::from_str(
            r#"
            id = "Codigo"
            declared_area = "Area"
            "#,
        )
        .unwrap();
        assert_eq!(mapping.intersection_id(), "Codigo");
        assert!(mapping.column(PropertyAttribute::Status).is_none());
    }

    #[test]
    fn definition_defaults_display_crs_and_strategy() {
        let definition: DatasetDefinition = toml::de::from_str(
            r#"
            id = "test"
            name = "Test"
            working_crs = "EPSG:31979"

            [layers.properties]
            path = "properties.geojson"

            [layers.deforestation]
            path = "deforestation.geojson"

            [layers.municipality]
            path = "municipality.geojson"
            crs = "EPSG:4674"

            [fields]
            id = "id"
            declared_area = "area"
            "#,
        )
        .unwrap();
        assert_eq!(definition.display_crs, "EPSG:4326");
        assert_eq!(definition.attribution, AttributionStrategy::Auto);
        assert!(definition.layers.intersections.is_none());
        assert_eq!(
            definition.layers.municipality.crs.as_deref(),
            Some("EPSG:4674")
        );
    }
}
