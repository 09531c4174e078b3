#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the dashboard server.
//!
//! These types are serialized to JSON for the REST API. The dashboard
//! payload itself is defined by the report crate; this crate only holds
//! the envelope types around it.

use deforest_map_property_models::AttributionStrategy;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    pub healthy: bool,
    /// Server package version.
    pub version: String,
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Feature counts of the loaded layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiLayerCounts {
    pub properties: usize,
    pub deforestation: usize,
    /// `None` when the dataset has no precomputed intersection layer.
    pub intersections: Option<usize>,
    pub has_country: bool,
}

/// The dataset being served.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDataset {
    pub id: String,
    pub name: String,
    /// Planar CRS used for area math (e.g. `EPSG:31979`).
    pub working_crs: String,
    /// Geographic CRS of every geometry the API returns.
    pub display_crs: String,
    /// Strategy used when a request does not choose one.
    pub default_strategy: AttributionStrategy,
    pub layers: ApiLayerCounts,
}

/// Query parameters for the dashboard endpoint.
///
/// Multi-value filters repeat their key (`statuses=Ativo&statuses=Pendente`)
/// so values may contain commas. An absent filter selects every value; a
/// present key with only blank values selects none.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardQueryParams {
    /// Property size classes to include.
    pub categories: Option<Vec<String>>,
    /// Registration statuses to include.
    pub statuses: Option<Vec<String>>,
    /// Registration types to include.
    pub types: Option<Vec<String>>,
    /// A single property id, or `all`/`todos`/`*`.
    pub property: Option<String>,
    /// Draw only deforestation inside the surviving properties.
    pub overlap_only: Option<bool>,
    /// `auto`, `overlay` or `precomputed`.
    pub strategy: Option<String>,
}

impl DashboardQueryParams {
    /// Collects decoded `key=value` pairs. Unknown keys are ignored and a
    /// repeated single-value key keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns a message if `overlapOnly` is not `true` or `false`.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self, String> {
        fn push(slot: &mut Option<Vec<String>>, value: &str) {
            let values = slot.get_or_insert_with(Vec::new);
            let value = value.trim();
            if !value.is_empty() {
                values.push(value.to_string());
            }
        }

        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "categories" => push(&mut params.categories, &value),
                "statuses" => push(&mut params.statuses, &value),
                "types" => push(&mut params.types, &value),
                "property" => params.property = Some(value),
                "strategy" => params.strategy = Some(value),
                "overlapOnly" => {
                    params.overlap_only = Some(value.trim().parse().map_err(|_| {
                        format!("Invalid overlapOnly '{value}' (expected true or false)")
                    })?);
                }
                _ => {}
            }
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_serializes_camel_case() {
        let dataset = ApiDataset {
            id: "feijo".to_string(),
            name: "CAR Feijó (AC)".to_string(),
            working_crs: "EPSG:31979".to_string(),
            display_crs: "EPSG:4326".to_string(),
            default_strategy: AttributionStrategy::Auto,
            layers: ApiLayerCounts {
                properties: 10,
                deforestation: 4,
                intersections: None,
                has_country: false,
            },
        };
        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["workingCrs"], "EPSG:31979");
        assert_eq!(json["defaultStrategy"], "auto");
        assert_eq!(json["layers"]["hasCountry"], false);
        assert!(json["layers"]["intersections"].is_null());
    }

    fn pairs(query: &[(&str, &str)]) -> Vec<(String, String)> {
        query
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn repeated_keys_collect_values() {
        let params = DashboardQueryParams::from_pairs(pairs(&[
            ("statuses", "Ativo"),
            ("statuses", " Pendente "),
            ("categories", ""),
            ("types", "Grande, Media"),
            ("overlapOnly", "true"),
            ("unknown", "x"),
        ]))
        .unwrap();

        assert_eq!(
            params.statuses,
            Some(vec!["Ativo".to_string(), "Pendente".to_string()])
        );
        assert_eq!(params.categories, Some(Vec::new()));
        assert_eq!(params.types, Some(vec!["Grande, Media".to_string()]));
        assert_eq!(params.overlap_only, Some(true));
        assert!(params.property.is_none());
    }

    #[test]
    fn absent_keys_stay_unset() {
        let params = DashboardQueryParams::from_pairs(Vec::new()).unwrap();
        assert_eq!(params, DashboardQueryParams::default());
    }

    #[test]
    fn bad_toggle_is_rejected() {
        let err = DashboardQueryParams::from_pairs(pairs(&[("overlapOnly", "sim")])).unwrap_err();
        assert!(err.contains("sim"));
    }
}
