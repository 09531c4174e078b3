//! Spatial attribution of deforested area to properties.
//!
//! Produces one fragment per overlapping (property, patch) pair, either by
//! running the overlay or by reading the dataset's precomputed
//! intersection layer, then sums fragment hectares per property.
//! Per-property totals use the raw fragments, so a property covered by two
//! overlapping patches counts the shared area twice.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use deforest_map_loader::Layers;
use deforest_map_property_models::{
    AttributionStrategy, DeforestationFeature, IntersectionFeature, Property,
};
use deforest_map_spatial::overlay::{self, PatchIndex};
use geo::MultiPolygon;
use serde::{Serialize, Serializer};

use crate::PipelineError;

/// Part of a property covered by one deforestation patch.
#[derive(Debug, Clone)]
pub struct Fragment<'a> {
    pub property_id: &'a str,
    /// Position of the source patch, when produced by the overlay.
    pub patch_index: Option<usize>,
    /// Geometry in the working CRS.
    pub geometry: Cow<'a, MultiPolygon<f64>>,
    pub area_ha: f64,
}

/// Whole-number percentage of a property's declared area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percent(pub u32);

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A filtered property with its derived deforestation figures.
#[derive(Debug, Clone)]
pub struct AttributedProperty<'a> {
    pub property: &'a Property,
    /// Unrounded sum of fragment hectares.
    pub deforested_area_exact_ha: f64,
    /// Sum of fragment hectares rounded to two decimals.
    pub deforested_area_ha: f64,
    pub deforested_percent: Percent,
}

/// Resolves [`AttributionStrategy::Auto`] against what the dataset has.
///
/// # Errors
///
/// Returns [`PipelineError::MissingIntersections`] if the precomputed
/// strategy is requested for a dataset without an intersection layer.
pub fn resolve_strategy(
    requested: AttributionStrategy,
    layers: &Layers,
) -> Result<AttributionStrategy, PipelineError> {
    match (requested, layers.intersections.is_some()) {
        (AttributionStrategy::Auto | AttributionStrategy::Precomputed, true) => {
            Ok(AttributionStrategy::Precomputed)
        }
        (AttributionStrategy::Auto | AttributionStrategy::Overlay, _) => {
            Ok(AttributionStrategy::Overlay)
        }
        (AttributionStrategy::Precomputed, false) => Err(PipelineError::MissingIntersections {
            dataset: layers.definition.id.clone(),
        }),
    }
}

/// Intersects every filtered property with the deforestation patches.
#[must_use]
pub fn overlay_fragments<'a>(
    properties: &[&'a Property],
    deforestation: &'a [DeforestationFeature],
) -> Vec<Fragment<'a>> {
    let index = PatchIndex::new(deforestation.iter().map(|d| &d.boundary));
    log::debug!(
        "Overlaying {} properties against {} indexed patches",
        properties.len(),
        index.len()
    );

    properties
        .iter()
        .flat_map(|&property| {
            index
                .overlaps(&property.boundary)
                .into_iter()
                .map(move |overlap| Fragment {
                    property_id: &property.id,
                    patch_index: Some(overlap.patch_index),
                    area_ha: overlay::area_ha(&overlap.geometry),
                    geometry: Cow::Owned(overlap.geometry),
                })
        })
        .collect()
}

/// Keeps the precomputed fragments that belong to a filtered property.
#[must_use]
pub fn precomputed_fragments<'a>(
    properties: &[&Property],
    intersections: &'a [IntersectionFeature],
) -> Vec<Fragment<'a>> {
    let ids: BTreeSet<&str> = properties.iter().map(|p| p.id.as_str()).collect();

    intersections
        .iter()
        .filter(|fragment| ids.contains(fragment.property_id.as_str()))
        .map(|fragment| Fragment {
            property_id: &fragment.property_id,
            patch_index: None,
            geometry: Cow::Borrowed(&fragment.boundary),
            area_ha: overlay::area_ha(&fragment.boundary),
        })
        .collect()
}

/// Sums fragment hectares per property id.
#[must_use]
pub fn area_by_property<'a>(fragments: &[Fragment<'a>]) -> BTreeMap<&'a str, f64> {
    let mut areas = BTreeMap::new();
    for fragment in fragments {
        *areas.entry(fragment.property_id).or_insert(0.0) += fragment.area_ha;
    }
    areas
}

/// Left-joins the per-property sums onto the filtered properties. Missing
/// sums become zero.
#[must_use]
pub fn attribute<'a>(
    properties: &[&'a Property],
    areas: &BTreeMap<&str, f64>,
) -> Vec<AttributedProperty<'a>> {
    properties
        .iter()
        .map(|&property| {
            let exact = areas.get(property.id.as_str()).copied().unwrap_or(0.0);
            let rounded = round_hundredths(exact);
            AttributedProperty {
                property,
                deforested_area_exact_ha: exact,
                deforested_area_ha: rounded,
                deforested_percent: percent_of(rounded, property.declared_area),
            }
        })
        .collect()
}

/// Rounds to two decimals, ties to even.
#[must_use]
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Share of `declared` covered by `deforested`, rounded ties to even.
/// Zero, negative or missing declared areas give 0%. Shares above 100%
/// are kept.
#[must_use]
pub fn percent_of(deforested: f64, declared: Option<f64>) -> Percent {
    match declared {
        Some(declared) if declared > 0.0 => {
            let share = (deforested / declared * 100.0).round_ties_even();
            // non-negative and far below u32::MAX for any real parcel
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let share = share.max(0.0) as u32;
            Percent(share)
        }
        _ => Percent(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn rect(x: f64, y: f64, width: f64, height: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y),
            (x: x + width, y: y),
            (x: x + width, y: y + height),
            (x: x, y: y + height),
            (x: x, y: y),
        ]])
    }

    fn property(id: &str, declared: Option<f64>, boundary: MultiPolygon<f64>) -> Property {
        Property {
            id: id.to_string(),
            category: None,
            status: None,
            property_type: None,
            condition: None,
            declared_area: declared,
            boundary,
        }
    }

    fn patch(boundary: MultiPolygon<f64>) -> DeforestationFeature {
        DeforestationFeature { boundary }
    }

    #[test]
    fn fragment_areas_sum_to_property_total() {
        let properties = [property("p", Some(100.0), rect(0.0, 0.0, 1000.0, 1000.0))];
        let refs: Vec<&Property> = properties.iter().collect();
        let patches = [
            patch(rect(0.0, 0.0, 300.0, 100.0)),
            patch(rect(200.0, 0.0, 400.0, 100.0)),
            // straddles the property edge
            patch(rect(900.0, 900.0, 200.0, 200.0)),
        ];

        let fragments = overlay_fragments(&refs, &patches);
        assert_eq!(fragments.len(), 3);
        let summed: f64 = fragments.iter().map(|f| f.area_ha).sum();
        let areas = area_by_property(&fragments);
        assert!((areas["p"] - summed).abs() < 1e-9);
        // 3 + 4 raw + 1 clipped
        assert!((summed - 8.0).abs() < 1e-6, "{summed}");
    }

    #[test]
    fn properties_without_overlap_get_zero() {
        let properties = [
            property("hit", Some(10.0), rect(0.0, 0.0, 100.0, 100.0)),
            property("miss", Some(10.0), rect(5000.0, 0.0, 100.0, 100.0)),
        ];
        let refs: Vec<&Property> = properties.iter().collect();
        let patches = [patch(rect(0.0, 0.0, 100.0, 50.0))];

        let fragments = overlay_fragments(&refs, &patches);
        let attributed = attribute(&refs, &area_by_property(&fragments));

        assert_eq!(attributed.len(), 2);
        assert!((attributed[0].deforested_area_ha - 0.5).abs() < f64::EPSILON);
        assert_eq!(attributed[0].deforested_percent, Percent(5));
        assert!(attributed[1].deforested_area_ha.abs() < f64::EPSILON);
        assert_eq!(attributed[1].deforested_percent, Percent(0));
    }

    #[test]
    fn precomputed_fragments_follow_the_filter() {
        let kept = property("a", Some(1.0), rect(0.0, 0.0, 10.0, 10.0));
        let intersections = [
            IntersectionFeature {
                property_id: "a".to_string(),
                boundary: rect(0.0, 0.0, 100.0, 100.0),
            },
            IntersectionFeature {
                property_id: "b".to_string(),
                boundary: rect(0.0, 0.0, 100.0, 100.0),
            },
        ];
        let fragments = precomputed_fragments(&[&kept], &intersections);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].property_id, "a");
        assert!(matches!(fragments[0].geometry, Cow::Borrowed(_)));
        assert!((fragments[0].area_ha - 1.0).abs() < 1e-9);
    }

    #[test]
    fn percent_uses_rounded_area() {
        assert_eq!(percent_of(2.0, Some(10.0)), Percent(20));
        assert_eq!(percent_of(8.0, Some(8.0)), Percent(100));
        // 0.125 ha rounds to 0.12 first, then 12% of 1 ha
        let rounded = round_hundredths(0.125);
        assert!((rounded - 0.12).abs() < f64::EPSILON);
        assert_eq!(percent_of(rounded, Some(1.0)), Percent(12));
    }

    #[test]
    fn percent_ties_round_to_even() {
        // 12.5% and 37.5% are exact in binary
        assert_eq!(percent_of(1.0, Some(8.0)), Percent(12));
        assert_eq!(percent_of(3.0, Some(8.0)), Percent(38));
        assert_eq!(percent_of(1.0, Some(200.0)), Percent(0));
    }

    #[test]
    fn percent_without_positive_declared_area_is_zero() {
        assert_eq!(percent_of(5.0, None), Percent(0));
        assert_eq!(percent_of(5.0, Some(0.0)), Percent(0));
        assert_eq!(percent_of(5.0, Some(-3.0)), Percent(0));
    }

    #[test]
    fn percent_above_hundred_is_not_clamped() {
        assert_eq!(percent_of(15.0, Some(10.0)), Percent(150));
        assert_eq!(Percent(150).to_string(), "150%");
    }

    #[test]
    fn percent_serializes_as_text() {
        assert_eq!(serde_json::to_value(Percent(7)).unwrap(), "7%");
    }
}
