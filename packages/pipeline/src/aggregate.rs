//! Headline metrics.
//!
//! The municipality total dissolves all deforestation before clipping to
//! the boundary, so overlapping patches count once. The properties total
//! sums the per-property figures, which do not dissolve.

use deforest_map_property_models::{DeforestationFeature, MunicipalBoundary};
use deforest_map_spatial::overlay;
use serde::Serialize;

use crate::attribution::{AttributedProperty, round_hundredths};

/// Aggregate figures for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Dissolved deforestation inside the municipal boundary, in hectares.
    pub municipality_total_ha: f64,
    /// Sum of each raw patch clipped to the boundary. Never below
    /// [`Self::municipality_total_ha`].
    pub undissolved_municipality_ha: f64,
    /// Sum of the rounded per-property deforested areas.
    pub properties_total_ha: f64,
    pub property_count: usize,
}

/// Dissolved and undissolved deforestation inside the boundary, in
/// hectares.
#[must_use]
pub fn municipality_totals(
    deforestation: &[DeforestationFeature],
    municipality: &MunicipalBoundary,
) -> (f64, f64) {
    let dissolved = overlay::dissolve(deforestation.iter().map(|d| &d.boundary));
    let dissolved_ha = overlay::area_ha(&overlay::clip(&dissolved, &municipality.boundary));

    let undissolved_ha = deforestation
        .iter()
        .map(|d| overlay::area_ha(&overlay::clip(&d.boundary, &municipality.boundary)))
        .sum::<f64>();

    log::debug!(
        "Municipality deforestation: {dissolved_ha:.4} ha dissolved, \
         {undissolved_ha:.4} ha undissolved ({:.4} ha double-counted by overlaps)",
        undissolved_ha - dissolved_ha
    );

    (dissolved_ha, undissolved_ha)
}

/// Computes the run's metrics.
#[must_use]
pub fn aggregate(
    deforestation: &[DeforestationFeature],
    municipality: &MunicipalBoundary,
    properties: &[AttributedProperty<'_>],
) -> Metrics {
    let (municipality_total_ha, undissolved_municipality_ha) =
        municipality_totals(deforestation, municipality);

    let properties_total_ha = round_hundredths(
        properties
            .iter()
            .map(|p| p.deforested_area_ha)
            .sum::<f64>(),
    );

    Metrics {
        municipality_total_ha,
        undissolved_municipality_ha,
        properties_total_ha,
        property_count: properties.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{MultiPolygon, polygon};

    fn rect(x: f64, y: f64, width: f64, height: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: x, y: y),
            (x: x + width, y: y),
            (x: x + width, y: y + height),
            (x: x, y: y + height),
            (x: x, y: y),
        ]])
    }

    fn patches(rects: &[(f64, f64, f64, f64)]) -> Vec<DeforestationFeature> {
        rects
            .iter()
            .map(|&(x, y, w, h)| DeforestationFeature {
                boundary: rect(x, y, w, h),
            })
            .collect()
    }

    fn boundary() -> MunicipalBoundary {
        MunicipalBoundary {
            boundary: rect(-1000.0, -1000.0, 5000.0, 5000.0),
        }
    }

    #[test]
    fn overlapping_patches_count_once() {
        // 3 ha and 4 ha sharing 1 ha
        let deforestation = patches(&[(0.0, 0.0, 300.0, 100.0), (200.0, 0.0, 400.0, 100.0)]);
        let (dissolved, undissolved) = municipality_totals(&deforestation, &boundary());
        assert!((dissolved - 6.0).abs() < 1e-6, "{dissolved}");
        assert!((undissolved - 7.0).abs() < 1e-6, "{undissolved}");
    }

    #[test]
    fn disjoint_patches_have_equal_totals() {
        let deforestation = patches(&[(0.0, 0.0, 100.0, 100.0), (500.0, 500.0, 200.0, 100.0)]);
        let (dissolved, undissolved) = municipality_totals(&deforestation, &boundary());
        assert!((dissolved - 3.0).abs() < 1e-6);
        assert!((dissolved - undissolved).abs() < 1e-6);
    }

    #[test]
    fn deforestation_outside_boundary_is_clipped() {
        // half of the patch lies west of the boundary
        let deforestation = patches(&[(-1100.0, 0.0, 200.0, 100.0)]);
        let (dissolved, undissolved) = municipality_totals(&deforestation, &boundary());
        assert!((dissolved - 1.0).abs() < 1e-6);
        assert!((undissolved - 1.0).abs() < 1e-6);
    }

    #[test]
    fn no_deforestation_is_zero() {
        let (dissolved, undissolved) = municipality_totals(&[], &boundary());
        assert!(dissolved.abs() < f64::EPSILON);
        assert!(undissolved.abs() < f64::EPSILON);
    }

    #[test]
    fn empty_run_has_zero_property_metrics() {
        let metrics = aggregate(&[], &boundary(), &[]);
        assert_eq!(metrics.property_count, 0);
        assert!(metrics.properties_total_ha.abs() < f64::EPSILON);
    }
}
