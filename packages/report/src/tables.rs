//! The condition summary and per-property tables.

use std::collections::BTreeMap;

use deforest_map_pipeline::attribution::percent_of;
use deforest_map_pipeline::{AttributedProperty, Percent};
use serde::Serialize;

use crate::format::{format_br, group_thousands};

/// One row of the condition summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRow {
    pub condition: String,
    pub count: usize,
    pub count_display: String,
    /// Share of the counted properties.
    pub share: Percent,
}

/// One row of the per-property table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRow {
    pub id: String,
    pub condition: Option<String>,
    pub category: Option<String>,
    pub declared_area_ha: Option<f64>,
    pub declared_area_display: String,
    pub deforested_area_ha: f64,
    pub deforested_area_display: String,
    pub deforested_percent: Percent,
}

/// Groups the filtered properties by condition, dropping null conditions.
/// Sorted by count descending, then condition ascending.
#[must_use]
pub fn condition_summary(properties: &[AttributedProperty<'_>]) -> Vec<ConditionRow> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for attributed in properties {
        if let Some(condition) = attributed.property.condition.as_deref() {
            *counts.entry(condition).or_default() += 1;
        }
    }

    let total: usize = counts.values().sum();
    let mut rows: Vec<ConditionRow> = counts
        .into_iter()
        .map(|(condition, count)| ConditionRow {
            condition: condition.to_string(),
            count,
            count_display: group_thousands(count),
            share: share(count, total),
        })
        .collect();

    // stable, so equal counts keep the map's ascending order
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// One row per filtered property, sorted by deforested area descending.
/// Ties keep their layer order.
#[must_use]
pub fn property_table(properties: &[AttributedProperty<'_>]) -> Vec<PropertyRow> {
    let mut rows: Vec<PropertyRow> = properties
        .iter()
        .map(|attributed| {
            let property = attributed.property;
            PropertyRow {
                id: property.id.clone(),
                condition: property.condition.clone(),
                category: property.category.clone(),
                declared_area_ha: property.declared_area,
                declared_area_display: property.declared_area.map(format_br).unwrap_or_default(),
                deforested_area_ha: attributed.deforested_area_ha,
                deforested_area_display: format_br(attributed.deforested_area_ha),
                deforested_percent: attributed.deforested_percent,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.deforested_area_ha.total_cmp(&a.deforested_area_ha));
    rows
}

#[allow(clippy::cast_precision_loss)] // property counts
fn share(count: usize, total: usize) -> Percent {
    percent_of(count as f64, Some(total as f64))
}
