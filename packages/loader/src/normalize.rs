//! Normalizes raw layer features into [`Property`] and
//! [`IntersectionFeature`] values.
//!
//! Uses the dataset's [`FieldMapping`] to pull each attribute out of the
//! source-specific column names. Blank strings count as missing.

use deforest_map_property_models::{FieldMapping, IntersectionFeature, Property, PropertyAttribute};
use serde_json::Value;

use crate::LoaderError;
use crate::layer::RawFeature;

/// Builds a [`Property`] from a property-layer feature.
///
/// # Errors
///
/// Returns [`LoaderError::MissingField`] if the id column is absent, null
/// or blank.
pub fn property(feature: RawFeature, fields: &FieldMapping) -> Result<Property, LoaderError> {
    let id = required_text(&feature, &fields.id)?;
    let attribute = |attribute: PropertyAttribute| {
        fields
            .column(attribute)
            .and_then(|column| text(feature.attributes.get(column)))
    };

    let category = attribute(PropertyAttribute::Category);
    let status = attribute(PropertyAttribute::Status);
    let property_type = attribute(PropertyAttribute::PropertyType);
    let condition = attribute(PropertyAttribute::Condition);
    let declared_area = declared_area(&feature, &fields.declared_area, &id);

    Ok(Property {
        id,
        category,
        status,
        property_type,
        condition,
        declared_area,
        boundary: feature.boundary,
    })
}

/// Builds an [`IntersectionFeature`] from an intersection-layer feature.
///
/// # Errors
///
/// Returns [`LoaderError::MissingField`] if the property id column is
/// absent, null or blank.
pub fn intersection(
    feature: RawFeature,
    fields: &FieldMapping,
) -> Result<IntersectionFeature, LoaderError> {
    let property_id = required_text(&feature, fields.intersection_id())?;
    Ok(IntersectionFeature {
        property_id,
        boundary: feature.boundary,
    })
}

fn required_text(feature: &RawFeature, column: &str) -> Result<String, LoaderError> {
    text(feature.attributes.get(column)).ok_or_else(|| LoaderError::MissingField {
        layer: feature.layer,
        index: feature.index,
        field: column.to_string(),
    })
}

/// Renders a scalar attribute as text. Integral numbers print without a
/// fractional part so numeric ids match their string form.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string()))
                .or_else(|| n.as_f64().and_then(integral_float))
                .unwrap_or_else(|| n.to_string()),
        ),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Float-encoded integers such as `1003.0`, as written by exports whose
/// integer column held nulls. Only values exactly representable as `f64`.
fn integral_float(value: f64) -> Option<String> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if !value.is_finite() || value.fract() != 0.0 || value.abs() > MAX_EXACT {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let integer = value as i64;
    Some(integer.to_string())
}

/// Declared area in hectares. Unparseable values are logged and treated
/// as missing.
fn declared_area(feature: &RawFeature, column: &str, id: &str) -> Option<f64> {
    let value = feature.attributes.get(column)?;
    let area = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s.trim()),
        Value::Null => return None,
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    };

    if area.is_none() && !matches!(value, Value::String(s) if s.trim().is_empty()) {
        log::warn!("Property '{id}': ignoring unparseable declared area {value}");
    }
    area
}

/// Parses `12.5`, and the comma-decimal `12,5` used by Brazilian exports.
fn parse_decimal(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>()
        .ok()
        .or_else(|| s.replace('.', "").replace(',', ".").parse().ok())
        .filter(|area: &f64| area.is_finite())
}
