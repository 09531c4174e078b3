//! Attribute filter over the property layer.
//!
//! A property survives when each of its filterable attributes is a member
//! of the corresponding selected-value set and its id matches the
//! [`PropertySelector`]. Properties with a null attribute never match a
//! selected set. Attributes the dataset does not map are not filtered.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use deforest_map_loader::Layers;
use deforest_map_property_models::{FieldMapping, Property, PropertyAttribute};
use serde::{Deserialize, Serialize};

/// Selectable values for every filterable attribute.
///
/// An attribute slot is `None` when the dataset has no column for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub categories: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub types: Option<Vec<String>>,
    /// Every property id, sorted.
    pub property_ids: Vec<String>,
}

impl FilterOptions {
    /// Enumerates the sorted distinct non-null values of each mapped
    /// attribute and the sorted id list.
    #[must_use]
    pub fn from_properties(properties: &[Property], fields: &FieldMapping) -> Self {
        let distinct = |attribute: PropertyAttribute| {
            fields.column(attribute).map(|_| {
                properties
                    .iter()
                    .filter_map(|p| p.attribute(attribute))
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
        };

        let mut property_ids: Vec<String> = properties.iter().map(|p| p.id.clone()).collect();
        property_ids.sort();

        Self {
            categories: distinct(PropertyAttribute::Category),
            statuses: distinct(PropertyAttribute::Status),
            types: distinct(PropertyAttribute::PropertyType),
            property_ids,
        }
    }

    /// Options for a loaded dataset.
    #[must_use]
    pub fn from_layers(layers: &Layers) -> Self {
        Self::from_properties(&layers.properties, &layers.definition.fields)
    }

    /// Selectable values of a filterable attribute.
    #[must_use]
    pub fn values(&self, attribute: PropertyAttribute) -> Option<&[String]> {
        match attribute {
            PropertyAttribute::Category => self.categories.as_deref(),
            PropertyAttribute::Status => self.statuses.as_deref(),
            PropertyAttribute::PropertyType => self.types.as_deref(),
            PropertyAttribute::Condition => None,
        }
    }
}

/// Single-property selector. `All` is the "every property" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum PropertySelector {
    #[default]
    All,
    Id(String),
}

impl PropertySelector {
    /// Whether a property id passes the selector.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Id(selected) => selected == id,
        }
    }
}

impl From<&str> for PropertySelector {
    /// `all`, `todos`, `*` and the empty string select every property.
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.is_empty()
            || s == "*"
            || s.eq_ignore_ascii_case("all")
            || s.eq_ignore_ascii_case("todos")
        {
            Self::All
        } else {
            Self::Id(s.to_string())
        }
    }
}

impl FromStr for PropertySelector {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for PropertySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Id(id) => f.write_str(id),
        }
    }
}

/// The user's current filter state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    pub category: Option<BTreeSet<String>>,
    pub status: Option<BTreeSet<String>>,
    pub property_type: Option<BTreeSet<String>>,
    pub property: PropertySelector,
}

impl FilterSelection {
    /// Selects every value of every mapped attribute and all properties.
    #[must_use]
    pub fn defaults(options: &FilterOptions) -> Self {
        let all = |attribute: PropertyAttribute| {
            options
                .values(attribute)
                .map(|values| values.iter().cloned().collect())
        };

        Self {
            category: all(PropertyAttribute::Category),
            status: all(PropertyAttribute::Status),
            property_type: all(PropertyAttribute::PropertyType),
            property: PropertySelector::All,
        }
    }

    /// Selected values of a filterable attribute, `None` when unfiltered.
    #[must_use]
    pub const fn selected(&self, attribute: PropertyAttribute) -> Option<&BTreeSet<String>> {
        match attribute {
            PropertyAttribute::Category => self.category.as_ref(),
            PropertyAttribute::Status => self.status.as_ref(),
            PropertyAttribute::PropertyType => self.property_type.as_ref(),
            PropertyAttribute::Condition => None,
        }
    }

    /// Replaces the selected values of a filtered attribute. Attributes
    /// that are not filtered (unmapped in the dataset) stay unfiltered.
    pub fn restrict(
        &mut self,
        attribute: PropertyAttribute,
        values: impl IntoIterator<Item = String>,
    ) {
        let slot = match attribute {
            PropertyAttribute::Category => &mut self.category,
            PropertyAttribute::Status => &mut self.status,
            PropertyAttribute::PropertyType => &mut self.property_type,
            PropertyAttribute::Condition => return,
        };
        if let Some(selected) = slot {
            *selected = values.into_iter().collect();
        }
    }

    /// Whether a property passes every active filter.
    #[must_use]
    pub fn matches(&self, property: &Property) -> bool {
        self.property.matches(&property.id)
            && PropertyAttribute::FILTERABLE.iter().all(|&attribute| {
                self.selected(attribute).is_none_or(|selected| {
                    property
                        .attribute(attribute)
                        .is_some_and(|value| selected.contains(value))
                })
            })
    }

    /// Returns the surviving properties in their original order.
    #[must_use]
    pub fn apply<'a>(&self, properties: &'a [Property]) -> Vec<&'a Property> {
        properties.iter().filter(|p| self.matches(p)).collect()
    }
}
