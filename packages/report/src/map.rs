//! Map view: display-CRS layers, styles, base tiles and bounds.

use deforest_map_loader::Layers;
use deforest_map_pipeline::{FilterSelection, PipelineOutput, PropertySelector};
use deforest_map_spatial::{Crs, crs, multipolygon_to_geometry, total_bounds};
use geo::MultiPolygon;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Identifies a data layer on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MapLayerId {
    Country,
    Municipality,
    Deforestation,
    Properties,
}

/// Leaflet-style path options.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStyle {
    pub color: &'static str,
    pub weight: f64,
    pub fill: bool,
    pub fill_opacity: f64,
}

/// A feature attribute shown on hover, with its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TooltipField {
    pub field: &'static str,
    pub alias: &'static str,
}

/// One vector layer in the display CRS.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    pub id: MapLayerId,
    pub name: &'static str,
    pub style: LayerStyle,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tooltip: Vec<TooltipField>,
    pub data: FeatureCollection,
}

/// A background tile layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseLayer {
    pub name: &'static str,
    pub url_template: &'static str,
    pub attribution: &'static str,
    pub max_zoom: u8,
}

/// A legend swatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub color: &'static str,
}

/// Everything a web map needs to draw one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    /// `[[south, west], [north, east]]` in the display CRS.
    pub bounds: [[f64; 2]; 2],
    /// Drawing order, bottom first.
    pub layers: Vec<MapLayer>,
    pub base_layers: Vec<BaseLayer>,
    pub legend: Vec<LegendEntry>,
}

pub const BASE_LAYERS: [BaseLayer; 2] = [
    BaseLayer {
        name: "Mapa",
        url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
        attribution: "&copy; OpenStreetMap contributors",
        max_zoom: 19,
    },
    BaseLayer {
        name: "Satélite",
        url_template: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        attribution: "Tiles &copy; Esri",
        max_zoom: 18,
    },
];

const COUNTRY_STYLE: LayerStyle = LayerStyle {
    color: "gray",
    weight: 1.0,
    fill: false,
    fill_opacity: 0.0,
};

const MUNICIPALITY_STYLE: LayerStyle = LayerStyle {
    color: "black",
    weight: 2.0,
    fill: false,
    fill_opacity: 0.0,
};

const DEFORESTATION_STYLE: LayerStyle = LayerStyle {
    color: "red",
    weight: 1.0,
    fill: true,
    fill_opacity: 0.6,
};

const PROPERTY_STYLE: LayerStyle = LayerStyle {
    color: "blue",
    weight: 2.0,
    fill: true,
    fill_opacity: 0.15,
};

const PROPERTY_TOOLTIP: [TooltipField; 3] = [
    TooltipField {
        field: "id",
        alias: "Imóvel:",
    },
    TooltipField {
        field: "deforested_area_ha",
        alias: "Desmat (ha):",
    },
    TooltipField {
        field: "deforested_percent",
        alias: "% Desmat:",
    },
];

/// Builds the map for one run.
///
/// With `overlap_only` the deforestation layer holds only the fragments
/// of the surviving properties instead of every patch.
#[must_use]
pub fn build(
    layers: &Layers,
    output: &PipelineOutput<'_>,
    selection: &FilterSelection,
    overlap_only: bool,
) -> MapView {
    let to_display = Projector {
        from: layers.working_crs,
        to: layers.display_crs,
    };

    let mut map_layers = Vec::with_capacity(4);

    if let Some(country) = &layers.country {
        map_layers.push(MapLayer {
            id: MapLayerId::Country,
            name: "País",
            style: COUNTRY_STYLE,
            tooltip: Vec::new(),
            data: collection([to_display.feature(country, JsonObject::new())]),
        });
    }

    let municipality = to_display.project(&layers.municipality.boundary);
    map_layers.push(MapLayer {
        id: MapLayerId::Municipality,
        name: "Município",
        style: MUNICIPALITY_STYLE,
        tooltip: Vec::new(),
        data: collection([feature(&municipality, JsonObject::new())]),
    });

    let (name, deforestation) = if overlap_only {
        (
            "Desmatamento dentro dos imóveis",
            collection(
                output
                    .fragments
                    .iter()
                    .map(|f| to_display.feature(&f.geometry, JsonObject::new())),
            ),
        )
    } else {
        (
            "Desmatamento total",
            collection(
                layers
                    .deforestation
                    .iter()
                    .map(|d| to_display.feature(&d.boundary, JsonObject::new())),
            ),
        )
    };
    map_layers.push(MapLayer {
        id: MapLayerId::Deforestation,
        name,
        style: DEFORESTATION_STYLE,
        tooltip: Vec::new(),
        data: deforestation,
    });

    let properties: Vec<MultiPolygon<f64>> = output
        .properties
        .iter()
        .map(|p| to_display.project(&p.property.boundary))
        .collect();
    map_layers.push(MapLayer {
        id: MapLayerId::Properties,
        name: "Fazendas",
        style: PROPERTY_STYLE,
        tooltip: PROPERTY_TOOLTIP.to_vec(),
        data: collection(output.properties.iter().zip(&properties).map(
            |(attributed, geometry)| {
                let mut attributes = JsonObject::new();
                attributes.insert("id".to_string(), attributed.property.id.clone().into());
                attributes.insert(
                    "deforested_area_ha".to_string(),
                    attributed.deforested_area_ha.into(),
                );
                attributes.insert(
                    "deforested_percent".to_string(),
                    attributed.deforested_percent.to_string().into(),
                );
                feature(geometry, attributes)
            },
        )),
    });

    let focused = matches!(selection.property, PropertySelector::Id(_)) && !properties.is_empty();
    let bounds = if focused {
        total_bounds(&properties)
    } else {
        total_bounds([&municipality])
    };

    MapView {
        bounds: bounds.map_or([[0.0, 0.0], [0.0, 0.0]], |rect| {
            [[rect.min().y, rect.min().x], [rect.max().y, rect.max().x]]
        }),
        layers: map_layers,
        base_layers: BASE_LAYERS.to_vec(),
        legend: vec![
            LegendEntry {
                label: "Fazendas",
                color: PROPERTY_STYLE.color,
            },
            LegendEntry {
                label: "Desmatamento",
                color: DEFORESTATION_STYLE.color,
            },
        ],
    }
}

/// Working-to-display reprojection.
struct Projector {
    from: Crs,
    to: Crs,
}

impl Projector {
    fn project(&self, geometry: &MultiPolygon<f64>) -> MultiPolygon<f64> {
        crs::reproject(geometry, self.from, self.to)
    }

    fn feature(&self, geometry: &MultiPolygon<f64>, attributes: JsonObject) -> Feature {
        feature(&self.project(geometry), attributes)
    }
}

fn feature(geometry: &MultiPolygon<f64>, attributes: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(multipolygon_to_geometry(geometry)),
        id: None,
        properties: Some(attributes),
        foreign_members: None,
    }
}

fn collection(features: impl IntoIterator<Item = Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: features.into_iter().collect(),
        foreign_members: None,
    }
}
