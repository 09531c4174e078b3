//! Writes a dashboard to disk.

use std::path::Path;

use deforest_map_report::Dashboard;

/// Writes one `<layer>.geojson` per map layer and the full payload as
/// `dashboard.json` into `out`, creating it if needed.
pub fn write(dashboard: &Dashboard, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(out)?;

    for layer in &dashboard.map.layers {
        let path = out.join(format!("{}.geojson", layer.id));
        std::fs::write(&path, layer.data.to_string())?;
        log::info!(
            "Wrote {} features to {}",
            layer.data.features.len(),
            path.display()
        );
    }

    let path = out.join("dashboard.json");
    std::fs::write(&path, serde_json::to_string_pretty(dashboard)?)?;
    log::info!("Wrote {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use deforest_map_loader::registry;
    use deforest_map_pipeline::{FilterOptions, FilterSelection};
    use deforest_map_property_models::AttributionStrategy;
    use deforest_map_report::DashboardOptions;

    #[test]
    fn writes_layers_and_payload() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("../loader/fixtures");
        let definition = registry::read_definition(&fixtures.join("dataset.toml")).unwrap();
        let layers = deforest_map_loader::load(&definition, &fixtures).unwrap();
        let selection = FilterSelection::defaults(&FilterOptions::from_layers(&layers));
        let dashboard = deforest_map_report::build(
            &layers,
            &selection,
            AttributionStrategy::Auto,
            DashboardOptions { overlap_only: true },
        )
        .unwrap();

        let out = std::env::temp_dir().join(format!("deforest_map_export_{}", std::process::id()));
        write(&dashboard, &out).unwrap();

        for name in ["country", "municipality", "deforestation", "properties"] {
            let text = std::fs::read_to_string(out.join(format!("{name}.geojson"))).unwrap();
            let collection: geojson::GeoJson = text.parse().unwrap();
            assert!(matches!(collection, geojson::GeoJson::FeatureCollection(_)), "{name}");
        }
        let payload: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("dashboard.json")).unwrap())
                .unwrap();
        assert_eq!(payload["datasetId"], "fixture");

        std::fs::remove_dir_all(&out).unwrap();
    }
}
