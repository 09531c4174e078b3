//! Plain-text rendering of a dashboard.

use deforest_map_report::Dashboard;

pub fn print(dashboard: &Dashboard) {
    print!("{}", render(dashboard));
}

fn render(dashboard: &Dashboard) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let labels = &dashboard.metric_labels;

    let _ = writeln!(out, "{}", dashboard.title);
    let _ = writeln!(out, "Estratégia: {}", dashboard.strategy);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Desmatamento no município (ha): {}",
        labels.municipality_total_ha
    );
    let _ = writeln!(
        out,
        "Desmatamento nos imóveis (ha):  {}",
        labels.properties_total_ha
    );
    let _ = writeln!(out, "Imóveis selecionados:           {}", labels.property_count);

    let _ = writeln!(out);
    let _ = writeln!(out, "{:<30} {:>10} {:>6}", "Condição", "Imóveis", "%");
    for row in &dashboard.condition_summary {
        let _ = writeln!(
            out,
            "{:<30} {:>10} {:>6}",
            row.condition, row.count_display, row.share
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<20} {:>14} {:>14} {:>8}",
        "Imóvel", "Área (ha)", "Desmat (ha)", "%"
    );
    for row in &dashboard.property_table {
        let _ = writeln!(
            out,
            "{:<20} {:>14} {:>14} {:>8}",
            row.id, row.declared_area_display, row.deforested_area_display, row.deforested_percent
        );
    }

    out
}
