use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Table};
use delivery_planner::PlanReport;
use delivery_planner::models::UnassignedDelivery;

pub fn routes_table(report: &PlanReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Vehicle",
        "Driver",
        "Stops",
        "Sequence",
        "Weight (kg)",
        "Volume (m³)",
        "Distance (km)",
    ]);

    for route in &report.routes {
        let sequence = route
            .delivery_ids()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" → ");
        table.add_row(vec![
            Cell::new(route.vehicle_id),
            Cell::new(route.driver_id),
            Cell::new(route.stops.len()),
            Cell::new(sequence),
            Cell::new(format!("{:.1}", route.total_weight_kg)),
            Cell::new(format!("{:.2}", route.total_volume_m3)),
            Cell::new(format!("{:.2}", route.total_distance_km)),
        ]);
    }
    table
}

pub fn unassigned_table(unassigned: &[UnassignedDelivery]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Delivery", "Reason"]);
    for issue in unassigned {
        table.add_row(vec![Cell::new(issue.delivery_id), Cell::new(issue.reason)]);
    }
    table
}

pub fn print_report(report: &PlanReport) {
    println!("{report}");
    if !report.routes.is_empty() {
        println!("{}", routes_table(report));
    }
    if !report.unassigned.is_empty() {
        println!("{}", unassigned_table(&report.unassigned));
    }
}

pub fn print_json(report: &PlanReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
