use super::ui;
use crate::core::analytics::RateOfChangeResult;
use crate::core::record::{IndexObservation, WeightRecord};
use crate::manager::CompleteData;
use comfy_table::{Cell, Table};
use std::collections::BTreeMap;

pub fn weights_table(weights: &[WeightRecord]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Country"),
        ui::header_cell("Source"),
        ui::header_cell("Year"),
        ui::header_cell("Code"),
        ui::header_cell("Category"),
        ui::header_cell("Weight"),
    ]);
    for w in weights {
        table.add_row(vec![
            Cell::new(&w.country),
            Cell::new(w.source.to_string()),
            Cell::new(w.year),
            Cell::new(&w.category_code),
            Cell::new(&w.category_description),
            ui::number_cell(w.weight, 1),
        ]);
    }
    table
}

/// One row per country and source: coverage plus the latest value.
pub fn index_table(index: &[IndexObservation]) -> Table {
    let mut series: BTreeMap<(&str, String), Vec<&IndexObservation>> = BTreeMap::new();
    for obs in index {
        series
            .entry((obs.country.as_str(), obs.source.to_string()))
            .or_default()
            .push(obs);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Country"),
        ui::header_cell("Source"),
        ui::header_cell("From"),
        ui::header_cell("To"),
        ui::header_cell("Months"),
        ui::header_cell("Latest"),
    ]);
    for ((country, source), observations) in series {
        let first = observations.iter().min_by_key(|o| o.date);
        let last = observations.iter().max_by_key(|o| o.date);
        if let (Some(first), Some(last)) = (first, last) {
            table.add_row(vec![
                Cell::new(country),
                Cell::new(source),
                Cell::new(first.date.format("%Y-%m")),
                Cell::new(last.date.format("%Y-%m")),
                Cell::new(observations.len()),
                ui::number_cell(last.value, 1),
            ]);
        }
    }
    table
}

pub fn rate_of_change_table(result: &RateOfChangeResult) -> Table {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Country")];
    header.extend(result.periods.iter().map(|p| ui::header_cell(p)));
    table.set_header(header);

    for (country, values) in &result.rows {
        let mut row = vec![Cell::new(country)];
        row.extend(values.iter().map(|v| ui::change_cell(*v)));
        table.add_row(row);
    }
    table
}

pub fn print_weights(weights: &[WeightRecord]) {
    if weights.is_empty() {
        println!("{}", ui::style_text("No weights retrieved", ui::StyleType::Subtle));
        return;
    }
    println!("\n{}", ui::style_text("Category weights (per 1000)", ui::StyleType::Title));
    println!("{}", weights_table(weights));
}

pub fn print_index(index: &[IndexObservation]) {
    if index.is_empty() {
        println!(
            "{}",
            ui::style_text("No index data retrieved", ui::StyleType::Error)
        );
        return;
    }
    println!("\n{}", ui::style_text("Price index", ui::StyleType::Title));
    println!("{}", index_table(index));
}

pub fn print_complete(data: &CompleteData) {
    print_index(&data.index);
    if let Some(result) = &data.rate_of_change {
        println!("\n{}", ui::style_text("Rate of change", ui::StyleType::Title));
        println!("{}", rate_of_change_table(result));
    }
    print_weights(&data.weights);
}
