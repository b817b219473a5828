use super::ui;
use crate::core::FundEngine;
use crate::core::enrich::{CandidateRecord, enrich_candidates};
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::path::Path;

/// Prints the current quote for each code, one row per code.
pub async fn quote(engine: &FundEngine, codes: &[String]) -> Result<()> {
    let pb = ui::new_spinner("Fetching quotes...");
    let quotes = engine.resolve_many(codes).await;
    pb.finish_and_clear();

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell("NAV"),
        ui::header_cell("NAV Date"),
        ui::header_cell("Estimate"),
        ui::header_cell("Change (%)"),
        ui::header_cell("Estimated At"),
    ]);

    for code in codes {
        let Some(quote) = quotes.get(code) else {
            table.add_row(vec![
                Cell::new(code),
                Cell::new(ui::style_text("no data", ui::StyleType::Error)),
            ]);
            continue;
        };
        table.add_row(vec![
            Cell::new(code),
            Cell::new(quote.fund_name.as_deref().unwrap_or("")),
            ui::format_optional_cell(quote.last_nav, ui::format_nav),
            ui::format_optional_cell(quote.last_nav_date, |d| d.format("%Y-%m-%d").to_string()),
            ui::format_optional_cell(quote.estimated_nav, ui::format_nav),
            quote
                .estimated_growth_rate
                .map_or_else(ui::na_cell, |r| ui::signed_cell(r, "%")),
            ui::format_optional_cell(quote.estimated_at, |t| t.format("%H:%M").to_string()),
        ]);
    }

    println!("{table}");
    Ok(())
}

pub async fn search(engine: &FundEngine, fragment: &str) -> Result<()> {
    match engine.resolve_by_name(fragment).await {
        Some(found) => println!(
            "{} {} {}",
            ui::style_text(&found.fund_code, ui::StyleType::TotalValue),
            found.fund_name,
            ui::style_text(&format!("(score {:.1})", found.score), ui::StyleType::Subtle)
        ),
        None => println!(
            "{}",
            ui::style_text(&format!("No fund matches '{fragment}'"), ui::StyleType::Error)
        ),
    }
    Ok(())
}

/// Completes extracted holding records read from a YAML or JSON file and
/// prints the result as JSON.
pub async fn enrich(engine: &FundEngine, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read records file: {}", path.display()))?;
    let candidates: Vec<CandidateRecord> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse records file: {}", path.display()))?;

    let pb = ui::new_spinner("Completing records...");
    let records = enrich_candidates(engine, candidates).await;
    pb.finish_and_clear();

    println!(
        "{}",
        serde_json::to_string_pretty(&records).context("Failed to serialize records")?
    );
    Ok(())
}
