use super::ui;
use crate::core::FundEngine;
use crate::core::config::Portfolio;
use crate::core::history::{HistoryRecorder, HistoryStats, RecordOutcome};
use anyhow::Result;
use comfy_table::Cell;
use tracing::warn;

impl HistoryStats {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Date"),
            ui::header_cell("Value"),
            ui::header_cell("Cost"),
            ui::header_cell("Daily"),
            ui::header_cell("Daily (%)"),
            ui::header_cell("Cumulative"),
            ui::header_cell("Cumulative (%)"),
        ]);

        for point in &self.history {
            table.add_row(vec![
                Cell::new(point.date.format("%Y-%m-%d")),
                ui::amount_cell(point.total_value),
                ui::amount_cell(point.total_cost),
                ui::signed_cell(point.daily_profit, ""),
                ui::signed_cell(point.daily_profit_rate, "%"),
                ui::signed_cell(point.cumulative_profit, ""),
                ui::signed_cell(point.cumulative_profit_rate, "%"),
            ]);
        }

        format!(
            "Portfolio: {}\n\n{}",
            ui::style_text(&self.portfolio_name, ui::StyleType::Title),
            table
        )
    }
}

/// Records today's snapshot for every portfolio. A failing portfolio does
/// not stop the others.
pub async fn snapshot(
    portfolios: &[Portfolio],
    engine: &FundEngine,
    recorder: &HistoryRecorder,
) -> Result<()> {
    for portfolio in portfolios {
        let pb = ui::new_spinner(&format!("Recording {}...", portfolio.name));
        let outcome = recorder
            .record_daily(portfolio, &portfolio.holdings, engine)
            .await;
        pb.finish_and_clear();

        match outcome {
            Ok(RecordOutcome::Recorded(s)) => println!(
                "{}: recorded {} (value {}, daily {})",
                ui::style_text(&portfolio.name, ui::StyleType::TotalLabel),
                s.record_date,
                ui::format_amount(s.total_value),
                ui::format_amount(s.daily_profit),
            ),
            Ok(RecordOutcome::AlreadyRecorded(s)) => println!(
                "{}: {}",
                ui::style_text(&portfolio.name, ui::StyleType::TotalLabel),
                ui::style_text(
                    &format!("already recorded for {}", s.record_date),
                    ui::StyleType::Subtle
                ),
            ),
            Err(e) => {
                warn!(portfolio_id = portfolio.id, "Snapshot failed: {e:#}");
                println!(
                    "{}: {}",
                    ui::style_text(&portfolio.name, ui::StyleType::TotalLabel),
                    ui::style_text(&format!("snapshot failed: {e}"), ui::StyleType::Error),
                );
            }
        }
    }
    Ok(())
}

pub async fn history(
    portfolios: &[Portfolio],
    recorder: &HistoryRecorder,
    days: usize,
) -> Result<()> {
    let num_portfolios = portfolios.len();
    for (i, portfolio) in portfolios.iter().enumerate() {
        let stats = recorder.history_stats(portfolio, days).await?;
        if stats.history.is_empty() {
            println!(
                "{}: {}",
                ui::style_text(&portfolio.name, ui::StyleType::Title),
                ui::style_text("no snapshots yet", ui::StyleType::Subtle)
            );
        } else {
            println!("{}", stats.display_as_table());
        }
        if i < num_portfolios - 1 {
            ui::print_separator();
        }
    }
    Ok(())
}
