use super::ui;
use crate::core::FundEngine;
use crate::core::analytics::{RealtimeStats, compute_realtime_stats};
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Portfolio;
use anyhow::Result;
use comfy_table::Cell;

impl RealtimeStats {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();

        table.set_header(vec![
            ui::header_cell("Fund"),
            ui::header_cell("Shares"),
            ui::header_cell("Cost NAV"),
            ui::header_cell("NAV"),
            ui::header_cell("Value"),
            ui::header_cell("Profit"),
            ui::header_cell("Return (%)"),
        ]);

        for holding in &self.holdings {
            let name_display = if holding.fund_name.is_empty() {
                holding.fund_code.clone()
            } else {
                format!("{} ({})", holding.fund_name, holding.fund_code)
            };

            table.add_row(vec![
                Cell::new(name_display),
                ui::amount_cell(holding.shares),
                Cell::new(ui::format_nav(holding.cost_nav)),
                Cell::new(ui::format_nav(holding.current_nav)),
                ui::amount_cell(holding.value),
                ui::signed_cell(holding.profit, ""),
                ui::signed_cell(holding.profit_rate, "%"),
            ]);
        }

        // Portfolio name at top
        let mut output = format!(
            "Portfolio: {} {}\n\n",
            ui::style_text(&self.portfolio_name, ui::StyleType::Title),
            ui::style_text(
                &format!("as of {}", self.updated_at.format("%Y-%m-%d %H:%M")),
                ui::StyleType::Subtle
            )
        );

        output.push_str(&table.to_string());

        output.push_str(&format!(
            "\n\n{} {}   {} {}   {} {} ({}%)",
            ui::style_text("Cost:", ui::StyleType::TotalLabel),
            ui::format_amount(self.total_cost),
            ui::style_text("Value:", ui::StyleType::TotalLabel),
            ui::style_text(&ui::format_amount(self.total_value), ui::StyleType::TotalValue),
            ui::style_text("Profit:", ui::StyleType::TotalLabel),
            ui::format_amount(self.total_profit),
            ui::format_amount(self.total_profit_rate),
        ));

        output
    }
}

pub async fn run(portfolios: &[Portfolio], engine: &FundEngine) -> Result<()> {
    let clock = SystemClock;
    let num_portfolios = portfolios.len();

    for (i, portfolio) in portfolios.iter().enumerate() {
        let pb = ui::new_spinner(&format!("Valuing {}...", portfolio.name));
        let stats =
            compute_realtime_stats(portfolio, &portfolio.holdings, engine, clock.now()).await;
        pb.finish_and_clear();

        println!("{}", stats.display_as_table());
        let skipped = portfolio.holdings.len() - stats.holdings.len();
        if skipped > 0 {
            println!(
                "{}",
                ui::style_text(
                    &format!("{skipped} holding(s) without a quote are excluded"),
                    ui::StyleType::Error
                )
            );
        }
        if i < num_portfolios - 1 {
            ui::print_separator();
        }
    }

    Ok(())
}
