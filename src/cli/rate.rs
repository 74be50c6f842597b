use super::ui;
use crate::app::{App, TriggeredAlert};
use crate::core::{Alert, ExchangeRate};
use crate::core::currency::format_amount;
use anyhow::Result;
use comfy_table::Cell;

const RATE_PRECISION: u32 = 4;

/// Shows one rate, fetched or cached, and any alert it fired.
pub async fn run(app: &mut App, source: &str, target: &str, update: bool) -> Result<()> {
    let check = app.exchange_rate(source, target, update).await?;
    let rate = &check.quote.rate;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Rate"),
        ui::header_cell("Source"),
        ui::header_cell("As of"),
    ]);
    table.add_row(vec![
        Cell::new(format!("{}/{}", rate.source(), rate.target())),
        ui::rate_cell(rate.format_rate(RATE_PRECISION)),
        ui::freshness_cell(check.quote.freshness),
        Cell::new(ui::format_timestamp(rate.timestamp())),
    ]);
    println!("{table}");

    if let (Some(from), Some(to)) = (rate.source_name(), rate.target_name()) {
        println!(
            "{}",
            ui::style_text(&format!("{from} → {to}"), ui::StyleType::Subtle)
        );
    }
    for alert in &check.triggered {
        print_alert(alert, rate);
    }
    Ok(())
}

/// Refreshes every rate the provider offers in one request.
pub async fn update(app: &mut App) -> Result<()> {
    let fired = app.update_all_rates().await?;
    let rates = app.exchange().cached_rates().await;

    if rates.is_empty() {
        println!(
            "{}",
            ui::style_text("Provider returned no rates", ui::StyleType::Warning)
        );
    } else {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Pair"),
            ui::header_cell("Rate"),
            ui::header_cell("As of"),
        ]);
        for rate in &rates {
            table.add_row(vec![
                Cell::new(format!("{}/{}", rate.source(), rate.target())),
                ui::rate_cell(format_amount(rate.rate(), rate.target())),
                Cell::new(ui::format_timestamp(rate.timestamp())),
            ]);
        }
        println!("{table}");
    }

    println!(
        "{}",
        ui::style_text("All currency rates updated", ui::StyleType::Success)
    );
    for TriggeredAlert { alert, rate } in &fired {
        print_alert(alert, rate);
    }
    Ok(())
}

pub(crate) fn print_alert(alert: &Alert, rate: &ExchangeRate) {
    let message = format!(
        "Alert: {} is {} {} ({})",
        alert.currency_pair,
        alert.direction(),
        alert.threshold,
        rate.format_rate(RATE_PRECISION)
    );
    println!("{}", ui::style_text(&message, ui::StyleType::Warning));
}
