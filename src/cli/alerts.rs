use super::{rate, ui};
use crate::app::{App, parse_pair};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};
use rust_decimal::Decimal;
use std::future::Future;

pub fn add(
    app: &mut App,
    source: &str,
    target: &str,
    threshold: Decimal,
    below: bool,
) -> Result<()> {
    let pair = parse_pair(source, target)?;
    let alert = app.alerts_mut().add_alert(pair, threshold, !below)?;
    println!(
        "{}",
        ui::style_text(
            &format!(
                "Alert set: 1 {} {} {} {}",
                alert.currency_pair.source(),
                alert.direction(),
                alert.threshold,
                alert.currency_pair.target()
            ),
            ui::StyleType::Success
        )
    );
    Ok(())
}

pub fn remove(app: &mut App, source: &str, target: &str) -> Result<()> {
    let pair = parse_pair(source, target)?;
    if app.alerts_mut().remove_alert(&pair) {
        println!(
            "{}",
            ui::style_text(&format!("Alert removed for {pair}"), ui::StyleType::Success)
        );
    } else {
        println!(
            "{}",
            ui::style_text(&format!("No alert found for {pair}"), ui::StyleType::Warning)
        );
    }
    Ok(())
}

pub fn list(app: &App) -> Result<()> {
    if app.alerts().is_empty() {
        println!("No active alerts");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Pair"),
        ui::header_cell("Direction"),
        ui::header_cell("Threshold"),
        ui::header_cell("Status"),
        ui::header_cell("Last triggered"),
    ]);
    for alert in app.alerts().alerts() {
        table.add_row(vec![
            Cell::new(alert.currency_pair.to_string()),
            Cell::new(alert.direction()),
            Cell::new(alert.threshold.to_string()).set_alignment(CellAlignment::Right),
            ui::enabled_cell(alert.enabled),
            ui::format_optional_cell(alert.last_triggered, ui::format_timestamp),
        ]);
    }
    println!("{}", ui::style_text("Active alerts", ui::StyleType::Title));
    println!("{table}");
    Ok(())
}

/// Checks alerts on a fixed interval until `shutdown` resolves.
pub async fn monitor<S>(app: &mut App, interval_secs: u64, shutdown: S) -> Result<()>
where
    S: Future<Output = ()>,
{
    println!(
        "{}",
        ui::style_text(
            &format!("Starting monitoring loop (interval: {interval_secs}s)"),
            ui::StyleType::Success
        )
    );
    println!("{}", ui::style_text("Press Ctrl+C to stop", ui::StyleType::Subtle));

    app.run_monitoring_loop(interval_secs, shutdown, |fired| {
        rate::print_alert(&fired.alert, &fired.rate)
    })
    .await?;

    ui::print_separator();
    println!(
        "{}",
        ui::style_text("Monitoring stopped", ui::StyleType::Warning)
    );
    Ok(())
}
