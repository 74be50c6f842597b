use super::ui;
use crate::core::config::AppConfig;
use crate::core::currency::{currency_name, supported_currencies};
use anyhow::Result;
use comfy_table::Cell;
use std::path::Path;

pub fn currencies() {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Name")]);
    for code in supported_currencies() {
        table.add_row(vec![
            Cell::new(code),
            ui::format_optional_cell(currency_name(code), str::to_string),
        ]);
    }
    println!("{}", ui::style_text("Supported currencies", ui::StyleType::Title));
    println!("{table}");
}

/// Prints the effective configuration and where its files live.
pub fn config(config: &AppConfig, config_path: Option<&Path>) -> Result<()> {
    let source = match config_path {
        Some(path) => path.display().to_string(),
        None => {
            let default = AppConfig::default_config_path()?;
            if default.exists() {
                default.display().to_string()
            } else {
                "built-in defaults".to_string()
            }
        }
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Setting"), ui::header_cell("Value")]);
    let rows = [
        ("Config file", source),
        ("API URL", config.api_url.clone()),
        ("Cache TTL", format!("{}s", config.cache_ttl)),
        (
            "Max requests per minute",
            config.max_requests_per_minute.to_string(),
        ),
        ("Retry attempts", config.retry_attempts.to_string()),
        ("Retry base delay", format!("{}ms", config.retry_base_delay_ms)),
        ("Request timeout", format!("{}s", config.request_timeout_secs)),
        ("Rate cache", config.currencies_file()?.display().to_string()),
        ("Alerts file", config.alerts_file()?.display().to_string()),
    ];
    for (setting, value) in rows {
        table.add_row(vec![Cell::new(setting), Cell::new(value)]);
    }

    println!("{}", ui::style_text("fxwatch configuration", ui::StyleType::Title));
    println!("{table}");
    Ok(())
}
