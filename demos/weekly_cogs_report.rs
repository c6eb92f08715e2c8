use chrono::{Local, NaiveDate};
use cogs_dashboard_builder::gateway::{AccountingClient, PosClient, UpstreamPipeline};
use cogs_dashboard_builder::*;
use dotenv::dotenv;
use std::error::Error;
use std::path::PathBuf;

fn as_of_date() -> std::result::Result<NaiveDate, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(raw) => Ok(NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?),
        None => Ok(Local::now().date_naive()),
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path =
        std::env::var("COGS_CONFIG").unwrap_or_else(|_| "cogs_config.json".to_string());
    let out_dir = PathBuf::from(std::env::var("COGS_OUTPUT_DIR").unwrap_or_else(|_| ".".to_string()));

    let config = ReportConfig::from_json_file(&config_path)?;
    let as_of = as_of_date()?;
    let period = reporting_period(as_of, &config.fiscal_year_starts)?;

    println!(
        "📊 {} COGS: FY{} P{} ({} to {}), as of {}",
        config.organization_name, period.fiscal_year, period.number, period.start, period.end, as_of
    );

    let accounting = AccountingClient::from_env()?;
    let mut pipeline = UpstreamPipeline::new(&config, accounting)
        .with_cache(SalesCache::new(out_dir.join("cache")));
    match PosClient::from_env().await {
        Ok(pos) => pipeline = pipeline.with_pos(pos),
        Err(e) => println!("⚠️  POS unavailable ({}); sales will be empty", e),
    }

    let budget = Budget::load(out_dir.join("budget.json"))?;
    let inputs = pipeline.collect(&period, as_of, budget).await?;
    let report = CogsReportProcessor::process_period(&config, &inputs, &period, as_of)?;

    if let Some(week) = report.current_week() {
        println!(
            "\nWeek {} ({} to {}): {} of {} stores counted",
            week.week_number,
            week.start,
            week.end,
            week.summary.stores.iter().filter(|r| r.has_stock_count).count(),
            week.summary.stores.len()
        );
    }

    let totals = &report.period_summary.totals;
    println!("\n{:<8} {:<18} {:>12} {:>12} {:>8} {:>8}", "Store", "Name", "Net Purch", "Sales", "Inv %", "Cov %");
    for row in &report.period_summary.stores {
        println!(
            "{:<8} {:<18} {:>12.2} {:>12.2} {:>8} {:>8}",
            row.store_code,
            row.store_name,
            row.net_purchases,
            row.net_sales,
            fmt_pct(row.inventory_cogs_pct),
            fmt_pct(row.coverage_cogs_pct)
        );
    }
    println!(
        "{:<8} {:<18} {:>12.2} {:>12.2} {:>8} {:>8}",
        "ALL",
        "",
        totals.net_purchases,
        totals.net_sales,
        fmt_pct(totals.inventory_cogs_pct),
        fmt_pct(totals.coverage_cogs_pct)
    );

    let quality = &report.data_quality;
    if quality.skipped_total > 0 {
        println!("\n⚠️  {} detail lines skipped", quality.skipped_total);
    }
    for missing in &quality.missing_stock_counts {
        println!("⚠️  {}: no stock count for {}", missing.window, missing.stores.join(", "));
    }

    std::fs::create_dir_all(&out_dir)?;
    let json_path = out_dir.join("cogs_report.json");
    std::fs::write(&json_path, report.to_json()?)?;
    let html_path = out_dir.join("cogs_dashboard.html");
    std::fs::write(&html_path, render_dashboard_html(&report, DEFAULT_TEMPLATE)?)?;

    println!("\n✅ Wrote {} and {}", json_path.display(), html_path.display());
    Ok(())
}

fn fmt_pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}%", v)).unwrap_or_else(|| "N/A".to_string())
}
