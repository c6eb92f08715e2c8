use crate::error::{CogsError, Result};
use crate::report::CogsReport;
use log::debug;

/// Marker replaced with the report JSON.
pub const DATA_PLACEHOLDER: &str = "__DASHBOARD_DATA__";

/// Bare page that exposes the report as `window.DASHBOARD` for a client-side
/// dashboard script.
pub const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>COGS Dashboard</title>
</head>
<body>
<div id="dashboard"></div>
<script>
window.DASHBOARD = __DASHBOARD_DATA__;
</script>
</body>
</html>
"#;

/// Embeds `report` into `template` at [`DATA_PLACEHOLDER`].
///
/// `</` is written as `<\/` so that a string in the data cannot close the
/// surrounding script element.
pub fn render_dashboard_html(report: &CogsReport, template: &str) -> Result<String> {
    if !template.contains(DATA_PLACEHOLDER) {
        return Err(CogsError::InvalidConfig(format!(
            "dashboard template has no {} placeholder",
            DATA_PLACEHOLDER
        )));
    }

    let data = serde_json::to_string(report)?.replace("</", "<\\/");
    debug!("Embedding {} bytes of report data", data.len());
    Ok(template.replacen(DATA_PLACEHOLDER, &data, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DataQuality, TotalsRow, WindowSummary};
    use chrono::NaiveDate;

    fn report(name: &str) -> CogsReport {
        let date = NaiveDate::from_ymd_opt(2026, 1, 27).unwrap();
        CogsReport {
            organization_name: name.to_string(),
            fiscal_year: 2026,
            period: 1,
            period_start: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            period_end: date,
            as_of: date,
            coverage_factor: 4.39,
            coverage_calibrated_from: None,
            include_journal_entries: false,
            include_item_transfers: false,
            weeks: vec![],
            period_summary: WindowSummary {
                stores: vec![],
                totals: TotalsRow {
                    net_sales: 0.0,
                    labor_hours: 0.0,
                    labor_cost: 0.0,
                    labor_pct: None,
                    purchases: Default::default(),
                    gross_purchases: 0.0,
                    credits: 0.0,
                    adjustments: 0.0,
                    net_purchases: 0.0,
                    waste: 0.0,
                    invoice_cogs: 0.0,
                    inventory_cogs: None,
                    inventory_stores: 0,
                    coverage_cogs: 0.0,
                    invoice_cogs_pct: None,
                    inventory_cogs_pct: None,
                    coverage_cogs_pct: None,
                    invoices: Default::default(),
                    budget: None,
                },
            },
            gm_status: vec![],
            budget_loaded: false,
            data_quality: DataQuality::default(),
        }
    }

    #[test]
    fn test_embeds_and_escapes() {
        let html = render_dashboard_html(&report("Bad </script> Co"), DEFAULT_TEMPLATE).unwrap();
        assert!(!html.contains(DATA_PLACEHOLDER));
        assert!(html.contains("Bad <\\/script> Co"));
        assert_eq!(html.matches("</script>").count(), 1);
        assert!(html.contains("\"inventory_cogs\":null"));
    }

    #[test]
    fn test_template_without_placeholder() {
        assert!(render_dashboard_html(&report("x"), "<html></html>").is_err());
    }
}
