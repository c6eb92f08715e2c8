use crate::config::{validate_coverage_factor, CoverageConfig};
use crate::error::{CogsError, Result};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A suggested coverage factor derived from one closed period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageCalibration {
    /// Period the figures came from, e.g. "P1 2026".
    pub label: String,
    pub net_purchases: f64,
    pub actual_cogs: f64,
    pub factor: f64,
}

impl CoverageCalibration {
    /// Config block recording this calibration. Nothing applies it automatically.
    pub fn to_config(&self) -> CoverageConfig {
        CoverageConfig {
            factor: self.factor,
            calibrated_from: Some(self.label.clone()),
        }
    }
}

/// Suggests `actual_cogs / net_purchases` as the coverage factor.
///
/// `actual_cogs` is the booked COGS for the closed period and `net_purchases`
/// the invoiced net purchases this engine computed for the same period.
pub fn calibrate_coverage_factor(
    label: &str,
    net_purchases: f64,
    actual_cogs: f64,
) -> Result<CoverageCalibration> {
    let fail = |details: String| CogsError::Calibration {
        label: label.to_string(),
        details,
    };

    if !net_purchases.is_finite() || !actual_cogs.is_finite() {
        return Err(fail("inputs must be finite".to_string()));
    }
    if net_purchases <= 0.0 {
        return Err(fail(format!(
            "net purchases must be positive, got {:.2}",
            net_purchases
        )));
    }
    if actual_cogs < 0.0 {
        return Err(fail(format!(
            "actual COGS must not be negative, got {:.2}",
            actual_cogs
        )));
    }

    let factor = actual_cogs / net_purchases;
    validate_coverage_factor(factor)?;

    info!(
        "Calibrated coverage factor {:.4} from {} (actual {:.2} / invoiced {:.2})",
        factor, label, actual_cogs, net_purchases
    );

    Ok(CoverageCalibration {
        label: label.to_string(),
        net_purchases,
        actual_cogs,
        factor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_is_ratio() {
        let calibration = calibrate_coverage_factor("P1 2026", 10_000.0, 43_900.0).unwrap();
        assert!((calibration.factor - 4.39).abs() < 1e-12);

        let config = calibration.to_config();
        assert_eq!(config.calibrated_from.as_deref(), Some("P1 2026"));
        assert_eq!(config.factor, calibration.factor);
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        for (net, actual) in [(0.0, 100.0), (-5.0, 100.0), (100.0, -1.0), (f64::NAN, 1.0)] {
            assert!(matches!(
                calibrate_coverage_factor("P2 2026", net, actual),
                Err(CogsError::Calibration { .. })
            ));
        }
    }
}
