use crate::error::{ReportError, Result};
use crate::normalize::{BlameKind, BlameLabel, StatusKind, StatusLabel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const ENV_MIS_SHIP_TARGET: &str = "REPORT_MIS_SHIP_TARGET";
pub const ENV_MISSING_TARGET: &str = "REPORT_MISSING_TARGET";

/// Report-wide settings. Every field has a default so a partial JSON file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Mis-ship target rate (fraction, 0.00019 = 0.019%)
    pub mis_ship_target: f64,

    /// Missing-unit target rate
    pub missing_target: f64,

    /// Statuses counted as mis-ship
    pub mis_ship_statuses: Vec<String>,

    /// Statuses counted as missing units
    pub missing_statuses: Vec<String>,

    /// Blames assumed recoverable in the hypothetical rate
    pub recoverable_blames: Vec<String>,

    /// Accepted date column names of the reference totals table
    pub totals_date_columns: Vec<String>,

    /// Accepted unit-total column names of the reference totals table
    pub totals_value_columns: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            mis_ship_target: 0.00019,
            missing_target: 0.00041,
            mis_ship_statuses: vec![StatusKind::CrossMisallocation.label().to_string()],
            missing_statuses: vec![
                StatusKind::ProductionMissing.label().to_string(),
                StatusKind::DeliveryMissing.label().to_string(),
            ],
            recoverable_blames: [
                BlameKind::SystemError,
                BlameKind::DeliveryFault,
                BlameKind::CcTeamFault,
                BlameKind::VendorFault,
                BlameKind::CustomerFault,
            ]
            .iter()
            .map(|kind| kind.label().to_string())
            .collect(),
            totals_date_columns: ["날짜", "일자", "date", "Date"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            totals_value_columns: ["총유닛", "출고유닛", "전체유닛", "total_units", "units"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ReportConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: ReportConfig = serde_json::from_str(&content)?;
        info!("Loaded report config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Apply `REPORT_*` environment overrides on top of this config
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(target) = read_env_rate(ENV_MIS_SHIP_TARGET)? {
            debug!("{} override: {}", ENV_MIS_SHIP_TARGET, target);
            self.mis_ship_target = target;
        }
        if let Some(target) = read_env_rate(ENV_MISSING_TARGET)? {
            debug!("{} override: {}", ENV_MISSING_TARGET, target);
            self.missing_target = target;
        }
        self.validate()?;
        Ok(self)
    }

    /// Apply explicit target overrides (command-line flags) on top of file and env values
    pub fn with_target_overrides(
        mut self,
        mis_ship_target: Option<f64>,
        missing_target: Option<f64>,
    ) -> Result<Self> {
        if let Some(target) = mis_ship_target {
            self.mis_ship_target = target;
        }
        if let Some(target) = missing_target {
            self.missing_target = target;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, target) in [
            ("mis_ship_target", self.mis_ship_target),
            ("missing_target", self.missing_target),
        ] {
            if !target.is_finite() || !(0.0..=1.0).contains(&target) {
                return Err(ReportError::Config(format!(
                    "{} must be a fraction between 0 and 1, got {}",
                    name, target
                )));
            }
        }
        if self.totals_date_columns.is_empty() || self.totals_value_columns.is_empty() {
            return Err(ReportError::Config(
                "totals column name lists must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn mis_ship_status_labels(&self) -> Vec<StatusLabel> {
        self.mis_ship_statuses.iter().map(|s| StatusLabel::normalize(s)).collect()
    }

    pub fn missing_status_labels(&self) -> Vec<StatusLabel> {
        self.missing_statuses.iter().map(|s| StatusLabel::normalize(s)).collect()
    }

    pub fn recoverable_blame_labels(&self) -> Vec<BlameLabel> {
        self.recoverable_blames.iter().map(|s| BlameLabel::normalize(s)).collect()
    }
}

fn read_env_rate(key: &str) -> Result<Option<f64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|e| ReportError::Config(format!("{}='{}' is not a number: {}", key, raw, e))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReportConfig::default();
        assert_eq!(config.mis_ship_target, 0.00019);
        assert_eq!(config.missing_target, 0.00041);
        assert_eq!(
            config.mis_ship_status_labels(),
            vec![StatusLabel::known(StatusKind::CrossMisallocation)]
        );
        assert_eq!(config.recoverable_blame_labels().len(), 5);
        assert!(!config
            .recoverable_blame_labels()
            .contains(&BlameLabel::Known(BlameKind::OfFault)));
    }

    #[test]
    fn test_partial_json() {
        let config: ReportConfig =
            serde_json::from_str(r#"{ "mis_ship_target": 0.0005, "missing_statuses": ["생산 누락"] }"#)
                .unwrap();
        assert_eq!(config.mis_ship_target, 0.0005);
        assert_eq!(config.missing_target, 0.00041);
        assert_eq!(
            config.missing_status_labels(),
            vec![StatusLabel::known(StatusKind::ProductionMissing)]
        );
    }

    // sole user of the REPORT_* variables in this test binary
    #[test]
    fn test_target_precedence() {
        let from_file: ReportConfig =
            serde_json::from_str(r#"{ "mis_ship_target": 0.0005, "missing_target": 0.0006 }"#)
                .unwrap();

        std::env::set_var(ENV_MISSING_TARGET, " 0.0007 ");
        std::env::remove_var(ENV_MIS_SHIP_TARGET);
        let with_env = from_file.clone().with_env_overrides().unwrap();
        assert_eq!(with_env.mis_ship_target, 0.0005);
        assert_eq!(with_env.missing_target, 0.0007);

        let with_cli = with_env.with_target_overrides(None, Some(0.0008)).unwrap();
        assert_eq!(with_cli.mis_ship_target, 0.0005);
        assert_eq!(with_cli.missing_target, 0.0008);

        std::env::set_var(ENV_MISSING_TARGET, "abc");
        let unreadable = from_file.clone().with_env_overrides();
        assert!(matches!(unreadable, Err(ReportError::Config(_))));

        std::env::set_var(ENV_MISSING_TARGET, "2");
        let out_of_range = from_file.with_env_overrides();
        assert!(matches!(out_of_range, Err(ReportError::Config(_))));

        std::env::remove_var(ENV_MISSING_TARGET);
    }

    #[test]
    fn test_cli_override_is_validated() {
        let result = ReportConfig::default().with_target_overrides(Some(-0.1), None);
        assert!(matches!(result, Err(ReportError::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_target() {
        let config = ReportConfig {
            missing_target: 1.5,
            ..ReportConfig::default()
        };
        assert!(matches!(config.validate(), Err(ReportError::Config(_))));
    }
}
