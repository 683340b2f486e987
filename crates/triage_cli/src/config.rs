//! RON configuration for the `xray-triage` binary.
//!
//! Every field has a default, so an empty `()` file is a valid configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use triage_core::{ClassLabel, LabelEntry, LabelTable};
use triage_engine::{
    ClassifierSettings, ControllerSettings, ExportOptions, Quoting, ServiceClass,
    DEFAULT_MAX_PAYLOAD_BYTES,
};
use triage_logging::triage_info;

pub const DEFAULT_STEM: &str = "covid-classification-report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub endpoint: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_response_bytes: u64,
    pub max_payload_bytes: u64,
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub classes: Vec<ServiceClass>,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub labels: Vec<LabelEntry>,
    pub error_status: String,
    pub quoting: Quoting,
    pub stem: String,
}

impl Default for TriageConfig {
    fn default() -> Self {
        let classifier = ClassifierSettings::default();
        let controller = ControllerSettings::default();
        Self {
            endpoint: classifier.endpoint,
            connect_timeout_ms: duration_ms(classifier.connect_timeout),
            request_timeout_ms: duration_ms(classifier.request_timeout),
            max_response_bytes: classifier.max_response_bytes,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            concurrency: controller.concurrency,
            max_retries: controller.max_retries,
            retry_backoff_ms: duration_ms(controller.retry_backoff),
            classes: classifier.classes,
            report: ReportConfig::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        let table = LabelTable::default();
        Self {
            labels: table.labels().to_vec(),
            error_status: table.error_status().to_string(),
            quoting: Quoting::None,
            stem: DEFAULT_STEM.to_string(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl TriageConfig {
    /// Reads and validates a RON configuration file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        triage_info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the constraints serde cannot express. The endpoint itself is
    /// checked when the classifier is built.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if self.classes.is_empty() {
            bail!("at least one service class must be configured");
        }
        for label in [ClassLabel::Positive, ClassLabel::Negative] {
            if !self.classes.iter().any(|class| class.label == label) {
                bail!("no service class maps to {label}");
            }
        }
        if self.report.stem.trim().is_empty() {
            bail!("report stem must not be empty");
        }
        self.label_table()?;
        Ok(())
    }

    pub fn label_table(&self) -> anyhow::Result<LabelTable> {
        let table = LabelTable::new(self.report.labels.clone(), self.report.error_status.clone())
            .context("invalid report labels")?;
        Ok(table)
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            endpoint: self.endpoint.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            max_response_bytes: self.max_response_bytes,
            classes: self.classes.clone(),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_payload_bytes: self.max_payload_bytes,
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            quoting: self.report.quoting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = include_str!("../triage.sample.ron");

    #[test]
    fn empty_file_gives_defaults() {
        let config = TriageConfig::parse("()").unwrap();
        assert_eq!(config, TriageConfig::default());
        assert_eq!(config.max_payload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.report.stem, DEFAULT_STEM);
    }

    #[test]
    fn sample_config_parses() {
        let config = TriageConfig::parse(SAMPLE).unwrap();
        let table = config.label_table().unwrap();
        assert_eq!(table.entry(ClassLabel::Positive).prediction, "COVID");
        assert_eq!(table.entry(ClassLabel::Negative).status, "Negative");
        assert_eq!(config.controller_settings().concurrency, 1);
        assert_eq!(
            config.classifier_settings().request_timeout,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn retry_and_response_limits_reach_the_engine() {
        let config =
            TriageConfig::parse("(max_retries: 3, retry_backoff_ms: 50, max_response_bytes: 4096)")
                .unwrap();
        let controller = config.controller_settings();
        assert_eq!(controller.max_retries, 3);
        assert_eq!(controller.retry_backoff, Duration::from_millis(50));
        assert_eq!(config.classifier_settings().max_response_bytes, 4096);
    }

    #[test]
    fn quoting_can_be_enabled() {
        let config = TriageConfig::parse("(report: (quoting: Minimal))").unwrap();
        assert_eq!(config.export_options().quoting, Quoting::Minimal);
        assert_eq!(config.report.error_status, "Error");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = TriageConfig::parse("(concurrency: 0)").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn label_table_must_cover_both_labels() {
        let text = r#"(report: (labels: [(label: Positive, prediction: "COVID", status: "Positive")]))"#;
        let err = TriageConfig::parse(text).unwrap_err();
        assert!(format!("{err:#}").contains("no entry for negative"));
    }

    #[test]
    fn class_mapping_must_cover_both_labels() {
        let text = r#"(classes: [(name: "COVID", label: Positive)])"#;
        assert!(TriageConfig::parse(text).is_err());
    }
}
