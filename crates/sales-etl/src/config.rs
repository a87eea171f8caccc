//! Configuration types for the ETL pipeline.
//!
//! The outlier multiplier, the canonical region set and the region alias map
//! are externally supplied so the pipeline can be reconfigured without code
//! changes. Configuration is built with [`PipelineConfig::builder()`] or
//! loaded from a JSON file.

use crate::error::{EtlError, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default IQR multiplier for revenue outlier removal.
pub const DEFAULT_OUTLIER_MULTIPLIER: f64 = 1.5;

/// Default pipeline version tag stamped on every output row.
pub const DEFAULT_PIPELINE_VERSION: &str = "2.0";

/// Default canonical region names.
pub const DEFAULT_VALID_REGIONS: [&str; 6] =
    ["Bangalore", "Hyderabad", "Mumbai", "Pune", "Delhi", "Kolkata"];

/// Default date formats tried, in order, when parsing `Order_Date`.
pub const DEFAULT_DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%b %d, %Y",
    "%d %b %Y",
];

fn default_region_aliases() -> BTreeMap<String, String> {
    [
        ("Bengaluru", "Bangalore"),
        ("Hyd", "Hyderabad"),
        ("Hyderbad", "Hyderabad"),
    ]
    .into_iter()
    .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
    .collect()
}

/// Configuration for the ETL pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use sales_etl::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .outlier_multiplier(3.0)
///     .region_alias("Bombay", "Mumbai")
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Multiplier `k` widening the IQR acceptance band for revenue.
    /// Default: 1.5
    pub outlier_multiplier: f64,

    /// Canonical region names accepted by the quality gate.
    pub valid_regions: Vec<String>,

    /// Map from alias (matched after trim + title-case) to canonical region.
    pub region_aliases: BTreeMap<String, String>,

    /// Version tag written to the `etl_version` column.
    /// Default: "2.0"
    pub pipeline_version: String,

    /// `chrono` format strings tried in order when parsing order dates.
    pub date_formats: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            outlier_multiplier: DEFAULT_OUTLIER_MULTIPLIER,
            valid_regions: DEFAULT_VALID_REGIONS.iter().map(|r| r.to_string()).collect(),
            region_aliases: default_region_aliases(),
            pipeline_version: DEFAULT_PIPELINE_VERSION.to_string(),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load and validate a configuration from a JSON file.
    ///
    /// Fields absent from the file keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(EtlError::from)
            .context(format!("Reading config file '{}'", path.display()))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(EtlError::from)
            .context(format!("Parsing config file '{}'", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.outlier_multiplier.is_finite() || self.outlier_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidOutlierMultiplier(
                self.outlier_multiplier,
            ));
        }

        if self.valid_regions.is_empty() {
            return Err(ConfigValidationError::EmptyRegionSet);
        }

        for (alias, canonical) in &self.region_aliases {
            if !self.valid_regions.contains(canonical) {
                return Err(ConfigValidationError::UnknownAliasTarget {
                    alias: alias.clone(),
                    target: canonical.clone(),
                });
            }
        }

        if self.pipeline_version.trim().is_empty() {
            return Err(ConfigValidationError::EmptyPipelineVersion);
        }

        if self.date_formats.is_empty() {
            return Err(ConfigValidationError::NoDateFormats);
        }

        Ok(())
    }

    /// Whether `region` is one of the canonical names.
    pub fn is_valid_region(&self, region: &str) -> bool {
        self.valid_regions.iter().any(|r| r == region)
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid outlier multiplier: {0} (must be a finite value >= 0)")]
    InvalidOutlierMultiplier(f64),

    #[error("The set of valid regions must not be empty")]
    EmptyRegionSet,

    #[error("Region alias '{alias}' maps to '{target}', which is not a valid region")]
    UnknownAliasTarget { alias: String, target: String },

    #[error("Pipeline version tag must not be empty")]
    EmptyPipelineVersion,

    #[error("At least one date format is required")]
    NoDateFormats,
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    outlier_multiplier: Option<f64>,
    valid_regions: Option<Vec<String>>,
    region_aliases: Option<BTreeMap<String, String>>,
    extra_aliases: Vec<(String, String)>,
    pipeline_version: Option<String>,
    date_formats: Option<Vec<String>>,
}

impl PipelineConfigBuilder {
    /// Set the IQR multiplier `k` used for revenue outlier removal.
    pub fn outlier_multiplier(mut self, k: f64) -> Self {
        self.outlier_multiplier = Some(k);
        self
    }

    /// Replace the canonical region set.
    pub fn valid_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    /// Replace the whole alias map.
    pub fn region_aliases(mut self, aliases: BTreeMap<String, String>) -> Self {
        self.region_aliases = Some(aliases);
        self
    }

    /// Add a single alias on top of the (default or replaced) alias map.
    pub fn region_alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.extra_aliases.push((alias.into(), canonical.into()));
        self
    }

    /// Set the version tag stamped on output rows.
    pub fn pipeline_version(mut self, version: impl Into<String>) -> Self {
        self.pipeline_version = Some(version.into());
        self
    }

    /// Replace the list of accepted date formats.
    pub fn date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let mut region_aliases = self.region_aliases.unwrap_or(defaults.region_aliases);
        region_aliases.extend(self.extra_aliases);

        let config = PipelineConfig {
            outlier_multiplier: self
                .outlier_multiplier
                .unwrap_or(defaults.outlier_multiplier),
            valid_regions: self.valid_regions.unwrap_or(defaults.valid_regions),
            region_aliases,
            pipeline_version: self.pipeline_version.unwrap_or(defaults.pipeline_version),
            date_formats: self.date_formats.unwrap_or(defaults.date_formats),
        };

        config.validate()?;
        Ok(config)
    }
}
