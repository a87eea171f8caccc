//! Label sanitization for free-text categorical columns.

use crate::error::Result;
use crate::utils::{normalize_label, require_series, string_values};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Counts produced by a label pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelOutcome {
    /// Values whose text changed.
    pub changed: usize,
    /// Values resolved through the alias map.
    pub aliased: usize,
}

/// Trim and title-case every value of `col_name`, then resolve aliases.
///
/// Alias keys go through the same normalization, so `"bengaluru"` in the data
/// matches a `"Bengaluru"` key. Values with no alias pass through after
/// normalization; nulls stay null.
pub(crate) fn canonicalize_labels(
    df: &mut DataFrame,
    col_name: &str,
    aliases: &BTreeMap<String, String>,
) -> Result<LabelOutcome> {
    let lookup: HashMap<String, &str> = aliases
        .iter()
        .map(|(alias, canonical)| (normalize_label(alias), canonical.as_str()))
        .collect();

    let values = string_values(require_series(df, col_name)?)?;
    let mut outcome = LabelOutcome::default();

    let cleaned: Vec<Option<String>> = values
        .into_iter()
        .map(|opt_val| {
            opt_val.map(|val| {
                let normalized = normalize_label(&val);
                let resolved = match lookup.get(&normalized) {
                    Some(canonical) => {
                        outcome.aliased += 1;
                        canonical.to_string()
                    }
                    None => normalized,
                };
                if resolved != val {
                    outcome.changed += 1;
                }
                resolved
            })
        })
        .collect();

    df.replace(col_name, Series::new(col_name.into(), cleaned))?;
    debug!(
        "Normalized '{}': {} values changed, {} via alias",
        col_name, outcome.changed, outcome.aliased
    );
    Ok(outcome)
}

/// Trim and title-case every value of `col_name`. No alias map.
pub(crate) fn normalize_labels(df: &mut DataFrame, col_name: &str) -> Result<LabelOutcome> {
    canonicalize_labels(df, col_name, &BTreeMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn column(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        string_values(df.column(name).unwrap().as_materialized_series()).unwrap()
    }

    #[test]
    fn test_region_aliases_resolved_after_normalization() {
        let aliases = PipelineConfig::default().region_aliases;
        let mut df = df![
            "Region" => [Some(" bengaluru "), Some("HYD"), Some("hyderbad"), Some("mumbai"), None, Some("Atlantis")]
        ]
        .unwrap();

        let outcome = canonicalize_labels(&mut df, "Region", &aliases).unwrap();
        assert_eq!(outcome.aliased, 3);

        assert_eq!(
            column(&df, "Region"),
            vec![
                Some("Bangalore".to_string()),
                Some("Hyderabad".to_string()),
                Some("Hyderabad".to_string()),
                Some("Mumbai".to_string()),
                None,
                Some("Atlantis".to_string()),
            ]
        );
    }

    #[test]
    fn test_alias_keys_are_normalized() {
        let mut aliases = BTreeMap::new();
        aliases.insert("  bombay".to_string(), "Mumbai".to_string());
        let mut df = df!["Region" => ["BOMBAY"]].unwrap();

        canonicalize_labels(&mut df, "Region", &aliases).unwrap();
        assert_eq!(column(&df, "Region"), vec![Some("Mumbai".to_string())]);
    }

    #[test]
    fn test_normalize_labels() {
        let mut df = df!["Product_Line" => ["  running shoes", "Training", "BASKETBALL "]].unwrap();
        let outcome = normalize_labels(&mut df, "Product_Line").unwrap();
        assert_eq!(outcome.changed, 2);
        assert_eq!(outcome.aliased, 0);
        assert_eq!(
            column(&df, "Product_Line"),
            vec![
                Some("Running Shoes".to_string()),
                Some("Training".to_string()),
                Some("Basketball".to_string()),
            ]
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let aliases = PipelineConfig::default().region_aliases;
        let mut df = df!["Region" => [" bengaluru ", "pune"]].unwrap();
        canonicalize_labels(&mut df, "Region", &aliases).unwrap();
        let second = canonicalize_labels(&mut df, "Region", &aliases).unwrap();
        assert_eq!(second.changed, 0);
    }
}
