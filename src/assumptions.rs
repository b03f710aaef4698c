// 📐 Business Assumptions - seasonality and price elasticity as data
//
// These numbers have no derivation behind them; they are business guesses.
// They live here as configuration (loadable from JSON) instead of hidden
// constants, and the defaults keep the values the dashboards have always used.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// ============================================================================
// SEASONALITY
// ============================================================================

/// Revenue multipliers by calendar month (1 = January)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityTable {
    /// High-demand months (summer)
    pub peak_months: Vec<u32>,
    pub peak_multiplier: f64,

    /// Low-demand months (winter)
    pub low_months: Vec<u32>,
    pub low_multiplier: f64,
}

impl SeasonalityTable {
    /// Multiplier for a calendar month, 1.0 when the month is in neither set
    pub fn multiplier_for(&self, month: u32) -> f64 {
        if self.peak_months.contains(&month) {
            self.peak_multiplier
        } else if self.low_months.contains(&month) {
            self.low_multiplier
        } else {
            1.0
        }
    }

    /// Table that never adjusts anything
    pub fn flat() -> Self {
        SeasonalityTable {
            peak_months: Vec::new(),
            peak_multiplier: 1.0,
            low_months: Vec::new(),
            low_multiplier: 1.0,
        }
    }
}

impl Default for SeasonalityTable {
    fn default() -> Self {
        SeasonalityTable {
            peak_months: vec![6, 7, 8],
            peak_multiplier: 1.10,
            low_months: vec![12, 1, 2],
            low_multiplier: 0.95,
        }
    }
}

// ============================================================================
// PRICE ELASTICITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElasticityTable {
    /// Elasticity when the category is unknown or history is thin
    pub default: f64,

    /// Per product-category elasticity (keyed by category name)
    pub by_category: BTreeMap<String, f64>,

    /// Minimum number of daily sales points before category values are trusted
    pub min_history_points: usize,

    /// Share of buyers assumed to take a bundle offer
    pub bundling_take_rate: f64,
}

impl ElasticityTable {
    /// Elasticity for a product, given its category and how much history exists
    pub fn for_product(&self, category: Option<&str>, history_points: usize) -> f64 {
        if history_points < self.min_history_points {
            return self.default;
        }

        category
            .and_then(|name| self.by_category.get(name))
            .copied()
            .unwrap_or(self.default)
    }
}

impl Default for ElasticityTable {
    fn default() -> Self {
        let mut by_category = BTreeMap::new();
        by_category.insert("Supplements".to_string(), -2.5);
        by_category.insert("Equipment".to_string(), -1.5);

        ElasticityTable {
            default: -2.0,
            by_category,
            min_history_points: 10,
            bundling_take_rate: 0.3,
        }
    }
}

// ============================================================================
// ASSUMPTION SET
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessAssumptions {
    #[serde(default)]
    pub seasonality: SeasonalityTable,

    #[serde(default)]
    pub elasticity: ElasticityTable,
}

impl BusinessAssumptions {
    /// Load assumptions from a JSON file; missing sections keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read assumptions file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let assumptions: BusinessAssumptions =
            serde_json::from_str(content).context("Failed to parse assumptions JSON")?;

        Ok(assumptions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_seasonality() {
        let table = SeasonalityTable::default();

        assert_eq!(table.multiplier_for(7), 1.10);
        assert_eq!(table.multiplier_for(12), 0.95);
        assert_eq!(table.multiplier_for(1), 0.95);
        assert_eq!(table.multiplier_for(4), 1.0);
        assert_eq!(table.multiplier_for(10), 1.0);
    }

    #[test]
    fn test_elasticity_by_category() {
        let table = ElasticityTable::default();

        assert_eq!(table.for_product(Some("Supplements"), 30), -2.5);
        assert_eq!(table.for_product(Some("Equipment"), 30), -1.5);
        assert_eq!(table.for_product(Some("Apparel"), 30), -2.0);
        assert_eq!(table.for_product(None, 30), -2.0);
    }

    #[test]
    fn test_elasticity_thin_history_uses_default() {
        let table = ElasticityTable::default();
        assert_eq!(table.for_product(Some("Supplements"), 3), -2.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "seasonality": { "peak_months": [1], "peak_multiplier": 1.3,
                                          "low_months": [], "low_multiplier": 1.0 } }"#;
        let assumptions = BusinessAssumptions::from_json(json).unwrap();

        assert_eq!(assumptions.seasonality.multiplier_for(1), 1.3);
        assert_eq!(assumptions.seasonality.multiplier_for(7), 1.0);
        assert_eq!(assumptions.elasticity, ElasticityTable::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "elasticity": {{ "default": -1.0, "by_category": {{}},
                          "min_history_points": 0, "bundling_take_rate": 0.5 }} }}"#)
            .unwrap();

        let assumptions = BusinessAssumptions::from_file(file.path()).unwrap();
        assert_eq!(assumptions.elasticity.default, -1.0);
        assert_eq!(assumptions.elasticity.bundling_take_rate, 0.5);
        assert_eq!(assumptions.seasonality, SeasonalityTable::default());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(BusinessAssumptions::from_file("/definitely/not/here.json").is_err());
    }
}
