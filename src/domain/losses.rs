use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::ConfigError;

/// System loss categories, following the PVWatts loss breakdown.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LossCategory {
    Soiling,
    Shading,
    Snow,
    Mismatch,
    Wiring,
    Connections,
    /// Light-induced degradation
    Lid,
    NameplateRating,
    Age,
    Availability,
}

impl LossCategory {
    /// PVWatts default loss in percent.
    pub fn pvwatts_default(&self) -> f64 {
        match self {
            Self::Soiling => 2.0,
            Self::Shading => 3.0,
            Self::Snow => 0.0,
            Self::Mismatch => 2.0,
            Self::Wiring => 2.0,
            Self::Connections => 0.5,
            Self::Lid => 1.5,
            Self::NameplateRating => 1.0,
            Self::Age => 0.0,
            Self::Availability => 3.0,
        }
    }
}

/// Declared loss percentages of one array, one entry per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LossFactors {
    percent: BTreeMap<LossCategory, f64>,
}

impl LossFactors {
    /// No declared losses; the combined derate is exactly 1.
    pub fn none() -> Self {
        Self::default()
    }

    /// All categories at their PVWatts default.
    pub fn pvwatts_defaults() -> Self {
        Self {
            percent: LossCategory::iter()
                .map(|c| (c, c.pvwatts_default()))
                .collect(),
        }
    }

    /// Validate and wrap a category → percent mapping.
    pub fn new(percent: BTreeMap<LossCategory, f64>) -> Result<Self, ConfigError> {
        for (&category, &value) in &percent {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Loss { category, value });
            }
        }
        Ok(Self { percent })
    }

    pub fn get(&self, category: LossCategory) -> Option<f64> {
        self.percent.get(&category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LossCategory, f64)> + '_ {
        self.percent.iter().map(|(c, p)| (*c, *p))
    }

    pub fn len(&self) -> usize {
        self.percent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.percent.is_empty()
    }

    /// Combined multiplicative derate `∏(1 - loss_i / 100)`.
    ///
    /// Each declared category contributes exactly once. Five 2 % losses give
    /// `0.98^5 ≈ 0.9039`, not `0.90`.
    pub fn combined_derate(&self) -> f64 {
        self.percent
            .values()
            .map(|p| 1.0 - p / 100.0)
            .product()
    }

    /// Combined loss in percent, `100 · (1 - derate)`.
    pub fn combined_percent(&self) -> f64 {
        100.0 * (1.0 - self.combined_derate())
    }
}
