//! Input event rows.

use serde::{Deserialize, Serialize};

use crate::models::Dimension;

/// Column positions of the fields we read from a tab-separated event row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    #[serde(default = "defaults::year")]
    pub year: usize,
    #[serde(default = "defaults::actor1_country")]
    pub actor1_country: usize,
    #[serde(default = "defaults::actor2_country")]
    pub actor2_country: usize,
    #[serde(default = "defaults::actor1_geo_country")]
    pub actor1_geo_country: usize,
    #[serde(default = "defaults::actor2_geo_country")]
    pub actor2_geo_country: usize,
    #[serde(default = "defaults::scale")]
    pub scale: usize,
    #[serde(default = "defaults::date_added")]
    pub date_added: usize,
}

impl ColumnSchema {
    /// Highest column index the schema reads.
    pub fn max_index(&self) -> usize {
        [
            self.year,
            self.actor1_country,
            self.actor2_country,
            self.actor1_geo_country,
            self.actor2_geo_country,
            self.scale,
            self.date_added,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

impl Default for ColumnSchema {
    fn default() -> Self {
        Self {
            year: defaults::year(),
            actor1_country: defaults::actor1_country(),
            actor2_country: defaults::actor2_country(),
            actor1_geo_country: defaults::actor1_geo_country(),
            actor2_geo_country: defaults::actor2_geo_country(),
            scale: defaults::scale(),
            date_added: defaults::date_added(),
        }
    }
}

mod defaults {
    pub fn year() -> usize {
        3
    }
    pub fn actor1_country() -> usize {
        7
    }
    pub fn actor2_country() -> usize {
        17
    }
    pub fn actor1_geo_country() -> usize {
        37
    }
    pub fn actor2_geo_country() -> usize {
        44
    }
    pub fn scale() -> usize {
        30
    }
    pub fn date_added() -> usize {
        56
    }
}

/// One parsed event row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputRecord {
    pub year: String,
    pub actor1_country: String,
    pub actor2_country: String,
    pub actor1_geo_country: String,
    pub actor2_geo_country: String,
    /// Raw scale text, parsed lazily by [`InputRecord::scale`]
    pub scale: String,
    pub date_added: String,
}

impl InputRecord {
    /// Code pair for the given dimension, or `None` if either code is empty.
    pub fn codes(&self, dimension: Dimension) -> Option<(&str, &str)> {
        let (code1, code2) = match dimension {
            Dimension::Political => (&self.actor1_country, &self.actor2_country),
            Dimension::Geographic => (&self.actor1_geo_country, &self.actor2_geo_country),
        };
        if code1.is_empty() || code2.is_empty() {
            return None;
        }
        Some((code1, code2))
    }

    /// Numeric scale value, `None` when the text is not a finite number.
    pub fn scale(&self) -> Option<f64> {
        self.scale
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
    }
}
