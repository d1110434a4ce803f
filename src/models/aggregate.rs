//! Per-key scale statistics.

use serde::{Deserialize, Serialize};

/// Scale values above this also count as "more positive".
pub const MORE_POSITIVE_THRESHOLD: f64 = 5.2;

/// Scale values below this also count as "more negative".
pub const MORE_NEGATIVE_THRESHOLD: f64 = -2.2;

/// Running statistics for one entity pair in one year.
///
/// `year`, `country_code1` and `country_code2` are fixed when the record is
/// created; later observations only touch the accumulators.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AggregateRecord {
    pub year: String,
    pub country_code1: String,
    pub country_code2: String,
    pub scale_sum: f64,
    pub positive_scale_sum: f64,
    pub negative_scale_sum: f64,
    pub neutral_scale_sum: f64,
    pub more_positive_scale_sum: f64,
    pub more_negative_scale_sum: f64,
    pub scale_count: u64,
    pub positive_scale_count: u64,
    pub negative_scale_count: u64,
    pub neutral_scale_count: u64,
    pub more_positive_scale_count: u64,
    pub more_negative_scale_count: u64,
}

impl AggregateRecord {
    /// Create an empty record labelled with its grouping identity.
    pub fn new(
        year: impl Into<String>,
        country_code1: impl Into<String>,
        country_code2: impl Into<String>,
    ) -> Self {
        Self {
            year: year.into(),
            country_code1: country_code1.into(),
            country_code2: country_code2.into(),
            ..Self::default()
        }
    }

    /// Account for one observed scale value.
    pub fn absorb(&mut self, scale: f64) {
        self.scale_count += 1;
        self.scale_sum += scale;

        if scale > 0.0 {
            self.positive_scale_count += 1;
            self.positive_scale_sum += scale;
            if scale > MORE_POSITIVE_THRESHOLD {
                self.more_positive_scale_count += 1;
                self.more_positive_scale_sum += scale;
            }
        } else if scale < 0.0 {
            self.negative_scale_count += 1;
            self.negative_scale_sum += scale;
            if scale < MORE_NEGATIVE_THRESHOLD {
                self.more_negative_scale_count += 1;
                self.more_negative_scale_sum += scale;
            }
        } else {
            self.neutral_scale_count += 1;
            self.neutral_scale_sum += scale;
        }
    }

    /// Add every accumulator of `other` into `self`. Identity fields are kept.
    pub fn merge(&mut self, other: &AggregateRecord) {
        self.scale_sum += other.scale_sum;
        self.positive_scale_sum += other.positive_scale_sum;
        self.negative_scale_sum += other.negative_scale_sum;
        self.neutral_scale_sum += other.neutral_scale_sum;
        self.more_positive_scale_sum += other.more_positive_scale_sum;
        self.more_negative_scale_sum += other.more_negative_scale_sum;
        self.scale_count += other.scale_count;
        self.positive_scale_count += other.positive_scale_count;
        self.negative_scale_count += other.negative_scale_count;
        self.neutral_scale_count += other.neutral_scale_count;
        self.more_positive_scale_count += other.more_positive_scale_count;
        self.more_negative_scale_count += other.more_negative_scale_count;
    }

    /// Copy of this record with the two codes swapped.
    pub fn mirrored(&self) -> Self {
        Self {
            country_code1: self.country_code2.clone(),
            country_code2: self.country_code1.clone(),
            ..self.clone()
        }
    }

    /// Whether both codes name the same entity.
    pub fn is_symmetric(&self) -> bool {
        self.country_code1 == self.country_code2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_more_positive() {
        let mut record = AggregateRecord::new("2013", "USA", "CHN");
        record.absorb(6.0);

        assert_eq!(record.scale_count, 1);
        assert_eq!(record.positive_scale_count, 1);
        assert_eq!(record.positive_scale_sum, 6.0);
        assert_eq!(record.more_positive_scale_count, 1);
        assert_eq!(record.more_positive_scale_sum, 6.0);
        assert_eq!(record.negative_scale_count, 0);
        assert_eq!(record.neutral_scale_count, 0);
    }

    #[test]
    fn test_absorb_plain_positive() {
        let mut record = AggregateRecord::new("2013", "USA", "CHN");
        record.absorb(5.0);

        assert_eq!(record.positive_scale_count, 1);
        assert_eq!(record.positive_scale_sum, 5.0);
        assert_eq!(record.more_positive_scale_count, 0);
        assert_eq!(record.more_positive_scale_sum, 0.0);
    }

    #[test]
    fn test_absorb_threshold_is_exclusive() {
        let mut record = AggregateRecord::new("2013", "USA", "CHN");
        record.absorb(5.2);
        record.absorb(-2.2);

        assert_eq!(record.more_positive_scale_count, 0);
        assert_eq!(record.more_negative_scale_count, 0);
        assert_eq!(record.positive_scale_count, 1);
        assert_eq!(record.negative_scale_count, 1);
    }

    #[test]
    fn test_absorb_negative_and_neutral() {
        let mut record = AggregateRecord::new("2013", "USA", "CHN");
        record.absorb(-10.0);
        record.absorb(-1.0);
        record.absorb(0.0);

        assert_eq!(record.scale_count, 3);
        assert_eq!(record.scale_sum, -11.0);
        assert_eq!(record.negative_scale_count, 2);
        assert_eq!(record.negative_scale_sum, -11.0);
        assert_eq!(record.more_negative_scale_count, 1);
        assert_eq!(record.more_negative_scale_sum, -10.0);
        assert_eq!(record.neutral_scale_count, 1);
        assert_eq!(
            record.scale_count,
            record.positive_scale_count + record.negative_scale_count + record.neutral_scale_count
        );
    }

    #[test]
    fn test_absorb_order_independent() {
        let mut ab = AggregateRecord::new("2013", "USA", "CHN");
        ab.absorb(3.5);
        ab.absorb(-7.0);

        let mut ba = AggregateRecord::new("2013", "USA", "CHN");
        ba.absorb(-7.0);
        ba.absorb(3.5);

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_merge_adds_fields_and_keeps_identity() {
        let mut left = AggregateRecord::new("2013", "USA", "CHN");
        left.absorb(6.0);
        left.absorb(0.0);

        let mut right = AggregateRecord::new("2013", "CHN", "USA");
        right.absorb(-3.0);

        left.merge(&right);

        assert_eq!(left.country_code1, "USA");
        assert_eq!(left.scale_count, 3);
        assert_eq!(left.scale_sum, 3.0);
        assert_eq!(left.more_positive_scale_count, 1);
        assert_eq!(left.more_negative_scale_sum, -3.0);
        assert_eq!(left.neutral_scale_count, 1);
    }

    #[test]
    fn test_mirrored() {
        let mut record = AggregateRecord::new("2013", "USA", "CHN");
        record.absorb(1.5);

        let mirror = record.mirrored();
        assert_eq!(mirror.country_code1, "CHN");
        assert_eq!(mirror.country_code2, "USA");
        assert_eq!(mirror.scale_sum, record.scale_sum);
        assert!(!record.is_symmetric());
    }
}
