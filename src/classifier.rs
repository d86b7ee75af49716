use serde::{Deserialize, Serialize};

use crate::error::{SchemeError, ValueError};
use crate::models::Cycle;

pub const PRESET_NAMES: [&str; 2] = ["canonical", "forty"];

/// Plain, unvalidated form of a band scheme as it appears in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeFile {
    pub cycle_length: u64,
    pub na_threshold: u64,
    pub band_upper_bounds: Vec<u64>,
    #[serde(default)]
    pub reject_zero: bool,
}

/// Repeating banding scheme: each cycle is `cycle_length` coupons long and is
/// split into levels by inclusive upper bounds on the position within the
/// cycle. Positions above the last bound fall into the top level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemeFile", into = "SchemeFile")]
pub struct BandScheme {
    cycle_length: u64,
    na_threshold: u64,
    band_upper_bounds: Vec<u64>,
    reject_zero: bool,
}

impl BandScheme {
    pub fn new(
        cycle_length: u64,
        na_threshold: u64,
        band_upper_bounds: Vec<u64>,
        reject_zero: bool,
    ) -> Result<Self, SchemeError> {
        if cycle_length == 0 {
            return Err(SchemeError::EmptyCycle);
        }

        for (index, pair) in band_upper_bounds.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(SchemeError::BoundsNotAscending {
                    index: index + 1,
                    bound: pair[1],
                });
            }
        }

        if let Some(&bound) = band_upper_bounds.iter().find(|&&b| b >= cycle_length) {
            return Err(SchemeError::BoundOutOfRange {
                bound,
                cycle_length,
            });
        }

        Ok(Self {
            cycle_length,
            na_threshold,
            band_upper_bounds,
            reject_zero,
        })
    }

    /// 41-coupon cycles with level bands of width 5, 6, 6, 6, 6, 10 and a
    /// top band holding positions 40 and 41.
    pub fn canonical() -> Self {
        Self {
            cycle_length: 41,
            na_threshold: 41,
            band_upper_bounds: vec![5, 11, 17, 23, 29, 39],
            reject_zero: false,
        }
    }

    /// Same bands on a 40-coupon cycle; only position 40 reaches the top level.
    pub fn forty() -> Self {
        Self {
            cycle_length: 40,
            na_threshold: 40,
            band_upper_bounds: vec![5, 11, 17, 23, 29, 39],
            reject_zero: false,
        }
    }

    pub fn preset(name: &str) -> Result<Self, SchemeError> {
        match name {
            "canonical" => Ok(Self::canonical()),
            "forty" => Ok(Self::forty()),
            other => Err(SchemeError::UnknownPreset(other.to_string())),
        }
    }

    pub fn cycle_length(&self) -> u64 {
        self.cycle_length
    }

    pub fn na_threshold(&self) -> u64 {
        self.na_threshold
    }

    pub fn band_upper_bounds(&self) -> &[u64] {
        &self.band_upper_bounds
    }

    pub fn max_level(&self) -> u32 {
        self.band_upper_bounds.len() as u32
    }

    /// Classify a raw coupon count into its cycle and level.
    pub fn classify(&self, coupon_cards: i64) -> Result<(Cycle, u32), ValueError> {
        if coupon_cards < 0 {
            return Err(ValueError::Negative(coupon_cards));
        }
        let coupons = coupon_cards as u64;
        if coupons == 0 && self.reject_zero {
            return Err(ValueError::Zero);
        }
        Ok((self.cycle(coupons), self.level(coupons)))
    }

    pub fn cycle(&self, coupons: u64) -> Cycle {
        // Zero never completes a cycle, whatever the threshold says.
        if coupons == 0 || coupons < self.na_threshold {
            return Cycle::NotApplicable;
        }
        Cycle::Number((coupons - 1) / self.cycle_length + 1)
    }

    /// Position within the cycle in `1..=cycle_length`; the last coupon of a
    /// cycle is `cycle_length`, never 0.
    pub fn position(&self, coupons: u64) -> u64 {
        match coupons % self.cycle_length {
            0 => self.cycle_length,
            position => position,
        }
    }

    pub fn level(&self, coupons: u64) -> u32 {
        let position = self.position(coupons);
        self.band_upper_bounds
            .iter()
            .position(|&bound| position <= bound)
            .unwrap_or(self.band_upper_bounds.len()) as u32
    }
}

impl Default for BandScheme {
    fn default() -> Self {
        Self::canonical()
    }
}

impl TryFrom<SchemeFile> for BandScheme {
    type Error = SchemeError;

    fn try_from(raw: SchemeFile) -> Result<Self, Self::Error> {
        Self::new(
            raw.cycle_length,
            raw.na_threshold,
            raw.band_upper_bounds,
            raw.reject_zero,
        )
    }
}

impl From<BandScheme> for SchemeFile {
    fn from(scheme: BandScheme) -> Self {
        Self {
            cycle_length: scheme.cycle_length,
            na_threshold: scheme.na_threshold,
            band_upper_bounds: scheme.band_upper_bounds,
            reject_zero: scheme.reject_zero,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_deterministic() {
        let scheme = BandScheme::canonical();
        for coupons in 0..500 {
            assert_eq!(scheme.classify(coupons), scheme.classify(coupons));
        }
    }

    #[test]
    fn cycles_start_at_the_threshold() {
        let scheme = BandScheme::canonical();
        assert_eq!(scheme.cycle(40), Cycle::NotApplicable);
        assert_eq!(scheme.cycle(41), Cycle::Number(1));
        assert_eq!(scheme.cycle(42), Cycle::Number(2));
        assert_eq!(scheme.cycle(82), Cycle::Number(2));
        assert_eq!(scheme.cycle(123), Cycle::Number(3));
    }

    #[test]
    fn last_coupon_of_a_cycle_is_top_level() {
        let scheme = BandScheme::canonical();
        assert_eq!(scheme.classify(41), Ok((Cycle::Number(1), 6)));
        assert_eq!(scheme.classify(82), Ok((Cycle::Number(2), 6)));
        assert_eq!(scheme.position(82), 41);
    }

    #[test]
    fn band_edges_match_canonical_widths() {
        let scheme = BandScheme::canonical();
        let expected = [
            (1, 0),
            (5, 0),
            (6, 1),
            (11, 1),
            (12, 2),
            (17, 2),
            (18, 3),
            (23, 3),
            (24, 4),
            (29, 4),
            (30, 5),
            (39, 5),
            (40, 6),
            (41, 6),
            (42, 0),
        ];
        for (coupons, level) in expected {
            assert_eq!(scheme.level(coupons), level, "coupons {coupons}");
        }
    }

    #[test]
    fn every_cycle_has_the_same_level_histogram() {
        let scheme = BandScheme::canonical();
        for cycle in 2..=5u64 {
            let mut histogram = [0usize; 7];
            let start = (cycle - 1) * 41 + 1;
            for coupons in start..start + 41 {
                assert_eq!(scheme.cycle(coupons), Cycle::Number(cycle));
                histogram[scheme.level(coupons) as usize] += 1;
            }
            assert_eq!(histogram, [5, 6, 6, 6, 6, 10, 2]);
        }
    }

    #[test]
    fn levels_stay_in_range() {
        let scheme = BandScheme::canonical();
        assert!((0..2000).all(|c| scheme.level(c) <= scheme.max_level()));
    }

    #[test]
    fn zero_is_not_applicable_top_level() {
        let scheme = BandScheme::canonical();
        assert_eq!(scheme.classify(0), Ok((Cycle::NotApplicable, 6)));
    }

    #[test]
    fn zero_can_be_rejected() {
        let scheme = BandScheme::new(41, 41, vec![5, 11, 17, 23, 29, 39], true).unwrap();
        assert_eq!(scheme.classify(0), Err(ValueError::Zero));
        assert_eq!(scheme.classify(1), Ok((Cycle::NotApplicable, 0)));
    }

    #[test]
    fn negative_counts_are_errors() {
        let scheme = BandScheme::canonical();
        assert_eq!(scheme.classify(-3), Err(ValueError::Negative(-3)));
    }

    #[test]
    fn forty_preset_wraps_at_forty() {
        let scheme = BandScheme::forty();
        assert_eq!(scheme.classify(39), Ok((Cycle::NotApplicable, 5)));
        assert_eq!(scheme.classify(40), Ok((Cycle::Number(1), 6)));
        assert_eq!(scheme.classify(41), Ok((Cycle::Number(2), 0)));
    }

    #[test]
    fn rejects_malformed_schemes() {
        assert_eq!(BandScheme::new(0, 0, vec![], false), Err(SchemeError::EmptyCycle));
        assert_eq!(
            BandScheme::new(41, 41, vec![5, 5, 17], false),
            Err(SchemeError::BoundsNotAscending { index: 1, bound: 5 })
        );
        assert_eq!(
            BandScheme::new(10, 10, vec![5, 10], false),
            Err(SchemeError::BoundOutOfRange {
                bound: 10,
                cycle_length: 10
            })
        );
        assert_eq!(
            BandScheme::preset("weekly"),
            Err(SchemeError::UnknownPreset("weekly".to_string()))
        );
    }

    #[test]
    fn scheme_json_is_validated_on_load() {
        let json = r#"{"cycle_length": 10, "na_threshold": 10, "band_upper_bounds": [3, 7]}"#;
        let scheme: BandScheme = serde_json::from_str(json).unwrap();
        assert_eq!(scheme.max_level(), 2);
        assert_eq!(scheme.classify(10), Ok((Cycle::Number(1), 2)));

        let bad = r#"{"cycle_length": 10, "na_threshold": 10, "band_upper_bounds": [7, 3]}"#;
        assert!(serde_json::from_str::<BandScheme>(bad).is_err());
    }

    #[test]
    fn presets_resolve_by_name() {
        for name in PRESET_NAMES {
            assert!(BandScheme::preset(name).is_ok());
        }
    }
}
