//! Weight tiers for the scalar objective.
//!
//! The objective emulates a strict priority order with one weighted sum.
//! Every tier has a unit weight; each unit must exceed the worst-case total
//! of all lower tiers on the instance at hand, otherwise a lower tier could
//! buy back a step of a higher one.
//!
//! | Tier | Terms (share of the tier unit) | Nominal unit |
//! |------|--------------------------------|--------------|
//! | Coverage | unfilled slot | 1,000,000 |
//! | RestCap | employee over the rest-gap cap | 100,000 |
//! | Fairness | total-load gap (4), missing weekday morning (3) | 25,000 |
//! | Balance | per-type gap (4), rest-gap occurrence (3), variety gap (2) | 5,000 |
//! | MinimumLoad | employee under the minimum | seeded draw |
//! | TieBreak | per-assignment seeded draw | 1 |
//!
//! Units start at the nominal value and are multiplied by the smallest
//! integer that clears the lower tiers' worst case.

use crate::model::Tier;
use crate::ModelError;
use tracing::debug;

pub const COVERAGE_UNIT: i64 = 1_000_000;
pub const REST_CAP_UNIT: i64 = 100_000;
pub const FAIRNESS_UNIT: i64 = 25_000;
pub const BALANCE_UNIT: i64 = 5_000;

pub const TOTAL_FAIRNESS_SHARE: i64 = 4;
pub const MISSING_MORNING_SHARE: i64 = 3;
pub const TYPE_FAIRNESS_SHARE: i64 = 4;
pub const REST_GAP_SHARE: i64 = 3;
pub const VARIETY_SHARE: i64 = 2;

/// Worst-case score of each tier, in units of that tier
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierSizes {
    pub coverage: i64,
    pub rest_cap: i64,
    pub fairness: i64,
    pub balance: i64,
    pub minimum_load: i64,
    /// Absolute, the tie-break unit is 1
    pub tie_break: i64,
}

impl TierSizes {
    fn get(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Coverage => self.coverage,
            Tier::RestCap => self.rest_cap,
            Tier::Fairness => self.fairness,
            Tier::Balance => self.balance,
            Tier::MinimumLoad => self.minimum_load,
            Tier::TieBreak => self.tie_break,
        }
    }
}

/// Unit weight of every tier for one instance
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightPlan {
    units: [i64; 6],
    sizes: TierSizes,
    /// Tie-break weight per decision, indexed by decision
    pub tie_break: Vec<i64>,
}

impl WeightPlan {
    /// Scale every unit above the worst case of the tiers below it
    pub fn plan(
        sizes: TierSizes,
        minimum_load_unit: i64,
        tie_break: Vec<i64>,
    ) -> Result<Self, ModelError> {
        let nominal = |tier: Tier| match tier {
            Tier::Coverage => COVERAGE_UNIT,
            Tier::RestCap => REST_CAP_UNIT,
            Tier::Fairness => FAIRNESS_UNIT,
            Tier::Balance => BALANCE_UNIT,
            Tier::MinimumLoad => minimum_load_unit,
            Tier::TieBreak => 1,
        };

        let mut units = [0; 6];
        let mut lower = 0i64;
        for (position, &tier) in Tier::ALL.iter().enumerate().rev() {
            let base = nominal(tier);
            if base <= 0 {
                return Err(ModelError::WeightMargin { tier, unit: base, lower });
            }
            let unit = if tier == Tier::TieBreak {
                1
            } else {
                (lower / base + 1).checked_mul(base).ok_or(ModelError::WeightOverflow(tier))?
            };
            units[position] = unit;
            lower = unit
                .checked_mul(sizes.get(tier))
                .and_then(|w| w.checked_add(lower))
                .ok_or(ModelError::WeightOverflow(tier))?;
        }

        let plan = Self {
            units,
            sizes,
            tie_break,
        };
        plan.verify()?;
        debug!(?units, worst_case = lower, "weight plan");
        Ok(plan)
    }

    /// Check that every tier unit exceeds the worst case of all lower tiers
    pub fn verify(&self) -> Result<(), ModelError> {
        let mut lower = 0i64;
        for &tier in Tier::ALL.iter().rev() {
            let unit = self.unit(tier);
            if tier != Tier::TieBreak && unit <= lower {
                return Err(ModelError::WeightMargin { tier, unit, lower });
            }
            lower = lower
                .checked_add(self.worst_case(tier)?)
                .ok_or(ModelError::WeightOverflow(tier))?;
        }
        if let Some(&draw) = self.tie_break.iter().find(|&&w| w < 0) {
            return Err(ModelError::WeightMargin {
                tier: Tier::TieBreak,
                unit: draw,
                lower: 0,
            });
        }
        Ok(())
    }

    pub fn unit(&self, tier: Tier) -> i64 {
        self.units[tier as usize]
    }

    /// Largest weighted contribution the tier can make on this instance
    pub fn worst_case(&self, tier: Tier) -> Result<i64, ModelError> {
        self.unit(tier)
            .checked_mul(self.sizes.get(tier))
            .ok_or(ModelError::WeightOverflow(tier))
    }

    pub fn coverage(&self) -> i64 {
        self.unit(Tier::Coverage)
    }

    pub fn rest_cap(&self) -> i64 {
        self.unit(Tier::RestCap)
    }

    pub fn total_fairness(&self) -> i64 {
        self.unit(Tier::Fairness) * TOTAL_FAIRNESS_SHARE
    }

    pub fn missing_morning(&self) -> i64 {
        self.unit(Tier::Fairness) * MISSING_MORNING_SHARE
    }

    pub fn type_fairness(&self) -> i64 {
        self.unit(Tier::Balance) * TYPE_FAIRNESS_SHARE
    }

    pub fn rest_gap(&self) -> i64 {
        self.unit(Tier::Balance) * REST_GAP_SHARE
    }

    pub fn variety(&self) -> i64 {
        self.unit(Tier::Balance) * VARIETY_SHARE
    }

    pub fn minimum_load(&self) -> i64 {
        self.unit(Tier::MinimumLoad)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> TierSizes {
        TierSizes {
            coverage: 16,
            rest_cap: 3,
            fairness: 4 * 6 + 3 * 3,
            balance: 4 * 16 + 3 * 3 * 9 + 2 * 3 * 5,
            minimum_load: 3,
            tie_break: 16 * 3000,
        }
    }

    #[test]
    fn units_clear_lower_tiers() {
        let plan = WeightPlan::plan(sizes(), 100, vec![1500; 48]).unwrap();
        let mut lower = 0;
        for &tier in Tier::ALL.iter().rev() {
            if tier != Tier::TieBreak {
                assert!(plan.unit(tier) > lower, "{tier} unit {} vs {lower}", plan.unit(tier));
            }
            lower += plan.worst_case(tier).unwrap();
        }
    }

    #[test]
    fn units_are_multiples_of_nominal() {
        let plan = WeightPlan::plan(sizes(), 97, Vec::new()).unwrap();
        assert_eq!(plan.unit(Tier::TieBreak), 1);
        assert_eq!(plan.minimum_load() % 97, 0);
        assert_eq!(plan.unit(Tier::Balance) % BALANCE_UNIT, 0);
        assert_eq!(plan.unit(Tier::Fairness) % FAIRNESS_UNIT, 0);
        assert_eq!(plan.rest_cap() % REST_CAP_UNIT, 0);
        assert_eq!(plan.coverage() % COVERAGE_UNIT, 0);
        assert_eq!(plan.total_fairness(), plan.unit(Tier::Fairness) * 4);
        assert_eq!(plan.variety(), plan.unit(Tier::Balance) * 2);
    }

    #[test]
    fn nominal_units_kept_when_they_already_clear() {
        let tiny = TierSizes {
            coverage: 1,
            rest_cap: 1,
            fairness: 1,
            balance: 1,
            minimum_load: 1,
            tie_break: 10,
        };
        let plan = WeightPlan::plan(tiny, 100, Vec::new()).unwrap();
        assert_eq!(plan.minimum_load(), 100);
        assert_eq!(plan.unit(Tier::Balance), BALANCE_UNIT);
        assert_eq!(plan.unit(Tier::Fairness), FAIRNESS_UNIT);
        assert_eq!(plan.rest_cap(), REST_CAP_UNIT);
        assert_eq!(plan.coverage(), COVERAGE_UNIT);
    }

    #[test]
    fn overflow_detected() {
        let huge = TierSizes {
            coverage: i64::MAX / 2,
            ..sizes()
        };
        assert!(matches!(
            WeightPlan::plan(huge, 100, Vec::new()),
            Err(ModelError::WeightOverflow(_))
        ));
    }

    #[test]
    fn tampered_plan_fails_verification() {
        let mut plan = WeightPlan::plan(sizes(), 100, Vec::new()).unwrap();
        plan.units[Tier::Fairness as usize] = 1;
        assert!(matches!(
            plan.verify(),
            Err(ModelError::WeightMargin { tier: Tier::Fairness, .. })
        ));
    }
}
