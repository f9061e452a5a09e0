//! Soft measures and the weighted objective.
//!
//! Measures per employee: total load, per-type counts (the morning count
//! only covers days 0..=4), rest-gap ("8-8") occurrences, three-chain
//! occurrences, missing weekday morning, variety gap, under-minimum load.
//! Global measures: unfilled required slots, total-load spread and per-type
//! spreads. See [`crate::weights`] for how they are weighted.

use crate::constraints::{Coverage, ShiftModel};
use crate::model::{AuxId, Comparison, DecisionId, Definition, ModelBuilder, Operand, Tier};
use crate::weights::{
    TierSizes, WeightPlan, MISSING_MORNING_SHARE, REST_GAP_SHARE, TOTAL_FAIRNESS_SHARE,
    TYPE_FAIRNESS_SHARE, VARIETY_SHARE,
};
use crate::{ModelError, SchedulingPolicy};
use rand::rngs::StdRng;
use rand::Rng;
use rota_core::{ShiftType, FRIDAY};
use std::collections::BTreeSet;
use tracing::debug;

/// Largest and smallest of a group of counts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Spread {
    pub max: AuxId,
    pub min: AuxId,
}

/// Auxiliaries describing one employee's week
#[derive(Clone, Debug)]
pub struct EmployeeMeasures {
    pub total: AuxId,
    /// Indexed by [`ShiftType::index`]
    pub by_type: [AuxId; 3],
    /// Evening→morning and night→evening pairs
    pub rest_gaps: AuxId,
    /// Rest gaps above the policy cap
    pub rest_excess: AuxId,
    /// Night→evening→morning chains
    pub chains: AuxId,
    /// Absent when the employee could not work any weekday morning
    pub missing_morning: Option<AuxId>,
    pub variety: Spread,
    pub under_min: AuxId,
}

/// Everything the objective is built from, in one immutable record
#[derive(Clone, Debug)]
pub struct ObjectiveLayout {
    /// (slot index, unfilled indicator) per required slot
    pub unfilled: Vec<(usize, AuxId)>,
    pub employees: Vec<EmployeeMeasures>,
    pub total_spread: Spread,
    /// Indexed by [`ShiftType::index`]
    pub type_spreads: [Spread; 3],
    pub weights: WeightPlan,
}

/// Slot pairs forming a rest gap: (earlier slot, later slot)
fn rest_gap_pairs(shifts: &ShiftModel) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, slot) in shifts.slots.iter().enumerate() {
        let next = match slot.shift {
            ShiftType::Evening => shifts.follow(i, 1, ShiftType::Morning),
            ShiftType::Night => shifts.follow(i, 1, ShiftType::Evening),
            ShiftType::Morning => None,
        };
        if let Some(j) = next {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Night, evening, morning slot triples on consecutive days
fn chain_triples(shifts: &ShiftModel) -> Vec<[usize; 3]> {
    shifts
        .slots
        .iter()
        .enumerate()
        .filter(|(_, s)| s.shift == ShiftType::Night)
        .filter_map(|(i, _)| {
            let evening = shifts.follow(i, 1, ShiftType::Evening)?;
            let morning = shifts.follow(i, 2, ShiftType::Morning)?;
            Some([i, evening, morning])
        })
        .collect()
}

/// Slots counted toward a shift type's fairness
fn counts_toward(shifts: &ShiftModel, slot: usize, shift: ShiftType) -> bool {
    let s = shifts.slots[slot];
    s.shift == shift && !(shift == ShiftType::Morning && s.day >= FRIDAY)
}

fn sum_of(ids: impl IntoIterator<Item = DecisionId>) -> Definition {
    Definition::Sum(ids.into_iter().map(|d| (Operand::Decision(d), 1)).collect())
}

fn spread(builder: &mut ModelBuilder, name: &str, ops: Vec<Operand>) -> Spread {
    let max = builder.define(format!("{name}.max"), Definition::Max(ops.clone()));
    let min = builder.define(format!("{name}.min"), Definition::Min(ops));
    Spread { max, min }
}

/// Define every measure, plan the weights, and add the objective terms
pub fn compose(
    builder: &mut ModelBuilder,
    shifts: &ShiftModel,
    policy: &SchedulingPolicy,
    rng: &mut StdRng,
) -> Result<ObjectiveLayout, ModelError> {
    let n = shifts.num_employees();
    let pairs = rest_gap_pairs(shifts);
    let triples = chain_triples(shifts);

    let unfilled: Vec<(usize, AuxId)> = shifts
        .required_slots()
        .map(|i| {
            let slot = shifts.slots[i];
            let filled =
                builder.define(format!("filled[{slot}]"), sum_of(shifts.vars[i].iter().copied()));
            let indicator = builder.define(
                format!("unfilled[{slot}]"),
                Definition::Indicator {
                    operand: filled.into(),
                    cmp: Comparison::Eq,
                    rhs: 0,
                },
            );
            (i, indicator)
        })
        .collect();

    let mut employees = Vec::with_capacity(n);
    for (e, id) in shifts.employees.iter().enumerate() {
        let all = (0..shifts.slots.len()).map(|i| shifts.var(i, e));
        let total = builder.define(format!("total[{id}]"), sum_of(all));

        let by_type = ShiftType::ALL.map(|shift| {
            let of_type = (0..shifts.slots.len())
                .filter(|&i| counts_toward(shifts, i, shift))
                .map(|i| shifts.var(i, e));
            builder.define(format!("{shift}s[{id}]"), sum_of(of_type))
        });

        let gaps: Vec<(Operand, i64)> = pairs
            .iter()
            .map(|&(a, b)| {
                let both = builder.define(
                    format!("rest_gap[{id},{}]", shifts.slots[a]),
                    Definition::AllOf(vec![shifts.var(a, e).into(), shifts.var(b, e).into()]),
                );
                (both.into(), 1)
            })
            .collect();
        let rest_gaps = builder.define(format!("rest_gaps[{id}]"), Definition::Sum(gaps));
        let rest_excess = builder.define(
            format!("rest_excess[{id}]"),
            Definition::Indicator {
                operand: rest_gaps.into(),
                cmp: Comparison::Ge,
                rhs: i64::from(policy.rest_gap_cap) + 1,
            },
        );

        let chain_ops: Vec<(Operand, i64)> = triples
            .iter()
            .map(|triple| {
                let ops = triple.iter().map(|&i| shifts.var(i, e).into()).collect();
                let name = format!("chain[{id},{}]", shifts.slots[triple[0]]);
                let chain = builder.define(name, Definition::AllOf(ops));
                (chain.into(), 1)
            })
            .collect();
        let chains = builder.define(format!("chains[{id}]"), Definition::Sum(chain_ops));

        // raw availability: a morning pinned to someone else still counts
        let could_work_morning = (0..shifts.slots.len())
            .any(|i| counts_toward(shifts, i, ShiftType::Morning) && shifts.available[i][e]);
        let missing_morning = could_work_morning.then(|| {
            builder.define(
                format!("missing_morning[{id}]"),
                Definition::Indicator {
                    operand: by_type[ShiftType::Morning.index()].into(),
                    cmp: Comparison::Eq,
                    rhs: 0,
                },
            )
        });

        let variety = spread(
            builder,
            &format!("variety[{id}]"),
            by_type.iter().map(|&a| a.into()).collect(),
        );
        let under_min = builder.define(
            format!("under_min[{id}]"),
            Definition::Indicator {
                operand: total.into(),
                cmp: Comparison::Le,
                rhs: i64::from(policy.min_shifts) - 1,
            },
        );

        employees.push(EmployeeMeasures {
            total,
            by_type,
            rest_gaps,
            rest_excess,
            chains,
            missing_morning,
            variety,
            under_min,
        });
    }

    let total_spread = spread(builder, "total", employees.iter().map(|m| m.total.into()).collect());
    let type_spreads = ShiftType::ALL.map(|shift| {
        let ops = employees.iter().map(|m| m.by_type[shift.index()].into()).collect();
        spread(builder, &format!("{shift}s"), ops)
    });

    // draws: minimum-load unit first, then one per decision in decision order
    let minimum_load_unit = rng.gen_range(policy.min_load_weight_range.clone());
    let tie_break: Vec<i64> = (0..builder.num_decisions())
        .map(|_| rng.gen_range(policy.tie_break_range.clone()))
        .collect();

    let sizes = tier_sizes(shifts, &pairs, &tie_break);
    let weights = WeightPlan::plan(sizes, minimum_load_unit, tie_break)?;
    debug!(?sizes, minimum_load_unit, "objective sized");

    for &(_, indicator) in &unfilled {
        builder.minimize(indicator, weights.coverage(), Tier::Coverage);
    }
    builder.minimize(total_spread.max, weights.total_fairness(), Tier::Fairness);
    builder.minimize(total_spread.min, -weights.total_fairness(), Tier::Fairness);
    for spread in &type_spreads {
        builder.minimize(spread.max, weights.type_fairness(), Tier::Balance);
        builder.minimize(spread.min, -weights.type_fairness(), Tier::Balance);
    }
    for m in &employees {
        builder.minimize(m.rest_excess, weights.rest_cap(), Tier::RestCap);
        if let Some(missing) = m.missing_morning {
            builder.minimize(missing, weights.missing_morning(), Tier::Fairness);
        }
        builder.minimize(m.rest_gaps, weights.rest_gap(), Tier::Balance);
        builder.minimize(m.variety.max, weights.variety(), Tier::Balance);
        builder.minimize(m.variety.min, -weights.variety(), Tier::Balance);
        builder.minimize(m.under_min, weights.minimum_load(), Tier::MinimumLoad);
    }
    for row in &shifts.vars {
        for &d in row {
            builder.minimize(d, weights.tie_break[d.index()], Tier::TieBreak);
        }
    }

    Ok(ObjectiveLayout {
        unfilled,
        employees,
        total_spread,
        type_spreads,
        weights,
    })
}

/// Worst-case tier scores for this instance
fn tier_sizes(shifts: &ShiftModel, pairs: &[(usize, usize)], tie_break: &[i64]) -> TierSizes {
    let n = shifts.num_employees() as i64;
    let working_days = shifts.slots.iter().map(|s| s.day).collect::<BTreeSet<_>>().len() as i64;
    // one slot per day bounds every per-type count by the days carrying that type
    let type_days = ShiftType::ALL.map(|shift| {
        (0..shifts.slots.len())
            .filter(|&i| counts_toward(shifts, i, shift))
            .map(|i| shifts.slots[i].day)
            .collect::<BTreeSet<_>>()
            .len() as i64
    });
    let widest_type = type_days.iter().copied().max().unwrap_or(0);

    let tie_break = shifts
        .vars
        .iter()
        .map(|row| row.iter().map(|d| tie_break[d.index()]).max().unwrap_or(0))
        .sum();

    TierSizes {
        coverage: shifts.coverage.iter().filter(|c| **c == Coverage::Required).count() as i64,
        rest_cap: n,
        fairness: TOTAL_FAIRNESS_SHARE * working_days + MISSING_MORNING_SHARE * n,
        balance: TYPE_FAIRNESS_SHARE * type_days.iter().sum::<i64>()
            + REST_GAP_SHARE * n * pairs.len() as i64
            + VARIETY_SHARE * n * widest_type,
        minimum_load: n,
        tie_break,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::build_shift_model;
    use crate::model::ConstraintModel;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rota_core::availability::AvailabilityResolver;
    use rota_core::calendar::WeekCalendar;
    use rota_core::locks::LockTable;
    use rota_core::{AvailabilityRecord, Employee, LockValue, ScheduleRequest, Slot};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn compose_for(
        request: &ScheduleRequest,
        seed: u64,
    ) -> (ShiftModel, ObjectiveLayout, ConstraintModel) {
        let calendar = WeekCalendar::build(request.week_start, &request.holidays);
        let resolver = AvailabilityResolver::new(request, &calendar);
        let locks = LockTable::resolve(request, &calendar, &resolver);
        let mut builder = ModelBuilder::new();
        let shifts = build_shift_model(&mut builder, request, &calendar, &resolver, &locks);
        let mut rng = StdRng::seed_from_u64(seed);
        let policy = SchedulingPolicy::default();
        let layout = compose(&mut builder, &shifts, &policy, &mut rng).unwrap();
        (shifts, layout, builder.build())
    }

    fn three() -> ScheduleRequest {
        ScheduleRequest::new(
            date(2025, 1, 5),
            vec![
                Employee::new("e1", "Dana"),
                Employee::new("e2", "Noa"),
                Employee::new("e3", "Lior"),
            ],
        )
    }

    /// Assign every listed slot to one employee index, everything else false
    fn assignment(
        shifts: &ShiftModel,
        model: &ConstraintModel,
        picks: &[(Slot, usize)],
    ) -> Vec<bool> {
        let mut values = vec![false; model.num_decisions()];
        for &(slot, e) in picks {
            let i = shifts.slot_index(slot).unwrap();
            values[shifts.var(i, e).index()] = true;
        }
        values
    }

    #[test]
    fn rest_gaps_and_chains_counted() {
        let (shifts, layout, model) = compose_for(&three(), 1);
        let values = assignment(
            &shifts,
            &model,
            &[
                (Slot::new(0, ShiftType::Evening), 0),
                (Slot::new(1, ShiftType::Morning), 0),
                (Slot::new(2, ShiftType::Night), 0),
                (Slot::new(3, ShiftType::Evening), 0),
                (Slot::new(4, ShiftType::Morning), 0),
            ],
        );
        let eval = model.evaluate(&values);
        let m = &layout.employees[0];
        // E0→M1, N2→E3, E3→M4
        assert_eq!(eval.value(m.rest_gaps), 3);
        assert_eq!(eval.value(m.rest_excess), 1);
        assert_eq!(eval.value(m.chains), 1);
        assert_eq!(eval.value(m.total), 5);
        assert_eq!(eval.value(m.by_type[ShiftType::Morning.index()]), 2);
        assert_eq!(eval.value(m.variety.max) - eval.value(m.variety.min), 1);
        assert_eq!(eval.value(layout.employees[1].under_min), 1);
        assert_eq!(eval.value(layout.total_spread.max) - eval.value(layout.total_spread.min), 5);
    }

    #[test]
    fn friday_morning_excluded_from_morning_count() {
        let (shifts, layout, model) = compose_for(&three(), 1);
        let values = assignment(&shifts, &model, &[(Slot::new(5, ShiftType::Morning), 1)]);
        let eval = model.evaluate(&values);
        let m = &layout.employees[1];
        assert_eq!(eval.value(m.by_type[ShiftType::Morning.index()]), 0);
        assert_eq!(eval.value(m.total), 1);
        assert_eq!(eval.value(m.missing_morning.unwrap()), 1);
    }

    #[test]
    fn missing_morning_only_for_morning_availability() {
        let mut record = AvailabilityRecord::new("e3");
        for day in 0..5 {
            record = record.unavailable(Slot::new(day, ShiftType::Morning));
        }
        let (_, layout, _) = compose_for(&three().availability(record), 1);
        assert!(layout.employees[0].missing_morning.is_some());
        assert!(layout.employees[2].missing_morning.is_none());
    }

    #[test]
    fn missing_morning_ignores_locks() {
        // every weekday morning pinned to e1; e2 was available for them all
        let mut request = ScheduleRequest::new(
            date(2025, 1, 5),
            vec![Employee::new("e1", "Dana"), Employee::new("e2", "Noa")],
        );
        for day in 0..5 {
            let morning = Slot::new(day, ShiftType::Morning);
            request = request.lock(morning, LockValue::Employee("e1".into()));
        }
        let (shifts, layout, model) = compose_for(&request, 1);
        let missing = layout.employees[1].missing_morning.unwrap();
        let picks: Vec<(Slot, usize)> =
            (0..5).map(|day| (Slot::new(day, ShiftType::Morning), 0)).collect();
        let eval = model.evaluate(&assignment(&shifts, &model, &picks));
        assert_eq!(eval.value(missing), 1);
        assert_eq!(eval.value(layout.employees[0].missing_morning.unwrap()), 0);
    }

    #[test]
    fn unfilled_indicators_cover_required_slots() {
        let (shifts, layout, model) = compose_for(&three(), 1);
        assert_eq!(layout.unfilled.len(), 16);
        let values = assignment(&shifts, &model, &[(Slot::new(0, ShiftType::Morning), 2)]);
        let eval = model.evaluate(&values);
        let open: i64 = layout.unfilled.iter().map(|&(_, a)| eval.value(a)).sum();
        assert_eq!(open, 15);
        assert_eq!(eval.tier_total(&model, Tier::Coverage), 15 * layout.weights.coverage());
    }

    #[test]
    fn tie_break_draws_are_seeded() {
        let (_, a, _) = compose_for(&three(), 7);
        let (_, b, _) = compose_for(&three(), 7);
        let (_, c, _) = compose_for(&three(), 8);
        assert_eq!(a.weights, b.weights);
        assert_ne!(a.weights.tie_break, c.weights.tie_break);
        assert!(a.weights.tie_break.iter().all(|w| (1000..=3000).contains(w)));
        assert!(a.weights.minimum_load() >= 85);
    }

    #[test]
    fn every_tier_is_represented() {
        let (_, _, model) = compose_for(&three(), 3);
        for tier in Tier::ALL {
            assert!(model.objective().iter().any(|t| t.tier == tier), "no {tier} term");
        }
    }
}
