//! Solver-neutral constraint model.
//!
//! A model is a set of boolean decisions, hard linear range constraints over
//! them, auxiliary quantities defined functionally over decisions and
//! earlier auxiliaries, and a weighted sum of operands to minimize. It is
//! assembled with a [`ModelBuilder`] in one pass and is immutable afterwards.
//!
//! Any backend able to express "boolean variables + linear constraints +
//! reified conjunction/comparison + min/max equality + weighted
//! minimization" can consume it; the in-crate search reads it directly.

use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

/// Index of a boolean decision variable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DecisionId(usize);

impl DecisionId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Index of an auxiliary quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AuxId(usize);

impl AuxId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Anything that has an integer value once decisions are fixed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Decision(DecisionId),
    Aux(AuxId),
}

impl From<DecisionId> for Operand {
    fn from(id: DecisionId) -> Self {
        Operand::Decision(id)
    }
}

impl From<AuxId> for Operand {
    fn from(id: AuxId) -> Self {
        Operand::Aux(id)
    }
}

// ============================================================================
// Constraints and Definitions
// ============================================================================

/// `lower <= Σ coef·x <= upper`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearConstraint {
    /// Family the constraint belongs to, for diagnostics
    pub label: &'static str,
    pub terms: Vec<(DecisionId, i64)>,
    pub lower: i64,
    pub upper: i64,
}

impl LinearConstraint {
    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        let activity: i64 = self
            .terms
            .iter()
            .filter(|(id, _)| values[id.index()])
            .map(|(_, coef)| coef)
            .sum();
        (self.lower..=self.upper).contains(&activity)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Le,
    Ge,
}

/// How an auxiliary quantity is computed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Definition {
    /// Weighted sum
    Sum(Vec<(Operand, i64)>),
    /// 1 iff every operand is non-zero
    AllOf(Vec<Operand>),
    /// 1 iff `operand cmp rhs`
    Indicator { operand: Operand, cmp: Comparison, rhs: i64 },
    /// Largest operand, 0 when empty
    Max(Vec<Operand>),
    /// Smallest operand, 0 when empty
    Min(Vec<Operand>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuxVar {
    pub name: String,
    pub definition: Definition,
}

/// Priority tier of an objective term, highest priority first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    Coverage,
    RestCap,
    Fairness,
    Balance,
    MinimumLoad,
    TieBreak,
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::Coverage,
        Tier::RestCap,
        Tier::Fairness,
        Tier::Balance,
        Tier::MinimumLoad,
        Tier::TieBreak,
    ];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Coverage => "coverage",
            Tier::RestCap => "rest-cap",
            Tier::Fairness => "fairness",
            Tier::Balance => "balance",
            Tier::MinimumLoad => "minimum-load",
            Tier::TieBreak => "tie-break",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectiveTerm {
    pub operand: Operand,
    pub weight: i64,
    pub tier: Tier,
}

// ============================================================================
// Builder
// ============================================================================

/// One-pass assembly of a [`ConstraintModel`]
#[derive(Debug, Default)]
pub struct ModelBuilder {
    decisions: Vec<String>,
    groups: Vec<u32>,
    constraints: Vec<LinearConstraint>,
    aux: Vec<AuxVar>,
    objective: Vec<ObjectiveTerm>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a decision; `group` tags decisions that belong together (for
    /// the shift model, the slot) and is what search branches over
    pub fn decision(&mut self, name: impl Into<String>, group: u32) -> DecisionId {
        self.decisions.push(name.into());
        self.groups.push(group);
        DecisionId(self.decisions.len() - 1)
    }

    pub fn constrain(
        &mut self,
        label: &'static str,
        terms: Vec<(DecisionId, i64)>,
        lower: i64,
        upper: i64,
    ) {
        self.constraints.push(LinearConstraint {
            label,
            terms,
            lower,
            upper,
        });
    }

    /// Fix one decision to 0 or 1
    pub fn fix(&mut self, label: &'static str, id: DecisionId, value: bool) {
        let v = i64::from(value);
        self.constrain(label, vec![(id, 1)], v, v);
    }

    /// Define an auxiliary over decisions and previously defined auxiliaries
    pub fn define(&mut self, name: impl Into<String>, definition: Definition) -> AuxId {
        let next = self.aux.len();
        debug_assert!(
            operands(&definition).all(|op| match op {
                Operand::Decision(d) => d.0 < self.decisions.len(),
                Operand::Aux(a) => a.0 < next,
            }),
            "definition refers to an undefined operand"
        );
        self.aux.push(AuxVar {
            name: name.into(),
            definition,
        });
        AuxId(next)
    }

    pub fn minimize(&mut self, operand: impl Into<Operand>, weight: i64, tier: Tier) {
        if weight != 0 {
            self.objective.push(ObjectiveTerm {
                operand: operand.into(),
                weight,
                tier,
            });
        }
    }

    pub fn num_decisions(&self) -> usize {
        self.decisions.len()
    }

    pub fn build(self) -> ConstraintModel {
        let mut watchers = vec![Vec::new(); self.decisions.len()];
        for (index, constraint) in self.constraints.iter().enumerate() {
            for (id, _) in &constraint.terms {
                watchers[id.0].push(index);
            }
        }
        for list in &mut watchers {
            list.dedup();
        }
        ConstraintModel {
            decisions: self.decisions,
            groups: self.groups,
            constraints: self.constraints,
            aux: self.aux,
            objective: self.objective,
            watchers,
        }
    }
}

fn operands(definition: &Definition) -> Box<dyn Iterator<Item = Operand> + '_> {
    match definition {
        Definition::Sum(terms) => Box::new(terms.iter().map(|(op, _)| *op)),
        Definition::AllOf(ops) | Definition::Max(ops) | Definition::Min(ops) => {
            Box::new(ops.iter().copied())
        }
        Definition::Indicator { operand, .. } => Box::new(std::iter::once(*operand)),
    }
}

// ============================================================================
// Model
// ============================================================================

/// Closed interval `[lo, hi]` of possible values
pub type Interval = (i64, i64);

/// An immutable constraint model
#[derive(Debug)]
pub struct ConstraintModel {
    decisions: Vec<String>,
    groups: Vec<u32>,
    constraints: Vec<LinearConstraint>,
    aux: Vec<AuxVar>,
    objective: Vec<ObjectiveTerm>,
    /// decision → indices of constraints it appears in
    watchers: Vec<Vec<usize>>,
}

impl ConstraintModel {
    pub fn num_decisions(&self) -> usize {
        self.decisions.len()
    }

    pub fn decision_name(&self, id: DecisionId) -> &str {
        &self.decisions[id.0]
    }

    pub fn decision_group(&self, id: DecisionId) -> u32 {
        self.groups[id.0]
    }

    pub fn decision_ids(&self) -> impl Iterator<Item = DecisionId> {
        (0..self.decisions.len()).map(DecisionId)
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn aux(&self) -> &[AuxVar] {
        &self.aux
    }

    pub fn objective(&self) -> &[ObjectiveTerm] {
        &self.objective
    }

    /// Constraints mentioning a decision
    pub fn watchers(&self, id: DecisionId) -> &[usize] {
        &self.watchers[id.0]
    }

    /// Constraints a complete assignment breaks
    pub fn violations(&self, values: &[bool]) -> Vec<&LinearConstraint> {
        self.constraints.iter().filter(|c| !c.is_satisfied(values)).collect()
    }

    /// Exact value of every auxiliary and of the objective
    pub fn evaluate(&self, values: &[bool]) -> Evaluation {
        let partial: Vec<Option<bool>> = values.iter().map(|&v| Some(v)).collect();
        let mut intervals = Vec::with_capacity(self.aux.len());
        self.aux_intervals(&partial, &mut intervals);
        let aux: Vec<i64> = intervals.iter().map(|&(lo, _)| lo).collect();
        let objective = self
            .objective
            .iter()
            .map(|t| t.weight * operand_value(values, &aux, t.operand))
            .sum();
        Evaluation {
            values: values.to_vec(),
            aux,
            objective,
        }
    }

    /// Lower bound on the objective over every completion of `partial`.
    ///
    /// `scratch` is reused between calls to avoid reallocating.
    pub fn lower_bound(&self, partial: &[Option<bool>], scratch: &mut Vec<Interval>) -> i64 {
        self.aux_intervals(partial, scratch);
        self.objective
            .iter()
            .map(|t| {
                let (lo, hi) = operand_interval(partial, scratch, t.operand);
                if t.weight >= 0 {
                    t.weight * lo
                } else {
                    t.weight * hi
                }
            })
            .sum()
    }

    /// Interval of every auxiliary under a partial assignment, in definition order
    pub fn aux_intervals(&self, partial: &[Option<bool>], out: &mut Vec<Interval>) {
        out.clear();
        for var in &self.aux {
            let interval = match &var.definition {
                Definition::Sum(terms) => terms.iter().fold((0, 0), |(lo, hi), &(op, coef)| {
                    let (a, b) = operand_interval(partial, out, op);
                    if coef >= 0 {
                        (lo + coef * a, hi + coef * b)
                    } else {
                        (lo + coef * b, hi + coef * a)
                    }
                }),
                Definition::AllOf(ops) => ops.iter().fold((1, 1), |(lo, hi), &op| {
                    let (a, b) = operand_interval(partial, out, op);
                    let surely = a > 0 || b < 0;
                    let maybe = a != 0 || b != 0;
                    (lo.min(i64::from(surely)), hi.min(i64::from(maybe)))
                }),
                Definition::Indicator { operand, cmp, rhs } => {
                    let (lo, hi) = operand_interval(partial, out, *operand);
                    let (always, never) = match cmp {
                        Comparison::Eq => (lo == *rhs && hi == *rhs, *rhs < lo || *rhs > hi),
                        Comparison::Le => (hi <= *rhs, lo > *rhs),
                        Comparison::Ge => (lo >= *rhs, hi < *rhs),
                    };
                    match (always, never) {
                        (true, _) => (1, 1),
                        (_, true) => (0, 0),
                        _ => (0, 1),
                    }
                }
                Definition::Max(ops) => extremum(partial, out, ops, i64::max),
                Definition::Min(ops) => extremum(partial, out, ops, i64::min),
            };
            out.push(interval);
        }
    }
}

fn extremum(
    partial: &[Option<bool>],
    aux: &[Interval],
    ops: &[Operand],
    pick: fn(i64, i64) -> i64,
) -> Interval {
    let mut iter = ops.iter().map(|&op| operand_interval(partial, aux, op));
    match iter.next() {
        None => (0, 0),
        Some(first) => iter.fold(first, |(lo, hi), (a, b)| (pick(lo, a), pick(hi, b))),
    }
}

fn operand_interval(partial: &[Option<bool>], aux: &[Interval], op: Operand) -> Interval {
    match op {
        Operand::Decision(id) => match partial[id.0] {
            Some(true) => (1, 1),
            Some(false) => (0, 0),
            None => (0, 1),
        },
        Operand::Aux(id) => aux[id.0],
    }
}

fn operand_value(values: &[bool], aux: &[i64], op: Operand) -> i64 {
    match op {
        Operand::Decision(id) => i64::from(values[id.0]),
        Operand::Aux(id) => aux[id.0],
    }
}

/// Exact values at a complete assignment
#[derive(Clone, Debug)]
pub struct Evaluation {
    values: Vec<bool>,
    aux: Vec<i64>,
    objective: i64,
}

impl Evaluation {
    pub fn objective(&self) -> i64 {
        self.objective
    }

    pub fn value(&self, op: impl Into<Operand>) -> i64 {
        operand_value(&self.values, &self.aux, op.into())
    }

    /// Weighted contribution of one tier
    pub fn tier_total(&self, model: &ConstraintModel, tier: Tier) -> i64 {
        model
            .objective()
            .iter()
            .filter(|t| t.tier == tier)
            .map(|t| t.weight * self.value(t.operand))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// x0 + x1 + x2 == 1 with spread and conjunction auxiliaries
    fn small() -> (ConstraintModel, Vec<DecisionId>, Vec<AuxId>) {
        let mut b = ModelBuilder::new();
        let x: Vec<DecisionId> = (0..3).map(|i| b.decision(format!("x{i}"), 0)).collect();
        b.constrain("one", x.iter().map(|&d| (d, 1)).collect(), 1, 1);
        let sum = b.define("sum", Definition::Sum(vec![(x[0].into(), 2), (x[1].into(), 1)]));
        let both = b.define("both", Definition::AllOf(vec![x[0].into(), x[2].into()]));
        let low = b.define(
            "low",
            Definition::Indicator {
                operand: sum.into(),
                cmp: Comparison::Le,
                rhs: 0,
            },
        );
        let max = b.define("max", Definition::Max(vec![x[0].into(), x[1].into()]));
        let min = b.define("min", Definition::Min(vec![x[0].into(), x[1].into()]));
        b.minimize(sum, 10, Tier::Fairness);
        b.minimize(max, 3, Tier::Balance);
        b.minimize(min, -3, Tier::Balance);
        b.minimize(x[2], 1, Tier::TieBreak);
        (b.build(), x, vec![sum, both, low, max, min])
    }

    #[test]
    fn evaluate_exact() {
        let (model, _, aux) = small();
        let eval = model.evaluate(&[true, false, false]);
        assert_eq!(eval.value(aux[0]), 2);
        assert_eq!(eval.value(aux[1]), 0);
        assert_eq!(eval.value(aux[2]), 0);
        assert_eq!(eval.value(aux[3]), 1);
        assert_eq!(eval.value(aux[4]), 0);
        assert_eq!(eval.objective(), 20 + 3);
        assert_eq!(eval.tier_total(&model, Tier::Balance), 3);

        let eval = model.evaluate(&[false, false, true]);
        assert_eq!(eval.value(aux[2]), 1);
        assert_eq!(eval.objective(), 1);
    }

    #[test]
    fn conjunction_needs_every_operand() {
        let (model, _, aux) = small();
        assert_eq!(model.evaluate(&[true, false, true]).value(aux[1]), 1);
        assert_eq!(model.evaluate(&[true, true, false]).value(aux[1]), 0);
    }

    #[test]
    fn violations_listed() {
        let (model, _, _) = small();
        assert!(model.violations(&[true, false, false]).is_empty());
        assert_eq!(model.violations(&[true, true, false]).len(), 1);
        assert_eq!(model.violations(&[false, false, false])[0].label, "one");
    }

    #[test]
    fn lower_bound_brackets_completions() {
        let (model, _, _) = small();
        let mut scratch = Vec::new();
        let partial = [None, Some(false), None];
        let bound = model.lower_bound(&partial, &mut scratch);
        for completion in [[true, false, false], [false, false, true], [true, false, true]] {
            assert!(bound <= model.evaluate(&completion).objective());
        }
        let complete = [Some(false), Some(false), Some(true)];
        assert_eq!(
            model.lower_bound(&complete, &mut scratch),
            model.evaluate(&[false, false, true]).objective()
        );
    }

    #[test]
    fn watchers_index_constraints() {
        let (model, x, _) = small();
        assert_eq!(model.watchers(x[1]), &[0]);
        assert_eq!(model.num_decisions(), 3);
        assert_eq!(model.decision_name(x[2]), "x2");
    }

    #[test]
    fn empty_extremum_is_zero() {
        let mut b = ModelBuilder::new();
        let max = b.define("max", Definition::Max(Vec::new()));
        let model = b.build();
        assert_eq!(model.evaluate(&[]).value(max), 0);
    }
}
