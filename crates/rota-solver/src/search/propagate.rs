//! Bound propagation over linear range constraints.
//!
//! For `lower <= Σ a·x <= upper` with free variables, the reachable activity
//! is `[lo, hi]`. A free `x` is forced to 0 when setting it would push the
//! activity outside the range, and to 1 when leaving it unset would.

use crate::model::{ConstraintModel, DecisionId};

pub(crate) struct Propagator<'m> {
    model: &'m ConstraintModel,
    queue: Vec<usize>,
    queued: Vec<bool>,
}

impl<'m> Propagator<'m> {
    pub(crate) fn new(model: &'m ConstraintModel) -> Self {
        Self {
            model,
            queue: Vec::new(),
            queued: vec![false; model.constraints().len()],
        }
    }

    /// Propagate to a fixpoint starting from `seeds`; false on conflict
    pub(crate) fn propagate(
        &mut self,
        values: &mut [Option<bool>],
        seeds: impl IntoIterator<Item = usize>,
    ) -> bool {
        for c in seeds {
            self.push(c);
        }
        while let Some(c) = self.queue.pop() {
            self.queued[c] = false;
            if !self.revise(c, values) {
                for c in self.queue.drain(..) {
                    self.queued[c] = false;
                }
                return false;
            }
        }
        true
    }

    /// Propagate every constraint
    pub(crate) fn propagate_all(&mut self, values: &mut [Option<bool>]) -> bool {
        self.propagate(values, 0..self.model.constraints().len())
    }

    fn push(&mut self, c: usize) {
        if !self.queued[c] {
            self.queued[c] = true;
            self.queue.push(c);
        }
    }

    fn revise(&mut self, c: usize, values: &mut [Option<bool>]) -> bool {
        let model = self.model;
        let constraint = &model.constraints()[c];

        let (mut lo, mut hi) = (0i64, 0i64);
        for &(id, a) in &constraint.terms {
            match values[id.index()] {
                Some(true) => {
                    lo += a;
                    hi += a;
                }
                Some(false) => {}
                None if a > 0 => hi += a,
                None => lo += a,
            }
        }
        if lo > constraint.upper || hi < constraint.lower {
            return false;
        }

        let mut changed = false;
        for &(id, a) in &constraint.terms {
            if values[id.index()].is_some() || a == 0 {
                continue;
            }
            let forced = if a > 0 {
                if lo + a > constraint.upper {
                    Some(false)
                } else if hi - a < constraint.lower {
                    Some(true)
                } else {
                    None
                }
            } else if hi + a < constraint.lower {
                Some(false)
            } else if lo - a > constraint.upper {
                Some(true)
            } else {
                None
            };
            if let Some(value) = forced {
                values[id.index()] = Some(value);
                changed = true;
                self.wake(id);
            }
        }
        if changed {
            self.push(c);
        }
        true
    }

    fn wake(&mut self, id: DecisionId) {
        let model = self.model;
        for &w in model.watchers(id) {
            self.push(w);
        }
    }
}
