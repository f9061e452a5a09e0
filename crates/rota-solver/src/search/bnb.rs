//! Depth-first branch and bound.
//!
//! Each node fixes the next free decision in the worker's branching order,
//! propagates, and explores the children with the smaller objective lower
//! bound first. A subtree is cut as soon as its bound reaches the shared
//! incumbent. Time and the shared stop flag are polled as the search runs.

use super::incumbent::SharedIncumbent;
use super::propagate::Propagator;
use crate::model::{ConstraintModel, DecisionId, Interval};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::trace;

/// Nodes between wall-clock checks
const CLOCK_INTERVAL: u64 = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Exit {
    /// The whole tree was explored or cut
    Exhausted,
    /// Time ran out or another worker finished
    Interrupted,
}

struct Interrupted;

pub(crate) struct Worker<'a> {
    model: &'a ConstraintModel,
    order: Vec<DecisionId>,
    incumbent: &'a SharedIncumbent,
    stop: &'a AtomicBool,
    deadline: Option<Instant>,
    propagator: Propagator<'a>,
    scratch: Vec<Interval>,
    pub(crate) nodes: u64,
    pub(crate) solutions: u64,
}

impl<'a> Worker<'a> {
    pub(crate) fn new(
        model: &'a ConstraintModel,
        order: Vec<DecisionId>,
        incumbent: &'a SharedIncumbent,
        stop: &'a AtomicBool,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            model,
            order,
            incumbent,
            stop,
            deadline,
            propagator: Propagator::new(model),
            scratch: Vec::with_capacity(model.aux().len()),
            nodes: 0,
            solutions: 0,
        }
    }

    pub(crate) fn run(&mut self) -> Exit {
        let mut root = vec![None; self.model.num_decisions()];
        if !self.propagator.propagate_all(&mut root) {
            return Exit::Exhausted;
        }
        match self.dive(root, 0) {
            Ok(()) => Exit::Exhausted,
            Err(Interrupted) => Exit::Interrupted,
        }
    }

    fn interrupted(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return true;
        }
        self.nodes % CLOCK_INTERVAL == 0 && self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn dive(&mut self, values: Vec<Option<bool>>, mut cursor: usize) -> Result<(), Interrupted> {
        self.nodes += 1;
        if self.interrupted() {
            return Err(Interrupted);
        }

        while cursor < self.order.len() && values[self.order[cursor].index()].is_some() {
            cursor += 1;
        }
        let Some(&var) = self.order.get(cursor) else {
            self.install(&values);
            return Ok(());
        };

        let mut children = Vec::with_capacity(2);
        for choice in [true, false] {
            let mut child = values.clone();
            child[var.index()] = Some(choice);
            if !self.propagator.propagate(&mut child, self.model.watchers(var).iter().copied()) {
                continue;
            }
            let bound = self.model.lower_bound(&child, &mut self.scratch);
            if bound < self.incumbent.upper_bound() {
                children.push((bound, child));
            }
        }
        children.sort_by_key(|(bound, _)| *bound);

        for (bound, child) in children {
            if bound < self.incumbent.upper_bound() {
                self.dive(child, cursor + 1)?;
            }
        }
        Ok(())
    }

    /// Offer a complete assignment to the incumbent
    fn install(&mut self, values: &[Option<bool>]) {
        // with every decision fixed the bound is the exact objective
        let objective = self.model.lower_bound(values, &mut self.scratch);
        let complete: Vec<bool> = values.iter().map(|v| v.unwrap_or(false)).collect();
        if self.incumbent.try_install(objective, &complete) {
            self.solutions += 1;
            trace!(objective, nodes = self.nodes, "improved incumbent");
        }
    }
}
