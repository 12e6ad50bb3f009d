//! Stopping rules for [TraversalEngine](crate::traversal::TraversalEngine).
use crate::annotated_graph::AnnotatedGraph;
use crate::kmer;
use crate::traversal::{StoppingRule, TraversalOutcome, TraversalState};

// Default length of a run of child-only k-mers to be considered as a success.
const GOAL_RUN: usize = 500;

/// Walk from a child k-mer until the walk reaches sequence shared with the goal colors.
#[derive(Debug, Clone)]
pub struct GoalCoverageStopper {
    child_color: usize,
    goal_colors: Vec<usize>,
    goal_run: usize,
    run: usize,
    failed: bool,
}

impl GoalCoverageStopper {
    pub const MAX_JUNCTIONS: usize = 2;
    pub fn new(child_color: usize, goal_colors: &[usize]) -> Self {
        Self {
            child_color,
            goal_colors: goal_colors.to_vec(),
            goal_run: GOAL_RUN,
            run: 0,
            failed: false,
        }
    }
    pub fn with_goal_run(mut self, goal_run: usize) -> Self {
        self.goal_run = goal_run;
        self
    }
    fn fail(&mut self) -> TraversalOutcome {
        self.failed = true;
        TraversalOutcome::Failed
    }
}

impl StoppingRule for GoalCoverageStopper {
    fn evaluate(&mut self, state: &TraversalState) -> TraversalOutcome {
        if kmer::is_low_complexity(state.kmer) {
            return self.fail();
        }
        let in_goal = self.goal_colors.iter().any(|&c| state.record.has_coverage(c));
        if in_goal && 0 < state.depth {
            return TraversalOutcome::Succeeded;
        }
        if state.record.has_coverage(self.child_color) && !in_goal {
            self.run += 1;
        } else {
            self.run = 0;
        }
        if self.goal_run <= self.run {
            TraversalOutcome::Succeeded
        } else if state.extensions == 0 {
            self.fail()
        } else {
            TraversalOutcome::Continue
        }
    }
    fn has_failed(&self) -> bool {
        self.failed
    }
    fn max_junctions(&self) -> usize {
        Self::MAX_JUNCTIONS
    }
}

/// Walk until the walk hits a vertex of the destination graph.
#[derive(Debug, Clone)]
pub struct DestinationReachedStopper<'a> {
    destination: &'a AnnotatedGraph,
    max_vertices: usize,
    max_junctions: usize,
    failed: bool,
}

impl<'a> DestinationReachedStopper<'a> {
    pub fn new(destination: &'a AnnotatedGraph, max_vertices: usize, max_junctions: usize) -> Self {
        Self {
            destination,
            max_vertices,
            max_junctions,
            failed: false,
        }
    }
}

impl<'a> StoppingRule for DestinationReachedStopper<'a> {
    fn evaluate(&mut self, state: &TraversalState) -> TraversalOutcome {
        if 0 < state.depth && self.destination.contains_kmer(state.kmer) {
            TraversalOutcome::Succeeded
        } else if self.max_vertices < state.visited || state.extensions == 0 {
            self.failed = true;
            TraversalOutcome::Failed
        } else {
            TraversalOutcome::Continue
        }
    }
    fn has_failed(&self) -> bool {
        self.failed
    }
    fn max_junctions(&self) -> usize {
        self.max_junctions
    }
}

/// One-step probe: does the k-mer appear in any of the reference colors?
#[derive(Debug, Clone)]
pub struct ContaminantStopper {
    reference_colors: Vec<usize>,
    failed: bool,
}

impl ContaminantStopper {
    pub fn new(reference_colors: &[usize]) -> Self {
        Self {
            reference_colors: reference_colors.to_vec(),
            failed: false,
        }
    }
}

impl StoppingRule for ContaminantStopper {
    fn evaluate(&mut self, state: &TraversalState) -> TraversalOutcome {
        let covered = self
            .reference_colors
            .iter()
            .any(|&c| state.record.has_coverage(c));
        if covered {
            TraversalOutcome::Succeeded
        } else {
            self.failed = true;
            TraversalOutcome::Failed
        }
    }
    fn has_failed(&self) -> bool {
        self.failed
    }
    fn max_junctions(&self) -> usize {
        0
    }
}

/// Explore at most `max_vertices` vertices, stopping at the first junction or dead end.
#[derive(Debug, Clone, Copy)]
pub struct ExplorationStopper {
    max_vertices: usize,
}

impl ExplorationStopper {
    pub fn new(max_vertices: usize) -> Self {
        Self { max_vertices }
    }
}

impl StoppingRule for ExplorationStopper {
    fn evaluate(&mut self, state: &TraversalState) -> TraversalOutcome {
        if self.max_vertices <= state.visited || state.extensions != 1 {
            TraversalOutcome::Succeeded
        } else {
            TraversalOutcome::Continue
        }
    }
    fn has_failed(&self) -> bool {
        false
    }
    fn max_junctions(&self) -> usize {
        0
    }
}
