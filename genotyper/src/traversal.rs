//! Bounded search on a colored de Bruijn graph.
//!
//! The engine walks from seed k-mers one base at a time. After every extension, it asks a
//! [StoppingRule] whether to go on, to stop with success, or to stop with failure.
//! The engine knows nothing about the meaning of success; it is all in the rule.
use crate::annotated_graph::{AnnotatedGraph, ColorSet, VertexFlags};
use crate::graph_source::{oriented_extensions, ColoredGraphAccess};
use definitions::KmerRecord;
use std::collections::BTreeMap;

// Hard cap on the number of vertices of a single walk.
const MAX_VERTICES: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Reverse,
    Both,
}

/// How the extensions of the requested colors are combined at each k-mer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombinationMode {
    /// Extensions valid in any of the colors.
    Or,
    /// Extensions valid in all of the colors.
    And,
}

impl std::default::Default for CombinationMode {
    fn default() -> Self {
        CombinationMode::Or
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraversalOutcome {
    Continue,
    Succeeded,
    Failed,
}

/// Everything a stopping rule can see at one step.
#[derive(Debug, Clone, Copy)]
pub struct TraversalState<'a> {
    /// The current k-mer, oriented along the walk.
    pub kmer: &'a str,
    pub record: &'a KmerRecord,
    /// The graph accumulated so far by this walk, including the current k-mer.
    pub graph: &'a AnnotatedGraph,
    /// Number of junctions crossed so far on this branch.
    pub junctions: usize,
    /// Number of vertices visited so far by this walk.
    pub visited: usize,
    /// Number of steps from the seed.
    pub depth: usize,
    /// Number of extensions of the current k-mer in the direction of the walk.
    pub extensions: usize,
    pub forward: bool,
}

pub trait StoppingRule: Clone {
    fn evaluate(&mut self, state: &TraversalState) -> TraversalOutcome;
    fn has_failed(&self) -> bool;
    /// The number of junctions a walk can cross before it fails.
    fn max_junctions(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Colors to traverse.
    colors: Vec<usize>,
    direction: Direction,
    mode: CombinationMode,
    /// Keep the partial graphs of failed walks.
    keep_failed: bool,
    max_vertices: usize,
    /// A vertex is novel if it has coverage in `child_color` and none in `comparison_colors`.
    child_color: usize,
    comparison_colors: Vec<usize>,
}

impl TraversalConfig {
    pub fn new(colors: &[usize], direction: Direction) -> Self {
        assert!(!colors.is_empty());
        Self {
            colors: colors.to_vec(),
            direction,
            mode: CombinationMode::Or,
            keep_failed: false,
            max_vertices: MAX_VERTICES,
            child_color: colors[0],
            comparison_colors: vec![],
        }
    }
    pub fn set_mode(&mut self, mode: CombinationMode) {
        self.mode = mode;
    }
    pub fn set_keep_failed(&mut self, keep_failed: bool) {
        self.keep_failed = keep_failed;
    }
    pub fn set_max_vertices(&mut self, max_vertices: usize) {
        self.max_vertices = max_vertices;
    }
    pub fn set_novelty(&mut self, child_color: usize, comparison_colors: &[usize]) {
        self.child_color = child_color;
        self.comparison_colors = comparison_colors.to_vec();
    }
    pub fn colors(&self) -> &[usize] {
        &self.colors
    }
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Where a walk (or one branch of it) stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub kmer: String,
    pub outcome: TraversalOutcome,
    pub junctions: usize,
    pub depth: usize,
}

/// The result of walking from one seed in one direction.
#[derive(Debug, Clone)]
pub struct TraversalReport {
    pub graph: AnnotatedGraph,
    pub terminals: Vec<Terminal>,
    /// `None` if the seed is absent from the graph.
    pub outcome: Option<TraversalOutcome>,
}

impl TraversalReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == Some(TraversalOutcome::Succeeded)
    }
}

// Mutable state shared by all the branches of one walk.
struct WalkContext {
    visited: usize,
    terminals: Vec<Terminal>,
}

pub struct TraversalEngine<'a> {
    sources: &'a dyn ColoredGraphAccess,
    config: TraversalConfig,
}

impl<'a> TraversalEngine<'a> {
    pub fn new(sources: &'a dyn ColoredGraphAccess, config: TraversalConfig) -> Self {
        Self { sources, config }
    }
    pub fn config(&self) -> &TraversalConfig {
        &self.config
    }
    /// Traverse from each seed. Each (seed, direction) pair gets a fresh copy of `rule`,
    /// while the two directions of a seed share one count of visited vertices.
    /// Return the union of the graphs of successful walks. Failed walks are included
    /// only if the config keeps them. If all the walks failed, return None.
    /// Seeds absent from the graph contribute nothing; if no seed is present,
    /// return an empty graph.
    pub fn traverse<R: StoppingRule>(&self, seeds: &[String], rule: &R) -> Option<AnnotatedGraph> {
        let mut graph = AnnotatedGraph::new(self.sources.kmer_size());
        let (mut found, mut succeeded) = (false, false);
        let directions: &[bool] = match self.config.direction {
            Direction::Forward => &[true],
            Direction::Reverse => &[false],
            Direction::Both => &[true, false],
        };
        for seed in seeds {
            let mut ctx = WalkContext {
                visited: 0,
                terminals: vec![],
            };
            for &forward in directions {
                let (outcome, walked) = self.walk_in(seed, forward, rule, &mut ctx);
                match outcome {
                    None => continue,
                    Some(TraversalOutcome::Succeeded) => {
                        found = true;
                        succeeded = true;
                        graph.add_graph(&walked);
                    }
                    Some(_) => {
                        found = true;
                        if self.config.keep_failed {
                            graph.add_graph(&walked);
                        }
                    }
                }
            }
        }
        trace!(
            "TRAVERSE\t{}\t{}\t{}\t{}",
            seeds.len(),
            found,
            succeeded,
            graph.num_vertices()
        );
        if !found || succeeded || self.config.keep_failed {
            Some(graph)
        } else {
            None
        }
    }
    /// Walk from a single seed in one direction.
    pub fn walk<R: StoppingRule>(&self, seed: &str, forward: bool, rule: &R) -> TraversalReport {
        let mut ctx = WalkContext {
            visited: 0,
            terminals: vec![],
        };
        let (outcome, graph) = self.walk_in(seed, forward, rule, &mut ctx);
        TraversalReport {
            graph,
            terminals: ctx.terminals,
            outcome,
        }
    }
    fn walk_in<R: StoppingRule>(
        &self,
        seed: &str,
        forward: bool,
        rule: &R,
        ctx: &mut WalkContext,
    ) -> (Option<TraversalOutcome>, AnnotatedGraph) {
        let graph = AnnotatedGraph::new(self.sources.kmer_size());
        if self.sources.lookup(seed).is_none() {
            return (None, graph);
        }
        let start = Step {
            kmer: seed.to_string(),
            prev: None,
            junctions: 0,
            depth: 0,
        };
        let (outcome, graph) = self.dfs(start, forward, rule.clone(), graph, ctx);
        (Some(outcome), graph)
    }
    /// Extensions of `kmer` in the direction of the walk, combined over the traversed colors,
    /// each with the colors in which it is valid.
    pub fn extensions(&self, record: &KmerRecord, kmer: &str, forward: bool) -> Vec<(String, ColorSet)> {
        let direction = if forward {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        let mut exts: BTreeMap<String, ColorSet> = BTreeMap::new();
        for &color in self.config.colors.iter() {
            for next in oriented_extensions(record, kmer, color, direction) {
                exts.entry(next).or_default().insert(color);
            }
        }
        match self.config.mode {
            CombinationMode::Or => exts.into_iter().collect(),
            CombinationMode::And => exts
                .into_iter()
                .filter(|(_, colors)| colors.contains_all(&self.config.colors))
                .collect(),
        }
    }
    fn is_novel(&self, record: &KmerRecord) -> bool {
        !self.config.comparison_colors.is_empty()
            && record.has_coverage(self.config.child_color)
            && self
                .config
                .comparison_colors
                .iter()
                .all(|&c| !record.has_coverage(c))
    }
    // Walk along a non-branching path from `step`, and recursively into each branch.
    // Return the outcome and the graph including the vertices of this branch.
    fn dfs<R: StoppingRule>(
        &self,
        mut step: Step,
        forward: bool,
        mut rule: R,
        mut graph: AnnotatedGraph,
        ctx: &mut WalkContext,
    ) -> (TraversalOutcome, AnnotatedGraph) {
        loop {
            let record = match self.sources.lookup(&step.kmer) {
                Some(record) => record,
                None => return self.stop(step, TraversalOutcome::Failed, graph, ctx),
            };
            if let Some((id, reversed)) = graph.find_kmer(&step.kmer) {
                // Cycle, or a turn onto the opposite strand. Close a cycle and stop.
                if !reversed {
                    Self::connect(&mut graph, step.prev.as_ref(), id, forward);
                }
                return self.stop(step, TraversalOutcome::Failed, graph, ctx);
            }
            if self.config.max_vertices <= ctx.visited {
                return self.stop(step, TraversalOutcome::Failed, graph, ctx);
            }
            let id = graph.add_vertex(&step.kmer, self.is_novel(&record));
            Self::connect(&mut graph, step.prev.as_ref(), id, forward);
            ctx.visited += 1;
            let mut exts = self.extensions(&record, &step.kmer, forward);
            let state = TraversalState {
                kmer: &step.kmer,
                record: &record,
                graph: &graph,
                junctions: step.junctions,
                visited: ctx.visited,
                depth: step.depth,
                extensions: exts.len(),
                forward,
            };
            match rule.evaluate(&state) {
                TraversalOutcome::Continue => {}
                outcome => return self.stop(step, outcome, graph, ctx),
            }
            match exts.len() {
                0 => return self.stop(step, TraversalOutcome::Failed, graph, ctx),
                1 => {
                    let (next, colors) = exts.swap_remove(0);
                    step = Step {
                        kmer: next,
                        prev: Some((id, colors)),
                        junctions: step.junctions,
                        depth: step.depth + 1,
                    };
                }
                _ if rule.max_junctions() <= step.junctions => {
                    graph.add_flag(id, VertexFlags::BRANCH_REJECTED);
                    return self.stop(step, TraversalOutcome::Failed, graph, ctx);
                }
                _ => {
                    let mut merged = graph.clone();
                    let mut succeeded = false;
                    for (next, colors) in exts {
                        let branch = Step {
                            kmer: next,
                            prev: Some((id, colors)),
                            junctions: step.junctions + 1,
                            depth: step.depth + 1,
                        };
                        let (outcome, branch_graph) =
                            self.dfs(branch, forward, rule.clone(), graph.clone(), ctx);
                        if outcome == TraversalOutcome::Succeeded {
                            succeeded = true;
                            merged.add_graph(&branch_graph);
                        } else if self.config.keep_failed {
                            merged.add_graph(&branch_graph);
                        } else {
                            merged.add_flag(id, VertexFlags::BRANCH_REJECTED);
                        }
                    }
                    let outcome = match succeeded {
                        true => TraversalOutcome::Succeeded,
                        false => TraversalOutcome::Failed,
                    };
                    return (outcome, merged);
                }
            }
        }
    }
    fn connect(graph: &mut AnnotatedGraph, prev: Option<&(usize, ColorSet)>, id: usize, forward: bool) {
        if let Some(&(prev, colors)) = prev {
            match forward {
                true => graph.add_edge_colors(prev, id, colors),
                false => graph.add_edge_colors(id, prev, colors),
            }
        }
    }
    fn stop(
        &self,
        step: Step,
        outcome: TraversalOutcome,
        graph: AnnotatedGraph,
        ctx: &mut WalkContext,
    ) -> (TraversalOutcome, AnnotatedGraph) {
        ctx.terminals.push(Terminal {
            kmer: step.kmer,
            outcome,
            junctions: step.junctions,
            depth: step.depth,
        });
        (outcome, graph)
    }
}

// The next k-mer to visit, with the vertex it was reached from.
struct Step {
    kmer: String,
    prev: Option<(usize, ColorSet)>,
    junctions: usize,
    depth: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_source::InMemoryGraph;
    use crate::stopping_rules::*;
    #[test]
    fn goal_coverage_scenario() {
        // Child is color 0, parent is color 1.
        let mut graph = InMemoryGraph::new(3, 2);
        graph.insert_sequence(0, "ATGC");
        graph.insert_sequence(1, "TGC");
        let mut config = TraversalConfig::new(&[0], Direction::Forward);
        config.set_novelty(0, &[1]);
        let engine = TraversalEngine::new(&graph, config);
        let rule = GoalCoverageStopper::new(0, &[1]);
        let report = engine.walk("ATG", true, &rule);
        assert!(report.succeeded());
        assert_eq!(report.terminals.len(), 1);
        let terminal = &report.terminals[0];
        assert_eq!(terminal.kmer, "TGC");
        assert_eq!(terminal.outcome, TraversalOutcome::Succeeded);
        assert_eq!(terminal.junctions, 0);
        assert_eq!(report.graph.num_vertices(), 2);
        let atg = report.graph.id_of("ATG").unwrap();
        assert!(report.graph.is_novel(atg));
        assert!(!report.graph.is_novel(report.graph.id_of("TGC").unwrap()));
    }
    #[test]
    fn absent_seed() {
        let mut graph = InMemoryGraph::new(3, 1);
        graph.insert_sequence(0, "ACGTT");
        let config = TraversalConfig::new(&[0], Direction::Both);
        let engine = TraversalEngine::new(&graph, config);
        let rule = ExplorationStopper::new(10);
        let result = engine.traverse(&["GGG".to_string()], &rule).unwrap();
        assert!(result.is_empty());
        let report = engine.walk("GGG", true, &rule);
        assert!(report.outcome.is_none());
    }
    #[test]
    fn both_directions_union() {
        let mut graph = InMemoryGraph::new(3, 1);
        graph.insert_sequence(0, "ATGGCAA");
        let config = TraversalConfig::new(&[0], Direction::Both);
        let engine = TraversalEngine::new(&graph, config);
        let rule = ExplorationStopper::new(100);
        let result = engine.traverse(&["GGC".to_string()], &rule).unwrap();
        assert_eq!(result.num_vertices(), 5);
        let path: Vec<_> = ["ATG", "TGG", "GGC", "GCA", "CAA"]
            .iter()
            .map(|k| result.id_of(k).unwrap())
            .collect();
        assert_eq!(result.spell(&path), "ATGGCAA");
        for w in path.windows(2) {
            assert!(result.edge_colors(w[0], w[1]).is_some());
        }
    }
    #[test]
    fn junction_budget() {
        // CTG branches into TGA and TGC.
        let mut graph = InMemoryGraph::new(3, 2);
        graph.insert_sequence(0, "ACTGAAC");
        graph.insert_sequence(0, "ACTGCCA");
        let config = TraversalConfig::new(&[0], Direction::Forward);
        let engine = TraversalEngine::new(&graph, config);
        let rule = ContaminantStopper::new(&[1]);
        // No coverage in color 1 at all: the probe fails at once.
        let report = engine.walk("ACT", true, &rule);
        assert_eq!(report.outcome, Some(TraversalOutcome::Failed));
        assert_eq!(report.graph.num_vertices(), 1);
        // The destination is reachable only through the junction.
        let mut destination = AnnotatedGraph::new(3);
        destination.add_vertex("CCA", false);
        let rule = DestinationReachedStopper::new(&destination, 100, 0);
        let report = engine.walk("ACT", true, &rule);
        assert_eq!(report.outcome, Some(TraversalOutcome::Failed));
        let ctg = report.graph.id_of("CTG").unwrap();
        assert!(report.graph.flags(ctg).contains(VertexFlags::BRANCH_REJECTED));
        let rule = DestinationReachedStopper::new(&destination, 100, 1);
        let report = engine.walk("ACT", true, &rule);
        assert!(report.succeeded());
        assert!(report.graph.contains_kmer("CCA"));
        assert!(report.graph.contains_kmer("TGC"));
        // The failed branch is dropped.
        assert!(!report.graph.contains_kmer("TGA"));
        let ctg = report.graph.id_of("CTG").unwrap();
        assert!(report.graph.flags(ctg).contains(VertexFlags::BRANCH_REJECTED));
        assert!(engine.traverse(&["ACT".to_string()], &rule).is_some());
        let rule = DestinationReachedStopper::new(&destination, 100, 0);
        assert!(engine.traverse(&["ACT".to_string()], &rule).is_none());
    }
    #[test]
    fn opposite_strand_stops_walk() {
        // CGT is the reverse complement of ACG.
        let mut graph = InMemoryGraph::new(3, 1);
        graph.insert_sequence(0, "AACGTT");
        let config = TraversalConfig::new(&[0], Direction::Forward);
        let engine = TraversalEngine::new(&graph, config);
        let report = engine.walk("AAC", true, &ExplorationStopper::new(100));
        assert!(report.graph.contains_kmer("ACG"));
        assert!(report.graph.id_of("CGT").is_none());
        assert!(report.graph.num_vertices() <= 3);
    }
    #[test]
    fn combination_mode() {
        let mut graph = InMemoryGraph::new(3, 2);
        graph.insert_sequence(0, "ACGTA");
        graph.insert_sequence(1, "ACGTC");
        graph.insert_sequence(0, "ACGTC");
        let mut config = TraversalConfig::new(&[0, 1], Direction::Forward);
        let engine = TraversalEngine::new(&graph, config.clone());
        let record = graph.lookup("CGT").unwrap();
        let exts = engine.extensions(&record, "CGT", true);
        assert_eq!(exts.len(), 2);
        config.set_mode(CombinationMode::And);
        let engine = TraversalEngine::new(&graph, config);
        let exts = engine.extensions(&record, "CGT", true);
        assert_eq!(exts.len(), 1);
        assert_eq!(exts[0].0, "GTC");
        assert_eq!(exts[0].1, ColorSet::from_colors(&[0, 1]));
    }
    #[test]
    fn exploration_is_bounded_on_cycles() {
        use rand::{Rng, SeedableRng};
        use rand_xoshiro::Xoshiro256Plus;
        let mut rng: Xoshiro256Plus = SeedableRng::seed_from_u64(4232);
        for bound in [1, 3, 10, 40] {
            for _ in 0..10 {
                let mut graph = InMemoryGraph::new(5, 1);
                let unit: Vec<u8> = (0..30).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
                let unit = String::from_utf8(unit).unwrap();
                // Tandem copies make a cycle, random reads make branches.
                graph.insert_sequence(0, &unit.repeat(3));
                for _ in 0..5 {
                    let read: Vec<u8> = (0..40).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
                    graph.insert_sequence(0, &String::from_utf8(read).unwrap());
                }
                let config = TraversalConfig::new(&[0], Direction::Forward);
                let engine = TraversalEngine::new(&graph, config);
                let rule = ExplorationStopper::new(bound);
                let report = engine.walk(&unit[..5], true, &rule);
                assert!(report.outcome.is_some());
                assert!(report.graph.num_vertices() <= bound, "{}", report.graph);
                let config = TraversalConfig::new(&[0], Direction::Both);
                let engine = TraversalEngine::new(&graph, config);
                let seed = unit[10..15].to_string();
                if let Some(found) = engine.traverse(&[seed], &rule) {
                    assert!(found.num_vertices() <= bound, "{}", found);
                }
            }
        }
    }
    #[test]
    fn traverse_shares_the_bound_between_directions() {
        let mut graph = InMemoryGraph::new(3, 1);
        graph.insert_sequence(0, "ATGGCAA");
        let config = TraversalConfig::new(&[0], Direction::Both);
        let engine = TraversalEngine::new(&graph, config);
        for bound in 1..=5 {
            let rule = ExplorationStopper::new(bound);
            let found = engine.traverse(&["GGC".to_string()], &rule).unwrap();
            assert!(found.num_vertices() <= bound, "{}\t{}", bound, found);
            assert!(found.contains_kmer("GGC"));
        }
        let found = engine.traverse(&["GGC".to_string()], &ExplorationStopper::new(3)).unwrap();
        assert_eq!(found.num_vertices(), 3);
    }
}
