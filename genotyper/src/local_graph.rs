//! Loading the multi-color subgraph around a stretch.
//!
//! First, the child graph is built from the stretch and short probes into its side branches.
//! An end of the stretch lying in novel sequence is extended until the child rejoins a parent.
//! Then, for every other color, walks from the stretch k-mers present in that color
//! collect the paths leading back into the child graph.
//! Finally, landmarks are put on the vertices where the child enters or leaves novel sequence.
use crate::annotated_graph::{AnnotatedGraph, VertexFlags};
use crate::graph_source::ColoredGraphAccess;
use crate::novel::NovelKmers;
use crate::stopping_rules::{DestinationReachedStopper, ExplorationStopper, GoalCoverageStopper};
use crate::stretch::Stretch;
use crate::traversal::{Direction, TraversalConfig, TraversalEngine};

#[derive(Debug, Clone)]
pub struct LocalGraphConfig {
    pub child_color: usize,
    /// Colors to load in addition to the child.
    pub colors: Vec<usize>,
    /// Size bound of the probes into the side branches of the stretch.
    pub exploration_length: usize,
    pub max_vertices: usize,
    pub max_junctions: usize,
}

impl LocalGraphConfig {
    pub fn new(child_color: usize, colors: &[usize]) -> Self {
        Self {
            child_color,
            colors: colors.to_vec(),
            ..Default::default()
        }
    }
}

impl std::default::Default for LocalGraphConfig {
    fn default() -> Self {
        Self {
            child_color: 0,
            colors: vec![],
            exploration_length: 50,
            max_vertices: 1_000,
            max_junctions: 3,
        }
    }
}

/// Load the annotated subgraph around the stretch. Returns an empty graph for an empty stretch.
pub fn load_local_subgraph(
    stretch: &Stretch,
    sources: &dyn ColoredGraphAccess,
    novel: &NovelKmers,
    config: &LocalGraphConfig,
) -> AnnotatedGraph {
    if stretch.is_empty() {
        return AnnotatedGraph::new(sources.kmer_size());
    }
    let child = child_graph(stretch, sources, novel, config);
    let mut graph = child.clone();
    let colors = config.colors.iter().filter(|&&c| c != config.child_color);
    for &color in colors {
        let seeds: Vec<String> = stretch
            .kmers
            .iter()
            .filter(|kmer| match sources.lookup(kmer) {
                Some(record) => record.has_coverage(color),
                None => false,
            })
            .cloned()
            .collect();
        let mut tconfig = TraversalConfig::new(&[color], Direction::Both);
        tconfig.set_max_vertices(config.max_vertices);
        let engine = TraversalEngine::new(sources, tconfig);
        let rule = DestinationReachedStopper::new(&child, config.max_vertices, config.max_junctions);
        match engine.traverse(&seeds, &rule) {
            Some(found) => graph.add_graph_with_novelty(&found, |seq| novel.contains(seq)),
            None => debug!("LOCAL\t{}\tFailed", color),
        }
        debug!("LOCAL\t{}\t{}\t{}", color, seeds.len(), graph.num_vertices());
    }
    mark_landmarks(&mut graph, stretch, config.child_color);
    graph
}

fn child_graph(
    stretch: &Stretch,
    sources: &dyn ColoredGraphAccess,
    novel: &NovelKmers,
    config: &LocalGraphConfig,
) -> AnnotatedGraph {
    let color = config.child_color;
    let mut graph = AnnotatedGraph::new(sources.kmer_size());
    let ids: Vec<_> = stretch
        .kmers
        .iter()
        .zip(stretch.novel.iter())
        .map(|(kmer, &is_novel)| graph.add_vertex(kmer, is_novel))
        .collect();
    for w in ids.windows(2) {
        graph.add_edge(w[0], w[1], color);
    }
    let mut tconfig = TraversalConfig::new(&[color], Direction::Both);
    tconfig.set_max_vertices(config.max_vertices);
    let engine = TraversalEngine::new(sources, tconfig);
    let rule = ExplorationStopper::new(config.exploration_length);
    for (i, kmer) in stretch.kmers.iter().enumerate() {
        for (forward, direction) in [(true, Direction::Forward), (false, Direction::Reverse)] {
            let on_stretch = match forward {
                true => stretch.kmers.get(i + 1),
                false => i.checked_sub(1).and_then(|j| stretch.kmers.get(j)),
            };
            for ext in sources.valid_extensions(kmer, color, direction) {
                if Some(&ext) == on_stretch {
                    continue;
                }
                // Partial graphs are kept whatever the outcome.
                let report = engine.walk(&ext, forward, &rule);
                graph.add_graph_with_novelty(&report.graph, |seq| novel.contains(seq));
                if let (Some(from), Some(to)) = (graph.id_of(kmer), graph.id_of(&ext)) {
                    match forward {
                        true => graph.add_edge(from, to, color),
                        false => graph.add_edge(to, from, color),
                    }
                }
            }
        }
    }
    let goal_colors: Vec<_> = config.colors.iter().copied().filter(|&c| c != color).collect();
    if !goal_colors.is_empty() {
        extend_to_goal(&mut graph, stretch, sources, novel, config, &goal_colors);
    }
    trace!("CHILD\t{}\t{}", stretch.len(), graph.num_vertices());
    graph
}

// Walk in the child color from each novel end of the stretch until the walk reaches
// sequence covered by any of the goal colors.
fn extend_to_goal(
    graph: &mut AnnotatedGraph,
    stretch: &Stretch,
    sources: &dyn ColoredGraphAccess,
    novel: &NovelKmers,
    config: &LocalGraphConfig,
    goal_colors: &[usize],
) {
    let color = config.child_color;
    let mut tconfig = TraversalConfig::new(&[color], Direction::Both);
    tconfig.set_max_vertices(config.max_vertices);
    tconfig.set_novelty(color, goal_colors);
    let engine = TraversalEngine::new(sources, tconfig);
    let rule = GoalCoverageStopper::new(color, goal_colors);
    for (idx, forward) in [(0, false), (stretch.len() - 1, true)] {
        if !stretch.novel[idx] {
            continue;
        }
        let report = engine.walk(&stretch.kmers[idx], forward, &rule);
        debug!("GOAL\t{}\t{}\t{}", stretch.kmers[idx], forward, report.succeeded());
        if report.succeeded() {
            graph.add_graph_with_novelty(&report.graph, |seq| novel.contains(seq));
        }
    }
}

// A predecessor is a non-novel vertex with a child edge into novel sequence, and a successor
// is a non-novel vertex with a child edge from novel sequence.
fn mark_landmarks(graph: &mut AnnotatedGraph, stretch: &Stretch, child: usize) {
    let edges: Vec<_> = graph
        .edges()
        .filter(|edge| edge.colors.contains(child))
        .collect();
    for edge in edges {
        match (graph.is_novel(edge.from), graph.is_novel(edge.to)) {
            (false, true) => graph.add_flag(edge.from, VertexFlags::PREDECESSOR),
            (true, false) => graph.add_flag(edge.to, VertexFlags::SUCCESSOR),
            _ => {}
        }
    }
    if let Some(id) = stretch.kmers.first().and_then(|k| graph.id_of(k)) {
        graph.add_flag(id, VertexFlags::START);
    }
    if let Some(id) = stretch.kmers.last().and_then(|k| graph.id_of(k)) {
        graph.add_flag(id, VertexFlags::END);
    }
}

/// The first predecessor along the stretch and the last successor after it, falling back to
/// the start and the end of the stretch. The second landmark never precedes the first one.
pub fn outermost_landmarks(graph: &AnnotatedGraph, stretch: &Stretch) -> Option<(usize, usize)> {
    let ids: Vec<_> = stretch
        .kmers
        .iter()
        .filter_map(|kmer| graph.id_of(kmer))
        .collect();
    let has = |id: usize, flag: VertexFlags| graph.flags(id).contains(flag);
    let from = ids
        .iter()
        .position(|&id| has(id, VertexFlags::PREDECESSOR))
        .or_else(|| ids.iter().position(|&id| has(id, VertexFlags::START)))?;
    let after = &ids[from..];
    let to = after
        .iter()
        .rposition(|&id| has(id, VertexFlags::SUCCESSOR))
        .or_else(|| after.iter().rposition(|&id| has(id, VertexFlags::END)))?;
    Some((ids[from], after[to]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph_source::InMemoryGraph;
    use crate::stretch::{assemble_stretch, StretchConfig};
    pub const CHILD: &str = "CTTGACGGTATCCATAGCAGTC";
    // A substitution at the 9-th base.
    pub const PARENT: &str = "CTTGACGGTCTCCATAGCAGTC";
    pub fn trio() -> (InMemoryGraph, NovelKmers, Stretch) {
        let mut graph = InMemoryGraph::new(5, 2);
        graph.insert_sequence(0, CHILD);
        graph.insert_sequence(1, PARENT);
        let novel = NovelKmers::new(crate::novel::find_novel_kmers(&graph, 0, &[1], 1));
        let config = StretchConfig::new(0, 3, 100);
        let stretch = assemble_stretch("TATCC", &graph, &novel, &config).unwrap();
        (graph, novel, stretch)
    }
    #[test]
    fn trio_bubble() {
        let (graph, novel, stretch) = trio();
        assert_eq!(novel.len(), 5);
        assert_eq!(stretch.seq(), &CHILD[2..17]);
        let config = LocalGraphConfig::new(0, &[1]);
        let local = load_local_subgraph(&stretch, &graph, &novel, &config);
        assert_eq!(local.num_vertices(), 23);
        let novel_count = (0..local.num_vertices()).filter(|&v| local.is_novel(v)).count();
        assert_eq!(novel_count, 5);
        let pred = local.id_of("ACGGT").unwrap();
        let succ = local.id_of("TCCAT").unwrap();
        assert!(local.flags(pred).contains(VertexFlags::PREDECESSOR));
        assert!(local.flags(succ).contains(VertexFlags::SUCCESSOR));
        assert!(local.flags(local.id_of("TGACG").unwrap()).contains(VertexFlags::START));
        assert!(local.flags(local.id_of("ATAGC").unwrap()).contains(VertexFlags::END));
        assert_eq!(outermost_landmarks(&local, &stretch), Some((pred, succ)));
        let path = local.min_weight_path(pred, succ, 2, Some(1)).unwrap();
        assert_eq!(local.spell(&path), &PARENT[4..15]);
        let path = local.min_weight_path(pred, succ, 2, Some(0)).unwrap();
        assert_eq!(local.spell(&path), &CHILD[4..15]);
    }
    #[test]
    fn stretch_ending_in_novel_sequence() {
        let (graph, novel, _) = trio();
        let config = StretchConfig::new(0, 3, 3);
        let stretch = assemble_stretch("TATCC", &graph, &novel, &config).unwrap();
        assert_eq!(stretch.seq(), &CHILD[6..13]);
        assert!(stretch.novel.iter().all(|&b| b));
        let mut config = LocalGraphConfig::new(0, &[1]);
        config.exploration_length = 1;
        let local = load_local_subgraph(&stretch, &graph, &novel, &config);
        // Both ends are extended back to the k-mers shared with the parent.
        let pred = local.id_of("ACGGT").unwrap();
        let succ = local.id_of("TCCAT").unwrap();
        assert!(local.flags(pred).contains(VertexFlags::PREDECESSOR));
        assert!(local.flags(succ).contains(VertexFlags::SUCCESSOR));
        let path = local.min_weight_path(pred, succ, 2, Some(0)).unwrap();
        assert_eq!(local.spell(&path), &CHILD[4..15]);
        // Without a parent to reach, only the side branches are kept.
        let config = LocalGraphConfig {
            exploration_length: 1,
            ..LocalGraphConfig::new(0, &[])
        };
        let local = load_local_subgraph(&stretch, &graph, &novel, &config);
        assert!(local.id_of("ACGGT").is_none());
        assert_eq!(local.num_vertices(), 5);
    }
    #[test]
    fn empty_stretch() {
        let (graph, novel, _) = trio();
        let stretch = Stretch {
            kmers: vec![],
            novel: vec![],
        };
        let config = LocalGraphConfig::new(0, &[1]);
        assert!(load_local_subgraph(&stretch, &graph, &novel, &config).is_empty());
    }
}
