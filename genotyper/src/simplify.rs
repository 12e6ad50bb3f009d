//! Unitig compaction of an annotated graph.
use crate::annotated_graph::AnnotatedGraph;

/// Compact every maximal non-branching path into a single vertex.
/// Unless `combine_across_novelty` is true, a path is cut where the novelty changes.
/// The sequence of a compacted vertex is the spelling of the path, and its flags are
/// the union of the flags of the members. A compacted vertex is novel if any member is.
pub fn simplify(graph: &AnnotatedGraph, combine_across_novelty: bool) -> AnnotatedGraph {
    let chains = unitigs(graph, combine_across_novelty);
    let mut chain_of = vec![(0, 0); graph.num_vertices()];
    for (idx, chain) in chains.iter().enumerate() {
        for (pos, &v) in chain.iter().enumerate() {
            chain_of[v] = (idx, pos);
        }
    }
    let mut simplified = AnnotatedGraph::new(graph.k());
    let ids: Vec<_> = chains
        .iter()
        .map(|chain| {
            let seq = graph.spell(chain);
            let is_novel = chain.iter().any(|&v| graph.is_novel(v));
            let id = simplified.add_vertex(&seq, is_novel);
            for &v in chain.iter() {
                simplified.add_flag(id, graph.flags(v));
            }
            id
        })
        .collect();
    for edge in graph.edges() {
        let (from_chain, from_pos) = chain_of[edge.from];
        let (to_chain, to_pos) = chain_of[edge.to];
        if from_chain == to_chain && from_pos + 1 == to_pos {
            continue;
        }
        simplified.add_edge_colors(ids[from_chain], ids[to_chain], edge.colors);
    }
    trace!(
        "SIMPLIFY\t{}\t{}",
        graph.num_vertices(),
        simplified.num_vertices()
    );
    simplified
}

/// Maximal non-branching paths. Every vertex belongs to exactly one path.
pub fn unitigs(graph: &AnnotatedGraph, combine_across_novelty: bool) -> Vec<Vec<usize>> {
    let compatible =
        |from: usize, to: usize| combine_across_novelty || graph.is_novel(from) == graph.is_novel(to);
    let mut arrived = vec![false; graph.num_vertices()];
    let mut chains = vec![];
    for v in 0..graph.num_vertices() {
        if arrived[v] {
            continue;
        }
        let mut start = v;
        loop {
            if graph.in_degree(start) != 1 {
                break;
            }
            let prev = graph.predecessors(start)[0];
            if prev == v {
                // Pure cycle. Cut at v.
                start = v;
                break;
            }
            if graph.out_degree(prev) != 1 || arrived[prev] || !compatible(prev, start) {
                break;
            }
            start = prev;
        }
        let mut chain = vec![start];
        arrived[start] = true;
        let mut current = start;
        while graph.out_degree(current) == 1 {
            let next = graph.successors(current)[0];
            if next == start || arrived[next] || graph.in_degree(next) != 1 || !compatible(current, next) {
                break;
            }
            arrived[next] = true;
            chain.push(next);
            current = next;
        }
        chains.push(chain);
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotated_graph::tests::from_paths;
    use crate::annotated_graph::VertexFlags;
    use crate::kmer;
    use crate::local_graph::{load_local_subgraph, LocalGraphConfig};
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256Plus;
    use std::collections::HashSet;
    fn sequences(graph: &AnnotatedGraph) -> Vec<String> {
        let mut seqs: Vec<_> = graph.vertices().map(|v| v.seq).collect();
        seqs.sort();
        seqs
    }
    #[test]
    fn novelty_boundary() {
        let graph = from_paths(3, &[(0, "ATGGCAA")], &["GGC"]);
        let simplified = simplify(&graph, false);
        assert_eq!(sequences(&simplified), vec!["ATGG", "GCAA", "GGC"]);
        assert_eq!(simplified.num_edges(), 2);
        let simplified = simplify(&graph, true);
        assert_eq!(sequences(&simplified), vec!["ATGGCAA"]);
        assert!(simplified.is_novel(0));
    }
    #[test]
    fn pure_cycle() {
        let graph = from_paths(3, &[(0, "ACGTACG")], &[]);
        assert_eq!(graph.num_vertices(), 4);
        let simplified = simplify(&graph, false);
        assert_eq!(sequences(&simplified), vec!["ACGTAC"]);
        assert_eq!(simplified.num_edges(), 1);
        assert_eq!(simplified.successors(0), &[0]);
        let again = simplify(&simplified, false);
        assert_eq!(sequences(&again), vec!["ACGTAC"]);
    }
    #[test]
    fn trio_unitigs() {
        use crate::local_graph::tests::{trio, CHILD, PARENT};
        let (graph, novel, stretch) = trio();
        let config = LocalGraphConfig::new(0, &[1]);
        let local = load_local_subgraph(&stretch, &graph, &novel, &config);
        let simplified = simplify(&local, false);
        let mut expected = vec![&CHILD[0..9], &CHILD[5..14], &PARENT[5..14], &CHILD[10..22]];
        expected.sort();
        assert_eq!(sequences(&simplified), expected);
        assert_eq!(simplified.num_edges(), 4);
        let head = simplified.id_of(&CHILD[0..9]).unwrap();
        assert!(simplified.flags(head).contains(VertexFlags::START));
        assert!(simplified.flags(head).contains(VertexFlags::PREDECESSOR));
        assert!(simplified.is_novel(simplified.id_of(&CHILD[5..14]).unwrap()));
        assert_eq!(simplify(&local, true).num_vertices(), 4);
    }
    #[test]
    fn random_graphs() {
        let mut rng: Xoshiro256Plus = SeedableRng::seed_from_u64(24);
        for _ in 0..50 {
            let k = 4;
            let mut graph = AnnotatedGraph::new(k);
            let mut novel = HashSet::new();
            for _ in 0..rng.gen_range(1..5) {
                let len = rng.gen_range(k..40);
                let seq: Vec<u8> = (0..len).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
                let seq = String::from_utf8(seq).unwrap();
                let ids: Vec<_> = kmer::kmers(&seq, k)
                    .into_iter()
                    .map(|kmer| {
                        if graph.id_of(&kmer).is_none() && rng.gen_bool(0.3) {
                            novel.insert(kmer.clone());
                        }
                        let is_novel = novel.contains(&kmer);
                        graph.add_vertex(&kmer, is_novel)
                    })
                    .collect();
                for w in ids.windows(2) {
                    graph.add_edge(w[0], w[1], 0);
                }
            }
            for combine in [true, false] {
                let simplified = simplify(&graph, combine);
                // Every k-mer is in exactly one unitig.
                let total: usize = simplified.vertices().map(|v| v.seq.len() + 1 - k).sum();
                assert_eq!(total, graph.num_vertices());
                for v in graph.vertices() {
                    assert!(simplified.vertices().any(|u| u.seq.contains(&v.seq)));
                }
                let again = simplify(&simplified, combine);
                assert_eq!(sequences(&again), sequences(&simplified));
                assert_eq!(again.num_edges(), simplified.num_edges());
                // Any path spells the same sequence after compaction.
                let chains = unitigs(&graph, combine);
                let mut chain_of = vec![(0, 0); graph.num_vertices()];
                for (idx, chain) in chains.iter().enumerate() {
                    for (pos, &v) in chain.iter().enumerate() {
                        chain_of[v] = (idx, pos);
                    }
                }
                for _ in 0..20 {
                    let mut path = vec![rng.gen_range(0..graph.num_vertices())];
                    for _ in 0..rng.gen_range(0..30) {
                        let succs = graph.successors(*path.last().unwrap());
                        if succs.is_empty() {
                            break;
                        }
                        path.push(succs[rng.gen_range(0..succs.len())]);
                    }
                    let mut compacted_path: Vec<usize> = vec![];
                    for (i, &v) in path.iter().enumerate() {
                        let (chain, pos) = chain_of[v];
                        let inside = 0 < i && chain_of[path[i - 1]] == (chain, pos.wrapping_sub(1));
                        if !inside {
                            compacted_path.push(chain);
                        }
                    }
                    for w in compacted_path.windows(2) {
                        assert!(simplified.edge_colors(w[0], w[1]).is_some());
                    }
                    let compacted = simplified.spell(&compacted_path);
                    let head = chain_of[path[0]].1;
                    let (last_chain, last_pos) = chain_of[*path.last().unwrap()];
                    let tail = chains[last_chain].len() - 1 - last_pos;
                    assert_eq!(graph.spell(&path), &compacted[head..compacted.len() - tail]);
                }
            }
        }
    }
}
