//! Annotated multi-color subgraph.
//!
//! Vertices live in an arena: the i-th vertex has the sequence `seqs[i]`, the novelty `novel[i]`
//! and the role flags `flags[i]`. Edges are stored in a map from `(from, to)` to the set of colors
//! in which the edge exists.
use crate::kmer;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Set of colors. The i-th bit is set if the edge is present in the i-th color.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorSet(u64);

impl ColorSet {
    pub const MAX_COLORS: usize = 64;
    pub fn new() -> Self {
        Self(0)
    }
    pub fn from_colors(colors: &[usize]) -> Self {
        let mut set = Self::new();
        colors.iter().for_each(|&c| set.insert(c));
        set
    }
    pub fn insert(&mut self, color: usize) {
        assert!(color < Self::MAX_COLORS, "{} colors are not supported", color);
        self.0 |= 1 << color;
    }
    pub fn contains(&self, color: usize) -> bool {
        color < Self::MAX_COLORS && self.0 & (1 << color) != 0
    }
    pub fn contains_all(&self, colors: &[usize]) -> bool {
        colors.iter().all(|&c| self.contains(c))
    }
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0 | other.0)
    }
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::MAX_COLORS).filter(move |&c| self.contains(c))
    }
}

impl std::fmt::Display for ColorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let colors: Vec<_> = self.iter().map(|c| format!("{}", c)).collect();
        write!(f, "{{{}}}", colors.join(","))
    }
}

/// Roles of a vertex in a traversal. The vocabulary is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VertexFlags(u8);

impl VertexFlags {
    pub const PREDECESSOR: Self = Self(1);
    pub const SUCCESSOR: Self = Self(1 << 1);
    pub const START: Self = Self(1 << 2);
    pub const END: Self = Self(1 << 3);
    pub const BRANCH_REJECTED: Self = Self(1 << 4);
    const NAMES: [(Self, &'static str); 5] = [
        (Self::PREDECESSOR, "predecessor"),
        (Self::SUCCESSOR, "successor"),
        (Self::START, "start"),
        (Self::END, "end"),
        (Self::BRANCH_REJECTED, "branchRejected"),
    ];
    pub fn empty() -> Self {
        Self(0)
    }
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
    pub fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::fmt::Display for VertexFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let names: Vec<_> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "[{}]", names.join(","))
    }
}

/// A snapshot of a vertex. Two vertices are equal iff their sequences and novelty agree.
#[derive(Debug, Clone)]
pub struct AnnotatedVertex {
    pub seq: String,
    pub is_novel: bool,
    pub flags: VertexFlags,
}

impl std::cmp::PartialEq for AnnotatedVertex {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq && self.is_novel == other.is_novel
    }
}
impl std::cmp::Eq for AnnotatedVertex {}

impl std::hash::Hash for AnnotatedVertex {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
        self.is_novel.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotatedEdge {
    pub from: usize,
    pub to: usize,
    pub colors: ColorSet,
}

#[derive(Clone, Default)]
pub struct AnnotatedGraph {
    k: usize,
    seqs: Vec<String>,
    indexer: HashMap<String, usize>,
    novel: Vec<bool>,
    flags: Vec<VertexFlags>,
    edges: BTreeMap<(usize, usize), ColorSet>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl std::fmt::Display for AnnotatedGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let novel = self.novel.iter().filter(|&&b| b).count();
        writeln!(
            f,
            "K:{}\tNodes:{}\tNovel:{}\tEdges:{}",
            self.k,
            self.num_vertices(),
            novel,
            self.num_edges()
        )?;
        let degrees = {
            let mut degs: BTreeMap<(usize, usize), usize> = BTreeMap::new();
            for v in 0..self.num_vertices() {
                *degs.entry((self.in_degree(v), self.out_degree(v))).or_default() += 1;
            }
            degs.into_iter()
                .map(|((i, o), count)| format!("{}-{}:{}", i, o, count))
                .collect::<Vec<_>>()
        };
        write!(f, "[{}]", degrees.join(","))
    }
}

impl std::fmt::Debug for AnnotatedGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{}", self)?;
        for (idx, seq) in self.seqs.iter().enumerate() {
            writeln!(f, "{}\t{}\t{}\t{}", idx, seq, self.novel[idx], self.flags[idx])?;
        }
        let lines: Vec<_> = self
            .edges
            .iter()
            .map(|(&(from, to), colors)| format!("{}->{}\t{}", from, to, colors))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl AnnotatedGraph {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }
    pub fn k(&self) -> usize {
        self.k
    }
    pub fn num_vertices(&self) -> usize {
        self.seqs.len()
    }
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }
    /// Add a vertex, or return the id of the existing vertex with the same sequence.
    /// The sequence is kept as given; callers adding k-mers of both strands should
    /// go through [AnnotatedGraph::add_graph].
    /// Panics if the existing vertex disagrees on novelty.
    pub fn add_vertex(&mut self, seq: &str, is_novel: bool) -> usize {
        assert!(self.k <= seq.len(), "{} is shorter than k={}", seq, self.k);
        if let Some(&id) = self.indexer.get(seq) {
            assert_eq!(
                self.novel[id], is_novel,
                "Inconsistent novelty of {}. The colored graph or the novel k-mer set is corrupted.",
                seq
            );
            return id;
        }
        let id = self.seqs.len();
        self.seqs.push(seq.to_string());
        self.indexer.insert(seq.to_string(), id);
        self.novel.push(is_novel);
        self.flags.push(VertexFlags::empty());
        self.successors.push(vec![]);
        self.predecessors.push(vec![]);
        id
    }
    pub fn add_edge(&mut self, from: usize, to: usize, color: usize) {
        let mut colors = ColorSet::new();
        colors.insert(color);
        self.add_edge_colors(from, to, colors);
    }
    pub fn add_edge_colors(&mut self, from: usize, to: usize, colors: ColorSet) {
        assert!(from < self.num_vertices() && to < self.num_vertices());
        debug_assert!(
            {
                let (f, t) = (&self.seqs[from], &self.seqs[to]);
                self.k == 0 || f[f.len() + 1 - self.k..] == t[..self.k - 1]
            },
            "{} -> {} does not overlap",
            self.seqs[from],
            self.seqs[to]
        );
        match self.edges.get_mut(&(from, to)) {
            Some(current) => *current = current.union(&colors),
            None => {
                self.edges.insert((from, to), colors);
                self.successors[from].push(to);
                self.predecessors[to].push(from);
            }
        }
    }
    pub fn id_of(&self, seq: &str) -> Option<usize> {
        self.indexer.get(seq).copied()
    }
    /// The id of the vertex of the k-mer in either orientation, and whether
    /// the vertex holds the reverse complement of `kmer`.
    pub fn find_kmer(&self, kmer: &str) -> Option<(usize, bool)> {
        match self.indexer.get(kmer) {
            Some(&id) => Some((id, false)),
            None => self.indexer.get(&kmer::revcmp_str(kmer)).map(|&id| (id, true)),
        }
    }
    /// Return true if the k-mer is a vertex of this graph in either orientation.
    pub fn contains_kmer(&self, kmer: &str) -> bool {
        self.indexer.contains_key(kmer) || self.indexer.contains_key(&kmer::revcmp_str(kmer))
    }
    pub fn seq(&self, id: usize) -> &str {
        &self.seqs[id]
    }
    pub fn is_novel(&self, id: usize) -> bool {
        self.novel[id]
    }
    pub fn set_novel(&mut self, id: usize, is_novel: bool) {
        self.novel[id] = is_novel;
    }
    pub fn flags(&self, id: usize) -> VertexFlags {
        self.flags[id]
    }
    pub fn add_flag(&mut self, id: usize, flag: VertexFlags) {
        self.flags[id].insert(flag);
    }
    pub fn vertex(&self, id: usize) -> AnnotatedVertex {
        AnnotatedVertex {
            seq: self.seqs[id].clone(),
            is_novel: self.novel[id],
            flags: self.flags[id],
        }
    }
    pub fn vertices(&self) -> impl Iterator<Item = AnnotatedVertex> + '_ {
        (0..self.num_vertices()).map(move |id| self.vertex(id))
    }
    pub fn edges(&self) -> impl Iterator<Item = AnnotatedEdge> + '_ {
        self.edges
            .iter()
            .map(|(&(from, to), &colors)| AnnotatedEdge { from, to, colors })
    }
    pub fn edge_colors(&self, from: usize, to: usize) -> Option<ColorSet> {
        self.edges.get(&(from, to)).copied()
    }
    pub fn successors(&self, id: usize) -> &[usize] {
        &self.successors[id]
    }
    pub fn predecessors(&self, id: usize) -> &[usize] {
        &self.predecessors[id]
    }
    pub fn out_degree(&self, id: usize) -> usize {
        self.successors[id].len()
    }
    pub fn in_degree(&self, id: usize) -> usize {
        self.predecessors[id].len()
    }
    /// Union `other` into this graph. Vertices of the same k-mer, in either orientation, become one vertex,
    /// their flags are OR'd, and the colors of shared edges are merged.
    pub fn add_graph(&mut self, other: &AnnotatedGraph) {
        self.merge(other, |_, is_novel| is_novel);
    }
    /// Union `other` into this graph, re-deriving the novelty of every vertex,
    /// including the ones already in this graph, by `is_novel`.
    pub fn add_graph_with_novelty<F: Fn(&str) -> bool>(&mut self, other: &AnnotatedGraph, is_novel: F) {
        self.retag_novelty(&is_novel);
        self.merge(other, |seq, _| is_novel(seq));
    }
    pub fn retag_novelty<F: Fn(&str) -> bool>(&mut self, is_novel: F) {
        for (seq, novel) in self.seqs.iter().zip(self.novel.iter_mut()) {
            *novel = is_novel(seq);
        }
    }
    // A k-mer of `other` found in this graph on the opposite strand is mapped onto the
    // existing vertex. Edges between two such k-mers are reversed, and edges joining
    // the two strands are dropped.
    fn merge<F: Fn(&str, bool) -> bool>(&mut self, other: &AnnotatedGraph, novelty: F) {
        if self.k == 0 {
            self.k = other.k;
        }
        assert!(other.is_empty() || self.k == other.k, "{} vs {}", self.k, other.k);
        let flip = self.reversed_components(other);
        let ids: Vec<_> = (0..other.num_vertices())
            .map(|id| {
                let seq = other.seq(id);
                let is_novel = novelty(seq, other.is_novel(id));
                let (new_id, reversed) = match self.find_kmer(seq) {
                    Some((new_id, reversed)) => {
                        assert_eq!(
                            self.novel[new_id], is_novel,
                            "Inconsistent novelty of {}. The colored graph or the novel k-mer set is corrupted.",
                            seq
                        );
                        (new_id, reversed)
                    }
                    None if flip[id] => (self.add_vertex(&kmer::revcmp_str(seq), is_novel), true),
                    None => (self.add_vertex(seq, is_novel), false),
                };
                self.add_flag(new_id, other.flags(id));
                (new_id, reversed)
            })
            .collect();
        for edge in other.edges() {
            match (ids[edge.from], ids[edge.to]) {
                ((from, false), (to, false)) => self.add_edge_colors(from, to, edge.colors),
                ((from, true), (to, true)) => self.add_edge_colors(to, from, edge.colors),
                _ => trace!(
                    "MERGE\tAcrossStrands\t{}\t{}",
                    other.seq(edge.from),
                    other.seq(edge.to)
                ),
            }
        }
    }
    // For each vertex of `other`, true if its connected component is found mostly on
    // the opposite strand of this graph.
    fn reversed_components(&self, other: &AnnotatedGraph) -> Vec<bool> {
        let n = other.num_vertices();
        let mut arrived = vec![false; n];
        let mut flip = vec![false; n];
        for start in 0..n {
            if arrived[start] {
                continue;
            }
            arrived[start] = true;
            let (mut members, mut stack) = (vec![], vec![start]);
            while let Some(v) = stack.pop() {
                members.push(v);
                for &w in other.successors(v).iter().chain(other.predecessors(v)) {
                    if !arrived[w] {
                        arrived[w] = true;
                        stack.push(w);
                    }
                }
            }
            let (mut same, mut reversed) = (0, 0);
            for &v in members.iter() {
                match self.find_kmer(other.seq(v)) {
                    Some((_, false)) => same += 1,
                    Some((_, true)) => reversed += 1,
                    None => {}
                }
            }
            if same < reversed {
                members.iter().for_each(|&v| flip[v] = true);
            }
        }
        flip
    }
    /// Spell the sequence along a path of vertex ids.
    pub fn spell(&self, path: &[usize]) -> String {
        let seqs: Vec<_> = path.iter().map(|&id| self.seq(id)).collect();
        kmer::spell(&seqs, self.k)
    }
    /// The weight of an edge is the number of colors, among the first `num_colors`, in which it is absent.
    pub fn edge_weight(&self, from: usize, to: usize, num_colors: usize) -> Option<usize> {
        let colors = self.edge_colors(from, to)?;
        let present = (0..num_colors).filter(|&c| colors.contains(c)).count();
        Some(num_colors - present)
    }
    /// Minimum weight path from `from` to `to` by Dijkstra's algorithm.
    /// If `color` is given, only the edges present in that color are used.
    pub fn min_weight_path(
        &self,
        from: usize,
        to: usize,
        num_colors: usize,
        color: Option<usize>,
    ) -> Option<Vec<usize>> {
        use std::cmp::Reverse;
        let sentinel = self.num_vertices();
        let mut dist = vec![usize::MAX; self.num_vertices()];
        let mut parents = vec![sentinel; self.num_vertices()];
        let mut queue = BinaryHeap::new();
        dist[from] = 0;
        queue.push(Reverse((0, from)));
        while let Some(Reverse((d, node))) = queue.pop() {
            if node == to {
                break;
            }
            if dist[node] < d {
                continue;
            }
            for &next in self.successors(node) {
                let colors = self.edges[&(node, next)];
                if color.map(|c| !colors.contains(c)).unwrap_or(false) {
                    continue;
                }
                let weight = num_colors - (0..num_colors).filter(|&c| colors.contains(c)).count();
                let next_dist = d + weight;
                if next_dist < dist[next] {
                    dist[next] = next_dist;
                    parents[next] = node;
                    queue.push(Reverse((next_dist, next)));
                }
            }
        }
        if dist[to] == usize::MAX {
            return None;
        }
        let mut path = vec![to];
        let mut idx = to;
        while parents[idx] != sentinel {
            idx = parents[idx];
            path.push(idx);
        }
        path.reverse();
        Some(path)
    }
}
