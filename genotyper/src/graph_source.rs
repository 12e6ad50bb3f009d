//! Access to colored de Bruijn graphs and to reference k-mer indices.
//!
//! The engine never reads a graph file by itself. Instead, it asks a [ColoredGraphAccess]
//! for the record of a k-mer. [InMemoryGraph] is a simple implementation backed by a hash map,
//! which can be deserialized from JSON.
use crate::kmer;
use crate::traversal::Direction;
use definitions::{GenomicInterval, KmerRecord, Strand};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub trait ColoredGraphAccess: Send + Sync {
    fn kmer_size(&self) -> usize;
    fn num_colors(&self) -> usize;
    /// Return the record of the k-mer. The k-mer can be in either orientation.
    fn lookup(&self, kmer: &str) -> Option<KmerRecord>;
    /// Return the k-mers reachable from `kmer` by one base in the given color,
    /// oriented the same way as `kmer`.
    fn valid_extensions(&self, kmer: &str, color: usize, direction: Direction) -> Vec<String> {
        match self.lookup(kmer) {
            Some(record) => oriented_extensions(&record, kmer, color, direction),
            None => vec![],
        }
    }
}

/// Bases extending `kmer` in the given color. If `forward` is true, these are the bases
/// appended to the end of `kmer`, otherwise, the bases prepended to its start.
pub fn extension_bases(record: &KmerRecord, kmer: &str, color: usize, forward: bool) -> Vec<u8> {
    let is_canonical = record.kmer == kmer;
    match (is_canonical, forward) {
        (true, true) => record.outgoing(color),
        (true, false) => record.incoming(color),
        (false, true) => record.incoming(color).iter().map(|&b| kmer::complement(b)).collect(),
        (false, false) => record.outgoing(color).iter().map(|&b| kmer::complement(b)).collect(),
    }
}

pub fn oriented_extensions(
    record: &KmerRecord,
    kmer: &str,
    color: usize,
    direction: Direction,
) -> Vec<String> {
    let forward = extension_bases(record, kmer, color, true)
        .into_iter()
        .map(|b| kmer::next_kmer(kmer, b));
    let reverse = extension_bases(record, kmer, color, false)
        .into_iter()
        .map(|b| kmer::prev_kmer(kmer, b));
    match direction {
        Direction::Forward => forward.collect(),
        Direction::Reverse => reverse.collect(),
        Direction::Both => forward.chain(reverse).collect(),
    }
}

/// A colored de Bruijn graph held in memory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InMemoryGraph {
    k: usize,
    num_colors: usize,
    records: HashMap<String, KmerRecord>,
}

impl InMemoryGraph {
    pub fn new(k: usize, num_colors: usize) -> Self {
        Self {
            k,
            num_colors,
            records: HashMap::new(),
        }
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub fn records(&self) -> impl Iterator<Item = &KmerRecord> {
        self.records.values()
    }
    /// Insert a record. The k-mer of the record should be canonical.
    pub fn insert_record(&mut self, record: KmerRecord) {
        assert_eq!(record.kmer.len(), self.k, "{}", record);
        assert!(kmer::is_canonical(&record.kmer), "{}", record);
        assert_eq!(record.num_colors(), self.num_colors, "{}", record);
        self.records.insert(record.kmer.clone(), record);
    }
    /// Thread a sequence into the graph as a path in the given color.
    /// Each k-mer gets one coverage, and each consecutive pair of k-mers gets linked.
    pub fn insert_sequence(&mut self, color: usize, seq: &str) {
        assert!(color < self.num_colors);
        let kmers = kmer::kmers(seq, self.k);
        for kmer in kmers.iter() {
            self.entry(kmer).coverages[color] += 1;
        }
        for w in kmers.windows(2) {
            let (from, to) = (&w[0], &w[1]);
            let last = to.as_bytes()[self.k - 1];
            let first = from.as_bytes()[0];
            self.link(from, last, color, true);
            self.link(to, first, color, false);
        }
    }
    fn entry(&mut self, kmer: &str) -> &mut KmerRecord {
        let canonical = kmer::canonical(kmer);
        let num_colors = self.num_colors;
        self.records
            .entry(canonical.clone())
            .or_insert_with(|| KmerRecord::new(canonical, num_colors))
    }
    // Register `base` as an extension of the oriented `kmer` in `color`.
    fn link(&mut self, kmer: &str, base: u8, color: usize, forward: bool) {
        let record = self.entry(kmer);
        let (base, outgoing) = match record.kmer == kmer {
            true => (base, forward),
            false => (kmer::complement(base), !forward),
        };
        if let Some(idx) = kmer::base_index(base) {
            let shift = if outgoing { idx } else { idx + 4 };
            record.edges[color] |= 1 << shift;
        }
    }
}

impl ColoredGraphAccess for InMemoryGraph {
    fn kmer_size(&self) -> usize {
        self.k
    }
    fn num_colors(&self) -> usize {
        self.num_colors
    }
    fn lookup(&self, kmer: &str) -> Option<KmerRecord> {
        if kmer.len() != self.k {
            return None;
        }
        self.records.get(&kmer::canonical(kmer)).cloned()
    }
}

/// The clean graph and, optionally, the unfiltered ("dirty") graph.
/// A k-mer missing in the clean graph is looked up in the dirty graph.
#[derive(Clone, Copy)]
pub struct GraphSources<'a> {
    clean: &'a dyn ColoredGraphAccess,
    dirty: Option<&'a dyn ColoredGraphAccess>,
}

impl<'a> GraphSources<'a> {
    pub fn new(clean: &'a dyn ColoredGraphAccess) -> Self {
        Self { clean, dirty: None }
    }
    pub fn with_dirty(clean: &'a dyn ColoredGraphAccess, dirty: &'a dyn ColoredGraphAccess) -> Self {
        assert_eq!(clean.kmer_size(), dirty.kmer_size());
        assert_eq!(clean.num_colors(), dirty.num_colors());
        Self {
            clean,
            dirty: Some(dirty),
        }
    }
    pub fn clean(&self) -> &'a dyn ColoredGraphAccess {
        self.clean
    }
}

impl<'a> ColoredGraphAccess for GraphSources<'a> {
    fn kmer_size(&self) -> usize {
        self.clean.kmer_size()
    }
    fn num_colors(&self) -> usize {
        self.clean.num_colors()
    }
    fn lookup(&self, kmer: &str) -> Option<KmerRecord> {
        self.clean
            .lookup(kmer)
            .or_else(|| self.dirty.and_then(|d| d.lookup(kmer)))
    }
}

/// Lookup of the genomic intervals where a k-mer occurs in each background.
pub trait IntervalLookup: Send + Sync {
    /// Names of the backgrounds, in a fixed order.
    fn backgrounds(&self) -> Vec<String>;
    /// Intervals of the k-mer in the given background. The strand is relative to `kmer`.
    fn find(&self, background: &str, kmer: &str) -> Vec<GenomicInterval>;
}

/// In-memory k-mer to interval index.
/// The k-mers are stored canonically, with the strand relative to the canonical k-mer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KmerIntervalIndex {
    k: usize,
    index: BTreeMap<String, HashMap<String, Vec<GenomicInterval>>>,
}

impl KmerIntervalIndex {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            index: BTreeMap::new(),
        }
    }
    /// Index all k-mers of `seq`, which starts at the 1-based `start` position of `contig`.
    pub fn insert_sequence(&mut self, background: &str, contig: &str, start: u64, seq: &str) {
        let k = self.k;
        let bucket = self.index.entry(background.to_string()).or_default();
        for (i, kmer) in kmer::kmers(seq, k).into_iter().enumerate() {
            let begin = start + i as u64;
            let strand = match kmer::is_canonical(&kmer) {
                true => Strand::Forward,
                false => Strand::Reverse,
            };
            let interval = GenomicInterval::new(contig, begin, begin + k as u64 - 1, strand);
            bucket
                .entry(kmer::canonical(&kmer))
                .or_default()
                .push(interval);
        }
    }
}

impl IntervalLookup for KmerIntervalIndex {
    fn backgrounds(&self) -> Vec<String> {
        self.index.keys().cloned().collect()
    }
    fn find(&self, background: &str, kmer: &str) -> Vec<GenomicInterval> {
        let is_canonical = kmer::is_canonical(kmer);
        let intervals = self
            .index
            .get(background)
            .and_then(|bucket| bucket.get(&kmer::canonical(kmer)));
        match intervals {
            Some(intervals) if is_canonical => intervals.clone(),
            Some(intervals) => intervals
                .iter()
                .map(|iv| {
                    let mut iv = iv.clone();
                    iv.strand = match iv.strand {
                        Strand::Forward => Strand::Reverse,
                        Strand::Reverse => Strand::Forward,
                    };
                    iv
                })
                .collect(),
            None => vec![],
        }
    }
}
