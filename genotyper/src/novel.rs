//! The set of novel k-mers and their owners.
//!
//! A novel k-mer is claimed by at most one stretch. Workers share the set by reference,
//! and all the claims go through a single lock.
use crate::graph_source::{ColoredGraphAccess, InMemoryGraph};
use crate::kmer;
use crate::stopping_rules::ContaminantStopper;
use crate::traversal::{Direction, TraversalConfig, TraversalEngine};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct NovelKmers {
    // Canonical k-mer -> the id of the stretch which claimed it.
    owners: Mutex<HashMap<String, Option<usize>>>,
}

impl NovelKmers {
    pub fn new<I: IntoIterator<Item = String>>(kmers: I) -> Self {
        let owners = kmers
            .into_iter()
            .map(|kmer| (kmer::canonical(&kmer), None))
            .collect();
        Self {
            owners: Mutex::new(owners),
        }
    }
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<usize>>> {
        // A worker panicking while holding the lock leaves the map consistent.
        match self.owners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
    pub fn len(&self) -> usize {
        self.lock().len()
    }
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
    /// The k-mer can be in either orientation.
    pub fn contains(&self, kmer: &str) -> bool {
        self.lock().contains_key(&kmer::canonical(kmer))
    }
    pub fn owner(&self, kmer: &str) -> Option<usize> {
        self.lock().get(&kmer::canonical(kmer)).copied().flatten()
    }
    pub fn is_unclaimed(&self, kmer: &str) -> bool {
        matches!(self.lock().get(&kmer::canonical(kmer)), Some(None))
    }
    /// Claim the k-mer for `owner`. Return true if the k-mer is novel and
    /// is now (or was already) owned by `owner`.
    pub fn try_claim(&self, kmer: &str, owner: usize) -> bool {
        let mut owners = self.lock();
        match owners.get_mut(&kmer::canonical(kmer)) {
            Some(slot) => match *slot {
                None => {
                    *slot = Some(owner);
                    true
                }
                Some(current) => current == owner,
            },
            None => false,
        }
    }
    /// Claim all the novel k-mers in `kmers`, or none of them if any is owned by another stretch.
    /// Non-novel k-mers are ignored.
    pub fn try_claim_all<S: AsRef<str>>(&self, kmers: &[S], owner: usize) -> bool {
        let mut owners = self.lock();
        let keys: Vec<_> = kmers
            .iter()
            .map(|k| kmer::canonical(k.as_ref()))
            .filter(|k| owners.contains_key(k))
            .collect();
        let conflict = keys
            .iter()
            .any(|k| matches!(owners.get(k), Some(Some(current)) if *current != owner));
        if conflict {
            return false;
        }
        for k in keys {
            owners.insert(k, Some(owner));
        }
        true
    }
    /// Release every k-mer owned by `owner`.
    pub fn release(&self, owner: usize) {
        self.lock()
            .values_mut()
            .filter(|slot| **slot == Some(owner))
            .for_each(|slot| *slot = None);
    }
    /// Unclaimed k-mers, sorted.
    pub fn unclaimed(&self) -> Vec<String> {
        let mut kmers: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, owner)| owner.is_none())
            .map(|(kmer, _)| kmer.clone())
            .collect();
        kmers.sort();
        kmers
    }
}

/// Canonical k-mers with at least `min_coverage` in the child color and no coverage in any
/// of the comparison colors. Low-complexity k-mers are excluded.
pub fn find_novel_kmers(
    graph: &InMemoryGraph,
    child: usize,
    comparison_colors: &[usize],
    min_coverage: u32,
) -> Vec<String> {
    let records: Vec<_> = graph.records().collect();
    let mut novel: Vec<String> = records
        .par_iter()
        .filter(|record| min_coverage.max(1) <= record.coverage(child))
        .filter(|record| comparison_colors.iter().all(|&c| !record.has_coverage(c)))
        .filter(|record| !kmer::is_low_complexity(&record.kmer))
        .map(|record| record.kmer.clone())
        .collect();
    novel.sort();
    debug!("NOVEL\t{}\t{}", records.len(), novel.len());
    novel
}

/// Remove the k-mers found in any of the contaminant colors.
pub fn filter_contaminants(
    kmers: Vec<String>,
    sources: &dyn ColoredGraphAccess,
    contaminant_colors: &[usize],
) -> Vec<String> {
    if contaminant_colors.is_empty() {
        return kmers;
    }
    let config = TraversalConfig::new(contaminant_colors, Direction::Forward);
    let engine = TraversalEngine::new(sources, config);
    let rule = ContaminantStopper::new(contaminant_colors);
    let len = kmers.len();
    let kmers: Vec<_> = kmers
        .into_par_iter()
        .filter(|kmer| !engine.walk(kmer, true, &rule).succeeded())
        .collect();
    debug!("CONTAMINANT\t{}\t{}", len, len - kmers.len());
    kmers
}
