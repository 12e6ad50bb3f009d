//! Assembly of a linear stretch around a novel k-mer.
use crate::graph_source::ColoredGraphAccess;
use crate::kmer;
use crate::novel::NovelKmers;
use crate::traversal::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StretchConfig {
    pub child_color: usize,
    /// Number of non-novel k-mers kept on each side of the novel run.
    pub flank_length: usize,
    /// Maximum number of k-mers in a stretch.
    pub max_length: usize,
}

impl StretchConfig {
    pub fn new(child_color: usize, flank_length: usize, max_length: usize) -> Self {
        Self {
            child_color,
            flank_length,
            max_length,
        }
    }
}

impl std::default::Default for StretchConfig {
    fn default() -> Self {
        Self {
            child_color: 0,
            flank_length: 100,
            max_length: 10_000,
        }
    }
}

/// A linear path in the child color. The i-th k-mer overlaps the (i+1)-th by k-1 bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stretch {
    pub kmers: Vec<String>,
    pub novel: Vec<bool>,
}

impl Stretch {
    pub fn len(&self) -> usize {
        self.kmers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kmers.is_empty()
    }
    pub fn k(&self) -> usize {
        self.kmers.first().map(|k| k.len()).unwrap_or(0)
    }
    pub fn seq(&self) -> String {
        kmer::spell(&self.kmers, self.k())
    }
    pub fn novel_kmers(&self) -> impl Iterator<Item = &str> + '_ {
        self.kmers
            .iter()
            .zip(self.novel.iter())
            .filter(|&(_, &is_novel)| is_novel)
            .map(|(kmer, _)| kmer.as_str())
    }
    pub fn first_novel(&self) -> Option<usize> {
        self.novel.iter().position(|&b| b)
    }
    pub fn last_novel(&self) -> Option<usize> {
        self.novel.iter().rposition(|&b| b)
    }
}

/// Walk from `seed` in both directions in the child color. Return None if the seed is not in the graph.
pub fn assemble_stretch(
    seed: &str,
    sources: &dyn ColoredGraphAccess,
    novel: &NovelKmers,
    config: &StretchConfig,
) -> Option<Stretch> {
    sources.lookup(seed)?;
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(kmer::canonical(seed));
    let mut budget = config.max_length.max(1) - 1;
    let mut kmers = extend(seed, sources, novel, config, false, &mut visited, &mut budget);
    kmers.reverse();
    kmers.push(seed.to_string());
    kmers.extend(extend(seed, sources, novel, config, true, &mut visited, &mut budget));
    let is_novel: Vec<_> = kmers.iter().map(|k| novel.contains(k)).collect();
    trace!("STRETCH\t{}\t{}", seed, kmers.len());
    Some(Stretch {
        kmers,
        novel: is_novel,
    })
}

// K-mers beyond `seed` in one direction, nearest first.
fn extend(
    seed: &str,
    sources: &dyn ColoredGraphAccess,
    novel: &NovelKmers,
    config: &StretchConfig,
    forward: bool,
    visited: &mut HashSet<String>,
    budget: &mut usize,
) -> Vec<String> {
    let direction = match forward {
        true => Direction::Forward,
        false => Direction::Reverse,
    };
    let mut kmers = vec![];
    let mut current = seed.to_string();
    let mut flank = 0;
    while 0 < *budget {
        let mut exts = sources.valid_extensions(&current, config.child_color, direction);
        if exts.len() != 1 {
            break;
        }
        let next = exts.remove(0);
        if !visited.insert(kmer::canonical(&next)) {
            break;
        }
        if novel.contains(&next) {
            flank = 0;
        } else {
            flank += 1;
            if config.flank_length < flank {
                break;
            }
        }
        *budget -= 1;
        kmers.push(next.clone());
        current = next;
    }
    kmers
}
