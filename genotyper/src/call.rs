//! Genotyping every novel stretch.
//!
//! For each unclaimed novel k-mer, a worker assembles the stretch around it, claims its novel
//! k-mers, loads the local subgraph, labels the stretch by its backgrounds, and calls the
//! variants against the path of each parent.
use crate::background::{infer_backgrounds, BackgroundConfig, Observation};
use crate::graph_source::{ColoredGraphAccess, IntervalLookup};
use crate::local_graph::{load_local_subgraph, outermost_landmarks, LocalGraphConfig};
use crate::novel::NovelKmers;
use crate::simplify::simplify;
use crate::stretch::{assemble_stretch, Stretch, StretchConfig};
use crate::variants::{annotate_novel_kmers, extract_variants, Aligner};
use definitions::{BackgroundLabels, StretchReport};
use rayon::prelude::*;

pub const PARENTS: &str = "parents";
pub const REFERENCES: &str = "references";

#[derive(Debug, Clone)]
pub struct CallConfig {
    pub child_color: usize,
    /// Name and color of each parent.
    pub parents: Vec<(String, usize)>,
    pub stretch: StretchConfig,
    pub local: LocalGraphConfig,
    pub background: BackgroundConfig,
    pub combine_across_novelty: bool,
}

impl CallConfig {
    pub fn new(child_color: usize, parents: &[(String, usize)]) -> Self {
        let colors: Vec<_> = parents.iter().map(|&(_, color)| color).collect();
        Self {
            child_color,
            parents: parents.to_vec(),
            stretch: StretchConfig {
                child_color,
                ..Default::default()
            },
            local: LocalGraphConfig::new(child_color, &colors),
            background: BackgroundConfig::default(),
            combine_across_novelty: false,
        }
    }
}

/// Genotype the stretches around all the unclaimed novel k-mers, in parallel.
/// The reports are sorted by their seeds.
pub fn call_variants(
    sources: &dyn ColoredGraphAccess,
    intervals: Option<&dyn IntervalLookup>,
    novel: &NovelKmers,
    aligner: &dyn Aligner,
    config: &CallConfig,
) -> Vec<StretchReport> {
    let seeds = novel.unclaimed();
    debug!("CALL\tSeeds\t{}", seeds.len());
    let mut reports: Vec<_> = seeds
        .par_iter()
        .enumerate()
        .filter(|(_, seed)| novel.is_unclaimed(seed))
        .filter_map(|(owner, seed)| {
            call_stretch(seed, owner, sources, intervals, novel, aligner, config)
        })
        .collect();
    reports.sort_by(|a, b| a.seed.cmp(&b.seed));
    debug!("CALL\tStretches\t{}", reports.len());
    reports
}

/// Genotype the stretch around `seed` on behalf of `owner`.
/// Return None if the seed is absent, or the stretch overlaps a stretch of another owner.
pub fn call_stretch(
    seed: &str,
    owner: usize,
    sources: &dyn ColoredGraphAccess,
    intervals: Option<&dyn IntervalLookup>,
    novel: &NovelKmers,
    aligner: &dyn Aligner,
    config: &CallConfig,
) -> Option<StretchReport> {
    let stretch = assemble_stretch(seed, sources, novel, &config.stretch)?;
    let novel_kmers: Vec<_> = stretch.novel_kmers().collect();
    if !novel.try_claim_all(&novel_kmers, owner) {
        debug!("CALL\t{}\tConflict", seed);
        return None;
    }
    let local = load_local_subgraph(&stretch, sources, novel, &config.local);
    let unitigs = simplify(&local, config.combine_across_novelty).num_vertices();
    let mut labels = vec![BackgroundLabels {
        group: PARENTS.to_string(),
        labels: label_parents(&stretch, sources, config),
    }];
    if let Some(intervals) = intervals {
        labels.push(BackgroundLabels {
            group: REFERENCES.to_string(),
            labels: label_references(&stretch, intervals, &config.background),
        });
    }
    let mut variants = vec![];
    let span = outermost_landmarks(&local, &stretch).and_then(|(from, to)| {
        let position = |id: usize| stretch.kmers.iter().position(|k| k == local.seq(id));
        match (position(from), position(to)) {
            (Some(start), Some(end)) if start <= end => Some((from, to, start, end)),
            _ => None,
        }
    });
    match span {
        None => debug!("CALL\t{}\tNoLandmarks", seed),
        Some((from, to, start, end)) => {
            let child = Stretch {
                kmers: stretch.kmers[start..=end].to_vec(),
                novel: stretch.novel[start..=end].to_vec(),
            }
            .seq();
            for (name, color) in config.parents.iter() {
                let path = local.min_weight_path(from, to, sources.num_colors(), Some(*color));
                let path = match path {
                    Some(path) => path,
                    None => {
                        debug!("CALL\t{}\t{}\tNoPath", seed, name);
                        continue;
                    }
                };
                let background = local.spell(&path);
                let (child_aln, background_aln) = aligner.align(&child, &background);
                for mut call in extract_variants(&child_aln, &background_aln) {
                    call.offset += start;
                    call.background = name.clone();
                    annotate_novel_kmers(&mut call, &stretch, novel);
                    variants.push(call);
                }
            }
        }
    }
    debug!(
        "CALL\t{}\t{}\t{}\t{}\t{}",
        seed,
        owner,
        stretch.len(),
        unitigs,
        variants.len()
    );
    Some(StretchReport {
        seed: seed.to_string(),
        owner,
        stretch: stretch.seq(),
        novel_kmers: novel_kmers.len(),
        unitigs,
        labels,
        variants,
    })
}

fn label_parents(stretch: &Stretch, sources: &dyn ColoredGraphAccess, config: &CallConfig) -> Vec<String> {
    let mut observations = vec![];
    for (position, kmer) in stretch.kmers.iter().enumerate() {
        let record = match sources.lookup(kmer) {
            Some(record) => record,
            None => continue,
        };
        for (name, color) in config.parents.iter() {
            if record.has_coverage(*color) {
                observations.push(Observation::new(position, name, vec![], true));
            }
        }
    }
    infer_backgrounds(&stretch.novel, &observations, &config.background)
}

fn label_references(
    stretch: &Stretch,
    intervals: &dyn IntervalLookup,
    config: &BackgroundConfig,
) -> Vec<String> {
    let mut observations = vec![];
    for background in intervals.backgrounds() {
        for (position, kmer) in stretch.kmers.iter().enumerate() {
            let hits = intervals.find(&background, kmer);
            if !hits.is_empty() {
                observations.push(Observation::new(position, &background, hits, true));
            }
        }
    }
    infer_backgrounds(&stretch.novel, &observations, config)
}
