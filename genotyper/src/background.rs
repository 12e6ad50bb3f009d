//! Assigning each position of a stretch to its most likely background by the Viterbi algorithm.
//!
//! A background is a parent or a reference. Each background has one state per cluster of the
//! genomic intervals where the stretch k-mers occur, plus one catch-all state.
use definitions::GenomicInterval;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const EPSILON: f64 = f64::MIN_POSITIVE;

/// Unnormalized transition weights.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TransitionWeights {
    pub stay: f64,
    /// Switch between two states of the same background outside a novel run.
    pub switch_same_background: f64,
    /// Switch between two states of the same background inside a novel run.
    pub switch_within_novel: f64,
    /// Switch between two states of the same background where the novelty changes.
    pub switch_at_novelty_boundary: f64,
    pub switch_other_background: f64,
}

impl std::default::Default for TransitionWeights {
    fn default() -> Self {
        Self {
            stay: 100_000f64,
            switch_same_background: 1f64,
            switch_within_novel: 10f64,
            switch_at_novelty_boundary: 100f64,
            switch_other_background: 1f64,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackgroundConfig {
    /// Two intervals closer than this are in the same cluster.
    pub window: u64,
    pub max_states_per_background: usize,
    pub weights: TransitionWeights,
}

impl BackgroundConfig {
    pub fn new(window: u64, max_states_per_background: usize) -> Self {
        Self {
            window,
            max_states_per_background,
            weights: TransitionWeights::default(),
        }
    }
}

impl std::default::Default for BackgroundConfig {
    fn default() -> Self {
        Self::new(200, 5)
    }
}

/// What is known about the k-mer at `position` in a background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub position: usize,
    pub background: String,
    pub intervals: Vec<GenomicInterval>,
    pub present: bool,
}

impl Observation {
    pub fn new(position: usize, background: &str, intervals: Vec<GenomicInterval>, present: bool) -> Self {
        Self {
            position,
            background: background.to_string(),
            intervals,
            present,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackgroundState {
    pub background: String,
    /// None for the catch-all state.
    pub interval: Option<GenomicInterval>,
}

impl BackgroundState {
    pub fn label(&self) -> String {
        format!("{}", self)
    }
}

impl std::fmt::Display for BackgroundState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.interval.as_ref() {
            Some(interval) => write!(f, "{}:{}", self.background, interval),
            None => write!(f, "{}", self.background),
        }
    }
}

/// The states of each background, in the order the backgrounds first appear.
pub fn build_states(observations: &[Observation], config: &BackgroundConfig) -> Vec<BackgroundState> {
    let mut order: Vec<&str> = vec![];
    let mut intervals: BTreeMap<&str, Vec<&GenomicInterval>> = BTreeMap::new();
    for obs in observations.iter() {
        if !order.contains(&obs.background.as_str()) {
            order.push(&obs.background);
        }
        if obs.present {
            let bucket = intervals.entry(&obs.background).or_default();
            bucket.extend(obs.intervals.iter());
        }
    }
    let mut states = vec![];
    for background in order {
        let clusters = match intervals.get(background) {
            Some(ivs) => cluster_intervals(ivs, config),
            None => vec![],
        };
        for interval in clusters {
            states.push(BackgroundState {
                background: background.to_string(),
                interval: Some(interval),
            });
        }
        states.push(BackgroundState {
            background: background.to_string(),
            interval: None,
        });
    }
    let mut dedup: Vec<BackgroundState> = Vec::with_capacity(states.len());
    for state in states {
        if !dedup.contains(&state) {
            dedup.push(state);
        }
    }
    dedup
}

// Merge intervals on the same contig and strand closer than the window,
// then keep the longest clusters, in the original order.
fn cluster_intervals(intervals: &[&GenomicInterval], config: &BackgroundConfig) -> Vec<GenomicInterval> {
    let mut sorted: Vec<_> = intervals.to_vec();
    sorted.sort_by(|a, b| {
        (&a.contig, a.strand, a.start, a.end).cmp(&(&b.contig, b.strand, b.start, b.end))
    });
    let mut clusters: Vec<GenomicInterval> = vec![];
    for interval in sorted {
        match clusters.last_mut() {
            Some(last) if last.is_near(interval, config.window) => *last = last.union(interval),
            _ => clusters.push(interval.clone()),
        }
    }
    let mut ranked: Vec<_> = clusters.iter().enumerate().collect();
    ranked.sort_by(|(i, a), (j, b)| b.len().cmp(&a.len()).then(i.cmp(j)));
    let mut keep: Vec<_> = ranked
        .iter()
        .take(config.max_states_per_background)
        .map(|&(i, _)| i)
        .collect();
    keep.sort_unstable();
    keep.into_iter().map(|i| clusters[i].clone()).collect()
}

// explains[p][s] is true if the s-th state explains the p-th position.
fn explanations(
    len: usize,
    states: &[BackgroundState],
    observations: &[Observation],
    window: u64,
) -> Vec<Vec<bool>> {
    let mut explains = vec![vec![false; states.len()]; len];
    let mut observed = vec![vec![false; states.len()]; len];
    for obs in observations.iter() {
        assert!(obs.position < len, "{} is out of {}", obs.position, len);
        for (s, state) in states.iter().enumerate() {
            if state.background != obs.background {
                continue;
            }
            observed[obs.position][s] = true;
            if let Some(interval) = state.interval.as_ref() {
                let hit = obs.intervals.iter().any(|iv| interval.is_near(iv, window));
                explains[obs.position][s] |= obs.present && hit;
            }
        }
    }
    for (explains, observed) in explains.iter_mut().zip(observed.iter()) {
        for s in 0..states.len() {
            if states[s].interval.is_some() || !observed[s] {
                continue;
            }
            let background = &states[s].background;
            let covered = states
                .iter()
                .zip(explains.iter())
                .any(|(t, &e)| e && t.interval.is_some() && &t.background == background);
            explains[s] = !covered;
        }
    }
    explains
}

// Transition matrix into the position `pos`. trans[k][j] is the probability of k -> j.
fn transitions(
    pos: usize,
    states: &[BackgroundState],
    explains: &[bool],
    novelty: &[bool],
    weights: &TransitionWeights,
) -> Vec<Vec<f64>> {
    let num = states.len();
    if explains.iter().all(|&e| !e) {
        return vec![vec![1f64 / num as f64; num]; num];
    }
    let boundary = novelty[pos - 1] != novelty[pos];
    (0..num)
        .map(|k| {
            let row: Vec<_> = (0..num)
                .map(|j| {
                    if !explains[j] {
                        0f64
                    } else if k == j {
                        weights.stay
                    } else if states[k].background != states[j].background {
                        weights.switch_other_background
                    } else if boundary {
                        weights.switch_at_novelty_boundary
                    } else if novelty[pos] {
                        weights.switch_within_novel
                    } else {
                        weights.switch_same_background
                    }
                })
                .collect();
            let sum: f64 = row.iter().sum();
            row.iter().map(|x| x / sum).collect()
        })
        .collect()
}

/// The most likely sequence of states. `novelty[i]` is true if the i-th k-mer is novel.
pub fn viterbi(
    novelty: &[bool],
    states: &[BackgroundState],
    observations: &[Observation],
    config: &BackgroundConfig,
) -> Vec<usize> {
    let len = novelty.len();
    if len == 0 || observations.is_empty() {
        return vec![];
    }
    assert!(!states.is_empty(), "No state for {} observations", observations.len());
    let num = states.len();
    let explains = explanations(len, states, observations, config.window);
    let init = (1f64 / num as f64).ln();
    let any_explains = explains[0].iter().any(|&e| e);
    let mut dp = vec![vec![0f64; num]; len];
    let mut traceback = vec![vec![0; num]; len];
    for (j, score) in dp[0].iter_mut().enumerate() {
        *score = match any_explains && !explains[0][j] {
            true => init + EPSILON.ln(),
            false => init,
        };
    }
    for pos in 1..len {
        let trans = transitions(pos, states, &explains[pos], novelty, &config.weights);
        for j in 0..num {
            let (mut max, mut argmax) = (f64::NEG_INFINITY, 0);
            for k in 0..num {
                let score = dp[pos - 1][k] + (trans[k][j] + EPSILON).ln();
                if max < score {
                    max = score;
                    argmax = k;
                }
            }
            dp[pos][j] = max;
            traceback[pos][j] = argmax;
        }
    }
    let mut state = 0;
    for (j, &score) in dp[len - 1].iter().enumerate() {
        if dp[len - 1][state] < score {
            state = j;
        }
    }
    let mut path = vec![state];
    for pos in (1..len).rev() {
        state = traceback[pos][state];
        path.push(state);
    }
    path.reverse();
    path
}

/// Label each position of the stretch with the most likely background state.
/// Returns an empty vector if nothing is observed.
pub fn infer_backgrounds(
    novelty: &[bool],
    observations: &[Observation],
    config: &BackgroundConfig,
) -> Vec<String> {
    let states = build_states(observations, config);
    let path = viterbi(novelty, &states, observations, config);
    trace!("BACKGROUND\t{}\t{}\t{}", novelty.len(), observations.len(), states.len());
    path.iter().map(|&s| states[s].label()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use definitions::Strand;
    fn iv(start: u64) -> GenomicInterval {
        GenomicInterval::new("chr1", start, start + 4, Strand::Forward)
    }
    #[test]
    fn single_state() {
        let obs: Vec<_> = (0..6).map(|i| Observation::new(i, "mother", vec![], true)).collect();
        let config = BackgroundConfig::default();
        let states = build_states(&obs, &config);
        assert_eq!(states.len(), 1);
        let labels = infer_backgrounds(&[false, true, true, true, false, false], &obs, &config);
        assert_eq!(labels, vec!["mother"; 6]);
    }
    #[test]
    fn empty() {
        let config = BackgroundConfig::default();
        assert!(build_states(&[], &config).is_empty());
        assert!(infer_backgrounds(&[false; 4], &[], &config).is_empty());
    }
    #[test]
    fn no_early_switch() {
        let len = 10;
        let config = BackgroundConfig::default();
        for k in 1..len {
            let mut obs = vec![];
            for i in 0..len {
                obs.push(Observation::new(i, "A", vec![iv(100 + i as u64)], true));
                if k <= i {
                    obs.push(Observation::new(i, "B", vec![iv(900 + i as u64)], true));
                }
            }
            let labels = infer_backgrounds(&vec![false; len], &obs, &config);
            assert_eq!(labels.len(), len);
            for label in labels.iter().take(k) {
                assert!(label.starts_with("A:"), "{:?}", labels);
            }
        }
    }
    #[test]
    fn switch_at_boundary() {
        let len = 8;
        let config = BackgroundConfig::default();
        for k in 1..len {
            let obs: Vec<_> = (0..len)
                .map(|i| match i < k {
                    true => Observation::new(i, "A", vec![iv(100 + i as u64)], true),
                    false => Observation::new(i, "B", vec![iv(900 + i as u64)], true),
                })
                .collect();
            let labels = infer_backgrounds(&vec![true; len], &obs, &config);
            let b_from = labels.iter().position(|l| l.starts_with("B:"));
            assert_eq!(b_from, Some(k), "{:?}", labels);
        }
    }
    #[test]
    fn distant_intervals() {
        let config = BackgroundConfig::new(0, 5);
        let obs = vec![
            Observation::new(0, "P", vec![iv(100)], true),
            Observation::new(1, "P", vec![iv(101)], true),
            Observation::new(2, "P", vec![], false),
            Observation::new(3, "P", vec![iv(5000)], true),
            Observation::new(4, "P", vec![iv(5001)], true),
        ];
        let states = build_states(&obs, &config);
        assert_eq!(states.len(), 3);
        assert_eq!(states[0].label(), "P:chr1:100-105:+");
        assert_eq!(states[1].label(), "P:chr1:5000-5005:+");
        assert_eq!(states[2].label(), "P");
        let labels = infer_backgrounds(&[false, false, true, false, false], &obs, &config);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[3], labels[4]);
        assert_ne!(labels[2], labels[0]);
        assert_ne!(labels[2], labels[3]);
        assert_eq!(labels[0], "P:chr1:100-105:+");
        assert_eq!(labels[3], "P:chr1:5000-5005:+");
    }
    #[test]
    fn top_clusters() {
        let config = BackgroundConfig::new(0, 1);
        let obs = vec![
            Observation::new(0, "P", vec![iv(100)], true),
            Observation::new(1, "P", vec![iv(5000), iv(5003)], true),
        ];
        let states = build_states(&obs, &config);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].label(), "P:chr1:5000-5007:+");
    }
    #[test]
    #[should_panic]
    fn no_state() {
        let obs = vec![Observation::new(0, "P", vec![], true)];
        viterbi(&[false], &[], &obs, &BackgroundConfig::default());
    }
}
