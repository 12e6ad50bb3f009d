//! Pipelines -- the whole pipeline of the genotyper.
//!
//! From a colored de Bruijn graph, this module finds the novel k-mers of the child,
//! assembles and genotypes the stretches around them, and writes the reports.
use crate::error::CliError;
use definitions::StretchReport;
use genotyper::background::TransitionWeights;
use genotyper::call::{call_variants, CallConfig};
use genotyper::graph_source::{GraphSources, InMemoryGraph, IntervalLookup, KmerIntervalIndex};
use genotyper::novel::{filter_contaminants, find_novel_kmers, NovelKmers};
use genotyper::variants::EdlibAligner;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParentConfig {
    pub name: String,
    pub color: usize,
}

/// The configuration of the pipeline.
/// This struct is a comprehensive list of the parameters that can be set by a user.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PipelineConfig {
    /// The path to the colored de Bruijn graph in JSON.
    graph: PathBuf,
    /// The path to the unfiltered graph.
    dirty_graph: Option<PathBuf>,
    /// The path to the k-mer to reference interval index in JSON.
    intervals: Option<PathBuf>,
    /// The path to the output directory.
    out_dir: PathBuf,
    prefix: String,
    verbose: usize,
    threads: usize,
    child_color: usize,
    parents: Vec<ParentConfig>,
    #[serde(default)]
    contaminant_colors: Vec<usize>,
    min_coverage: u32,
    flank_length: usize,
    max_stretch_length: usize,
    window: u64,
    max_states_per_background: usize,
    #[serde(default)]
    combine_across_novelty: bool,
    #[serde(default)]
    weights: TransitionWeights,
}

impl PipelineConfig {
    pub fn parents(&self) -> Vec<(String, usize)> {
        self.parents
            .iter()
            .map(|p| (p.name.clone(), p.color))
            .collect()
    }
    /// `<out_dir>/<prefix>.<suffix>`
    pub fn output(&self, suffix: &str) -> PathBuf {
        self.out_dir.join(format!("{}.{}", self.prefix, suffix))
    }
    pub fn call_config(&self) -> CallConfig {
        let mut config = CallConfig::new(self.child_color, &self.parents());
        config.stretch.flank_length = self.flank_length;
        config.stretch.max_length = self.max_stretch_length;
        config.background.window = self.window;
        config.background.max_states_per_background = self.max_states_per_background;
        config.background.weights = self.weights;
        config.combine_across_novelty = self.combine_across_novelty;
        config
    }
}

pub fn parse_profile<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, CliError> {
    let file = std::fs::read_to_string(path)?;
    let config = toml::from_str(&file)?;
    Ok(config)
}

pub fn run_pipeline(config: &PipelineConfig) -> Result<(), CliError> {
    let level = match config.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    set_threads(config.threads);
    let graph: InMemoryGraph = parse_json(&config.graph)?;
    let dirty: Option<InMemoryGraph> = match config.dirty_graph.as_ref() {
        Some(path) => Some(parse_json(path)?),
        None => None,
    };
    let intervals: Option<KmerIntervalIndex> = match config.intervals.as_ref() {
        Some(path) => Some(parse_json(path)?),
        None => None,
    };
    let sources = match dirty.as_ref() {
        Some(dirty) => GraphSources::with_dirty(&graph, dirty),
        None => GraphSources::new(&graph),
    };
    let comparison: Vec<_> = config.parents.iter().map(|p| p.color).collect();
    let novel = find_novel_kmers(&graph, config.child_color, &comparison, config.min_coverage);
    let novel = filter_contaminants(novel, &sources, &config.contaminant_colors);
    std::fs::create_dir_all(&config.out_dir)?;
    write_json(&novel, &config.output("novel.json"))?;
    let novel = NovelKmers::new(novel);
    let intervals = intervals.as_ref().map(|x| x as &dyn IntervalLookup);
    let call_config = config.call_config();
    let reports = call_variants(&sources, intervals, &novel, &EdlibAligner, &call_config);
    write_json(&reports, &config.output("json"))?;
    write_tsv(&reports, &config.output("tsv"))?;
    debug!("PIPELINE\tDone\t{}", reports.len());
    Ok(())
}

pub fn parse_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, CliError> {
    debug!("Opening {:?}", path.as_ref());
    let reader = std::fs::File::open(path).map(BufReader::new)?;
    let value = serde_json::de::from_reader(reader)?;
    Ok(value)
}

pub fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), CliError> {
    let mut wtr = std::fs::File::create(path).map(BufWriter::new)?;
    serde_json::ser::to_writer(&mut wtr, value)?;
    wtr.flush()?;
    Ok(())
}

fn write_tsv(reports: &[StretchReport], path: &Path) -> Result<(), CliError> {
    let mut wtr = std::fs::File::create(path).map(BufWriter::new)?;
    for report in reports.iter() {
        writeln!(wtr, "{}", report)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn set_threads(threads: usize) {
    debug!("Set Threads\t{}", threads);
    if let Err(why) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        debug!("{:?} The global pool is already set.", why);
    }
}

/// Parse `mother:1,father:2` into the names and colors of the parents.
pub fn parse_parents(input: &str) -> Result<Vec<(String, usize)>, CliError> {
    input
        .split(',')
        .filter(|x| !x.is_empty())
        .map(|parent| {
            let (name, color) = parent
                .split_once(':')
                .ok_or_else(|| CliError::Argument(parent.to_string()))?;
            let color = color
                .parse()
                .map_err(|_| CliError::Argument(parent.to_string()))?;
            Ok((name.to_string(), color))
        })
        .collect()
}

/// Parse comma-separated colors.
pub fn parse_colors(input: &str) -> Result<Vec<usize>, CliError> {
    input
        .split(',')
        .filter(|x| !x.is_empty())
        .map(|c| c.parse().map_err(|_| CliError::Argument(c.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    const PROFILE: &str = r#"
graph = "trio.json"
out_dir = "result"
prefix = "trio"
verbose = 1
threads = 4
child_color = 0
min_coverage = 2
flank_length = 50
max_stretch_length = 5000
window = 100
max_states_per_background = 3

[[parents]]
name = "mother"
color = 1

[[parents]]
name = "father"
color = 2
"#;
    #[test]
    fn profile() {
        let config: PipelineConfig = toml::from_str(PROFILE).unwrap();
        assert!(config.dirty_graph.is_none());
        assert!(config.contaminant_colors.is_empty());
        assert_eq!(config.weights, TransitionWeights::default());
        assert_eq!(
            config.parents(),
            vec![("mother".to_string(), 1), ("father".to_string(), 2)]
        );
        let call = config.call_config();
        assert_eq!(call.local.colors, vec![1, 2]);
        assert_eq!(call.stretch.flank_length, 50);
        assert_eq!(call.background.window, 100);
        assert!(toml::from_str::<PipelineConfig>("graph = 1").is_err());
        assert_eq!(config.output("tsv"), Path::new("result/trio.tsv"));
        let dotted = PROFILE.replace("prefix = \"trio\"", "prefix = \"trio.v1\"");
        let config: PipelineConfig = toml::from_str(&dotted).unwrap();
        assert_eq!(config.output("novel.json"), Path::new("result/trio.v1.novel.json"));
    }
    #[test]
    fn arguments() {
        let parents = parse_parents("mother:1,father:2").unwrap();
        assert_eq!(parents[1], ("father".to_string(), 2));
        assert!(parse_parents("mother").is_err());
        assert!(parse_parents("mother:x").is_err());
        assert_eq!(parse_colors("1,2,").unwrap(), vec![1, 2]);
        assert!(parse_colors("a").is_err());
    }
}
