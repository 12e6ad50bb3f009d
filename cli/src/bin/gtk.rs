use definitions::StretchReport;
use genotyper::call::{call_variants, CallConfig};
use genotyper::graph_source::{GraphSources, InMemoryGraph, IntervalLookup, KmerIntervalIndex};
use genotyper::novel::{filter_contaminants, find_novel_kmers, NovelKmers};
use genotyper::variants::EdlibAligner;
use genotyper_cli::error::CliError;
use genotyper_cli::pipeline::*;
use std::io::{BufWriter, Write};
#[macro_use]
extern crate log;

fn main() -> std::io::Result<()> {
    let matches = genotyper_cli::commands::gtk_parser().get_matches();
    if let Some(("pipeline", sub_m)) = matches.subcommand() {
        let path = required(sub_m, "profile")?;
        let config = parse_profile(path)?;
        return run_pipeline(&config).map_err(|e| e.into());
    }
    if let Some((_, sub_m)) = matches.subcommand() {
        let level = match sub_m.get_count("verbose") {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }
    let result = match matches.subcommand() {
        Some(("find_novel", sub_m)) => find_novel(sub_m),
        Some(("call", sub_m)) => call(sub_m),
        _ => Err(CliError::Argument("no subcommand".to_string())),
    };
    result.map_err(|e| e.into())
}

fn required<'a>(matches: &'a clap::ArgMatches, id: &str) -> Result<&'a String, CliError> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| CliError::Argument(format!("--{} is required", id)))
}

fn parse_arg<T: std::str::FromStr>(matches: &clap::ArgMatches, id: &str) -> Result<T, CliError> {
    let value = required(matches, id)?;
    value
        .parse()
        .map_err(|_| CliError::Argument(format!("--{} {}", id, value)))
}

fn find_novel(matches: &clap::ArgMatches) -> Result<(), CliError> {
    debug!("START\tFindNovel");
    set_threads(parse_arg(matches, "threads")?);
    let graph: InMemoryGraph = parse_json(required(matches, "graph")?)?;
    let child: usize = parse_arg(matches, "child")?;
    let comparison = parse_colors(required(matches, "comparison")?)?;
    let min_coverage: u32 = parse_arg(matches, "min_coverage")?;
    let novel = find_novel_kmers(&graph, child, &comparison, min_coverage);
    let novel = match matches.get_one::<String>("contaminants") {
        Some(colors) => filter_contaminants(novel, &graph, &parse_colors(colors)?),
        None => novel,
    };
    let stdout = std::io::stdout();
    let mut wtr = BufWriter::new(stdout.lock());
    serde_json::ser::to_writer(&mut wtr, &novel)?;
    wtr.flush()?;
    Ok(())
}

fn call(matches: &clap::ArgMatches) -> Result<(), CliError> {
    debug!("START\tCall");
    set_threads(parse_arg(matches, "threads")?);
    let graph: InMemoryGraph = parse_json(required(matches, "graph")?)?;
    let dirty: Option<InMemoryGraph> = match matches.get_one::<String>("dirty") {
        Some(path) => Some(parse_json(path)?),
        None => None,
    };
    let intervals: Option<KmerIntervalIndex> = match matches.get_one::<String>("intervals") {
        Some(path) => Some(parse_json(path)?),
        None => None,
    };
    let novel: Vec<String> = parse_json(required(matches, "novel")?)?;
    let novel = NovelKmers::new(novel);
    let sources = match dirty.as_ref() {
        Some(dirty) => GraphSources::with_dirty(&graph, dirty),
        None => GraphSources::new(&graph),
    };
    let parents = parse_parents(required(matches, "parents")?)?;
    let mut config = CallConfig::new(parse_arg(matches, "child")?, &parents);
    config.stretch.flank_length = parse_arg(matches, "flank_length")?;
    config.background.window = parse_arg(matches, "window")?;
    let intervals = intervals.as_ref().map(|x| x as &dyn IntervalLookup);
    let reports: Vec<StretchReport> =
        call_variants(&sources, intervals, &novel, &EdlibAligner, &config);
    let stdout = std::io::stdout();
    let mut wtr = BufWriter::new(stdout.lock());
    serde_json::ser::to_writer(&mut wtr, &reports)?;
    wtr.flush()?;
    Ok(())
}
