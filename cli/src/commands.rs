use clap::{Arg, ArgAction, Command};

fn verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode")
}

fn threads() -> Arg {
    Arg::new("threads")
        .short('t')
        .long("threads")
        .default_value("1")
        .help("number of threads")
}

fn graph() -> Arg {
    Arg::new("graph")
        .short('g')
        .long("graph")
        .value_name("JSON")
        .required(true)
        .help("Colored de Bruijn graph in JSON format.")
}

fn child() -> Arg {
    Arg::new("child")
        .long("child")
        .default_value("0")
        .help("Color of the child.")
}

fn subcommand_find_novel() -> Command {
    Command::new("find_novel")
        .version("0.1")
        .author("Bansho Masutani")
        .about("List the novel k-mers of the child in JSON format.")
        .arg(verbose())
        .arg(threads())
        .arg(graph())
        .arg(child())
        .arg(
            Arg::new("comparison")
                .long("comparison")
                .value_name("COLORS")
                .required(true)
                .help("Comma-separated colors. A novel k-mer has no coverage in them."),
        )
        .arg(
            Arg::new("contaminants")
                .long("contaminants")
                .value_name("COLORS")
                .help("Comma-separated colors. K-mers in them are removed."),
        )
        .arg(
            Arg::new("min_coverage")
                .long("min_coverage")
                .default_value("2")
                .help("Minimum coverage of a novel k-mer in the child."),
        )
}

fn subcommand_call() -> Command {
    Command::new("call")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Genotype the novel stretches of the child. Write the reports in JSON format.")
        .arg(verbose())
        .arg(threads())
        .arg(graph())
        .arg(child())
        .arg(
            Arg::new("dirty")
                .long("dirty")
                .value_name("JSON")
                .help("Unfiltered graph, used when a k-mer is missing in the graph."),
        )
        .arg(
            Arg::new("novel")
                .short('n')
                .long("novel")
                .value_name("JSON")
                .required(true)
                .help("Novel k-mers, the output of find_novel."),
        )
        .arg(
            Arg::new("parents")
                .short('p')
                .long("parents")
                .value_name("NAME:COLOR,...")
                .required(true)
                .help("Names and colors of the parents, e.g., mother:1,father:2"),
        )
        .arg(
            Arg::new("intervals")
                .long("intervals")
                .value_name("JSON")
                .help("K-mer to reference interval index in JSON format."),
        )
        .arg(
            Arg::new("flank_length")
                .long("flank_length")
                .default_value("100")
                .help("Number of non-novel k-mers on each side of a stretch."),
        )
        .arg(
            Arg::new("window")
                .long("window")
                .default_value("200")
                .help("Intervals closer than this are merged."),
        )
}

fn subcommand_pipeline() -> Command {
    Command::new("pipeline")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Run pipeline based on the given TOML file.")
        .arg(
            Arg::new("profile")
                .short('p')
                .long("profile")
                .required(true)
                .help("TOML configuration file."),
        )
}

pub fn gtk_parser() -> Command {
    Command::new("gtk")
        .version("0.1")
        .author("Bansho Masutani <ban-m@g.ecc.u-tokyo.ac.jp>")
        .about("Genotyping novel sequence in a colored de Bruijn graph")
        .arg_required_else_help(true)
        .subcommand(subcommand_find_novel())
        .subcommand(subcommand_call())
        .subcommand(subcommand_pipeline())
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parse_call() {
        let args = ["gtk", "call", "-vv", "-g", "g.json", "-n", "n.json", "-p", "mother:1"];
        let matches = gtk_parser().try_get_matches_from(args).unwrap();
        let (name, sub_m) = matches.subcommand().unwrap();
        assert_eq!(name, "call");
        assert_eq!(sub_m.get_count("verbose"), 2);
        assert_eq!(sub_m.get_one::<String>("threads").unwrap(), "1");
        assert!(sub_m.get_one::<String>("dirty").is_none());
        let args = ["gtk", "call", "-g", "g.json"];
        assert!(gtk_parser().try_get_matches_from(args).is_err());
    }
}
