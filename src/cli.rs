//! Main `PointsWorks` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Append)
        .required(true)
        .help("Input program description file (can be repeated)")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_entry() -> Arg {
    Arg::new("entry")
        .long("entry")
        .action(ArgAction::Append)
        .help("Entry method, as Class.method (can be repeated)")
}

fn arg_filter_class() -> Arg {
    Arg::new("filter-class")
        .long("filter-class")
        .action(ArgAction::Set)
        .help("Class(es) regex filter")
}

fn arg_filter_method() -> Arg {
    Arg::new("filter-method")
        .long("filter-method")
        .action(ArgAction::Set)
        .help("Method(s) regex filter")
}

#[must_use]
pub fn pointsworks() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(callgraph())
        .subcommand(hierarchy())
        .subcommand(pta())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn callgraph() -> Command {
    Command::new("callgraph")
        .bin_name("pw-callgraph")
        .version(VERSION)
        .author(AUTHORS)
        .about("Generates program callgraph")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Output dot file"))
        .arg(arg_entry())
        .arg(
            Arg::new("algorithm")
                .short('a')
                .long("algorithm")
                .action(ArgAction::Set)
                .value_parser(PossibleValuesParser::new(["direct", "cha", "rta"]))
                .default_value("direct")
                .help("Call resolution algorithm"),
        )
        .arg(
            Arg::new("display-generated")
                .long("display-generated")
                .action(ArgAction::SetTrue)
                .help("Keep calls to compiler generated methods"),
        )
        .arg(arg_filter_class())
        .arg(arg_filter_method())
}

#[must_use]
pub fn hierarchy() -> Command {
    Command::new("hierarchy")
        .bin_name("pw-hierarchy")
        .version(VERSION)
        .author(AUTHORS)
        .about("Generates classes hierarchy")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_output("Output dot file"))
}

#[must_use]
pub fn pta() -> Command {
    Command::new("pta")
        .bin_name("pw-pta")
        .version(VERSION)
        .author(AUTHORS)
        .about("Runs the context sensitive pointer analysis")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_entry().required(true))
        .arg(
            Arg::new("k")
                .short('k')
                .long("k-limit")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Maximal call string length of contexts"),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .action(ArgAction::Set)
                .default_value("out/")
                .help("Directory receiving the dumps"),
        )
        .arg(
            Arg::new("dot-dump")
                .long("dot-dump")
                .action(ArgAction::SetTrue)
                .help("Dump the PAG and the callgraph at each iteration"),
        )
        .arg(
            Arg::new("unhandled-dump")
                .long("unhandled-dump")
                .action(ArgAction::SetTrue)
                .help("Dump the methods never reached by the analysis"),
        )
        .arg(
            Arg::new("type-diff")
                .long("type-diff")
                .action(ArgAction::SetTrue)
                .help("Report values pointing to objects of another type"),
        )
        .arg(
            Arg::new("no-framework")
                .long("no-framework")
                .action(ArgAction::SetTrue)
                .help("Disable the ArkUI storage and singleton modeling"),
        )
        .arg(
            Arg::new("points-to")
                .short('p')
                .long("points-to")
                .action(ArgAction::Append)
                .help("Local to print the points-to set of, as Class.method:local"),
        )
}
