use crate::prelude::*;
use crate::program;
use clap::ArgMatches;
use regex::Regex;
use std::fs::File;
use std::io::Write;

pub fn run(args: &ArgMatches) -> PwResult<()> {
    init_logger(args);

    let repo = program::open(args)?;
    let entries = program::entries(args);
    let display_generated = args.get_flag("display-generated");
    let algorithm = args
        .get_one::<String>("algorithm")
        .map_or("direct", String::as_str);

    let mut cg = CallGraph::new(&repo);
    let mut builder = CallGraphBuilder::new(&mut cg);
    match algorithm {
        "direct" => {
            builder.build_direct_call_graph_for_repo();
            builder.set_entries();
        }
        "cha" | "rta" if entries.is_empty() => {
            return Err(PwError::BadArguments(format!(
                "--entry needed by the {algorithm} algorithm"
            )))
        }
        "cha" => builder.build_class_hierarchy_call_graph(&entries, display_generated),
        "rta" => builder.build_rapid_type_call_graph(&entries, display_generated),
        _ => {
            return Err(PwError::BadArguments(format!(
                "unknown algorithm '{algorithm}'"
            )))
        }
    }

    log::info!("{}", cg.stats());

    let class_pattern = args
        .get_one::<String>("filter-class")
        .map(|r| Regex::new(r))
        .transpose()?;
    let method_pattern = args
        .get_one::<String>("filter-method")
        .map(|r| Regex::new(r))
        .transpose()?;
    if class_pattern.is_some() || method_pattern.is_some() {
        log::debug!(
            "filtering callgraph on class pattern {:?}, method pattern {:?}",
            class_pattern,
            method_pattern
        );
        for (caller, callees) in cg.dyn_edges() {
            let class_match = class_pattern
                .as_ref()
                .map_or(true, |pattern| pattern.is_match(&caller.class));
            let method_match = method_pattern
                .as_ref()
                .map_or(true, |pattern| pattern.is_match(&caller.name));
            if class_match && method_match {
                for callee in callees {
                    println!("{caller} -> {callee}");
                }
            }
        }
    }

    if let Some(dot_filename) = &args.get_one::<String>("output") {
        let mut file = File::create(dot_filename)?;
        file.write_all(cg.to_dot().as_bytes())?;
        log::info!("dot output written in {:?}", dot_filename);
    }

    Ok(())
}
