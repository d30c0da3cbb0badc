use crate::prelude::*;
use crate::program;
use clap::ArgMatches;
use pw_analysis::repo::ValueUid;
use std::path::PathBuf;

pub fn run(args: &ArgMatches) -> PwResult<()> {
    init_logger(args);

    let mut repo = program::open(args)?;
    let mut entries = Vec::new();
    for signature in program::entries(args) {
        let method = repo
            .get_method(&signature)
            .ok_or_else(|| PwError::BadArguments(format!("unknown entry method {signature}")))?;
        entries.push(method.uid());
    }
    let dummy_main = repo.create_dummy_main(&entries)?;

    let k_limit = *args
        .get_one::<usize>("k")
        .ok_or_else(|| PwError::BadArguments("--k-limit needed".to_string()))?;
    let output_directory = args
        .get_one::<String>("output-dir")
        .map_or_else(|| PathBuf::from("out/"), PathBuf::from);
    let mut config = PointerAnalysisConfig::new(k_limit, output_directory);
    config.dot_dump = args.get_flag("dot-dump");
    config.unhandled_func_dump = args.get_flag("unhandled-dump");
    config.detect_type_diff = args.get_flag("type-diff");

    let model: Box<dyn FrameworkModel> = if args.get_flag("no-framework") {
        Box::new(NoFrameworkModel)
    } else {
        Box::new(ArkUiModel)
    };
    let repo = &repo;
    let pta = PointerAnalysis::for_whole_program(repo, dummy_main, config, model)?;
    log::info!(
        "{} functions handled, {} left unhandled",
        pta.handled_funcs().len(),
        pta.unhandled_funcs().len()
    );

    for query in args.get_many::<String>("points-to").into_iter().flatten() {
        let value = local_of(repo, query)?;
        let pag = pta.pag();
        println!("{query}:");
        for pt in pta.points_to(value).iter() {
            println!("    {}", pag.display_value(pag[pt].value()));
        }
    }

    if args.get_flag("type-diff") {
        let pag = pta.pag();
        for (value, types) in pta.type_diff_map() {
            let types: Vec<String> = types.iter().map(ToString::to_string).collect();
            println!("{}: {}", pag.display_value(*value), types.join(", "));
        }
    }
    Ok(())
}

/// Resolves a `Class.method:local` query.
fn local_of(repo: &Repo, query: &str) -> PwResult<ValueUid> {
    let (method, local) = query
        .rsplit_once(':')
        .ok_or_else(|| PwError::BadArguments(format!("{query}: expected Class.method:local")))?;
    repo.get_method(&MethodSignature::parse(method))
        .and_then(|method| method.get_local(local))
        .ok_or_else(|| PwError::BadArguments(format!("{query}: unknown local")))
}
