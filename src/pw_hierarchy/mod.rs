use crate::prelude::*;
use crate::program;
use clap::ArgMatches;
use std::fs::File;
use std::io::Write;

pub fn run(args: &ArgMatches) -> PwResult<()> {
    init_logger(args);

    let repo = program::open(args)?;
    if let Some(dot_filename) = args.get_one::<String>("output") {
        let mut file = File::create(dot_filename)?;
        file.write_all(repo.hierarchy().to_dot().as_bytes())?;
        log::info!("dot output written in {:?}", dot_filename);
    }
    Ok(())
}
