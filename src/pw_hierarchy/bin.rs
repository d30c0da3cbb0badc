use pointsworks::prelude::PwResult;
use pointsworks::{cli, pw_hierarchy};

fn main() -> PwResult<()> {
    let args = cli::hierarchy().get_matches();
    pw_hierarchy::run(&args)
}
