use pointsworks::prelude::PwResult;
use pointsworks::{cli, pw_pta};

fn main() -> PwResult<()> {
    let args = cli::pta().get_matches();
    pw_pta::run(&args)
}
