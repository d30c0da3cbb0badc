use pointsworks::prelude::PwResult;
use pointsworks::{cli, pw_callgraph};

fn main() -> PwResult<()> {
    let args = cli::callgraph().get_matches();
    pw_callgraph::run(&args)
}
