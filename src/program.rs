use crate::prelude::*;
use clap::ArgMatches;
use std::path::Path;

/// Loads every `--input` program description into a closed repository.
pub fn open(args: &ArgMatches) -> PwResult<Repo> {
    let inputs: Vec<&String> = args
        .get_many::<String>("input")
        .ok_or_else(|| PwError::BadArguments("--input needed".to_string()))?
        .collect();
    for input in &inputs {
        let path = Path::new(input.as_str());
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => (),
            _ => {
                return Err(PwError::BadArguments(format!(
                    "{input}: unknown file extension"
                )))
            }
        }
    }
    let repo = Repo::from_json_files(&inputs)?;
    log::info!(
        "{} classes and {} methods loaded",
        repo.nb_classes(),
        repo.nb_methods()
    );
    Ok(repo)
}

/// Parses every `--entry` as a `Class.method` signature.
#[must_use]
pub fn entries(args: &ArgMatches) -> Vec<MethodSignature> {
    args.get_many::<String>("entry")
        .map(|entries| entries.map(|entry| MethodSignature::parse(entry)).collect())
        .unwrap_or_default()
}
