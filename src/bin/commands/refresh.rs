use chrono::Utc;
use clap::Args;
use relaycheck::lens::utils::OutputFormat;
use relaycheck::{RangeCache, RelaycheckConfig};

/// Arguments for the Refresh command
#[derive(Args)]
pub struct RefreshArgs {
    /// Fetch the range list even if the local copy is still fresh
    #[clap(short, long)]
    pub force: bool,
}

pub fn run(config: &RelaycheckConfig, args: RefreshArgs, output_format: OutputFormat) -> bool {
    let RefreshArgs { force } = args;

    let cache = match RangeCache::from_config(config) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("ERROR: unable to open range cache: {}", e);
            return false;
        }
    };

    let result = if force {
        cache.force_refresh()
    } else {
        cache.ensure_fresh(Utc::now())
    };

    match result {
        Ok(outcome) => {
            match output_format.to_json(&outcome) {
                Some(json) => println!("{}", json),
                None => println!("{}", outcome),
            }
            true
        }
        Err(e) => {
            eprintln!("ERROR: unable to refresh range list: {}", e);
            false
        }
    }
}
