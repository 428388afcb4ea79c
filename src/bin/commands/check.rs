use clap::Args;
use relaycheck::lens::relay::RelayLens;
use relaycheck::lens::utils::OutputFormat;
use relaycheck::{IpLens, RangeCache, RelaycheckConfig};
use std::sync::Arc;

/// Arguments for the Check command
#[derive(Args)]
pub struct CheckArgs {
    /// IP address to check
    #[clap(value_name = "IP")]
    pub ip: String,

    /// Skip the registration/geolocation lookup
    #[clap(long)]
    pub no_lookup: bool,
}

pub fn run(config: &RelaycheckConfig, args: CheckArgs, output_format: OutputFormat) -> bool {
    let CheckArgs { ip, no_lookup } = args;

    let cache = match RangeCache::from_config(config) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            eprintln!("ERROR: unable to open range cache: {}", e);
            return false;
        }
    };

    let lens = if no_lookup {
        RelayLens::without_lookup(cache)
    } else {
        let ip_lens = IpLens::new(config.lookup_url.clone(), config.fetch_timeout());
        RelayLens::new(cache, Arc::new(ip_lens))
    };

    match lens.check(&ip) {
        Ok(result) => {
            println!("{}", lens.format_result(&result, &output_format));
            true
        }
        Err(e) if e.is_invalid_address() => {
            eprintln!("ERROR: please provide a valid IP address: {}", ip);
            false
        }
        Err(e) => {
            eprintln!("ERROR: unable to check address: {}", e);
            false
        }
    }
}
