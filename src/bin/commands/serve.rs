use clap::Args;
use relaycheck::lens::relay::RelayLens;
use relaycheck::server::{start_server, ServerConfig};
use relaycheck::{IpLens, RangeCache, RelaycheckConfig};
use std::sync::Arc;

/// Arguments for the Serve command
#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind to (overrides the configuration file)
    #[clap(short, long)]
    pub address: Option<String>,

    /// Port to listen on (overrides the configuration file)
    #[clap(short, long)]
    pub port: Option<u16>,
}

pub fn run(config: &RelaycheckConfig, args: ServeArgs) -> bool {
    let ServeArgs { address, port } = args;

    let mut server_config = ServerConfig::from_config(config);
    if let Some(address) = address {
        server_config = server_config.with_address(address);
    }
    if let Some(port) = port {
        server_config = server_config.with_port(port);
    }

    let cache = match RangeCache::from_config(config) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            eprintln!("ERROR: unable to open range cache: {}", e);
            return false;
        }
    };
    let ip_lens = IpLens::new(config.lookup_url.clone(), config.fetch_timeout());
    let lens = RelayLens::new(cache, Arc::new(ip_lens));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("ERROR: unable to start async runtime: {}", e);
            return false;
        }
    };

    match runtime.block_on(start_server(lens, server_config)) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("ERROR: server failed: {}", e);
            false
        }
    }
}
