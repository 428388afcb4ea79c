use relaycheck::lens::utils::OutputFormat;
use relaycheck::RelaycheckConfig;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: String,
    data_dir: &'a str,
    ranges_url: &'a str,
    ranges_cache_path: String,
    ranges_cache_ttl_secs: u64,
    fetch_timeout_secs: u64,
    lookup_url: &'a str,
    bind_address: String,
}

pub fn run(config: &RelaycheckConfig, config_path: Option<&str>, output_format: OutputFormat) {
    let info = ConfigInfo {
        config_file: config_path
            .map(str::to_string)
            .unwrap_or_else(RelaycheckConfig::config_file_path),
        data_dir: &config.data_dir,
        ranges_url: &config.ranges_url,
        ranges_cache_path: config.ranges_cache_path(),
        ranges_cache_ttl_secs: config.ranges_cache_ttl_secs,
        fetch_timeout_secs: config.fetch_timeout_secs,
        lookup_url: &config.lookup_url,
        bind_address: config.bind_address(),
    };

    match output_format.to_json(&info) {
        Some(json) => println!("{}", json),
        None => {
            println!("Config File:        {}", info.config_file);
            println!("{}", config.summary());
        }
    }
}
