use chrono::Utc;
use relaycheck::lens::utils::OutputFormat;
use relaycheck::{CacheStatus, RangeCache, RelaycheckConfig};

pub fn run(config: &RelaycheckConfig, output_format: OutputFormat) -> bool {
    let cache = match RangeCache::from_config(config) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("ERROR: unable to open range cache: {}", e);
            return false;
        }
    };

    // Warm from the local copy when it is fresh; never fetch just for status
    if cache.file_cache().is_fresh(Utc::now(), cache.max_age()) {
        if let Err(e) = cache.ensure_fresh(Utc::now()) {
            eprintln!("WARNING: unable to load local range copy: {}", e);
        }
    }

    let status = cache.status();
    match output_format.to_json(&status) {
        Some(json) => println!("{}", json),
        None => println!("{}", format_text(&status)),
    }
    true
}

fn format_text(status: &CacheStatus) -> String {
    let format_time = |t: Option<chrono::DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    };

    [
        format!("Source URL:         {}", status.source_url),
        format!(
            "Prefixes:           {} ({} IPv4, {} IPv6)",
            status.prefix_count, status.ipv4_count, status.ipv6_count
        ),
        format!("Last Refreshed:     {}", format_time(status.last_refreshed)),
        format!("Local Copy:         {}", status.local_copy_path),
        format!(
            "Local Copy Fetched: {}",
            format_time(status.local_copy_modified)
        ),
        format!("Max Age:            {} seconds", status.max_age_secs),
    ]
    .join("\n")
}
