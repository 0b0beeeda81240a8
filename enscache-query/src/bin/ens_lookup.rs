//! Resolve ENS names through the local cache and the HTTP resolver.
//!
//! ```text
//! ens_lookup [--cache-first] <name>...
//! ```
//!
//! Prints one JSON object per name. Configuration comes from `ENSCACHE_*`
//! environment variables.

use std::process::ExitCode;
use std::sync::Arc;

use enscache_core::{EnsCacheConfig, EnsCacheResult};
use enscache_query::{init_tracing, EnsQueries, FetchOptions, HttpEnsResolver, QueryClient};
use enscache_storage::open_ens_store;
use serde_json::json;

const USAGE: &str = "usage: ens_lookup [--cache-first] <name>...";

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing("info") {
        eprintln!("{}", e);
    }

    let mut options = FetchOptions::default();
    let mut names = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--cache-first" => options.cache_first = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return ExitCode::SUCCESS;
            }
            flag if flag.starts_with("--") => {
                eprintln!("unknown flag: {}\n{}", flag, USAGE);
                return ExitCode::FAILURE;
            }
            _ => names.push(arg),
        }
    }
    if names.is_empty() {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    }

    match run(&names, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ens_lookup: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(names: &[String], options: FetchOptions) -> EnsCacheResult<()> {
    let config = EnsCacheConfig::from_env();
    let store = open_ens_store(&config)?;
    let resolver = Arc::new(HttpEnsResolver::new(&config)?);
    let queries = EnsQueries::new(store.clone(), QueryClient::new(), resolver)
        .with_stale_time(config.stale_time);

    tracing::info!(
        store_path = %config.store_path.display(),
        names = names.len(),
        cache_first = options.cache_first,
        "Looking up ENS names"
    );

    for name in names {
        let (address, avatar) = tokio::join!(
            queries.fetch_ens_address(name, options),
            queries.fetch_ens_avatar(name, options),
        );
        let output = json!({
            "name": name,
            "address": address?,
            "avatar": avatar?.and_then(|image| image.image_url),
        });
        println!("{}", output);
    }

    // Persist resolver answers before exiting.
    store.flush().await?;
    if store.failed_writes() > 0 {
        tracing::warn!(failed = store.failed_writes(), "Some cache writes failed");
    }
    Ok(())
}
