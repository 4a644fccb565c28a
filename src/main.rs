//! Runs one search batch from a JSON file and prints the result bag.
//!
//! ```text
//! contentsearch <batch.json> [requester-id]
//! contentsearch --about
//! ```
//! Every batch runs as a requester (0 is anonymous) with permissions applied;
//! the unrestricted path is only available to code linking the library.
//! Settings come from `contentsearch.toml` and `CONTENTSEARCH_*` variables;
//! `RUST_LOG` overrides the configured log filter. Logs go to stderr.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use contentsearch::config::SearcherConfig;
use contentsearch::error::{Result, SearchError};
use contentsearch::persist::{PersistenceMode, Store};
use contentsearch::registry;
use contentsearch::request::SearchRequests;
use contentsearch::search::Searcher;

const USAGE: &str = "usage: contentsearch <batch.json> [requester-id] | --about";

fn main() -> ExitCode {
    let config = match SearcherConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(config, &args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, caller = e.is_caller_error(), "search failed");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: SearcherConfig, args: &[String]) -> Result<String> {
    let (path, requester) = match args {
        [flag] if flag == "--about" => return Ok(serde_json::to_string_pretty(&registry::standard().about())?),
        [path] => (path, 0),
        [path, requester] => {
            let requester = requester
                .parse::<i64>()
                .map_err(|e| SearchError::Config(format!("requester id '{requester}': {e}")))?;
            (path, requester)
        }
        _ => return Err(SearchError::Config(USAGE.to_string())),
    };
    let text = std::fs::read_to_string(path).map_err(|e| SearchError::Config(format!("cannot read {path}: {e}")))?;
    let batch: SearchRequests = serde_json::from_str(&text)?;

    info!(database = %config.database, requests = batch.requests.len(), "running search batch");
    let store = Store::new(PersistenceMode::File(config.database.clone()), config.pool_size)?;
    let searcher = Searcher::new(Arc::new(store), config);
    let bag = searcher.search(&batch, requester)?;
    Ok(serde_json::to_string_pretty(&bag)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn permissions_cannot_be_switched_off_from_the_command_line() {
        let result = run(SearcherConfig::default(), &args(&["--unrestricted", "batch.json"]));
        assert!(matches!(result, Err(SearchError::Config(message)) if message.contains("requester id")));
    }

    #[test]
    fn about_lists_the_types() {
        let about = run(SearcherConfig::default(), &args(&["--about"])).expect("about");
        assert!(about.contains("\"page\""));
        assert!(matches!(run(SearcherConfig::default(), &args(&[])), Err(SearchError::Config(_))));
    }
}
