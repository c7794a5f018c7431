//! v3cli - cloud control-plane API client
//!
//! Every command is generated at runtime from the operation catalog.

mod catalog;
mod cli;
mod client;
mod commands;
mod config;
mod error;
mod output;


use anyhow::Result;
use std::env;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use catalog::Catalog;
use client::HttpClient;
use config::Settings;
use output::{ErrorReport, Output};

/// Log directives that use warn for this crate and error for everything else.
const DEFAULT_LOG_DIRECTIVES: &str = "v3cli=warn,error";

/// Log directives that use debug for this crate and info for everything else.
const DEBUG_LOG_DIRECTIVES: &str = "v3cli=debug,info";

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    // .env must be loaded before the environment is read
    let env_loaded = config::load_env();
    let settings = Settings::from_env();
    let out = Output::new(settings.agent);

    let result = match env_loaded {
        Ok(()) => start(&settings, &args, &out).await,
        Err(e) => Err(e),
    };

    let code = result
        .unwrap_or_else(|e| out.error(ErrorReport::new("INTERNAL", &format!("{:#}", e))));
    std::process::exit(code);
}

async fn start(settings: &Settings, args: &[String], out: &Output) -> Result<i32> {
    setup_tracing(settings)?;

    let catalog = Catalog::load(settings)?;
    let client = HttpClient::new(settings)?;

    Ok(cli::run(&catalog, args, &client, out).await)
}

fn setup_tracing(settings: &Settings) -> Result<()> {
    let filter_layer = {
        let rust_log = env::var("RUST_LOG");
        let directives = rust_log.as_deref().unwrap_or_else(|_| {
            if settings.debug {
                DEBUG_LOG_DIRECTIVES
            } else {
                DEFAULT_LOG_DIRECTIVES
            }
        });

        EnvFilter::builder().parse(directives)?
    };

    // stdout is reserved for results
    let log_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(log_layer)
        .try_init()?;

    Ok(())
}
