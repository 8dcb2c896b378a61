use anyhow::Result;
use clap::ArgMatches;
use log::LevelFilter;
use std::path::PathBuf;

use regserve_cli::cli::build_cli;
use regserve_cli::client::RegistryClient;
use regserve_cli::config::ServerConfig;
use regserve_cli::driver::{self, DriverOptions};
use regserve_cli::server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("REGSERVE_LOG", "error,regserve=info"))
        .init();

    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("serve", sub_m)) => handle_serve(sub_m).await,
        Some(("drive", sub_m)) => handle_drive(sub_m).await,
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

async fn handle_serve(matches: &ArgMatches) -> Result<()> {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    match config_path {
        Some(path) => log::info!("[regserve::serve] Using config: {:?}", path),
        None => log::info!("[regserve::serve] No config provided; using defaults."),
    }

    let config = ServerConfig::from_arguments(config_path, matches)?;
    match server::serve(&config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            log::error!("Server failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

async fn handle_drive(matches: &ArgMatches) -> Result<()> {
    let url = matches
        .get_one::<String>("url")
        .cloned()
        .unwrap_or_else(|| regserve_cli::cli::DEFAULT_URL.to_string());
    let options = DriverOptions {
        models: matches.get_one::<usize>("models").copied().unwrap_or(2),
        ..DriverOptions::default()
    };

    let client = RegistryClient::new(url)?;
    log::info!(
        "[regserve::drive] Fitting {} model(s) against {}",
        options.models,
        client.base_url()
    );

    let report = driver::run(&client, &options).await;
    for line in driver::render(&report) {
        println!("{}", line);
    }

    if !report.all_succeeded() {
        std::process::exit(1)
    }
    Ok(())
}
