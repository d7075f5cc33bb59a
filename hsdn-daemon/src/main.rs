//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

mod config;

use clap::{App, Arg};
use config::Config;
use hsdn_utils::ibus;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

fn init_tracing(config: &config::Logging) {
    let env_filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("hsdn=debug".parse().unwrap())
        .from_env_lossy();

    let stdout = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(config.show_source)
        .with_line_number(config.show_source)
        .with_ansi(config.colors);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout)
        .init();
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Hybrid SDN controller daemon")
        .version(clap::crate_version!())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("file")
                .help("Specify an alternative configuration file."),
        )
        .get_matches();

    // Read configuration file.
    let config_file = matches.value_of("config");
    let config = Config::load(config_file);

    // Initialize tracing.
    init_tracing(&config.logging);

    // Set panic handler to abort the process if any child task panics.
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));

    // We're ready to go!
    info!("starting up");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(async {
            run(config).await;
        });
}

async fn run(config: Config) {
    // Create the inter-component bus and wire up the components.
    let (ibus_tx, ibus_rx) = ibus::ibus_channels();

    if let Err(err) = hsdn_netconf::start(
        ibus_tx.clone(),
        ibus_rx.netconf,
        config.paths.netconf_devices.clone().into(),
    ) {
        error!(%err, path = %config.paths.netconf_devices,
            "failed to read the NETCONF device file");
        std::process::exit(1);
    }
    hsdn_openflow::start(
        ibus_tx.clone(),
        ibus_rx.openflow,
        config.openflow_listen.clone(),
        config.paths.sdn_labels.into(),
    );
    hsdn_topology::start(ibus_tx.clone(), ibus_rx.topology);
    hsdn_policy::start(
        ibus_tx.clone(),
        ibus_rx.policy,
        config.paths.policies.into(),
    );
    hsdn_generator::start(ibus_tx.clone(), ibus_rx.generator);
    hsdn_api::start(ibus_tx, ibus_rx.api, config.facade_url);

    // Run until interrupted.
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to wait for interrupt signal");
    }
    info!("shutting down");
}
