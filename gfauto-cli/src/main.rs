// Copyright (c) The gfauto-rs Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod dispatch;
mod tools;

use clap::Parser;
use color_eyre::eyre::Result;
use dispatch::GfautoCli;

fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("GFAUTO_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    color_eyre::install()?;
    init_logging();

    let cli = GfautoCli::parse();
    match cli.exec() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            tracing::error!(%error, "gfauto failed");
            std::process::exit(1)
        }
    }
}
