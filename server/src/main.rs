//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Pipehost host application
//!
//! Runs the IPC server until interrupted, logging every notification. With
//! `--send` it instead acts as a peer for manual testing.

mod cli;

use clap::Parser;
use cli::Cli;
use pipehost_client::PipeClient;
use pipehost_service::{NotificationKind, PipeServer};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    let result = match cli.send.as_deref() {
        Some(text) => send(&cli.channel, text).await,
        None => serve(&cli).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn serve(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let server = Arc::new(PipeServer::new(cli.server_config())?);

    let listener = server.notifications().subscribe_with(|notification| {
        match notification.kind() {
            NotificationKind::ErrorOccurred => warn!("{}", notification),
            _ => info!("{}", notification),
        }
    });

    let run = server.spawn();
    info!(
        "Serving {:?} with {} acceptor(s); Ctrl-C to stop",
        cli.channel,
        server.config().max_acceptors
    );

    let shutdown = {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, stopping");
                server.stop();
            }
        })
    };

    let started = run.await?;
    shutdown.abort();
    let _ = shutdown.await;
    info!("{}", server.snapshot());
    drop(server);
    let _ = listener.await;

    if started {
        Ok(())
    } else {
        Err("server failed to start".into())
    }
}

async fn send(channel: &str, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = PipeClient::connect(channel).await?;
    let response = client.request(text).await?;
    println!("{response}");
    client.close().await?;
    Ok(())
}
