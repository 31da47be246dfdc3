// Copyright 2025 Kraze Maintainers.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use clap::Parser;
use kraze::cli::{commands::Commands, CliArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.command);

    let result = match &args.command {
        Commands::Up(cmd) => cmd.execute().await,
        Commands::Down(cmd) => cmd.execute().await,
        Commands::Status(cmd) => cmd.execute().await,
        Commands::PortForward(cmd) => cmd.execute().await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(command: &Commands) {
    let (verbose, quiet) = match command {
        Commands::Up(c) => (c.common.verbose, c.common.quiet),
        Commands::Down(c) => (c.common.verbose, c.common.quiet),
        Commands::Status(c) => (c.common.verbose, c.common.quiet),
        Commands::PortForward(c) => (c.common.verbose, c.common.quiet),
    };

    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}
