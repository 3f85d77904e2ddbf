use clap::Parser;
use std::{io::IsTerminal, process::ExitCode};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use sqlikv::Cli;

const STDIN_BUFFER: usize = 1 << 20;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    std::env::set_var(
        "RUST_LOG",
        format!("info,{}", std::env::var("RUST_LOG").unwrap_or_default()),
    );
    let enable_color = std::env::var("NO_COLOR").is_err();
    // stdout carries the progress line
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(enable_color)
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse_from(sqlikv::normalize_args(std::env::args_os()));
    tracing::debug!("{:?}", args);

    if args.version {
        println!("{}", sqlikv::version());
        return ExitCode::SUCCESS;
    }
    if std::io::stdin().is_terminal() {
        tracing::info!("stdin: no data");
        return ExitCode::SUCCESS;
    }

    let input = BufReader::with_capacity(STDIN_BUFFER, tokio::io::stdin());
    match sqlikv::run(&args, input).await {
        Ok(summary) => {
            tracing::debug!("{:?}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
