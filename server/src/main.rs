//! Binary entry point for `warden-ls`.
//!
//! Speaks LSP over stdio: requests come in on stdin, responses and
//! server-initiated traffic go out on stdout, and logs stay on stderr so
//! they cannot corrupt the protocol stream.

use std::env;
use std::io;
use std::process::ExitCode;

use tokio::io::{stdin, stdout};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("warden-ls {}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            // The conventional transport flag; stdio is all we speak.
            "--stdio" => {}
            other => eprintln!("warden-ls: ignoring unknown argument {other:?}"),
        }
    }

    init_tracing();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting warden-ls");

    let code = warden_server::run(stdin(), stdout()).await;
    tracing::info!(code, "session over; exiting");
    ExitCode::from(code)
}
