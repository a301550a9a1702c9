#![allow(clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;
use jobboard_cli::{JobboardCli, init_tracing, reauth_redirect, run};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(JobboardCli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            if let Some(url) = reauth_redirect(&error) {
                eprintln!("sign in again: jobboard login, then continue via {url}");
            }
            ExitCode::FAILURE
        }
    }
}
