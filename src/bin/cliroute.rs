// src/bin/cliroute.rs

use anyhow::Result;
use cliroute::{
    CancellationToken, Program,
    cli::Cli,
    core::{config_loader, discovery::HandlerTable},
};
use clap::Parser;
use colored::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The main entry point of the `cliroute` binary.
/// It sets up logging and Ctrl+C handling, builds the program from its root
/// and exits with the program's exit code.
#[tokio::main]
async fn main() {
    let cancellation_token = Arc::new(AtomicBool::new(false));
    env_logger::init();

    let cli = Cli::parse();
    log::debug!("CLI args parsed: {:?}", cli);

    {
        let token = cancellation_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::debug!("Ctrl+C received, cancelling");
                token.store(true, Ordering::SeqCst);
            }
        });
    }

    let program = match build_program(&cli, cancellation_token) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("\n{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    };

    let code = program.main(&cli.args).await;
    std::process::exit(code);
}

/// Loads `cli.toml` and the command manifests from the program root.
fn build_program(cli: &Cli, cancellation_token: CancellationToken) -> Result<Program> {
    let root = match &cli.root {
        Some(root) => config_loader::expand_path(root)?,
        None => std::env::current_dir()?,
    };

    let mut program = Program::load(&root)?;
    if let Some(name) = &cli.name {
        program.set_name(name);
    }
    program.set_cancellation_token(cancellation_token);
    program.discover(&HandlerTable::new())?;
    Ok(program)
}
