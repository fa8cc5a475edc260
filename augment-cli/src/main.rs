// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use augment_cli::resize;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Resize(resize::ResizeArgs),
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Resize(resize_args)) => resize::resize(resize_args),
        None => {}
    }
}
