#![allow(clippy::all)]
use clap::{Parser, Subcommand};
use clap_markdown;

use augment_cli::resize;

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
    clap_markdown::print_help_markdown::<Cli>();
}
