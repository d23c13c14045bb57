use clap::Parser;
use pansim::runner::{run_with_args, Args};

fn main() {
    let args = Args::parse();
    if let Err(error) = run_with_args(&args) {
        eprintln!("{error}");
        std::process::exit(1);
    }
}
