//! Convert a saved clipboard HTML payload to a Markdown file
//!
//! Usage: `cargo run --example convert_file -- [INPUT] [OUTPUT]`
//!
//! Reads INPUT (or stdin when absent) and writes OUTPUT (default
//! `converted_chat.md`). Set `RUST_LOG=debug` to see pipeline events.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::{env, fs, io};

use chat_transcript_markdown::{ConversionError, convert_bytes};
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT: &str = "converted_chat.md";

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut args = env::args_os().skip(1);
    let input = args.next().map(PathBuf::from);
    let output = args
        .next()
        .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT), PathBuf::from);

    let payload = match read_payload(input.as_ref()) {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("Failed to read input: {e}");
            return ExitCode::FAILURE;
        }
    };

    let markdown = match convert_bytes(&payload) {
        Ok(markdown) => markdown,
        Err(ConversionError::EmptyInput) => {
            eprintln!("No HTML found in the input.");
            return ExitCode::FAILURE;
        }
        Err(e @ ConversionError::EmptyResult) => {
            eprintln!("{e}.");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = fs::write(&output, &markdown) {
        eprintln!("Failed to write {}: {e}", output.display());
        return ExitCode::FAILURE;
    }

    println!("Markdown written to {}", output.display());
    ExitCode::SUCCESS
}

fn read_payload(input: Option<&PathBuf>) -> io::Result<Vec<u8>> {
    match input {
        Some(path) => fs::read(path),
        None => {
            let mut payload = Vec::new();
            io::stdin().read_to_end(&mut payload)?;
            Ok(payload)
        }
    }
}
