use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use hod::io_utils::{hod_cli_error, simple_cli_error, CliError};
use hod::{
    Config, DecodeOptions, EncodeOptions, EncodeReport, HashAlgorithm, HashCheck, Pipeline,
    Registry,
};

/// Convert files to symbolic keymaps and back.
#[derive(Parser)]
#[command(name = "hod", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a file into a keymap
    Encode {
        /// File to encode
        input: PathBuf,
        /// Keymap to write (.hod for JSON, .conf for sections)
        output: PathBuf,
        /// Strategy: rle, fibonacci or power
        #[arg(short, long)]
        strategy: Option<String>,
        /// Record a file hash: sha256, sha512 or md5
        #[arg(long = "hash", value_name = "ALGO")]
        hash: Option<HashAlgorithm>,
        /// Sign the payload with this passphrase
        #[arg(short, long, env = "HOD_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
        /// Keymap format name, overriding the output extension
        #[arg(short, long)]
        format: Option<String>,
        /// Show a progress bar while reading the input
        #[arg(long)]
        progress: bool,
    },
    /// Rebuild the original file from a keymap
    Decode {
        /// Keymap to read
        input: PathBuf,
        /// File to write
        #[arg(required_unless_present = "show_payload")]
        output: Option<PathBuf>,
        /// Passphrase the keymap was signed with
        #[arg(short, long, env = "HOD_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
        /// Print the payload instead of writing a file
        #[arg(long)]
        show_payload: bool,
    },
    /// List available strategies and formats
    List,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let registry = Registry::builtin();
    let pipeline = Pipeline::new(registry, Config::default());

    match cli.command {
        Command::Encode {
            input,
            output,
            strategy,
            hash,
            passphrase,
            format,
            progress,
        } => {
            let opts = EncodeOptions {
                strategy: strategy.as_deref(),
                hash_algorithm: hash,
                passphrase: passphrase.as_deref(),
                format: format.as_deref(),
            };
            let report = if progress {
                encode_with_progress(&pipeline, &input, &output, &opts)
            } else {
                pipeline.encode_file(&input, &output, &opts)
            }
            .map_err(|e| hod_cli_error("encode failed", e))?;
            let km = &report.keymap;
            eprintln!(
                "Encoded {} ({} bytes) -> {} [strategy {}, format {}{}{}]",
                input.display(),
                km.input_size_bytes.unwrap_or_default(),
                output.display(),
                km.strategy_name,
                report.format,
                km.integrity
                    .hash_algorithm
                    .as_deref()
                    .map(|a| format!(", {a} hash"))
                    .unwrap_or_default(),
                if km.is_signed() { ", signed" } else { "" },
            );
        }
        Command::Decode {
            input,
            output,
            passphrase,
            show_payload,
        } => {
            if show_payload {
                let text = pipeline
                    .preview_file(&input, passphrase.as_deref())
                    .map_err(|e| hod_cli_error("decode failed", e))?;
                print!("{text}");
                return Ok(());
            }
            let output = output.ok_or_else(|| {
                simple_cli_error("an output path is required unless --show-payload is given")
            })?;
            let opts = DecodeOptions {
                passphrase: passphrase.as_deref(),
            };
            let report = pipeline
                .decode_file(&input, &output, &opts)
                .map_err(|e| hod_cli_error("decode failed", e))?;
            let hash = match &report.hash {
                HashCheck::NotRecorded => "not recorded".to_string(),
                HashCheck::Match { algorithm } => format!("{algorithm} verified"),
                HashCheck::Mismatch { algorithm, .. } => format!("{algorithm} MISMATCH"),
                HashCheck::Unsupported { algorithm } => format!("{algorithm} unsupported"),
            };
            eprintln!(
                "Decoded {} -> {} ({} bytes, file hash {hash})",
                input.display(),
                output.display(),
                report.bytes_written
            );
        }
        Command::List => {
            println!("Strategies:");
            for name in registry.strategy_names() {
                println!("  {name}");
            }
            println!("Formats:");
            for format in registry.formats() {
                println!("  {} ({})", format.name(), format.extension());
            }
        }
    }
    Ok(())
}

/// Encode through a progress bar sized to the input file.
fn encode_with_progress(
    pipeline: &Pipeline,
    input: &Path,
    output: &Path,
    opts: &EncodeOptions,
) -> hod::Result<EncodeReport> {
    let bar = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} [{bar:40}] {bytes}/{total_bytes} ({eta})")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    let report = pipeline.encode_file_with(input, output, opts, |file, len| {
        bar.set_length(len);
        bar.wrap_read(file)
    });
    bar.finish_and_clear();
    report
}
