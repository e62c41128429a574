// crates/receipt-relay-cli/src/main.rs
// ============================================================================
// Module: Receipt Relay CLI Entry Point
// Description: Command dispatcher for one-shot processing and operator tooling.
// Purpose: Run the receipt pipeline and manage keys and configuration.
// Dependencies: clap, receipt-relay-config, receipt-relay-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! `receipt-relay` exposes the pipeline to a queue consumer or an operator:
//!
//! - `process` decrypts and delivers one envelope, prints the disposition as
//!   JSON and exits `0` (accepted), `65` (quarantined) or `75` (retry).
//! - `encrypt` produces a token the configured key accepts.
//! - `generate-key` prints a fresh key.
//! - `check-config` loads, validates and builds the configuration.
//!
//! Security posture: envelope bodies are untrusted and read with a size cap.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod telemetry;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use receipt_relay_config::RelayConfig;
use receipt_relay_core::Disposition;
use receipt_relay_core::EncryptedEnvelope;
use receipt_relay_core::ReceiptCipher;
use thiserror::Error;
use tracing::info;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of an envelope or plaintext input.
const MAX_INPUT_BYTES: usize = 1024 * 1024;
/// Exit code for quarantined envelopes (`EX_DATAERR`).
const EXIT_QUARANTINED: u8 = 65;
/// Exit code for envelopes to redeliver (`EX_TEMPFAIL`).
const EXIT_RETRY: u8 = 75;
/// Input path meaning standard input.
const STDIN_PATH: &str = "-";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "receipt-relay", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file path (overrides `RECEIPT_RELAY_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Process one encrypted envelope and print its disposition.
    Process(ProcessCommand),
    /// Encrypt a plaintext payload with the configured key.
    Encrypt(EncryptCommand),
    /// Print a freshly generated key.
    GenerateKey,
    /// Load and validate configuration.
    CheckConfig,
}

/// Arguments for `process`.
#[derive(clap::Args, Debug)]
struct ProcessCommand {
    /// Envelope body file, or `-` for stdin.
    #[arg(long, value_name = "PATH", default_value = STDIN_PATH)]
    input: PathBuf,
    /// Transport correlation id (the message's tx_id header).
    #[arg(long, value_name = "ID")]
    correlation_id: Option<String>,
    /// Transport `x-delivery-count` header value.
    #[arg(long, value_name = "COUNT")]
    delivery_count: Option<String>,
}

/// Arguments for `encrypt`.
#[derive(clap::Args, Debug)]
struct EncryptCommand {
    /// Plaintext file, or `-` for stdin.
    #[arg(long, value_name = "PATH", default_value = STDIN_PATH)]
    input: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for operator-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Bounded read failures.
#[derive(Debug)]
enum ReadLimitError {
    /// Underlying I/O failure.
    Io(io::Error),
    /// Input exceeded the limit.
    TooLarge {
        /// Bytes observed.
        size: u64,
        /// Configured limit.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(command) => command_process(config_path, &command),
        Commands::Encrypt(command) => command_encrypt(config_path, &command),
        Commands::GenerateKey => command_generate_key(),
        Commands::CheckConfig => command_check_config(config_path),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Processes one envelope.
fn command_process(config_path: Option<&Path>, command: &ProcessCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    telemetry::init(&config.logging).map_err(|err| CliError::new(err.to_string()))?;
    let pipeline = config.build_pipeline().map_err(|err| CliError::new(err.to_string()))?;
    let body = read_input(&command.input)?;
    let envelope = EncryptedEnvelope::from_headers(
        body,
        command.correlation_id.as_deref(),
        command.delivery_count.as_deref(),
    );
    let disposition = pipeline.process(&envelope);
    let json = serde_json::to_string(&disposition)
        .map_err(|err| CliError::new(format!("failed to encode disposition: {err}")))?;
    write_stdout_line(&json).map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::from(exit_status(&disposition)))
}

/// Encrypts a plaintext payload.
fn command_encrypt(config_path: Option<&Path>, command: &EncryptCommand) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    let cipher = config.cipher().map_err(|err| CliError::new(err.to_string()))?;
    let plaintext = read_input(&command.input)?;
    write_stdout_line(&cipher.encrypt(&plaintext)).map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints a new key.
fn command_generate_key() -> CliResult<ExitCode> {
    let key = ReceiptCipher::generate_key();
    write_stdout_line(key.expose()).map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Validates configuration and builds every component.
fn command_check_config(config_path: Option<&Path>) -> CliResult<ExitCode> {
    let config = load_config(config_path)?;
    telemetry::init(&config.logging).map_err(|err| CliError::new(err.to_string()))?;
    config.build_pipeline().map_err(|err| CliError::new(err.to_string()))?;
    info!(
        legacy_host = %config.legacy.host,
        gateway_url = %config.gateway.url,
        skip_delivery = config.skip_delivery(),
        max_attempts = config.retry.max_attempts,
        "configuration valid"
    );
    write_stdout_line("config ok").map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(path: Option<&Path>) -> CliResult<RelayConfig> {
    RelayConfig::load(path).map_err(|err| CliError::new(err.to_string()))
}

/// Maps a disposition onto the process exit status.
const fn exit_status(disposition: &Disposition) -> u8 {
    match disposition {
        Disposition::Accepted => 0,
        Disposition::Quarantined(_) => EXIT_QUARANTINED,
        Disposition::Retry(_) => EXIT_RETRY,
    }
}

/// Reads a file or stdin with the input size cap.
fn read_input(path: &Path) -> CliResult<Vec<u8>> {
    let result = if path == Path::new(STDIN_PATH) {
        read_with_limit(io::stdin().lock(), MAX_INPUT_BYTES)
    } else {
        File::open(path)
            .map_err(ReadLimitError::Io)
            .and_then(|file| read_with_limit(file, MAX_INPUT_BYTES))
    };
    result.map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "input {} is too large ({size} bytes, limit {limit})",
            path.display()
        )),
    })
}

/// Reads at most `max_bytes`, failing when the source holds more.
fn read_with_limit(reader: impl Read, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    let mut bytes = Vec::new();
    reader.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> io::Result<()> {
    let mut stderr = io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &io::Error) -> CliError {
    CliError::new(format!("failed to write {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
