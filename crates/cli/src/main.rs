use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use flashtrace::commands::{flash_map_command, fw_map_command, FlashMapOptions};
use flashtrace::logging::init_logging;
use flashtrace_core::config::parse_address;

/// Flash-primitive call-site mapper for native x86 executables.
///
/// This CLI is a thin wrapper around `flashtrace-core` (exposed in code as
/// `flashtrace_core`). All substantive logic lives in the library.
#[derive(Parser, Debug)]
#[command(
    name = "flashtrace",
    version,
    about = "Map flash-primitive call sites in native x86 executables",
    long_about = None
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, default_value_t = false, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find calls to the configured flash primitives and group them per function.
    ///
    /// Prints `rows=.. functions=.. candidates=..` followed by one line per
    /// candidate function.
    FlashMap {
        /// Path to the executable to analyze.
        #[arg(long)]
        exe: String,

        /// Optional YAML/JSON config (targets, prologue, windows, magic constant).
        #[arg(long)]
        config: Option<String>,

        /// Override or add a target primitive, e.g. `flash_read8=0x55c8cc`. Repeatable.
        #[arg(long = "target", value_name = "NAME=ADDRESS")]
        targets: Vec<String>,

        /// Optional path to write the full JSON report.
        #[arg(long)]
        json_out: Option<String>,

        /// Number of trailing instructions inspected for operand hints.
        #[arg(long)]
        hint_window: Option<usize>,

        /// Maximum backward distance searched for a function prologue (hex or decimal).
        #[arg(long, value_parser = parse_window)]
        prologue_window: Option<u64>,
    },

    /// Pair legacy firmware template names with MCU part numbers.
    FwMap {
        /// Path to the executable to scan for wide strings.
        #[arg(long)]
        exe: String,

        /// Optional YAML/JSON config with the block anchor strings.
        #[arg(long)]
        config: Option<String>,

        /// Optional path to write the JSON mapping.
        #[arg(long)]
        json_out: Option<String>,
    },
}

fn parse_window(value: &str) -> Result<u64, String> {
    parse_address(value).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);
    tracing::debug!(core_version = flashtrace_core::version(), "flashtrace starting");

    match cli.command {
        Command::FlashMap { exe, config, targets, json_out, hint_window, prologue_window } => {
            let opts =
                FlashMapOptions { exe, config, targets, json_out, hint_window, prologue_window };
            flash_map_command(&opts)?;
        }
        Command::FwMap { exe, config, json_out } => {
            fw_map_command(&exe, config.as_deref(), json_out.as_deref())?;
        }
    }

    Ok(())
}
