use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;
use wmbus_rx::logging::init_logger_with_level;
use wmbus_rx::util::hex::{decode_hex, encode_hex, parse_hex_lenient};
use wmbus_rx::wmbus::block::strip_any;
use wmbus_rx::wmbus::encoding::encode_3of6;
use wmbus_rx::wmbus::radio::transceiver::parse_capture_file;
use wmbus_rx::{
    decode_capture_with, log_info, DecodePolicy, RadioHandle, ReceiverConfig, ReplayTransceiver,
};

/// Air gap between replayed captures
const REPLAY_PACING: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(name = "wmbus-rx")]
#[command(about = "Wireless M-Bus capture decoding and replay")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Finalize raw captures and print their text records
    Decode {
        /// Raw captures in hex; separators between bytes are ignored
        #[arg(required = true)]
        captures: Vec<String>,
        /// RSSI attached to every capture, in dBm
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        rssi: i8,
        /// Accept Format B frames without checking their CRCs
        #[arg(long)]
        lenient_b: bool,
    },
    /// 3-of-6 encode a DLL frame
    Encode { hex: String },
    /// Strip DLL CRCs, trying Format A then Format B
    Strip { hex: String },
    /// Run a capture file through the full receive pipeline
    Replay {
        file: PathBuf,
        /// JSON receiver configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger_with_level(if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    match cli.command {
        Commands::Decode {
            captures,
            rssi,
            lenient_b,
        } => {
            let policy = DecodePolicy {
                verify_format_b_crc: !lenient_b,
                ..DecodePolicy::default()
            };
            for capture in captures {
                let raw = parse_hex_lenient(&capture)
                    .with_context(|| format!("invalid capture hex: {capture}"))?;
                match decode_capture_with(&raw, rssi, &policy) {
                    Ok(frame) => print!("{}", frame.as_rtlwmbus()),
                    Err(rejected) => println!(
                        "rejected: {} (mode {}, want {}, got {}, raw {})",
                        rejected.reason,
                        rejected.link_mode,
                        rejected.want_len,
                        rejected.got_len,
                        rejected.raw_len
                    ),
                }
            }
        }
        Commands::Encode { hex } => {
            let data = decode_hex(&hex).context("invalid frame hex")?;
            println!("{}", encode_hex(&encode_3of6(&data)));
        }
        Commands::Strip { hex } => {
            let data = decode_hex(&hex).context("invalid frame hex")?;
            let (telegram, format) = strip_any(&data).context("DLL CRC strip failed")?;
            println!("{format}: {}", encode_hex(&telegram));
        }
        Commands::Replay { file, config } => {
            let config = match config {
                Some(path) => ReceiverConfig::from_json_file(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?,
                None => ReceiverConfig::default(),
            };
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let captures = parse_capture_file(&text)?;
            log_info(&format!("Replaying {} captures", captures.len()));

            let radio = ReplayTransceiver::new(captures).with_pacing(REPLAY_PACING);
            let mut handle =
                RadioHandle::start(radio, config).context("invalid receiver configuration")?;
            handle.add_frame_handler(|frame| {
                print!("{}", frame.as_rtlwmbus());
                frame.mark_handled();
            });
            handle.run_until_closed().await;

            let summary = handle.diagnostics().summary();
            println!("{}", serde_json::to_string(&summary)?);
            println!("{}", serde_json::to_string(&handle.rx_stats())?);
        }
    }

    Ok(())
}
