//! # TriDH Initiator
//!
//! Connects to a responder, runs the handshake and sends one encrypted message.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::builder::BoolishValueParser;
use clap::Parser;
use rand::rngs::OsRng;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tridh::config::{DEFAULT_KEY_BITS, DEFAULT_MESSAGE, DEFAULT_PRIME_BITS};
use tridh::handshake::{StepGate, TracingObserver};
use tridh::{Initiator, SessionConfig};
use tridhstream::tcp;

#[derive(Parser, Debug)]
#[command(name = "tridh-initiator", about = "Start a TriDH handshake and send one message")]
struct Args {
    /// Responder address
    #[arg(long, default_value = "127.0.0.1:1234")]
    connect: String,

    /// Bit length of the generated prime
    #[arg(long, env = "PRIME_NUMBER_BITS", default_value_t = DEFAULT_PRIME_BITS)]
    prime_bits: u64,

    /// Bits of entropy per private key
    #[arg(long, env = "KEY_BITS", default_value_t = DEFAULT_KEY_BITS)]
    key_bits: u64,

    /// Message to encrypt and send
    #[arg(long, env = "MESSAGE_TO_SEND", default_value = DEFAULT_MESSAGE)]
    message: String,

    /// Log every handshake checkpoint
    #[arg(short, long, env = "VERBOSE", value_parser = BoolishValueParser::new())]
    verbose: bool,

    /// Wait for ENTER before each outbound step
    #[arg(long, env = "ATTACH", value_parser = BoolishValueParser::new())]
    attach: bool,
}

fn wait_for_enter(prompt: &str) {
    tokio::task::block_in_place(|| {
        print!("{prompt} ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        let _ = io::stdin().read_line(&mut line);
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {e}");
    }

    let config = SessionConfig::default()
        .prime_bits(args.prime_bits)
        .key_bits(args.key_bits)
        .message(args.message);
    info!(prime_bits = config.prime_bits, key_bits = config.key_bits, "initiator starting");

    let pause: Box<dyn FnMut(&str)> = if args.attach {
        Box::new(wait_for_enter)
    } else {
        Box::new(|_: &str| {})
    };
    let mut initiator =
        Initiator::new(config, OsRng).with_observer(StepGate::new(TracingObserver, pause));

    let mut conn = match tcp::connect(&args.connect).await {
        Ok(conn) => conn,
        Err(e) => {
            error!(addr = %args.connect, error = %e, "connect failed");
            return ExitCode::FAILURE;
        }
    };

    match initiator.run(&mut conn).await {
        Ok(outcome) => {
            info!(plaintext = %outcome.message, "encrypted message sent");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "initiator aborted");
            ExitCode::FAILURE
        }
    }
}
