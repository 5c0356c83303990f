//! # TriDH Responder
//!
//! Accepts exactly one connection, runs the handshake and prints the
//! decrypted message.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::builder::BoolishValueParser;
use clap::Parser;
use rand::rngs::OsRng;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use tridh::config::DEFAULT_KEY_BITS;
use tridh::handshake::{StepGate, TracingObserver};
use tridh::{Responder, SessionConfig};
use tridhstream::tcp::LineListener;

#[derive(Parser, Debug)]
#[command(name = "tridh-responder", about = "Answer one TriDH handshake and decrypt its message")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:1234")]
    listen: String,

    /// Bits of entropy per private key
    #[arg(long, env = "KEY_BITS", default_value_t = DEFAULT_KEY_BITS)]
    key_bits: u64,

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

    let config = SessionConfig::default().key_bits(args.key_bits);

    let listener = match LineListener::bind(&args.listen).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %args.listen, error = %e, "bind failed");
            return ExitCode::FAILURE;
        }
    };
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "waiting for a connection");
    }

    // One handshake per process run.
    let mut conn = match listener.accept().await {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = %e, "accept failed");
            return ExitCode::FAILURE;
        }
    };

    let pause: Box<dyn FnMut(&str)> = if args.attach {
        Box::new(wait_for_enter)
    } else {
        Box::new(|_: &str| {})
    };
    let mut responder =
        Responder::new(config, OsRng).with_observer(StepGate::new(TracingObserver, pause));

    match responder.run(&mut conn).await {
        Ok(outcome) => {
            info!(peer = conn.peer(), "decrypted message from initiator");
            println!("{}", outcome.message);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "responder aborted");
            ExitCode::FAILURE
        }
    }
}
