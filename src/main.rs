//! 💠 SnsGate CLI

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing_subscriber::EnvFilter;

use snsgate::{canonical, Envelope, ReceiverConfig, SnsReceiver, VerificationResult};

#[derive(Parser)]
#[command(name = "snsgate", version, about = "Verify SNS HTTP(S) push messages")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the full verification pipeline over a message
    Verify {
        /// Receiver config (JSON)
        #[arg(long, short)]
        config: PathBuf,
        /// Message body, `-` for stdin
        message: PathBuf,
    },
    /// Print the canonical string-to-sign of a message
    Canonical {
        /// Message body, `-` for stdin
        message: PathBuf,
    },
    /// Show engine status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Verify { config, message } => {
            let config = ReceiverConfig::from_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            init_tracing(config.debug);

            let body = read_message(&message).await?;
            let receiver = SnsReceiver::new(&config)?;
            match receiver.handle(&body).await {
                VerificationResult::Accepted(envelope) => {
                    println!("💠 ACCEPTED — {} {}", envelope.message_type(), envelope.message_id);
                    println!("{}", envelope.to_json());
                }
                VerificationResult::Rejected(reasons) => {
                    println!("❌ REJECTED");
                    for reason in &reasons {
                        println!("  {}", reason);
                    }
                    std::process::exit(1);
                }
                VerificationResult::Error(kind) => {
                    eprintln!("Error: {}", kind);
                    std::process::exit(2);
                }
            }
        }
        Cmd::Canonical { message } => {
            let body = read_message(&message).await?;
            let envelope = Envelope::parse(&body)?;
            print!("{}", canonical::build_string(&envelope));
        }
        Cmd::Status => {
            println!("\n💠 SnsGate");
            println!("==========");
            println!("Version:  {}", env!("CARGO_PKG_VERSION"));
            println!("Pipeline: parse → policy → canonical → certificate → dispatch");
            println!("Crypto:   RSA PKCS#1 v1.5 / SHA-1 (SignatureVersion 1)\n");
        }
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "snsgate=debug" } else { "snsgate=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn read_message(path: &Path) -> anyhow::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut body = Vec::new();
        tokio::io::stdin().read_to_end(&mut body).await.context("reading stdin")?;
        Ok(body)
    } else {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }
}
