use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humantime_serde::re::humantime;

use rotftp::checksum;
use rotftp::tftp::client::{Client, ClientConfig};
use rotftp::tftp::server::{self, Config};

#[derive(Parser)]
#[command(name = "rotftp", version, about = "Read-only TFTP server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve one file to every TFTP read request
    Serve {
        /// Listen address
        #[arg(short, long)]
        address: Option<SocketAddr>,
        /// File to serve to clients
        #[arg(short, long)]
        payload: Option<PathBuf>,
        /// Send attempts per block
        #[arg(long)]
        retries: Option<u8>,
        /// Time to wait for each ACK (e.g. "6s", "500ms")
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Download a file from a TFTP server
    Get {
        /// Server address
        server: SocketAddr,
        /// File name to request
        remote: String,
        /// Where to write the file (defaults to the remote name)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Attempts per response
        #[arg(long, default_value_t = 5)]
        retries: u8,
        /// Time to wait for each response
        #[arg(long, value_parser = humantime::parse_duration, default_value = "5s")]
        timeout: Duration,
    },
    /// Print the SHA-512/256 checksum of each file
    Checksum {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            address,
            payload,
            retries,
            timeout,
            config,
        } => {
            let config =
                Config::load(config.as_deref())?.merge_cli(address, payload, retries, timeout);
            server::run(config).await?;
        }
        Commands::Get {
            server: server_addr,
            remote,
            output,
            retries,
            timeout,
        } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&remote));
            let config = ClientConfig::from(server_addr)
                .with_retries(retries)
                .with_timeout(timeout);

            let size = Client::new(config)
                .download(&remote, &output)
                .await
                .with_context(|| format!("Failed to download {} from {}", remote, server_addr))?;
            log::info!("Received {} bytes", size);
        }
        Commands::Checksum { files } => {
            for file in files {
                println!("{}", checksum::checksum_line(&file).await);
            }
        }
    }

    Ok(())
}
