use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::mgmt::MgmtCommands;

/// rust-nfn command line interface
#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the level of verbosity
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a forwarder node
    Forwarder {
        /// Configuration file
        #[clap(short, long)]
        config: Option<String>,

        /// UDP address to listen on
        #[clap(short, long)]
        listen: Option<String>,

        /// Management TCP address
        #[clap(short, long)]
        mgmt: Option<String>,

        /// Prefix repositories may register under (repeatable)
        #[clap(short, long)]
        prefix: Vec<String>,

        /// Address to solicit routes from (repeatable)
        #[clap(short, long)]
        broadcast: Vec<String>,

        /// Enable the NFN computation layer
        #[clap(long)]
        nfn: bool,
    },

    /// Run a repository node
    Repo {
        /// Configuration file
        #[clap(short, long)]
        config: Option<String>,

        /// UDP address to listen on
        #[clap(short, long)]
        listen: Option<String>,

        /// Management TCP address
        #[clap(short, long)]
        mgmt: Option<String>,

        /// Service name announced during registration
        #[clap(short, long)]
        name: Option<String>,

        /// Address forwarders are solicited on
        #[clap(short, long)]
        broadcast: Option<String>,

        /// Content served by the repository, as name:content (repeatable)
        #[clap(long)]
        content: Vec<String>,
    },

    /// Send an Interest and print the resulting Content
    Fetch {
        /// Name to request (NDN URI format)
        name: String,

        /// Forwarder to send the Interest to
        #[clap(short, long)]
        forwarder: String,

        /// Timeout in milliseconds
        #[clap(short, long, default_value = "4000")]
        timeout: u64,
    },

    /// Send a management command to a running node
    Mgmt {
        /// Management address of the node
        #[clap(short, long)]
        addr: String,

        #[clap(subcommand)]
        cmd: MgmtCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    match cli.command {
        Commands::Forwarder {
            config,
            listen,
            mgmt,
            prefix,
            broadcast,
            nfn,
        } => {
            commands::forwarder::run(config, listen, mgmt, prefix, broadcast, nfn).await?;
        }
        Commands::Repo {
            config,
            listen,
            mgmt,
            name,
            broadcast,
            content,
        } => {
            commands::repo::run(config, listen, mgmt, name, broadcast, content).await?;
        }
        Commands::Fetch {
            name,
            forwarder,
            timeout,
        } => {
            commands::fetch::run(name, forwarder, timeout).await?;
        }
        Commands::Mgmt { addr, cmd } => {
            commands::mgmt::run(addr, cmd).await?;
        }
    }

    Ok(())
}
