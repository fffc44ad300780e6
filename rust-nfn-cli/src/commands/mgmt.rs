//! The `mgmt` subcommand: drives a node's management channel.

use anyhow::{Context, Result};
use clap::Subcommand;
use rust_nfn_common::name::Name;
use rust_nfn_common::types::FaceId;
use rust_nfn_fwd::mgmt::MgmtClient;

#[derive(Subcommand)]
pub enum MgmtCommands {
    /// Shut the node down
    Shutdown,

    /// Print the repository's served prefix
    Getrepoprefix,

    /// Print the repository's storage path
    Getrepopath,

    /// Create a static face
    Newface {
        /// host:port of the remote endpoint
        param: String,
    },

    /// Install a forwarding rule
    Newforwardingrule {
        /// prefix:faceid
        param: String,
    },

    /// Store new content
    Newcontent {
        /// name:content
        param: String,
    },
}

pub async fn run(addr: String, cmd: MgmtCommands) -> Result<()> {
    let addr = addr
        .parse()
        .with_context(|| format!("bad management address {}", addr))?;
    let client = MgmtClient::new(addr);

    let reply = match cmd {
        MgmtCommands::Shutdown => client.shutdown().await?,
        MgmtCommands::Getrepoprefix => client.get_repo_prefix().await?,
        MgmtCommands::Getrepopath => client.get_repo_path().await?,
        MgmtCommands::Newface { param } => {
            let (host, port) = param
                .rsplit_once(':')
                .context("newface expects host:port")?;
            let port: u16 = port.parse().context("bad port")?;
            client.add_face(host, port).await?
        }
        MgmtCommands::Newforwardingrule { param } => {
            let (prefix, face) = param
                .rsplit_once(':')
                .context("newforwardingrule expects prefix:faceid")?;
            let face: u32 = face.parse().context("bad face id")?;
            client
                .add_forwarding_rule(&Name::from_string(prefix), FaceId(face))
                .await?
        }
        MgmtCommands::Newcontent { param } => {
            let (name, content) = param
                .split_once(':')
                .context("newcontent expects name:content")?;
            client
                .add_new_content(&Name::from_string(name), content)
                .await?
        }
    };
    println!("{}", reply);
    Ok(())
}
