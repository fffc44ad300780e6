//! The `repo` subcommand: assembles and runs a repository node.

use anyhow::{anyhow, Context, Result};
use bytes::Bytes;
use log::info;
use rust_nfn_common::name::Name;
use rust_nfn_fwd::config::RepoConfig;
use rust_nfn_fwd::layers::{AutoconfigRepoLayer, FaceTable, PacketEncodingLayer, RepositoryLayer, UdpLinkLayer};
use rust_nfn_fwd::mgmt::{MgmtHandles, MgmtServer};
use rust_nfn_fwd::repo::{MemoryRepository, Repository};
use rust_nfn_fwd::stack::{Layer, LayerStack};
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn run(
    config: Option<String>,
    listen: Option<String>,
    mgmt: Option<String>,
    name: Option<String>,
    broadcast: Option<String>,
    contents: Vec<String>,
) -> Result<()> {
    let mut config = RepoConfig::load(config.as_deref())?;
    if let Some(listen) = listen {
        config.listen_addr = listen;
    }
    if let Some(mgmt) = mgmt {
        config.mgmt_addr = Some(mgmt);
    }
    if let Some(name) = name {
        config.service_name = name;
    }
    if let Some(broadcast) = broadcast {
        config.broadcast_addr = broadcast;
    }

    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new(config.repo_path.clone()));
    for entry in &contents {
        let (name, content) = entry
            .split_once(':')
            .ok_or_else(|| anyhow!("content must be name:content, got '{}'", entry))?;
        repo.add(
            Name::from_string(name),
            Bytes::copy_from_slice(content.as_bytes()),
        )
        .map_err(|e| anyhow!("storing {}: {}", name, e))?;
    }

    let faces = Arc::new(FaceTable::new());
    let link = UdpLinkLayer::bind(&config.listen_addr, true, Arc::clone(&faces))
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let local_addr = link.local_addr()?;
    info!("repository listening on {}", local_addr);

    let announced_addr = match &config.announced_addr {
        Some(addr) => addr.parse().with_context(|| format!("bad address {}", addr))?,
        None => local_addr,
    };
    let broadcast_addr = config
        .broadcast_addr
        .parse()
        .with_context(|| format!("bad address {}", config.broadcast_addr))?;

    let (failed_tx, mut failed_rx) = mpsc::channel(1);
    let layers: Vec<Box<dyn Layer>> = vec![
        Box::new(RepositoryLayer::new(Arc::clone(&repo))),
        Box::new(AutoconfigRepoLayer::new(
            config.service_name.clone(),
            Arc::clone(&repo),
            Arc::clone(&faces),
            announced_addr,
            broadcast_addr,
            Some(config.solicitation_timeout()),
            config.solicitation_max_retry,
            failed_tx,
        )),
        Box::new(PacketEncodingLayer::new()),
        Box::new(link),
    ];
    let stack = LayerStack::start(layers, config.queue_capacity);

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    let mgmt_task = match &config.mgmt_addr {
        Some(addr) => {
            let server = MgmtServer::bind(
                addr,
                MgmtHandles {
                    fib: None,
                    cs: None,
                    faces: Some(Arc::clone(&faces)),
                    repo: Some(Arc::clone(&repo)),
                    shutdown: Some(shutdown_tx),
                },
            )
            .await
            .with_context(|| format!("binding management address {}", addr))?;
            info!("management channel on {}", server.local_addr()?);
            Some(server.run())
        }
        None => None,
    };

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
        _ = shutdown_rx.recv() => {
            info!("shutting down");
            Ok(())
        }
        _ = failed_rx.recv() => {
            Err(anyhow!("no forwarder answered the autoconfig solicitation"))
        }
    };

    if let Some(task) = mgmt_task {
        task.abort();
    }
    stack.stop().await;
    result
}
