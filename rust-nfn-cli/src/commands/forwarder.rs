//! The `forwarder` subcommand: assembles and runs a forwarder stack.

use anyhow::{Context, Result};
use log::info;
use rust_nfn_common::metrics::ForwarderMetrics;
use rust_nfn_common::name::Name;
use rust_nfn_compute::executor::ExecutorRegistry;
use rust_nfn_compute::NfnLayer;
use rust_nfn_fwd::config::ForwarderConfig;
use rust_nfn_fwd::layers::{
    AutoconfigServerLayer, FaceTable, IcnLayer, PacketEncodingLayer, RoutingLayer,
    ServerAdvertisement, UdpLinkLayer,
};
use rust_nfn_fwd::mgmt::{MgmtHandles, MgmtServer};
use rust_nfn_fwd::rib::RibTree;
use rust_nfn_fwd::stack::{Layer, LayerStack};
use rust_nfn_fwd::tables::{ContentStore, ForwardingInformationBase, PendingInterestTable};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub async fn run(
    config: Option<String>,
    listen: Option<String>,
    mgmt: Option<String>,
    prefixes: Vec<String>,
    broadcast: Vec<String>,
    nfn: bool,
) -> Result<()> {
    let mut config = ForwarderConfig::load(config.as_deref())?;
    if let Some(listen) = listen {
        config.listen_addr = listen;
    }
    if let Some(mgmt) = mgmt {
        config.mgmt_addr = Some(mgmt);
    }
    if !prefixes.is_empty() {
        config.registration_prefixes = prefixes;
    }
    if !broadcast.is_empty() {
        config.broadcast_addrs = broadcast;
    }
    if nfn {
        config.enable_nfn = true;
    }

    let cs = Arc::new(Mutex::new(ContentStore::new(
        config.cs_capacity,
        config.cs_ttl(),
    )));
    let pit = Arc::new(Mutex::new(PendingInterestTable::new()));
    let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
    let rib = Arc::new(Mutex::new(RibTree::new()));
    let faces = Arc::new(FaceTable::new());
    let metrics = Arc::new(ForwarderMetrics::new());

    let link = UdpLinkLayer::bind(
        &config.listen_addr,
        !config.broadcast_addrs.is_empty(),
        Arc::clone(&faces),
    )
    .await
    .with_context(|| format!("binding {}", config.listen_addr))?;
    let local_addr = link.local_addr()?;
    info!("forwarder listening on {}", local_addr);

    let advertisement = if config.advertised_routes.is_empty() {
        ServerAdvertisement::RepoRegistration {
            prefixes: config
                .registration_prefixes
                .iter()
                .map(|p| Name::from_string(p))
                .collect(),
        }
    } else {
        ServerAdvertisement::Routes {
            routes: config
                .advertised_routes
                .iter()
                .map(|(p, d)| (Name::from_string(p), *d))
                .collect(),
        }
    };

    let mut icn = IcnLayer::new(
        Arc::clone(&cs),
        Arc::clone(&pit),
        Arc::clone(&fib),
        Arc::clone(&metrics),
        config.pit_lifetime(),
        config.pit_ageing_interval(),
    );
    if config.enable_nfn {
        icn = icn.with_nfn();
    }

    let mut layers: Vec<Box<dyn Layer>> = Vec::new();
    if config.enable_nfn {
        let executors: Arc<ExecutorRegistry> = Arc::new(HashMap::new());
        layers.push(Box::new(NfnLayer::new(
            Arc::clone(&cs),
            Arc::clone(&fib),
            executors,
            Arc::clone(&metrics),
            config.max_computations,
            config.queue_capacity,
        )));
    }
    layers.push(Box::new(icn));
    layers.push(Box::new(AutoconfigServerLayer::new(
        Arc::clone(&faces),
        Arc::clone(&fib),
        local_addr,
        advertisement,
    )));
    if !config.broadcast_addrs.is_empty() {
        let broadcast_addrs = config
            .broadcast_addrs
            .iter()
            .map(|addr| addr.parse().with_context(|| format!("bad address {}", addr)))
            .collect::<Result<Vec<_>>>()?;
        layers.push(Box::new(
            RoutingLayer::new(
                Arc::clone(&rib),
                Arc::clone(&fib),
                Arc::clone(&faces),
                broadcast_addrs,
            )
            .with_ageing_interval(config.rib_ageing_interval()),
        ));
    }
    layers.push(Box::new(PacketEncodingLayer::new()));
    layers.push(Box::new(link));

    let stack = LayerStack::start(layers, config.queue_capacity);

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
    let mgmt_task = match &config.mgmt_addr {
        Some(addr) => {
            let server = MgmtServer::bind(
                addr,
                MgmtHandles {
                    fib: Some(Arc::clone(&fib)),
                    cs: Some(Arc::clone(&cs)),
                    faces: Some(Arc::clone(&faces)),
                    repo: None,
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

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = shutdown_rx.recv() => info!("shutting down"),
    }

    if let Some(task) = mgmt_task {
        task.abort();
    }
    stack.stop().await;
    Ok(())
}
