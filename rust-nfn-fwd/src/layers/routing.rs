//! Routing layer: learns routes from forwarder advertisements and
//! periodically collapses the RIB into the FIB.
//!
//! The layer is transparent: everything from below is passed up after
//! inspection and everything from above is passed down unchanged.

use crate::layers::{forwarders_name, FaceTable};
use crate::rib::RibTree;
use crate::stack::{Envelope, Layer, LayerCtx, Message};
use crate::tables::ForwardingInformationBase;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rust_nfn_common::name::Name;
use rust_nfn_common::packet::{Content, Interest, Packet};
use rust_nfn_common::types::FaceId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct RoutingLayer {
    rib: Arc<Mutex<RibTree>>,
    fib: Arc<Mutex<ForwardingInformationBase>>,
    faces: Arc<FaceTable>,
    broadcast_addrs: Vec<SocketAddr>,
    route_max_age: Duration,
    ageing_interval: Duration,
    ageing_task: Option<JoinHandle<()>>,
}

impl RoutingLayer {
    pub fn new(
        rib: Arc<Mutex<RibTree>>,
        fib: Arc<Mutex<ForwardingInformationBase>>,
        faces: Arc<FaceTable>,
        broadcast_addrs: Vec<SocketAddr>,
    ) -> Self {
        Self {
            rib,
            fib,
            faces,
            broadcast_addrs,
            route_max_age: Duration::from_secs(3600),
            ageing_interval: Duration::from_secs(5),
            ageing_task: None,
        }
    }

    pub fn with_ageing_interval(mut self, interval: Duration) -> Self {
        self.ageing_interval = interval;
        self
    }

    /// Digests a forwarder advertisement: `udp4://<addr>` on the first
    /// line, then `r:<distance>:<prefix>` route lines.
    async fn handle_advertisement(&self, face: FaceId, content: &Content) {
        if content.payload.first() == Some(&0x80) {
            // Reserved binary variant; not parsed.
            error!("cannot handle the autoconfig binary wire format");
            return;
        }
        let payload = content.payload_str().into_owned();
        let mut lines = payload.lines();
        let Some(first) = lines.next() else {
            warn!("empty forwarder advertisement");
            return;
        };
        let Some((scheme, _addr)) = first.split_once("://") else {
            debug!("advertisement without scheme, ignoring routes");
            return;
        };
        if scheme != "udp4" {
            error!("don't know how to handle scheme {}", scheme);
            return;
        }

        let expiry = Instant::now() + self.route_max_age;
        let mut rib = self.rib.lock().await;
        for line in lines {
            let Some(rest) = line.strip_prefix("r:") else {
                continue;
            };
            let Some((distance, prefix)) = rest.split_once(':') else {
                warn!("malformed route line: {}", line);
                continue;
            };
            if distance == "-1" {
                info!("route without distance information, discarding: {}", prefix);
                continue;
            }
            let Ok(distance) = distance.parse::<u32>() else {
                warn!("malformed route distance: {}", line);
                continue;
            };
            let prefix = Name::from_string(prefix);
            debug!("learned route {} via {} at distance {}", prefix, face, distance + 1);
            rib.insert(&prefix, face, distance + 1, Some(expiry));
        }
    }
}

#[async_trait]
impl Layer for RoutingLayer {
    fn layer_name(&self) -> &'static str {
        "routing"
    }

    async fn start(&mut self, ctx: &LayerCtx) {
        let rib = Arc::clone(&self.rib);
        let fib = Arc::clone(&self.fib);
        let faces = Arc::clone(&self.faces);
        let broadcast_addrs = self.broadcast_addrs.clone();
        let interval = self.ageing_interval;
        let to_lower = ctx.lower_sender();

        self.ageing_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                {
                    let mut rib = rib.lock().await;
                    rib.ageing(Instant::now());
                    rib.build_fib(&mut *fib.lock().await);
                }
                if let Some(to_lower) = &to_lower {
                    for addr in &broadcast_addrs {
                        let face = faces.get_or_create(*addr, false);
                        let solicitation = Interest::new(forwarders_name());
                        let _ = to_lower
                            .send(Envelope::packet(
                                Some(face),
                                Packet::Interest(solicitation),
                            ))
                            .await;
                    }
                }
            }
        }));
    }

    async fn stop(&mut self) {
        if let Some(task) = self.ageing_task.take() {
            task.abort();
        }
    }

    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        if let (Some(face), Message::Packet(Packet::Content(content))) =
            (envelope.face, &envelope.message)
        {
            if content.name == forwarders_name() {
                self.handle_advertisement(face, content).await;
            }
        }
        ctx.send_higher(envelope).await;
    }

    async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        ctx.send_lower(envelope).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn advertisement_routes_enter_the_rib() {
        let rib = Arc::new(Mutex::new(RibTree::new()));
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let faces = Arc::new(FaceTable::new());
        let layer = RoutingLayer::new(rib.clone(), fib, faces, vec![])
            .with_ageing_interval(Duration::from_secs(3600));

        // Drive the handler directly; the layer is transparent plumbing
        // around it.
        let content = Content::new(
            forwarders_name(),
            Bytes::from_static(b"udp4://10.0.0.1:9000\nr:2:/ndn/ch/unibas\nr:-1:/nope\nr:0:/local"),
        );
        layer.handle_advertisement(FaceId(4), &content).await;

        let rib = rib.lock().await;
        let collapsed = rib.collapse();
        // Distances are incremented by one on insertion.
        assert_eq!(collapsed.len(), 2);
        assert!(collapsed
            .iter()
            .any(|(path, face)| path.len() == 3 && *face == FaceId(4)));
        assert!(collapsed
            .iter()
            .any(|(path, face)| path.len() == 1 && *face == FaceId(4)));
    }

    #[tokio::test]
    async fn binary_advertisement_is_rejected() {
        let rib = Arc::new(Mutex::new(RibTree::new()));
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let faces = Arc::new(FaceTable::new());
        let layer = RoutingLayer::new(rib.clone(), fib, faces, vec![])
            .with_ageing_interval(Duration::from_secs(3600));

        let mut payload = vec![0x80u8];
        payload.extend_from_slice(b"udp4://10.0.0.1:9000\nr:2:/ndn");
        let content = Content::new(forwarders_name(), Bytes::from(payload));
        layer.handle_advertisement(FaceId(4), &content).await;

        assert!(rib.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let rib = Arc::new(Mutex::new(RibTree::new()));
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let faces = Arc::new(FaceTable::new());
        let layer = RoutingLayer::new(rib.clone(), fib, faces, vec![])
            .with_ageing_interval(Duration::from_secs(3600));

        let content = Content::new(
            forwarders_name(),
            Bytes::from_static(b"tcp4://10.0.0.1:9000\nr:2:/ndn"),
        );
        layer.handle_advertisement(FaceId(4), &content).await;

        assert!(rib.lock().await.is_empty());
    }
}
