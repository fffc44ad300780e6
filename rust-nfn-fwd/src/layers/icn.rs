//! ICN forwarding engine.
//!
//! Consumes Interests, Contents, and Nacks, drives the CS/PIT/FIB state
//! machine, and emits Interests downward or Contents upward. The three
//! tables are shared with the routing, NFN, and management components,
//! but every composite lookup-then-insert decision runs inside this
//! layer's single task.

use crate::stack::{Envelope, Layer, LayerCtx, Message};
use crate::tables::{ContentStore, ForwardingInformationBase, PendingInterestTable, PitEntry};
use async_trait::async_trait;
use log::{debug, info, warn};
use rust_nfn_common::metrics::ForwarderMetrics;
use rust_nfn_common::packet::{Content, Interest, Nack, NackReason, Packet};
use rust_nfn_common::types::{FaceId, NFN_MARKER};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub struct IcnLayer {
    cs: Arc<Mutex<ContentStore>>,
    pit: Arc<Mutex<PendingInterestTable>>,
    fib: Arc<Mutex<ForwardingInformationBase>>,
    metrics: Arc<ForwarderMetrics>,
    pit_lifetime: Duration,
    ageing_interval: Duration,
    /// Interests without a route are handed to the application layer
    /// above instead of being Nacked.
    interest_to_app: bool,
    /// An NFN layer above intercepts computation names.
    nfn_enabled: bool,
    ageing_task: Option<JoinHandle<()>>,
}

impl IcnLayer {
    pub fn new(
        cs: Arc<Mutex<ContentStore>>,
        pit: Arc<Mutex<PendingInterestTable>>,
        fib: Arc<Mutex<ForwardingInformationBase>>,
        metrics: Arc<ForwarderMetrics>,
        pit_lifetime: Duration,
        ageing_interval: Duration,
    ) -> Self {
        Self {
            cs,
            pit,
            fib,
            metrics,
            pit_lifetime,
            ageing_interval,
            interest_to_app: false,
            nfn_enabled: false,
            ageing_task: None,
        }
    }

    /// Deliver route-less Interests to the layer above.
    pub fn with_interest_to_app(mut self) -> Self {
        self.interest_to_app = true;
        self
    }

    /// Hand computation Interests to the NFN layer above.
    pub fn with_nfn(mut self) -> Self {
        self.nfn_enabled = true;
        self
    }

    fn is_computation(interest: &Interest) -> bool {
        interest
            .name
            .last()
            .map(|c| c.as_bytes().as_ref() == NFN_MARKER)
            .unwrap_or(false)
    }

    async fn handle_interest_from_lower(&mut self, ctx: &LayerCtx, face: FaceId, interest: Interest) {
        self.metrics.interests_received.increment();

        // 1. Content Store
        if let Some(content) = self.cs.lock().await.find(&interest.name) {
            self.metrics.cs_hits.increment();
            debug!("CS hit for {}", interest.name);
            ctx.send_lower(Envelope::packet(Some(face), Packet::Content(content)))
                .await;
            return;
        }
        self.metrics.cs_misses.increment();

        // 2. Pending Interest Table: a live entry collects the new face.
        {
            let mut pit = self.pit.lock().await;
            if pit.find(&interest.name).is_some() {
                pit.add_or_merge(&interest, Some(face), false, false, Instant::now());
                debug!("merged {} into pending entry", interest.name);
                return;
            }
        }

        let expiry = Instant::now() + self.pit_lifetime;

        // 3. Computation names go up to the NFN layer.
        if self.nfn_enabled && Self::is_computation(&interest) {
            self.pit
                .lock()
                .await
                .add_or_merge(&interest, Some(face), false, true, expiry);
            self.update_pending_gauge().await;
            ctx.send_higher(Envelope::packet(Some(face), Packet::Interest(interest)))
                .await;
            return;
        }

        // 4. A local application layer serves what it can.
        if self.interest_to_app {
            self.pit
                .lock()
                .await
                .add_or_merge(&interest, Some(face), true, false, expiry);
            self.update_pending_gauge().await;
            ctx.send_higher(Envelope::packet(Some(face), Packet::Interest(interest)))
                .await;
            return;
        }

        // 5. Forwarding Information Base
        let next_hop = self.fib.lock().await.find(&interest.name, &[], &[face]);
        match next_hop {
            Some(entry) => {
                {
                    let mut pit = self.pit.lock().await;
                    pit.add_or_merge(&interest, Some(face), false, false, expiry);
                    pit.mark_used(&interest.name, entry.clone());
                }
                self.update_pending_gauge().await;
                self.metrics.interests_forwarded.increment();
                debug!("forwarding {} via {}", interest.name, entry.face);
                ctx.send_lower(Envelope::packet(
                    Some(entry.face),
                    Packet::Interest(interest),
                ))
                .await;
            }
            None => {
                self.metrics.no_route.increment();
                debug!("no route for {}", interest.name);
                ctx.send_lower(Envelope::packet(
                    Some(face),
                    Packet::Nack(Nack::new(NackReason::NoRoute, interest)),
                ))
                .await;
            }
        }
    }

    async fn handle_content_from_lower(&mut self, ctx: &LayerCtx, face: FaceId, content: Content) {
        self.metrics.contents_received.increment();

        let entry = self.pit.lock().await.remove(&content.name);
        let Some(entry) = entry else {
            debug!("dropping unsolicited content {}", content.name);
            return;
        };
        self.update_pending_gauge().await;

        self.cs.lock().await.add(content.clone(), false);

        for peer in &entry.incoming_faces {
            if *peer != face {
                self.metrics.contents_sent.increment();
                ctx.send_lower(Envelope::packet(Some(*peer), Packet::Content(content.clone())))
                    .await;
            }
        }
        if entry.local_app || entry.nfn {
            ctx.send_higher(Envelope::packet(Some(face), Packet::Content(content)))
                .await;
        }
    }

    async fn handle_nack_from_lower(&mut self, ctx: &LayerCtx, face: FaceId, nack: Nack) {
        self.metrics.nacks_received.increment();

        let entry = {
            let pit = self.pit.lock().await;
            pit.find(&nack.name).cloned()
        };
        let Some(entry) = entry else {
            debug!("dropping nack without pending entry: {}", nack.name);
            return;
        };

        // Try the next-best face before giving up.
        let incoming: Vec<FaceId> = entry.incoming_faces.iter().copied().collect();
        let alternative = self
            .fib
            .lock()
            .await
            .find(&nack.name, &entry.used_fib_entries, &incoming);
        if let Some(alternative) = alternative {
            if alternative.face != face {
                self.pit
                    .lock()
                    .await
                    .mark_used(&nack.name, alternative.clone());
                info!(
                    "retrying {} via {} after nack ({})",
                    nack.name, alternative.face, nack.reason
                );
                ctx.send_lower(Envelope::packet(
                    Some(alternative.face),
                    Packet::Interest(nack.interest.clone()),
                ))
                .await;
                return;
            }
        }

        // Alternatives exhausted; propagate to everyone who asked.
        let entry = match self.pit.lock().await.remove(&nack.name) {
            Some(entry) => entry,
            None => entry,
        };
        self.update_pending_gauge().await;
        for peer in &entry.incoming_faces {
            self.metrics.nacks_sent.increment();
            ctx.send_lower(Envelope::packet(Some(*peer), Packet::Nack(nack.clone())))
                .await;
        }
        if entry.local_app || entry.nfn {
            ctx.send_higher(Envelope::packet(Some(face), Packet::Nack(nack)))
                .await;
        }
    }

    async fn handle_interest_from_higher(
        &mut self,
        ctx: &LayerCtx,
        face: Option<FaceId>,
        interest: Interest,
    ) {
        if let Some(content) = self.cs.lock().await.find(&interest.name) {
            self.metrics.cs_hits.increment();
            ctx.send_higher(Envelope::packet(face, Packet::Content(content)))
                .await;
            return;
        }

        let expiry = Instant::now() + self.pit_lifetime;
        let (local_app, nfn) = if self.nfn_enabled {
            (false, true)
        } else {
            (true, false)
        };
        {
            let mut pit = self.pit.lock().await;
            if pit.find(&interest.name).is_some() {
                // Already in flight; just record the local interest.
                pit.add_or_merge(&interest, face, local_app, nfn, expiry);
                return;
            }
            pit.add_or_merge(&interest, face, local_app, nfn, expiry);
        }
        self.update_pending_gauge().await;

        let next_hop = self.fib.lock().await.find(&interest.name, &[], &[]);
        match next_hop {
            Some(entry) => {
                self.pit
                    .lock()
                    .await
                    .mark_used(&interest.name, entry.clone());
                self.metrics.interests_forwarded.increment();
                ctx.send_lower(Envelope::packet(
                    Some(entry.face),
                    Packet::Interest(interest),
                ))
                .await;
            }
            None => {
                self.metrics.no_route.increment();
                self.pit.lock().await.remove(&interest.name);
                self.update_pending_gauge().await;
                ctx.send_higher(Envelope::packet(
                    face,
                    Packet::Nack(Nack::new(NackReason::NoRoute, interest)),
                ))
                .await;
            }
        }
    }

    async fn handle_content_from_higher(
        &mut self,
        ctx: &LayerCtx,
        face: Option<FaceId>,
        content: Content,
    ) {
        self.cs.lock().await.add(content.clone(), false);

        let entry = self.pit.lock().await.remove(&content.name);
        match entry {
            Some(entry) => {
                self.update_pending_gauge().await;
                for peer in &entry.incoming_faces {
                    self.metrics.contents_sent.increment();
                    ctx.send_lower(Envelope::packet(Some(*peer), Packet::Content(content.clone())))
                        .await;
                }
            }
            None => {
                if let Some(face) = face {
                    self.metrics.contents_sent.increment();
                    ctx.send_lower(Envelope::packet(Some(face), Packet::Content(content)))
                        .await;
                } else {
                    debug!("content {} from above satisfied nothing", content.name);
                }
            }
        }
    }

    async fn handle_nack_from_higher(&mut self, ctx: &LayerCtx, face: Option<FaceId>, nack: Nack) {
        let entry = self.pit.lock().await.remove(&nack.name);
        match entry {
            Some(entry) => {
                self.update_pending_gauge().await;
                for peer in &entry.incoming_faces {
                    self.metrics.nacks_sent.increment();
                    ctx.send_lower(Envelope::packet(Some(*peer), Packet::Nack(nack.clone())))
                        .await;
                }
            }
            None => {
                if let Some(face) = face {
                    self.metrics.nacks_sent.increment();
                    ctx.send_lower(Envelope::packet(Some(face), Packet::Nack(nack)))
                        .await;
                }
            }
        }
    }

    async fn update_pending_gauge(&self) {
        let len = self.pit.lock().await.len();
        self.metrics.pending_interests.set(len as u64);
    }
}

#[async_trait]
impl Layer for IcnLayer {
    fn layer_name(&self) -> &'static str {
        "icn"
    }

    async fn start(&mut self, ctx: &LayerCtx) {
        let pit = Arc::clone(&self.pit);
        let cs = Arc::clone(&self.cs);
        let metrics = Arc::clone(&self.metrics);
        let interval = self.ageing_interval;
        let to_higher = ctx.higher_sender();

        self.ageing_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let expired: Vec<PitEntry> = pit.lock().await.ageing(now);
                cs.lock().await.ageing(now);
                metrics.pending_interests.set(pit.lock().await.len() as u64);
                for entry in expired {
                    metrics.pit_expired.increment();
                    debug!("pending interest {} timed out", entry.name);
                    if entry.local_app || entry.nfn {
                        if let Some(tx) = &to_higher {
                            let nack = Nack::new(NackReason::NoContent, entry.interest.clone());
                            let _ = tx
                                .send(Envelope::packet(None, Packet::Nack(nack)))
                                .await;
                        }
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
        let Message::Packet(packet) = envelope.message else {
            warn!("icn layer expects typed packets");
            return;
        };
        let Some(face) = envelope.face else {
            warn!("icn layer expects a face id from below");
            return;
        };
        match packet {
            Packet::Interest(interest) => self.handle_interest_from_lower(ctx, face, interest).await,
            Packet::Content(content) => self.handle_content_from_lower(ctx, face, content).await,
            Packet::Nack(nack) => self.handle_nack_from_lower(ctx, face, nack).await,
            Packet::Unknown(bytes) => {
                debug!("dropping {} undecodable bytes from {}", bytes.len(), face)
            }
        }
    }

    async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        let Message::Packet(packet) = envelope.message else {
            warn!("icn layer expects typed packets");
            return;
        };
        let face = envelope.face;
        match packet {
            Packet::Interest(interest) => self.handle_interest_from_higher(ctx, face, interest).await,
            Packet::Content(content) => self.handle_content_from_higher(ctx, face, content).await,
            Packet::Nack(nack) => self.handle_nack_from_higher(ctx, face, nack).await,
            Packet::Unknown(_) => debug!("dropping unknown packet from above"),
        }
    }
}
