//! Layered runtime: one task per layer, bounded queues in between.
//!
//! Adjacent layers exchange [`Envelope`]s (`[face_id, message]`) over
//! bounded FIFO channels; a producer blocks when its consumer is slow,
//! which models link congestion and bounds PIT growth. Each layer task
//! suspends only while waiting on its two inbound queues; long work is
//! delegated to dedicated tasks owned by the layer.

use async_trait::async_trait;
use bytes::Bytes;
use log::warn;
use rust_nfn_common::packet::Packet;
use rust_nfn_common::types::FaceId;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Default capacity of the inter-layer queues.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Payload of an inter-layer message.
#[derive(Debug, Clone)]
pub enum Message {
    /// Raw datagram bytes, exchanged below the packet-encoding layer.
    Wire(Bytes),
    /// Typed packet, exchanged above the packet-encoding layer.
    Packet(Packet),
}

/// `[face_id, message]` pair exchanged between adjacent layers.
///
/// The face is `None` for locally originated traffic whose outgoing
/// face is still to be decided (e.g. by a FIB lookup).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub face: Option<FaceId>,
    pub message: Message,
}

impl Envelope {
    pub fn packet(face: Option<FaceId>, packet: Packet) -> Self {
        Self {
            face,
            message: Message::Packet(packet),
        }
    }

    pub fn wire(face: FaceId, bytes: Bytes) -> Self {
        Self {
            face: Some(face),
            message: Message::Wire(bytes),
        }
    }
}

/// The two outbound queues a layer may write to.
#[derive(Clone)]
pub struct LayerCtx {
    to_lower: Option<mpsc::Sender<Envelope>>,
    to_higher: Option<mpsc::Sender<Envelope>>,
}

impl LayerCtx {
    /// A context wired to explicit queues; the stack builder uses this,
    /// and tests drive single layers with it.
    pub fn new(
        to_lower: Option<mpsc::Sender<Envelope>>,
        to_higher: Option<mpsc::Sender<Envelope>>,
    ) -> Self {
        Self { to_lower, to_higher }
    }

    pub async fn send_lower(&self, envelope: Envelope) {
        match &self.to_lower {
            Some(tx) => {
                if tx.send(envelope).await.is_err() {
                    warn!("lower layer queue closed");
                }
            }
            None => warn!("no lower layer to send to"),
        }
    }

    pub async fn send_higher(&self, envelope: Envelope) {
        match &self.to_higher {
            Some(tx) => {
                if tx.send(envelope).await.is_err() {
                    warn!("higher layer queue closed");
                }
            }
            None => warn!("no higher layer to send to"),
        }
    }

    /// Clone of the downward queue, for tasks a layer spawns itself.
    pub fn lower_sender(&self) -> Option<mpsc::Sender<Envelope>> {
        self.to_lower.clone()
    }

    /// Clone of the upward queue, for tasks a layer spawns itself.
    pub fn higher_sender(&self) -> Option<mpsc::Sender<Envelope>> {
        self.to_higher.clone()
    }
}

/// A protocol layer in the stack.
///
/// Handlers must not block on external I/O; anything long-running is
/// spawned in `start` and cancelled in `stop`.
#[async_trait]
pub trait Layer: Send + 'static {
    fn layer_name(&self) -> &'static str;

    /// Called once when the stack starts, before any message delivery.
    async fn start(&mut self, _ctx: &LayerCtx) {}

    /// Called when the layer's task winds down; cancel timers here.
    async fn stop(&mut self) {}

    /// Handle an envelope arriving from the layer below.
    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope);

    /// Handle an envelope arriving from the layer above.
    async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope);
}

/// A running stack of layers.
///
/// Built from a list ordered top to bottom. The stack exposes the top
/// layer's upper edge: [`LayerStack::send_from_higher`] injects traffic
/// as if from an application above, and [`LayerStack::recv_to_higher`]
/// yields whatever the top layer sends upward.
pub struct LayerStack {
    tasks: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
    to_top: mpsc::Sender<Envelope>,
    from_top: mpsc::Receiver<Envelope>,
    // Keeps otherwise senderless queues (e.g. the bottom layer's
    // from_lower side) open for the lifetime of the stack.
    _keepalive: Vec<mpsc::Sender<Envelope>>,
}

impl LayerStack {
    /// Wires the given layers (top first) together and starts one task
    /// per layer.
    pub fn start(layers: Vec<Box<dyn Layer>>, queue_capacity: usize) -> Self {
        assert!(!layers.is_empty(), "a stack needs at least one layer");

        let (shutdown, _) = watch::channel(false);
        let mut keepalive = Vec::new();

        // The application edge above the top layer.
        let (to_top_tx, to_top_rx) = mpsc::channel(queue_capacity);
        let (from_top_tx, from_top_rx) = mpsc::channel(queue_capacity);

        let count = layers.len();
        let mut tasks = Vec::with_capacity(count);

        let mut from_higher_rx = to_top_rx;
        let mut to_higher_tx = from_top_tx;

        for (index, mut layer) in layers.into_iter().enumerate() {
            let is_bottom = index == count - 1;

            // Queues shared with the layer below, if any.
            let (down_tx, down_rx) = mpsc::channel(queue_capacity);
            let (up_tx, up_rx) = mpsc::channel(queue_capacity);

            let ctx = LayerCtx::new(
                if is_bottom { None } else { Some(down_tx.clone()) },
                Some(to_higher_tx.clone()),
            );

            let mut from_lower_rx = if is_bottom {
                // No layer below; keep the sender alive so the queue
                // never reads as closed.
                let (tx, rx) = mpsc::channel(queue_capacity);
                keepalive.push(tx);
                rx
            } else {
                up_rx
            };
            let mut from_higher = from_higher_rx;

            let mut shutdown_rx = shutdown.subscribe();
            tasks.push(tokio::spawn(async move {
                layer.start(&ctx).await;
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        envelope = from_lower_rx.recv() => match envelope {
                            Some(envelope) => layer.data_from_lower(&ctx, envelope).await,
                            None => break,
                        },
                        envelope = from_higher.recv() => match envelope {
                            Some(envelope) => layer.data_from_higher(&ctx, envelope).await,
                            None => break,
                        },
                    }
                }
                layer.stop().await;
            }));

            // The next (lower) layer reads what this one sent down and
            // sends its own upward traffic into `up_tx`.
            from_higher_rx = down_rx;
            to_higher_tx = up_tx;
        }

        // The queues below the bottom layer have no peer; keep their
        // senders so they stay open.
        keepalive.push(to_higher_tx);

        Self {
            tasks,
            shutdown,
            to_top: to_top_tx,
            from_top: from_top_rx,
            _keepalive: keepalive,
        }
    }

    /// Injects an envelope into the top layer, as an application would.
    pub async fn send_from_higher(&self, envelope: Envelope) {
        if self.to_top.send(envelope).await.is_err() {
            warn!("stack is no longer running");
        }
    }

    /// Receives the next envelope the top layer sent upward.
    pub async fn recv_to_higher(&mut self) -> Option<Envelope> {
        self.from_top.recv().await
    }

    /// Signals every layer to stop and cancels the layer tasks.
    ///
    /// Queues are closed without draining; outstanding timers are
    /// cancelled by each layer's `stop`.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        // Give layer loops a chance to observe the signal and run their
        // stop handlers before the tasks are torn down.
        tokio::time::sleep(Duration::from_millis(50)).await;
        for task in &self.tasks {
            task.abort();
        }
    }
}
