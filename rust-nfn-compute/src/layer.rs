//! NFN layer: computation interception above the ICN layer.
//!
//! Interests whose final component is the `NFN` marker arrive here from
//! the ICN layer. The layer spawns one evaluator per computation,
//! relays the evaluator's Interests downward, routes Contents for
//! rewritten and requested names back to the right evaluator, and hands
//! final results down to satisfy the original PIT entry. Evaluators are
//! terminated when their originating entry dies (timeout, Nack, or
//! satisfaction).

use crate::evaluator::{Evaluator, EvaluatorHandle, EvaluatorOutput};
use crate::executor::ExecutorRegistry;
use async_trait::async_trait;
use log::{debug, info, warn};
use rust_nfn_common::metrics::ForwarderMetrics;
use rust_nfn_common::name::Name;
use rust_nfn_common::packet::{Content, Interest, Nack, NackReason, Packet};
use rust_nfn_common::types::NFN_MARKER;
use rust_nfn_fwd::stack::{Envelope, Layer, LayerCtx, Message};
use rust_nfn_fwd::tables::{ContentStore, ForwardingInformationBase};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

struct Computation {
    interest: Interest,
    in_tx: mpsc::Sender<Content>,
    task: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl Computation {
    fn terminate(&self) {
        self.task.abort();
        self.relay.abort();
    }

    fn is_finished(&self) -> bool {
        self.task.is_finished() && self.relay.is_finished()
    }
}

pub struct NfnLayer {
    cs: Arc<Mutex<ContentStore>>,
    fib: Arc<Mutex<ForwardingInformationBase>>,
    executors: Arc<ExecutorRegistry>,
    metrics: Arc<ForwarderMetrics>,
    /// Rewritten name → original computation names.
    rewrite_table: Arc<Mutex<HashMap<Name, Vec<Name>>>>,
    /// Requested name → computations awaiting it.
    pending_requests: Arc<Mutex<HashMap<Name, Vec<Name>>>>,
    computations: HashMap<Name, Computation>,
    max_computations: usize,
    queue_capacity: usize,
}

impl NfnLayer {
    pub fn new(
        cs: Arc<Mutex<ContentStore>>,
        fib: Arc<Mutex<ForwardingInformationBase>>,
        executors: Arc<ExecutorRegistry>,
        metrics: Arc<ForwarderMetrics>,
        max_computations: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            cs,
            fib,
            executors,
            metrics,
            rewrite_table: Arc::new(Mutex::new(HashMap::new())),
            pending_requests: Arc::new(Mutex::new(HashMap::new())),
            computations: HashMap::new(),
            max_computations,
            queue_capacity,
        }
    }

    fn is_computation(name: &Name) -> bool {
        name.last()
            .map(|c| c.as_bytes().as_ref() == NFN_MARKER)
            .unwrap_or(false)
    }

    async fn handle_interest(&mut self, ctx: &LayerCtx, interest: Interest) {
        if !Self::is_computation(&interest.name) {
            debug!("ignoring non-computation interest {}", interest.name);
            return;
        }

        self.computations.retain(|_, c| !c.is_finished());

        if self.computations.contains_key(&interest.name) {
            debug!("computation {} already running", interest.name);
            return;
        }
        if self.computations.len() >= self.max_computations {
            warn!("computation queue full, rejecting {}", interest.name);
            ctx.send_lower(Envelope::packet(
                None,
                Packet::Nack(Nack::new(NackReason::CompQueueFull, interest)),
            ))
            .await;
            return;
        }

        info!("starting computation {}", interest.name);
        self.metrics.computations_spawned.increment();

        let (out_tx, out_rx) = mpsc::channel(self.queue_capacity);
        let handle = Evaluator::spawn(
            interest.clone(),
            Arc::clone(&self.cs),
            Arc::clone(&self.fib),
            Arc::clone(&self.executors),
            Arc::clone(&self.rewrite_table),
            out_tx,
            self.queue_capacity,
        );
        let relay = self.spawn_relay(ctx, interest.clone(), out_rx);

        let EvaluatorHandle { in_tx, task } = handle;
        self.computations.insert(
            interest.name.clone(),
            Computation {
                interest,
                in_tx,
                task,
                relay,
            },
        );
    }

    /// Translates evaluator outputs into downward envelopes.
    fn spawn_relay(
        &self,
        ctx: &LayerCtx,
        interest: Interest,
        mut out_rx: mpsc::Receiver<EvaluatorOutput>,
    ) -> JoinHandle<()> {
        let to_lower = ctx.lower_sender();
        let pending_requests = Arc::clone(&self.pending_requests);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            let Some(to_lower) = to_lower else {
                warn!("nfn layer has no lower layer");
                return;
            };
            while let Some(output) = out_rx.recv().await {
                match output {
                    EvaluatorOutput::RewrittenInterests(interests) => {
                        for rewritten in interests {
                            let _ = to_lower
                                .send(Envelope::packet(None, Packet::Interest(rewritten)))
                                .await;
                        }
                    }
                    EvaluatorOutput::SubInterest(sub) => {
                        pending_requests
                            .lock()
                            .await
                            .entry(sub.name.clone())
                            .or_default()
                            .push(interest.name.clone());
                        let _ = to_lower
                            .send(Envelope::packet(None, Packet::Interest(sub)))
                            .await;
                    }
                    EvaluatorOutput::Result(content) => {
                        metrics.computations_completed.increment();
                        let _ = to_lower
                            .send(Envelope::packet(None, Packet::Content(content)))
                            .await;
                    }
                    EvaluatorOutput::Failed(reason) => {
                        metrics.computations_failed.increment();
                        let nack = Nack::new(reason, interest.clone());
                        let _ = to_lower
                            .send(Envelope::packet(None, Packet::Nack(nack)))
                            .await;
                    }
                }
            }
        })
    }

    async fn handle_content(&mut self, ctx: &LayerCtx, content: Content) {
        // A rewritten computation resolved remotely; answer the
        // originals.
        let originals = self.rewrite_table.lock().await.remove(&content.name);
        if let Some(originals) = originals {
            for original in originals {
                debug!("mapping {} back to {}", content.name, original);
                let mapped = Content::new(original, content.payload.clone());
                ctx.send_lower(Envelope::packet(None, Packet::Content(mapped)))
                    .await;
            }
            return;
        }

        // A parameter or function body some evaluator is waiting for.
        let waiting = self.pending_requests.lock().await.remove(&content.name);
        if let Some(waiting) = waiting {
            for computation in waiting {
                if let Some(computation) = self.computations.get(&computation) {
                    let _ = computation.in_tx.send(content.clone()).await;
                }
            }
            return;
        }

        debug!("nfn layer has no consumer for {}", content.name);
    }

    async fn handle_nack(&mut self, ctx: &LayerCtx, nack: Nack) {
        // The computation's own entry died upstream; terminate it.
        if let Some(computation) = self.computations.remove(&nack.name) {
            info!("terminating computation {} ({})", nack.name, nack.reason);
            self.metrics.computations_failed.increment();
            computation.terminate();
            return;
        }

        // A rewrite failed remotely; fail the originals.
        let originals = self.rewrite_table.lock().await.remove(&nack.name);
        if let Some(originals) = originals {
            for original in originals {
                let mapped = Nack::new(nack.reason, Interest::new(original));
                ctx.send_lower(Envelope::packet(None, Packet::Nack(mapped)))
                    .await;
            }
            return;
        }

        // A requested parameter is unavailable; the waiting computations
        // cannot finish.
        let waiting = self.pending_requests.lock().await.remove(&nack.name);
        if let Some(waiting) = waiting {
            for name in waiting {
                if let Some(computation) = self.computations.remove(&name) {
                    warn!(
                        "parameter {} unavailable, aborting {}",
                        nack.name, name
                    );
                    self.metrics.computations_failed.increment();
                    computation.terminate();
                    let aborted = Nack::new(
                        NackReason::CompParamUnavailable,
                        computation.interest.clone(),
                    );
                    ctx.send_lower(Envelope::packet(None, Packet::Nack(aborted)))
                        .await;
                }
            }
        }
    }
}

#[async_trait]
impl Layer for NfnLayer {
    fn layer_name(&self) -> &'static str {
        "nfn"
    }

    async fn stop(&mut self) {
        for computation in self.computations.values() {
            computation.terminate();
        }
        self.computations.clear();
    }

    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        let Message::Packet(packet) = envelope.message else {
            warn!("nfn layer expects typed packets");
            return;
        };
        match packet {
            Packet::Interest(interest) => self.handle_interest(ctx, interest).await,
            Packet::Content(content) => self.handle_content(ctx, content).await,
            Packet::Nack(nack) => self.handle_nack(ctx, nack).await,
            Packet::Unknown(_) => debug!("nfn layer dropping unknown packet"),
        }
    }

    async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        ctx.send_lower(envelope).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::parser::NfnParser;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct JoinExecutor;

    impl Executor for JoinExecutor {
        fn execute(&self, _code: &str, params: &[Bytes]) -> rust_nfn_common::Result<Bytes> {
            let mut joined = Vec::new();
            for param in params {
                joined.extend_from_slice(param);
            }
            Ok(Bytes::from(joined))
        }
    }

    fn layer_with_fib(
        fib: Arc<Mutex<ForwardingInformationBase>>,
    ) -> (NfnLayer, Arc<Mutex<ContentStore>>) {
        let cs = Arc::new(Mutex::new(ContentStore::new(64, Duration::from_secs(10))));
        let mut executors: ExecutorRegistry = HashMap::new();
        executors.insert("TEST".to_string(), Arc::new(JoinExecutor));
        let layer = NfnLayer::new(
            Arc::clone(&cs),
            fib,
            Arc::new(executors),
            Arc::new(ForwarderMetrics::new()),
            4,
            16,
        );
        (layer, cs)
    }

    async fn recv_packet(rx: &mut mpsc::Receiver<Envelope>) -> Packet {
        let envelope = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        match envelope.message {
            Message::Packet(packet) => packet,
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn local_computation_flows_through_the_layer() {
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let (mut layer, _cs) = layer_with_fib(fib);
        let (lower_tx, mut lower_rx) = mpsc::channel(32);
        let ctx = LayerCtx::new(Some(lower_tx), None);

        let parser = NfnParser::new();
        let name = parser.nfn_str_to_network_name("/call/func(/test/data)", None);
        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(None, Packet::Interest(Interest::new(name.clone()))),
            )
            .await;

        // The evaluator asks for the parameter and the function body.
        let mut requested = Vec::new();
        for _ in 0..2 {
            match recv_packet(&mut lower_rx).await {
                Packet::Interest(interest) => requested.push(interest.name),
                other => panic!("expected Interest, got {}", other.kind()),
            }
        }
        assert!(requested.contains(&Name::from_string("/test/data")));
        assert!(requested.contains(&Name::from_string("/call/func")));

        // Answers come back up through the layer.
        for (answer_name, payload) in [
            (Name::from_string("/test/data"), &b"payload"[..]),
            (Name::from_string("/call/func"), &b"TEST\nbody"[..]),
        ] {
            layer
                .data_from_lower(
                    &ctx,
                    Envelope::packet(
                        None,
                        Packet::Content(Content::new(answer_name, Bytes::copy_from_slice(payload))),
                    ),
                )
                .await;
        }

        match recv_packet(&mut lower_rx).await {
            Packet::Content(content) => {
                assert_eq!(content.name, name);
                assert_eq!(content.payload, Bytes::from_static(b"payload"));
            }
            other => panic!("expected Content, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn remote_data_triggers_rewrite_and_mapping_back() {
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        fib.lock()
            .await
            .add(Name::from_string("/test"), rust_nfn_common::types::FaceId(2), false);
        let (mut layer, _cs) = layer_with_fib(fib);
        let (lower_tx, mut lower_rx) = mpsc::channel(32);
        let ctx = LayerCtx::new(Some(lower_tx), None);

        let parser = NfnParser::new();
        let original = parser.nfn_str_to_network_name("/call/func(/test/data)", None);
        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(None, Packet::Interest(Interest::new(original.clone()))),
            )
            .await;

        let rewritten = match recv_packet(&mut lower_rx).await {
            Packet::Interest(interest) => interest.name,
            other => panic!("expected Interest, got {}", other.kind()),
        };
        assert_eq!(
            rewritten,
            parser.nfn_str_to_network_name(
                "/call/func(/test/data)",
                Some(&Name::from_string("/test/data"))
            )
        );

        // The remote node answers under the rewritten name; the layer
        // maps it back to the original computation name.
        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(
                    None,
                    Packet::Content(Content::new(
                        rewritten,
                        Bytes::from_static(b"remote result"),
                    )),
                ),
            )
            .await;

        match recv_packet(&mut lower_rx).await {
            Packet::Content(content) => {
                assert_eq!(content.name, original);
                assert_eq!(content.payload, Bytes::from_static(b"remote result"));
            }
            other => panic!("expected Content, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn queue_full_is_rejected_with_nack() {
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let cs = Arc::new(Mutex::new(ContentStore::new(64, Duration::from_secs(10))));
        let mut layer = NfnLayer::new(
            cs,
            fib,
            Arc::new(HashMap::new()),
            Arc::new(ForwarderMetrics::new()),
            0,
            16,
        );
        let (lower_tx, mut lower_rx) = mpsc::channel(32);
        let ctx = LayerCtx::new(Some(lower_tx), None);

        let name = NfnParser::new().nfn_str_to_network_name("/call/func()", None);
        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(None, Packet::Interest(Interest::new(name))),
            )
            .await;

        match recv_packet(&mut lower_rx).await {
            Packet::Nack(nack) => assert_eq!(nack.reason, NackReason::CompQueueFull),
            other => panic!("expected Nack, got {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn nack_for_computation_terminates_it() {
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let (mut layer, _cs) = layer_with_fib(fib);
        let (lower_tx, mut lower_rx) = mpsc::channel(32);
        let ctx = LayerCtx::new(Some(lower_tx), None);

        let name = NfnParser::new().nfn_str_to_network_name("/call/func(/test/data)", None);
        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(None, Packet::Interest(Interest::new(name.clone()))),
            )
            .await;
        // Drain the two sub-interests.
        let _ = recv_packet(&mut lower_rx).await;
        let _ = recv_packet(&mut lower_rx).await;
        assert_eq!(layer.computations.len(), 1);

        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(
                    None,
                    Packet::Nack(Nack::new(
                        NackReason::NoContent,
                        Interest::new(name),
                    )),
                ),
            )
            .await;
        assert!(layer.computations.is_empty());
    }
}
