//! Packet-encoding layer: the wire ↔ typed-packet boundary.

use crate::stack::{Envelope, Layer, LayerCtx, Message};
use async_trait::async_trait;
use log::{debug, warn};
use rust_nfn_common::codec::NdnTlvCodec;

/// Decodes incoming wire bytes into typed packets and encodes outgoing
/// packets into NDN-TLV.
///
/// Bytes that fail to decode travel upward as `Packet::Unknown`; the
/// ICN layer drops them.
#[derive(Debug, Default)]
pub struct PacketEncodingLayer {
    codec: NdnTlvCodec,
}

impl PacketEncodingLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Layer for PacketEncodingLayer {
    fn layer_name(&self) -> &'static str {
        "packet-encoding"
    }

    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        let Message::Wire(bytes) = envelope.message else {
            warn!("packet-encoding layer expects wire bytes from below");
            return;
        };
        let packet = self.codec.decode(&bytes);
        debug!("decoded {} from {:?}", packet.kind(), envelope.face);
        ctx.send_higher(Envelope::packet(envelope.face, packet)).await;
    }

    async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        let Message::Packet(packet) = envelope.message else {
            warn!("packet-encoding layer expects typed packets from above");
            return;
        };
        let Some(face) = envelope.face else {
            warn!("dropping {} without an outgoing face", packet.kind());
            return;
        };
        let bytes = self.codec.encode(&packet);
        ctx.send_lower(Envelope::wire(face, bytes)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::LayerStack;
    use rust_nfn_common::name::Name;
    use rust_nfn_common::packet::{Interest, Packet};
    use rust_nfn_common::types::FaceId;
    use std::time::Duration;

    /// Bottom layer echoing wire bytes back up, simulating a loopback link.
    struct WireEcho;

    #[async_trait]
    impl Layer for WireEcho {
        fn layer_name(&self) -> &'static str {
            "wire-echo"
        }

        async fn data_from_lower(&mut self, _ctx: &LayerCtx, _envelope: Envelope) {}

        async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope) {
            ctx.send_higher(envelope).await;
        }
    }

    #[tokio::test]
    async fn encode_then_decode_through_the_layer() {
        let mut stack = LayerStack::start(
            vec![Box::new(PacketEncodingLayer::new()), Box::new(WireEcho)],
            8,
        );

        let interest = Interest::new(Name::from_string("/test/codec"));
        stack
            .send_from_higher(Envelope::packet(
                Some(FaceId(1)),
                Packet::Interest(interest),
            ))
            .await;

        let envelope = tokio::time::timeout(Duration::from_secs(1), stack.recv_to_higher())
            .await
            .expect("timed out")
            .expect("stack closed");
        match envelope.message {
            Message::Packet(Packet::Interest(i)) => {
                assert_eq!(i.name, Name::from_string("/test/codec"))
            }
            other => panic!("unexpected message: {:?}", other),
        }

        stack.stop().await;
    }
}
