//! Repository layer: serves static named content at the top of a
//! repository node's stack.

use crate::repo::Repository;
use crate::stack::{Envelope, Layer, LayerCtx, Message};
use async_trait::async_trait;
use log::{debug, warn};
use rust_nfn_common::packet::{Content, Nack, NackReason, Packet};
use std::sync::Arc;

pub struct RepositoryLayer {
    repo: Arc<dyn Repository>,
}

impl RepositoryLayer {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Layer for RepositoryLayer {
    fn layer_name(&self) -> &'static str {
        "repository"
    }

    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        let Message::Packet(packet) = envelope.message else {
            warn!("repository layer expects typed packets");
            return;
        };
        match packet {
            Packet::Interest(interest) => match self.repo.get(&interest.name) {
                Some(payload) => {
                    debug!("serving {}", interest.name);
                    let content = Content::new(interest.name, payload);
                    ctx.send_lower(Envelope::packet(envelope.face, Packet::Content(content)))
                        .await;
                }
                None => {
                    debug!("no content for {}", interest.name);
                    let nack = Nack::new(NackReason::NoContent, interest);
                    ctx.send_lower(Envelope::packet(envelope.face, Packet::Nack(nack)))
                        .await;
                }
            },
            other => debug!("repository layer ignoring {}", other.kind()),
        }
    }

    async fn data_from_higher(&mut self, _ctx: &LayerCtx, _envelope: Envelope) {
        warn!("repository layer is the top of the stack");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MemoryRepository;
    use bytes::Bytes;
    use rust_nfn_common::name::Name;
    use rust_nfn_common::packet::Interest;
    use rust_nfn_common::types::FaceId;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn serves_known_content_and_nacks_unknown() {
        let repo = Arc::new(MemoryRepository::new(":memory:"));
        repo.add(
            Name::from_string("/repo/known"),
            Bytes::from_static(b"payload"),
        )
        .unwrap();

        let (lower_tx, mut lower_rx) = mpsc::channel(8);
        let ctx = LayerCtx::new(Some(lower_tx), None);
        let mut layer = RepositoryLayer::new(repo);

        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(
                    Some(FaceId(1)),
                    Packet::Interest(Interest::new(Name::from_string("/repo/known"))),
                ),
            )
            .await;
        let answer = lower_rx.recv().await.unwrap();
        assert_eq!(answer.face, Some(FaceId(1)));
        match answer.message {
            Message::Packet(Packet::Content(content)) => {
                assert_eq!(content.payload, Bytes::from_static(b"payload"));
                assert_eq!(content.name, Name::from_string("/repo/known"));
            }
            other => panic!("expected Content, got {:?}", other),
        }

        layer
            .data_from_lower(
                &ctx,
                Envelope::packet(
                    Some(FaceId(1)),
                    Packet::Interest(Interest::new(Name::from_string("/repo/missing"))),
                ),
            )
            .await;
        let answer = lower_rx.recv().await.unwrap();
        match answer.message {
            Message::Packet(Packet::Nack(nack)) => {
                assert_eq!(nack.reason, NackReason::NoContent)
            }
            other => panic!("expected Nack, got {:?}", other),
        }
    }
}
