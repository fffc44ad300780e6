//! UDP link layer.
//!
//! Owns a datagram socket, frames on datagram boundaries, and maps
//! `(address, port)` pairs onto face ids. Everything above this layer
//! deals in face ids only.

use crate::stack::{Envelope, Layer, LayerCtx, Message};
use async_trait::async_trait;
use log::{debug, warn};
use rust_nfn_common::types::{FaceId, MAX_NDN_PACKET_SIZE};
use rust_nfn_common::{Error, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct FaceInfo {
    addr: SocketAddr,
    static_face: bool,
}

#[derive(Debug, Default)]
struct FaceTableInner {
    by_addr: HashMap<SocketAddr, FaceId>,
    by_id: HashMap<FaceId, FaceInfo>,
    next_id: u32,
}

/// Bidirectional `(address, port) ↔ face id` mapping.
///
/// Shared between the link layer and the layers that create faces on
/// their own (routing, autoconfig, management).
#[derive(Debug, Default)]
pub struct FaceTable {
    inner: Mutex<FaceTableInner>,
}

impl FaceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the face for `addr`, creating one if needed. A face once
    /// marked static stays static.
    pub fn get_or_create(&self, addr: SocketAddr, static_face: bool) -> FaceId {
        let mut inner = self.inner.lock().expect("face table poisoned");
        if let Some(&face) = inner.by_addr.get(&addr) {
            if static_face {
                if let Some(info) = inner.by_id.get_mut(&face) {
                    info.static_face = true;
                }
            }
            return face;
        }
        let face = FaceId(inner.next_id);
        inner.next_id += 1;
        inner.by_addr.insert(addr, face);
        inner.by_id.insert(face, FaceInfo { addr, static_face });
        face
    }

    pub fn addr_of(&self, face: FaceId) -> Option<SocketAddr> {
        let inner = self.inner.lock().expect("face table poisoned");
        inner.by_id.get(&face).map(|info| info.addr)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("face table poisoned").by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Datagram link layer bound to one UDP socket.
pub struct UdpLinkLayer {
    socket: Arc<UdpSocket>,
    faces: Arc<FaceTable>,
    recv_task: Option<JoinHandle<()>>,
}

impl UdpLinkLayer {
    /// Binds the socket; `broadcast` enables sending to broadcast
    /// addresses (needed by the autoconfig solicitation).
    pub async fn bind(addr: &str, broadcast: bool, faces: Arc<FaceTable>) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        if broadcast {
            socket.set_broadcast(true)?;
        }
        Ok(Self {
            socket: Arc::new(socket),
            faces,
            recv_task: None,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Error::Io)
    }
}

#[async_trait]
impl Layer for UdpLinkLayer {
    fn layer_name(&self) -> &'static str {
        "link"
    }

    async fn start(&mut self, ctx: &LayerCtx) {
        let socket = Arc::clone(&self.socket);
        let faces = Arc::clone(&self.faces);
        let Some(to_higher) = ctx.higher_sender() else {
            warn!("link layer has no layer above; not receiving");
            return;
        };

        self.recv_task = Some(tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_NDN_PACKET_SIZE];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok((len, addr)) => {
                        let face = faces.get_or_create(addr, false);
                        debug!("received {} bytes from {} on {}", len, addr, face);
                        let bytes = bytes::Bytes::copy_from_slice(&buf[..len]);
                        if to_higher.send(Envelope::wire(face, bytes)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("socket receive failed: {}", e);
                        break;
                    }
                }
            }
        }));
    }

    async fn stop(&mut self) {
        if let Some(task) = self.recv_task.take() {
            task.abort();
        }
    }

    async fn data_from_lower(&mut self, _ctx: &LayerCtx, _envelope: Envelope) {
        warn!("link layer is the bottom of the stack");
    }

    async fn data_from_higher(&mut self, _ctx: &LayerCtx, envelope: Envelope) {
        let Message::Wire(bytes) = envelope.message else {
            warn!("link layer expects wire bytes from above");
            return;
        };
        let Some(face) = envelope.face else {
            warn!("link layer needs a face id to transmit");
            return;
        };
        let Some(addr) = self.faces.addr_of(face) else {
            warn!("unknown face {}", face);
            return;
        };
        if let Err(e) = self.socket.send_to(&bytes, addr).await {
            warn!("send to {} failed: {}", addr, e);
        }
    }
}
