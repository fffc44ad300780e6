//! The `fetch` subcommand: one Interest, one answer.

use anyhow::{anyhow, Context, Result};
use rust_nfn_common::codec::NdnTlvCodec;
use rust_nfn_common::name::Name;
use rust_nfn_common::packet::Packet;
use rust_nfn_common::types::MAX_NDN_PACKET_SIZE;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

pub async fn run(name: String, forwarder: String, timeout_ms: u64) -> Result<()> {
    let name = Name::from_string(&name);
    let codec = NdnTlvCodec::new();

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket
        .connect(&forwarder)
        .await
        .with_context(|| format!("connecting to {}", forwarder))?;

    let wire = codec.encode_interest(&name);
    socket.send(&wire).await?;

    let mut buf = vec![0u8; MAX_NDN_PACKET_SIZE];
    let deadline = Duration::from_millis(timeout_ms);
    loop {
        let len = timeout(deadline, socket.recv(&mut buf))
            .await
            .map_err(|_| anyhow!("timed out waiting for {}", name))??;
        match codec.decode(&buf[..len]) {
            Packet::Content(content) if content.name == name => {
                println!("{}", content.payload_str());
                return Ok(());
            }
            Packet::Nack(nack) if nack.name == name => {
                return Err(anyhow!("request rejected: {}", nack.reason));
            }
            other => log::debug!("ignoring {} while waiting", other.kind()),
        }
    }
}
