//! Autoconfiguration handshake layers.
//!
//! A forwarder runs [`AutoconfigServerLayer`], answering solicitations
//! on `/autoconfig/forwarders` and service registrations under
//! `/autoconfig/service`. A repository runs [`AutoconfigRepoLayer`] to
//! find a forwarder and register its served prefix; a consumer runs
//! [`AutoconfigClientLayer`] to find a forwarder and route its
//! Interests there.

use crate::layers::{autoconfig_prefix, forwarders_name, service_registration_prefix, FaceTable};
use crate::repo::Repository;
use crate::stack::{Envelope, Layer, LayerCtx, Message};
use crate::tables::ForwardingInformationBase;
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info, warn};
use rust_nfn_common::name::Name;
use rust_nfn_common::packet::{Content, Interest, Nack, NackReason, Packet};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/* ---------------------------------------------------------------- *
 * Server side
 * ---------------------------------------------------------------- */

/// What a forwarder advertises to soliciting peers.
#[derive(Debug, Clone)]
pub enum ServerAdvertisement {
    /// `<host>:<port>` plus one `p:<prefix>` line per registration
    /// prefix; answers repositories looking for a home.
    RepoRegistration { prefixes: Vec<Name> },
    /// `udp4://<addr>` plus one `r:<distance>:<prefix>` line per route;
    /// answers routing nodes building their RIB.
    Routes { routes: Vec<(Name, i64)> },
}

pub struct AutoconfigServerLayer {
    faces: Arc<FaceTable>,
    fib: Arc<Mutex<ForwardingInformationBase>>,
    local_addr: SocketAddr,
    advertisement: ServerAdvertisement,
}

impl AutoconfigServerLayer {
    pub fn new(
        faces: Arc<FaceTable>,
        fib: Arc<Mutex<ForwardingInformationBase>>,
        local_addr: SocketAddr,
        advertisement: ServerAdvertisement,
    ) -> Self {
        Self {
            faces,
            fib,
            local_addr,
            advertisement,
        }
    }

    fn advertisement_payload(&self) -> String {
        let mut payload = String::new();
        match &self.advertisement {
            ServerAdvertisement::RepoRegistration { prefixes } => {
                let _ = writeln!(payload, "{}:{}", self.local_addr.ip(), self.local_addr.port());
                for prefix in prefixes {
                    let _ = writeln!(payload, "p:{}", prefix);
                }
            }
            ServerAdvertisement::Routes { routes } => {
                let _ = writeln!(payload, "udp4://{}", self.local_addr);
                for (prefix, distance) in routes {
                    let _ = writeln!(payload, "r:{}:{}", distance, prefix);
                }
            }
        }
        payload
    }

    async fn handle_solicitation(
        &self,
        ctx: &LayerCtx,
        face: Option<rust_nfn_common::types::FaceId>,
        interest: Interest,
    ) {
        let payload = self.advertisement_payload();
        debug!("answering forwarder solicitation from {:?}", face);
        let content = Content::new(interest.name, Bytes::from(payload.into_bytes()));
        ctx.send_lower(Envelope::packet(face, Packet::Content(content)))
            .await;
    }

    /// Registration Interests look like
    /// `/autoconfig/service/<addr>:<port>/<prefix...>/<service_name>`.
    async fn handle_registration(
        &self,
        ctx: &LayerCtx,
        face: Option<rust_nfn_common::types::FaceId>,
        interest: Interest,
    ) {
        let name = &interest.name;
        let decline =
            |reason| Envelope::packet(face, Packet::Nack(Nack::new(reason, interest.clone())));

        if name.len() < 5 {
            warn!("malformed service registration: {}", name);
            ctx.send_lower(decline(NackReason::NoRoute)).await;
            return;
        }
        let Some(addr_component) = name.get(2) else {
            return;
        };
        let addr_str = String::from_utf8_lossy(addr_component.as_bytes());
        let Ok(addr) = addr_str.parse::<SocketAddr>() else {
            warn!("unparsable service address: {}", addr_str);
            ctx.send_lower(decline(NackReason::NoRoute)).await;
            return;
        };

        // Everything after the address: the prefix plus the service name.
        let served = name.suffix(3);
        let allowed = match &self.advertisement {
            ServerAdvertisement::RepoRegistration { prefixes } => prefixes
                .iter()
                .any(|prefix| prefix.is_prefix_of(&served)),
            ServerAdvertisement::Routes { .. } => false,
        };
        if !allowed {
            info!("declining registration for {}", served);
            ctx.send_lower(decline(NackReason::NoRoute)).await;
            return;
        }

        let face = self.faces.get_or_create(addr, true);
        self.fib.lock().await.add(served.clone(), face, true);
        info!("registered {} via {} ({})", served, face, addr);

        let content = Content::new(
            interest.name.clone(),
            Bytes::from(served.to_string().into_bytes()),
        );
        ctx.send_lower(Envelope::packet(Some(face), Packet::Content(content)))
            .await;
    }
}

#[async_trait]
impl Layer for AutoconfigServerLayer {
    fn layer_name(&self) -> &'static str {
        "autoconfig-server"
    }

    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        let face = envelope.face;
        let interest = match &envelope.message {
            Message::Packet(Packet::Interest(interest))
                if autoconfig_prefix().is_prefix_of(&interest.name) =>
            {
                interest.clone()
            }
            _ => {
                ctx.send_higher(envelope).await;
                return;
            }
        };

        if forwarders_name().is_prefix_of(&interest.name) {
            self.handle_solicitation(ctx, face, interest).await;
        } else if service_registration_prefix().is_prefix_of(&interest.name) {
            self.handle_registration(ctx, face, interest).await;
        } else {
            debug!("dropping unhandled autoconfig interest {}", interest.name);
        }
    }

    async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        ctx.send_lower(envelope).await;
    }
}

/* ---------------------------------------------------------------- *
 * Solicitation helper shared by the client-side layers
 * ---------------------------------------------------------------- */

struct Solicitor {
    faces: Arc<FaceTable>,
    broadcast_addr: SocketAddr,
    timeout: Option<Duration>,
    max_retry: u32,
    task: Option<JoinHandle<()>>,
}

impl Solicitor {
    fn new(
        faces: Arc<FaceTable>,
        broadcast_addr: SocketAddr,
        timeout: Option<Duration>,
        max_retry: u32,
    ) -> Self {
        Self {
            faces,
            broadcast_addr,
            timeout,
            max_retry,
            task: None,
        }
    }

    /// Sends the first solicitation and schedules bounded retries.
    /// Exhausting the retries reports a fatal error on `failed`.
    async fn start(&mut self, ctx: &LayerCtx, failed: mpsc::Sender<()>) {
        let face = self.faces.get_or_create(self.broadcast_addr, true);
        ctx.send_lower(Envelope::packet(
            Some(face),
            Packet::Interest(Interest::new(forwarders_name())),
        ))
        .await;

        let Some(timeout) = self.timeout else {
            return;
        };
        let retries = self.max_retry;
        let to_lower = ctx.lower_sender();
        self.task = Some(tokio::spawn(async move {
            let mut remaining = retries;
            loop {
                tokio::time::sleep(timeout).await;
                if remaining <= 1 {
                    error!("no forwarder solicitation answered in time");
                    let _ = failed.send(()).await;
                    return;
                }
                remaining -= 1;
                info!("soliciting forwarders (retry, {} attempts left)", remaining);
                if let Some(to_lower) = &to_lower {
                    let _ = to_lower
                        .send(Envelope::packet(
                            Some(face),
                            Packet::Interest(Interest::new(forwarders_name())),
                        ))
                        .await;
                }
            }
        }));
    }

    /// A forwarder answered; stop retrying.
    fn satisfied(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/* ---------------------------------------------------------------- *
 * Repository side
 * ---------------------------------------------------------------- */

pub struct AutoconfigRepoLayer {
    service_name: String,
    repo: Arc<dyn Repository>,
    faces: Arc<FaceTable>,
    /// Address under which this repository is reachable; announced in
    /// the registration name.
    announced_addr: SocketAddr,
    solicitor: Solicitor,
    /// Signals unrecoverable autoconfiguration failure to the runner.
    failed: mpsc::Sender<()>,
}

impl AutoconfigRepoLayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        service_name: impl Into<String>,
        repo: Arc<dyn Repository>,
        faces: Arc<FaceTable>,
        announced_addr: SocketAddr,
        broadcast_addr: SocketAddr,
        solicitation_timeout: Option<Duration>,
        solicitation_max_retry: u32,
        failed: mpsc::Sender<()>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            repo,
            faces: Arc::clone(&faces),
            announced_addr,
            solicitor: Solicitor::new(
                faces,
                broadcast_addr,
                solicitation_timeout,
                solicitation_max_retry,
            ),
            failed,
        }
    }

    /// Forwarder advertisement: `<host>:<port>` then `p:<prefix>` lines.
    /// One registration Interest is sent per offered prefix.
    async fn handle_forwarders(&mut self, ctx: &LayerCtx, content: &Content) {
        self.solicitor.satisfied();
        if content.payload.first() == Some(&0x80) {
            error!("cannot handle the autoconfig binary wire format");
            return;
        }
        let payload = content.payload_str().into_owned();
        let mut lines = payload.lines();
        let Some(first) = lines.next() else {
            warn!("empty forwarder advertisement");
            return;
        };
        let Ok(forwarder_addr) = first.parse::<SocketAddr>() else {
            warn!("unparsable forwarder address: {}", first);
            return;
        };
        info!("forwarder: {}", forwarder_addr);
        let face = self.faces.get_or_create(forwarder_addr, true);

        for line in lines {
            let line = line.trim();
            let Some(prefix) = line.strip_prefix("p:") else {
                continue;
            };
            let prefix = Name::from_string(prefix);
            info!("got prefix {}", prefix);

            let mut registration = service_registration_prefix();
            registration.push_str(&self.announced_addr.to_string());
            registration.append(&prefix);
            registration.push_str(&self.service_name);
            info!("registering service {}", registration);
            ctx.send_lower(Envelope::packet(
                Some(face),
                Packet::Interest(Interest::new(registration)),
            ))
            .await;
        }
    }

    fn handle_registration_reply(&mut self, packet: &Packet) {
        match packet {
            Packet::Nack(nack) => {
                error!("service registration declined: {}", nack.reason);
            }
            Packet::Content(content) => {
                // Components after /autoconfig/service/<addr>:<port> are
                // the prefix this repository now serves.
                let prefix = content.name.suffix(3);
                info!("service registration accepted: {}", prefix);
                self.repo.set_prefix(prefix);
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Layer for AutoconfigRepoLayer {
    fn layer_name(&self) -> &'static str {
        "autoconfig-repo"
    }

    async fn start(&mut self, ctx: &LayerCtx) {
        info!("soliciting forwarders");
        let failed = self.failed.clone();
        self.solicitor.start(ctx, failed).await;
    }

    async fn stop(&mut self) {
        self.solicitor.satisfied();
    }

    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        let Message::Packet(packet) = &envelope.message else {
            warn!("autoconfig layer expects typed packets");
            return;
        };
        let Some(name) = packet.name() else {
            return;
        };
        if !autoconfig_prefix().is_prefix_of(name) {
            ctx.send_higher(envelope).await;
            return;
        }
        if forwarders_name().is_prefix_of(name) {
            if let Packet::Content(content) = packet {
                info!("received forwarder info");
                let content = content.clone();
                self.handle_forwarders(ctx, &content).await;
            }
        } else if service_registration_prefix().is_prefix_of(name) {
            self.handle_registration_reply(packet);
        }
    }

    async fn data_from_higher(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        ctx.send_lower(envelope).await;
    }
}

/* ---------------------------------------------------------------- *
 * Consumer side
 * ---------------------------------------------------------------- */

pub struct AutoconfigClientLayer {
    faces: Arc<FaceTable>,
    forwarder: Option<rust_nfn_common::types::FaceId>,
    /// Traffic from above, held until a forwarder is known.
    pending: Vec<Envelope>,
    solicitor: Solicitor,
    failed: mpsc::Sender<()>,
}

impl AutoconfigClientLayer {
    pub fn new(
        faces: Arc<FaceTable>,
        broadcast_addr: SocketAddr,
        solicitation_timeout: Option<Duration>,
        solicitation_max_retry: u32,
        failed: mpsc::Sender<()>,
    ) -> Self {
        Self {
            faces: Arc::clone(&faces),
            forwarder: None,
            pending: Vec::new(),
            solicitor: Solicitor::new(
                faces,
                broadcast_addr,
                solicitation_timeout,
                solicitation_max_retry,
            ),
            failed,
        }
    }
}

#[async_trait]
impl Layer for AutoconfigClientLayer {
    fn layer_name(&self) -> &'static str {
        "autoconfig-client"
    }

    async fn start(&mut self, ctx: &LayerCtx) {
        info!("soliciting forwarders");
        let failed = self.failed.clone();
        self.solicitor.start(ctx, failed).await;
    }

    async fn stop(&mut self) {
        self.solicitor.satisfied();
    }

    async fn data_from_lower(&mut self, ctx: &LayerCtx, envelope: Envelope) {
        if let Message::Packet(Packet::Content(content)) = &envelope.message {
            if content.name == forwarders_name() {
                self.solicitor.satisfied();
                if content.payload.first() == Some(&0x80) {
                    error!("cannot handle the autoconfig binary wire format");
                    return;
                }
                let payload = content.payload_str().into_owned();
                let Some(first) = payload.lines().next() else {
                    return;
                };
                let Ok(addr) = first.parse::<SocketAddr>() else {
                    warn!("unparsable forwarder address: {}", first);
                    return;
                };
                let face = self.faces.get_or_create(addr, true);
                info!("using forwarder {} ({})", face, addr);
                self.forwarder = Some(face);
                for mut envelope in self.pending.drain(..) {
                    envelope.face = Some(face);
                    ctx.send_lower(envelope).await;
                }
                return;
            }
        }
        ctx.send_higher(envelope).await;
    }

    async fn data_from_higher(&mut self, ctx: &LayerCtx, mut envelope: Envelope) {
        match self.forwarder {
            Some(face) => {
                envelope.face = Some(face);
                ctx.send_lower(envelope).await;
            }
            None => {
                debug!("holding traffic until a forwarder is found");
                self.pending.push(envelope);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MemoryRepository;

    #[test]
    fn repo_registration_payload_shape() {
        let faces = Arc::new(FaceTable::new());
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let layer = AutoconfigServerLayer::new(
            faces,
            fib,
            "127.0.0.1:9000".parse().unwrap(),
            ServerAdvertisement::RepoRegistration {
                prefixes: vec![Name::from_string("/test/prefix/repos")],
            },
        );
        assert_eq!(
            layer.advertisement_payload(),
            "127.0.0.1:9000\np:/test/prefix/repos\n"
        );
    }

    #[test]
    fn route_advertisement_payload_shape() {
        let faces = Arc::new(FaceTable::new());
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let layer = AutoconfigServerLayer::new(
            faces,
            fib,
            "10.0.0.1:9000".parse().unwrap(),
            ServerAdvertisement::Routes {
                routes: vec![
                    (Name::from_string("/ndn/ch/unibas"), 2),
                    (Name::from_string("/untagged"), -1),
                ],
            },
        );
        assert_eq!(
            layer.advertisement_payload(),
            "udp4://10.0.0.1:9000\nr:2:/ndn/ch/unibas\nr:-1:/untagged\n"
        );
    }

    #[tokio::test]
    async fn registration_reply_sets_repo_prefix() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new("testrepo"));
        let faces = Arc::new(FaceTable::new());
        let (failed_tx, _failed_rx) = mpsc::channel(1);
        let mut layer = AutoconfigRepoLayer::new(
            "testrepo",
            Arc::clone(&repo),
            faces,
            "127.0.0.1:9001".parse().unwrap(),
            "127.255.255.255:9000".parse().unwrap(),
            None,
            3,
            failed_tx,
        );

        let reply = Packet::Content(Content::new(
            Name::from_string("/autoconfig/service/127.0.0.1:9001/test/prefix/repos/testrepo"),
            Bytes::new(),
        ));
        layer.handle_registration_reply(&reply);
        assert_eq!(
            repo.prefix(),
            Name::from_string("/test/prefix/repos/testrepo")
        );
    }
}
