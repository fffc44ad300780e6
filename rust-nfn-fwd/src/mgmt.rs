//! Management protocol: a local TCP channel with line-based text
//! commands.
//!
//! Requests are single lines (`shutdown`, `getrepoprefix`,
//! `getrepopath`, `newface host:port`, `newforwardingrule
//! prefix:faceid`, `newcontent name:content`); every request is
//! answered with a single line, `error` for anything syntactically or
//! semantically invalid.

use crate::layers::FaceTable;
use crate::repo::Repository;
use crate::tables::{ContentStore, ForwardingInformationBase};
use bytes::Bytes;
use log::{info, warn};
use rust_nfn_common::name::Name;
use rust_nfn_common::packet::Content;
use rust_nfn_common::types::FaceId;
use rust_nfn_common::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Handles the management server operates on. Every field is optional;
/// commands touching an absent facility answer `error`.
#[derive(Clone, Default)]
pub struct MgmtHandles {
    pub fib: Option<Arc<Mutex<ForwardingInformationBase>>>,
    pub cs: Option<Arc<Mutex<ContentStore>>>,
    pub faces: Option<Arc<FaceTable>>,
    pub repo: Option<Arc<dyn Repository>>,
    /// Signalled when a `shutdown` command arrives.
    pub shutdown: Option<mpsc::Sender<()>>,
}

pub struct MgmtServer {
    listener: TcpListener,
    handles: MgmtHandles,
}

impl MgmtServer {
    pub async fn bind(addr: &str, handles: MgmtHandles) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, handles })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Error::Io)
    }

    /// Accepts connections until the task is cancelled.
    pub fn run(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match self.listener.accept().await {
                    Ok((stream, peer)) => {
                        let handles = self.handles.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handles).await {
                                warn!("management connection from {} failed: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("management accept failed: {}", e);
                        break;
                    }
                }
            }
        })
    }
}

async fn handle_connection(stream: TcpStream, handles: MgmtHandles) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        let reply = dispatch(line.trim(), &handles).await;
        write_half.write_all(reply.as_bytes()).await?;
        write_half.write_all(b"\n").await?;
    }
    Ok(())
}

async fn dispatch(request: &str, handles: &MgmtHandles) -> String {
    let (command, param) = match request.split_once(' ') {
        Some((command, param)) => (command, Some(param)),
        None => (request, None),
    };

    match (command, param) {
        ("shutdown", None) => {
            info!("shutdown requested via management channel");
            if let Some(shutdown) = &handles.shutdown {
                let _ = shutdown.send(()).await;
            }
            "shutdown".to_string()
        }
        ("getrepoprefix", None) => match &handles.repo {
            Some(repo) => repo.prefix().to_string(),
            None => "error".to_string(),
        },
        ("getrepopath", None) => match &handles.repo {
            Some(repo) => repo.path(),
            None => "error".to_string(),
        },
        ("newface", Some(param)) => new_face(param, handles).await,
        ("newforwardingrule", Some(param)) => new_forwarding_rule(param, handles).await,
        ("newcontent", Some(param)) => new_content(param, handles).await,
        _ => "error".to_string(),
    }
}

async fn new_face(param: &str, handles: &MgmtHandles) -> String {
    let Some(faces) = &handles.faces else {
        return "error".to_string();
    };
    let Ok(addr) = param.parse::<SocketAddr>() else {
        return "error".to_string();
    };
    let face = faces.get_or_create(addr, true);
    info!("management created face {} for {}", face, addr);
    face.0.to_string()
}

async fn new_forwarding_rule(param: &str, handles: &MgmtHandles) -> String {
    let Some(fib) = &handles.fib else {
        return "error".to_string();
    };
    let Some((prefix, face)) = param.rsplit_once(':') else {
        return "error".to_string();
    };
    let Ok(face) = face.parse::<u32>() else {
        return "error".to_string();
    };
    let name = Name::from_string(prefix);
    if name.is_empty() {
        return "error".to_string();
    }
    fib.lock().await.add(name, FaceId(face), true);
    face.to_string()
}

async fn new_content(param: &str, handles: &MgmtHandles) -> String {
    let Some((name, content)) = param.split_once(':') else {
        return "error".to_string();
    };
    let name = Name::from_string(name);
    if name.is_empty() {
        return "error".to_string();
    }
    let payload = Bytes::copy_from_slice(content.as_bytes());
    if let Some(repo) = &handles.repo {
        if repo.add(name.clone(), payload.clone()).is_err() {
            return "error".to_string();
        }
        return name.to_string();
    }
    if let Some(cs) = &handles.cs {
        cs.lock().await.add(Content::new(name.clone(), payload), true);
        return name.to_string();
    }
    "error".to_string()
}

/// Client side of the management protocol.
pub struct MgmtClient {
    addr: SocketAddr,
}

impl MgmtClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    async fn request(&self, line: &str) -> Result<String> {
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;
        let reply = reply.trim_end().to_string();
        if reply == "error" {
            return Err(Error::Mgmt(format!("request rejected: {}", line)));
        }
        Ok(reply)
    }

    pub async fn shutdown(&self) -> Result<String> {
        self.request("shutdown").await
    }

    pub async fn get_repo_prefix(&self) -> Result<String> {
        self.request("getrepoprefix").await
    }

    pub async fn get_repo_path(&self) -> Result<String> {
        self.request("getrepopath").await
    }

    pub async fn add_face(&self, host: &str, port: u16) -> Result<String> {
        self.request(&format!("newface {}:{}", host, port)).await
    }

    pub async fn add_forwarding_rule(&self, prefix: &Name, face: FaceId) -> Result<String> {
        self.request(&format!("newforwardingrule {}:{}", prefix, face.0))
            .await
    }

    pub async fn add_new_content(&self, name: &Name, content: &str) -> Result<String> {
        self.request(&format!("newcontent {}:{}", name, content))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::MemoryRepository;
    use std::time::Duration;

    async fn server_with(handles: MgmtHandles) -> (SocketAddr, JoinHandle<()>) {
        let server = MgmtServer::bind("127.0.0.1:0", handles).await.unwrap();
        let addr = server.local_addr().unwrap();
        (addr, server.run())
    }

    #[tokio::test]
    async fn face_and_rule_commands() {
        let fib = Arc::new(Mutex::new(ForwardingInformationBase::new()));
        let faces = Arc::new(FaceTable::new());
        let (addr, task) = server_with(MgmtHandles {
            fib: Some(Arc::clone(&fib)),
            faces: Some(Arc::clone(&faces)),
            ..Default::default()
        })
        .await;

        let client = MgmtClient::new(addr);
        let face = client.add_face("127.0.0.1", 9999).await.unwrap();
        let face: u32 = face.parse().unwrap();
        assert_eq!(faces.addr_of(FaceId(face)).unwrap().port(), 9999);

        client
            .add_forwarding_rule(&Name::from_string("/test"), FaceId(face))
            .await
            .unwrap();
        let entry = fib
            .lock()
            .await
            .find(&Name::from_string("/test/deep"), &[], &[])
            .unwrap();
        assert_eq!(entry.face, FaceId(face));
        assert!(entry.static_entry);

        task.abort();
    }

    #[tokio::test]
    async fn repo_commands_and_errors() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new("/var/lib/repo"));
        repo.set_prefix(Name::from_string("/test/prefix"));
        let (addr, task) = server_with(MgmtHandles {
            repo: Some(Arc::clone(&repo)),
            ..Default::default()
        })
        .await;

        let client = MgmtClient::new(addr);
        assert_eq!(client.get_repo_prefix().await.unwrap(), "/test/prefix");
        assert_eq!(client.get_repo_path().await.unwrap(), "/var/lib/repo");

        client
            .add_new_content(&Name::from_string("/test/prefix/item"), "value")
            .await
            .unwrap();
        assert_eq!(
            repo.get(&Name::from_string("/test/prefix/item")),
            Some(Bytes::from_static(b"value"))
        );

        // Unknown commands and missing facilities answer `error`.
        assert!(client.request("bogus command").await.is_err());
        assert!(client.add_face("127.0.0.1", 1).await.is_err());

        task.abort();
    }

    #[tokio::test]
    async fn shutdown_signals_the_runner() {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let (addr, task) = server_with(MgmtHandles {
            shutdown: Some(shutdown_tx),
            ..Default::default()
        })
        .await;

        let client = MgmtClient::new(addr);
        client.shutdown().await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown_rx.recv())
            .await
            .expect("shutdown not signalled");

        task.abort();
    }
}
