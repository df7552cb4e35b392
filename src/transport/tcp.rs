//! Length-prefixed TCP binding for the capability set (§10.4): each call is one
//! `u32`-big-endian-length-prefixed JSON [`Request`] followed by one framed [`Response`].
//! A small connection pool keyed by remote address is kept per §5's "shared resources";
//! idle entries expire after `Settings::idle_connection_expiry`.

use super::{
    CallerArgs, FetchArgs, FindSuccessorArgs, ForwardSyncArgs, ForwardSyncReply, GlobalMaintenanceArgs, Request, Response, StabilizerDataReply, StoreArgs,
};
use crate::capability::{PeerConnector, RemoteHandle, RemotePeer, StabilizerData};
use crate::error::{Error, Result};
use crate::identifier::Identifier;
use crate::node::NodeInfo;
use crate::replication::envelope::{Envelope, ForwardSyncRequest, ForwardSyncResponse};
use crate::ring::Ring;
use crate::store::Record;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

struct PooledConn {
    stream: tokio::sync::Mutex<TcpStream>,
    last_used: parking_lot::Mutex<Instant>,
}

/// Connections keyed by remote address, reused across calls until idle too long.
pub struct ConnectionPool {
    conns: DashMap<SocketAddr, Arc<PooledConn>>,
    idle_expiry: Duration,
}

impl ConnectionPool {
    pub fn new(idle_expiry: Duration) -> Arc<Self> {
        Arc::new(ConnectionPool { conns: DashMap::new(), idle_expiry })
    }

    /// Spawn a background reaper that periodically drops connections idle longer than
    /// `idle_expiry`. Cooperatively runs for the process lifetime, same cadence as the
    /// maintenance daemons.
    pub fn spawn_reaper(self: &Arc<Self>) {
        let pool = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(pool.idle_expiry).await;
                pool.conns.retain(|_, conn| conn.last_used.lock().elapsed() < pool.idle_expiry);
            }
        });
    }

    async fn checkout(&self, addr: SocketAddr) -> std::io::Result<Arc<PooledConn>> {
        if let Some(entry) = self.conns.get(&addr) {
            return Ok(entry.clone());
        }
        let stream = TcpStream::connect(addr).await?;
        let conn = Arc::new(PooledConn { stream: tokio::sync::Mutex::new(stream), last_used: parking_lot::Mutex::new(Instant::now()) });
        self.conns.insert(addr, conn.clone());
        Ok(conn)
    }

    fn evict(&self, addr: SocketAddr) {
        self.conns.remove(&addr);
    }
}

async fn write_frame(stream: &mut TcpStream, bytes: &[u8]) -> std::io::Result<()> {
    stream.write_all(&(bytes.len() as u32).to_be_bytes()).await?;
    stream.write_all(bytes).await
}

async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await?;
    Ok(body)
}

/// A remote peer reached over TCP.
pub struct TcpPeer {
    info: NodeInfo,
    pool: Arc<ConnectionPool>,
    rpc_timeout: Duration,
}

impl TcpPeer {
    async fn call<T: DeserializeOwned>(&self, capability: &str, body: impl serde::Serialize) -> Result<T> {
        let addr = self.info.socket_addr();
        let request = Request::new(capability, body).map_err(Error::Serialization)?;
        let request_bytes = serde_json::to_vec(&request).map_err(Error::Serialization)?;

        let attempt = async {
            let conn = self.pool.checkout(addr).await.map_err(|e| Error::Transport { remote: addr, source: e })?;
            let mut stream = conn.stream.lock().await;
            write_frame(&mut stream, &request_bytes).await.map_err(|e| Error::Transport { remote: addr, source: e })?;
            let response_bytes = read_frame(&mut stream).await.map_err(|e| Error::Transport { remote: addr, source: e })?;
            *conn.last_used.lock() = Instant::now();
            drop(stream);
            let response: Response = serde_json::from_slice(&response_bytes)?;
            if !response.ok {
                return Err(Error::Rejected("remote returned a non-ok response"));
            }
            Ok(serde_json::from_value(response.body)?)
        };

        match tokio::time::timeout(self.rpc_timeout, attempt).await {
            Ok(result) => {
                if result.is_err() {
                    self.pool.evict(addr);
                }
                result
            }
            Err(_) => {
                self.pool.evict(addr);
                Err(Error::Timeout { remote: addr })
            }
        }
    }
}

#[async_trait]
impl RemotePeer for TcpPeer {
    fn node_info(&self) -> NodeInfo {
        self.info
    }

    async fn find_successor(&self, identifier: Identifier) -> Result<NodeInfo> {
        self.call("find_successor", FindSuccessorArgs { identifier }).await
    }

    async fn get_stabilizer_data(&self, caller: NodeInfo) -> Result<StabilizerData> {
        self.call::<StabilizerDataReply>("get_stabilizer_data", CallerArgs { caller }).await
    }

    async fn get_predecessor_list(&self, caller: NodeInfo) -> Result<Vec<NodeInfo>> {
        self.call("get_predecessor_list", CallerArgs { caller }).await
    }

    async fn notify(&self, caller: NodeInfo) -> Result<bool> {
        self.call("notify", CallerArgs { caller }).await
    }

    async fn ping(&self) -> bool {
        self.call::<bool>("ping", ()).await.unwrap_or(false)
    }

    async fn store(&self, record: Record) -> bool {
        self.call::<bool>("store", StoreArgs { record }).await.unwrap_or(false)
    }

    async fn fetch(&self, identifier: Identifier) -> Option<Record> {
        self.call::<Option<Record>>("fetch", FetchArgs { identifier }).await.ok().flatten()
    }

    async fn global_maintenance(&self, envelope: Envelope) -> Result<Option<Envelope>> {
        self.call("global_maintenance", GlobalMaintenanceArgs { envelope }).await
    }

    async fn forward_sync(&self, request: ForwardSyncRequest) -> Result<Option<ForwardSyncResponse>> {
        self.call::<ForwardSyncReply>("forward_sync", ForwardSyncArgs { request }).await
    }
}

/// Builds [`RemoteHandle`]s backed by [`TcpPeer`]s sharing one [`ConnectionPool`].
pub struct TcpPeerConnector {
    pool: Arc<ConnectionPool>,
    rpc_timeout: Duration,
}

impl TcpPeerConnector {
    pub fn new(idle_expiry: Duration, rpc_timeout: Duration) -> Arc<Self> {
        let pool = ConnectionPool::new(idle_expiry);
        pool.spawn_reaper();
        Arc::new(TcpPeerConnector { pool, rpc_timeout })
    }
}

impl PeerConnector for TcpPeerConnector {
    fn connect(&self, info: NodeInfo) -> RemoteHandle {
        RemoteHandle::new(Arc::new(TcpPeer { info, pool: self.pool.clone(), rpc_timeout: self.rpc_timeout }))
    }
}

/// Accept connections and dispatch each framed request to `ring`, looping per connection
/// until the peer disconnects or a frame fails to parse.
pub async fn serve(ring: Arc<Ring>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let ring = ring.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(ring, stream).await {
                tracing::debug!(peer = %peer_addr, error = %e, "connection closed");
            }
        });
    }
}

async fn handle_connection(ring: Arc<Ring>, mut stream: TcpStream) -> std::io::Result<()> {
    loop {
        let request_bytes = match read_frame(&mut stream).await {
            Ok(b) => b,
            Err(_) => return Ok(()), // peer disconnected
        };
        let response = dispatch(&ring, &request_bytes).await;
        let response_bytes = serde_json::to_vec(&response).unwrap_or_else(|_| serde_json::to_vec(&Response::err()).unwrap());
        write_frame(&mut stream, &response_bytes).await?;
    }
}

async fn dispatch(ring: &Arc<Ring>, request_bytes: &[u8]) -> Response {
    let Ok(request) = serde_json::from_slice::<Request>(request_bytes) else {
        return Response::err();
    };
    let result: serde_json::Result<Response> = async move {
        match request.capability.as_str() {
            "find_successor" => {
                let args: FindSuccessorArgs = serde_json::from_value(request.body)?;
                match ring.find_successor(args.identifier).await {
                    Ok(info) => Response::ok(info),
                    Err(_) => Ok(Response::err()),
                }
            }
            "get_stabilizer_data" => Response::ok(ring.get_stabilizer_data()),
            "get_predecessor_list" => Response::ok(ring.get_predecessor_list()),
            "notify" => {
                let args: CallerArgs = serde_json::from_value(request.body)?;
                Response::ok(ring.notify(args.caller))
            }
            "ping" => Response::ok(true),
            "store" => {
                let args: StoreArgs = serde_json::from_value(request.body)?;
                Response::ok(ring.handle_store(args.record))
            }
            "fetch" => {
                let args: FetchArgs = serde_json::from_value(request.body)?;
                Response::ok(ring.store().get(args.identifier))
            }
            "global_maintenance" => {
                let args: GlobalMaintenanceArgs = serde_json::from_value(request.body)?;
                match ring.handle_global_maintenance(args.envelope) {
                    Ok(reply) => Response::ok(reply),
                    Err(_) => Ok(Response::err()),
                }
            }
            "forward_sync" => {
                let args: ForwardSyncArgs = serde_json::from_value(request.body)?;
                Response::ok(ring.handle_forward_sync(args.request))
            }
            _ => Ok(Response::err()),
        }
    }
    .await;
    result.unwrap_or_else(|_| Response::err())
}
