use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use dfs_lib::{DfsError, DfsResult};

use crate::wire::{read_frame, write_frame, RpcRequest, RpcResponse};
use crate::{InterfaceSpec, RpcDispatch};

/// Customization hooks for a running skeleton.
///
/// All methods have defaults: `listen_error` stops the server,
/// `service_error` ignores the failure, `stopped` does nothing.
pub trait SkeletonEvents: Send + Sync {
    /// Called exactly once when the listener task exits, with the failure
    /// that stopped it, or `None` after a clean `stop`.
    fn stopped(&self, _cause: Option<DfsError>) {}

    /// Called on a top-level accept failure. Return true to keep accepting.
    fn listen_error(&self, _err: &DfsError) -> bool {
        false
    }

    /// Called when a worker fails to unmarshal a request or send a reply.
    fn service_error(&self, _err: &DfsError) {}
}

struct DefaultEvents;

impl SkeletonEvents for DefaultEvents {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unstarted,
    Running,
    Stopping,
    Stopped,
}

struct Inner {
    state: State,
    bound_addr: Option<SocketAddr>,
    shutdown: Option<watch::Sender<bool>>,
}

/// Server-side endpoint for one remote interface.
///
/// A skeleton owns a TCP listener and spawns one worker task per accepted
/// connection; each connection carries exactly one request and one reply.
/// The served interface and target object are pinned at construction and the
/// interface must be remote (every method declares the rpc-failure kind).
///
/// Lifecycle: Unstarted -> Running -> Stopping -> Stopped. `start` fails once
/// the skeleton is running or has ever stopped. `stop` closes the listener;
/// in-flight workers run to completion.
pub struct Skeleton {
    spec: &'static InterfaceSpec,
    target: Arc<dyn RpcDispatch>,
    events: Arc<dyn SkeletonEvents>,
    requested_addr: Option<SocketAddr>,
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for Skeleton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skeleton")
            .field("spec", &self.spec.name)
            .field("requested_addr", &self.requested_addr)
            .finish_non_exhaustive()
    }
}

impl Skeleton {
    /// Creates a skeleton for `spec`, forwarding calls to `target`. With no
    /// `address`, the system picks a free port when `start` is called.
    pub fn new(
        spec: &'static InterfaceSpec,
        target: Arc<dyn RpcDispatch>,
        address: Option<SocketAddr>,
    ) -> DfsResult<Self> {
        spec.check_remote()?;
        Ok(Self {
            spec,
            target,
            events: Arc::new(DefaultEvents),
            requested_addr: address,
            inner: Arc::new(Mutex::new(Inner {
                state: State::Unstarted,
                bound_addr: None,
                shutdown: None,
            })),
        })
    }

    /// Replaces the default event hooks. Must be called before `start`.
    pub fn with_events(mut self, events: Arc<dyn SkeletonEvents>) -> Self {
        self.events = events;
        self
    }

    /// Binds the listener and spawns the accept loop.
    pub async fn start(&self) -> DfsResult<()> {
        self.check_startable()?;

        let bind_addr = self
            .requested_addr
            .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| DfsError::Rpc(format!("bind {}: {}", bind_addr, e)))?;
        let bound = listener
            .local_addr()
            .map_err(|e| DfsError::Rpc(format!("local address: {}", e)))?;

        let (tx, rx) = watch::channel(false);
        {
            let mut inner = self.inner.lock().unwrap();
            // a concurrent start may have won the race while we were binding
            if inner.state != State::Unstarted {
                return Err(DfsError::Rpc("skeleton has already been started".to_string()));
            }
            inner.state = State::Running;
            inner.bound_addr = Some(bound);
            inner.shutdown = Some(tx);
        }
        info!("skeleton {} listening on {}", self.spec.name, bound);

        tokio::spawn(listen_loop(
            self.spec,
            self.target.clone(),
            self.events.clone(),
            self.inner.clone(),
            listener,
            rx,
        ));
        Ok(())
    }

    fn check_startable(&self) -> DfsResult<()> {
        let inner = self.inner.lock().unwrap();
        match inner.state {
            State::Unstarted => Ok(()),
            State::Running | State::Stopping => {
                Err(DfsError::Rpc("skeleton has already been started".to_string()))
            }
            State::Stopped => Err(DfsError::Rpc(
                "skeleton has been stopped and cannot be restarted".to_string(),
            )),
        }
    }

    /// Stops accepting connections. In-flight workers run to completion; the
    /// `stopped` hook fires once the listener task has exited.
    pub fn stop(&self) {
        let tx = {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != State::Running {
                return;
            }
            inner.state = State::Stopping;
            inner.shutdown.take()
        };
        if let Some(tx) = tx {
            let _ = tx.send(true);
        }
    }

    /// The address the skeleton is reachable at. Before `start` this is the
    /// requested address, if one was given. Wildcard bind addresses resolve
    /// to the loopback host; callers that need an externally visible name
    /// supply it themselves when building stubs.
    pub fn bound_addr(&self) -> DfsResult<SocketAddr> {
        let inner = self.inner.lock().unwrap();
        let addr = inner.bound_addr.or(self.requested_addr).ok_or_else(|| {
            DfsError::InvalidState(
                "skeleton has not been assigned an address and has not been started".to_string(),
            )
        })?;
        Ok(resolve_wildcard(addr))
    }

    /// The skeleton's port. Fails if no port has been assigned yet.
    pub fn port(&self) -> DfsResult<u16> {
        let addr = self.bound_addr()?;
        if addr.port() == 0 {
            return Err(DfsError::InvalidState(
                "skeleton has not been assigned a port".to_string(),
            ));
        }
        Ok(addr.port())
    }

    pub fn interface_name(&self) -> &'static str {
        self.spec.name
    }
}

fn resolve_wildcard(addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        let ip = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        SocketAddr::new(ip, addr.port())
    } else {
        addr
    }
}

async fn listen_loop(
    spec: &'static InterfaceSpec,
    target: Arc<dyn RpcDispatch>,
    events: Arc<dyn SkeletonEvents>,
    inner: Arc<Mutex<Inner>>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    let cause = loop {
        tokio::select! {
            _ = shutdown.changed() => break None,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("{}: accepted connection from {}", spec.name, peer);
                    tokio::spawn(serve_connection(
                        spec,
                        target.clone(),
                        events.clone(),
                        stream,
                    ));
                }
                Err(e) => {
                    let err = DfsError::Rpc(format!("accept failed: {}", e));
                    if events.listen_error(&err) {
                        continue;
                    }
                    warn!("skeleton {} listener exiting: {}", spec.name, err);
                    break Some(err);
                }
            }
        }
    };

    // closes the listening socket before announcing the stop
    drop(listener);
    {
        let mut inner = inner.lock().unwrap();
        inner.state = State::Stopped;
    }
    info!("skeleton {} stopped", spec.name);
    events.stopped(cause);
}

async fn serve_connection(
    spec: &'static InterfaceSpec,
    target: Arc<dyn RpcDispatch>,
    events: Arc<dyn SkeletonEvents>,
    mut stream: TcpStream,
) {
    let request: RpcRequest = match read_frame(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            // a malformed request still gets a best-effort failure reply
            let _ = write_frame(&mut stream, &RpcResponse::failure(&e)).await;
            events.service_error(&e);
            return;
        }
    };

    let response = match spec.find_method(&request.method, &request.param_types) {
        None => RpcResponse::failure(&DfsError::Rpc(format!(
            "interface {} has no method {}({})",
            spec.name,
            request.method,
            request.param_types.join(", ")
        ))),
        Some(method) => match target.invoke(method.name, &request.args).await {
            Ok(value) => RpcResponse::success(value),
            Err(err) => RpcResponse::failure(&err),
        },
    };

    if let Err(e) = write_frame(&mut stream, &response).await {
        events.service_error(&e);
    }
    let _ = stream.shutdown().await;
}
