//! TCP Server listener
//!
//! This module implements the HTTP server that accepts connections and
//! drives them until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::service::FizzBuzzService;
use crate::stats::FrequencyIndex;

use super::gateway::{serve_request, GatewayError, GatewayState};

/// FizzBuzz HTTP server
pub struct Server {
    /// TCP listener
    listener: TcpListener,

    /// State shared by every request
    state: Arc<GatewayState>,

    /// Drain period for open connections once shutdown starts
    shutdown_timeout: Duration,

    /// Per-connection read and idle limits
    timeouts: ConnectionTimeouts,

    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,
}

/// Limits applied to every accepted connection
#[derive(Debug, Clone, Copy)]
struct ConnectionTimeouts {
    header_read: Duration,
    idle: Duration,
}

/// Optional dependency overrides for building a Server
#[derive(Default)]
pub struct ServerDependencies {
    pub index: Option<Arc<FrequencyIndex>>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self, GatewayError> {
        Self::new_with_dependencies(config, ServerDependencies::default()).await
    }

    /// Create a new server instance with optional dependency overrides
    pub async fn new_with_dependencies(
        config: Config,
        dependencies: ServerDependencies,
    ) -> Result<Self, GatewayError> {
        let addr = config.server.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::BindFailed(addr.clone(), e))?;

        info!("Server listening on {}", listener.local_addr()?);

        let index = dependencies
            .index
            .unwrap_or_else(|| Arc::new(FrequencyIndex::new()));
        let service = Arc::new(FizzBuzzService::from_config(&config, index));
        let state = Arc::new(GatewayState::new(service, config.server.max_body_size));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            listener,
            state,
            shutdown_timeout: config.server.shutdown_timeout(),
            timeouts: ConnectionTimeouts {
                header_read: config.server.header_read_timeout(),
                idle: config.server.idle_timeout(),
            },
            shutdown_tx,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, GatewayError> {
        Ok(self.listener.local_addr()?)
    }

    /// The statistics index served by this instance
    pub fn index(&self) -> &Arc<FrequencyIndex> {
        self.state.service().index()
    }

    /// Sender that stops the server when signalled
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the server until shutdown signal is received
    pub async fn run(self) -> Result<(), GatewayError> {
        let shutdown_tx = self.shutdown_tx.clone();

        // Spawn shutdown signal handler
        tokio::spawn(async move {
            wait_for_signal().await;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        });

        self.accept_loop().await
    }

    /// Accept connections in a loop, then drain them on shutdown
    async fn accept_loop(self) -> Result<(), GatewayError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("Accepted connection from {}", addr);
                            connections.spawn(serve_connection(
                                stream,
                                addr,
                                Arc::clone(&self.state),
                                self.timeouts,
                                self.shutdown_tx.subscribe(),
                            ));
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = shutdown_rx.recv() => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        let open = connections.len();
        if open > 0 {
            info!(
                "Waiting up to {:?} for {} open connection(s)",
                self.shutdown_timeout, open
            );
        }
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!("Shutdown timeout elapsed, aborting remaining connections");
            connections.abort_all();
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Request activity on one connection, used to detect idle keep-alives.
struct ConnectionActivity {
    in_flight: AtomicUsize,
    last_active: Mutex<Instant>,
}

impl ConnectionActivity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last_active: Mutex::new(Instant::now()),
        }
    }

    /// Mark a request as started; the returned guard marks it finished.
    fn begin(self: &Arc<Self>) -> ActiveRequest {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        ActiveRequest(Arc::clone(self))
    }

    /// Instant at which the connection becomes idle if nothing else happens.
    fn idle_deadline(&self, idle: Duration) -> tokio::time::Instant {
        let from = if self.in_flight.load(Ordering::SeqCst) > 0 {
            Instant::now()
        } else {
            *self.last_active.lock()
        };
        tokio::time::Instant::from_std(from + idle)
    }

    fn is_idle(&self, idle: Duration) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0 && self.last_active.lock().elapsed() >= idle
    }
}

struct ActiveRequest(Arc<ConnectionActivity>);

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        *self.0.last_active.lock() = Instant::now();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serve HTTP/1.1 on one connection, finishing in-flight requests when
/// shutdown is signalled or the connection has been idle too long.
async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    state: Arc<GatewayState>,
    timeouts: ConnectionTimeouts,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let io = TokioIo::new(stream);
    let activity = Arc::new(ConnectionActivity::new());
    let service = service_fn({
        let activity = Arc::clone(&activity);
        move |req: Request<Incoming>| {
            let state = Arc::clone(&state);
            let active = activity.begin();
            async move {
                let response = serve_request(req, state, remote_addr).await;
                drop(active);
                Ok::<_, std::convert::Infallible>(response)
            }
        }
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.header_read);
    let conn = builder.serve_connection(io, service);
    tokio::pin!(conn);

    let finished = loop {
        tokio::select! {
            result = conn.as_mut() => break Some(result),
            _ = shutdown_rx.recv() => break None,
            _ = tokio::time::sleep_until(activity.idle_deadline(timeouts.idle)) => {
                if activity.is_idle(timeouts.idle) {
                    debug!("Closing idle connection from {}", remote_addr);
                    break None;
                }
            }
        }
    };
    let result = match finished {
        Some(result) => result,
        None => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };

    if let Err(e) = result {
        if e.is_timeout() {
            debug!("Request head from {} timed out", remote_addr);
        } else {
            warn!("HTTP connection error from {}: {}", remote_addr, e);
        }
    }
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
