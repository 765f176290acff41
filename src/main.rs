use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use axum::Router;
use futures_util::future;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use hyper_util::service::TowerToHyperService;
use openai_header::config::{load_config, AppConfig, ServerConfig};
use openai_header::inspect::{Inspector, InspectorConfig};
use openai_header::observability::init_tracing;
use openai_header::proxy::{build_router, Upstream};
#[cfg(unix)]
use socket2::{Domain, Protocol, Socket, Type};

const DEFAULT_LISTEN_BACKLOG: i32 = 1024;
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration from '{config_path}': {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level, config.features.log_json);
    let runtime = build_runtime(&config);

    runtime.block_on(async move {
        run(config).await;
    });
}

fn build_runtime(config: &AppConfig) -> tokio::runtime::Runtime {
    let worker_threads = config.server.runtime_worker_threads;
    let max_blocking_threads = config.server.runtime_max_blocking_threads;
    let thread_stack_size_kb = config.server.runtime_thread_stack_size_kb;
    let mut runtime_builder = if worker_threads == Some(1) {
        tokio::runtime::Builder::new_current_thread()
    } else {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        builder
    };
    runtime_builder.enable_io();
    runtime_builder.enable_time();
    if let Some(max_blocking_threads) = max_blocking_threads {
        runtime_builder.max_blocking_threads(max_blocking_threads);
    }
    if worker_threads != Some(1) {
        if let Some(thread_stack_size_kb) = thread_stack_size_kb {
            runtime_builder.thread_stack_size(thread_stack_size_kb * 1024);
        }
    }
    runtime_builder.build().unwrap_or_else(|e| {
        eprintln!("Failed to initialize Tokio runtime: {e}");
        std::process::exit(1);
    })
}

async fn run(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;

    let inspector = Inspector::new(InspectorConfig::from(&config.inspection)).unwrap_or_else(|e| {
        eprintln!("Failed to build request inspector: {e}");
        std::process::exit(1);
    });
    let upstream = Upstream::new(&config.server, &config.upstream).unwrap_or_else(|e| {
        eprintln!("Failed to build upstream client: {e}");
        std::process::exit(1);
    });
    let mapped_fields = inspector.mapping().len();
    let upstream_url = upstream.base_url().to_string();
    let router = build_router(Arc::new(inspector), Arc::new(upstream));

    tracing::info!(
        "openai-header starting on {}:{} forwarding to '{}' ({} mapped fields)",
        host,
        port,
        upstream_url,
        mapped_fields
    );

    let listeners = build_server_listeners(&config.server, &host, port)
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });
    let reuse_port_enabled = config.server.tcp_reuse_port_listener_count.is_some();

    tracing::info!(
        "openai-header is ready to accept connections (listeners={}, reuse_port={})",
        listeners.len(),
        reuse_port_enabled
    );
    let conn_builder = AutoBuilder::new(TokioExecutor::new());
    if listeners.len() == 1 {
        let mut listeners = listeners;
        let Some(listener) = listeners.pop() else {
            return;
        };
        serve_accept_loop(listener, conn_builder, router).await;
        return;
    }

    for listener in listeners {
        let loop_builder = conn_builder.clone();
        let loop_router = router.clone();
        tokio::spawn(async move {
            serve_accept_loop(listener, loop_builder, loop_router).await;
        });
    }
    future::pending::<()>().await;
}

async fn serve_accept_loop(
    listener: tokio::net::TcpListener,
    conn_builder: AutoBuilder<TokioExecutor>,
    router: Router,
) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok((stream, remote_addr)) => (stream, remote_addr),
            Err(err) => {
                eprintln!("Accept error: {err}");
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!("failed to enable TCP_NODELAY for {remote_addr}: {err}");
        }

        let io = TokioIo::new(stream);
        let conn_builder = conn_builder.clone();
        let hyper_service = TowerToHyperService::new(router.clone());

        tokio::spawn(async move {
            if let Err(err) = conn_builder.serve_connection(io, hyper_service).await {
                tracing::debug!("failed to serve connection from {remote_addr}: {err:#}");
            }
        });
    }
}

async fn build_server_listeners(
    server: &ServerConfig,
    host: &str,
    port: u16,
) -> io::Result<Vec<tokio::net::TcpListener>> {
    let reuse_port_enabled = server.tcp_reuse_port_listener_count.is_some();
    let mut listener_count = server.tcp_reuse_port_listener_count.unwrap_or(1).max(1);
    if reuse_port_enabled && !cfg!(unix) {
        tracing::warn!(
            "server.tcp_reuse_port_listener_count is set but this platform does not support SO_REUSEPORT; fallback to single listener"
        );
        listener_count = 1;
    }

    if listener_count == 1 {
        let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
        return Ok(vec![listener]);
    }

    let mut listeners = Vec::with_capacity(listener_count);
    for _ in 0..listener_count {
        listeners.push(bind_reuse_port_listener(host, port)?);
    }
    Ok(listeners)
}

#[cfg(unix)]
fn bind_reuse_port_listener(host: &str, port: u16) -> io::Result<tokio::net::TcpListener> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match bind_reuse_port_listener_addr(addr) {
            Ok(listener) => return Ok(listener),
            Err(err) => last_err = Some(err),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no bindable socket address for {host}:{port}"),
        )
    }))
}

#[cfg(unix)]
fn bind_reuse_port_listener_addr(addr: SocketAddr) -> io::Result<tokio::net::TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_reuse_port(true)?;
    socket.bind(&addr.into())?;
    socket.listen(DEFAULT_LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;

    let std_listener: std::net::TcpListener = socket.into();
    tokio::net::TcpListener::from_std(std_listener)
}

#[cfg(not(unix))]
fn bind_reuse_port_listener(_host: &str, _port: u16) -> io::Result<tokio::net::TcpListener> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "SO_REUSEPORT is only supported on Unix-like platforms",
    ))
}
