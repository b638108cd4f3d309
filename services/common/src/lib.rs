pub mod gcp;

use std::{
    env,
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
};
use tokio::net::TcpListener;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Keeps the non-blocking log writer alive for the lifetime of the service.
pub struct TracingGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the tracing subscriber for a service: stdout always, plus a
/// daily-rolling file appender when `LOG_DIR` is set.
pub fn init_tracing(service_name: &str) -> TracingGuards {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let mut file_guard = None;
    let file_layer = env::var("LOG_DIR").ok().map(|dir| {
        let log_root = PathBuf::from(dir).join(service_name);
        let appender = tracing_appender::rolling::daily(log_root, format!("{service_name}.log"));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        fmt::layer().with_writer(writer)
    });

    let subscriber = Registry::default().with(filter).with(stdout_layer);
    if let Some(layer) = file_layer {
        let _ = tracing::subscriber::set_global_default(subscriber.with(layer));
    } else {
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    TracingGuards {
        _file_guard: file_guard,
    }
}

/// Reads a typed environment value, falling back to the default when the
/// variable is unset or unparsable.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

pub async fn bind_listener(port: u16) -> TcpListener {
    // All interfaces, for container and App Engine compatibility.
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await.expect("bind listener")
}

/// Resolves when the process receives ctrl-c or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("sigterm handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
