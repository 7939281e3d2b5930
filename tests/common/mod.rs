//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use solarlink_server::config::AppConfig;
use solarlink_server::lifecycle::Shutdown;
use solarlink_server::observability::{Level, MemorySink, MetricsRecorder, StructuredLogger};
use solarlink_server::HttpServer;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A server running on an ephemeral port with captured logs and its own recorder.
pub struct TestServer {
    pub addr: SocketAddr,
    pub logs: MemorySink,
    pub metrics: Arc<MetricsRecorder>,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Records carrying the given log message.
    pub fn logs_named(&self, message: &str) -> Vec<serde_json::Value> {
        self.logs
            .records()
            .into_iter()
            .filter(|r| r["message"] == message)
            .collect()
    }

    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}

pub async fn start_server(config: AppConfig, level: Level) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let logs = MemorySink::new();
    let logger = StructuredLogger::new(level, Arc::new(logs.clone()));
    let metrics = Arc::new(MetricsRecorder::new());

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, logger, metrics.clone());
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        logs,
        metrics,
        shutdown,
        handle,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}
