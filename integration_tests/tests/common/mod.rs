#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use scout_client::ScoutConfig;
use scout_extracts::MetricsSource;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

type Page = Arc<Mutex<Option<String>>>;

/// A catalog agent answering `/metrics` with whatever page the test sets.
/// `None` makes it answer 503.
pub struct MetricsServer {
    pub address: SocketAddr,
    page: Page,
    shutdown: CancellationToken,
}

impl MetricsServer {
    pub async fn start(states: &[(&str, i64)]) -> Self {
        let page: Page = Arc::new(Mutex::new(Some(status_page(states))));
        let app = Router::new()
            .route("/metrics", get(metrics))
            .with_state(page.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .unwrap();
        });

        MetricsServer {
            address,
            page,
            shutdown,
        }
    }

    pub fn set_states(&self, states: &[(&str, i64)]) {
        *self.page.lock().unwrap() = Some(status_page(states));
    }

    pub fn fail(&self) {
        *self.page.lock().unwrap() = None;
    }

    pub fn source(&self, name: &str) -> MetricsSource {
        MetricsSource::new(name, self.address.to_string())
    }
}

impl Drop for MetricsServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn metrics(State(page): State<Page>) -> Response {
    let page = page.lock().unwrap().clone();
    match page {
        Some(body) => body.into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

pub fn status_page(states: &[(&str, i64)]) -> String {
    let mut page = String::from(
        "# HELP go_goroutines Number of goroutines that currently exist.\n\
         # TYPE go_goroutines gauge\n\
         go_goroutines 31\n\
         # HELP status Serf member status\n\
         # TYPE status gauge\n",
    );
    for (entity, state) in states {
        page.push_str(&format!("status{{name=\"{entity}\"}} {state}\n"));
    }
    page
}

pub fn config(dir: &Path, sources: Vec<MetricsSource>) -> ScoutConfig {
    ScoutConfig {
        state_file: dir.join("state").join("consul-events.state.json"),
        output_dir: dir.join("events"),
        lock_dir: dir.join("lock"),
        log_dir: dir.join("log"),
        fresh_time_secs: 300,
        http_timeout_secs: 2,
        gather_timeout_secs: 10,
        max_workers: 4,
        recent_days: 7,
        prometheus_cfg: None,
        sources,
    }
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 10, 2, 17, 16, 7).unwrap()
}

pub fn files_in(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return vec![];
    };
    let mut files: Vec<_> = entries
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.file_name().to_string_lossy().into_owned(),
                std::fs::read(entry.path()).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}
