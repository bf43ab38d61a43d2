use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use novacite_core::Intent;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static LOG_FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

const LOG_FILE_NAME: &str = "app.log";

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    faculty_total: AtomicU64,
    circular_total: AtomicU64,
    identity_total: AtomicU64,
    unknown_total: AtomicU64,
    failures_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub faculty_total: u64,
    pub circular_total: u64,
    pub identity_total: u64,
    /// Queries that fell through to the help message.
    pub fallback_total: u64,
    pub failures_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("novacite_requests_total").increment(1);
    }

    pub fn record_intent(&self, intent: Intent) {
        let counter = match intent {
            Intent::FacultyInfo => &self.faculty_total,
            Intent::PdfRequest => &self.circular_total,
            Intent::Identity => &self.identity_total,
            Intent::Unknown => &self.unknown_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("novacite_intent_total", "intent" => intent.as_label()).increment(1);
    }

    pub fn inc_failure(&self) {
        self.failures_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("novacite_failures_total").increment(1);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
        metrics::histogram!("novacite_request_seconds").record(duration.as_secs_f64());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            faculty_total: self.faculty_total.load(Ordering::Relaxed),
            circular_total: self.circular_total.load(Ordering::Relaxed),
            identity_total: self.identity_total.load(Ordering::Relaxed),
            fallback_total: self.unknown_total.load(Ordering::Relaxed),
            failures_total: self.failures_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

/// JSON logs on stderr, plus a plain-text copy in `<log_dir>/app.log` when a
/// directory is given. Only the first call has any effect.
pub fn init_tracing(service_name: &str, log_dir: Option<&Path>) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{service_name}=info,novacite_agents=info,novacite_scrape=info,novacite_retrieval=info,novacite_llm=info"
            ))
        });

        let stderr_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(std::io::stderr);

        let file_layer = log_dir.and_then(|dir| {
            if let Err(err) = std::fs::create_dir_all(dir) {
                eprintln!("novacite: failed to create log dir {}: {err}", dir.display());
                return None;
            }
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = LOG_FILE_GUARD.set(guard);
            Some(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    });
}
