//! Synthetic generation context.
//!
//! Every generation request carries a small bag of plausible contextual
//! fields (IPs, timings, codes) that steer the model towards realistic
//! output. Scenario-specific fields come first so a truncated summary of the
//! context still describes the scenario.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use serde::Serialize;

use crate::model::Scenario;

const STATUS_CODES: [i64; 9] = [200, 201, 400, 401, 403, 404, 500, 502, 503];
const ERROR_SEVERITIES: [&str; 4] = ["LOW", "MEDIUM", "HIGH", "CRITICAL"];
const FILE_TYPES: [&str; 7] = ["PDF", "CSV", "JSON", "XML", "TXT", "LOG", "ZIP"];
const USER_AGENT: &str = "Mozilla/5.0 (compatible)";
const ACTIVE_PROFILES: &str = "production,monitoring";

/// Fields present in every context regardless of scenario.
pub const UNIVERSAL_FIELDS: [&str; 7] = [
    "request_id",
    "thread_id",
    "entry_id",
    "service_version",
    "environment",
    "datacenter",
    "instance_id",
];

/// A single context value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
    Int(i64),
    Text(String),
}

impl ContextValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ContextValue::Int(v) => Some(*v),
            ContextValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(v) => Some(v),
            ContextValue::Int(_) => None,
        }
    }
}

impl std::fmt::Display for ContextValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextValue::Int(v) => write!(f, "{}", v),
            ContextValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        ContextValue::Int(v)
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::Text(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::Text(v.to_string())
    }
}

/// Insertion-ordered field bag built fresh for each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    fields: Vec<(&'static str, ContextValue)>,
}

impl GenerationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any existing value under the same name.
    pub fn insert(&mut self, name: &'static str, value: impl Into<ContextValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ContextValue> {
        self.fields.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ContextValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(k, _)| *k)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Sequence number of the entry this context was built for.
    pub fn entry_id(&self) -> Option<u64> {
        self.get("entry_id")
            .and_then(ContextValue::as_int)
            .and_then(|v| u64::try_from(v).ok())
    }
}

/// Builds scenario-specific generation contexts.
///
/// Owns the process-wide entry sequence counter; each call to
/// [`synthesize`](Self::synthesize) consumes one sequence number.
#[derive(Debug, Default)]
pub struct ContextSynthesizer {
    entry_counter: AtomicU64,
}

impl ContextSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of contexts built so far.
    pub fn entries_issued(&self) -> u64 {
        self.entry_counter.load(Ordering::Relaxed)
    }

    pub fn synthesize(&self, scenario: Scenario) -> GenerationContext {
        self.synthesize_with(&mut rand::thread_rng(), scenario)
    }

    pub fn synthesize_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        scenario: Scenario,
    ) -> GenerationContext {
        let entry_id = self.entry_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let mut ctx = GenerationContext::new();

        match scenario {
            Scenario::UserLogin => {
                ctx.insert("ip_address", random_ip(rng));
                ctx.insert("user_agent", USER_AGENT);
                ctx.insert("login_attempts", rng.gen_range(1..4i64));
            }
            Scenario::DatabaseOperation => {
                ctx.insert("query_time", format!("{}ms", rng.gen_range(10..5000)));
                ctx.insert("rows_affected", rng.gen_range(0..1000i64));
                ctx.insert("connection_pool_size", rng.gen_range(5..50i64));
            }
            Scenario::ApiRequest => {
                ctx.insert("response_time", format!("{}ms", rng.gen_range(50..2000)));
                ctx.insert("status_code", pick(rng, &STATUS_CODES));
                ctx.insert("content_length", rng.gen_range(100..10000i64));
            }
            Scenario::ErrorHandling => {
                ctx.insert("error_code", format!("ERR_{}", rng.gen_range(1000..9999)));
                ctx.insert("retry_count", rng.gen_range(0..5i64));
                ctx.insert("severity", pick(rng, &ERROR_SEVERITIES));
            }
            Scenario::SecurityEvent => {
                ctx.insert("risk_score", rng.gen_range(1..101i64));
                ctx.insert("source_ip", random_ip(rng));
                ctx.insert("event_type", "SECURITY_ALERT");
            }
            Scenario::PerformanceMetric => {
                ctx.insert("cpu_usage", format!("{}%", rng.gen_range(10..100)));
                ctx.insert("memory_usage", format!("{}MB", rng.gen_range(100..8000)));
                ctx.insert("gc_time", format!("{}ms", rng.gen_range(1..500)));
            }
            Scenario::SystemStartup => {
                ctx.insert("startup_time", format!("{}ms", rng.gen_range(1000..30000)));
                ctx.insert("active_profiles", ACTIVE_PROFILES);
                ctx.insert("port", rng.gen_range(8080..8180i64));
            }
            Scenario::CacheOperation => {
                ctx.insert("cache_name", format!("user-cache-{}", rng.gen_range(1..5)));
                ctx.insert("hit_ratio", format!("{}%", rng.gen_range(60..95)));
                ctx.insert("cache_size", rng.gen_range(100..10000i64));
            }
            Scenario::FileOperation => {
                ctx.insert("file_size", format!("{}bytes", rng.gen_range(1024..1048576)));
                ctx.insert("file_type", pick(rng, &FILE_TYPES));
                ctx.insert("processing_time", format!("{}ms", rng.gen_range(100..5000)));
            }
            Scenario::BusinessLogic => {
                ctx.insert("order_id", format!("ORD-{}", rng.gen_range(100000..999999)));
                ctx.insert("amount", format!("${}", rng.gen_range(10..10000)));
                ctx.insert("processing_time", format!("{}ms", rng.gen_range(500..3000)));
            }
        }

        ctx.insert("request_id", random_id(rng, 8));
        ctx.insert("thread_id", format!("thread-{}", rng.gen_range(1..21)));
        ctx.insert("entry_id", entry_id as i64);
        ctx.insert("service_version", format!("2.1.{}", rng.gen_range(0..10)));
        ctx.insert(
            "environment",
            if rng.gen_bool(0.5) { "production" } else { "staging" },
        );
        ctx.insert("datacenter", format!("dc-{}", (b'a' + rng.gen_range(0..4u8)) as char));
        ctx.insert("instance_id", format!("i-{:08x}", rng.gen::<u32>()));

        ctx
    }
}

fn pick<R: Rng + ?Sized, T: Clone + Into<ContextValue>>(rng: &mut R, options: &[T]) -> ContextValue {
    options[rng.gen_range(0..options.len())].clone().into()
}

/// Random dotted-quad address. First and last octets are never zero.
pub fn random_ip<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!(
        "{}.{}.{}.{}",
        rng.gen_range(1..256),
        rng.gen_range(0..256),
        rng.gen_range(0..256),
        rng.gen_range(1..256)
    )
}

/// Prefix of a random UUID, `len` characters long (at most 36).
pub fn random_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    let uuid = uuid::Builder::from_random_bytes(rng.gen()).into_uuid();
    let mut id = uuid.hyphenated().to_string();
    id.truncate(len.min(36));
    id
}
