//! Per-tenant metric registry and Prometheus exposition.
//!
//! Two layers of state, both owned here and guarded by one `RwLock`:
//! the tenant cache (`tenant → wire id → Metric`) scoped to each agent's
//! wire session, and the process-wide exposed-family table (`name →
//! tenant-labeled gauge or counter`). Families are created exactly once,
//! under the write lock, so racing tenants cannot double-register a name.
//! The exposition path reads only the `prometheus::Registry`, which is
//! internally synchronized, and never takes the state lock.

use std::collections::HashMap;

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, TextEncoder};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::wire::{PayloadScanner, WireError, WireEvent};

const TENANT_LABEL: &str = "tenant_id";

/// Errors from the exposition path.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("encoding metric exposition: {0}")]
    Encode(#[from] prometheus::Error),

    #[error("metric exposition is not valid UTF-8")]
    InvalidOutput,
}

/// How a metric behaves on the exposed side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

/// Classify a metric name by convention. Applied once, at definition;
/// never re-evaluated.
pub fn classify(name: &str) -> MetricKind {
    if name.starts_with("gauge_") {
        MetricKind::Gauge
    } else {
        MetricKind::Counter
    }
}

/// One bound metric in a tenant's wire session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub name: String,
    pub wire_id: i64,
    pub value: i64,
    pub kind: MetricKind,
}

/// A definition announced by `N` but not yet bound to a wire id.
/// At most one may be pending; a new `N` silently replaces it.
struct PendingDefinition {
    name: String,
    kind: MetricKind,
}

/// A process-wide exposed family, fixed to the kind of its first
/// successful bind.
enum Family {
    Gauge(IntGaugeVec),
    Counter(IntCounterVec),
}

#[derive(Default)]
struct RegistryState {
    /// Tenant caches. Created lazily, never removed.
    tenants: HashMap<String, HashMap<i64, Metric>>,
    /// Exposed families by metric name.
    families: HashMap<String, Family>,
}

/// The shared metric registry behind all concurrent ingest requests.
pub struct MetricRegistry {
    exposed: prometheus::Registry,
    state: RwLock<RegistryState>,
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            exposed: prometheus::Registry::new(),
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Decode one tenant's metrics payload and apply it.
    ///
    /// A scan error aborts this payload only; mutations already applied
    /// stay applied. Unresolvable updates (unknown wire id, no pending
    /// definition) are logged and skipped, never fatal.
    pub async fn ingest_payload(&self, tenant_id: &str, payload: &str) -> Result<(), WireError> {
        let mut state = self.state.write().await;
        let state = &mut *state;
        let mut pending: Option<PendingDefinition> = None;

        for event in PayloadScanner::new(payload) {
            match event? {
                WireEvent::Define { name } => {
                    pending = Some(PendingDefinition {
                        name: name.to_string(),
                        kind: classify(name),
                    });
                }
                WireEvent::Set { wire_id, value } => {
                    let cache = state.tenants.entry(tenant_id.to_string()).or_default();
                    if let Some(entry) = cache.get_mut(&wire_id) {
                        // Known id: the cache is updated but the exposed
                        // series is not. Agents re-`Set` on reconnect and
                        // the exposed side only ever moves via deltas.
                        debug!(name = %entry.name, value, "set cached metric");
                        entry.value = value;
                    } else if let Some(def) = pending.take() {
                        let metric = Metric {
                            name: def.name,
                            wire_id,
                            value,
                            kind: def.kind,
                        };
                        info!(
                            tenant = %tenant_id,
                            name = %metric.name,
                            wire_id,
                            init = value,
                            "registered metric"
                        );
                        register_family(&self.exposed, &mut state.families, &metric);
                        expose_bind(&state.families, &metric, tenant_id);
                        cache.insert(wire_id, metric);
                    } else {
                        warn!(tenant = %tenant_id, wire_id, "set for unknown wire id");
                    }
                }
                WireEvent::Increment { wire_id, delta } => {
                    let cache = state.tenants.entry(tenant_id.to_string()).or_default();
                    if let Some(entry) = cache.get_mut(&wire_id) {
                        entry.value += delta;
                        expose_delta(&state.families, entry, tenant_id, delta);
                    } else {
                        warn!(tenant = %tenant_id, wire_id, "increment for unknown wire id");
                    }
                }
            }
        }
        Ok(())
    }

    /// Render the current exposed state in the Prometheus text format.
    pub fn render(&self) -> Result<String, RegistryError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.exposed.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|_| RegistryError::InvalidOutput)
    }

    /// A copy of one tenant's cache, if the tenant has been seen.
    pub async fn tenant_snapshot(&self, tenant_id: &str) -> Option<HashMap<i64, Metric>> {
        self.state.read().await.tenants.get(tenant_id).cloned()
    }
}

/// Create the exposed family for `metric.name` if this is the name's
/// first sighting. The first bind wins the kind; later definitions reuse
/// the existing family unreconciled.
fn register_family(
    exposed: &prometheus::Registry,
    families: &mut HashMap<String, Family>,
    metric: &Metric,
) {
    if families.contains_key(&metric.name) {
        debug!(name = %metric.name, "family already registered");
        return;
    }
    let outcome = match metric.kind {
        MetricKind::Gauge => IntGaugeVec::new(
            Opts::new(&metric.name, "client metric forwarded from agents"),
            &[TENANT_LABEL],
        )
        .and_then(|vec| {
            exposed.register(Box::new(vec.clone()))?;
            Ok(Family::Gauge(vec))
        }),
        MetricKind::Counter => IntCounterVec::new(
            Opts::new(&metric.name, "client metric forwarded from agents"),
            &[TENANT_LABEL],
        )
        .and_then(|vec| {
            exposed.register(Box::new(vec.clone()))?;
            Ok(Family::Counter(vec))
        }),
    };
    match outcome {
        Ok(family) => {
            families.insert(metric.name.clone(), family);
        }
        // The agent controls the name; an unexposable one only loses its
        // exposed series, the cache still tracks it.
        Err(e) => error!(name = %metric.name, error = %e, "registering exposed family"),
    }
}

/// Seed the binding tenant's labeled series with the initial value.
fn expose_bind(families: &HashMap<String, Family>, metric: &Metric, tenant_id: &str) {
    match families.get(&metric.name) {
        Some(Family::Gauge(vec)) => {
            vec.with_label_values(&[tenant_id]).set(metric.value);
        }
        Some(Family::Counter(vec)) => {
            if metric.value < 0 {
                error!(
                    name = %metric.name,
                    init = metric.value,
                    "counter bound with negative initial value"
                );
            } else {
                vec.with_label_values(&[tenant_id]).inc_by(metric.value as u64);
            }
        }
        None => {}
    }
}

/// Apply an increment delta to the exposed series. A counter's exposed
/// value is monotonically non-decreasing: a negative delta is reported
/// and skipped (the cache has already advanced).
fn expose_delta(families: &HashMap<String, Family>, metric: &Metric, tenant_id: &str, delta: i64) {
    match families.get(&metric.name) {
        Some(Family::Gauge(vec)) => {
            debug!(name = %metric.name, delta, value = metric.value, "gauge delta");
            vec.with_label_values(&[tenant_id]).add(delta);
        }
        Some(Family::Counter(vec)) => {
            if delta < 0 {
                error!(name = %metric.name, delta, "counter delta is negative");
            } else {
                debug!(name = %metric.name, delta, value = metric.value, "counter delta");
                vec.with_label_values(&[tenant_id]).inc_by(delta as u64);
            }
        }
        None => warn!(name = %metric.name, "no exposed family for cached metric"),
    }
}
