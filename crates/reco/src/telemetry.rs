//! Recommendation performance tracking.
//!
//! Every call reports into per-method per-day buckets held in process;
//! recording is fire-and-forget off the request's critical path and can
//! never fail a response. Aggregation answers the stats endpoint,
//! classifies service health, and produces rule-based optimization
//! suggestions.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TelemetrySettings;
use crate::types::RecommendationMethod;

/// Slow queries retained per method-day bucket.
const SLOW_LIST_CAP: usize = 50;

/// One recommendation call, as reported by the service facade.
#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub method: RecommendationMethod,
    pub execution_ms: u64,
    pub result_count: usize,
    pub cache_hit: bool,
    pub room_id: Uuid,
    pub caller_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlowQuery {
    pub room_id: Uuid,
    pub execution_ms: u64,
    pub at: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct DailyStats {
    count: u64,
    total_ms: u64,
    cache_hits: u64,
    errors: u64,
    slow: Vec<SlowQuery>,
}

/// Health status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn http_status_code(&self) -> u16 {
        match self {
            HealthStatus::Healthy => 200,
            HealthStatus::Degraded => 200, // Still serving traffic
            HealthStatus::Unhealthy => 503,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub avg_response_ms: f64,
    pub cache_hit_rate: f64,
    pub total_queries: u64,
    pub details: String,
}

/// Per-method aggregate inside a [`PerformanceReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSummary {
    pub method: RecommendationMethod,
    pub count: u64,
    pub avg_response_ms: f64,
    pub cache_hit_rate: f64,
    pub slow_queries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub window_days: i64,
    pub total_queries: u64,
    pub avg_response_ms: f64,
    pub cache_hit_rate: f64,
    pub error_rate: f64,
    pub methods: Vec<MethodSummary>,
    pub suggestions: Vec<String>,
}

pub struct PerformanceTracker {
    buckets: DashMap<(NaiveDate, RecommendationMethod), DailyStats>,
    settings: TelemetrySettings,
}

impl PerformanceTracker {
    pub fn new(settings: TelemetrySettings) -> Self {
        Self {
            buckets: DashMap::new(),
            settings,
        }
    }

    /// Record one call. Cheap and lock-free enough to run from a detached
    /// task; never returns an error.
    pub fn record(&self, record: QueryRecord) {
        if record.execution_ms > self.settings.very_slow_query_ms {
            warn!(
                method = %record.method,
                room_id = %record.room_id,
                execution_ms = record.execution_ms,
                "Recommendation query exceeded the slow-query ceiling"
            );
        }

        let now = Utc::now();
        let key = (now.date_naive(), record.method);
        let mut bucket = self.buckets.entry(key).or_default();
        bucket.count += 1;
        bucket.total_ms += record.execution_ms;
        if record.cache_hit {
            bucket.cache_hits += 1;
        }
        if record.execution_ms > self.settings.slow_query_ms && bucket.slow.len() < SLOW_LIST_CAP {
            bucket.slow.push(SlowQuery {
                room_id: record.room_id,
                execution_ms: record.execution_ms,
                at: now,
            });
        }
    }

    /// Count a failed request against the method.
    pub fn record_error(&self, method: RecommendationMethod) {
        let key = (Utc::now().date_naive(), method);
        self.buckets.entry(key).or_default().errors += 1;
    }

    /// Aggregate the last `days` days of buckets.
    pub fn aggregate(&self, days: i64) -> PerformanceReport {
        let days = days.max(1);
        let cutoff = Utc::now().date_naive() - Duration::days(days - 1);

        let mut total_queries = 0u64;
        let mut total_ms = 0u64;
        let mut total_hits = 0u64;
        let mut total_errors = 0u64;
        let mut per_method: std::collections::HashMap<RecommendationMethod, DailyStats> =
            std::collections::HashMap::new();

        for entry in self.buckets.iter() {
            let (date, method) = *entry.key();
            if date < cutoff {
                continue;
            }
            let stats = entry.value();
            total_queries += stats.count;
            total_ms += stats.total_ms;
            total_hits += stats.cache_hits;
            total_errors += stats.errors;

            let merged = per_method.entry(method).or_default();
            merged.count += stats.count;
            merged.total_ms += stats.total_ms;
            merged.cache_hits += stats.cache_hits;
            merged.errors += stats.errors;
            merged.slow.extend(stats.slow.iter().cloned());
        }

        let avg_response_ms = if total_queries > 0 {
            total_ms as f64 / total_queries as f64
        } else {
            0.0
        };
        let cache_hit_rate = if total_queries > 0 {
            total_hits as f64 / total_queries as f64
        } else {
            0.0
        };
        let attempts = total_queries + total_errors;
        let error_rate = if attempts > 0 {
            total_errors as f64 / attempts as f64
        } else {
            0.0
        };

        let mut methods: Vec<MethodSummary> = per_method
            .into_iter()
            .map(|(method, stats)| MethodSummary {
                method,
                count: stats.count,
                avg_response_ms: if stats.count > 0 {
                    stats.total_ms as f64 / stats.count as f64
                } else {
                    0.0
                },
                cache_hit_rate: if stats.count > 0 {
                    stats.cache_hits as f64 / stats.count as f64
                } else {
                    0.0
                },
                slow_queries: stats.slow.len(),
            })
            .collect();
        // Slowest first, deterministic on ties.
        methods.sort_by(|a, b| {
            b.avg_response_ms
                .partial_cmp(&a.avg_response_ms)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });

        let suggestions = self.suggestions(avg_response_ms, cache_hit_rate, error_rate, &methods);

        PerformanceReport {
            window_days: days,
            total_queries,
            avg_response_ms,
            cache_hit_rate,
            error_rate,
            methods,
            suggestions,
        }
    }

    fn suggestions(
        &self,
        avg_response_ms: f64,
        cache_hit_rate: f64,
        error_rate: f64,
        methods: &[MethodSummary],
    ) -> Vec<String> {
        let mut suggestions = Vec::new();

        if cache_hit_rate < self.settings.unhealthy_hit_rate {
            suggestions.push(
                "Cache hit rate is below 50%: consider longer base TTLs or a larger warm tier"
                    .to_string(),
            );
        }
        if avg_response_ms > self.settings.degraded_avg_ms {
            suggestions.push(
                "Average latency is above 1s: prefer the bulk candidate query path".to_string(),
            );
        }
        for summary in methods {
            if summary.method == RecommendationMethod::Collaborative
                && summary.avg_response_ms > self.settings.degraded_avg_ms
            {
                suggestions.push(
                    "Collaborative scoring is slow: lower the active-user scan limit".to_string(),
                );
            }
        }
        if error_rate > 0.05 {
            suggestions
                .push("Error rate is above 5%: check storage connectivity".to_string());
        }
        if suggestions.is_empty() {
            suggestions.push("Performance is within expected bounds".to_string());
        }
        suggestions
    }

    /// Classify health from the last day of traffic.
    pub fn health(&self) -> HealthReport {
        let report = self.aggregate(1);
        if report.total_queries == 0 {
            return HealthReport {
                status: HealthStatus::Healthy,
                avg_response_ms: 0.0,
                cache_hit_rate: 0.0,
                total_queries: 0,
                details: "no traffic recorded today".to_string(),
            };
        }

        let status = if report.avg_response_ms > self.settings.unhealthy_avg_ms
            || report.cache_hit_rate < self.settings.unhealthy_hit_rate
        {
            HealthStatus::Unhealthy
        } else if report.avg_response_ms > self.settings.degraded_avg_ms
            || report.cache_hit_rate < self.settings.degraded_hit_rate
        {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            status,
            avg_response_ms: report.avg_response_ms,
            cache_hit_rate: report.cache_hit_rate,
            total_queries: report.total_queries,
            details: format!(
                "avg {:.0} ms, cache hit rate {:.0}%",
                report.avg_response_ms,
                report.cache_hit_rate * 100.0
            ),
        }
    }

    /// Drop buckets older than the retention window. Returns how many were
    /// removed.
    pub fn purge_stale(&self) -> usize {
        let cutoff = Utc::now().date_naive() - Duration::days(self.settings.retention_days);
        let before = self.buckets.len();
        self.buckets.retain(|(date, _), _| *date >= cutoff);
        before - self.buckets.len()
    }

    /// Periodic purge of aged-out buckets.
    pub fn spawn_maintenance(tracker: Arc<Self>) {
        let interval = std::time::Duration::from_secs(tracker.settings.purge_interval_sec);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                let removed = tracker.purge_stale();
                if removed > 0 {
                    debug!(removed, "Purged aged telemetry buckets");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PerformanceTracker {
        PerformanceTracker::new(TelemetrySettings::default())
    }

    fn record(method: RecommendationMethod, ms: u64, hit: bool) -> QueryRecord {
        QueryRecord {
            method,
            execution_ms: ms,
            result_count: 8,
            cache_hit: hit,
            room_id: Uuid::from_u128(1),
            caller_id: None,
        }
    }

    #[test]
    fn aggregation_computes_rates() {
        let t = tracker();
        t.record(record(RecommendationMethod::Hybrid, 100, true));
        t.record(record(RecommendationMethod::Hybrid, 300, false));
        t.record(record(RecommendationMethod::ContentBased, 200, true));

        let report = t.aggregate(7);
        assert_eq!(report.total_queries, 3);
        assert!((report.avg_response_ms - 200.0).abs() < 1e-9);
        assert!((report.cache_hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.error_rate, 0.0);
    }

    #[test]
    fn slow_queries_land_in_the_method_summary() {
        let t = tracker();
        t.record(record(RecommendationMethod::Collaborative, 1_500, false));
        t.record(record(RecommendationMethod::Collaborative, 100, false));

        let report = t.aggregate(1);
        let collaborative = report
            .methods
            .iter()
            .find(|m| m.method == RecommendationMethod::Collaborative)
            .unwrap();
        assert_eq!(collaborative.slow_queries, 1);
        assert_eq!(collaborative.count, 2);
    }

    #[test]
    fn errors_feed_the_error_rate() {
        let t = tracker();
        t.record(record(RecommendationMethod::Hybrid, 100, false));
        t.record_error(RecommendationMethod::Hybrid);

        let report = t.aggregate(1);
        assert!((report.error_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn health_classifies_from_latency_and_hit_rate() {
        // Fast and cached: healthy.
        let t = tracker();
        for _ in 0..10 {
            t.record(record(RecommendationMethod::Hybrid, 100, true));
        }
        assert_eq!(t.health().status, HealthStatus::Healthy);

        // Slow queries with no cache hits: unhealthy.
        let t = tracker();
        for _ in 0..10 {
            t.record(record(RecommendationMethod::Hybrid, 2_500, false));
        }
        assert_eq!(t.health().status, HealthStatus::Unhealthy);

        // Moderately slow but well cached: degraded.
        let t = tracker();
        for _ in 0..10 {
            t.record(record(RecommendationMethod::Hybrid, 1_500, true));
        }
        assert_eq!(t.health().status, HealthStatus::Degraded);
    }

    #[test]
    fn empty_tracker_reports_healthy() {
        let t = tracker();
        let health = t.health();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.total_queries, 0);
    }

    #[test]
    fn low_hit_rate_produces_a_cache_suggestion() {
        let t = tracker();
        for _ in 0..10 {
            t.record(record(RecommendationMethod::Hybrid, 100, false));
        }
        let report = t.aggregate(1);
        assert!(report
            .suggestions
            .iter()
            .any(|s| s.contains("Cache hit rate")));
    }

    #[test]
    fn purge_is_a_noop_for_fresh_buckets() {
        let t = tracker();
        t.record(record(RecommendationMethod::Hybrid, 100, true));
        assert_eq!(t.purge_stale(), 0);
        assert_eq!(t.aggregate(1).total_queries, 1);
    }
}
