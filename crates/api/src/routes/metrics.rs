use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

/// GET /metrics — Prometheus exposition.
pub async fn get(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
