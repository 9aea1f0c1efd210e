//! Metrics and tracing sinks. Both are external collaborators; this module
//! declares the recorded event shapes and ships a no-op default so the core
//! can always call through without an `Option` check at every call site,
//! the way `cloudllm::event::EventHandler`'s trait methods default to no-ops.

/// Sink for execution-level metrics. Implementations are external
/// (Prometheus, StatsD, ...).
pub trait AgentMetrics: Send + Sync {
    fn record_execution(&self, success: bool, duration_ms: u64, error_code: Option<&str>) {
        let _ = (success, duration_ms, error_code);
    }

    fn record_guard_rejection(&self, stage: &str, reason: &str) {
        let _ = (stage, reason);
    }

    fn record_tool_call(&self, name: &str, duration_ms: u64, success: bool) {
        let _ = (name, duration_ms, success);
    }

    fn record_cache_hit(&self, hit: bool) {
        let _ = hit;
    }

    fn record_llm_call_tokens(&self, prompt_tokens: u64, completion_tokens: u64) {
        let _ = (prompt_tokens, completion_tokens);
    }

    fn record_output_guard_action(&self, action: &str) {
        let _ = action;
    }
}

/// Structured tracing sink, distinct from the `log` facade used for
/// process-local diagnostics: spans/events meant for an external collector.
pub trait Tracer: Send + Sync {
    fn span_start(&self, name: &str, run_id: &str) {
        let _ = (name, run_id);
    }

    fn span_end(&self, name: &str, run_id: &str) {
        let _ = (name, run_id);
    }
}

/// No-op default used when the host application does not configure a
/// metrics sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;
impl AgentMetrics for NoopMetrics {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;
impl Tracer for NoopTracer {}
