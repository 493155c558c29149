//! Scheduling technique executors that produce the aggregator's input.
//!
//! Executors are external collaborators (vector stores, keyword indexes,
//! LLM agents). This module only decides how they run and turns every kind
//! of failure into a `failed` response so one broken technique never sinks
//! the batch.

use ragfuse_core::{ExecutionMode, QueryConfig, Technique, TechniqueResponse};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;
use tracing::{debug, warn};

/// One retrieval technique that can answer a query.
pub trait TechniqueExecutor: Send + Sync {
    /// Tag stamped on responses this executor produces.
    fn technique(&self) -> Technique;

    /// Run the technique for `query`.
    ///
    /// # Errors
    ///
    /// Any error is reported as a `failed` response for this technique.
    fn execute(&self, query: &QueryConfig) -> anyhow::Result<TechniqueResponse>;
}

/// Run every executor for `query` and collect one response per executor,
/// in executor order.
///
/// `Parallel` and `DependencyResolved` run on the rayon pool and wait for
/// all executors to settle; `Sequential` runs them one at a time in order.
#[must_use]
pub fn execute_techniques(
    executors: &[Box<dyn TechniqueExecutor>],
    query: &QueryConfig,
    mode: ExecutionMode,
) -> Vec<TechniqueResponse> {
    debug!(executors = executors.len(), %mode, "executing techniques");
    match mode {
        ExecutionMode::Sequential => executors
            .iter()
            .map(|e| run_one(e.as_ref(), query))
            .collect(),
        ExecutionMode::Parallel | ExecutionMode::DependencyResolved => executors
            .par_iter()
            .map(|e| run_one(e.as_ref(), query))
            .collect(),
    }
}

fn run_one(executor: &dyn TechniqueExecutor, query: &QueryConfig) -> TechniqueResponse {
    let technique = executor.technique();
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(|| executor.execute(query)));
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match outcome {
        Ok(Ok(mut response)) => {
            if response.technique.as_str().is_empty() {
                response.technique = technique;
            }
            if response.metadata.execution_time_ms == 0 {
                response.metadata.execution_time_ms = elapsed_ms;
            }
            response
        }
        Ok(Err(err)) => {
            warn!(%technique, "technique failed: {err:#}");
            TechniqueResponse::failed(technique, format!("{err:#}"))
                .with_execution_time(elapsed_ms)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(%technique, "technique panicked: {message}");
            TechniqueResponse::failed(technique, format!("technique panicked: {message}"))
                .with_execution_time(elapsed_ms)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// Request bookkeeping reported alongside an aggregation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub request_id: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Sum of the reported `cost_usd` values.
    pub total_cost_usd: f64,
    pub total_execution_time_ms: u64,
}

impl BatchSummary {
    #[must_use]
    pub fn from_responses(request_id: impl Into<String>, responses: &[TechniqueResponse]) -> Self {
        let successful = responses.iter().filter(|r| r.is_successful()).count();
        Self {
            request_id: request_id.into(),
            total: responses.len(),
            successful,
            failed: responses.len() - successful,
            total_cost_usd: responses
                .iter()
                .filter_map(|r| r.metadata.cost_usd)
                .filter(|c| c.is_finite())
                .sum(),
            total_execution_time_ms: responses
                .iter()
                .map(|r| r.metadata.execution_time_ms)
                .fold(0_u64, u64::saturating_add),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use ragfuse_core::{ResponseStatus, SourceChunk};
    use std::sync::Mutex;

    struct Fixed(&'static str);

    impl TechniqueExecutor for Fixed {
        fn technique(&self) -> Technique {
            Technique::from(self.0)
        }

        fn execute(&self, query: &QueryConfig) -> anyhow::Result<TechniqueResponse> {
            Ok(TechniqueResponse::completed(
                self.0,
                vec![SourceChunk::new("c1", "d1", 0, query.query.clone(), 0.5)],
            )
            .with_execution_time(12))
        }
    }

    struct Broken;

    impl TechniqueExecutor for Broken {
        fn technique(&self) -> Technique {
            Technique::from("lexical_search")
        }

        fn execute(&self, _query: &QueryConfig) -> anyhow::Result<TechniqueResponse> {
            bail!("index offline")
        }
    }

    struct Panicky;

    impl TechniqueExecutor for Panicky {
        fn technique(&self) -> Technique {
            Technique::from("agentic_rag")
        }

        fn execute(&self, _query: &QueryConfig) -> anyhow::Result<TechniqueResponse> {
            panic!("agent loop exploded")
        }
    }

    struct Recording {
        name: &'static str,
        log: &'static Mutex<Vec<&'static str>>,
    }

    impl TechniqueExecutor for Recording {
        fn technique(&self) -> Technique {
            Technique::from(self.name)
        }

        fn execute(&self, _query: &QueryConfig) -> anyhow::Result<TechniqueResponse> {
            self.log.lock().unwrap().push(self.name);
            Ok(TechniqueResponse::completed(self.name, vec![]))
        }
    }

    fn executors() -> Vec<Box<dyn TechniqueExecutor>> {
        vec![
            Box::new(Fixed("semantic_search")),
            Box::new(Broken),
            Box::new(Panicky),
        ]
    }

    #[test]
    fn failures_become_failed_responses_in_every_mode() {
        for mode in ExecutionMode::ALL {
            let responses = execute_techniques(&executors(), &QueryConfig::new("garlic"), *mode);
            assert_eq!(responses.len(), 3, "{mode}");

            assert!(responses[0].is_successful());
            assert_eq!(responses[0].source_chunks[0].content, "garlic");
            assert_eq!(responses[0].metadata.execution_time_ms, 12);

            assert_eq!(responses[1].status, ResponseStatus::Failed);
            assert_eq!(responses[1].technique.as_str(), "lexical_search");
            assert_eq!(responses[1].error.as_deref(), Some("index offline"));
            assert!(responses[1].source_chunks.is_empty());

            assert_eq!(responses[2].status, ResponseStatus::Failed);
            assert!(
                responses[2]
                    .error
                    .as_deref()
                    .is_some_and(|e| e.contains("agent loop exploded"))
            );
        }
    }

    #[test]
    fn sequential_runs_in_listed_order() {
        static LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
        let executors: Vec<Box<dyn TechniqueExecutor>> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|name| Box::new(Recording { name, log: &LOG }) as Box<dyn TechniqueExecutor>)
            .collect();
        let responses =
            execute_techniques(&executors, &QueryConfig::default(), ExecutionMode::Sequential);
        assert_eq!(*LOG.lock().unwrap(), vec!["a", "b", "c", "d"]);
        let order: Vec<&str> = responses.iter().map(|r| r.technique.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn batch_summary_totals() {
        let mut ok = TechniqueResponse::completed("semantic_search", vec![]).with_execution_time(40);
        ok.metadata.cost_usd = Some(0.002);
        let mut other = TechniqueResponse::completed("reranking", vec![]).with_execution_time(60);
        other.metadata.cost_usd = Some(0.001);
        let failed =
            TechniqueResponse::failed("agentic_rag", "timeout").with_execution_time(30_000);

        let summary = BatchSummary::from_responses("req-1", &[ok, other, failed]);
        assert_eq!(summary.request_id, "req-1");
        assert_eq!(summary.total, 3);
        assert_eq!(summary.successful, 2);
        assert_eq!(summary.failed, 1);
        assert!((summary.total_cost_usd - 0.003).abs() < 1e-12);
        assert_eq!(summary.total_execution_time_ms, 30_100);
    }
}
