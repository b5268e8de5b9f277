//! Workflow runs over the built-in operations with a scripted search service.

use async_trait::async_trait;
use serde_json::{json, Value};
use sonar_core::AccountQuota;
use sonar_search::{
    HostResults, HostStatsData, SearchAllRequest, SearchApi, SearchClient, SearchNextRequest,
};
use sonar_workflow::{
    ops, DslCall, EngineState, FunctionRegistry, Invocation, WorkflowEngine, WorkflowError,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Always answers with the same page.
struct StaticApi {
    page: HostResults,
}

#[async_trait]
impl SearchApi for StaticApi {
    async fn search_all(&self, _request: &SearchAllRequest) -> sonar_search::Result<HostResults> {
        Ok(self.page.clone())
    }

    async fn search_next(
        &self,
        _request: &SearchNextRequest,
    ) -> sonar_search::Result<HostResults> {
        Ok(self.page.clone())
    }

    async fn host_stats(&self, host: &str) -> sonar_search::Result<HostStatsData> {
        Ok(HostStatsData {
            host: host.to_string(),
            ..HostStatsData::default()
        })
    }
}

fn registry() -> FunctionRegistry {
    let api = Arc::new(StaticApi {
        page: HostResults {
            size: 2,
            results: json!([
                ["a.com", "nginx/1.18 admin"],
                ["b.com", "apache"],
            ]),
            ..HostResults::default()
        },
    });
    let client = SearchClient::new(api, AccountQuota::unknown());

    let registry = FunctionRegistry::new();
    ops::register_builtins(&registry, Some(Arc::new(client)));
    registry
}

fn records(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_stages_chain_artifacts() {
    let dir = TempDir::new().unwrap();
    let mut engine = WorkflowEngine::new(registry(), dir.path());

    engine
        .run_calls(&[
            DslCall::new("fetch", vec![json!("port=80"), json!(10), json!("host,title")]),
            DslCall::new(
                "grep_add",
                vec![json!("title"), json!(r"(\w+)/([\d.]+)"), json!("server")],
            ),
            DslCall::new("value_add", vec![json!("source"), json!("sonar")]),
        ])
        .await
        .unwrap();

    assert_eq!(engine.state(), EngineState::Completed);

    let operations: Vec<&str> = engine.tasks().iter().map(|t| t.operation.as_str()).collect();
    assert_eq!(operations, vec!["fetch", "add_field", "add_field"]);

    let last = engine.last_artifact().unwrap().to_path_buf();
    assert_eq!(engine.tasks()[2].output.as_deref(), Some(last.as_path()));

    let out = records(&last);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["host"], "a.com");
    assert_eq!(out[0]["server"], json!([["nginx/1.18", "nginx", "1.18"]]));
    assert_eq!(out[1]["server"], json!([]));
    assert!(out.iter().all(|r| r["source"] == "sonar"));

    // earlier artifacts are untouched
    let first = records(engine.tasks()[0].output.as_deref().unwrap());
    assert!(first[0].get("server").is_none());
}

#[tokio::test]
async fn test_failure_keeps_completed_stages() {
    let dir = TempDir::new().unwrap();
    let mut engine = WorkflowEngine::new(registry(), dir.path());

    let err = engine
        .run_calls(&[
            DslCall::new("fetch", vec![json!("port=80")]),
            DslCall::new("grep_add", vec![json!("title"), json!("("), json!("broken")]),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::Stage { ref name, .. } if name == "add_field"));
    assert!(matches!(err.root_cause(), WorkflowError::Pattern(_)));
    assert_eq!(engine.state(), EngineState::Failed);
    assert_eq!(engine.tasks().len(), 1);
    assert_eq!(engine.last_artifact(), engine.tasks()[0].output.as_deref());
}

#[tokio::test]
async fn test_add_field_without_input_fails() {
    let dir = TempDir::new().unwrap();
    let mut engine = WorkflowEngine::new(registry(), dir.path());

    let err = engine
        .run_calls(&[DslCall::new("value_add", vec![json!("tag"), json!(1)])])
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), WorkflowError::MissingInput(_)));
}

#[tokio::test]
async fn test_translation_error_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let mut engine = WorkflowEngine::new(registry(), dir.path());

    let err = engine
        .run_calls(&[
            DslCall::new("fetch", vec![json!("port=80")]),
            DslCall::new("grep_add", vec![json!("title")]),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::InvalidArguments { .. }));
    assert_eq!(engine.state(), EngineState::Idle);
    assert!(engine.tasks().is_empty());
}

#[tokio::test]
async fn test_load_then_close_removes_only_copies() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("assets.json");
    std::fs::write(&source, "{\"host\":\"a.com\"}\n{\"host\":\"b.com\"}\n").unwrap();

    let mut engine = WorkflowEngine::new(registry(), dir.path().join("work"));
    engine
        .run(&[
            Invocation::new("load_file", json!({ "file": source })),
            Invocation::new("add_field", json!({ "name": "seen", "value": true })),
        ])
        .await
        .unwrap();

    let outputs: Vec<_> = engine
        .tasks()
        .iter()
        .filter_map(|t| t.output.clone())
        .collect();
    assert_eq!(outputs.len(), 2);
    assert!(records(&outputs[1]).iter().all(|r| r["seen"] == true));
    assert!(engine.tasks()[1].params.contains("\"seen\""));

    engine.close().unwrap();
    assert!(outputs.iter().all(|p| !p.exists()));
    assert!(engine.last_artifact().is_none());
    assert!(source.exists());
}

#[tokio::test]
async fn test_fetch_is_syntax_only_without_client() {
    let dir = TempDir::new().unwrap();
    let registry = FunctionRegistry::new();
    ops::register_builtins(&registry, None);
    let mut engine = WorkflowEngine::new(registry, dir.path());

    let err = engine
        .run_calls(&[DslCall::new("fetch", vec![json!("port=80")])])
        .await
        .unwrap_err();

    assert!(matches!(err.root_cause(), WorkflowError::SyntaxOnly(_)));
}

#[tokio::test]
async fn test_runs_get_distinct_ids() {
    let dir = TempDir::new().unwrap();
    let a = WorkflowEngine::new(registry(), dir.path());
    let b = WorkflowEngine::new(registry(), dir.path());
    assert_ne!(a.run_id(), b.run_id());
}
