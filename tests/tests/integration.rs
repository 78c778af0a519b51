use conductor_foundation::circuit_breaker::{CircuitBreakerConfig, State};
use conductor_foundation::orchestrator::{CapabilityConfig, CyclePolicy, OrchestratorConfig};
use conductor_foundation::workflow::{CodeAnalysisInput, TaskOptions, capability};
use conductor_foundation::{
    Orchestrator, OrchestratorError, RunStatus, TaskSpec, WorkflowBuilder, WorkflowEvent, WorkflowSpec,
};
use conductor_testing::{MockAgent, MockOutcome, RecordingEventBus, init_tracing};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn orchestrator_with(agents: &[&MockAgent]) -> Orchestrator {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    for agent in agents {
        orchestrator.register_agent(Arc::new((*agent).clone()));
    }
    orchestrator
}

#[tokio::test]
async fn test_independent_tasks_all_complete() {
    init_tracing();
    let agent = MockAgent::new("echo");
    let orchestrator = orchestrator_with(&[&agent]);

    let workflow = (0..5)
        .fold(WorkflowBuilder::create("wf-independent", "Independent"), |builder, i| {
            builder.add_task(TaskSpec::new("echo", json!({ "n": i })).with_id(format!("t{i}")))
        })
        .build()
        .unwrap();

    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.metrics.tasks_completed, 5);
    assert_eq!(result.metrics.tasks_total, 5);
    assert_eq!(result.metrics.agents_used, vec!["echo".to_string()]);
    assert!(result.errors.is_empty());
    assert_eq!(result.output("t3").unwrap()["input"], json!({ "n": 3 }));
    conductor_testing::assert_agent_called!(agent, 5);
}

#[tokio::test]
async fn test_dependent_task_sees_completed_dependency_order() {
    let agent = MockAgent::new("echo");
    let orchestrator = orchestrator_with(&[&agent]);

    let workflow = WorkflowBuilder::create("wf-chain", "Chain")
        .add_task(TaskSpec::new("echo", json!("third")).with_id("c").depends_on(["b"]))
        .add_task(TaskSpec::new("echo", json!("second")).with_id("b").depends_on(["a"]))
        .add_task(TaskSpec::new("echo", json!("first")).with_id("a"))
        .build()
        .unwrap();

    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert!(result.is_success());
    assert_eq!(agent.history().await, vec![json!("first"), json!("second"), json!("third")]);
}

#[tokio::test]
async fn test_cycle_yields_failed_result_with_dependency_error() {
    let agent = MockAgent::new("echo");
    let bus = RecordingEventBus::new();
    let orchestrator = orchestrator_with(&[&agent]).with_event_bus(Arc::new(bus.clone()));

    let workflow = WorkflowBuilder::create("wf-cycle", "Cycle")
        .add_task(TaskSpec::new("echo", json!({})).with_id("a").depends_on(["b"]))
        .add_task(TaskSpec::new("echo", json!({})).with_id("b").depends_on(["a"]))
        .build()
        .unwrap();

    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.dependency_error().unwrap().contains("circular dependency"));
    assert!(result.results.is_empty());
    assert_eq!(agent.call_count().await, 0);
    assert!(bus.events().await.is_empty());
    assert!(!orchestrator.get_workflow_status("wf-cycle").is_running);
}

#[tokio::test]
async fn test_cycle_rejected_when_policy_says_so() {
    let agent = MockAgent::new("echo");
    let orchestrator =
        Orchestrator::new(OrchestratorConfig::default().with_cycle_policy(CyclePolicy::Reject));
    orchestrator.register_agent(Arc::new(agent));

    let workflow = WorkflowBuilder::create("wf-reject", "Reject")
        .add_task(TaskSpec::new("echo", json!({})).with_id("a").depends_on(["a"]))
        .build()
        .unwrap();

    let err = orchestrator.execute_workflow(&workflow).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Dependency(_)));
    assert!(orchestrator.active_workflows().is_empty());
}

#[tokio::test]
async fn test_unknown_capability_is_an_error() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default());
    let workflow = WorkflowBuilder::create("wf-unknown", "Unknown")
        .add_task(TaskSpec::new("translation", json!({})).with_id("t"))
        .build()
        .unwrap();

    let err = orchestrator.execute_workflow(&workflow).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownCapability { .. }));
    assert!(!orchestrator.get_workflow_status("wf-unknown").is_running);
}

#[tokio::test]
async fn test_duplicate_run_is_rejected_while_first_is_active() {
    let agent = MockAgent::new("slow").with_latency(Duration::from_millis(200));
    let orchestrator = Arc::new(orchestrator_with(&[&agent]));
    let workflow = WorkflowBuilder::create("wf-dup", "Dup")
        .add_task(TaskSpec::new("slow", json!({})).with_id("t"))
        .build()
        .unwrap();

    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        let workflow = workflow.clone();
        tokio::spawn(async move { orchestrator.execute_workflow(&workflow).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = orchestrator.execute_workflow(&workflow).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::DuplicateRun(_)));

    let result = first.await.unwrap().unwrap();
    assert!(result.is_success());
    assert_eq!(agent.call_count().await, 1);

    // the id is free again once the first run finished
    assert!(orchestrator.execute_workflow(&workflow).await.is_ok());
}

#[tokio::test]
async fn test_status_and_cancel_for_unknown_ids() {
    let agent = MockAgent::new("echo");
    let orchestrator = orchestrator_with(&[&agent]);

    assert!(!orchestrator.get_workflow_status("never-started").is_running);
    assert!(!orchestrator.cancel_workflow("never-started"));

    let workflow = WorkflowBuilder::create("wf-done", "Done")
        .add_task(TaskSpec::new("echo", json!({})))
        .build()
        .unwrap();
    orchestrator.execute_workflow(&workflow).await.unwrap();

    let status = orchestrator.get_workflow_status("wf-done");
    assert!(!status.is_running);
    assert!(status.started_at.is_none());
    assert!(!orchestrator.cancel_workflow("wf-done"));
}

#[tokio::test]
async fn test_cancel_active_workflow() {
    let agent = MockAgent::new("slow").with_latency(Duration::from_millis(100));
    let bus = RecordingEventBus::new();
    let orchestrator =
        Arc::new(orchestrator_with(&[&agent]).with_event_bus(Arc::new(bus.clone())));

    let workflow = WorkflowBuilder::create("wf-cancel", "Cancel")
        .add_task(TaskSpec::new("slow", json!(1)).with_id("a"))
        .add_task(TaskSpec::new("slow", json!(2)).with_id("b").depends_on(["a"]))
        .add_task(TaskSpec::new("slow", json!(3)).with_id("c").depends_on(["b"]))
        .build()
        .unwrap();

    let run = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.execute_workflow(&workflow).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let status = orchestrator.get_workflow_status("wf-cancel");
    assert!(status.is_running);
    assert!(status.started_at.is_some());
    assert!(orchestrator.cancel_workflow("wf-cancel"));
    assert!(orchestrator.get_workflow_status("wf-cancel").cancel_requested);

    let result = run.await.unwrap().unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.metrics.tasks_completed < 3);
    assert!(agent.call_count().await < 3);
    assert!(!orchestrator.get_workflow_status("wf-cancel").is_running);
    assert_eq!(
        bus.event_types().await,
        vec!["workflow.started", "workflow.cancelled"]
    );
}

#[tokio::test]
async fn test_parallel_workflow_beats_sequential_latency() {
    let agent = MockAgent::new("slow").with_latency(Duration::from_millis(150));
    let orchestrator = orchestrator_with(&[&agent]);

    let workflow = (0..4)
        .fold(WorkflowBuilder::create("wf-parallel", "Parallel").parallel(true), |builder, i| {
            builder.add_task(TaskSpec::new("slow", json!(i)))
        })
        .build()
        .unwrap();

    let started = Instant::now();
    let result = orchestrator.execute_workflow(&workflow).await.unwrap();
    let elapsed = started.elapsed();

    assert!(result.is_success());
    assert_eq!(result.metrics.tasks_completed, 4);
    assert!(elapsed < Duration::from_millis(450), "took {elapsed:?}");
    assert!(agent.peak_concurrency() > 1);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let agent = MockAgent::new("slow").with_latency(Duration::from_millis(50));
    let orchestrator =
        Orchestrator::new(OrchestratorConfig::default().with_max_concurrent_tasks(2));
    orchestrator.register_agent(Arc::new(agent.clone()));

    let workflow = (0..6)
        .fold(WorkflowBuilder::create("wf-bounded", "Bounded").parallel(true), |builder, i| {
            builder.add_task(TaskSpec::new("slow", json!(i)))
        })
        .build()
        .unwrap();

    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert!(result.is_success());
    assert!(agent.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_failure_stops_later_levels() {
    let analysis = MockAgent::failing(capability::CODE_ANALYSIS, "parser crashed");
    let docs = MockAgent::new(capability::DOCUMENTATION);
    let orchestrator = orchestrator_with(&[&analysis, &docs]);

    let workflow = WorkflowBuilder::create("wf-failfast", "Fail fast")
        .code_analysis(
            CodeAnalysisInput {
                code: "fn main() {}".to_string(),
                ..Default::default()
            },
            TaskOptions::new().id("analyze"),
        )
        .add_capability_task(
            capability::DOCUMENTATION,
            json!({ "code": "fn main() {}" }),
            TaskOptions::new().id("docs").depends_on(["analyze"]),
        )
        .build()
        .unwrap();

    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.error("analyze").unwrap().contains("parser crashed"));
    assert!(result.output("docs").is_none());
    assert_eq!(docs.call_count().await, 0);
}

#[tokio::test]
async fn test_capability_breaker_opens_and_stops_invoking_agent() {
    let agent = MockAgent::failing("flaky", "boom");
    let orchestrator = Orchestrator::new(OrchestratorConfig::default().with_capability(
        CapabilityConfig::new("flaky").with_breaker(
            CircuitBreakerConfig::default()
                .with_failure_threshold(2)
                .with_reset_timeout(Duration::from_secs(60)),
        ),
    ));
    orchestrator.register_agent(Arc::new(agent.clone()));

    for run in 0..3 {
        let workflow = WorkflowBuilder::create(format!("wf-breaker-{run}"), "Breaker")
            .add_task(TaskSpec::new("flaky", json!({})).with_id("t"))
            .build()
            .unwrap();
        let result = orchestrator.execute_workflow(&workflow).await.unwrap();
        assert_eq!(result.status, RunStatus::Failed);
    }

    // third run was rejected by the open breaker
    assert_eq!(agent.call_count().await, 2);
    let breaker = orchestrator.breakers().get("flaky").unwrap();
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(breaker.metrics().rejected_count, 1);
}

#[tokio::test]
async fn test_retry_recovers_from_transient_failure() {
    let agent = MockAgent::new("flaky");
    agent
        .script([
            MockOutcome::Fail("first".to_string()),
            MockOutcome::Fail("second".to_string()),
            MockOutcome::Succeed(json!("ok")),
        ])
        .await;

    let orchestrator = Orchestrator::new(OrchestratorConfig::default().with_capability(
        CapabilityConfig::new("flaky")
            .with_retry(true)
            .with_breaker(
                CircuitBreakerConfig::default()
                    .with_failure_threshold(10)
                    .with_retry(3, Duration::from_millis(5)),
            ),
    ));
    orchestrator.register_agent(Arc::new(agent.clone()));

    let workflow = WorkflowBuilder::create("wf-retry", "Retry")
        .add_task(TaskSpec::new("flaky", json!({})).with_id("t"))
        .build()
        .unwrap();
    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.output("t"), Some(&json!("ok")));
    conductor_testing::assert_agent_called!(agent, 3);
}

#[tokio::test]
async fn test_workflow_timeout_keeps_partial_results() {
    let fast = MockAgent::new("fast");
    let slow = MockAgent::new("slow").with_latency(Duration::from_secs(5));
    let orchestrator = orchestrator_with(&[&fast, &slow]);

    let workflow = WorkflowBuilder::create("wf-timeout", "Timeout")
        .timeout(Duration::from_millis(100))
        .add_task(TaskSpec::new("fast", json!({})).with_id("a"))
        .add_task(TaskSpec::new("slow", json!({})).with_id("b").depends_on(["a"]))
        .build()
        .unwrap();

    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert_eq!(result.status, RunStatus::Timeout);
    assert!(result.output("a").is_some());
    assert!(result.output("b").is_none());
    assert!(!orchestrator.get_workflow_status("wf-timeout").is_running);
}

#[tokio::test]
async fn test_events_follow_run_lifecycle() {
    let agent = MockAgent::new("echo");
    let bus = RecordingEventBus::new();
    let orchestrator = orchestrator_with(&[&agent]).with_event_bus(Arc::new(bus.clone()));

    let workflow = WorkflowBuilder::create("wf-events", "Events")
        .add_task(TaskSpec::new("echo", json!({})))
        .add_task(TaskSpec::new("echo", json!({})))
        .build()
        .unwrap();
    orchestrator.execute_workflow(&workflow).await.unwrap();

    let events = bus.events_for("wf-events").await;
    assert_eq!(events.len(), 2);
    match &events[0] {
        WorkflowEvent::Started { tasks_count, name, .. } => {
            assert_eq!(*tasks_count, 2);
            assert_eq!(name, "Events");
        }
        other => panic!("unexpected first event: {other:?}"),
    }
    match &events[1] {
        WorkflowEvent::Completed { status, metrics, .. } => {
            assert_eq!(*status, RunStatus::Completed);
            assert_eq!(metrics.tasks_completed, 2);
        }
        other => panic!("unexpected last event: {other:?}"),
    }
}

#[tokio::test]
async fn test_failing_event_bus_does_not_affect_run() {
    let agent = MockAgent::new("echo");
    let bus = RecordingEventBus::failing();
    let orchestrator = orchestrator_with(&[&agent]).with_event_bus(Arc::new(bus.clone()));

    let workflow = WorkflowBuilder::create("wf-bus-down", "Bus down")
        .add_task(TaskSpec::new("echo", json!({})))
        .build()
        .unwrap();
    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert!(result.is_success());
    assert_eq!(bus.events().await.len(), 2);
}

#[tokio::test]
async fn test_builder_generates_distinct_ids() {
    let workflow = (0..20)
        .fold(WorkflowBuilder::create("wf-ids", "Ids"), |builder, _| {
            builder.add_task(TaskSpec::new("echo", json!({})))
        })
        .build()
        .unwrap();

    let mut ids: Vec<&str> = workflow.tasks().iter().map(|t| t.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[tokio::test]
async fn test_workflow_from_yaml_file_runs() {
    let agent = MockAgent::new(capability::SECURITY_EVALUATION);
    let orchestrator = orchestrator_with(&[&agent]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.yaml");
    std::fs::write(
        &path,
        r#"
id: wf-yaml
name: Security audit
parallel: true
tasks:
  - id: scan
    agent_type: security_evaluation
    input:
      code: "eval(input)"
      standards: ["OWASP"]
  - id: rescan
    agent_type: security_evaluation
    depends_on: [scan]
    input:
      code: "eval(input)"
"#,
    )
    .unwrap();

    let spec = WorkflowSpec::from_file(&path).unwrap();
    let workflow = WorkflowBuilder::from_spec(spec).build().unwrap();
    let result = orchestrator.execute_workflow(&workflow).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.metrics.tasks_completed, 2);
    assert_eq!(agent.history().await[0]["standards"], json!(["OWASP"]));
}

#[tokio::test]
async fn test_cumulative_metrics_and_shutdown() {
    let ok = MockAgent::new("ok");
    let bad = MockAgent::failing("bad", "nope");
    let orchestrator = orchestrator_with(&[&ok, &bad]);

    let good = WorkflowBuilder::create("wf-good", "Good")
        .add_task(TaskSpec::new("ok", json!({})))
        .build()
        .unwrap();
    let failing = WorkflowBuilder::create("wf-bad", "Bad")
        .add_task(TaskSpec::new("bad", json!({})))
        .build()
        .unwrap();

    orchestrator.execute_workflow(&good).await.unwrap();
    orchestrator.execute_workflow(&failing).await.unwrap();

    let metrics = orchestrator.metrics();
    assert_eq!(metrics.workflows_executed, 2);
    assert_eq!(metrics.workflows_failed, 1);
    assert_eq!(metrics.tasks_completed, 1);
    assert_eq!(metrics.tasks_failed, 1);

    orchestrator.shutdown();
    assert_eq!(orchestrator.metrics().workflows_executed, 0);
    assert!(orchestrator.active_workflows().is_empty());
}
