use std::sync::Arc;

use serde_json::{json, Value};

use super::*;
use crate::defaults::ExpressionConditionEvaluator;
use crate::test_support::*;

async fn engine() -> WorkflowEngine {
    WorkflowEngine::builder().store(seeded_store().await).build()
}

async fn at_manager(engine: &WorkflowEngine) -> Request {
    let request = engine
        .start_flow("purchase", "New laptop", REQUESTER)
        .await
        .unwrap();
    engine
        .execute_flow_step(
            &request.id,
            "form_submitted",
            &json!({"headerData": {"amount": 1800}}),
            REQUESTER,
        )
        .await
        .unwrap()
}

async fn approve(engine: &WorkflowEngine, request_id: &str, user_id: &str) -> Request {
    engine
        .execute_flow_step(request_id, "approved", &json!({"action": "approve"}), user_id)
        .await
        .unwrap()
}

fn count(tasks: &[Task], status: TaskStatus) -> usize {
    tasks.iter().filter(|t| t.status == status).count()
}

// ---------------------------------------------------------------------------
// start_flow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_flow_creates_draft_at_start_node() {
    let engine = engine().await;
    let request = engine
        .start_flow("purchase", "New laptop", REQUESTER)
        .await
        .unwrap();

    assert_eq!(request.current_step, "start");
    assert_eq!(request.status, RequestStatus::Draft);
    assert_eq!(request.created_by, REQUESTER);

    let history = engine.history(&request.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, "created");
    assert_eq!(history[0].user_id, REQUESTER);
    assert_eq!(
        history[0].metadata.as_deref(),
        Some(r#"{"title":"New laptop"}"#)
    );
}

#[tokio::test]
async fn start_flow_unknown_type_is_flow_not_found() {
    let engine = engine().await;
    let err = engine.start_flow("nope", "x", REQUESTER).await.unwrap_err();
    assert!(matches!(err, EngineError::FlowNotFound { .. }));
    assert_eq!(err.http_status(), 404);
}

#[tokio::test]
async fn start_flow_without_start_node_is_invalid_flow() {
    let flow = json!({
        "nodes": [{"id": "done", "type": "end", "data": {}}],
        "edges": []
    });
    for validate_on_start in [true, false] {
        let store = seeded_store().await;
        store.insert_request_type(request_type("headless", &flow)).await;
        let engine = WorkflowEngine::builder()
            .store(store)
            .config(EngineConfig {
                validate_on_start,
                ..EngineConfig::default()
            })
            .build();
        let err = engine
            .start_flow("headless", "x", REQUESTER)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidFlow { .. }), "{err}");
    }
}

#[tokio::test]
async fn start_flow_validation_can_be_disabled() {
    // Start but no end node: a validation error, not a structural one.
    let flow = json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {}},
            {"id": "details", "type": "form", "data": {}}
        ],
        "edges": [{"id": "e1", "source": "start", "target": "details"}]
    });

    let store = seeded_store().await;
    store.insert_request_type(request_type("open", &flow)).await;
    let engine = WorkflowEngine::builder().store(store).build();
    let err = engine.start_flow("open", "x", REQUESTER).await.unwrap_err();
    assert!(err.to_string().contains("no end node"), "{err}");

    let store = seeded_store().await;
    store.insert_request_type(request_type("open", &flow)).await;
    let engine = WorkflowEngine::builder()
        .store(store)
        .config(EngineConfig {
            validate_on_start: false,
            ..EngineConfig::default()
        })
        .build();
    let request = engine.start_flow("open", "x", REQUESTER).await.unwrap();
    assert_eq!(request.current_step, "start");
}

#[tokio::test]
async fn unknown_node_type_is_reported() {
    let flow = json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {}},
            {"id": "hook", "type": "webhook", "data": {}},
            {"id": "done", "type": "end", "data": {}}
        ],
        "edges": [{"id": "e1", "source": "start", "target": "done"}]
    });
    let store = seeded_store().await;
    store.insert_request_type(request_type("hooked", &flow)).await;
    let engine = WorkflowEngine::builder().store(store).build();

    let err = engine.start_flow("hooked", "x", REQUESTER).await.unwrap_err();
    assert!(
        matches!(&err, EngineError::UnknownNodeType { node_id, node_type } if node_id == "hook" && node_type == "webhook")
    );
    assert_eq!(err.http_status(), 500);
}

// ---------------------------------------------------------------------------
// execute_flow_step: start and form
// ---------------------------------------------------------------------------

#[tokio::test]
async fn form_header_submission_stores_one_row_and_advances() {
    let engine = engine().await;
    let request = engine
        .start_flow("purchase", "New laptop", REQUESTER)
        .await
        .unwrap();

    // Leaving the draft without data stops at the form.
    let request = engine
        .execute_flow_step(&request.id, "submitted", &json!({}), REQUESTER)
        .await
        .unwrap();
    assert_eq!(request.current_step, "details");
    assert_eq!(request.status, RequestStatus::InProgress);

    let request = engine
        .execute_flow_step(
            &request.id,
            "form_submitted",
            &json!({"headerData": {"a": 1}}),
            REQUESTER,
        )
        .await
        .unwrap();
    assert_eq!(request.current_step, "manager");
    assert_eq!(request.status, RequestStatus::InProgress);

    let rows = engine.store().list_request_data(&request.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].data_type, DataType::Header);
    assert_eq!(rows[0].field_name, "a");
    assert_eq!(rows[0].field_value, "1");
    assert_eq!(rows[0].row_index, None);

    // Entering the approval node hands out one task per assignee.
    let tasks = engine.tasks_for_request(&request.id).await.unwrap();
    let assigned: Vec<_> = tasks.iter().map(|t| t.assigned_to.as_str()).collect();
    assert_eq!(assigned, vec![ANN, BOB, CAT]);
    assert!(tasks.iter().all(|t| t.is_pending() && t.node_id == "manager"));
    assert_eq!(tasks[0].title, "Approve purchase");
}

#[tokio::test]
async fn first_submission_of_a_draft_fills_the_first_form() {
    let engine = engine().await;
    let request = engine
        .start_flow("purchase", "New laptop", REQUESTER)
        .await
        .unwrap();

    let request = engine
        .execute_flow_step(
            &request.id,
            "form_submitted",
            &json!({
                "headerData": {"vendor": "Acme"},
                "detailData": [{"item": "pen", "qty": 2}, {"item": "ink", "qty": 1}]
            }),
            REQUESTER,
        )
        .await
        .unwrap();
    assert_eq!(request.current_step, "manager");

    let data = engine.form_data(&request.id).await.unwrap();
    assert_eq!(
        data,
        json!({"vendor": "Acme", "item_0": "pen", "qty_0": 2, "item_1": "ink", "qty_1": 1})
    );
    // One audit entry per step, not per processor.
    assert_eq!(engine.history(&request.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn bad_form_payload_leaves_no_state() {
    let engine = engine().await;
    let request = engine
        .start_flow("purchase", "New laptop", REQUESTER)
        .await
        .unwrap();
    let err = engine
        .execute_flow_step(
            &request.id,
            "form_submitted",
            &json!({"detailData": {"item": "pen"}}),
            REQUESTER,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayload { .. }));
    assert_eq!(err.http_status(), 400);

    let unchanged = engine.get_request(&request.id).await.unwrap();
    assert_eq!(unchanged.current_step, "start");
    assert!(engine
        .store()
        .list_request_data(&request.id)
        .await
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// execute_flow_step: approvals
// ---------------------------------------------------------------------------

#[tokio::test]
async fn approvals_advance_once_threshold_is_met() {
    let engine = engine().await;
    let request = at_manager(&engine).await;

    let after_ann = approve(&engine, &request.id, ANN).await;
    assert_eq!(after_ann.current_step, "manager");
    assert_eq!(after_ann.status, RequestStatus::InProgress);

    let after_bob = approve(&engine, &request.id, BOB).await;
    assert_eq!(after_bob.current_step, "done");
    assert_eq!(after_bob.status, RequestStatus::Approved);

    // A late approval settles cat's task and leaves the request alone.
    let after_cat = approve(&engine, &request.id, CAT).await;
    assert_eq!(after_cat.current_step, "done");
    assert_eq!(after_cat.status, RequestStatus::Approved);

    let tasks = engine.tasks_for_request(&request.id).await.unwrap();
    assert_eq!(count(&tasks, TaskStatus::Approved), 3);
    assert_eq!(count(&tasks, TaskStatus::Pending), 0);
    assert!(tasks
        .iter()
        .filter(|t| !t.is_pending())
        .all(|t| t.completed_at.is_some()));
}

#[tokio::test]
async fn late_approval_does_not_run_the_next_form() {
    let engine = engine().await;
    let request = engine
        .start_flow("fulfilment", "Desk chair", REQUESTER)
        .await
        .unwrap();
    let request = engine
        .execute_flow_step(&request.id, "submitted", &Value::Null, REQUESTER)
        .await
        .unwrap();
    assert_eq!(request.current_step, "manager");

    approve(&engine, &request.id, ANN).await;
    let after_bob = approve(&engine, &request.id, BOB).await;
    assert_eq!(after_bob.current_step, "fulfil");
    assert_eq!(after_bob.status, RequestStatus::InProgress);

    let after_cat = approve(&engine, &request.id, CAT).await;
    assert_eq!(after_cat.current_step, "fulfil");
    assert_eq!(after_cat.status, RequestStatus::InProgress);
    assert_eq!(engine.get_request(&request.id).await.unwrap(), after_bob);

    let cat_tasks = engine.tasks_for_user(CAT, None).await.unwrap();
    assert_eq!(cat_tasks.len(), 1);
    assert_eq!(cat_tasks[0].status, TaskStatus::Approved);
    assert!(cat_tasks[0].completed_at.is_some());
    assert_eq!(engine.history(&request.id).await.unwrap()[0].user_id, CAT);
    assert!(engine
        .form_data(&request.id)
        .await
        .unwrap()
        .as_object()
        .is_some_and(|fields| fields.is_empty()));
}

#[tokio::test]
async fn any_rejection_short_circuits() {
    let engine = engine().await;
    let request = at_manager(&engine).await;

    let request = engine
        .execute_flow_step(&request.id, "rejected", &json!({"action": "reject"}), BOB)
        .await
        .unwrap();
    assert_eq!(request.current_step, "done");
    assert_eq!(request.status, RequestStatus::Rejected);

    let tasks = engine.tasks_for_request(&request.id).await.unwrap();
    assert_eq!(count(&tasks, TaskStatus::Rejected), 1);
    assert_eq!(count(&tasks, TaskStatus::Pending), 2);
}

#[tokio::test]
async fn approval_without_pending_task_mutates_nothing() {
    let engine = engine().await;
    let request = at_manager(&engine).await;
    let tasks_before = engine.tasks_for_request(&request.id).await.unwrap();

    let err = engine
        .execute_flow_step(&request.id, "approved", &json!({}), REQUESTER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPendingTask { .. }));
    assert_eq!(err.http_status(), 409);

    assert_eq!(engine.get_request(&request.id).await.unwrap(), request);
    assert_eq!(
        engine.tasks_for_request(&request.id).await.unwrap(),
        tasks_before
    );
}

#[tokio::test]
async fn unknown_approval_action_is_rejected() {
    let engine = engine().await;
    let request = at_manager(&engine).await;
    let err = engine
        .execute_flow_step(&request.id, "approved", &json!({"action": "maybe"}), ANN)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidPayload { .. }));
    let tasks = engine.tasks_for_request(&request.id).await.unwrap();
    assert_eq!(count(&tasks, TaskStatus::Pending), 3);
}

#[tokio::test]
async fn each_approval_node_counts_its_own_tasks() {
    let engine = engine().await;
    let request = engine
        .start_flow("two-stage", "Access", REQUESTER)
        .await
        .unwrap();

    let request = engine
        .execute_flow_step(&request.id, "submitted", &Value::Null, REQUESTER)
        .await
        .unwrap();
    assert_eq!(request.current_step, "first");

    let request = approve(&engine, &request.id, REQUESTER).await;
    assert_eq!(request.current_step, "second");
    assert_eq!(request.status, RequestStatus::InProgress);

    let request = approve(&engine, &request.id, REQUESTER).await;
    assert_eq!(request.current_step, "done");
    assert_eq!(request.status, RequestStatus::Approved);
}

#[tokio::test]
async fn concurrent_approvals_advance_exactly_once() {
    let engine = Arc::new(engine().await);
    let request = at_manager(&engine).await;

    let handles: Vec<_> = [ANN, BOB, CAT]
        .into_iter()
        .map(|user| {
            let engine = Arc::clone(&engine);
            let request_id = request.id.clone();
            tokio::spawn(async move {
                engine
                    .execute_flow_step(&request_id, "approved", &json!({"action": "approve"}), user)
                    .await
            })
        })
        .collect();
    for result in futures::future::join_all(handles).await {
        result.unwrap().unwrap();
    }

    let request = engine.get_request(&request.id).await.unwrap();
    assert_eq!(request.current_step, "done");
    assert_eq!(request.status, RequestStatus::Approved);
    let tasks = engine.tasks_for_request(&request.id).await.unwrap();
    assert_eq!(count(&tasks, TaskStatus::Approved), 3);
    assert_eq!(count(&tasks, TaskStatus::Pending), 0);
    assert!(engine.locks.is_empty());
}

// ---------------------------------------------------------------------------
// execute_flow_step: decisions and end
// ---------------------------------------------------------------------------

async fn at_route(engine: &WorkflowEngine, amount: u32) -> Request {
    let request = engine
        .start_flow("routing", "Purchase", REQUESTER)
        .await
        .unwrap();
    let request = engine
        .execute_flow_step(
            &request.id,
            "form_submitted",
            &json!({"headerData": {"amount": amount}}),
            REQUESTER,
        )
        .await
        .unwrap();
    assert_eq!(request.current_step, "route");
    request
}

#[tokio::test]
async fn default_decision_takes_first_condition() {
    let engine = engine().await;
    let request = at_route(&engine, 5).await;

    let request = engine
        .execute_flow_step(&request.id, "evaluate", &Value::Null, REQUESTER)
        .await
        .unwrap();
    assert_eq!(request.current_step, "director");
    assert_eq!(request.status, RequestStatus::InProgress);

    // Director has no assignees: the requester approves.
    let tasks = engine.tasks_for_request(&request.id).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].assigned_to, REQUESTER);
    assert_eq!(tasks[0].title, "Approval Required");
}

#[tokio::test]
async fn expression_decision_routes_on_form_data() {
    let engine = WorkflowEngine::builder()
        .store(seeded_store().await)
        .evaluator(ExpressionConditionEvaluator)
        .build();

    let big = at_route(&engine, 5000).await;
    let big = engine
        .execute_flow_step(&big.id, "evaluate", &Value::Null, REQUESTER)
        .await
        .unwrap();
    assert_eq!(big.current_step, "director");

    let small = at_route(&engine, 5).await;
    let small = engine
        .execute_flow_step(&small.id, "evaluate", &Value::Null, REQUESTER)
        .await
        .unwrap();
    assert_eq!(small.current_step, "done");
    assert_eq!(small.status, RequestStatus::InProgress);

    // The payload overlays form data.
    let overridden = at_route(&engine, 5).await;
    let overridden = engine
        .execute_flow_step(&overridden.id, "evaluate", &json!({"amount": 2000}), REQUESTER)
        .await
        .unwrap();
    assert_eq!(overridden.current_step, "director");
}

#[tokio::test]
async fn every_path_reaches_a_terminal_status() {
    let engine = WorkflowEngine::builder()
        .store(seeded_store().await)
        .evaluator(ExpressionConditionEvaluator)
        .build();

    // Small purchase: decision straight to the end node, then complete.
    let request = at_route(&engine, 5).await;
    let mut request = request;
    for _ in 0..4 {
        if request.status.is_terminal() {
            break;
        }
        request = engine
            .execute_flow_step(&request.id, "next", &Value::Null, REQUESTER)
            .await
            .unwrap();
    }
    assert_eq!(request.status, RequestStatus::Completed);

    // Large purchase: director approval, then approved at the end node.
    let request = at_route(&engine, 5000).await;
    engine
        .execute_flow_step(&request.id, "evaluate", &Value::Null, REQUESTER)
        .await
        .unwrap();
    let request = approve(&engine, &request.id, REQUESTER).await;
    assert_eq!(request.status, RequestStatus::Approved);

    // Executing on an ended request keeps its outcome.
    let request = engine
        .execute_flow_step(&request.id, "next", &Value::Null, REQUESTER)
        .await
        .unwrap();
    assert_eq!(request.status, RequestStatus::Approved);
}

#[tokio::test]
async fn dead_end_is_a_no_op() {
    let flow = json!({
        "nodes": [
            {"id": "start", "type": "start", "data": {}},
            {"id": "details", "type": "form", "data": {}},
            {"id": "done", "type": "end", "data": {}}
        ],
        "edges": [{"id": "e1", "source": "start", "target": "details"}]
    });
    let store = seeded_store().await;
    store.insert_request_type(request_type("stuck", &flow)).await;
    let engine = WorkflowEngine::builder().store(store).build();

    let request = engine.start_flow("stuck", "x", REQUESTER).await.unwrap();
    let request = engine
        .execute_flow_step(
            &request.id,
            "form_submitted",
            &json!({"headerData": {"a": "b"}}),
            REQUESTER,
        )
        .await
        .unwrap();
    // Rows are stored, the request stays on the form.
    assert_eq!(request.current_step, "details");
    assert_eq!(engine.form_data(&request.id).await.unwrap(), json!({"a": "b"}));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_request_and_stale_step() {
    let engine = engine().await;
    let err = engine
        .execute_flow_step("nope", "x", &Value::Null, REQUESTER)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RequestNotFound { .. }));

    let stale = engine
        .store()
        .create_request(NewRequest {
            request_type_id: "purchase".into(),
            title: "Stale".into(),
            current_step: "removed-node".into(),
            status: RequestStatus::InProgress,
            created_by: REQUESTER.into(),
        })
        .await
        .unwrap();
    let err = engine
        .execute_flow_step(&stale.id, "x", &Value::Null, REQUESTER)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, EngineError::InvalidState { current_step, .. } if current_step == "removed-node")
    );
    // Nothing was audited for a step that never resolved.
    assert!(engine.history(&stale.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_failures_do_not_block_transitions() {
    let engine = WorkflowEngine::builder()
        .store(FailingAuditStore {
            inner: seeded_store().await,
        })
        .build();
    let request = at_manager(&engine).await;
    assert_eq!(request.current_step, "manager");
    assert!(engine.history(&request.id).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// complete_task
// ---------------------------------------------------------------------------

#[tokio::test]
async fn complete_task_runs_the_approval_step() {
    let engine = engine().await;
    let request = at_manager(&engine).await;
    let tasks = engine.tasks_for_user(ANN, Some(TaskStatus::Pending)).await.unwrap();
    assert_eq!(tasks.len(), 1);

    let task = engine
        .complete_task(&tasks[0].id, &json!({"comment": "fine"}), ANN)
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Approved);

    let history = engine.history(&request.id).await.unwrap();
    assert_eq!(history[0].action, "approved");
    assert_eq!(
        history[0].metadata.as_deref(),
        Some(r#"{"action":"approve","comment":"fine"}"#)
    );

    let bob_task = &engine.tasks_for_user(BOB, None).await.unwrap()[0];
    engine
        .complete_task(&bob_task.id, &json!({"action": "reject"}), BOB)
        .await
        .unwrap();
    let request = engine.get_request(&request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Rejected);
}

#[tokio::test]
async fn complete_task_guards() {
    let engine = engine().await;
    let request = at_manager(&engine).await;
    let ann_task = engine.tasks_for_user(ANN, None).await.unwrap().remove(0);

    let err = engine
        .complete_task("nope", &Value::Null, ANN)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TaskNotFound { .. }));

    let err = engine
        .complete_task(&ann_task.id, &Value::Null, BOB)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotAssignee { .. }));
    assert_eq!(err.http_status(), 403);

    engine
        .complete_task(&ann_task.id, &Value::Null, ANN)
        .await
        .unwrap();
    let err = engine
        .complete_task(&ann_task.id, &Value::Null, ANN)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoPendingTask { .. }));

    assert_eq!(
        engine.get_request(&request.id).await.unwrap().current_step,
        "manager"
    );
}

#[tokio::test]
async fn late_task_is_recorded_without_engine_effect() {
    let engine = engine().await;
    let request = at_manager(&engine).await;
    approve(&engine, &request.id, ANN).await;
    approve(&engine, &request.id, BOB).await;

    let cat_task = engine.tasks_for_user(CAT, None).await.unwrap().remove(0);
    let task = engine
        .complete_task(&cat_task.id, &json!({"action": "reject"}), CAT)
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Rejected);

    let request = engine.get_request(&request.id).await.unwrap();
    assert_eq!(request.current_step, "done");
    assert_eq!(request.status, RequestStatus::Approved);
    assert_eq!(engine.history(&request.id).await.unwrap()[0].action, "rejected");
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_requests_filters_and_pages() {
    let engine = engine().await;
    for i in 0..3 {
        engine
            .start_flow("purchase", &format!("draft {i}"), REQUESTER)
            .await
            .unwrap();
    }
    at_manager(&engine).await;

    let all = engine
        .list_requests(&RequestFilter {
            limit: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.total, 4);
    assert_eq!(all.requests.len(), 2);
    assert_eq!(all.requests[0].title, "New laptop");

    let drafts = engine
        .list_requests(&RequestFilter {
            status: Some(RequestStatus::Draft),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(drafts.total, 3);
}
