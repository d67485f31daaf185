use std::sync::Arc;
use std::time::Duration;

use actix_web::{http::StatusCode, test, web, App};
use agent_core::tools::{ToolCall, ToolExecutor};
use agent_core::{InMemoryTodoStore, MemoryStorage, Role, Storage};
use agent_llm::{LLMChunk, MockLLMProvider, MockTurn};
use agent_loop::AgentLoopConfig;
use agent_mcp::McpServerManager;
use agent_server::middleware::{ApiKeyAuth, RateLimit};
use agent_server::{configure, AppState};
use agent_tools::{BuiltinToolExecutor, WeatherTool};
use serde_json::{json, Value};

fn app_state(llm: MockLLMProvider) -> web::Data<AppState> {
    let tools: Arc<dyn ToolExecutor> = Arc::new(BuiltinToolExecutor::new(
        Arc::new(InMemoryTodoStore::new()),
        WeatherTool::new(None),
    ));
    web::Data::new(AppState::new(
        Arc::new(MemoryStorage::new()),
        Arc::new(llm),
        tools,
        Arc::new(McpServerManager::new()),
        AgentLoopConfig::default(),
    ))
}

fn calc(id: &str, expression: &str) -> ToolCall {
    ToolCall::new(id, "calculate", json!({ "expression": expression }).to_string())
}

/// Event names of an SSE body, in order.
fn event_types(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("event: "))
        .map(str::to_string)
        .collect()
}

fn event_data(body: &str, event: &str) -> Vec<Value> {
    let mut data = Vec::new();
    let mut lines = body.lines();
    while let Some(line) = lines.next() {
        if line == format!("event: {}", event) {
            if let Some(payload) = lines.next().and_then(|l| l.strip_prefix("data: ")) {
                data.push(serde_json::from_str(payload).unwrap());
            }
        }
    }
    data
}

#[actix_web::test]
async fn health_reports_status_and_version() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(MockLLMProvider::new(Vec::new())))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[actix_web::test]
async fn chat_returns_answer_and_tool_calls() {
    let llm = MockLLMProvider::with_tool_then_answer(calc("call_1", "2 + 2"), "2 + 2 = 4");
    let state = app_state(llm);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "What is 2 + 2?", "session_id": "s1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["response"], "2 + 2 = 4");
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["tool_calls"][0]["name"], "calculate");
    assert_eq!(body["tool_calls"][0]["result"]["result"], 4.0);
    assert_eq!(body["tool_calls"][0]["success"], true);

    let session = state.storage.load_session("s1").await.unwrap().unwrap();
    let roles: Vec<Role> = session.messages.iter().map(|m| m.role.clone()).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
}

#[actix_web::test]
async fn chat_without_tools_omits_tool_calls_and_generates_session() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(MockLLMProvider::with_text_response("Hello!")))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "hi"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["response"], "Hello!");
    assert!(!body["session_id"].as_str().unwrap().is_empty());
    assert!(body.get("tool_calls").is_none());
}

#[actix_web::test]
async fn chat_rejects_missing_or_blank_message() {
    let llm = MockLLMProvider::new(Vec::new());
    let app = test::init_service(App::new().app_data(app_state(llm)).configure(configure)).await;

    for body in [json!({}), json!({"message": ""}), json!({"message": "   "})] {
        let req = test::TestRequest::post()
            .uri("/chat")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    let req = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "validation_error");
}

#[actix_web::test]
async fn chat_maps_model_failure_to_bad_gateway() {
    let llm = MockLLMProvider::new(vec![MockTurn::Fail("upstream down".to_string())]);
    let app = test::init_service(App::new().app_data(app_state(llm)).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "hi"}))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "model_backend_error");
}

#[actix_web::test]
async fn stream_emits_tool_events_then_answer_and_done() {
    let llm = MockLLMProvider::with_tool_then_answer(calc("call_1", "6 * 7"), "42");
    let app = test::init_service(App::new().app_data(app_state(llm)).configure(configure)).await;

    let req = test::TestRequest::get()
        .uri("/chat/stream?message=what%20is%206%20*%207&session_id=s1")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(resp.headers().get("x-accel-buffering").unwrap(), "no");

    let body = test::read_body(resp).await;
    let body = String::from_utf8(body.to_vec()).unwrap();

    assert_eq!(
        event_types(&body),
        vec!["tool_call", "tool_result", "answer", "done"]
    );
    assert_eq!(
        event_data(&body, "tool_call")[0],
        json!({"id": "call_1", "name": "calculate", "arguments": {"expression": "6 * 7"}})
    );
    assert_eq!(event_data(&body, "tool_result")[0]["success"], true);
    assert_eq!(event_data(&body, "answer")[0], json!({"content": "42"}));
    assert_eq!(event_data(&body, "done")[0], json!({}));
}

#[actix_web::test]
async fn stream_ends_with_single_error_on_model_failure() {
    let llm = MockLLMProvider::new(vec![MockTurn::Fail("boom".to_string())]);
    let app = test::init_service(App::new().app_data(app_state(llm)).configure(configure)).await;

    let req = test::TestRequest::get()
        .uri("/chat/stream?message=hi")
        .to_request();
    let body = test::call_and_read_body(&app, req).await;
    let body = String::from_utf8(body.to_vec()).unwrap();

    assert_eq!(event_types(&body), vec!["error"]);
}

#[actix_web::test]
async fn stream_requires_message() {
    let llm = MockLLMProvider::new(Vec::new());
    let app = test::init_service(App::new().app_data(app_state(llm)).configure(configure)).await;

    for uri in ["/chat/stream", "/chat/stream?message=", "/chat/stream?message=%20%20"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
    }
}

#[actix_web::test]
async fn history_and_session_reset() {
    let state = app_state(MockLLMProvider::with_text_response("Hello!"));
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let req = test::TestRequest::get().uri("/history/s1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "hi", "session_id": "s1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/history/s1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["messages"].as_array().unwrap().len(), 3);
    assert_eq!(body["messages"][1]["content"], "hi");

    let req = test::TestRequest::delete().uri("/sessions/s1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"session_id": "s1", "deleted": true}));

    let req = test::TestRequest::delete().uri("/sessions/s1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["deleted"], false);

    let req = test::TestRequest::get().uri("/history/s1").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn follow_up_turn_sees_prior_history() {
    let llm = Arc::new(MockLLMProvider::new(vec![
        MockTurn::text("first"),
        MockTurn::text("second"),
    ]));
    let tools: Arc<dyn ToolExecutor> = Arc::new(BuiltinToolExecutor::new(
        Arc::new(InMemoryTodoStore::new()),
        WeatherTool::new(None),
    ));
    let state = web::Data::new(AppState::new(
        Arc::new(MemoryStorage::new()),
        llm.clone(),
        tools,
        Arc::new(McpServerManager::new()),
        AgentLoopConfig::default(),
    ));
    let app = test::init_service(App::new().app_data(state).configure(configure)).await;

    for message in ["one", "two"] {
        let req = test::TestRequest::post()
            .uri("/chat")
            .set_json(json!({"message": message, "session_id": "s1"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let histories = llm.seen_histories().await;
    let second: Vec<&str> = histories[1].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(&second[1..], &["one", "first", "two"]);
    assert_eq!(
        histories[1]
            .iter()
            .filter(|m| m.role == Role::System)
            .count(),
        1
    );
}

#[actix_web::test]
async fn stop_cancels_running_stream() {
    let llm = MockLLMProvider::new(vec![MockTurn::Delayed(
        Duration::from_secs(5),
        vec![LLMChunk::Token("late".to_string()), LLMChunk::Done],
    )]);
    let state = app_state(llm);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let req = test::TestRequest::post().uri("/stop/s1").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"session_id": "s1", "cancelled": false}));

    let req = test::TestRequest::get()
        .uri("/chat/stream?message=hi&session_id=s1")
        .to_request();
    let resp = test::call_service(&app, req).await;

    let stopper = {
        let state = state.clone();
        async move {
            while !state.is_turn_active("s1") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            state.cancel_turn("s1")
        }
    };
    let (body, cancelled) = futures::join!(test::read_body(resp), stopper);
    assert!(cancelled);

    let body = String::from_utf8(body.to_vec()).unwrap();
    assert_eq!(event_types(&body), vec!["error"]);
    assert_eq!(event_data(&body, "error")[0], json!({"message": "cancelled"}));
    assert!(!state.is_turn_active("s1"));
}

#[actix_web::test]
async fn reset_during_turn_is_not_undone_by_final_checkpoint() {
    let llm = MockLLMProvider::new(vec![MockTurn::Delayed(
        Duration::from_secs(5),
        vec![LLMChunk::Token("late".to_string()), LLMChunk::Done],
    )]);
    let state = app_state(llm);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    let chat = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/chat")
            .set_json(json!({"message": "hi", "session_id": "s1"}))
            .to_request(),
    );
    let reset = async {
        while !state.is_turn_active("s1") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let req = test::TestRequest::delete().uri("/sessions/s1").to_request();
        test::call_service(&app, req).await
    };
    let (chat, reset) = futures::join!(chat, reset);

    assert_eq!(chat.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reset.status(), StatusCode::OK);
    let body: Value = test::read_body_json(reset).await;
    assert_eq!(body, json!({"session_id": "s1", "deleted": true}));

    assert!(state.storage.load_session("s1").await.unwrap().is_none());
    assert_eq!(state.locked_sessions(), 0);
}

#[actix_web::test]
async fn finished_turns_release_their_session_locks() {
    let llm = MockLLMProvider::always(MockTurn::text("ok"));
    let state = app_state(llm);
    let app =
        test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/chat")
            .set_json(json!({"message": "hi"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/chat/stream?message=hi")
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert_eq!(event_types(&body).last().map(String::as_str), Some("done"));

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "   "}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );

    assert_eq!(state.locked_sessions(), 0);
}

#[actix_web::test]
async fn tools_lists_builtin_catalog() {
    let llm = MockLLMProvider::new(Vec::new());
    let app = test::init_service(App::new().app_data(app_state(llm)).configure(configure)).await;

    let req = test::TestRequest::get().uri("/tools").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let mut names: Vec<&str> = body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|tool| tool["function"]["name"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "add_todo",
            "calculate",
            "complete_todo",
            "delete_todo",
            "get_weather",
            "list_todos"
        ]
    );
}

#[actix_web::test]
async fn auth_rejects_missing_or_unknown_key() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(MockLLMProvider::always(MockTurn::text("ok"))))
            .wrap(ApiKeyAuth::new(true, vec!["secret".to_string()]))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/tools").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({"error": {"message": "Invalid or missing API key", "type": "unauthorized"}})
    );

    let req = test::TestRequest::get()
        .uri("/tools")
        .insert_header(("X-API-Key", "wrong"))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let req = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("X-API-Key", "secret"))
        .set_json(json!({"message": "hi"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn rate_limit_returns_429_after_quota() {
    let app = test::init_service(
        App::new()
            .app_data(app_state(MockLLMProvider::new(Vec::new())))
            .wrap(RateLimit::new(2))
            .configure(configure),
    )
    .await;

    for _ in 0..2 {
        let req = test::TestRequest::get()
            .uri("/tools")
            .insert_header(("X-API-Key", "client-a"))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let req = test::TestRequest::get()
        .uri("/tools")
        .insert_header(("X-API-Key", "client-a"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["type"], "rate_limited");

    let req = test::TestRequest::get()
        .uri("/tools")
        .insert_header(("X-API-Key", "client-b"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/health")
        .insert_header(("X-API-Key", "client-a"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn durable_checkpoints_survive_new_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.db");

    let storage = Arc::new(agent_core::SqliteStorage::new(&path));
    storage.init().await.unwrap();
    let tools: Arc<dyn ToolExecutor> = Arc::new(BuiltinToolExecutor::new(
        storage.clone(),
        WeatherTool::new(None),
    ));
    let state = web::Data::new(AppState::new(
        storage,
        Arc::new(MockLLMProvider::with_text_response("noted")),
        tools,
        Arc::new(McpServerManager::new()),
        AgentLoopConfig::default(),
    ));
    let app = test::init_service(App::new().app_data(state).configure(configure)).await;

    let req = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"message": "remember me", "session_id": "s1"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let reopened = agent_core::SqliteStorage::new(&path);
    reopened.init().await.unwrap();
    let session = reopened.load_session("s1").await.unwrap().unwrap();
    assert_eq!(session.messages.len(), 3);
    assert_eq!(session.messages[1].content, "remember me");
}
