//! Full conversation turns over the real manager

mod common;

use std::sync::Arc;

use butler_core::config::ChatSettings;
use butler_core::providers::{AnthropicModel, ChatResponse, MockModel};
use butler_core::{ChatMessage, ContentPart, StopReason, ToolLoop, ToolManager};
use common::{fake_stdio_session, fast_config, logger, memory_provider};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn memory_manager() -> Arc<ToolManager> {
    let manager = Arc::new(ToolManager::new(&fast_config(), logger()));
    manager.attach_session(fake_stdio_session("mem", memory_provider)).unwrap();
    manager.discover_all().await;
    manager
}

#[tokio::test]
async fn model_reads_the_graph_then_answers() {
    let manager = memory_manager().await;
    let model = Arc::new(MockModel::script(
        vec![
            ChatResponse::with_parts(vec![ContentPart::tool_use("tu_1", "mem_read_graph", json!({}))]),
            ChatResponse::text("Alice is in the graph."),
        ],
        logger(),
    ));
    let tool_loop = ToolLoop::new(model.clone(), manager, ChatSettings::default(), logger());

    let outcome = tool_loop
        .run_turn(vec![ChatMessage::user("Who do you know?")])
        .await
        .unwrap();

    assert_eq!(outcome.final_text, "Alice is in the graph.");
    assert_eq!(outcome.stop, StopReason::Completed);
    assert_eq!(outcome.trace.len(), 1);
    assert!(outcome.trace[0].ok);
    assert_eq!(outcome.trace[0].output, r#"{"entities":[{"name":"Alice"}]}"#);

    let first = &model.requests()[0];
    let names: Vec<_> = first.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["mem_read_graph", "mem_search_nodes"]);
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let manager = memory_manager().await;
    let model = Arc::new(MockModel::script(
        vec![
            ChatResponse::with_parts(vec![ContentPart::tool_use("tu_1", "mem_forget", json!({}))]),
            ChatResponse::text("Sorry."),
        ],
        logger(),
    ));
    let tool_loop = ToolLoop::new(model.clone(), manager, ChatSettings::default(), logger());

    let outcome = tool_loop.run_turn(vec![ChatMessage::user("Forget")]).await.unwrap();
    assert_eq!(outcome.stop, StopReason::Completed);
    assert!(!outcome.trace[0].ok);
    assert!(outcome.trace[0].output.contains("mem_read_graph"));
}

#[tokio::test]
async fn runaway_model_is_capped_at_ten_rounds() {
    let manager = memory_manager().await;
    let model = Arc::new(MockModel::always_tool_use("mem_read_graph", json!({}), logger()));
    let tool_loop = ToolLoop::new(model.clone(), manager, ChatSettings::default(), logger());

    let outcome = tool_loop.run_turn(vec![ChatMessage::user("Again")]).await.unwrap();
    assert_eq!(outcome.stop, StopReason::RoundLimit);
    assert_eq!(model.call_count(), 10);
    assert_eq!(outcome.trace.len(), 10);
    assert!(outcome.trace[..9].iter().all(|call| call.ok));
    assert!(!outcome.trace[9].ok);
}

#[tokio::test]
async fn anthropic_round_trip_with_tool_use() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "tool_use", "id": "tu_1", "tool_name": "mem_search_nodes", "tool_input": {"query": "Alice"}}
            ],
            "stop_reason": "tool_use"
        })))
        .up_to_n_times(1)
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Found her."}],
            "stop_reason": "end_turn"
        })))
        .mount(&api)
        .await;

    let manager = memory_manager().await;
    let model = Arc::new(AnthropicModel::new("key", Some(api.uri()), "2023-06-01", logger()));
    let tool_loop = ToolLoop::new(model, manager, ChatSettings::default(), logger());

    let outcome = tool_loop.run_turn(vec![ChatMessage::user("Find Alice")]).await.unwrap();
    assert_eq!(outcome.final_text, "Found her.");
    assert_eq!(outcome.trace[0].output, "found Alice");

    // The second call echoes the tool result without the unknown item
    let requests = api.received_requests().await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(second["messages"][1]["content"].as_array().unwrap().len(), 1);
    assert_eq!(second["messages"][2]["content"][0]["type"], "tool_result");
    assert_eq!(second["messages"][2]["content"][0]["content"], "found Alice");
}

#[tokio::test]
async fn mistyped_tool_use_from_the_api_does_not_abort_the_turn() {
    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "tool_use", "id": null, "name": 42, "input": {}},
                {"type": "tool_use", "id": "tu_2", "name": "read_graph", "tool_name": "mem_read_graph"}
            ],
            "stop_reason": "tool_use"
        })))
        .up_to_n_times(1)
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Done."}],
            "stop_reason": "end_turn"
        })))
        .mount(&api)
        .await;

    let manager = memory_manager().await;
    let model = Arc::new(AnthropicModel::new("key", Some(api.uri()), "2023-06-01", logger()));
    let tool_loop = ToolLoop::new(model, manager, ChatSettings::default(), logger());

    let outcome = tool_loop.run_turn(vec![ChatMessage::user("Read it")]).await.unwrap();
    assert_eq!(outcome.final_text, "Done.");
    assert_eq!(outcome.trace.len(), 1);
    assert_eq!(outcome.trace[0].name, "mem_read_graph");
    assert!(outcome.trace[0].ok);

    // The nameless item is echoed back as text, never dispatched
    let requests = api.received_requests().await.unwrap();
    let second: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(second["messages"][1]["content"][0]["type"], "text");
    assert_eq!(second["messages"][2]["content"].as_array().unwrap().len(), 1);
}
