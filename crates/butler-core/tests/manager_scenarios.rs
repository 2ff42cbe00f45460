//! Registry, routing and discovery scenarios against fake providers

mod common;

use std::sync::Arc;

use butler_core::config::ServerConfig;
use butler_core::supervisor::{Endpoint, ProviderSession};
use butler_core::tools::{ToolError, ToolRoute};
use butler_core::transport::{HttpChannel, TransportError};
use butler_core::{DiscoverySource, StdioProbe, ToolManager};
use common::{fake_stdio_session, fast_config, fast_settings, logger, memory_provider, Reply};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_session(name: &str, base_url: String) -> Arc<ProviderSession> {
    let channel = HttpChannel::new(name, base_url, reqwest::Client::new(), &fast_settings(), logger());
    Arc::new(ProviderSession::new(
        name,
        ServerConfig::command("provider"),
        Endpoint::Http { port: 0, channel },
        None,
    ))
}

#[tokio::test]
async fn mem_read_graph_resolves_and_unknown_lists_known() {
    let manager = ToolManager::new(&fast_config(), logger());
    manager.attach_session(fake_stdio_session("mem", memory_provider)).unwrap();
    manager.discover_all().await;

    let route = manager.resolve("mem_read_graph").await.unwrap();
    assert!(matches!(route, ToolRoute::Stdio(ref r) if r.server == "mem" && r.local == "read_graph"));

    let err = manager.resolve("mem_unknown").await.unwrap_err();
    assert!(matches!(err, ToolError::NotFound { .. }));
    assert!(err.to_string().contains("mem_read_graph"));
}

#[tokio::test]
async fn every_session_tool_is_registered() {
    let manager = ToolManager::new(&fast_config(), logger());
    manager.attach_session(fake_stdio_session("mem", memory_provider)).unwrap();
    manager
        .attach_session(fake_stdio_session("notes", |method, _| match method {
            "list_tools" => Reply::Result(json!([{"name": "append", "description": "Append a note"}])),
            _ => Reply::Error("nope".to_string()),
        }))
        .unwrap();
    manager.attach_session(Arc::new(ProviderSession::builtin("builtin", 3001))).unwrap();

    let report = manager.discover_all().await;
    assert_eq!(report.total(), 3);
    assert_eq!(report.per_server["builtin"], 0);

    for name in ["mem", "notes"] {
        let session = manager.session(name).unwrap();
        for tool in session.tools() {
            let key = format!("{}_{}", name, tool.name);
            assert!(manager.registry().contains(&key), "missing {}", key);
        }
    }
    assert_eq!(
        manager.registry().keys(),
        vec!["mem_read_graph", "mem_search_nodes", "notes_append"]
    );
}

#[tokio::test]
async fn stdio_execute_wraps_result_as_content() {
    let manager = ToolManager::new(&fast_config(), logger());
    manager.attach_session(fake_stdio_session("mem", memory_provider)).unwrap();
    manager.discover_all().await;

    let output = manager.execute("mem_read_graph", json!({})).await.unwrap();
    assert_eq!(output.content, r#"{"entities":[{"name":"Alice"}]}"#);

    let output = manager
        .execute("mem_search_nodes", json!({"query": "Alice"}))
        .await
        .unwrap();
    assert_eq!(output.content, "found Alice");
}

#[tokio::test]
async fn doubled_and_missing_prefixes_are_normalized() {
    let manager = ToolManager::new(&fast_config(), logger());
    manager.attach_session(fake_stdio_session("mem", memory_provider)).unwrap();
    manager.discover_all().await;

    let doubled = manager.execute("mem_mem_read_graph", json!({})).await.unwrap();
    let bare = manager.execute("read_graph", json!({})).await.unwrap();
    assert_eq!(doubled, bare);
}

#[tokio::test]
async fn stdio_provider_without_call_envelope_is_called_directly() {
    let manager = ToolManager::new(&fast_config(), logger());
    manager
        .attach_session(fake_stdio_session("legacy", |method, params| match method {
            "tools/list" => Reply::Result(json!({"tools": [{"name": "ping", "description": "Ping"}]})),
            "ping" => Reply::Result(json!(format!("pong {}", params["n"]))),
            _ => Reply::Error(format!("Method not found: {}", method)),
        }))
        .unwrap();
    manager.discover_all().await;

    let output = manager.execute("legacy_ping", json!({"n": 3})).await.unwrap();
    assert_eq!(output.content, "pong 3");
}

#[tokio::test]
async fn stdio_fallback_tools_when_probes_fail() {
    let manager = ToolManager::new(&fast_config(), logger());

    let channel = common::fake_stdio_channel("quiet", |_, _| Reply::Error("no".to_string()));
    let session = Arc::new(ProviderSession::stdio(
        "quiet",
        ServerConfig::stdio("quiet-server")
            .with_fallback_tools(vec![butler_core::ToolDescriptor::new("read_graph", "Read")]),
        channel,
    ));
    manager.attach_session(session).unwrap();

    let discovery = manager.discover_tools("quiet").await.unwrap();
    assert_eq!(discovery.source, DiscoverySource::Fallback);
    assert!(manager.registry().contains("quiet_read_graph"));
}

#[tokio::test]
async fn silent_stdio_request_times_out_and_cleans_up() {
    let manager = ToolManager::new(&fast_config(), logger());
    manager
        .attach_session(fake_stdio_session("slow", |method, _| match method {
            "tools/list" => Reply::Result(json!({"tools": [{"name": "wait"}]})),
            _ => Reply::Silence,
        }))
        .unwrap();
    let discovery = manager.discover_tools("slow").await.unwrap();
    assert_eq!(discovery.source, DiscoverySource::Probe(StdioProbe::EmptyMethod));

    let err = manager.execute("slow_wait", json!({})).await.unwrap_err();
    assert!(matches!(err, ToolError::Transport(TransportError::Timeout { .. })));
    assert_eq!(manager.session("slow").unwrap().pending_count(), 0);
}

#[tokio::test]
async fn http_discovery_survives_three_503s() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tools"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tools": [{"name": "ping", "description": "d", "inputSchema": {}}]
        })))
        .mount(&server)
        .await;

    let manager = ToolManager::new(&fast_config(), logger());
    manager.attach_session(http_session("providerName", server.uri())).unwrap();

    let discovery = manager.discover_tools("providerName").await.unwrap();
    assert_eq!(discovery.source, DiscoverySource::Http);
    assert!(manager.registry().contains("providerName_ping"));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn http_execute_posts_local_name_and_surfaces_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tools"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tools": [
                {"name": "ping", "description": "Ping", "inputSchema": {}},
                {"name": "explode", "description": "Fails", "inputSchema": {}}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .and(body_json(json!({"tool_name": "ping", "arguments": {"host": "a"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("pong")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/execute"))
        .and(body_json(json!({"tool_name": "explode", "arguments": {}})))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "kaboom"})))
        .mount(&server)
        .await;

    let manager = ToolManager::new(&fast_config(), logger());
    manager.attach_session(http_session("local", server.uri())).unwrap();
    manager.discover_all().await;

    let output = manager.execute("local_ping", json!({"host": "a"})).await.unwrap();
    assert_eq!(output.content, "pong");

    let err = manager.execute("local_explode", json!({})).await.unwrap_err();
    assert!(err.to_string().contains("kaboom"));
}

#[tokio::test]
async fn catalog_prefixes_names_and_descriptions() {
    let manager = ToolManager::new(&fast_config(), logger());
    manager.attach_session(fake_stdio_session("mem", memory_provider)).unwrap();
    manager.discover_all().await;

    let catalog = manager.catalog();
    let read_graph = catalog.iter().find(|t| t.name == "mem_read_graph").unwrap();
    assert_eq!(read_graph.description, "[mem] Read the entire knowledge graph");
    assert_eq!(read_graph.input_schema, json!({"type": "object", "properties": {}}));

    let search = catalog.iter().find(|t| t.name == "mem_search_nodes").unwrap();
    assert_eq!(search.input_schema["required"], json!(["query"]));
}

#[tokio::test]
async fn stop_all_fails_pending_requests() {
    let manager = ToolManager::new(&fast_config(), logger());
    let session = fake_stdio_session("slow", |_, _| Reply::Silence);
    manager.attach_session(Arc::clone(&session)).unwrap();
    let channel = Arc::clone(session.stdio_channel().unwrap());

    let calls: Vec<_> = (0..3)
        .map(|_| {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move { channel.call("tools/call", json!({})).await })
        })
        .collect();
    while channel.pending_count() < 3 {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    assert_eq!(manager.stop_all(), 1);
    for call in calls {
        let result = call.await.unwrap();
        assert!(matches!(result, Err(TransportError::Shutdown { .. })));
    }
    assert!(manager.registry().is_empty());
}
