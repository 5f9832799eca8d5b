use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bongchun_llm::mock::MockProvider;
use bongchun_llm::{Candidate, GenerateResponse, Part};
use bongchun_mcp::{
    BoxFuture, Connector, JsonMap, McpError, ServerConfig, ServerEntry, ToolCallResult,
    ToolDescriptor, ToolSession,
};
use serde_json::json;

use super::*;
use crate::client::ClientSettings;

type CallLog = Arc<Mutex<Vec<(String, String, JsonMap)>>>;

struct StubSession {
    server: String,
    tools: Vec<ToolDescriptor>,
    log: CallLog,
}

impl ToolSession for StubSession {
    fn server_name(&self) -> &str {
        &self.server
    }

    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolDescriptor>, McpError>> {
        Box::pin(async move { Ok(self.tools.clone()) })
    }

    fn call_tool(&self, name: &str, args: JsonMap) -> BoxFuture<'_, Result<ToolCallResult, McpError>> {
        self.log
            .lock()
            .unwrap()
            .push((self.server.clone(), name.to_owned(), args));
        let name = name.to_owned();
        Box::pin(async move {
            match name.as_str() {
                "crash" => Err(McpError::ToolCall {
                    server: self.server.clone(),
                    tool: name,
                    message: "connection reset".into(),
                }),
                "deny" => Ok(ToolCallResult::error("permission denied")),
                "hang" => std::future::pending().await,
                _ => Ok(ToolCallResult::text(format!("{}:{name} ok", self.server))),
            }
        })
    }

    fn shutdown(self: Box<Self>) -> BoxFuture<'static, ()> {
        Box::pin(async {})
    }
}

#[derive(Default)]
struct StubConnector {
    tools: HashMap<String, Vec<&'static str>>,
    log: CallLog,
}

impl StubConnector {
    fn with(mut self, server: &str, tools: &[&'static str]) -> Self {
        self.tools.insert(server.to_owned(), tools.to_vec());
        self
    }
}

impl Connector for StubConnector {
    fn connect(
        &self,
        config: ServerConfig,
    ) -> BoxFuture<'static, Result<Box<dyn ToolSession>, McpError>> {
        let tools = self.tools.get(&config.name).cloned().unwrap_or_default();
        let log = Arc::clone(&self.log);
        Box::pin(async move {
            let tools = tools
                .into_iter()
                .map(|name| ToolDescriptor {
                    name: name.into(),
                    description: format!("{name} tool"),
                    input_schema: json!({"type": "object", "properties": {"path": {"type": "string"}}}),
                })
                .collect();
            Ok(Box::new(StubSession {
                server: config.name,
                tools,
                log,
            }) as Box<dyn ToolSession>)
        })
    }
}

struct Harness {
    client: Client<MockProvider>,
    mock: MockProvider,
    log: CallLog,
}

async fn harness(servers: Vec<(&str, Vec<&'static str>)>, settings: ClientSettings) -> Harness {
    let mut connector = StubConnector::default();
    let mut entries = Vec::new();
    for (name, tools) in servers {
        connector = connector.with(name, &tools);
        entries.push(ServerEntry::stdio(name, "stub", &[]));
    }
    let log = Arc::clone(&connector.log);
    let mock = MockProvider::default();
    let mut client = Client::new(mock.clone(), settings).with_connector(Arc::new(connector));
    let summary = client.connect_all(&entries).await;
    assert!(summary.failures.is_empty());
    Harness { client, mock, log }
}

fn last_function_responses(mock: &MockProvider, request: usize) -> Vec<(String, String)> {
    let req = &mock.requests()[request];
    req.contents
        .last()
        .unwrap()
        .parts
        .iter()
        .filter_map(|p| p.function_response.as_ref())
        .map(|r| {
            (
                r.name.clone(),
                r.response["content"].as_str().unwrap().to_owned(),
            )
        })
        .collect()
}

#[test]
fn compose_query_prefixes_additional_prompt() {
    assert_eq!(compose_query("hi", None), "hi");
    assert_eq!(compose_query("hi", Some("  ")), "hi");
    assert_eq!(
        compose_query("list files", Some("You are terse.")),
        "You are terse.\n\n---\n\nUser Request:\nlist files"
    );
}

#[tokio::test]
async fn plain_text_answer_ends_turn() {
    let mut h = harness(vec![("fs", vec!["list_directory"])], ClientSettings::default()).await;
    h.mock.push(GenerateResponse::text("Hello!"));

    let answer = h.client.process_query("hi", None, None).await.unwrap();

    assert_eq!(answer, "Hello!");
    let requests = h.mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tool_names, vec!["list_directory"]);
    assert_eq!(h.client.history().len(), 2);
}

#[tokio::test]
async fn list_directory_then_done() {
    let mut h = harness(vec![("fs", vec!["list_directory"])], ClientSettings::default()).await;
    h.mock
        .push(GenerateResponse::function_call("list_directory", json!({})));
    h.mock.push(GenerateResponse::text("Done."));

    let answer = h
        .client
        .process_query("list the current directory", None, None)
        .await
        .unwrap();

    assert_eq!(answer, "Done.");
    let log = h.log.lock().unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].0, "fs");
    assert_eq!(log[0].1, "list_directory");
    assert!(log[0].2.is_empty());
    assert_eq!(
        last_function_responses(&h.mock, 1),
        vec![("list_directory".to_owned(), "fs:list_directory ok".to_owned())]
    );
}

#[tokio::test]
async fn unknown_tool_is_reported_to_model() {
    let mut h = harness(vec![("fs", vec!["list_directory"])], ClientSettings::default()).await;
    h.mock
        .push(GenerateResponse::function_call("doesNotExist", json!({"x": 1})));
    h.mock.push(GenerateResponse::text("I could not find that tool."));

    let answer = h.client.process_query("do it", None, None).await.unwrap();

    assert_eq!(answer, "I could not find that tool.");
    assert!(h.log.lock().unwrap().is_empty());
    assert_eq!(
        last_function_responses(&h.mock, 1),
        vec![(
            "doesNotExist".to_owned(),
            "Error: Tool 'doesNotExist' not found or not configured correctly.".to_owned()
        )]
    );
}

#[tokio::test]
async fn failing_tool_is_reported_and_turn_completes() {
    let mut h = harness(vec![("fs", vec!["crash", "deny"])], ClientSettings::default()).await;
    h.mock.push(GenerateResponse::function_call("crash", json!({})));
    h.mock.push(GenerateResponse::function_call("deny", json!({})));
    h.mock.push(GenerateResponse::text("Both tools failed."));

    let answer = h.client.process_query("try", None, None).await.unwrap();

    assert_eq!(answer, "Both tools failed.");
    let crash = &last_function_responses(&h.mock, 1)[0].1;
    assert!(
        crash.starts_with("Error: Exception during tool execution: "),
        "{crash}"
    );
    assert_eq!(
        last_function_responses(&h.mock, 2)[0].1,
        "[Error executing tool 'deny': permission denied]"
    );
}

#[tokio::test]
async fn parallel_calls_are_answered_together() {
    let mut h = harness(
        vec![("fs", vec!["list_directory"]), ("git", vec!["git_log"])],
        ClientSettings::default(),
    )
    .await;
    h.mock.push(GenerateResponse::from_parts(vec![
        Part::function_call("list_directory", json!({"path": "."})),
        Part::function_call("git_log", json!({})),
    ]));
    h.mock.push(GenerateResponse::text("ok"));

    h.client.process_query("status", None, None).await.unwrap();

    let servers: Vec<String> = h.log.lock().unwrap().iter().map(|c| c.0.clone()).collect();
    assert_eq!(servers, vec!["fs", "git"]);
    let responses = last_function_responses(&h.mock, 1);
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1].0, "git_log");
}

#[tokio::test]
async fn non_object_args_become_empty_map() {
    let mut h = harness(vec![("fs", vec!["list_directory"])], ClientSettings::default()).await;
    h.mock
        .push(GenerateResponse::function_call("list_directory", json!("oops")));
    h.mock.push(GenerateResponse::text("ok"));

    h.client.process_query("go", None, None).await.unwrap();
    assert!(h.log.lock().unwrap()[0].2.is_empty());
}

#[tokio::test]
async fn tool_round_limit_fails_turn() {
    let settings = ClientSettings {
        max_tool_iterations: 2,
        ..ClientSettings::default()
    };
    let mut h = harness(vec![("fs", vec!["list_directory"])], settings).await;
    for _ in 0..3 {
        h.mock
            .push(GenerateResponse::function_call("list_directory", json!({})));
    }

    let err = h.client.process_query("loop", None, None).await.unwrap_err();

    assert!(matches!(err, TurnError::MaxToolCalls(2)), "{err:?}");
    assert_eq!(h.log.lock().unwrap().len(), 2);
    assert!(h.client.history().is_empty());
}

#[tokio::test]
async fn no_candidates_without_text_is_an_error() {
    let mut h = harness(Vec::new(), ClientSettings::default()).await;
    h.mock.push(GenerateResponse::default());

    let err = h.client.process_query("hi", None, None).await.unwrap_err();
    assert!(matches!(err, TurnError::NoValidResponse));
    assert!(h.client.history().is_empty());
}

#[tokio::test]
async fn empty_parts_without_text_is_an_error() {
    let mut h = harness(Vec::new(), ClientSettings::default()).await;
    h.mock.push(GenerateResponse {
        candidates: vec![Candidate {
            content: Some(Content::model(Vec::new())),
            finish_reason: Some("SAFETY".into()),
        }],
        prompt_feedback: None,
    });

    let err = h.client.process_query("hi", None, None).await.unwrap_err();
    assert!(matches!(err, TurnError::NoValidResponse));
}

#[tokio::test]
async fn narration_survives_an_empty_followup() {
    let mut h = harness(vec![("fs", vec!["list_directory"])], ClientSettings::default()).await;
    h.mock.push(GenerateResponse::from_parts(vec![
        Part::function_call("list_directory", json!({})),
        Part::text("Checking the directory."),
    ]));
    h.mock.push(GenerateResponse::default());

    let answer = h.client.process_query("ls", None, None).await.unwrap();
    assert_eq!(answer, "Checking the directory.");

    let last = h.client.history().history().last().unwrap();
    assert_eq!(last.role, Some(Role::Model));
    assert_eq!(last.parts, vec![Part::text("Checking the directory.")]);

    h.mock.push(GenerateResponse::text("Anything else?"));
    h.client.process_query("thanks", None, None).await.unwrap();
    let roles: Vec<_> = h.mock.requests()[2]
        .contents
        .iter()
        .map(|c| c.role)
        .collect();
    assert_eq!(
        roles,
        vec![
            Some(Role::User),
            Some(Role::Model),
            Some(Role::User),
            Some(Role::Model),
            Some(Role::User),
        ]
    );
}

#[tokio::test]
async fn unexpected_shape_is_an_error() {
    let mut h = harness(Vec::new(), ClientSettings::default()).await;
    h.mock
        .push(GenerateResponse::from_parts(vec![Part::inline_data("image/png", "AAAA")]));

    let err = h.client.process_query("draw", None, None).await.unwrap_err();
    assert!(
        matches!(&err, TurnError::UnexpectedResponse(shape) if shape.contains("inlineData")),
        "{err:?}"
    );
}

#[tokio::test]
async fn thought_parts_are_skipped_and_signatures_kept() {
    let mut h = harness(vec![("fs", vec!["list_directory"])], ClientSettings::default()).await;
    let mut call = Part::function_call("list_directory", json!({}));
    call.thought_signature = Some("sig-1".into());
    let thought = Part {
        text: Some("pondering".into()),
        thought: Some(true),
        ..Part::default()
    };
    h.mock.push(GenerateResponse::from_parts(vec![thought, call]));
    h.mock.push(GenerateResponse::text("Done."));

    let answer = h.client.process_query("ls", None, None).await.unwrap();

    assert_eq!(answer, "Done.");
    let second = &h.mock.requests()[1];
    let model_turn = &second.contents[1];
    assert_eq!(model_turn.role, Some(Role::Model));
    assert_eq!(model_turn.parts[1].thought_signature.as_deref(), Some("sig-1"));
}

#[tokio::test]
async fn additional_prompt_is_sent() {
    let mut h = harness(Vec::new(), ClientSettings::default()).await;
    h.mock.push(GenerateResponse::text("ok"));

    h.client
        .process_query("list files", Some("Be terse."), None)
        .await
        .unwrap();

    let first = &h.mock.requests()[0].contents[0];
    assert_eq!(
        first.parts[0].text.as_deref(),
        Some("Be terse.\n\n---\n\nUser Request:\nlist files")
    );
}

#[tokio::test]
async fn bad_attachment_never_reaches_model() {
    let mut h = harness(Vec::new(), ClientSettings::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "not an image").unwrap();

    let err = h
        .client
        .process_query("describe", None, Some(&notes))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TurnError::Attachment(crate::AttachmentError::NotAnImage { .. })
    ));
    assert!(h.mock.requests().is_empty());
    assert!(h.client.history().is_empty());
}

#[tokio::test]
async fn image_attachment_follows_text() {
    let mut h = harness(Vec::new(), ClientSettings::default()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pixel.png");
    image::RgbImage::new(1, 1).save(&path).unwrap();
    h.mock.push(GenerateResponse::text("A black pixel."));

    let answer = h
        .client
        .process_query("describe", None, Some(&path))
        .await
        .unwrap();

    assert_eq!(answer, "A black pixel.");
    let parts = &h.mock.requests()[0].contents[0].parts;
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].text.as_deref(), Some("describe"));
    assert_eq!(parts[1].inline_data.as_ref().unwrap().mime_type, "image/png");
}

#[tokio::test]
async fn model_error_rolls_back_history() {
    let mut h = harness(Vec::new(), ClientSettings::default()).await;
    h.mock.push(GenerateResponse::text("first"));
    h.mock.push_error("upstream unavailable");

    h.client.process_query("one", None, None).await.unwrap();
    let err = h.client.process_query("two", None, None).await.unwrap_err();

    assert!(matches!(err, TurnError::Model(_)));
    assert_eq!(h.client.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_model_times_out() {
    let settings = ClientSettings {
        llm_timeout: Duration::from_secs(1),
        ..ClientSettings::default()
    };
    let mock = MockProvider::default().with_delay(Duration::from_secs(30));
    let mut client = Client::new(mock, settings);

    let err = client.process_query("hi", None, None).await.unwrap_err();
    assert!(matches!(err, TurnError::Timeout(1)), "{err:?}");
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_model_call() {
    let mock = MockProvider::default().with_delay(Duration::from_secs(60));
    let mut client = Client::new(mock, ClientSettings::default());
    let token = client.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let err = client.process_query("hi", None, None).await.unwrap_err();
    assert!(matches!(err, TurnError::Cancelled));
    assert!(client.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_tool_call() {
    let mut h = harness(vec![("slow", vec!["hang"])], ClientSettings::default()).await;
    h.mock.push(GenerateResponse::function_call("hang", json!({})));
    let token = h.client.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let err = h.client.process_query("wait", None, None).await.unwrap_err();
    assert!(matches!(err, TurnError::Cancelled), "{err:?}");
    assert!(h.client.history().is_empty());
    assert_eq!(h.log.lock().unwrap().len(), 1);

    tokio::time::timeout(Duration::from_secs(10), h.client.cleanup())
        .await
        .expect("cleanup finished");
    assert!(h.client.tool_names().is_empty());
}

#[tokio::test]
async fn new_chat_and_cleanup() {
    let mut h = harness(vec![("fs", vec!["list_directory"])], ClientSettings::default()).await;
    h.mock.push(GenerateResponse::text("hi"));
    h.client.process_query("hello", None, None).await.unwrap();

    h.client.start_new_chat();
    assert!(h.client.history().is_empty());
    assert_eq!(h.client.tool_names(), vec!["list_directory"]);

    h.client.cleanup().await;
    h.client.cleanup().await;
    assert!(h.client.tool_names().is_empty());
}

#[tokio::test]
async fn collisions_surface_in_summary() {
    let connector = StubConnector::default()
        .with("alpha", &["search"])
        .with("beta", &["search"]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut client = Client::new(MockProvider::default(), ClientSettings::default())
        .with_connector(Arc::new(connector))
        .with_status_tx(tx);

    let summary = client
        .connect_all(&[
            ServerEntry::stdio("alpha", "stub", &[]),
            ServerEntry::stdio("beta", "stub", &[]),
        ])
        .await;

    assert_eq!(summary.connected, vec!["alpha", "beta"]);
    assert_eq!(summary.tool_count, 1);
    assert_eq!(summary.collisions.len(), 1);
    assert_eq!(client.catalog().owner_of("search"), Some("beta"));
    let status = rx.recv().await.unwrap();
    assert!(status.contains("Connected to 2 of 2"), "{status}");
}
