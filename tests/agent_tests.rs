mod common;

use async_trait::async_trait;
use common::{FailingClient, SequentialMockClient};
use piping_assistant::agent::MAX_ITERATIONS_WARNING;
use piping_assistant::client_wrapper::{Role, TokenUsage};
use piping_assistant::tool_protocol::{
    required_str, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolRegistry,
    ToolResult,
};
use piping_assistant::{Agent, ChatSession};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

const SEARCH_CALL: &str =
    r#"{"tool_call": {"name": "search_library", "parameters": {"keyword": "valve"}}}"#;

struct RecordingProtocol {
    calls: Mutex<Vec<(String, serde_json::Value)>>,
}

impl RecordingProtocol {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ToolProtocol for RecordingProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        self.calls
            .lock()
            .await
            .push((tool_name.to_string(), parameters.clone()));
        match tool_name {
            "search_library" => {
                let keyword = required_str(&parameters, "keyword")?;
                Ok(ToolResult::text(format!("- {}-datasheet.pdf\n", keyword)))
            }
            "broken" => Ok(ToolResult::failure("Drive quota exceeded".to_string())),
            other => Err(format!("unexpected tool {}", other).into()),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![
            ToolMetadata::new("search_library", "Search the PDF library by filename")
                .with_parameter(ToolParameter::new("keyword", ToolParameterType::String).required()),
            ToolMetadata::new("broken", "Always fails"),
        ])
    }

    fn protocol_name(&self) -> &str {
        "recording"
    }
}

async fn agent_with(
    client: Arc<SequentialMockClient>,
    protocol: Arc<RecordingProtocol>,
    max_iterations: usize,
) -> Agent {
    let registry = ToolRegistry::from_protocol(protocol).await.unwrap();
    Agent::new(client, registry, ChatSession::new("Brazi Refinery"), max_iterations)
}

#[tokio::test]
async fn reply_without_tool_call_ends_the_turn() {
    let client = Arc::new(SequentialMockClient::new(&["Use ASME B16.5 Class 150."]));
    let protocol = Arc::new(RecordingProtocol::new());
    let mut agent = agent_with(client.clone(), protocol.clone(), 5).await;

    let response = agent.send("Which flange class?").await.unwrap();
    assert_eq!(response.content, "Use ASME B16.5 Class 150.");
    assert_eq!(response.tool_calls_made, 0);
    assert_eq!(client.calls(), 1);
    assert!(protocol.calls.lock().await.is_empty());
}

#[tokio::test]
async fn tool_result_is_fed_back_to_the_model() {
    let client = Arc::new(SequentialMockClient::new(&[
        SEARCH_CALL,
        "The valve datasheet is valve-datasheet.pdf.",
    ]));
    let protocol = Arc::new(RecordingProtocol::new());
    let mut agent = agent_with(client.clone(), protocol.clone(), 5).await;

    let response = agent.send("Find the valve datasheet").await.unwrap();
    assert_eq!(response.content, "The valve datasheet is valve-datasheet.pdf.");
    assert_eq!(response.tool_calls_made, 1);

    let calls = protocol.calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "search_library");
    assert_eq!(calls[0].1["keyword"], "valve");

    let requests = client.requests.lock().await;
    assert_eq!(requests.len(), 2);
    let second = &requests[1];
    assert_eq!(second[0].role, Role::System);
    let last = second.last().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.starts_with("Tool 'search_library' result:"));
    assert!(last.content.contains("- valve-datasheet.pdf"));
    assert_eq!(second[second.len() - 2].content, SEARCH_CALL);
}

#[tokio::test]
async fn loop_stops_at_the_iteration_cap() {
    let client = Arc::new(SequentialMockClient::new(&[SEARCH_CALL]));
    let protocol = Arc::new(RecordingProtocol::new());
    let mut agent = agent_with(client.clone(), protocol.clone(), 3).await;

    let response = agent.send("Loop forever").await.unwrap();
    assert_eq!(response.tool_calls_made, 3);
    assert!(response.content.ends_with(MAX_ITERATIONS_WARNING));
    assert_eq!(protocol.calls.lock().await.len(), 3);
    assert_eq!(client.calls(), 4);
}

#[tokio::test]
async fn tool_failures_are_reported_to_the_model() {
    let client = Arc::new(SequentialMockClient::new(&[
        r#"{"tool_call": {"name": "broken", "parameters": {}}}"#,
        r#"{"tool_call": {"name": "calculator", "parameters": {"expr": "1+1"}}}"#,
        "Done.",
    ]));
    let protocol = Arc::new(RecordingProtocol::new());
    let mut agent = agent_with(client.clone(), protocol, 5).await;

    let response = agent.send("go").await.unwrap();
    assert_eq!(response.content, "Done.");
    assert_eq!(response.tool_calls_made, 2);

    let requests = client.requests.lock().await;
    let after_broken = requests[1].last().unwrap();
    assert_eq!(
        after_broken.content,
        "Tool 'broken' failed. Error: Drive quota exceeded"
    );
    let after_unknown = requests[2].last().unwrap();
    assert_eq!(
        after_unknown.content,
        "Tool execution error: Tool not found: calculator"
    );
}

#[tokio::test]
async fn system_prompt_lists_tools_and_project() {
    let client = Arc::new(SequentialMockClient::new(&["ok"]));
    let mut agent = agent_with(client, Arc::new(RecordingProtocol::new()), 5).await;

    assert!(agent.system_prompt().contains("Brazi Refinery"));
    assert!(agent.system_prompt().contains("- search_library: Search the PDF library"));
    assert!(agent.system_prompt().contains("{\"tool_call\""));

    agent.set_project("Gas Pipeline");
    assert!(agent.system_prompt().contains("Gas Pipeline"));
    assert_eq!(agent.session().project(), "Gas Pipeline");
}

#[tokio::test]
async fn usage_is_summed_across_round_trips() {
    let usage = TokenUsage {
        input_tokens: 100,
        output_tokens: 20,
        total_tokens: 120,
    };
    let client = Arc::new(SequentialMockClient::new(&[SEARCH_CALL, "answer"]).with_usage(usage));
    let mut agent = agent_with(client, Arc::new(RecordingProtocol::new()), 5).await;

    let response = agent.send("q").await.unwrap();
    let total = response.tokens_used.unwrap();
    assert_eq!(total.input_tokens, 200);
    assert_eq!(total.total_tokens, 240);
}

#[tokio::test]
async fn history_carries_over_and_reset_clears_it() {
    let client = Arc::new(SequentialMockClient::new(&["first", "second"]));
    let mut agent = agent_with(client.clone(), Arc::new(RecordingProtocol::new()), 5).await;

    agent.send("one").await.unwrap();
    agent.session().loaded_documents().insert("PS-001.pdf").await;
    agent.send("two").await.unwrap();
    {
        let requests = client.requests.lock().await;
        // system, user "one", assistant "first", user "two"
        assert_eq!(requests[1].len(), 4);
    }
    assert_eq!(agent.session().history().len(), 4);

    agent.reset().await;
    assert!(agent.session().history().is_empty());
    assert!(agent.session().loaded_documents().is_empty().await);
    assert_eq!(agent.session().project(), "Brazi Refinery");
}

#[tokio::test]
async fn model_failure_is_an_error() {
    let registry = ToolRegistry::from_protocol(Arc::new(RecordingProtocol::new()))
        .await
        .unwrap();
    let mut agent = Agent::new(Arc::new(FailingClient), registry, ChatSession::new("General"), 5);

    let err = agent.send("anything").await.unwrap_err();
    assert!(err.to_string().contains("503 Service Unavailable"));
}
