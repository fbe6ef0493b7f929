//! End-to-end planning against a mock chat-completions server and a local docstore

use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use askdbx::config::{LlmProvider, PlanningConfig, ResolvedLlmConfig};
use askdbx::gateway::LlmGateway;
use askdbx::llm::OpenAIClient;
use askdbx::planning::{PlanningController, Termination, Verification};
use askdbx::prompts::PromptLoader;
use askdbx::report::MarkdownReport;
use askdbx::retriever::LocalRetriever;
use askdbx::state::StateManager;
use askdbx::worker::Worker;
use docstore::{DocStore, IngestOptions};

const CHAT_PATH: &str = "/serving-endpoints/chat/completions";

fn text_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    }))
}

fn tool_reply(name: &str, arguments: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": { "name": name, "arguments": arguments.to_string() }
                }]
            },
            "finish_reason": "tool_calls"
        }]
    }))
}

async fn mount(server: &MockServer, markers: &[&str], priority: u8, reply: ResponseTemplate) {
    let mut mock = Mock::given(method("POST")).and(path(CHAT_PATH));
    for marker in markers {
        mock = mock.and(body_string_contains(*marker));
    }
    mock.respond_with(reply).with_priority(priority).mount(server).await;
}

async fn scripted_model() -> MockServer {
    let server = MockServer::start().await;
    mount(
        &server,
        &["Write a single focused search query"],
        5,
        text_reply("nightly job schedule"),
    )
    .await;
    mount(
        &server,
        &["Write an implementation plan"],
        5,
        text_reply("1. Create a job with a notebook task\n2. Add a nightly cron schedule"),
    )
    .await;
    mount(
        &server,
        &["submit_relevance", "Billing"],
        1,
        tool_reply("submit_relevance", json!({"relevance": "irrelevant"})),
    )
    .await;
    mount(
        &server,
        &["submit_relevance"],
        5,
        tool_reply("submit_relevance", json!({"relevance": "relevant"})),
    )
    .await;
    mount(
        &server,
        &["submit_verification"],
        5,
        tool_reply("submit_verification", json!({"verdict": "fully-supported"})),
    )
    .await;
    mount(&server, &["submit_rating"], 5, tool_reply("submit_rating", json!({"rating": 5}))).await;
    mount(&server, &["submit_decision"], 5, tool_reply("submit_decision", json!({"decision": "no"}))).await;
    mount(
        &server,
        &["submit_tasks"],
        5,
        tool_reply(
            "submit_tasks",
            json!({"tasks": [
                {"objective": "Create the ETL job", "steps": ["Create a job with a notebook task"]},
                {"objective": "Schedule the ETL job nightly", "steps": ["Add a cron schedule at 02:00"]}
            ]}),
        ),
    )
    .await;
    server
}

fn ingest_docs(temp: &TempDir) -> std::path::PathBuf {
    let docs = temp.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(
        docs.join("jobs.md"),
        "# Jobs\n\nCreate a job with one or more tasks.\n\n# Schedules\n\nA job schedule uses a quartz cron expression, for example nightly at 02:00.\n",
    )
    .unwrap();
    std::fs::write(
        docs.join("billing.md"),
        "# Billing\n\nBilling: job clusters are charged per DBU and invoices arrive monthly.\n",
    )
    .unwrap();

    let store_dir = temp.path().join("store");
    let store = DocStore::open(&store_dir).unwrap();
    let pattern = docs.join("*.md").to_string_lossy().to_string();
    store.ingest(&[pattern], IngestOptions::default()).unwrap();
    store_dir
}

fn gateway(server: &MockServer) -> Arc<LlmGateway> {
    let resolved = ResolvedLlmConfig {
        provider: LlmProvider::Databricks,
        model: "databricks-test-model".to_string(),
        api_key: "dapi-test".to_string(),
        endpoint_url: format!("{}{}", server.uri(), CHAT_PATH),
        max_tokens: 1000,
        timeout_ms: 5_000,
        max_retries: 0,
    };
    let llm = Arc::new(OpenAIClient::from_config(&resolved).unwrap());
    Arc::new(LlmGateway::new(llm, Arc::new(PromptLoader::embedded_only()), 2))
}

#[tokio::test]
async fn test_plan_and_apply_nightly_etl() {
    let temp = TempDir::new().unwrap();
    let store_dir = ingest_docs(&temp);
    let server = scripted_model().await;

    let retriever = Arc::new(LocalRetriever::open(store_dir, None).unwrap());
    let controller = PlanningController::new(gateway(&server), retriever, PlanningConfig::default());

    let outcome = controller.run("Create a nightly ETL job").await.unwrap();

    assert_eq!(outcome.termination, Termination::Accepted);
    assert_eq!(outcome.state.iteration, 1);
    assert_eq!(outcome.state.verification, Verification::FullySupported);
    assert_eq!(outcome.state.documents.len(), 2);
    assert!(
        outcome
            .state
            .documents
            .values()
            .all(|d| !d.content.contains("Billing"))
    );
    assert_eq!(outcome.tasks.len(), 2);
    assert!(outcome.tasks[0].documentation.contains("quartz cron"));

    let state = StateManager::spawn(temp.path().join("data").join("state.db")).unwrap();
    let report = MarkdownReport::open(temp.path().join("data").join("tasks.md")).unwrap();
    let worker = Worker::new(state.clone(), report);

    let mut tasks = outcome.tasks;
    let summary = worker.process_all(&mut tasks).await.unwrap();
    assert_eq!(summary.completed, 2);
    for task in &tasks {
        assert_eq!(state.require_state(&task.id).await.unwrap().state, "COMPLETE");
    }

    let report = std::fs::read_to_string(temp.path().join("data").join("tasks.md")).unwrap();
    assert!(report.contains("- **Details:** Schedule the ETL job nightly"));
}
