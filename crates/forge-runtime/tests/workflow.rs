//! End-to-end workflow tests over in-memory backends.

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;

use forge_core::constants::INCOMPLETE_RUN_MESSAGE;
use forge_core::ids::{ConversationId, RunId};
use forge_core::retry::RetryConfig;
use forge_core::state::{MessageKind, Role};
use forge_llm::testutil::ScriptedProvider;
use forge_llm::Provider;
use forge_runtime::{run_workflow, RunRequest, WorkflowDeps, WorkflowError};
use forge_sandbox::testutil::FakeSandbox;
use forge_sandbox::SandboxProvider;
use forge_settings::ForgeSettings;
use forge_store::{MemoryMessageStore, MemoryStepLog, MessageStore, NewMessage, StepLog};

struct Harness {
    provider: Arc<ScriptedProvider>,
    small: Arc<ScriptedProvider>,
    sandbox: Arc<FakeSandbox>,
    store: Arc<MemoryMessageStore>,
    deps: WorkflowDeps,
}

fn harness() -> Harness {
    let provider = Arc::new(ScriptedProvider::new());
    let small = Arc::new(ScriptedProvider::new());
    let sandbox = Arc::new(FakeSandbox::new());
    let store = Arc::new(MemoryMessageStore::new());
    let step_log = Arc::new(MemoryStepLog::new());

    let settings = ForgeSettings {
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            jitter_factor: 0.0,
        },
        ..ForgeSettings::default()
    };

    let deps = WorkflowDeps {
        provider: Arc::clone(&provider) as Arc<dyn Provider>,
        small_provider: Arc::clone(&small) as Arc<dyn Provider>,
        sandbox: Arc::clone(&sandbox) as Arc<dyn SandboxProvider>,
        store: Arc::clone(&store) as Arc<dyn MessageStore>,
        step_log: Arc::clone(&step_log) as Arc<dyn StepLog>,
        settings: Arc::new(settings),
    };
    Harness {
        provider,
        small,
        sandbox,
        store,
        deps,
    }
}

fn request(value: &str) -> RunRequest {
    RunRequest {
        run_id: RunId::from("run-1"),
        conversation_id: ConversationId::from("conv-1"),
        value: value.to_owned(),
    }
}

fn push_post_processing(small: &ScriptedProvider) {
    small.push_text("Readme Fragment");
    small.push_text("I added a README for you.");
}

#[tokio::test]
async fn completed_run_persists_result_record() {
    let h = harness();
    h.provider.push_tool_call(
        "create_or_update_files",
        json!({"files": [{"path": "README.md", "content": "# Hello"}]}),
    );
    h.provider
        .push_text("<task_summary>Added a README</task_summary>");
    push_post_processing(&h.small);

    let output = run_workflow(&h.deps, request("add a README"))
        .await
        .unwrap();

    assert!(output.url.starts_with("https://"));
    assert!(output.url.ends_with("-3000.sandbox.test"));
    assert_eq!(output.title, "Readme Fragment");
    assert_eq!(output.files["README.md"], "# Hello");
    assert_eq!(output.summary, "Added a README");

    let stored = h.store.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, Role::Assistant);
    assert_eq!(stored[0].kind, MessageKind::Result);
    assert_eq!(stored[0].content, "I added a README for you.");
    let fragment = stored[0].fragment.as_ref().unwrap();
    assert_eq!(fragment.title, "Readme Fragment");
    assert_eq!(fragment.sandbox_url, output.url);
    assert_eq!(fragment.files["README.md"], "# Hello");
}

#[tokio::test]
async fn exhausted_run_persists_error_record() {
    let h = harness();
    for _ in 0..10 {
        h.provider.push_text("still working");
    }
    push_post_processing(&h.small);

    let output = run_workflow(&h.deps, request("build something"))
        .await
        .unwrap();

    assert_eq!(h.provider.call_count(), 10);
    assert_eq!(output.summary, "");

    let stored = h.store.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, MessageKind::Error);
    assert_eq!(stored[0].content, INCOMPLETE_RUN_MESSAGE);
    assert!(stored[0].fragment.is_none());
}

#[tokio::test]
async fn summary_without_files_is_an_error_outcome() {
    let h = harness();
    h.provider
        .push_text("<task_summary>Nothing needed doing</task_summary>");
    push_post_processing(&h.small);

    let output = run_workflow(&h.deps, request("noop")).await.unwrap();

    assert!(output.files.is_empty());
    let stored = h.store.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, MessageKind::Error);
    assert!(stored[0].fragment.is_none());
}

#[tokio::test]
async fn files_without_summary_is_an_error_outcome() {
    let h = harness();
    h.provider.push_tool_call(
        "create_or_update_files",
        json!({"files": [{"path": "a.txt", "content": "1"}]}),
    );
    for _ in 0..9 {
        h.provider.push_text("still working");
    }
    push_post_processing(&h.small);

    let output = run_workflow(&h.deps, request("write a file")).await.unwrap();

    assert_eq!(output.files["a.txt"], "1");
    let stored = h.store.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, MessageKind::Error);
}

#[tokio::test]
async fn failing_command_feeds_back_without_aborting() {
    let h = harness();
    h.sandbox.push_command(Ok(forge_sandbox::CommandOutput {
        stdout: String::new(),
        stderr: "missing dependency".to_owned(),
        exit_code: 1,
    }));
    h.provider
        .push_tool_call("run_terminal_command", json!({"command": "npm test"}));
    h.provider.push_tool_call(
        "create_or_update_files",
        json!({"files": [{"path": "fix.txt", "content": "fixed"}]}),
    );
    h.provider
        .push_text("<task_summary>Fixed the build</task_summary>");
    push_post_processing(&h.small);

    let output = run_workflow(&h.deps, request("fix it")).await.unwrap();

    assert_eq!(output.files["fix.txt"], "fixed");
    assert_eq!(h.sandbox.commands(), vec!["npm test".to_owned()]);
    assert_eq!(h.store.all()[0].kind, MessageKind::Result);

    // The second agent request carries the failure as a tool result.
    let requests = h.provider.requests();
    let failure_fed_back = requests[1].messages.iter().any(|m| {
        matches!(m, forge_llm::ChatMessage::Tool { content, .. }
            if content.contains("exit code 1") && content.contains("missing dependency"))
    });
    assert!(failure_fed_back);
}

#[tokio::test]
async fn replaying_a_run_persists_exactly_one_record() {
    let h = harness();
    h.provider.push_tool_call(
        "create_or_update_files",
        json!({"files": [{"path": "README.md", "content": "# Hello"}]}),
    );
    h.provider
        .push_text("<task_summary>Added a README</task_summary>");
    push_post_processing(&h.small);

    let first = run_workflow(&h.deps, request("add a README"))
        .await
        .unwrap();
    let provider_calls = h.provider.call_count();
    let small_calls = h.small.call_count();

    // Same run id, same step log: every step replays from the log.
    let second = run_workflow(&h.deps, request("add a README"))
        .await
        .unwrap();

    assert_eq!(second.url, first.url);
    assert_eq!(second.title, first.title);
    assert_eq!(second.files, first.files);
    assert_eq!(second.summary, first.summary);
    assert_eq!(h.provider.call_count(), provider_calls);
    assert_eq!(h.small.call_count(), small_calls);
    assert_eq!(h.sandbox.created_count(), 1);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn sandbox_create_exhaustion_aborts_without_record() {
    let h = harness();
    h.sandbox.fail_next_creates(10);

    let result = run_workflow(&h.deps, request("build something")).await;

    assert_matches!(
        result,
        Err(WorkflowError::StepExhausted { ref name, attempts: 3, .. })
            if name == "create-sandbox"
    );
    assert!(h.store.is_empty());
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn prior_conversation_seeds_the_transcript() {
    let h = harness();
    let conversation = ConversationId::from("conv-1");
    let _ = h
        .store
        .create(NewMessage::user(conversation.clone(), "build a page".into()))
        .unwrap();
    let _ = h
        .store
        .create(NewMessage {
            conversation_id: conversation,
            role: Role::Assistant,
            kind: MessageKind::Result,
            content: "I built a page.".into(),
            fragment: None,
        })
        .unwrap();

    h.provider
        .push_text("<task_summary>Tweaked the page</task_summary>");
    push_post_processing(&h.small);

    let _ = run_workflow(&h.deps, request("make it blue")).await.unwrap();

    let requests = h.provider.requests();
    let messages = &requests[0].messages;
    assert_eq!(messages.len(), 3);
    assert_matches!(&messages[0], forge_llm::ChatMessage::User { content }
        if content == "build a page");
    assert_matches!(&messages[1], forge_llm::ChatMessage::Assistant { content, .. }
        if content == "I built a page.");
    assert_matches!(&messages[2], forge_llm::ChatMessage::User { content }
        if content == "make it blue");
}
