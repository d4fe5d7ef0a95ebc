//! Model backends against a mock OpenAI-compatible server.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use krutrim::agent::{ControllerOptions, ConversationController};
use krutrim::config::KrutrimConfig;
use krutrim::error::KrutrimError;
use krutrim::models::LanguageModel;
use krutrim::provider::{create_provider, ModelProvider, ProviderRequest, ToolDefinition};
use krutrim::session::Session;
use krutrim::tools::{FnTool, StaticToolProvider, ToolParameters};
use krutrim::types::Message;

fn completion(content: &str, total_tokens: u32) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": total_tokens - 4,
            "completion_tokens": 4,
            "total_tokens": total_tokens
        }
    })
}

fn ollama_config(server: &MockServer) -> KrutrimConfig {
    KrutrimConfig {
        ollama_base_url: server.uri(),
        ..Default::default()
    }
}

fn provider_for(model: &str, config: &KrutrimConfig) -> Box<dyn ModelProvider> {
    let model: LanguageModel = model.parse().expect("model parse");
    create_provider(&model, config).expect("provider")
}

#[tokio::test]
async fn ollama_posts_to_v1_chat_completions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "model": "gemma3", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("Namaste!", 42)))
        .expect(1)
        .mount(&server)
        .await;

    let provider = provider_for("ollama:gemma3", &ollama_config(&server));
    let response = provider
        .generate_text(&ProviderRequest {
            messages: vec![Message::system("be kind"), Message::user("hello")],
            tools: None,
        })
        .await
        .unwrap();

    assert_eq!(response.text, "Namaste!");
    assert_eq!(response.usage.total_tokens, 42);
    assert!(response.tool_calls.is_empty());
}

#[tokio::test]
async fn openai_sends_bearer_token_and_tools() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "tools": [{ "type": "function", "function": { "name": "getTemperature" } }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": { "name": "getTemperature", "arguments": "{\"city\":\"Mumbai\"}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 20, "completion_tokens": 7, "total_tokens": 27 }
        })))
        .mount(&server)
        .await;

    let config = KrutrimConfig {
        openai_api_key: Some("sk-test".into()),
        openai_base_url: Some(format!("{}/v1", server.uri())),
        ..Default::default()
    };
    let provider = provider_for("openai:gpt-4o-mini", &config);
    let response = provider
        .generate_text(&ProviderRequest {
            messages: vec![Message::user("temperature in Mumbai?")],
            tools: Some(vec![ToolDefinition {
                name: "getTemperature".into(),
                description: "Current temperature".into(),
                parameters: json!({ "type": "object" }),
            }]),
        })
        .await
        .unwrap();

    assert_eq!(response.text, "");
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id, "call_abc");
    assert_eq!(response.tool_calls[0].arguments, json!({ "city": "Mumbai" }));
}

#[tokio::test]
async fn http_errors_surface_the_api_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(json!({ "error": "model 'gemma3' not found, try pulling it first" })),
        )
        .mount(&server)
        .await;

    let provider = provider_for("ollama:gemma3", &ollama_config(&server));
    let err = provider
        .generate_text(&ProviderRequest {
            messages: vec![Message::user("hi")],
            tools: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        KrutrimError::Api { status: 404, ref message } if message.contains("try pulling it")
    ));
}

#[tokio::test]
async fn tool_loop_round_trips_through_the_wire_format() {
    let server = MockServer::start().await;
    // Second request: it carries the tool result, so answer.
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{}, {}, {}, { "role": "tool", "tool_call_id": "call_1", "content": "22C" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("It is 22C.", 30)))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "getTemperature", "arguments": "{}" }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15 }
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let provider = provider_for("ollama:gemma3", &ollama_config(&server));
    let tools = StaticToolProvider::default().with_tool(FnTool::new(
        "getTemperature",
        "Current temperature",
        ToolParameters::empty(),
        |_, _| async { Ok(json!("22C")) },
    ));
    let controller = ConversationController::new(Arc::from(provider), ControllerOptions::default())
        .with_tools(Arc::new(tools));

    let answer = controller
        .step(&Session::start(), "What's the temperature?")
        .await
        .unwrap();

    assert_eq!(answer.content(), "It is 22C.");
    assert_eq!(answer.usage().map(|u| u.total_tokens), Some(45));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn unreachable_backend_is_a_provider_error_for_the_turn() {
    let config = KrutrimConfig {
        ollama_base_url: "http://127.0.0.1:9".into(),
        ..Default::default()
    };
    let provider = provider_for("ollama:gemma3", &config);
    let controller = ConversationController::new(Arc::from(provider), ControllerOptions::default());

    let err = controller.step(&Session::start(), "hi").await.unwrap_err();
    assert!(matches!(err, KrutrimError::Provider { ref provider, .. } if provider == "ollama"));
}
