//! Turn-level behaviour of the conversation controller.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use common::{CountingToolProvider, MockProvider, UnreachableToolProvider};
use krutrim::agent::{ControllerOptions, ConversationController, TurnEvent, TurnEventPayload, TurnEventSink};
use krutrim::error::KrutrimError;
use krutrim::session::Session;
use krutrim::tools::{FnTool, StaticToolProvider, ToolParameters};
use krutrim::types::Role;

fn weather_tools() -> StaticToolProvider {
    StaticToolProvider::default()
        .with_tool(FnTool::new(
            "getTemperature",
            "Current temperature for a city",
            ToolParameters::object().string("city", "City name", false).build(),
            |_, _| async { Ok(json!("22C")) },
        ))
        .with_tool(FnTool::new(
            "getHumidity",
            "Current humidity for a city",
            ToolParameters::empty(),
            |_, _| async { Ok(json!("40%")) },
        ))
        .with_tool(FnTool::new(
            "broken",
            "Always fails",
            ToolParameters::empty(),
            |_, _| async {
                Err(KrutrimError::ToolExecution {
                    tool_name: "broken".into(),
                    message: "sensor offline".into(),
                })
            },
        ))
}

fn controller(provider: &Arc<MockProvider>) -> ConversationController {
    ConversationController::new(provider.clone(), ControllerOptions::default())
}

#[tokio::test]
async fn plain_turn_appends_user_and_assistant() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_response("Hello!");
    provider.queue_response("Still here.");
    let controller = controller(&provider);
    let session = Session::start();

    controller.step(&session, "hi").await.unwrap();
    assert_eq!(controller.history(&session).await.unwrap().len(), 2);

    let answer = controller.step(&session, "are you there?").await.unwrap();
    assert_eq!(answer.content(), "Still here.");

    let history = controller.history(&session).await.unwrap();
    let roles: Vec<Role> = history.iter().map(|m| m.role()).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    assert_eq!(history[2].content(), "are you there?");
}

#[tokio::test]
async fn system_prompt_is_sent_but_never_stored() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_response("Hi.");
    let options = ControllerOptions::builder().system_prompt("Be terse.").build();
    let controller = ConversationController::new(provider.clone(), options);
    let session = Session::start();

    controller.step(&session, "hello").await.unwrap();

    let request = &provider.requests()[0];
    assert_eq!(request.messages[0].role(), Role::System);
    assert_eq!(request.messages[0].content(), "Be terse.");
    assert!(request.tools.is_none());
    assert!(controller
        .history(&session)
        .await
        .unwrap()
        .iter()
        .all(|m| m.role() != Role::System));
}

#[tokio::test]
async fn tool_results_follow_requests_in_order_and_stay_ephemeral() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_tool_calls(vec![
        ("call_1", "getTemperature", json!({"city": "Pune"})),
        ("call_2", "getHumidity", json!({})),
    ]);
    provider.queue_response("It is 22C with 40% humidity.");
    let controller = controller(&provider).with_tools(Arc::new(weather_tools()));
    let session = Session::start();

    controller.step(&session, "Weather?").await.unwrap();

    let second = &provider.requests()[1];
    let tail: Vec<(Role, Option<&str>, &str)> = second.messages[2..]
        .iter()
        .map(|m| (m.role(), m.tool_call_id(), m.content()))
        .collect();
    assert_eq!(
        tail,
        vec![
            (Role::Assistant, None, ""),
            (Role::Tool, Some("call_1"), "22C"),
            (Role::Tool, Some("call_2"), "40%"),
        ]
    );

    let history = controller.history(&session).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content(), "It is 22C with 40% humidity.");
}

#[tokio::test]
async fn sessions_do_not_share_history() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    let controller = controller(&provider);
    let alice = Session::start();
    let bob = Session::start();

    controller.step(&alice, "I am Alice").await.unwrap();
    controller.step(&alice, "Remember me?").await.unwrap();
    controller.step(&bob, "I am Bob").await.unwrap();

    assert_eq!(controller.history(&alice).await.unwrap().len(), 4);
    let bob_history = controller.history(&bob).await.unwrap();
    assert_eq!(bob_history.len(), 2);
    assert_eq!(bob_history[0].content(), "I am Bob");

    // Same id, same checkpoint.
    let alice_again = Session::with_id(alice.id());
    assert_eq!(controller.history(&alice_again).await.unwrap().len(), 4);

    // The third request only carried Bob's message after the system prompt.
    let third = &provider.requests()[2];
    assert_eq!(third.messages.len(), 2);
}

#[cfg(feature = "mcp")]
#[tokio::test]
async fn unconfigured_tool_endpoint_aborts_before_the_turn() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    let controller = controller(&provider)
        .with_tools(Arc::new(krutrim::mcp::McpToolProvider::new(Vec::<String>::new())));
    let session = Session::start();

    let err = controller.step(&session, "hi").await.unwrap_err();

    assert!(matches!(err, KrutrimError::Configuration(_)));
    assert!(err.is_fatal());
    assert_eq!(provider.call_count(), 0);
    assert!(controller.history(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn faulting_tool_becomes_an_error_payload_for_the_next_step() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_tool_call("call_1", "broken", json!({}));
    provider.queue_response("The sensor is offline.");
    let controller = controller(&provider).with_tools(Arc::new(weather_tools()));

    let answer = controller.step(&Session::start(), "Check it").await.unwrap();
    assert_eq!(answer.content(), "The sensor is offline.");

    let second = provider.requests().remove(1);
    let tool_message = second.messages.last().unwrap();
    assert_eq!(tool_message.role(), Role::Tool);
    assert!(tool_message.is_error());
    let payload: serde_json::Value = serde_json::from_str(tool_message.content()).unwrap();
    assert!(payload["error"].as_str().unwrap().contains("sensor offline"));
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_tool_call("call_1", "teleport", json!({}));
    provider.queue_response("I can't do that.");
    let controller = controller(&provider).with_tools(Arc::new(weather_tools()));

    controller.step(&Session::start(), "Beam me up").await.unwrap();

    let second = provider.requests().remove(1);
    assert!(second.messages.last().unwrap().content().contains("Tool 'teleport' not found"));
}

#[tokio::test]
async fn temperature_trace_ends_with_usage() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_tool_call("call_1", "getTemperature", json!({}));
    provider.queue_response("The temperature is 22C.");
    let controller = controller(&provider).with_tools(Arc::new(weather_tools()));
    let session = Session::start();

    let answer = controller.step(&session, "What's the temperature?").await.unwrap();

    assert_eq!(answer.role(), Role::Assistant);
    assert_eq!(answer.content(), "The temperature is 22C.");
    let usage = answer.usage().expect("final answer carries usage");
    assert_eq!(usage.total_tokens, 45);
    assert_eq!(controller.history(&session).await.unwrap()[1].usage(), Some(usage));
}

#[tokio::test]
async fn catalog_is_refetched_for_every_agent_step() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_tool_call("call_1", "getTemperature", json!({}));
    provider.queue_tool_call("call_2", "getHumidity", json!({}));
    provider.queue_response("Done.");
    let tools = Arc::new(CountingToolProvider::new(weather_tools()));
    let controller = controller(&provider).with_tools(tools.clone());

    controller.step(&Session::start(), "Weather?").await.unwrap();

    assert_eq!(provider.call_count(), 3);
    assert_eq!(tools.calls(), 3);
    assert_eq!(provider.requests()[0].tools.as_ref().unwrap().len(), 3);
}

#[tokio::test]
async fn runaway_tool_loop_hits_the_step_limit() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    for i in 0..5 {
        provider.queue_tool_call(&format!("call_{i}"), "getTemperature", json!({}));
    }
    let options = ControllerOptions::builder().max_steps(3).build();
    let controller = ConversationController::new(provider.clone(), options)
        .with_tools(Arc::new(weather_tools()));
    let session = Session::start();

    let err = controller.step(&session, "loop forever").await.unwrap_err();

    assert!(matches!(err, KrutrimError::LoopLimitExceeded { max_steps: 3 }));
    assert_eq!(provider.call_count(), 3);
    let history = controller.history(&session).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content(), "loop forever");
}

#[tokio::test]
async fn provider_failure_still_records_the_user_message() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_error(KrutrimError::api(503, "model is loading"));
    let controller = controller(&provider);
    let session = Session::start();

    let err = controller.step(&session, "hi").await.unwrap_err();
    assert!(matches!(err, KrutrimError::Provider { ref message, .. } if message.contains("model is loading")));
    assert!(!err.is_fatal());

    let history = controller.history(&session).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role(), Role::User);

    // The next turn sees the unanswered message too.
    controller.step(&session, "hello?").await.unwrap();
    assert_eq!(provider.requests()[1].messages.len(), 3);
}

#[tokio::test]
async fn unreachable_tool_provider_fails_the_turn_but_records_it() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    let controller = controller(&provider).with_tools(Arc::new(UnreachableToolProvider));
    let session = Session::start();

    let err = controller.step(&session, "hi").await.unwrap_err();

    assert!(matches!(err, KrutrimError::ToolProvider(_)));
    assert_eq!(provider.call_count(), 0);
    assert_eq!(controller.history(&session).await.unwrap().len(), 1);
}

#[tokio::test]
async fn empty_answer_is_a_provider_error() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_response("   ");
    let controller = controller(&provider);

    let err = controller.step(&Session::start(), "hi").await.unwrap_err();
    assert!(matches!(err, KrutrimError::Provider { .. }));
}

#[tokio::test(start_paused = true)]
async fn turn_timeout_bounds_the_whole_turn() {
    let provider = Arc::new(MockProvider::new("gemma3").with_delay(Duration::from_secs(30)));
    let options = ControllerOptions::builder()
        .turn_timeout(Duration::from_secs(5))
        .build();
    let controller = ConversationController::new(provider.clone(), options);

    let err = controller.step(&Session::start(), "hi").await.unwrap_err();
    assert!(matches!(err, KrutrimError::Timeout(5000)));
}

#[tokio::test]
async fn events_trace_the_turn() {
    let provider = Arc::new(MockProvider::new("gemma3"));
    provider.queue_tool_call("call_1", "getTemperature", json!({}));
    provider.queue_response("22C.");

    let events: Arc<Mutex<Vec<TurnEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let sink: TurnEventSink = Arc::new(move |event| sink_events.lock().unwrap().push(event));
    let controller = controller(&provider)
        .with_tools(Arc::new(weather_tools()))
        .with_event_sink(sink);

    controller.step(&Session::start(), "temp?").await.unwrap();

    let kinds: Vec<&'static str> = events
        .lock()
        .unwrap()
        .iter()
        .map(|e| match &e.payload {
            TurnEventPayload::AgentStepStarted { .. } => "step",
            TurnEventPayload::ToolCallStarted { .. } => "tool_started",
            TurnEventPayload::ToolCallCompleted { .. } => "tool_completed",
            TurnEventPayload::TurnCompleted { .. } => "completed",
            TurnEventPayload::TurnFailed { .. } => "failed",
        })
        .collect();
    assert_eq!(kinds, vec!["step", "tool_started", "tool_completed", "step", "completed"]);
}

#[tokio::test]
async fn concurrent_turns_on_one_session_are_serialized() {
    let provider = Arc::new(MockProvider::new("gemma3").with_delay(Duration::from_millis(20)));
    let controller = Arc::new(controller(&provider));
    let session = Session::start();

    let (a, b) = tokio::join!(
        controller.step(&session, "first"),
        controller.step(&session, "second"),
    );
    a.unwrap();
    b.unwrap();

    let history = controller.history(&session).await.unwrap();
    let roles: Vec<Role> = history.iter().map(|m| m.role()).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    // The second turn saw the first turn's exchange.
    assert_eq!(provider.requests()[1].messages.len(), 4);
}
