//! Conversation controller: drives one user turn through the agent/tool loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::{
    DEFAULT_MAX_STEPS, DEFAULT_MODEL_TIMEOUT_SECS, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TOOL_TIMEOUT_SECS,
};
use crate::error::KrutrimError;
use crate::provider::ModelProvider;
use crate::session::{CheckpointStore, MemoryCheckpointStore, Session, SessionId};
use crate::tools::{ToolCatalog, ToolProvider};
use crate::types::{Message, ToolCall, Usage};
use crate::util::with_timeout;

use super::conversation::Conversation;
use super::dispatch::ToolDispatch;
use super::events::{TurnEventEmitter, TurnEventPayload, TurnEventSink};
use super::step::AgentStep;

/// Where a turn is in the agent/tool loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerState {
    AwaitingAgent,
    AwaitingTools(Vec<ToolCall>),
    Done(Message),
}

/// Knobs for a [`ConversationController`].
#[derive(Debug, Clone, Builder)]
pub struct ControllerOptions {
    /// Prepended to every model request, never stored.
    #[builder(into, default = DEFAULT_SYSTEM_PROMPT.to_string())]
    pub system_prompt: String,
    /// Agent steps allowed per turn.
    #[builder(default = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,
    #[builder(default = Duration::from_secs(DEFAULT_MODEL_TIMEOUT_SECS))]
    pub model_timeout: Duration,
    #[builder(default = Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS))]
    pub tool_timeout: Duration,
    /// Wall-clock bound on a whole turn.
    pub turn_timeout: Option<Duration>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Runs turns for any number of sessions against one model and tool provider.
pub struct ConversationController {
    step: AgentStep,
    dispatch: ToolDispatch,
    tools: Option<Arc<dyn ToolProvider>>,
    store: Arc<dyn CheckpointStore>,
    options: ControllerOptions,
    event_sink: Option<TurnEventSink>,
    session_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl ConversationController {
    /// A controller with an in-memory checkpoint store and no tools.
    pub fn new(provider: Arc<dyn ModelProvider>, options: ControllerOptions) -> Self {
        Self {
            step: AgentStep::new(provider, options.model_timeout),
            dispatch: ToolDispatch::new(options.tool_timeout),
            tools: None,
            store: Arc::new(MemoryCheckpointStore::new()),
            options,
            event_sink: None,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Offer the provider's tools to the model on every step.
    pub fn with_tools(mut self, tools: Arc<dyn ToolProvider>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_event_sink(mut self, sink: TurnEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// Stored messages for the session, oldest first.
    pub async fn history(&self, session: &Session) -> Result<Vec<Message>, KrutrimError> {
        Ok(self
            .store
            .load(&session.id())
            .await?
            .map(|checkpoint| checkpoint.conversation.messages().to_vec())
            .unwrap_or_default())
    }

    /// Run one user turn and return the final assistant message.
    ///
    /// The user message and the final answer are appended to the session's
    /// checkpoint. Tool requests and results stay in the turn's working
    /// sequence only. When the turn fails after it started, the user message
    /// is still stored.
    pub async fn step(
        &self,
        session: &Session,
        user_text: impl Into<String>,
    ) -> Result<Message, KrutrimError> {
        let session_id = session.id();
        let lock = self.session_lock(session_id).await;

        let outcome = {
            let _guard = lock.lock().await;
            let span = info_span!("turn", session_id = %session_id);
            self.run_turn(session_id, Message::user(user_text))
                .instrument(span)
                .await
        };

        drop(lock);
        self.release_session_lock(session_id).await;
        outcome
    }

    async fn run_turn(&self, session_id: SessionId, user: Message) -> Result<Message, KrutrimError> {
        let emitter = TurnEventEmitter::new(session_id, self.event_sink.clone());

        // A fatal catalog error aborts before the turn is recorded.
        let catalog = match self.fetch_catalog().await {
            Ok(catalog) => catalog,
            Err(e) if e.is_fatal() => {
                emitter.emit(TurnEventPayload::TurnFailed { error: e.to_string() });
                return Err(e);
            }
            Err(e) => {
                self.record_failed_turn(session_id, user).await?;
                emitter.emit(TurnEventPayload::TurnFailed { error: e.to_string() });
                return Err(e);
            }
        };

        let mut conversation = self
            .store
            .load(&session_id)
            .await?
            .map(|checkpoint| checkpoint.conversation)
            .unwrap_or_else(|| Conversation::new(session_id));

        let run = self.run_loop(&conversation, &user, catalog, session_id, &emitter);
        let outcome = match self.options.turn_timeout {
            Some(limit) => with_timeout(limit, run).await,
            None => run.await,
        };

        conversation.push(user);
        match outcome {
            Ok((answer, usage)) => {
                conversation.push(answer.clone());
                self.store.save(&conversation).await?;
                info!(total_tokens = usage.total_tokens, "turn completed");
                emitter.emit(TurnEventPayload::TurnCompleted { usage });
                Ok(answer)
            }
            Err(e) => {
                self.store.save(&conversation).await?;
                warn!(error = %e, "turn failed");
                emitter.emit(TurnEventPayload::TurnFailed { error: e.to_string() });
                Err(e)
            }
        }
    }

    async fn run_loop(
        &self,
        conversation: &Conversation,
        user: &Message,
        first_catalog: Option<ToolCatalog>,
        session_id: SessionId,
        emitter: &TurnEventEmitter,
    ) -> Result<(Message, Usage), KrutrimError> {
        let mut working: Vec<Message> = conversation.messages().to_vec();
        working.push(user.clone());

        let mut usage = Usage::default();
        let mut catalog = first_catalog;
        let mut state = ControllerState::AwaitingAgent;
        let mut steps = 0usize;

        loop {
            state = match state {
                ControllerState::AwaitingAgent => {
                    if steps == self.options.max_steps {
                        return Err(KrutrimError::LoopLimitExceeded {
                            max_steps: self.options.max_steps,
                        });
                    }
                    steps += 1;
                    if steps > 1 {
                        catalog = self.fetch_catalog().await?;
                    }

                    debug!(step = steps, "agent step");
                    emitter.emit(TurnEventPayload::AgentStepStarted { step: steps });
                    let reply = self
                        .step
                        .run(&self.options.system_prompt, &working, catalog.as_ref())
                        .await?;
                    if let Some(step_usage) = reply.usage() {
                        usage.merge(step_usage);
                    }

                    if reply.requests_tools() {
                        let calls = reply.tool_calls().to_vec();
                        working.push(reply);
                        ControllerState::AwaitingTools(calls)
                    } else {
                        ControllerState::Done(reply)
                    }
                }
                ControllerState::AwaitingTools(calls) => {
                    debug!(step = steps, calls = calls.len(), "dispatching tools");
                    let empty = ToolCatalog::new();
                    let results = self
                        .dispatch
                        .run_with_events(&calls, catalog.as_ref().unwrap_or(&empty), session_id, emitter)
                        .await;
                    working.extend(results);
                    ControllerState::AwaitingAgent
                }
                ControllerState::Done(answer) => {
                    // The answer reports the whole turn's token count.
                    return Ok((answer.with_usage(usage), usage));
                }
            };
        }
    }

    async fn fetch_catalog(&self) -> Result<Option<ToolCatalog>, KrutrimError> {
        match &self.tools {
            Some(provider) => provider.list_tools().await.map(Some),
            None => Ok(None),
        }
    }

    async fn record_failed_turn(&self, session_id: SessionId, user: Message) -> Result<(), KrutrimError> {
        let mut conversation = self
            .store
            .load(&session_id)
            .await?
            .map(|checkpoint| checkpoint.conversation)
            .unwrap_or_else(|| Conversation::new(session_id));
        conversation.push(user);
        self.store.save(&conversation).await?;
        Ok(())
    }

    async fn session_lock(&self, session_id: SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        Arc::clone(locks.entry(session_id).or_default())
    }

    /// Forget the session's lock once no other turn holds or awaits it.
    async fn release_session_lock(&self, session_id: SessionId) {
        let mut locks = self.session_locks.lock().await;
        if locks
            .get(&session_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&session_id);
        }
    }
}
