//! One conversation turn: model call, tool calls, model call, ...

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ChatSettings;
use crate::logging::SharedLogger;
use crate::providers::{ChatModel, ChatRequest, ProviderError};
use crate::tools::ToolExecutor;
use crate::types::{ChatMessage, ContentPart, MessageRole};

/// A failed model call; aborts the turn
#[derive(Error, Debug)]
pub enum TurnError {
    #[error("chat model call failed in round {round}: {source}")]
    Model {
        round: usize,
        #[source]
        source: ProviderError,
    },
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model answered without calling a tool
    Completed,
    /// The round cap was reached while the model was still calling tools
    RoundLimit,
}

/// Debug record of one tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub ok: bool,
    /// Tool content, or the error text on failure
    pub output: String,
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Text of the last model response
    pub final_text: String,
    /// History plus every message appended during the turn
    pub transcript: Vec<ChatMessage>,
    /// Number of model calls made
    pub rounds: usize,
    pub stop: StopReason,
    pub trace: Vec<ToolInvocation>,
}

/// Drives the bounded tool-use cycle against a chat model
pub struct ToolLoop {
    model: Arc<dyn ChatModel>,
    executor: Arc<dyn ToolExecutor>,
    settings: ChatSettings,
    logger: SharedLogger,
}

impl ToolLoop {
    pub fn new(
        model: Arc<dyn ChatModel>,
        executor: Arc<dyn ToolExecutor>,
        settings: ChatSettings,
        logger: SharedLogger,
    ) -> Self {
        Self {
            model,
            executor,
            settings,
            logger,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Run one turn starting from `history`
    ///
    /// Tool calls within a round run sequentially in the order the model
    /// emitted them. Tool failures are reported back to the model as error
    /// results; only a failed model call ends the turn with an error.
    pub async fn run_turn(&self, history: Vec<ChatMessage>) -> Result<TurnOutcome, TurnError> {
        let max_rounds = self.settings.max_rounds.max(1);
        let mut transcript = history;
        let mut trace = Vec::new();
        let mut round = 0;

        loop {
            round += 1;
            let request = ChatRequest {
                model: self.settings.model.clone(),
                system: self.settings.system_prompt.clone(),
                messages: transcript.clone(),
                tools: self.executor.catalog(),
                max_tokens: self.settings.max_tokens,
            };
            self.logger.debug(&format!(
                "Round {}: sending {} messages and {} tools to {}",
                round,
                request.messages.len(),
                request.tools.len(),
                self.model.name()
            ));

            let response = self
                .model
                .complete(request)
                .await
                .map_err(|source| TurnError::Model { round, source })?;

            let content = self.normalize_parts(response.content);
            let final_text = text_of(&content);
            let calls: Vec<(String, String, Value)> = content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::ToolUse {
                        id,
                        name: Some(name),
                        input,
                    } => Some((id.clone(), name.clone(), input.clone())),
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                if !content.is_empty() {
                    transcript.push(ChatMessage::with_parts(MessageRole::Assistant, content));
                }
                return Ok(TurnOutcome {
                    final_text,
                    transcript,
                    rounds: round,
                    stop: StopReason::Completed,
                    trace,
                });
            }

            // The model never sees results from the last allowed round
            let capped = round >= max_rounds;
            let mut results = Vec::with_capacity(calls.len());
            for (id, name, arguments) in calls {
                if capped {
                    let message = format!("Error: not executed, round limit of {} reached", max_rounds);
                    results.push(ContentPart::tool_error(id.clone(), message.clone()));
                    trace.push(ToolInvocation {
                        id,
                        name,
                        arguments,
                        ok: false,
                        output: message,
                    });
                    continue;
                }

                self.logger.info(&format!("Executing tool call {} ({})", name, id));
                let invocation = match self.executor.execute(&name, arguments.clone()).await {
                    Ok(output) => {
                        results.push(ContentPart::tool_result(id.clone(), output.content.clone()));
                        ToolInvocation {
                            id,
                            name,
                            arguments,
                            ok: true,
                            output: output.content,
                        }
                    }
                    Err(err) => {
                        let message = format!("Error: {}", err);
                        self.logger.warn(&format!("Tool {} failed: {}", name, err));
                        results.push(ContentPart::tool_error(id.clone(), message.clone()));
                        ToolInvocation {
                            id,
                            name,
                            arguments,
                            ok: false,
                            output: message,
                        }
                    }
                };
                trace.push(invocation);
            }

            transcript.push(ChatMessage::with_parts(MessageRole::Assistant, content));
            transcript.push(ChatMessage::with_parts(MessageRole::User, results));

            if capped {
                self.logger.warn(&format!(
                    "Stopping after {} rounds without running the last round's tool calls",
                    round
                ));
                return Ok(TurnOutcome {
                    final_text,
                    transcript,
                    rounds: round,
                    stop: StopReason::RoundLimit,
                    trace,
                });
            }
        }
    }

    /// Make model content safe to execute and to echo back
    ///
    /// A tool-use item without a usable name becomes a text item and is
    /// never dispatched. Missing ids are generated, null input becomes an
    /// empty object and unknown item types are dropped.
    fn normalize_parts(&self, content: Vec<ContentPart>) -> Vec<ContentPart> {
        content
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::ToolUse { id, name, input } => {
                    let id = if id.trim().is_empty() {
                        format!("toolu_{}", uuid::Uuid::new_v4().simple())
                    } else {
                        id
                    };
                    match name.filter(|n| !n.trim().is_empty()) {
                        Some(name) => Some(ContentPart::ToolUse {
                            id,
                            name: Some(name),
                            input: match input {
                                Value::Null => Value::Object(Map::new()),
                                other => other,
                            },
                        }),
                        None => {
                            self.logger.warn(&format!("Skipping tool call {} with no name", id));
                            Some(ContentPart::text(format!(
                                "[Skipped tool call {}: the request did not name a tool]",
                                id
                            )))
                        }
                    }
                }
                ContentPart::Unknown => {
                    self.logger.debug("Dropping content item of unknown type");
                    None
                }
                other => Some(other),
            })
            .collect()
    }
}

fn text_of(content: &[ContentPart]) -> String {
    content
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}
