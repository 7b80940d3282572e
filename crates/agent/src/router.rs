//! Command routing.
//!
//! Every inbound text is classified into an [`Intent`], and each intent maps
//! to a reply plus a [`MemoryUpdate`]. Only `FreeForm` input reaches the
//! completion service.

use std::sync::Arc;

use chatrelay_config::AppConfig;
use chatrelay_core::completion::{CompletionClient, CompletionRequest, GenerationParams};
use chatrelay_core::message::Turn;
use tracing::{debug, warn};

use crate::context;

pub const GREETING: &str = "Hi! I am a coding helper bot. Send me any programming or debugging question, code, stacktrace, or ask for a patch. Use /help for tips.";

pub const HELP_TEXT: &str = "Coding Helper Bot Usage:\n- Send errors, stack traces, code for help.\n- For reviews, send code snippets.\n- For patches, say 'Suggest a patch:' and your code.\n- /forget clears memory, /memory shows turns.";

pub const RESET_REPLY: &str = "Context cleared! Start a new coding topic.";

pub const TOO_LONG_REPLY: &str = "Message too long, please shorten your code or question.";

/// What an inbound text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Greet,
    Help,
    Reset,
    Status,
    TooLong,
    FreeForm(String),
    Empty,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Greet => "greet",
            Intent::Help => "help",
            Intent::Reset => "reset",
            Intent::Status => "status",
            Intent::TooLong => "too_long",
            Intent::FreeForm(_) => "free_form",
            Intent::Empty => "empty",
        }
    }
}

/// How conversation memory changes after a routed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryUpdate {
    /// Append the user input and the reply, then trim.
    Append { user: String, assistant: String },
    /// Replace memory with nothing.
    Clear,
}

/// Reply text plus the memory change it implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    pub reply: String,
    pub update: MemoryUpdate,
}

/// Relay policy, built once from configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub system_directive: String,
    pub max_input_chars: usize,
    pub max_turns: usize,
    pub max_history_chars: usize,
    pub params: GenerationParams,
}

impl RelaySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            system_directive: config.bot.system_prompt.clone(),
            max_input_chars: config.bot.max_input_chars,
            max_turns: config.memory.max_turns,
            max_history_chars: config.memory.max_history_chars,
            params: config.completion.generation_params(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Parse `/<name>` or `/<name>@<botname>` into the lower-cased name.
fn command_name(text: &str) -> Option<String> {
    let token = text.strip_prefix('/')?;
    let (name, bot) = match token.split_once('@') {
        Some((name, bot)) => (name, Some(bot)),
        None => (token, None),
    };

    if let Some(bot) = bot {
        let valid = !bot.is_empty() && bot.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return None;
        }
    }
    Some(name.to_ascii_lowercase())
}

/// Classify an inbound text. Commands are recognised before the length limit.
pub fn classify(text: &str, max_input_chars: usize) -> Intent {
    let text = text.trim();
    if text.is_empty() {
        return Intent::Empty;
    }

    if let Some(name) = command_name(text) {
        match name.as_str() {
            "start" => return Intent::Greet,
            "help" => return Intent::Help,
            "forget" | "reset" => return Intent::Reset,
            "memory" | "status" => return Intent::Status,
            _ => {}
        }
    }

    if text.chars().count() > max_input_chars {
        return Intent::TooLong;
    }
    Intent::FreeForm(text.to_string())
}

/// Turns inbound text into replies and memory updates.
pub struct CommandRouter {
    completion: Arc<dyn CompletionClient>,
    settings: RelaySettings,
}

impl CommandRouter {
    pub fn new(completion: Arc<dyn CompletionClient>, settings: RelaySettings) -> Self {
        Self {
            completion,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Route one inbound text against the stored history.
    ///
    /// Returns `None` for blank input. Completion failures become a reply,
    /// never an error.
    pub async fn route(&self, text: &str, history: &[Turn]) -> Option<Routed> {
        let intent = classify(text, self.settings.max_input_chars);
        let user = text.trim().to_string();
        debug!(intent = intent.label(), "Classified input");

        let reply = match intent {
            Intent::Empty => return None,
            Intent::Reset => {
                return Some(Routed {
                    reply: RESET_REPLY.to_string(),
                    update: MemoryUpdate::Clear,
                });
            }
            Intent::Greet => GREETING.to_string(),
            Intent::Help => HELP_TEXT.to_string(),
            Intent::Status => format!("Memory contains {} recent turns.", history.len()),
            Intent::TooLong => TOO_LONG_REPLY.to_string(),
            Intent::FreeForm(input) => self.ask(history, &input).await,
        };

        Some(Routed {
            reply: reply.clone(),
            update: MemoryUpdate::Append {
                user,
                assistant: reply,
            },
        })
    }

    async fn ask(&self, history: &[Turn], input: &str) -> String {
        let request = CompletionRequest {
            params: self.settings.params.clone(),
            messages: context::build(&self.settings.system_directive, history, input),
        };

        match self.completion.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!(
                    client = %self.completion.name(),
                    transport = e.is_transport(),
                    error = %e,
                    "Completion failed"
                );
                format!("Sorry, model error: {e}\nRetry or simplify your question.")
            }
        }
    }

    /// Apply a memory update to the loaded history.
    pub fn apply(&self, mut history: Vec<Turn>, update: MemoryUpdate) -> Vec<Turn> {
        match update {
            MemoryUpdate::Clear => Vec::new(),
            MemoryUpdate::Append { user, assistant } => {
                history.push(Turn::user(user));
                history.push(Turn::assistant(assistant));
                context::trim(
                    &history,
                    self.settings.max_turns,
                    self.settings.max_history_chars,
                )
            }
        }
    }
}
