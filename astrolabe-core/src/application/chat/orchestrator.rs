use super::error::ChatError;
use super::input::InputSource;
use super::prompt::{ServerInstructions, compose_system_prompt};
use crate::application::connection::ServerConnection;
use crate::application::interpreter::{Interpretation, ResponseInterpreter};
use crate::application::tooling::{CollisionPolicy, ToolRegistry};
use crate::constants::EXIT_KEYWORDS;
use crate::infrastructure::model::GenerationBackend;
use crate::types::{ChatMessage, GenerationParams, MessageRole};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

const USER_PROMPT: &str = "Você: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    Starting,
    SystemPromptComposed,
    AwaitingInput,
    AwaitingGeneration,
    AwaitingToolResult,
    AwaitingSynthesis,
    Ending,
}

/// Outcome of one operator turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnReply {
    /// Generation produced nothing; the user turn was dropped.
    NoResponse,
    /// Natural-language answer.
    Answer(String),
    /// A tool ran and the model summarized its result.
    ToolAnswer { dispatch: String, answer: String },
    /// A tool ran but the synthesis produced nothing.
    ToolFallback { dispatch: String },
}

/// Owns the conversation, the tool registry and the connections for one
/// chat session.
pub struct ChatOrchestrator {
    connections: Vec<Arc<ServerConnection>>,
    backend: GenerationBackend,
    params: GenerationParams,
    domain_prompt: Option<String>,
    policy: CollisionPolicy,
    history: Vec<ChatMessage>,
    registry: ToolRegistry,
    state: ChatState,
}

impl ChatOrchestrator {
    pub fn new(
        connections: Vec<Arc<ServerConnection>>,
        backend: GenerationBackend,
        params: GenerationParams,
    ) -> Self {
        Self {
            connections,
            backend,
            params,
            domain_prompt: None,
            policy: CollisionPolicy::default(),
            history: Vec::new(),
            registry: ToolRegistry::default(),
            state: ChatState::Starting,
        }
    }

    pub fn with_domain_prompt(mut self, prompt: Option<String>) -> Self {
        self.domain_prompt = prompt;
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn state(&self) -> ChatState {
        self.state
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Initialize every connection in order, build the registry and add the
    /// system message. On failure every attempted connection is cleaned up
    /// in reverse order before the error is returned.
    pub async fn start(&mut self) -> Result<(), ChatError> {
        self.state = ChatState::Starting;
        for (index, connection) in self.connections.iter().enumerate() {
            if let Err(source) = connection.initialize().await {
                error!(
                    server = connection.name(),
                    %source,
                    "Failed to initialize server, aborting chat session"
                );
                for attempted in self.connections[..=index].iter().rev() {
                    attempted.cleanup().await;
                }
                self.state = ChatState::Ending;
                return Err(ChatError::Startup {
                    server: connection.name().to_string(),
                    source,
                });
            }
        }

        self.registry = match ToolRegistry::build(&self.connections, self.policy).await {
            Ok(registry) => registry,
            Err(err) => {
                self.shutdown().await;
                return Err(err.into());
            }
        };

        let mut notes: Vec<ServerInstructions> = Vec::new();
        for connection in &self.connections {
            if let Some(text) = connection.instructions().await {
                notes.push((connection.name().to_string(), text));
            }
        }
        let prompt = compose_system_prompt(
            self.domain_prompt.as_deref(),
            &self.registry.describe(),
            &notes,
        );
        self.history.clear();
        self.history.push(ChatMessage::model(prompt));
        self.state = ChatState::SystemPromptComposed;
        info!(tools = self.registry.len(), "System message added to chat history");

        self.state = ChatState::AwaitingInput;
        Ok(())
    }

    /// Run the whole session: start, read-eval loop, shutdown. Connections
    /// are always cleaned up, whatever way the session ends.
    pub async fn run<I, W>(&mut self, input: &mut I, output: &mut W) -> Result<(), ChatError>
    where
        I: InputSource + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        let outcome = self.run_loop(input, output).await;
        self.shutdown().await;
        outcome
    }

    async fn run_loop<I, W>(&mut self, input: &mut I, output: &mut W) -> Result<(), ChatError>
    where
        I: InputSource + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        self.start().await?;

        loop {
            output.write_all(USER_PROMPT.as_bytes()).await?;
            output.flush().await?;

            let line = match input.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("End of input, leaving chat session");
                    break;
                }
                Err(err) => {
                    warn!(%err, "Failed to read input, leaving chat session");
                    break;
                }
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit_keyword(line) {
                info!("Leaving chat session");
                break;
            }

            match AssertUnwindSafe(self.converse(line, output))
                .catch_unwind()
                .await
            {
                Ok(Ok(reply)) => debug!(?reply, "Turn finished"),
                Ok(Err(err)) => self.recover(&err.to_string(), output).await,
                Err(panic) => self.recover(&panic_message(panic.as_ref()), output).await,
            }
        }
        Ok(())
    }

    /// One turn with operator-facing progress markers written to `output`.
    async fn converse<W>(&mut self, line: &str, output: &mut W) -> Result<TurnReply, ChatError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        output.write_all("\n🧠 A pensar...\n".as_bytes()).await?;
        output.flush().await?;

        let reply = self.process_turn_with(line, Some(&mut *output)).await?;
        let rendered = match &reply {
            TurnReply::NoResponse => None,
            TurnReply::Answer(text) => Some(format!("\n🤖 Assistente: {text}\n\n")),
            TurnReply::ToolAnswer { answer, .. } => {
                Some(format!("\n✨ Resposta Final do Assistente: {answer}\n\n"))
            }
            TurnReply::ToolFallback { dispatch } => {
                Some(format!("\nResultado da Ferramenta: {dispatch}\n\n"))
            }
        };
        if let Some(text) = rendered {
            output.write_all(text.as_bytes()).await?;
            output.flush().await?;
        }
        Ok(reply)
    }

    /// Process one user line without operator output.
    pub async fn process_turn(&mut self, line: &str) -> TurnReply {
        let outcome = AssertUnwindSafe(self.process_turn_with::<tokio::io::Sink>(line, None))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => {
                self.drop_trailing_user_turn();
                error!(%err, "Unhandled error in chat turn");
                self.state = ChatState::AwaitingInput;
                TurnReply::NoResponse
            }
            Err(panic) => {
                self.drop_trailing_user_turn();
                error!(panic = %panic_message(panic.as_ref()), "Chat turn panicked");
                self.state = ChatState::AwaitingInput;
                TurnReply::NoResponse
            }
        }
    }

    async fn process_turn_with<W>(
        &mut self,
        line: &str,
        mut output: Option<&mut W>,
    ) -> Result<TurnReply, ChatError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.history.push(ChatMessage::user(line));
        self.state = ChatState::AwaitingGeneration;

        let raw = self
            .backend
            .generate(&self.history, &self.params)
            .await
            .unwrap_or_default();

        let dispatch = match ResponseInterpreter::parse(&raw) {
            Interpretation::Empty => {
                error!("Generation returned no response, dropping the user turn");
                self.drop_trailing_user_turn();
                self.state = ChatState::AwaitingInput;
                return Ok(TurnReply::NoResponse);
            }
            Interpretation::Text(text) => {
                info!(response = %text, "Assistant answered in natural language");
                self.history.push(ChatMessage::model(text.clone()));
                self.state = ChatState::AwaitingInput;
                return Ok(TurnReply::Answer(text));
            }
            Interpretation::ToolCall(call) => {
                info!(tool = %call.name, arguments = %call.arguments, "Model requested a tool");
                self.state = ChatState::AwaitingToolResult;
                self.registry.dispatch(&call.name, call.arguments).await
            }
            Interpretation::Fault(description) => {
                error!(%description, "Unexpected error while interpreting the model response");
                Interpretation::fault_message(&description)
            }
        };

        self.history.push(ChatMessage::model(raw));
        self.history.push(ChatMessage::user(dispatch.clone()));

        self.state = ChatState::AwaitingSynthesis;
        if let Some(output) = output.as_mut() {
            output
                .write_all("\n✨ A obter a resposta final...\n".as_bytes())
                .await?;
            output.flush().await?;
        }

        let synthesis = self
            .backend
            .generate(&self.history, &self.params)
            .await
            .filter(|text| !text.trim().is_empty());
        let reply = match synthesis {
            Some(answer) => {
                info!(response = %answer, "Final assistant answer");
                self.history.push(ChatMessage::model(answer.clone()));
                TurnReply::ToolAnswer { dispatch, answer }
            }
            None => {
                warn!("Final generation after tool execution returned nothing");
                self.history
                    .push(ChatMessage::model(format!("Resultado da Ferramenta: {dispatch}")));
                TurnReply::ToolFallback { dispatch }
            }
        };
        self.state = ChatState::AwaitingInput;
        Ok(reply)
    }

    async fn recover<W>(&mut self, description: &str, output: &mut W)
    where
        W: AsyncWrite + Unpin + Send,
    {
        error!(error = description, "Unhandled error in chat loop");
        self.drop_trailing_user_turn();
        self.state = ChatState::AwaitingInput;
        let notice = format!("\nOcorreu um erro: {description}. Por favor, tente novamente.\n\n");
        if let Err(err) = output.write_all(notice.as_bytes()).await {
            warn!(%err, "Failed to report turn error to the operator");
        }
    }

    fn drop_trailing_user_turn(&mut self) {
        if self
            .history
            .last()
            .is_some_and(|message| message.role == MessageRole::User)
        {
            self.history.pop();
        }
    }

    /// Clean up every connection in reverse registration order.
    pub async fn shutdown(&mut self) {
        self.state = ChatState::Ending;
        info!("Starting server cleanup");
        for connection in self.connections.iter().rev() {
            connection.cleanup().await;
        }
        info!("All servers cleaned up");
    }
}

fn is_exit_keyword(line: &str) -> bool {
    EXIT_KEYWORDS
        .iter()
        .any(|keyword| line.eq_ignore_ascii_case(keyword))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic".to_string()
    }
}
