//! Mediator - runs the ask / confirm / execute / feed-back loop

use crate::operator::{is_affirmative, Operator};
use crate::prompts;
use shellmate_core::error::provider_failed;
use shellmate_core::protocol::{self, Reply};
use shellmate_core::{
    executor, ChatMessage, CompletionRequest, Error, Execution, LlmProvider, Result, Session,
    UsageTracker,
};
use std::num::NonZeroUsize;
use tracing::{debug, info, warn};

/// Configuration for the mediator
#[derive(Debug, Clone, Default)]
pub struct AgentConfig {
    /// Model override; the provider default is used when unset
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Stop a turn after this many resolved commands. `None` is unbounded.
    /// Never zero, so every turn reaches the model at least once.
    pub max_exchanges: Option<NonZeroUsize>,
    /// Log every exchange at info level instead of debug
    pub verbose: bool,
}

impl AgentConfig {
    fn request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        let mut request = CompletionRequest::new(messages);
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

/// How one pending command was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Executed(Execution),
    Denied,
    /// The tags were there but held no command
    Empty,
}

/// One pending command and what became of it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub command: String,
    pub outcome: Outcome,
}

impl Exchange {
    /// The message fed back to the model for this exchange
    pub fn feedback(&self) -> String {
        match &self.outcome {
            Outcome::Executed(execution) => format!("Command output:\n{}", execution.transcript()),
            Outcome::Denied => format!(
                "The user declined to run `{}`. It was not executed.",
                self.command
            ),
            Outcome::Empty => "The command tags were empty, so nothing was run.".to_string(),
        }
    }

    pub fn was_executed(&self) -> bool {
        matches!(self.outcome, Outcome::Executed(_))
    }
}

/// Why a turn ended
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnEnd {
    /// The model sent the sentinel
    #[default]
    Done,
    /// The model answered in plain text
    Reply(String),
    /// `max_exchanges` commands were resolved without the model finishing
    ExchangeLimit,
}

/// Summary of one turn
#[derive(Debug, Clone, Default)]
pub struct TurnReport {
    pub turn: usize,
    pub model_calls: usize,
    pub exchanges: Vec<Exchange>,
    pub end: TurnEnd,
}

/// The mediator orchestrator - owns the session and the provider
pub struct Mediator<P: LlmProvider> {
    provider: P,
    session: Session,
    config: AgentConfig,
    usage: UsageTracker,
}

impl<P: LlmProvider> Mediator<P> {
    pub fn new(provider: P, session: Session) -> Self {
        Self::with_config(provider, session, AgentConfig::default())
    }

    pub fn with_config(provider: P, session: Session, config: AgentConfig) -> Self {
        Self {
            provider,
            session,
            config,
            usage: UsageTracker::new(),
        }
    }

    /// Start a chat session in `cwd` with the standard system prompt
    pub fn chat_in(provider: P, cwd: impl Into<std::path::PathBuf>, config: AgentConfig) -> Self {
        let cwd = cwd.into();
        let session = Session::new(prompts::system_prompt(&cwd), cwd);
        Self::with_config(provider, session, config)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Run one user turn to completion.
    ///
    /// Provider failures are returned as errors; everything that happens
    /// locally (denials, failed `cd`, failing commands) stays in the
    /// transcript and the turn carries on. If the operator fails to answer
    /// a confirmation, the command is logged as not run before the error
    /// is returned, so the history never ends on an unresolved command.
    pub async fn turn<O: Operator>(&mut self, utterance: &str, operator: &mut O) -> Result<TurnReport> {
        let mut report = TurnReport {
            turn: self.session.begin_turn(),
            ..Default::default()
        };
        info!(turn = report.turn, "mediator: turn started");
        self.session.push(ChatMessage::user(utterance));

        loop {
            if let Some(max) = self.config.max_exchanges {
                if report.exchanges.len() >= max.get() {
                    warn!(turn = report.turn, max = max.get(), "mediator: exchange limit reached");
                    report.end = TurnEnd::ExchangeLimit;
                    return Ok(report);
                }
            }

            let reply = self.ask(self.session.history().to_vec()).await?;
            report.model_calls += 1;
            self.session.push(ChatMessage::assistant(reply.clone()));

            match Reply::parse(&reply) {
                Reply::Done => {
                    debug!(turn = report.turn, "mediator: sentinel received");
                    report.end = TurnEnd::Done;
                    return Ok(report);
                }
                Reply::Message(text) => {
                    operator.reply(&text);
                    report.end = TurnEnd::Reply(text);
                    return Ok(report);
                }
                Reply::Command(command) => {
                    let exchange = match self.resolve(command.clone(), operator).await {
                        Ok(exchange) => exchange,
                        Err(e) => {
                            self.session.push(ChatMessage::command(unanswered_notice(&command)));
                            return Err(e);
                        }
                    };
                    if self.config.verbose {
                        info!(turn = report.turn, command = %exchange.command, outcome = ?exchange.outcome, "mediator: exchange");
                    }
                    self.session.push(ChatMessage::command(exchange.feedback()));
                    report.exchanges.push(exchange);
                }
            }
        }
    }

    /// Single-shot mode: one request, no history.
    ///
    /// The command is the first tag pair if the model used one, otherwise
    /// the whole reply, normalized either way. `cd` still moves the session
    /// directory. Nothing is fed back to the model.
    pub async fn suggest<O: Operator>(&mut self, request: &str, operator: &mut O) -> Result<Exchange> {
        let prompt = prompts::suggest_prompt(self.session.cwd(), request);
        let reply = self.ask(vec![ChatMessage::user(prompt)]).await?;

        let command = match protocol::extract(&reply) {
            Some(candidate) => protocol::normalize(candidate),
            None => protocol::normalize(&reply),
        };
        self.resolve(command, operator).await
    }

    /// Confirm and run one pending command
    async fn resolve<O: Operator>(&mut self, command: String, operator: &mut O) -> Result<Exchange> {
        if command.is_empty() {
            debug!("mediator: empty command, nothing to confirm");
            return Ok(Exchange {
                command,
                outcome: Outcome::Empty,
            });
        }

        let answer = operator.review(&command)?;
        if !is_affirmative(&answer) {
            info!(%command, "mediator: command denied");
            return Ok(Exchange {
                command,
                outcome: Outcome::Denied,
            });
        }

        info!(%command, cwd = %self.session.cwd().display(), "mediator: running command");
        let execution = executor::execute(&command, &mut self.session).await;
        operator.output(&execution.transcript());

        Ok(Exchange {
            command,
            outcome: Outcome::Executed(execution),
        })
    }

    async fn ask(&mut self, messages: Vec<ChatMessage>) -> Result<String> {
        let request = self.config.request(messages);
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string());
        debug!(provider = self.provider.name(), %model, messages = request.messages.len(), "mediator: asking model");

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| provider_failed(e, self.provider.name(), &model).with_operation("mediator::ask"))?;

        self.usage.track(&response.model, &response.usage);

        response.content.ok_or_else(|| {
            Error::empty_response(self.provider.name())
                .with_context("model", model)
                .with_operation("mediator::ask")
        })
    }
}

fn unanswered_notice(command: &str) -> String {
    format!("The user did not answer the confirmation for `{}`. It was not executed.", command)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::operator::ScriptedOperator;
    use shellmate_core::{ErrorKind, Role, ScriptedProvider};
    use std::path::Path;
    use tempfile::tempdir;

    fn mediator(replies: &[&str], cwd: &Path) -> Mediator<ScriptedProvider> {
        Mediator::chat_in(
            ScriptedProvider::new(replies.iter().copied()),
            cwd.canonicalize().unwrap(),
            AgentConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_plain_reply_ends_turn_without_confirmation() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["There is nothing to run."], temp.path());
        let mut op = ScriptedOperator::new(Vec::<String>::new());

        let report = m.turn("hello", &mut op).await.unwrap();

        assert_eq!(report.end, TurnEnd::Reply("There is nothing to run.".into()));
        assert_eq!(report.model_calls, 1);
        assert!(op.reviewed.is_empty());
        assert_eq!(op.replies, vec!["There is nothing to run."]);
    }

    #[tokio::test]
    async fn test_sentinel_ends_turn_silently() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["done"], temp.path());
        let mut op = ScriptedOperator::new(Vec::<String>::new());

        let report = m.turn("nothing to do", &mut op).await.unwrap();

        assert_eq!(report.end, TurnEnd::Done);
        assert!(op.reviewed.is_empty());
        assert!(op.replies.is_empty());
    }

    #[tokio::test]
    async fn test_stdout_is_fed_back_labeled() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["<command>echo hello</command>", "DONE"], temp.path());
        let mut op = ScriptedOperator::new(["y"]);

        let report = m.turn("say hello", &mut op).await.unwrap();

        assert_eq!(report.model_calls, 2);
        assert_eq!(op.reviewed, vec!["echo hello"]);
        let fed_back = &m.provider().requests()[1].messages;
        let last = fed_back.last().unwrap();
        assert_eq!(last.role, Role::Command);
        assert_eq!(last.content, "Command output:\nSTDOUT:\nhello");
        assert!(!last.content.contains("STDERR"));
    }

    #[tokio::test]
    async fn test_denial_runs_nothing() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["<command>touch marker</command>", "DONE"], temp.path());
        let mut op = ScriptedOperator::new(["n"]);

        let report = m.turn("make a marker file", &mut op).await.unwrap();

        assert!(!temp.path().join("marker").exists());
        assert_eq!(report.exchanges[0].outcome, Outcome::Denied);
        assert!(op.outputs.is_empty());
        let last = m.provider().requests()[1].messages.last().cloned().unwrap();
        assert!(last.content.starts_with("The user declined to run `touch marker`"));
        assert!(!last.content.contains("Command output"));
    }

    #[tokio::test]
    async fn test_anything_but_y_is_denial() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["<command>touch marker</command>", "DONE"], temp.path());
        let mut op = ScriptedOperator::new(["yes"]);

        m.turn("make a marker file", &mut op).await.unwrap();
        assert!(!temp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_cd_persists_across_turns() {
        let temp = tempdir().unwrap();
        let b = temp.path().join("a").join("b");
        std::fs::create_dir_all(&b).unwrap();
        let a = temp.path().join("a").canonicalize().unwrap();

        let mut m = mediator(
            &["<command>cd ..</command>", "DONE", "<command>pwd -P</command>", "DONE"],
            &b,
        );
        let mut op = ScriptedOperator::new(["y", "y"]);

        let first = m.turn("go up one level", &mut op).await.unwrap();
        assert_eq!(
            first.exchanges[0].outcome,
            Outcome::Executed(Execution::ChangedDirectory(a.clone()))
        );
        assert_eq!(m.session().cwd(), a);

        let second = m.turn("where am I", &mut op).await.unwrap();
        assert_eq!(second.turn, 2);
        assert_eq!(op.outputs[1], format!("STDOUT:\n{}", a.display()));
    }

    #[tokio::test]
    async fn test_failed_cd_keeps_session_going() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["<command>cd missing</command>", "The folder does not exist."], temp.path());
        let mut op = ScriptedOperator::new(["y"]);

        let report = m.turn("enter missing", &mut op).await.unwrap();

        assert_eq!(report.end, TurnEnd::Reply("The folder does not exist.".into()));
        assert!(report.exchanges[0].feedback().contains("Directory not found: missing"));
    }

    #[tokio::test]
    async fn test_one_pending_command_at_a_time() {
        let temp = tempdir().unwrap();
        let mut m = mediator(
            &[
                "<command>echo one</command> and <command>echo two</command>",
                "<command>echo three</command>",
                "DONE",
            ],
            temp.path(),
        );
        let mut op = ScriptedOperator::new(["y", "y"]);

        let report = m.turn("count", &mut op).await.unwrap();

        // second pair in the first reply is ignored
        assert_eq!(op.reviewed, vec!["echo one", "echo three"]);
        assert_eq!(report.model_calls, op.reviewed.len() + 1);
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["<command>true</command>", "DONE", "ok"], temp.path());
        let mut op = ScriptedOperator::new(["y"]);

        m.turn("first", &mut op).await.unwrap();
        let after_first = m.session().history().to_vec();
        m.turn("second", &mut op).await.unwrap();

        let history = m.session().history();
        assert_eq!(&history[..after_first.len()], &after_first[..]);
        let roles: Vec<Role> = history.iter().map(|msg| msg.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Command,
                Role::Assistant,
                Role::User,
                Role::Assistant,
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_command_is_not_reviewed() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["<command>``</command>", "DONE"], temp.path());
        let mut op = ScriptedOperator::new(Vec::<String>::new());

        let report = m.turn("do it", &mut op).await.unwrap();

        assert!(op.reviewed.is_empty());
        assert_eq!(report.exchanges[0].outcome, Outcome::Empty);
    }

    #[tokio::test]
    async fn test_exchange_limit() {
        let temp = tempdir().unwrap();
        let config = AgentConfig {
            max_exchanges: NonZeroUsize::new(1),
            ..Default::default()
        };
        let mut m = Mediator::chat_in(
            ScriptedProvider::new(["<command>true</command>", "<command>true</command>"]),
            temp.path().canonicalize().unwrap(),
            config,
        );
        let mut op = ScriptedOperator::new(["y", "y"]);

        let report = m.turn("loop forever", &mut op).await.unwrap();

        assert_eq!(report.end, TurnEnd::ExchangeLimit);
        assert_eq!(m.provider().call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&[], temp.path());
        let mut op = ScriptedOperator::new(Vec::<String>::new());

        let err = m.turn("hello", &mut op).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InferenceFailed);
        assert_eq!(err.operation(), "mediator::ask");
    }

    #[tokio::test]
    async fn test_interrupted_review_propagates() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["<command>ls</command>"], temp.path());
        let mut op = ScriptedOperator::new(Vec::<String>::new());

        let err = m.turn("list", &mut op).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);

        // the pending command is closed off in the log
        let last = m.session().history().last().cloned().unwrap();
        assert_eq!(last.role, Role::Command);
        assert!(last.content.contains("`ls`"));
        assert!(last.content.contains("not executed"));
    }

    #[tokio::test]
    async fn test_smallest_limit_still_asks_model() {
        let temp = tempdir().unwrap();
        let config = AgentConfig {
            max_exchanges: NonZeroUsize::new(1),
            ..Default::default()
        };
        let mut m = Mediator::chat_in(
            ScriptedProvider::new(["hello there", "second"]),
            temp.path().canonicalize().unwrap(),
            config,
        );
        let mut op = ScriptedOperator::new(Vec::<String>::new());

        let first = m.turn("hi", &mut op).await.unwrap();
        let second = m.turn("again", &mut op).await.unwrap();

        assert_eq!(first.end, TurnEnd::Reply("hello there".into()));
        assert_eq!(second.end, TurnEnd::Reply("second".into()));
        assert_eq!(m.provider().call_count(), 2);
        assert_eq!(op.replies, vec!["hello there", "second"]);
    }

    #[tokio::test]
    async fn test_config_reaches_request() {
        let temp = tempdir().unwrap();
        let config = AgentConfig {
            model: Some("gemini-1.5-flash".into()),
            temperature: Some(0.0),
            ..Default::default()
        };
        let mut m = Mediator::chat_in(ScriptedProvider::new(["DONE"]), temp.path(), config);
        let mut op = ScriptedOperator::new(Vec::<String>::new());

        m.turn("hi", &mut op).await.unwrap();

        let request = &m.provider().requests()[0];
        assert_eq!(request.model.as_deref(), Some("gemini-1.5-flash"));
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_suggest_prefers_tag_pair() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["Sure: <command>`echo tagged`</command> should work"], temp.path());
        let mut op = ScriptedOperator::new(["y"]);

        let exchange = m.suggest("say tagged", &mut op).await.unwrap();

        assert_eq!(exchange.command, "echo tagged");
        assert_eq!(op.outputs, vec!["STDOUT:\ntagged"]);
    }

    #[tokio::test]
    async fn test_suggest_runs_whole_reply() {
        let temp = tempdir().unwrap();
        let mut m = mediator(&["Command: ```sh\necho hi\n```"], temp.path());
        let mut op = ScriptedOperator::new(["Y"]);

        let exchange = m.suggest("greet me", &mut op).await.unwrap();

        assert_eq!(exchange.command, "echo hi");
        assert!(exchange.was_executed());
        assert_eq!(op.outputs, vec!["STDOUT:\nhi"]);
        // suggest mode keeps no history
        assert_eq!(m.session().history().len(), 1);
        let sent = &m.provider().requests()[0].messages;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].content.contains("User request: greet me"));
    }
}
