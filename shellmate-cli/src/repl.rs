//! Interactive REPL for chat and suggest modes

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use shellmate_agent::{Mediator, Operator, Outcome, TurnEnd};
use shellmate_core::{Error, ErrorKind, LlmProvider, Result, Role, TokenSource};
use tracing::debug;

const PROMPT: &str = ">>> ";
const CONFIRM_PROMPT: &str = "Run this command? (y/n): ";

/// Which mediator entry point each line goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chat,
    Suggest,
}

/// The terminal side of the loop: one line editor for both prompts
pub struct Terminal {
    editor: DefaultEditor,
}

impl Terminal {
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new().map_err(|e| {
            Error::new(ErrorKind::IoFailed, format!("failed to initialize readline: {}", e))
                .with_operation("terminal::new")
        })?;
        Ok(Self { editor })
    }

    fn read_line(&mut self, prompt: &str) -> std::result::Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }
}

/// Turn what the editor returned at the confirmation prompt into an answer.
///
/// Ctrl-C is a no. Ctrl-D (closed input) is an `Interrupted` error.
fn confirmation_answer(line: std::result::Result<String, ReadlineError>) -> Result<String> {
    match line {
        Ok(answer) => Ok(answer),
        Err(ReadlineError::Interrupted) => Ok(String::new()),
        Err(ReadlineError::Eof) => {
            Err(Error::interrupted("input closed during confirmation").with_operation("terminal::review"))
        }
        Err(e) => Err(Error::new(ErrorKind::IoFailed, format!("readline error: {}", e))
            .with_operation("terminal::review")),
    }
}

impl Operator for Terminal {
    fn review(&mut self, command: &str) -> Result<String> {
        println!("{}", "Proposed command:".bright_cyan());
        println!("  {}", command.yellow());
        let line = self.read_line(CONFIRM_PROMPT);
        if let Err(ReadlineError::Interrupted) = &line {
            println!("^C");
        }
        confirmation_answer(line)
    }

    fn reply(&mut self, text: &str) {
        println!("{}", text);
    }

    fn output(&mut self, text: &str) {
        println!("{}", text.dimmed());
    }
}

/// Result of handling a slash command
enum SlashResult {
    Continue,
    Unknown,
}

/// What a line of input means before it reaches the model
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    Slash(&'a str),
    Utterance(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        Input::Empty
    } else if line.eq_ignore_ascii_case("exit") {
        Input::Quit
    } else if line.starts_with('/') {
        Input::Slash(line)
    } else {
        Input::Utterance(line)
    }
}

pub struct ReplSession<P: LlmProvider> {
    mediator: Mediator<P>,
    terminal: Terminal,
    mode: Mode,
    verbose: bool,
}

impl<P: LlmProvider> ReplSession<P> {
    pub fn new(mediator: Mediator<P>, mode: Mode, verbose: bool) -> Result<Self> {
        Ok(Self {
            mediator,
            terminal: Terminal::new()?,
            mode,
            verbose,
        })
    }

    /// Run until `exit` or Ctrl-D. Provider errors end the loop.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            let line = match self.terminal.read_line(PROMPT) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    return Err(Error::new(ErrorKind::IoFailed, format!("readline error: {}", e))
                        .with_operation("repl::run"));
                }
            };

            match classify(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Slash(command) => {
                    let _ = self.terminal.editor.add_history_entry(command);
                    if let SlashResult::Unknown = self.handle_slash_command(command).await {
                        println!("{} Unknown command: {}", "?".yellow(), command);
                        println!("Type {} for available commands", "/help".yellow());
                    }
                }
                Input::Utterance(text) => {
                    let _ = self.terminal.editor.add_history_entry(text);
                    match self.process(text).await {
                        Ok(()) => {}
                        // the user closed input at a confirmation prompt
                        Err(e) if e.kind() == ErrorKind::Interrupted => {
                            debug!(error = %e, "repl: interrupted");
                            println!();
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    async fn process(&mut self, text: &str) -> Result<()> {
        match self.mode {
            Mode::Chat => {
                let report = self.mediator.turn(text, &mut self.terminal).await?;
                if report.end == TurnEnd::ExchangeLimit {
                    println!(
                        "{}",
                        format!("[stopped after {} commands this turn]", report.exchanges.len()).yellow()
                    );
                }
                if self.verbose {
                    println!(
                        "{}",
                        format!(
                            "[turn {}: {} model calls, {} commands]",
                            report.turn,
                            report.model_calls,
                            report.exchanges.len()
                        )
                        .dimmed()
                    );
                }
            }
            Mode::Suggest => {
                let exchange = self.mediator.suggest(text, &mut self.terminal).await?;
                match exchange.outcome {
                    Outcome::Denied => println!("{}", "Command not run.".dimmed()),
                    Outcome::Empty => println!("{}", "The model did not suggest a command.".yellow()),
                    Outcome::Executed(_) => {}
                }
            }
        }
        Ok(())
    }

    /// Model calls and token usage for the whole session
    pub fn print_usage(&self) {
        let usage = self.mediator.usage();
        println!();
        println!("{}", "Usage:".bright_cyan());
        println!("  {:14} {}", "calls", usage.total_calls);
        println!("  {:14} {}", "prompt", usage.total_prompt_tokens);
        println!("  {:14} {}", "completion", usage.total_completion_tokens);
        for (model, model_usage) in &usage.by_model {
            println!("  {:14} {} tokens", model, model_usage.prompt_tokens + model_usage.completion_tokens);
        }
    }

    fn print_welcome(&self) {
        let title = match self.mode {
            Mode::Chat => "shellmate chat",
            Mode::Suggest => "shellmate suggest",
        };
        println!();
        println!("{}", title.bright_cyan().bold());
        println!(
            "Provider: {} ({})",
            self.mediator.provider().name(),
            self.mediator
                .config()
                .model
                .as_deref()
                .unwrap_or_else(|| self.mediator.provider().default_model())
        );
        println!("Working directory: {}", self.mediator.session().cwd().display());
        println!("Type {} for help, {} to quit", "/help".yellow(), "exit".yellow());
        println!();
    }

    async fn handle_slash_command(&mut self, input: &str) -> SlashResult {
        let cmd = input.split_whitespace().next().unwrap_or("");

        match cmd {
            "/help" | "/h" => self.print_help(),
            "/history" => self.print_history(),
            "/cwd" => println!("{}", self.mediator.session().cwd().display()),
            "/tokens" => {
                let estimate = self
                    .mediator
                    .session()
                    .estimate_tokens(self.mediator.provider())
                    .await;
                println!("{}", describe_tokens(estimate.tokens, estimate.source));
            }
            _ => return SlashResult::Unknown,
        }
        SlashResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Available Commands:".bright_cyan());
        println!("  {:14} Show this help", "/help".yellow());
        println!("  {:14} Show conversation history", "/history".yellow());
        println!("  {:14} Show the working directory", "/cwd".yellow());
        println!("  {:14} Estimate tokens in the history", "/tokens".yellow());
        println!("  {:14} Quit (or Ctrl-D)", "exit".yellow());
        println!();
    }

    fn print_history(&self) {
        let history = self.mediator.session().history();
        if history.len() <= 1 {
            println!("{}", "No conversation history.".dimmed());
            return;
        }

        println!();
        println!("{}", "Conversation History:".bright_cyan());
        // skip the system context
        for (i, msg) in history.iter().enumerate().skip(1) {
            let role = match msg.role {
                Role::System => "System".normal(),
                Role::User => "User".bright_green(),
                Role::Assistant => "Assistant".bright_blue(),
                Role::Command => "Command".yellow(),
            };
            println!("  {:3}. {}: {}", i, role, msg.preview(60).replace('\n', " "));
        }
        println!();
    }
}

pub fn describe_tokens(tokens: usize, source: TokenSource) -> String {
    match source {
        TokenSource::Provider => format!("{} tokens", tokens),
        TokenSource::Heuristic => format!("~{} tokens (estimated from character count)", tokens),
    }
}
