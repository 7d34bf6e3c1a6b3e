use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::mpsc;

use chat_llm::LLMProvider;
use chat_loop::{run_round_trip, ChatEvent, ChatLoopConfig, ChatSession, UserInput};
use chat_state::{ImageAttachment, Role, Turn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Message(String),
    Attach(PathBuf),
    SendAttachments,
    History,
    Context,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if !line.starts_with('/') {
        return ReplCommand::Message(line.to_string());
    }

    let (command, argument) = match line.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "/attach" if !argument.is_empty() => ReplCommand::Attach(PathBuf::from(argument)),
        "/send" => ReplCommand::SendAttachments,
        "/history" => ReplCommand::History,
        "/context" => ReplCommand::Context,
        "/help" => ReplCommand::Help,
        "/quit" | "/exit" => ReplCommand::Quit,
        _ => ReplCommand::Unknown(line.to_string()),
    }
}

pub struct Repl {
    session: ChatSession,
    llm: Arc<dyn LLMProvider>,
    config: ChatLoopConfig,
    pending: Vec<ImageAttachment>,
}

impl Repl {
    pub fn new(session: ChatSession, llm: Arc<dyn LLMProvider>, config: ChatLoopConfig) -> Self {
        Self {
            session,
            llm,
            config,
            pending: Vec::new(),
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("{}", "Multimodal Chat".cyan().bold());
        println!(
            "{}",
            format!(
                "Model: {}  Input budget: {} tokens",
                self.config
                    .model_name
                    .as_deref()
                    .unwrap_or_else(|| self.llm.default_model()),
                self.session.budget().available_input_tokens()
            )
            .dimmed()
        );
        println!("{}", "Type /help for commands, /quit to leave".dimmed());
        println!();

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();

        loop {
            print!("{} ", "You:".cyan().bold());
            io::stdout().flush()?;

            let Some(line) = lines.next() else {
                println!();
                break;
            };

            match parse_command(&line?) {
                ReplCommand::Quit => break,
                ReplCommand::Empty => continue,
                ReplCommand::Message(text) => self.send(Some(text)).await,
                ReplCommand::SendAttachments => {
                    if self.pending.is_empty() {
                        println!("{}", "No attachments queued".yellow());
                        continue;
                    }
                    self.send(None).await;
                }
                ReplCommand::Attach(path) => self.attach(path),
                ReplCommand::History => self.print_history(),
                ReplCommand::Context => self.print_context(),
                ReplCommand::Help => print_help(),
                ReplCommand::Unknown(command) => {
                    println!("{}", format!("Unknown command: {command}").red());
                }
            }
        }

        println!("{}", "Goodbye!".cyan());
        Ok(())
    }

    fn attach(&mut self, path: PathBuf) {
        match self.session.load_attachment(&path) {
            Ok(image) => {
                println!(
                    "{}",
                    format!(
                        "Queued {} ({}, {} bytes) for the next message",
                        image.name(),
                        image.format(),
                        image.size()
                    )
                    .green()
                );
                self.pending.push(image);
            }
            Err(e) => println!("{}", format!("Error: {e}").red()),
        }
    }

    /// Submit `text` with the queued images. The queue is only cleared once
    /// the round trip succeeds, so a failed send can be retried as is.
    async fn send(&mut self, text: Option<String>) {
        let input = UserInput {
            text,
            images: self.pending.clone(),
        };
        let (event_tx, mut event_rx) = mpsc::channel(64);

        println!("{}", "Assistant:".green().bold());
        let printer = async {
            while let Some(event) = event_rx.recv().await {
                match event {
                    ChatEvent::Token { content } => {
                        print!("{content}");
                        let _ = io::stdout().flush();
                    }
                    ChatEvent::ContextPrepared { usage } if usage.truncation_occurred() => {
                        tracing::debug!(
                            "Sending {} turn(s), {} older turn(s) left out",
                            usage.turns_sent,
                            usage.turns_dropped
                        );
                    }
                    ChatEvent::Complete { usage } => {
                        println!();
                        println!(
                            "{}",
                            format!(
                                "[{} prompt + {} completion = {} tokens]",
                                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
                            )
                            .dimmed()
                        );
                    }
                    _ => {}
                }
            }
        };

        let round_trip = run_round_trip(
            &mut self.session,
            input,
            self.llm.clone(),
            &self.config,
            event_tx,
        );
        let (result, ()) = tokio::join!(round_trip, printer);

        match result {
            Ok(_) => self.pending.clear(),
            Err(e) => {
                println!();
                println!("{}", format!("Error: {e}").red());
                if !self.pending.is_empty() {
                    println!(
                        "{}",
                        format!("{} attachment(s) still queued", self.pending.len()).yellow()
                    );
                }
            }
        }
        println!();
    }

    fn print_history(&self) {
        let turns = self.session.conversation().turns();
        if turns.is_empty() {
            println!("{}", "No messages yet".dimmed());
            return;
        }
        for turn in turns {
            print_turn(turn);
        }
        println!(
            "{}",
            format!(
                "{} turn(s), {} tokens total",
                turns.len(),
                self.session.conversation().total_tokens()
            )
            .dimmed()
        );
    }

    fn print_context(&self) {
        match self.session.select_context() {
            Ok(selected) => {
                for turn in &selected.turns {
                    print_turn(turn);
                }
                let usage = &selected.token_usage;
                println!(
                    "{}",
                    format!(
                        "{} turn(s) would be sent: system {} + window {} = {} / {} tokens ({:.1}%), {} dropped",
                        selected.len(),
                        usage.system_tokens,
                        usage.window_tokens,
                        usage.total_tokens,
                        usage.budget_limit,
                        usage.usage_percentage(),
                        selected.turns_dropped
                    )
                    .dimmed()
                );
            }
            Err(e) => println!("{}", format!("Error: {e}").red()),
        }
        if !self.pending.is_empty() {
            println!(
                "{}",
                format!("{} attachment(s) queued", self.pending.len()).dimmed()
            );
        }
    }
}

fn print_turn(turn: &Turn) {
    let label = match turn.role() {
        Role::System => "system".magenta().bold(),
        Role::User => "user".cyan().bold(),
        Role::Assistant => "assistant".green().bold(),
    };
    let attachments: Vec<&str> = turn.content().images().iter().map(|i| i.name()).collect();
    let mut line = format!("{label} [{} tokens]", turn.token_count());
    if let Some(text) = turn.text() {
        line.push_str(": ");
        line.push_str(text);
    }
    if !attachments.is_empty() {
        line.push_str(&format!(" {}", format!("+ {}", attachments.join(", ")).yellow()));
    }
    println!("{line}");
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  <text>          send a message (with any queued images)");
    println!("  /attach <path>  queue a jpg/png image for the next message");
    println!("  /send           send queued images without text");
    println!("  /history        show every turn in this session");
    println!("  /context        show what would be sent to the model now");
    println!("  /quit           leave");
}
