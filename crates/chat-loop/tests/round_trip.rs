use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;

use chat_llm::{EchoProvider, LLMChunk, LLMError, LLMProvider, LLMStream};
use chat_loop::{run_round_trip, ChatError, ChatEvent, ChatLoopConfig, ChatSession, UserInput};
use chat_state::{
    AttachmentPolicy, BudgetError, HeuristicTokenCounter, ImageAttachment, Role, TokenBudget, Turn,
};

enum Script {
    Reply(Vec<&'static str>),
    FailOnCall,
    FailMidStream,
    CutOff(Vec<&'static str>),
}

struct ScriptedProvider {
    script: Script,
    seen: Arc<Mutex<Vec<Vec<Turn>>>>,
}

impl ScriptedProvider {
    fn new(script: Script) -> (Arc<Self>, Arc<Mutex<Vec<Vec<Turn>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Arc::new(Self {
                script,
                seen: seen.clone(),
            }),
            seen,
        )
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_stream(
        &self,
        turns: &[Turn],
        _max_output_tokens: Option<u32>,
        _model: Option<&str>,
    ) -> chat_llm::Result<LLMStream> {
        self.seen.lock().expect("lock").push(turns.to_vec());
        let items: Vec<chat_llm::Result<LLMChunk>> = match &self.script {
            Script::Reply(tokens) => tokens
                .iter()
                .map(|t| Ok(LLMChunk::Token(t.to_string())))
                .chain(std::iter::once(Ok(LLMChunk::Done)))
                .collect(),
            Script::FailOnCall => {
                return Err(LLMError::Api("HTTP 500: upstream down".to_string()));
            }
            Script::CutOff(tokens) => tokens
                .iter()
                .map(|t| Ok(LLMChunk::Token(t.to_string())))
                .collect(),
            Script::FailMidStream => vec![
                Ok(LLMChunk::Token("partial ".to_string())),
                Err(LLMError::Stream("connection reset".to_string())),
            ],
        };
        Ok(Box::pin(stream::iter(items)))
    }

    fn default_model(&self) -> &str {
        "scripted"
    }
}

fn session_with(system_prompt: &str, budget: TokenBudget) -> ChatSession {
    let config = ChatLoopConfig {
        system_prompt: Some(system_prompt.to_string()),
        ..Default::default()
    };
    ChatSession::new(
        &config,
        Arc::new(HeuristicTokenCounter::new(4.0, 1.0, 0)),
        budget,
        AttachmentPolicy::default(),
    )
}

fn drain(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn successful_round_trip_appends_user_and_assistant() {
    let mut session = session_with("Be brief.", TokenBudget::default());
    let (llm, seen) = ScriptedProvider::new(Script::Reply(vec!["Hi", " there"]));
    let (tx, rx) = mpsc::channel(64);

    let reply = run_round_trip(
        &mut session,
        UserInput::text("Hello"),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await
    .expect("round trip");

    assert_eq!(reply.role(), Role::Assistant);
    assert_eq!(reply.text(), Some("Hi there"));

    let roles: Vec<Role> = session.conversation().turns().iter().map(Turn::role).collect();
    assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

    // The provider saw the system turn and the new user turn.
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 2);
    assert_eq!(seen[0][1].text(), Some("Hello"));

    let events = drain(rx);
    let tokens: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Token { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, vec!["Hi", " there"]);
    assert!(matches!(events.first(), Some(ChatEvent::ContextPrepared { .. })));
    match events.last() {
        Some(ChatEvent::Complete { usage }) => {
            assert_eq!(usage.completion_tokens, reply.token_count());
            assert_eq!(usage.total_tokens, usage.prompt_tokens + usage.completion_tokens);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
}

#[tokio::test]
async fn upstream_failure_rolls_back_user_turn() {
    let mut session = session_with("Be brief.", TokenBudget::default());
    let (llm, _) = ScriptedProvider::new(Script::FailOnCall);
    let (tx, rx) = mpsc::channel(64);
    let before = session.conversation().turns().to_vec();

    let result = run_round_trip(
        &mut session,
        UserInput::text("Hello"),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await;

    assert!(matches!(result, Err(ChatError::Upstream(LLMError::Api(_)))));
    assert_eq!(session.conversation().turns(), before.as_slice());
    assert!(matches!(drain(rx).last(), Some(ChatEvent::Error { .. })));
}

#[tokio::test]
async fn mid_stream_failure_keeps_no_partial_reply() {
    let mut session = session_with("Be brief.", TokenBudget::default());
    let (llm, _) = ScriptedProvider::new(Script::FailMidStream);
    let (tx, _rx) = mpsc::channel(64);

    let result = run_round_trip(
        &mut session,
        UserInput::text("Hello"),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await;

    assert!(matches!(result, Err(ChatError::Upstream(LLMError::Stream(_)))));
    assert_eq!(session.conversation().len(), 1);
}

#[tokio::test]
async fn oversized_system_prompt_is_budget_exhausted() {
    // 80 chars -> 20 tokens; input allowance is 10.
    let budget = TokenBudget::with_safety_margin(20, 10, 0);
    let mut session = session_with(&"s".repeat(80), budget);
    let (llm, seen) = ScriptedProvider::new(Script::Reply(vec!["never"]));
    let (tx, _rx) = mpsc::channel(64);

    let result = run_round_trip(
        &mut session,
        UserInput::text("hi"),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await;

    assert!(matches!(
        result,
        Err(ChatError::Budget(BudgetError::BudgetExhausted {
            system_tokens: 20,
            budget: 10
        }))
    ));
    assert_eq!(session.conversation().len(), 1);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reply_cut_off_before_done_is_not_appended() {
    let mut session = session_with("Be brief.", TokenBudget::default());
    let (llm, _) = ScriptedProvider::new(Script::CutOff(vec!["The answer is"]));
    let (tx, rx) = mpsc::channel(64);

    let result = run_round_trip(
        &mut session,
        UserInput::text("What is 6 x 7?"),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await;

    assert!(matches!(result, Err(ChatError::Upstream(LLMError::Stream(_)))));
    assert_eq!(session.conversation().len(), 1);
    assert!(matches!(drain(rx).last(), Some(ChatEvent::Error { .. })));
}

#[tokio::test]
async fn message_larger_than_budget_is_rejected_before_the_call() {
    // 100 - 40 - 0 = 60 input tokens; "sys!" = 1 token, 400 chars = 100 tokens.
    let budget = TokenBudget::with_safety_margin(100, 40, 0);
    let mut session = session_with("sys!", budget);
    let (llm, seen) = ScriptedProvider::new(Script::Reply(vec!["never"]));
    let (tx, _rx) = mpsc::channel(64);

    let result = run_round_trip(
        &mut session,
        UserInput::text("q".repeat(400)),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await;

    assert!(matches!(
        result,
        Err(ChatError::Budget(BudgetError::TurnTooLarge {
            turn_tokens: 100,
            budget: 59
        }))
    ));
    assert_eq!(session.conversation().len(), 1);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn message_larger_than_budget_without_system_turn_sends_nothing() {
    let budget = TokenBudget::with_safety_margin(100, 40, 0);
    let mut session = session_with("", budget);
    let (llm, seen) = ScriptedProvider::new(Script::Reply(vec!["never"]));
    let (tx, _rx) = mpsc::channel(64);

    let result = run_round_trip(
        &mut session,
        UserInput::text("q".repeat(400)),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await;

    assert!(matches!(
        result,
        Err(ChatError::Budget(BudgetError::TurnTooLarge {
            turn_tokens: 100,
            budget: 60
        }))
    ));
    assert!(session.conversation().is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_input_never_reaches_provider() {
    let mut session = session_with("Be brief.", TokenBudget::default());
    let (llm, seen) = ScriptedProvider::new(Script::Reply(vec!["never"]));
    let (tx, _rx) = mpsc::channel(64);

    let result = run_round_trip(
        &mut session,
        UserInput::text("   "),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await;

    assert!(matches!(result, Err(ChatError::Validation(_))));
    assert_eq!(session.conversation().len(), 1);
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn long_conversation_sends_only_recent_window() {
    // 100 - 20 - 0 = 80 input tokens. System "sys!" = 1 token.
    let budget = TokenBudget::with_safety_margin(100, 20, 0);
    let mut session = session_with("sys!", budget);
    let llm: Arc<dyn LLMProvider> = Arc::new(EchoProvider::new());

    for i in 0..10 {
        let (tx, _rx) = mpsc::channel(64);
        // 40 chars -> 10 tokens per user turn, echoed back as 10 tokens
        let text = format!("{:0>40}", i);
        run_round_trip(
            &mut session,
            UserInput::text(text),
            llm.clone(),
            &ChatLoopConfig::default(),
            tx,
        )
        .await
        .expect("round trip");
    }
    assert_eq!(session.conversation().len(), 21);

    let (llm, seen) = ScriptedProvider::new(Script::Reply(vec!["ok"]));
    let (tx, _rx) = mpsc::channel(64);
    run_round_trip(
        &mut session,
        UserInput::text("x".repeat(40)),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await
    .expect("round trip");

    let seen = seen.lock().unwrap();
    let sent = &seen[0];
    let total: u32 = sent.iter().map(Turn::token_count).sum();
    assert!(total <= 80);
    assert_eq!(sent[0].role(), Role::System);
    // 1 system token + 7 turns of 10 tokens fit in 80.
    assert_eq!(sent.len(), 8);
    assert_eq!(sent.last().and_then(Turn::text), Some("x".repeat(40).as_str()));
}

#[tokio::test]
async fn image_turns_round_trip() {
    let mut session = session_with("Describe images.", TokenBudget::default());
    let (llm, seen) = ScriptedProvider::new(Script::Reply(vec!["A dot."]));
    let (tx, _rx) = mpsc::channel(64);
    let image = ImageAttachment::new("dot.png", "png", vec![0u8; 64], session.attachment_policy())
        .unwrap();

    run_round_trip(
        &mut session,
        UserInput::default().with_image(image),
        llm,
        &ChatLoopConfig::default(),
        tx,
    )
    .await
    .expect("round trip");

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0][1].content().images().len(), 1);
    assert_eq!(seen[0][1].text(), None);
}
