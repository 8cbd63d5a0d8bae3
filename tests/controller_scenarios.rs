use async_trait::async_trait;
use chaat::controller::{CompletionOutcome, InteractionController, Phase, Resolution, SubmitRejected};
use chaat::events::{Role, Turn};
use chaat::llm::{CompletionBackend, CompletionError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays canned replies and records what it was asked
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    calls: Mutex<Vec<(Vec<Turn>, String)>>,
}

impl ScriptedBackend {
    fn new(replies: impl IntoIterator<Item = Result<String, CompletionError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn call(&self, index: usize) -> (Vec<Turn>, String) {
        self.calls.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, prior: &[Turn], prompt: &str) -> Result<String, CompletionError> {
        self.calls
            .lock()
            .unwrap()
            .push((prior.to_vec(), prompt.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::MalformedResponse("script exhausted".into())))
    }
}

fn ok(text: &str) -> Result<String, CompletionError> {
    Ok(text.to_string())
}

#[tokio::test]
async fn each_successful_exchange_adds_two_turns() {
    let backend = ScriptedBackend::new([ok("a"), ok("b"), ok("c")]);
    let mut controller = InteractionController::new(backend.clone());

    for (i, prompt) in ["one", "two", "three"].into_iter().enumerate() {
        let resolution = controller.submit(prompt).await.unwrap();
        assert_eq!(resolution, Resolution::Replied);
        assert_eq!(controller.session().conversation().len(), 2 * (i + 1));
    }

    let turns = controller.session().conversation().snapshot();
    let roles: Vec<Role> = turns.iter().map(Turn::role).collect();
    assert_eq!(
        roles,
        [Role::User, Role::Assistant, Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(turns[4].content(), "three");
    assert_eq!(turns[5].content(), "c");
}

#[tokio::test]
async fn backend_sees_prior_turns_without_the_new_prompt() {
    let backend = ScriptedBackend::new([ok("4 🙂"), ok("8")]);
    let mut controller = InteractionController::new(backend.clone());

    controller.submit("2+2?").await.unwrap();
    controller.submit("and doubled?").await.unwrap();

    let (prior, prompt) = backend.call(0);
    assert!(prior.is_empty());
    assert_eq!(prompt, "2+2?");

    let (prior, prompt) = backend.call(1);
    assert_eq!(prior, vec![Turn::user("2+2?"), Turn::assistant("4 🙂")]);
    assert_eq!(prompt, "and doubled?");
}

#[tokio::test]
async fn blank_prompt_is_rejected_without_a_call() {
    let backend = ScriptedBackend::new([]);
    let mut controller = InteractionController::new(backend.clone());

    for prompt in ["", "   ", "\n\t"] {
        assert_eq!(controller.submit(prompt).await, Err(SubmitRejected::EmptyPrompt));
    }

    assert_eq!(backend.call_count(), 0);
    assert!(controller.session().conversation().is_empty());
    assert_eq!(controller.phase(), Phase::Idle);
}

#[tokio::test]
async fn second_submit_while_awaiting_is_ignored() {
    let backend = ScriptedBackend::new([ok("first reply")]);
    let mut controller = InteractionController::new(backend.clone());

    let pending = controller.begin("first").unwrap();
    assert!(matches!(controller.begin("second"), Err(SubmitRejected::Busy)));
    assert_eq!(controller.session().conversation().len(), 1);

    let outcome = pending.run(&*backend).await;
    assert_eq!(controller.resolve(outcome), Resolution::Replied);

    assert_eq!(backend.call_count(), 1);
    let turns = controller.session().conversation().snapshot();
    assert_eq!(turns, &[Turn::user("first"), Turn::assistant("first reply")]);
}

#[tokio::test]
async fn failure_adds_only_the_user_turn() {
    let backend = ScriptedBackend::new([Err(CompletionError::MalformedResponse("empty".into()))]);
    let mut controller = InteractionController::new(backend.clone());

    let resolution = controller.submit("hello").await.unwrap();

    assert!(matches!(resolution, Resolution::Failed(_)));
    assert_eq!(controller.session().conversation().snapshot(), &[Turn::user("hello")]);
    assert!(!controller.session().request().is_busy());
    assert!(controller.session().request().last_error().is_some());
}

#[tokio::test]
async fn unauthorized_reply_surfaces_service_message() {
    let backend = ScriptedBackend::new([Err(CompletionError::Service {
        status: reqwest::StatusCode::UNAUTHORIZED,
        message: "invalid key".to_string(),
    })]);
    let mut controller = InteractionController::new(backend.clone());

    let resolution = controller.submit("hi").await.unwrap();

    assert_eq!(resolution, Resolution::Failed("invalid key".to_string()));
    assert_eq!(controller.session().request().last_error(), Some("invalid key"));
    assert_eq!(controller.session().conversation().len(), 1);
}

#[tokio::test]
async fn success_after_failure_clears_the_error() {
    let backend = ScriptedBackend::new([
        Err(CompletionError::MalformedResponse("empty".into())),
        ok("there you go"),
    ]);
    let mut controller = InteractionController::new(backend.clone());

    controller.submit("hello").await.unwrap();
    assert!(controller.session().request().last_error().is_some());

    controller.submit("hello again").await.unwrap();
    assert_eq!(controller.session().request().last_error(), None);
    assert_eq!(controller.session().conversation().len(), 3);
}

#[tokio::test]
async fn reply_for_a_reset_session_is_stale() {
    let backend = ScriptedBackend::new([ok("too late"), ok("fresh")]);
    let mut controller = InteractionController::new(backend.clone());
    let old_session = controller.session().id();

    let pending = controller.begin("old question").unwrap();
    controller.reset();
    assert_ne!(controller.session().id(), old_session);
    assert!(controller.session().conversation().is_empty());

    let outcome = pending.run(&*backend).await;
    assert_eq!(controller.resolve(outcome), Resolution::Stale);
    assert!(controller.session().conversation().is_empty());

    assert_eq!(controller.submit("new question").await.unwrap(), Resolution::Replied);
    assert_eq!(controller.session().conversation().len(), 2);
}

#[tokio::test]
async fn unknown_ticket_is_stale_while_idle() {
    let backend = ScriptedBackend::new([]);
    let mut controller = InteractionController::new(backend);

    let resolution = controller.resolve(CompletionOutcome {
        ticket: 42,
        result: Ok("ghost".to_string()),
    });

    assert_eq!(resolution, Resolution::Stale);
    assert!(controller.session().conversation().is_empty());
}

#[tokio::test]
async fn store_signals_once_per_append() {
    let backend = ScriptedBackend::new([ok("a"), Err(CompletionError::MalformedResponse("x".into()))]);
    let mut controller = InteractionController::new(backend.clone());
    let mut changes = controller.session().conversation().subscribe();

    controller.submit("first").await.unwrap();
    assert!(changes.has_changed().unwrap());
    assert_eq!(*changes.borrow_and_update(), 2);

    controller.submit("second").await.unwrap();
    assert_eq!(*changes.borrow_and_update(), 3);
}
