//! End-to-end pipeline scenarios against the real stages.
//!
//! Run with:
//!   cargo test --test test_pipeline

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;

use agri_assist::error::AppError;
use agri_assist::subsystems::generation::{
    ChatCompletion, CircuitBreaker, GenerationClient, GenerationError, GenerationMetrics, GenerationService,
    PromptLimits, RetryPolicy, WeakResponseDetector,
};
use agri_assist::subsystems::knowledge::{Knowledge, SqliteKnowledge};
use agri_assist::subsystems::memory::{ConversationLog, Role, TurnSink};
use agri_assist::subsystems::nlu::{Classifier, Intent, RuleClassifier};
use agri_assist::subsystems::orchestrator::compose::GENERIC_FALLBACK;
use agri_assist::subsystems::orchestrator::{Orchestrator, PipelineRequest, StageTimeouts};

// ── helpers ──────────────────────────────────────────────────────────────────

/// Model backend that counts calls and always gives the same outcome.
#[derive(Clone)]
struct CountingModel {
    calls: Arc<AtomicUsize>,
    answer: Option<&'static str>,
}

impl CountingModel {
    fn answering(answer: &'static str) -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), answer: Some(answer) }
    }

    fn down() -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), answer: None }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatCompletion for CountingModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Some(a) => Ok(a.to_string()),
            None => Err(GenerationError::Status { status: 503, message: "model overloaded".into() }),
        }
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct BrokenLog;

impl TurnSink for BrokenLog {
    async fn append(&self, _session_id: &str, _role: Role, _text: &str) -> Result<(), AppError> {
        Err(AppError::Storage("database is locked".into()))
    }
}

fn knowledge(dir: &TempDir) -> Knowledge {
    let store = SqliteKnowledge::open(&dir.path().join("agri_knowledge.db")).expect("open knowledge");
    store.seed().expect("seed knowledge");
    Knowledge::Sqlite(store)
}

fn generation(model: CountingModel) -> GenerationService<CountingModel> {
    GenerationService::new(
        GenerationClient::new(
            model,
            RetryPolicy { retries: 2, backoff_base: Duration::from_secs(1), attempt_timeout: Duration::from_secs(20) },
        ),
        Arc::new(CircuitBreaker::new(3, Duration::from_secs(30))),
        WeakResponseDetector::default(),
        PromptLimits::default(),
        GenerationMetrics::new().expect("metrics registry"),
    )
}

fn ask(session: Option<&str>, message: &str) -> PipelineRequest {
    PipelineRequest { session_id: session.map(String::from), message: message.into() }
}

// ── scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fertilizer_question_is_answered_from_the_table() {
    let dir = TempDir::new().unwrap();
    let model = CountingModel::answering("unused");
    let log = ConversationLog::open(&dir.path().join("chat_history.db")).unwrap();
    let pipeline = Orchestrator::new(
        Classifier::Rules(RuleClassifier),
        knowledge(&dir),
        generation(model.clone()),
        log.clone(),
        StageTimeouts::default(),
    );

    let reply = pipeline.handle(ask(Some("farm-1"), "gehu ke liye khaad")).await;

    assert_eq!(reply.intent, Intent::Fertilizer);
    assert_eq!(reply.entities.crop.as_deref(), Some("gehu"));
    assert!(reply.reply.starts_with("✅ Gehu ke liye jankari:\n"));
    assert!(reply.reply.contains("Gehu ke liye 120–130 kg Urea + 50–60 kg DAP per acre behtar hota hai."));
    assert_eq!(model.calls(), 0);

    let turns = log.history("farm-1").await.unwrap().expect("session logged");
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text, "gehu ke liye khaad");
    assert_eq!(turns[1].text, reply.reply);
}

#[tokio::test(start_paused = true)]
async fn unclassifiable_question_falls_back_after_retries() {
    let dir = TempDir::new().unwrap();
    let model = CountingModel::down();
    let pipeline = Orchestrator::new(
        Classifier::Rules(RuleClassifier),
        knowledge(&dir),
        generation(model.clone()),
        ConversationLog::open(&dir.path().join("chat_history.db")).unwrap(),
        StageTimeouts::default(),
    );

    let reply = pipeline.handle(ask(None, "kuch ajeeb ho raha hai")).await;

    assert_eq!(reply.intent, Intent::General);
    assert_eq!(reply.entities.crop, None);
    assert_eq!(reply.reply, GENERIC_FALLBACK);
    assert_eq!(model.calls(), 3);
    assert!(!reply.session_id.is_empty());
}

#[tokio::test]
async fn generated_answer_is_passed_through() {
    let dir = TempDir::new().unwrap();
    let answer = "Pehle khet me jal nikasi theek karein, phir 2 din baad patton ko dhyan se dekhein.";
    let model = CountingModel::answering(answer);
    let pipeline = Orchestrator::new(
        Classifier::Rules(RuleClassifier),
        knowledge(&dir),
        generation(model.clone()),
        ConversationLog::open(&dir.path().join("chat_history.db")).unwrap(),
        StageTimeouts::default(),
    );

    let reply = pipeline.handle(ask(None, "kuch ajeeb ho raha hai")).await;
    assert_eq!(reply.reply, answer);
    assert_eq!(model.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_across_requests_and_skips_the_model() {
    let dir = TempDir::new().unwrap();
    let model = CountingModel::down();
    let pipeline = Orchestrator::new(
        Classifier::Rules(RuleClassifier),
        knowledge(&dir),
        generation(model.clone()),
        ConversationLog::open(&dir.path().join("chat_history.db")).unwrap(),
        StageTimeouts::default(),
    );

    for _ in 0..3 {
        pipeline.handle(ask(None, "kuch ajeeb ho raha hai")).await;
    }
    let before = model.calls();
    assert_eq!(before, 9);
    assert!(pipeline.generator().breaker().snapshot().open);

    let reply = pipeline.handle(ask(None, "kuch ajeeb ho raha hai")).await;
    assert_eq!(reply.reply, GENERIC_FALLBACK);
    assert_eq!(model.calls(), before, "no outbound call while the breaker is open");
}

#[tokio::test]
async fn broken_log_does_not_change_the_reply() {
    let dir = TempDir::new().unwrap();
    let healthy = Orchestrator::new(
        Classifier::Rules(RuleClassifier),
        knowledge(&dir),
        generation(CountingModel::answering("unused")),
        ConversationLog::open(&dir.path().join("chat_history.db")).unwrap(),
        StageTimeouts::default(),
    );
    let broken = Orchestrator::new(
        Classifier::Rules(RuleClassifier),
        knowledge(&dir),
        generation(CountingModel::answering("unused")),
        BrokenLog,
        StageTimeouts::default(),
    );

    let a = healthy.handle(ask(Some("s"), "dhaan me daag aa rahe hain")).await;
    let b = broken.handle(ask(Some("s"), "dhaan me daag aa rahe hain")).await;
    assert_eq!(a, b);
    assert!(a.reply.contains("Neck Blast"));
}
