//! Orchestrator — runs one message through classify → lookup → generate → log.
//!
//! `handle` never fails. Each stage returns a typed `Result` and every error
//! branch is spelled out here:
//!
//! | Stage      | On error / timeout                                   |
//! |------------|------------------------------------------------------|
//! | classify   | `intent = general`, no crop                          |
//! | lookup     | treated as `source = generic`                        |
//! | generate   | intent-specific clarification from [`compose`]       |
//! | log        | `warn!` and move on; the reply is already decided    |

pub mod compose;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, StageMode};
use crate::error::AppError;
use crate::llm::providers;
use crate::subsystems::generation::{Generation, GenerationRequest, GenerationService, Generator, RemoteGenerator};
use crate::subsystems::knowledge::{
    Knowledge, KnowledgeLookup, KnowledgeQuery, KnowledgeResult, RemoteKnowledge, SqliteKnowledge,
};
use crate::subsystems::memory::{ConversationLog, Role, TurnSink};
use crate::subsystems::nlu::{
    Classifier, Entities, Intent, IntentClassifier, IntentResult, RemoteClassifier, RuleClassifier,
};

/// Unit of work entering the pipeline (`POST /chat` body).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReply {
    pub session_id: String,
    pub reply: String,
    pub intent: Intent,
    pub entities: Entities,
}

/// Upper bound on how long the orchestrator waits for each stage.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub classify: Duration,
    pub lookup: Duration,
    pub generate: Duration,
}

impl StageTimeouts {
    /// The generation budget covers every attempt plus the backoff between them.
    /// Saturates instead of overflowing.
    pub fn from_config(cfg: &Config) -> Self {
        let g = &cfg.generation;
        let attempts = g.retries.saturating_add(1);
        let backoff_steps = u32::try_from(u64::from(g.retries) * u64::from(attempts) / 2).unwrap_or(u32::MAX);
        let generate = g
            .attempt_timeout
            .saturating_mul(attempts)
            .saturating_add(g.backoff_base.saturating_mul(backoff_steps))
            .saturating_add(Duration::from_secs(1));
        Self {
            classify: cfg.classifier.timeout,
            lookup: cfg.knowledge.timeout,
            generate,
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            classify: Duration::from_secs(10),
            lookup: Duration::from_secs(10),
            generate: Duration::from_secs(64),
        }
    }
}

pub struct Orchestrator<C, K, G, S> {
    classifier: C,
    knowledge: K,
    generator: G,
    sink: S,
    timeouts: StageTimeouts,
}

impl<C, K, G, S> Orchestrator<C, K, G, S>
where
    C: IntentClassifier,
    K: KnowledgeLookup,
    G: Generator,
    S: TurnSink,
{
    pub fn new(classifier: C, knowledge: K, generator: G, sink: S, timeouts: StageTimeouts) -> Self {
        Self { classifier, knowledge, generator, sink, timeouts }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn knowledge(&self) -> &K {
        &self.knowledge
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn handle(&self, request: PipelineRequest) -> PipelineReply {
        let session_id = resolve_session_id(request.session_id.as_deref());
        let message = request.message.trim().to_string();

        let analysis = self.classify(&session_id, &message).await;
        let knowledge = self.lookup(&session_id, &analysis, &message).await;

        let reply = if !knowledge.source.is_generic() {
            info!(%session_id, intent = %analysis.intent, source = %knowledge.source, "answered from knowledge");
            compose::knowledge_answer(analysis.crop.as_deref(), &knowledge.context)
        } else {
            self.generate(&session_id, &analysis, &message).await
        };

        self.log_turns(&session_id, &message, &reply).await;

        PipelineReply {
            session_id,
            reply,
            intent: analysis.intent,
            entities: analysis.entities(),
        }
    }

    async fn classify(&self, session_id: &str, message: &str) -> IntentResult {
        match tokio::time::timeout(self.timeouts.classify, self.classifier.classify(message)).await {
            Ok(Ok(result)) => {
                debug!(session_id, intent = %result.intent, crop = ?result.crop, "classified");
                result
            }
            Ok(Err(e)) => {
                warn!(session_id, error = %e, "classifier failed; assuming general intent");
                IntentResult::general()
            }
            Err(_) => {
                warn!(session_id, "classifier timed out; assuming general intent");
                IntentResult::general()
            }
        }
    }

    async fn lookup(&self, session_id: &str, analysis: &IntentResult, message: &str) -> KnowledgeResult {
        let query = KnowledgeQuery {
            intent: analysis.intent,
            crop: analysis.crop.clone(),
            message: message.to_string(),
        };
        match tokio::time::timeout(self.timeouts.lookup, self.knowledge.lookup(&query)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(session_id, error = %e, "knowledge lookup failed; falling through to generation");
                KnowledgeResult { context: String::new(), ..KnowledgeResult::generic() }
            }
            Err(_) => {
                warn!(session_id, "knowledge lookup timed out; falling through to generation");
                KnowledgeResult { context: String::new(), ..KnowledgeResult::generic() }
            }
        }
    }

    async fn generate(&self, session_id: &str, analysis: &IntentResult, message: &str) -> String {
        let request = GenerationRequest {
            user_message: message.to_string(),
            intent: analysis.intent,
            entities: analysis.entities(),
            context_data: String::new(),
            request_id: Some(session_id.to_string()),
        };
        match tokio::time::timeout(self.timeouts.generate, self.generator.generate(&request)).await {
            Ok(Ok(output)) => {
                info!(session_id, intent = %analysis.intent, model = %output.metadata.model, "answered by generation");
                output.final_answer
            }
            Ok(Err(e)) => {
                warn!(session_id, intent = %analysis.intent, error = %e, "generation unusable; sending clarification");
                compose::fallback_answer(analysis.intent).to_string()
            }
            Err(_) => {
                warn!(session_id, intent = %analysis.intent, "generation timed out; sending clarification");
                compose::fallback_answer(analysis.intent).to_string()
            }
        }
    }

    async fn log_turns(&self, session_id: &str, message: &str, reply: &str) {
        if let Err(e) = self.sink.append(session_id, Role::User, message).await {
            warn!(session_id, error = %e, "failed to log user turn");
        }
        if let Err(e) = self.sink.append(session_id, Role::Assistant, reply).await {
            warn!(session_id, error = %e, "failed to log assistant turn");
        }
    }
}

/// Trimmed caller id, or a fresh UUID v4 when absent or blank.
pub fn resolve_session_id(requested: Option<&str>) -> String {
    requested
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// ── Production wiring ─────────────────────────────────────────────────────────

/// The orchestrator with every stage chosen from config.
pub type Pipeline = Orchestrator<Classifier, Knowledge, Generation, ConversationLog>;

impl Pipeline {
    /// Build each stage in the mode the config asks for and open the stores.
    pub fn from_config(cfg: &Config) -> Result<Self, AppError> {
        let timeouts = StageTimeouts::from_config(cfg);

        let classifier = match cfg.classifier.mode {
            StageMode::Local => Classifier::Rules(RuleClassifier),
            StageMode::Remote => Classifier::Remote(
                RemoteClassifier::new(&cfg.classifier.url, cfg.classifier.timeout)
                    .map_err(|e| AppError::Config(format!("classifier: {e}")))?,
            ),
        };

        let knowledge = match cfg.knowledge.mode {
            StageMode::Local => Knowledge::Sqlite(SqliteKnowledge::open(&cfg.knowledge.db_path)?),
            StageMode::Remote => Knowledge::Remote(
                RemoteKnowledge::new(&cfg.knowledge.url, cfg.knowledge.timeout)
                    .map_err(|e| AppError::Config(format!("knowledge: {e}")))?,
            ),
        };

        let generator = match cfg.generation.mode {
            StageMode::Local => {
                let provider = providers::build(&cfg.llm, cfg.llm_api_key.clone())
                    .map_err(|e| AppError::Config(format!("llm provider: {e}")))?;
                Generation::Local(GenerationService::from_config(provider, &cfg.generation)?)
            }
            StageMode::Remote => Generation::Remote(
                RemoteGenerator::new(&cfg.generation.url, cfg.service_api_key.clone(), timeouts.generate)
                    .map_err(|e| AppError::Config(format!("generation: {e}")))?,
            ),
        };

        let sink = ConversationLog::open(&cfg.storage.history_path)?;

        info!(
            classifier = ?cfg.classifier.mode,
            knowledge = ?cfg.knowledge.mode,
            generation = ?cfg.generation.mode,
            "pipeline assembled"
        );
        Ok(Orchestrator::new(classifier, knowledge, generator, sink, timeouts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::generation::{GenerationError, GenerationMetadata, GenerationOutput};
    use crate::subsystems::knowledge::{KnowledgeError, KnowledgeSource};
    use crate::subsystems::nlu::ClassifierError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Fakes ────────────────────────────────────────────────────────────────

    enum FakeClassifier {
        Rules,
        Failing,
        Hanging,
    }

    impl IntentClassifier for FakeClassifier {
        async fn classify(&self, message: &str) -> Result<IntentResult, ClassifierError> {
            match self {
                FakeClassifier::Rules => Ok(RuleClassifier.detect(message)),
                FakeClassifier::Failing => Err(ClassifierError::Unavailable("down".into())),
                FakeClassifier::Hanging => std::future::pending().await,
            }
        }
    }

    enum FakeKnowledge {
        Hit(KnowledgeSource, &'static str),
        Generic,
        Failing,
    }

    impl KnowledgeLookup for FakeKnowledge {
        async fn lookup(&self, _query: &KnowledgeQuery) -> Result<KnowledgeResult, KnowledgeError> {
            match self {
                FakeKnowledge::Hit(source, ctx) => Ok(KnowledgeResult { context: ctx.to_string(), source: source.clone() }),
                FakeKnowledge::Generic => Ok(KnowledgeResult::generic()),
                FakeKnowledge::Failing => Err(KnowledgeError::Unavailable("down".into())),
            }
        }
    }

    struct CountingGenerator {
        answer: Option<&'static str>,
        calls: AtomicUsize,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl CountingGenerator {
        fn ok(answer: &'static str) -> Self {
            Self { answer: Some(answer), calls: AtomicUsize::new(0), last_request: Mutex::new(None) }
        }

        fn failing() -> Self {
            Self { answer: None, calls: AtomicUsize::new(0), last_request: Mutex::new(None) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Generator for CountingGenerator {
        async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            match self.answer {
                Some(a) => Ok(GenerationOutput {
                    final_answer: a.to_string(),
                    metadata: GenerationMetadata { model: "fake".into(), latency_ms: 0 },
                }),
                None => Err(GenerationError::BreakerOpen),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        turns: Mutex<Vec<(String, Role, String)>>,
    }

    impl TurnSink for RecordingSink {
        async fn append(&self, session_id: &str, role: Role, text: &str) -> Result<(), AppError> {
            self.turns.lock().unwrap().push((session_id.to_string(), role, text.to_string()));
            Ok(())
        }
    }

    struct FailingSink;

    impl TurnSink for FailingSink {
        async fn append(&self, _session_id: &str, _role: Role, _text: &str) -> Result<(), AppError> {
            Err(AppError::Storage("disk full".into()))
        }
    }

    fn orchestrator<C, K, G, S>(c: C, k: K, g: G, s: S) -> Orchestrator<C, K, G, S>
    where
        C: IntentClassifier,
        K: KnowledgeLookup,
        G: Generator,
        S: TurnSink,
    {
        Orchestrator::new(c, k, g, s, StageTimeouts::default())
    }

    fn ask(message: &str) -> PipelineRequest {
        PipelineRequest { session_id: None, message: message.into() }
    }

    // ── Properties ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn knowledge_hit_skips_generation() {
        let o = orchestrator(
            FakeClassifier::Rules,
            FakeKnowledge::Hit(KnowledgeSource::FertilizerTable, "Urea 120 kg per acre."),
            CountingGenerator::ok("unused"),
            RecordingSink::default(),
        );
        let reply = o.handle(ask("gehu ke liye khaad")).await;
        assert_eq!(reply.intent, Intent::Fertilizer);
        assert_eq!(reply.entities.crop.as_deref(), Some("gehu"));
        assert_eq!(reply.reply, "✅ Gehu ke liye jankari:\nUrea 120 kg per acre.");
        assert_eq!(o.generator().calls(), 0);
    }

    #[tokio::test]
    async fn unknown_source_label_is_terminal() {
        let o = orchestrator(
            FakeClassifier::Rules,
            FakeKnowledge::Hit(KnowledgeSource::Other("pdf_index".into()), "ctx"),
            CountingGenerator::ok("unused"),
            RecordingSink::default(),
        );
        let reply = o.handle(ask("kuch bhi")).await;
        assert_eq!(reply.reply, "✅ Jankari:\nctx");
        assert_eq!(o.generator().calls(), 0);
    }

    #[tokio::test]
    async fn generic_source_calls_generator_with_empty_context() {
        let o = orchestrator(
            FakeClassifier::Rules,
            FakeKnowledge::Generic,
            CountingGenerator::ok("Pehle khet ka nirikshan karein aur patton ki photo lein."),
            RecordingSink::default(),
        );
        let reply = o.handle(ask("  kuch ajeeb ho raha hai ")).await;
        assert_eq!(reply.reply, "Pehle khet ka nirikshan karein aur patton ki photo lein.");
        assert_eq!(o.generator().calls(), 1);

        let sent = o.generator().last_request.lock().unwrap().clone().unwrap();
        assert_eq!(sent.user_message, "kuch ajeeb ho raha hai");
        assert_eq!(sent.context_data, "");
        assert_eq!(sent.intent, Intent::General);
    }

    #[tokio::test]
    async fn generation_failure_returns_intent_fallback() {
        let o = orchestrator(
            FakeClassifier::Rules,
            FakeKnowledge::Generic,
            CountingGenerator::failing(),
            RecordingSink::default(),
        );
        assert_eq!(o.handle(ask("kuch ajeeb ho raha hai")).await.reply, compose::GENERIC_FALLBACK);
        assert_eq!(o.handle(ask("paani kitna dena hai")).await.reply, compose::WATER_FALLBACK);
    }

    #[tokio::test]
    async fn everything_failing_still_replies() {
        let o = orchestrator(FakeClassifier::Failing, FakeKnowledge::Failing, CountingGenerator::failing(), FailingSink);
        let reply = o.handle(ask("gehu ke liye khaad")).await;
        assert!(!reply.reply.is_empty());
        assert!(!reply.session_id.is_empty());
        assert_eq!(reply.intent, Intent::General);
        assert_eq!(reply.entities.crop, None);
        assert_eq!(reply.reply, compose::GENERIC_FALLBACK);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_classifier_times_out_to_general() {
        let o = orchestrator(
            FakeClassifier::Hanging,
            FakeKnowledge::Generic,
            CountingGenerator::failing(),
            RecordingSink::default(),
        );
        let reply = o.handle(ask("gehu ke liye khaad")).await;
        assert_eq!(reply.intent, Intent::General);
        assert_eq!(o.generator().calls(), 1);
    }

    #[tokio::test]
    async fn failing_sink_does_not_change_reply() {
        let logged = orchestrator(
            FakeClassifier::Rules,
            FakeKnowledge::Generic,
            CountingGenerator::ok("Same answer either way, with enough detail."),
            RecordingSink::default(),
        );
        let unlogged = orchestrator(
            FakeClassifier::Rules,
            FakeKnowledge::Generic,
            CountingGenerator::ok("Same answer either way, with enough detail."),
            FailingSink,
        );
        let req = PipelineRequest { session_id: Some("s-1".into()), message: "sawal".into() };
        assert_eq!(logged.handle(req.clone()).await, unlogged.handle(req).await);
    }

    #[tokio::test]
    async fn both_turns_are_logged_in_order() {
        let o = orchestrator(
            FakeClassifier::Rules,
            FakeKnowledge::Hit(KnowledgeSource::CropCalendar, "ctx"),
            CountingGenerator::ok("unused"),
            RecordingSink::default(),
        );
        let reply = o
            .handle(PipelineRequest { session_id: Some(" abc ".into()), message: " sarson kab boyein ".into() })
            .await;
        assert_eq!(reply.session_id, "abc");

        let turns = o.sink().turns.lock().unwrap().clone();
        assert_eq!(
            turns,
            vec![
                ("abc".to_string(), Role::User, "sarson kab boyein".to_string()),
                ("abc".to_string(), Role::Assistant, reply.reply.clone()),
            ]
        );
    }

    #[test]
    fn blank_session_ids_are_replaced() {
        assert_eq!(resolve_session_id(Some("keep-me")), "keep-me");
        let fresh = resolve_session_id(Some("   "));
        assert!(Uuid::parse_str(&fresh).is_ok());
        assert_ne!(resolve_session_id(None), resolve_session_id(None));
    }

    #[test]
    fn generation_budget_covers_retries() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = Config::test_default(dir.path());
        cfg.generation.attempt_timeout = Duration::from_secs(20);
        cfg.generation.backoff_base = Duration::from_secs(1);
        cfg.generation.retries = 2;
        // 3 × 20 s + (1 + 2) s backoff + 1 s slack.
        assert_eq!(StageTimeouts::from_config(&cfg).generate, Duration::from_secs(64));
    }

    #[test]
    fn huge_retry_count_saturates_instead_of_panicking() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = Config::test_default(dir.path());
        cfg.generation.retries = u32::MAX;
        cfg.generation.attempt_timeout = Duration::from_secs(20);
        cfg.generation.backoff_base = Duration::from_secs(1);
        // u32::MAX attempts × 20 s + u32::MAX (capped) backoff steps × 1 s + 1 s.
        assert_eq!(
            StageTimeouts::from_config(&cfg).generate,
            Duration::from_secs(21 * u64::from(u32::MAX) + 1)
        );

        cfg.generation.attempt_timeout = Duration::MAX;
        assert_eq!(StageTimeouts::from_config(&cfg).generate, Duration::MAX);
    }
}
