//! In-memory collaborators for pipeline tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::bundle::{ResearchBundle, Source};
use crate::core::draft::Draft;
use crate::core::event::{Event, EventKind};
use crate::core::record::SkillRecord;
use crate::error::{ForgeError, Result};
use crate::events::EventSink;
use crate::generator::{DraftGenerator, GenerationRequest};
use crate::notify::Notifier;
use crate::publish::Publisher;
use crate::research::ResearchProvider;
use crate::sandbox::{RawOutput, Sandbox, SandboxBackend};
use crate::storage::SkillStore;

/// How the scripted sandbox answers one command.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Exit(i32),
    Output {
        code: i32,
        stdout: String,
        stderr: String,
    },
    Timeout,
    Error(String),
    Panic,
}

type Script = dyn Fn(&str) -> ScriptedStep + Send + Sync;

#[derive(Default)]
struct BackendState {
    provisions: usize,
    teardowns: usize,
    executed: Vec<String>,
    timeouts: Vec<Duration>,
}

/// Sandbox backend whose command results come from a closure.
#[derive(Clone)]
pub struct ScriptedBackend {
    script: Arc<Script>,
    provision_error: Option<String>,
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedBackend {
    pub fn new(script: impl Fn(&str) -> ScriptedStep + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            provision_error: None,
            state: Arc::new(Mutex::new(BackendState::default())),
        }
    }

    /// Every command exits 0.
    pub fn passing() -> Self {
        Self::new(|_| ScriptedStep::Exit(0))
    }

    /// Commands containing `needle` exit 1; all others pass.
    pub fn failing_on(needle: &'static str) -> Self {
        Self::new(move |command| {
            if command.contains(needle) {
                ScriptedStep::Output {
                    code: 1,
                    stdout: String::new(),
                    stderr: format!("{needle}: command failed"),
                }
            } else {
                ScriptedStep::Exit(0)
            }
        })
    }

    #[must_use]
    pub fn failing_provision(mut self, message: &str) -> Self {
        self.provision_error = Some(message.to_string());
        self
    }

    pub fn provisions(&self) -> usize {
        self.state.lock().provisions
    }

    pub fn teardowns(&self) -> usize {
        self.state.lock().teardowns
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().executed.clone()
    }

    pub fn timeouts(&self) -> Vec<Duration> {
        self.state.lock().timeouts.clone()
    }
}

impl SandboxBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn provision(&self) -> Result<Box<dyn Sandbox>> {
        if let Some(message) = &self.provision_error {
            return Err(ForgeError::Sandbox(message.clone()));
        }
        let mut state = self.state.lock();
        state.provisions += 1;
        Ok(Box::new(ScriptedSandbox {
            id: format!("scripted-{}", state.provisions),
            script: Arc::clone(&self.script),
            state: Arc::clone(&self.state),
        }))
    }
}

struct ScriptedSandbox {
    id: String,
    script: Arc<Script>,
    state: Arc<Mutex<BackendState>>,
}

impl Sandbox for ScriptedSandbox {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&mut self, command: &str, timeout: Duration) -> Result<RawOutput> {
        {
            let mut state = self.state.lock();
            state.executed.push(command.to_string());
            state.timeouts.push(timeout);
        }
        match (self.script)(command) {
            ScriptedStep::Exit(code) => Ok(RawOutput::exited(code, format!("ran {command}"), "")),
            ScriptedStep::Output {
                code,
                stdout,
                stderr,
            } => Ok(RawOutput::exited(code, stdout, stderr)),
            ScriptedStep::Timeout => Ok(RawOutput {
                exit_code: None,
                stdout: String::new(),
                stderr: format!("Timed out after {}s", timeout.as_secs_f64()),
                timed_out: true,
                duration: timeout,
            }),
            ScriptedStep::Error(message) => Err(ForgeError::Sandbox(message)),
            ScriptedStep::Panic => panic!("scripted sandbox panic on {command}"),
        }
    }

    fn teardown(&mut self) -> Result<()> {
        self.state.lock().teardowns += 1;
        Ok(())
    }
}

/// Research provider returning a fixed answer.
pub struct StaticResearch {
    answer: std::result::Result<usize, String>,
    calls: AtomicUsize,
}

impl StaticResearch {
    /// Bundle with `count` sources.
    pub fn with_sources(count: usize) -> Self {
        Self {
            answer: Ok(count),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ResearchProvider for StaticResearch {
    fn research(&self, topic: &str) -> Result<ResearchBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Ok(count) => Ok(ResearchBundle::new(
                topic,
                (1..=*count)
                    .map(|i| {
                        Source::new(
                            format!("https://example.com/{topic}/{i}"),
                            format!("Notes {i} about {topic}"),
                        )
                    })
                    .collect(),
            )),
            Err(message) => Err(ForgeError::Research(message.clone())),
        }
    }
}

/// One scripted generator answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Markdown(String),
    Fail(String),
}

/// Generator replaying a queue of answers; the last answer repeats.
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn sequence(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(markdown: &str) -> Self {
        Self::sequence(vec![Reply::Markdown(markdown.to_string())])
    }

    pub fn failing(message: &str) -> Self {
        Self::sequence(vec![Reply::Fail(message.to_string())])
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

impl DraftGenerator for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Draft> {
        self.requests.lock().push(request.clone());
        let next = self.replies.lock().pop_front();
        let reply = match next {
            Some(reply) => {
                *self.last.lock() = Some(reply.clone());
                reply
            }
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| ForgeError::Generation("no scripted reply".to_string()))?,
        };
        match reply {
            Reply::Markdown(markdown) => Ok(Draft::from_markdown(&request.topic, &markdown)),
            Reply::Fail(message) => Err(ForgeError::Generation(message)),
        }
    }
}

/// Event sink and skill store held in memory.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<Event>>,
    records: Mutex<Vec<SkillRecord>>,
    fail_events: AtomicBool,
    fail_puts: AtomicBool,
}

impl MemoryStore {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn event_kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }

    pub fn records(&self) -> Vec<SkillRecord> {
        self.records.lock().clone()
    }

    pub fn fail_event_appends(&self, fail: bool) {
        self.fail_events.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

impl EventSink for MemoryStore {
    fn append(&self, event: &Event) -> Result<()> {
        if self.fail_events.load(Ordering::SeqCst) {
            return Err(ForgeError::Store("event log unavailable".to_string()));
        }
        self.events.lock().push(event.clone());
        Ok(())
    }
}

impl SkillStore for MemoryStore {
    fn put(&self, record: &SkillRecord) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ForgeError::Store("record store unavailable".to_string()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Notifier that keeps every message.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) -> Result<()> {
        if self.fail {
            return Err(ForgeError::Notification("channel down".to_string()));
        }
        self.messages.lock().push(message.to_string());
        Ok(())
    }
}

/// Publisher that keeps published skill names and returns fake URLs.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, record: &SkillRecord) -> Result<String> {
        if self.fail {
            return Err(ForgeError::Publish("github unavailable".to_string()));
        }
        self.published.lock().push(record.name.clone());
        Ok(format!(
            "https://github.com/acme/skills/blob/main/skills/{}/SKILL.md",
            record.name
        ))
    }
}
