#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use skill_forge::pipeline::{Collaborators, Pipeline, PipelineOptions};
use skill_forge::storage::SkillDirWriter;
use skill_forge::test_utils::doubles::{
    MemoryStore, RecordingNotifier, RecordingPublisher, ScriptedBackend, ScriptedGenerator, StaticResearch,
};

/// In-memory collaborators plus handles for inspecting them afterwards.
pub struct Harness {
    pub research: Arc<StaticResearch>,
    pub generator: Arc<ScriptedGenerator>,
    pub backend: ScriptedBackend,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub skill_dir: Option<SkillDirWriter>,
    pub publisher: Option<Arc<RecordingPublisher>>,
}

impl Harness {
    pub fn new(research: StaticResearch, generator: ScriptedGenerator, backend: ScriptedBackend) -> Self {
        Self {
            research: Arc::new(research),
            generator: Arc::new(generator),
            backend,
            store: Arc::new(MemoryStore::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            skill_dir: None,
            publisher: None,
        }
    }

    pub fn with_skill_dir(mut self, writer: SkillDirWriter) -> Self {
        self.skill_dir = Some(writer);
        self
    }

    pub fn with_publisher(mut self, publisher: RecordingPublisher) -> Self {
        self.publisher = Some(Arc::new(publisher));
        self
    }

    pub fn pipeline(&self, max_attempts: usize) -> Pipeline {
        let collaborators = Collaborators {
            research: self.research.clone(),
            generator: self.generator.clone(),
            sandbox: Arc::new(self.backend.clone()),
            events: self.store.clone(),
            store: self.store.clone(),
            notifier: Some(self.notifier.clone()),
            skill_dir: self.skill_dir.clone(),
            publisher: self
                .publisher
                .clone()
                .map(|p| p as Arc<dyn skill_forge::publish::Publisher>),
        };
        Pipeline::new(
            collaborators,
            &PipelineOptions {
                max_attempts,
                per_command_timeout: Duration::from_secs(5),
                total_timeout: Duration::from_secs(60),
                dashboard_url: Some("https://forge.example".to_string()),
            },
        )
    }
}
