mod common;

use common::Harness;
use skill_forge::core::event::EventKind;
use skill_forge::core::outcome::FailureKind;
use skill_forge::core::run::RunStatus;
use skill_forge::storage::SkillDirWriter;
use skill_forge::test_utils::doubles::{
    RecordingPublisher, Reply, ScriptedBackend, ScriptedGenerator, ScriptedStep, StaticResearch,
};
use skill_forge::test_utils::fixtures::sample_skill_md;
use skill_forge::test_utils::logging::TestLogger;
use tempfile::tempdir;

use EventKind::{
    Drafting, Error, ResearchDone, ResearchStart, Saved, ValidatedFail, ValidatedOk, Validating,
};

fn docker_draft(third: &str) -> String {
    sample_skill_md(
        "docker-basics",
        "docker",
        &["docker --version", "docker pull alpine", third],
    )
}

#[test]
fn docker_skill_validates_on_second_attempt() {
    let log = TestLogger::new("docker_skill_validates_on_second_attempt");
    let harness = Harness::new(
        StaticResearch::with_sources(5),
        ScriptedGenerator::sequence(vec![
            Reply::Markdown(docker_draft("docker run --bogus-flag alpine")),
            Reply::Markdown(docker_draft("docker run --rm alpine echo hi")),
        ]),
        ScriptedBackend::failing_on("--bogus-flag"),
    );

    let run = harness.pipeline(3).run("docker");
    log.log_actual("status", &run.status);

    assert_eq!(run.status, RunStatus::Validated);
    assert_eq!(run.attempts_used(), 2);
    assert_eq!(run.sources_count(), 5);
    assert!(run.record_id.is_some());

    let first = &run.attempts()[0].outcome;
    assert!(!first.passed);
    assert_eq!(first.failing_step, Some(2));
    assert_eq!(first.results.len(), 3);

    log.step("event order");
    assert_eq!(
        harness.store.event_kinds(),
        vec![
            ResearchStart,
            ResearchDone,
            Drafting,
            Validating,
            ValidatedFail,
            Drafting,
            Validating,
            ValidatedOk,
            Saved,
        ]
    );

    log.step("refinement request carries the failure");
    let requests = harness.generator.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prior_failures.is_empty());
    let failure = &requests[1].prior_failures[0];
    assert_eq!(failure.failing_step, Some(2));
    assert_eq!(failure.step_number, Some(3));
    assert_eq!(failure.command.as_deref(), Some("docker run --bogus-flag alpine"));
    assert!(failure.output.contains("command failed"));

    let records = harness.store.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].validation_passed);
    assert_eq!(records[0].sources_count, 5);
    assert_eq!(records[0].attempts, 2);
    assert_eq!(records[0].topic, "docker");
    assert_eq!(harness.backend.provisions(), 2);
    assert_eq!(harness.backend.teardowns(), 2);
    log.pass();
}

#[test]
fn zero_sources_aborts_without_record() {
    let harness = Harness::new(
        StaticResearch::with_sources(0),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    );

    let run = harness.pipeline(3).run("obscure-topic");

    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.attempts_used(), 0);
    assert!(harness.store.records().is_empty());
    assert!(harness.generator.requests().is_empty());
    assert_eq!(harness.backend.provisions(), 0);
    assert_eq!(harness.store.event_kinds(), vec![ResearchStart, Error]);
    assert!(run.abort_reason.unwrap().contains("No sources"));
}

#[test]
fn research_failure_aborts() {
    let harness = Harness::new(
        StaticResearch::failing("search API returned 503"),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    );

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(harness.store.event_kinds(), vec![ResearchStart, Error]);
    let events = harness.store.events();
    assert!(events[1].message.contains("503"));
}

#[test]
fn exhausted_attempts_save_unvalidated() {
    let harness = Harness::new(
        StaticResearch::with_sources(3),
        ScriptedGenerator::repeating(&docker_draft("docker run --bogus-flag alpine")),
        ScriptedBackend::failing_on("--bogus-flag"),
    );

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::SavedUnvalidated);
    assert_eq!(run.attempts_used(), 3);
    assert!(!run.validation_passed());
    let records = harness.store.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].validation_passed);
    assert_eq!(records[0].attempts, 3);

    let kinds = harness.store.event_kinds();
    assert_eq!(kinds.iter().filter(|k| **k == ValidatedFail).count(), 3);
    assert_eq!(kinds.last(), Some(&Saved));
    assert_eq!(harness.generator.requests()[2].prior_failures.len(), 2);
}

#[test]
fn structural_failure_consumes_an_attempt() {
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::sequence(vec![
            Reply::Markdown("no frontmatter here".to_string()),
            Reply::Markdown(docker_draft("echo ok")),
        ]),
        ScriptedBackend::passing(),
    );

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Validated);
    assert_eq!(run.attempts_used(), 2);
    assert!(matches!(
        run.attempts()[0].outcome.failure,
        Some(FailureKind::Structural { .. })
    ));
    // Only the second draft reached the sandbox.
    assert_eq!(harness.backend.provisions(), 1);
}

#[test]
fn generator_failure_aborts_without_retry() {
    let harness = Harness::new(
        StaticResearch::with_sources(4),
        ScriptedGenerator::failing("model overloaded"),
        ScriptedBackend::passing(),
    );

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(harness.generator.requests().len(), 1);
    assert_eq!(
        harness.store.event_kinds(),
        vec![ResearchStart, ResearchDone, Drafting, Error]
    );
    assert!(harness.store.records().is_empty());
}

#[test]
fn generator_failure_during_refinement_aborts() {
    let harness = Harness::new(
        StaticResearch::with_sources(4),
        ScriptedGenerator::sequence(vec![
            Reply::Markdown(docker_draft("docker run --bogus-flag alpine")),
            Reply::Fail("rate limited".to_string()),
        ]),
        ScriptedBackend::failing_on("--bogus-flag"),
    );

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.attempts_used(), 1);
    assert!(harness.store.records().is_empty());
    assert_eq!(harness.store.event_kinds().last(), Some(&Error));
}

#[test]
fn timeout_counts_as_failed_attempt() {
    let harness = Harness::new(
        StaticResearch::with_sources(1),
        ScriptedGenerator::repeating(&docker_draft("sleep 600")),
        ScriptedBackend::new(|command| {
            if command.starts_with("sleep") {
                ScriptedStep::Timeout
            } else {
                ScriptedStep::Exit(0)
            }
        }),
    );

    let run = harness.pipeline(2).run("docker");

    assert_eq!(run.status, RunStatus::SavedUnvalidated);
    let outcome = &run.attempts()[0].outcome;
    assert!(outcome.results[2].timed_out);
    assert_eq!(harness.backend.teardowns(), harness.backend.provisions());
}

#[test]
fn sink_failures_do_not_stop_the_run() {
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    );
    harness.store.fail_event_appends(true);

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Validated);
    assert!(harness.store.events().is_empty());
    assert_eq!(harness.store.records().len(), 1);
    // Notifications still go out for every transition.
    assert_eq!(harness.notifier.messages().len(), 6);
}

#[test]
fn store_failure_keeps_status_and_reports_error() {
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    );
    harness.store.fail_puts(true);

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Validated);
    assert!(run.record_id.is_none());
    assert!(run.persist_error.is_some());
    assert_eq!(harness.store.event_kinds().last(), Some(&Error));
}

#[test]
fn saved_event_links_dashboard() {
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    );

    let _ = harness.pipeline(3).run("docker");

    let messages = harness.notifier.messages();
    let saved = messages.last().unwrap();
    assert!(saved.contains("📚 Saved: <code>docker-basics</code>"));
    assert!(saved.contains("https://forge.example"));
}

#[test]
fn saved_skill_is_published_and_linked() {
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    )
    .with_publisher(RecordingPublisher::default());

    let run = harness.pipeline(3).run("docker");

    let url = "https://github.com/acme/skills/blob/main/skills/docker-basics/SKILL.md";
    assert_eq!(run.published_url.as_deref(), Some(url));
    assert_eq!(
        harness.publisher.as_ref().unwrap().published(),
        vec!["docker-basics".to_string()]
    );
    let saved = harness.store.events().into_iter().last().unwrap();
    assert_eq!(saved.kind, Saved);
    assert_eq!(saved.meta_str("github_url"), Some(url));
    let message = harness.notifier.messages().pop().unwrap();
    assert!(message.contains("View on GitHub"));
    assert!(!message.contains("https://forge.example"));
}

#[test]
fn publish_failure_keeps_the_record_saved() {
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    )
    .with_publisher(RecordingPublisher::failing());

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Validated);
    assert!(run.record_id.is_some());
    assert!(run.published_url.is_none());
    assert_eq!(harness.store.records().len(), 1);
    let saved = harness.store.events().into_iter().last().unwrap();
    assert_eq!(saved.kind, Saved);
    assert_eq!(saved.meta_str("github_url"), None);
    assert!(harness.notifier.messages().pop().unwrap().contains("https://forge.example"));
}

#[test]
fn saved_skill_is_written_to_disk() {
    let dir = tempdir().unwrap();
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    )
    .with_skill_dir(SkillDirWriter::new(dir.path()));

    let run = harness.pipeline(3).run("docker");

    assert_eq!(run.status, RunStatus::Validated);
    let written = std::fs::read_to_string(dir.path().join("docker-basics/SKILL.md")).unwrap();
    assert!(written.contains("validation_passed: true"));
}

#[test]
fn runs_are_independent() {
    let harness = Harness::new(
        StaticResearch::with_sources(2),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    );
    let pipeline = harness.pipeline(3);

    let first = pipeline.run("docker");
    let second = pipeline.run("docker");

    assert_ne!(first.id, second.id);
    assert_eq!(second.attempts_used(), 1);
    assert_eq!(harness.store.records().len(), 2);
}

#[test]
fn concurrent_runs_keep_their_own_state() {
    let harness = Harness::new(
        StaticResearch::with_sources(3),
        ScriptedGenerator::repeating(&docker_draft("echo ok")),
        ScriptedBackend::passing(),
    );
    let pipeline = harness.pipeline(3);
    let topics: Vec<String> = ["docker", "kubectl", "terraform", "helm"]
        .iter()
        .map(ToString::to_string)
        .collect();

    let runs = pipeline.run_many(&topics, 2).unwrap();

    assert_eq!(runs.len(), 4);
    for (run, topic) in runs.iter().zip(&topics) {
        assert_eq!(&run.topic, topic);
        assert_eq!(run.status, RunStatus::Validated);
    }
    let records = harness.store.records();
    assert_eq!(records.len(), 4);
    assert_eq!(harness.backend.provisions(), 4);
    assert_eq!(harness.backend.teardowns(), 4);
    for topic in &topics {
        let kinds: Vec<EventKind> = harness
            .store
            .events()
            .into_iter()
            .filter(|e| &e.topic == topic)
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![ResearchStart, ResearchDone, Drafting, Validating, ValidatedOk, Saved]
        );
    }
}

#[test]
fn sqlite_database_records_the_run() {
    use std::sync::Arc;
    use std::time::Duration;

    use skill_forge::pipeline::{Collaborators, Pipeline, PipelineOptions};
    use skill_forge::storage::Database;
    use skill_forge::test_utils::fixtures::UnitTestFixture;

    let fixture = UnitTestFixture::new();
    let db = Arc::new(Database::open(fixture.db_path()).unwrap());
    let pipeline = Pipeline::new(
        Collaborators {
            research: Arc::new(StaticResearch::with_sources(3)),
            generator: Arc::new(ScriptedGenerator::repeating(&docker_draft("echo ok"))),
            sandbox: Arc::new(ScriptedBackend::passing()),
            events: db.clone(),
            store: db.clone(),
            notifier: None,
            skill_dir: Some(SkillDirWriter::new(fixture.data_path.join("skills"))),
            publisher: None,
        },
        &PipelineOptions {
            max_attempts: 2,
            per_command_timeout: Duration::from_secs(1),
            total_timeout: Duration::from_secs(10),
            dashboard_url: None,
        },
    );

    let run = pipeline.run("docker");

    assert_eq!(run.status, RunStatus::Validated);
    let saved = db.get_skill("docker-basics").unwrap().unwrap();
    assert_eq!(Some(saved.id), run.record_id);
    assert_eq!(saved.sources_count, 3);
    assert_eq!(db.list_events(Some("docker"), 50).unwrap().len(), 6);
    assert!(fixture.data_path.join("skills/docker-basics/SKILL.md").exists());
}
