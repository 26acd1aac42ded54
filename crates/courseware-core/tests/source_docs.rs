//! Source documentation runs: eligibility, fan-out and per-notebook timeouts.

use std::sync::Arc;
use std::time::Duration;

use courseware_core::{
    BuildConfig, CellLanguage, Collaborators, DocsOutcome, NotebookDef, Publisher,
    SourceDocsGenerator, DEFAULT_RENDER_TIMEOUT, VERSION_INFO_NOTEBOOK,
};
use courseware_ports::fakes::{
    FixedRepoInspector, MemoryWorkspace, RecordingRenderer, RecordingValidator,
};

const SOURCE_DIR: &str = "/Repos/ec/Source";

fn notebooks() -> Vec<NotebookDef> {
    vec![
        NotebookDef::new(VERSION_INFO_NOTEBOOK, CellLanguage::Python).with_test_round(2),
        NotebookDef::new("EC 01 - Intro", CellLanguage::Python).with_test_round(3),
        NotebookDef::new("EC 02 - Draft", CellLanguage::Python).with_test_round(1),
        NotebookDef::new("Labs/EC 03L - Lab", CellLanguage::Sql).with_test_round(2),
    ]
}

fn generator(renderer: &Arc<RecordingRenderer>) -> SourceDocsGenerator {
    SourceDocsGenerator::new(renderer.clone(), SOURCE_DIR, "1.2.3")
}

#[tokio::test(start_paused = true)]
async fn only_notebooks_past_two_test_rounds_are_rendered() {
    let renderer = Arc::new(RecordingRenderer::new());
    let report = generator(&renderer).generate(&notebooks(), true).await;

    assert_eq!(report.rendered(), 3);
    assert_eq!(report.skipped(), 1);
    assert!(report.failures().is_empty());
    assert_eq!(report.results[2].outcome, DocsOutcome::Skipped);

    let mut paths = renderer.rendered_paths();
    paths.sort();
    assert_eq!(
        paths,
        [
            "/Repos/ec/Source/EC 01 - Intro",
            "/Repos/ec/Source/Labs/EC 03L - Lab",
            "/Repos/ec/Source/Version Info",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn render_arguments_carry_version_and_docs_flag() {
    let renderer = Arc::new(RecordingRenderer::new());
    generator(&renderer)
        .generate(&notebooks()[..1], false)
        .await;

    let calls = renderer.render_calls();
    assert_eq!(calls.len(), 1);
    let (_, arguments) = &calls[0];
    assert_eq!(arguments.len(), 2);
    assert_eq!(arguments.get("version").map(String::as_str), Some("1.2.3"));
    assert_eq!(
        arguments.get("generating_docs").map(String::as_str),
        Some("true")
    );
}

#[tokio::test(start_paused = true)]
async fn slow_render_times_out_without_stopping_the_batch() {
    let renderer = Arc::new(
        RecordingRenderer::new().with_delay(Duration::from_secs(600), &["/Repos/ec/Source/EC 01 - Intro"]),
    );
    let report = generator(&renderer).generate(&notebooks(), true).await;

    assert_eq!(report.results[1].outcome, DocsOutcome::TimedOut);
    assert!(report.results[1].elapsed_ms >= DEFAULT_RENDER_TIMEOUT.as_millis() as u64);
    assert_eq!(report.results[0].outcome, DocsOutcome::Rendered);
    assert_eq!(report.results[3].outcome, DocsOutcome::Rendered);
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].path, "EC 01 - Intro");
}

#[tokio::test(start_paused = true)]
async fn custom_timeout_is_applied() {
    let renderer = Arc::new(RecordingRenderer::new().with_delay(Duration::from_secs(30), &[]));
    let report = generator(&renderer)
        .with_timeout(Duration::from_secs(10))
        .generate(&notebooks(), false)
        .await;

    assert_eq!(report.rendered(), 0);
    assert_eq!(report.failures().len(), 3);
    assert!(report
        .results
        .iter()
        .all(|r| matches!(r.outcome, DocsOutcome::TimedOut | DocsOutcome::Skipped)));
}

#[tokio::test(start_paused = true)]
async fn failed_render_is_recorded_per_notebook() {
    let renderer = Arc::new(RecordingRenderer::new().failing_on("/Repos/ec/Source/Labs/EC 03L - Lab"));
    let report = generator(&renderer).generate(&notebooks(), true).await;

    match &report.results[3].outcome {
        DocsOutcome::Failed { reason } => assert!(reason.contains("notebook run failed")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(report.rendered(), 2);
}

#[tokio::test(start_paused = true)]
async fn sequential_mode_renders_in_notebook_order() {
    let renderer = Arc::new(RecordingRenderer::new().with_delay(Duration::from_secs(1), &[]));
    let report = generator(&renderer).generate(&notebooks(), false).await;

    assert_eq!(
        renderer.rendered_paths(),
        [
            "/Repos/ec/Source/Version Info",
            "/Repos/ec/Source/EC 01 - Intro",
            "/Repos/ec/Source/Labs/EC 03L - Lab",
        ]
    );
    let paths: Vec<&str> = report.results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        [VERSION_INFO_NOTEBOOK, "EC 01 - Intro", "EC 02 - Draft", "Labs/EC 03L - Lab"]
    );
}

#[tokio::test(start_paused = true)]
async fn publisher_renders_without_stage_requirements() {
    let renderer = Arc::new(RecordingRenderer::new());
    let config = BuildConfig::builder("Example Course", "1.2.3", "/Repos/ec")
        .notebook(NotebookDef::new(VERSION_INFO_NOTEBOOK, CellLanguage::Python).with_test_round(2))
        .build()
        .unwrap();
    let ports = Collaborators::new(
        Arc::new(MemoryWorkspace::new()),
        Arc::new(FixedRepoInspector::new()),
        renderer.clone(),
        Arc::new(RecordingValidator::new()),
    );
    let publisher = Publisher::new(config, ports).with_docs_timeout(Duration::from_secs(1));

    let report = publisher.generate_source_docs(true).await;
    assert_eq!(report.rendered(), 1);
    assert_eq!(renderer.rendered_paths(), ["/Repos/ec/Source/Version Info"]);
}
