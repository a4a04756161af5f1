//! End-to-end pipeline runs with the default analyzer set over realistic
//! crash-log fixtures.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use scanner111::core::context::InMemorySettings;
use scanner111::core::pipeline::{
    AnalysisPipeline, AnalysisRequest, PipelineOptions, RequestState,
};
use scanner111::core::Game;
use scanner111::io::reports::{ReportFormat, ReportOptions};

const CRASH_LOG: &str = "\
Fallout 4 v1.10.163
Buffout 4 v1.26.2

Unhandled exception \"EXCEPTION_ACCESS_VIOLATION\" at 0x7FF6D4F5F2C7

SYSTEM SPECS:
\tOS: Microsoft Windows 10 Pro v10.0.19045
\tCPU: GenuineIntel 12th Gen Intel(R) Core(TM) i7-12700K

PLUGINS:
\t[00]     Fallout4.esm
\t[01]     DLCRobot.esm
\t[02]     DLCCoast.esm
\t[FE:000] ccbgsfo4001-pipboy(black).esl
\t[08]     UnofficialFallout4Patch.esp
";

fn write_crash_log(dir: &Path) -> PathBuf {
    let path = dir.join("crash-2024-05-14-12-00-00.log");
    std::fs::write(&path, CRASH_LOG).expect("write crash log");
    path
}

fn settings_with_plugins_dir(plugins_dir: &Path) -> Arc<InMemorySettings> {
    let settings = InMemorySettings::new();
    settings.set("xse_plugins_dir", plugins_dir.to_string_lossy());
    Arc::new(settings)
}

#[tokio::test]
async fn default_pipeline_produces_autoscan_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = write_crash_log(dir.path());

    let pipeline = AnalysisPipeline::builder()
        .with_default_analyzers()
        .options(PipelineOptions::default())
        .build();

    let outcome = pipeline
        .run_one(AnalysisRequest::new(&log).with_game(Game::Fallout4))
        .await
        .expect("pipeline run");

    assert_eq!(outcome.state, RequestState::Completed);
    assert!(outcome.report.contains("Crash Header"));
    assert!(outcome.report.contains("Buffout 4"));
    assert!(outcome.report.contains("EXCEPTION_ACCESS_VIOLATION"));
    assert!(outcome.report.contains("5 plugins loaded"));

    let report_path = outcome.report_path.expect("report file written");
    assert!(report_path
        .file_name()
        .expect("name")
        .to_string_lossy()
        .ends_with("-AUTOSCAN.md"));
    let on_disk = std::fs::read_to_string(&report_path).expect("report readable");
    assert_eq!(on_disk, outcome.report);
}

#[tokio::test]
async fn settings_conflicts_flow_into_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = write_crash_log(dir.path());

    let plugins = dir.path().join("Plugins");
    let buffout = plugins.join("Buffout4");
    std::fs::create_dir_all(&buffout).expect("dirs");
    std::fs::write(
        buffout.join("config.toml"),
        "[Patches]\nAchievements = true\nMemoryManager = true\n",
    )
    .expect("config");
    std::fs::write(plugins.join("achievements.dll"), b"MZ").expect("dll");
    std::fs::write(plugins.join("x-cell-fo4.dll"), b"MZ").expect("dll");

    let pipeline = AnalysisPipeline::builder()
        .with_default_analyzers()
        .settings(settings_with_plugins_dir(&plugins))
        .options(PipelineOptions {
            write_report_file: false,
            ..PipelineOptions::default()
        })
        .build();

    let outcome = pipeline
        .run_one(AnalysisRequest::new(&log).with_game(Game::Fallout4))
        .await
        .expect("pipeline run");

    assert_eq!(outcome.state, RequestState::Completed);
    assert!(
        outcome.report.contains("Achievements"),
        "settings analyzer reports the achievements conflict:\n{}",
        outcome.report
    );
    assert!(
        outcome.report.contains("MemoryManager"),
        "memory analyzer reports the X-Cell conflict:\n{}",
        outcome.report
    );
    assert!(outcome.report.contains("Memory Management"));
}

#[tokio::test]
async fn batch_of_logs_each_get_their_own_outcome() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut requests = Vec::new();
    for n in 0..4 {
        let path = dir.path().join(format!("crash-{n}.log"));
        std::fs::write(&path, CRASH_LOG).expect("write");
        requests.push(AnalysisRequest::new(&path).with_game(Game::Fallout4));
    }

    let pipeline = AnalysisPipeline::builder()
        .with_default_analyzers()
        .options(PipelineOptions {
            write_report_file: false,
            ..PipelineOptions::default()
        })
        .build();

    let run = pipeline
        .run(requests, &scanner111::concurrency::CancelToken::never())
        .await
        .expect("batch run");

    assert_eq!(run.outcomes.len(), 4);
    assert!(run.outcomes.iter().all(|o| o.is_success()));
    assert_eq!(run.metrics.load.items_processed, 4);
    assert_eq!(run.metrics.compose.items_processed, 4);
}

#[tokio::test]
async fn json_report_format_is_parseable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = write_crash_log(dir.path());

    let pipeline = AnalysisPipeline::builder()
        .with_default_analyzers()
        .options(PipelineOptions {
            write_report_file: false,
            report: ReportOptions {
                format: ReportFormat::Json,
                ..ReportOptions::default()
            },
            ..PipelineOptions::default()
        })
        .build();

    let outcome = pipeline
        .run_one(AnalysisRequest::new(&log))
        .await
        .expect("pipeline run");

    let parsed: serde_json::Value =
        serde_json::from_str(&outcome.report).expect("JSON report parses");
    assert!(parsed["title"].as_str().expect("title").contains("crash-"));
    assert!(parsed["fragments"].is_array());
}

#[tokio::test]
async fn non_crash_log_degrades_to_a_warning_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("random.log");
    std::fs::write(&path, "this is not a crash log\n").expect("write");

    let pipeline = AnalysisPipeline::builder()
        .with_default_analyzers()
        .options(PipelineOptions {
            write_report_file: false,
            ..PipelineOptions::default()
        })
        .build();

    let outcome = pipeline
        .run_one(AnalysisRequest::new(&path))
        .await
        .expect("pipeline run");

    assert_eq!(outcome.state, RequestState::Completed);
    assert!(outcome
        .report
        .contains("does not look like a crash-generator log"));
}
