//! Pipeline executor: Load → Analyze → Compose over bounded channels.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analyzers::default_analyzers;
use crate::concurrency::cancel::CancelToken;
use crate::core::analyzer::{AnalysisResult, Analyzer};
use crate::core::context::{keys, AnalysisContext, InMemorySettings, SettingsProvider};
use crate::core::errors::{Result, ScannerError};
use crate::core::Game;
use crate::io::mmap::{MmapAccess, MmapFileHandler};
use crate::io::reports::{ReportComposer, ReportOptions};

use super::config::{ExecutionStrategy, PipelineOptions};
use super::metrics::{MetricsSnapshot, PipelineMetrics};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// One unit of pipeline input: a crash log to analyze.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Request identity, carried through to the outcome.
    pub id: Uuid,
    /// Crash-log path.
    pub input_path: PathBuf,
    /// Target game, when the caller knows it.
    pub game: Option<Game>,
    /// When present, only analyzers named here run.
    pub enabled_analyzers: Option<HashSet<String>>,
}

impl AnalysisRequest {
    /// Request analysis of one crash log.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_path: input_path.into(),
            game: None,
            enabled_analyzers: None,
        }
    }

    /// Pin the target game.
    #[must_use]
    pub fn with_game(mut self, game: Game) -> Self {
        self.game = Some(game);
        self
    }

    /// Restrict the analyzer set by name.
    #[must_use]
    pub fn with_analyzers<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled_analyzers = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Terminal (and transit) states of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Accepted, not yet loaded.
    Created,
    /// Input resolved to content.
    Loaded,
    /// Analyzer groups running.
    Analyzing,
    /// Report being composed.
    Composing,
    /// Finished; report produced.
    Completed,
    /// Pipeline-level failure for this request.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
}

/// Final product of one request.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Identity of the originating request.
    pub request_id: Uuid,
    /// The analyzed input.
    pub input_path: PathBuf,
    /// Terminal state.
    pub state: RequestState,
    /// Rendered report. Always present; failures render too.
    pub report: String,
    /// Individual analyzer results.
    pub results: Vec<AnalysisResult>,
    /// Request-level error strings.
    pub errors: Vec<String>,
    /// Where the report file was written, when it was.
    pub report_path: Option<PathBuf>,
}

impl AnalysisOutcome {
    /// True when the request completed (individual analyzers may still have
    /// failed under continue-on-error).
    pub fn is_success(&self) -> bool {
        self.state == RequestState::Completed
    }
}

/// Everything a finished run returns.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Per-request outcomes, in completion order.
    pub outcomes: Vec<AnalysisOutcome>,
    /// Frozen pipeline metrics.
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Clone)]
enum ItemStatus {
    Ok,
    Failed(String),
    Cancelled,
}

struct LoadedItem {
    request: AnalysisRequest,
    context: AnalysisContext,
    status: ItemStatus,
}

struct AnalyzedItem {
    request: AnalysisRequest,
    results: Vec<AnalysisResult>,
    status: ItemStatus,
}

/// Builder for [`AnalysisPipeline`].
pub struct AnalysisPipelineBuilder {
    analyzers: Vec<Arc<dyn Analyzer>>,
    options: PipelineOptions,
    settings: Arc<dyn SettingsProvider>,
    mmap: MmapFileHandler,
}

impl Default for AnalysisPipelineBuilder {
    fn default() -> Self {
        Self {
            analyzers: Vec::new(),
            options: PipelineOptions::default(),
            settings: Arc::new(InMemorySettings::new()),
            mmap: MmapFileHandler::new(),
        }
    }
}

impl AnalysisPipelineBuilder {
    /// Register the built-in analyzer set.
    #[must_use]
    pub fn with_default_analyzers(mut self) -> Self {
        self.analyzers.extend(default_analyzers());
        self
    }

    /// Register one analyzer.
    #[must_use]
    pub fn analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    /// Set the pipeline options.
    #[must_use]
    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the settings provider handed to every request context.
    #[must_use]
    pub fn settings(mut self, settings: Arc<dyn SettingsProvider>) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing mmap pool.
    #[must_use]
    pub fn mmap(mut self, mmap: MmapFileHandler) -> Self {
        self.mmap = mmap;
        self
    }

    /// Finish the builder.
    pub fn build(self) -> AnalysisPipeline {
        AnalysisPipeline {
            analyzers: Arc::new(self.analyzers),
            options: self.options,
            settings: self.settings,
            mmap: self.mmap,
            metrics: Arc::new(PipelineMetrics::default()),
        }
    }
}

/// The staged analysis pipeline.
pub struct AnalysisPipeline {
    analyzers: Arc<Vec<Arc<dyn Analyzer>>>,
    options: PipelineOptions,
    settings: Arc<dyn SettingsProvider>,
    mmap: MmapFileHandler,
    metrics: Arc<PipelineMetrics>,
}

impl AnalysisPipeline {
    /// Start building a pipeline.
    pub fn builder() -> AnalysisPipelineBuilder {
        AnalysisPipelineBuilder::default()
    }

    /// Registered analyzer names, in registration order.
    pub fn analyzer_names(&self) -> Vec<&str> {
        self.analyzers.iter().map(|a| a.name()).collect()
    }

    /// Run one request to completion without external cancellation.
    pub async fn run_one(&self, request: AnalysisRequest) -> Result<AnalysisOutcome> {
        let run = self.run(vec![request], &CancelToken::never()).await?;
        run.outcomes
            .into_iter()
            .next()
            .ok_or_else(|| ScannerError::internal("pipeline produced no outcome"))
    }

    /// Run a batch of requests through the three stages. An empty batch
    /// succeeds with zero outcomes. One request failing never stops the
    /// others; caller cancellation stops everything cooperatively.
    pub async fn run(
        &self,
        requests: Vec<AnalysisRequest>,
        cancel: &CancelToken,
    ) -> Result<PipelineRun> {
        self.options.validate()?;
        let started = Instant::now();

        if requests.is_empty() {
            return Ok(PipelineRun {
                outcomes: Vec::new(),
                metrics: self.metrics.snapshot(started.elapsed()),
            });
        }

        info!(requests = requests.len(), strategy = ?self.options.strategy, "pipeline run starting");

        let capacity = self.options.bounded_capacity;
        let (loaded_tx, loaded_rx) = mpsc::channel::<LoadedItem>(capacity);
        let (analyzed_tx, analyzed_rx) = mpsc::channel::<AnalyzedItem>(capacity);

        let load = tokio::spawn(load_stage(
            requests,
            loaded_tx,
            self.mmap.clone(),
            Arc::clone(&self.settings),
            self.options.clone(),
            Arc::clone(&self.metrics),
            cancel.clone(),
        ));
        let analyze = tokio::spawn(analyze_stage(
            loaded_rx,
            analyzed_tx,
            Arc::clone(&self.analyzers),
            self.options.clone(),
            Arc::clone(&self.metrics),
            cancel.clone(),
        ));
        let compose = tokio::spawn(compose_stage(
            analyzed_rx,
            self.options.clone(),
            Arc::clone(&self.metrics),
        ));

        let (load_done, analyze_done, outcomes) = tokio::join!(load, analyze, compose);
        load_done.map_err(|e| ScannerError::concurrency(format!("load stage lost: {e}")))?;
        analyze_done
            .map_err(|e| ScannerError::concurrency(format!("analyze stage lost: {e}")))?;
        let outcomes = outcomes
            .map_err(|e| ScannerError::concurrency(format!("compose stage lost: {e}")))?;

        info!(
            outcomes = outcomes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline run finished"
        );

        Ok(PipelineRun {
            outcomes,
            metrics: self.metrics.snapshot(started.elapsed()),
        })
    }
}

async fn load_stage(
    requests: Vec<AnalysisRequest>,
    tx: mpsc::Sender<LoadedItem>,
    mmap: MmapFileHandler,
    settings: Arc<dyn SettingsProvider>,
    options: PipelineOptions,
    metrics: Arc<PipelineMetrics>,
    cancel: CancelToken,
) {
    let batched = options.strategy == ExecutionStrategy::Batched;
    for (index, request) in requests.into_iter().enumerate() {
        let started = Instant::now();
        let context = AnalysisContext::new(
            request.input_path.clone(),
            request.game,
            Arc::clone(&settings),
        );

        let status = if cancel.is_cancelled() {
            ItemStatus::Cancelled
        } else {
            match mmap.open(&request.input_path, MmapAccess::Read) {
                Ok(handle) => {
                    let bytes = handle.read_all();
                    let (content, _, _) = encoding_rs::UTF_8.decode(&bytes);
                    context.set(keys::LOG_CONTENT, content.into_owned());
                    debug!(path = %request.input_path.display(), bytes = bytes.len(), "input loaded");
                    ItemStatus::Ok
                }
                Err(err) => {
                    warn!(path = %request.input_path.display(), error = %err, "input rejected");
                    ItemStatus::Failed(format!("failed to load input: {err}"))
                }
            }
        };

        metrics.load.record(started.elapsed());
        if tx
            .send(LoadedItem {
                request,
                context,
                status,
            })
            .await
            .is_err()
        {
            break;
        }

        if batched && (index + 1) % options.batch_size == 0 {
            tokio::task::yield_now().await;
        }
    }
}

async fn analyze_stage(
    mut rx: mpsc::Receiver<LoadedItem>,
    tx: mpsc::Sender<AnalyzedItem>,
    analyzers: Arc<Vec<Arc<dyn Analyzer>>>,
    options: PipelineOptions,
    metrics: Arc<PipelineMetrics>,
    cancel: CancelToken,
) {
    while let Some(item) = rx.recv().await {
        let started = Instant::now();

        let analyzed = match item.status {
            ItemStatus::Ok if cancel.is_cancelled() => AnalyzedItem {
                request: item.request,
                results: Vec::new(),
                status: ItemStatus::Cancelled,
            },
            ItemStatus::Ok => {
                let (results, status) = run_request_analyzers(
                    &item.context,
                    item.request.enabled_analyzers.as_ref(),
                    &analyzers,
                    &options,
                    &metrics,
                    &cancel,
                )
                .await;
                AnalyzedItem {
                    request: item.request,
                    results,
                    status,
                }
            }
            status => AnalyzedItem {
                request: item.request,
                results: Vec::new(),
                status,
            },
        };

        metrics.analyze.record(started.elapsed());
        if tx.send(analyzed).await.is_err() {
            break;
        }
    }
}

fn partition_analyzers(
    analyzers: Vec<Arc<dyn Analyzer>>,
    strategy: ExecutionStrategy,
) -> Vec<Vec<Arc<dyn Analyzer>>> {
    match strategy {
        ExecutionStrategy::Sequential => {
            let mut sorted = analyzers;
            sorted.sort_by_key(|a| a.priority());
            sorted.into_iter().map(|a| vec![a]).collect()
        }
        ExecutionStrategy::Parallel => vec![analyzers],
        ExecutionStrategy::Prioritized | ExecutionStrategy::Batched => {
            let mut groups: BTreeMap<i32, Vec<Arc<dyn Analyzer>>> = BTreeMap::new();
            for analyzer in analyzers {
                groups.entry(analyzer.priority()).or_default().push(analyzer);
            }
            groups.into_values().collect()
        }
    }
}

async fn run_request_analyzers(
    context: &AnalysisContext,
    enabled: Option<&HashSet<String>>,
    analyzers: &Arc<Vec<Arc<dyn Analyzer>>>,
    options: &PipelineOptions,
    metrics: &Arc<PipelineMetrics>,
    cancel: &CancelToken,
) -> (Vec<AnalysisResult>, ItemStatus) {
    let selected: Vec<Arc<dyn Analyzer>> = analyzers
        .iter()
        .filter(|analyzer| enabled.map_or(true, |set| set.contains(analyzer.name())))
        .cloned()
        .collect();

    let groups = partition_analyzers(selected, options.strategy);
    let parallelism = match options.strategy {
        ExecutionStrategy::Sequential => 1,
        _ => options.max_analysis_parallelism,
    };
    let gate = Arc::new(Semaphore::new(parallelism.max(1)));

    let mut results = Vec::new();
    for group in groups {
        if cancel.is_cancelled() {
            return (results, ItemStatus::Cancelled);
        }

        let mut handles = Vec::with_capacity(group.len());
        for analyzer in group {
            let gate = Arc::clone(&gate);
            let ctx = context.clone();
            let token = cancel.clone();
            let timeout = analyzer.timeout().unwrap_or(options.global_timeout);
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire_owned().await.ok();
                run_one_analyzer(analyzer, ctx, timeout, token).await
            }));
        }

        for handle in handles {
            let result = handle.await.unwrap_or_else(|e| {
                AnalysisResult::failure("unknown", format!("analyzer task lost: {e}"))
            });
            metrics.record_analyzer(&result.analyzer_name, result.duration, !result.success);
            results.push(result);
        }

        if cancel.is_cancelled() {
            return (results, ItemStatus::Cancelled);
        }
        if !options.continue_on_error && results.iter().any(|r| !r.success) {
            return (
                results,
                ItemStatus::Failed(
                    "an analyzer failed and continue-on-error is disabled".to_string(),
                ),
            );
        }
        if results.iter().any(|r| r.skip_further_processing) {
            debug!("skip requested; later priority groups not run");
            break;
        }
    }

    (results, ItemStatus::Ok)
}

async fn run_one_analyzer(
    analyzer: Arc<dyn Analyzer>,
    ctx: AnalysisContext,
    timeout: Duration,
    cancel: CancelToken,
) -> AnalysisResult {
    let name = analyzer.name().to_string();
    let started = Instant::now();

    let mut handle = tokio::spawn(async move { analyzer.analyze(&ctx).await });

    let result = tokio::select! {
        joined = tokio::time::timeout(timeout, &mut handle) => match joined {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(err))) if err.is_cancelled() => {
                AnalysisResult::failure(&name, "cancelled")
            }
            Ok(Ok(Err(err))) => {
                warn!(analyzer = %name, error = %err, "analyzer returned an error");
                AnalysisResult::failure(&name, err.to_string())
            }
            Ok(Err(join_err)) if join_err.is_panic() => {
                warn!(analyzer = %name, "analyzer panicked");
                AnalysisResult::failure(&name, "analyzer panicked")
            }
            Ok(Err(_)) => AnalysisResult::failure(&name, "analyzer task aborted"),
            Err(_) => {
                handle.abort();
                warn!(analyzer = %name, timeout_ms = timeout.as_millis() as u64, "analyzer timed out");
                AnalysisResult::failure(&name, "timed out")
            }
        },
        () = cancel.cancelled() => {
            handle.abort();
            AnalysisResult::failure(&name, "cancelled")
        }
    };

    result.with_duration(started.elapsed())
}

async fn compose_stage(
    mut rx: mpsc::Receiver<AnalyzedItem>,
    options: PipelineOptions,
    metrics: Arc<PipelineMetrics>,
) -> Vec<AnalysisOutcome> {
    let mut outcomes = Vec::new();
    while let Some(item) = rx.recv().await {
        let started = Instant::now();
        let outcome = compose_one(item, &options).await;
        metrics.compose.record(started.elapsed());
        outcomes.push(outcome);
    }
    outcomes
}

async fn compose_one(item: AnalyzedItem, options: &PipelineOptions) -> AnalysisOutcome {
    let file_name = item
        .request
        .input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| item.request.input_path.display().to_string());

    let mut report_options: ReportOptions = options.report.clone();
    if report_options.title.is_none() {
        report_options.title = Some(format!("Scanner111 Analysis: {file_name}"));
    }

    let mut results = item.results;
    let mut errors: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .flat_map(|r| r.errors.iter().cloned())
        .collect();

    let state = match &item.status {
        ItemStatus::Ok => RequestState::Completed,
        ItemStatus::Failed(message) => {
            errors.push(message.clone());
            results.push(AnalysisResult::failure("pipeline", message.clone()));
            RequestState::Failed
        }
        ItemStatus::Cancelled => {
            errors.push("cancelled".to_string());
            results.push(AnalysisResult::failure("pipeline", "cancelled"));
            RequestState::Cancelled
        }
    };

    let report = match ReportComposer::compose_report(&results, &report_options) {
        Ok(report) => report,
        Err(err) => {
            // The report must always render; degrade to a plain fallback.
            warn!(error = %err, "report rendering failed");
            format!("report rendering failed: {err}\n")
        }
    };

    let report_path = if options.write_report_file && state == RequestState::Completed {
        write_report_file(&item.request.input_path, &report).await
    } else {
        None
    };

    AnalysisOutcome {
        request_id: item.request.id,
        input_path: item.request.input_path,
        state,
        report,
        results,
        errors,
        report_path,
    }
}

/// Derive the report path beside the input: `crash.log` → `crash-AUTOSCAN.md`.
pub fn report_path_for(input: &Path) -> Option<PathBuf> {
    let name = input.file_name()?.to_str()?;
    if !name.to_lowercase().ends_with(".log") {
        return None;
    }
    let stem = &name[..name.len() - 4];
    Some(input.with_file_name(format!("{stem}-AUTOSCAN.md")))
}

async fn write_report_file(input: &Path, report: &str) -> Option<PathBuf> {
    let path = report_path_for(input)?;
    match tokio::fs::write(&path, report.as_bytes()).await {
        Ok(()) => {
            debug!(path = %path.display(), "report written");
            Some(path)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to write report file");
            None
        }
    }
}
