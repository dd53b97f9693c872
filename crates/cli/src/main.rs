//! Newsdesk CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `newsdesk.toml` (or `--config`) and validate it.
//! 2. **Wire observability**: install `tracing-subscriber` with a pretty or JSON
//!    layer and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, an OTLP exporter.
//! 3. **Construct infrastructure**: Gemini, NewsAPI, RSS, Tavily, the page
//!    fetcher, and the history file, injected into a [`nodes::NewsPipeline`].
//! 4. **Select mode**:
//!    - `newsdesk [REGION]` runs once and writes the output document.
//!    - `newsdesk serve` starts the HTTP surface.
//!
//! A failed run exits non-zero and writes neither the output nor the history.

mod config;
mod telemetry;
mod wiring;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nodes::{write_output, NewsPipeline};
use pipeline::Region;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::telemetry::LogFormat;
use crate::wiring::{build_pipeline, Secrets};

#[derive(Debug, Parser)]
#[command(name = "newsdesk", version, about = "Autonomous news desk: trends in, fact-checked articles out")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Region to cover (see `[regions]` in the configuration).
    #[arg(default_value = Region::GLOBAL)]
    region: String,

    /// Where to write the output document.
    #[arg(long, default_value = "data/output.json")]
    output: PathBuf,

    /// Configuration file; a missing file means defaults.
    #[arg(long, env = "NEWSDESK_CONFIG", default_value = "newsdesk.toml", global = true)]
    config: PathBuf,

    /// History file of titles already covered.
    #[arg(long, default_value = "data/history.json", global = true)]
    history: PathBuf,

    /// Console log format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve `GET /` and `POST /run?region=<r>`.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "NEWSDESK_BIND", default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("newsdesk: could not load .env: {e}");
        }
    }

    let telemetry = match telemetry::init(cli.log_format) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("newsdesk: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = run(cli).await;
    if let Err(e) = &result {
        error!(error = %format!("{e:#}"), "newsdesk failed");
        eprintln!("newsdesk: {e:#}");
    }
    telemetry.shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = config::load(&cli.config)?;
    let pipeline = Arc::new(build_pipeline(&config, Secrets::from_env(), &cli.history)?);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    match cli.command {
        Some(Command::Serve { bind }) => {
            let state = server::AppState::new(pipeline, cancel);
            server::serve(bind, state)
                .await
                .with_context(|| format!("HTTP server on {bind} failed"))
        }
        None => {
            let region = Region::new(cli.region).unwrap_or_else(Region::global);
            run_once(&pipeline, &region, &cli.output, cancel).await
        }
    }
}

async fn run_once(
    pipeline: &NewsPipeline,
    region: &Region,
    output_path: &Path,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    info!(region = %region, "starting news desk run");
    let report = pipeline
        .run_detailed(region, cancel)
        .await
        .context("pipeline run failed")?;
    let output = &report.output;

    write_output(output_path, output)
        .await
        .with_context(|| format!("could not write {}", output_path.display()))?;
    info!(
        path = %output_path.display(),
        articles = output.articles.len(),
        evaluation_score = output.evaluation_score,
        execution_time_seconds = output.execution_time_seconds,
        "output written"
    );

    // History only moves once the output is on disk.
    if let Err(e) = pipeline.record_history(&report).await {
        warn!(error = %e, "could not record covered titles in history");
    }
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "could not listen for interrupts"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nodes::{Collaborators, JsonFileHistoryStore};
    use pipeline::{
        Article, ArticleEvaluator, ArticleGenerator, ArticleVerifier, CallError, FeedQuery,
        HallucinationCheck, PipelineConfig, ResearchResult, Researcher, RunContext, Trend,
        TrendSelector, TrendSource,
    };

    struct Headlines;

    #[async_trait]
    impl TrendSource for Headlines {
        async fn fetch_trends(&self, _: &FeedQuery) -> Result<Vec<Trend>, CallError> {
            Ok(vec![
                Trend::new("Rates hold", "RSS Feed"),
                Trend::new("Storm lands", "RSS Feed"),
            ])
        }
    }

    struct TakeAll;

    #[async_trait]
    impl TrendSelector for TakeAll {
        async fn select(&self, trends: &[Trend], _: &[String], _: &RunContext) -> Vec<Trend> {
            trends.to_vec()
        }
    }

    struct OneSnippet;

    #[async_trait]
    impl Researcher for OneSnippet {
        async fn research(&self, trend: &Trend, _: &RunContext) -> ResearchResult {
            ResearchResult::for_trend(trend, vec!["facts".into()], vec![])
        }
    }

    struct Drafts;

    #[async_trait]
    impl ArticleGenerator for Drafts {
        async fn generate(
            &self,
            research: &ResearchResult,
            _: Option<&str>,
            _: &RunContext,
        ) -> Option<Article> {
            let mut article = Article::placeholder(research);
            article.article_body = format!("draft about {}", research.trend_title);
            article.hallucination_check = HallucinationCheck::Unsure;
            Some(article)
        }
    }

    struct Approve;

    #[async_trait]
    impl ArticleVerifier for Approve {
        async fn verify(&self, mut article: Article, _: &ResearchResult, _: &RunContext) -> Article {
            article.hallucination_check = HallucinationCheck::Pass;
            article
        }
    }

    struct Seven;

    #[async_trait]
    impl ArticleEvaluator for Seven {
        async fn evaluate(&self, _: &[Article], _: &RunContext) -> f64 {
            7.0
        }
    }

    fn offline_pipeline(history: &Path) -> NewsPipeline {
        let collaborators = Collaborators {
            source: Arc::new(Headlines),
            selector: Arc::new(TakeAll),
            researcher: Arc::new(OneSnippet),
            generator: Arc::new(Drafts),
            verifier: Arc::new(Approve),
            evaluator: Arc::new(Seven),
        };
        NewsPipeline::from_config(
            &PipelineConfig::default(),
            collaborators,
            Arc::new(JsonFileHistoryStore::new(history)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn run_once_writes_output_then_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("history.json");
        let output = dir.path().join("data").join("output.json");

        run_once(
            &offline_pipeline(&history),
            &Region::global(),
            &output,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        let document: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(document["articles"].as_array().unwrap().len(), 2);
        assert_eq!(document["evaluation_score"], 7.0);
        let titles: Vec<String> =
            serde_json::from_str(&std::fs::read_to_string(&history).unwrap()).unwrap();
        assert_eq!(titles, vec!["Rates hold", "Storm lands"]);
    }

    #[tokio::test]
    async fn failed_output_write_leaves_history_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("history.json");
        // A directory in the output's place makes the final rename fail.
        let output = dir.path().join("output.json");
        std::fs::create_dir(&output).unwrap();

        let err = run_once(
            &offline_pipeline(&history),
            &Region::global(),
            &output,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(format!("{err:#}").contains("could not write"));
        assert!(!history.exists());
    }

    #[test]
    fn bare_invocation_runs_global() {
        let cli = Cli::try_parse_from(["newsdesk"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.region, "Global");
        assert_eq!(cli.output, PathBuf::from("data/output.json"));
        assert_eq!(cli.history, PathBuf::from("data/history.json"));
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn positional_region_and_json_logs() {
        let cli = Cli::try_parse_from(["newsdesk", "India", "--log-format", "json"]).unwrap();
        assert_eq!(cli.region, "India");
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn serve_takes_a_bind_address() {
        let cli = Cli::try_parse_from(["newsdesk", "serve", "--bind", "127.0.0.1:9000"]).unwrap();
        match cli.command {
            Some(Command::Serve { bind }) => assert_eq!(bind.port(), 9000),
            None => panic!("expected serve"),
        }
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["newsdesk", "--log-format", "xml"]).is_err());
    }
}
