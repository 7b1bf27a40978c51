use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use email_delivery::Dispatcher;
use reddit_aggregator::config::NewsletterConfig;
use reddit_aggregator::{
    ChatCompletionAdapter, GenerationCoordinator, GenerationProvider, NewsletterPipeline, RedditSource,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Collects a subreddit's top daily discussions, has a language model write
/// them up as a newsletter, and emails it to subscribers.
#[derive(Debug, Parser)]
#[command(name = "reddit-newsletter", version)]
struct Cli {
    /// Collect, snapshot and generate, then print the newsletter instead of emailing it
    #[arg(long)]
    dry_run: bool,

    /// Number of top threads to collect (overrides POST_LIMIT)
    #[arg(long)]
    posts: Option<usize>,

    /// Replies kept per thread (overrides COMMENTS_PER_POST)
    #[arg(long)]
    comments: Option<usize>,

    /// Where to write the JSON snapshot (overrides SNAPSHOT_PATH)
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Returns whether every recipient received the newsletter.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = NewsletterConfig::from_env(!cli.dry_run).context("invalid configuration")?;
    if let Some(posts) = cli.posts {
        config.post_limit = posts;
    }
    if let Some(comments) = cli.comments {
        config.comments_per_post = comments;
    }
    if let Some(snapshot) = cli.snapshot {
        config.snapshot_path = snapshot;
    }
    info!(
        "Starting newsletter run for r/{} (posts: {}, replies per post: {}, backup provider: {})",
        config.feed.subreddit,
        config.post_limit,
        config.comments_per_post,
        config.backup.is_some()
    );

    let prompt_builder = config.prompt_builder();
    let system_message = prompt_builder.system_message();

    let primary: Box<dyn GenerationProvider> = Box::new(
        ChatCompletionAdapter::new(config.primary.clone(), system_message.clone())
            .context("could not create primary provider client")?,
    );
    let backup: Option<Box<dyn GenerationProvider>> = match config.backup.clone() {
        Some(backup) => Some(Box::new(
            ChatCompletionAdapter::new(backup, system_message)
                .context("could not create backup provider client")?,
        )),
        None => None,
    };

    let source = RedditSource::new(config.feed.clone()).context("could not create feed client")?;
    let mut pipeline = NewsletterPipeline::new(
        Box::new(source),
        prompt_builder,
        GenerationCoordinator::new(primary, backup),
    )
    .with_limits(config.post_limit, config.comments_per_post)
    .with_snapshot(config.snapshot_path.clone());

    if let Some(delivery) = config.delivery.clone() {
        let dispatcher = Dispatcher::from_config(delivery.smtp, config.title.clone())?;
        pipeline = pipeline.with_delivery(dispatcher, delivery.recipients);
    }

    let report = pipeline.run().await?;

    info!(
        "Collected {} threads with {} replies (snapshot saved: {})",
        report.threads_collected, report.replies_collected, report.snapshot_saved
    );

    match &report.delivery {
        None => {
            println!("{}", report.newsletter);
            Ok(true)
        }
        Some(delivery) => {
            for failed in delivery.failed() {
                warn!("Not delivered: {}", failed);
            }
            info!(
                "Delivered to {}/{} recipients",
                delivery.succeeded().len(),
                delivery.attempted().len()
            );
            Ok(report.fully_delivered())
        }
    }
}
