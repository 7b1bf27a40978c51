use std::path::PathBuf;
use std::sync::Arc;

use email_delivery::{DeliveryError, Dispatcher};
use interfaces::state::save_snapshot;
use tracing::{error, info, warn};

use crate::coordinator::GenerationCoordinator;
use crate::prompt::PromptBuilder;
use crate::traits::ContentSource;
use crate::types::{DeliveryReport, GenerationOutcome};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("newsletter generation failed: {0}")]
    GenerationFailed(String),

    #[error("delivery aborted: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("delivery task did not complete: {0}")]
    DeliveryTask(#[from] tokio::task::JoinError),
}

/// What one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub threads_collected: usize,
    pub replies_collected: usize,
    pub snapshot_saved: bool,
    pub newsletter: String,
    /// `None` when the run stopped after generation.
    pub delivery: Option<DeliveryReport>,
}

impl RunReport {
    /// True when nothing was delivered to anyone, or every recipient got the newsletter.
    pub fn fully_delivered(&self) -> bool {
        self.delivery.as_ref().map_or(true, DeliveryReport::is_complete)
    }
}

struct Delivery {
    dispatcher: Arc<Dispatcher>,
    recipients: Arc<Vec<String>>,
}

/// Collect, snapshot, prompt, generate, deliver. Each stage finishes before the next starts.
pub struct NewsletterPipeline {
    source: Box<dyn ContentSource>,
    prompt_builder: PromptBuilder,
    coordinator: GenerationCoordinator,
    limit_threads: usize,
    limit_replies: usize,
    snapshot_path: Option<PathBuf>,
    delivery: Option<Delivery>,
}

impl NewsletterPipeline {
    pub fn new(
        source: Box<dyn ContentSource>,
        prompt_builder: PromptBuilder,
        coordinator: GenerationCoordinator,
    ) -> Self {
        Self {
            source,
            prompt_builder,
            coordinator,
            limit_threads: 20,
            limit_replies: 5,
            snapshot_path: None,
            delivery: None,
        }
    }

    pub fn with_limits(mut self, limit_threads: usize, limit_replies: usize) -> Self {
        self.limit_threads = limit_threads;
        self.limit_replies = limit_replies;
        self
    }

    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn with_delivery(mut self, dispatcher: Dispatcher, recipients: Vec<String>) -> Self {
        self.delivery = Some(Delivery {
            dispatcher: Arc::new(dispatcher),
            recipients: Arc::new(recipients),
        });
        self
    }

    /// Runs every stage once.
    ///
    /// Delivery uses a blocking mail session and runs on tokio's blocking pool.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        info!("Collecting content from r/{}", self.source.source_name());
        let content = self
            .source
            .collect(self.limit_threads, self.limit_replies)
            .await;
        if content.is_empty() {
            warn!("No threads collected, the newsletter will only contain instructions");
        }

        let mut snapshot_saved = false;
        if let Some(path) = &self.snapshot_path {
            match save_snapshot(&content, path).await {
                Ok(()) => snapshot_saved = true,
                Err(e) => error!("Error saving snapshot to {}: {:#}", path.display(), e),
            }
        }

        let prompt = self.prompt_builder.build(&content);
        info!("Built prompt of {} chars", prompt.len());

        let newsletter = match self.coordinator.generate(&prompt).await {
            GenerationOutcome::Success(text) => text,
            GenerationOutcome::Failure(reason) => {
                error!("Could not generate the newsletter: {}", reason);
                return Err(PipelineError::GenerationFailed(reason));
            }
        };
        info!("Newsletter generated ({} chars)", newsletter.len());

        let delivery = match &self.delivery {
            Some(Delivery {
                dispatcher,
                recipients,
            }) => {
                let dispatcher = Arc::clone(dispatcher);
                let recipients = Arc::clone(recipients);
                let text = newsletter.clone();
                let report =
                    tokio::task::spawn_blocking(move || dispatcher.deliver(&text, &recipients)).await??;
                if report.is_complete() {
                    info!("Newsletter delivered to all {} recipients", report.succeeded().len());
                } else {
                    warn!(
                        "Newsletter delivered to {} of {} recipients",
                        report.succeeded().len(),
                        report.attempted().len()
                    );
                }
                Some(report)
            }
            None => None,
        };

        Ok(RunReport {
            threads_collected: content.threads.len(),
            replies_collected: content.reply_count(),
            snapshot_saved,
            newsletter,
            delivery,
        })
    }
}
