pub mod types;
pub mod traits;
pub mod fetcher;
pub mod parser;
pub mod aggregator;
pub mod prompt;
pub mod llm_adapter;
pub mod coordinator;
pub mod config;
pub mod pipeline;

pub use types::*;
pub use traits::ContentSource;
pub use fetcher::Fetcher;
pub use aggregator::RedditSource;
pub use prompt::PromptBuilder;
pub use llm_adapter::{ChatCompletionAdapter, GenerationProvider, ProviderConfig, ProviderError};
pub use coordinator::{GenerationCoordinator, GenerationState};
pub use config::NewsletterConfig;
pub use pipeline::{NewsletterPipeline, PipelineError, RunReport};
