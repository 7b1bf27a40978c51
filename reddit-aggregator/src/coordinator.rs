use interfaces::defs::ALL_PROVIDERS_EXHAUSTED;
use tracing::{debug, error, info, warn};

use crate::llm_adapter::{GenerationProvider, ProviderError};
use crate::types::GenerationOutcome;

/// Steps of one generation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    ProbingPrimary,
    UsingPrimary,
    UsingBackup,
    Failed,
}

/// Owns the failover policy between a primary and an optional backup provider.
///
/// The primary is probed first. A failed or negative probe, or a failed
/// completion, moves on to the backup without retrying the primary. A blank
/// completion counts as a failure.
pub struct GenerationCoordinator {
    primary: Box<dyn GenerationProvider>,
    backup: Option<Box<dyn GenerationProvider>>,
}

impl GenerationCoordinator {
    pub fn new(primary: Box<dyn GenerationProvider>, backup: Option<Box<dyn GenerationProvider>>) -> Self {
        Self { primary, backup }
    }

    pub fn has_backup(&self) -> bool {
        self.backup.is_some()
    }

    pub async fn generate(&self, prompt: &str) -> GenerationOutcome {
        let mut state = GenerationState::Idle;
        loop {
            debug!("Generation state: {:?}", state);
            state = match state {
                GenerationState::Idle => GenerationState::ProbingPrimary,

                GenerationState::ProbingPrimary => match self.primary.probe().await {
                    Ok(true) => {
                        info!("Primary provider {} is available", self.primary.provider_name());
                        GenerationState::UsingPrimary
                    }
                    Ok(false) => {
                        warn!("Primary provider {} reported unavailable", self.primary.provider_name());
                        GenerationState::UsingBackup
                    }
                    Err(e) => {
                        warn!("Probe of primary provider failed: {}", e);
                        GenerationState::UsingBackup
                    }
                },

                GenerationState::UsingPrimary => match complete(self.primary.as_ref(), prompt).await {
                    Ok(text) => return GenerationOutcome::Success(text),
                    Err(e) => {
                        warn!("Primary provider failed, switching to backup: {}", e);
                        GenerationState::UsingBackup
                    }
                },

                GenerationState::UsingBackup => match &self.backup {
                    None => {
                        error!("No backup provider configured");
                        GenerationState::Failed
                    }
                    Some(backup) => {
                        info!("Using backup provider {}", backup.provider_name());
                        match complete(backup.as_ref(), prompt).await {
                            Ok(text) => return GenerationOutcome::Success(text),
                            Err(e) => {
                                error!("Backup provider failed: {}", e);
                                GenerationState::Failed
                            }
                        }
                    }
                },

                GenerationState::Failed => {
                    return GenerationOutcome::Failure(ALL_PROVIDERS_EXHAUSTED.to_string())
                }
            };
        }
    }
}

async fn complete(provider: &dyn GenerationProvider, prompt: &str) -> Result<String, ProviderError> {
    let text = provider.complete(prompt).await?;
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyCompletion {
            provider: provider.provider_name(),
        });
    }
    Ok(text)
}
