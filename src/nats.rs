//! NATS messaging shell: scoring requests in, prediction results out.
//!
//! Pure I/O plumbing around one shared client; no scoring logic lives
//! here.

use crate::config::NatsConfig;
use crate::types::prediction::PredictionResult;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::{debug, error, info};

/// Both ends of the scoring engine's message bus.
#[derive(Clone)]
pub struct ScoringBus {
    client: Client,
    request_subject: String,
    result_subject: String,
}

impl ScoringBus {
    pub fn new(client: Client, config: &NatsConfig) -> Self {
        Self {
            client,
            request_subject: config.request_subject.clone(),
            result_subject: config.result_subject.clone(),
        }
    }

    /// Subscribe to incoming scoring requests.
    pub async fn subscribe_requests(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.request_subject.clone()).await?;
        info!(subject = %self.request_subject, "Subscribed to scoring request subject");
        Ok(subscriber)
    }

    /// Publish one completed prediction result.
    pub async fn publish_result(&self, result: &PredictionResult) -> Result<()> {
        let payload = serde_json::to_vec(result)?;

        self.client
            .publish(self.result_subject.clone(), payload.into())
            .await?;

        debug!(
            transaction_id = %result.transaction_id,
            is_fraud = result.is_fraud,
            risk_score = result.risk_score,
            "Published prediction result"
        );

        Ok(())
    }

    /// Publish a batch of results, logging failures individually.
    pub async fn publish_results(&self, results: &[PredictionResult]) -> Result<()> {
        for result in results {
            if let Err(e) = self.publish_result(result).await {
                error!(
                    transaction_id = %result.transaction_id,
                    error = %e,
                    "Failed to publish prediction result"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // Integration tests would require a running NATS server
}
