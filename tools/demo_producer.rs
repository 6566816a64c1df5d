//! Demo Scoring Request Producer
//!
//! Generates and publishes scoring requests to NATS for pipeline testing.
//! Mixes legitimate traffic with requests shaped to trigger each business
//! rule.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Utc};
use fraud_scoring_engine::types::transaction::{
    Channel, KycStatus, ScoringRequest, TransactionRecord,
};
use rand::Rng;
use std::time::Duration;
use tracing::info;

/// Scoring request generator for testing
struct RequestGenerator {
    rng: rand::rngs::ThreadRng,
    request_counter: u64,
}

impl RequestGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            request_counter: 0,
        }
    }

    fn next_id(&mut self) -> String {
        self.request_counter += 1;
        format!("tx_{:012}", self.request_counter)
    }

    /// Timestamp earlier today (or yesterday) at the given UTC hour,
    /// guaranteed to be in the past.
    fn past_timestamp_at_hour(&self, hour: u32) -> DateTime<Utc> {
        let now = Utc::now();
        let today = now.date_naive();
        let candidate = Utc
            .from_utc_datetime(&today.and_hms_opt(hour, 0, 0).unwrap());
        if candidate < now {
            candidate
        } else {
            candidate - ChronoDuration::days(1)
        }
    }

    /// Most recent past Saturday at noon UTC.
    fn last_saturday_noon(&self) -> DateTime<Utc> {
        let mut day = Utc::now().date_naive() - ChronoDuration::days(1);
        while day.weekday().num_days_from_monday() != 5 {
            day -= ChronoDuration::days(1);
        }
        Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).unwrap())
    }

    fn base_record(&mut self) -> TransactionRecord {
        TransactionRecord {
            transaction_id: self.next_id(),
            amount: self.rng.gen_range(10.0..500.0),
            kyc_status: KycStatus::Verified,
            account_age_days: self.rng.gen_range(60..2000),
            channel: *self
                .random_choice(&[Channel::Domestic, Channel::Online, Channel::Mobile]),
            timestamp: self.past_timestamp_at_hour(14),
            customer_segment: "Retail".to_string(),
            transaction_type: "Purchase".to_string(),
        }
    }

    /// Generate a legitimate-looking scoring request
    fn generate_legitimate(&mut self) -> ScoringRequest {
        ScoringRequest {
            transaction: self.base_record(),
            baseline: Some(self.rng.gen_range(200.0..2000.0)),
            explain: false,
        }
    }

    /// Generate a request shaped to trigger one of the business rules
    fn generate_suspicious(&mut self) -> ScoringRequest {
        let mut record = self.base_record();
        let baseline = 1000.0;

        match self.request_counter % 5 {
            0 => {
                // high_amount_rule
                record.amount = self.rng.gen_range(20_000.0..80_000.0);
            }
            1 => {
                // unverified_kyc_international
                record.channel = Channel::International;
                record.kyc_status = KycStatus::Unverified;
            }
            2 => {
                // odd_hours_rule
                record.timestamp = self.past_timestamp_at_hour(3);
            }
            3 => {
                // new_account_high_amount
                record.account_age_days = self.rng.gen_range(1..30);
                record.amount = self.rng.gen_range(6000.0..20_000.0);
            }
            _ => {
                // weekend_high_amount
                record.timestamp = self.last_saturday_noon();
                record.amount = self.rng.gen_range(11_000.0..40_000.0);
            }
        }

        ScoringRequest {
            transaction: record,
            baseline: Some(baseline),
            explain: true,
        }
    }

    fn random_choice<'a, T>(&mut self, options: &'a [T]) -> &'a T {
        &options[self.rng.gen_range(0..options.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let nats_url =
        std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());
    let subject = std::env::var("REQUEST_SUBJECT").unwrap_or_else(|_| "fraud.score".to_string());
    let total: u64 = std::env::var("REQUEST_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);
    let fraud_ratio: f64 = std::env::var("FRAUD_RATIO")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.2);

    let client = async_nats::connect(&nats_url).await?;
    info!(url = %nats_url, subject = %subject, "Connected to NATS");

    let mut generator = RequestGenerator::new();
    let mut suspicious_sent = 0u64;

    for i in 0..total {
        let request = if rand::thread_rng().gen_bool(fraud_ratio) {
            suspicious_sent += 1;
            generator.generate_suspicious()
        } else {
            generator.generate_legitimate()
        };

        let payload = serde_json::to_vec(&request)?;
        client.publish(subject.clone(), payload.into()).await?;

        if (i + 1) % 20 == 0 {
            info!(sent = i + 1, suspicious = suspicious_sent, "Publishing progress");
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    client.flush().await?;
    info!(
        total = total,
        suspicious = suspicious_sent,
        "All scoring requests published"
    );

    Ok(())
}
