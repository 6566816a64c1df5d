//! Deterministic business-rule engine.
//!
//! Every rule is evaluated independently and unconditionally against the
//! raw record and the user baseline; all matches are recorded. The rule
//! table is caller-owned configuration, so rules can be toggled or
//! re-weighted without touching the evaluator, which is a pure function
//! of (record, baseline, table).

use crate::types::transaction::{Channel, KycStatus, TransactionRecord};
use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

/// Sentinel reason used when no rule matched.
pub const NO_RULES_TRIGGERED: &str = "No rules triggered";

/// Condition evaluated by a single rule, with its tunable thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Amount exceeds a multiple of the user's trailing average
    HighAmount { baseline_multiplier: f64 },
    /// International channel combined with unverified KYC
    UnverifiedKycInternational,
    /// Transaction during the configured odd-hours window (inclusive)
    OddHours { start_hour: u32, end_hour: u32 },
    /// Large amount from a recently opened account
    NewAccountHighAmount {
        max_account_age_days: u32,
        amount_threshold: f64,
    },
    /// Large amount on a Saturday or Sunday
    WeekendHighAmount { amount_threshold: f64 },
}

/// A single configured rule: name, severity weight and condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub description: String,
    /// Severity in [0,1], used in the max-reduction of the rule score
    pub severity: f64,
    pub active: bool,
    pub kind: RuleKind,
}

/// Ordered rule set. Evaluation order defines output priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    rules: Vec<RuleConfig>,
}

impl RuleTable {
    pub fn new(rules: Vec<RuleConfig>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[RuleConfig] {
        &self.rules
    }

    /// Number of currently active rules.
    pub fn active_count(&self) -> usize {
        self.rules.iter().filter(|r| r.active).count()
    }

    /// Toggle a rule by name. Returns false if no rule matches.
    pub fn set_active(&mut self, name: &str, active: bool) -> bool {
        match self.rules.iter_mut().find(|r| r.name == name) {
            Some(rule) => {
                rule.active = active;
                true
            }
            None => false,
        }
    }
}

impl Default for RuleTable {
    /// The production rule set, in fixed priority order.
    fn default() -> Self {
        Self {
            rules: vec![
                RuleConfig {
                    name: "high_amount_rule".to_string(),
                    description: "Flag transactions above 5x user average amount".to_string(),
                    severity: 0.8,
                    active: true,
                    kind: RuleKind::HighAmount {
                        baseline_multiplier: 5.0,
                    },
                },
                RuleConfig {
                    name: "unverified_kyc_international".to_string(),
                    description: "Flag international transactions with unverified KYC".to_string(),
                    severity: 0.9,
                    active: true,
                    kind: RuleKind::UnverifiedKycInternational,
                },
                RuleConfig {
                    name: "odd_hours_rule".to_string(),
                    description: "Flag transactions during odd hours (2AM-4AM)".to_string(),
                    severity: 0.6,
                    active: true,
                    kind: RuleKind::OddHours {
                        start_hour: 2,
                        end_hour: 4,
                    },
                },
                RuleConfig {
                    name: "new_account_high_amount".to_string(),
                    description: "Flag high amounts from accounts < 30 days old".to_string(),
                    severity: 0.7,
                    active: true,
                    kind: RuleKind::NewAccountHighAmount {
                        max_account_age_days: 30,
                        amount_threshold: 5000.0,
                    },
                },
                RuleConfig {
                    name: "weekend_high_amount".to_string(),
                    description: "Flag high amount transactions on weekends".to_string(),
                    severity: 0.5,
                    active: true,
                    kind: RuleKind::WeekendHighAmount {
                        amount_threshold: 10000.0,
                    },
                },
            ],
        }
    }
}

/// Result of evaluating the rule table against one transaction.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    /// Names of triggered rules, in table priority order
    pub triggered: Vec<String>,
    /// Human-readable reasons joined with "; ", or the sentinel
    pub reason: String,
    /// Max severity among triggered rules, 0.0 when none triggered
    pub score: f64,
}

impl RuleOutcome {
    pub fn any_triggered(&self) -> bool {
        !self.triggered.is_empty()
    }
}

/// Evaluate every active rule against the record.
///
/// Rules do not short-circuit or disable each other; the combined score
/// is a max-reduction over triggered severities, not a sum.
pub fn evaluate(record: &TransactionRecord, baseline: f64, table: &RuleTable) -> RuleOutcome {
    let hour = record.timestamp.hour();
    let weekday = record.timestamp.weekday().num_days_from_monday();

    let mut triggered = Vec::new();
    let mut reasons = Vec::new();
    let mut score = 0.0_f64;

    for rule in table.rules() {
        if !rule.active {
            continue;
        }

        let reason = match &rule.kind {
            RuleKind::HighAmount {
                baseline_multiplier,
            } => {
                if record.amount > baseline_multiplier * baseline {
                    Some(format!(
                        "Amount ${} is {:.1}x higher than average",
                        format_amount(record.amount),
                        record.amount / baseline
                    ))
                } else {
                    None
                }
            }
            RuleKind::UnverifiedKycInternational => {
                if record.channel == Channel::International
                    && record.kyc_status == KycStatus::Unverified
                {
                    Some("International transaction with unverified KYC".to_string())
                } else {
                    None
                }
            }
            RuleKind::OddHours {
                start_hour,
                end_hour,
            } => {
                if (*start_hour..=*end_hour).contains(&hour) {
                    Some(format!("Transaction at unusual hour ({:02}:00)", hour))
                } else {
                    None
                }
            }
            RuleKind::NewAccountHighAmount {
                max_account_age_days,
                amount_threshold,
            } => {
                if record.account_age_days < *max_account_age_days
                    && record.amount > *amount_threshold
                {
                    Some(format!(
                        "High amount ${} from new account ({} days)",
                        format_amount(record.amount),
                        record.account_age_days
                    ))
                } else {
                    None
                }
            }
            RuleKind::WeekendHighAmount { amount_threshold } => {
                if weekday >= 5 && record.amount > *amount_threshold {
                    Some(format!(
                        "High weekend transaction (${})",
                        format_amount(record.amount)
                    ))
                } else {
                    None
                }
            }
        };

        if let Some(reason) = reason {
            triggered.push(rule.name.clone());
            reasons.push(reason);
            score = score.max(rule.severity);
        }
    }

    let reason = if reasons.is_empty() {
        NO_RULES_TRIGGERED.to_string()
    } else {
        reasons.join("; ")
    };

    RuleOutcome {
        triggered,
        reason,
        score,
    }
}

/// Format an amount with thousands separators and two decimals,
/// matching the reason strings produced by the upstream system.
pub(crate) fn format_amount(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::{Channel, KycStatus, TransactionRecord};
    use chrono::{TimeZone, Utc};

    fn record(
        amount: f64,
        kyc: KycStatus,
        age: u32,
        channel: Channel,
        timestamp: chrono::DateTime<Utc>,
    ) -> TransactionRecord {
        TransactionRecord {
            transaction_id: "tx_test".to_string(),
            amount,
            kyc_status: kyc,
            account_age_days: age,
            channel,
            timestamp,
            customer_segment: "Retail".to_string(),
            transaction_type: "Purchase".to_string(),
        }
    }

    // Tuesday 14:00 UTC
    fn tuesday_afternoon() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_high_amount_scenario() {
        // amount=60000, baseline=1000: only high_amount_rule fires
        let r = record(
            60000.0,
            KycStatus::Verified,
            400,
            Channel::Domestic,
            tuesday_afternoon(),
        );
        let outcome = evaluate(&r, 1000.0, &RuleTable::default());

        assert_eq!(outcome.triggered, vec!["high_amount_rule"]);
        assert_eq!(outcome.score, 0.8);
        assert_eq!(
            outcome.reason,
            "Amount $60,000.00 is 60.0x higher than average"
        );
    }

    #[test]
    fn test_unverified_kyc_international_scenario() {
        // amount=200 is below every amount threshold; only the KYC rule fires
        let r = record(
            200.0,
            KycStatus::Unverified,
            400,
            Channel::International,
            tuesday_afternoon(),
        );
        let outcome = evaluate(&r, 1000.0, &RuleTable::default());

        assert_eq!(outcome.triggered, vec!["unverified_kyc_international"]);
        assert_eq!(outcome.score, 0.9);
        assert_eq!(outcome.reason, "International transaction with unverified KYC");
    }

    #[test]
    fn test_odd_hours_boundaries() {
        let table = RuleTable::default();
        for (hour, expected) in [(1, false), (2, true), (3, true), (4, true), (5, false)] {
            let ts = Utc.with_ymd_and_hms(2024, 5, 14, hour, 30, 0).unwrap();
            let r = record(100.0, KycStatus::Verified, 400, Channel::Domestic, ts);
            let outcome = evaluate(&r, 1000.0, &table);
            assert_eq!(
                outcome.triggered.contains(&"odd_hours_rule".to_string()),
                expected,
                "hour {}",
                hour
            );
        }
    }

    #[test]
    fn test_weekend_high_amount() {
        // Saturday 2024-05-18
        let saturday = Utc.with_ymd_and_hms(2024, 5, 18, 12, 0, 0).unwrap();
        let r = record(12000.0, KycStatus::Verified, 400, Channel::Domestic, saturday);
        let outcome = evaluate(&r, 10000.0, &RuleTable::default());

        assert_eq!(outcome.triggered, vec!["weekend_high_amount"]);
        assert_eq!(outcome.score, 0.5);
        assert_eq!(outcome.reason, "High weekend transaction ($12,000.00)");
    }

    #[test]
    fn test_no_rules_triggered_sentinel() {
        let r = record(
            100.0,
            KycStatus::Verified,
            400,
            Channel::Domestic,
            tuesday_afternoon(),
        );
        let outcome = evaluate(&r, 1000.0, &RuleTable::default());

        assert!(outcome.triggered.is_empty());
        assert_eq!(outcome.score, 0.0);
        assert_eq!(outcome.reason, NO_RULES_TRIGGERED);
    }

    #[test]
    fn test_score_is_max_not_sum() {
        // New account, odd hours, huge amount: three rules, score = max severity
        let ts = Utc.with_ymd_and_hms(2024, 5, 14, 3, 0, 0).unwrap();
        let r = record(60000.0, KycStatus::Verified, 5, Channel::Domestic, ts);
        let outcome = evaluate(&r, 1000.0, &RuleTable::default());

        assert_eq!(
            outcome.triggered,
            vec!["high_amount_rule", "odd_hours_rule", "new_account_high_amount"]
        );
        assert_eq!(outcome.score, 0.8);
    }

    #[test]
    fn test_output_order_matches_priority() {
        // Unverified international at 3AM on a new account with a huge
        // weekend amount: all five rules fire, output stays table-ordered.
        let saturday_3am = Utc.with_ymd_and_hms(2024, 5, 18, 3, 0, 0).unwrap();
        let r = record(
            60000.0,
            KycStatus::Unverified,
            5,
            Channel::International,
            saturday_3am,
        );
        let outcome = evaluate(&r, 1000.0, &RuleTable::default());

        assert_eq!(
            outcome.triggered,
            vec![
                "high_amount_rule",
                "unverified_kyc_international",
                "odd_hours_rule",
                "new_account_high_amount",
                "weekend_high_amount",
            ]
        );
        assert_eq!(outcome.score, 0.9);
    }

    #[test]
    fn test_inactive_rule_is_skipped() {
        let mut table = RuleTable::default();
        assert!(table.set_active("high_amount_rule", false));
        assert_eq!(table.active_count(), 4);

        let r = record(
            60000.0,
            KycStatus::Verified,
            400,
            Channel::Domestic,
            tuesday_afternoon(),
        );
        let outcome = evaluate(&r, 1000.0, &table);
        assert!(outcome.triggered.is_empty());
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(60000.0), "60,000.00");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(0.25), "0.25");
    }
}
