//! Weighted quotation comparison.
//!
//! Produces a deterministic, explainable ranking of a quotation set: the same
//! input set always ranks identically, regardless of input order. Weights and
//! the payment-terms table are configuration, not law.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use procureflow_core::{DomainError, DomainResult};

use crate::quotation::{Quotation, QuotationId};

/// Component weights of the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub price: f64,
    pub lead_time: f64,
    pub payment_terms: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 0.7,
            lead_time: 0.2,
            payment_terms: 0.1,
        }
    }
}

/// Scorer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Known payment terms mapped to a quality sub-score (0-100). Keys are
    /// matched lowercased and trimmed.
    pub terms_scores: BTreeMap<String, f64>,
    /// Sub-score for unknown or missing payment terms.
    pub neutral_terms_score: f64,
    /// Sub-score used when all candidates share the same amount (or lead
    /// time), where min-max normalization would divide by zero.
    pub uniform_subscore: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let terms_scores = BTreeMap::from([
            ("net 60".to_string(), 100.0),
            ("net 30".to_string(), 80.0),
            ("net 15".to_string(), 60.0),
            ("cod".to_string(), 40.0),
            ("advance 50%".to_string(), 30.0),
            ("advance 100%".to_string(), 10.0),
        ]);

        Self {
            weights: ScoreWeights::default(),
            terms_scores,
            neutral_terms_score: 50.0,
            uniform_subscore: 100.0,
        }
    }
}

impl ScoringConfig {
    fn terms_subscore(&self, terms: Option<&str>) -> f64 {
        terms
            .map(|t| t.trim().to_lowercase())
            .and_then(|key| self.terms_scores.get(&key).copied())
            .unwrap_or(self.neutral_terms_score)
    }
}

/// A quotation with its computed score.
///
/// Ineligible quotations (not VALID) carry `score: None`: they are returned
/// for display but never ranked or recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredQuotation {
    pub quotation: Quotation,
    pub score: Option<f64>,
}

/// Result of ranking a quotation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// Scored quotations first (best to worst), then unscored ones.
    pub ranked: Vec<ScoredQuotation>,
    /// Top-ranked eligible quotation, if any.
    pub recommended: Option<QuotationId>,
}

/// Rank quotations by weighted composite score.
///
/// - Price: lowest amount scores 100, highest scores 0, linear in between.
/// - Lead time: shortest scores 100, longest 0; a missing lead time scores 0
///   (penalized, not excluded).
/// - Payment terms: table lookup with a neutral default.
///
/// The final score is the weighted sum clamped to [0, 100]. Ties break on
/// lower amount, then earlier creation time, then id, making the order a
/// total one (independent of input order).
pub fn rank(quotations: &[Quotation], config: &ScoringConfig) -> DomainResult<Ranking> {
    let eligible: Vec<&Quotation> = quotations.iter().filter(|q| q.is_valid()).collect();

    if let Some(first) = eligible.first() {
        if eligible
            .iter()
            .any(|q| q.amount.currency != first.amount.currency)
        {
            return Err(DomainError::validation(
                "quotations under comparison must share a currency",
            ));
        }
    }

    let amounts: Vec<i64> = eligible.iter().map(|q| q.amount.amount).collect();
    let min_amount = amounts.iter().copied().min();
    let max_amount = amounts.iter().copied().max();

    let lead_times: Vec<u32> = eligible.iter().filter_map(|q| q.lead_time_days).collect();
    let min_lead = lead_times.iter().copied().min();
    let max_lead = lead_times.iter().copied().max();

    let mut scored: Vec<ScoredQuotation> = Vec::with_capacity(quotations.len());
    let mut unscored: Vec<ScoredQuotation> = Vec::new();

    for q in quotations {
        if !q.is_valid() {
            unscored.push(ScoredQuotation {
                quotation: q.clone(),
                score: None,
            });
            continue;
        }

        let price_sub = match (min_amount, max_amount) {
            (Some(min), Some(max)) if max > min => {
                (max - q.amount.amount) as f64 / (max - min) as f64 * 100.0
            }
            _ => config.uniform_subscore,
        };

        let lead_sub = match q.lead_time_days {
            None => 0.0,
            Some(lead) => match (min_lead, max_lead) {
                (Some(min), Some(max)) if max > min => {
                    (max - lead) as f64 / (max - min) as f64 * 100.0
                }
                _ => config.uniform_subscore,
            },
        };

        let terms_sub = config.terms_subscore(q.payment_terms.as_deref());

        let weighted = config.weights.price * price_sub
            + config.weights.lead_time * lead_sub
            + config.weights.payment_terms * terms_sub;
        let score = weighted.clamp(0.0, 100.0);

        scored.push(ScoredQuotation {
            quotation: q.clone(),
            score: Some(score),
        });
    }

    // Total order: score desc, amount asc, created_at asc, id as final
    // discriminator. Input order must never influence the result.
    scored.sort_by(|a, b| {
        let sa = a.score.unwrap_or(0.0);
        let sb = b.score.unwrap_or(0.0);
        sb.total_cmp(&sa)
            .then_with(|| a.quotation.amount.amount.cmp(&b.quotation.amount.amount))
            .then_with(|| a.quotation.created_at.cmp(&b.quotation.created_at))
            .then_with(|| a.quotation.id.0.as_uuid().cmp(b.quotation.id.0.as_uuid()))
    });
    unscored.sort_by(|a, b| {
        a.quotation
            .created_at
            .cmp(&b.quotation.created_at)
            .then_with(|| a.quotation.id.0.as_uuid().cmp(b.quotation.id.0.as_uuid()))
    });

    let recommended = scored.first().map(|s| s.quotation.id);

    let mut ranked = scored;
    ranked.extend(unscored);

    Ok(Ranking {
        ranked,
        recommended,
    })
}
