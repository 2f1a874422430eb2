//! Phishing-likelihood scoring of normalized domains.
//!
//! The score is a sum of independent signals. Every signal is deterministic
//! and non-negative, and each has its own weight in [`ScoringWeights`] so it
//! can be tuned without touching the others.

use crate::normalize::NormalizedDomain;
use crate::watchlist::BrandSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strsim::{levenshtein, normalized_levenshtein};

/// Thresholds and weights that drive scoring and alerting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Minimum final score for a HIGH alert.
    pub min_score: u32,
    /// Minimum final score for a LOW (console only) notice.
    pub suspicious_score: u32,
    /// TLD endings worth a bonus. Only the first match counts.
    pub suspicious_tlds: Vec<String>,
    /// Labels that are suspicious when they appear as the first word of the body.
    pub generic_labels: Vec<String>,
    /// Tokens never compared against brands by edit distance.
    pub ignored_words: Vec<String>,
    /// Issuer organization that earns the issuer bonus.
    pub free_ca_issuer: String,
    pub weights: ScoringWeights,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            min_score: 100,
            suspicious_score: 72,
            suspicious_tlds: [".tk", ".top", ".gq", ".ml", ".cf", ".xyz", ".cfd", ".online"]
                .into_iter()
                .map(String::from)
                .collect(),
            generic_labels: ["com", "net", "org"].into_iter().map(String::from).collect(),
            ignored_words: ["email", "mail", "cloud"]
                .into_iter()
                .map(String::from)
                .collect(),
            free_ca_issuer: "Let's Encrypt".to_string(),
            weights: ScoringWeights::default(),
        }
    }
}

impl ScoringPolicy {
    /// Returns the issuer bonus for a certificate issued by `issuer_org`.
    pub fn issuer_bonus(&self, issuer_org: Option<&str>) -> u32 {
        match issuer_org {
            Some(issuer) if issuer == self.free_ca_issuer => self.weights.issuer_bonus,
            _ => 0,
        }
    }
}

/// Per-signal weights.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub suspicious_tld: u32,
    /// Multiplier applied to the Shannon entropy of the body before rounding.
    pub entropy_scale: f64,
    pub generic_label: u32,
    /// Brand found verbatim inside the body.
    pub brand_containment: u32,
    /// A token at edit distance 1 from a brand.
    pub edit_distance_one: u32,
    /// A token at edit distance 2 from a brand.
    pub edit_distance_two: u32,
    /// Hyphen count at which the hyphen count itself is added.
    pub min_hyphens: usize,
    /// Dot count at which the dot count itself is added.
    pub min_dots: usize,
    pub issuer_bonus: u32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            suspicious_tld: 10,
            entropy_scale: 10.0,
            generic_label: 10,
            brand_containment: 90,
            edit_distance_one: 70,
            edit_distance_two: 40,
            min_hyphens: 4,
            min_dots: 3,
            issuer_bonus: 10,
        }
    }
}

/// Contribution of each signal to a score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub suspicious_tld: u32,
    pub entropy: u32,
    pub generic_label: u32,
    pub brand_containment: u32,
    pub edit_distance: u32,
    pub structure: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.suspicious_tld
            .saturating_add(self.entropy)
            .saturating_add(self.generic_label)
            .saturating_add(self.brand_containment)
            .saturating_add(self.edit_distance)
            .saturating_add(self.structure)
    }
}

/// The outcome of scoring one domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreResult {
    pub score: u32,
    /// The brand most similar to any token of the body.
    pub brand: Option<String>,
    /// Similarity of the best (brand, token) pair, 0-100. Diagnostic only.
    pub similarity_percentage: u8,
    pub breakdown: ScoreBreakdown,
}

impl ScoreResult {
    /// Adds a bonus that is not part of the lexical score (e.g. the issuer bonus).
    pub fn with_bonus(mut self, bonus: u32) -> Self {
        self.score = self.score.saturating_add(bonus);
        self
    }

    /// `true` if the score reaches the HIGH threshold and a brand is attributed.
    pub fn is_alert(&self, policy: &ScoringPolicy) -> bool {
        self.score >= policy.min_score && self.brand.is_some()
    }

    /// `true` if the score reaches the LOW threshold.
    pub fn is_suspicious(&self, policy: &ScoringPolicy) -> bool {
        self.score >= policy.suspicious_score
    }
}

/// Scores a normalized domain against a brand set.
pub fn score(domain: &NormalizedDomain, brands: &BrandSet, policy: &ScoringPolicy) -> ScoreResult {
    let weights = &policy.weights;
    let breakdown = ScoreBreakdown {
        suspicious_tld: suspicious_tld_bonus(&domain.original, policy),
        entropy: entropy_bonus(&domain.body, weights.entropy_scale),
        generic_label: generic_label_bonus(&domain.tokens, policy),
        brand_containment: containment_bonus(&domain.body, brands, weights),
        edit_distance: edit_distance_bonus(&domain.tokens, brands, policy),
        structure: structure_bonus(&domain.domain, weights),
    };
    let best = best_brand(&domain.tokens, brands);

    ScoreResult {
        score: breakdown.total(),
        similarity_percentage: best.map_or(0, |(_, sim)| (sim * 100.0) as u8),
        brand: best.map(|(brand, _)| brand.to_string()),
        breakdown,
    }
}

/// Shannon entropy, in bits, of the character distribution of `s`.
pub fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut len = 0usize;
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
        len += 1;
    }
    if len == 0 {
        return 0.0;
    }

    let len = len as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

fn suspicious_tld_bonus(original: &str, policy: &ScoringPolicy) -> u32 {
    if policy
        .suspicious_tlds
        .iter()
        .any(|tld| original.ends_with(tld.as_str()))
    {
        policy.weights.suspicious_tld
    } else {
        0
    }
}

fn entropy_bonus(body: &str, scale: f64) -> u32 {
    let scaled = (shannon_entropy(body) * scale).round_ties_even();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as u32
    } else {
        0
    }
}

fn generic_label_bonus(tokens: &[String], policy: &ScoringPolicy) -> u32 {
    match tokens.first() {
        Some(first) if policy.generic_labels.iter().any(|label| label == first) => {
            policy.weights.generic_label
        }
        _ => 0,
    }
}

fn containment_bonus(body: &str, brands: &BrandSet, weights: &ScoringWeights) -> u32 {
    brands
        .iter()
        .filter(|brand| body.contains(brand))
        .fold(0u32, |acc, _| acc.saturating_add(weights.brand_containment))
}

/// Every (brand, token) pair at distance 1 or 2 contributes independently.
fn edit_distance_bonus(tokens: &[String], brands: &BrandSet, policy: &ScoringPolicy) -> u32 {
    let weights = &policy.weights;
    let candidates: Vec<&str> = tokens
        .iter()
        .map(String::as_str)
        .filter(|token| !policy.ignored_words.iter().any(|w| w == token))
        .collect();

    let mut bonus = 0u32;
    for brand in brands.iter() {
        for token in &candidates {
            bonus = bonus.saturating_add(match levenshtein(token, brand) {
                1 => weights.edit_distance_one,
                2 => weights.edit_distance_two,
                _ => 0,
            });
        }
    }
    bonus
}

fn structure_bonus(domain: &str, weights: &ScoringWeights) -> u32 {
    let mut bonus = 0usize;

    let hyphens = domain.matches('-').count();
    if !domain.contains("xn--") && hyphens >= weights.min_hyphens {
        bonus += hyphens;
    }

    let dots = domain.matches('.').count();
    if dots >= weights.min_dots {
        bonus += dots;
    }

    u32::try_from(bonus).unwrap_or(u32::MAX)
}

/// Finds the brand with the highest similarity ratio to any token.
fn best_brand<'a>(tokens: &[String], brands: &'a BrandSet) -> Option<(&'a str, f64)> {
    let mut best: Option<(&'a str, f64)> = None;
    for brand in brands.iter() {
        for token in tokens {
            let similarity = normalized_levenshtein(brand, token);
            if similarity > best.map_or(0.0, |(_, s)| s) {
                best = Some((brand, similarity));
            }
        }
    }
    best
}
