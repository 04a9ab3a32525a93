//! Majority vote over normalized answers.
//!
//! Answers are compared by a canonical key. The winner is the first key, in
//! answer order, holding the maximum count; every key sharing that count is
//! in the tie set.

use std::collections::HashSet;

use crate::types::config::{ConsensusConfig, VoterStrategy};

/// Full-width sentence punctuation mapped to its ASCII counterpart.
const FULL_WIDTH: [(char, char); 5] = [('。', '.'), ('．', '.'), ('｡', '.'), ('！', '!'), ('？', '?')];

/// Canonical key of an answer.
///
/// Lower-cases, maps full-width sentence punctuation to ASCII, collapses
/// whitespace runs, trims, and strips trailing sentence terminators so that
/// `"4"` and `"4."` share a key. Idempotent.
pub fn canonicalize(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            FULL_WIDTH
                .iter()
                .find(|(from, _)| *from == c)
                .map(|(_, to)| *to)
                .unwrap_or(c)
        })
        .collect();

    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_end_matches(|c: char| matches!(c, '.' | '!' | '?') || c.is_whitespace())
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════════
// Tally
// ═══════════════════════════════════════════════════════════════════════════

/// One distinct key and how many answers mapped to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyEntry {
    pub key: String,
    pub count: usize,
}

/// Result of a vote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    /// Distinct keys in first-appearance order.
    pub entries: Vec<TallyEntry>,
    /// For each answer, the index of its entry.
    pub assignments: Vec<usize>,
    /// Winning key; empty when there were no answers.
    pub winner: String,
    /// Count of the winning key.
    pub count: usize,
    /// Every key holding the winning count, in first-appearance order.
    pub ties: Vec<String>,
}

impl VoteTally {
    /// Builds a tally from one entry index per answer.
    fn from_assignments(keys: Vec<String>, assignments: Vec<usize>) -> Self {
        let mut entries: Vec<TallyEntry> = keys
            .into_iter()
            .map(|key| TallyEntry { key, count: 0 })
            .collect();
        for &slot in &assignments {
            entries[slot].count += 1;
        }

        let mut winner = 0;
        for (i, entry) in entries.iter().enumerate() {
            if entry.count > entries[winner].count {
                winner = i;
            }
        }

        let (winner_key, count) = entries
            .get(winner)
            .map(|e| (e.key.clone(), e.count))
            .unwrap_or_default();

        let ties = entries
            .iter()
            .filter(|e| count > 0 && e.count == count)
            .map(|e| e.key.clone())
            .collect();

        Self {
            entries,
            assignments,
            winner: winner_key,
            count,
            ties,
        }
    }

    /// Whether the judge must break a tie.
    pub fn is_tie(&self) -> bool {
        self.ties.len() > 1
    }

    /// Index of the first answer that voted for `key`.
    pub fn first_answer_for(&self, key: &str) -> Option<usize> {
        let slot = self.entries.iter().position(|e| e.key == key)?;
        self.assignments.iter().position(|&a| a == slot)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Voters
// ═══════════════════════════════════════════════════════════════════════════

/// A vote strategy.
pub trait Voter: Send + Sync {
    /// Strategy name.
    fn name(&self) -> &str;

    /// Tallies the answers, in the order given.
    fn vote(&self, answers: &[&str]) -> VoteTally;
}

/// Exact match on the canonical key.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactVoter;

impl Voter for ExactVoter {
    fn name(&self) -> &str {
        "exact"
    }

    fn vote(&self, answers: &[&str]) -> VoteTally {
        let mut keys: Vec<String> = Vec::new();
        let mut assignments = Vec::with_capacity(answers.len());

        for answer in answers {
            let key = canonicalize(answer);
            let slot = match keys.iter().position(|k| *k == key) {
                Some(slot) => slot,
                None => {
                    keys.push(key);
                    keys.len() - 1
                }
            };
            assignments.push(slot);
        }

        VoteTally::from_assignments(keys, assignments)
    }
}

const STOPWORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "and", "a", "to", "are", "as", "was", "were", "been", "be",
    "have", "has", "had", "do", "does", "did", "can", "could", "should", "would", "will",
];

/// Keywords of an answer: words longer than two characters, minus stopwords.
fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 2 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two keyword sets.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Keyword-overlap clustering.
///
/// Each answer joins the first cluster whose average similarity to its
/// members exceeds the threshold, else starts a new cluster. A cluster's key
/// is the canonical form of its first member.
#[derive(Debug, Clone, Copy)]
pub struct KeywordClusterVoter {
    threshold: f64,
}

impl KeywordClusterVoter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    fn similarity(&self, a: (&str, &HashSet<String>), b: (&str, &HashSet<String>)) -> f64 {
        if a.0 == b.0 {
            1.0
        } else {
            jaccard(a.1, b.1)
        }
    }
}

impl Default for KeywordClusterVoter {
    fn default() -> Self {
        Self::new(ConsensusConfig::default().cluster_threshold)
    }
}

impl Voter for KeywordClusterVoter {
    fn name(&self) -> &str {
        "cluster"
    }

    fn vote(&self, answers: &[&str]) -> VoteTally {
        let prepared: Vec<(String, HashSet<String>)> = answers
            .iter()
            .map(|a| (canonicalize(a), keywords(a)))
            .collect();

        let mut clusters: Vec<Vec<usize>> = Vec::new();
        let mut assignments = Vec::with_capacity(answers.len());

        for (i, (key, words)) in prepared.iter().enumerate() {
            let joined = clusters.iter().position(|members| {
                let total: f64 = members
                    .iter()
                    .map(|&m| self.similarity((key, words), (&prepared[m].0, &prepared[m].1)))
                    .sum();
                total / members.len() as f64 > self.threshold
            });

            match joined {
                Some(slot) => {
                    clusters[slot].push(i);
                    assignments.push(slot);
                }
                None => {
                    clusters.push(vec![i]);
                    assignments.push(clusters.len() - 1);
                }
            }
        }

        let keys = clusters
            .iter()
            .map(|members| prepared[members[0]].0.clone())
            .collect();
        VoteTally::from_assignments(keys, assignments)
    }
}

/// Builds the configured vote strategy.
pub fn voter_for(config: &ConsensusConfig) -> Box<dyn Voter> {
    match config.voter {
        VoterStrategy::Exact => Box::new(ExactVoter),
        VoterStrategy::Cluster => Box::new(KeywordClusterVoter::new(config.cluster_threshold)),
    }
}
