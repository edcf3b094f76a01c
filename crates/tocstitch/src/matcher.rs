use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::slug::slugify;

/// Default floor for [`containment_score`]; `intro` inside `introduction`
/// scores 0.417.
pub const MIN_CONTAINMENT_SCORE: f64 = 0.40;

/// Shorter keys than this never count as contained.
pub const MIN_CONTAINED_LEN: usize = 3;

/// How equally scored candidates are resolved in tiers that break ties.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Shortest file name wins, then lexical order.
    #[default]
    ShortestThenLexical,
    /// Leave the tie unresolved and report the title as ambiguous.
    Reject,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum Jaccard score for the token-overlap tier.
    pub min_token_score: f64,
    /// Minimum length ratio for the containment tier.
    pub min_containment_score: f64,
    pub tie_break: TieBreak,
    /// When false, a leading digit run is stripped even without a `_`, `-`,
    /// `.` or space after it (`2024report` -> `report`).
    pub require_prefix_separator: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_token_score: 0.40,
            min_containment_score: MIN_CONTAINMENT_SCORE,
            tie_break: TieBreak::default(),
            require_prefix_separator: true,
        }
    }
}

/// Date/counter prefix found on a file stem, e.g. `20240131-2_`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Revision {
    pub date: String,
    pub counter: u32,
}

impl Ord for Revision {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .len()
            .cmp(&other.date.len())
            .then_with(|| self.date.cmp(&other.date))
            .then_with(|| self.counter.cmp(&other.counter))
    }
}

impl PartialOrd for Revision {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Normalized forms of a title or file stem used by the strategies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchKey {
    /// Lowercase alphanumeric tokens joined by `-`.
    pub key: String,
    /// Tokens concatenated without separators.
    pub compact: String,
    pub tokens: BTreeSet<String>,
}

impl MatchKey {
    pub fn new(text: &str) -> Self {
        let key = slugify(text);
        let tokens: BTreeSet<String> = key
            .split('-')
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        let compact = key.replace('-', "");
        Self {
            key,
            compact,
            tokens,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct IndexedCandidate {
    pub path: PathBuf,
    pub file_name: String,
    pub key: MatchKey,
    pub revision: Option<Revision>,
}

/// Candidate files with their precomputed keys, built once per build pass.
#[derive(Clone, Debug, Default)]
pub struct CandidateIndex {
    candidates: Vec<IndexedCandidate>,
}

impl CandidateIndex {
    pub fn candidates(&self) -> &[IndexedCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredMatch {
    /// Index into [`CandidateIndex::candidates`].
    pub candidate: usize,
    pub score: f64,
}

/// One tier of the matcher: a pure scoring function over all candidates.
pub trait MatchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, title: &MatchKey, candidates: &[IndexedCandidate]) -> Vec<ScoredMatch>;

    /// Whether ties at the best score are settled by the configured
    /// [`TieBreak`] instead of falling through to the next tier.
    fn breaks_ties(&self) -> bool {
        true
    }
}

/// Tier 1: identical normalized keys.
pub struct NormalizedExact;

impl MatchStrategy for NormalizedExact {
    fn name(&self) -> &'static str {
        "normalized-exact"
    }

    fn score(&self, title: &MatchKey, candidates: &[IndexedCandidate]) -> Vec<ScoredMatch> {
        candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| !c.key.is_empty() && c.key.key == title.key)
            .map(|(candidate, _)| ScoredMatch {
                candidate,
                score: 1.0,
            })
            .collect()
    }

    fn breaks_ties(&self) -> bool {
        false
    }
}

/// Tier 2: Jaccard similarity of the token sets.
pub struct TokenOverlap {
    pub min_score: f64,
}

impl MatchStrategy for TokenOverlap {
    fn name(&self) -> &'static str {
        "token-overlap"
    }

    fn score(&self, title: &MatchKey, candidates: &[IndexedCandidate]) -> Vec<ScoredMatch> {
        candidates
            .iter()
            .enumerate()
            .filter_map(|(candidate, c)| {
                let score = jaccard(&title.tokens, &c.key.tokens);
                (score > 0.0 && score >= self.min_score).then_some(ScoredMatch { candidate, score })
            })
            .collect()
    }
}

/// Tier 3: one compact key contains the other (`intro` vs `introduction`).
/// Scored by the length ratio so the closest abbreviation wins.
pub struct Containment {
    pub min_score: f64,
}

impl MatchStrategy for Containment {
    fn name(&self) -> &'static str {
        "containment"
    }

    fn score(&self, title: &MatchKey, candidates: &[IndexedCandidate]) -> Vec<ScoredMatch> {
        candidates
            .iter()
            .enumerate()
            .filter_map(|(candidate, c)| {
                containment_score(&title.compact, &c.key.compact)
                    .filter(|score| *score >= self.min_score)
                    .map(|score| ScoredMatch { candidate, score })
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched {
        path: PathBuf,
        file_name: String,
        strategy: &'static str,
        score: f64,
    },
    Ambiguous {
        candidates: Vec<String>,
    },
    NoMatch,
}

/// Maps TOC titles to candidate files through an ordered list of strategies.
pub struct Matcher {
    config: MatcherConfig,
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl Matcher {
    /// Default tiers: normalized exact, token overlap, containment.
    pub fn new(config: MatcherConfig) -> Self {
        let strategies: Vec<Box<dyn MatchStrategy>> = vec![
            Box::new(NormalizedExact),
            Box::new(TokenOverlap {
                min_score: config.min_token_score,
            }),
            Box::new(Containment {
                min_score: config.min_containment_score,
            }),
        ];
        Self { config, strategies }
    }

    pub fn with_strategies(config: MatcherConfig, strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { config, strategies }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn index<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) -> CandidateIndex {
        let mut candidates: Vec<IndexedCandidate> = paths
            .into_iter()
            .filter_map(|path| {
                let file_name = path.file_name()?.to_string_lossy().into_owned();
                let stem = path.file_stem()?.to_string_lossy().into_owned();
                let (base, revision) = self.strip_date_prefix(&stem);
                Some(IndexedCandidate {
                    path: path.to_path_buf(),
                    file_name,
                    key: MatchKey::new(base),
                    revision,
                })
            })
            .collect();
        candidates.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        CandidateIndex { candidates }
    }

    /// Normalizes a title the same way candidate stems are normalized.
    pub fn title_key(&self, title: &str) -> MatchKey {
        let plain = crate::slug::inline_to_plain_text(title);
        let (base, _) = self.strip_date_prefix(plain.trim());
        MatchKey::new(base)
    }

    pub fn match_title(&self, title: &str, index: &CandidateIndex) -> MatchOutcome {
        let key = self.title_key(title);
        if key.is_empty() || index.is_empty() {
            return MatchOutcome::NoMatch;
        }

        let candidates = index.candidates();
        let mut unresolved: Option<Vec<usize>> = None;

        for strategy in &self.strategies {
            let scored = strategy.score(&key, candidates);
            let Some(best) = scored
                .iter()
                .map(|m| m.score)
                .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            else {
                tracing::debug!(title, strategy = strategy.name(), "no candidates scored");
                continue;
            };

            let tied: Vec<usize> = scored
                .iter()
                .filter(|m| m.score == best)
                .map(|m| m.candidate)
                .collect();
            let tied = newest_revisions(candidates, tied);

            let winner = if tied.len() == 1 {
                Some(tied[0])
            } else if strategy.breaks_ties() && self.config.tie_break == TieBreak::ShortestThenLexical
            {
                shortest_then_lexical(candidates, &tied)
            } else {
                None
            };

            match winner {
                Some(idx) => {
                    let chosen = &candidates[idx];
                    tracing::debug!(
                        title,
                        strategy = strategy.name(),
                        score = best,
                        file = %chosen.file_name,
                        "matched title"
                    );
                    return MatchOutcome::Matched {
                        path: chosen.path.clone(),
                        file_name: chosen.file_name.clone(),
                        strategy: strategy.name(),
                        score: best,
                    };
                }
                None => {
                    tracing::debug!(
                        title,
                        strategy = strategy.name(),
                        ties = tied.len(),
                        "tie left unresolved"
                    );
                    unresolved.get_or_insert(tied);
                }
            }
        }

        match unresolved {
            Some(tied) => MatchOutcome::Ambiguous {
                candidates: tied
                    .into_iter()
                    .map(|idx| candidates[idx].file_name.clone())
                    .collect(),
            },
            None => MatchOutcome::NoMatch,
        }
    }

    /// Splits a leading `digits[-counter]` prefix off a stem. The prefix is
    /// only removed when something remains after it.
    pub fn strip_date_prefix<'s>(&self, stem: &'s str) -> (&'s str, Option<Revision>) {
        let re = if self.config.require_prefix_separator {
            strict_prefix()
        } else {
            lenient_prefix()
        };
        let Some(caps) = re.captures(stem) else {
            return (stem, None);
        };
        let Some(whole) = caps.get(0) else {
            return (stem, None);
        };
        let rest = &stem[whole.end()..];
        if rest.trim().is_empty() {
            return (stem, None);
        }
        let revision = Revision {
            date: caps
                .name("date")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            counter: caps
                .name("rev")
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0),
        };
        (rest, Some(revision))
    }
}

fn strict_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"^(?P<date>\d+)(?:-(?P<rev>\d+))?[_\-. ]+").expect("Invalid regex")
    })
}

fn lenient_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"^(?P<date>\d+)(?:-(?P<rev>\d+))?[_\-. ]*").expect("Invalid regex")
    })
}

/// Jaccard index of two token sets; zero when either is empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let union = a.union(b).count();
    shared as f64 / union as f64
}

/// Length ratio when one compact key contains the other. Keys shorter than
/// [`MIN_CONTAINED_LEN`] characters never match.
pub fn containment_score(a: &str, b: &str) -> Option<f64> {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.chars().count() < MIN_CONTAINED_LEN {
        return None;
    }
    long.contains(short)
        .then(|| short.chars().count() as f64 / long.chars().count() as f64)
}

/// Among tied candidates, a dated revision is dropped when another tied
/// candidate with the same key carries a newer revision.
fn newest_revisions(candidates: &[IndexedCandidate], tied: Vec<usize>) -> Vec<usize> {
    tied.iter()
        .copied()
        .filter(|idx| {
            let current = &candidates[*idx];
            !tied.iter().any(|other| {
                let other = &candidates[*other];
                other.key.key == current.key.key
                    && other.revision.is_some()
                    && other.revision > current.revision
            })
        })
        .collect()
}

fn shortest_then_lexical(candidates: &[IndexedCandidate], tied: &[usize]) -> Option<usize> {
    tied.iter().copied().min_by(|a, b| {
        let (a, b) = (&candidates[*a].file_name, &candidates[*b].file_name);
        a.chars()
            .count()
            .cmp(&b.chars().count())
            .then_with(|| a.cmp(b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(matcher: &Matcher, names: &[&str]) -> CandidateIndex {
        let paths: Vec<PathBuf> = names.iter().map(|n| PathBuf::from("/work").join(n)).collect();
        matcher.index(paths.iter().map(PathBuf::as_path))
    }

    fn matched_name(outcome: &MatchOutcome) -> Option<(&str, &'static str)> {
        match outcome {
            MatchOutcome::Matched {
                file_name,
                strategy,
                ..
            } => Some((file_name.as_str(), *strategy)),
            _ => None,
        }
    }

    #[test]
    fn exact_tier_ignores_date_prefix_case_and_punctuation() {
        let matcher = Matcher::default();
        let idx = index(&matcher, &["20240131-2_Risk_Register.md", "appendix.md"]);
        let outcome = matcher.match_title("Risk Register!", &idx);
        assert_eq!(
            matched_name(&outcome),
            Some(("20240131-2_Risk_Register.md", "normalized-exact"))
        );
    }

    #[test]
    fn token_overlap_selects_best_partial_title() {
        let matcher = Matcher::default();
        let idx = index(&matcher, &["executive_summary.md", "budget.md", "summary_of_costs.md"]);
        let outcome = matcher.match_title("Executive Summary — Draft v2", &idx);
        assert_eq!(
            matched_name(&outcome),
            Some(("executive_summary.md", "token-overlap"))
        );
    }

    #[test]
    fn containment_catches_abbreviated_stems() {
        let matcher = Matcher::default();
        let idx = index(&matcher, &["01_intro.md", "02_concl.md"]);
        assert_eq!(
            matched_name(&matcher.match_title("Introduction", &idx)),
            Some(("01_intro.md", "containment"))
        );
        assert_eq!(
            matched_name(&matcher.match_title("Conclusion", &idx)),
            Some(("02_concl.md", "containment"))
        );
    }

    #[test]
    fn low_scores_are_no_match() {
        let matcher = Matcher::default();
        let idx = index(&matcher, &["budget.md", "appendix.md"]);
        assert_eq!(
            matcher.match_title("Executive Summary — Draft v2", &idx),
            MatchOutcome::NoMatch
        );
        assert_eq!(matcher.match_title("Anything", &CandidateIndex::default()), MatchOutcome::NoMatch);
    }

    #[test]
    fn containment_below_floor_is_no_match() {
        let matcher = Matcher::default();
        for stem in ["summary.md", "a.md", "raft.md"] {
            let idx = index(&matcher, &[stem]);
            assert_eq!(
                matcher.match_title("Executive Summary — Draft v2", &idx),
                MatchOutcome::NoMatch,
                "{stem}"
            );
        }
        let idx = index(&matcher, &["a.md", "ix.md"]);
        assert_eq!(matcher.match_title("Appendix", &idx), MatchOutcome::NoMatch);
    }

    #[test]
    fn containment_floor_is_configurable() {
        let loose = Matcher::new(MatcherConfig {
            min_containment_score: 0.25,
            ..MatcherConfig::default()
        });
        let idx = index(&loose, &["summary.md"]);
        assert_eq!(
            matched_name(&loose.match_title("Executive Summary — Draft v2", &idx)),
            Some(("summary.md", "containment"))
        );
    }

    #[test]
    fn containment_score_bounds() {
        assert!(containment_score("intro", "introduction").unwrap() > MIN_CONTAINMENT_SCORE);
        assert_eq!(containment_score("concl", "conclusion"), Some(0.5));
        assert_eq!(containment_score("a", "appendix"), None);
        assert_eq!(containment_score("ap", "appendix"), None);
        assert_eq!(containment_score("", "appendix"), None);
        assert_eq!(containment_score("app", "appendix"), Some(3.0 / 8.0));
    }

    #[test]
    fn newest_revision_wins_exact_ties() {
        let matcher = Matcher::default();
        let idx = index(
            &matcher,
            &["20240101_scope.md", "20240301_scope.md", "20240301-1_scope.md"],
        );
        assert_eq!(
            matched_name(&matcher.match_title("Scope", &idx)),
            Some(("20240301-1_scope.md", "normalized-exact"))
        );
    }

    #[test]
    fn token_ties_prefer_shortest_then_lexical() {
        let matcher = Matcher::default();
        let idx = index(&matcher, &["risk_plan.md", "plan_risk.md", "risks_overview.md"]);
        // risk_plan and plan_risk both score 2/3 against "Risk Update Plan".
        let outcome = matcher.match_title("Risk Update Plan", &idx);
        assert_eq!(
            matched_name(&outcome),
            Some(("plan_risk.md", "token-overlap"))
        );
    }

    #[test]
    fn rejecting_ties_reports_ambiguity() {
        let matcher = Matcher::new(MatcherConfig {
            tie_break: TieBreak::Reject,
            ..MatcherConfig::default()
        });
        let idx = index(&matcher, &["risk_plan.md", "plan_risk.md"]);
        match matcher.match_title("Risk Update Plan", &idx) {
            MatchOutcome::Ambiguous { candidates } => {
                assert_eq!(candidates, vec!["plan_risk.md", "risk_plan.md"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[test]
    fn exact_ties_fall_through_to_next_tier() {
        let matcher = Matcher::default();
        // Both normalize to `scope`; the token tier settles it by name length.
        let idx = index(&matcher, &["Scope.md", "scope!.md"]);
        assert_eq!(
            matched_name(&matcher.match_title("Scope", &idx)),
            Some(("Scope.md", "token-overlap"))
        );
    }

    #[test]
    fn ties_in_every_tier_are_ambiguous_when_rejected() {
        let matcher = Matcher::new(MatcherConfig {
            tie_break: TieBreak::Reject,
            ..MatcherConfig::default()
        });
        let idx = index(&matcher, &["Scope.md", "scope!.md"]);
        assert_eq!(
            matcher.match_title("Scope", &idx),
            MatchOutcome::Ambiguous {
                candidates: vec!["Scope.md".to_string(), "scope!.md".to_string()],
            }
        );
    }

    #[test]
    fn prefix_separator_is_configurable() {
        let strict = Matcher::default();
        assert_eq!(strict.strip_date_prefix("2024report").0, "2024report");
        assert_eq!(strict.strip_date_prefix("01_intro").0, "intro");
        assert_eq!(strict.strip_date_prefix("2024").0, "2024");

        let lenient = Matcher::new(MatcherConfig {
            require_prefix_separator: false,
            ..MatcherConfig::default()
        });
        let (rest, revision) = lenient.strip_date_prefix("2024report");
        assert_eq!(rest, "report");
        assert_eq!(revision.unwrap().date, "2024");
    }

    #[test]
    fn revisions_order_by_date_then_counter() {
        let older = Revision {
            date: "20240101".into(),
            counter: 9,
        };
        let newer = Revision {
            date: "20240102".into(),
            counter: 0,
        };
        assert!(newer > older);
        assert!(Some(older) > None);
    }
}
