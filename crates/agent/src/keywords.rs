use regex::Regex;
use serde::Serialize;
use switchyard_core::config::{KeywordRule, RoutingConfig};

/// Kind of match between one keyword and the request text. Only the best
/// kind counts for a keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// The keyword appears as a whole phrase, delimited by non-word
    /// characters or the ends of the text.
    Exact,
    /// The text starts or ends with the keyword.
    Edge,
    /// The keyword appears anywhere, ignoring case.
    Substring,
}

impl MatchKind {
    pub fn points(self) -> u32 {
        match self {
            MatchKind::Exact => 10,
            MatchKind::Edge => 8,
            MatchKind::Substring => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Edge => "edge",
            MatchKind::Substring => "substring",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub kind: MatchKind,
    pub weight: u32,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolScore {
    pub tool: String,
    pub score: u32,
    /// Highest weight among the tool's configured rules.
    pub max_weight: u32,
    /// Position in the configured rule table.
    pub order: usize,
    pub matches: Vec<KeywordMatch>,
}

struct CompiledRule {
    keyword: String,
    keyword_lower: String,
    weight: u32,
    boundary: Option<Regex>,
}

struct ToolRules {
    tool: String,
    max_weight: u32,
    rules: Vec<CompiledRule>,
}

/// Deterministic keyword scorer used when the primary classifier cannot
/// decide.
///
/// Whole-phrase and edge matches compare the keyword against the trimmed
/// text as written; substring matches ignore case.
pub struct KeywordScorer {
    tools: Vec<ToolRules>,
}

impl KeywordScorer {
    /// Rules are grouped by tool in order of first appearance.
    pub fn new(rules: &[KeywordRule]) -> Self {
        let mut tools: Vec<ToolRules> = Vec::new();
        for rule in rules {
            let keyword = rule.keyword.trim();
            if keyword.is_empty() {
                continue;
            }
            let compiled = CompiledRule {
                keyword: keyword.to_string(),
                keyword_lower: keyword.to_lowercase(),
                weight: rule.priority_weight.max(1),
                boundary: Regex::new(&format!(
                    r"(?:^|[^\p{{L}}\p{{N}}_]){}(?:$|[^\p{{L}}\p{{N}}_])",
                    regex::escape(keyword)
                ))
                .ok(),
            };
            match tools.iter_mut().find(|t| t.tool == rule.tool) {
                Some(group) => {
                    group.max_weight = group.max_weight.max(compiled.weight);
                    group.rules.push(compiled);
                }
                None => tools.push(ToolRules {
                    tool: rule.tool.clone(),
                    max_weight: compiled.weight,
                    rules: vec![compiled],
                }),
            }
        }
        Self { tools }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(&config.keyword_rules())
    }

    /// Configured tool names, in registration order.
    pub fn tools(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.tool.as_str()).collect()
    }

    fn match_kind(rule: &CompiledRule, text: &str, text_lower: &str) -> Option<MatchKind> {
        if rule.boundary.as_ref().map_or(false, |re| re.is_match(text)) {
            Some(MatchKind::Exact)
        } else if text.starts_with(&rule.keyword) || text.ends_with(&rule.keyword) {
            Some(MatchKind::Edge)
        } else if text_lower.contains(&rule.keyword_lower) {
            Some(MatchKind::Substring)
        } else {
            None
        }
    }

    /// Score every configured tool accepted by `is_available`, in
    /// registration order.
    pub fn score<F>(&self, text: &str, is_available: F) -> Vec<ToolScore>
    where
        F: Fn(&str) -> bool,
    {
        let text = text.trim();
        let text_lower = text.to_lowercase();
        self.tools
            .iter()
            .enumerate()
            .filter(|(_, group)| is_available(&group.tool))
            .map(|(order, group)| {
                let matches: Vec<KeywordMatch> = group
                    .rules
                    .iter()
                    .filter_map(|rule| {
                        Self::match_kind(rule, text, &text_lower).map(|kind| KeywordMatch {
                            keyword: rule.keyword.clone(),
                            kind,
                            weight: rule.weight,
                            points: kind.points() * rule.weight,
                        })
                    })
                    .collect();
                ToolScore {
                    tool: group.tool.clone(),
                    score: matches.iter().map(|m| m.points).sum(),
                    max_weight: group.max_weight,
                    order,
                    matches,
                }
            })
            .collect()
    }

    /// Pick the winner: highest score, then highest weight, then earliest
    /// registration. `None` when nothing scores.
    pub fn best(scores: &[ToolScore]) -> Option<&ToolScore> {
        scores
            .iter()
            .filter(|s| s.score > 0)
            .min_by(|a, b| {
                b.score
                    .cmp(&a.score)
                    .then(b.max_weight.cmp(&a.max_weight))
                    .then(a.order.cmp(&b.order))
            })
    }
}

/// Share of all matched points held by the winner, 0..=100.
pub fn fallback_confidence(winner: &ToolScore, scores: &[ToolScore]) -> u8 {
    let total: u32 = scores.iter().map(|s| s.score).sum();
    if total == 0 {
        return 0;
    }
    ((winner.score as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}
