use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use switchyard_core::config::{ModelConfig, RoutingConfig};
use switchyard_core::Config;
use switchyard_providers::create_provider;
use tracing::{debug, info, warn};

use crate::classifier::{Classification, IntentClassifier, LlmClassifier};
use crate::keywords::{fallback_confidence, KeywordScorer, ToolScore};
use crate::status::StatusChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Primary,
    Fallback,
}

impl std::fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionSource::Primary => write!(f, "primary"),
            DecisionSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub tool: String,
    /// 0..=100
    pub confidence: u8,
    pub reasoning: String,
    pub source: DecisionSource,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Selected(RoutingDecision),
    /// No capability scored; the caller decides what to do.
    NoMatch { reasoning: String },
}

impl RouteOutcome {
    pub fn decision(&self) -> Option<&RoutingDecision> {
        match self {
            RouteOutcome::Selected(d) => Some(d),
            RouteOutcome::NoMatch { .. } => None,
        }
    }
}

/// Two-tier router: an optional primary classifier, then weighted keyword
/// scoring when the classifier is missing, fails, times out or names a
/// capability that is not loaded.
pub struct Router {
    classifier: Option<Arc<dyn IntentClassifier>>,
    classifier_timeout: Duration,
    scorer: KeywordScorer,
    threshold: u8,
    live_data_tool: String,
    live_data: Option<Regex>,
}

impl Router {
    pub fn new(routing: &RoutingConfig, classifier: Option<Arc<dyn IntentClassifier>>) -> Self {
        Self {
            classifier,
            classifier_timeout: Duration::from_secs(10),
            scorer: KeywordScorer::from_config(routing),
            threshold: routing.confidence_threshold.min(100),
            live_data_tool: routing.live_data_tool.clone(),
            live_data: build_indicator_regex(&routing.live_data_indicators),
        }
    }

    pub fn with_classifier_timeout(mut self, timeout: Duration) -> Self {
        self.classifier_timeout = timeout;
        self
    }

    /// Build from config. The LLM classifier is attached when enabled and
    /// its provider has a key; otherwise routing is keyword-only.
    pub fn from_config(config: &Config) -> Self {
        let classifier_cfg = &config.models.classifier;
        let classifier: Option<Arc<dyn IntentClassifier>> = if classifier_cfg.enabled {
            let model = ModelConfig {
                provider: classifier_cfg.provider.clone(),
                model: classifier_cfg.model.clone(),
                temperature: classifier_cfg.temperature,
                max_tokens: classifier_cfg.max_tokens,
            };
            match create_provider(config, &model) {
                Ok(provider) => Some(Arc::new(LlmClassifier::new(provider))),
                Err(e) => {
                    warn!(error = %e, "Classifier unavailable, routing by keywords only");
                    None
                }
            }
        } else {
            None
        };
        Self::new(&config.routing, classifier)
            .with_classifier_timeout(Duration::from_secs(classifier_cfg.timeout_secs.max(1)))
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    /// True when the text mentions any live-data indicator as a whole word.
    pub fn needs_live_data(&self, text: &str) -> bool {
        self.live_data.as_ref().map_or(false, |re| re.is_match(text))
    }

    /// Choose a capability among `available` (the registry's current names).
    pub async fn route(&self, text: &str, available: &[String], status: &mut StatusChannel) -> RouteOutcome {
        status.emit("Analyzing request...");

        if let Some(classification) = self.classify(text, available).await {
            if let Some(decision) = self.accept_primary(text, classification, available) {
                info!(tool = %decision.tool, confidence = decision.confidence, "Routed by classifier");
                status.emit(format!(
                    "Selected {} ({}% confidence)",
                    decision.tool, decision.confidence
                ));
                return RouteOutcome::Selected(decision);
            }
        }

        status.emit("Using keyword routing...");
        let outcome = self.fallback(text, available);
        match &outcome {
            RouteOutcome::Selected(decision) => {
                info!(tool = %decision.tool, confidence = decision.confidence, "Routed by keywords");
                status.emit(format!(
                    "Selected {} ({}% confidence)",
                    decision.tool, decision.confidence
                ));
            }
            RouteOutcome::NoMatch { .. } => {
                debug!("No capability matched");
                status.emit("No matching capability found");
            }
        }
        outcome
    }

    async fn classify(&self, text: &str, available: &[String]) -> Option<Classification> {
        let classifier = self.classifier.as_ref()?;
        match tokio::time::timeout(self.classifier_timeout, classifier.classify(text, available)).await {
            Ok(Ok(c)) => Some(c),
            Ok(Err(e)) => {
                warn!(error = %e, "Classifier failed, falling back to keywords");
                None
            }
            Err(_) => {
                warn!(timeout = ?self.classifier_timeout, "Classifier timed out, falling back to keywords");
                None
            }
        }
    }

    fn accept_primary(
        &self,
        text: &str,
        classification: Classification,
        available: &[String],
    ) -> Option<RoutingDecision> {
        let Classification {
            tool,
            confidence,
            reasoning,
        } = classification;
        if !available.iter().any(|t| t == &tool) {
            warn!(tool = %tool, "Classifier chose a capability that is not loaded");
            return None;
        }

        if confidence < self.threshold
            && tool != self.live_data_tool
            && self.needs_live_data(text)
            && available.iter().any(|t| t == &self.live_data_tool)
        {
            debug!(from = %tool, to = %self.live_data_tool, confidence, "Live-data override");
            return Some(RoutingDecision {
                reasoning: format!(
                    "{} (overridden from {} at {}% confidence: request needs live data)",
                    reasoning, tool, confidence
                )
                .trim_start()
                .to_string(),
                tool: self.live_data_tool.clone(),
                confidence,
                source: DecisionSource::Primary,
            });
        }

        Some(RoutingDecision {
            tool,
            confidence,
            reasoning,
            source: DecisionSource::Primary,
        })
    }

    /// Keyword pass only.
    pub fn fallback(&self, text: &str, available: &[String]) -> RouteOutcome {
        let scores = self.scorer.score(text, |tool| available.iter().any(|t| t == tool));
        match KeywordScorer::best(&scores) {
            Some(winner) => RouteOutcome::Selected(RoutingDecision {
                tool: winner.tool.clone(),
                confidence: fallback_confidence(winner, &scores),
                reasoning: describe(winner),
                source: DecisionSource::Fallback,
            }),
            None => RouteOutcome::NoMatch {
                reasoning: "no routing keyword matched the request".to_string(),
            },
        }
    }
}

fn describe(winner: &ToolScore) -> String {
    let matched: Vec<String> = winner
        .matches
        .iter()
        .map(|m| format!("'{}' {} x{}", m.keyword, m.kind.as_str(), m.weight))
        .collect();
    format!("keyword score {}: {}", winner.score, matched.join(", "))
}

fn build_indicator_regex(indicators: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = indicators
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(regex::escape)
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    let pattern = format!(
        r"(?i)(?:^|[^\p{{L}}\p{{N}}_])(?:{})(?:$|[^\p{{L}}\p{{N}}_])",
        alternatives.join("|")
    );
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(error = %e, "Invalid live-data indicators, override disabled");
            None
        }
    }
}
