pub mod classifier;
pub mod keywords;
pub mod router;
pub mod runtime;
pub mod status;

pub use classifier::{Classification, IntentClassifier, LlmClassifier};
pub use keywords::{KeywordScorer, MatchKind, ToolScore};
pub use router::{DecisionSource, RouteOutcome, Router, RoutingDecision};
pub use runtime::{AgentRuntime, ChatMetadata, ChatReply};
pub use status::{StatusChannel, StatusEvent};
