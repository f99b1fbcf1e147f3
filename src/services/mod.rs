pub mod adaptation;
pub mod aggregator;
pub mod curator;
pub mod fanout;
pub mod filters;
pub mod oracle;
pub mod providers;
pub mod quota;
pub mod selector;

pub use aggregator::CandidateAggregator;
pub use curator::{Curator, RefreshOutcome, UsageStats};
pub use oracle::{OpenAiOracle, Oracle, Prompt};
pub use providers::{CatalogConnector, CatalogSource, YouTubeProvider};
pub use quota::{QuotaDecision, QuotaGate};
pub use selector::CurationSelector;
