pub mod catalog;
pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod matching;
pub mod resolution;
pub mod text;

pub use catalog::{CatalogIndex, IndexDiagnostics, IndexLimits};
pub use config::{AppConfig, ConfigError, LoadOptions};
pub use context::{Anchor, CarryoverDecision, ContextManager, ContextState, ConversationContext};
pub use domain::product::{Product, ProductKey, ProductRecord};
pub use errors::{ApplicationError, CatalogError, InterfaceError};
pub use matching::sku::{match_sku, sku_hits};
pub use matching::{MatchCandidate, MatchKind, MatchStrategy, TermMatcher};
pub use resolution::{
    FoundMatch, Resolution, ResolutionOutcome, ResolutionTrace, Resolved, Resolver,
};
pub use text::{normalize, Vocabulary};
