//! Typed ID aliases for the entities the analysis worker touches.

pub use super::id::Id;

/// Marker type for analysis reports.
pub struct Report;

/// Marker type for registered domains.
pub struct Site;

/// Marker type for LLM provider configurations.
pub struct LlmProviderConfig;

/// Marker type for account holders.
pub struct Account;

pub type ReportId = Id<Report>;

pub type DomainId = Id<Site>;

pub type LlmConfigId = Id<LlmProviderConfig>;

pub type UserId = Id<Account>;
