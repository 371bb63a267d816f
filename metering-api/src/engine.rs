use crate::config::PriceInfo;
use crate::identity::Identity;
use crate::query::Query;
use crate::types::{HierarchyResult, MeteringResult};
use async_trait::async_trait;

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum EngineError {
    /// The engine answered and refused the query.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("metering engine unavailable: {0}")]
    Unavailable(String),

    #[error("invalid response from metering engine: {0}")]
    InvalidResponse(String),
}

impl EngineError {
    /// Whether the same request could succeed later. Not acted upon yet: every
    /// engine error is answered as a bad request.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Rejected { status, .. } => *status >= 500,
            EngineError::Unavailable(_) => true,
            EngineError::InvalidResponse(_) => false,
        }
    }
}

/// Computes metering statistics for a user. Aggregation and billing happen
/// behind this trait.
#[async_trait]
pub trait MeteringEngine: Send + Sync {
    /// Aggregated statistics at the query's level.
    async fn metering(
        &self,
        user: &Identity,
        query: &Query,
        price_info: &PriceInfo,
    ) -> Result<MeteringResult, EngineError>;

    /// Breakdown across the resource hierarchy, down to individual pods.
    async fn metering_hierarchy(
        &self,
        user: &Identity,
        query: &Query,
        price_info: &PriceInfo,
    ) -> Result<HierarchyResult, EngineError>;
}
