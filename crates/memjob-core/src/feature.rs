//! Feature advertisement.

use crate::error::EngineError;

/// A canonical feature id the host can query for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureId {
    /// `extended-api`
    ExtendedApi,
    /// `queueing`
    Queueing,
    /// `batched-lowest-score-fetch`
    BatchedLowestScoreFetch,
    /// `utc-time-accessor`
    UtcTimeAccessor,
    /// `set-contains`
    SetContains,
    /// `limited-set-count`
    LimitedSetCount,
    /// `transactional-lock-acquisition`
    TransactionalLockAcquisition,
    /// `in-transaction-job-creation`
    InTransactionJobCreation,
    /// `in-transaction-job-parameter-set`
    InTransactionJobParameterSet,
    /// `transactional-acknowledge-of-fetched-jobs`
    TransactionalAcknowledgeOfFetchedJobs,
    /// `deleted-state-graphs`
    DeletedStateGraphs,
    /// `awaiting-state-listing`
    AwaitingStateListing,
}

impl FeatureId {
    const ALL: [(&'static str, FeatureId); 12] = [
        ("extended-api", FeatureId::ExtendedApi),
        ("queueing", FeatureId::Queueing),
        (
            "batched-lowest-score-fetch",
            FeatureId::BatchedLowestScoreFetch,
        ),
        ("utc-time-accessor", FeatureId::UtcTimeAccessor),
        ("set-contains", FeatureId::SetContains),
        ("limited-set-count", FeatureId::LimitedSetCount),
        (
            "transactional-lock-acquisition",
            FeatureId::TransactionalLockAcquisition,
        ),
        (
            "in-transaction-job-creation",
            FeatureId::InTransactionJobCreation,
        ),
        (
            "in-transaction-job-parameter-set",
            FeatureId::InTransactionJobParameterSet,
        ),
        (
            "transactional-acknowledge-of-fetched-jobs",
            FeatureId::TransactionalAcknowledgeOfFetchedJobs,
        ),
        ("deleted-state-graphs", FeatureId::DeletedStateGraphs),
        (
            "awaiting-state-listing",
            FeatureId::AwaitingStateListing,
        ),
    ];

    /// Canonical string id for this feature.
    pub fn as_str(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, f)| *f == self)
            .map(|(s, _)| *s)
            .expect("FeatureId::ALL covers every variant")
    }

    fn parse(id: &str) -> Option<Self> {
        Self::ALL.iter().find(|(s, _)| *s == id).map(|(_, f)| *f)
    }
}

/// `true` for every canonical feature id; `false` for anything else;
/// `InvalidArgument` when the caller passes no id at all.
pub fn has_feature(id: Option<&str>) -> Result<bool, EngineError> {
    let id = id.ok_or_else(|| EngineError::invalid_argument("feature id must not be null"))?;
    Ok(FeatureId::parse(id).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_id_is_recognized() {
        for (id, _) in FeatureId::ALL {
            assert!(has_feature(Some(id)).unwrap(), "expected {id} to be known");
        }
    }

    #[test]
    fn unknown_id_is_false_not_an_error() {
        assert!(!has_feature(Some("warp-drive")).unwrap());
    }

    #[test]
    fn null_id_is_invalid_argument() {
        assert!(matches!(
            has_feature(None),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn as_str_round_trips_through_parse() {
        for (id, feature) in FeatureId::ALL {
            assert_eq!(feature.as_str(), id);
        }
    }
}
