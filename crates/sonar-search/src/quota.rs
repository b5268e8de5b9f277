//! Quota gate applied before a counted search fetches anything.

use crate::error::{Result, SearchError};
use sonar_core::{AccountQuota, DeductMode, FetchSize, FreeAllotment};

/// Check `size` against the account and return the size to actually fetch.
///
/// - no free tier: requires credit and the credit deduction mode
/// - unknown tier: passes unchanged
/// - limited tier: an oversized request is clamped down to the allotment
///   under [`DeductMode::Free`] and passes unchanged otherwise
pub fn gate(quota: &AccountQuota, size: FetchSize) -> Result<FetchSize> {
    match quota.free {
        FreeAllotment::None => {
            if quota.credit < 1 {
                return Err(SearchError::QuotaExceeded {
                    reason: "no free allotment and no credit".to_string(),
                });
            }
            if quota.mode != DeductMode::Credit {
                return Err(SearchError::QuotaExceeded {
                    reason: "no free allotment, set deduct mode to credit to spend credit"
                        .to_string(),
                });
            }
            Ok(size)
        }
        FreeAllotment::Unknown => Ok(size),
        FreeAllotment::Limited(free) => match size {
            FetchSize::Limit(n) if n > free && quota.mode == DeductMode::Free => {
                tracing::warn!(
                    "size {} is larger than the free limit, fetching {} instead; \
                     set deduct mode to credit to spend credit automatically",
                    n,
                    free
                );
                Ok(FetchSize::Limit(free))
            }
            other => Ok(other),
        },
    }
}
