//! Bulk opportunity ingest guarded by a shared bearer token.

use domain::{TokenAuthError, TokenAuthenticator, validate_opportunity_batch};
use purchase_store::{NewOpportunity, PurchaseStore};

use crate::error::Result;

/// Accepts opportunity batches from a trusted upstream.
pub struct IngestService<S: PurchaseStore> {
    store: S,
    auth: TokenAuthenticator,
}

impl<S: PurchaseStore> IngestService<S> {
    /// Creates a new ingest service.
    pub fn new(store: S, auth: TokenAuthenticator) -> Self {
        Self { store, auth }
    }

    /// Checks the caller's bearer token.
    pub fn authenticate(&self, token: Option<&str>) -> std::result::Result<(), TokenAuthError> {
        self.auth.authenticate(token).inspect_err(|err| {
            metrics::counter!("ingest_auth_failures_total").increment(1);
            tracing::warn!(error = %err, "ingest authentication failed");
        })
    }

    /// Validates and stores a batch in one transaction.
    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    pub async fn ingest(&self, records: &[NewOpportunity]) -> Result<u64> {
        validate_opportunity_batch(records)?;
        let inserted = self.store.insert_opportunities(records).await?;
        metrics::counter!("ingest_records_total").increment(inserted);
        tracing::info!(inserted, "opportunities ingested");
        Ok(inserted)
    }
}
