//! Validation of bulk opportunity ingest batches.

use purchase_store::NewOpportunity;

use crate::error::ValidationError;

/// Largest batch accepted by a single ingest call.
pub const MAX_INGEST_BATCH: usize = 500;

const MAX_TEXT_LEN: usize = 500;
const MAX_URL_LEN: usize = 2048;

/// Checks batch size and every record. The first invalid record is reported
/// with its index.
pub fn validate_opportunity_batch(records: &[NewOpportunity]) -> Result<(), ValidationError> {
    if records.is_empty() || records.len() > MAX_INGEST_BATCH {
        return Err(ValidationError::BatchSize {
            len: records.len(),
            max: MAX_INGEST_BATCH,
        });
    }

    for (index, record) in records.iter().enumerate() {
        validate_record(record).map_err(|reason| ValidationError::InvalidRecord {
            index,
            reason: Box::new(reason),
        })?;
    }
    Ok(())
}

fn validate_record(record: &NewOpportunity) -> Result<(), ValidationError> {
    required_text("title", &record.title, MAX_TEXT_LEN)?;
    required_text("organization", &record.organization, MAX_TEXT_LEN)?;
    if let Some(url) = &record.url
        && url.chars().count() > MAX_URL_LEN
    {
        return Err(ValidationError::TooLong {
            field: "url",
            max: MAX_URL_LEN,
        });
    }
    Ok(())
}

fn required_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}
