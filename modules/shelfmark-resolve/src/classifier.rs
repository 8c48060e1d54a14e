//! Accept/quarantine classification.
//!
//! A pure decision table over evidence the pipeline has already gathered:
//! validation outcome, duplicate status, resolution outcome, title
//! similarity. Strict priority — a mention with several simultaneous
//! problems reports only the first applicable reason.

use chrono::Utc;

use shelfmark_common::{
    CanonicalBookRecord, MetadataField, QuarantineReason, QuarantinedRecord, RawMention,
    ResolvedMetadata,
};

use crate::isbn::IsbnFault;

/// Similarity floor below which a resolved title is considered a different
/// book. Deliberately permissive: it exists to catch wildly wrong catalog
/// hits, not near-matches.
pub const SIMILARITY_THRESHOLD: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept(CanonicalBookRecord),
    Quarantine(QuarantineReason),
    /// Identifier already accepted this run: dropped, counted, not quarantined.
    DuplicateSkip,
}

/// Classify one mention. `validation` is `None` when the mention carried no
/// identifier at all; `resolved`/`title_score` are whatever the pipeline
/// gathered before an earlier rule short-circuited (ignored in that case).
pub fn classify(
    mention: &RawMention,
    validation: Option<&Result<String, IsbnFault>>,
    already_accepted: bool,
    resolved: Option<&ResolvedMetadata>,
    title_score: f64,
) -> Decision {
    let identifier = match validation {
        None => return Decision::Quarantine(QuarantineReason::NoIdentifier),
        Some(Err(IsbnFault::DigitCount { .. })) => {
            return Decision::Quarantine(QuarantineReason::InvalidDigitCount)
        }
        Some(Err(IsbnFault::Checksum)) => {
            return Decision::Quarantine(QuarantineReason::InvalidChecksum)
        }
        Some(Ok(cleaned)) => cleaned,
    };

    if already_accepted {
        return Decision::DuplicateSkip;
    }

    let resolved = match resolved {
        None => return Decision::Quarantine(QuarantineReason::LookupFailed),
        Some(r) => r,
    };

    if title_score < SIMILARITY_THRESHOLD {
        return Decision::Quarantine(QuarantineReason::TitleMismatch);
    }

    let empty_fields = empty_required_fields(resolved);
    if !empty_fields.is_empty() {
        return Decision::Quarantine(QuarantineReason::IncompleteMetadata(empty_fields));
    }

    // Resolved fields win; the mention's own values only back-fill fields
    // the resolver left empty, which the incomplete-metadata rule has
    // already excluded here.
    Decision::Accept(CanonicalBookRecord {
        title: or_fallback(&resolved.title, &mention.title),
        author: or_fallback(&resolved.author, &mention.author),
        publisher: or_fallback(&resolved.publisher, &mention.publisher),
        price: mention.price.clone(),
        identifier: identifier.clone(),
        created_at: Utc::now(),
    })
}

fn empty_required_fields(resolved: &ResolvedMetadata) -> Vec<MetadataField> {
    let mut empty = Vec::new();
    if resolved.title.trim().is_empty() {
        empty.push(MetadataField::Title);
    }
    if resolved.author.trim().is_empty() {
        empty.push(MetadataField::Author);
    }
    if resolved.publisher.trim().is_empty() {
        empty.push(MetadataField::Publisher);
    }
    empty
}

fn or_fallback(primary: &str, fallback: &str) -> String {
    if primary.trim().is_empty() {
        fallback.to_string()
    } else {
        primary.to_string()
    }
}

/// Build the quarantine row for a rejected mention.
pub fn quarantine_record(mention: &RawMention, reason: &QuarantineReason) -> QuarantinedRecord {
    let now = Utc::now();
    QuarantinedRecord {
        source_reference: mention.source_reference.clone(),
        title: mention.title.clone(),
        author: mention.author.clone(),
        publisher: mention.publisher.clone(),
        price: mention.price.clone(),
        identifier: mention.identifier.clone(),
        role: mention.role.clone(),
        categorization_status: reason.to_string(),
        created_at: now,
        updated_at: now,
    }
}
