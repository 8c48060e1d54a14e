use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Input ---

/// A bibliographic mention as extracted from a scraped course document.
/// Every field is presence-optional text except `role`; the extraction
/// collaborator makes no promises about cleanliness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMention {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publisher: String,
    /// Price as scraped, e.g. "2,860円". Carried through verbatim.
    #[serde(default)]
    pub price: String,
    /// Candidate identifier as scraped (may contain hyphens, labels, noise).
    #[serde(default)]
    pub identifier: Option<String>,
    /// Textbook / reference / supplementary, per the source document.
    pub role: String,
    /// Where in the scraped corpus this mention came from.
    #[serde(default)]
    pub source_reference: String,
}

// --- Resolution ---

/// Which lookup tier satisfied a metadata resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Cache,
    Remote,
    DerivedCitation,
    None,
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTier::Cache => write!(f, "cache"),
            SourceTier::Remote => write!(f, "remote"),
            SourceTier::DerivedCitation => write!(f, "derived-citation"),
            SourceTier::None => write!(f, "none"),
        }
    }
}

/// Normalized metadata for one identifier, as produced by the tiered lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub source_tier: SourceTier,
}

// --- Output ---

/// A deduplicated, accepted book. Keyed by validated identifier; created
/// once per distinct identifier per run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalBookRecord {
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub price: String,
    pub identifier: String,
    pub created_at: DateTime<Utc>,
}

/// A mention that could not be resolved, carrying exactly one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantinedRecord {
    pub source_reference: String,
    pub title: String,
    pub author: String,
    pub publisher: String,
    pub price: String,
    pub identifier: Option<String>,
    pub role: String,
    /// Rendered `QuarantineReason` string; always non-empty.
    pub categorization_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Quarantine taxonomy ---

/// Required metadata fields, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    Title,
    Author,
    Publisher,
}

impl std::fmt::Display for MetadataField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataField::Title => write!(f, "title"),
            MetadataField::Author => write!(f, "author"),
            MetadataField::Publisher => write!(f, "publisher"),
        }
    }
}

/// Closed set of quarantine causes. The `Display` rendering is the wire
/// format stored in `QuarantinedRecord::categorization_status`; downstream
/// reporting matches on these strings, so they never change casually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineReason {
    NoIdentifier,
    InvalidDigitCount,
    InvalidChecksum,
    LookupFailed,
    TitleMismatch,
    IncompleteMetadata(Vec<MetadataField>),
}

impl std::fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuarantineReason::NoIdentifier => write!(f, "no identifier"),
            QuarantineReason::InvalidDigitCount => {
                write!(f, "invalid identifier: digit-count violation")
            }
            QuarantineReason::InvalidChecksum => {
                write!(f, "invalid identifier: checksum violation")
            }
            QuarantineReason::LookupFailed => write!(f, "lookup failed: no external record"),
            QuarantineReason::TitleMismatch => write!(f, "title mismatch: low similarity"),
            QuarantineReason::IncompleteMetadata(fields) => {
                write!(f, "incomplete metadata: ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{field} empty")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_strings_match_the_closed_taxonomy() {
        assert_eq!(QuarantineReason::NoIdentifier.to_string(), "no identifier");
        assert_eq!(
            QuarantineReason::InvalidDigitCount.to_string(),
            "invalid identifier: digit-count violation"
        );
        assert_eq!(
            QuarantineReason::InvalidChecksum.to_string(),
            "invalid identifier: checksum violation"
        );
        assert_eq!(
            QuarantineReason::LookupFailed.to_string(),
            "lookup failed: no external record"
        );
        assert_eq!(
            QuarantineReason::TitleMismatch.to_string(),
            "title mismatch: low similarity"
        );
        assert_eq!(
            QuarantineReason::IncompleteMetadata(vec![MetadataField::Publisher]).to_string(),
            "incomplete metadata: publisher empty"
        );
        assert_eq!(
            QuarantineReason::IncompleteMetadata(vec![
                MetadataField::Title,
                MetadataField::Author,
            ])
            .to_string(),
            "incomplete metadata: title empty, author empty"
        );
    }
}
