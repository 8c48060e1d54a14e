//! Tiered metadata resolution: cache, then the remote bibliographic
//! service, then the derived-citation service.
//!
//! Per-identifier failures degrade to `None` — a transport error or a
//! missing record is a quarantine cause for one mention, never a reason to
//! abort the batch. Identifiers that fail remotely are memoized so a run
//! never retries them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use shelfmark_common::{ResolvedMetadata, SourceTier};

use crate::cache::MetadataCache;
use crate::catalog::BookCatalog;

/// Minimum spacing between consecutive remote calls.
const DEFAULT_LOOKUP_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed-interval spacing for remote calls. Deliberately not a token
/// bucket: the pipeline is sequential, so "at least N ms since the last
/// call" is the whole contract.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Sleep until at least `min_interval` has passed since the previous
    /// call, then mark this call.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}

pub struct Resolver {
    catalog: Arc<dyn BookCatalog>,
    cache: MetadataCache,
    limiter: RateLimiter,
    /// Identifiers the remote tier failed on this run; no retry within a run.
    failed_lookups: HashSet<String>,
}

impl Resolver {
    pub fn new(catalog: Arc<dyn BookCatalog>, cache: MetadataCache) -> Self {
        Self::with_interval(catalog, cache, DEFAULT_LOOKUP_INTERVAL)
    }

    pub fn with_interval(
        catalog: Arc<dyn BookCatalog>,
        cache: MetadataCache,
        min_interval: Duration,
    ) -> Self {
        Self {
            catalog,
            cache,
            limiter: RateLimiter::new(min_interval),
            failed_lookups: HashSet::new(),
        }
    }

    /// Resolve an identifier to normalized metadata, or `None` if no tier
    /// produced a record.
    pub async fn resolve(&mut self, identifier: &str) -> Option<ResolvedMetadata> {
        let (record, tier) = match self.fetch_record(identifier).await {
            Some(hit) => hit,
            None => return None,
        };

        let mut title = string_field(&record, "title").unwrap_or_default();
        let mut author = string_field(&record, "author")
            .map(|a| normalize_authors(&a))
            .unwrap_or_default();
        let mut publisher = string_field(&record, "publisher").unwrap_or_default();
        let mut tier = tier;

        // Derived-citation tier: only supersedes the record's own fields
        // when the citation yields all three.
        if let Some(catalog_id) = string_field(&record, "catalog_id") {
            if let Some(citation) = self.fetch_citation(&catalog_id).await {
                let fields = parse_citation(&citation);
                if let (Some(c_title), Some(c_author), Some(c_publisher)) =
                    (fields.title, fields.author, fields.publisher)
                {
                    title = c_title;
                    author = normalize_authors(&c_author);
                    publisher = c_publisher;
                    tier = SourceTier::DerivedCitation;
                }
            }
        }

        debug!(identifier, %tier, "Resolved metadata");
        Some(ResolvedMetadata {
            title,
            author,
            publisher,
            source_tier: tier,
        })
    }

    /// Tier 1 and 2: cached response, else a rate-limited remote lookup
    /// persisted back into the cache.
    async fn fetch_record(&mut self, identifier: &str) -> Option<(serde_json::Value, SourceTier)> {
        if let Some(record) = self.cache.read_record(identifier) {
            return Some((record, SourceTier::Cache));
        }

        if self.failed_lookups.contains(identifier) {
            return None;
        }

        self.limiter.wait().await;
        match self.catalog.lookup_isbn(identifier).await {
            Ok(Some(record)) => {
                info!(identifier, "Remote lookup succeeded");
                self.cache.write_record(identifier, &record);
                Some((record, SourceTier::Remote))
            }
            Ok(None) => {
                debug!(identifier, "Remote lookup found no record");
                self.failed_lookups.insert(identifier.to_string());
                None
            }
            Err(e) => {
                warn!(identifier, error = %e, "Remote lookup failed");
                self.failed_lookups.insert(identifier.to_string());
                None
            }
        }
    }

    /// Tier 3 fetch: cached citation text, else a rate-limited remote fetch
    /// persisted back into the cache. Failure degrades to `None`.
    async fn fetch_citation(&mut self, catalog_id: &str) -> Option<String> {
        if let Some(text) = self.cache.read_citation(catalog_id) {
            return Some(text);
        }

        self.limiter.wait().await;
        match self.catalog.fetch_citation(catalog_id).await {
            Ok(Some(text)) => {
                self.cache.write_citation(catalog_id, &text);
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(catalog_id, error = %e, "Citation fetch failed");
                None
            }
        }
    }
}

/// Pull a named field out of a raw lookup response. The response shape is
/// service-defined; fields live either at the top level or under a
/// `summary` object, as strings or arrays of strings.
fn string_field(record: &serde_json::Value, name: &str) -> Option<String> {
    let value = match &record[name] {
        serde_json::Value::Null => &record["summary"][name],
        v => v,
    };
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Array(items) => {
            let joined: Vec<&str> = items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined.join(", "))
            }
        }
        _ => None,
    }
}

/// Fields parsed out of raw citation text.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CitationFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
}

/// Parse `key: value` lines out of citation text. Keys are matched
/// case-insensitively; unknown lines are ignored. Both ASCII and
/// full-width colons separate.
pub fn parse_citation(text: &str) -> CitationFields {
    let mut fields = CitationFields::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':').or_else(|| line.split_once('：')) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim().to_lowercase().as_str() {
            "title" => fields.title = Some(value.to_string()),
            "author" => fields.author = Some(value.to_string()),
            "publisher" => fields.publisher = Some(value.to_string()),
            _ => {}
        }
    }
    fields
}

/// Normalize an author string: split on comma, semicolon, the word "and",
/// or the et-al marker "ほか"; trim and collapse whitespace per name;
/// drop duplicates keeping first-seen order; rejoin with ", ".
pub fn normalize_authors(raw: &str) -> String {
    let mut names: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for piece in raw.split([',', ';']) {
        for segment in piece.split("ほか") {
            for name in split_on_and(segment) {
                if seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
    }

    names.join(", ")
}

/// Split a segment on the standalone word "and", collapsing whitespace
/// within each resulting name. "Alexander Graham" stays whole.
fn split_on_and(segment: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for token in segment.split_whitespace() {
        if token.eq_ignore_ascii_case("and") {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(token);
        }
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }
    out
}
