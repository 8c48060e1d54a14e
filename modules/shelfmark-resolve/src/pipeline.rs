//! Run aggregator: drives validation, resolution, scoring, classification,
//! and deduplication over a batch of mentions, sequentially and in call
//! order — order decides which mention wins duplicate ties.

use std::collections::HashSet;

use tracing::{debug, info};
use uuid::Uuid;

use shelfmark_common::{CanonicalBookRecord, QuarantinedRecord, RawMention};

use crate::classifier::{classify, quarantine_record, Decision};
use crate::isbn;
use crate::resolver::Resolver;
use crate::similarity;
use crate::stats::RunStats;

/// Everything a run produces: the two ordered output collections plus
/// observability counters.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub accepted: Vec<CanonicalBookRecord>,
    pub quarantined: Vec<QuarantinedRecord>,
    pub stats: RunStats,
}

pub struct Pipeline {
    resolver: Resolver,
}

impl Pipeline {
    pub fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    /// Process a batch of mentions. Per-mention failures become quarantine
    /// rows; nothing here aborts the batch.
    pub async fn run(mut self, mentions: &[RawMention]) -> RunReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, mentions = mentions.len(), "Resolution run starting");

        let mut accepted: Vec<CanonicalBookRecord> = Vec::new();
        let mut quarantined: Vec<QuarantinedRecord> = Vec::new();
        let mut accepted_identifiers: HashSet<String> = HashSet::new();
        let mut stats = RunStats {
            total_mentions: mentions.len() as u32,
            ..RunStats::default()
        };

        for mention in mentions {
            stats.processed += 1;
            let decision = self.classify_mention(mention, &accepted_identifiers).await;

            match decision {
                Decision::Accept(record) => {
                    accepted_identifiers.insert(record.identifier.clone());
                    stats.valid_records += 1;
                    accepted.push(record);
                }
                Decision::DuplicateSkip => {
                    debug!(
                        identifier = mention.identifier.as_deref().unwrap_or(""),
                        "Duplicate identifier, skipping"
                    );
                    stats.duplicate_identifiers += 1;
                }
                Decision::Quarantine(reason) => {
                    use shelfmark_common::QuarantineReason::*;
                    match reason {
                        InvalidDigitCount | InvalidChecksum => stats.invalid_identifiers += 1,
                        LookupFailed => stats.lookup_failures += 1,
                        _ => {}
                    }
                    stats.quarantined += 1;
                    quarantined.push(quarantine_record(mention, &reason));
                }
            }
        }

        // Deterministic output ordering regardless of input order.
        accepted.sort_by(|a, b| {
            (a.title.as_str(), a.publisher.as_str()).cmp(&(b.title.as_str(), b.publisher.as_str()))
        });
        quarantined.sort_by(|a, b| {
            (a.title.as_str(), a.source_reference.as_str())
                .cmp(&(b.title.as_str(), b.source_reference.as_str()))
        });

        info!(%run_id, "{}", stats);
        RunReport {
            run_id,
            accepted,
            quarantined,
            stats,
        }
    }

    /// Gather evidence for one mention, short-circuiting the expensive
    /// steps when an earlier rule already decides the outcome.
    async fn classify_mention(
        &mut self,
        mention: &RawMention,
        accepted_identifiers: &HashSet<String>,
    ) -> Decision {
        let raw_identifier = match mention.identifier.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => return classify(mention, None, false, None, 0.0),
        };

        let validation = isbn::validate(raw_identifier);
        let canonical = match &validation {
            Ok(cleaned) => cleaned.clone(),
            Err(_) => return classify(mention, Some(&validation), false, None, 0.0),
        };

        if accepted_identifiers.contains(&canonical) {
            return classify(mention, Some(&validation), true, None, 0.0);
        }

        // Resolve on the canonical form: the cache, the failed-lookup memo,
        // and the dedup set all key on it, so every raw spelling of an ISBN
        // shares one cache entry and one lookup.
        let resolved = self.resolver.resolve(&canonical).await;
        let title_score = resolved
            .as_ref()
            .map(|r| similarity::score(&mention.title, &r.title))
            .unwrap_or(0.0);

        classify(mention, Some(&validation), false, resolved.as_ref(), title_score)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use catalog_client::CatalogError;
    use serde_json::json;

    use super::*;
    use crate::cache::MetadataCache;
    use crate::catalog::BookCatalog;

    /// In-memory catalog: records by ISBN, citations by catalog id, and an
    /// optional set of identifiers that fail with a transport error.
    #[derive(Default)]
    struct MockCatalog {
        records: HashMap<String, serde_json::Value>,
        citations: HashMap<String, String>,
        failing: std::collections::HashSet<String>,
        lookups: Arc<AtomicU32>,
    }

    #[async_trait]
    impl BookCatalog for MockCatalog {
        async fn lookup_isbn(
            &self,
            isbn: &str,
        ) -> catalog_client::Result<Option<serde_json::Value>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(isbn) {
                return Err(CatalogError::Api {
                    status: 429,
                    message: "throttled".to_string(),
                });
            }
            Ok(self.records.get(isbn).cloned())
        }

        async fn fetch_citation(&self, catalog_id: &str) -> catalog_client::Result<Option<String>> {
            Ok(self.citations.get(catalog_id).cloned())
        }
    }

    fn mention(title: &str, identifier: Option<&str>, source: &str) -> RawMention {
        RawMention {
            title: title.to_string(),
            author: String::new(),
            publisher: String::new(),
            price: "3,000円".to_string(),
            identifier: identifier.map(String::from),
            role: "textbook".to_string(),
            source_reference: source.to_string(),
        }
    }

    fn pipeline_with(catalog: MockCatalog, cache_dir: &std::path::Path) -> Pipeline {
        let cache = MetadataCache::open(cache_dir).unwrap();
        let resolver = Resolver::with_interval(Arc::new(catalog), cache, Duration::ZERO);
        Pipeline::new(resolver)
    }

    fn book_record(title: &str) -> serde_json::Value {
        json!({"title": title, "author": "谷口修ほか", "publisher": "コロナ社"})
    }

    #[tokio::test]
    async fn accepts_a_resolvable_mention() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog.records.insert(
            "9784000000000".to_string(),
            book_record("振動学 = Mechanical vibration"),
        );

        let report = pipeline_with(catalog, dir.path())
            .run(&[mention("振動学", Some("978-4-00-000000-0"), "2023/ME101.html")])
            .await;

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.quarantined.len(), 0);
        let record = &report.accepted[0];
        assert_eq!(record.identifier, "9784000000000");
        assert_eq!(record.title, "振動学 = Mechanical vibration");
        assert_eq!(record.author, "谷口修");
        assert_eq!(record.price, "3,000円");
        assert_eq!(report.stats.valid_records, 1);
    }

    #[tokio::test]
    async fn missing_identifier_never_reaches_the_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        // A lookup would blow up loudly if attempted.
        catalog.failing.insert("".to_string());

        let report = pipeline_with(catalog, dir.path())
            .run(&[mention("教科書なし", None, "2023/XX000.html")])
            .await;

        assert_eq!(report.accepted.len(), 0);
        assert_eq!(report.quarantined.len(), 1);
        assert_eq!(report.quarantined[0].categorization_status, "no identifier");
    }

    #[tokio::test]
    async fn short_identifier_is_a_digit_count_violation() {
        let dir = tempfile::tempdir().unwrap();
        let report = pipeline_with(MockCatalog::default(), dir.path())
            .run(&[mention("何か", Some("123"), "2023/XX001.html")])
            .await;

        assert_eq!(
            report.quarantined[0].categorization_status,
            "invalid identifier: digit-count violation"
        );
        assert_eq!(report.stats.invalid_identifiers, 1);
    }

    #[tokio::test]
    async fn checksum_violation_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let report = pipeline_with(MockCatalog::default(), dir.path())
            .run(&[mention("何か", Some("9784000000001"), "2023/XX002.html")])
            .await;

        assert_eq!(
            report.quarantined[0].categorization_status,
            "invalid identifier: checksum violation"
        );
    }

    #[tokio::test]
    async fn duplicate_identifier_collapses_to_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog
            .records
            .insert("9784000000000".to_string(), book_record("振動学"));

        let report = pipeline_with(catalog, dir.path())
            .run(&[
                mention("振動学", Some("9784000000000"), "2023/ME101.html"),
                mention("振動学", Some("978-4-00-000000-0"), "2023/ME202.html"),
            ])
            .await;

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.quarantined.len(), 0);
        assert_eq!(report.stats.duplicate_identifiers, 1);
        assert_eq!(report.stats.valid_records, 1);
    }

    #[tokio::test]
    async fn unknown_identifier_quarantines_as_lookup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let report = pipeline_with(MockCatalog::default(), dir.path())
            .run(&[mention("幻の本", Some("9784000000000"), "2023/XX003.html")])
            .await;

        assert_eq!(
            report.quarantined[0].categorization_status,
            "lookup failed: no external record"
        );
        assert_eq!(report.stats.lookup_failures, 1);
    }

    #[tokio::test]
    async fn transport_error_degrades_to_lookup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog.failing.insert("9784000000000".to_string());

        let report = pipeline_with(catalog, dir.path())
            .run(&[mention("振動学", Some("9784000000000"), "2023/ME101.html")])
            .await;

        assert_eq!(
            report.quarantined[0].categorization_status,
            "lookup failed: no external record"
        );
    }

    #[tokio::test]
    async fn failed_lookup_is_not_retried_within_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog.failing.insert("9784000000000".to_string());
        let lookups = catalog.lookups.clone();

        // Two spellings of the same ISBN: the canonical form keys the memo,
        // so the second mention must not trigger another remote call.
        let report = pipeline_with(catalog, dir.path())
            .run(&[
                mention("振動学", Some("9784000000000"), "2023/ME101.html"),
                mention("振動学", Some("978-4-00-000000-0"), "2023/ME202.html"),
            ])
            .await;

        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        assert_eq!(report.quarantined.len(), 2);
        for row in &report.quarantined {
            assert_eq!(
                row.categorization_status,
                "lookup failed: no external record"
            );
        }
    }

    #[tokio::test]
    async fn remote_calls_keep_minimum_spacing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = MetadataCache::open(dir.path()).unwrap();
        let resolver = Resolver::with_interval(
            Arc::new(MockCatalog::default()),
            cache,
            Duration::from_millis(50),
        );

        let started = Instant::now();
        Pipeline::new(resolver)
            .run(&[
                mention("振動学", Some("9784000000000"), "a"),
                mention("数値解析", Some("9780306406157"), "b"),
                mention("材料力学", Some("9784050000005"), "c"),
            ])
            .await;

        // Three distinct identifiers force three remote calls; the limiter
        // enforces two full gaps between them.
        assert!(
            started.elapsed() >= Duration::from_millis(100),
            "elapsed {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn empty_publisher_quarantines_naming_the_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog.records.insert(
            "9784000000000".to_string(),
            json!({"title": "振動学", "author": "谷口修", "publisher": ""}),
        );

        let report = pipeline_with(catalog, dir.path())
            .run(&[mention("振動学", Some("9784000000000"), "2023/ME101.html")])
            .await;

        assert_eq!(
            report.quarantined[0].categorization_status,
            "incomplete metadata: publisher empty"
        );
    }

    #[tokio::test]
    async fn wildly_wrong_title_quarantines_as_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog
            .records
            .insert("9784000000000".to_string(), book_record("Thermodynamics"));

        let report = pipeline_with(catalog, dir.path())
            .run(&[mention("有機化学", Some("9784000000000"), "2023/CH101.html")])
            .await;

        assert_eq!(
            report.quarantined[0].categorization_status,
            "title mismatch: low similarity"
        );
    }

    #[tokio::test]
    async fn citation_tier_supersedes_remote_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog.records.insert(
            "9784000000000".to_string(),
            json!({"title": "振動学", "author": "", "publisher": "", "catalog_id": "BN01234567"}),
        );
        catalog.citations.insert(
            "BN01234567".to_string(),
            "title: 振動学\nauthor: 谷口修ほか\npublisher: コロナ社".to_string(),
        );

        let report = pipeline_with(catalog, dir.path())
            .run(&[mention("振動学", Some("9784000000000"), "2023/ME101.html")])
            .await;

        assert_eq!(report.accepted.len(), 1, "{:?}", report.quarantined);
        assert_eq!(report.accepted[0].author, "谷口修");
        assert_eq!(report.accepted[0].publisher, "コロナ社");
    }

    #[tokio::test]
    async fn cache_persists_across_pipelines() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog
            .records
            .insert("9784000000000".to_string(), book_record("振動学"));

        let first = pipeline_with(catalog, dir.path())
            .run(&[mention("振動学", Some("9784000000000"), "2023/ME101.html")])
            .await;
        assert_eq!(first.accepted.len(), 1);

        // Second run: the catalog has forgotten the book, but the cache
        // remembers the raw response.
        let second = pipeline_with(MockCatalog::default(), dir.path())
            .run(&[mention("振動学", Some("9784000000000"), "2023/ME101.html")])
            .await;
        assert_eq!(second.accepted.len(), 1);
    }

    #[tokio::test]
    async fn outputs_are_deterministically_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog
            .records
            .insert("9784000000000".to_string(), book_record("線形代数"));
        catalog
            .records
            .insert("9780306406157".to_string(), book_record("解析入門"));

        let report = pipeline_with(catalog, dir.path())
            .run(&[
                mention("線形代数", Some("9784000000000"), "2023/MA102.html"),
                mention("解析入門", Some("9780306406157"), "2023/MA101.html"),
                mention("積分論", None, "2023/MA201.html"),
                mention("測度論", None, "2023/MA105.html"),
            ])
            .await;

        let accepted_titles: Vec<&str> =
            report.accepted.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(accepted_titles, vec!["線形代数", "解析入門"]);

        let quarantined_titles: Vec<&str> =
            report.quarantined.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(quarantined_titles, vec!["測度論", "積分論"]);
    }

    #[tokio::test]
    async fn counts_partition_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = MockCatalog::default();
        catalog
            .records
            .insert("9784000000000".to_string(), book_record("振動学"));

        let report = pipeline_with(catalog, dir.path())
            .run(&[
                mention("振動学", Some("9784000000000"), "a"),
                mention("振動学", Some("9784000000000"), "b"),
                mention("孤児", None, "c"),
                mention("短い", Some("42"), "d"),
            ])
            .await;

        let s = &report.stats;
        assert_eq!(s.total_mentions, 4);
        assert_eq!(
            s.valid_records + s.quarantined + s.duplicate_identifiers,
            s.total_mentions
        );
        assert_eq!(s.valid_records, 1);
        assert_eq!(s.duplicate_identifiers, 1);
        assert_eq!(s.quarantined, 2);
    }
}
