//! Turns pasted loot into persisted runs: parse, resolve, summarize, store.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::domain::{
    diff, is_expired, parse_with, summarize_at, LootLine, NormalizationRules, ParsedLoot, Run,
    RunMetadata,
};
use crate::domain::parser::split_lines;
use crate::infra::history::RunStore;
use crate::infra::resolver::CatalogResolver;

pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureKind {
    New,
    /// Same text seen inside the dedup window; the earlier run is returned.
    Duplicate,
}

#[derive(Clone, Debug)]
pub struct Capture {
    pub run: Run,
    pub kind: CaptureKind,
}

struct RecentCapture {
    digest: String,
    at: OffsetDateTime,
    run: Run,
}

pub struct RunAggregator {
    resolver: CatalogResolver,
    store: Arc<dyn RunStore>,
    rules: NormalizationRules,
    dedup_window: Duration,
    recent: VecDeque<RecentCapture>,
}

impl RunAggregator {
    pub fn new(resolver: CatalogResolver, store: Arc<dyn RunStore>) -> Self {
        Self {
            resolver,
            store,
            rules: NormalizationRules::default(),
            dedup_window: DEFAULT_DEDUP_WINDOW,
            recent: VecDeque::new(),
        }
    }

    pub fn with_rules(mut self, rules: NormalizationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Whether `text` holds at least one parseable loot line.
    pub fn looks_like_loot(&self, text: &str) -> bool {
        !parse_with(text, &self.rules).is_empty()
    }

    pub async fn capture_run(&mut self, raw: &str, meta: &RunMetadata) -> Run {
        self.capture(raw, meta).await.run
    }

    pub async fn capture(&mut self, raw: &str, meta: &RunMetadata) -> Capture {
        self.capture_at(raw, meta, OffsetDateTime::now_utc()).await
    }

    pub async fn capture_at(
        &mut self,
        raw: &str,
        meta: &RunMetadata,
        now: OffsetDateTime,
    ) -> Capture {
        let digest = source_digest("loot", &[raw]);
        if let Some(run) = self.recent_run(&digest, now) {
            return Capture {
                run,
                kind: CaptureKind::Duplicate,
            };
        }

        let parsed = self.parse(raw);
        let resolution = self.resolver.resolve_at(&parsed.lines, now).await;

        let mut run = summarize_at(resolution.items, Vec::new(), meta, now);
        run.discarded_lines = parsed.discarded_count();
        run.pricing = resolution.pricing;
        run.source_digest = digest;
        self.finish(run, now)
    }

    /// Captures the difference between two inventory snapshots as one run.
    pub async fn capture_delta(
        &mut self,
        before: &str,
        after: &str,
        meta: &RunMetadata,
    ) -> Capture {
        self.capture_delta_at(before, after, meta, OffsetDateTime::now_utc())
            .await
    }

    pub async fn capture_delta_at(
        &mut self,
        before: &str,
        after: &str,
        meta: &RunMetadata,
        now: OffsetDateTime,
    ) -> Capture {
        let digest = source_digest("delta", &[before, after]);
        if let Some(run) = self.recent_run(&digest, now) {
            return Capture {
                run,
                kind: CaptureKind::Duplicate,
            };
        }

        let before = self.parse(before);
        let after = self.parse(after);
        let delta = diff(&before.lines, &after.lines);
        debug!(
            looted = delta.looted.len(),
            consumed = delta.consumed.len(),
            "inventory delta"
        );

        // Looted and consumed lines share one resolve so prices are fetched once.
        let looted_len = delta.looted.len();
        let lines: Vec<LootLine> = delta.looted.into_iter().chain(delta.consumed).collect();
        let resolution = self.resolver.resolve_at(&lines, now).await;
        let mut looted = resolution.items;
        let consumed = looted.split_off(looted_len);

        let mut run = summarize_at(looted, consumed, meta, now);
        run.discarded_lines = before.discarded_count() + after.discarded_count();
        run.pricing = resolution.pricing;
        run.source_digest = digest;
        self.finish(run, now)
    }

    fn parse(&self, raw: &str) -> ParsedLoot {
        parse_with(raw, &self.rules)
    }

    fn recent_run(&mut self, digest: &str, now: OffsetDateTime) -> Option<Run> {
        let window = self.dedup_window;
        self.recent
            .retain(|capture| !is_expired(now, capture.at, window));
        let found = self
            .recent
            .iter()
            .find(|capture| capture.digest == digest)
            .map(|capture| capture.run.clone());
        if let Some(run) = &found {
            info!(run = %run.id, "duplicate capture, reusing previous run");
        }
        found
    }

    fn finish(&mut self, run: Run, now: OffsetDateTime) -> Capture {
        if let Err(err) = self.store.save_run(&run) {
            warn!(%err, run = %run.id, "failed to persist run");
        }
        info!(
            run = %run.id,
            items = run.items.len(),
            unmatched = run.unmatched_count,
            total = run.total_value,
            pricing = %run.pricing,
            "run captured"
        );
        self.recent.push_back(RecentCapture {
            digest: run.source_digest.clone(),
            at: now,
            run: run.clone(),
        });
        Capture {
            run,
            kind: CaptureKind::New,
        }
    }
}

/// SHA-256 over the trimmed non-empty lines of each source, tagged with the capture kind.
fn source_digest(kind: &str, sources: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for source in sources {
        hasher.update([0u8]);
        for line in split_lines(source).map(str::trim).filter(|line| !line.is_empty()) {
            hasher.update(line.as_bytes());
            hasher.update(b"\n");
        }
    }
    format!("{:x}", hasher.finalize())
}
