use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::info;

use crate::{
    cli::{Cli, Command},
    domain::{MatchStatus, PriceCatalog, ResolvedItem, Run, RunMetadata},
    infra::{
        history::{JsonRunStore, PersistSaveError, RunStore},
        pricing::{PriceClient, PriceFetchError},
        resolver::CatalogResolver,
    },
    tracker::{Capture, CaptureKind, RunAggregator},
    util::{
        config::{load_config, AppConfig, ConfigError},
        format_isk, humanize_duration,
    },
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("pricing client: {0}")]
    Pricing(#[from] PriceFetchError),
    #[error("run history: {0}")]
    History(#[from] PersistSaveError),
    #[error("failed to read {path}: {source}")]
    Input {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("clipboard watcher failed to start: {0}")]
    Clipboard(io::Error),
    #[cfg(not(feature = "clipboard"))]
    #[error("this build has no clipboard support; use `capture` instead")]
    ClipboardUnsupported,
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Watch {
            inventory,
            site,
            comment,
        } => {
            let meta = RunMetadata {
                site_type: site,
                comment,
                ..RunMetadata::default()
            };
            watch(&config, inventory, meta).await
        }
        Command::Capture {
            file,
            before,
            minutes,
            site,
            comment,
        } => {
            let meta = RunMetadata {
                started_at: None,
                elapsed: minutes,
                site_type: site,
                comment,
            };
            capture(&config, file, before, meta).await
        }
        Command::History { limit } => history(limit),
    }
}

fn open_store() -> Result<Arc<JsonRunStore>, AppError> {
    let store = JsonRunStore::in_data_dir()?;
    info!(path = %store.path().display(), "run history");
    Ok(Arc::new(store))
}

pub fn build_tracker(
    config: &AppConfig,
    store: Arc<dyn RunStore>,
) -> Result<RunAggregator, PriceFetchError> {
    let feed = PriceClient::from_config(&config.pricing)?;
    let resolver = CatalogResolver::new(Arc::new(feed), PriceCatalog::new(config.catalog.ttl()))
        .with_fetch_timeout(config.pricing.fetch_timeout())
        .with_fuzzy_threshold(config.catalog.fuzzy_threshold);
    Ok(RunAggregator::new(resolver, store)
        .with_rules(config.normalization.clone())
        .with_dedup_window(config.capture.dedup_window()))
}

#[cfg(feature = "clipboard")]
async fn watch(config: &AppConfig, inventory: bool, meta: RunMetadata) -> Result<(), AppError> {
    use tokio::sync::mpsc;
    use tracing::debug;

    use crate::infra::clipboard::ClipboardWatcher;

    let mut tracker = build_tracker(config, open_store()?)?;
    let (sender, mut receiver) = mpsc::channel::<String>(32);
    ClipboardWatcher::new(config.capture.poll_interval())
        .spawn(sender)
        .map_err(AppError::Clipboard)?;

    if inventory {
        println!("Watching the clipboard. Copy your full inventory to set the starting point.");
    } else {
        println!("Watching the clipboard. Copy your loot after each run; Ctrl+C to stop.");
    }

    let mut window_start = OffsetDateTime::now_utc();
    let mut baseline: Option<String> = None;

    while let Some(text) = receiver.recv().await {
        if !tracker.looks_like_loot(&text) {
            debug!(len = text.len(), "clipboard text holds no loot");
            continue;
        }

        let now = OffsetDateTime::now_utc();
        let run_meta = RunMetadata {
            started_at: Some(window_start),
            ..meta.clone()
        };

        let capture = if inventory {
            match baseline.replace(text.clone()) {
                Some(before) => {
                    tracker
                        .capture_delta_at(&before, &text, &run_meta, now)
                        .await
                }
                None => {
                    println!("Starting inventory recorded. Copy it again after the run.");
                    window_start = now;
                    continue;
                }
            }
        } else {
            tracker.capture_at(&text, &run_meta, now).await
        };

        if capture.kind == CaptureKind::New {
            window_start = now;
        }
        print!("{}", render_capture(&capture));
    }

    Ok(())
}

#[cfg(not(feature = "clipboard"))]
async fn watch(_config: &AppConfig, _inventory: bool, _meta: RunMetadata) -> Result<(), AppError> {
    Err(AppError::ClipboardUnsupported)
}

async fn capture(
    config: &AppConfig,
    file: Option<PathBuf>,
    before: Option<PathBuf>,
    meta: RunMetadata,
) -> Result<(), AppError> {
    let after = read_input(file.as_deref())?;
    let mut tracker = build_tracker(config, open_store()?)?;

    let capture = match before {
        Some(path) => {
            let before = read_input(Some(&path))?;
            tracker.capture_delta(&before, &after, &meta).await
        }
        None => tracker.capture(&after, &meta).await,
    };
    print!("{}", render_capture(&capture));
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String, AppError> {
    match path {
        Some(path) => fs::read_to_string(path).map_err(|source| AppError::Input {
            path: path.display().to_string(),
            source,
        }),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|source| AppError::Input {
                    path: "stdin".into(),
                    source,
                })?;
            Ok(buffer)
        }
    }
}

fn history(limit: usize) -> Result<(), AppError> {
    let store = JsonRunStore::in_data_dir()?;
    let runs = store.load_runs()?;
    if runs.is_empty() {
        println!("No runs recorded yet ({}).", store.path().display());
        return Ok(());
    }

    for run in runs.iter().rev().take(limit) {
        println!("{}", history_line(run));
    }
    Ok(())
}

fn timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| at.to_string())
}

fn history_line(run: &Run) -> String {
    let mut line = format!("{}  ", timestamp(run.ended_at));
    if let Some(site) = &run.site_type {
        let _ = write!(line, "{site}  ");
    }
    if let Some(duration) = run.duration() {
        let _ = write!(line, "{}  ", humanize_duration(duration));
    }
    let _ = write!(line, "{} ISK", format_isk(run.net_value()));
    if let Some(rate) = run.profit_per_hour {
        let _ = write!(line, " ({} ISK/h)", format_isk(rate));
    }
    if run.unmatched_count > 0 {
        let _ = write!(line, "  {} unmatched", run.unmatched_count);
    }
    if let Some(comment) = &run.comment {
        let _ = write!(line, "  \"{comment}\"");
    }
    line
}

fn item_row(out: &mut String, name: &str, quantity: u64, value: Option<f64>, note: &str) {
    let value = value.map_or_else(|| "-".to_string(), format_isk);
    let _ = writeln!(out, "  {name:<40} x{quantity:<8} {value:>18}  {note}");
}

/// Human-readable report of one capture.
pub fn render_capture(capture: &Capture) -> String {
    let run = &capture.run;
    let mut out = String::new();

    match capture.kind {
        CaptureKind::New => {
            let _ = writeln!(out, "Run {} at {}", run.id, timestamp(run.ended_at));
        }
        CaptureKind::Duplicate => {
            let _ = writeln!(out, "Same loot as run {}, not recorded again", run.id);
        }
    }
    if let Some(site) = &run.site_type {
        let _ = writeln!(out, "Site: {site}");
    }

    for line in &run.lines {
        let note = match line.match_status {
            MatchStatus::Exact => "",
            status => status.label(),
        };
        item_row(&mut out, &line.display_name, line.quantity, line.value, note);
    }

    if !run.consumed.is_empty() {
        let _ = writeln!(out, "Consumed:");
        for item in &run.consumed {
            item_row(
                &mut out,
                &item.display_name,
                item.quantity,
                item.value(),
                consumed_note(item),
            );
        }
    }

    let _ = write!(out, "Total {} ISK", format_isk(run.total_value));
    if !run.consumed.is_empty() {
        let _ = write!(out, ", net {} ISK", format_isk(run.net_value()));
    }
    if let Some(rate) = run.profit_per_hour {
        let _ = write!(out, ", {} ISK/h", format_isk(rate));
    }
    if let Some(duration) = run.duration() {
        let _ = write!(out, " over {}", humanize_duration(duration));
    }
    out.push('\n');

    if run.buy_value > 0.0 {
        let _ = writeln!(out, "Buy orders {} ISK", format_isk(run.buy_value));
    }
    if run.unmatched_count > 0 {
        let _ = writeln!(out, "{} item(s) could not be priced", run.unmatched_count);
    }
    if run.discarded_lines > 0 {
        let _ = writeln!(out, "{} line(s) skipped as non-loot", run.discarded_lines);
    }
    if run.pricing_degraded() {
        let _ = writeln!(out, "Warning: {}; totals may be incomplete", run.pricing);
    }
    out
}

fn consumed_note(item: &ResolvedItem) -> &'static str {
    if item.is_matched() {
        ""
    } else {
        item.match_status.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        summarize, LootLine, PriceOrigin, PricingOutcome, ShipClass, SiteType, Weather,
    };
    use std::time::Duration;

    fn sample_run() -> Run {
        let unknown = LootLine {
            line_no: 2,
            raw_text: "Unknown Widget".into(),
            item_name: "Unknown Widget".into(),
            quantity: 1,
        };
        let meta = RunMetadata {
            comment: Some("first T5".into()),
            ..RunMetadata::default()
        }
        .with_elapsed(Duration::from_secs(600))
        .with_site(SiteType::new(5, Weather::Dark, ShipClass::Cruiser, 1).unwrap());
        summarize(
            vec![
                ResolvedItem {
                    item_id: Some("47956".into()),
                    display_name: "Gravid Core".into(),
                    source_name: "gravid core".into(),
                    quantity: 2,
                    unit_price: Some(1_500_000.0),
                    buy_price: Some(1_200_000.0),
                    price_timestamp: None,
                    match_status: MatchStatus::Fuzzy,
                    match_score: 0.9,
                    price_origin: PriceOrigin::Fetched,
                },
                ResolvedItem::unmatched(&unknown, PriceOrigin::NotFound),
            ],
            &meta,
        )
    }

    #[test]
    fn report_lists_items_and_totals() {
        let report = render_capture(&Capture {
            run: sample_run(),
            kind: CaptureKind::New,
        });

        assert!(report.contains("Site: T5 Dark 1x Cruiser"));
        assert!(report.contains("Gravid Core"));
        assert!(report.contains("3,000,000.00"));
        assert!(report.contains("fuzzy"));
        assert!(report.contains("Total 3,000,000.00 ISK, 18,000,000.00 ISK/h over 10m 00s"));
        assert!(report.contains("Buy orders 2,400,000.00 ISK"));
        assert!(report.contains("1 item(s) could not be priced"));
        assert!(!report.contains("Warning"));
    }

    #[test]
    fn report_flags_duplicates_and_degraded_pricing() {
        let mut run = sample_run();
        run.pricing = PricingOutcome::TimedOut { requested: 1 };
        let report = render_capture(&Capture {
            run,
            kind: CaptureKind::Duplicate,
        });
        assert!(report.starts_with("Same loot as run"));
        assert!(report.contains("Warning: price fetch for 1 items timed out"));
    }

    #[test]
    fn history_lines_are_one_run_each() {
        let line = history_line(&sample_run());
        assert!(line.contains("T5 Dark 1x Cruiser"));
        assert!(line.contains("3,000,000.00 ISK (18,000,000.00 ISK/h)"));
        assert!(line.contains("1 unmatched"));
        assert!(line.contains("\"first T5\""));
        assert!(!line.contains('\n'));
    }
}
