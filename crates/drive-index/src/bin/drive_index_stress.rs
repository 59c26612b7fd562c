//! Drive index stress binary.
//!
//! Fills an index with random entries in deferred batches, pages through
//! it, updates a slice of it and runs a delta scan, logging timings.
//!
//! ```bash
//! RUST_LOG=info cargo run --release --bin drive-index-stress -- --entries 100000 --batch 1000
//! DRIVE_INDEX_KIND=unordered cargo run --release --bin drive-index-stress -- --page 500
//! ```
//!
//! Index location and kind come from `DRIVE_INDEX_*` environment variables;
//! without `DRIVE_INDEX_PATH` a scratch file in the temp directory is used
//! and wiped first.

use std::time::Instant;

use anyhow::{bail, Context};
use drive_index::{
    DriveIndex, EntryUpdate, IndexConfig, MainPatch, NewEntry, QueryFilter, TagFilter,
};
use drive_shared::{FileId, MemberId, TagId};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Args {
    entries: usize,
    batch: usize,
    page: usize,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            entries: 10_000,
            batch: 500,
            page: 400,
        }
    }
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = |name: &str| -> anyhow::Result<usize> {
            let raw = iter.next().with_context(|| format!("{name} needs a value"))?;
            raw.parse()
                .with_context(|| format!("invalid {name} value {raw:?}"))
        };
        match flag.as_str() {
            "--entries" | "-n" => args.entries = value("--entries")?,
            "--batch" | "-b" => args.batch = value("--batch")?.max(1),
            "--page" | "-p" => args.page = value("--page")?.max(1),
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,drive_index=info")),
        )
        .init();

    let args = parse_args()?;
    let mut config = IndexConfig::from_env();
    let scratch = config.location.is_none();
    if scratch {
        config.location = Some(std::env::temp_dir().join("drive-index-stress.db"));
    }
    info!(?config, entries = args.entries, batch = args.batch, page = args.page, "Starting stress run");

    let index = DriveIndex::open_with(config).context("opening index")?;
    if scratch {
        index.create_schema(true)?;
    }

    let mut rng = rand::thread_rng();
    let members: Vec<MemberId> = (0..32).map(|_| MemberId::random()).collect();
    let tags: Vec<TagId> = (0..16).map(|_| TagId::random()).collect();

    // -- Insert ----------------------------------------------------------
    let started = Instant::now();
    let mut ids = Vec::with_capacity(args.entries);
    for chunk in 0..args.entries.div_ceil(args.batch) {
        index.begin_batch()?;
        let remaining = args.entries - chunk * args.batch;
        for _ in 0..remaining.min(args.batch) {
            let mut entry = NewEntry::new(FileId::new());
            entry.file_type = rng.gen_range(0..4);
            entry.data_type = rng.gen_range(0..4);
            entry.user_date = rng.gen_range(0..1_000_000);
            let acl_count = rng.gen_range(0..4);
            let tag_count = rng.gen_range(0..3);
            entry.acl = Some(members.choose_multiple(&mut rng, acl_count).copied().collect());
            entry.tags = Some(tags.choose_multiple(&mut rng, tag_count).copied().collect());
            index.add_entry(&entry)?;
            ids.push(entry.file_id);
        }
        index.commit()?;
    }
    let insert_elapsed = started.elapsed();
    info!(
        rows = index.count()?,
        elapsed_ms = insert_elapsed.as_millis() as u64,
        per_sec = (args.entries as f64 / insert_elapsed.as_secs_f64().max(1e-9)) as u64,
        "Insert complete"
    );

    // -- Full scan ---------------------------------------------------------
    let started = Instant::now();
    let filter = QueryFilter::default();
    let mut seen = 0usize;
    let mut pages = 0usize;
    let mut cursor = None;
    let mut cursor_timestamp = 0;
    loop {
        let page = index.query_batch(args.page, cursor.as_ref(), None, &filter)?;
        if pages == 0 {
            cursor_timestamp = page.cursor_timestamp;
        }
        seen += page.ids.len();
        pages += 1;
        match page.last_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    info!(seen, pages, elapsed_ms = started.elapsed().as_millis() as u64, "Full scan complete");
    if seen != ids.len() && scratch {
        bail!("scan returned {seen} ids, expected {}", ids.len());
    }

    // -- Filtered scan -----------------------------------------------------
    let started = Instant::now();
    let tagged = QueryFilter {
        tags: Some(TagFilter::AnyOf(tags[..2].to_vec())),
        acl_any_of: Some(members[..4].to_vec()),
        ..QueryFilter::default()
    };
    let page = index.query_batch(args.page, None, None, &tagged)?;
    info!(rows = page.ids.len(), elapsed_us = started.elapsed().as_micros() as u64, "Filtered scan complete");

    // -- Updates + delta scan ----------------------------------------------
    let started = Instant::now();
    let updates = (ids.len() / 10).max(1).min(ids.len());
    index.begin_batch()?;
    for id in ids.choose_multiple(&mut rng, updates) {
        let update = EntryUpdate {
            patch: MainPatch {
                is_archived: Some(true),
                ..MainPatch::default()
            },
            tag_delete: vec![tags[0]],
            ..EntryUpdate::default()
        };
        index.update_entry(id, &update)?;
    }
    index.commit()?;
    info!(updates, elapsed_ms = started.elapsed().as_millis() as u64, "Updates complete");

    let started = Instant::now();
    let mut modified = 0usize;
    let mut since = cursor_timestamp;
    loop {
        let batch = index.query_modified(args.page, since, &filter)?;
        if batch.ids.is_empty() {
            break;
        }
        modified += batch.ids.len();
        since = batch.last_cursor;
    }
    info!(modified, elapsed_ms = started.elapsed().as_millis() as u64, "Delta scan complete");

    let stats = index.cache_stats();
    info!(hits = stats.hit_count, misses = stats.miss_count, "Cache stats");
    Ok(())
}
