//! Post-level exports: one row per published item.
//!
//! [`ContentCsvParser`] handles the delimited form; [`content_rows`] is shared
//! with the spreadsheet content sheet.

use pulse_core::coercion::{normalize_date, parse_count, truncate_chars, MAX_DESCRIPTION_CHARS};
use pulse_core::models::{ContentData, ContentMetrics};
use tracing::debug;

use crate::headers::{locate_header, ColumnMap, Field, CONTENT_ALIASES};
use crate::sanitize::read_delimited;

/// Header fields that identify a content export.
pub const CONTENT_MARKERS: &[Field] = &[Field::ContentId, Field::Permalink];

/// Map one row through `map`. Rows with neither an id nor a permalink are
/// unparsable and yield `None`.
pub fn content_from_row(row: &[String], map: &ColumnMap) -> Option<ContentData> {
    let text = |field| map.cell(row, field).unwrap_or("").to_string();
    let count = |field| map.cell(row, field).map(parse_count).unwrap_or(0);

    let permalink = text(Field::Permalink);
    let id = match map.cell(row, Field::ContentId) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ if !permalink.is_empty() => permalink.clone(),
        _ => return None,
    };

    Some(ContentData {
        id,
        post_type: text(Field::PostType),
        description: truncate_chars(&text(Field::Description), MAX_DESCRIPTION_CHARS),
        published_at: map.cell(row, Field::PublishedAt).and_then(normalize_date),
        permalink,
        metrics: ContentMetrics {
            impressions: count(Field::Impressions),
            reach: count(Field::Reach),
            likes: count(Field::Likes),
            comments: count(Field::Comments),
            shares: count(Field::Shares),
            saves: count(Field::Saves),
            video_views: map.cell(row, Field::VideoViews).map(parse_count),
        },
    })
}

/// Map every row after the header, skipping unparsable ones, and order the
/// result by publish date (undated items last, stable otherwise).
pub fn content_rows(rows: &[Vec<String>], map: &ColumnMap) -> Vec<ContentData> {
    let mut skipped = 0usize;
    let mut items: Vec<ContentData> = rows
        .iter()
        .filter_map(|row| {
            let item = content_from_row(row, map);
            if item.is_none() {
                skipped += 1;
            }
            item
        })
        .collect();

    items.sort_by_key(|c| (c.published_at.is_none(), c.published_at));

    debug!(
        rows_read = rows.len(),
        rows_skipped = skipped,
        items = items.len(),
        "mapped content rows"
    );
    items
}

// ── ContentCsvParser ──────────────────────────────────────────────────────────

/// Parses delimited post exports into [`ContentData`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentCsvParser;

impl ContentCsvParser {
    pub fn new() -> Self {
        Self
    }

    /// True when the header resolves an id or permalink column.
    pub fn looks_like_content(&self, text: &str) -> bool {
        let rows = read_delimited(text).rows;
        locate_header(&rows, CONTENT_ALIASES, CONTENT_MARKERS).is_some()
    }

    /// Structural pre-check: a content header plus at least one record.
    pub fn has_valid_data(&self, text: &str) -> bool {
        let rows = read_delimited(text).rows;
        matches!(
            locate_header(&rows, CONTENT_ALIASES, CONTENT_MARKERS),
            Some((idx, _)) if rows.len() > idx + 1
        )
    }

    pub fn parse(&self, text: &str) -> Vec<ContentData> {
        let rows = read_delimited(text).rows;
        match locate_header(&rows, CONTENT_ALIASES, CONTENT_MARKERS) {
            Some((idx, map)) => content_rows(&rows[idx + 1..], &map),
            None => {
                debug!("no content header in the first rows");
                Vec::new()
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
