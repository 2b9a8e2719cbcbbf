//! Header alias tables and column resolution.
//!
//! Exports spell the same column differently per vendor and per UI language.
//! Each logical [`Field`] carries an ordered list of acceptable spellings; a
//! header row is resolved once into a [`ColumnMap`] and rows are then read by
//! index.

use std::collections::HashMap;

/// Rows scanned when looking for a header.
pub const HEADER_SEARCH_WINDOW: usize = 10;

/// Logical columns understood by the parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Date,
    Value,
    ContentId,
    Permalink,
    PostType,
    Description,
    PublishedAt,
    Impressions,
    Reach,
    Interactions,
    Likes,
    Comments,
    Shares,
    Saves,
    Clicks,
    VideoViews,
    Followers,
}

/// Ordered alias list per field.
pub type AliasTable = &'static [(Field, &'static [&'static str])];

// ── Tables ────────────────────────────────────────────────────────────────────

/// Single-metric daily exports (`Fecha,Primary`).
pub const METRIC_CSV_ALIASES: AliasTable = &[
    (Field::Date, &["Fecha", "Date", "Día", "Dia", "Day"]),
    (Field::Value, &["Primary", "Valor", "Value", "Total"]),
];

/// Post-level exports, CSV and spreadsheet alike.
pub const CONTENT_ALIASES: AliasTable = &[
    (
        Field::ContentId,
        &[
            "Identificador de la publicación",
            "ID de la publicación",
            "Post ID",
            "Post id",
            "ID",
            "Identificador",
        ],
    ),
    (
        Field::Permalink,
        &["Enlace permanente", "Permalink", "Post link", "Enlace", "Link", "URL"],
    ),
    (
        Field::PostType,
        &[
            "Tipo de publicación",
            "Post type",
            "Tipo",
            "Type",
            "Content Type",
            "Tipo de contenido",
        ],
    ),
    (
        Field::Description,
        &[
            "Descripción",
            "Description",
            "Título",
            "Title",
            "Post title",
            "Texto",
        ],
    ),
    (
        Field::PublishedAt,
        &[
            "Hora de publicación",
            "Fecha de publicación",
            "Publish time",
            "Published",
            "Created date",
            "Fecha de creación",
            "Date",
            "Fecha",
        ],
    ),
    (
        Field::Impressions,
        &[
            "Visualizaciones",
            "Impresiones",
            "Impressions",
            "Views",
        ],
    ),
    (Field::Reach, &["Alcance", "Reach", "Cuentas alcanzadas"]),
    (
        Field::Likes,
        &["Me gusta", "Reacciones", "Likes", "Reactions"],
    ),
    (Field::Comments, &["Comentarios", "Comments"]),
    (
        Field::Shares,
        &["Veces que se compartió", "Compartidos", "Shares", "Reposts", "Veces compartido"],
    ),
    (Field::Saves, &["Veces que se guardó", "Guardados", "Saves"]),
    (
        Field::VideoViews,
        &["Reproducciones", "Reproducciones de video", "Video views", "Plays"],
    ),
];

/// Daily metrics sheet of the multi-sheet export.
pub const SHEET_METRICS_ALIASES: AliasTable = &[
    (Field::Date, &["Date", "Fecha", "Día", "Day"]),
    (
        Field::Impressions,
        &[
            "Impressions (total)",
            "Impresiones (total)",
            "Impressions",
            "Impresiones",
        ],
    ),
    (
        Field::Reach,
        &[
            "Unique impressions (organic)",
            "Impresiones únicas (orgánicas)",
            "Reach",
            "Alcance",
        ],
    ),
    (Field::Interactions, &["Interactions", "Interacciones"]),
    (
        Field::Likes,
        &["Reactions (total)", "Reacciones (total)", "Reactions", "Reacciones"],
    ),
    (
        Field::Comments,
        &["Comments (total)", "Comentarios (total)", "Comments", "Comentarios"],
    ),
    (
        Field::Shares,
        &[
            "Reposts (total)",
            "Veces compartido (total)",
            "Reposts",
            "Veces compartido",
        ],
    ),
    (
        Field::Clicks,
        &["Clicks (total)", "Clics (total)", "Clicks", "Clics"],
    ),
    (
        Field::Followers,
        &[
            "Total followers",
            "Seguidores totales",
            "New followers",
            "Nuevos seguidores",
        ],
    ),
];

// ── Resolution ────────────────────────────────────────────────────────────────

/// Canonical comparison form of a header cell.
pub fn normalize_header(raw: &str) -> String {
    raw.trim_matches('\u{feff}')
        .trim()
        .trim_matches(['"', '\''])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Field → column index for one header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    /// Resolve `header` against `table`.
    ///
    /// For each field the aliases are tried in order and the first one present
    /// in the header wins. A column claimed by an earlier field is not reused.
    pub fn resolve(header: &[String], table: AliasTable) -> Self {
        let normalized: Vec<String> = header.iter().map(|h| normalize_header(h)).collect();
        let mut columns = HashMap::new();
        let mut claimed = vec![false; normalized.len()];

        for (field, aliases) in table {
            let hit = aliases.iter().find_map(|alias| {
                let alias = normalize_header(alias);
                normalized
                    .iter()
                    .enumerate()
                    .find(|(i, h)| !claimed[*i] && **h == alias)
                    .map(|(i, _)| i)
            });
            if let Some(idx) = hit {
                claimed[idx] = true;
                columns.insert(*field, idx);
            }
        }

        Self { columns }
    }

    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn has(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Set `field` explicitly.
    pub fn insert(&mut self, field: Field, index: usize) {
        self.columns.insert(field, index);
    }

    /// Every resolved column index.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.columns.values().copied()
    }

    /// The trimmed cell for `field`, `None` when the column is unresolved or
    /// the row is short.
    pub fn cell<'a>(&self, row: &'a [String], field: Field) -> Option<&'a str> {
        self.get(field)
            .and_then(|idx| row.get(idx))
            .map(|c| c.trim())
    }
}

/// Find the header row within the first [`HEADER_SEARCH_WINDOW`] rows.
///
/// A row qualifies when it resolves any of the `markers`. Returns the row
/// index and its column map.
pub fn locate_header(
    rows: &[Vec<String>],
    table: AliasTable,
    markers: &[Field],
) -> Option<(usize, ColumnMap)> {
    rows.iter()
        .take(HEADER_SEARCH_WINDOW)
        .enumerate()
        .find_map(|(idx, row)| {
            let map = ColumnMap::resolve(row, table);
            markers.iter().any(|m| map.has(*m)).then_some((idx, map))
        })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
