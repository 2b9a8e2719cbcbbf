//! Pre-parse cleanup for delimited exports.
//!
//! Strips the byte-order mark, consumes a leading `sep=<c>` directive (adopting
//! its delimiter) and reads the body into records, dropping blank ones.

use tracing::debug;

/// Records of a delimited export after sanitising.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedRows {
    pub delimiter: u8,
    /// Non-blank records, cells trimmed.
    pub rows: Vec<Vec<String>>,
}

/// Sanitise `text` and split it into records.
///
/// Quoted cells may span lines. Records whose cells are all empty are
/// discarded. Malformed records are skipped rather than failing the file.
pub fn read_delimited(text: &str) -> DelimitedRows {
    let (body, directive) = strip_preamble(text);
    let delimiter = directive.unwrap_or_else(|| sniff_delimiter(body));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    for record in reader.records() {
        match record {
            Ok(r) => {
                let cells: Vec<String> = r
                    .iter()
                    .map(|c| c.trim_matches('\u{feff}').trim().to_string())
                    .collect();
                if cells.iter().any(|c| !c.is_empty()) {
                    rows.push(cells);
                }
            }
            Err(e) => {
                malformed += 1;
                debug!("skipping malformed delimited record: {}", e);
            }
        }
    }

    if malformed > 0 {
        debug!("{} malformed records skipped", malformed);
    }

    DelimitedRows { delimiter, rows }
}

/// Strip a BOM and a leading `sep=` line. Returns the remaining body and the
/// delimiter named by the directive, if any.
fn strip_preamble(text: &str) -> (&str, Option<u8>) {
    let text = text.trim_start_matches('\u{feff}');
    let trimmed = text.trim_start_matches(['\r', '\n']);

    let first_line_end = trimmed.find('\n').unwrap_or(trimmed.len());
    let first_line = trimmed[..first_line_end].trim().trim_matches('"');

    if let Some(rest) = first_line
        .strip_prefix("sep=")
        .or_else(|| first_line.strip_prefix("SEP="))
    {
        let delimiter = match rest {
            "\\t" | "\t" => Some(b'\t'),
            r if r.len() == 1 && r.is_ascii() => r.bytes().next(),
            _ => None,
        };
        let body = trimmed.get(first_line_end + 1..).unwrap_or("");
        return (body, delimiter);
    }

    (trimmed, None)
}

/// Pick the most frequent of `,`, `;` and tab on the first non-blank line.
fn sniff_delimiter(body: &str) -> u8 {
    let Some(line) = body.lines().find(|l| !l.trim().is_empty()) else {
        return b',';
    };
    let candidates = [b',', b';', b'\t'];
    let mut best = b',';
    let mut best_count = 0usize;
    for c in candidates {
        let count = line.bytes().filter(|b| *b == c).count();
        if count > best_count {
            best = c;
            best_count = count;
        }
    }
    best
}

// ── Tests ─────────────────────────────────────────────────────────────────────
