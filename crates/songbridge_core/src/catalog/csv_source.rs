//! CSV input adapter for the song catalog.
//!
//! Accepted layouts:
//! - header row naming the columns (`title`/`곡명`/`제목`, or `name`/`song`
//!   next to an id column name such as `id`/`number`/`no`/`번호`), any order
//! - no header, one column: title only
//! - no header, two or more columns: `id, title, ...`
//!
//! A UTF-8 byte order mark is tolerated. Rows may have differing lengths.
//! The header is detected here only; [`read_records`] returns data rows.

use super::{
    is_header_cells, is_id_header, is_loose_title_header, is_title_header, SongCatalog,
    SongRecord,
};
use crate::error::CatalogError;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy)]
struct Columns {
    id: Option<usize>,
    title: usize,
}

impl Columns {
    /// Detect a header row. Returns `None` when the first row is data.
    ///
    /// Without an id column name, the cell next to the title stands in as the
    /// id so that a data row like `1,Title` is not mistaken for a header.
    fn from_header(row: &StringRecord) -> Option<Self> {
        let title = row
            .iter()
            .position(is_title_header)
            .or_else(|| row.iter().position(is_loose_title_header))?;
        let id = row.iter().position(is_id_header);
        let id_cell = match id {
            Some(i) => row.get(i),
            None => row.iter().enumerate().find(|(i, _)| *i != title).map(|(_, c)| c),
        };
        if !is_header_cells(&row[title], id_cell) {
            return None;
        }
        Some(Self { id, title })
    }

    fn positional(row: &StringRecord) -> Self {
        if row.len() >= 2 {
            Self {
                id: Some(0),
                title: 1,
            }
        } else {
            Self { id: None, title: 0 }
        }
    }

    fn record(&self, row: &StringRecord) -> SongRecord {
        SongRecord {
            id: self.id.and_then(|i| row.get(i)).map(str::to_string),
            title: row.get(self.title).unwrap_or_default().to_string(),
        }
    }
}

/// Parse CSV text into raw catalog records, in file order.
pub fn read_records<R: Read>(mut reader: R) -> Result<Vec<SongRecord>, CatalogError> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| CatalogError::Csv(e.into()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for row in csv.records() {
        rows.push(row?);
    }

    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let records = match Columns::from_header(first) {
        Some(columns) => rows[1..].iter().map(|row| columns.record(row)).collect(),
        None => rows
            .iter()
            .map(|row| Columns::positional(row).record(row))
            .collect(),
    };
    Ok(records)
}

/// Load a catalog from a CSV file.
pub fn load_csv(path: &Path) -> Result<SongCatalog, CatalogError> {
    let file = fs::File::open(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file)?;
    let catalog = SongCatalog::from_records(records)?;
    info!("Loaded {} songs from {}", catalog.len(), path.display());
    Ok(catalog)
}
