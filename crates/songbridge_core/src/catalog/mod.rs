//! Song Catalog
//!
//! Immutable index over the ordinal song list. Built once from records in
//! game-list order; a reload builds a new catalog instead of mutating this one.
//!
//! Lookups:
//! - by id: exact after [`normalize_id`], O(1)
//! - by title: exact normalized match, then first normalized substring match
//!   in source order
//! - by free text: split into number and title, then the two lookups above

pub mod csv_source;

use crate::error::{CatalogError, NavError};
use crate::query::NavigationQuery;
use crate::text::{classify, normalize_id, normalize_title, split_title_and_number, GroupKey};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub use csv_source::{load_csv, read_records};

/// Title column names that mark a header row on their own.
pub const TITLE_HEADERS: &[&str] = &["title", "곡명", "제목"];

/// Title column names that are also plausible song titles. They only mark a
/// header row when the id column carries an [`ID_HEADERS`] name.
pub const LOOSE_TITLE_HEADERS: &[&str] = &["name", "song"];

/// Id column names.
pub const ID_HEADERS: &[&str] = &["id", "number", "no", "title_number", "titlenumber", "번호"];

/// One raw `(id?, title)` record as produced by an input adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRecord {
    pub id: Option<String>,
    pub title: String,
}

impl SongRecord {
    pub fn new(id: Option<&str>, title: &str) -> Self {
        Self {
            id: id.map(str::to_string),
            title: title.to_string(),
        }
    }

    pub fn titled(title: &str) -> Self {
        Self::new(None, title)
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(skip)]
    pub normalized_title: String,
    pub group_key: GroupKey,
    /// Zero-based rank within `group_key`, in source order.
    pub sequence_index: usize,
    /// Zero-based rank in the whole catalog.
    pub position: usize,
}

impl Song {
    pub fn label(&self) -> String {
        match &self.id {
            Some(id) => format!("{} {}", id, self.title),
            None => self.title.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SongCatalog {
    songs: Vec<Song>,
    by_id: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
    groups: BTreeMap<GroupKey, Vec<usize>>,
}

impl SongCatalog {
    /// Build a catalog from raw records in game-list order.
    ///
    /// A leading header row (see [`is_header_record`]) is skipped. Adapters
    /// that already stripped their header use [`SongCatalog::from_records`].
    pub fn load<I>(rows: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = SongRecord>,
    {
        let mut rows = rows.into_iter().peekable();
        if rows.peek().map_or(false, is_header_record) {
            debug!("Skipping catalog header row");
            rows.next();
        }
        Self::from_records(rows)
    }

    /// Build a catalog from data records only; every record is a song
    /// candidate. Records with a blank title are skipped.
    pub fn from_records<I>(rows: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = SongRecord>,
    {
        let mut catalog = SongCatalog {
            songs: Vec::new(),
            by_id: HashMap::new(),
            by_title: HashMap::new(),
            groups: BTreeMap::new(),
        };

        for (row_number, record) in rows.into_iter().enumerate() {
            let title = record.title.trim();
            if title.is_empty() {
                warn!("Skipping catalog row {} with empty title", row_number + 1);
                continue;
            }
            let id = record
                .id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string);

            let position = catalog.songs.len();
            let group_key = classify(title);
            let group = catalog.groups.entry(group_key).or_default();
            let song = Song {
                id: id.clone(),
                title: title.to_string(),
                normalized_title: normalize_title(title),
                group_key,
                sequence_index: group.len(),
                position,
            };
            group.push(position);

            if let Some(id) = id {
                let key = normalize_id(&id);
                if let Some(&existing) = catalog.by_id.get(&key) {
                    return Err(CatalogError::DuplicateId {
                        id,
                        first: catalog.songs[existing].title.clone(),
                        second: song.title,
                    });
                }
                catalog.by_id.insert(key, position);
            }
            if !song.normalized_title.is_empty() {
                catalog
                    .by_title
                    .entry(song.normalized_title.clone())
                    .or_insert(position);
            }
            catalog.songs.push(song);
        }

        if catalog.songs.is_empty() {
            return Err(CatalogError::EmptyCatalog);
        }

        debug!(
            "Catalog built: {} songs in {} groups",
            catalog.songs.len(),
            catalog.groups.len()
        );
        Ok(catalog)
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Non-empty groups in list order (a-z, non-Latin, symbol/digit).
    pub fn groups(&self) -> impl Iterator<Item = GroupKey> + '_ {
        self.groups.keys().copied()
    }

    /// Songs of one group in source order; empty when the group has no songs.
    pub fn group(&self, key: GroupKey) -> Vec<&Song> {
        self.groups
            .get(&key)
            .map(|indexes| indexes.iter().map(|&i| &self.songs[i]).collect())
            .unwrap_or_default()
    }

    /// First song of a group, the entry the game's shortcut key lands on.
    pub fn group_head(&self, key: GroupKey) -> Option<&Song> {
        self.groups
            .get(&key)
            .and_then(|indexes| indexes.first())
            .map(|&i| &self.songs[i])
    }

    /// True when the source order already follows the game's list order
    /// (groups contiguous and sorted a-z, non-Latin, symbol/digit).
    pub fn is_list_ordered(&self) -> bool {
        self.songs
            .windows(2)
            .all(|pair| pair[0].group_key <= pair[1].group_key)
    }

    pub fn lookup_by_id(&self, id: &str) -> Result<&Song, NavError> {
        let id = id.trim();
        self.by_id
            .get(&normalize_id(id))
            .map(|&i| &self.songs[i])
            .ok_or_else(|| NavError::SongNotFound {
                query: format!("id={}", id),
            })
    }

    pub fn lookup_by_title(&self, title: &str) -> Result<&Song, NavError> {
        let needle = normalize_title(title);
        let not_found = || NavError::SongNotFound {
            query: format!("title={:?}", title.trim()),
        };
        if needle.is_empty() {
            return Err(not_found());
        }

        if let Some(&i) = self.by_title.get(&needle) {
            return Ok(&self.songs[i]);
        }

        self.songs
            .iter()
            .find(|song| song.normalized_title.contains(&needle))
            .map(|song| {
                debug!("Title {:?} matched {:?} by substring", title, song.title);
                song
            })
            .ok_or_else(not_found)
    }

    /// Resolve a query. The id wins when present and known, then the title,
    /// then the free text. Each later field is only consulted when the
    /// earlier ones are absent or unresolved; the last failure is returned.
    pub fn resolve(&self, query: &NavigationQuery) -> Result<&Song, NavError> {
        query.validate()?;
        let mut last_err = NavError::InvalidQuery;

        if let Some(id) = query.id() {
            match self.lookup_by_id(id) {
                Ok(song) => return Ok(song),
                Err(err) => {
                    debug!("Id {:?} not in catalog", id);
                    last_err = err;
                }
            }
        }

        if let Some(title) = query.title() {
            match self.lookup_by_title(title) {
                Ok(song) => return Ok(song),
                Err(err) => last_err = err,
            }
        }

        if let Some(text) = query.text() {
            match self.lookup_by_text(text) {
                Ok(song) => return Ok(song),
                Err(err) => last_err = err,
            }
        }

        Err(last_err)
    }

    /// Free text from a song tile, e.g. `"001. Binary Star"`: the leading
    /// number as an id, then the remaining title, then the whole text.
    pub fn lookup_by_text(&self, text: &str) -> Result<&Song, NavError> {
        let (number, title) = split_title_and_number(text);
        if let Some(song) = number.and_then(|n| self.lookup_by_id(&n).ok()) {
            return Ok(song);
        }
        if let Some(song) = title.and_then(|t| self.lookup_by_title(&t).ok()) {
            return Ok(song);
        }
        self.lookup_by_title(text).map_err(|_| NavError::SongNotFound {
            query: format!("text={:?}", text.trim()),
        })
    }
}

fn fold_header(value: &str) -> String {
    value.trim().to_lowercase()
}

/// True when a cell names the id column.
pub(crate) fn is_id_header(value: &str) -> bool {
    ID_HEADERS.contains(&fold_header(value).as_str())
}

/// True when a cell names the title column on its own.
pub(crate) fn is_title_header(value: &str) -> bool {
    TITLE_HEADERS.contains(&fold_header(value).as_str())
}

pub(crate) fn is_loose_title_header(value: &str) -> bool {
    LOOSE_TITLE_HEADERS.contains(&fold_header(value).as_str())
}

/// Decide whether a title cell and its id cell form a header row.
///
/// `title`/`곡명`/`제목` are headers unless the id cell is a number.
/// `name`/`song` are headers only next to an id column name.
pub(crate) fn is_header_cells(title: &str, id: Option<&str>) -> bool {
    let id_is_header = id.map_or(false, is_id_header);
    if is_title_header(title) {
        let id_is_number = id.map_or(false, |id| {
            let id = id.trim();
            !id.is_empty() && id.chars().all(|c| c.is_ascii_digit())
        });
        return !id_is_number;
    }
    is_loose_title_header(title) && id_is_header
}

/// True when `record` is a header row rather than a song.
pub fn is_header_record(record: &SongRecord) -> bool {
    is_header_cells(&record.title, record.id.as_deref())
}
