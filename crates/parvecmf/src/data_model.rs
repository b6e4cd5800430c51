//! Rating sources
//!
//! A [`RatingSource`] exposes the ids of users and items and the explicit
//! ratings given by a user or received by an item. [`InMemoryRatings`] is the
//! bundled implementation, built from rating triples or a ratings text file.

use crate::error::{ParVecMfError, Result};
use crate::id_mapping::IdMapping;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Read access to a user-item rating matrix keyed by opaque ids
pub trait RatingSource: Send + Sync {
    fn user_ids(&self) -> Result<Vec<String>>;

    fn item_ids(&self) -> Result<Vec<String>>;

    /// Ratings given by `user_id`, as `(item_id, rating)` pairs
    fn ratings_from(&self, user_id: &str) -> Result<Vec<(String, f64)>>;

    /// Ratings received by `item_id`, as `(user_id, rating)` pairs
    fn ratings_for(&self, item_id: &str) -> Result<Vec<(String, f64)>>;
}

/// In-memory rating matrix
///
/// Ids keep the order in which they were first seen. Rating the same
/// user-item pair twice keeps the last value.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRatings {
    users: Vec<String>,
    items: Vec<String>,
    /// user -> item -> rating
    by_user: HashMap<String, HashMap<String, f64>>,
    /// item -> user -> rating
    by_item: HashMap<String, HashMap<String, f64>>,
}

impl InMemoryRatings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_interactions<U, I>(interactions: impl IntoIterator<Item = (U, I, f64)>) -> Self
    where
        U: Into<String>,
        I: Into<String>,
    {
        let mut ratings = Self::new();
        for (user_id, item_id, rating) in interactions {
            ratings.insert(user_id, item_id, rating);
        }
        ratings
    }

    /// Load ratings from a `user,item,rating` text file
    ///
    /// Fields may be separated by commas, tabs or spaces. Blank lines and lines
    /// starting with `#` are skipped; extra trailing fields (e.g. timestamps)
    /// are ignored.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| ParVecMfError::io(path, e))?;
        Self::from_reader(std::io::BufReader::new(file), &path.display().to_string())
    }

    pub fn from_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Self> {
        let mut ratings = Self::new();

        for (line_idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ParVecMfError::io(source_name, e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = trimmed
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|f| !f.is_empty())
                .collect();

            let malformed = |reason: String| ParVecMfError::RatingLine {
                source_name: source_name.to_string(),
                line: line_idx + 1,
                reason,
            };

            if fields.len() < 3 {
                return Err(malformed(format!(
                    "expected user, item and rating, found {} field(s)",
                    fields.len()
                )));
            }

            let rating: f64 = fields[2]
                .parse()
                .map_err(|_| malformed(format!("invalid rating '{}'", fields[2])))?;
            if !rating.is_finite() {
                return Err(malformed(format!("non-finite rating '{}'", fields[2])));
            }

            ratings.insert(fields[0], fields[1], rating);
        }

        Ok(ratings)
    }

    pub fn insert(&mut self, user_id: impl Into<String>, item_id: impl Into<String>, rating: f64) {
        let user_id = user_id.into();
        let item_id = item_id.into();

        if !self.by_user.contains_key(&user_id) {
            self.users.push(user_id.clone());
        }
        if !self.by_item.contains_key(&item_id) {
            self.items.push(item_id.clone());
        }

        self.by_user
            .entry(user_id.clone())
            .or_default()
            .insert(item_id.clone(), rating);
        self.by_item
            .entry(item_id)
            .or_default()
            .insert(user_id, rating);
    }

    /// Register a user without ratings
    pub fn add_user(&mut self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        if !self.by_user.contains_key(&user_id) {
            self.users.push(user_id.clone());
            self.by_user.insert(user_id, HashMap::new());
        }
    }

    /// Register an item without ratings
    pub fn add_item(&mut self, item_id: impl Into<String>) {
        let item_id = item_id.into();
        if !self.by_item.contains_key(&item_id) {
            self.items.push(item_id.clone());
            self.by_item.insert(item_id, HashMap::new());
        }
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub fn num_ratings(&self) -> usize {
        self.by_user.values().map(HashMap::len).sum()
    }

    pub fn get(&self, user_id: &str, item_id: &str) -> Option<f64> {
        self.by_user.get(user_id)?.get(item_id).copied()
    }
}

impl RatingSource for InMemoryRatings {
    fn user_ids(&self) -> Result<Vec<String>> {
        Ok(self.users.clone())
    }

    fn item_ids(&self) -> Result<Vec<String>> {
        Ok(self.items.clone())
    }

    fn ratings_from(&self, user_id: &str) -> Result<Vec<(String, f64)>> {
        let prefs = self.by_user.get(user_id).ok_or_else(|| ParVecMfError::UnknownId {
            kind: "user",
            id: user_id.to_string(),
        })?;
        Ok(prefs.iter().map(|(id, r)| (id.clone(), *r)).collect())
    }

    fn ratings_for(&self, item_id: &str) -> Result<Vec<(String, f64)>> {
        let prefs = self.by_item.get(item_id).ok_or_else(|| ParVecMfError::UnknownId {
            kind: "item",
            id: item_id.to_string(),
        })?;
        Ok(prefs.iter().map(|(id, r)| (id.clone(), *r)).collect())
    }
}

/// Sparse rating vector of one user or item, keyed by counterpart dense index
#[derive(Debug, Clone, PartialEq)]
pub struct SparseRow {
    /// (counterpart index, rating), sorted by index
    entries: Vec<(usize, f64)>,
    /// Number of counterparts (items for a user row, users for an item row)
    dimension: usize,
}

impl SparseRow {
    /// Build a row, sorting the entries by index
    ///
    /// Fails if an index falls outside `dimension` or appears twice.
    pub fn new(mut entries: Vec<(usize, f64)>, dimension: usize) -> Result<Self> {
        entries.sort_by_key(|&(idx, _)| idx);

        for (pos, &(idx, _)) in entries.iter().enumerate() {
            if idx >= dimension {
                return Err(ParVecMfError::DimensionMismatch {
                    what: "rating index",
                    expected: dimension,
                    found: idx,
                });
            }
            if pos > 0 && entries[pos - 1].0 == idx {
                return Err(ParVecMfError::RatingSource(format!(
                    "counterpart index {} rated twice in the same row",
                    idx
                )));
            }
        }

        Ok(Self { entries, dimension })
    }

    pub fn empty(dimension: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimension,
        }
    }

    pub fn entries(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

/// Sparse rating rows for every dense index of one side of the matrix
#[derive(Debug, Clone)]
pub struct RatingRows {
    rows: Vec<SparseRow>,
}

impl RatingRows {
    pub fn new(rows: Vec<SparseRow>) -> Self {
        Self { rows }
    }

    /// One row per user, indexed by the user mapping, with item counterparts
    pub fn for_users(source: &dyn RatingSource, mapping: &IdMapping) -> Result<Self> {
        let rows = mapping
            .users
            .ids()
            .iter()
            .map(|user_id| {
                let entries = source
                    .ratings_from(user_id)?
                    .into_iter()
                    .map(|(item_id, rating)| Ok((mapping.items.require(&item_id)?, rating)))
                    .collect::<Result<Vec<_>>>()?;
                SparseRow::new(entries, mapping.num_items())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rows })
    }

    /// One row per item, indexed by the item mapping, with user counterparts
    pub fn for_items(source: &dyn RatingSource, mapping: &IdMapping) -> Result<Self> {
        let rows = mapping
            .items
            .ids()
            .iter()
            .map(|item_id| {
                let entries = source
                    .ratings_for(item_id)?
                    .into_iter()
                    .map(|(user_id, rating)| Ok((mapping.users.require(&user_id)?, rating)))
                    .collect::<Result<Vec<_>>>()?;
                SparseRow::new(entries, mapping.num_users())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> &SparseRow {
        &self.rows[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SparseRow> {
        self.rows.iter()
    }

    pub fn num_ratings(&self) -> usize {
        self.rows.iter().map(SparseRow::nnz).sum()
    }
}
