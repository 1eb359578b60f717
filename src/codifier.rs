//! In-memory codifier index.
//!
//! [`CodifierIndex`] holds every row of the administrative codifier
//! (region → district → community → settlement) and answers the lookups the
//! rest of the crate needs:
//!
//! | Operation | Purpose |
//! |-----------|---------|
//! | [`list_level`](CodifierIndex::list_level) | Distinct names at one level, optionally under a parent code |
//! | [`get_code`](CodifierIndex::get_code) | Strict top-down name → code walk |
//! | [`get_chain`](CodifierIndex::get_chain) | Reverse record → display chain |
//! | [`search`](CodifierIndex::search) | Case-insensitive substring search over names |
//! | [`search_by_code`](CodifierIndex::search_by_code) | Exact code lookup, `UA` prefix optional |
//! | [`browse`](CodifierIndex::browse) | Hierarchy browsing by parent names |
//!
//! The index is built once and never mutated, so it can be shared behind an
//! `Arc` by any number of request handlers without locking. Parent → children
//! and code → record maps are built at load time; only [`search`] scans.
//!
//! # Dataset format
//!
//! Either a bare JSON array of rows or the envelope written by the data
//! pipeline:
//!
//! ```json
//! {
//!   "provider": { "name": "...", "license": "CC BY 4.0" },
//!   "order": { "number": "290", "date": "26 листопада 2020" },
//!   "data": [
//!     { "level1": "UA51000000000030770", "level2": NaN, "level3": NaN,
//!       "level4": NaN, "level_extra": NaN, "category": "O", "name": "Одеська" }
//!   ]
//! }
//! ```
//!
//! Keys may also use the `First_Level` / `Category` / `Name` spelling. Bare
//! `NaN` literals, `"nan"` strings and `null` all mean "no code".
//!
//! [`search`]: CodifierIndex::search

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{Category, Level, Match, Record};

/// Errors raised while loading a codifier dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read codifier dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse codifier dataset: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

/// Why a strict hierarchical lookup did not produce a code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{level} not found: {name}")]
    NotFound { level: Level, name: String },
    /// The record matched by name carries no code at its own level.
    #[error("{level} '{name}' has no code in the dataset")]
    MissingCode { level: Level, name: String },
}

/// A supplied parent name in [`CodifierIndex::browse`] did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrowseError {
    #[error("{0} not found: {1}")]
    NotFound(Level, String),
}

/// Data credit carried by the dataset envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub provider: Value,
    pub order: Value,
}

/// One distinct name at a hierarchy level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelEntry {
    pub name: String,
    pub category: Category,
    /// The record's own code at this level.
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, alias = "Category")]
    category: Option<Value>,
    #[serde(default, alias = "Name")]
    name: Option<Value>,
    #[serde(default, alias = "First_Level")]
    level1: Option<Value>,
    #[serde(default, alias = "Second_Level")]
    level2: Option<Value>,
    #[serde(default, alias = "Third_Level")]
    level3: Option<Value>,
    #[serde(default, alias = "Fourth_Level")]
    level4: Option<Value>,
    #[serde(default, alias = "Level_Extra")]
    level_extra: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDataset {
    Bare(Vec<RawRecord>),
    Envelope {
        #[serde(default)]
        provider: Option<Value>,
        #[serde(default)]
        order: Option<Value>,
        data: Vec<RawRecord>,
    },
}

/// Read-only index over the codifier records.
#[derive(Debug)]
pub struct CodifierIndex {
    records: Vec<Record>,
    /// Lowercased names, parallel to `records`.
    lowered: Vec<String>,
    /// Record indices per level, in dataset order.
    by_level: [Vec<usize>; 4],
    /// `(level, parent level code)` → child record indices.
    children: HashMap<(Level, String), Vec<usize>>,
    /// Level code → first record defining it at that level.
    defining: [HashMap<String, usize>; 4],
    /// Normalized code (no `UA`, uppercase) → first record carrying it in any column.
    by_any_code: HashMap<String, usize>,
    provenance: Option<Provenance>,
}

impl CodifierIndex {
    /// Load a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let index = Self::from_json_str(&text)?;
        tracing::info!(
            path = %path.display(),
            records = index.len(),
            "codifier dataset loaded"
        );
        Ok(index)
    }

    /// Parse a dataset from JSON text (bare array or envelope).
    pub fn from_json_str(text: &str) -> Result<Self, LoadError> {
        let text = replace_nan_literals(text);
        let raw: RawDataset = serde_json::from_str(&text)?;

        let (rows, provenance) = match raw {
            RawDataset::Envelope {
                provider,
                order,
                data,
            } => {
                let provenance = match (provider, order) {
                    (None, None) => None,
                    (provider, order) => Some(Provenance {
                        provider: provider.unwrap_or(Value::Null),
                        order: order.unwrap_or(Value::Null),
                    }),
                };
                (data, provenance)
            }
            RawDataset::Bare(data) => (data, None),
        };

        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (row, raw) in rows.into_iter().enumerate() {
            match convert_record(raw).map_err(|message| LoadError::InvalidRow { row, message })? {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "skipped codifier rows without category and name");
        }

        Ok(Self::from_records(records, provenance))
    }

    /// Build the index from already-cleaned records.
    pub fn from_records(records: Vec<Record>, provenance: Option<Provenance>) -> Self {
        let lowered = records.iter().map(|r| r.name.to_lowercase()).collect();
        let mut by_level: [Vec<usize>; 4] = Default::default();
        let mut children: HashMap<(Level, String), Vec<usize>> = HashMap::new();
        let mut defining: [HashMap<String, usize>; 4] = Default::default();
        let mut by_any_code: HashMap<String, usize> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            if let Some(level) = Level::of(record.category) {
                by_level[level.index()].push(idx);

                if let Some(parent) = level.parent() {
                    if let Some(parent_code) = record.level(parent) {
                        children
                            .entry((level, parent_code.to_string()))
                            .or_default()
                            .push(idx);
                    }
                }

                if let Some(code) = record.level(level) {
                    defining[level.index()]
                        .entry(code.to_string())
                        .or_insert(idx);
                }
            }

            for code in record.levels.iter().flatten() {
                let key = normalize_code(code);
                if !key.is_empty() {
                    by_any_code.entry(key).or_insert(idx);
                }
            }
        }

        Self {
            records,
            lowered,
            by_level,
            children,
            defining,
            by_any_code,
            provenance,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// Distinct names at `level`, sorted case-insensitively.
    ///
    /// With `parent_code`, only records whose parent-level code equals it are
    /// listed (district → `level1`, community → `level2`, unit → `level3`).
    /// Regions have no parent and ignore the filter. When a name repeats, the
    /// last record wins.
    pub fn list_level(&self, level: Level, parent_code: Option<&str>) -> Vec<LevelEntry> {
        let indices: &[usize] = match (level.parent(), parent_code) {
            (Some(_), Some(code)) => self
                .children
                .get(&(level, code.to_string()))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => &self.by_level[level.index()],
        };

        let mut entries: Vec<LevelEntry> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for &idx in indices {
            let record = &self.records[idx];
            if record.name.is_empty() {
                continue;
            }
            let entry = LevelEntry {
                name: record.name.clone(),
                category: record.category,
                code: record.level(level).map(str::to_string),
            };
            match positions.get(record.name.as_str()) {
                Some(&pos) => entries[pos] = entry,
                None => {
                    positions.insert(record.name.as_str(), entries.len());
                    entries.push(entry);
                }
            }
        }

        entries.sort_by_cached_key(|e| e.name.to_lowercase());
        entries
    }

    /// Strict top-down lookup; `None` when any requested level does not match.
    ///
    /// Returns the code of the deepest supplied level. A blank name ends the
    /// walk, so `get_code("Одеська", None, Some("x"), None)` is the region code.
    pub fn get_code(
        &self,
        region: &str,
        district: Option<&str>,
        community: Option<&str>,
        unit: Option<&str>,
    ) -> Option<String> {
        self.try_get_code(region, district, community, unit).ok()
    }

    /// Like [`get_code`](Self::get_code), but says which level failed and why.
    pub fn try_get_code(
        &self,
        region: &str,
        district: Option<&str>,
        community: Option<&str>,
        unit: Option<&str>,
    ) -> Result<String, LookupError> {
        let names = [Some(region), district, community, unit];
        let mut code: Option<String> = None;

        for level in Level::ALL {
            let name = match names[level.index()].map(str::trim) {
                Some(name) if !name.is_empty() => name,
                _ => break,
            };

            let candidates: &[usize] = match &code {
                None => &self.by_level[level.index()],
                Some(parent_code) => self
                    .children
                    .get(&(level, parent_code.clone()))
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
            };

            let record = candidates
                .iter()
                .map(|&idx| &self.records[idx])
                .find(|r| r.name == name)
                .ok_or_else(|| LookupError::NotFound {
                    level,
                    name: name.to_string(),
                })?;

            let own = record.level(level).ok_or_else(|| LookupError::MissingCode {
                level,
                name: name.to_string(),
            })?;
            code = Some(own.to_string());
        }

        code.ok_or_else(|| LookupError::NotFound {
            level: Level::Region,
            name: region.trim().to_string(),
        })
    }

    /// Rebuild the region → … → unit chain for a record.
    ///
    /// The category is the record's own, or `K` when the region-level
    /// ancestor is a city with special status. The code is the record's
    /// deepest non-empty level code (empty string if it has none).
    pub fn get_chain(&self, record: &Record) -> Match {
        let mut chain = Vec::new();
        let mut category = record.category;

        for level in Level::ALL {
            let Some(code) = record.level(level) else {
                continue;
            };
            if let Some(&idx) = self.defining[level.index()].get(code) {
                let ancestor = &self.records[idx];
                chain.push(ancestor.name.clone());
                if level == Level::Region && ancestor.category == Category::SpecialCity {
                    category = Category::SpecialCity;
                }
            }
        }

        Match {
            chain,
            code: record.own_code().unwrap_or_default().to_string(),
            category,
        }
    }

    /// Case-insensitive substring search over record names.
    ///
    /// Only settlement-level hits (`C`, `M`, `X`, `K`) with a code are
    /// returned, in dataset order.
    pub fn search(&self, fragment: &str) -> Vec<Match> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.records
            .iter()
            .zip(&self.lowered)
            .filter(|(record, lowered)| {
                record.category.is_settlement() && lowered.contains(needle.as_str())
            })
            .map(|(record, _)| self.get_chain(record))
            .filter(|m| m.category.is_settlement() && is_usable_code(&m.code))
            .collect()
    }

    /// Exact lookup by code in any of the four level columns.
    ///
    /// The input may carry a `UA` prefix or not; case is ignored.
    pub fn search_by_code(&self, code: &str) -> Option<Match> {
        let key = normalize_code(code);
        if key.is_empty() {
            return None;
        }
        self.by_any_code
            .get(&key)
            .map(|&idx| self.get_chain(&self.records[idx]))
    }

    /// List the children of the deepest supplied parent name.
    ///
    /// No region → all regions; region → its districts; region + district →
    /// its communities; all three → the community's settlements.
    pub fn browse(
        &self,
        region: Option<&str>,
        district: Option<&str>,
        community: Option<&str>,
    ) -> Result<Vec<LevelEntry>, BrowseError> {
        let Some(region) = non_blank(region) else {
            return Ok(self.list_level(Level::Region, None));
        };
        let region_code = self
            .get_code(region, None, None, None)
            .ok_or_else(|| BrowseError::NotFound(Level::Region, region.to_string()))?;

        let Some(district) = non_blank(district) else {
            return Ok(self.list_level(Level::District, Some(&region_code)));
        };
        let district_code = self
            .get_code(region, Some(district), None, None)
            .ok_or_else(|| BrowseError::NotFound(Level::District, district.to_string()))?;

        let Some(community) = non_blank(community) else {
            return Ok(self.list_level(Level::Community, Some(&district_code)));
        };
        let community_code = self
            .get_code(region, Some(district), Some(community), None)
            .ok_or_else(|| BrowseError::NotFound(Level::Community, community.to_string()))?;

        Ok(self.list_level(Level::Unit, Some(&community_code)))
    }
}

/// `true` when `input` looks like a codifier code: optional `UA` prefix
/// followed by 10–20 digits.
pub fn is_code_query(input: &str) -> bool {
    let s = input.trim();
    let digits = match s.get(..2) {
        Some(p) if p.eq_ignore_ascii_case("UA") => &s[2..],
        _ => s,
    };
    (10..=20).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

/// A code the caller can use: non-empty and not a leaked `nan` sentinel.
pub fn is_usable_code(code: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && !code.eq_ignore_ascii_case("nan")
}

fn normalize_code(code: &str) -> String {
    let upper = code.trim().to_uppercase();
    match upper.strip_prefix("UA") {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn convert_record(raw: RawRecord) -> Result<Option<Record>, String> {
    let category = clean_value(raw.category);
    let name = clean_value(raw.name);

    let (category, name) = match (category, name) {
        (None, None) => return Ok(None),
        (Some(category), name) => (category, name.unwrap_or_default()),
        (None, Some(name)) => return Err(format!("record '{}' has no category", name)),
    };

    Ok(Some(Record {
        category: category.parse()?,
        name,
        levels: [
            clean_value(raw.level1),
            clean_value(raw.level2),
            clean_value(raw.level3),
            clean_value(raw.level4),
        ],
        level_extra: clean_value(raw.level_extra),
    }))
}

/// Normalize a dataset cell: trims strings, drops `null` and `nan`, renders
/// integer-valued floats without a fractional part.
fn clean_value(value: Option<Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                let f = n.as_f64()?;
                if !f.is_finite() {
                    return None;
                }
                if f.fract() == 0.0 && f.abs() < 1e18 {
                    format!("{}", f as i64)
                } else {
                    f.to_string()
                }
            }
        }
        _ => return None,
    };

    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(text)
    }
}

/// Replace bare `NaN` tokens (outside strings) with `null` so the text is
/// valid JSON.
fn replace_nan_literals(text: &str) -> Cow<'_, str> {
    if !text.contains("NaN") {
        return Cow::Borrowed(text);
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if bytes[i..].starts_with(b"NaN") {
            out.push_str(&text[last..i]);
            out.push_str("null");
            i += 3;
            last = i;
            continue;
        }
        i += 1;
    }

    out.push_str(&text[last..]);
    Cow::Owned(out)
}
