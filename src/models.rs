//! Core data models shared by the codifier index, the alert cache, and the
//! HTTP surface.
//!
//! Codifier rows ([`Record`]) carry a closed [`Category`]; the dataset's
//! one-letter strings are parsed at load time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Administrative category of a codifier record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// `O`: oblast or the Autonomous Republic of Crimea.
    #[serde(rename = "O")]
    Region,
    /// `K`: city with special status (Kyiv, Sevastopol).
    #[serde(rename = "K")]
    SpecialCity,
    /// `P`: district (raion).
    #[serde(rename = "P")]
    District,
    /// `H`: territorial community (hromada).
    #[serde(rename = "H")]
    Community,
    /// `C`: village.
    #[serde(rename = "C")]
    Village,
    /// `M`: city.
    #[serde(rename = "M")]
    City,
    /// `X`: settlement.
    #[serde(rename = "X")]
    Settlement,
    /// `B`: district within a city. Loaded, never returned by search.
    #[serde(rename = "B")]
    CityDistrict,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Region,
        Category::SpecialCity,
        Category::District,
        Category::Community,
        Category::Village,
        Category::City,
        Category::Settlement,
        Category::CityDistrict,
    ];

    /// The one-letter code used by the dataset.
    pub fn code(self) -> &'static str {
        match self {
            Category::Region => "O",
            Category::SpecialCity => "K",
            Category::District => "P",
            Category::Community => "H",
            Category::Village => "C",
            Category::City => "M",
            Category::Settlement => "X",
            Category::CityDistrict => "B",
        }
    }

    /// Human-readable (Ukrainian) label.
    pub fn label(self) -> &'static str {
        match self {
            Category::Region => "область",
            Category::SpecialCity => "місто зі спец. статусом",
            Category::District => "район",
            Category::Community => "громада",
            Category::Village => "село",
            Category::City => "місто",
            Category::Settlement => "селище",
            Category::CityDistrict => "район у місті",
        }
    }

    /// Categories that name a place a user can be located in.
    pub fn is_settlement(self) -> bool {
        matches!(
            self,
            Category::Village | Category::City | Category::Settlement | Category::SpecialCity
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown codifier category: '{}'", s))
    }
}

/// One of the four hierarchical levels of the codifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Region,
    District,
    Community,
    Unit,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Region, Level::District, Level::Community, Level::Unit];

    /// Categories whose records live at this level.
    pub fn categories(self) -> &'static [Category] {
        match self {
            Level::Region => &[Category::Region, Category::SpecialCity],
            Level::District => &[Category::District],
            Level::Community => &[Category::Community],
            Level::Unit => &[Category::Village, Category::City, Category::Settlement],
        }
    }

    /// Zero-based index into [`Record::levels`].
    pub fn index(self) -> usize {
        match self {
            Level::Region => 0,
            Level::District => 1,
            Level::Community => 2,
            Level::Unit => 3,
        }
    }

    pub fn parent(self) -> Option<Level> {
        match self {
            Level::Region => None,
            Level::District => Some(Level::Region),
            Level::Community => Some(Level::District),
            Level::Unit => Some(Level::Community),
        }
    }

    /// Level a category's own code lives at, if it is part of the four-level tree.
    pub fn of(category: Category) -> Option<Level> {
        Level::ALL
            .into_iter()
            .find(|l| l.categories().contains(&category))
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Region => "region",
            Level::District => "district",
            Level::Community => "community",
            Level::Unit => "unit",
        })
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "region" => Ok(Level::Region),
            "district" => Ok(Level::District),
            "community" => Ok(Level::Community),
            "unit" => Ok(Level::Unit),
            other => Err(format!(
                "unknown level: '{}'. Use region, district, community, or unit.",
                other
            )),
        }
    }
}

/// One row of the codifier dataset, with sentinel values already cleaned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub category: Category,
    /// Display name, trimmed.
    pub name: String,
    /// `level1..level4` codes; `None` where the column is empty or `nan`.
    pub levels: [Option<String>; 4],
    /// Extra column carried by city-district (`B`) rows.
    pub level_extra: Option<String>,
}

impl Record {
    pub fn level(&self, level: Level) -> Option<&str> {
        self.levels[level.index()].as_deref()
    }

    /// The deepest populated level code.
    pub fn own_code(&self) -> Option<&str> {
        self.levels.iter().rev().find_map(|c| c.as_deref())
    }
}

/// A resolved location: display chain from region down, its code and category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub chain: Vec<String>,
    pub code: String,
    pub category: Category,
}

impl Match {
    pub fn category_label(&self) -> &'static str {
        self.category.label()
    }
}

/// Administrative granularity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerritorialOrganization {
    Oblast,
    Raion,
    Hromada,
    City,
}

impl TerritorialOrganization {
    pub fn as_str(self) -> &'static str {
        match self {
            TerritorialOrganization::Oblast => "oblast",
            TerritorialOrganization::Raion => "raion",
            TerritorialOrganization::Hromada => "hromada",
            TerritorialOrganization::City => "city",
        }
    }
}

impl FromStr for TerritorialOrganization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oblast" => Ok(TerritorialOrganization::Oblast),
            "raion" => Ok(TerritorialOrganization::Raion),
            "hromada" => Ok(TerritorialOrganization::Hromada),
            "city" => Ok(TerritorialOrganization::City),
            other => Err(format!(
                "unknown location type: '{}'. Use oblast, raion, hromada, or city.",
                other
            )),
        }
    }
}

/// A single active alert as published by the upstream feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub location_title: String,
    /// Raw `location_type`; see [`Alert::territorial_organization`].
    #[serde(default)]
    pub location_type: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub alert_type: String,
    #[serde(default)]
    pub location_uid: Option<String>,
    #[serde(default)]
    pub location_oblast: Option<String>,
    #[serde(default)]
    pub location_oblast_uid: Option<u64>,
    #[serde(default)]
    pub location_raion: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub calculated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_hromada: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_settlement: Option<String>,
}

impl Alert {
    /// Parsed `location_type`; `None` for values outside the four known kinds.
    pub fn territorial_organization(&self) -> Option<TerritorialOrganization> {
        self.location_type.parse().ok()
    }
}

/// An immutable snapshot of the feed's active alerts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnapshot {
    pub alerts: Vec<Alert>,
    pub fetched_at: DateTime<Utc>,
}
