//! Alert → codifier code resolution.
//!
//! An alert names its location loosely: `"м. Ізмаїл"` in
//! `"Ізмаїльський район"` of `"Одеська область"`. [`AlertCodeResolver`]
//! normalizes those names and tries an ordered list of [`Strategy`]s until
//! one yields a usable code:
//!
//! 1. [`Strategy::Typed`]: strict lookup with exactly the components the
//!    alert's `location_type` calls for (oblast → region; raion → + district;
//!    hromada → + community; city → + unit).
//! 2. [`Strategy::BestEffort`]: strict lookup with every component that is
//!    present, whatever the declared type. The walk stops at the first
//!    missing level, so a city alert without a hromada only reaches its
//!    district; such a shallow code is held back as [`Outcome::Partial`].
//! 3. [`Strategy::Search`]: substring search by unit name, then community
//!    name, then the raw title / city / settlement fields. Hits inside the
//!    alert's region and district win over hits elsewhere.
//!
//! A partial code is returned only when the search finds nothing.
//!
//! Each strategy reports an [`Outcome`]; the full trace is available from
//! [`AlertCodeResolver::resolve_traced`]. An alert that nothing resolves
//! simply has no code.

use serde::Serialize;
use std::sync::Arc;

use crate::codifier::{is_usable_code, CodifierIndex, LookupError};
use crate::models::{Alert, Match, TerritorialOrganization};
use crate::normalize::{
    normalize_community, normalize_district, normalize_opt, normalize_region, normalize_unit,
};

/// Resolution strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Typed,
    BestEffort,
    Search,
}

impl Strategy {
    pub const ORDER: [Strategy; 3] = [Strategy::Typed, Strategy::BestEffort, Strategy::Search];
}

/// What one strategy produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved(String),
    /// Matched, but above a level the alert names.
    Partial(String),
    /// The alert lacks the inputs this strategy needs.
    NotApplicable,
    NoMatch,
    /// The dataset matched but could not produce a code.
    Failed(LookupError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub strategy: Strategy,
    pub outcome: Outcome,
}

/// Result of resolving one alert, with the attempts that led to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub code: Option<String>,
    pub strategy: Option<Strategy>,
    pub attempts: Vec<Attempt>,
}

/// Normalized name components derived from an alert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationNames {
    pub region: Option<String>,
    pub district: Option<String>,
    pub community: Option<String>,
    pub unit: Option<String>,
}

impl LocationNames {
    pub fn from_alert(alert: &Alert) -> Self {
        let kind = alert.territorial_organization();
        let title = Some(alert.location_title.as_str());
        let title_if = |wanted: TerritorialOrganization| if kind == Some(wanted) { title } else { None };

        let region = normalize_opt(alert.location_oblast.as_deref(), normalize_region)
            .or_else(|| normalize_opt(title_if(TerritorialOrganization::Oblast), normalize_region));
        let district = normalize_opt(alert.location_raion.as_deref(), normalize_district)
            .or_else(|| normalize_opt(title_if(TerritorialOrganization::Raion), normalize_district));
        let community = normalize_opt(title_if(TerritorialOrganization::Hromada), normalize_community)
            .or_else(|| normalize_opt(alert.location_hromada.as_deref(), normalize_community));
        let unit = normalize_opt(title_if(TerritorialOrganization::City), normalize_unit)
            .or_else(|| normalize_opt(alert.location_city.as_deref(), normalize_unit))
            .or_else(|| normalize_opt(alert.location_settlement.as_deref(), normalize_unit));

        Self {
            region,
            district,
            community,
            unit,
        }
    }

    /// Components the declared type requires, or `None` if one is missing.
    fn typed(&self, kind: TerritorialOrganization) -> Option<[Option<&str>; 4]> {
        let depth = match kind {
            TerritorialOrganization::Oblast => 1,
            TerritorialOrganization::Raion => 2,
            TerritorialOrganization::Hromada => 3,
            TerritorialOrganization::City => 4,
        };
        let all = self.components();
        let mut out = [None; 4];
        for (i, slot) in out.iter_mut().enumerate().take(depth) {
            *slot = Some(all[i]?);
        }
        Some(out)
    }

    /// Leading region → district names, used to rank search hits.
    fn scope(&self) -> Vec<&str> {
        [self.region.as_deref(), self.district.as_deref()]
            .into_iter()
            .map_while(|name| name)
            .collect()
    }

    fn components(&self) -> [Option<&str>; 4] {
        [
            self.region.as_deref(),
            self.district.as_deref(),
            self.community.as_deref(),
            self.unit.as_deref(),
        ]
    }
}

/// Resolves alerts against a shared [`CodifierIndex`].
#[derive(Debug, Clone)]
pub struct AlertCodeResolver {
    index: Arc<CodifierIndex>,
}

impl AlertCodeResolver {
    pub fn new(index: Arc<CodifierIndex>) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &CodifierIndex {
        &self.index
    }

    /// The alert's codifier code, if any strategy finds one.
    pub fn resolve(&self, alert: &Alert) -> Option<String> {
        self.resolve_traced(alert).code
    }

    /// Run the strategies in order and record every outcome.
    pub fn resolve_traced(&self, alert: &Alert) -> Resolution {
        let names = LocationNames::from_alert(alert);
        let mut attempts = Vec::with_capacity(Strategy::ORDER.len());
        let mut partial: Option<String> = None;

        for strategy in Strategy::ORDER {
            let outcome = match strategy {
                Strategy::Typed => self.typed(alert, &names),
                Strategy::BestEffort => self.best_effort(&names),
                Strategy::Search => self.search(alert, &names),
            };

            match &outcome {
                Outcome::Failed(err) => tracing::warn!(
                    title = %alert.location_title,
                    ?strategy,
                    error = %err,
                    "alert resolution step failed"
                ),
                Outcome::Partial(code) => partial = Some(code.clone()),
                _ => {}
            }

            let code = match &outcome {
                Outcome::Resolved(code) => Some(code.clone()),
                _ => None,
            };
            attempts.push(Attempt { strategy, outcome });

            if code.is_some() {
                return Resolution {
                    code,
                    strategy: Some(strategy),
                    attempts,
                };
            }
        }

        if partial.is_some() {
            tracing::debug!(title = %alert.location_title, "alert resolved above its own level");
            return Resolution {
                code: partial,
                strategy: Some(Strategy::BestEffort),
                attempts,
            };
        }

        tracing::debug!(title = %alert.location_title, "alert left without a code");
        Resolution {
            code: None,
            strategy: None,
            attempts,
        }
    }

    fn typed(&self, alert: &Alert, names: &LocationNames) -> Outcome {
        let Some(kind) = alert.territorial_organization() else {
            return Outcome::NotApplicable;
        };
        match names.typed(kind) {
            Some(components) => self.lookup(components),
            None => Outcome::NotApplicable,
        }
    }

    fn best_effort(&self, names: &LocationNames) -> Outcome {
        if names.region.is_none() {
            return Outcome::NotApplicable;
        }
        let components = names.components();
        match self.lookup(components) {
            Outcome::Resolved(code) if self.is_shallow(&components, &code) => {
                Outcome::Partial(code)
            }
            outcome => outcome,
        }
    }

    /// A name below the first missing level went unused and the code is not
    /// already a settlement's (`м. Київ` resolves at region level).
    fn is_shallow(&self, components: &[Option<&str>; 4], code: &str) -> bool {
        let walked = components.iter().take_while(|c| c.is_some()).count();
        components[walked..].iter().any(Option::is_some)
            && !self
                .index
                .search_by_code(code)
                .is_some_and(|m| m.category.is_settlement())
    }

    fn lookup(&self, [region, district, community, unit]: [Option<&str>; 4]) -> Outcome {
        let Some(region) = region else {
            return Outcome::NotApplicable;
        };
        match self.index.try_get_code(region, district, community, unit) {
            Ok(code) if is_usable_code(&code) => Outcome::Resolved(code),
            Ok(_) => Outcome::NoMatch,
            Err(LookupError::NotFound { .. }) => Outcome::NoMatch,
            Err(err @ LookupError::MissingCode { .. }) => Outcome::Failed(err),
        }
    }

    fn search(&self, alert: &Alert, names: &LocationNames) -> Outcome {
        let candidates = [
            names.unit.as_deref(),
            names.community.as_deref(),
            Some(alert.location_title.as_str()),
            alert.location_city.as_deref(),
            alert.location_settlement.as_deref(),
        ];

        let scope = names.scope();
        let in_scope = |m: &Match| {
            m.chain.len() >= scope.len() && m.chain.iter().zip(&scope).all(|(a, b)| a == b)
        };

        let mut tried: Vec<&str> = Vec::new();
        let mut fallback: Option<String> = None;
        for term in candidates.into_iter().flatten().map(str::trim) {
            if term.is_empty() || tried.contains(&term) {
                continue;
            }
            tried.push(term);

            for m in self.index.search(term) {
                if !is_usable_code(&m.code) {
                    continue;
                }
                if in_scope(&m) {
                    return Outcome::Resolved(m.code);
                }
                fallback.get_or_insert(m.code);
            }
        }

        match fallback {
            Some(code) => Outcome::Resolved(code),
            None if tried.is_empty() => Outcome::NotApplicable,
            None => Outcome::NoMatch,
        }
    }
}
