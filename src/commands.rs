//! CLI command implementations.
//!
//! Each `run_*` function loads what it needs from the config, does one
//! thing and prints the result to stdout. Diagnostics go through `tracing`
//! (stderr).

use anyhow::{bail, Context, Result};
use std::sync::Arc;

use crate::alerts::enrich;
use crate::cache::AlertCache;
use crate::codifier::{is_code_query, CodifierIndex, LevelEntry};
use crate::config::Config;
use crate::feed::create_feed;
use crate::models::{Match, TerritorialOrganization};
use crate::normalize::{
    normalize_community, normalize_district, normalize_opt, normalize_region, normalize_unit,
};
use crate::resolver::AlertCodeResolver;

fn load_index(config: &Config) -> Result<CodifierIndex> {
    CodifierIndex::load(&config.codifier.path).with_context(|| {
        format!(
            "Failed to load codifier dataset: {}",
            config.codifier.path.display()
        )
    })
}

fn print_match(m: &Match) {
    println!(
        "{}  {}  {}",
        m.code,
        m.category.code(),
        m.chain.join(" / ")
    );
}

fn print_entries(entries: &[LevelEntry]) {
    if entries.is_empty() {
        println!("No entries.");
        return;
    }
    println!("{:<32} {:<9} CODE", "NAME", "CATEGORY");
    for e in entries {
        println!(
            "{:<32} {:<9} {}",
            e.name,
            e.category.code(),
            e.code.as_deref().unwrap_or("-")
        );
    }
}

/// `codifier search <fragment>`
pub fn run_search(config: &Config, fragment: &str) -> Result<()> {
    let index = load_index(config)?;
    let matches = index.search(fragment);
    if matches.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for m in &matches {
        print_match(m);
    }
    Ok(())
}

/// `codifier code <code>`
pub fn run_code(config: &Config, code: &str) -> Result<()> {
    if !is_code_query(code) {
        bail!(
            "'{}' is not a codifier code (expected optional UA followed by 10-20 digits)",
            code
        );
    }
    let index = load_index(config)?;
    match index.search_by_code(code) {
        Some(m) => {
            print_match(&m);
            println!("{}", m.category_label());
            Ok(())
        }
        None => bail!("code not found: {}", code.trim()),
    }
}

/// `codifier lookup --region … [--district …] [--community …] [--unit …]`
///
/// Names are normalized the same way alert names are, so
/// `--region "Одеська область"` works.
pub fn run_lookup(
    config: &Config,
    region: &str,
    district: Option<&str>,
    community: Option<&str>,
    unit: Option<&str>,
) -> Result<()> {
    let index = load_index(config)?;
    let region = normalize_region(region);
    let district = normalize_opt(district, normalize_district);
    let community = normalize_opt(community, normalize_community);
    let unit = normalize_opt(unit, normalize_unit);

    let code = index.try_get_code(
        &region,
        district.as_deref(),
        community.as_deref(),
        unit.as_deref(),
    )?;
    println!("{}", code);
    Ok(())
}

/// `codifier browse [--region …] [--district …] [--community …]`
pub fn run_browse(
    config: &Config,
    region: Option<&str>,
    district: Option<&str>,
    community: Option<&str>,
) -> Result<()> {
    let index = load_index(config)?;
    let entries = index.browse(region, district, community)?;
    print_entries(&entries);
    Ok(())
}

/// `codifier alerts [--location-type …]`: fetch the feed once and print every
/// alert with its resolved code.
pub async fn run_alerts(config: &Config, location_type: Option<&str>) -> Result<()> {
    let kind: Option<TerritorialOrganization> = location_type
        .map(str::parse)
        .transpose()
        .map_err(anyhow::Error::msg)?;

    let index = Arc::new(load_index(config)?);
    let cache = AlertCache::new(create_feed(&config.feed)?);
    let snapshot = cache
        .get_active_alerts()
        .await
        .context("Failed to fetch active alerts")?;

    let alerts: Vec<_> = snapshot
        .alerts
        .iter()
        .filter(|a| kind.is_none() || a.territorial_organization() == kind)
        .cloned()
        .collect();

    if alerts.is_empty() {
        println!("No active alerts.");
        return Ok(());
    }

    let resolver = AlertCodeResolver::new(index);
    println!("{:<21} {:<8} LOCATION", "UA_CODE", "TYPE");
    for e in enrich(&alerts, &resolver) {
        println!(
            "{:<21} {:<8} {}",
            e.ua_code.as_deref().unwrap_or("-"),
            e.location_type,
            e.summary.location_title
        );
    }
    println!("Fetched at {}", snapshot.fetched_at.to_rfc3339());
    Ok(())
}
