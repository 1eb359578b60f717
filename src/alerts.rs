//! Views over an alert snapshot.
//!
//! - [`filter_by_location_type`] picks the alerts of one
//!   [`TerritorialOrganization`] and trims them to a short summary.
//! - [`enrich`] attaches the resolved codifier code to every alert.
//!
//! Both are pure functions of the snapshot; the caller decides where the
//! snapshot comes from.

use serde::Serialize;

use crate::models::{Alert, TerritorialOrganization};
use crate::resolver::AlertCodeResolver;

/// Short form of an alert for per-type listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    pub location_title: String,
    pub alert_type: String,
    pub location_oblast: Option<String>,
    pub location_raion: Option<String>,
    pub started_at: Option<String>,
}

impl From<&Alert> for AlertSummary {
    fn from(alert: &Alert) -> Self {
        Self {
            location_title: alert.location_title.clone(),
            alert_type: alert.alert_type.clone(),
            location_oblast: alert.location_oblast.clone(),
            location_raion: alert.location_raion.clone(),
            started_at: alert.started_at.clone(),
        }
    }
}

/// An alert summary with its codifier code; `ua_code` is `null` when
/// unresolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedAlert {
    #[serde(flatten)]
    pub summary: AlertSummary,
    pub location_type: String,
    pub ua_code: Option<String>,
}

pub fn filter_by_location_type(
    alerts: &[Alert],
    kind: TerritorialOrganization,
) -> Vec<AlertSummary> {
    alerts
        .iter()
        .filter(|a| a.territorial_organization() == Some(kind))
        .map(AlertSummary::from)
        .collect()
}

/// Resolve every alert. One alert failing to resolve never affects the rest.
pub fn enrich(alerts: &[Alert], resolver: &AlertCodeResolver) -> Vec<EnrichedAlert> {
    let enriched: Vec<EnrichedAlert> = alerts
        .iter()
        .map(|alert| EnrichedAlert {
            summary: AlertSummary::from(alert),
            location_type: alert.location_type.clone(),
            ua_code: resolver.resolve(alert),
        })
        .collect();

    let resolved = enriched.iter().filter(|e| e.ua_code.is_some()).count();
    tracing::debug!(
        alerts = enriched.len(),
        resolved,
        unresolved = enriched.len() - resolved,
        "enriched alert snapshot"
    );
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codifier::fixture;
    use std::sync::Arc;

    fn alert(title: &str, kind: &str) -> Alert {
        Alert {
            location_title: title.to_string(),
            location_type: kind.to_string(),
            alert_type: "air_raid".to_string(),
            location_oblast: Some("Одеська область".to_string()),
            ..Alert::default()
        }
    }

    #[test]
    fn test_filter_by_location_type() {
        let alerts = vec![
            alert("Одеська область", "oblast"),
            alert("Ізмаїльський район", "raion"),
            alert("Білгород-Дністровський район", "raion"),
            alert("м. Ізмаїл", "city"),
            alert("Щось", "unknown"),
        ];

        let raions = filter_by_location_type(&alerts, TerritorialOrganization::Raion);
        assert_eq!(raions.len(), 2);
        assert_eq!(raions[0].location_title, "Ізмаїльський район");
        assert_eq!(raions[0].alert_type, "air_raid");

        assert!(filter_by_location_type(&alerts, TerritorialOrganization::Hromada).is_empty());
        assert_eq!(
            filter_by_location_type(&alerts, TerritorialOrganization::Oblast).len(),
            1
        );
    }

    #[test]
    fn test_enrich_keeps_order_and_unresolved() {
        let resolver = AlertCodeResolver::new(Arc::new(fixture::index()));
        let mut district = alert("Ізмаїльський район", "raion");
        district.location_raion = Some("Ізмаїльський район".to_string());
        let alerts = vec![
            alert("Одеська область", "oblast"),
            alert("Атлантида", "hromada"),
            district,
        ];

        let enriched = enrich(&alerts, &resolver);
        assert_eq!(enriched.len(), 3);
        assert_eq!(enriched[0].ua_code.as_deref(), Some("UA51000000000030770"));
        assert_eq!(enriched[1].ua_code, None);
        assert_eq!(enriched[2].ua_code.as_deref(), Some("UA51080000000061776"));
        assert_eq!(enriched[2].summary.location_title, "Ізмаїльський район");
        assert_eq!(enriched[2].location_type, "raion");
    }

    #[test]
    fn test_enriched_alert_serializes_flat() {
        let source = alert("Одеська область", "oblast");
        let enriched = EnrichedAlert {
            summary: AlertSummary::from(&source),
            location_type: source.location_type.clone(),
            ua_code: None,
        };
        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["location_title"], "Одеська область");
        assert_eq!(value["location_type"], "oblast");
        assert!(value["ua_code"].is_null());
        assert!(value.get("summary").is_none());
    }
}
