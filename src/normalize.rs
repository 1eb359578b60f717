//! Name normalization applied before codifier lookups.
//!
//! The alert feed decorates names with administrative markers that the
//! codifier does not carry: `"м. Ізмаїл"`, `"Одеська область"`,
//! `"Ізмаїльський район"`, `"Саф'янівська територіальна громада"`. These
//! functions strip them. Markers are matched case-insensitively; the
//! remaining name keeps its original case.

/// Leading locality markers, longest first so `"смт."` wins over `"смт"`.
const UNIT_PREFIXES: &[&str] = &[
    "селище міського типу",
    "селище",
    "місто",
    "смт.",
    "смт",
    "с-ще",
    "м.",
    "с.",
];

const COMMUNITY_SUFFIXES: &[&str] = &["територіальна громада", "громада"];
const REGION_SUFFIXES: &[&str] = &["область", "обл."];
const DISTRICT_SUFFIXES: &[&str] = &["район", "р-н"];

/// Normalize a settlement name: `"м. Ізмаїл"` → `"Ізмаїл"`,
/// `"Вилкове (місто)"` → `"Вилкове"`.
pub fn normalize_unit(name: &str) -> String {
    let mut s = collapse_whitespace(name);

    if s.ends_with(')') {
        if let Some(open) = s.rfind('(') {
            let head = s[..open].trim_end();
            if !head.is_empty() {
                s = head.to_string();
            }
        }
    }

    for prefix in UNIT_PREFIXES {
        if let Some(rest) = strip_marker_prefix(&s, prefix) {
            return rest.to_string();
        }
    }
    s
}

/// Normalize a community name: `"Ізмаїльська територіальна громада"` → `"Ізмаїльська"`.
pub fn normalize_community(name: &str) -> String {
    strip_any_suffix(&collapse_whitespace(name), COMMUNITY_SUFFIXES)
}

/// Normalize a region name: `"Одеська область"` → `"Одеська"`, `"м. Київ"` → `"Київ"`.
pub fn normalize_region(name: &str) -> String {
    let s = collapse_whitespace(name);
    let s = match strip_marker_prefix(&s, "м.") {
        Some(rest) => rest.to_string(),
        None => s,
    };
    strip_any_suffix(&s, REGION_SUFFIXES)
}

/// Normalize a district name: `"Одеський район"` → `"Одеський"`.
pub fn normalize_district(name: &str) -> String {
    strip_any_suffix(&collapse_whitespace(name), DISTRICT_SUFFIXES)
}

/// Apply `normalize` to an optional field, treating blank results as absent.
pub fn normalize_opt(value: Option<&str>, normalize: fn(&str) -> String) -> Option<String> {
    let normalized = normalize(value?);
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_any_suffix(s: &str, suffixes: &[&str]) -> String {
    for suffix in suffixes {
        if let Some(rest) = strip_suffix_ci(s, suffix) {
            // Suffix must be a separate word and must not be the whole name.
            if rest.ends_with(char::is_whitespace) && !rest.trim().is_empty() {
                return rest.trim_end().to_string();
            }
        }
    }
    s.to_string()
}

/// Strip `marker` from the start of `s` when it forms its own token.
/// Markers ending in `.` may be glued to the name (`"м.Ізмаїл"`).
fn strip_marker_prefix<'a>(s: &'a str, marker: &str) -> Option<&'a str> {
    let rest = strip_prefix_ci(s, marker)?;
    let separated = marker.ends_with('.') || rest.starts_with(char::is_whitespace);
    let rest = rest.trim_start();
    if separated && !rest.is_empty() {
        Some(rest)
    } else {
        None
    }
}

fn chars_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let mut iter = s.char_indices();
    for p in prefix.chars() {
        let (_, c) = iter.next()?;
        if !chars_eq_ci(c, p) {
            return None;
        }
    }
    let offset = iter.next().map(|(i, _)| i).unwrap_or(s.len());
    Some(&s[offset..])
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let mut iter = s.char_indices().rev();
    let mut start = s.len();
    for p in suffix.chars().rev() {
        let (i, c) = iter.next()?;
        if !chars_eq_ci(c, p) {
            return None;
        }
        start = i;
    }
    Some(&s[..start])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_prefixes() {
        assert_eq!(normalize_unit("м. Ізмаїл"), "Ізмаїл");
        assert_eq!(normalize_unit("М. Ізмаїл"), "Ізмаїл");
        assert_eq!(normalize_unit("м.Ізмаїл"), "Ізмаїл");
        assert_eq!(normalize_unit("смт Сарата"), "Сарата");
        assert_eq!(normalize_unit("смт. Сарата"), "Сарата");
        assert_eq!(normalize_unit("с. Приморське"), "Приморське");
        assert_eq!(normalize_unit("селище Затока"), "Затока");
        assert_eq!(normalize_unit("місто Київ"), "Київ");
    }

    #[test]
    fn test_unit_keeps_words_that_only_start_like_a_marker() {
        assert_eq!(normalize_unit("Селищанське"), "Селищанське");
        assert_eq!(normalize_unit("Містечко"), "Містечко");
        assert_eq!(normalize_unit("Смтівка"), "Смтівка");
    }

    #[test]
    fn test_unit_parenthetical_annotation() {
        assert_eq!(normalize_unit("Вилкове (місто)"), "Вилкове");
        assert_eq!(normalize_unit("м. Вилкове (Ізмаїльський р-н)"), "Вилкове");
        assert_eq!(normalize_unit("(невідомо)"), "(невідомо)");
    }

    #[test]
    fn test_community_suffix() {
        assert_eq!(
            normalize_community("Ізмаїльська територіальна громада"),
            "Ізмаїльська"
        );
        assert_eq!(
            normalize_community("Ізмаїльська  Територіальна   громада"),
            "Ізмаїльська"
        );
        assert_eq!(normalize_community("Татарбунарська громада"), "Татарбунарська");
        assert_eq!(normalize_community("Татарбунарська"), "Татарбунарська");
    }

    #[test]
    fn test_region_suffix_and_whitespace() {
        assert_eq!(normalize_region("Одеська область"), "Одеська");
        assert_eq!(normalize_region("  Одеська   Область "), "Одеська");
        assert_eq!(normalize_region("Одеська обл."), "Одеська");
        assert_eq!(normalize_region("м. Київ"), "Київ");
        assert_eq!(
            normalize_region("Автономна   Республіка Крим"),
            "Автономна Республіка Крим"
        );
    }

    #[test]
    fn test_district_suffix() {
        assert_eq!(normalize_district("Одеський район"), "Одеський");
        assert_eq!(normalize_district("Одеський  РАЙОН"), "Одеський");
        assert_eq!(normalize_district("Ізмаїльський р-н"), "Ізмаїльський");
        assert_eq!(normalize_district("район"), "район");
    }

    #[test]
    fn test_normalize_opt_blank_is_absent() {
        assert_eq!(normalize_opt(None, normalize_district), None);
        assert_eq!(normalize_opt(Some("   "), normalize_district), None);
        assert_eq!(
            normalize_opt(Some("Одеський район"), normalize_district),
            Some("Одеський".to_string())
        );
    }
}
