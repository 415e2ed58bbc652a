// src/pipeline.rs - Pure offline transform: AND-filters -> text match -> sort

use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::fuzzy;

/// Filter predicate over items, stored per key in the controller.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Total order over items. Absence means source order.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// Maps an item to the ordered strings it should be matched against.
pub type Projection<T> = Arc<dyn Fn(&T) -> Vec<String> + Send + Sync>;

/// Text-matching knobs, a projection of the controller config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextSettings {
    pub case_sensitive: bool,
    pub fuzzy_enabled: bool,
    pub fuzzy_threshold: f64,
}

/// Apply the full offline pipeline to `items`.
///
/// Order of application: (1) all filter predicates, combined with AND;
/// (2) text matching against the projected fields (term-substring by default,
/// fuzzy scoring above the threshold when enabled); (3) the comparator if
/// present, otherwise source order for exact matching or score-descending
/// order for fuzzy matching.
///
/// Total over its inputs: never fails, never panics on caller data. An absent
/// projection disables the text stage entirely.
pub(crate) fn apply<T>(
    items: &[T],
    filters: &HashMap<String, Predicate<T>>,
    query: &str,
    text: TextSettings,
    projection: Option<&Projection<T>>,
    comparator: Option<&Comparator<T>>,
) -> Vec<T>
where
    T: Clone + Send + Sync,
{
    let filtered: Vec<&T> = items
        .iter()
        .filter(|item| filters.values().all(|pred| pred(item)))
        .collect();

    let mut out: Vec<T> = match (projection, query.trim()) {
        (None, _) | (_, "") => filtered.into_iter().cloned().collect(),
        (Some(project), trimmed) if text.fuzzy_enabled => {
            // Rayon's indexed collect keeps source order, and the stable
            // sort below keeps it for equal scores.
            let mut scored: Vec<(T, f64)> = filtered
                .par_iter()
                .filter_map(|item| {
                    let fields = project(item);
                    fuzzy::match_fields(trimmed, &fields, text.case_sensitive)
                        .filter(|m| m.score >= text.fuzzy_threshold)
                        .map(|m| ((*item).clone(), m.score))
                })
                .collect();
            if comparator.is_none() {
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            }
            scored.into_iter().map(|(item, _)| item).collect()
        }
        (Some(project), trimmed) => {
            let terms: Vec<&str> = trimmed.split_whitespace().collect();
            filtered
                .into_iter()
                .filter(|item| {
                    let fields = project(item);
                    terms
                        .iter()
                        .all(|term| fields.iter().any(|f| contains(f, term, text.case_sensitive)))
                })
                .cloned()
                .collect()
        }
    };

    if let Some(cmp) = comparator {
        out.sort_by(|a, b| cmp(a, b));
    }
    out
}

// Substring check under the active case policy. Every whitespace-separated
// term of the query must land in some field for an item to survive.
fn contains(field: &str, term: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        field.contains(term)
    } else {
        field.to_lowercase().contains(&term.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(fuzzy_enabled: bool) -> TextSettings {
        TextSettings {
            case_sensitive: false,
            fuzzy_enabled,
            fuzzy_threshold: 0.3,
        }
    }

    fn name_projection() -> Projection<String> {
        Arc::new(|s: &String| vec![s.clone()])
    }

    fn items(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filters_combine_with_and() {
        let mut filters: HashMap<String, Predicate<String>> = HashMap::new();
        filters.insert(
            "starts_a".to_string(),
            Arc::new(|s: &String| s.starts_with('a')),
        );
        filters.insert(
            "len_5".to_string(),
            Arc::new(|s: &String| s.len() == 5),
        );

        let out = apply(
            &items(&["apple", "avoid", "angle", "ant", "bread"]),
            &filters,
            "",
            settings(false),
            None,
            None,
        );
        assert_eq!(out, items(&["apple", "avoid", "angle"]));
    }

    #[test]
    fn test_exact_match_preserves_source_order() {
        let projection = name_projection();
        let out = apply(
            &items(&["Banana", "Apple", "Pineapple"]),
            &HashMap::new(),
            "app",
            settings(false),
            Some(&projection),
            None,
        );
        assert_eq!(out, items(&["Apple", "Pineapple"]));
    }

    #[test]
    fn test_exact_match_all_terms_must_hit() {
        let projection: Projection<(String, String)> =
            Arc::new(|(name, kind): &(String, String)| vec![name.clone(), kind.clone()]);
        let rows = vec![
            ("Apple".to_string(), "fruit".to_string()),
            ("Apple".to_string(), "company".to_string()),
        ];

        let out = apply(
            &rows,
            &HashMap::new(),
            "app fruit",
            settings(false),
            Some(&projection),
            None,
        );
        assert_eq!(out, vec![("Apple".to_string(), "fruit".to_string())]);
    }

    #[test]
    fn test_fuzzy_orders_by_score_descending() {
        let projection = name_projection();
        // "applet" contains the query contiguously (1.0), the others only as
        // increasingly spread-out subsequences
        let out = apply(
            &items(&["axpxpxle", "applet", "appxle"]),
            &HashMap::new(),
            "apple",
            settings(true),
            Some(&projection),
            None,
        );
        assert_eq!(out, items(&["applet", "appxle", "axpxpxle"]));
    }

    #[test]
    fn test_fuzzy_threshold_discards_weak_matches() {
        let projection = name_projection();
        let strict = TextSettings {
            case_sensitive: false,
            fuzzy_enabled: true,
            fuzzy_threshold: 0.95,
        };
        let out = apply(
            &items(&["applet", "axpxpxle"]),
            &HashMap::new(),
            "apple",
            strict,
            Some(&projection),
            None,
        );
        assert_eq!(out, items(&["applet"]));
    }

    #[test]
    fn test_comparator_overrides_fuzzy_order() {
        let projection = name_projection();
        let cmp: Comparator<String> = Arc::new(|a, b| a.cmp(b));
        let out = apply(
            &items(&["applet", "appxle", "axpxpxle"]),
            &HashMap::new(),
            "apple",
            settings(true),
            Some(&projection),
            Some(&cmp),
        );
        // Alphabetical, not score-descending
        assert_eq!(out, items(&["applet", "appxle", "axpxpxle"]));
    }

    #[test]
    fn test_absent_projection_passes_text_stage_through() {
        let out = apply(
            &items(&["Apple", "Banana"]),
            &HashMap::new(),
            "zzz",
            settings(false),
            None,
            None,
        );
        assert_eq!(out, items(&["Apple", "Banana"]));
    }

    #[test]
    fn test_empty_query_passes_all() {
        let projection = name_projection();
        let out = apply(
            &items(&["Apple", "Banana"]),
            &HashMap::new(),
            "   ",
            settings(false),
            Some(&projection),
            None,
        );
        assert_eq!(out, items(&["Apple", "Banana"]));
    }

    #[test]
    fn test_case_sensitivity() {
        let projection = name_projection();
        let sensitive = TextSettings {
            case_sensitive: true,
            fuzzy_enabled: false,
            fuzzy_threshold: 0.3,
        };
        let out = apply(
            &items(&["Apple", "apple"]),
            &HashMap::new(),
            "App",
            sensitive,
            Some(&projection),
            None,
        );
        assert_eq!(out, items(&["Apple"]));
    }
}
