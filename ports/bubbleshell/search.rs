/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Scale fuzzy search helpers.

use bubble_scales::{ScaleDefinition, ScaleLibrary};
use nucleo::pattern::{CaseMatching, Normalization, Pattern};
use nucleo::{Config, Matcher, Utf32Str};

/// Best score of `pattern` against the scale's label and its id read as
/// words, so `minor_pentatonic` also answers to "minor pent".
fn score_scale(
    pattern: &Pattern,
    scale: &ScaleDefinition,
    matcher: &mut Matcher,
    buf: &mut Vec<char>,
) -> Option<u32> {
    let label = pattern.score(Utf32Str::new(scale.label(), buf), matcher);
    let spaced_id = scale.id().replace('_', " ");
    let id = pattern.score(Utf32Str::new(&spaced_id, buf), matcher);
    label.max(id)
}

/// Return scale ids ranked by fuzzy match quality for `query`. Equal
/// scores keep library order.
pub fn fuzzy_match_scale_ids(library: &ScaleLibrary, query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);
    let mut matcher = Matcher::new(Config::DEFAULT);
    let mut buf = Vec::new();

    let mut ranked: Vec<(u32, &str)> = library
        .iter()
        .filter_map(|scale| {
            score_scale(&pattern, scale, &mut matcher, &mut buf).map(|score| (score, scale.id()))
        })
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().map(|(_, id)| id.to_string()).collect()
}

/// Resolve a user-supplied scale name: exact ids win, otherwise the best
/// fuzzy match.
pub fn resolve_scale_id(library: &ScaleLibrary, query: &str) -> Option<String> {
    let query = query.trim();
    if let Some(scale) = library.get(query) {
        return Some(scale.id().to_string());
    }
    fuzzy_match_scale_ids(library, query).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzzy_match_scale_ids_matches_labels() {
        let library = ScaleLibrary::builtin();
        let matches = fuzzy_match_scale_ids(&library, "harm minor");
        assert_eq!(matches.first().map(String::as_str), Some("harmonic_minor"));

        let matches = fuzzy_match_scale_ids(&library, "Minor Pent");
        assert_eq!(matches.first().map(String::as_str), Some("minor_pentatonic"));
    }

    #[test]
    fn test_fuzzy_match_scale_ids_matches_typo() {
        let library = ScaleLibrary::builtin();
        let matches = fuzzy_match_scale_ids(&library, "mixoldian");
        assert_eq!(matches.first().map(String::as_str), Some("mixolydian"));
    }

    #[test]
    fn test_resolve_prefers_exact_id() {
        let library = ScaleLibrary::builtin();
        assert_eq!(resolve_scale_id(&library, "major").as_deref(), Some("major"));
        assert_eq!(resolve_scale_id(&library, " dorian ").as_deref(), Some("dorian"));
        assert_eq!(resolve_scale_id(&library, "qqqqzz"), None);
    }

    #[test]
    fn test_fuzzy_match_scale_ids_reads_ids_as_words() {
        let library = ScaleLibrary::builtin();
        let matches = fuzzy_match_scale_ids(&library, "open fifths");
        assert_eq!(matches.first().map(String::as_str), Some("open_fifths"));
    }

    #[test]
    fn test_fuzzy_match_scale_ids_scores_label_and_id_separately() {
        let mut library = ScaleLibrary::builtin();
        library
            .merge_toml(
                r#"
                [[scale]]
                id = "hijaz"
                label = "Phrygian Dominant"
                intervals = [0, 1, 4, 5, 7, 8, 10]
                "#,
            )
            .unwrap();

        let matches = fuzzy_match_scale_ids(&library, "phryg dom");
        assert_eq!(matches, vec!["hijaz".to_string()]);
        let matches = fuzzy_match_scale_ids(&library, "hijaz");
        assert_eq!(matches.first().map(String::as_str), Some("hijaz"));
        // One atom from the id and one from the label match neither field.
        assert!(fuzzy_match_scale_ids(&library, "hijaz dominant").is_empty());
    }

    #[test]
    fn test_fuzzy_match_scale_ids_ties_keep_library_order() {
        let mut library = ScaleLibrary::builtin();
        library
            .merge_toml(
                r#"
                [[scale]]
                id = "drone_b"
                label = "Drone"
                intervals = [0]

                [[scale]]
                id = "drone_a"
                label = "Drone"
                intervals = [0]
                "#,
            )
            .unwrap();

        let matches = fuzzy_match_scale_ids(&library, "drone");
        assert_eq!(matches, vec!["drone_b".to_string(), "drone_a".to_string()]);
    }

    #[test]
    fn test_fuzzy_match_scale_ids_empty_query_returns_no_matches() {
        let library = ScaleLibrary::builtin();
        assert!(fuzzy_match_scale_ids(&library, "").is_empty());
        assert!(fuzzy_match_scale_ids(&library, "   ").is_empty());
    }
}
