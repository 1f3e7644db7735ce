//! Version-indicator scoring for disambiguating same-release-group
//! recordings that tie on the preference rules in §4.11 step 9 (§4.13).

const INDICATORS: &[&str] = &[
    "instrumental",
    "inst",
    "karaoke",
    "off vocal",
    "live",
    "acoustic",
    "remix",
    "extended",
    "radio edit",
    "tv size",
    "tv ver",
    "movie ver",
    "full ver",
    "album mix",
    "album ver",
    "single mix",
    "single ver",
    "original mix",
    "remaster",
    "remastered",
    "bonus track",
    "short ver",
    "long ver",
    "edit",
    "demo",
];

/// Score how well `title` matches `filename_stem` on version indicators.
///
/// `+100` per indicator present in both; `-50` per indicator present in the
/// filename but absent from the title; `-100` per indicator present in the
/// title but absent from the filename; `+10` when neither carries any
/// indicator at all.
pub fn score(filename_stem: &str, title: &str) -> i32 {
    let filename_lower = filename_stem.to_lowercase();
    let title_lower = title.to_lowercase();

    let in_filename: Vec<&str> = INDICATORS.iter().copied().filter(|i| filename_lower.contains(i)).collect();
    let in_title: Vec<&str> = INDICATORS.iter().copied().filter(|i| title_lower.contains(i)).collect();

    if in_filename.is_empty() && in_title.is_empty() {
        return 10;
    }

    let mut total = 0;
    for indicator in INDICATORS {
        let in_f = in_filename.contains(indicator);
        let in_t = in_title.contains(indicator);
        total += match (in_f, in_t) {
            (true, true) => 100,
            (true, false) => -50,
            (false, true) => -100,
            (false, false) => 0,
        };
    }
    total
}

/// Pick the recording title with the highest version-match score against
/// `filename_stem`. Ties keep the first (registry order, §4.13).
pub fn best_match<'a>(filename_stem: &str, titles: &[&'a str]) -> Option<&'a str> {
    titles
        .iter()
        .enumerate()
        .max_by_key(|(idx, title)| (score(filename_stem, title), std::cmp::Reverse(*idx)))
        .map(|(_, title)| *title)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_indicator_free_scores_ten() {
        assert_eq!(score("Bohemian Rhapsody", "Bohemian Rhapsody"), 10);
    }

    #[test]
    fn test_matching_indicator_scores_high() {
        assert_eq!(score("Song (Live)", "Song (Live)"), 100);
    }

    #[test]
    fn test_indicator_only_in_filename_penalized() {
        assert_eq!(score("Song (Acoustic)", "Song"), -50);
    }

    #[test]
    fn test_indicator_only_in_title_penalized_harder() {
        assert_eq!(score("Song", "Song (Remastered)"), -100);
    }

    #[test]
    fn test_best_match_prefers_matching_indicator() {
        let titles = vec!["Song", "Song (Live)", "Song (Remix)"];
        assert_eq!(best_match("Song (Live) - Band", &titles), Some("Song (Live)"));
    }

    #[test]
    fn test_best_match_ties_keep_first() {
        let titles = vec!["Track One", "Track Two"];
        assert_eq!(best_match("Unrelated Filename", &titles), Some("Track One"));
    }
}
