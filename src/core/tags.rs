//! Tag normalisation and fuzzy tag overlap.
//!
//! Tags often carry a decorative prefix (an emoji, say), so two tags are
//! considered to match when either one contains the other after case-folding
//! and trimming.

/// Case-fold and trim a tag
#[inline]
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Normalise a tag list, dropping tags that are blank after trimming
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    tags.iter()
        .map(|t| normalize_tag(t.as_ref()))
        .filter(|t| !t.is_empty())
        .collect()
}

/// Bidirectional substring match between two normalised tags
#[inline]
pub fn tags_match(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Whether any tag in `left` matches any tag in `right`
pub fn any_overlap(left: &[String], right: &[String]) -> bool {
    left.iter().any(|l| right.iter().any(|r| tags_match(l, r)))
}

/// Number of tags in `left` that match at least one tag in `right`
pub fn count_matching(left: &[String], right: &[String]) -> usize {
    left.iter()
        .filter(|l| right.iter().any(|r| tags_match(l, r)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_blank_tags() {
        let tags = normalize_tags(&["  Gaming ", "", "   ", "MUSIC"]);
        assert_eq!(tags, vec!["gaming", "music"]);
    }

    #[test]
    fn test_match_ignores_decorative_prefix() {
        let decorated = normalize_tag("🎮 Gaming");
        let plain = normalize_tag("gaming");
        assert!(tags_match(&decorated, &plain));
        assert!(tags_match(&plain, &decorated));
        assert!(!tags_match(&plain, "music"));
    }

    #[test]
    fn test_count_matching_counts_left_side() {
        let mine = normalize_tags(&["gaming", "music", "cooking"]);
        let theirs = normalize_tags(&["🎮 Gaming", "🎨 Art", "🎵 Music"]);
        assert_eq!(count_matching(&mine, &theirs), 2);
        assert!(any_overlap(&mine, &theirs));
        assert!(!any_overlap(&mine, &normalize_tags(&["hiking"])));
    }
}
