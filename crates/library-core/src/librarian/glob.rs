//! Hand-rolled `/`-segment glob matcher for librarian topic scopes.
//!
//! `*` matches exactly one segment, `**` matches zero or more segments, any
//! other segment matches itself exactly. No external glob crate pulled in
//! for this one need, matching the teacher's practice of writing small
//! focused parsers (e.g. its FTS5 query sanitizer) rather than reaching for
//! a crate for a narrow, fully-specified job.

pub fn matches(pattern: &str, topic: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').collect();
    let topic: Vec<&str> = topic.split('/').collect();
    match_segments(&pattern, &topic)
}

fn match_segments(pattern: &[&str], topic: &[&str]) -> bool {
    match pattern.split_first() {
        None => topic.is_empty(),
        Some((&"**", rest)) => {
            if match_segments(rest, topic) {
                return true;
            }
            match topic.split_first() {
                Some((_, topic_rest)) => match_segments(pattern, topic_rest),
                None => false,
            }
        }
        Some((&seg, rest)) => match topic.split_first() {
            Some((&t, topic_rest)) if seg == "*" || seg == t => match_segments(rest, topic_rest),
            _ => false,
        },
    }
}

/// Whether any pattern in `globs` matches `topic`.
pub fn any_matches(globs: &[String], topic: &str) -> bool {
    globs.iter().any(|g| matches(g, topic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_segment_matches_exactly() {
        assert!(matches("rust", "rust"));
        assert!(!matches("rust", "rust/async"));
    }

    #[test]
    fn star_matches_single_segment() {
        assert!(matches("rust/*", "rust/async"));
        assert!(!matches("rust/*", "rust/async/tokio"));
    }

    #[test]
    fn double_star_matches_zero_or_more() {
        assert!(matches("rust/**", "rust"));
        assert!(matches("rust/**", "rust/async"));
        assert!(matches("rust/**", "rust/async/tokio"));
        assert!(matches("**", "anything/at/all"));
    }

    #[test]
    fn any_matches_checks_all_globs() {
        let globs = vec!["python/*".to_string(), "rust/**".to_string()];
        assert!(any_matches(&globs, "rust/async/tokio"));
        assert!(!any_matches(&globs, "weather"));
    }
}
