//! Title slugs for artifact filenames
//!
//! A slug never contains `_`, which separates the fields of an artifact
//! filename (`{slug}_{song-identifier}_{timestamp}.ext`).

/// Convert a title into a filename slug
///
/// Lowercases ASCII alphanumerics and collapses every other run of
/// characters into a single `-`. Leading and trailing separators are
/// trimmed. Returns an empty string when the title has no ASCII
/// alphanumerics at all.
///
/// # Examples
///
/// ```
/// use songforge_common::slugify;
///
/// assert_eq!(slugify("Psalm 23: The Lord's Prayer"), "psalm-23-the-lord-s-prayer");
/// assert_eq!(slugify("  --  "), "");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic_title() {
        assert_eq!(slugify("Morning Hymn"), "morning-hymn");
    }

    #[test]
    fn test_slugify_collapses_punctuation_runs() {
        assert_eq!(slugify("John 3:16 -- (Acoustic)"), "john-3-16-acoustic");
    }

    #[test]
    fn test_slugify_trims_separators() {
        assert_eq!(slugify("  !Hello World!  "), "hello-world");
    }

    #[test]
    fn test_slugify_never_emits_underscore() {
        assert_eq!(slugify("snake_case_title"), "snake-case-title");
    }

    #[test]
    fn test_slugify_drops_non_ascii() {
        assert_eq!(slugify("Ésaïe 40"), "sa-e-40");
    }

    #[test]
    fn test_slugify_empty_when_no_alphanumerics() {
        assert_eq!(slugify("   "), "");
        assert_eq!(slugify("✝✝✝"), "");
    }
}
