//! URL slugs for category names and stored file names.

use once_cell::sync::Lazy;
use regex::Regex;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Lowercase `input`, collapse every run of non-alphanumeric characters into
/// a single `-`, and strip leading/trailing dashes.
///
/// Accented Latin letters are folded to ASCII first so "Café" becomes "cafe".
pub fn create_slug(input: &str) -> String {
    let folded: String = input.to_lowercase().chars().map(fold_latin).collect();
    NON_SLUG_CHARS
        .replace_all(&folded, "-")
        .trim_matches('-')
        .to_string()
}

fn fold_latin(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_slug() {
        assert_eq!(create_slug("Rust Programming"), "rust-programming");
    }

    #[test]
    fn test_collapses_punctuation() {
        assert_eq!(create_slug("  Hello,   World!! "), "hello-world");
    }

    #[test]
    fn test_folds_accents() {
        assert_eq!(create_slug("Café Crème"), "cafe-creme");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(create_slug("!!!"), "");
    }
}
