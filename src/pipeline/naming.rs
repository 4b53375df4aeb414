//! Output file naming.
//!
//! Every produced file is named `NNN_<stem><ext>` where `NNN` is the
//! reference's zero-padded position in the reference list. The stem comes
//! from a free-text label or a linked file's name and is sanitized so it is
//! safe on every common filesystem.

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that are not allowed in file names on Windows and are
/// awkward everywhere else.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

static RE_PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(.*?\)\s*").unwrap());

/// Turn `name` into a file stem of at most `max_length` characters.
///
/// Rules, in order:
/// 1. drop parenthesized segments together with the whitespace around them
/// 2. drop `<>:"/\|?*`
/// 3. trim surrounding whitespace
/// 4. replace spaces with underscores
/// 5. truncate to `max_length` characters (not bytes)
///
/// The result may be empty when the label consists only of removed parts.
pub fn sanitize_filename(name: &str, max_length: usize) -> String {
    let without_parens = RE_PARENTHESIZED.replace_all(name, "");
    let kept: String = without_parens
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect();
    kept.trim()
        .replace(' ', "_")
        .chars()
        .take(max_length)
        .collect()
}

/// `NNN_` prefix for a 1-indexed sequence number.
pub fn sequence_prefix(sequence: usize) -> String {
    format!("{sequence:03}_")
}

/// Full output file name: sequence prefix, sanitized stem and extension.
///
/// `extension` is appended verbatim and should include its leading dot
/// (or be empty).
pub fn output_filename(sequence: usize, stem: &str, max_length: usize, extension: &str) -> String {
    format!(
        "{}{}{}",
        sequence_prefix(sequence),
        sanitize_filename(stem, max_length),
        extension
    )
}

/// Split a file name at its extension: `("Spec v2", ".docx")`.
///
/// Uses the same rule as [`crate::pipeline::classify`]: a leading dot does
/// not start an extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(dot) => name.split_at(leading + dot),
        None => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_parenthesized_year() {
        assert_eq!(sanitize_filename("Annual Report (2023)", 100), "Annual_Report");
    }

    #[test]
    fn removes_forbidden_characters() {
        let s = sanitize_filename(r#"a<b>c:d"e/f\g|h?i*j"#, 100);
        assert_eq!(s, "abcdefghij");
    }

    #[test]
    fn parenthesized_middle_joins_words() {
        // whitespace on both sides of the group goes with it
        assert_eq!(sanitize_filename("Norsk (NKPK) kodeverk", 100), "Norskkodeverk");
    }

    #[test]
    fn truncates_by_characters() {
        let s = sanitize_filename("Forskrift om pasientjournal og særlige tiltak", 20);
        assert_eq!(s.chars().count(), 20);
        assert_eq!(s, "Forskrift_om_pasient");

        let s = sanitize_filename("øøøøøøøøøøøø", 10);
        assert_eq!(s, "øøøøøøøøøø");
    }

    #[test]
    fn sanitized_names_respect_invariants() {
        let labels = [
            "",
            "   ",
            "(only parens)",
            "A very long label that keeps going and going well past any reasonable limit for names",
            "Q&A: what/why?",
            "Tab\tand  double  spaces",
        ];
        for label in labels {
            for max in [10, 50, 100] {
                let s = sanitize_filename(label, max);
                assert!(s.chars().count() <= max, "{label:?} -> {s:?}");
                assert!(!s.contains(FORBIDDEN_CHARS), "{label:?} -> {s:?}");
            }
        }
    }

    #[test]
    fn output_filename_pads_sequence() {
        assert_eq!(
            output_filename(5, "Annual Report (2023)", 100, ".html"),
            "005_Annual_Report.html"
        );
        assert_eq!(output_filename(123, "x", 100, ""), "123_x");
        assert_eq!(output_filename(1234, "x", 100, ".pdf"), "1234_x.pdf");
    }

    #[test]
    fn split_extension_rules() {
        assert_eq!(split_extension("Spec v2.docx"), ("Spec v2", ".docx"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }
}
