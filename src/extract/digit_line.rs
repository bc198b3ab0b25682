//! Digit-line (linha digitável) pattern matching
//!
//! A boleto's textual payment identifier appears either in the punctuated
//! canonical layout or as a bare 47/48-digit run. Patterns are tried in
//! priority order; the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Canonical formatted layout with literal separators:
/// `ddddd.ddddd ddddd.dddddd ddddd.dddddd d dddddddddddddd`
static CANONICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{5}\.\d{5}\s\d{5}\.\d{6}\s\d{5}\.\d{6}\s\d\s\d{14}").unwrap()
});

static DIGITS_47: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{47}\b").unwrap());
static DIGITS_48: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{48}\b").unwrap());

/// A matched digit line, in its original form and digits-only normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitLineMatch {
    pub formatted: String,
    pub digits_only: String,
}

/// Search page text for a digit line.
///
/// Priority: canonical formatted pattern, then a standalone 47-digit run,
/// then a standalone 48-digit run, over the digit-collapsed text.
pub fn find_digit_line(text: &str) -> Option<DigitLineMatch> {
    if let Some(m) = CANONICAL.find(text) {
        let formatted = m.as_str().to_string();
        let digits_only = formatted.chars().filter(|c| c.is_ascii_digit()).collect();
        return Some(DigitLineMatch {
            formatted,
            digits_only,
        });
    }

    // Collapse every non-digit to a separator so bare runs become standalone.
    let digits: String = text
        .chars()
        .map(|c| if c.is_ascii_digit() { c } else { ' ' })
        .collect();

    for pattern in [&*DIGITS_47, &*DIGITS_48] {
        if let Some(m) = pattern.find(&digits) {
            let run = m.as_str().to_string();
            return Some(DigitLineMatch {
                formatted: run.clone(),
                digits_only: run,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL_SAMPLE: &str = "12345.67890 12345.678901 12345.678901 1 23456789012345";

    #[test]
    fn test_canonical_pattern() {
        let text = format!("Pague até o vencimento: {} obrigado", CANONICAL_SAMPLE);
        let m = find_digit_line(&text).unwrap();
        assert_eq!(m.formatted, CANONICAL_SAMPLE);
        assert_eq!(m.digits_only.len(), 47);
        assert!(m.digits_only.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_bare_47_digit_run() {
        let run = "1".repeat(47);
        let text = format!("codigo: {} fim", run);
        let m = find_digit_line(&text).unwrap();
        assert_eq!(m.formatted, run);
        assert_eq!(m.digits_only, run);
    }

    #[test]
    fn test_bare_48_digit_run() {
        let run = "8".repeat(48);
        let m = find_digit_line(&run).unwrap();
        assert_eq!(m.digits_only.len(), 48);
    }

    #[test]
    fn test_run_split_by_punctuation_is_joinable_only_when_contiguous() {
        // 47 digits broken by a letter: the two halves are separate runs,
        // neither 47 long, so there is no match.
        let text = format!("{}x{}", "1".repeat(20), "2".repeat(27));
        assert!(find_digit_line(&text).is_none());
    }

    #[test]
    fn test_canonical_wins_over_bare_run() {
        let bare = "9".repeat(47);
        let text = format!("{} e tambem {}", bare, CANONICAL_SAMPLE);
        let m = find_digit_line(&text).unwrap();
        assert_eq!(m.formatted, CANONICAL_SAMPLE);
    }

    #[test]
    fn test_47_wins_over_48() {
        let text = format!("{} {}", "4".repeat(48), "7".repeat(47));
        let m = find_digit_line(&text).unwrap();
        assert_eq!(m.digits_only.len(), 47);
    }

    #[test]
    fn test_no_match_on_short_runs() {
        assert!(find_digit_line("telefone 11 99999-9999 CNPJ 12.345.678/0001-90").is_none());
        assert!(find_digit_line("").is_none());
        // 46 and 49 digit runs are not payment codes.
        assert!(find_digit_line(&"5".repeat(46)).is_none());
        assert!(find_digit_line(&"5".repeat(49)).is_none());
    }
}
