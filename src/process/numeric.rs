use crate::config::NumericRules;

/// Parses locale-noisy numeric text ("3,500 ريال", "١٢٫٥") into a number.
pub struct NumericNormalizer {
    tokens: Vec<String>,
}

impl NumericNormalizer {
    pub fn new(rules: &NumericRules) -> Self {
        // longest first: "ر.س" must go before its dot can survive stripping
        let mut tokens: Vec<String> = rules
            .currency_tokens
            .iter()
            .filter(|t| !t.is_empty())
            .cloned()
            .collect();
        tokens.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        Self { tokens }
    }

    /// `None` is the "not-a-number" result: the caller drops the row.
    pub fn parse(&self, raw: &str) -> Option<f64> {
        let mut s: String = raw.chars().map(fold_digit).collect();
        for token in &self.tokens {
            if s.contains(token.as_str()) {
                s = s.replace(token.as_str(), "");
            }
        }
        let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
        if digits.is_empty() || !digits.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

/// Arabic-Indic and Extended Arabic-Indic digits → ASCII, `٫` → `.`.
fn fold_digit(c: char) -> char {
    match c {
        '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
        '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
        '\u{066B}' => '.',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Rules;

    fn normalizer() -> NumericNormalizer {
        NumericNormalizer::new(&Rules::builtin().numeric)
    }

    #[test]
    fn strips_separators_and_currency() {
        let n = normalizer();
        assert_eq!(n.parse("3,500 ريال"), Some(3500.0));
        assert_eq!(n.parse("12.50"), Some(12.5));
        assert_eq!(n.parse("1٬250٬000 ر.س"), Some(1_250_000.0));
        assert_eq!(n.parse("SAR 750,000"), Some(750_000.0));
        assert_eq!(n.parse(" 420 "), Some(420.0));
    }

    #[test]
    fn arabic_indic_digits() {
        let n = normalizer();
        assert_eq!(n.parse("٣٥٠٠٠٠"), Some(350_000.0));
        assert_eq!(n.parse("١٢٫٥"), Some(12.5));
        assert_eq!(n.parse("۴۵۰"), Some(450.0));
    }

    #[test]
    fn garbage_is_not_a_number() {
        let n = normalizer();
        assert_eq!(n.parse(""), None);
        assert_eq!(n.parse("غير متوفر"), None);
        assert_eq!(n.parse("."), None);
        assert_eq!(n.parse("1.2.3"), None);
    }
}
