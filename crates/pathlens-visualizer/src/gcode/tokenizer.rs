//! Word tokenizer for single G-code lines

use std::borrow::Cow;

/// A letter/value pair such as `X-12.5` or `G01`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    /// Uppercase address letter
    pub letter: char,
    pub value: f64,
}

impl Word {
    /// Integer G/M code number, `None` for fractional codes like `G90.1`.
    pub fn code(&self) -> Option<u32> {
        if self.value >= 0.0 && self.value.fract() == 0.0 && self.value <= u32::MAX as f64 {
            Some(self.value as u32)
        } else {
            None
        }
    }
}

/// Result of tokenizing one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizedLine {
    pub words: Vec<Word>,
    /// Tokens that were not a letter followed by a valid number
    pub malformed: Vec<String>,
}

impl TokenizedLine {
    /// Last value for `letter`, if present.
    pub fn last(&self, letter: char) -> Option<f64> {
        self.words
            .iter()
            .rev()
            .find(|w| w.letter == letter)
            .map(|w| w.value)
    }

    pub fn has(&self, letter: char) -> bool {
        self.words.iter().any(|w| w.letter == letter)
    }
}

/// Remove `;` comments and `( … )` comments from a line.
pub fn strip_comments(line: &str) -> Cow<'_, str> {
    if !line.contains([';', '(']) {
        return Cow::Borrowed(line);
    }

    let mut out = String::with_capacity(line.len());
    let mut depth = 0usize;
    for c in line.chars() {
        match c {
            ';' if depth == 0 => break,
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    Cow::Owned(out)
}

/// Split a line into address words.
///
/// Comments are removed first and a leading `N` line-number word is dropped.
/// Letters are case-insensitive and whitespace between a letter and its
/// number is allowed (`G 1`, `x 10`). `%` program delimiters are ignored.
pub fn tokenize(line: &str) -> TokenizedLine {
    let cleaned = strip_comments(line);
    let mut result = TokenizedLine::default();
    let mut chars = cleaned.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() || c == '%' {
            chars.next();
            continue;
        }

        if c.is_ascii_alphabetic() {
            chars.next();
            let letter = c.to_ascii_uppercase();
            while chars.peek().is_some_and(|n| *n == ' ' || *n == '\t') {
                chars.next();
            }
            let mut number = String::new();
            while let Some(&n) = chars.peek() {
                if n.is_ascii_digit() || n == '.' || n == '-' || n == '+' {
                    number.push(n);
                    chars.next();
                } else {
                    break;
                }
            }
            match number.parse::<f64>() {
                Ok(value) if value.is_finite() => result.words.push(Word { letter, value }),
                _ => result.malformed.push(format!("{}{}", letter, number)),
            }
            continue;
        }

        let mut junk = String::new();
        while let Some(&n) = chars.peek() {
            if n.is_whitespace() || n.is_ascii_alphabetic() {
                break;
            }
            junk.push(n);
            chars.next();
        }
        result.malformed.push(junk);
    }

    if result.words.first().is_some_and(|w| w.letter == 'N') {
        result.words.remove(0);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("G1 X10 ; move"), "G1 X10 ");
        assert_eq!(strip_comments("G1 (feed) X10"), "G1  X10");
        assert_eq!(strip_comments("G0 X1"), "G0 X1");
    }

    #[test]
    fn test_tokenize_compact_words() {
        let line = tokenize("N10 g01x10.5Y-3 z+.5");
        assert_eq!(
            line.words,
            vec![
                Word { letter: 'G', value: 1.0 },
                Word { letter: 'X', value: 10.5 },
                Word { letter: 'Y', value: -3.0 },
                Word { letter: 'Z', value: 0.5 },
            ]
        );
        assert!(line.malformed.is_empty());
    }

    #[test]
    fn test_tokenize_malformed() {
        let line = tokenize("G1 X1.2.3 Y5 #7");
        assert_eq!(line.last('Y'), Some(5.0));
        assert!(!line.has('X'));
        assert_eq!(line.malformed, vec!["X1.2.3".to_string(), "#7".to_string()]);
    }

    #[test]
    fn test_word_code() {
        assert_eq!(Word { letter: 'G', value: 2.0 }.code(), Some(2));
        assert_eq!(Word { letter: 'G', value: 90.1 }.code(), None);
    }

    #[test]
    fn test_only_leading_line_number_dropped() {
        let line = tokenize("N5 G0 X1");
        assert_eq!(line.words.len(), 2);
        assert_eq!(line.words[0].letter, 'G');
    }
}
