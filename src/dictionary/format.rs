//! Display formatting for numeric term values.
//!
//! Numeric dictionaries keep a pattern (`"0000000000"`, `"0.00"`, `"#,##0.##"`)
//! and an optional locale. Both are only used to turn primitives back into
//! display strings and as a parse fallback; ordering is always numeric.

use serde::{Deserialize, Serialize};

/// Default pattern of 32-bit numeric lists.
pub const DEFAULT_INT_PATTERN: &str = "0000000000";
/// Default pattern of 64-bit integer lists.
pub const DEFAULT_LONG_PATTERN: &str = "00000000000000000000";
/// Default pattern of floating point lists.
pub const DEFAULT_FLOAT_PATTERN: &str = "0000000000.00000";

/// Separators used by a locale when reading or writing numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberLocale {
    /// Character between the integer and the fractional part.
    pub decimal_separator: char,
    /// Character between digit groups, if the locale groups digits.
    pub grouping_separator: Option<char>,
}

impl NumberLocale {
    /// Create a locale from its separators.
    pub fn new(decimal_separator: char, grouping_separator: Option<char>) -> Self {
        NumberLocale {
            decimal_separator,
            grouping_separator,
        }
    }

    /// The locale-independent representation (`1,234.5`).
    pub fn invariant() -> Self {
        NumberLocale::new('.', Some(','))
    }

    /// Rewrite a locale-formatted number into the invariant form accepted by
    /// `str::parse`.
    pub fn normalize(&self, s: &str) -> String {
        s.trim()
            .chars()
            .filter(|c| Some(*c) != self.grouping_separator && !c.is_whitespace())
            .map(|c| if c == self.decimal_separator { '.' } else { c })
            .collect()
    }
}

impl Default for NumberLocale {
    fn default() -> Self {
        NumberLocale::invariant()
    }
}

/// Formatting configuration of a numeric term list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NumberFormat {
    /// Display pattern; `None` prints the shortest natural representation.
    pub pattern: Option<String>,
    /// Locale used for display and as the second parse attempt.
    pub locale: Option<NumberLocale>,
}

#[derive(Debug, Clone, Copy)]
struct Pattern {
    min_int: usize,
    min_frac: usize,
    max_frac: usize,
    grouping: bool,
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let (int_part, frac_part) = pattern.split_once('.').unwrap_or((pattern, ""));
        let min_frac = frac_part.chars().filter(|c| *c == '0').count();
        Pattern {
            min_int: int_part.chars().filter(|c| *c == '0').count(),
            min_frac,
            max_frac: min_frac + frac_part.chars().filter(|c| *c == '#').count(),
            grouping: int_part.contains(','),
        }
    }
}

impl NumberFormat {
    /// Create a format from a pattern.
    pub fn new<S: Into<String>>(pattern: S) -> Self {
        NumberFormat {
            pattern: Some(pattern.into()),
            locale: None,
        }
    }

    /// A format that prints values without padding.
    pub fn plain() -> Self {
        NumberFormat::default()
    }

    /// Attach a locale.
    pub fn with_locale(mut self, locale: NumberLocale) -> Self {
        self.locale = Some(locale);
        self
    }

    fn separators(&self) -> (char, char) {
        let locale = self.locale.clone().unwrap_or_default();
        (
            locale.decimal_separator,
            locale.grouping_separator.unwrap_or(','),
        )
    }

    /// Format an integral value.
    pub fn format_integer(&self, value: i64) -> String {
        let Some(pattern) = self.pattern.as_deref() else {
            return value.to_string();
        };
        let pattern = Pattern::parse(pattern);
        let digits = value.unsigned_abs().to_string();
        let frac = "0".repeat(pattern.min_frac);
        self.assemble(&pattern, value < 0, &digits, &frac)
    }

    /// Format a floating point value.
    pub fn format_float(&self, value: f64) -> String {
        let Some(pattern) = self.pattern.as_deref() else {
            return value.to_string();
        };
        if !value.is_finite() {
            return value.to_string();
        }
        let pattern = Pattern::parse(pattern);
        let rendered = format!("{:.*}", pattern.max_frac, value.abs());
        let (int_digits, frac_digits) = rendered.split_once('.').unwrap_or((&rendered, ""));

        let mut frac = frac_digits.to_string();
        while frac.len() > pattern.min_frac && frac.ends_with('0') {
            frac.pop();
        }

        let is_zero = rendered.chars().all(|c| c == '0' || c == '.');
        self.assemble(&pattern, value < 0.0 && !is_zero, int_digits, &frac)
    }

    fn assemble(&self, pattern: &Pattern, negative: bool, int_digits: &str, frac: &str) -> String {
        let (decimal_separator, grouping_separator) = self.separators();

        let mut int_part = String::with_capacity(pattern.min_int.max(int_digits.len()));
        for _ in int_digits.len()..pattern.min_int {
            int_part.push('0');
        }
        int_part.push_str(int_digits);
        if pattern.grouping {
            int_part = group_digits(&int_part, grouping_separator);
        }

        let mut out = String::with_capacity(int_part.len() + frac.len() + 2);
        if negative {
            out.push('-');
        }
        out.push_str(&int_part);
        if !frac.is_empty() {
            out.push(decimal_separator);
            out.push_str(frac);
        }
        out
    }
}

fn group_digits(digits: &str, separator: char) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

const SHIFT_START_LONG: u32 = 0x20;
const SHIFT_START_INT: u32 = 0x60;

/// Whether `s` has the shape of a prefix coded numeric token (7 bits per
/// character after a leading shift marker) of the given width.
///
/// Such tokens come from indexes that stored numbers in their trie encoding
/// rather than as formatted strings; they cannot be read by a term list.
pub fn looks_prefix_coded(s: &str, bits: u32) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let (start, max_shift) = if bits == 64 {
        (SHIFT_START_LONG, 63)
    } else {
        (SHIFT_START_INT, 31)
    };
    let code = first as u32;
    if code < start || code > start + max_shift {
        return false;
    }
    let shift = code - start;
    let expected = ((bits - 1 - shift) / 7 + 1) as usize;

    let mut len = 0;
    for c in chars {
        if c as u32 >= 0x80 {
            return false;
        }
        len += 1;
    }
    len == expected
}
