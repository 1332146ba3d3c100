//! Numeric term lists.
//!
//! Terms arrive in the lexicographic order of their string form. For zero
//! padded values this is numeric order except for negatives, which come first
//! and in descending order (`-0001` sorts before `-0005`). Sealing reverses
//! that negative prefix in place; any input that is still not ascending
//! afterwards is sorted outright.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::dictionary::format::{NumberFormat, looks_prefix_coded};
use crate::dictionary::value::RawValue;
use crate::dictionary::TermValues;
use crate::error::{DrilldownError, Result};

/// Primitive types a [`TermNumberList`] can hold.
pub trait NumericTerm:
    Copy + Default + PartialOrd + FromStr + fmt::Debug + Send + Sync + 'static
{
    /// Bit width, used to recognise prefix coded tokens of the same width.
    const BITS: u32;

    /// Short type name used in error messages.
    const NAME: &'static str;

    /// Whether the value is strictly below zero.
    fn is_negative(self) -> bool;

    /// Canonical representative (folds `-0.0` into `0.0`).
    fn canonical(self) -> Self;

    /// Total order over the type.
    fn total_cmp(&self, other: &Self) -> Ordering;

    /// Render through a number format.
    fn format_with(self, format: &NumberFormat) -> String;

    /// Convert to a raw value.
    fn to_raw(self) -> RawValue;

    /// Convert from a raw value when the variant is compatible.
    fn from_raw(value: &RawValue) -> Option<Self>;
}

macro_rules! impl_integer_term {
    ($ty:ty, $bits:expr, $name:expr, $variant:ident) => {
        impl NumericTerm for $ty {
            const BITS: u32 = $bits;
            const NAME: &'static str = $name;

            fn is_negative(self) -> bool {
                self < 0
            }

            fn canonical(self) -> Self {
                self
            }

            fn total_cmp(&self, other: &Self) -> Ordering {
                self.cmp(other)
            }

            fn format_with(self, format: &NumberFormat) -> String {
                format.format_integer(i64::from(self))
            }

            fn to_raw(self) -> RawValue {
                RawValue::$variant(self)
            }

            fn from_raw(value: &RawValue) -> Option<Self> {
                value.as_i64().and_then(|v| <$ty>::try_from(v).ok())
            }
        }
    };
}

macro_rules! impl_float_term {
    ($ty:ty, $bits:expr, $name:expr, $variant:ident) => {
        impl NumericTerm for $ty {
            const BITS: u32 = $bits;
            const NAME: &'static str = $name;

            fn is_negative(self) -> bool {
                self < 0.0
            }

            fn canonical(self) -> Self {
                if self == 0.0 { 0.0 } else { self }
            }

            fn total_cmp(&self, other: &Self) -> Ordering {
                <$ty>::total_cmp(self, other)
            }

            fn format_with(self, format: &NumberFormat) -> String {
                format.format_float(f64::from(self))
            }

            fn to_raw(self) -> RawValue {
                RawValue::$variant(self)
            }

            fn from_raw(value: &RawValue) -> Option<Self> {
                value.as_f64().map(|v| v as $ty)
            }
        }
    };
}

impl_integer_term!(i32, 32, "int", Int);
impl_integer_term!(i64, 64, "long", Long);
impl_float_term!(f32, 32, "float", Float);
impl_float_term!(f64, 64, "double", Double);

/// Sealable, numerically ordered term list.
#[derive(Debug, Clone)]
pub struct TermNumberList<T: NumericTerm> {
    values: Vec<T>,
    format: NumberFormat,
    sealed: bool,
}

/// 32-bit integer term list.
pub type TermIntList = TermNumberList<i32>;
/// 64-bit integer term list.
pub type TermLongList = TermNumberList<i64>;
/// 32-bit float term list.
pub type TermFloatList = TermNumberList<f32>;
/// 64-bit float term list.
pub type TermDoubleList = TermNumberList<f64>;

impl<T: NumericTerm> TermNumberList<T> {
    /// Create an empty list displaying values through `format`.
    pub fn new(format: NumberFormat) -> Self {
        TermNumberList {
            values: Vec::new(),
            format,
            sealed: false,
        }
    }

    /// Create an empty list with room for `capacity` terms.
    pub fn with_capacity(format: NumberFormat, capacity: usize) -> Self {
        TermNumberList {
            values: Vec::with_capacity(capacity),
            format,
            sealed: false,
        }
    }

    /// Display format of the list.
    pub fn number_format(&self) -> &NumberFormat {
        &self.format
    }

    /// Parse a term: invariant form first, then the configured locale.
    ///
    /// An empty term reads as zero.
    pub fn parse_term(&self, term: &str) -> Result<T> {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return Ok(T::default());
        }
        if let Ok(value) = trimmed.parse::<T>() {
            return Ok(value.canonical());
        }
        if let Some(locale) = &self.format.locale {
            if let Ok(value) = locale.normalize(trimmed).parse::<T>() {
                return Ok(value.canonical());
            }
        }
        if looks_prefix_coded(term, T::BITS) {
            return Err(DrilldownError::unsupported_encoding(format!(
                "term {term:?} looks like a prefix coded {} token",
                T::NAME
            )));
        }
        Err(DrilldownError::parse(format!(
            "cannot parse {term:?} as {}",
            T::NAME
        )))
    }

    /// Append an already parsed value.
    pub fn add_value(&mut self, value: T) -> Result<()> {
        if self.sealed {
            return Err(DrilldownError::invalid_operation(
                "cannot add to a sealed term list",
            ));
        }
        self.values.push(value.canonical());
        Ok(())
    }

    /// Ordinal of a primitive value in a sealed list.
    pub fn ordinal_of_value(&self, value: T) -> Option<usize> {
        let value = value.canonical();
        self.values
            .binary_search_by(|probe| probe.total_cmp(&value))
            .ok()
    }

    /// Primitive value at `ordinal`.
    pub fn primitive_at(&self, ordinal: usize) -> Option<T> {
        self.values.get(ordinal).copied()
    }

    /// Sealed primitive values in ascending order.
    pub fn primitives(&self) -> &[T] {
        &self.values
    }

    fn ensure_sealed(&self) -> Result<()> {
        if self.sealed {
            Ok(())
        } else {
            Err(DrilldownError::invalid_operation(
                "term list must be sealed before lookups",
            ))
        }
    }

    fn is_strictly_ascending(&self) -> bool {
        self.values
            .windows(2)
            .all(|w| w[0].total_cmp(&w[1]) == Ordering::Less)
    }
}

impl<T: NumericTerm> TermValues for TermNumberList<T> {
    fn add(&mut self, term: &str) -> Result<()> {
        let value = self.parse_term(term)?;
        self.add_value(value)
    }

    fn seal(&mut self) {
        if self.sealed {
            return;
        }
        if self.values.first().is_some_and(|v| v.is_negative()) {
            let boundary = self.values.partition_point(|v| v.is_negative());
            self.values[..boundary].reverse();
        }
        if !self.is_strictly_ascending() {
            self.values.sort_by(T::total_cmp);
            self.values.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
        }
        self.values.shrink_to_fit();
        self.sealed = true;
    }

    fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn ordinal_of(&self, term: &str) -> Result<Option<usize>> {
        self.ensure_sealed()?;
        let value = self.parse_term(term)?;
        Ok(self.ordinal_of_value(value))
    }

    fn value_at(&self, ordinal: usize) -> Option<String> {
        self.primitive_at(ordinal)
            .map(|v| v.format_with(&self.format))
    }

    fn raw_at(&self, ordinal: usize) -> Option<RawValue> {
        self.primitive_at(ordinal).map(NumericTerm::to_raw)
    }

    fn display_form(&self, term: &str) -> Result<String> {
        Ok(self.parse_term(term)?.format_with(&self.format))
    }

    fn lower_bound(&self, term: &str) -> Result<usize> {
        self.ensure_sealed()?;
        let value = self.parse_term(term)?;
        Ok(self
            .values
            .partition_point(|v| v.total_cmp(&value) == Ordering::Less))
    }

    fn upper_bound(&self, term: &str) -> Result<usize> {
        self.ensure_sealed()?;
        let value = self.parse_term(term)?;
        Ok(self
            .values
            .partition_point(|v| v.total_cmp(&value) != Ordering::Greater))
    }
}

#[cfg(test)]
mod tests {
    use rand::Rng;
    use rand::seq::SliceRandom;

    use super::*;
    use crate::dictionary::format::{DEFAULT_FLOAT_PATTERN, DEFAULT_INT_PATTERN, NumberLocale};

    fn int_list(terms: &[&str]) -> TermIntList {
        let mut list = TermIntList::new(NumberFormat::new(DEFAULT_INT_PATTERN));
        for term in terms {
            list.add(term).unwrap();
        }
        list.seal();
        list
    }

    #[test]
    fn test_seal_reverses_negative_prefix() {
        let format = NumberFormat::new(DEFAULT_INT_PATTERN);
        let mut terms: Vec<String> = [-30, -2, -1, 0, 4, 17]
            .iter()
            .map(|v| format.format_integer(*v))
            .collect();
        terms.sort();
        let refs: Vec<&str> = terms.iter().map(String::as_str).collect();

        let list = int_list(&refs);
        assert_eq!(list.primitives(), &[-30, -2, -1, 0, 4, 17]);
        assert_eq!(list.ordinal_of("-0000000002").unwrap(), Some(1));
        assert_eq!(list.value_at(0).as_deref(), Some("-0000000030"));
    }

    #[test]
    fn test_seal_all_negative() {
        let list = int_list(&["-0000000001", "-0000000005", "-0000000009"]);
        assert_eq!(list.primitives(), &[-9, -5, -1]);
    }

    #[test]
    fn test_unpadded_terms_fall_back_to_sort() {
        let list = int_list(&["-1", "-20", "10", "2", "3"]);
        assert_eq!(list.primitives(), &[-20, -1, 2, 3, 10]);
        assert_eq!(list.ordinal_of("10").unwrap(), Some(4));
        assert!(list.contains("3"));
        assert!(!list.contains("4"));
    }

    #[test]
    fn test_duplicate_spellings_collapse() {
        let list = int_list(&["01", "1", "2"]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.ordinal_of("0001").unwrap(), Some(0));
    }

    #[test]
    fn test_add_after_seal_fails() {
        let mut list = int_list(&["1"]);
        assert!(matches!(
            list.add("2"),
            Err(DrilldownError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_lookup_before_seal_fails() {
        let mut list = TermIntList::new(NumberFormat::plain());
        list.add("1").unwrap();
        assert!(list.ordinal_of("1").is_err());
    }

    #[test]
    fn test_empty_term_reads_as_zero() {
        let list = TermDoubleList::new(NumberFormat::plain());
        assert_eq!(list.parse_term("").unwrap(), 0.0);
        assert_eq!(list.parse_term("-0.0").unwrap().to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn test_locale_fallback_parse() {
        let format = NumberFormat::new("0.00").with_locale(NumberLocale::new(',', Some('.')));
        let list = TermDoubleList::new(format);
        assert_eq!(list.parse_term("1.234,5").unwrap(), 1234.5);
        assert_eq!(list.parse_term("12.5").unwrap(), 12.5);
    }

    #[test]
    fn test_parse_errors_are_classified() {
        let list = TermIntList::new(NumberFormat::plain());
        assert!(matches!(
            list.parse_term("red"),
            Err(DrilldownError::Parse(_))
        ));

        let token: String = std::iter::once('\u{60}')
            .chain(['\u{8}', '\u{0}', '\u{0}', '\u{0}', '\u{5}'])
            .collect();
        assert!(matches!(
            list.parse_term(&token),
            Err(DrilldownError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_float_bounds() {
        let mut list = TermFloatList::new(NumberFormat::new(DEFAULT_FLOAT_PATTERN));
        for term in ["-1.5", "-0.5", "0.25", "3"] {
            list.add(term).unwrap();
        }
        list.seal();
        assert_eq!(list.primitives(), &[-1.5, -0.5, 0.25, 3.0]);
        assert_eq!(list.lower_bound("0").unwrap(), 2);
        assert_eq!(list.upper_bound("0.25").unwrap(), 3);
        assert_eq!(list.value_at(2).as_deref(), Some("0000000000.25000"));
    }

    #[test]
    fn test_random_signed_values_seal_ascending() {
        let mut rng = rand::rng();
        let format = NumberFormat::new("00000000000000000000");
        for _ in 0..50 {
            let n = rng.random_range(0..200);
            let values: Vec<i64> = (0..n)
                .map(|_| rng.random_range(-1_000_000..1_000_000))
                .collect();

            let mut terms: Vec<String> = values.iter().map(|v| format.format_integer(*v)).collect();
            terms.sort();
            terms.dedup();
            if rng.random_bool(0.3) {
                terms.shuffle(&mut rng);
            }

            let mut list = TermLongList::new(format.clone());
            for term in &terms {
                list.add(term).unwrap();
            }
            list.seal();

            let sealed = list.primitives();
            assert!(sealed.windows(2).all(|w| w[0] < w[1]));
            for v in &values {
                assert!(list.ordinal_of_value(*v).is_some());
            }
        }
    }
}
