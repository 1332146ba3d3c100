//! Ordinal term dictionaries.
//!
//! A term list maps the distinct values of one field in one partition to
//! dense ordinals `0..len` and back. Lists are filled in bulk, sealed once,
//! and are read-only afterwards, so a sealed list can be shared between
//! threads without locking. Ordinal order always equals value order: text
//! lists order lexicographically, numeric lists numerically.

pub mod format;
pub mod number_list;
pub mod string_list;
pub mod value;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use self::format::{NumberFormat, NumberLocale};
pub use self::number_list::{
    NumericTerm, TermDoubleList, TermFloatList, TermIntList, TermLongList, TermNumberList,
};
pub use self::string_list::TermStringList;
pub use self::value::RawValue;

use crate::error::Result;

/// Shared contract of every term list.
pub trait TermValues: Send + Sync + fmt::Debug {
    /// Append a term. Fails once the list is sealed or when the term cannot
    /// be read as the list's value type.
    fn add(&mut self, term: &str) -> Result<()>;

    /// Finalize ordering and forbid further mutation. Idempotent.
    fn seal(&mut self);

    /// Whether [`seal`](TermValues::seal) has run.
    fn is_sealed(&self) -> bool;

    /// Number of distinct values.
    fn len(&self) -> usize;

    /// Whether the list has no values.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ordinal of `term`, `None` if absent. Requires a sealed list.
    fn ordinal_of(&self, term: &str) -> Result<Option<usize>>;

    /// Display string of the value at `ordinal`.
    fn value_at(&self, ordinal: usize) -> Option<String>;

    /// Unformatted value at `ordinal`.
    fn raw_at(&self, ordinal: usize) -> Option<RawValue>;

    /// Display string `term` would have if it were in the list. Fails when
    /// the term cannot be read as the list's value type.
    fn display_form(&self, term: &str) -> Result<String>;

    /// Whether `term` is present. Unreadable terms are simply absent.
    fn contains(&self, term: &str) -> bool {
        matches!(self.ordinal_of(term), Ok(Some(_)))
    }

    /// First ordinal whose value is `>= term`.
    fn lower_bound(&self, term: &str) -> Result<usize>;

    /// First ordinal whose value is `> term`.
    fn upper_bound(&self, term: &str) -> Result<usize>;
}

/// Value type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermType {
    /// Free text, ordered lexicographically.
    #[default]
    Text,
    /// 32-bit integers.
    Int,
    /// 64-bit integers.
    Long,
    /// 32-bit floats.
    Float,
    /// 64-bit floats.
    Double,
}

impl TermType {
    /// Create an empty term list of this type.
    ///
    /// Numeric lists without an explicit format use the zero padded default
    /// of their width.
    pub fn new_list(self, number_format: Option<NumberFormat>) -> TermValueList {
        let numeric = |default: &str| {
            number_format
                .clone()
                .unwrap_or_else(|| NumberFormat::new(default))
        };
        match self {
            TermType::Text => TermValueList::Text(TermStringList::new()),
            TermType::Int => {
                TermValueList::Int(TermIntList::new(numeric(format::DEFAULT_INT_PATTERN)))
            }
            TermType::Long => {
                TermValueList::Long(TermLongList::new(numeric(format::DEFAULT_LONG_PATTERN)))
            }
            TermType::Float => {
                TermValueList::Float(TermFloatList::new(numeric(format::DEFAULT_FLOAT_PATTERN)))
            }
            TermType::Double => {
                TermValueList::Double(TermDoubleList::new(numeric(format::DEFAULT_FLOAT_PATTERN)))
            }
        }
    }

    /// Whether values of this type are numbers.
    pub fn is_numeric(self) -> bool {
        self != TermType::Text
    }
}

impl fmt::Display for TermType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TermType::Text => "text",
            TermType::Int => "int",
            TermType::Long => "long",
            TermType::Float => "float",
            TermType::Double => "double",
        };
        f.write_str(name)
    }
}

/// A term list of any supported value type.
#[derive(Debug, Clone)]
pub enum TermValueList {
    /// Text terms.
    Text(TermStringList),
    /// 32-bit integer terms.
    Int(TermIntList),
    /// 64-bit integer terms.
    Long(TermLongList),
    /// 32-bit float terms.
    Float(TermFloatList),
    /// 64-bit float terms.
    Double(TermDoubleList),
}

macro_rules! dispatch {
    ($self:expr, $list:ident => $body:expr) => {
        match $self {
            TermValueList::Text($list) => $body,
            TermValueList::Int($list) => $body,
            TermValueList::Long($list) => $body,
            TermValueList::Float($list) => $body,
            TermValueList::Double($list) => $body,
        }
    };
}

impl TermValueList {
    /// Value type of the list.
    pub fn term_type(&self) -> TermType {
        match self {
            TermValueList::Text(_) => TermType::Text,
            TermValueList::Int(_) => TermType::Int,
            TermValueList::Long(_) => TermType::Long,
            TermValueList::Float(_) => TermType::Float,
            TermValueList::Double(_) => TermType::Double,
        }
    }

    /// Ordinal of an unformatted value, if the value type is compatible.
    pub fn ordinal_of_raw(&self, value: &RawValue) -> Option<usize> {
        match self {
            TermValueList::Text(list) => list.ordinal_of(value.as_str()?).ok().flatten(),
            TermValueList::Int(list) => list.ordinal_of_value(NumericTerm::from_raw(value)?),
            TermValueList::Long(list) => list.ordinal_of_value(NumericTerm::from_raw(value)?),
            TermValueList::Float(list) => list.ordinal_of_value(NumericTerm::from_raw(value)?),
            TermValueList::Double(list) => list.ordinal_of_value(NumericTerm::from_raw(value)?),
        }
    }
}

impl TermValues for TermValueList {
    fn add(&mut self, term: &str) -> Result<()> {
        dispatch!(self, list => list.add(term))
    }

    fn seal(&mut self) {
        dispatch!(self, list => list.seal())
    }

    fn is_sealed(&self) -> bool {
        dispatch!(self, list => list.is_sealed())
    }

    fn len(&self) -> usize {
        dispatch!(self, list => list.len())
    }

    fn ordinal_of(&self, term: &str) -> Result<Option<usize>> {
        dispatch!(self, list => list.ordinal_of(term))
    }

    fn value_at(&self, ordinal: usize) -> Option<String> {
        dispatch!(self, list => list.value_at(ordinal))
    }

    fn raw_at(&self, ordinal: usize) -> Option<RawValue> {
        dispatch!(self, list => list.raw_at(ordinal))
    }

    fn display_form(&self, term: &str) -> Result<String> {
        dispatch!(self, list => list.display_form(term))
    }

    fn lower_bound(&self, term: &str) -> Result<usize> {
        dispatch!(self, list => list.lower_bound(term))
    }

    fn upper_bound(&self, term: &str) -> Result<usize> {
        dispatch!(self, list => list.upper_bound(term))
    }
}
