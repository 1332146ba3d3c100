//! Text term lists.

use crate::dictionary::TermValues;
use crate::dictionary::value::RawValue;
use crate::error::{DrilldownError, Result};

/// Sealable, lexicographically ordered list of text terms.
#[derive(Debug, Clone, Default)]
pub struct TermStringList {
    values: Vec<String>,
    sealed: bool,
}

impl TermStringList {
    /// Create an empty list.
    pub fn new() -> Self {
        TermStringList::default()
    }

    /// Terms in ordinal order.
    pub fn terms(&self) -> &[String] {
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
}

impl TermValues for TermStringList {
    fn add(&mut self, term: &str) -> Result<()> {
        if self.sealed {
            return Err(DrilldownError::invalid_operation(
                "cannot add to a sealed term list",
            ));
        }
        self.values.push(term.to_string());
        Ok(())
    }

    fn seal(&mut self) {
        if self.sealed {
            return;
        }
        if !self.values.windows(2).all(|w| w[0] < w[1]) {
            self.values.sort_unstable();
            self.values.dedup();
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
        Ok(self
            .values
            .binary_search_by(|probe| probe.as_str().cmp(term))
            .ok())
    }

    fn value_at(&self, ordinal: usize) -> Option<String> {
        self.values.get(ordinal).cloned()
    }

    fn raw_at(&self, ordinal: usize) -> Option<RawValue> {
        self.values.get(ordinal).map(|v| RawValue::Text(v.clone()))
    }

    fn display_form(&self, term: &str) -> Result<String> {
        Ok(term.to_string())
    }

    fn lower_bound(&self, term: &str) -> Result<usize> {
        self.ensure_sealed()?;
        Ok(self.values.partition_point(|v| v.as_str() < term))
    }

    fn upper_bound(&self, term: &str) -> Result<usize> {
        self.ensure_sealed()?;
        Ok(self.values.partition_point(|v| v.as_str() <= term))
    }
}
