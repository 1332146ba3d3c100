//! Textual forms of facet specs, selections, sort orders and paging.
//!
//! ```text
//! facet      color:1,10,true,hits
//! selection  color:red,blue,!green
//! sort       price:true,_score:false
//! page       20:10
//! ```

use std::str::FromStr;

use crate::browse::request::BrowseSelection;
use crate::engine::TermQuery;
use crate::error::{DrilldownError, Result};
use crate::facet::{DEFAULT_MAX_COUNT, DEFAULT_MIN_HIT_COUNT, FacetSortOrder, FacetSpec};
use crate::sort::SortField;

fn split_named<'a>(input: &'a str, what: &str) -> Result<(&'a str, Option<&'a str>)> {
    let input = input.trim();
    let (name, rest) = match input.split_once(':') {
        Some((name, rest)) => (name.trim(), Some(rest)),
        None => (input, None),
    };
    if name.is_empty() {
        return Err(DrilldownError::invalid_argument(format!(
            "{what} '{input}' has no field name"
        )));
    }
    Ok((name, rest))
}

fn component_or<T: FromStr>(raw: Option<&str>, default: T, what: &str, input: &str) -> T {
    match raw.map(str::trim) {
        None | Some("") => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Ignoring {what} '{raw}' in facet spec '{input}'");
            default
        }),
    }
}

/// Parse `name:minHitCount,maxCount,isExpand,orderBy`.
///
/// Missing or unparsable components take their defaults. An order of
/// `hits` sorts by count, anything else by value.
pub fn parse_facet_spec(input: &str) -> Result<(String, FacetSpec)> {
    let (name, rest) = split_named(input, "facet spec")?;
    let mut parts = rest.unwrap_or_default().split(',');

    let min_hit_count = component_or(parts.next(), DEFAULT_MIN_HIT_COUNT, "min hit count", input);
    let max_count = component_or(parts.next(), DEFAULT_MAX_COUNT, "max count", input);
    let expand = component_or(parts.next(), false, "expand flag", input);
    let order_by = match parts.next().map(str::trim) {
        None | Some("") | Some("hits") => FacetSortOrder::HitsDesc,
        Some(_) => FacetSortOrder::ValueAsc,
    };

    Ok((
        name.to_string(),
        FacetSpec::new(min_hit_count, max_count, expand, order_by),
    ))
}

/// Parse `name:value,value,!value`; a leading `!` negates a value.
pub fn parse_selection(input: &str) -> Result<BrowseSelection> {
    let (name, rest) = split_named(input, "selection")?;
    let rest = rest.ok_or_else(|| {
        DrilldownError::invalid_argument(format!("selection '{input}' has no values"))
    })?;

    let mut selection = BrowseSelection::new(name);
    for value in rest.split(',').map(str::trim).filter(|v| !v.is_empty()) {
        selection = match value.strip_prefix('!') {
            Some(negated) => selection.with_not_value(negated),
            None => selection.with_value(value),
        };
    }
    Ok(selection)
}

/// Parse `field:reverse,field:reverse`. An empty input means score order.
pub fn parse_sort(input: &str) -> Result<Vec<SortField>> {
    let mut fields = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, reverse) = split_named(part, "sort field")?;
        let reverse = match reverse.map(str::trim) {
            None | Some("") => false,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                log::warn!("Ignoring reverse flag '{raw}' of sort field '{field}'");
                false
            }),
        };
        fields.push(SortField {
            field: field.to_string(),
            reverse,
        });
    }
    Ok(fields)
}

/// Parse `offset:count`.
pub fn parse_page(input: &str) -> Result<(i64, i64)> {
    let (offset, count) = input.trim().split_once(':').ok_or_else(|| {
        DrilldownError::invalid_argument(format!("page '{input}' is not offset:count"))
    })?;
    let parse = |raw: &str| {
        raw.trim()
            .parse::<i64>()
            .map_err(|e| DrilldownError::invalid_argument(format!("page '{input}': {e}")))
    };
    Ok((parse(offset)?, parse(count)?))
}

/// Parse `field:term` into a term query.
pub fn parse_term_query(input: &str) -> Result<TermQuery> {
    let (field, term) = split_named(input, "query")?;
    match term.map(str::trim) {
        Some(term) if !term.is_empty() => Ok(TermQuery::new(field, term)),
        _ => Err(DrilldownError::invalid_argument(format!(
            "query '{input}' is not field:term"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_spec() {
        let (name, spec) = parse_facet_spec("color:2,10,true,hits").unwrap();
        assert_eq!(name, "color");
        assert_eq!(spec, FacetSpec::new(2, 10, true, FacetSortOrder::HitsDesc));

        let (_, spec) = parse_facet_spec("color:1,3,false,value").unwrap();
        assert_eq!(spec.order_by, FacetSortOrder::ValueAsc);
    }

    #[test]
    fn test_facet_spec_falls_back_to_defaults() {
        let (name, spec) = parse_facet_spec("color").unwrap();
        assert_eq!(name, "color");
        assert_eq!(spec, FacetSpec::default());

        let (_, spec) = parse_facet_spec("color:x,y,maybe,hits").unwrap();
        assert_eq!(spec, FacetSpec::default());

        assert!(parse_facet_spec(":1,2").is_err());
    }

    #[test]
    fn test_selection_with_negation() {
        let selection = parse_selection("color:red, blue,!green").unwrap();
        assert_eq!(selection.field, "color");
        assert_eq!(selection.values, vec!["red", "blue"]);
        assert_eq!(selection.not_values, vec!["green"]);
        assert!(parse_selection("color").is_err());
    }

    #[test]
    fn test_sort_and_page() {
        let sort = parse_sort("price:true,_score").unwrap();
        assert_eq!(sort, vec![SortField::reversed("price"), SortField::score()]);
        assert!(parse_sort("").unwrap().is_empty());
        assert_eq!(parse_sort("price:nope").unwrap(), vec![SortField::new("price")]);

        assert_eq!(parse_page("20:10").unwrap(), (20, 10));
        assert!(parse_page("20").is_err());
        assert!(parse_page("a:10").is_err());
    }

    #[test]
    fn test_term_query() {
        let query = parse_term_query("color:red").unwrap();
        assert_eq!(query.field(), "color");
        assert_eq!(query.term(), "red");
        assert!(parse_term_query("color:").is_err());
    }
}
