//! Filter term parsing.
//!
//! A term is a whitespace-separated list of conditions:
//!
//! - `column=value`, `column~value`, `column>value`, `column<value`
//! - bare words, matched against the free-text columns
//! - double-quoted values, which may contain whitespace
//!
//! The keywords `first`, `rows`, `sort` and `sort-reverse` set the listing
//! window and order instead of filtering. `rows=-1` lists every row.

use std::fmt;

use thiserror::Error;

/// Errors raised for filter terms the listing cannot evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Filter has an unterminated quote")]
    UnterminatedQuote,
    #[error("Filter has an unknown column '{column}'")]
    UnknownColumn { column: String },
    #[error("Filter has an unknown sort field '{field}'")]
    UnknownSortField { field: String },
    #[error("Filter keyword '{keyword}' requires a number, got '{value}'")]
    InvalidNumber { keyword: String, value: String },
    #[error("Filter keyword '{keyword}' must use '='")]
    InvalidOperator { keyword: String },
}

/// Comparison carried by a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `column=value`
    Equals,
    /// `column~value`
    Contains,
    /// `column>value`
    Greater,
    /// `column<value`
    Less,
    /// A bare word.
    Text,
}

impl FilterOp {
    fn from_char(operator: char) -> Option<Self> {
        match operator {
            '=' => Some(Self::Equals),
            '~' => Some(Self::Contains),
            '>' => Some(Self::Greater),
            '<' => Some(Self::Less),
            _ => None,
        }
    }
}

/// One filter condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTerm {
    /// Column the condition applies to; `None` for bare words.
    pub column: Option<String>,
    pub op: FilterOp,
    pub value: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        })
    }
}

/// Sort field and direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

/// Maximum number of rows in one listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// Every matching row.
    All,
    /// At most this many rows.
    Rows(u64),
}

impl PageSize {
    /// Row limit, `None` when unbounded.
    #[must_use]
    pub fn limit(self) -> Option<u64> {
        match self {
            Self::All => None,
            Self::Rows(rows) => Some(rows),
        }
    }

    /// Value echoed in listing summaries; `-1` for unbounded pages.
    #[must_use]
    pub fn echo(self) -> i64 {
        match self {
            Self::All => -1,
            Self::Rows(rows) => i64::try_from(rows).unwrap_or(i64::MAX),
        }
    }
}

/// Columns a resource listing can filter and sort on.
#[derive(Debug, Clone, Copy)]
pub struct FilterSchema {
    /// Columns accepted in conditions and as sort fields.
    pub columns: &'static [&'static str],
    /// Sort field used when the term names none.
    pub default_sort: &'static str,
}

impl FilterSchema {
    fn knows(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

/// A parsed filter term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    source: String,
    terms: Vec<FilterTerm>,
    first: Option<u64>,
    rows: Option<PageSize>,
    sort: Sort,
}

impl Filter {
    /// Parses a filter term against a schema.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] for unterminated quotes, unknown columns or
    /// sort fields, and non-numeric window keywords.
    pub fn parse(source: &str, schema: &FilterSchema) -> Result<Self, FilterError> {
        let mut filter = Self {
            source: source.trim().to_owned(),
            terms: Vec::new(),
            first: None,
            rows: None,
            sort: Sort {
                field: schema.default_sort.to_owned(),
                order: SortOrder::Ascending,
            },
        };
        for raw in lex(source)? {
            filter.apply(raw, schema)?;
        }
        Ok(filter)
    }

    /// Filter with no conditions and the schema's default order.
    #[must_use]
    pub fn unfiltered(schema: &FilterSchema) -> Self {
        Self {
            source: String::new(),
            terms: Vec::new(),
            first: None,
            rows: None,
            sort: Sort {
                field: schema.default_sort.to_owned(),
                order: SortOrder::Ascending,
            },
        }
    }

    /// Term as given by the client, for echoing.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Conditions in term order.
    #[must_use]
    pub fn terms(&self) -> &[FilterTerm] {
        &self.terms
    }

    /// 1-based first row requested by the term.
    #[must_use]
    pub fn first(&self) -> Option<u64> {
        self.first
    }

    /// Page size requested by the term.
    #[must_use]
    pub fn rows(&self) -> Option<PageSize> {
        self.rows
    }

    #[must_use]
    pub fn sort(&self) -> &Sort {
        &self.sort
    }

    fn apply(&mut self, raw: RawTerm, schema: &FilterSchema) -> Result<(), FilterError> {
        let Some(key) = raw.key else {
            if !raw.value.is_empty() {
                self.terms.push(FilterTerm {
                    column: None,
                    op: FilterOp::Text,
                    value: raw.value,
                });
            }
            return Ok(());
        };

        match key.as_str() {
            "first" | "rows" | "sort" | "sort-reverse" if raw.op != FilterOp::Equals => {
                Err(FilterError::InvalidOperator { keyword: key })
            }
            "first" => {
                let first = parse_number::<u64>(&key, &raw.value)?;
                self.first = Some(first.max(1));
                Ok(())
            }
            "rows" => {
                let rows = parse_number::<i64>(&key, &raw.value)?;
                self.rows = Some(match rows {
                    -1 => PageSize::All,
                    rows if rows > 0 => PageSize::Rows(rows.unsigned_abs()),
                    _ => {
                        return Err(FilterError::InvalidNumber {
                            keyword: key,
                            value: raw.value,
                        });
                    }
                });
                Ok(())
            }
            "sort" | "sort-reverse" => {
                if !schema.knows(&raw.value) {
                    return Err(FilterError::UnknownSortField { field: raw.value });
                }
                let order = if key == "sort" {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                };
                self.sort = Sort {
                    field: raw.value,
                    order,
                };
                Ok(())
            }
            column if schema.knows(column) => {
                self.terms.push(FilterTerm {
                    column: Some(key),
                    op: raw.op,
                    value: raw.value,
                });
                Ok(())
            }
            _ => Err(FilterError::UnknownColumn { column: key }),
        }
    }
}

fn parse_number<T: std::str::FromStr>(keyword: &str, value: &str) -> Result<T, FilterError> {
    value.parse().map_err(|_| FilterError::InvalidNumber {
        keyword: keyword.to_owned(),
        value: value.to_owned(),
    })
}

#[derive(Debug)]
struct RawTerm {
    key: Option<String>,
    op: FilterOp,
    value: String,
}

fn lex(source: &str) -> Result<Vec<RawTerm>, FilterError> {
    let mut terms = Vec::new();
    let mut chars = source.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(terms);
        }

        let mut buffer = String::new();
        let mut key = None;
        let mut op = FilterOp::Text;
        let mut quoted = false;
        while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
            if c == '"' {
                quoted = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(inner) => buffer.push(inner),
                        None => return Err(FilterError::UnterminatedQuote),
                    }
                }
                continue;
            }
            match FilterOp::from_char(c) {
                Some(found) if key.is_none() && !quoted && !buffer.is_empty() => {
                    key = Some(std::mem::take(&mut buffer));
                    op = found;
                }
                _ => buffer.push(c),
            }
        }
        terms.push(RawTerm {
            key,
            op,
            value: buffer,
        });
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn schema() -> FilterSchema {
        FilterSchema {
            columns: &["name", "status", "severity", "host"],
            default_sort: "name",
        }
    }

    #[rstest]
    fn empty_term_uses_defaults(schema: FilterSchema) {
        let filter = Filter::parse("  ", &schema).expect("parse");
        assert!(filter.terms().is_empty());
        assert_eq!(filter.first(), None);
        assert_eq!(filter.rows(), None);
        assert_eq!(filter.sort().field, "name");
        assert_eq!(filter.sort().order, SortOrder::Ascending);
        assert_eq!(filter, Filter::unfiltered(&schema));
    }

    #[rstest]
    fn parses_conditions_and_keywords(schema: FilterSchema) {
        let filter = Filter::parse(
            r#"status=open host~"10.0" severity>5 web first=3 rows=2 sort-reverse=severity"#,
            &schema,
        )
        .expect("parse");

        assert_eq!(
            filter.terms(),
            &[
                FilterTerm {
                    column: Some("status".to_owned()),
                    op: FilterOp::Equals,
                    value: "open".to_owned(),
                },
                FilterTerm {
                    column: Some("host".to_owned()),
                    op: FilterOp::Contains,
                    value: "10.0".to_owned(),
                },
                FilterTerm {
                    column: Some("severity".to_owned()),
                    op: FilterOp::Greater,
                    value: "5".to_owned(),
                },
                FilterTerm {
                    column: None,
                    op: FilterOp::Text,
                    value: "web".to_owned(),
                },
            ]
        );
        assert_eq!(filter.first(), Some(3));
        assert_eq!(filter.rows(), Some(PageSize::Rows(2)));
        assert_eq!(
            filter.sort(),
            &Sort {
                field: "severity".to_owned(),
                order: SortOrder::Descending,
            }
        );
    }

    #[rstest]
    fn quoted_values_keep_whitespace(schema: FilterSchema) {
        let filter = Filter::parse(r#"name="Open Port" "exact phrase""#, &schema).expect("parse");
        let values: Vec<_> = filter.terms().iter().map(|term| term.value.as_str()).collect();
        assert_eq!(values, vec!["Open Port", "exact phrase"]);
    }

    #[rstest]
    fn rows_minus_one_lists_everything(schema: FilterSchema) {
        let filter = Filter::parse("rows=-1", &schema).expect("parse");
        assert_eq!(filter.rows(), Some(PageSize::All));
        assert_eq!(PageSize::All.echo(), -1);
        assert_eq!(PageSize::All.limit(), None);
    }

    #[rstest]
    fn first_zero_is_clamped(schema: FilterSchema) {
        let filter = Filter::parse("first=0", &schema).expect("parse");
        assert_eq!(filter.first(), Some(1));
    }

    #[rstest]
    #[case("name=\"open", FilterError::UnterminatedQuote)]
    #[case("colour=red", FilterError::UnknownColumn { column: "colour".to_owned() })]
    #[case("sort=colour", FilterError::UnknownSortField { field: "colour".to_owned() })]
    #[case("rows=many", FilterError::InvalidNumber { keyword: "rows".to_owned(), value: "many".to_owned() })]
    #[case("rows=0", FilterError::InvalidNumber { keyword: "rows".to_owned(), value: "0".to_owned() })]
    #[case("first~2", FilterError::InvalidOperator { keyword: "first".to_owned() })]
    fn rejects_unusable_terms(schema: FilterSchema, #[case] source: &str, #[case] expected: FilterError) {
        assert_eq!(Filter::parse(source, &schema), Err(expected));
    }
}
