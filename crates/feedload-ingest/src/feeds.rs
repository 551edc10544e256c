//! Feed definitions
//!
//! One immutable descriptor per dataset. Everything the engine needs to know
//! about a feed lives here: the target table, the column order, one
//! validator per column and how to split a line into fields.

use crate::parser::{DelimitedParser, RecordParser, RowParser};
use crate::validator::Validator;

/// How lines of a feed file are turned into fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// Comma-separated text whose first line is the column header
    Delimited,
    /// One JSON object per line; `optional` keys default to `NULL`
    JsonRecord { optional: &'static [&'static str] },
}

/// Static description of one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDefinition {
    /// Short name used on the command line and in reports
    pub name: &'static str,
    /// Target table
    pub table: &'static str,
    /// Object name in the bucket; a `.gz` suffix means gzip
    pub source_file: &'static str,
    /// Column names in insert order
    ///
    /// For delimited feeds the header line of the file takes precedence;
    /// these are the columns that header is expected to carry.
    pub columns: &'static [&'static str],
    /// One validator per column, positionally
    pub validators: &'static [Validator],
    pub format: LineFormat,
}

impl FeedDefinition {
    /// A fresh parser for one run over this feed
    pub fn parser(&self) -> RowParser {
        match self.format {
            LineFormat::Delimited => RowParser::Delimited(DelimitedParser::new()),
            LineFormat::JsonRecord { optional } => RowParser::Record(RecordParser::new(
                self.columns.iter().copied(),
                optional.iter().copied(),
            )),
        }
    }

    /// Columns as owned strings
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.to_string()).collect()
    }
}

/// Routes feed
///
/// The file header must list the columns in this order: the header becomes
/// the INSERT column list while validators are applied by position.
pub const ROUTES: FeedDefinition = FeedDefinition {
    name: "routes",
    table: "routes",
    source_file: "routes.gz",
    columns: &[
        "id",
        "country_code_alpha2",
        "country_code_alpha3",
        "country_targetable",
        "name",
    ],
    validators: &[
        Validator::Integer,
        Validator::CountryCode { len: 2 },
        Validator::CountryCode { len: 3 },
        Validator::Flag,
        Validator::Quoted,
    ],
    format: LineFormat::Delimited,
};

pub const REGIONS: FeedDefinition = FeedDefinition {
    name: "regions",
    table: "regions",
    source_file: "regions.csv",
    columns: &["id", "country_id", "name", "code"],
    validators: &[
        Validator::Integer,
        Validator::Integer,
        Validator::Quoted,
        Validator::Quoted,
    ],
    format: LineFormat::Delimited,
};

pub const CITIES: FeedDefinition = FeedDefinition {
    name: "cities",
    table: "cities",
    source_file: "cities.gz",
    columns: &["id", "name", "iso_code", "country_id", "region_id"],
    validators: &[
        Validator::Integer,
        Validator::Quoted,
        Validator::Quoted,
        Validator::Integer,
        Validator::NullableInteger,
    ],
    format: LineFormat::JsonRecord {
        optional: &["region_id"],
    },
};

/// All feeds, in the order the nightly job loads them
pub fn all() -> Vec<FeedDefinition> {
    vec![ROUTES, REGIONS, CITIES]
}

/// Look a feed up by name (case-insensitive)
pub fn by_name(name: &str) -> Option<FeedDefinition> {
    all().into_iter().find(|feed| feed.name.eq_ignore_ascii_case(name))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::parser::ParsedLine;

    #[test]
    fn test_every_feed_has_one_validator_per_column() {
        for feed in all() {
            assert_eq!(
                feed.columns.len(),
                feed.validators.len(),
                "feed {} is misaligned",
                feed.name
            );
        }
    }

    #[test]
    fn test_job_order() {
        let names: Vec<_> = all().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["routes", "regions", "cities"]);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("Cities").unwrap().table, "cities");
        assert!(by_name("airports").is_none());
    }

    #[test]
    fn test_city_parser_uses_declared_columns() {
        let mut parser = CITIES.parser();
        assert_eq!(parser.columns().unwrap(), CITIES.column_names().as_slice());

        let parsed = parser
            .parse(r#"{"id": "1", "name": "A", "iso_code": "AB", "country_id": "2", "region_id": "4"}"#)
            .unwrap();
        assert_eq!(
            parsed,
            ParsedLine::Fields(vec![
                "1".into(),
                "A".into(),
                "AB".into(),
                "2".into(),
                "4".into()
            ])
        );
    }

    #[test]
    fn test_route_parser_waits_for_header() {
        let parser = ROUTES.parser();
        assert!(parser.columns().is_none());
    }
}
