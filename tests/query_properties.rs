//! End-to-end behaviour of the query language: defaults, intervals, clause
//! order independence, accumulation, strict enumerations and determinism.

use chrono::NaiveDate;
use report_query::ast::{
    DisplayField, GroupBy, Interval, QueryType, Selection, Selector, Sort, SortField, SortOrder,
};
use report_query::{parse, ParserOptions, Query};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn options() -> ParserOptions {
    ParserOptions::new(date("2024-03-14")).with_workspaces(["Work", "Home"])
}

fn parse_ok(input: &str) -> Query {
    parse(input, &options()).unwrap_or_else(|e| panic!("{:?} failed: {}", input, e))
}

#[test]
fn blank_and_comment_only_blocks_yield_defaults() {
    let defaults = Query::with_defaults(&options());
    assert_eq!(parse_ok(""), defaults);
    assert_eq!(parse_ok("  \n\t\n"), defaults);
    assert_eq!(parse_ok("// nothing to see\n"), defaults);
    assert_eq!(defaults.workspace.as_deref(), Some("Work"));
}

#[test]
fn documented_summary_example() {
    let query = parse_ok("TYPE summary\nBETWEEN 2024-01-01 AND 2024-01-31\nGROUPBY project\nSORT time desc");
    assert_eq!(query.query_type, QueryType::Summary);
    assert_eq!(
        query.interval,
        Some(Interval {
            start: date("2024-01-01"),
            end: date("2024-01-31"),
        })
    );
    assert_eq!(query.group_by, Some(GroupBy::Project));
    assert_eq!(
        query.sort,
        Sort {
            field: SortField::Time,
            order: SortOrder::Desc,
        }
    );
    assert_eq!(query.selection, Selection::default());
    assert_eq!(query.list.show, vec![DisplayField::Project, DisplayField::Time]);
    assert_eq!(query.custom_title, None);
}

#[test]
fn between_keeps_bounds_exactly() {
    for (start, end) in [
        ("2024-01-01", "2024-01-01"),
        ("2023-12-31", "2024-01-01"),
        ("2020-02-29", "2024-02-29"),
    ] {
        let query = parse_ok(&format!("BETWEEN {} AND {}", start, end));
        let interval = query.interval.unwrap();
        assert_eq!(interval.start, date(start));
        assert_eq!(interval.end, date(end));
    }
}

#[test]
fn reversed_interval_raises() {
    let err = parse("BETWEEN 2024-02-01 AND 2024-01-01", &options()).unwrap_err();
    assert!(err.message.contains("before its start"));
    assert!(err.span.is_some());
}

#[test]
fn clause_order_is_free() {
    assert_eq!(
        parse_ok("GROUPBY project SORT time desc"),
        parse_ok("SORT time desc GROUPBY project")
    );
    assert_eq!(
        parse_ok("TITLE \"x\" SHOW time, project THISWEEK TYPE list INCLUDE TAGS a"),
        parse_ok("TYPE list THISWEEK INCLUDE TAGS a SHOW time, project TITLE \"x\"")
    );
}

#[test]
fn repeated_selection_clauses_accumulate() {
    let query = parse_ok("INCLUDE PROJECTS [a] INCLUDE PROJECTS [b]");
    let expected: Vec<Selector> = vec![Selector::Name("a".into()), Selector::Name("b".into())];
    assert_eq!(
        query.selection.projects.include.iter().cloned().collect::<Vec<_>>(),
        expected
    );

    let query = parse_ok("EXCLUDE TAGS [x] TAGS EXCLUDE y, 7 INCLUDE CLIENTS [c]");
    assert_eq!(query.selection.tags.exclude.len(), 3);
    assert!(query.selection.tags.exclude.contains(&Selector::Id(7)));
    assert_eq!(query.selection.clients.include.len(), 1);
}

#[test]
fn unknown_enumeration_values_never_fall_back() {
    for input in [
        "GROUPBY foo",
        "TYPE chart",
        "SORT weight",
        "SHOW project, colour",
        "WORKSPACE bogus",
    ] {
        assert!(parse(input, &options()).is_err(), "{} should be rejected", input);
    }
}

#[test]
fn workspace_error_lists_permitted_values() {
    let err = parse("WORKSPACE bogus", &options()).unwrap_err();
    assert!(err.message.contains("\"Work\" or \"Home\""));
    assert!(err.message.contains("after WORKSPACE"));
}

#[test]
fn include_and_exclude_of_same_identifier_is_rejected() {
    let err = parse("INCLUDE PROJECTS [a] EXCLUDE PROJECTS [a]", &options()).unwrap_err();
    assert_eq!(err.message, "Project \"a\" cannot be both included and excluded");

    // 不同实体类别之间互不影响
    assert!(parse("INCLUDE PROJECTS [a] EXCLUDE CLIENTS [a]", &options()).is_ok());
}

#[test]
fn relative_intervals_use_injected_reference_date() {
    let query = parse_ok("THISMONTH");
    assert_eq!(query.interval, Interval::new(date("2024-03-01"), date("2024-03-31")));

    let other_day = ParserOptions::new(date("2025-01-01"));
    let query = parse("THISMONTH", &other_day).unwrap();
    assert_eq!(query.interval, Interval::new(date("2025-01-01"), date("2025-01-31")));
}

#[test]
fn parsing_is_deterministic() {
    let input = "TYPE list PAST 3 DAYS INCLUDE TAGS [b, a, c] SHOW entry, time";
    assert_eq!(parse_ok(input), parse_ok(input));
}

#[test]
fn failure_produces_no_partial_query() {
    let result = parse("TYPE list GROUPBY client SORT", &options());
    let err = result.unwrap_err();
    assert!(err.message.starts_with("Expected"));
    assert!(err.message.ends_with("found end of input"));
}
