//! Feed engine tests against an in-memory sink
//!
//! These tests verify:
//! - Line validation and bad line reporting
//! - Statement shape for each feed
//! - Recursive splitting of rejected batches
//! - Fatal handling of lost connections

use feedload_ingest::engine::FeedEngine;
use feedload_ingest::feeds::{CITIES, REGIONS, ROUTES};
use feedload_ingest::IngestError;
use std::io::Cursor;

mod helpers;

use helpers::{city_lines, region_csv, RecordingSink};

#[tokio::test]
async fn test_city_without_region_inserts_null() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(CITIES, 10).unwrap();
    let input = r#"{"id": "5", "name": "Metro", "iso_code": "AB", "country_id": "3"}"#;

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert_eq!(
        sink.statements(),
        vec![
            "INSERT INTO cities (id, name, iso_code, country_id, region_id) VALUES (5, \"Metro\", \"AB\", 3, NULL);"
        ]
    );
    assert_eq!(report.inserted, 1);
    assert!(report.is_clean());
}

#[tokio::test]
async fn test_route_with_invalid_flag_is_never_inserted() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(ROUTES, 10).unwrap();
    let input = "id,country_code_alpha2,country_code_alpha3,country_targetable,name\n\
                 1,US,USA,weird,1\n\
                 2,GB,GBR,1,United Kingdom\n";

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert_eq!(report.bad_lines.len(), 1);
    assert_eq!(report.bad_lines[0].line_number, 2);
    assert!(report.bad_lines[0].reason.contains("weird"));
    assert_eq!(sink.inserted_tuples(), vec!["(2, \"GB\", \"GBR\", 1, \"United Kingdom\")"]);
    assert!(sink.statements().iter().all(|s| !s.contains("weird")));
}

#[tokio::test]
async fn test_isolates_single_failing_row() {
    let sink = RecordingSink::rejecting(["Bob\"s"]);
    let engine = FeedEngine::new(CITIES, 3).unwrap();

    let report = engine
        .run(&sink, Cursor::new(city_lines(10, &[4])))
        .await
        .unwrap();

    assert_eq!(report.rows_batched, 10);
    assert_eq!(report.inserted, 9);
    assert_eq!(report.failed_rows.len(), 1);
    assert_eq!(report.failed_rows[0].row_index, 4);
    assert_eq!(report.failed_rows[0].line_number, 5);
    assert!(report.failed_rows[0].values.contains("Bob\"s 4"));

    // full batch, [0,4) [4,8) [8,10), [4,6) [6,8), [4,5) [5,6)
    assert_eq!(report.statements_executed, 8);
    assert_eq!(sink.statements().len(), 8);

    let mut inserted = sink.inserted_tuples();
    inserted.sort();
    assert_eq!(inserted.len(), 9);
    assert!(inserted.iter().all(|t| !t.contains("Bob")));
}

#[tokio::test]
async fn test_several_failing_rows_each_reported_once() {
    let sink = RecordingSink::rejecting(["Bob\"s"]);
    let engine = FeedEngine::new(CITIES, 2).unwrap();

    let report = engine
        .run(&sink, Cursor::new(city_lines(25, &[0, 7, 8, 24])))
        .await
        .unwrap();

    let failed: Vec<usize> = report.failed_rows.iter().map(|f| f.row_index).collect();
    assert_eq!(failed, vec![0, 7, 8, 24]);
    assert_eq!(report.inserted, 21);
    assert_eq!(sink.inserted_tuples().len(), 21);
}

#[tokio::test]
async fn test_clean_batch_is_one_statement() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(REGIONS, 10).unwrap();

    let report = engine.run(&sink, Cursor::new(region_csv(50))).await.unwrap();

    assert_eq!(report.statements_executed, 1);
    assert_eq!(report.inserted, 50);
    assert_eq!(report.lines_read, 51);
    assert!(sink.statements()[0].starts_with("INSERT INTO regions (id, country_id, name, code) VALUES (1, 1, \"Region 0\", \"R0\"), "));
}

#[tokio::test]
async fn test_empty_batch_sends_nothing() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(ROUTES, 10).unwrap();
    let input = "id,country_code_alpha2,country_code_alpha3,country_targetable,name\n1,us,USA,1,x\n\n";

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert!(sink.statements().is_empty());
    assert_eq!(report.statements_executed, 0);
    assert_eq!(report.bad_lines.len(), 1);
}

#[tokio::test]
async fn test_empty_input() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(CITIES, 10).unwrap();

    let report = engine.run(&sink, Cursor::new("")).await.unwrap();

    assert_eq!(report.lines_read, 0);
    assert!(sink.statements().is_empty());
}

#[tokio::test]
async fn test_wrong_field_count_and_unparseable_lines() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(REGIONS, 10).unwrap();
    let input = "id,country_id,name,code\r\n\
                 1,1,North\r\n\
                 2,1,\"South,R2\r\n\
                 3,1,East,R3\r\n";

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    let reasons: Vec<&str> = report.bad_lines.iter().map(|b| b.reason.as_str()).collect();
    assert_eq!(reasons.len(), 2);
    assert_eq!(reasons[0], "wrong number of values");
    assert!(reasons[1].starts_with("unparseable line"));
    assert_eq!(report.bad_lines[0].line, "1,1,North");
    assert_eq!(sink.inserted_tuples(), vec!["(3, 1, \"East\", \"R3\")"]);
}

#[tokio::test]
async fn test_blank_lines_are_skipped_silently() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(CITIES, 10).unwrap();
    let input = format!("\n   \n{}\n", city_lines(2, &[]));

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert!(report.bad_lines.is_empty());
    assert_eq!(report.inserted, 2);
}

#[tokio::test]
async fn test_non_utf8_line_is_a_bad_line() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(REGIONS, 10).unwrap();
    let mut input = b"id,country_id,name,code\n1,1,".to_vec();
    input.extend_from_slice(&[0xff, 0xfe]);
    input.extend_from_slice(b",R1\n2,1,West,R2\n");

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert_eq!(report.bad_lines.len(), 1);
    assert_eq!(report.bad_lines[0].reason, "line is not valid UTF-8");
    assert_eq!(report.inserted, 1);
}

#[tokio::test]
async fn test_header_order_drives_insert_columns() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(REGIONS, 10).unwrap();
    let input = "id,country_id,name,code\n7,2,Coast,CO\n";

    engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert_eq!(
        sink.statements(),
        vec!["INSERT INTO regions (id, country_id, name, code) VALUES (7, 2, \"Coast\", \"CO\");"]
    );
}

#[tokio::test]
async fn test_quoted_field_after_space_keeps_its_comma() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(REGIONS, 10).unwrap();
    let input = "id, country_id, name, code\n\
                 1, 2, \"North, East\", NE\n\
                 7, 3, \"Paris, France\", PF\n";

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert!(report.bad_lines.is_empty());
    assert_eq!(
        sink.statements(),
        vec![
            "INSERT INTO regions (id, country_id, name, code) VALUES (1, 2, \"North, East\", \"NE\"), (7, 3, \"Paris, France\", \"PF\");"
        ]
    );
}

#[tokio::test]
async fn test_header_wider_than_validators_inserts_raw_fields() {
    let sink = RecordingSink::new();
    let engine = FeedEngine::new(REGIONS, 10).unwrap();
    let input = "id,country_id,name,code,population\n\
                 1,2,North,NO,1200\n\
                 2,2,South,SO,not-a-number\n";

    let report = engine.run(&sink, Cursor::new(input)).await.unwrap();

    assert!(report.bad_lines.is_empty());
    assert_eq!(report.inserted, 2);
    assert_eq!(
        sink.statements(),
        vec![
            "INSERT INTO regions (id, country_id, name, code, population) VALUES (1, 2, North, NO, 1200), (2, 2, South, SO, not-a-number);"
        ]
    );
}

#[tokio::test]
async fn test_lost_connection_is_fatal() {
    let sink = RecordingSink::rejecting(["Bob\"s"]).disconnecting_after(2);
    let engine = FeedEngine::new(CITIES, 3).unwrap();

    let err = engine
        .run(&sink, Cursor::new(city_lines(10, &[4])))
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Sink { ref feed, .. } if feed == "cities"));
    assert_eq!(sink.statements().len(), 2);
}

#[tokio::test]
async fn test_connection_lost_on_first_statement() {
    let sink = RecordingSink::new().disconnecting_after(0);
    let engine = FeedEngine::new(REGIONS, 10).unwrap();

    let result = engine.run(&sink, Cursor::new(region_csv(3))).await;

    assert!(matches!(result, Err(IngestError::Sink { .. })));
}
