//! Test helpers for feedload integration tests
//!
//! - An in-memory sink that records every statement and can be told which
//!   statements to refuse
//! - Fixture builders for feed files
#![allow(dead_code)]

use async_trait::async_trait;
use feedload_ingest::sink::{DatabaseSink, SinkError};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Mutex;

/// One statement seen by the sink
#[derive(Debug, Clone)]
pub struct Executed {
    pub statement: String,
    pub accepted: bool,
}

/// Sink that records statements instead of talking to a database
///
/// A statement is rejected when it contains any of the poison markers,
/// which mimics a database refusing a whole multi-row INSERT because of
/// one bad tuple.
#[derive(Default)]
pub struct RecordingSink {
    executed: Mutex<Vec<Executed>>,
    poison: Vec<String>,
    disconnect_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            poison: markers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Accept nothing after `count` statements; report a lost connection
    pub fn disconnecting_after(mut self, count: usize) -> Self {
        self.disconnect_after = Some(count);
        self
    }

    pub fn executed(&self) -> Vec<Executed> {
        self.executed.lock().unwrap().clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.executed().into_iter().map(|e| e.statement).collect()
    }

    /// Tuples of every accepted statement, in the order they were inserted
    pub fn inserted_tuples(&self) -> Vec<String> {
        self.executed()
            .iter()
            .filter(|e| e.accepted)
            .flat_map(|e| tuples(&e.statement))
            .collect()
    }
}

#[async_trait]
impl DatabaseSink for RecordingSink {
    async fn execute(&self, statement: &str) -> Result<(), SinkError> {
        let mut executed = self.executed.lock().unwrap();

        if let Some(limit) = self.disconnect_after {
            if executed.len() >= limit {
                return Err(SinkError::Connection("server has gone away".to_string()));
            }
        }

        let accepted = !self.poison.iter().any(|marker| statement.contains(marker.as_str()));
        executed.push(Executed {
            statement: statement.to_string(),
            accepted,
        });

        if accepted {
            Ok(())
        } else {
            Err(SinkError::Rejected(
                "You have an error in your SQL syntax".to_string(),
            ))
        }
    }
}

/// Split `INSERT INTO t (..) VALUES (a), (b);` into `["(a)", "(b)"]`
///
/// Only suitable for fixtures whose values contain no `), (`.
pub fn tuples(statement: &str) -> Vec<String> {
    let Some((_, values)) = statement.split_once(" VALUES ") else {
        return Vec::new();
    };
    let values = values.trim_end_matches(';');

    let mut out: Vec<String> = values.split("), (").map(str::to_string).collect();
    let last = out.len() - 1;
    for (i, tuple) in out.iter_mut().enumerate() {
        if i > 0 {
            tuple.insert(0, '(');
        }
        if i < last {
            tuple.push(')');
        }
    }
    out
}

pub fn gzip(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// `count` city JSON lines with ids 1..=count; `bad` rows carry an embedded quote
pub fn city_lines(count: usize, bad: &[usize]) -> String {
    (0..count)
        .map(|index| {
            let name = if bad.contains(&index) {
                format!("Bob\\\"s {}", index)
            } else {
                format!("City {}", index)
            };
            format!(
                "{{\"id\": \"{}\", \"name\": \"{}\", \"iso_code\": \"C{}\", \"country_id\": \"1\"}}\n",
                index + 1,
                name,
                index
            )
        })
        .collect()
}

/// Regions CSV with a header and `count` rows
pub fn region_csv(count: usize) -> String {
    let mut csv = String::from("id,country_id,name,code\n");
    for index in 0..count {
        csv.push_str(&format!("{},1,Region {},R{}\n", index + 1, index, index));
    }
    csv
}
