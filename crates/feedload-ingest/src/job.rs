//! Batch job: every requested feed, one after another

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::engine::FeedEngine;
use crate::feeds::FeedDefinition;
use crate::report::RunReport;
use crate::sink::DatabaseSink;
use crate::source::{open_lines, FileSource};

/// Outcome of one job run
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub run_id: Uuid,
    pub reports: Vec<RunReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobSummary {
    pub fn total_inserted(&self) -> usize {
        self.reports.iter().map(|r| r.inserted).sum()
    }

    pub fn total_rejected(&self) -> usize {
        self.reports.iter().map(RunReport::rejected).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.reports.iter().all(RunReport::is_clean)
    }
}

pub struct FeedJob {
    source: Arc<dyn FileSource>,
    sink: Arc<dyn DatabaseSink>,
    split_factor: usize,
    report_dir: PathBuf,
}

impl FeedJob {
    pub fn new(
        source: Arc<dyn FileSource>,
        sink: Arc<dyn DatabaseSink>,
        split_factor: usize,
        report_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            sink,
            split_factor,
            report_dir: report_dir.into(),
        }
    }

    /// Load `feeds` in order; the first fatal error stops the job
    pub async fn run(&self, feeds: &[FeedDefinition]) -> Result<JobSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("feed_job", %run_id);

        async move {
            info!(feeds = feeds.len(), split_factor = self.split_factor, "Starting feed job");

            let mut reports = Vec::with_capacity(feeds.len());
            for definition in feeds {
                let report = self
                    .run_feed(definition)
                    .await
                    .with_context(|| format!("Feed '{}' failed", definition.name))?;
                reports.push(report);
            }

            let summary = JobSummary {
                run_id,
                reports,
                started_at,
                finished_at: Utc::now(),
            };

            info!(
                inserted = summary.total_inserted(),
                rejected = summary.total_rejected(),
                "Feed job finished"
            );

            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn run_feed(&self, definition: &FeedDefinition) -> Result<RunReport> {
        let engine = FeedEngine::new(definition.clone(), self.split_factor)?;

        info!(
            feed = definition.name,
            "Loading {} into {}",
            self.source.describe(definition.source_file),
            definition.table
        );

        let reader = open_lines(self.source.as_ref(), definition.source_file).await?;
        let report = engine.run(self.sink.as_ref(), reader).await?;

        if let Some(path) = report.write_rejections(&self.report_dir)? {
            warn!(
                feed = definition.name,
                bad_lines = report.bad_lines.len(),
                failed_rows = report.failed_rows.len(),
                "Rejections written to {}",
                path.display()
            );
        }

        Ok(report)
    }
}
