//! Batched classification session
//!
//! Classifies a list of scraped emails in fixed-size groups: every request
//! in a group is in flight concurrently, the session waits for the whole
//! group, then pauses before the next one to respect provider rate limits.
//! Results are written through the aggregation store as they land.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BatchConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{Analysis, EmailData};

use super::client::ClassificationGateway;

/// Interaction type recorded on sender profiles for classified emails
const INTERACTION_ANALYZED: &str = "analyzed";

/// What happened to a batch request.
#[derive(Debug)]
pub enum BatchOutcome {
    /// The batch ran; see the report for how far it got
    Completed(BatchReport),
    /// Another batch was already running on this analyzer; nothing was done
    Skipped,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Emails handed to the batch
    pub requested: usize,
    /// Emails classified and persisted
    pub completed: usize,
    /// Emails that failed classification
    pub failed: usize,
    /// True when the run stopped early on an exhausted provider quota;
    /// everything counted in `completed` is already persisted
    pub quota_exhausted: bool,
}

/// Runs batches of classifications against one gateway and one store.
///
/// The "is a batch running" guard is state of this instance, not a
/// process-wide flag, so independent sessions and tests don't interfere.
pub struct BatchAnalyzer {
    gateway: Arc<ClassificationGateway>,
    db: Arc<Database>,
    group_size: usize,
    group_delay: Duration,
    running: AtomicBool,
}

/// Clears the running flag even when a run errors out.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl BatchAnalyzer {
    pub fn new(
        gateway: Arc<ClassificationGateway>,
        db: Arc<Database>,
        config: &BatchConfig,
    ) -> Self {
        Self {
            gateway,
            db,
            group_size: config.size.max(1),
            group_delay: Duration::from_secs(config.delay_secs),
            running: AtomicBool::new(false),
        }
    }

    /// Classify `emails` in groups.
    ///
    /// A call while a batch is already running is a no-op (`Skipped`, not
    /// queued). A configuration error (no viable provider) surfaces
    /// immediately; an exhausted quota stops the run early with partial
    /// results preserved.
    pub async fn analyze_batch(&self, emails: &[EmailData]) -> Result<BatchOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::info!("Batch analysis already running, skipping request");
            return Ok(BatchOutcome::Skipped);
        }
        let _guard = RunGuard(&self.running);

        let report = self.run(emails).await?;
        Ok(BatchOutcome::Completed(report))
    }

    async fn run(&self, emails: &[EmailData]) -> Result<BatchReport> {
        let mut report = BatchReport {
            requested: emails.len(),
            ..Default::default()
        };

        tracing::info!(
            emails = emails.len(),
            group_size = self.group_size,
            "Starting batch analysis"
        );

        let mut first_group = true;
        for group in emails.chunks(self.group_size) {
            if !first_group && !self.group_delay.is_zero() {
                tokio::time::sleep(self.group_delay).await;
            }
            first_group = false;

            // The whole group goes in flight at once; the session suspends
            // until every request in it has finished.
            let mut handles = Vec::with_capacity(group.len());
            for email in group {
                let gateway = Arc::clone(&self.gateway);
                let email = email.clone();
                handles.push(tokio::spawn(async move {
                    let result = gateway.classify(&email).await;
                    (email, result)
                }));
            }

            for handle in handles {
                let (email, outcome) = handle
                    .await
                    .map_err(|e| Error::Config(format!("classification task failed: {}", e)))?;

                match outcome {
                    Ok(analysis) => {
                        self.persist(&analysis)?;
                        report.completed += 1;
                    }
                    Err(e) if e.is_quota_exhausted() => {
                        report.failed += 1;
                        report.quota_exhausted = true;
                        tracing::warn!(
                            sender = %email.sender,
                            error = %e,
                            "Provider quota exhausted, aborting batch"
                        );
                    }
                    Err(e @ Error::Config(_)) => return Err(e),
                    Err(e) => {
                        report.failed += 1;
                        tracing::warn!(
                            sender = %email.sender,
                            error = %e,
                            "Email classification failed"
                        );
                    }
                }
            }

            if report.quota_exhausted {
                break;
            }
        }

        tracing::info!(
            completed = report.completed,
            failed = report.failed,
            quota_exhausted = report.quota_exhausted,
            "Batch analysis finished"
        );

        Ok(report)
    }

    /// Write one analysis through the aggregation store: profile update,
    /// history row, context record.
    fn persist(&self, analysis: &Analysis) -> Result<()> {
        let email = &analysis.email_data;
        let email_id = uuid::Uuid::new_v4().to_string();

        self.db.upsert_sender_profile(
            &email.sender,
            &email.sender_name,
            &analysis.sender_importance,
            INTERACTION_ANALYZED,
        )?;

        self.db.append_priority_history(
            &email_id,
            &email.sender,
            &analysis.priority,
            None,
            &analysis.categories,
        )?;

        self.db.upsert_email_context(
            &email_id,
            &email.sender,
            &email.subject,
            &analysis.summary,
            analysis,
            &email.body,
        )?;

        Ok(())
    }
}
