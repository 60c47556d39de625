//! Cron-driven profile refresh.

use std::sync::Arc;

use apalis::prelude::*;
use cron::Schedule;

use crate::application::profile_job::ProfileJob;

/// Marker struct for the cron-triggered refresh.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct RefreshProfileJob;

impl From<chrono::DateTime<chrono::Utc>> for RefreshProfileJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct RefreshProfileContext {
    pub job: Arc<ProfileJob>,
}

/// Run one update. Failures are logged and left for the next tick.
pub async fn process_refresh_profile_job(
    _job: RefreshProfileJob,
    ctx: Data<RefreshProfileContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.job.run().await {
        Ok(report) => {
            tracing::info!(
                target = "folio::job",
                run_id = %report.run_id,
                failures = report.failures.len(),
                "Scheduled profile refresh completed"
            );
        }
        Err(err) => {
            tracing::warn!(
                target = "folio::job",
                error = %err,
                "Scheduled profile refresh failed, retrying at the next tick"
            );
        }
    }
    Ok(())
}

/// Upcoming fire times of `schedule`, for start-up logging.
pub fn next_runs(schedule: &Schedule, count: usize) -> Vec<chrono::DateTime<chrono::Utc>> {
    schedule.upcoming(chrono::Utc).take(count).collect()
}
