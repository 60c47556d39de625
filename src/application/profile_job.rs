//! The scheduled profile update: aggregate, persist, summarize, invalidate.

use std::{sync::Arc, time::Duration};

use folio_api_types::{Profile, UpdateProfileResponse};
use metrics::counter;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::{
    application::{
        aggregator::ProfileAggregator,
        error::AppError,
        invalidation::{InvalidationReport, PageInvalidator},
    },
    infra::{
        kv::{BLURB_KEY, KvStore, PROFILE_KEY, SetOptions},
        providers::BlurbSource,
    },
};

const SUCCESS_MESSAGE: &str = "Profile updated successfully";

/// Outcome of one successful run, printed by `folio refresh`.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub run_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub profile: Profile,
    pub blurb: String,
    pub failures: Vec<String>,
    pub invalidation: InvalidationReport,
}

impl JobReport {
    pub fn response(&self) -> UpdateProfileResponse {
        UpdateProfileResponse::success(self.timestamp, SUCCESS_MESSAGE)
    }
}

pub struct ProfileJob {
    aggregator: ProfileAggregator,
    blurb: Arc<dyn BlurbSource>,
    kv: Arc<dyn KvStore>,
    ttl: Duration,
    invalidator: PageInvalidator,
}

impl ProfileJob {
    pub fn new(
        aggregator: ProfileAggregator,
        blurb: Arc<dyn BlurbSource>,
        kv: Arc<dyn KvStore>,
        ttl: Duration,
        invalidator: PageInvalidator,
    ) -> Self {
        Self {
            aggregator,
            blurb,
            kv,
            ttl,
            invalidator,
        }
    }

    /// Run the update once. Only store writes can fail it.
    pub async fn run(&self) -> Result<JobReport, AppError> {
        let result = self.run_inner().await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        counter!("folio_profile_job_total", "outcome" => outcome).increment(1);
        if let Err(err) = &result {
            error!(target = "folio::job", error = %err, "Profile update failed");
        }
        result
    }

    async fn run_inner(&self) -> Result<JobReport, AppError> {
        let aggregation = self.aggregator.aggregate().await;
        let options = SetOptions::expire_after(self.ttl);

        self.kv
            .set(PROFILE_KEY, &aggregation.profile, options)
            .await?;
        info!(
            target = "folio::job",
            run_id = %aggregation.run_id,
            ttl_secs = self.ttl.as_secs(),
            "Profile persisted"
        );

        let blurb = self.blurb.blurb(&aggregation.profile).await;
        self.kv.set(BLURB_KEY, blurb.as_str(), options).await?;
        info!(
            target = "folio::job",
            run_id = %aggregation.run_id,
            "Blurb persisted"
        );

        let invalidation = self.invalidator.invalidate().await;

        Ok(JobReport {
            run_id: aggregation.run_id,
            timestamp: OffsetDateTime::now_utc(),
            profile: aggregation.profile,
            blurb,
            failures: aggregation
                .failures
                .into_iter()
                .map(|(provider, message)| format!("{provider}: {message}"))
                .collect(),
            invalidation,
        })
    }
}
