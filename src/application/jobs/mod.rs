mod refresh_profile;

pub use refresh_profile::{
    RefreshProfileContext, RefreshProfileJob, next_runs, process_refresh_profile_job,
};
