use std::{process, sync::Arc};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use folio::{
    application::{
        aggregator::{ProfileAggregator, ProfileSources},
        error::AppError,
        invalidation::PageInvalidator,
        jobs::{RefreshProfileContext, next_runs, process_refresh_profile_job},
        profile_job::ProfileJob,
        trigger::TriggerGuard,
    },
    cache::{DevCacheConfig, DevCaches},
    config::{self, Command, RefreshArgs, Settings},
    infra::{
        cache::ResponseCache,
        error::InfraError,
        http::{self, DebugSources, HttpState},
        kv::{KvBackend, KvConnection, seed_development_data},
        providers::{FeedlyClient, OpenAiBlurb, OpenMeteoClient, SpotifyClient, http_client},
        revalidate::RevalidateClient,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;
    telemetry::describe_metrics();

    match command {
        Command::Serve(_) => run_serve(settings).await,
        Command::Refresh(args) => run_refresh(settings, args).await,
    }
}

struct ApplicationContext {
    job: Arc<ProfileJob>,
    kv: KvConnection,
    response_cache: ResponseCache,
    debug: DebugSources,
}

async fn build_application_context(settings: &Settings) -> Result<ApplicationContext, AppError> {
    let http = http_client().map_err(|err| InfraError::http_client(err.to_string()))?;

    let kv = KvBackend::from_settings(&settings.kv).connect(settings.kv.timeout)?;
    if let Some(memory) = &kv.memory
        && settings.app.environment.is_development()
        && settings.kv.seed_development_data
    {
        seed_development_data(
            memory,
            &settings.weather.city,
            &settings.blurb.owner_name,
            settings.profile.ttl,
        )
        .await?;
    }

    let caches = Arc::new(DevCaches::new(&DevCacheConfig::from(settings)));
    let weather = Arc::new(OpenMeteoClient::new(
        http.clone(),
        settings.weather.clone(),
        kv.store.clone(),
        caches.clone(),
    ));
    let feed = Arc::new(FeedlyClient::new(
        http.clone(),
        settings.feed.clone(),
        kv.store.clone(),
        caches.clone(),
    ));
    let music = Arc::new(SpotifyClient::new(
        http.clone(),
        settings.music.clone(),
        kv.store.clone(),
        caches,
    ));
    let blurb = Arc::new(OpenAiBlurb::new(
        http.clone(),
        settings.blurb.clone(),
        kv.store.clone(),
    ));

    let aggregator = ProfileAggregator::new(
        ProfileSources {
            weather: weather.clone(),
            articles: feed.clone(),
            music,
        },
        kv.store.clone(),
        settings.profile.provider_timeout,
        settings.weather.city.clone(),
    );

    let response_cache = ResponseCache::new(settings.profile.response_cache);
    let revalidate = RevalidateClient::from_settings(
        http,
        &settings.revalidate,
        settings.profile.provider_timeout,
    );
    let invalidator = PageInvalidator::new(Some(response_cache.clone()), revalidate);

    let job = Arc::new(ProfileJob::new(
        aggregator,
        blurb,
        kv.store.clone(),
        settings.profile.ttl,
        invalidator,
    ));

    Ok(ApplicationContext {
        job,
        kv,
        response_cache,
        debug: DebugSources { weather, feed },
    })
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;

    let guard = TriggerGuard::new(settings.cron.secret.clone());
    if !guard.is_configured() {
        warn!(
            target = "folio::config",
            "cron.secret is not set, the update trigger will reject every request"
        );
    }

    let monitor_handle = settings
        .cron
        .enabled
        .then(|| spawn_job_monitor(app.job.clone(), &settings.cron));

    let state = HttpState {
        job: app.job,
        guard,
        kv: app.kv.store,
        memory: app.kv.memory,
        response_cache: app.response_cache,
        environment: settings.app.environment,
        debug: Some(app.debug),
    };

    let result = serve_http(&settings, state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_refresh(settings: Settings, args: RefreshArgs) -> Result<(), AppError> {
    let app = build_application_context(&settings).await?;
    let report = app.job.run().await?;

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .map_err(|err| AppError::unexpected(format!("failed to encode report: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn spawn_job_monitor(
    job: Arc<ProfileJob>,
    cron: &config::CronSettings,
) -> tokio::task::JoinHandle<()> {
    for at in next_runs(&cron.schedule, 3) {
        info!(target = "folio::job", next_run = %at, "Scheduled profile refresh");
    }

    let refresh_worker = WorkerBuilder::new("refresh-profile-worker")
        .data(RefreshProfileContext { job })
        .backend(CronStream::new(cron.schedule.clone()))
        .build_fn(process_refresh_profile_job);

    let monitor = Monitor::new().register(refresh_worker);

    tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    })
}

async fn serve_http(settings: &Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "folio::http",
        addr = %settings.server.addr,
        environment = %settings.app.environment,
        "Listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
