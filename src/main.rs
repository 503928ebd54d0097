use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use patternbook::{
    application::{
        admin::{AdminCategoryService, AdminPatternService},
        catalog::CatalogService,
        content::{ContentService, ContentStore},
        error::AppError,
        render::{RenderService, render_service},
        repos::{CategoriesRepo, CategoriesWriteRepo, PatternsRepo, PatternsWriteRepo},
    },
    cache::{CacheConfig, CacheTrigger, ContentCache},
    config,
    infra::{
        content::FileContentStore,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HealthProbe, PublicState},
        telemetry,
    },
};
use serde::Deserialize;
use tokio::{sync::watch, task::JoinHandle, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
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
        .map_err(|err| AppError::config(err.to_string()))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::CachePatterns(args) => run_cache_patterns(&settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings)?;

    let purge_handle = spawn_cache_purger(app.cache.clone());
    let result = serve_http(&settings, app.public_state, app.admin_state).await;

    purge_handle.abort();
    let _ = purge_handle.await;

    result
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

struct ApplicationContext {
    public_state: PublicState,
    admin_state: AdminState,
    cache: Arc<ContentCache>,
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let default_locale = settings.site.default_locale;

    let categories_repo: Arc<dyn CategoriesRepo> = repositories.clone();
    let categories_write_repo: Arc<dyn CategoriesWriteRepo> = repositories.clone();
    let patterns_repo: Arc<dyn PatternsRepo> = repositories.clone();
    let patterns_write_repo: Arc<dyn PatternsWriteRepo> = repositories.clone();
    let health: Arc<dyn HealthProbe> = repositories;

    let store = FileContentStore::new(settings.content.directory.clone()).map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "content directory `{}` is unusable: {err}",
            settings.content.directory.display()
        )))
    })?;
    let store: Arc<dyn ContentStore> = Arc::new(store);

    let cache = Arc::new(ContentCache::new(CacheConfig::from(&settings.cache)));
    let trigger = CacheTrigger::new(cache.clone());
    let renderer: Arc<dyn RenderService> = render_service();

    let content = Arc::new(ContentService::new(
        store,
        patterns_write_repo.clone(),
        cache.clone(),
        default_locale,
    ));

    let catalog = Arc::new(CatalogService::new(
        categories_repo.clone(),
        patterns_repo.clone(),
        content.clone(),
        cache.clone(),
        renderer,
        settings.catalog.related_limit,
    ));

    let admin_categories = Arc::new(AdminCategoryService::new(
        categories_repo.clone(),
        categories_write_repo,
        trigger.clone(),
        default_locale,
    ));
    let admin_patterns = Arc::new(AdminPatternService::new(
        patterns_repo,
        patterns_write_repo,
        categories_repo,
        content,
        trigger,
    ));

    info!(
        content_directory = %settings.content.directory.display(),
        default_locale = %default_locale,
        cache_enabled = settings.cache.enabled,
        "Application services initialised"
    );

    Ok(ApplicationContext {
        public_state: PublicState {
            catalog,
            health: health.clone(),
            default_locale,
        },
        admin_state: AdminState {
            categories: admin_categories,
            patterns: admin_patterns,
            cache: cache.clone(),
            health,
        },
        cache,
    })
}

fn spawn_cache_purger(cache: Arc<ContentCache>) -> JoinHandle<()> {
    let period = Duration::from_secs(cache.config().purge_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                info!(target = "patternbook::cache", purged, "Expired cache entries purged");
            }
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    public_state: PublicState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_public_router(public_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public_addr = %settings.server.public_addr,
        admin_addr = %settings.server.admin_addr,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()))
        .into_future();
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .into_future();

    let servers = async { try_join!(public_server, admin_server).map(|_| ()) };
    tokio::pin!(servers);

    let result = tokio::select! {
        result = &mut servers => result,
        () = shutdown_signal() => {
            info!(
                grace_seconds = settings.server.graceful_shutdown.as_secs(),
                "Shutdown signal received, draining connections"
            );
            let _ = shutdown_tx.send(true);
            match tokio::time::timeout(settings.server.graceful_shutdown, &mut servers).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Graceful shutdown timed out; dropping open connections");
                    Ok(())
                }
            }
        }
    };

    result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[derive(Debug, Deserialize)]
struct EvictResponse {
    evicted: usize,
}

async fn run_cache_patterns(
    settings: &config::Settings,
    args: config::CachePatternsArgs,
) -> Result<(), AppError> {
    let base = args
        .admin_url
        .unwrap_or_else(|| settings.server.admin_base_url());
    let endpoint = format!("{}/admin/cache/patterns", base.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|err| AppError::from(InfraError::http(err.to_string())))?;

    let response = client
        .post(&endpoint)
        .json(&serde_json::json!({ "all": args.all }))
        .send()
        .await
        .map_err(|err| AppError::from(InfraError::http(format!("{endpoint}: {err}"))))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::from(InfraError::http(format!(
            "{endpoint} answered {status}"
        ))));
    }

    let body: EvictResponse = response
        .json()
        .await
        .map_err(|err| AppError::from(InfraError::http(err.to_string())))?;

    info!(all = args.all, evicted = body.evicted, "Catalogue cache evicted");
    println!("evicted {} cache entries", body.evicted);
    Ok(())
}
