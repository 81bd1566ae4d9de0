use std::{process, sync::Arc};

use galatea::{
    application::{
        chrome::ChromeService, cms::CmsService, error::AppError, pool::ObjectPool,
        sitemap::SitemapService, thumbnails::ThumbnailService,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, GuestSessions, HttpState},
        media::MediaCache,
        telemetry,
        tryton::TrytonClient,
    },
};
use tokio::sync::Notify;
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
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Sitemap(args) => run_sitemap(settings, args).await,
        config::Command::Thumbnail(args) => run_thumbnail(settings, args).await,
    }
}

fn init_pool(settings: &config::Settings) -> Result<Arc<dyn ObjectPool>, AppError> {
    let client = TrytonClient::new(&settings.backend)?;
    info!(
        target = "galatea::bootstrap",
        endpoint = %client.endpoint(),
        "backend client ready"
    );
    Ok(Arc::new(client))
}

fn build_http_state(settings: &config::Settings) -> Result<HttpState, AppError> {
    let pool = init_pool(settings)?;
    let locales = Arc::new(settings.locale.clone());

    let chrome = ChromeService::new(
        CmsService::new(pool.clone()),
        settings.catalog,
        settings.cms.clone(),
    );
    let sitemap = SitemapService::new(pool, locales.clone(), &settings.site.base_url);
    let thumbnails =
        ThumbnailService::new(settings.thumbnail_config()).map_err(InfraError::from)?;
    let media = MediaCache::new(settings.media.cache_folder.clone());

    Ok(HttpState {
        chrome: Arc::new(chrome),
        sitemap: Arc::new(sitemap),
        thumbnails,
        media: Arc::new(media),
        locales,
        sessions: Arc::new(GuestSessions),
        site_title: Arc::from(settings.site.title.as_str()),
    })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_http_state(&settings)?;
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "galatea::bootstrap",
        addr = %settings.server.addr,
        "http server listening"
    );

    let stopping = Arc::new(Notify::new());
    let signal = {
        let stopping = stopping.clone();
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    };
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(signal);
    let mut server = std::pin::pin!(server.into_future());

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = stopping.notified() => {
            let grace = settings.server.graceful_shutdown;
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => {
                    result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
                }
                Err(_) => warn!(
                    target = "galatea::bootstrap",
                    grace_secs = grace.as_secs(),
                    "graceful shutdown timed out; dropping open connections"
                ),
            }
        }
    }

    info!(target = "galatea::bootstrap", "http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(err) => {
                warn!(
                    target = "galatea::bootstrap",
                    error = %err,
                    "failed to install SIGTERM handler; waiting for Ctrl-C only"
                );
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!(target = "galatea::bootstrap", "shutdown signal received");
}

async fn run_sitemap(settings: config::Settings, args: config::SitemapArgs) -> Result<(), AppError> {
    let pool = init_pool(&settings)?;
    let locales = Arc::new(settings.locale.clone());
    let sitemap = SitemapService::new(pool, locales, &settings.site.base_url);
    let xml = sitemap.sitemap_xml().await?;

    match args.file {
        Some(path) => {
            tokio::fs::write(&path, xml.as_bytes())
                .await
                .map_err(InfraError::from)?;
            info!(
                target = "galatea::sitemap",
                path = %path.display(),
                bytes = xml.len(),
                "sitemap written"
            );
        }
        None => print!("{xml}"),
    }

    Ok(())
}

async fn run_thumbnail(
    settings: config::Settings,
    args: config::ThumbnailArgs,
) -> Result<(), AppError> {
    let service =
        ThumbnailService::new(settings.thumbnail_config()).map_err(InfraError::from)?;
    let request = service
        .request(
            &args.source,
            &args.name,
            &args.size,
            args.crop.as_deref(),
            args.background.as_deref(),
            args.quality,
        )
        .map_err(|err| AppError::validation(err.to_string()))?;

    let url = service.render(request).await?;
    println!("{url}");
    Ok(())
}
