use std::{
    io::{self, BufWriter, Write},
    process,
    sync::Arc,
};

use spacetraveling::{
    application::{
        content::ContentSource,
        error::AppError,
        feed::FeedService,
        prerender::PrerenderedSite,
        site::{SiteChrome, SiteRenderer},
    },
    config,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        prismic::PrismicClient,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
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
        config::Command::Posts(args) => run_list_posts(settings, args).await,
    }
}

fn build_content_source(settings: &config::Settings) -> Result<Arc<dyn ContentSource>, AppError> {
    let endpoint = settings.content.endpoint.clone().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "content.endpoint must be set (config file, SPACETRAVELING__CONTENT__ENDPOINT or --content-endpoint)",
        ))
    })?;

    let client = PrismicClient::new(endpoint, settings.content.access_token.clone())
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(Arc::new(client))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let source = build_content_source(&settings)?;
    let feed = Arc::new(FeedService::new(source, settings.content.feed_limits()));
    let chrome = SiteChrome {
        title: settings.site.title.clone(),
        timezone: settings.site.timezone,
        comments: settings.comments.clone().map(Into::into),
    };
    let renderer = Arc::new(SiteRenderer::new(feed, chrome));

    let site = PrerenderedSite::build(Arc::clone(&renderer)).await?;
    let router = http::build_router(HttpState {
        renderer,
        site: Arc::new(site),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "spacetraveling::main",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_list_posts(
    settings: config::Settings,
    args: config::PostsArgs,
) -> Result<(), AppError> {
    let source = build_content_source(&settings)?;
    let feed = FeedService::new(source, settings.content.feed_limits());
    let page = feed.collect_posts(args.page_size, args.limit).await?;

    let limit = args.limit.unwrap_or(usize::MAX);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for summary in page.results.iter().take(limit) {
        let line = serde_json::to_string(summary)
            .map_err(|err| AppError::unexpected(format!("failed to encode post: {err}")))?;
        writeln!(out, "{line}").map_err(|err| AppError::from(InfraError::from(err)))?;
    }
    out.flush()
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(())
}
