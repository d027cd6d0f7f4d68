use std::process;
use std::sync::Arc;
use std::time::Duration;

use pressroom::application::error::AppError;
use pressroom::application::files::FileService;
use pressroom::application::feeds::FeedService;
use pressroom::application::pages::PageService;
use pressroom::application::previews::PreviewService;
use pressroom::application::repos::ContentRepository;
use pressroom::application::search::SearchService;
use pressroom::cache::ResponseCache;
use pressroom::config;
use pressroom::dispatch::handlers::{
    ActionRequestHandler, FeedRequestHandler, FileRequestHandler, ImageRequestHandler,
    PageRequestHandler, StaticRequestHandler,
};
use pressroom::dispatch::{ActionRegistry, RequestHandler, SiteDispatcher};
use pressroom::infra::content_store::ContentStore;
use pressroom::infra::error::InfraError;
use pressroom::infra::http::{self, HttpState, UserDirectory};
use pressroom::infra::repository::FsContentRepository;
use pressroom::infra::telemetry;
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
    let (cli_args, mut settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(config::ServeArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(args) => {
            config::apply_serve_overrides(&mut settings, &args);
            run_serve(settings).await
        }
        config::Command::ExportSite(args) => run_export(settings, args).await,
        config::Command::ImportSite(args) => run_import(settings, args).await,
    }
}

async fn open_repository(
    settings: &config::Settings,
) -> Result<Arc<FsContentRepository>, AppError> {
    let repository = match &settings.repository.data_dir {
        Some(dir) => FsContentRepository::open(dir.join("resources")).await?,
        None => FsContentRepository::in_memory(),
    };
    Ok(Arc::new(repository))
}

async fn open_content_store(settings: &config::Settings) -> Result<Arc<ContentStore>, AppError> {
    let store = match &settings.repository.data_dir {
        Some(dir) => ContentStore::open(dir.join("content"))
            .await
            .map_err(AppError::from)?,
        None => ContentStore::in_memory(),
    };
    Ok(Arc::new(store))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let addr = settings
        .server
        .addr()
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let repository: Arc<dyn ContentRepository> = open_repository(&settings).await?;
    let content_store = open_content_store(&settings).await?;
    let cache = Arc::new(ResponseCache::new(&settings.cache));

    let previews = Arc::new(PreviewService::new(repository.clone()));
    let pages = Arc::new(PageService::new(
        repository.clone(),
        cache.clone(),
        previews.clone(),
    ));
    let files = Arc::new(FileService::new(
        repository.clone(),
        content_store,
        cache.clone(),
    ));
    let search = Arc::new(SearchService::new(repository.clone()));
    let feeds = Arc::new(FeedService::new(
        repository.clone(),
        settings.site.title.clone(),
        settings.site.base_url.clone(),
    ));

    let valid_time = settings.cache.default_expiration();
    let recheck_time = settings.cache.default_revalidation();
    let actions = Arc::new(ActionRegistry::new());
    let handlers: Vec<Box<dyn RequestHandler>> = vec![
        Box::new(ActionRequestHandler::new(actions.clone(), cache.clone())),
        Box::new(PageRequestHandler::new(
            repository.clone(),
            cache.clone(),
            valid_time,
            recheck_time,
        )),
        Box::new(FileRequestHandler::new(files.clone())),
        Box::new(ImageRequestHandler::new(
            files.clone(),
            settings.images.styles.clone(),
        )),
        Box::new(FeedRequestHandler::new(
            feeds,
            cache.clone(),
            valid_time,
            recheck_time,
        )),
        Box::new(StaticRequestHandler::new(
            settings.static_files.directory.clone(),
        )),
    ];
    let dispatcher = Arc::new(SiteDispatcher::new(handlers));

    let directory = Arc::new(UserDirectory::from_settings(&settings.security.accounts));
    if directory.is_empty() {
        info!("no accounts configured; the API is read-only for anonymous callers");
    }

    let state = HttpState {
        site: settings.site.name.clone(),
        pages,
        files,
        search,
        previews,
        dispatcher,
        directory,
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(%addr, site = %settings.site.name, "pressroom listening");
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
    Ok(())
}

async fn run_export(
    settings: config::Settings,
    args: config::ExportArgs,
) -> Result<(), AppError> {
    let repository = open_repository(&settings).await?;
    let resources = repository.export().await?;

    let mut written = 0usize;
    for resource in &resources {
        let uri = resource.uri();
        let dir = args.dir.join(&uri.site).join(uri.id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
        let file = dir.join(format!("{}.xml", uri.version));
        tokio::fs::write(&file, resource.to_xml())
            .await
            .map_err(|err| AppError::from(InfraError::from(err)))?;
        written += 1;
    }
    info!(
        resources = written,
        dir = %args.dir.display(),
        "export completed"
    );
    Ok(())
}

async fn run_import(
    settings: config::Settings,
    args: config::ImportArgs,
) -> Result<(), AppError> {
    let source = FsContentRepository::open(&args.dir).await?;
    let target = open_repository(&settings).await?;

    let resources = source.export().await?;
    let mut imported = 0usize;
    for resource in resources {
        target.import(resource).await?;
        imported += 1;
    }
    info!(
        resources = imported,
        dir = %args.dir.display(),
        "import completed"
    );
    Ok(())
}
