use std::{process, sync::Arc};

use bitacora::{
    application::{
        authoring::AuthoringService,
        blog::{BlogService, ReadingConfig},
        comments::CommentService,
        error::AppError,
        mail::MailTransport,
        repos::{
            AuthorsRepo, CommentsRepo, CommentsWriteRepo, PostsRepo, PostsWriteRepo, TagsRepo,
        },
        share::{ShareConfig, ShareService},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        mail::LogMailer,
        telemetry,
    },
};
use tokio::try_join;
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
    let (cli_args, settings) = config::load_with_cli()?;
    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    ensure_search_language(&repositories, &settings.search.language).await?;

    let (http_state, admin_state) = build_application_context(repositories, &settings);
    serve_http(&settings, http_state, admin_state).await
}

async fn ensure_search_language(
    repositories: &PostgresRepositories,
    language: &str,
) -> Result<(), AppError> {
    let known = repositories
        .search_language_exists(language)
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;
    if !known {
        return Err(config::LoadError::invalid(
            "search.language",
            format!("`{language}` is not a text-search configuration on this database"),
        )
        .into());
    }
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    info!(target = "bitacora::migrate", "migrations applied");
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| InfraError::database(err.to_string()))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> (HttpState, AdminState) {
    let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
    let tags_repo: Arc<dyn TagsRepo> = repositories.clone();
    let comments_repo: Arc<dyn CommentsRepo> = repositories.clone();
    let comments_write_repo: Arc<dyn CommentsWriteRepo> = repositories.clone();
    let authors_repo: Arc<dyn AuthorsRepo> = repositories.clone();
    let mailer: Arc<dyn MailTransport> = Arc::new(LogMailer);

    let blog = Arc::new(BlogService::new(
        posts_repo.clone(),
        tags_repo.clone(),
        comments_repo,
        ReadingConfig::from(settings),
    ));
    let comments = Arc::new(CommentService::new(posts_repo.clone(), comments_write_repo));
    let share = Arc::new(ShareService::new(
        posts_repo.clone(),
        mailer,
        ShareConfig::from(settings),
    ));
    let authoring = Arc::new(AuthoringService::new(
        authors_repo,
        posts_repo,
        posts_write_repo,
        tags_repo,
        settings.blog.timezone,
    ));

    let http_state = HttpState {
        blog,
        comments: comments.clone(),
        share,
        db: repositories.clone(),
    };
    let admin_state = AdminState {
        authoring,
        comments,
        db: repositories,
    };
    (http_state, admin_state)
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let admin_router = http::build_admin_router(admin_state);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(InfraError::from)?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(InfraError::from)?;

    info!(
        target = "bitacora::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        "listening"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!(target = "bitacora::serve", "listeners stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(
            target = "bitacora::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
