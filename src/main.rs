use std::{future::IntoFuture, process, sync::Arc};

use pressroom::{
    application::{
        error::AppError,
        origin::{OriginSources, resolve_origin},
        render::{DocumentRenderer, PdfService, RenderPipeline, RenderTuning},
    },
    config::{self, Command, EnvSnapshot, GenerateArgs, Settings},
    domain::document::DocumentSpec,
    infra::{
        batch::{self, BatchError, BatchPlan},
        browser::{BinaryResolver, ChromiumEngine, HostContext, HostEnvironment},
        ephemeral::EphemeralStaticServer,
        error::InfraError,
        function::{self, FunctionEvent},
        http::{self, HttpState},
        site::StaticSite,
        telemetry,
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    sync::Notify,
    time::sleep,
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

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    let env = EnvSnapshot::capture()?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;
    info!(
        target = "pressroom::main",
        command = command.name(),
        "starting"
    );

    match command {
        Command::Serve(_) => run_serve(settings, env).await,
        Command::Generate(args) => run_generate(settings, env, args).await,
        Command::Invoke(_) => run_invoke(settings, env).await,
    }
}

fn host_environment(
    context: HostContext,
    settings: &Settings,
    env: &EnvSnapshot,
) -> Result<HostEnvironment, AppError> {
    let working_dir = std::env::current_dir().map_err(InfraError::from)?;
    Ok(HostEnvironment {
        context,
        explicit_executable: settings
            .browser
            .executable
            .clone()
            .or_else(|| env.chrome_path.clone()),
        package_root: settings
            .browser
            .package_root
            .clone()
            .or_else(|| env.lambda_task_root.clone()),
        working_dir,
    })
}

fn pdf_service(
    settings: &Settings,
    origins: OriginSources,
    host: HostEnvironment,
    tuning: RenderTuning,
) -> PdfService<ChromiumEngine> {
    let pipeline =
        RenderPipeline::new(ChromiumEngine, tuning).with_sandbox(settings.browser.sandbox);
    PdfService::new(
        pipeline,
        origins,
        BinaryResolver::on_disk(host),
        settings.documents.catalog.clone(),
        settings.documents.product.clone(),
    )
}

async fn run_serve(settings: Settings, env: EnvSnapshot) -> Result<(), AppError> {
    let addr = settings.server.addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| InfraError::bind(addr, err))?;
    let local_addr = listener.local_addr().map_err(InfraError::from)?;

    let origins = OriginSources::server(
        &env,
        &settings.origin,
        local_addr,
        settings.server.serves_build(),
    );
    match resolve_origin(&origins) {
        Ok(origin) => info!(
            target = "pressroom::main",
            origin = %origin,
            "printing from origin"
        ),
        Err(err) => warn!(
            target = "pressroom::main",
            error = %err,
            "no origin resolved; PDF requests will fail until one is configured"
        ),
    }

    let host = host_environment(HostContext::Server, &settings, &env)?;
    let renderer: Arc<dyn DocumentRenderer> = Arc::new(pdf_service(
        &settings,
        origins,
        host,
        settings.browser.tuning,
    ));
    let site = settings
        .server
        .site_dir
        .clone()
        .map(|dir| StaticSite::new(dir, settings.server.production));
    let router = http::build_router(HttpState::new(renderer, site));

    info!(
        target = "pressroom::main",
        addr = %local_addr,
        "server listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = Arc::clone(&shutdown);
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            wait_for_ctrl_c().await;
            trigger.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    let grace = settings.server.graceful_shutdown;
    tokio::select! {
        result = &mut server => result.map_err(InfraError::from)?,
        _ = async {
            shutdown.notified().await;
            sleep(grace).await;
        } => warn!(
            target = "pressroom::main",
            grace_secs = grace.as_secs(),
            "graceful shutdown timed out; dropping open connections"
        ),
    }

    info!(target = "pressroom::main", "server stopped");
    Ok(())
}

async fn wait_for_ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "pressroom::main",
            error = %err,
            "failed to install Ctrl-C handler"
        );
        std::future::pending::<()>().await;
    }
}

async fn run_generate(
    settings: Settings,
    env: EnvSnapshot,
    args: GenerateArgs,
) -> Result<(), AppError> {
    let site_dir = settings.batch.site_dir.clone();
    if !site_dir.is_dir() {
        return Err(InfraError::configuration(format!(
            "site directory `{}` does not exist; build the site first",
            site_dir.display()
        ))
        .into());
    }

    let documents = settings
        .batch
        .documents
        .iter()
        .map(|key| settings.documents.catalog.by_key(key).cloned())
        .collect::<Result<Vec<DocumentSpec>, _>>()?;
    let plan = BatchPlan::all_languages(documents, settings.batch.output_dir.clone());

    // CLI flag, then the platform's PORT, then configuration.
    let port = args
        .overrides
        .port
        .or(env.port)
        .unwrap_or(settings.batch.port);
    let host = host_environment(HostContext::Batch, &settings, &env)?;

    let server = EphemeralStaticServer::start(StaticSite::new(site_dir, true), port)
        .await
        .map_err(BatchError::Server)?;
    let origins = OriginSources::batch(&env, &settings.origin, server.addr());
    let service = pdf_service(&settings, origins, host, settings.browser.batch_tuning());

    let report = batch::generate(&service, server, &plan).await?;
    info!(
        target = "pressroom::main",
        files = report.written.len(),
        output_dir = %plan.output_dir.display(),
        "batch generation complete"
    );
    Ok(())
}

async fn run_invoke(settings: Settings, env: EnvSnapshot) -> Result<(), AppError> {
    let mut raw = String::new();
    tokio::io::stdin()
        .read_to_string(&mut raw)
        .await
        .map_err(InfraError::from)?;
    let event = FunctionEvent::parse(&raw)?;

    let origins = OriginSources::function_host(&env, &settings.origin);
    let host = host_environment(HostContext::FunctionHost, &settings, &env)?;
    let service = pdf_service(&settings, origins, host, settings.browser.tuning);

    let response =
        function::handle(&service, &settings.documents.function_document, &event).await;
    let mut body = serde_json::to_vec(&response)
        .map_err(|err| AppError::unexpected(format!("failed to encode response: {err}")))?;
    body.push(b'\n');

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&body).await.map_err(InfraError::from)?;
    stdout.flush().await.map_err(InfraError::from)?;
    Ok(())
}
