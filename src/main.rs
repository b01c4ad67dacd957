use std::{process, sync::Arc};

use patientdesk::{
    application::{
        error::AppError,
        mutations::{MutationControl, MutationCoordinator},
        queries::QueryClient,
    },
    cache::CacheConfig,
    config::{self, Command},
    infra::{api::ApiClient, error::InfraError, telemetry},
};
use tracing::{Dispatch, Level, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

mod browse;
mod commands;
mod output;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        eprintln!("error: {}", error.user_message());
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        InfraError::configuration(format!("failed to load configuration: {err}"))
    })?;

    telemetry::init(&settings.logging)?;

    let api = ApiClient::new(&settings.api)?;
    let queries = QueryClient::new(Arc::new(api), &CacheConfig::from(&settings.cache));
    let mutations = MutationControl::new(MutationCoordinator::new(queries.clone()));
    let context = commands::Context {
        queries,
        mutations,
        output: cli_args.output,
        page_size: settings.list.page_size,
    };

    match cli_args.command {
        Command::Patients(args) => commands::patients(&context, args.action).await,
        Command::Notes(args) => commands::notes(&context, args.action).await,
        Command::Summary { patient_id } => commands::summary(&context, patient_id).await,
        Command::Browse(_) => browse::run(&context, settings.list.debounce).await,
    }
}
