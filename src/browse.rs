//! Interactive patient list driven by commands read from stdin.
//!
//! Each line is one user interaction. Search text is debounced exactly as a
//! search box would be: only the last input of a burst reaches the backend.

use std::time::Duration;

use patientdesk::{
    application::{
        error::AppError,
        list_query::{ListEvent, ListQueryParams, Transition},
        patient_list::PatientListController,
    },
    cache::CacheEntry,
    config::OutputFormat,
    infra::error::InfraError,
};
use patientdesk_api_types::{PatientPage, PatientStatus, SortColumn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::commands::Context;
use crate::output;

const HELP: &str = "\
commands:
  search <text>      filter by name, email or phone (empty clears)
  status <s|all>     active|inactive|critical|all
  sort <column>      last_name|date_of_birth|status|last_visit_date
  page <n>           zero-based page index
  size <n>           rows per page (1-100)
  retry              reload the current page
  quit
";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Event(ListEvent),
    Retry,
    Help,
    Quit,
}

pub async fn run(ctx: &Context, debounce: Duration) -> Result<(), AppError> {
    let mut list = PatientListController::new(ctx.queries.clone(), ctx.page_size, debounce);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    show(ctx.output, &mut list).await?;

    loop {
        let deadline = list.next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.map_err(InfraError::from)? else {
                    if list.settle().await == Transition::ParamsChanged {
                        show(ctx.output, &mut list).await?;
                    }
                    break;
                };
                match parse(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Help) => print!("{HELP}"),
                    Ok(Input::Retry) => {
                        let params = list.params().clone();
                        if let Some(entry) = list.retry().await {
                            render(ctx.output, entry, &params)?;
                        }
                    }
                    Ok(Input::Event(event)) => {
                        if list.dispatch(event, Instant::now()) == Transition::ParamsChanged {
                            show(ctx.output, &mut list).await?;
                        }
                    }
                    Err(message) => println!("{message}"),
                }
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if list.poll_search(Instant::now()) == Transition::ParamsChanged {
                    show(ctx.output, &mut list).await?;
                }
            }
        }
    }

    list.teardown();
    Ok(())
}

async fn show(format: OutputFormat, list: &mut PatientListController) -> Result<(), AppError> {
    let params = list.params().clone();
    debug!(key = %list.current_key(), "Loading patient list");
    match list.load().await {
        Some(entry) => render(format, entry, &params),
        None => Ok(()),
    }
}

fn render(
    format: OutputFormat,
    entry: &CacheEntry<PatientPage>,
    params: &ListQueryParams,
) -> Result<(), AppError> {
    if let Some(page) = entry.data() {
        output::patient_page(format, page, params)?;
    }
    if let Some(error) = entry.error() {
        println!("error: {}", error.user_message());
    }
    Ok(())
}

fn parse(line: &str) -> Result<Input, String> {
    let line = line.trim();
    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map(|(command, arg)| (command, arg.trim()))
        .unwrap_or((line, ""));

    match command {
        "" | "help" => Ok(Input::Help),
        "quit" | "exit" => Ok(Input::Quit),
        "retry" => Ok(Input::Retry),
        "search" => Ok(Input::Event(ListEvent::SearchInput(arg.to_string()))),
        "status" => match arg {
            "all" | "" => Ok(Input::Event(ListEvent::StatusFilter(None))),
            other => other
                .parse::<PatientStatus>()
                .map(|status| Input::Event(ListEvent::StatusFilter(Some(status))))
                .map_err(|err| err.to_string()),
        },
        "sort" => arg
            .parse::<SortColumn>()
            .map(|column| Input::Event(ListEvent::SortClicked(column)))
            .map_err(|err| err.to_string()),
        "page" => number(arg).map(|page| Input::Event(ListEvent::PageChanged(page))),
        "size" => number(arg).map(|size| Input::Event(ListEvent::PageSizeChanged(size))),
        other => Err(format!("unknown command `{other}`; type `help`")),
    }
}

fn number(arg: &str) -> Result<u32, String> {
    arg.parse::<u32>()
        .map_err(|_| format!("expected a non-negative number, got `{arg}`"))
}
