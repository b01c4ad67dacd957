use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint, builder::BoolishValueParser};
use patientdesk_api_types::{PatientStatus, SortColumn, SortOrder};
use uuid::Uuid;

/// Command-line arguments for the PatientDesk binary.
#[derive(Debug, Parser)]
#[command(
    name = "patientdesk",
    version,
    about = "Patient records dashboard client"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "PATIENTDESK_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    /// Render command output as text or JSON.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the backend base URL, e.g. <http://127.0.0.1:8000/api/>.
    #[arg(long = "api-base-url", value_name = "URL", global = true)]
    pub api_base_url: Option<String>,

    /// Override the per-request timeout in milliseconds.
    #[arg(long = "api-timeout-ms", value_name = "MS", global = true)]
    pub api_timeout_ms: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Patient records (list/show/create/update/delete).
    Patients(PatientsArgs),
    /// Clinical notes of one patient.
    Notes(NotesArgs),
    /// Generated summary of one patient.
    Summary {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: Uuid,
    },
    /// Interactive patient list driven by commands on stdin.
    Browse(BrowseArgs),
}

#[derive(Debug, Args, Clone)]
pub struct PatientsArgs {
    #[command(subcommand)]
    pub action: PatientsCmd,
}

#[derive(Debug, Subcommand, Clone)]
pub enum PatientsCmd {
    /// List patients with optional search, filter and sorting.
    List(ListArgs),
    /// Show one patient.
    Show {
        #[arg(value_name = "ID")]
        id: Uuid,
    },
    /// Create a patient from a JSON form file.
    Create {
        #[arg(long, value_name = "JSON", value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Replace a patient's fields from a JSON form file.
    Update {
        #[arg(value_name = "ID")]
        id: Uuid,
        #[arg(long, value_name = "JSON", value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Delete a patient and their notes.
    Delete {
        #[arg(value_name = "ID")]
        id: Uuid,
    },
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListArgs {
    /// Match against name, email or phone.
    #[arg(long)]
    pub search: Option<String>,
    /// active|inactive|critical
    #[arg(long)]
    pub status: Option<PatientStatus>,
    /// last_name|date_of_birth|status|last_visit_date
    #[arg(long = "sort-by")]
    pub sort_by: Option<SortColumn>,
    /// asc|desc
    #[arg(long = "sort-order")]
    pub sort_order: Option<SortOrder>,
    /// Page size (1-100); defaults to `list.page_size`.
    #[arg(long)]
    pub limit: Option<u32>,
    /// Zero-based page index.
    #[arg(long, default_value_t = 0)]
    pub page: u32,
}

#[derive(Debug, Args, Clone)]
pub struct NotesArgs {
    #[command(subcommand)]
    pub action: NotesCmd,
}

#[derive(Debug, Subcommand, Clone)]
pub enum NotesCmd {
    /// List a patient's notes.
    List {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: Uuid,
    },
    /// Add a note to a patient.
    Add {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: Uuid,
        #[arg(long)]
        content: String,
        /// RFC 3339 or YYYY-MM-DDTHH:MM (UTC); defaults to now.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Delete one note.
    Delete {
        #[arg(value_name = "PATIENT_ID")]
        patient_id: Uuid,
        #[arg(value_name = "NOTE_ID")]
        note_id: Uuid,
    },
}

#[derive(Debug, Args, Default, Clone)]
pub struct BrowseArgs {
    /// Override the search debounce window in milliseconds.
    #[arg(long = "debounce-ms", value_name = "MS")]
    pub debounce_ms: Option<u64>,
}
