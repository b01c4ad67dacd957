//! Application services: reads, writes, list state and forms.

pub mod debounce;
pub mod error;
pub mod forms;
pub mod list_query;
pub mod mutations;
pub mod patient_list;
pub mod queries;
pub mod repos;

#[cfg(test)]
pub(crate) mod fake;
