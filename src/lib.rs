//! Build, merge and prune FIX xml dictionaries.
//!
//! The three stages run in sequence: [`generator`] turns a csv table of
//! custom fields into a dictionary, [`merger`] combines it with an official
//! dictionary, and [`pruner`] strips the result down to the messages listed
//! in a keep-list.

pub mod data_dictionary;
pub mod dictionary_errors;
pub mod generator;
pub mod merger;
pub mod pruner;
pub mod report;
pub mod settings;
mod xml_output;

pub use data_dictionary::{FixDictionary, Member, MemberKind};
pub use dictionary_errors::{DResult, DictError};
pub use generator::{generate, generate_file, GenerateOptions, GenerateOptionsBuilder};
pub use merger::{merge, merge_files};
pub use pruner::{prune, prune_file, KeepList, PruneSummary};
pub use report::{Finding, FindingKind, Report, Section};
pub use settings::Settings;
