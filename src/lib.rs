//! # git-drover
//!
//! Bulk-migrate git repositories from Bitbucket to GitHub
//!
//! ## Usage
//!
//! ```txt
//! Usage: git-drover [OPTIONS] <COMMAND>
//!
//! Commands:
//!   list    List the repositories of a Bitbucket project into a file
//!   mirror  Mirror-clone (or update) every repository in a list file
//!   create  Create one GitHub repository per local mirror
//!   push    Push every local mirror to the GitHub organization
//!   delete  Delete the GitHub repository of every local mirror
//!   scan    Scan cloned repositories for oversized objects
//!
//! Options:
//!       --concurrency <CONCURRENCY>    Maximum repositories processed at once [default: 4]
//!       --attempts <ATTEMPTS>          Attempts per repository (1 initial + retries) [default: 4]
//!       --task-timeout <TASK_TIMEOUT>  Hard deadline for each attempt, in seconds [default: 300]
//!   -h, --help                         Print help
//!   -V, --version                      Print version
//! ```
//!
//! Credentials are read from the environment (`BB_TOKEN`, `GITHUB_TOKEN`),
//! with `.env` support.

#![warn(clippy::all, rust_2018_idioms)]
#![deny(
    missing_docs,
    clippy::all,
    clippy::missing_docs_in_private_items,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![warn(clippy::multiple_crate_versions)]

pub(crate) mod backoff;
pub(crate) mod bitbucket;
pub(crate) mod cli;
pub(crate) mod commands;
pub(crate) mod errors;
pub(crate) mod git;
pub(crate) mod github;
pub(crate) mod logs;
pub(crate) mod orchestrator;
pub(crate) mod repolist;
pub(crate) mod retry;
pub(crate) mod runner;
pub(crate) mod scan;

pub use cli::{git_drover_main, GitDroverCli};
pub use errors::DroverError;
