//! # hostkit
//!
//! Host configuration store and lifecycle orchestration.
//!
//! A host is a private directory under `<home>/hosts/<name>`. On creation,
//! configuration fragments for Terraform, Packer and Ansible are collected
//! from layered source directories, merged with variables derived from the
//! application definition, and written into the host directory. A [`Host`]
//! then drives the tools against that shared state.
//!
//! ## Example
//!
//! ```no_run
//! use hostkit::{Host, HostOptions, HostRequest, HostStore, Paths, SystemRunner};
//! use std::sync::Arc;
//!
//! let paths = Paths::from_env().expect("no home directory");
//! let toolchain = Arc::new(toolchain::Client::new(paths.home()));
//! let store = HostStore::new(paths);
//!
//! let options = HostOptions {
//!     host: HostRequest {
//!         application: Some("application.yml".into()),
//!         provider: Some("aws,eu-west-1".to_string()),
//!         ..HostRequest::default()
//!     },
//!     ..HostOptions::default()
//! };
//! let host = Host::open(&store, toolchain, Arc::new(SystemRunner), options).expect("open failed");
//! println!("{}", host.plan().expect("plan failed"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ansible;
pub mod error;
pub mod host;
pub mod packer;
pub mod paths;
pub mod retry;
pub mod runner;
pub mod settings;
pub mod sources;
pub mod store;
pub mod terraform;
pub mod variables;

pub use error::{Error, ErrorCategory, Result};
pub use host::{Host, HostOptions};
pub use paths::Paths;
pub use retry::RetryConfig;
pub use runner::{MockRunner, Output, Runner, SystemRunner};
pub use settings::Settings;
pub use store::{HostConfig, HostRequest, HostStore};
