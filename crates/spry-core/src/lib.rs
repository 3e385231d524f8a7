pub mod catalog;
pub mod config;
pub mod error;
pub mod install;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod probe;
pub mod reporter;
pub mod resolver;

pub use catalog::Catalog;
pub use config::Config;
pub use error::{InstallError, PackageFailure, Stage};
pub use install::{InstalledBinary, Installer};
pub use paths::*;
pub use pipeline::{InstallReport, Pipeline, Plan, Verification};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("spry-core/", env!("CARGO_PKG_VERSION"));
