//! pbidoc: Power BI template documentation generator
//!
//! Library side of the `pbidoc` binary, split out so the whole run can be
//! driven from tests with a scripted text generator.

pub mod config;
pub mod pipeline;

pub use config::{ConfigOverrides, PbidocConfig};
pub use pipeline::{document, extract, read_package, DocumentRun};
