//! Solr operator: command line, CRD installation and controller wiring

#![deny(missing_docs)]

pub mod cli;
pub mod controller_runner;
/// Startup utilities (CRD install)
pub mod startup;
