//! specbench: launches speculative-decoding benchmark runs and the tools
//! that build datastores and compare their transcripts.

pub mod cli;
pub mod compare;
pub mod config;
pub mod datastore;
pub mod error;
pub mod method;
pub mod naming;
pub mod process;
pub mod report;
pub mod signal;
pub mod transcript;
