// Library root: exposes the command layer so integration tests and the
// binary share one API.

pub mod cli;
pub mod commands;
pub mod export;
pub mod jobs;
