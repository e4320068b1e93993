//! Integration tests for the domain pipeline and the batch scheduler
//!
//! Sites are scripted in-process; storage is in memory and checkpoints live
//! in temporary directories.

mod pipeline_tests;
mod scheduler_tests;
mod support;
