#![allow(dead_code)]

//! End-to-end transfers over the built-in plugins, run against temp
//! directories.

pub mod integration;
pub mod utils;
