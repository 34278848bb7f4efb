//! Library half of the `openset` command line tool: config loading, CLI
//! overrides and report output. `main.rs` only parses arguments.
pub mod evaluate;
pub mod util;
