pub mod app;
pub mod cli;
pub mod shutdown;

#[cfg(test)]
pub mod cli_integration_tests;
