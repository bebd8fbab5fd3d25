pub mod cli;
pub mod config;
pub mod logging;
pub mod server;
pub mod solver_gateway;
