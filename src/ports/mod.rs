//! Port traits between the scoring engine and the outside world.

pub mod config_port;
pub mod confirmation_port;
pub mod decision_sink;
pub mod execution_port;
pub mod market_data_port;
pub mod outcome_archive_port;
pub mod weight_repository_port;
