pub mod aggregator;
pub mod dispatcher;
pub mod login;
pub mod metrics;
pub mod playlist;
pub mod relay;
pub mod xtream;
