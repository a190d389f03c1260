pub mod clustering;
pub mod detector;
pub mod edit;
pub mod environment;
pub mod ingest;
pub mod languages;
pub mod logging;
pub mod lookup;
pub mod monitor;
pub mod notify;
pub mod social;
pub mod sweeper;
pub mod tuning;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_CLUSTER: &str = "cluster";
pub const TARGET_INGEST: &str = "ingest";
