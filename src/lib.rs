/// Launch Relay Bot Library
///
/// Polls X search and the SpaceX launch feed, filters and formats what it
/// finds, and republishes each item at most once.

pub mod bot;
pub mod cadence;
pub mod categories;
pub mod config;
pub mod dedup;
pub mod formatter;
pub mod http_server;
pub mod launch_window;
pub mod launches;
pub mod oauth;
pub mod pipeline;
pub mod poller;
pub mod scheduler;
pub mod twitter;
