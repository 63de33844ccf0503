//! Core sitechat library (session engine, stream decoding, collaborators, config).

pub mod config;
pub mod identity;
pub mod logging;
pub mod scrape;
pub mod session;
pub mod site;
pub mod stream;
pub mod transport;
