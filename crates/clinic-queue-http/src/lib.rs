// Clinic Queue HTTP transport
//
// Decision: REST calls and the push stream share one ApiConfig but use separate reqwest clients
// Decision: Undecodable bodies are Validation errors, never silently defaulted

pub mod client;
pub mod config;
pub mod push;

pub use client::HttpQueueClient;
pub use config::ApiConfig;
pub use push::SsePushChannel;
