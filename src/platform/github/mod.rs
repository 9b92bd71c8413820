pub mod client;
pub mod mapper;
pub mod retry;
pub mod url;

pub use client::GitHubPlatform;
pub use url::PrRef;
