pub mod client;
pub mod http;
pub mod types;

pub use client::ApiClient;
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use types::{AccessLevel, AccessSummary, BackendHealth, Resource, ResourceBatch, UserProfile};
