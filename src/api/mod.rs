//! Backend API access

pub mod client;
pub mod probe;
pub mod types;

pub use client::ApiClient;
pub use types::{
    AdminActionResponse, ApiResult, HealthResponse, HelloResponse, TokenMetadata, UserInfoClaims,
    UserInfoResponse,
};
