//! HTTP client and single-consumer gateway actor fronting the upstream
//! transit-status API. Every public fetch is wrapped as
//! `retry(circuitBreaker(doFetch()))`, matching `cache-circuitbreaker` and
//! `cache-retry`'s Tower middleware composition.

mod client;
mod dto;
mod gateway;

pub use client::{UpstreamClient, UpstreamClientConfig};
pub use gateway::{UpstreamGateway, UpstreamGatewayHandle};
