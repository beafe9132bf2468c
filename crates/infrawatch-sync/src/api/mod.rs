//! Typed REST client for the dashboard backend.
//!
//! Every call goes through the [`CredentialPipeline`], so an expired access
//! token is renewed transparently.

mod alerts;
mod logs;
mod metrics;

use infrawatch_core::{ApiError, ApiRequest, models::QueryParams};
use infrawatch_session::CredentialPipeline;
use serde::de::DeserializeOwned;

/// Dashboard REST API.
#[derive(Debug, Clone)]
pub struct DashboardApi {
    pipeline: CredentialPipeline,
}

impl DashboardApi {
    #[must_use]
    pub const fn new(pipeline: CredentialPipeline) -> Self {
        Self { pipeline }
    }

    #[must_use]
    pub const fn pipeline(&self) -> &CredentialPipeline {
        &self.pipeline
    }

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.pipeline.call(request).await
    }

    async fn call_empty(&self, request: ApiRequest) -> Result<(), ApiError> {
        self.pipeline.send(request).await?.error_for_status()?;
        Ok(())
    }
}

/// `filter` parameters followed by `page` / `page_size`.
fn paged(mut params: QueryParams, page: u32, page_size: u32) -> QueryParams {
    params.push(("page".to_string(), page.to_string()));
    params.push(("page_size".to_string(), page_size.to_string()));
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paged_appends_paging() {
        let params = paged(vec![("status".into(), "active".into())], 2, 20);
        assert_eq!(
            params,
            vec![
                ("status".to_string(), "active".to_string()),
                ("page".to_string(), "2".to_string()),
                ("page_size".to_string(), "20".to_string()),
            ]
        );
    }
}
