use crate::config::{EngineConfig, PriceInfo};
use crate::engine::{EngineError, MeteringEngine};
use crate::identity::Identity;
use crate::query::Query;
use crate::types::{HierarchyResult, MeteringResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Serialize)]
struct EngineRequest<'a> {
    user: &'a Identity,
    query: &'a Query,
    price_info: &'a PriceInfo,
}

#[derive(Deserialize)]
struct EngineErrorBody {
    message: String,
}

/// Metering engine reached over HTTP.
///
/// `POST {url}/metering` and `POST {url}/metering/hierarchy`, both taking
/// `{user, query, price_info}` as JSON.
#[derive(Clone)]
pub struct RemoteEngine {
    client: reqwest::Client,
    url: Url,
}

impl RemoteEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(RemoteEngine {
            client,
            url: config.url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        let base = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base}/{path}"));
        url
    }

    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &EngineRequest<'_>,
    ) -> Result<T, EngineError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(request)
            .send()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<EngineErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_string());
            return Err(EngineError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_slice(&body).map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MeteringEngine for RemoteEngine {
    async fn metering(
        &self,
        user: &Identity,
        query: &Query,
        price_info: &PriceInfo,
    ) -> Result<MeteringResult, EngineError> {
        let request = EngineRequest {
            user,
            query,
            price_info,
        };
        self.call("metering", &request).await
    }

    async fn metering_hierarchy(
        &self,
        user: &Identity,
        query: &Query,
        price_info: &PriceInfo,
    ) -> Result<HierarchyResult, EngineError> {
        let request = EngineRequest {
            user,
            query,
            price_info,
        };
        self.call("metering/hierarchy", &request).await
    }
}
