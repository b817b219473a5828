use crate::core::search::{FundSearchProvider, SearchCandidate};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const SEARCH_PATH: &str = "/FundSearch/api/FundSearchAPI.ashx";
const PAGE_SIZE: &str = "10";

/// Keyword search over fund names.
pub struct EastmoneySearchProvider {
    base_url: String,
    client: reqwest::Client,
}

impl EastmoneySearchProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fundval/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Datas", default)]
    datas: Option<Vec<SearchItem>>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(rename = "CODE")]
    code: String,
    #[serde(rename = "NAME")]
    name: String,
    #[serde(rename = "FundBaseInfo", default)]
    fund_base_info: Option<FundBaseInfo>,
}

#[derive(Debug, Deserialize)]
struct FundBaseInfo {
    #[serde(rename = "FTYPE", default)]
    ftype: Option<String>,
}

impl From<SearchItem> for SearchCandidate {
    fn from(item: SearchItem) -> Self {
        SearchCandidate {
            code: item.code,
            name: item.name,
            fund_type: item.fund_base_info.and_then(|info| info.ftype),
        }
    }
}

#[async_trait]
impl FundSearchProvider for EastmoneySearchProvider {
    #[instrument(name = "FundSearch", skip(self), fields(keyword = %keyword))]
    async fn search(&self, keyword: &str) -> Result<Vec<SearchCandidate>> {
        let url = Url::parse_with_params(
            &format!("{}{}", self.base_url, SEARCH_PATH),
            &[
                ("mode", "1"),
                ("key", keyword),
                ("pageindex", "0"),
                ("pagesize", PAGE_SIZE),
            ],
        )
        .with_context(|| format!("Invalid search URL for base: {}", self.base_url))?;
        debug!("Requesting fund search from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to send search request for: {keyword}"))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(anyhow!("Unexpected status {status} searching for: {keyword}"));
        }

        let data: SearchResponse = response
            .json()
            .await
            .with_context(|| format!("Failed to parse search response for: {keyword}"))?;
        let candidates: Vec<SearchCandidate> = data
            .datas
            .unwrap_or_default()
            .into_iter()
            .map(SearchCandidate::from)
            .collect();

        debug!(count = candidates.len(), "Received search candidates");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> EastmoneySearchProvider {
        EastmoneySearchProvider::new(&server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_search_sends_expected_query() {
        let mock_server = MockServer::start().await;
        let body = r#"{"ErrCode":0,"Datas":[
            {"CODE":"510300","NAME":"华泰柏瑞沪深300ETF","FundBaseInfo":{"FTYPE":"指数型-股票"}},
            {"CODE":"460300","NAME":"华泰柏瑞沪深300ETF联接A","FundBaseInfo":null},
            {"CODE":"000001","NAME":"华夏成长"}
        ]}"#;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("mode", "1"))
            .and(query_param("key", "沪深300"))
            .and(query_param("pageindex", "0"))
            .and(query_param("pagesize", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(1)
            .mount(&mock_server)
            .await;

        let candidates = provider(&mock_server).search("沪深300").await.unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].code, "510300");
        assert_eq!(candidates[0].fund_type.as_deref(), Some("指数型-股票"));
        assert_eq!(candidates[1].name, "华泰柏瑞沪深300ETF联接A");
        assert_eq!(candidates[1].fund_type, None);
        assert_eq!(candidates[2].fund_type, None);
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"ErrCode":0,"Datas":null}"#),
            )
            .mount(&mock_server)
            .await;

        let candidates = provider(&mock_server).search("不存在").await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        assert!(provider(&mock_server).search("沪深300").await.is_err());
    }
}
