use crate::core::clock::Clock;
use crate::core::quote::{Quote, QuoteSource};
use crate::providers::util::{parse_decimal_field, unwrap_jsonp};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const CALLBACK: &str = "jsonpgz";

/// Intraday valuation estimates from the fundgz endpoint, one fund per call.
pub struct FundgzProvider {
    base_url: String,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
}

impl FundgzProvider {
    pub fn new(base_url: &str, timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fundval/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            clock,
        })
    }
}

/// Every field arrives as a string.
#[derive(Debug, Deserialize)]
struct FundgzPayload {
    fundcode: String,
    name: Option<String>,
    /// Last settled NAV
    dwjz: Option<String>,
    /// Date of the settled NAV
    jzrq: Option<String>,
    /// Estimated NAV
    gsz: Option<String>,
    /// Estimated growth, percent
    gszzl: Option<String>,
    /// Estimate time, minute precision
    gztime: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl FundgzPayload {
    fn into_quote(self, fetched_at: NaiveDateTime) -> Result<Quote> {
        let last_nav_date = non_blank(self.jzrq)
            .map(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d"))
            .transpose()
            .context("Invalid NAV date")?;
        let estimated_at = non_blank(self.gztime)
            .map(|t| NaiveDateTime::parse_from_str(t.trim(), "%Y-%m-%d %H:%M"))
            .transpose()
            .context("Invalid estimate time")?;

        Ok(Quote {
            last_nav: parse_decimal_field("dwjz", self.dwjz.as_deref())?,
            estimated_nav: parse_decimal_field("gsz", self.gsz.as_deref())?,
            estimated_growth_rate: parse_decimal_field("gszzl", self.gszzl.as_deref())?,
            fund_code: self.fundcode,
            fund_name: non_blank(self.name),
            last_nav_date,
            estimated_at,
            fetched_at,
        })
    }
}

#[async_trait]
impl QuoteSource for FundgzProvider {
    #[instrument(name = "FundgzQuoteFetch", skip(self), fields(fund_code = %fund_code))]
    async fn fetch_quote(&self, fund_code: &str) -> Result<Quote> {
        let url = format!("{}/js/{}.js", self.base_url, fund_code);
        debug!("Requesting quote from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to send request for fund: {fund_code}"))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(anyhow!("Unexpected status {status} for fund: {fund_code}"));
        }

        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read response for fund: {fund_code}"))?;
        let payload = unwrap_jsonp(&body, CALLBACK)
            .with_context(|| format!("Malformed response for fund: {fund_code}"))?;
        let payload: FundgzPayload = serde_json::from_str(payload)
            .with_context(|| format!("Failed to parse quote for fund: {fund_code}"))?;

        let quote = payload.into_quote(self.clock.now())?;
        debug!(estimated_nav = ?quote.estimated_nav, last_nav = ?quote.last_nav, "Received quote");
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::mock::test_time;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_fundgz_mock_server(code: &str, body: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/js/{code}.js")))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer) -> FundgzProvider {
        FundgzProvider::new(
            &server.uri(),
            Duration::from_secs(2),
            Arc::new(ManualClock::new(test_time())),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let body = r#"jsonpgz({"fundcode":"110011","name":"易方达优质精选混合(QDII)","jzrq":"2024-01-02","dwjz":"4.1230","gsz":"4.1520","gszzl":"0.70","gztime":"2024-01-03 14:30"});"#;
        let server = create_fundgz_mock_server("110011", body, 200).await;

        let quote = provider(&server).fetch_quote("110011").await.unwrap();
        assert_eq!(quote.fund_code, "110011");
        assert_eq!(quote.fund_name.as_deref(), Some("易方达优质精选混合(QDII)"));
        assert_eq!(quote.last_nav, Some(dec!(4.1230)));
        assert_eq!(quote.estimated_nav, Some(dec!(4.1520)));
        assert_eq!(quote.estimated_growth_rate, Some(dec!(0.70)));
        assert_eq!(quote.last_nav_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(
            quote.estimated_at,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap().and_hms_opt(14, 30, 0)
        );
        assert_eq!(quote.fetched_at, test_time());
    }

    #[tokio::test]
    async fn test_blank_estimate_fields() {
        let body = r#"jsonpgz({"fundcode":"000001","name":"华夏成长","jzrq":"2024-01-02","dwjz":"1.0500","gsz":"","gszzl":"","gztime":""});"#;
        let server = create_fundgz_mock_server("000001", body, 200).await;

        let quote = provider(&server).fetch_quote("000001").await.unwrap();
        assert_eq!(quote.estimated_nav, None);
        assert_eq!(quote.estimated_at, None);
        assert_eq!(quote.current_nav(), dec!(1.05));
    }

    #[tokio::test]
    async fn test_non_200_is_error() {
        let server = create_fundgz_mock_server("110011", "Not Found", 404).await;
        let result = provider(&server).fetch_quote("110011").await;
        assert!(result.unwrap_err().to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_empty_envelope_is_error() {
        let server = create_fundgz_mock_server("999999", "jsonpgz();", 200).await;
        assert!(provider(&server).fetch_quote("999999").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let server = create_fundgz_mock_server("110011", "jsonpgz({fundcode:110011});", 200).await;
        assert!(provider(&server).fetch_quote("110011").await.is_err());
    }

    #[tokio::test]
    async fn test_timeout_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"jsonpgz({"fundcode":"110011"});"#)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let provider = FundgzProvider::new(
            &mock_server.uri(),
            Duration::from_millis(100),
            Arc::new(ManualClock::new(test_time())),
        )
        .unwrap();
        assert!(provider.fetch_quote("110011").await.is_err());
    }
}
