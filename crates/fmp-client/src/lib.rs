use analysis_core::{AnalysisError, FundamentalsSeries, MarketDataProvider, Settings};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use statrs::statistics::{Data, Median};
use std::time::Duration;

mod statements;

use statements::{assemble_rows, number};

/// Years of P/E history behind the median reference multiple.
const MEDIAN_PE_YEARS: u32 = 5;

/// Exponential backoff: after failed attempt `n` (0-based) wait `base_delay * 2^n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(600),
        }
    }
}

/// Uppercased ticker for use as a URL path segment. Anything beyond ASCII
/// letters, digits and `. - _ ^ =` is rejected.
fn path_ticker(ticker: &str) -> Result<String, AnalysisError> {
    let ticker = ticker.trim().to_uppercase();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '^' | '=');
    if ticker.is_empty() || !ticker.chars().all(allowed) {
        return Err(AnalysisError::InvalidData(format!("unsupported ticker '{}'", ticker)));
    }
    Ok(ticker)
}

/// Client for the Financial Modeling Prep JSON API.
///
/// Without an API key every lookup returns `Ok(None)` and no request is made.
#[derive(Clone)]
pub struct FmpClient {
    api_key: Option<String>,
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl FmpClient {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with a {:?} timeout ({}), using defaults", settings.request_timeout, e);
                Client::new()
            });

        Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// GET `{base}/{path}` and decode the body as JSON. A 2xx body that is not
    /// JSON (rate-limit pages and the like) is `Ok(None)`.
    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Option<Value>, AnalysisError> {
        let body = self.get_text(path, query).await?;
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => Ok(Some(json)),
            Err(e) => {
                tracing::warn!("FMP /{} returned a non-JSON body ({}), treating as no data", path, e);
                Ok(None)
            }
        }
    }

    /// GET `{base}/{path}` and return the body, retrying transport errors and
    /// non-2xx statuses. The last failure is returned.
    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, AnalysisError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AnalysisError::ConfigError("FMP_API_KEY is not set".to_string()))?;
        let url = format!("{}/{}", self.base_url, path);

        let mut attempt = 0u32;
        loop {
            match self.try_get(&url, query, api_key).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "FMP request /{} failed ({}), retry {}/{} in {}ms",
                        path,
                        e,
                        attempt + 1,
                        self.retry.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("FMP request /{} failed after {} attempts: {}", path, attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }

    async fn try_get(&self, url: &str, query: &[(&str, String)], api_key: &str) -> Result<String, AnalysisError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .query(&[("apikey", api_key)])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| AnalysisError::ApiError(e.without_url().to_string()))
    }

    /// Annual fundamentals for the last `years` fiscal years.
    ///
    /// Income statement, balance sheet and cash-flow statement are fetched
    /// concurrently and joined on fiscal year. Any payload that is not a JSON
    /// list makes the whole result absent. Tickers that cannot form a URL path
    /// segment are `InvalidData`.
    pub async fn fetch_fundamentals(&self, ticker: &str, years: u32) -> Result<Option<FundamentalsSeries>, AnalysisError> {
        if !self.has_credentials() {
            return Ok(None);
        }
        let ticker = path_ticker(ticker)?;
        let query = [("period", "annual".to_string()), ("limit", years.to_string())];

        let income_path = format!("income-statement/{}", ticker);
        let balance_path = format!("balance-sheet-statement/{}", ticker);
        let cash_path = format!("cash-flow-statement/{}", ticker);
        let (income, balance, cash) = tokio::try_join!(
            self.get_json(&income_path, &query),
            self.get_json(&balance_path, &query),
            self.get_json(&cash_path, &query),
        )?;

        let lists = (
            income.as_ref().and_then(Value::as_array),
            balance.as_ref().and_then(Value::as_array),
            cash.as_ref().and_then(Value::as_array),
        );
        let (Some(income), Some(balance), Some(cash)) = lists else {
            tracing::warn!("FMP statements for {} were not all lists, treating as no data", ticker);
            return Ok(None);
        };

        let rows = assemble_rows(&ticker, income, balance, cash);
        if rows.is_empty() {
            return Ok(None);
        }
        tracing::info!("Fetched {} annual rows for {} from FMP", rows.len(), ticker);
        Ok(Some(FundamentalsSeries::from_rows(rows)))
    }

    /// Spot price from the quote endpoint. Malformed payloads are absent.
    pub async fn fetch_quote_price(&self, ticker: &str) -> Result<Option<f64>, AnalysisError> {
        if !self.has_credentials() {
            return Ok(None);
        }
        let ticker = path_ticker(ticker)?;
        let quote = self.get_json(&format!("quote/{}", ticker), &[]).await?;

        let price = quote
            .as_ref()
            .and_then(Value::as_array)
            .and_then(|q| q.first())
            .and_then(|first| number(first, "price"));
        if price.is_none() {
            tracing::warn!("FMP quote for {} had no usable price", ticker);
        }
        Ok(price)
    }

    /// Annual `priceEarningsRatio` values, newest first. Absent on any failure
    /// or when no value parses.
    pub async fn fetch_historical_pe(&self, ticker: &str, years: u32) -> Option<Vec<f64>> {
        if !self.has_credentials() {
            return None;
        }
        let ticker = match path_ticker(ticker) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Skipping FMP ratios: {}", e);
                return None;
            }
        };
        let query = [("period", "annual".to_string()), ("limit", years.to_string())];

        let ratios = match self.get_json(&format!("ratios/{}", ticker), &query).await {
            Ok(json) => json?,
            Err(e) => {
                tracing::warn!("FMP ratios for {} unavailable: {}", ticker, e);
                return None;
            }
        };

        let values: Vec<f64> = ratios
            .as_array()?
            .iter()
            .filter_map(|r| number(r, "priceEarningsRatio"))
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    /// Median of the last five annual P/E ratios.
    pub async fn fetch_five_year_median_pe(&self, ticker: &str) -> Option<f64> {
        let values = self.fetch_historical_pe(ticker, MEDIAN_PE_YEARS).await?;
        median(values)
    }
}

/// Median, averaging the two middle values for even counts.
pub fn median(values: Vec<f64>) -> Option<f64> {
    let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    Some(Data::new(values).median())
}

#[async_trait]
impl MarketDataProvider for FmpClient {
    async fn fetch_fundamentals(&self, ticker: &str, years: u32) -> Result<Option<FundamentalsSeries>, AnalysisError> {
        FmpClient::fetch_fundamentals(self, ticker, years).await
    }

    async fn fetch_quote_price(&self, ticker: &str) -> Result<Option<f64>, AnalysisError> {
        FmpClient::fetch_quote_price(self, ticker).await
    }

    async fn fetch_five_year_median_pe(&self, ticker: &str) -> Option<f64> {
        FmpClient::fetch_five_year_median_pe(self, ticker).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> FmpClient {
        let settings = Settings::default()
            .with_api_key(Some("test-key".to_string()));
        let settings = Settings {
            base_url: server.uri(),
            ..settings
        };
        FmpClient::new(&settings).with_retry_policy(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        })
    }

    async fn mount_statements(server: &MockServer, ticker: &str, income: Value, balance: Value, cash: Value) {
        for (endpoint, body) in [
            ("income-statement", income),
            ("balance-sheet-statement", balance),
            ("cash-flow-statement", cash),
        ] {
            Mock::given(method("GET"))
                .and(path(format!("/{}/{}", endpoint, ticker)))
                .and(query_param("period", "annual"))
                .and(query_param("limit", "10"))
                .and(query_param("apikey", "test-key"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(server)
                .await;
        }
    }

    #[test]
    fn test_retry_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(600));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2400));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(vec![]), None);
        assert_eq!(median(vec![f64::NAN]), None);
        assert!((median(vec![30.0, 10.0, 20.0]).unwrap() - 20.0).abs() < 1e-9);
        assert!((median(vec![10.0, 40.0, 20.0, 30.0]).unwrap() - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_api_key_is_absent() {
        let client = FmpClient::new(&Settings::default());
        assert!(!client.has_credentials());
        assert!(client.fetch_fundamentals("AAPL", 10).await.unwrap().is_none());
        assert!(client.fetch_quote_price("AAPL").await.unwrap().is_none());
        assert!(client.fetch_five_year_median_pe("AAPL").await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_fundamentals_joins_statements() {
        let server = MockServer::start().await;
        mount_statements(
            &server,
            "AAPL",
            json!([
                {"calendarYear": "2023", "symbol": "AAPL", "revenue": 383.0, "netIncome": 97.0, "weightedAverageShsOut": 15.8},
                {"calendarYear": "2022", "symbol": "AAPL", "revenue": 394.0, "netIncome": 99.8, "weightedAverageShsOut": 16.2}
            ]),
            json!([
                {"calendarYear": "2023", "totalStockholdersEquity": 62.1, "shortTermDebt": 15.8, "longTermDebt": 95.3},
                {"calendarYear": "2022", "totalStockholdersEquity": 50.7, "longTermDebt": 98.9}
            ]),
            json!([
                {"calendarYear": "2023", "freeCashFlow": 99.6},
                {"calendarYear": "2022", "freeCashFlow": 111.4}
            ]),
        )
        .await;

        let series = client_for(&server)
            .fetch_fundamentals("aapl", 10)
            .await
            .unwrap()
            .expect("series");
        assert_eq!(series.years(), vec![2022, 2023]);
        let latest = series.latest().unwrap();
        assert_eq!(latest.net_income, Some(97.0));
        assert!((latest.total_debt.unwrap() - 111.1).abs() < 1e-9);
        assert_eq!(series.rows()[0].total_debt, Some(98.9));
    }

    #[tokio::test]
    async fn test_non_list_payload_is_absent() {
        let server = MockServer::start().await;
        mount_statements(
            &server,
            "AAPL",
            json!([{"calendarYear": "2023"}]),
            json!({"Error Message": "Limit Reach"}),
            json!([{"calendarYear": "2023"}]),
        )
        .await;

        let result = client_for(&server).fetch_fundamentals("AAPL", 10).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_lists_are_absent() {
        let server = MockServer::start().await;
        mount_statements(&server, "ZZZZ", json!([]), json!([]), json!([])).await;
        let result = client_for(&server).fetch_fundamentals("ZZZZ", 10).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote/AAPL"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_quote_price("AAPL").await.unwrap_err();
        assert!(matches!(err, AnalysisError::ApiError(_)));
    }

    #[tokio::test]
    async fn test_retry_recovers_after_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote/MSFT"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quote/MSFT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"price": 411.22}])))
            .mount(&server)
            .await;

        let price = client_for(&server).fetch_quote_price("msft").await.unwrap();
        assert_eq!(price, Some(411.22));
    }

    #[tokio::test]
    async fn test_non_json_body_is_absent_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote/KO"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Limit Reach</html>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ratios/KO"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Limit Reach</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_quote_price("KO").await.unwrap(), None);
        assert_eq!(client.fetch_five_year_median_pe("KO").await, None);
    }

    #[tokio::test]
    async fn test_non_json_statement_is_absent() {
        let server = MockServer::start().await;
        mount_statements(&server, "KO", json!([{"calendarYear": "2023"}]), json!([]), json!([])).await;
        Mock::given(method("GET"))
            .and(path("/balance-sheet-statement/KO"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Service busy"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_fundamentals("KO", 10).await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_path_ticker() {
        assert_eq!(path_ticker(" brk.b ").unwrap(), "BRK.B");
        assert_eq!(path_ticker("^gspc").unwrap(), "^GSPC");
        assert_eq!(path_ticker("eurusd=x").unwrap(), "EURUSD=X");
        for bad in ["", "  ", "A/B", "KO?x=1", "X#1", "BRK B", "A%2F"] {
            assert!(matches!(path_ticker(bad), Err(AnalysisError::InvalidData(_))), "{:?}", bad);
        }
    }

    #[tokio::test]
    async fn test_unsafe_ticker_never_requested() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"price": 1.0}])))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for ticker in ["../quote/AAPL", "KO?limit=1", "X#1"] {
            let err = client.fetch_quote_price(ticker).await.unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidData(_)), "{:?}", err);
            let err = client.fetch_fundamentals(ticker, 10).await.unwrap_err();
            assert!(matches!(err, AnalysisError::InvalidData(_)), "{:?}", err);
            assert_eq!(client.fetch_five_year_median_pe(ticker).await, None);
        }
    }

    #[tokio::test]
    async fn test_malformed_quote_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote/KO"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"price": "n/a"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quote/PEP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_quote_price("KO").await.unwrap(), None);
        assert_eq!(client.fetch_quote_price("PEP").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_five_year_median_pe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ratios/AAPL"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"priceEarningsRatio": 28.0},
                {"priceEarningsRatio": null},
                {"priceEarningsRatio": "24.5"},
                {"priceEarningsRatio": "bogus"},
                {"priceEarningsRatio": 31.0}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_historical_pe("AAPL", 5).await, Some(vec![28.0, 24.5, 31.0]));
        assert_eq!(client.fetch_five_year_median_pe("AAPL").await, Some(28.0));
    }

    #[tokio::test]
    async fn test_median_pe_failure_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ratios/AAPL"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ratios/KO"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"priceEarningsRatio": null}])))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_five_year_median_pe("AAPL").await, None);
        assert_eq!(client.fetch_five_year_median_pe("KO").await, None);
    }
}
