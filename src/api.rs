//! HTTP client for the risk analysis backend, plus the worker thread that
//! runs requests off the UI loop.
//!
//! All mutating calls carry the Django CSRF token as `X-CSRFToken`. The token
//! comes from the `csrftoken` cookie when the jar already holds one, else
//! from the dedicated token endpoint, and is cached for the session.

use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;

use reqwest::cookie::Jar;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::app::event::{AppEvent, NetEvent};
use crate::search::Company;

const DIRECTORY_PATH: &str = "/api/sp500/names";
const CSRF_TOKEN_PATH: &str = "/api/get-csrf-token/";
const CALCULATE_RISK_PATH: &str = "/api/calculate-risk/";
const EXPLANATION_PATH: &str = "/api/get-explanation/";
const PORTFOLIO_ANALYSIS_PATH: &str = "/api/calculate-portfolio-analysis/";
const PORTFOLIO_EXPLANATION_PATH: &str = "/api/get-portfolio-analysis/";

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid base url: {0}")]
    BaseUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {0}")]
    Status(reqwest::StatusCode),
}

/// Work items queued by the reducer and drained to the worker thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    /// Warm up the CSRF token so the first mutating call does not pay for it.
    PrefetchCsrf,
    LoadDirectory,
    CalculateRisk { symbol: String, principal: f64 },
    AnalyzePortfolio { entries: BTreeMap<String, f64> },
}

// ---- wire types --------------------------------------------------------

/// Single-stock risk numbers, displayed verbatim. Field names follow the
/// backend contract, including the unusual percentile key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPayload {
    pub risk: f64,
    pub max_return_dollar: f64,
    pub max_loss_dollar: f64,
    #[serde(rename = "5% worst-case scenario")]
    pub worst_case_5pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioRisk {
    #[serde(rename = "Total Portfolio Volatility (Risk)")]
    pub volatility: f64,
    #[serde(rename = "5% Worst Case Scenario (Monte Carlo)")]
    pub worst_case_dollars: f64,
}

/// Aggregate portfolio numbers. Serialized back out verbatim as the body of
/// the portfolio explanation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioPayload {
    pub portfolio_risk: PortfolioRisk,
    pub total_investment: f64,
    pub weights: BTreeMap<String, f64>,
}

#[derive(Serialize)]
struct RiskRequest<'a> {
    symbol: &'a str,
    principle_fund: f64,
}

#[derive(Serialize)]
struct ExplanationRequest<'a> {
    stock_symbol: &'a str,
    principle_fund: f64,
    risk: f64,
    max_return_dollar: f64,
    max_loss_dollar: f64,
    #[serde(rename = "5% worst-case scenario")]
    worst_case_5pct: f64,
}

#[derive(Deserialize)]
struct ExplanationResponse {
    explanation: String,
}

#[derive(Deserialize)]
struct CsrfTokenResponse {
    #[serde(rename = "csrfToken")]
    csrf_token: String,
}

// ---- client ------------------------------------------------------------

pub struct ApiClient {
    http: reqwest::blocking::Client,
    jar: Arc<Jar>,
    base: Url,
    base_url: String,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let base: Url = format!("{base_url}/")
            .parse()
            .map_err(|e| ApiError::BaseUrl(format!("{base_url}: {e}")))?;

        let jar = Arc::new(Jar::default());
        let http = reqwest::blocking::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()?;

        Ok(Self {
            http,
            jar,
            base,
            base_url,
            csrf_token: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn load_directory(&self) -> Result<Vec<Company>, ApiError> {
        let resp = self.http.get(self.url(DIRECTORY_PATH)).send()?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        Ok(resp.json()?)
    }

    /// Returns the session CSRF token: cached, else read from the cookie jar,
    /// else fetched from the token endpoint (which also sets the cookie).
    fn ensure_csrf(&mut self) -> Result<String, ApiError> {
        if let Some(token) = &self.csrf_token {
            return Ok(token.clone());
        }
        if let Some(token) = self.cookie_csrf() {
            debug!("csrf token recovered from cookie jar");
            self.csrf_token = Some(token.clone());
            return Ok(token);
        }

        let resp = self.http.get(self.url(CSRF_TOKEN_PATH)).send()?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        let body: CsrfTokenResponse = resp.json()?;
        self.csrf_token = Some(body.csrf_token.clone());
        Ok(body.csrf_token)
    }

    fn cookie_csrf(&self) -> Option<String> {
        use reqwest::cookie::CookieStore;

        let header = self.jar.cookies(&self.base)?;
        let raw = header.to_str().ok()?;
        raw.split(';').map(str::trim).find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name == CSRF_COOKIE).then(|| value.to_string())
        })
    }

    fn post_json<B, T>(&mut self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let token = self.ensure_csrf()?;
        let resp = self
            .http
            .post(self.url(path))
            .header(CSRF_HEADER, token)
            .json(body)
            .send()?;
        if !resp.status().is_success() {
            return Err(ApiError::Status(resp.status()));
        }
        Ok(resp.json()?)
    }

    pub fn calculate_risk(&mut self, symbol: &str, principal: f64) -> Result<RiskPayload, ApiError> {
        self.post_json(
            CALCULATE_RISK_PATH,
            &RiskRequest {
                symbol,
                principle_fund: principal,
            },
        )
    }

    /// Forwards the freshly returned risk numbers, never a caller-held copy,
    /// so the narrative always describes the numbers on screen.
    pub fn fetch_explanation(
        &mut self,
        symbol: &str,
        principal: f64,
        payload: &RiskPayload,
    ) -> Result<String, ApiError> {
        let body = ExplanationRequest {
            stock_symbol: symbol,
            principle_fund: principal,
            risk: payload.risk,
            max_return_dollar: payload.max_return_dollar,
            max_loss_dollar: payload.max_loss_dollar,
            worst_case_5pct: payload.worst_case_5pct,
        };
        let resp: ExplanationResponse = self.post_json(EXPLANATION_PATH, &body)?;
        Ok(resp.explanation)
    }

    pub fn analyze_portfolio(
        &mut self,
        entries: &BTreeMap<String, f64>,
    ) -> Result<PortfolioPayload, ApiError> {
        self.post_json(PORTFOLIO_ANALYSIS_PATH, entries)
    }

    pub fn fetch_portfolio_explanation(
        &mut self,
        payload: &PortfolioPayload,
    ) -> Result<String, ApiError> {
        let resp: ExplanationResponse = self.post_json(PORTFOLIO_EXPLANATION_PATH, payload)?;
        Ok(resp.explanation)
    }
}

// ---- worker ------------------------------------------------------------

/// Runs backend requests on a dedicated thread, feeding results back into
/// the event loop. Dependent calls (risk then explanation) are sequenced by
/// plain sequential execution here; the explanation is best effort and its
/// failure never disturbs the numeric result.
pub fn spawn_worker(
    base_url: &str,
    requests: Receiver<ApiRequest>,
    events: Sender<AppEvent>,
) -> Result<thread::JoinHandle<()>, ApiError> {
    let mut client = ApiClient::new(base_url)?;
    info!(base_url, "api worker starting");

    let handle = thread::spawn(move || {
        for req in requests {
            let alive = handle_request(&mut client, req, &events);
            if !alive {
                break;
            }
        }
        debug!("api worker shutting down");
    });
    Ok(handle)
}

/// Returns false once the event loop has gone away.
fn handle_request(client: &mut ApiClient, req: ApiRequest, events: &Sender<AppEvent>) -> bool {
    let send = |ev: NetEvent| events.send(AppEvent::Net(ev)).is_ok();

    match req {
        ApiRequest::PrefetchCsrf => {
            if let Err(err) = client.ensure_csrf() {
                warn!(%err, "csrf prefetch failed");
            }
            true
        }
        ApiRequest::LoadDirectory => match client.load_directory() {
            Ok(companies) => {
                info!(count = companies.len(), "company directory loaded");
                send(NetEvent::DirectoryLoaded { companies })
            }
            Err(err) => {
                warn!(%err, "company directory load failed");
                send(NetEvent::DirectoryFailed {
                    error: err.to_string(),
                })
            }
        },
        ApiRequest::CalculateRisk { symbol, principal } => {
            match client.calculate_risk(&symbol, principal) {
                Ok(payload) => {
                    if !send(NetEvent::RiskComputed {
                        symbol: symbol.clone(),
                        principal,
                        payload: payload.clone(),
                    }) {
                        return false;
                    }
                    match client.fetch_explanation(&symbol, principal, &payload) {
                        Ok(text) => send(NetEvent::ExplanationReady { text }),
                        Err(err) => {
                            error!(%err, symbol, "explanation request failed");
                            true
                        }
                    }
                }
                Err(err) => {
                    error!(%err, symbol, "risk calculation failed");
                    send(NetEvent::RiskFailed {
                        error: err.to_string(),
                    })
                }
            }
        }
        ApiRequest::AnalyzePortfolio { entries } => match client.analyze_portfolio(&entries) {
            Ok(payload) => {
                if !send(NetEvent::PortfolioComputed {
                    payload: payload.clone(),
                }) {
                    return false;
                }
                match client.fetch_portfolio_explanation(&payload) {
                    Ok(text) => send(NetEvent::PortfolioExplanationReady { text }),
                    Err(err) => {
                        error!(%err, "portfolio explanation request failed");
                        true
                    }
                }
            }
            Err(err) => {
                error!(%err, "portfolio analysis failed");
                send(NetEvent::PortfolioFailed {
                    error: err.to_string(),
                })
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_payload_uses_backend_field_names() {
        let payload: RiskPayload = serde_json::from_str(
            r#"{"risk":12.5,"max_return_dollar":310.0,
                "max_loss_dollar":-150.0,"5% worst-case scenario":-8.2}"#,
        )
        .unwrap();
        assert_eq!(payload.risk, 12.5);
        assert_eq!(payload.worst_case_5pct, -8.2);
    }

    #[test]
    fn portfolio_payload_roundtrips_through_explanation_body() {
        let payload = PortfolioPayload {
            portfolio_risk: PortfolioRisk {
                volatility: 17.3,
                worst_case_dollars: 912.0,
            },
            total_investment: 1500.0,
            weights: BTreeMap::from([("AAPL".to_string(), 0.66), ("MSFT".to_string(), 0.34)]),
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["portfolio_risk"]["Total Portfolio Volatility (Risk)"], 17.3);
        assert_eq!(
            body["portfolio_risk"]["5% Worst Case Scenario (Monte Carlo)"],
            912.0
        );
        let back: PortfolioPayload = serde_json::from_value(body).unwrap();
        assert_eq!(back, payload);
    }
}
