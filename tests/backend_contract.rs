//! Contract tests against a local mock of the risk backend. The mock records
//! every request so the tests can check the CSRF handshake and request
//! bodies, not just the decoded results.

use std::collections::BTreeMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Method, Response, Server};

use risk_desk::api::{self, ApiRequest};
use risk_desk::app::{AppEvent, NetEvent};

const TOKEN: &str = "tok-abc123";

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    url: String,
    csrf: Option<String>,
    body: String,
}

struct MockBackend {
    base_url: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl MockBackend {
    /// Starts a backend stub on an ephemeral port. `risk_status` is the
    /// status code returned by the risk endpoint.
    fn start(risk_status: u16) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", format_addr(server.server_addr()));
        let recorded: Arc<Mutex<Vec<Recorded>>> = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&recorded);
        thread::spawn(move || {
            for mut request in server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let csrf = request
                    .headers()
                    .iter()
                    .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case("X-CSRFToken"))
                    .map(|h| h.value.as_str().to_string());
                let method = request.method().clone();
                let url = request.url().to_string();
                log.lock().unwrap().push(Recorded {
                    method: method.to_string(),
                    url: url.clone(),
                    csrf,
                    body,
                });

                let response = match (method, url.as_str()) {
                    (Method::Get, "/api/get-csrf-token/") => {
                        json(&format!(r#"{{"csrfToken":"{TOKEN}"}}"#)).with_header(
                            Header::from_bytes(
                                &b"Set-Cookie"[..],
                                format!("csrftoken={TOKEN}; Path=/").as_bytes(),
                            )
                            .unwrap(),
                        )
                    }
                    (Method::Get, "/api/sp500/names") => json(
                        r#"[{"Symbol":"AAPL","Security":"Apple Inc."},
                            {"Symbol":"MSFT","displayName":"Microsoft Corporation"}]"#,
                    ),
                    (Method::Post, "/api/calculate-risk/") => json(
                        r#"{"risk":12.5,"max_return_dollar":310.0,
                            "max_loss_dollar":-150.0,"5% worst-case scenario":-8.2}"#,
                    )
                    .with_status_code(risk_status),
                    (Method::Post, "/api/get-explanation/") => {
                        json(r#"{"explanation":"moderate volatility"}"#)
                    }
                    (Method::Post, "/api/calculate-portfolio-analysis/") => json(
                        r#"{"portfolio_risk":{
                                "Total Portfolio Volatility (Risk)":17.3,
                                "5% Worst Case Scenario (Monte Carlo)":912.0},
                            "total_investment":1500.0,
                            "weights":{"AAPL":0.6667,"MSFT":0.3333}}"#,
                    ),
                    (Method::Post, "/api/get-portfolio-analysis/") => {
                        json(r#"{"explanation":"well diversified"}"#)
                    }
                    _ => json(r#"{"error":"not found"}"#).with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        Self { base_url, recorded }
    }

    fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }
}

fn json(body: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_header(Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap())
}

fn format_addr(addr: tiny_http::ListenAddr) -> String {
    match addr.to_ip() {
        Some(SocketAddr::V4(v4)) => format!("127.0.0.1:{}", v4.port()),
        Some(SocketAddr::V6(v6)) => format!("[::1]:{}", v6.port()),
        None => "127.0.0.1:0".to_string(),
    }
}

fn next_net(rx: &Receiver<AppEvent>) -> NetEvent {
    match rx.recv_timeout(Duration::from_secs(5)) {
        Ok(AppEvent::Net(ev)) => ev,
        other => panic!("expected a net event, got {other:?}"),
    }
}

fn start_worker(base_url: &str) -> (std::sync::mpsc::Sender<ApiRequest>, Receiver<AppEvent>) {
    let (req_tx, req_rx) = channel::<ApiRequest>();
    let (event_tx, event_rx) = channel::<AppEvent>();
    api::spawn_worker(base_url, req_rx, event_tx).unwrap();
    (req_tx, event_rx)
}

#[test]
fn risk_flow_fetches_token_once_and_signs_both_posts() {
    let backend = MockBackend::start(200);
    let (req_tx, events) = start_worker(&backend.base_url);

    req_tx.send(ApiRequest::PrefetchCsrf).unwrap();
    req_tx
        .send(ApiRequest::CalculateRisk {
            symbol: "AAPL".to_string(),
            principal: 1000.0,
        })
        .unwrap();

    match next_net(&events) {
        NetEvent::RiskComputed {
            symbol,
            principal,
            payload,
        } => {
            assert_eq!(symbol, "AAPL");
            assert_eq!(principal, 1000.0);
            assert_eq!(payload.risk, 12.5);
            assert_eq!(payload.worst_case_5pct, -8.2);
        }
        other => panic!("expected RiskComputed, got {other:?}"),
    }
    match next_net(&events) {
        NetEvent::ExplanationReady { text } => assert_eq!(text, "moderate volatility"),
        other => panic!("expected ExplanationReady, got {other:?}"),
    }

    let recorded = backend.requests();
    let token_fetches = recorded
        .iter()
        .filter(|r| r.url == "/api/get-csrf-token/")
        .count();
    assert_eq!(token_fetches, 1, "token must be cached after the prefetch");

    for r in recorded.iter().filter(|r| r.method == "POST") {
        assert_eq!(r.csrf.as_deref(), Some(TOKEN), "unsigned POST to {}", r.url);
    }

    let risk = recorded
        .iter()
        .find(|r| r.url == "/api/calculate-risk/")
        .unwrap();
    let body: serde_json::Value = serde_json::from_str(&risk.body).unwrap();
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["principle_fund"], 1000.0);
}

#[test]
fn failed_risk_never_requests_an_explanation() {
    let backend = MockBackend::start(500);
    let (req_tx, events) = start_worker(&backend.base_url);

    req_tx
        .send(ApiRequest::CalculateRisk {
            symbol: "MSFT".to_string(),
            principal: 250.0,
        })
        .unwrap();

    match next_net(&events) {
        NetEvent::RiskFailed { error } => assert!(error.contains("500"), "{error}"),
        other => panic!("expected RiskFailed, got {other:?}"),
    }

    assert!(
        !backend
            .requests()
            .iter()
            .any(|r| r.url == "/api/get-explanation/"),
        "explanation must not run after a failed risk calculation"
    );
}

#[test]
fn portfolio_body_carries_the_holdings_verbatim() {
    let backend = MockBackend::start(200);
    let (req_tx, events) = start_worker(&backend.base_url);

    let entries = BTreeMap::from([("AAPL".to_string(), 1000.0), ("MSFT".to_string(), 500.0)]);
    req_tx
        .send(ApiRequest::AnalyzePortfolio {
            entries: entries.clone(),
        })
        .unwrap();

    match next_net(&events) {
        NetEvent::PortfolioComputed { payload } => {
            assert_eq!(payload.portfolio_risk.volatility, 17.3);
            assert_eq!(payload.total_investment, 1500.0);
        }
        other => panic!("expected PortfolioComputed, got {other:?}"),
    }
    match next_net(&events) {
        NetEvent::PortfolioExplanationReady { text } => assert_eq!(text, "well diversified"),
        other => panic!("expected PortfolioExplanationReady, got {other:?}"),
    }

    let recorded = backend.requests();
    let analysis = recorded
        .iter()
        .find(|r| r.url == "/api/calculate-portfolio-analysis/")
        .unwrap();
    let sent: BTreeMap<String, f64> = serde_json::from_str(&analysis.body).unwrap();
    assert_eq!(sent, entries);
}

#[test]
fn directory_load_accepts_both_name_keys() {
    let backend = MockBackend::start(200);
    let (req_tx, events) = start_worker(&backend.base_url);

    req_tx.send(ApiRequest::LoadDirectory).unwrap();

    match next_net(&events) {
        NetEvent::DirectoryLoaded { companies } => {
            assert_eq!(companies.len(), 2);
            assert_eq!(companies[0].symbol, "AAPL");
            assert_eq!(companies[0].name, "Apple Inc.");
            assert_eq!(companies[1].name, "Microsoft Corporation");
        }
        other => panic!("expected DirectoryLoaded, got {other:?}"),
    }
}
