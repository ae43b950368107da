use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};

use crate::api::{ApiRequest, PortfolioPayload, RiskPayload};
use crate::search::{Company, SearchConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Welcome,
    Calculator,
}

/// Lifecycle of the company picker input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerPhase {
    Idle,
    Typing,
    ShowingResults,
    Selected,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,

    // Company directory, loaded once per calculator visit and read-only after.
    pub directory: Vec<Company>,
    pub search: SearchConfig,

    // Picker state: the term doubles as the bound symbol field.
    pub term: String,
    pub matches: Vec<Company>,
    pub picker_phase: PickerPhase,
    pub selected_symbol: Option<String>,
    /// Deadline (unix ms) for the deferred match-list clear armed on blur.
    pub clear_matches_at: Option<u64>,

    pub amount_text: String,

    // Portfolio: symbol -> principal amount. Re-adding a symbol overwrites.
    pub portfolio: BTreeMap<String, f64>,

    // Last results. A failed call leaves the previous payload untouched.
    pub risk_result: Option<RiskPayload>,
    pub risk_context: Option<(String, f64)>,
    pub explanation: Option<String>,
    pub portfolio_result: Option<PortfolioPayload>,
    pub portfolio_explanation: Option<String>,

    pub status_message: String,
    pub current_time: String,

    /// Requests queued by the reducer, drained to the api worker by the shell.
    pub outbox: Vec<ApiRequest>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            screen: Screen::Welcome,

            directory: Vec::new(),
            search: SearchConfig::default(),

            term: String::new(),
            matches: Vec::new(),
            picker_phase: PickerPhase::Idle,
            selected_symbol: None,
            clear_matches_at: None,

            amount_text: String::new(),

            portfolio: BTreeMap::new(),

            risk_result: None,
            risk_context: None,
            explanation: None,
            portfolio_result: None,
            portfolio_explanation: None,

            status_message: String::new(),
            current_time: String::new(),

            outbox: Vec::new(),
        }
    }
}

impl AppState {
    pub fn with_search(search: SearchConfig) -> Self {
        Self {
            search,
            ..Self::default()
        }
    }

    /// The symbol the forms operate on: the picker input, trimmed.
    pub fn bound_symbol(&self) -> &str {
        self.term.trim()
    }

    /// The principal amount, if the text parses to a positive finite number.
    pub fn parsed_amount(&self) -> Option<f64> {
        match self.amount_text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Some(v),
            _ => None,
        }
    }

    pub fn can_analyze(&self) -> bool {
        self.portfolio.len() >= 2
    }

    /// Clears the picker and amount inputs after a portfolio entry lands.
    pub fn reset_picker(&mut self) {
        self.term.clear();
        self.matches.clear();
        self.picker_phase = PickerPhase::Idle;
        self.selected_symbol = None;
        self.clear_matches_at = None;
        self.amount_text.clear();
    }

    pub fn take_outbox(&mut self) -> Vec<ApiRequest> {
        std::mem::take(&mut self.outbox)
    }
}

/// unix milliseconds
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn format_clock(now_ms: u64) -> String {
    Local
        .timestamp_opt((now_ms / 1000) as i64, 0)
        .single()
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_default()
}
