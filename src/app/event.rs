use crate::api::{PortfolioPayload, RiskPayload};
use crate::search::Company;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Ui(UiEvent),
    Net(NetEvent),
    Timer(TimerEvent),
}

/// Discrete user interactions, emitted by the render pass.
#[derive(Debug, Clone)]
pub enum UiEvent {
    StartClicked,
    BackToWelcome,

    TermEdited { term: String },
    MatchClicked { symbol: String },
    /// The symbol input lost focus; carries the wall clock so the deferred
    /// match-list clear stays reproducible in tests.
    PickerBlurred { now_ms: u64 },
    AmountEdited { text: String },

    CalculateRiskRequested,
    AddEntryRequested,
    AnalyzePortfolioRequested,
}

/// Network completions delivered by the api worker.
#[derive(Debug, Clone)]
pub enum NetEvent {
    DirectoryLoaded {
        companies: Vec<Company>,
    },
    DirectoryFailed {
        error: String,
    },
    RiskComputed {
        symbol: String,
        principal: f64,
        payload: RiskPayload,
    },
    RiskFailed {
        error: String,
    },
    ExplanationReady {
        text: String,
    },
    PortfolioComputed {
        payload: PortfolioPayload,
    },
    PortfolioFailed {
        error: String,
    },
    PortfolioExplanationReady {
        text: String,
    },
}

#[derive(Debug, Clone)]
pub enum TimerEvent {
    Tick { now_ms: u64 },
}
