use tracing::warn;

use super::event::*;
use super::state::*;
use crate::api::ApiRequest;
use crate::search::compute_matches;

/// Grace window between the picker losing focus and the match list being
/// cleared. A click on a result row blurs the input first; clearing
/// immediately would race the row's own click away.
pub const BLUR_GRACE_MS: u64 = 200;

/// Applies one event to the state. Returns true when something visible
/// changed. Side effects are limited to queueing `ApiRequest`s on the
/// state's outbox; the shell drains them to the worker.
pub fn reduce(state: &mut AppState, ev: AppEvent) -> bool {
    match ev {
        AppEvent::Ui(u) => reduce_ui(state, u),
        AppEvent::Net(n) => reduce_net(state, n),
        AppEvent::Timer(t) => reduce_timer(state, t),
    }
}

fn reduce_ui(state: &mut AppState, ev: UiEvent) -> bool {
    match ev {
        UiEvent::StartClicked => {
            state.screen = Screen::Calculator;
            // Fresh per-visit state: the portfolio starts empty on mount.
            state.portfolio.clear();
            state.risk_result = None;
            state.risk_context = None;
            state.explanation = None;
            state.portfolio_result = None;
            state.portfolio_explanation = None;
            state.status_message.clear();
            state.reset_picker();
            state.outbox.push(ApiRequest::PrefetchCsrf);
            state.outbox.push(ApiRequest::LoadDirectory);
            true
        }
        UiEvent::BackToWelcome => {
            state.screen = Screen::Welcome;
            true
        }

        UiEvent::TermEdited { term } => {
            state.term = term;
            state.selected_symbol = None;
            state.clear_matches_at = None;
            if state.term.trim().is_empty() {
                state.matches.clear();
                state.picker_phase = PickerPhase::Idle;
            } else {
                state.picker_phase = PickerPhase::Typing;
                refresh_matches(state);
            }
            true
        }
        UiEvent::MatchClicked { symbol } => {
            let Some(company) = state.matches.iter().find(|c| c.symbol == symbol).cloned()
            else {
                return false;
            };
            // Display the raw symbol, not the name: re-showing the full name
            // would feed it straight back into the search.
            state.term = company.symbol.clone();
            state.selected_symbol = Some(company.symbol);
            state.matches.clear();
            state.picker_phase = PickerPhase::Selected;
            state.clear_matches_at = None;
            true
        }
        UiEvent::PickerBlurred { now_ms } => {
            if state.picker_phase == PickerPhase::Selected {
                return false;
            }
            state.clear_matches_at = Some(now_ms + BLUR_GRACE_MS);
            false
        }
        UiEvent::AmountEdited { text } => {
            state.amount_text = text;
            true
        }

        UiEvent::CalculateRiskRequested => {
            let symbol = state.bound_symbol().to_string();
            if symbol.is_empty() {
                state.status_message = "Enter a stock symbol first.".to_string();
                return true;
            }
            let Some(principal) = state.parsed_amount() else {
                state.status_message = "Enter a positive principal amount.".to_string();
                return true;
            };
            state.status_message = format!("Calculating risk for {symbol}...");
            state.outbox.push(ApiRequest::CalculateRisk { symbol, principal });
            true
        }
        UiEvent::AddEntryRequested => {
            let symbol = state.bound_symbol().to_string();
            if symbol.is_empty() {
                state.status_message = "Pick a company before adding it.".to_string();
                return true;
            }
            let Some(amount) = state.parsed_amount() else {
                state.status_message = "Enter a positive principal amount.".to_string();
                return true;
            };
            state.portfolio.insert(symbol.clone(), amount);
            state.reset_picker();
            state.status_message = format!("Added {symbol} (${amount:.2}) to the portfolio.");
            true
        }
        UiEvent::AnalyzePortfolioRequested => {
            // The button is disabled below the minimum, but the gate is
            // re-checked here against stale UI state.
            if !state.can_analyze() {
                state.status_message =
                    "Add at least two holdings before analyzing the portfolio.".to_string();
                return true;
            }
            state.status_message = "Analyzing portfolio...".to_string();
            state.outbox.push(ApiRequest::AnalyzePortfolio {
                entries: state.portfolio.clone(),
            });
            true
        }
    }
}

fn reduce_net(state: &mut AppState, ev: NetEvent) -> bool {
    match ev {
        NetEvent::DirectoryLoaded { companies } => {
            state.directory = companies;
            // A term may already be in flight; matches must never come from
            // a stale (term, directory) pair.
            if matches!(
                state.picker_phase,
                PickerPhase::Typing | PickerPhase::ShowingResults
            ) {
                refresh_matches(state);
            }
            true
        }
        NetEvent::DirectoryFailed { error } => {
            // Not fatal: search degrades to empty results.
            warn!(%error, "company directory unavailable");
            false
        }
        NetEvent::RiskComputed {
            symbol,
            principal,
            payload,
        } => {
            state.risk_result = Some(payload);
            state.risk_context = Some((symbol.clone(), principal));
            state.explanation = None;
            state.status_message = format!("Risk computed for {symbol}.");
            true
        }
        NetEvent::RiskFailed { error: _ } => {
            // Already logged by the worker; previous result stays on screen.
            state.status_message = "Risk calculation failed.".to_string();
            true
        }
        NetEvent::ExplanationReady { text } => {
            state.explanation = Some(text);
            true
        }
        NetEvent::PortfolioComputed { payload } => {
            state.portfolio_result = Some(payload);
            state.portfolio_explanation = None;
            state.status_message = "Portfolio analysis ready.".to_string();
            true
        }
        NetEvent::PortfolioFailed { error: _ } => {
            state.status_message = "Portfolio analysis failed.".to_string();
            true
        }
        NetEvent::PortfolioExplanationReady { text } => {
            state.portfolio_explanation = Some(text);
            true
        }
    }
}

fn reduce_timer(state: &mut AppState, ev: TimerEvent) -> bool {
    match ev {
        TimerEvent::Tick { now_ms } => {
            let mut changed = false;

            let clock = format_clock(now_ms);
            if state.current_time != clock {
                state.current_time = clock;
                changed = true;
            }

            // Deferred match-list clear armed by a blur with no selection.
            if let Some(deadline) = state.clear_matches_at {
                if now_ms >= deadline {
                    state.clear_matches_at = None;
                    state.matches.clear();
                    if state.picker_phase != PickerPhase::Selected {
                        state.picker_phase = PickerPhase::Idle;
                    }
                    changed = true;
                }
            }

            changed
        }
    }
}

fn refresh_matches(state: &mut AppState) {
    state.matches = compute_matches(&state.term, &state.directory, &state.search);
    if matches!(
        state.picker_phase,
        PickerPhase::Typing | PickerPhase::ShowingResults
    ) {
        state.picker_phase = if state.matches.is_empty() {
            PickerPhase::Typing
        } else {
            PickerPhase::ShowingResults
        };
    }
}
