use std::sync::mpsc::Sender;

use eframe::egui;

use super::event::{AppEvent, UiEvent};
use super::state::{now_unix_ms, AppState, Screen};

/// Maps state to widgets and turns widget interactions back into `UiEvent`s.
/// Nothing here mutates the state directly; edits go through the reducer.
pub fn render(ctx: &egui::Context, state: &AppState, tx: &Sender<AppEvent>) {
    match state.screen {
        Screen::Welcome => welcome_screen(ctx, tx),
        Screen::Calculator => calculator_screen(ctx, state, tx),
    }
}

fn send(tx: &Sender<AppEvent>, ev: UiEvent) {
    let _ = tx.send(AppEvent::Ui(ev));
}

fn welcome_screen(ctx: &egui::Context, tx: &Sender<AppEvent>) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(120.0);
            ui.heading("Welcome");
            ui.add_space(8.0);
            ui.label("Integrate our API for comprehensive analytics.");
            ui.add_space(24.0);
            if ui.button("Let's get started").clicked() {
                send(tx, UiEvent::StartClicked);
            }
        });
    });
}

fn calculator_screen(ctx: &egui::Context, state: &AppState, tx: &Sender<AppEvent>) {
    egui::TopBottomPanel::top("calculator_top").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button("\u{2039} Back").clicked() {
                send(tx, UiEvent::BackToWelcome);
            }
            ui.heading("Stock Risk Calculator");
        });
    });

    egui::TopBottomPanel::bottom("calculator_status").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(&state.status_message);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(&state.current_time);
            });
        });
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        egui::ScrollArea::vertical().show(ui, |ui| {
            picker_section(ui, state, tx);
            ui.add_space(12.0);
            single_stock_section(ui, state, tx);
            ui.add_space(12.0);
            portfolio_section(ui, state, tx);
        });
    });
}

fn picker_section(ui: &mut egui::Ui, state: &AppState, tx: &Sender<AppEvent>) {
    let mut term = state.term.clone();
    let response = ui.add(
        egui::TextEdit::singleline(&mut term)
            .hint_text("Search for a company...")
            .desired_width(f32::INFINITY),
    );
    if response.changed() {
        send(tx, UiEvent::TermEdited { term });
    }
    if response.lost_focus() {
        send(
            tx,
            UiEvent::PickerBlurred {
                now_ms: now_unix_ms(),
            },
        );
    }

    for company in &state.matches {
        if ui.selectable_label(false, company.label()).clicked() {
            send(
                tx,
                UiEvent::MatchClicked {
                    symbol: company.symbol.clone(),
                },
            );
        }
    }

    let mut amount = state.amount_text.clone();
    let amount_response = ui.add(
        egui::TextEdit::singleline(&mut amount)
            .hint_text("Enter principal amount")
            .desired_width(f32::INFINITY),
    );
    if amount_response.changed() {
        send(tx, UiEvent::AmountEdited { text: amount });
    }
}

fn single_stock_section(ui: &mut egui::Ui, state: &AppState, tx: &Sender<AppEvent>) {
    ui.horizontal(|ui| {
        if ui.button("Calculate Risk").clicked() {
            send(tx, UiEvent::CalculateRiskRequested);
        }
        if ui.button("Add to Portfolio").clicked() {
            send(tx, UiEvent::AddEntryRequested);
        }
    });

    let Some(result) = &state.risk_result else {
        return;
    };

    ui.add_space(8.0);
    ui.separator();
    if let Some((symbol, principal)) = &state.risk_context {
        ui.strong(format!("Results for {symbol} (${principal:.2})"));
    } else {
        ui.strong("Results");
    }
    ui.label(format!("Risk: {}%", result.risk));
    ui.label(format!("Max Return: ${}", result.max_return_dollar));
    ui.label(format!("Max Loss: ${}", result.max_loss_dollar));
    ui.label(format!("Value at Risk: {}%", result.worst_case_5pct));
    if let Some(text) = &state.explanation {
        ui.add_space(4.0);
        ui.label(text);
    }
}

fn portfolio_section(ui: &mut egui::Ui, state: &AppState, tx: &Sender<AppEvent>) {
    ui.separator();
    ui.strong("Portfolio");

    if state.portfolio.is_empty() {
        ui.label("No holdings yet. Pick a company, enter an amount, add it.");
    } else {
        egui::Grid::new("portfolio_entries")
            .striped(true)
            .show(ui, |ui| {
                for (symbol, amount) in &state.portfolio {
                    ui.label(symbol);
                    ui.label(format!("${amount:.2}"));
                    ui.end_row();
                }
            });
    }

    let analyze = ui.add_enabled(state.can_analyze(), egui::Button::new("Analyze Portfolio"));
    if analyze.clicked() {
        send(tx, UiEvent::AnalyzePortfolioRequested);
    }

    let Some(result) = &state.portfolio_result else {
        return;
    };

    ui.add_space(8.0);
    ui.strong("Portfolio analysis");
    ui.label(format!(
        "Total Portfolio Volatility (Risk): {}%",
        result.portfolio_risk.volatility
    ));
    ui.label(format!(
        "5% Worst Case Scenario (Monte Carlo): ${}",
        result.portfolio_risk.worst_case_dollars
    ));
    ui.label(format!("Total Investment: ${}", result.total_investment));
    for (symbol, weight) in &result.weights {
        ui.label(format!("{symbol}: {:.1}% of portfolio", weight * 100.0));
    }
    if let Some(text) = &state.portfolio_explanation {
        ui.add_space(4.0);
        ui.label(text);
    }
}
