use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use risk_desk::api::{self, ApiRequest};
use risk_desk::app::{now_unix_ms, render, AppEvent, AppRuntime};
use risk_desk::settings::SettingsManager;

struct RiskDeskApp {
    runtime: AppRuntime,
    events: Receiver<AppEvent>,
    ui_tx: Sender<AppEvent>,
    requests: Sender<ApiRequest>,
}

impl RiskDeskApp {
    fn new(
        runtime: AppRuntime,
        events: Receiver<AppEvent>,
        ui_tx: Sender<AppEvent>,
        requests: Sender<ApiRequest>,
    ) -> Self {
        Self {
            runtime,
            events,
            ui_tx,
            requests,
        }
    }

    fn drain_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(ev) = self.events.try_recv() {
            changed |= self.runtime.handle_event(ev);
        }
        changed
    }

    fn flush_outbox(&mut self) {
        for req in self.runtime.take_outbox() {
            if self.requests.send(req).is_err() {
                // worker gone, nothing to do from the UI side
                return;
            }
        }
    }
}

impl eframe::App for RiskDeskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut changed = self.drain_events();
        changed |= self.runtime.tick(now_unix_ms());
        self.flush_outbox();

        render::render(ctx, &self.runtime.state, &self.ui_tx);

        // events emitted by this frame's widgets
        changed |= self.drain_events();
        self.flush_outbox();

        if changed {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("risk_desk=info")),
        )
        .init();

    let settings = SettingsManager::init()?.settings();
    info!("backend: {}", settings.api_base_url);

    let (event_tx, event_rx) = channel::<AppEvent>();
    let (req_tx, req_rx) = channel::<ApiRequest>();

    api::spawn_worker(&settings.api_base_url, req_rx, event_tx.clone())?;

    let app = RiskDeskApp::new(
        AppRuntime::new(settings.search),
        event_rx,
        event_tx,
        req_tx,
    );

    let opts = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([960.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Stock Risk Calculator",
        opts,
        Box::new(|_cc| Box::new(app)),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
