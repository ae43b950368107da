pub mod event;
pub mod reducer;
pub mod render;
pub mod state;

pub use event::*;
pub use state::*;

use crate::api::ApiRequest;
use crate::search::SearchConfig;

/// Owns the application state and feeds events through the reducer. The
/// shell drives it once per frame: pending events first, then a timer tick,
/// then a render pass, then the outbox drain.
pub struct AppRuntime {
    pub state: AppState,
    last_tick_ms: u64,
}

impl AppRuntime {
    pub fn new(search: SearchConfig) -> Self {
        Self {
            state: AppState::with_search(search),
            last_tick_ms: 0,
        }
    }

    /// Returns true when the event changed something visible.
    pub fn handle_event(&mut self, ev: AppEvent) -> bool {
        reducer::reduce(&mut self.state, ev)
    }

    /// At most one timer event per millisecond; the tick drives the clock
    /// line and the deferred match-list clear.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if now_ms == self.last_tick_ms {
            return false;
        }
        self.last_tick_ms = now_ms;
        reducer::reduce(
            &mut self.state,
            AppEvent::Timer(TimerEvent::Tick { now_ms }),
        )
    }

    pub fn take_outbox(&mut self) -> Vec<ApiRequest> {
        self.state.take_outbox()
    }
}
