use serde::{Deserialize, Serialize};

/// Why a session terminated. Both paths converge to the same terminal state;
/// the reason only drives the end-of-game message.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    /// The fail counter reached the configured limit.
    FailLimitReached,
    /// Every configured round ran without crossing the fail limit.
    RoundsExhausted,
}

/// Final counters handed to the presentation layer exactly once per session.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub score: u32,
    pub fails: u32,
    pub max_fails: u32,
    pub reason: EndReason,
}

/// Narrow contract to the UI layer. The engine calls these; rendering is the
/// implementor's business. Display updates fire exactly once per resolved
/// click and once per round boundary; `show_end_of_game` fires exactly once
/// per terminated session.
pub trait PresentationSink {
    fn update_display(&mut self, score: u32, fails: u32, max_fails: u32);
    fn show_end_of_game(&mut self, summary: &GameSummary);
    fn show_restart_control(&mut self);
    fn hide_restart_control(&mut self);
}
