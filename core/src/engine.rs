use serde::{Deserialize, Serialize};

use crate::*;

/// Delay between a restart request and the fresh `start`, decoupling the
/// synchronous reset from re-entering the round loop.
pub const RESTART_DELAY_MS: u32 = 100;

/// Valid transitions:
/// - Idle -> Running (start)
/// - Running -> Terminated (fail limit, or rounds exhausted)
/// - Terminated -> Idle (restart)
///
/// `Terminated` is the one-way latch: every lifecycle operation other than
/// `restart` is a no-op once it is set.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Terminated,
}

impl RunState {
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Timer the host must arm after a state-machine step. Callbacks come back
/// through the matching `on_*_elapsed` operation, stamped with the epoch that
/// was current when the timer was armed.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TimerRequest {
    /// Leave any pending timer as it is.
    NoChange,
    /// Deliver `on_hide_elapsed` after the given delay.
    HideTargetAfter(u32),
    /// Deliver `on_gap_elapsed` after the given delay.
    NextRoundAfter(u32),
    /// Deliver `on_restart_elapsed` after the given delay.
    StartAfter(u32),
}

/// Result of resolving one click.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    Hit,
    Miss,
    /// Session not running, or the click fell outside the field.
    Ignored,
}

impl ClickOutcome {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        match self {
            Self::Hit => true,
            Self::Miss => true,
            Self::Ignored => false,
        }
    }
}

/// Round scheduler and scoring controller for one session. Owns the field,
/// the marker mask, and all counters; time and clicks arrive as explicit
/// calls from the single-threaded host loop, so a click delivered before the
/// hide timer resolves against the still-current target.
#[derive(Clone, Debug)]
pub struct GameEngine {
    config: GameConfig,
    policy: GamePolicy,
    grid: Grid,
    targets: TargetMask,
    state: RunState,
    score: u32,
    fails: u32,
    round: u32,
    current_target: Option<Coord2>,
    target_was_clicked: bool,
    click_happened: bool,
    end_reason: Option<EndReason>,
    timer_epoch: u64,
}

impl GameEngine {
    pub fn new(config: GameConfig, policy: GamePolicy, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            grid: Grid::new(config.grid_size, seed)?,
            targets: TargetMask::new(config.grid_size),
            config,
            policy,
            state: RunState::Idle,
            score: 0,
            fails: 0,
            round: 0,
            current_target: None,
            target_was_clicked: false,
            click_happened: false,
            end_reason: None,
            timer_epoch: 0,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn policy(&self) -> &GamePolicy {
        &self.policy
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn fails(&self) -> u32 {
        self.fails
    }

    pub fn max_fails(&self) -> u32 {
        self.config.max_fails
    }

    /// Completed-round index; equals the configured round count once the last
    /// round has resolved.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn size(&self) -> Coord2 {
        self.grid.size()
    }

    pub fn current_target(&self) -> Option<Coord2> {
        self.current_target
    }

    pub fn target_was_clicked(&self) -> bool {
        self.target_was_clicked
    }

    pub fn is_target_at(&self, cell: Coord2) -> bool {
        self.targets.is_marked(cell)
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    /// Final counters, present once the session has terminated.
    pub fn summary(&self) -> Option<GameSummary> {
        self.end_reason.map(|reason| GameSummary {
            score: self.score,
            fails: self.fails,
            max_fails: self.config.max_fails,
            reason,
        })
    }

    /// Epoch to stamp on the next armed timer. Bumped whenever previously
    /// armed timers become stale, so late callbacks resolve to no-ops without
    /// the host having to cancel anything.
    pub fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    /// Begins a session. No-op unless idle: repeated or concurrent calls
    /// cannot double-initialize, and a terminated session only comes back
    /// through `restart`.
    pub fn start(&mut self, sink: &mut dyn PresentationSink) -> TimerRequest {
        if !matches!(self.state, RunState::Idle) {
            log::debug!("start ignored in state {:?}", self.state);
            return TimerRequest::NoChange;
        }

        self.state = RunState::Running;
        self.score = 0;
        self.fails = 0;
        self.round = 0;
        self.target_was_clicked = false;
        self.click_happened = false;
        self.end_reason = None;
        self.timer_epoch += 1;
        sink.hide_restart_control();
        sink.update_display(self.score, self.fails, self.config.max_fails);
        log::info!(
            "session started: {} rounds, fail limit {}",
            self.config.rounds,
            self.config.max_fails
        );

        if self.config.rounds == 0 {
            self.stop(sink);
            return TimerRequest::NoChange;
        }

        self.begin_round();
        TimerRequest::HideTargetAfter(self.config.hide_delay_ms)
    }

    /// Resolves one click against the current target. Ignored while not
    /// running; the terminal latch makes post-termination clicks silent
    /// no-ops. Exactly one display update per resolved click.
    pub fn resolve_click(&mut self, cell: Coord2, sink: &mut dyn PresentationSink) -> ClickOutcome {
        if !self.state.is_running() || !self.grid.contains(cell) {
            return ClickOutcome::Ignored;
        }

        match self.current_target {
            Some(target) if target == cell => {
                self.score += 1;
                self.target_was_clicked = true;
                self.click_happened = true;
                // hide right away so the remainder of the round shows no target
                self.targets.hide(target);
                self.current_target = None;
                log::debug!("hit at {:?}, score {}", cell, self.score);
                sink.update_display(self.score, self.fails, self.config.max_fails);
                ClickOutcome::Hit
            }
            _ => {
                if matches!(self.policy.fail_accounting, FailAccounting::Immediate) {
                    self.fails += 1;
                }
                log::debug!(
                    "miss at {:?}, fails {}/{}",
                    cell,
                    self.fails,
                    self.config.max_fails
                );
                if self.fails >= self.config.max_fails {
                    // game_over's display finalization is this click's update
                    self.game_over(EndReason::FailLimitReached, sink);
                } else {
                    sink.update_display(self.score, self.fails, self.config.max_fails);
                }
                ClickOutcome::Miss
            }
        }
    }

    /// Round-visibility timer expired: hide the target, account the round,
    /// and either schedule the next round or terminate. Stale epochs and
    /// non-running states are no-ops.
    pub fn on_hide_elapsed(&mut self, epoch: u64, sink: &mut dyn PresentationSink) -> TimerRequest {
        if epoch != self.timer_epoch || !self.state.is_running() {
            return TimerRequest::NoChange;
        }

        let had_target = self.targets.clear_all();
        self.current_target = None;
        if matches!(self.policy.fail_accounting, FailAccounting::RoundEnd)
            && had_target
            && !self.click_happened
        {
            self.fails += 1;
            log::debug!(
                "target escaped, fails {}/{}",
                self.fails,
                self.config.max_fails
            );
        }
        self.round += 1;
        sink.update_display(self.score, self.fails, self.config.max_fails);

        if self.round >= self.config.rounds {
            if self.fails >= self.config.max_fails {
                self.game_over(EndReason::FailLimitReached, sink);
            } else {
                self.stop(sink);
            }
            return TimerRequest::NoChange;
        }
        if self.fails >= self.config.max_fails {
            self.game_over(EndReason::FailLimitReached, sink);
            return TimerRequest::NoChange;
        }

        if self.policy.inter_round_gap {
            TimerRequest::NextRoundAfter(self.config.show_delay_ms)
        } else {
            self.begin_round();
            TimerRequest::HideTargetAfter(self.config.hide_delay_ms)
        }
    }

    /// Inter-round gap expired: begin the next round. Stale epochs and
    /// non-running states are no-ops.
    pub fn on_gap_elapsed(&mut self, epoch: u64) -> TimerRequest {
        if epoch != self.timer_epoch || !self.state.is_running() {
            return TimerRequest::NoChange;
        }
        self.begin_round();
        TimerRequest::HideTargetAfter(self.config.hide_delay_ms)
    }

    /// Terminates the session. Idempotent: the first call latches the
    /// terminal state, clears the field, and notifies the sink exactly once;
    /// later calls are no-ops regardless of `reason`.
    pub fn game_over(&mut self, reason: EndReason, sink: &mut dyn PresentationSink) {
        if self.state.is_terminated() {
            return;
        }

        self.state = RunState::Terminated;
        self.end_reason = Some(reason);
        self.targets.clear_all();
        self.current_target = None;
        self.timer_epoch += 1;
        log::info!(
            "game over ({:?}): score {}, fails {}/{}",
            reason,
            self.score,
            self.fails,
            self.config.max_fails
        );
        sink.update_display(self.score, self.fails, self.config.max_fails);
        let summary = GameSummary {
            score: self.score,
            fails: self.fails,
            max_fails: self.config.max_fails,
            reason,
        };
        sink.show_end_of_game(&summary);
        sink.show_restart_control();
    }

    /// Termination via exhausting the configured rounds; converges to the
    /// same latch and no-op guarantees as `game_over`.
    pub fn stop(&mut self, sink: &mut dyn PresentationSink) {
        self.game_over(EndReason::RoundsExhausted, sink);
    }

    /// Resets every counter and flag to the initial state and schedules a
    /// fresh `start` after a short fixed delay, so the reset never re-enters
    /// the round loop within the same task.
    pub fn restart(&mut self, sink: &mut dyn PresentationSink) -> TimerRequest {
        self.state = RunState::Idle;
        self.score = 0;
        self.fails = 0;
        self.round = 0;
        self.target_was_clicked = false;
        self.click_happened = false;
        self.end_reason = None;
        self.targets.clear_all();
        self.current_target = None;
        self.timer_epoch += 1;
        sink.hide_restart_control();
        sink.update_display(self.score, self.fails, self.config.max_fails);
        log::debug!("restart: fresh start in {}ms", RESTART_DELAY_MS);
        TimerRequest::StartAfter(RESTART_DELAY_MS)
    }

    /// Restart delay expired: run the scheduled `start`. Stale epochs are
    /// no-ops.
    pub fn on_restart_elapsed(
        &mut self,
        epoch: u64,
        sink: &mut dyn PresentationSink,
    ) -> TimerRequest {
        if epoch != self.timer_epoch {
            return TimerRequest::NoChange;
        }
        self.start(sink)
    }

    fn begin_round(&mut self) {
        let cell = self.grid.random_cell();
        self.targets.show(cell);
        self.current_target = Some(cell);
        self.target_was_clicked = false;
        self.click_happened = false;
        log::debug!("round {}: target at {:?}", self.round + 1, cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        display_updates: Vec<(u32, u32, u32)>,
        end_of_game: Vec<GameSummary>,
        restart_shown: u32,
        restart_hidden: u32,
    }

    impl PresentationSink for RecordingSink {
        fn update_display(&mut self, score: u32, fails: u32, max_fails: u32) {
            self.display_updates.push((score, fails, max_fails));
        }

        fn show_end_of_game(&mut self, summary: &GameSummary) {
            self.end_of_game.push(*summary);
        }

        fn show_restart_control(&mut self) {
            self.restart_shown += 1;
        }

        fn hide_restart_control(&mut self) {
            self.restart_hidden += 1;
        }
    }

    fn engine(rounds: u32, max_fails: u32, policy: GamePolicy) -> GameEngine {
        let config = GameConfig::new((4, 4), rounds, 10, 20, max_fails).unwrap();
        GameEngine::new(config, policy, 7).unwrap()
    }

    fn off_target(engine: &GameEngine) -> Coord2 {
        let target = engine.current_target();
        let (x_end, y_end) = engine.size();
        for x in 0..x_end {
            for y in 0..y_end {
                if Some((x, y)) != target {
                    return (x, y);
                }
            }
        }
        unreachable!("field has more than one cell");
    }

    #[test]
    fn start_marks_one_target_and_requests_hide_timer() {
        let mut engine = engine(5, 3, GamePolicy::immediate());
        let mut sink = RecordingSink::default();

        let request = engine.start(&mut sink);

        assert_eq!(request, TimerRequest::HideTargetAfter(20));
        assert!(engine.state().is_running());
        let target = engine.current_target().unwrap();
        assert!(engine.is_target_at(target));
        assert_eq!(sink.display_updates, vec![(0, 0, 3)]);
        assert_eq!(sink.restart_hidden, 1);
    }

    #[test]
    fn start_while_running_is_a_noop() {
        let mut engine = engine(5, 3, GamePolicy::immediate());
        let mut sink = RecordingSink::default();

        engine.start(&mut sink);
        let target = engine.current_target().unwrap();
        engine.resolve_click(target, &mut sink);
        assert_eq!(engine.score(), 1);

        assert_eq!(engine.start(&mut sink), TimerRequest::NoChange);
        assert_eq!(engine.score(), 1);
    }

    #[test]
    fn hit_increments_score_and_clears_target() {
        let mut engine = engine(5, 3, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        let target = engine.current_target().unwrap();

        let outcome = engine.resolve_click(target, &mut sink);

        assert_eq!(outcome, ClickOutcome::Hit);
        assert_eq!(engine.score(), 1);
        assert_eq!(engine.fails(), 0);
        assert!(engine.target_was_clicked());
        assert_eq!(engine.current_target(), None);
        assert!(!engine.is_target_at(target));
        assert_eq!(sink.display_updates.last(), Some(&(1, 0, 3)));
    }

    #[test]
    fn click_after_hide_resolves_as_miss() {
        // arrival order decides the race: once the hide ran, there is no
        // target and the click charges a fail under immediate accounting
        let mut engine = engine(5, 3, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        let target = engine.current_target().unwrap();

        engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);
        let outcome = engine.resolve_click(target, &mut sink);

        assert_eq!(outcome, ClickOutcome::Miss);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.fails(), 1);
    }

    #[test]
    fn immediate_misses_cross_threshold_and_terminate_once() {
        let mut engine = engine(5, 2, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);

        assert_eq!(
            engine.resolve_click(off_target(&engine), &mut sink),
            ClickOutcome::Miss
        );
        assert!(engine.state().is_running());
        assert_eq!(
            engine.resolve_click(off_target(&engine), &mut sink),
            ClickOutcome::Miss
        );

        assert!(engine.state().is_terminated());
        assert_eq!(engine.fails(), 2);
        assert_eq!(sink.end_of_game.len(), 1);
        assert_eq!(sink.end_of_game[0].reason, EndReason::FailLimitReached);
        assert_eq!(sink.restart_shown, 1);

        // further clicks are silent no-ops
        assert_eq!(
            engine.resolve_click((0, 0), &mut sink),
            ClickOutcome::Ignored
        );
        assert_eq!(sink.end_of_game.len(), 1);
        assert_eq!(engine.fails(), 2);
    }

    #[test]
    fn deferred_accounting_charges_unclicked_rounds_at_round_end() {
        let mut engine = engine(5, 3, GamePolicy::deferred());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);

        // a miss click never charges under round-end accounting
        assert_eq!(
            engine.resolve_click(off_target(&engine), &mut sink),
            ClickOutcome::Miss
        );
        assert_eq!(engine.fails(), 0);

        engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);
        assert_eq!(engine.fails(), 1);
    }

    #[test]
    fn deferred_accounting_skips_rounds_with_a_hit() {
        let mut engine = engine(5, 3, GamePolicy::deferred());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        let target = engine.current_target().unwrap();

        engine.resolve_click(target, &mut sink);
        engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);

        assert_eq!(engine.score(), 1);
        assert_eq!(engine.fails(), 0);
    }

    #[test]
    fn gap_policy_inserts_round_gap_except_after_last_round() {
        let mut engine = engine(2, 5, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);

        let request = engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);
        assert_eq!(request, TimerRequest::NextRoundAfter(10));
        assert_eq!(engine.current_target(), None);

        let request = engine.on_gap_elapsed(engine.timer_epoch());
        assert_eq!(request, TimerRequest::HideTargetAfter(20));
        assert!(engine.current_target().is_some());

        // last round: no gap, straight to termination
        let request = engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);
        assert_eq!(request, TimerRequest::NoChange);
        assert!(engine.state().is_terminated());
        assert_eq!(engine.end_reason(), Some(EndReason::RoundsExhausted));
    }

    #[test]
    fn no_gap_policy_moves_straight_to_the_next_round() {
        let mut engine = engine(3, 5, GamePolicy::deferred());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        let first = engine.current_target().unwrap();

        let request = engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);

        assert_eq!(request, TimerRequest::HideTargetAfter(20));
        let second = engine.current_target().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn final_round_over_threshold_reports_fail_limit() {
        let mut engine = engine(1, 1, GamePolicy::deferred());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);

        let request = engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);

        assert_eq!(request, TimerRequest::NoChange);
        assert_eq!(engine.fails(), 1);
        assert!(engine.state().is_terminated());
        assert_eq!(engine.end_reason(), Some(EndReason::FailLimitReached));
        assert_eq!(sink.end_of_game.len(), 1);
    }

    #[test]
    fn game_over_is_idempotent() {
        let mut engine = engine(5, 3, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        let target = engine.current_target().unwrap();
        engine.resolve_click(target, &mut sink);

        engine.game_over(EndReason::FailLimitReached, &mut sink);
        let score = engine.score();
        let fails = engine.fails();
        engine.game_over(EndReason::RoundsExhausted, &mut sink);
        engine.stop(&mut sink);

        assert_eq!(sink.end_of_game.len(), 1);
        assert_eq!(sink.restart_shown, 1);
        assert_eq!(engine.score(), score);
        assert_eq!(engine.fails(), fails);
        assert_eq!(engine.end_reason(), Some(EndReason::FailLimitReached));
    }

    #[test]
    fn zero_rounds_finalizes_immediately_on_start() {
        let mut engine = engine(0, 3, GamePolicy::immediate());
        let mut sink = RecordingSink::default();

        let request = engine.start(&mut sink);

        assert_eq!(request, TimerRequest::NoChange);
        assert!(engine.state().is_terminated());
        assert_eq!(engine.end_reason(), Some(EndReason::RoundsExhausted));
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.fails(), 0);
        assert_eq!(sink.end_of_game.len(), 1);
    }

    #[test]
    fn restart_resets_state_and_delayed_start_runs() {
        let mut engine = engine(5, 1, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        engine.resolve_click(off_target(&engine), &mut sink);
        assert!(engine.state().is_terminated());

        let request = engine.restart(&mut sink);

        assert_eq!(request, TimerRequest::StartAfter(RESTART_DELAY_MS));
        assert_eq!(engine.state(), RunState::Idle);
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.fails(), 0);
        assert_eq!(engine.current_target(), None);
        assert_eq!(engine.end_reason(), None);
        assert_eq!(sink.restart_hidden, 2);

        let request = engine.on_restart_elapsed(engine.timer_epoch(), &mut sink);
        assert_eq!(request, TimerRequest::HideTargetAfter(20));
        assert!(engine.state().is_running());
    }

    #[test]
    fn stale_timer_callbacks_are_noops() {
        let mut engine = engine(5, 3, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        let stale = engine.timer_epoch();
        engine.restart(&mut sink);

        assert_eq!(engine.on_hide_elapsed(stale, &mut sink), TimerRequest::NoChange);
        assert_eq!(engine.on_gap_elapsed(stale), TimerRequest::NoChange);
        assert_eq!(
            engine.on_restart_elapsed(stale, &mut sink),
            TimerRequest::NoChange
        );
        assert_eq!(engine.state(), RunState::Idle);
    }

    #[test]
    fn timer_callbacks_after_termination_are_noops() {
        let mut engine = engine(5, 1, GamePolicy::immediate());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);
        let epoch = engine.timer_epoch();
        engine.resolve_click(off_target(&engine), &mut sink);
        assert!(engine.state().is_terminated());

        assert_eq!(engine.on_hide_elapsed(epoch, &mut sink), TimerRequest::NoChange);
        assert_eq!(engine.on_gap_elapsed(epoch), TimerRequest::NoChange);
        assert_eq!(sink.end_of_game.len(), 1);
    }

    #[test]
    fn fails_are_monotone_until_restart() {
        let mut engine = engine(4, 10, GamePolicy::deferred());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);

        let mut prev = engine.fails();
        for _ in 0..4 {
            engine.resolve_click(off_target(&engine), &mut sink);
            engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);
            assert!(engine.fails() >= prev);
            prev = engine.fails();
        }
        assert!(engine.state().is_terminated());

        engine.restart(&mut sink);
        assert_eq!(engine.fails(), 0);
    }

    #[test]
    fn consecutive_rounds_use_distinct_cells() {
        let mut engine = engine(8, 10, GamePolicy::deferred());
        let mut sink = RecordingSink::default();
        engine.start(&mut sink);

        let mut prev = engine.current_target().unwrap();
        for _ in 0..7 {
            engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);
            if let Some(next) = engine.current_target() {
                assert_ne!(next, prev);
                prev = next;
            }
        }
    }

    #[test]
    fn summary_reflects_final_counters() {
        let mut engine = engine(1, 5, GamePolicy::deferred());
        let mut sink = RecordingSink::default();
        assert_eq!(engine.summary(), None);
        engine.start(&mut sink);
        let target = engine.current_target().unwrap();
        engine.resolve_click(target, &mut sink);
        engine.on_hide_elapsed(engine.timer_epoch(), &mut sink);

        let summary = engine.summary().unwrap();
        assert_eq!(summary.score, 1);
        assert_eq!(summary.fails, 0);
        assert_eq!(summary.max_fails, 5);
        assert_eq!(summary.reason, EndReason::RoundsExhausted);
    }
}
