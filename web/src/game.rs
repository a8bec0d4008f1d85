use chrono::prelude::*;
use gloo::timers::callback::{Interval, Timeout};
use gobwhack_core as game;
use gobwhack_core::PresentationSink;
use yew::prelude::*;

use crate::settings::{Settings, SettingsView};
use crate::utils::*;

/// How long hit/miss feedback stays on a cell.
const FLASH_CLEAR_MS: u32 = 300;

fn utc_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(js_sys::Date::now() as i64).unwrap()
}

fn new_engine(settings: &Settings) -> game::GameEngine {
    game::GameEngine::new(
        settings.preset.game_config(),
        settings.policy,
        js_random_seed(),
    )
    .expect("preset configurations are valid")
}

const fn outcome_title(reason: game::EndReason) -> &'static str {
    match reason {
        game::EndReason::FailLimitReached => "Too many misses!",
        game::EndReason::RoundsExhausted => "Out of rounds!",
    }
}

fn fails_classes(fails: u32, max_fails: u32) -> Classes {
    classes!(
        "fails",
        (fails + 1 == max_fails).then_some("warn"),
        (fails >= max_fails).then_some("over"),
    )
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Flash {
    Hit,
    Miss,
}

/// Wall-clock bounds of the current run, fed from the host clock so the
/// elapsed display freezes at termination.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct SessionClock {
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl SessionClock {
    fn note(&mut self, state: game::RunState, now: DateTime<Utc>) {
        if state.is_running() && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if state.is_terminated() && self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }

    fn reset(&mut self) {
        self.started_at = None;
        self.ended_at = None;
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> u32 {
        if let Some(started_at) = self.started_at {
            (self.ended_at.unwrap_or(now) - started_at)
                .num_seconds()
                .max(0) as u32
        } else {
            0
        }
    }
}

/// Receiving half of the presentation contract: plain fields the engine
/// pushes into and `view` reads back.
#[derive(Clone, Debug, Default, PartialEq)]
struct Hud {
    score: u32,
    fails: u32,
    max_fails: u32,
    end_dialog: Option<game::GameSummary>,
    restart_visible: bool,
}

impl PresentationSink for Hud {
    fn update_display(&mut self, score: u32, fails: u32, max_fails: u32) {
        self.score = score;
        self.fails = fails;
        self.max_fails = max_fails;
    }

    fn show_end_of_game(&mut self, summary: &game::GameSummary) {
        self.end_dialog = Some(*summary);
    }

    fn show_restart_control(&mut self) {
        self.restart_visible = true;
    }

    fn hide_restart_control(&mut self) {
        self.restart_visible = false;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Msg {
    StartRequested,
    CellClicked(game::Coord2),
    HideElapsed(u64),
    GapElapsed(u64),
    StartDelayElapsed(u64),
    ClearFlash,
    ClockTick,
    RestartRequested,
    DismissEndDialog,
    ToggleSettings,
    UpdateSettings(Settings),
}

#[derive(Properties, Clone, PartialEq)]
struct CellProps {
    x: game::Coord,
    y: game::Coord,
    marked: bool,
    #[prop_or_default]
    flash: Option<Flash>,
    callback: Callback<game::Coord2>,
}

#[function_component(CellView)]
fn cell_component(props: &CellProps) -> Html {
    let CellProps {
        x,
        y,
        marked,
        flash,
        callback,
    } = props.clone();

    let mut class = classes!("cell");
    if marked {
        class.push(game::TargetMask::marker_tag());
    }
    match flash {
        Some(Flash::Hit) => class.push("hit"),
        Some(Flash::Miss) => class.push("miss"),
        None => {}
    }

    let onclick = Callback::from(move |_: MouseEvent| {
        callback.emit((x, y));
        log::trace!("({}, {}) clicked", x, y);
    });

    html! {
        <td {class} {onclick}/>
    }
}

pub(crate) struct GameView {
    settings: Settings,
    engine: game::GameEngine,
    hud: Hud,
    clock: SessionClock,
    flash: Option<(game::Coord2, Flash)>,
    prev_time: u32,
    settings_open: bool,
    round_timer: Option<Timeout>,
    flash_timer: Option<Timeout>,
    _clock_ticker: Interval,
}

impl GameView {
    fn create_clock_ticker(ctx: &Context<Self>) -> Interval {
        let link = ctx.link().clone();
        Interval::new(500, move || link.send_message(Msg::ClockTick))
    }

    /// Arms the one pending round timer the engine asked for; replacing the
    /// handle drops (and thereby cancels) whatever was armed before.
    fn apply_timer(&mut self, request: game::TimerRequest, ctx: &Context<Self>) {
        use game::TimerRequest::*;

        let epoch = self.engine.timer_epoch();
        let link = ctx.link().clone();
        match request {
            NoChange => {}
            HideTargetAfter(ms) => {
                self.round_timer = Some(Timeout::new(ms, move || {
                    link.send_message(Msg::HideElapsed(epoch))
                }));
            }
            NextRoundAfter(ms) => {
                self.round_timer = Some(Timeout::new(ms, move || {
                    link.send_message(Msg::GapElapsed(epoch))
                }));
            }
            StartAfter(ms) => {
                self.round_timer = Some(Timeout::new(ms, move || {
                    link.send_message(Msg::StartDelayElapsed(epoch))
                }));
            }
        }
    }

    fn drive(&mut self, request: game::TimerRequest, ctx: &Context<Self>) {
        self.apply_timer(request, ctx);
        if self.engine.state().is_terminated() {
            // dropping the handle cancels the timer; the stale-epoch guard
            // already makes a late delivery a no-op
            self.round_timer = None;
        }
        self.clock.note(self.engine.state(), utc_now());
    }

    fn set_flash(&mut self, cell: game::Coord2, flash: Flash, ctx: &Context<Self>) {
        self.flash = Some((cell, flash));
        let link = ctx.link().clone();
        self.flash_timer = Some(Timeout::new(FLASH_CLEAR_MS, move || {
            link.send_message(Msg::ClearFlash)
        }));
    }

    fn cell_flash(&self, cell: game::Coord2) -> Option<Flash> {
        match self.flash {
            Some((pos, flash)) if pos == cell => Some(flash),
            _ => None,
        }
    }

    fn rebuild_session(&mut self, ctx: &Context<Self>) {
        self.engine = new_engine(&self.settings);
        self.hud = Hud::default();
        self.hud
            .update_display(0, 0, self.engine.max_fails());
        self.flash = None;
        self.flash_timer = None;
        self.round_timer = None;
        self.clock.reset();
        self.prev_time = 0;
        ctx.link().send_message(Msg::StartRequested);
    }

    fn round_line(&self) -> String {
        let rounds = self.engine.config().rounds;
        let current = match self.engine.state() {
            game::RunState::Running => (self.engine.round() + 1).min(rounds),
            _ => self.engine.round().min(rounds),
        };
        format!("round {}/{}", current, rounds)
    }

    fn view_restart_control(&self, ctx: &Context<Self>) -> Html {
        if !self.hud.restart_visible {
            return Html::default();
        }
        let onclick = ctx.link().callback(|_| Msg::RestartRequested);
        html! {
            <div class="restart-slot">
                <button class="restart" {onclick}>{"Play again"}</button>
            </div>
        }
    }

    fn view_end_of_game(&self, ctx: &Context<Self>) -> Html {
        let Some(summary) = self.hud.end_dialog else {
            return Html::default();
        };
        match self.settings.policy.end_of_game_ui {
            game::EndOfGameUi::Modal => self.view_end_modal(ctx, summary),
            game::EndOfGameUi::Notification => self.view_end_banner(ctx, summary),
        }
    }

    /// Backdrop click dismisses, the window itself swallows clicks.
    fn view_end_modal(&self, ctx: &Context<Self>, summary: game::GameSummary) -> Html {
        let dismiss = ctx.link().callback(|_: MouseEvent| Msg::DismissEndDialog);
        let keep_open = Callback::from(|e: MouseEvent| e.stop_propagation());
        let restart = ctx.link().callback(|e: MouseEvent| {
            e.stop_propagation();
            Msg::RestartRequested
        });

        html! {
            <Modal>
                <div class="modal-container" onclick={dismiss.clone()}>
                    <div class="modal-window" onclick={keep_open}>
                        <button class="modal-close" onclick={dismiss}>{"×"}</button>
                        <h2>{outcome_title(summary.reason)}</h2>
                        <p>{format!("Score: {}", summary.score)}</p>
                        <p>{format!("Misses: {}/{}", summary.fails, summary.max_fails)}</p>
                        <button class="restart" onclick={restart}>{"Play again"}</button>
                    </div>
                </div>
            </Modal>
        }
    }

    fn view_end_banner(&self, ctx: &Context<Self>, summary: game::GameSummary) -> Html {
        let restart = ctx.link().callback(|_| Msg::RestartRequested);
        html! {
            <aside class="notice">
                <strong>{outcome_title(summary.reason)}</strong>
                <span>{format!(" score {}, misses {}/{}", summary.score, summary.fails, summary.max_fails)}</span>
                <button class="restart" onclick={restart}>{"Play again"}</button>
            </aside>
        }
    }
}

impl Component for GameView {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let settings = Settings::local_or_default();
        let engine = new_engine(&settings);
        let mut hud = Hud::default();
        hud.update_display(0, 0, engine.max_fails());
        // kick off the first session once the component is mounted
        ctx.link().send_message(Msg::StartRequested);
        Self {
            settings,
            engine,
            hud,
            clock: SessionClock::default(),
            flash: None,
            prev_time: 0,
            settings_open: false,
            round_timer: None,
            flash_timer: None,
            _clock_ticker: GameView::create_clock_ticker(ctx),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        use Msg::*;

        match msg {
            StartRequested => {
                let request = self.engine.start(&mut self.hud);
                self.drive(request, ctx);
                true
            }
            CellClicked(pos) => {
                let outcome = self.engine.resolve_click(pos, &mut self.hud);
                match outcome {
                    game::ClickOutcome::Hit => self.set_flash(pos, Flash::Hit, ctx),
                    game::ClickOutcome::Miss => self.set_flash(pos, Flash::Miss, ctx),
                    game::ClickOutcome::Ignored => {}
                }
                if self.engine.state().is_terminated() {
                    self.round_timer = None;
                }
                self.clock.note(self.engine.state(), utc_now());
                outcome.has_update()
            }
            HideElapsed(epoch) => {
                let request = self.engine.on_hide_elapsed(epoch, &mut self.hud);
                self.drive(request, ctx);
                true
            }
            GapElapsed(epoch) => {
                let request = self.engine.on_gap_elapsed(epoch);
                self.drive(request, ctx);
                true
            }
            StartDelayElapsed(epoch) => {
                let request = self.engine.on_restart_elapsed(epoch, &mut self.hud);
                self.drive(request, ctx);
                true
            }
            ClearFlash => {
                self.flash_timer = None;
                self.flash.take().is_some()
            }
            ClockTick => {
                let time = self.clock.elapsed_secs(utc_now());
                if self.prev_time != time {
                    self.prev_time = time;
                    true
                } else {
                    false
                }
            }
            RestartRequested => {
                self.hud.end_dialog = None;
                self.flash = None;
                self.flash_timer = None;
                self.clock.reset();
                self.prev_time = 0;
                let request = self.engine.restart(&mut self.hud);
                self.drive(request, ctx);
                true
            }
            DismissEndDialog => self.hud.end_dialog.take().is_some(),
            ToggleSettings => {
                self.settings_open = !self.settings_open;
                true
            }
            UpdateSettings(settings) => {
                self.settings_open = false;
                if self.settings != settings {
                    self.settings = settings;
                    self.settings.local_save();
                    self.rebuild_session(ctx);
                }
                true
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let (cols, rows) = self.engine.size();
        let running = self.engine.state().is_running();
        let score = format_for_counter(self.hud.score);
        let elapsed = format_for_counter(self.clock.elapsed_secs(utc_now()));
        let fails_class = fails_classes(self.hud.fails, self.hud.max_fails);

        let cb_show_settings = ctx.link().callback(|_| Msg::ToggleSettings);
        let cb_cell = ctx.link().callback(Msg::CellClicked);
        let on_apply = ctx.link().callback(Msg::UpdateSettings);
        let on_cancel = ctx.link().callback(|_| Msg::ToggleSettings);

        html! {
            <div class="gobwhack">
                <small onclick={cb_show_settings}>{"···"}</small>
                <nav>
                    <aside class="score">{score}</aside>
                    <span class={fails_class}>{format!("{}/{}", self.hud.fails, self.hud.max_fails)}</span>
                    <aside class="clock">{elapsed}</aside>
                </nav>
                <table class={running.then_some("running")}>
                    {
                        for (0..rows).map(|y| html! {
                            <tr>
                                {
                                    for (0..cols).map(|x| {
                                        let pos = (x, y);
                                        let marked = self.engine.is_target_at(pos);
                                        let flash = self.cell_flash(pos);
                                        html! {
                                            <CellView {x} {y} {marked} {flash} callback={cb_cell.clone()}/>
                                        }
                                    })
                                }
                            </tr>
                        })
                    }
                </table>
                <footer class="round-line">{self.round_line()}</footer>
                { self.view_restart_control(ctx) }
                { self.view_end_of_game(ctx) }
                <SettingsView
                    open={self.settings_open}
                    current={self.settings}
                    on_apply={on_apply}
                    on_cancel={on_cancel}
                />
            </div>
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn hud_mirrors_engine_through_a_full_session() {
        let config = game::GameConfig::new((4, 4), 1, 10, 20, 5).unwrap();
        let mut engine =
            game::GameEngine::new(config, game::GamePolicy::deferred(), 3).unwrap();
        let mut hud = Hud::default();

        engine.start(&mut hud);
        assert_eq!((hud.score, hud.fails, hud.max_fails), (0, 0, 5));
        assert!(!hud.restart_visible);
        assert_eq!(hud.end_dialog, None);

        let target = engine.current_target().unwrap();
        engine.resolve_click(target, &mut hud);
        assert_eq!(hud.score, 1);

        engine.on_hide_elapsed(engine.timer_epoch(), &mut hud);
        assert!(engine.state().is_terminated());
        let summary = hud.end_dialog.expect("end dialog latched");
        assert_eq!(summary.score, 1);
        assert_eq!(summary.reason, game::EndReason::RoundsExhausted);
        assert!(hud.restart_visible);
    }

    #[test]
    fn session_clock_spans_run_and_freezes_at_termination() {
        let mut clock = SessionClock::default();
        assert_eq!(clock.elapsed_secs(t(5_000)), 0);

        clock.note(game::RunState::Running, t(1_000));
        assert_eq!(clock.elapsed_secs(t(4_000)), 3);

        clock.note(game::RunState::Terminated, t(6_000));
        assert_eq!(clock.elapsed_secs(t(60_000)), 5);

        clock.reset();
        assert_eq!(clock.elapsed_secs(t(60_000)), 0);
    }

    #[test]
    fn fails_counter_classes_escalate_near_the_limit() {
        assert!(!fails_classes(0, 5).contains("warn"));
        assert!(!fails_classes(0, 5).contains("over"));
        assert!(fails_classes(4, 5).contains("warn"));
        assert!(fails_classes(5, 5).contains("over"));
    }

    #[test]
    fn outcome_titles_distinguish_the_two_paths() {
        assert_ne!(
            outcome_title(game::EndReason::FailLimitReached),
            outcome_title(game::EndReason::RoundsExhausted)
        );
    }
}
