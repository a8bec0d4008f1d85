use gobwhack_core as game;
use serde::{Deserialize, Serialize};
use yew::prelude::*;

use crate::utils::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Preset {
    Quick,
    Standard,
    Marathon,
}

impl Preset {
    pub(crate) const ALL: [Preset; 3] = [Preset::Quick, Preset::Standard, Preset::Marathon];

    pub(crate) const fn game_config(self) -> game::GameConfig {
        match self {
            Preset::Quick => game::GameConfig::quick(),
            Preset::Standard => game::GameConfig::standard(),
            Preset::Marathon => game::GameConfig::marathon(),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Preset::Quick => "Quick",
            Preset::Standard => "Standard",
            Preset::Marathon => "Marathon",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct Settings {
    pub preset: Preset,
    pub policy: game::GamePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            preset: Preset::Quick,
            policy: game::GamePolicy::deferred(),
        }
    }
}

impl StorageKey for Settings {
    const KEY: &'static str = "gobwhack:settings";
}

#[derive(Properties, PartialEq)]
pub(crate) struct SettingsProps {
    #[prop_or_default]
    pub open: bool,
    pub current: Settings,
    pub on_apply: Callback<Settings>,
    pub on_cancel: Callback<()>,
}

#[function_component]
pub(crate) fn SettingsView(props: &SettingsProps) -> Html {
    let draft = use_state(|| props.current);

    // re-seed the draft from the live settings whenever the dialog opens
    {
        let draft = draft.clone();
        let current = props.current;
        use_effect_with(props.open, move |open| {
            if *open {
                draft.set(current);
            }
            || ()
        });
    }

    let preset_items = Preset::ALL.map(|preset| {
        let selected = draft.preset == preset;
        let onclick = {
            let draft = draft.clone();
            Callback::from(move |e: MouseEvent| {
                e.prevent_default();
                draft.set(Settings {
                    preset,
                    ..*draft
                });
            })
        };
        html! {
            <li>
                <a href="#" class={selected.then_some("selected")} {onclick}>
                    {preset.label()}
                </a>
            </li>
        }
    });

    let instant_fails = matches!(
        draft.policy.fail_accounting,
        game::FailAccounting::Immediate
    );
    let cb_toggle_accounting = {
        let draft = draft.clone();
        Callback::from(move |_: Event| {
            let mut next = *draft;
            next.policy.fail_accounting = match next.policy.fail_accounting {
                game::FailAccounting::Immediate => game::FailAccounting::RoundEnd,
                game::FailAccounting::RoundEnd => game::FailAccounting::Immediate,
            };
            draft.set(next);
        })
    };

    let cb_toggle_gap = {
        let draft = draft.clone();
        Callback::from(move |_: Event| {
            let mut next = *draft;
            next.policy.inter_round_gap = !next.policy.inter_round_gap;
            draft.set(next);
        })
    };

    let modal_end = matches!(draft.policy.end_of_game_ui, game::EndOfGameUi::Modal);
    let cb_toggle_end_ui = {
        let draft = draft.clone();
        Callback::from(move |_: Event| {
            let mut next = *draft;
            next.policy.end_of_game_ui = match next.policy.end_of_game_ui {
                game::EndOfGameUi::Modal => game::EndOfGameUi::Notification,
                game::EndOfGameUi::Notification => game::EndOfGameUi::Modal,
            };
            draft.set(next);
        })
    };

    let cb_apply = {
        let draft = draft.clone();
        let on_apply = props.on_apply.clone();
        Callback::from(move |_: MouseEvent| on_apply.emit(*draft))
    };
    let cb_cancel = {
        let on_cancel = props.on_cancel.clone();
        Callback::from(move |_: MouseEvent| on_cancel.emit(()))
    };

    html! {
        <dialog id="settings" open={props.open}>
            <article>
                <h2>{"Settings"}</h2>
                <ul>
                    { for preset_items }
                </ul>
                <label>
                    <input type="checkbox" checked={instant_fails} onchange={cb_toggle_accounting}/>
                    {"Charge misses instantly"}
                </label>
                <label>
                    <input type="checkbox" checked={draft.policy.inter_round_gap} onchange={cb_toggle_gap}/>
                    {"Pause between rounds"}
                </label>
                <label>
                    <input type="checkbox" checked={modal_end} onchange={cb_toggle_end_ui}/>
                    {"End-of-game dialog"}
                </label>
                <footer>
                    <button type="reset" onclick={cb_cancel}>{"Cancel"}</button>
                    <button onclick={cb_apply}>{"Apply"}</button>
                </footer>
            </article>
        </dialog>
    }
}
