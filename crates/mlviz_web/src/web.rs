use leptos::prelude::*;
use mlviz::chapters::{self, Chapter};
use mlviz::driver::{DriverPhase, Simulation, StepOutcome, TickReply};
use mlviz::lessons::{new_driver, ActiveLesson, LessonKind};
use mlviz::prng::Prng;
use mlviz::schedule::Runner;
use mlviz::time::Duration;
use mlviz::timeline::{PlayerEvent, TimelinePlayer};

use crate::ui_model::{format_metric, halt_label, phase_label, slider_specs, Controls, Route};

mod canvas;
mod latex;
mod markdown;
mod parameter_field;
mod timer;

use parameter_field::ParameterField;
use timer::{Interval, WebScheduler};

type LessonRunner = Runner<ActiveLesson, WebScheduler>;

const CANVAS_W: f64 = 640.0;
const CANVAS_H: f64 = 420.0;
const FRAME_MS: i32 = 16;

pub fn start() {
    mount_to_body(|| view! { <App /> });
}

fn log(msg: &str) {
    web_sys::console::log_1(&msg.into());
}

fn warn(msg: &str) {
    web_sys::console::warn_1(&msg.into());
}

fn current_route() -> Route {
    web_sys::window()
        .and_then(|w| w.location().pathname().ok())
        .map(|p| Route::parse(&p))
        .unwrap_or_default()
}

fn prefers_reduced_motion() -> bool {
    web_sys::window()
        .and_then(|w| w.match_media("(prefers-reduced-motion: reduce)").ok().flatten())
        .is_some_and(|m| m.matches())
}

#[component]
fn App() -> impl IntoView {
    let route = current_route();
    if let Some(doc) = web_sys::window().and_then(|w| w.document()) {
        doc.set_title(&format!("{} | mlviz", route.title()));
    }

    let page = match route.chapter() {
        Some(chapter) => view! { <ChapterPage chapter=chapter /> }.into_any(),
        None if route == Route::Home => view! { <Home /> }.into_any(),
        None => view! {
            <section class="not-found">
                <h1>{route.title()}</h1>
                <a href="/">"Back to the index"</a>
            </section>
        }
        .into_any(),
    };

    // Typeset formulas once the page is in the DOM.
    Effect::new(move |_| latex::render_all());

    view! {
        <div class="app">
            <header class="site-header">
                <a class="brand" href="/">"mlviz"</a>
                <nav class="chapter-nav">
                    {chapters::chapters()
                        .iter()
                        .map(|c| {
                            let active = route == Route::Chapter(c.index);
                            view! {
                                <a href=c.path() class:active=active>
                                    {format!("{}. {}", c.index, c.title)}
                                </a>
                            }
                        })
                        .collect_view()}
                </nav>
            </header>
            <main>{page}</main>
        </div>
    }
}

#[component]
fn Home() -> impl IntoView {
    view! {
        <section class="home">
            <h1>{Route::Home.title()}</h1>
            <ol class="chapter-list">
                {chapters::chapters()
                    .iter()
                    .map(|c| {
                        view! {
                            <li>
                                <a href=c.path()>{c.title}</a>
                                <ul>
                                    {c.lessons
                                        .iter()
                                        .map(|k| view! { <li>{k.display_name()}": "{k.description()}</li> })
                                        .collect_view()}
                                </ul>
                            </li>
                        }
                    })
                    .collect_view()}
            </ol>
        </section>
    }
}

#[component]
fn ChapterPage(chapter: &'static Chapter) -> impl IntoView {
    let (prev, next) = Route::Chapter(chapter.index).neighbours();
    let link = |route: Option<Route>, class: &'static str, text: &'static str| {
        route.map(|r| view! { <a class=class href=r.path()>{text}</a> })
    };

    view! {
        <article class="chapter">
            <h1>{Route::Chapter(chapter.index).title()}</h1>
            <div class="intro" inner_html=markdown::render_markdown(chapter.intro)></div>
            {chapter
                .lessons
                .iter()
                .map(|&kind| view! { <LessonWidget kind=kind /> })
                .collect_view()}
            <nav class="pager">
                {link(prev, "prev", "Previous chapter")}
                {link(next, "next", "Next chapter")}
            </nav>
        </article>
    }
}

/// One interactive lesson: canvas, controls, sliders and a metric readout.
#[component]
fn LessonWidget(kind: LessonKind) -> impl IntoView {
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
    let runner = StoredValue::new_local(None::<LessonRunner>);
    let player = StoredValue::new_local(None::<TimelinePlayer>);
    let reveal_loop = StoredValue::new_local(None::<Interval>);

    // Bumped after every change the canvas or readout must reflect.
    let (version, set_version) = signal(0u64);
    let (phase, set_phase) = signal(DriverPhase::Idle);
    let (status, set_status) = signal(String::new());
    let motion = !prefers_reduced_motion();

    let bump = move || {
        set_version.try_update(|v| *v += 1);
    };

    let sync = move || {
        let snapshot = runner
            .try_with_value(|r| {
                r.as_ref()
                    .map(|r| (r.driver().phase(), r.driver().halt_reason()))
            })
            .flatten();
        if let Some((p, halt)) = snapshot {
            set_phase.try_set(p);
            let text = match halt {
                Some(reason) => format!("{}: {}", phase_label(p), halt_label(reason)),
                None => phase_label(p).to_string(),
            };
            set_status.try_set(text);
        }
        bump();
    };

    let start_reveal = move || {
        if !motion {
            player.set_value(None);
            return;
        }
        let Some(timeline) = runner.with_value(|r| r.as_ref().map(|r| r.driver().sim().reveal()))
        else {
            return;
        };
        player.set_value(Some(TimelinePlayer::new(timeline)));
        let tick = move || {
            let event = player
                .try_update_value(|p| p.as_mut().map(|p| p.advance(f64::from(FRAME_MS))))
                .flatten();
            if !matches!(event, Some(PlayerEvent::Playing(_))) {
                player.try_update_value(|p| *p = None);
                reveal_loop.try_update_value(|l| {
                    if let Some(l) = l.as_mut() {
                        l.clear();
                    }
                });
            }
            bump();
        };
        match Interval::new(FRAME_MS, tick) {
            Ok(i) => reveal_loop.set_value(Some(i)),
            Err(e) => {
                warn(&e);
                player.set_value(None);
            }
        }
    };

    let scheduler = WebScheduler::new(move |ticket| {
        let reply = runner
            .try_update_value(|r| r.as_mut().map(|r| r.fire(ticket)))
            .flatten();
        match reply {
            Some(TickReply::Continue) => bump(),
            Some(TickReply::Halted(reason)) => {
                log(&format!("{}: {}", kind.label(), halt_label(reason)));
                sync();
            }
            Some(TickReply::Stale) | None => {}
        }
    });
    let delay = Duration::from_millis(u64::from(kind.default_tick_ms()));
    runner.set_value(Some(Runner::new(
        new_driver(kind, Prng::from_clock()),
        scheduler,
        delay,
    )));
    start_reveal();
    sync();

    let param_fields = slider_specs(kind)
        .into_iter()
        .map(|spec| {
            let (value, set_value) = signal(spec.default);
            let key = spec.key;
            let on_change = Callback::new(move |requested: f64| {
                let result = runner
                    .try_update_value(|r| {
                        r.as_mut().map(|r| {
                            let generation = r.driver().generation();
                            r.set_param(key, requested)
                                .map(|stored| (stored, r.driver().generation() != generation))
                        })
                    })
                    .flatten();
                match result {
                    Some(Ok((stored, regenerated))) => {
                        set_value.set(stored);
                        if regenerated {
                            start_reveal();
                        }
                    }
                    Some(Err(e)) => warn(&e.to_string()),
                    None => {}
                }
                sync();
            });
            (set_value, view! { <ParameterField spec=spec value=value on_change=on_change /> })
        })
        .collect::<Vec<_>>();
    let param_setters: Vec<WriteSignal<f64>> = param_fields.iter().map(|(s, _)| *s).collect();
    let param_views = param_fields.into_iter().map(|(_, v)| v).collect_view();

    let do_step = move |_| {
        let outcome = runner
            .try_update_value(|r| r.as_mut().map(|r| r.step_once()))
            .flatten();
        if outcome == Some(StepOutcome::Diverged) {
            warn(&format!("{}: diverged", kind.label()));
        }
        sync();
    };

    let do_run = move |_| {
        let started = runner
            .try_update_value(|r| r.as_mut().is_some_and(|r| r.start()))
            .unwrap_or(false);
        if started {
            log(&format!("{}: auto-advance started", kind.label()));
        }
        sync();
    };

    let do_stop = move |_| {
        runner.try_update_value(|r| {
            if let Some(r) = r.as_mut() {
                r.stop();
            }
        });
        sync();
    };

    let do_reset = move |_| {
        runner.try_update_value(|r| {
            if let Some(r) = r.as_mut() {
                r.reset();
            }
        });
        start_reveal();
        sync();
    };

    let do_defaults = move |_| {
        let stored = runner
            .try_update_value(|r| {
                r.as_mut().map(|r| {
                    r.reset_params();
                    r.driver()
                        .params()
                        .specs()
                        .iter()
                        .map(|s| r.driver().params().get(s.key))
                        .collect::<Vec<_>>()
                })
            })
            .flatten()
            .unwrap_or_default();
        for (set, v) in param_setters.iter().zip(stored) {
            set.set(v);
        }
        start_reveal();
        sync();
    };

    Effect::new(move |_| {
        version.track();
        let Some(canvas) = canvas_ref.get() else {
            return;
        };
        let Some(mut scene) =
            runner.with_value(|r| r.as_ref().map(|r| r.driver().scene(CANVAS_W, CANVAS_H)))
        else {
            return;
        };
        if let Some(frame) = player.with_value(|p| p.as_ref().map(|p| p.frame())) {
            scene.apply_reveal(&frame);
        }
        if let Err(e) = canvas::paint_scene(&canvas, &scene) {
            warn(&e);
        }
    });

    on_cleanup(move || {
        reveal_loop.try_update_value(|l| *l = None);
        // Dropping the runner clears its pending timeout.
        runner.try_update_value(|r| *r = None);
    });

    let readout = move || {
        version.track();
        let (iteration, metrics) = runner
            .try_with_value(|r| {
                r.as_ref()
                    .map(|r| (r.driver().sim().iteration(), r.driver().sim().metrics()))
            })
            .flatten()
            .unwrap_or_default();
        view! {
            <dl class="metrics">
                <dt>"iteration"</dt>
                <dd>{iteration}</dd>
                {metrics
                    .into_iter()
                    .map(|m| view! { <dt>{m.name}</dt><dd>{format_metric(m.value)}</dd> })
                    .collect_view()}
            </dl>
        }
    };
    let controls = move || Controls::for_phase(phase.get());

    view! {
        <section class="lesson" id=kind.label()>
            <h2>{kind.display_name()}</h2>
            <p class="lesson-description">{kind.description()}</p>
            <div class="formula katex-src">{kind.formula()}</div>
            <canvas
                node_ref=canvas_ref
                class="lesson-canvas"
                width={CANVAS_W as u32}
                height={CANVAS_H as u32}
            ></canvas>
            <div class="controls">
                <button class="btn" on:click=do_step disabled=move || !controls().step>"Step"</button>
                <button class="btn" on:click=do_run disabled=move || !controls().run>"Run"</button>
                <button class="btn" on:click=do_stop disabled=move || !controls().stop>"Stop"</button>
                <button class="btn" on:click=do_reset disabled=move || !controls().reset>"Reset"</button>
                <button class="btn link" on:click=do_defaults>"Defaults"</button>
                <span class="status">{move || status.get()}</span>
            </div>
            {readout}
            <div class="params">{param_views}</div>
        </section>
    }
}
