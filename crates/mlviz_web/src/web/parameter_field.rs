use leptos::prelude::*;

use mlviz::params::ParamSpec;

fn format_value(v: f64, spec: &ParamSpec) -> String {
    format!("{:.*}", spec.decimals(), v)
}

/// A labelled slider bound to one lesson parameter.
///
/// `value` mirrors what the driver stored; `on_change` receives the raw
/// slider value and is expected to write back the constrained one.
#[component]
pub fn ParameterField(
    spec: ParamSpec,
    value: ReadSignal<f64>,
    on_change: Callback<f64>,
) -> impl IntoView {
    let input_id = format!("param-{}", spec.key);
    let tip_id = format!("tip-{}", spec.key);
    let readout = {
        let spec = spec.clone();
        move || {
            let text = format_value(value.get(), &spec);
            match spec.units {
                Some(u) => format!("{text} {u}"),
                None => text,
            }
        }
    };
    let default_text = format_value(spec.default, &spec);

    view! {
        <div class="param-field">
            <div class="param-label-row">
                <label class="param-label" for=input_id.clone()>{spec.label}</label>
                <span class="param-value">{readout}</span>
                <span class="tooltip-wrap">
                    <button
                        type="button"
                        class="info-btn"
                        aria-label=format!("Info: {}", spec.label)
                        aria-describedby=tip_id.clone()
                    >
                        "i"
                    </button>
                    <div id=tip_id class="tooltip" role="tooltip">
                        <div class="tooltip-body">{spec.description}</div>
                        <div class="tooltip-meta">{format!("Default: {default_text}")}</div>
                    </div>
                </span>
            </div>
            <input
                id=input_id
                class="slider"
                type="range"
                min=spec.min
                max=spec.max
                step=spec.step
                prop:value=move || value.get()
                on:input=move |ev| {
                    if let Ok(v) = event_target_value(&ev).trim().parse::<f64>() {
                        on_change.run(v);
                    }
                }
            />
        </div>
    }
}
