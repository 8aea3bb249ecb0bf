//! Routing and widget control state shared by the wasm UI and host tests.
//!
//! Kept out of the wasm-only `web` module so the page inventory and button
//! rules can be unit-tested natively.

use mlviz::chapters::{self, Chapter};
use mlviz::driver::{DriverPhase, HaltReason};
use mlviz::lessons::LessonKind;
use mlviz::params::ParamSpec;

/// Pages the site serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Home,
    Chapter(usize),
    NotFound,
}

impl Route {
    /// Map a location pathname onto a page. Trailing slashes are ignored.
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Route::Home;
        }
        match trimmed.strip_prefix("/chapter/") {
            Some(n) => match n.parse::<usize>() {
                Ok(index) if chapters::chapter(index).is_ok() => Route::Chapter(index),
                _ => Route::NotFound,
            },
            None => Route::NotFound,
        }
    }

    pub fn path(self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Chapter(index) => format!("/chapter/{index}"),
            Route::NotFound => "/404".to_string(),
        }
    }

    pub fn chapter(self) -> Option<&'static Chapter> {
        match self {
            Route::Chapter(index) => chapters::chapter(index).ok(),
            _ => None,
        }
    }

    pub fn title(self) -> String {
        match self.chapter() {
            Some(c) => format!("{}. {}", c.index, c.title),
            None if self == Route::Home => "Machine learning, step by step".to_string(),
            None => "Page not found".to_string(),
        }
    }

    /// Neighbouring chapters for the prev/next links.
    pub fn neighbours(self) -> (Option<Route>, Option<Route>) {
        let Route::Chapter(index) = self else {
            return (None, None);
        };
        let prev = (index > 1).then(|| Route::Chapter(index - 1));
        let next = chapters::chapter(index + 1)
            .ok()
            .map(|c| Route::Chapter(c.index));
        (prev, next)
    }
}

/// Which lesson buttons are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub step: bool,
    pub run: bool,
    pub stop: bool,
    pub reset: bool,
}

impl Controls {
    pub fn for_phase(phase: DriverPhase) -> Self {
        match phase {
            DriverPhase::Idle | DriverPhase::Stepping => Controls {
                step: true,
                run: true,
                stop: false,
                reset: true,
            },
            DriverPhase::Running => Controls {
                step: false,
                run: false,
                stop: true,
                reset: true,
            },
            DriverPhase::Converged => Controls {
                step: false,
                run: false,
                stop: false,
                reset: true,
            },
        }
    }
}

/// Sliders shown under a lesson, the iteration cap last.
pub fn slider_specs(kind: LessonKind) -> Vec<ParamSpec> {
    kind.default_params().specs().to_vec()
}

pub fn phase_label(phase: DriverPhase) -> &'static str {
    match phase {
        DriverPhase::Idle => "ready",
        DriverPhase::Stepping => "paused",
        DriverPhase::Running => "running",
        DriverPhase::Converged => "converged",
    }
}

pub fn halt_label(reason: HaltReason) -> &'static str {
    match reason {
        HaltReason::Converged => "converged",
        HaltReason::Diverged => "diverged; try a smaller step size",
        HaltReason::IterationCap => "iteration cap reached",
    }
}

/// Render a metric for the readout line.
pub fn format_metric(value: f64) -> String {
    if !value.is_finite() {
        return "–".to_string();
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-3..1e5).contains(&magnitude) {
        format!("{value:.3e}")
    } else if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_round_trip_for_every_chapter() {
        for c in chapters::chapters() {
            let route = Route::parse(&c.path());
            assert_eq!(route, Route::Chapter(c.index));
            assert_eq!(route.path(), c.path());
            assert!(route.title().contains(c.title));
        }
    }

    #[test]
    fn root_and_trailing_slash() {
        assert_eq!(Route::parse(""), Route::Home);
        assert_eq!(Route::parse("/"), Route::Home);
        assert_eq!(Route::parse("/chapter/2/"), Route::Chapter(2));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(Route::parse("/chapter/0"), Route::NotFound);
        assert_eq!(Route::parse("/chapter/99"), Route::NotFound);
        assert_eq!(Route::parse("/chapter/two"), Route::NotFound);
        assert_eq!(Route::parse("/about"), Route::NotFound);
    }

    #[test]
    fn neighbours_stop_at_the_ends() {
        let last = chapters::chapters().len();
        assert_eq!(Route::Chapter(1).neighbours(), (None, Some(Route::Chapter(2))));
        assert_eq!(
            Route::Chapter(last).neighbours(),
            (Some(Route::Chapter(last - 1)), None)
        );
        assert_eq!(Route::Home.neighbours(), (None, None));
    }

    #[test]
    fn converged_only_allows_reset() {
        let c = Controls::for_phase(DriverPhase::Converged);
        assert_eq!(
            c,
            Controls {
                step: false,
                run: false,
                stop: false,
                reset: true
            }
        );
        assert!(Controls::for_phase(DriverPhase::Running).stop);
        assert!(!Controls::for_phase(DriverPhase::Idle).stop);
        assert_eq!(phase_label(DriverPhase::Stepping), "paused");
        assert_eq!(halt_label(HaltReason::IterationCap), "iteration cap reached");
    }

    #[test]
    fn every_lesson_gets_a_cap_slider() {
        for k in LessonKind::all() {
            let specs = slider_specs(*k);
            assert_eq!(specs.last().map(|s| s.key), Some("max_iterations"), "{}", k.label());
            assert_eq!(specs.len(), k.param_specs().len() + 1);
        }
    }

    #[test]
    fn metric_formatting() {
        assert_eq!(format_metric(3.0), "3");
        assert_eq!(format_metric(0.25), "0.2500");
        assert_eq!(format_metric(f64::NAN), "–");
        assert_eq!(format_metric(1.5e-6), "1.500e-6");
    }
}
