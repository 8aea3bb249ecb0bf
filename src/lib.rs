//! # mlviz
//!
//! Step-by-step machine-learning lessons: a small dataset, one textbook
//! update rule, a driver that advances it on demand or on a timer, and a
//! renderer that redraws the chart after every step.
//!
//! ## Quick Start
//!
//! ```
//! use mlviz::prelude::*;
//!
//! let mut driver = new_driver(LessonKind::Kmeans, Prng::new(42));
//! driver.set_param("k", 3.0).unwrap();
//!
//! while driver.phase() != DriverPhase::Converged {
//!     driver.step_once();
//!     if driver.sim().iteration() > 100 {
//!         break;
//!     }
//! }
//! let svg = driver.scene(640.0, 480.0).to_svg();
//! assert!(svg.starts_with("<svg"));
//! ```
//!
//! ## Feature Flags
//!
//! - `serde` (default): serialization of lesson state and frames
//! - `parallel`: build kNN graphs with rayon
//!
//! ## Modules
//!
//! - [`dataset`]: points, scores and their generators
//! - [`params`]: bounded lesson controls
//! - [`lessons`]: the step functions
//! - [`driver`]: stepping, auto-advance and convergence
//! - [`schedule`]: cancelable tick scheduling
//! - [`timeline`]: staged reveal animations
//! - [`render`]: backend-neutral scenes and the SVG surface
//! - [`chapters`]: chapter index and sitemap

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/time.rs"]
pub mod time;

#[path = "core/dataset.rs"]
pub mod dataset;

#[path = "core/params.rs"]
pub mod params;

#[path = "core/timeline.rs"]
pub mod timeline;

#[path = "core/render.rs"]
pub mod render;

#[path = "core/driver.rs"]
pub mod driver;

#[path = "core/schedule.rs"]
pub mod schedule;

pub mod chapters;
pub mod error;
pub mod lessons;

pub use error::{Error, Result};

/// Prelude module for convenient imports.
///
/// ```
/// use mlviz::prelude::*;
/// ```
pub mod prelude {
    pub use crate::chapters::{chapter, chapters, Chapter};
    pub use crate::dataset::{Point, Scored};
    pub use crate::driver::{
        Driver, DriverPhase, HaltReason, Metric, ParamEffect, Simulation, StepOutcome, TickReply,
        TickTicket,
    };
    pub use crate::error::{Error, Result};
    pub use crate::lessons::{new_driver, ActiveLesson, Frame, LessonKind};
    pub use crate::params::{ParamSet, ParamSpec};
    pub use crate::prng::Prng;
    pub use crate::render::{Scene, Surface, SvgSurface, Viewport};
    pub use crate::schedule::{ManualScheduler, Runner, TickScheduler};
    pub use crate::timeline::{PlayerEvent, Timeline, TimelinePlayer};
}
