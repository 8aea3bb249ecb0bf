//! Browser timers behind [`TickScheduler`].

use std::rc::Rc;

use mlviz::driver::TickTicket;
use mlviz::schedule::TickScheduler;
use mlviz::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;

/// A pending `setTimeout`. Dropping it clears the timeout.
pub struct Timeout {
    id: Option<i32>,
    _callback: Closure<dyn FnMut()>,
}

impl Drop for Timeout {
    fn drop(&mut self) {
        if let (Some(id), Some(window)) = (self.id, web_sys::window()) {
            window.clear_timeout_with_handle(id);
        }
    }
}

/// `setTimeout`/`clearTimeout` backend.
///
/// The timeout callback only queues the ticket on the microtask queue; the
/// delivery closure runs after the callback returned, so the runner may drop
/// the [`Timeout`] (and its closure) while handling the tick.
pub struct WebScheduler {
    deliver: Rc<dyn Fn(TickTicket)>,
}

impl WebScheduler {
    pub fn new(deliver: impl Fn(TickTicket) + 'static) -> Self {
        Self {
            deliver: Rc::new(deliver),
        }
    }
}

impl TickScheduler for WebScheduler {
    type Handle = Timeout;

    fn schedule(&mut self, delay: Duration, ticket: TickTicket) -> Timeout {
        let deliver = Rc::clone(&self.deliver);
        let callback = Closure::wrap(Box::new(move || {
            let deliver = Rc::clone(&deliver);
            spawn_local(async move { deliver(ticket) });
        }) as Box<dyn FnMut()>);

        let delay_ms = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let id = web_sys::window().and_then(|w| {
            w.set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                delay_ms,
            )
            .ok()
        });
        if id.is_none() {
            web_sys::console::error_1(&"timer: setTimeout failed".into());
        }
        Timeout {
            id,
            _callback: callback,
        }
    }

    fn cancel(&mut self, handle: Timeout) {
        drop(handle);
    }
}

/// A repeating `setInterval`, cleared on drop.
pub struct Interval {
    id: Option<i32>,
    _callback: Closure<dyn FnMut()>,
}

impl Interval {
    pub fn new(period_ms: i32, tick: impl FnMut() + 'static) -> Result<Self, String> {
        let callback = Closure::wrap(Box::new(tick) as Box<dyn FnMut()>);
        let window = web_sys::window().ok_or("timer: no window".to_string())?;
        let id = window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                period_ms,
            )
            .map_err(|_| "timer: setInterval failed".to_string())?;
        Ok(Self {
            id: Some(id),
            _callback: callback,
        })
    }

    /// Stop firing without freeing the callback; safe from inside it.
    pub fn clear(&mut self) {
        if let (Some(id), Some(window)) = (self.id.take(), web_sys::window()) {
            window.clear_interval_with_handle(id);
        }
    }
}

impl Drop for Interval {
    fn drop(&mut self) {
        self.clear();
    }
}
