#![forbid(unsafe_code)]

//! `wasm-bindgen` exports for the BranchmapRunner.
//!
//! This module wraps [`branchmap_web::OverlayRunner`] with JS-friendly types.
//! Only compiled on `wasm32` targets.

use branchmap_core::Size;
use branchmap_web::OverlayRunner;
use js_sys::{Array, Object, Reflect};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::resize_edges_from_handle;

fn console_error(msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(error) = Reflect::get(&console, &"error".into()) else {
        return;
    };
    let Ok(error_fn) = error.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = error_fn.call1(&console, &JsValue::from_str(msg));
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

fn set_js(obj: &Object, key: &str, value: JsValue) {
    let _ = Reflect::set(obj, &JsValue::from_str(key), &value);
}

fn json_to_js(json: &str) -> JsValue {
    js_sys::JSON::parse(json).unwrap_or(JsValue::NULL)
}

fn serialize_to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    serde_json::to_string(value).map_or(JsValue::NULL, |json| json_to_js(&json))
}

/// WASM runner for the branchmap overlay.
///
/// Host-driven: the content script calls `step` whenever `nextDeadline` passes
/// or something happened on the page, and performs the commands it drains.
#[wasm_bindgen]
pub struct BranchmapRunner {
    inner: OverlayRunner,
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();
}

#[wasm_bindgen]
impl BranchmapRunner {
    /// Create a runner.
    ///
    /// `config` is tracker configuration JSON (empty for defaults), `snapshot`
    /// the current page snapshot JSON, and `state` what `exportState` returned
    /// earlier, if anything.
    #[wasm_bindgen(constructor)]
    pub fn new(
        config: &str,
        snapshot: &str,
        state: Option<String>,
        width: f64,
        height: f64,
    ) -> Result<BranchmapRunner, JsError> {
        install_panic_hook();
        let inner =
            OverlayRunner::from_json(config, snapshot, state.as_deref(), Size::new(width, height))?;
        Ok(Self { inner })
    }

    /// Arm the startup delay and background timers. Call exactly once.
    pub fn init(&mut self) {
        self.inner.init();
    }

    /// Advance deterministic clock by `dt_ms` milliseconds.
    #[wasm_bindgen(js_name = advanceTime)]
    pub fn advance_time(&mut self, dt_ms: f64) {
        self.inner.advance_time_ms(dt_ms);
    }

    /// Set deterministic clock to an absolute millisecond timestamp.
    #[wasm_bindgen(js_name = setTime)]
    pub fn set_time(&mut self, ts_ms: f64) {
        self.inner.set_time_ms(ts_ms);
    }

    /// Replace the page snapshot. Returns `false` if it did not parse.
    #[wasm_bindgen(js_name = pushSnapshot)]
    pub fn push_snapshot(&mut self, json: &str) -> bool {
        self.inner.push_snapshot_json(json)
    }

    /// Report a mutation hint (`user_turn_added`, `indicator_added`,
    /// `nav_control_toggled`, `other`). Returns `true` if it queued a pass.
    #[wasm_bindgen(js_name = notifyMutation)]
    pub fn notify_mutation(&mut self, hint: &str) -> bool {
        self.inner.notify_mutation(hint)
    }

    /// Ask for a pass right away.
    pub fn refresh(&mut self) {
        self.inner.refresh();
    }

    /// Forward an observed response body. Returns the number of events used.
    #[wasm_bindgen(js_name = ingestResponse)]
    pub fn ingest_response(&mut self, url: &str, body: &str) -> u32 {
        u32::try_from(self.inner.ingest_response(url, body)).unwrap_or(u32::MAX)
    }

    /// Run everything due now.
    ///
    /// Returns `{ now_ms, pass, navigation, commands, next_deadline_ms }`.
    pub fn step(&mut self) -> JsValue {
        serialize_to_js(&self.inner.step())
    }

    /// Milliseconds timestamp of the next due work, or `null`.
    #[wasm_bindgen(js_name = nextDeadline)]
    pub fn next_deadline(&self) -> Option<f64> {
        self.inner
            .session()
            .next_deadline()
            .map(|d| d.as_secs_f64() * 1000.0)
    }

    /// Click at a canvas point. Returns the resulting action or `null`.
    pub fn click(&mut self, x: f64, y: f64) -> JsValue {
        self.inner
            .click(x, y)
            .map_or(JsValue::NULL, |action| serialize_to_js(&action))
    }

    /// Click a node by id. Returns the resulting action or `null`.
    #[wasm_bindgen(js_name = clickNode)]
    pub fn click_node(&mut self, id: &str) -> JsValue {
        self.inner
            .click_node(id)
            .map_or(JsValue::NULL, |action| serialize_to_js(&action))
    }

    pub fn hover(&mut self, x: f64, y: f64) {
        self.inner.hover(x, y);
    }

    pub fn leave(&mut self) {
        self.inner.leave();
    }

    /// Visible tooltip as `{ node, text }`, or `null`.
    pub fn tooltip(&self) -> JsValue {
        let Some((node, text)) = self.inner.tooltip() else {
            return JsValue::NULL;
        };
        let obj = Object::new();
        set_js(&obj, "node", JsValue::from_str(node));
        set_js(&obj, "text", JsValue::from_str(text));
        obj.into()
    }

    /// Pointer pressed on the overlay header.
    #[wasm_bindgen(js_name = pointerDownHeader)]
    pub fn pointer_down_header(&mut self, x: f64, y: f64) {
        self.inner.pointer_down_header(x, y);
    }

    /// Pointer pressed on a resize handle (`"n"`, `"se"`, ...).
    ///
    /// Returns `false` for an unknown handle.
    #[wasm_bindgen(js_name = pointerDownHandle)]
    pub fn pointer_down_handle(&mut self, handle: &str, x: f64, y: f64) -> bool {
        resize_edges_from_handle(handle)
            .is_some_and(|edges| self.inner.pointer_down_edge(edges.bits(), x, y))
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.inner.pointer_move(x, y);
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self) {
        self.inner.pointer_up();
    }

    /// Show or hide the overlay. Returns the new visibility.
    pub fn toggle(&mut self) -> bool {
        self.inner.toggle()
    }

    #[wasm_bindgen(js_name = isVisible)]
    pub fn is_visible(&self) -> bool {
        self.inner.is_visible()
    }

    #[wasm_bindgen(js_name = resizeViewport)]
    pub fn resize_viewport(&mut self, width: f64, height: f64) {
        self.inner.resize_viewport(width, height);
    }

    /// Overlay `{ x, y, width, height }` in viewport pixels.
    pub fn geometry(&self) -> JsValue {
        serialize_to_js(&self.inner.geometry())
    }

    /// Drain queued host commands. Returns `Array<object>`.
    #[wasm_bindgen(js_name = takeCommands)]
    pub fn take_commands(&mut self) -> Array {
        let arr = Array::new();
        for command in self.inner.take_commands() {
            arr.push(&serialize_to_js(&command));
        }
        arr
    }

    /// Current scene as a plain object.
    pub fn scene(&self) -> JsValue {
        serialize_to_js(self.inner.scene())
    }

    /// Current scene as an `<svg>` string.
    #[wasm_bindgen(js_name = sceneSvg)]
    pub fn scene_svg(&self) -> String {
        self.inner.scene_svg()
    }

    /// Persisted state as a JSON string, for `localStorage` or similar.
    #[wasm_bindgen(js_name = exportState)]
    pub fn export_state(&self) -> Result<String, JsError> {
        Ok(self.inner.export_state_json()?)
    }
}
