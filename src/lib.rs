// study_client: Rust/WASM client for the writing study.
// Screen flow, survey rules and the service protocol live here; the HTML page is plumbing.

mod client;
mod controller;
mod dom;
mod error;
mod form;
mod guard;
mod types;
mod visibility;

use std::rc::Rc;

use wasm_bindgen::prelude::*;

pub use client::{error_message, HttpStudyApi, StudyApi};
pub use controller::{
    Clock, Page, ScreenController, SessionState, SystemClock, Transition, WritingSession,
    EMPTY_ESSAY_PROMPT,
};
pub use dom::{BrowserController, DomPage, EssaySurface};
pub use error::{ClientError, Result, ValidationGap};
pub use form::{
    derive_asurite, names, pack_race_ethnicity, FormCollector, FormSnapshot, FormSource, AGE_RANGE,
};
pub use guard::{GuardSurface, InputGuard, KeyChord, SurfaceEvent, GUARDED_EVENTS};
pub use types::*;
pub use visibility::{
    ConditionalRule, Dependent, Trigger, VisibilityPlan, VisibilityRules, VisibilityTarget,
};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Study page handle exposed to JavaScript.
#[wasm_bindgen]
pub struct StudyApp {
    controller: Rc<BrowserController>,
}

#[wasm_bindgen]
impl StudyApp {
    /// Build from a JSON config, e.g. `{"api_base_url":"https://study.example.edu"}`.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> std::result::Result<StudyApp, JsValue> {
        let config = StudyConfig::from_json(config_json)?;
        let page = DomPage::attach()?;
        let api = HttpStudyApi::new(&config);
        Ok(StudyApp {
            controller: Rc::new(ScreenController::new(config, api, page)),
        })
    }

    /// Attach listeners and show the first screen.
    pub fn mount(&self) -> std::result::Result<(), JsValue> {
        dom::mount(Rc::clone(&self.controller))?;
        Ok(())
    }

    /// Name of the visible screen.
    pub fn screen(&self) -> String {
        self.controller.screen().as_str().to_string()
    }

    /// Session state as JSON, for debugging from the console.
    pub fn state_json(&self) -> std::result::Result<String, JsValue> {
        serde_json::to_string(&self.controller.snapshot())
            .map_err(|e| JsValue::from(ClientError::from(e)))
    }
}
