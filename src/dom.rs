// Browser side of the page boundary: web-sys implementations of Page,
// FormSource, VisibilityTarget and GuardSurface, plus event wiring.
// Only meaningful on wasm32; calling into it natively panics inside web-sys.

use std::rc::Rc;

use tracing::{debug, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::spawn_local;
use web_sys::{
    Document, Element, Event, EventTarget, HtmlElement, HtmlInputElement, HtmlOptionElement,
    HtmlSelectElement, HtmlTextAreaElement, KeyboardEvent, NodeList, Window,
};

use crate::client::HttpStudyApi;
use crate::controller::{Page, ScreenController, SystemClock};
use crate::error::{ClientError, Result};
use crate::form::{FormSource, AGE_RANGE};
use crate::guard::{GuardSurface, KeyChord, SurfaceEvent};
use crate::types::{Control, InstructionAffordances, Screen};
use crate::visibility::{Dependent, VisibilityTarget};

pub type BrowserController = ScreenController<HttpStudyApi, DomPage, SystemClock>;

const ACTIVE_CLASS: &str = "active";
const HIDDEN_CLASS: &str = "hidden";
const ESSAY_TEXTAREA_ID: &str = "essayText";
const DEMOGRAPHICS_FORM_ID: &str = "demographicsForm";
const AGE_SELECT_ID: &str = "ageSelect";
const CONSENT_CARD_ID: &str = "thanks";
const SITE_HEADER_SELECTOR: &str = ".site-header";
const CHOICE_INPUT_SELECTOR: &str =
    r#".radio-group input[type="radio"], .radio-group input[type="checkbox"]"#;

const ALL_SCREENS: [Screen; 5] = [
    Screen::Consent,
    Screen::Demographics,
    Screen::Instructions,
    Screen::Writing,
    Screen::Thanks,
];

fn screen_container_id(screen: Screen) -> &'static str {
    match screen {
        Screen::Consent => "screen-info",
        Screen::Demographics => "screen-demographics",
        Screen::Instructions => "screen-instructions",
        Screen::Writing => "screen-writing",
        Screen::Thanks => "screen-thanks",
    }
}

fn control_selector(control: Control) -> &'static str {
    match control {
        Control::ConsentAgree => "#agree",
        Control::ConsentNext => "#next",
        Control::DemographicsSubmit => r#"#demographicsForm button[type="submit"]"#,
        Control::InstructionsAgree => "#btnInstrAgree",
        Control::StartWriting => "#btnInstrStart",
        Control::BackToWriting => "#btnBackToWriting",
        Control::BackToInstructions => "#btnBackToInstructions",
        Control::SubmitEssay => "#btnSubmitEssay",
    }
}

fn js_error(value: JsValue) -> ClientError {
    ClientError::Page(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

fn elements<T: JsCast>(list: NodeList) -> Vec<T> {
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<T>().ok())
        .collect()
}

fn set_display(element: &Element, value: &str) {
    if let Some(element) = element.dyn_ref::<HtmlElement>() {
        if let Err(err) = element.style().set_property("display", value) {
            warn!(error = ?err, "failed to set display");
        }
    }
}

fn set_class(element: &Element, class: &str, present: bool) {
    let classes = element.class_list();
    let result = if present {
        classes.add_1(class)
    } else {
        classes.remove_1(class)
    };
    if let Err(err) = result {
        warn!(error = ?err, class, "failed to update class list");
    }
}

/// Empty a form control. Radios and checkboxes are unchecked instead.
fn clear_control(element: &Element) {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        match input.type_().as_str() {
            "radio" | "checkbox" => input.set_checked(false),
            _ => {
                if !input.value().is_empty() {
                    input.set_value("");
                }
            }
        }
    } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        select.set_value("");
    } else if let Some(area) = element.dyn_ref::<HtmlTextAreaElement>() {
        area.set_value("");
    }
}

/// The essay textarea.
pub struct EssaySurface {
    element: HtmlTextAreaElement,
}

impl EssaySurface {
    pub fn value(&self) -> String {
        self.element.value()
    }
}

impl GuardSurface for EssaySurface {
    fn is_guarded(&self) -> bool {
        self.element.dataset().get("guarded").as_deref() == Some("1")
    }

    fn mark_guarded(&self) {
        if let Err(err) = self.element.dataset().set("guarded", "1") {
            warn!(error = ?err, "failed to mark essay surface guarded");
        }
    }

    fn install(&self, events: &[&'static str]) {
        let handler = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let chord = event.dyn_ref::<KeyboardEvent>().map(|key| KeyChord {
                key: key.key(),
                ctrl: key.ctrl_key(),
                meta: key.meta_key(),
                shift: key.shift_key(),
            });
            if SurfaceEvent::from_dom(&event.type_(), chord).is_blocked() {
                event.prevent_default();
            }
        });
        for name in events {
            if let Err(err) = self
                .element
                .add_event_listener_with_callback(name, handler.as_ref().unchecked_ref())
            {
                warn!(event = name, error = ?err, "failed to install guard listener");
            }
        }
        // Listeners live as long as the textarea.
        handler.forget();
    }
}

/// The study page in the current browser document.
pub struct DomPage {
    window: Window,
    document: Document,
    essay: Option<EssaySurface>,
}

impl DomPage {
    pub fn attach() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| ClientError::Page("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| ClientError::Page("no document".into()))?;
        let essay = document
            .get_element_by_id(ESSAY_TEXTAREA_ID)
            .and_then(|el| el.dyn_into::<HtmlTextAreaElement>().ok())
            .map(|element| EssaySurface { element });
        if essay.is_none() {
            warn!(id = ESSAY_TEXTAREA_ID, "essay textarea not found");
        }
        Ok(DomPage {
            window,
            document,
            essay,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn query(&self, selector: &str) -> Option<Element> {
        match self.document.query_selector(selector) {
            Ok(found) => found,
            Err(err) => {
                warn!(selector, error = ?err, "invalid selector");
                None
            }
        }
    }

    fn query_all<T: JsCast>(&self, selector: &str) -> Vec<T> {
        match self.document.query_selector_all(selector) {
            Ok(list) => elements(list),
            Err(err) => {
                warn!(selector, error = ?err, "invalid selector");
                Vec::new()
            }
        }
    }

    fn by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn dependent_element(&self, dependent: &Dependent) -> Option<Element> {
        match dependent {
            Dependent::Field(name) => self.query(&format!(r#"[name="{}"]"#, name)),
            Dependent::Section { id, .. } => self.by_id(id),
        }
    }

    /// Fill the age selector with the offered range.
    pub fn populate_age_options(&self) -> Result<()> {
        let Some(select) = self.by_id(AGE_SELECT_ID) else {
            return Ok(());
        };
        for age in AGE_RANGE {
            let option: HtmlOptionElement = self
                .document
                .create_element("option")
                .map_err(js_error)?
                .dyn_into()
                .map_err(|_| ClientError::Page("option element".into()))?;
            let label = age.to_string();
            option.set_value(&label);
            option.set_text_content(Some(&label));
            select.append_child(&option).map_err(js_error)?;
        }
        Ok(())
    }
}

impl FormSource for DomPage {
    fn checked_values(&self, group: &str) -> Vec<String> {
        self.query_all::<HtmlInputElement>(&format!(r#"input[name="{}"]:checked"#, group))
            .iter()
            .map(|input| input.value())
            .collect()
    }

    fn field_value(&self, name: &str) -> Option<String> {
        let element = self.query(&format!(r#"[name="{}"]"#, name))?;
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            Some(input.value())
        } else if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
            Some(select.value())
        } else {
            element
                .dyn_ref::<HtmlTextAreaElement>()
                .map(|area| area.value())
        }
    }

    fn is_checked(&self, name: &str) -> bool {
        self.query(&format!(r#"input[name="{}"]"#, name))
            .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
            .map(|input| input.checked())
            .unwrap_or(false)
    }
}

impl VisibilityTarget for DomPage {
    fn set_visible(&self, dependent: &Dependent, visible: bool) {
        if let Some(element) = self.dependent_element(dependent) {
            set_class(&element, HIDDEN_CLASS, !visible);
        }
    }

    fn clear(&self, dependent: &Dependent) {
        match dependent {
            Dependent::Field(_) => {
                if let Some(element) = self.dependent_element(dependent) {
                    clear_control(&element);
                }
            }
            Dependent::Section { id, .. } => {
                for element in self.query_all::<Element>(&format!(
                    "#{} input, #{} select, #{} textarea",
                    id, id, id
                )) {
                    clear_control(&element);
                }
            }
        }
    }
}

impl Page for DomPage {
    fn show_screen(&self, screen: Screen) {
        for candidate in ALL_SCREENS {
            if let Some(container) = self.by_id(screen_container_id(candidate)) {
                set_class(&container, ACTIVE_CLASS, candidate == screen);
            }
        }
        // The big header belongs to the consent page only.
        if let Some(header) = self.query(SITE_HEADER_SELECTOR) {
            let display = if screen == Screen::Consent { "block" } else { "none" };
            set_display(&header, display);
        }
    }

    fn render_instructions(&self, affordances: InstructionAffordances) {
        let bars = [
            ("instrAgreeBar", affordances.agree),
            ("instrStartBar", affordances.start_writing),
            ("instrBackBar", affordances.back_to_writing),
        ];
        for (id, shown) in bars {
            if let Some(bar) = self.by_id(id) {
                set_display(&bar, if shown { "flex" } else { "none" });
            }
        }
    }

    fn reveal_consent_confirmation(&self) {
        if let Some(card) = self.by_id(CONSENT_CARD_ID) {
            set_display(&card, "block");
        }
    }

    fn set_control_enabled(&self, control: Control, enabled: bool) {
        let Some(element) = self.query(control_selector(control)) else {
            return;
        };
        let result = if enabled {
            element.remove_attribute("disabled")
        } else {
            element.set_attribute("disabled", "")
        };
        if let Err(err) = result {
            warn!(?control, error = ?err, "failed to toggle control");
        }
    }

    fn alert(&self, message: &str) {
        if let Err(err) = self.window.alert_with_message(message) {
            warn!(error = ?err, "alert failed");
        }
    }

    fn confirm(&self, message: &str) -> bool {
        self.window.confirm_with_message(message).unwrap_or(false)
    }

    fn essay_text(&self) -> String {
        self.essay.as_ref().map(EssaySurface::value).unwrap_or_default()
    }

    fn writing_surface(&self) -> Option<&dyn GuardSurface> {
        self.essay.as_ref().map(|s| s as &dyn GuardSurface)
    }
}

fn listen<F>(target: &EventTarget, event: &str, mut handler: F) -> Result<()>
where
    F: FnMut(Event) + 'static,
{
    let closure = Closure::<dyn FnMut(Event)>::new(move |e: Event| handler(e));
    target
        .add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
        .map_err(js_error)?;
    // The page lives as long as the tab.
    closure.forget();
    Ok(())
}

fn on_click<F>(page: &DomPage, control: Control, mut handler: F) -> Result<()>
where
    F: FnMut() + 'static,
{
    match page.query(control_selector(control)) {
        Some(element) => listen(&element, "click", move |_| handler()),
        None => {
            debug!(?control, "control not present on page");
            Ok(())
        }
    }
}

/// Wire every control, form and change event to the controller and render the first screen.
pub fn mount(controller: Rc<BrowserController>) -> Result<()> {
    let page = controller.page();
    page.populate_age_options()?;

    let c = Rc::clone(&controller);
    on_click(page, Control::ConsentAgree, move || {
        c.acknowledge_consent();
    })?;

    let c = Rc::clone(&controller);
    on_click(page, Control::ConsentNext, move || {
        c.continue_from_consent();
    })?;

    if let Some(form) = page.by_id(DEMOGRAPHICS_FORM_ID) {
        let c = Rc::clone(&controller);
        listen(&form, "submit", move |event| {
            event.prevent_default();
            let c = Rc::clone(&c);
            spawn_local(async move {
                let _ = c.submit_demographics().await;
            });
        })?;
    }

    let c = Rc::clone(&controller);
    on_click(page, Control::InstructionsAgree, move || {
        c.agree_to_instructions();
    })?;

    let c = Rc::clone(&controller);
    on_click(page, Control::StartWriting, move || {
        let c = Rc::clone(&c);
        spawn_local(async move {
            let _ = c.start_writing().await;
        });
    })?;

    let c = Rc::clone(&controller);
    on_click(page, Control::BackToWriting, move || {
        c.return_to_writing();
    })?;

    let c = Rc::clone(&controller);
    on_click(page, Control::BackToInstructions, move || {
        c.back_to_instructions();
    })?;

    let c = Rc::clone(&controller);
    on_click(page, Control::SubmitEssay, move || {
        let c = Rc::clone(&c);
        spawn_local(async move {
            let _ = c.submit_essay().await;
        });
    })?;

    for input in page.query_all::<Element>(CHOICE_INPUT_SELECTOR) {
        let c = Rc::clone(&controller);
        listen(&input, "change", move |_| c.refresh_visibility())?;
    }

    controller.start();
    Ok(())
}
