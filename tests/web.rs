#![cfg(target_arch = "wasm32")]

use study_client::{
    names, DomPage, FormCollector, FormSource, GuardSurface, InputGuard, Page, Screen,
    VisibilityRules,
};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::{Event, EventInit, HtmlElement, KeyboardEvent, KeyboardEventInit};

wasm_bindgen_test_configure!(run_in_browser);

const FIXTURE: &str = r#"
<header class="site-header"></header>
<section id="screen-info" class="active"></section>
<section id="screen-demographics"></section>
<section id="screen-instructions"></section>
<section id="screen-writing">
  <textarea id="essayText"></textarea>
</section>
<section id="screen-thanks"></section>
<form id="demographicsForm">
  <input name="ASU_Email" value="  JDoe@ASU.edu ">
  <div class="radio-group">
    <input type="radio" name="Gender" value="Woman" checked>
    <input type="radio" name="Gender" value="Man">
  </div>
  <div class="radio-group">
    <input type="checkbox" name="Race_List" value="Asian" checked>
    <input type="checkbox" name="Race_List" value="Other (please specify)" checked>
  </div>
  <input name="Race_Other_Specify" class="hidden" value="Pacific">
  <div class="radio-group">
    <input type="radio" name="Language_Background" value="English only" checked>
  </div>
  <div id="nonEnglishGroup" class="hidden">
    <input name="Native_Language" value="Hindi">
  </div>
  <button type="submit">Next</button>
</form>
"#;

fn mount_fixture() -> DomPage {
    let document = web_sys::window().unwrap().document().unwrap();
    document.body().unwrap().set_inner_html(FIXTURE);
    DomPage::attach().unwrap()
}

fn cancelable(kind: &str) -> Event {
    let init = EventInit::new();
    init.set_cancelable(true);
    Event::new_with_event_init_dict(kind, &init).unwrap()
}

fn essay(page: &DomPage) -> HtmlElement {
    page.document()
        .get_element_by_id("essayText")
        .unwrap()
        .dyn_into()
        .unwrap()
}

#[wasm_bindgen_test]
fn reads_survey_answers_from_the_document() {
    let page = mount_fixture();
    assert_eq!(page.single_choice(names::GENDER), "Woman");
    assert_eq!(page.checked_values(names::RACE_LIST).len(), 2);

    let record = FormCollector::collect(&page);
    assert_eq!(record.asurite, "jdoe");
    assert_eq!(record.race_ethnicity_specify, "Pacific");
}

#[wasm_bindgen_test]
fn hidden_language_section_is_cleared() {
    let page = mount_fixture();
    let plan = VisibilityRules::survey().evaluate(&page);
    plan.apply(&page);

    assert_eq!(page.field_value(names::NATIVE_LANGUAGE).as_deref(), Some(""));
    assert_eq!(page.field_value(names::RACE_OTHER_SPECIFY).as_deref(), Some("Pacific"));
    let specify = page
        .document()
        .query_selector(r#"[name="Race_Other_Specify"]"#)
        .unwrap()
        .unwrap();
    assert!(!specify.class_list().contains("hidden"));
}

#[wasm_bindgen_test]
fn screens_toggle_active_class() {
    let page = mount_fixture();
    page.show_screen(Screen::Writing);

    let document = page.document();
    let writing = document.get_element_by_id("screen-writing").unwrap();
    let consent = document.get_element_by_id("screen-info").unwrap();
    assert!(writing.class_list().contains("active"));
    assert!(!consent.class_list().contains("active"));
}

#[wasm_bindgen_test]
fn essay_surface_blocks_paste_and_shortcuts() {
    let page = mount_fixture();
    let surface = page.writing_surface().unwrap();
    assert!(InputGuard::bind(surface));
    assert!(surface.is_guarded());
    assert!(!InputGuard::bind(surface));

    let target = essay(&page);
    let paste = cancelable("paste");
    target.dispatch_event(&paste).unwrap();
    assert!(paste.default_prevented());

    let init = KeyboardEventInit::new();
    init.set_cancelable(true);
    init.set_key("v");
    init.set_ctrl_key(true);
    let shortcut = KeyboardEvent::new_with_keyboard_event_init_dict("keydown", &init).unwrap();
    target.dispatch_event(&shortcut).unwrap();
    assert!(shortcut.default_prevented());

    let plain = KeyboardEventInit::new();
    plain.set_cancelable(true);
    plain.set_key("v");
    let typing = KeyboardEvent::new_with_keyboard_event_init_dict("keydown", &plain).unwrap();
    target.dispatch_event(&typing).unwrap();
    assert!(!typing.default_prevented());
}
