// Screen flow state machine.
//
// Owns the participant's session state and decides which transitions are
// legal. All handlers take `&self`: state lives in a `RefCell` that is never
// borrowed across an `.await`, and each remote call runs under a control
// lease that disables the triggering button and drops repeat presses.

use std::cell::RefCell;
use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::StudyApi;
use crate::error::{ClientError, Result, ValidationGap};
use crate::form::{FormCollector, FormSource};
use crate::guard::{GuardSurface, InputGuard};
use crate::types::*;
use crate::visibility::{VisibilityRules, VisibilityTarget};

pub const EMPTY_ESSAY_PROMPT: &str = "Your essay text is empty. Submit anyway?";

const SAVE_DEMOGRAPHICS_FAILED: &str = "Failed to save demographics.";
const START_SESSION_FAILED: &str = "Failed to start writing session.";
const SUBMIT_ESSAY_FAILED: &str = "Failed to submit essay.";

/// The page the controller drives. Markup and styling live behind this trait.
pub trait Page: FormSource + VisibilityTarget {
    /// Make `screen` the only active screen container.
    fn show_screen(&self, screen: Screen);
    fn render_instructions(&self, affordances: InstructionAffordances);
    /// Reveal the "thanks for agreeing" card on the consent screen.
    fn reveal_consent_confirmation(&self);
    fn set_control_enabled(&self, control: Control, enabled: bool);
    /// Blocking message to the participant.
    fn alert(&self, message: &str);
    /// Blocking yes/no question.
    fn confirm(&self, message: &str) -> bool;
    /// Current content of the writing surface.
    fn essay_text(&self) -> String;
    fn writing_surface(&self) -> Option<&dyn GuardSurface>;
}

/// Source of client wall-clock time.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// `chrono`-backed clock; uses `Date.now()` in the browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(chrono::Utc::now().timestamp_millis())
    }
}

/// Server-issued writing session plus the first time the participant saw the
/// writing screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WritingSession {
    pub session_id: SessionId,
    pub client_start: Option<Timestamp>,
}

/// Everything known about the participant in this tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub screen: Screen,
    pub consent_acknowledged: bool,
    pub asurite: Option<Asurite>,
    pub demographics: Option<DemographicRecord>,
    pub has_agreed_to_instructions: bool,
    pub writing: Option<WritingSession>,
    pub receipt: Option<EssayReceipt>,
}

impl SessionState {
    pub fn new(screen: Screen) -> Self {
        SessionState {
            screen,
            consent_acknowledged: false,
            asurite: None,
            demographics: None,
            has_agreed_to_instructions: false,
            writing: None,
            receipt: None,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.writing.as_ref().map(|w| &w.session_id)
    }

    pub fn client_start(&self) -> Option<Timestamp> {
        self.writing.as_ref().and_then(|w| w.client_start)
    }

    pub fn instruction_affordances(&self) -> InstructionAffordances {
        InstructionAffordances::for_state(self.has_agreed_to_instructions, self.writing.is_some())
    }
}

/// Result of a participant action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moved to (or re-entered) this screen.
    Entered(Screen),
    /// Handled without changing screen.
    Stayed,
    /// The same control already has a call in flight.
    Busy,
    /// Not a legal action on the current screen.
    Rejected,
}

/// Disables a control for the lifetime of a pending call.
struct ControlLease<'a> {
    control: Control,
    pending: &'a RefCell<BTreeSet<Control>>,
    page: &'a dyn Page,
}

impl<'a> ControlLease<'a> {
    fn acquire(
        control: Control,
        pending: &'a RefCell<BTreeSet<Control>>,
        page: &'a dyn Page,
    ) -> Option<Self> {
        if !pending.borrow_mut().insert(control) {
            debug!(?control, "control busy, ignoring press");
            return None;
        }
        page.set_control_enabled(control, false);
        Some(ControlLease {
            control,
            pending,
            page,
        })
    }
}

impl Drop for ControlLease<'_> {
    fn drop(&mut self) {
        self.pending.borrow_mut().remove(&self.control);
        self.page.set_control_enabled(self.control, true);
    }
}

/// Drives the study flow for one participant.
pub struct ScreenController<A, P, C = SystemClock> {
    config: StudyConfig,
    api: A,
    page: P,
    clock: C,
    rules: VisibilityRules,
    state: RefCell<SessionState>,
    pending: RefCell<BTreeSet<Control>>,
}

impl<A, P> ScreenController<A, P, SystemClock>
where
    A: StudyApi,
    P: Page,
{
    pub fn new(config: StudyConfig, api: A, page: P) -> Self {
        Self::with_clock(config, api, page, SystemClock)
    }
}

impl<A, P, C> ScreenController<A, P, C>
where
    A: StudyApi,
    P: Page,
    C: Clock,
{
    pub fn with_clock(config: StudyConfig, api: A, page: P, clock: C) -> Self {
        let initial = config.flow.initial_screen();
        ScreenController {
            config,
            api,
            page,
            clock,
            rules: VisibilityRules::survey(),
            state: RefCell::new(SessionState::new(initial)),
            pending: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn screen(&self) -> Screen {
        self.state.borrow().screen
    }

    /// Copy of the current session state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Initial render: show the first screen and guard the writing surface up front.
    pub fn start(&self) -> Transition {
        let screen = self.screen();
        self.bind_guard();
        self.enter(screen)
    }

    /// Re-evaluate conditional fields after a selection changed.
    pub fn refresh_visibility(&self) {
        self.rules.evaluate(&self.page).apply(&self.page);
    }

    // ---------------------------------------------------------------- Consent

    /// "I agree" on the consent screen. No network activity.
    pub fn acknowledge_consent(&self) -> Transition {
        if self.screen() != Screen::Consent {
            return Transition::Rejected;
        }
        self.state.borrow_mut().consent_acknowledged = true;
        self.page.reveal_consent_confirmation();
        self.page.set_control_enabled(Control::ConsentAgree, false);
        Transition::Stayed
    }

    pub fn continue_from_consent(&self) -> Transition {
        if self.screen() != Screen::Consent {
            return Transition::Rejected;
        }
        self.enter(Screen::Demographics)
    }

    // ----------------------------------------------------------- Demographics

    /// Save the survey, adopt the service's participant id and move on.
    pub async fn submit_demographics(&self) -> Result<Transition> {
        if self.screen() != Screen::Demographics {
            return Ok(Transition::Rejected);
        }
        let Some(_lease) = self.lease(Control::DemographicsSubmit) else {
            return Ok(Transition::Busy);
        };

        // Saved once already (the session start failed afterwards): the record is final.
        let saved_asurite = {
            let state = self.state.borrow();
            state.demographics.as_ref().and(state.asurite.clone())
        };
        if let Some(asurite) = saved_asurite {
            debug!(%asurite, "demographics already saved, skipping save");
            return self.leave_demographics(&asurite).await;
        }

        // Hidden dependents must be empty before they are read.
        self.refresh_visibility();
        let record = FormCollector::collect(&self.page);
        debug!(candidate = %record.asurite, "submitting demographics");

        let saved = match self.api.save_demographics(&record).await {
            Ok(saved) => saved,
            Err(err) => return Err(self.report(err, SAVE_DEMOGRAPHICS_FAILED)),
        };

        {
            let mut state = self.state.borrow_mut();
            state.asurite = Some(saved.asurite.clone());
            state.demographics = Some(record);
            state.has_agreed_to_instructions = false;
            if let Some(writing) = state.writing.as_mut() {
                writing.client_start = None;
            }
        }
        info!(asurite = %saved.asurite, "participant identified");

        self.leave_demographics(&saved.asurite).await
    }

    // ----------------------------------------------------------- Instructions

    /// "I agree" on the instructions. Flips once and never back.
    pub fn agree_to_instructions(&self) -> Transition {
        if self.screen() != Screen::Instructions {
            return Transition::Rejected;
        }
        self.state.borrow_mut().has_agreed_to_instructions = true;
        self.render_instructions();
        Transition::Stayed
    }

    /// "Start writing": open the session if none exists, then show the writing screen.
    pub async fn start_writing(&self) -> Result<Transition> {
        let (screen, agreed, asurite) = {
            let state = self.state.borrow();
            (
                state.screen,
                state.has_agreed_to_instructions,
                state.asurite.clone(),
            )
        };
        if screen != Screen::Instructions || !agreed {
            return Ok(Transition::Rejected);
        }
        let Some(asurite) = asurite else {
            return Err(self.block(ValidationGap::MissingParticipant));
        };
        let Some(_lease) = self.lease(Control::StartWriting) else {
            return Ok(Transition::Busy);
        };
        self.open_writing(&asurite).await
    }

    /// From Instructions back to an already started writing screen.
    pub fn return_to_writing(&self) -> Transition {
        let state = self.state.borrow();
        if state.screen != Screen::Instructions || state.writing.is_none() {
            return Transition::Rejected;
        }
        drop(state);
        self.enter(Screen::Writing)
    }

    // ---------------------------------------------------------------- Writing

    /// Look at the instructions again. Essay text and start time are untouched.
    pub fn back_to_instructions(&self) -> Transition {
        if self.screen() != Screen::Writing || !self.config.flow.has_instructions() {
            return Transition::Rejected;
        }
        self.enter(Screen::Instructions)
    }

    /// Submit the essay and finish.
    pub async fn submit_essay(&self) -> Result<Transition> {
        if self.screen() != Screen::Writing {
            return Ok(Transition::Rejected);
        }
        let text = self.page.essay_text().trim().to_string();
        if text.is_empty() && !self.page.confirm(EMPTY_ESSAY_PROMPT) {
            debug!("empty essay submission declined");
            return Ok(Transition::Stayed);
        }

        let (session_id, client_start) = {
            let state = self.state.borrow();
            (state.session_id().cloned(), state.client_start())
        };
        let Some(session_id) = session_id else {
            return Err(self.block(ValidationGap::MissingWritingSession));
        };
        let Some(_lease) = self.lease(Control::SubmitEssay) else {
            return Ok(Transition::Busy);
        };

        let client_start_time = if self.config.report_client_start_time {
            client_start.and_then(|ts| ts.to_iso8601())
        } else {
            None
        };

        match self
            .api
            .submit_essay(&session_id, &text, client_start_time)
            .await
        {
            Ok(receipt) => {
                self.state.borrow_mut().receipt = Some(receipt);
                Ok(self.enter(Screen::Thanks))
            }
            Err(err) => Err(self.report(err, SUBMIT_ESSAY_FAILED)),
        }
    }

    // -------------------------------------------------------------- internals

    async fn leave_demographics(&self, asurite: &Asurite) -> Result<Transition> {
        if self.config.flow.has_instructions() {
            Ok(self.enter(Screen::Instructions))
        } else {
            self.open_writing(asurite).await
        }
    }

    /// Start the session at most once, then enter Writing.
    async fn open_writing(&self, asurite: &Asurite) -> Result<Transition> {
        let existing = self.state.borrow().session_id().cloned();
        if let Some(session_id) = existing {
            debug!(%session_id, "reusing writing session");
        } else {
            let started = match self.api.start_session(asurite).await {
                Ok(started) => started,
                Err(err) => return Err(self.report(err, START_SESSION_FAILED)),
            };
            let mut state = self.state.borrow_mut();
            // A session is never replaced once issued.
            if state.writing.is_none() {
                state.writing = Some(WritingSession {
                    session_id: started.session_id,
                    client_start: None,
                });
            }
        }
        Ok(self.enter(Screen::Writing))
    }

    fn enter(&self, screen: Screen) -> Transition {
        let from = {
            let mut state = self.state.borrow_mut();
            let from = state.screen;
            state.screen = screen;
            if screen == Screen::Writing {
                if let Some(writing) = state.writing.as_mut() {
                    if writing.client_start.is_none() {
                        writing.client_start = Some(self.clock.now());
                    }
                }
            }
            from
        };

        self.page.show_screen(screen);
        self.refresh_visibility();
        match screen {
            Screen::Instructions => self.render_instructions(),
            Screen::Writing => {
                self.bind_guard();
            }
            _ => {}
        }
        info!(%from, to = %screen, "screen transition");
        Transition::Entered(screen)
    }

    fn render_instructions(&self) {
        let affordances = self.state.borrow().instruction_affordances();
        self.page.render_instructions(affordances);
    }

    fn bind_guard(&self) -> bool {
        match self.page.writing_surface() {
            Some(surface) => InputGuard::bind(surface),
            None => false,
        }
    }

    fn lease(&self, control: Control) -> Option<ControlLease<'_>> {
        ControlLease::acquire(control, &self.pending, &self.page)
    }

    fn block(&self, gap: ValidationGap) -> ClientError {
        warn!(?gap, screen = %self.screen(), "transition blocked");
        self.page.alert(&gap.to_string());
        gap.into()
    }

    fn report(&self, err: ClientError, fallback: &str) -> ClientError {
        warn!(error = %err, screen = %self.screen(), "remote call failed");
        let message = err.to_string();
        if message.is_empty() {
            self.page.alert(fallback);
        } else {
            self.page.alert(&message);
        }
        err
    }
}
