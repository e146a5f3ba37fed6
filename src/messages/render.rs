//! Render state - data structure sent from App layer to UI for rendering

use crate::app::state::{
    DetailRow, DocumentsState, Notice, PatientFormState, RecordForm, SncrState, TextForm,
    UploadPrompt,
};
use crate::messages::ui_events::{InputMode, KeyContext, Screen};
use crate::models::Patient;
use crate::session::Session;

/// Complete state needed by the UI to render
#[derive(Clone, Debug)]
pub struct RenderState {
    pub screen: Screen,
    pub input_mode: InputMode,
    pub session: Option<Session>,
    pub notice: Option<Notice>,
    pub is_loading: bool,

    // Popups
    pub show_help: bool,
    pub show_instructions: bool,

    // Auth screens
    pub login: TextForm,
    pub sign_up: TextForm,

    // Roster
    pub patients: Vec<Patient>,
    pub roster_filter: String,
    pub filter_cursor: usize,
    pub selected_patient: usize,
    pub confirm_delete: Option<u64>,

    // Patient form
    pub patient_form: Option<PatientFormState>,

    // Patient detail
    pub detail_patient: Option<Patient>,
    pub detail_rows: Vec<DetailRow>,
    pub selected_row: usize,
    pub record_form: Option<RecordForm>,
    pub upload_prompt: Option<UploadPrompt>,

    // SNCR registry
    pub sncr: SncrState,

    // Patient documents
    pub documents: DocumentsState,
}

impl RenderState {
    /// Context the UI layer needs to map key presses
    pub fn key_context(&self) -> KeyContext {
        KeyContext {
            screen: self.screen,
            input_mode: self.input_mode,
            show_help: self.show_help,
            show_instructions: self.show_instructions,
            record_form_open: self.record_form.is_some(),
            upload_prompt_open: self.upload_prompt.is_some(),
            confirming_delete: self.confirm_delete.is_some(),
        }
    }
}

impl Default for RenderState {
    fn default() -> Self {
        RenderState {
            screen: Screen::Login,
            input_mode: InputMode::Normal,
            session: None,
            notice: None,
            is_loading: false,
            show_help: false,
            show_instructions: false,
            login: TextForm::login(),
            sign_up: TextForm::sign_up(),
            patients: Vec::new(),
            roster_filter: String::new(),
            filter_cursor: 0,
            selected_patient: 0,
            confirm_delete: None,
            patient_form: None,
            detail_patient: None,
            detail_rows: Vec::new(),
            selected_row: 0,
            record_form: None,
            upload_prompt: None,
            sncr: SncrState::default(),
            documents: DocumentsState::default(),
        }
    }
}
