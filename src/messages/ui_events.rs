//! UI events - messages from UI layer to App layer

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Application screens. Each is a thin view over the remote API; the app
/// state owns which one is active.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Screen {
    #[default]
    Login,
    SignUp,
    Patients,
    PatientDetail,
    PatientForm,
    Sncr,
    Documents,
}

/// Input mode
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Editing,
}

/// Events generated from user input in the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    // Text editing (routed to the active field by the app state)
    CharInput(char),
    Backspace,
    CursorLeft,
    CursorRight,
    NextField,
    PrevField,
    Submit,
    StopEditing,

    // List navigation
    NextRow,
    PrevRow,
    OpenSelected,
    Back,

    // Session
    ShowSignUp,
    Logout,

    // Roster
    OpenAddPatient,
    EditFilter,
    RequestDelete,
    ConfirmDelete,
    CancelDelete,
    OpenSncr,
    Refresh,

    // Patient detail
    OpenEditPatient,
    NewRecordEntry,
    OpenPrescriptionForm,
    OpenProcedureForm,
    DownloadUnsigned,
    OpenUploadPrompt,
    DownloadSigned,
    CloseInstructions,

    // SNCR registry
    EditSncrInput,
    CycleSncrFilter,
    SubmitSncrNumbers,

    // Popups
    ToggleHelp,
    CloseHelp,

    // System
    Quit,
}

/// UI context needed to map a key press to an event
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyContext {
    pub screen: Screen,
    pub input_mode: InputMode,
    pub show_help: bool,
    pub show_instructions: bool,
    pub record_form_open: bool,
    pub upload_prompt_open: bool,
    pub confirming_delete: bool,
}

impl KeyContext {
    /// Screens whose whole surface is a form; they stay in editing mode
    fn form_screen(&self) -> bool {
        matches!(
            self.screen,
            Screen::Login | Screen::SignUp | Screen::PatientForm
        )
    }
}

/// Convert a key event to a UiEvent based on current UI context
pub fn key_to_ui_event(key: KeyEvent, ctx: KeyContext) -> Option<UiEvent> {
    use crossterm::event::KeyEventKind;

    if key.kind != KeyEventKind::Press {
        return None;
    }

    // Global Ctrl shortcuts
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => return Some(UiEvent::Quit),
            KeyCode::Char('r') if ctx.screen == Screen::Login => {
                return Some(UiEvent::ShowSignUp)
            }
            _ => {}
        }
    }

    // Popups swallow everything
    if ctx.show_help {
        return Some(UiEvent::CloseHelp);
    }
    if ctx.show_instructions {
        return Some(UiEvent::CloseInstructions);
    }
    if ctx.confirming_delete {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(UiEvent::ConfirmDelete),
            KeyCode::Char('n') | KeyCode::Esc => Some(UiEvent::CancelDelete),
            _ => None,
        };
    }
    if ctx.record_form_open || ctx.upload_prompt_open {
        return edit_key(key, ctx);
    }

    if ctx.input_mode == InputMode::Editing || ctx.form_screen() {
        return edit_key(key, ctx);
    }

    // Normal mode, shared keys
    match key.code {
        KeyCode::Char('?') => return Some(UiEvent::ToggleHelp),
        KeyCode::Char('q') => return Some(UiEvent::Quit),
        KeyCode::Up => return Some(UiEvent::PrevRow),
        KeyCode::Down => return Some(UiEvent::NextRow),
        _ => {}
    }

    // Normal mode, per screen
    match ctx.screen {
        Screen::Patients => match key.code {
            KeyCode::Enter => Some(UiEvent::OpenSelected),
            KeyCode::Char('a') => Some(UiEvent::OpenAddPatient),
            KeyCode::Char('e') => Some(UiEvent::OpenEditPatient),
            KeyCode::Char('d') => Some(UiEvent::RequestDelete),
            KeyCode::Char('/') => Some(UiEvent::EditFilter),
            KeyCode::Char('g') => Some(UiEvent::OpenSncr),
            KeyCode::Char('l') => Some(UiEvent::Logout),
            KeyCode::Char('r') => Some(UiEvent::Refresh),
            _ => None,
        },
        Screen::PatientDetail => match key.code {
            KeyCode::Esc => Some(UiEvent::Back),
            KeyCode::Char('n') => Some(UiEvent::NewRecordEntry),
            KeyCode::Char('r') => Some(UiEvent::OpenPrescriptionForm),
            KeyCode::Char('p') => Some(UiEvent::OpenProcedureForm),
            KeyCode::Char('d') => Some(UiEvent::DownloadUnsigned),
            KeyCode::Char('u') => Some(UiEvent::OpenUploadPrompt),
            KeyCode::Char('s') => Some(UiEvent::DownloadSigned),
            KeyCode::Char('e') => Some(UiEvent::OpenEditPatient),
            _ => None,
        },
        Screen::Sncr => match key.code {
            KeyCode::Esc => Some(UiEvent::Back),
            KeyCode::Char('e') => Some(UiEvent::EditSncrInput),
            KeyCode::Char('f') | KeyCode::Char('t') => Some(UiEvent::CycleSncrFilter),
            KeyCode::Char('a') => Some(UiEvent::SubmitSncrNumbers),
            KeyCode::Char('r') => Some(UiEvent::Refresh),
            _ => None,
        },
        Screen::Documents => match key.code {
            KeyCode::Enter | KeyCode::Char('s') => Some(UiEvent::DownloadSigned),
            KeyCode::Char('l') => Some(UiEvent::Logout),
            KeyCode::Char('r') => Some(UiEvent::Refresh),
            _ => None,
        },
        // Form screens are handled by edit_key above
        Screen::Login | Screen::SignUp | Screen::PatientForm => None,
    }
}

/// Key mapping shared by every text-entry context
fn edit_key(key: KeyEvent, ctx: KeyContext) -> Option<UiEvent> {
    match key.code {
        KeyCode::Esc => match ctx.screen {
            _ if ctx.record_form_open || ctx.upload_prompt_open => Some(UiEvent::Back),
            Screen::Login => Some(UiEvent::Quit),
            Screen::SignUp | Screen::PatientForm => Some(UiEvent::Back),
            _ => Some(UiEvent::StopEditing),
        },
        KeyCode::Enter => {
            // The SNCR textarea is the one multiline input
            if ctx.screen == Screen::Sncr && !ctx.record_form_open && !ctx.upload_prompt_open {
                Some(UiEvent::CharInput('\n'))
            } else {
                Some(UiEvent::Submit)
            }
        }
        KeyCode::Tab => Some(UiEvent::NextField),
        KeyCode::BackTab => Some(UiEvent::PrevField),
        KeyCode::Up => Some(UiEvent::PrevField),
        KeyCode::Down => Some(UiEvent::NextField),
        KeyCode::Left => Some(UiEvent::CursorLeft),
        KeyCode::Right => Some(UiEvent::CursorRight),
        KeyCode::Backspace => Some(UiEvent::Backspace),
        KeyCode::Char(c) => Some(UiEvent::CharInput(c)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEvent;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_login_chars_feed_the_form() {
        let ctx = KeyContext {
            screen: Screen::Login,
            ..Default::default()
        };
        assert_eq!(
            key_to_ui_event(press(KeyCode::Char('a')), ctx),
            Some(UiEvent::CharInput('a'))
        );
        assert_eq!(
            key_to_ui_event(press(KeyCode::Enter), ctx),
            Some(UiEvent::Submit)
        );
        assert_eq!(
            key_to_ui_event(press(KeyCode::Esc), ctx),
            Some(UiEvent::Quit)
        );
    }

    #[test]
    fn test_help_popup_swallows_keys() {
        let ctx = KeyContext {
            screen: Screen::Patients,
            show_help: true,
            ..Default::default()
        };
        assert_eq!(
            key_to_ui_event(press(KeyCode::Char('d')), ctx),
            Some(UiEvent::CloseHelp)
        );
    }

    #[test]
    fn test_delete_requires_confirmation_keys() {
        let ctx = KeyContext {
            screen: Screen::Patients,
            confirming_delete: true,
            ..Default::default()
        };
        assert_eq!(
            key_to_ui_event(press(KeyCode::Char('y')), ctx),
            Some(UiEvent::ConfirmDelete)
        );
        assert_eq!(
            key_to_ui_event(press(KeyCode::Esc), ctx),
            Some(UiEvent::CancelDelete)
        );
        assert_eq!(key_to_ui_event(press(KeyCode::Char('x')), ctx), None);
    }

    #[test]
    fn test_sncr_enter_inserts_newline_while_editing() {
        let ctx = KeyContext {
            screen: Screen::Sncr,
            input_mode: InputMode::Editing,
            ..Default::default()
        };
        assert_eq!(
            key_to_ui_event(press(KeyCode::Enter), ctx),
            Some(UiEvent::CharInput('\n'))
        );
    }

    #[test]
    fn test_detail_signing_keys() {
        let ctx = KeyContext {
            screen: Screen::PatientDetail,
            ..Default::default()
        };
        assert_eq!(
            key_to_ui_event(press(KeyCode::Char('d')), ctx),
            Some(UiEvent::DownloadUnsigned)
        );
        assert_eq!(
            key_to_ui_event(press(KeyCode::Char('u')), ctx),
            Some(UiEvent::OpenUploadPrompt)
        );
        assert_eq!(
            key_to_ui_event(press(KeyCode::Char('s')), ctx),
            Some(UiEvent::DownloadSigned)
        );
    }

    #[test]
    fn test_ctrl_r_opens_sign_up_only_on_login() {
        let login = KeyContext {
            screen: Screen::Login,
            ..Default::default()
        };
        let event = key_to_ui_event(
            KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL),
            login,
        );
        assert_eq!(event, Some(UiEvent::ShowSignUp));

        let roster = KeyContext {
            screen: Screen::Patients,
            ..Default::default()
        };
        let event = key_to_ui_event(
            KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL),
            roster,
        );
        assert_ne!(event, Some(UiEvent::ShowSignUp));
    }
}
