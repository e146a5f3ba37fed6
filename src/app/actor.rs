//! App actor - message loop processing UI events and API responses

use tokio::sync::mpsc;

use crate::app::state::AppState;
use crate::messages::{ApiCommand, ApiResponse, RenderState, UiEvent};

/// App actor that processes UI events and API responses
pub struct AppActor {
    state: AppState,
    api_tx: mpsc::UnboundedSender<ApiCommand>,
    render_tx: mpsc::UnboundedSender<RenderState>,
}

impl AppActor {
    pub fn new(
        state: AppState,
        api_tx: mpsc::UnboundedSender<ApiCommand>,
        render_tx: mpsc::UnboundedSender<RenderState>,
    ) -> Self {
        AppActor {
            state,
            api_tx,
            render_tx,
        }
    }

    /// Run the actor message loop
    pub async fn run(
        mut self,
        mut ui_rx: mpsc::UnboundedReceiver<UiEvent>,
        mut api_rx: mpsc::UnboundedReceiver<ApiResponse>,
    ) {
        // Fetch the data behind the landing screen, then render
        if let Some(command) = self.state.initial_command() {
            let _ = self.api_tx.send(command);
        }
        let _ = self.render_tx.send(self.state.to_render_state());

        loop {
            tokio::select! {
                Some(event) = ui_rx.recv() => {
                    if self.handle_ui_event(event) {
                        // Quit signal received
                        let _ = self.api_tx.send(ApiCommand::Shutdown);
                        break;
                    }
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                Some(response) = api_rx.recv() => {
                    if let Some(follow_up) = self.state.handle_response(response) {
                        let _ = self.api_tx.send(follow_up);
                    }
                    let _ = self.render_tx.send(self.state.to_render_state());
                }
                else => break,
            }
        }
    }

    /// Handle a UI event, returns true if quit was requested
    fn handle_ui_event(&mut self, event: UiEvent) -> bool {
        match event {
            // Text editing
            UiEvent::CharInput(c) => self.state.enter_char(c),
            UiEvent::Backspace => self.state.delete_char(),
            UiEvent::CursorLeft => self.state.move_cursor_left(),
            UiEvent::CursorRight => self.state.move_cursor_right(),
            UiEvent::NextField => {
                if let Some(command) = self.state.next_field() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::PrevField => self.state.prev_field(),
            UiEvent::Submit => {
                if let Some(command) = self.state.submit() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::StopEditing => self.state.stop_editing(),

            // List navigation
            UiEvent::NextRow => self.state.next_row(),
            UiEvent::PrevRow => self.state.prev_row(),
            UiEvent::OpenSelected => {
                if let Some(command) = self.state.open_selected() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::Back => self.state.back(),

            // Session
            UiEvent::ShowSignUp => self.state.show_sign_up(),
            UiEvent::Logout => {
                if let Some(command) = self.state.logout() {
                    let _ = self.api_tx.send(command);
                }
            }

            // Roster
            UiEvent::OpenAddPatient => self.state.open_add_patient(),
            UiEvent::EditFilter => self.state.edit_filter(),
            UiEvent::RequestDelete => self.state.request_delete(),
            UiEvent::ConfirmDelete => {
                if let Some(command) = self.state.confirm_delete_patient() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::CancelDelete => self.state.cancel_delete(),
            UiEvent::OpenSncr => {
                if let Some(command) = self.state.open_sncr() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::Refresh => {
                if let Some(command) = self.state.refresh() {
                    let _ = self.api_tx.send(command);
                }
            }

            // Patient detail
            UiEvent::OpenEditPatient => self.state.open_edit_patient(),
            UiEvent::NewRecordEntry => {
                if let Some(command) = self.state.new_record_entry() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::OpenPrescriptionForm => self.state.open_prescription_form(),
            UiEvent::OpenProcedureForm => self.state.open_procedure_form(),
            UiEvent::DownloadUnsigned => {
                if let Some(command) = self.state.download_unsigned() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::OpenUploadPrompt => self.state.open_upload_prompt(),
            UiEvent::DownloadSigned => {
                if let Some(command) = self.state.download_signed() {
                    let _ = self.api_tx.send(command);
                }
            }
            UiEvent::CloseInstructions => self.state.close_instructions(),

            // SNCR registry
            UiEvent::EditSncrInput => self.state.edit_sncr_input(),
            UiEvent::CycleSncrFilter => self.state.cycle_sncr_filter(),
            UiEvent::SubmitSncrNumbers => {
                if let Some(command) = self.state.submit_sncr_numbers() {
                    let _ = self.api_tx.send(command);
                }
            }

            // Popups
            UiEvent::ToggleHelp => self.state.toggle_help(),
            UiEvent::CloseHelp => self.state.close_help(),

            // System
            UiEvent::Quit => return true,
        }

        false
    }
}
