//! Command handlers - business logic for processing UI events
//!
//! Every mutation goes to the server and the affected data is re-fetched
//! afterwards; nothing is updated optimistically, so a failed call simply
//! leaves the prior state on screen.

use std::path::PathBuf;

use crate::app::state::{
    detail_rows, filter_patients, login_field, patient_field, sign_up_field, AppState, DetailRow,
    Notice, PatientFormState, RecordField, RecordForm, UploadPrompt,
};
use crate::messages::ui_events::{InputMode, Screen};
use crate::messages::{ApiCommand, ApiResponse};
use crate::models::{Role, SignUpPayload};
use crate::signing::{DocumentKind, SigningExchange, SigningState};

impl AppState {
    // ========================
    // Request plumbing
    // ========================

    /// Allocate a request id and mark it pending. One command in flight at
    /// a time; further submissions are ignored until it resolves.
    fn issue(&mut self, build: impl FnOnce(u64) -> ApiCommand) -> Option<ApiCommand> {
        if self.is_loading {
            return None;
        }
        let id = self.next_id();
        self.pending_request = Some(id);
        self.is_loading = true;
        self.notice = None;
        Some(build(id))
    }

    /// Fetch issued when the app lands on a data-backed screen at startup
    pub fn initial_command(&mut self) -> Option<ApiCommand> {
        match self.screen {
            Screen::Patients => self.issue(|id| ApiCommand::FetchPatients { id }),
            Screen::Documents => self.issue(|id| ApiCommand::FetchPatientDocuments { id }),
            _ => None,
        }
    }

    // ========================
    // Text editing
    // ========================

    pub fn enter_char(&mut self, c: char) {
        if let Some(prompt) = &mut self.upload_prompt {
            insert_at(&mut prompt.path, &mut prompt.cursor, c);
            return;
        }
        if let Some(form) = &mut self.record_form {
            if form.field == RecordField::Type {
                form.cycle_type();
            } else {
                let cursor = form.cursor;
                if let Some(text) = form.active_text_mut() {
                    let mut pos = cursor;
                    insert_at(text, &mut pos, c);
                    form.cursor = pos;
                }
            }
            return;
        }
        match self.screen {
            Screen::Login => self.login.insert_char(c),
            Screen::SignUp => self.sign_up.insert_char(c),
            Screen::PatientForm => {
                if let Some(pf) = &mut self.patient_form {
                    pf.form.insert_char(c);
                }
            }
            Screen::Patients => {
                insert_at(&mut self.roster_filter, &mut self.filter_cursor, c);
                self.selected_patient = 0;
            }
            Screen::Sncr => {
                let mut pos = self.sncr.cursor;
                insert_at(&mut self.sncr.input, &mut pos, c);
                self.sncr.cursor = pos;
            }
            _ => {}
        }
    }

    pub fn delete_char(&mut self) {
        if let Some(prompt) = &mut self.upload_prompt {
            backspace_at(&mut prompt.path, &mut prompt.cursor);
            return;
        }
        if let Some(form) = &mut self.record_form {
            if form.field != RecordField::Type {
                let cursor = form.cursor;
                if let Some(text) = form.active_text_mut() {
                    let mut pos = cursor;
                    backspace_at(text, &mut pos);
                    form.cursor = pos;
                }
            }
            return;
        }
        match self.screen {
            Screen::Login => self.login.backspace(),
            Screen::SignUp => self.sign_up.backspace(),
            Screen::PatientForm => {
                if let Some(pf) = &mut self.patient_form {
                    pf.form.backspace();
                }
            }
            Screen::Patients => {
                backspace_at(&mut self.roster_filter, &mut self.filter_cursor);
                self.selected_patient = 0;
            }
            Screen::Sncr => {
                let mut pos = self.sncr.cursor;
                backspace_at(&mut self.sncr.input, &mut pos);
                self.sncr.cursor = pos;
            }
            _ => {}
        }
    }

    pub fn move_cursor_left(&mut self) {
        if let Some(prompt) = &mut self.upload_prompt {
            cursor_left_in(&prompt.path.clone(), &mut prompt.cursor);
            return;
        }
        if let Some(form) = &mut self.record_form {
            if let Some(text) = form.active_text().map(str::to_string) {
                cursor_left_in(&text, &mut form.cursor);
            }
            return;
        }
        match self.screen {
            Screen::Login => self.login.cursor_left(),
            Screen::SignUp => self.sign_up.cursor_left(),
            Screen::PatientForm => {
                if let Some(pf) = &mut self.patient_form {
                    pf.form.cursor_left();
                }
            }
            Screen::Patients => {
                let filter = self.roster_filter.clone();
                cursor_left_in(&filter, &mut self.filter_cursor);
            }
            Screen::Sncr => {
                let input = self.sncr.input.clone();
                cursor_left_in(&input, &mut self.sncr.cursor);
            }
            _ => {}
        }
    }

    pub fn move_cursor_right(&mut self) {
        if let Some(prompt) = &mut self.upload_prompt {
            cursor_right_in(&prompt.path.clone(), &mut prompt.cursor);
            return;
        }
        if let Some(form) = &mut self.record_form {
            if let Some(text) = form.active_text().map(str::to_string) {
                cursor_right_in(&text, &mut form.cursor);
            }
            return;
        }
        match self.screen {
            Screen::Login => self.login.cursor_right(),
            Screen::SignUp => self.sign_up.cursor_right(),
            Screen::PatientForm => {
                if let Some(pf) = &mut self.patient_form {
                    pf.form.cursor_right();
                }
            }
            Screen::Patients => {
                let filter = self.roster_filter.clone();
                cursor_right_in(&filter, &mut self.filter_cursor);
            }
            Screen::Sncr => {
                let input = self.sncr.input.clone();
                cursor_right_in(&input, &mut self.sncr.cursor);
            }
            _ => {}
        }
    }

    /// Move to the next form field. Leaving the CEP field with a complete
    /// code triggers the address lookup.
    pub fn next_field(&mut self) -> Option<ApiCommand> {
        if self.upload_prompt.is_some() {
            return None;
        }
        if let Some(form) = &mut self.record_form {
            form.next_field();
            return None;
        }
        match self.screen {
            Screen::Login => self.login.next_field(),
            Screen::SignUp => self.sign_up.next_field(),
            Screen::PatientForm => {
                let leaving_cep = self
                    .patient_form
                    .as_ref()
                    .map(|pf| pf.form.active == patient_field::CEP)
                    .unwrap_or(false);
                if let Some(pf) = &mut self.patient_form {
                    pf.form.next_field();
                }
                if leaving_cep {
                    return self.maybe_lookup_cep();
                }
            }
            _ => {}
        }
        None
    }

    pub fn prev_field(&mut self) {
        if let Some(form) = &mut self.record_form {
            form.prev_field();
            return;
        }
        match self.screen {
            Screen::Login => self.login.prev_field(),
            Screen::SignUp => self.sign_up.prev_field(),
            Screen::PatientForm => {
                if let Some(pf) = &mut self.patient_form {
                    pf.form.prev_field();
                }
            }
            _ => {}
        }
    }

    fn maybe_lookup_cep(&mut self) -> Option<ApiCommand> {
        let digits: String = self
            .patient_form
            .as_ref()?
            .form
            .value(patient_field::CEP)
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        if digits.len() != 8 {
            return None;
        }
        self.issue(|id| ApiCommand::LookupCep { id, cep: digits })
    }

    pub fn stop_editing(&mut self) {
        self.input_mode = InputMode::Normal;
    }

    pub fn edit_filter(&mut self) {
        if self.screen == Screen::Patients {
            self.input_mode = InputMode::Editing;
            self.filter_cursor = self.roster_filter.len();
        }
    }

    pub fn edit_sncr_input(&mut self) {
        if self.screen == Screen::Sncr {
            self.input_mode = InputMode::Editing;
            self.sncr.cursor = self.sncr.input.len();
        }
    }

    // ========================
    // Submissions
    // ========================

    pub fn submit(&mut self) -> Option<ApiCommand> {
        if self.upload_prompt.is_some() {
            return self.submit_upload();
        }
        if self.record_form.is_some() {
            return self.submit_record_form();
        }
        match self.screen {
            Screen::Login => self.submit_login(),
            Screen::SignUp => self.submit_sign_up(),
            Screen::PatientForm => self.submit_patient_form(),
            Screen::Patients => {
                // Enter while editing the filter just leaves editing mode
                self.stop_editing();
                None
            }
            _ => None,
        }
    }

    fn submit_login(&mut self) -> Option<ApiCommand> {
        let username = self.login.value(login_field::USERNAME).trim().to_string();
        let password = self.login.value(login_field::PASSWORD).to_string();
        if username.is_empty() || password.is_empty() {
            self.notice = Some(Notice::error("Informe usuário e senha."));
            return None;
        }
        self.issue(|id| ApiCommand::Login {
            id,
            username,
            password,
        })
    }

    fn submit_sign_up(&mut self) -> Option<ApiCommand> {
        let form = &self.sign_up;
        let payload = SignUpPayload {
            username: form.value(sign_up_field::USERNAME).trim().to_string(),
            password: form.value(sign_up_field::PASSWORD).to_string(),
            email: form.value(sign_up_field::EMAIL).trim().to_string(),
            first_name: form.value(sign_up_field::FIRST_NAME).trim().to_string(),
            last_name: form.value(sign_up_field::LAST_NAME).trim().to_string(),
            crm: form.value(sign_up_field::CRM).trim().to_string(),
            role: Role::Medico,
        };
        if payload.username.is_empty() || payload.password.is_empty() || payload.crm.is_empty() {
            self.notice = Some(Notice::error(
                "Usuário, senha e CRM são obrigatórios para o cadastro.",
            ));
            return None;
        }
        self.issue(|id| ApiCommand::SignUp { id, payload })
    }

    fn submit_patient_form(&mut self) -> Option<ApiCommand> {
        let pf = self.patient_form.as_ref()?;
        let payload = pf.to_payload();
        if pf.editing.is_none() && payload.user.password.is_none() {
            self.notice = Some(Notice::error("A senha é obrigatória para novos pacientes."));
            return None;
        }
        match pf.editing {
            Some(patient_id) => self.issue(|id| ApiCommand::UpdatePatient {
                id,
                patient_id,
                payload,
            }),
            None => self.issue(|id| ApiCommand::CreatePatient { id, payload }),
        }
    }

    fn submit_record_form(&mut self) -> Option<ApiCommand> {
        let form = self.record_form.as_ref()?;
        if form.description.trim().is_empty() {
            self.notice = Some(Notice::error("A descrição é obrigatória."));
            return None;
        }
        let patient_id = self.detail_patient.as_ref()?.id;
        let command = match form.kind {
            DocumentKind::Prescription => {
                let payload = form.to_prescription_payload();
                self.issue(|id| ApiCommand::CreatePrescription {
                    id,
                    patient_id,
                    payload,
                })
            }
            DocumentKind::Procedure => {
                let payload = form.to_procedure_payload();
                self.issue(|id| ApiCommand::CreateProcedure {
                    id,
                    patient_id,
                    payload,
                })
            }
        };
        if command.is_some() {
            self.record_form = None;
        }
        command
    }

    fn submit_upload(&mut self) -> Option<ApiCommand> {
        let prompt = self.upload_prompt.as_ref()?;
        let path = prompt.path.trim();
        if path.is_empty() {
            self.notice = Some(Notice::error("Informe o caminho do arquivo assinado."));
            return None;
        }
        let kind = prompt.kind;
        let document_id = prompt.document_id;
        let patient_id = self.detail_patient.as_ref()?.id;
        let file_path = expand_home(path);
        let command = self.issue(|id| ApiCommand::UploadSigned {
            id,
            kind,
            document_id,
            patient_id,
            file_path,
        });
        if command.is_some() {
            self.upload_prompt = None;
        }
        command
    }

    // ========================
    // Navigation
    // ========================

    pub fn next_row(&mut self) {
        let len = self.row_count();
        let selected = self.selected_mut();
        if len > 0 {
            *selected = (*selected + 1) % len;
        }
    }

    pub fn prev_row(&mut self) {
        let len = self.row_count();
        let selected = self.selected_mut();
        if len > 0 {
            *selected = selected.checked_sub(1).unwrap_or(len - 1);
        }
    }

    fn row_count(&self) -> usize {
        match self.screen {
            Screen::Patients => filter_patients(&self.patients, &self.roster_filter).len(),
            Screen::PatientDetail => self.detail_rows.len(),
            Screen::Sncr => self.sncr.filtered().len(),
            Screen::Documents => self
                .documents
                .payload
                .as_ref()
                .map(|p| p.documents.len())
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn selected_mut(&mut self) -> &mut usize {
        match self.screen {
            Screen::Patients => &mut self.selected_patient,
            Screen::PatientDetail => &mut self.selected_row,
            Screen::Sncr => &mut self.sncr.selected,
            Screen::Documents => &mut self.documents.selected,
            _ => &mut self.selected_patient,
        }
    }

    pub fn open_selected(&mut self) -> Option<ApiCommand> {
        match self.screen {
            Screen::Patients => {
                let patient_id = filter_patients(&self.patients, &self.roster_filter)
                    .get(self.selected_patient)
                    .map(|p| p.id)?;
                self.open_patient(patient_id)
            }
            _ => None,
        }
    }

    fn open_patient(&mut self, patient_id: u64) -> Option<ApiCommand> {
        let command = self.issue(|id| ApiCommand::FetchPatient { id, patient_id })?;
        self.screen = Screen::PatientDetail;
        self.detail_patient = None;
        self.detail_rows.clear();
        self.selected_row = 0;
        Some(command)
    }

    pub fn back(&mut self) {
        if self.record_form.take().is_some() {
            return;
        }
        if self.upload_prompt.take().is_some() {
            return;
        }
        match self.screen {
            Screen::SignUp => self.screen = Screen::Login,
            Screen::PatientDetail => self.screen = Screen::Patients,
            Screen::Sncr => self.screen = Screen::Patients,
            Screen::PatientForm => {
                let to_detail = self
                    .patient_form
                    .as_ref()
                    .and_then(|pf| pf.editing)
                    .zip(self.detail_patient.as_ref().map(|p| p.id))
                    .map(|(editing, current)| editing == current)
                    .unwrap_or(false);
                self.patient_form = None;
                self.screen = if to_detail {
                    Screen::PatientDetail
                } else {
                    Screen::Patients
                };
            }
            _ => {}
        }
    }

    pub fn refresh(&mut self) -> Option<ApiCommand> {
        match self.screen {
            Screen::Patients => self.issue(|id| ApiCommand::FetchPatients { id }),
            Screen::Sncr => self.issue(|id| ApiCommand::FetchSncrNumbers { id }),
            Screen::Documents => self.issue(|id| ApiCommand::FetchPatientDocuments { id }),
            Screen::PatientDetail => {
                let patient_id = self.detail_patient.as_ref()?.id;
                self.issue(|id| ApiCommand::FetchPatient { id, patient_id })
            }
            _ => None,
        }
    }

    pub fn show_sign_up(&mut self) {
        if self.screen == Screen::Login {
            self.sign_up = crate::app::state::TextForm::sign_up();
            self.screen = Screen::SignUp;
        }
    }

    pub fn logout(&mut self) -> Option<ApiCommand> {
        self.issue(|id| ApiCommand::Logout { id })
    }

    // ========================
    // Roster actions
    // ========================

    pub fn open_add_patient(&mut self) {
        self.patient_form = Some(PatientFormState::add());
        self.screen = Screen::PatientForm;
    }

    pub fn open_edit_patient(&mut self) {
        let patient = match self.screen {
            Screen::PatientDetail => self.detail_patient.clone(),
            Screen::Patients => filter_patients(&self.patients, &self.roster_filter)
                .get(self.selected_patient)
                .cloned()
                .cloned(),
            _ => None,
        };
        if let Some(patient) = patient {
            self.patient_form = Some(PatientFormState::edit(&patient));
            self.screen = Screen::PatientForm;
        }
    }

    pub fn request_delete(&mut self) {
        if self.screen != Screen::Patients {
            return;
        }
        self.confirm_delete = filter_patients(&self.patients, &self.roster_filter)
            .get(self.selected_patient)
            .map(|p| p.id);
    }

    pub fn confirm_delete_patient(&mut self) -> Option<ApiCommand> {
        let patient_id = self.confirm_delete.take()?;
        self.issue(|id| ApiCommand::DeletePatient { id, patient_id })
    }

    pub fn cancel_delete(&mut self) {
        self.confirm_delete = None;
    }

    pub fn open_sncr(&mut self) -> Option<ApiCommand> {
        let command = self.issue(|id| ApiCommand::FetchSncrNumbers { id })?;
        self.screen = Screen::Sncr;
        self.sncr.selected = 0;
        Some(command)
    }

    // ========================
    // Patient detail actions
    // ========================

    fn selected_detail_row(&self) -> Option<&DetailRow> {
        self.detail_rows.get(self.selected_row)
    }

    fn selected_record_id(&self) -> Option<u64> {
        match self.selected_detail_row() {
            Some(DetailRow::Record { record_id }) => Some(*record_id),
            Some(DetailRow::Document { record_id, .. }) => Some(*record_id),
            None => None,
        }
    }

    pub fn new_record_entry(&mut self) -> Option<ApiCommand> {
        let patient_id = self.detail_patient.as_ref()?.id;
        self.issue(|id| ApiCommand::CreateMedicalRecord { id, patient_id })
    }

    pub fn open_prescription_form(&mut self) {
        self.open_record_form(DocumentKind::Prescription);
    }

    pub fn open_procedure_form(&mut self) {
        self.open_record_form(DocumentKind::Procedure);
    }

    fn open_record_form(&mut self, kind: DocumentKind) {
        match self.selected_record_id() {
            Some(record_id) => self.record_form = Some(RecordForm::new(kind, record_id)),
            None => {
                self.notice = Some(Notice::error(
                    "Crie uma entrada no prontuário antes de adicionar itens.",
                ));
            }
        }
    }

    pub fn download_unsigned(&mut self) -> Option<ApiCommand> {
        let (kind, document_id, is_signed) = match self.selected_detail_row() {
            Some(DetailRow::Document {
                kind,
                document_id,
                is_signed,
                ..
            }) => (*kind, *document_id, *is_signed),
            _ => return None,
        };
        if is_signed {
            self.notice = Some(Notice::info("Este documento já está assinado."));
            return None;
        }
        let command = self.issue(|id| ApiCommand::DownloadUnsigned {
            id,
            kind,
            document_id,
        })?;
        // A fresh exchange per document; the previous one is abandoned
        self.exchange = Some(SigningExchange::new(kind, document_id));
        Some(command)
    }

    pub fn open_upload_prompt(&mut self) {
        let (kind, document_id, is_signed) = match self.selected_detail_row() {
            Some(DetailRow::Document {
                kind,
                document_id,
                is_signed,
                ..
            }) => (*kind, *document_id, *is_signed),
            _ => return,
        };
        if is_signed {
            self.notice = Some(Notice::info("Este documento já está assinado."));
            return;
        }
        self.upload_prompt = Some(UploadPrompt {
            kind,
            document_id,
            path: String::new(),
            cursor: 0,
        });
    }

    pub fn download_signed(&mut self) -> Option<ApiCommand> {
        match self.screen {
            Screen::PatientDetail => {
                let (kind, document_id, is_signed) = match self.selected_detail_row() {
                    Some(DetailRow::Document {
                        kind,
                        document_id,
                        is_signed,
                        ..
                    }) => (*kind, *document_id, *is_signed),
                    _ => return None,
                };
                if !is_signed {
                    self.notice = Some(Notice::info("Este documento ainda não foi assinado."));
                    return None;
                }
                self.issue(|id| ApiCommand::DownloadSigned {
                    id,
                    kind,
                    document_id,
                })
            }
            Screen::Documents => {
                let document = self
                    .documents
                    .payload
                    .as_ref()?
                    .documents
                    .get(self.documents.selected)?;
                let document_id = document.id;
                let Some(kind) = DocumentKind::from_doc_type(&document.doc_type) else {
                    self.notice = Some(Notice::error("Tipo de documento desconhecido."));
                    return None;
                };
                self.issue(|id| ApiCommand::DownloadSigned {
                    id,
                    kind,
                    document_id,
                })
            }
            _ => None,
        }
    }

    // ========================
    // SNCR registry
    // ========================

    pub fn cycle_sncr_filter(&mut self) {
        self.sncr.cycle_filter();
    }

    pub fn submit_sncr_numbers(&mut self) -> Option<ApiCommand> {
        if !self.sncr.can_submit() {
            self.notice = Some(Notice::error(
                "Selecione um tipo de receita e informe ao menos um número.",
            ));
            return None;
        }
        let numbers = self.sncr.input.clone();
        let prescription_type = self.sncr.filter?;
        self.issue(|id| ApiCommand::AddSncrNumbers {
            id,
            numbers,
            prescription_type,
        })
    }

    // ========================
    // Popups
    // ========================

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn close_help(&mut self) {
        self.show_help = false;
    }

    pub fn close_instructions(&mut self) {
        self.show_instructions = false;
    }

    // ========================
    // API response handling
    // ========================

    /// Apply a response, possibly producing a follow-up command (the
    /// re-fetch after a successful mutation).
    pub fn handle_response(&mut self, response: ApiResponse) -> Option<ApiCommand> {
        // Only process the response of the pending request
        if self.pending_request != Some(response.id()) {
            return None;
        }
        self.pending_request = None;
        self.is_loading = false;

        match response {
            ApiResponse::LoggedIn { session, .. } => {
                self.notice = Some(Notice::success("Login bem-sucedido!"));
                self.screen = match session.role {
                    Role::Medico => Screen::Patients,
                    Role::Paciente => Screen::Documents,
                };
                self.session = Some(session);
                self.login = crate::app::state::TextForm::login();
                self.initial_command()
            }

            ApiResponse::LoggedOut { .. } => {
                self.session = None;
                self.screen = Screen::Login;
                self.login = crate::app::state::TextForm::login();
                self.patients.clear();
                self.roster_filter.clear();
                self.filter_cursor = 0;
                self.selected_patient = 0;
                self.detail_patient = None;
                self.detail_rows.clear();
                self.patient_form = None;
                self.record_form = None;
                self.upload_prompt = None;
                self.exchange = None;
                self.sncr = Default::default();
                self.documents = Default::default();
                self.notice = Some(Notice::info("Sessão encerrada."));
                None
            }

            ApiResponse::SignedUp { .. } => {
                self.screen = Screen::Login;
                self.notice = Some(Notice::success(
                    "Cadastro realizado com sucesso! Faça o login.",
                ));
                None
            }

            ApiResponse::Patients { patients, .. } => {
                self.patients = patients;
                let len = filter_patients(&self.patients, &self.roster_filter).len();
                self.selected_patient = self.selected_patient.min(len.saturating_sub(1));
                None
            }

            ApiResponse::Patient { patient, .. } => {
                self.apply_patient(*patient);
                None
            }

            ApiResponse::PatientSaved {
                patient, created, ..
            } => {
                self.patient_form = None;
                if created {
                    self.notice = Some(Notice::success("Paciente adicionado com sucesso!"));
                    self.screen = Screen::Patients;
                    self.issue(|id| ApiCommand::FetchPatients { id })
                } else {
                    self.notice = Some(Notice::success("Paciente atualizado com sucesso!"));
                    self.screen = Screen::PatientDetail;
                    self.apply_patient(*patient);
                    None
                }
            }

            ApiResponse::PatientDeleted { .. } => {
                self.notice = Some(Notice::success("Paciente excluído."));
                self.issue(|id| ApiCommand::FetchPatients { id })
            }

            ApiResponse::MedicalRecordCreated { patient_id, .. } => {
                self.notice = Some(Notice::success("Nova entrada no prontuário criada."));
                self.issue(|id| ApiCommand::FetchPatient { id, patient_id })
            }

            ApiResponse::PrescriptionCreated { patient_id, .. } => {
                self.notice = Some(Notice::success("Receita adicionada com sucesso."));
                self.issue(|id| ApiCommand::FetchPatient { id, patient_id })
            }

            ApiResponse::ProcedureCreated { patient_id, .. } => {
                self.notice = Some(Notice::success("Procedimento adicionado com sucesso."));
                self.issue(|id| ApiCommand::FetchPatient { id, patient_id })
            }

            ApiResponse::UnsignedDownloaded {
                kind,
                document_id,
                path,
                ..
            } => {
                match &mut self.exchange {
                    Some(exchange)
                        if exchange.kind == kind && exchange.document_id == document_id =>
                    {
                        let _ = exchange.mark_downloaded();
                    }
                    _ => {
                        let mut exchange = SigningExchange::new(kind, document_id);
                        let _ = exchange.mark_downloaded();
                        self.exchange = Some(exchange);
                    }
                }
                self.show_instructions = true;
                self.notice = Some(Notice::info(format!("PDF salvo em {}", path.display())));
                None
            }

            ApiResponse::SignedUploaded {
                kind,
                document_id,
                patient_id,
                ..
            } => {
                if let Some(exchange) = &mut self.exchange {
                    if exchange.kind == kind && exchange.document_id == document_id {
                        if let Err(error) = exchange.mark_uploaded() {
                            tracing::warn!(error = %error, "Signing exchange out of order");
                        }
                    }
                }
                self.notice = Some(Notice::success("Documento assinado enviado com sucesso."));
                // The server is the source of truth: re-fetch the patient
                self.issue(|id| ApiCommand::FetchPatient { id, patient_id })
            }

            ApiResponse::SignedDownloaded { path, .. } => {
                self.notice = Some(Notice::success(format!(
                    "PDF assinado salvo em {}",
                    path.display()
                )));
                None
            }

            ApiResponse::PatientDocuments { payload, .. } => {
                let len = payload.documents.len();
                self.documents.payload = Some(*payload);
                self.documents.selected = self.documents.selected.min(len.saturating_sub(1));
                None
            }

            ApiResponse::CepResolved { address, .. } => {
                if let Some(pf) = &mut self.patient_form {
                    pf.form.set_value(patient_field::STREET, address.logradouro);
                    pf.form
                        .set_value(patient_field::NEIGHBORHOOD, address.bairro);
                    pf.form.set_value(patient_field::CITY, address.localidade);
                    pf.form.set_value(patient_field::STATE, address.uf);
                }
                None
            }

            ApiResponse::SncrNumbers { numbers, .. } => {
                self.sncr.numbers = numbers;
                let len = self.sncr.filtered().len();
                self.sncr.selected = self.sncr.selected.min(len.saturating_sub(1));
                None
            }

            ApiResponse::SncrAdded { submitted, .. } => {
                self.sncr.input.clear();
                self.sncr.cursor = 0;
                self.notice = Some(Notice::success(format!(
                    "{} número(s) adicionado(s) com sucesso!",
                    submitted
                )));
                self.issue(|id| ApiCommand::FetchSncrNumbers { id })
            }

            ApiResponse::Failure { message, .. } => {
                self.notice = Some(Notice::error(message));
                None
            }
        }
    }

    /// Install a freshly fetched patient as the detail view and settle any
    /// signing exchange waiting for server confirmation.
    fn apply_patient(&mut self, patient: crate::models::Patient) {
        if let Some(exchange) = &mut self.exchange {
            if exchange.state() == SigningState::SignedUploaded
                && document_is_signed(&patient, exchange.kind, exchange.document_id)
            {
                let _ = exchange.confirm_signed();
                self.notice = Some(Notice::success("Assinatura confirmada pelo servidor."));
                self.exchange = None;
            }
        }
        self.detail_rows = detail_rows(&patient);
        self.selected_row = self.selected_row.min(self.detail_rows.len().saturating_sub(1));
        self.detail_patient = Some(patient);
    }
}

/// Whether the given document appears signed in a patient record
fn document_is_signed(
    patient: &crate::models::Patient,
    kind: DocumentKind,
    document_id: u64,
) -> bool {
    patient.medical_records.iter().any(|record| match kind {
        DocumentKind::Prescription => record
            .prescriptions
            .iter()
            .any(|p| p.id == document_id && p.is_signed),
        DocumentKind::Procedure => record
            .procedures
            .iter()
            .any(|p| p.id == document_id && p.is_signed),
    })
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

fn insert_at(text: &mut String, cursor: &mut usize, c: char) {
    if *cursor <= text.len() {
        text.insert(*cursor, c);
        *cursor += c.len_utf8();
    }
}

fn backspace_at(text: &mut String, cursor: &mut usize) {
    if *cursor == 0 {
        return;
    }
    let prev = text[..*cursor]
        .char_indices()
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0);
    text.remove(prev);
    *cursor = prev;
}

fn cursor_left_in(text: &str, cursor: &mut usize) {
    if *cursor > 0 {
        *cursor = text[..*cursor]
            .char_indices()
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0);
    }
}

fn cursor_right_in(text: &str, cursor: &mut usize) {
    if *cursor < text.len() {
        *cursor = text[*cursor..]
            .char_indices()
            .nth(1)
            .map(|(i, _)| *cursor + i)
            .unwrap_or(text.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ApiResponse;
    use crate::models::{MedicalRecord, Patient, Prescription, UserInfo};
    use crate::session::Session;
    use chrono::Utc;

    fn logged_in_doctor() -> AppState {
        AppState::new(Some(Session {
            token: "tok".to_string(),
            role: Role::Medico,
            full_name: "Dra. Ana".to_string(),
        }))
    }

    fn patient(id: u64, prescription_signed: bool) -> Patient {
        Patient {
            id,
            user: UserInfo::default(),
            cpf: String::new(),
            phone: String::new(),
            address: Default::default(),
            medical_records: vec![MedicalRecord {
                id: 10,
                created_at: Utc::now(),
                prescriptions: vec![Prescription {
                    id: 100,
                    description: "Dipirona".to_string(),
                    prescription_type: Default::default(),
                    sncr_number: None,
                    acquirer_name: None,
                    acquirer_document: None,
                    is_signed: prescription_signed,
                    signed_at: None,
                    signed_by: None,
                }],
                procedures: Vec::new(),
            }],
        }
    }

    #[test]
    fn test_login_success_routes_by_role() {
        let mut state = AppState::new(None);
        for c in "ana".chars() {
            state.enter_char(c);
        }
        state.next_field();
        for c in "secret".chars() {
            state.enter_char(c);
        }
        let command = state.submit().expect("login command");
        let id = match command {
            ApiCommand::Login { id, .. } => id,
            other => panic!("unexpected command {:?}", other),
        };

        let follow_up = state.handle_response(ApiResponse::LoggedIn {
            id,
            session: Session {
                token: "tok".to_string(),
                role: Role::Paciente,
                full_name: "João".to_string(),
            },
        });
        assert_eq!(state.screen, Screen::Documents);
        assert!(matches!(
            follow_up,
            Some(ApiCommand::FetchPatientDocuments { .. })
        ));
    }

    #[test]
    fn test_login_failure_does_not_navigate() {
        let mut state = AppState::new(None);
        for c in "x".chars() {
            state.enter_char(c);
        }
        state.next_field();
        state.enter_char('y');
        let command = state.submit().expect("login command");
        let id = match command {
            ApiCommand::Login { id, .. } => id,
            other => panic!("unexpected command {:?}", other),
        };

        let follow_up = state.handle_response(ApiResponse::Failure {
            id,
            message: "Falha no login. Verifique suas credenciais.".to_string(),
        });
        assert!(follow_up.is_none());
        assert_eq!(state.screen, Screen::Login);
        assert!(matches!(
            state.notice.as_ref().map(|n| n.level),
            Some(crate::app::state::NoticeLevel::Error)
        ));
    }

    #[test]
    fn test_stale_responses_are_dropped() {
        let mut state = logged_in_doctor();
        let command = state.refresh().expect("fetch");
        let id = match command {
            ApiCommand::FetchPatients { id } => id,
            other => panic!("unexpected command {:?}", other),
        };

        // A response for some other id is ignored
        assert!(state
            .handle_response(ApiResponse::Patients {
                id: id + 99,
                patients: vec![patient(1, false)],
            })
            .is_none());
        assert!(state.patients.is_empty());
        assert!(state.is_loading);

        state.handle_response(ApiResponse::Patients {
            id,
            patients: vec![patient(1, false)],
        });
        assert_eq!(state.patients.len(), 1);
        assert!(!state.is_loading);
    }

    #[test]
    fn test_upload_triggers_patient_refetch_and_confirmation() {
        let mut state = logged_in_doctor();
        state.screen = Screen::PatientDetail;
        let p = patient(1, false);
        state.detail_rows = detail_rows(&p);
        state.detail_patient = Some(p);
        state.selected_row = 1; // the prescription row

        // Download the unsigned PDF first
        let command = state.download_unsigned().expect("download command");
        let id = match command {
            ApiCommand::DownloadUnsigned { id, .. } => id,
            other => panic!("unexpected command {:?}", other),
        };
        state.handle_response(ApiResponse::UnsignedDownloaded {
            id,
            kind: DocumentKind::Prescription,
            document_id: 100,
            path: PathBuf::from("/tmp/prescription_100_unsigned.pdf"),
        });
        assert!(state.show_instructions);
        state.close_instructions();

        // Submit the signed file
        state.open_upload_prompt();
        for c in "/tmp/signed.pdf".chars() {
            state.enter_char(c);
        }
        let command = state.submit().expect("upload command");
        let id = match command {
            ApiCommand::UploadSigned { id, .. } => id,
            other => panic!("unexpected command {:?}", other),
        };

        // Success re-fetches the owning patient
        let follow_up = state.handle_response(ApiResponse::SignedUploaded {
            id,
            kind: DocumentKind::Prescription,
            document_id: 100,
            patient_id: 1,
        });
        let id = match follow_up {
            Some(ApiCommand::FetchPatient { id, patient_id: 1 }) => id,
            other => panic!("expected refetch, got {:?}", other),
        };

        // The re-fetched record confirms the signature
        state.handle_response(ApiResponse::Patient {
            id,
            patient: Box::new(patient(1, true)),
        });
        assert!(state.exchange.is_none());
        assert!(matches!(
            state.detail_rows.get(1),
            Some(DetailRow::Document {
                is_signed: true,
                ..
            })
        ));
    }

    #[test]
    fn test_download_signed_rejected_before_upload() {
        let mut state = logged_in_doctor();
        state.screen = Screen::PatientDetail;
        let p = patient(1, false);
        state.detail_rows = detail_rows(&p);
        state.detail_patient = Some(p);
        state.selected_row = 1;

        // Not signed yet: no request goes out
        assert!(state.download_signed().is_none());
        assert!(!state.is_loading);
    }

    #[test]
    fn test_sncr_submission_blocked_without_subtype() {
        let mut state = logged_in_doctor();
        state.screen = Screen::Sncr;
        state.sncr.input = "SNCR-1".to_string();
        assert!(state.submit_sncr_numbers().is_none());

        state.cycle_sncr_filter();
        assert!(state.submit_sncr_numbers().is_some());
    }

    #[test]
    fn test_cep_lookup_fires_on_complete_code() {
        let mut state = logged_in_doctor();
        state.open_add_patient();
        if let Some(pf) = &mut state.patient_form {
            pf.form.active = patient_field::CEP;
            pf.form.set_value(patient_field::CEP, "01001-000");
        }
        let command = state.next_field();
        assert!(
            matches!(command, Some(ApiCommand::LookupCep { ref cep, .. }) if cep.as_str() == "01001000")
        );

        // Address fields are filled from the lookup
        let id = state.pending_request.expect("pending");
        state.handle_response(ApiResponse::CepResolved {
            id,
            address: crate::models::CepAddress {
                logradouro: "Praça da Sé".to_string(),
                bairro: "Sé".to_string(),
                localidade: "São Paulo".to_string(),
                uf: "SP".to_string(),
                erro: false,
            },
        });
        let pf = state.patient_form.as_ref().expect("form");
        assert_eq!(pf.form.value(patient_field::CITY), "São Paulo");
        assert_eq!(pf.form.value(patient_field::STATE), "SP");
    }

    #[test]
    fn test_incomplete_cep_does_not_fire_lookup() {
        let mut state = logged_in_doctor();
        state.open_add_patient();
        if let Some(pf) = &mut state.patient_form {
            pf.form.active = patient_field::CEP;
            pf.form.set_value(patient_field::CEP, "0100");
        }
        assert!(state.next_field().is_none());
    }

    #[test]
    fn test_logout_clears_everything() {
        let mut state = logged_in_doctor();
        state.patients = vec![patient(1, false)];
        let command = state.logout().expect("logout");
        let id = match command {
            ApiCommand::Logout { id } => id,
            other => panic!("unexpected command {:?}", other),
        };
        state.handle_response(ApiResponse::LoggedOut { id });
        assert_eq!(state.screen, Screen::Login);
        assert!(state.session.is_none());
        assert!(state.patients.is_empty());
    }

    #[test]
    fn test_validation_error_message_is_surfaced() {
        let mut state = logged_in_doctor();
        state.screen = Screen::PatientDetail;
        let p = patient(1, false);
        state.detail_rows = detail_rows(&p);
        state.detail_patient = Some(p);
        state.open_prescription_form();
        if let Some(form) = &mut state.record_form {
            form.description = "Dipirona".to_string();
        }
        let command = state.submit().expect("create command");
        let id = match command {
            ApiCommand::CreatePrescription { id, .. } => id,
            other => panic!("unexpected command {:?}", other),
        };
        state.handle_response(ApiResponse::Failure {
            id,
            message: "This field is required.".to_string(),
        });
        assert_eq!(
            state.notice.as_ref().map(|n| n.text.as_str()),
            Some("This field is required.")
        );
    }
}
