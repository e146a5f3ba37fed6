//! App state - pure data structure with no I/O logic

use crate::messages::ui_events::{InputMode, Screen};
use crate::messages::RenderState;
use crate::models::{
    AddressPayload, NewPrescription, NewProcedure, Patient, PatientDocuments, PatientPayload,
    PrescriptionType, SncrNumber, UserPayload,
};
use crate::session::Session;
use crate::signing::{DocumentKind, SigningExchange};

/// Severity of the status-line notice
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Transient user-facing notification shown on the status line
#[derive(Clone, Debug)]
pub struct Notice {
    pub text: String,
    pub level: NoticeLevel,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice {
            text: text.into(),
            level: NoticeLevel::Info,
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Notice {
            text: text.into(),
            level: NoticeLevel::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice {
            text: text.into(),
            level: NoticeLevel::Error,
        }
    }
}

/// One labelled text input of a form
#[derive(Clone, Debug)]
pub struct FormField {
    pub label: &'static str,
    pub value: String,
    pub masked: bool,
}

impl FormField {
    fn new(label: &'static str) -> Self {
        FormField {
            label,
            value: String::new(),
            masked: false,
        }
    }

    fn masked(label: &'static str) -> Self {
        FormField {
            label,
            value: String::new(),
            masked: true,
        }
    }

    fn with_value(label: &'static str, value: impl Into<String>) -> Self {
        FormField {
            label,
            value: value.into(),
            masked: false,
        }
    }
}

/// Field indices of the login form
pub mod login_field {
    pub const USERNAME: usize = 0;
    pub const PASSWORD: usize = 1;
}

/// Field indices of the doctor sign-up form
pub mod sign_up_field {
    pub const FIRST_NAME: usize = 0;
    pub const LAST_NAME: usize = 1;
    pub const USERNAME: usize = 2;
    pub const EMAIL: usize = 3;
    pub const CRM: usize = 4;
    pub const PASSWORD: usize = 5;
}

/// Field indices of the patient form
pub mod patient_field {
    pub const FIRST_NAME: usize = 0;
    pub const LAST_NAME: usize = 1;
    pub const EMAIL: usize = 2;
    pub const USERNAME: usize = 3;
    pub const PASSWORD: usize = 4;
    pub const CPF: usize = 5;
    pub const PHONE: usize = 6;
    pub const CEP: usize = 7;
    pub const STREET: usize = 8;
    pub const NUMBER: usize = 9;
    pub const COMPLEMENT: usize = 10;
    pub const NEIGHBORHOOD: usize = 11;
    pub const CITY: usize = 12;
    pub const STATE: usize = 13;
}

/// A flat sequence of labelled text fields with one active field and a
/// byte cursor inside it.
#[derive(Clone, Debug)]
pub struct TextForm {
    pub fields: Vec<FormField>,
    pub active: usize,
    pub cursor: usize,
}

impl TextForm {
    fn from_fields(fields: Vec<FormField>) -> Self {
        TextForm {
            fields,
            active: 0,
            cursor: 0,
        }
    }

    pub fn login() -> Self {
        Self::from_fields(vec![
            FormField::new("Usuário"),
            FormField::masked("Senha"),
        ])
    }

    pub fn sign_up() -> Self {
        Self::from_fields(vec![
            FormField::new("Nome"),
            FormField::new("Sobrenome"),
            FormField::new("Nome de usuário"),
            FormField::new("Email"),
            FormField::new("CRM"),
            FormField::masked("Senha"),
        ])
    }

    /// Patient form, optionally prefilled from an existing record. The
    /// password stays blank on edit and is only sent when typed.
    pub fn patient(existing: Option<&Patient>) -> Self {
        let mut fields = vec![
            FormField::new("Nome"),
            FormField::new("Sobrenome"),
            FormField::new("Email"),
            FormField::new("Nome de usuário"),
            FormField::masked("Senha"),
            FormField::new("CPF"),
            FormField::new("Telefone"),
            FormField::new("CEP"),
            FormField::new("Rua"),
            FormField::new("Número"),
            FormField::new("Complemento"),
            FormField::new("Bairro"),
            FormField::new("Cidade"),
            FormField::new("Estado"),
        ];
        if let Some(patient) = existing {
            fields[patient_field::FIRST_NAME] =
                FormField::with_value("Nome", &patient.user.first_name);
            fields[patient_field::LAST_NAME] =
                FormField::with_value("Sobrenome", &patient.user.last_name);
            fields[patient_field::EMAIL] = FormField::with_value("Email", &patient.user.email);
            fields[patient_field::USERNAME] =
                FormField::with_value("Nome de usuário", &patient.user.username);
            fields[patient_field::CPF] = FormField::with_value("CPF", &patient.cpf);
            fields[patient_field::PHONE] = FormField::with_value("Telefone", &patient.phone);
            fields[patient_field::CEP] = FormField::with_value("CEP", &patient.address.cep);
            fields[patient_field::STREET] =
                FormField::with_value("Rua", &patient.address.street);
            fields[patient_field::NUMBER] =
                FormField::with_value("Número", &patient.address.number);
            fields[patient_field::COMPLEMENT] = FormField::with_value(
                "Complemento",
                patient.address.complement.clone().unwrap_or_default(),
            );
            fields[patient_field::NEIGHBORHOOD] =
                FormField::with_value("Bairro", &patient.address.neighborhood);
            fields[patient_field::CITY] = FormField::with_value("Cidade", &patient.address.city);
            fields[patient_field::STATE] =
                FormField::with_value("Estado", &patient.address.state);
        }
        Self::from_fields(fields)
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields.get(index).map(|f| f.value.as_str()).unwrap_or("")
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<String>) {
        if let Some(field) = self.fields.get_mut(index) {
            field.value = value.into();
        }
    }

    pub fn active_value(&self) -> &str {
        self.value(self.active)
    }

    pub fn next_field(&mut self) {
        self.active = (self.active + 1) % self.fields.len();
        self.cursor = self.active_value().len();
    }

    pub fn prev_field(&mut self) {
        self.active = self
            .active
            .checked_sub(1)
            .unwrap_or(self.fields.len() - 1);
        self.cursor = self.active_value().len();
    }

    pub fn insert_char(&mut self, c: char) {
        let cursor = self.cursor;
        if let Some(field) = self.fields.get_mut(self.active) {
            if cursor <= field.value.len() {
                field.value.insert(cursor, c);
                self.cursor = cursor + c.len_utf8();
            }
        }
    }

    pub fn backspace(&mut self) {
        let cursor = self.cursor;
        if cursor == 0 {
            return;
        }
        if let Some(field) = self.fields.get_mut(self.active) {
            let prev = field.value[..cursor]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            field.value.remove(prev);
            self.cursor = prev;
        }
    }

    pub fn cursor_left(&mut self) {
        let value = self.active_value();
        if self.cursor > 0 {
            self.cursor = value[..self.cursor]
                .char_indices()
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
        }
    }

    pub fn cursor_right(&mut self) {
        let value = self.active_value();
        if self.cursor < value.len() {
            self.cursor = value[self.cursor..]
                .char_indices()
                .nth(1)
                .map(|(i, _)| self.cursor + i)
                .unwrap_or(value.len());
        }
    }
}

/// Patient form plus the id being edited, if any
#[derive(Clone, Debug)]
pub struct PatientFormState {
    pub form: TextForm,
    pub editing: Option<u64>,
}

impl PatientFormState {
    pub fn add() -> Self {
        PatientFormState {
            form: TextForm::patient(None),
            editing: None,
        }
    }

    pub fn edit(patient: &Patient) -> Self {
        PatientFormState {
            form: TextForm::patient(Some(patient)),
            editing: Some(patient.id),
        }
    }

    pub fn to_payload(&self) -> PatientPayload {
        let form = &self.form;
        let password = form.value(patient_field::PASSWORD).trim();
        PatientPayload {
            user: UserPayload {
                first_name: form.value(patient_field::FIRST_NAME).to_string(),
                last_name: form.value(patient_field::LAST_NAME).to_string(),
                email: form.value(patient_field::EMAIL).to_string(),
                username: form.value(patient_field::USERNAME).to_string(),
                password: if password.is_empty() {
                    None
                } else {
                    Some(password.to_string())
                },
            },
            cpf: form.value(patient_field::CPF).to_string(),
            phone: form.value(patient_field::PHONE).to_string(),
            address: AddressPayload {
                cep: form.value(patient_field::CEP).to_string(),
                street: form.value(patient_field::STREET).to_string(),
                number: form.value(patient_field::NUMBER).to_string(),
                complement: form.value(patient_field::COMPLEMENT).to_string(),
                neighborhood: form.value(patient_field::NEIGHBORHOOD).to_string(),
                city: form.value(patient_field::CITY).to_string(),
                state: form.value(patient_field::STATE).to_string(),
            },
        }
    }
}

/// Active field of the prescription/procedure creation modal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordField {
    Description,
    Type,
    AcquirerName,
    AcquirerDocument,
}

/// Modal for adding a prescription or procedure to a record entry
#[derive(Clone, Debug)]
pub struct RecordForm {
    pub record_id: u64,
    pub kind: DocumentKind,
    pub description: String,
    pub prescription_type: PrescriptionType,
    pub acquirer_name: String,
    pub acquirer_document: String,
    pub field: RecordField,
    pub cursor: usize,
}

impl RecordForm {
    pub fn new(kind: DocumentKind, record_id: u64) -> Self {
        RecordForm {
            record_id,
            kind,
            description: String::new(),
            prescription_type: PrescriptionType::Comum,
            acquirer_name: String::new(),
            acquirer_document: String::new(),
            field: RecordField::Description,
            cursor: 0,
        }
    }

    /// Fields reachable given the kind and the selected subtype
    fn field_order(&self) -> Vec<RecordField> {
        match self.kind {
            DocumentKind::Procedure => vec![RecordField::Description],
            DocumentKind::Prescription => {
                if self.prescription_type.is_controlled() {
                    vec![
                        RecordField::Description,
                        RecordField::Type,
                        RecordField::AcquirerName,
                        RecordField::AcquirerDocument,
                    ]
                } else {
                    vec![RecordField::Description, RecordField::Type]
                }
            }
        }
    }

    pub fn next_field(&mut self) {
        let order = self.field_order();
        let idx = order.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = order[(idx + 1) % order.len()];
        self.cursor = self.active_text().map(str::len).unwrap_or(0);
    }

    pub fn prev_field(&mut self) {
        let order = self.field_order();
        let idx = order.iter().position(|f| *f == self.field).unwrap_or(0);
        self.field = order[idx.checked_sub(1).unwrap_or(order.len() - 1)];
        self.cursor = self.active_text().map(str::len).unwrap_or(0);
    }

    pub fn active_text(&self) -> Option<&str> {
        match self.field {
            RecordField::Description => Some(&self.description),
            RecordField::Type => None,
            RecordField::AcquirerName => Some(&self.acquirer_name),
            RecordField::AcquirerDocument => Some(&self.acquirer_document),
        }
    }

    pub fn active_text_mut(&mut self) -> Option<&mut String> {
        match self.field {
            RecordField::Description => Some(&mut self.description),
            RecordField::Type => None,
            RecordField::AcquirerName => Some(&mut self.acquirer_name),
            RecordField::AcquirerDocument => Some(&mut self.acquirer_document),
        }
    }

    pub fn cycle_type(&mut self) {
        self.prescription_type = self.prescription_type.next();
    }

    pub fn to_prescription_payload(&self) -> NewPrescription {
        let controlled = self.prescription_type.is_controlled();
        let optional = |value: &str| {
            let trimmed = value.trim();
            if controlled && !trimmed.is_empty() {
                Some(trimmed.to_string())
            } else {
                None
            }
        };
        NewPrescription {
            medical_record: self.record_id,
            description: self.description.clone(),
            prescription_type: self.prescription_type,
            acquirer_name: optional(&self.acquirer_name),
            acquirer_document: optional(&self.acquirer_document),
        }
    }

    pub fn to_procedure_payload(&self) -> NewProcedure {
        NewProcedure {
            medical_record: self.record_id,
            description: self.description.clone(),
        }
    }
}

/// Prompt for the path of the externally signed file
#[derive(Clone, Debug)]
pub struct UploadPrompt {
    pub kind: DocumentKind,
    pub document_id: u64,
    pub path: String,
    pub cursor: usize,
}

/// One selectable row of the patient detail listing
#[derive(Clone, Debug, PartialEq)]
pub enum DetailRow {
    Record {
        record_id: u64,
    },
    Document {
        record_id: u64,
        kind: DocumentKind,
        document_id: u64,
        is_signed: bool,
    },
}

/// Flatten a patient's record entries into the selectable row list
pub fn detail_rows(patient: &Patient) -> Vec<DetailRow> {
    let mut rows = Vec::new();
    for record in &patient.medical_records {
        rows.push(DetailRow::Record {
            record_id: record.id,
        });
        for prescription in &record.prescriptions {
            rows.push(DetailRow::Document {
                record_id: record.id,
                kind: DocumentKind::Prescription,
                document_id: prescription.id,
                is_signed: prescription.is_signed,
            });
        }
        for procedure in &record.procedures {
            rows.push(DetailRow::Document {
                record_id: record.id,
                kind: DocumentKind::Procedure,
                document_id: procedure.id,
                is_signed: procedure.is_signed,
            });
        }
    }
    rows
}

/// Case-insensitive roster filter over names and CPF
pub fn filter_patients<'a>(patients: &'a [Patient], filter: &str) -> Vec<&'a Patient> {
    if filter.is_empty() {
        return patients.iter().collect();
    }
    let needle = filter.to_lowercase();
    patients
        .iter()
        .filter(|p| {
            p.user.first_name.to_lowercase().contains(&needle)
                || p.user.last_name.to_lowercase().contains(&needle)
                || p.cpf.contains(filter)
        })
        .collect()
}

/// SNCR registry screen state
#[derive(Clone, Debug, Default)]
pub struct SncrState {
    pub numbers: Vec<SncrNumber>,
    pub input: String,
    pub cursor: usize,
    pub filter: Option<PrescriptionType>,
    pub selected: usize,
}

impl SncrState {
    /// Submit is gated until a concrete subtype is chosen and the input has
    /// at least one number; the server rejects batches without a subtype.
    pub fn can_submit(&self) -> bool {
        self.filter.is_some() && !self.input.trim().is_empty()
    }

    pub fn filtered(&self) -> Vec<&SncrNumber> {
        match self.filter {
            None => self.numbers.iter().collect(),
            Some(kind) => self
                .numbers
                .iter()
                .filter(|n| n.prescription_type == kind)
                .collect(),
        }
    }

    /// ALL -> each controlled subtype -> ALL
    pub fn cycle_filter(&mut self) {
        let controlled = PrescriptionType::CONTROLLED;
        self.filter = match self.filter {
            None => Some(controlled[0]),
            Some(current) => {
                let idx = controlled.iter().position(|t| *t == current).unwrap_or(0);
                if idx + 1 < controlled.len() {
                    Some(controlled[idx + 1])
                } else {
                    None
                }
            }
        };
        self.selected = 0;
    }
}

/// Patient-facing documents screen state
#[derive(Clone, Debug, Default)]
pub struct DocumentsState {
    pub payload: Option<PatientDocuments>,
    pub selected: usize,
}

/// Main application state - pure data, no I/O
pub struct AppState {
    pub screen: Screen,
    pub input_mode: InputMode,
    pub session: Option<Session>,

    pub is_loading: bool,
    pub pending_request: Option<u64>,
    next_request_id: u64,
    pub notice: Option<Notice>,

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
    pub exchange: Option<SigningExchange>,

    // SNCR registry
    pub sncr: SncrState,

    // Patient documents
    pub documents: DocumentsState,
}

impl AppState {
    pub fn new(session: Option<Session>) -> Self {
        let screen = match &session {
            Some(s) => match s.role {
                crate::models::Role::Medico => Screen::Patients,
                crate::models::Role::Paciente => Screen::Documents,
            },
            None => Screen::Login,
        };

        AppState {
            screen,
            input_mode: InputMode::Normal,
            session,
            is_loading: false,
            pending_request: None,
            next_request_id: 1,
            notice: None,
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
            exchange: None,
            sncr: SncrState::default(),
            documents: DocumentsState::default(),
        }
    }

    /// Generate a unique request ID
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    /// Convert state to RenderState for UI
    pub fn to_render_state(&self) -> RenderState {
        RenderState {
            screen: self.screen,
            input_mode: self.input_mode,
            session: self.session.clone(),
            notice: self.notice.clone(),
            is_loading: self.is_loading,
            show_help: self.show_help,
            show_instructions: self.show_instructions,
            login: self.login.clone(),
            sign_up: self.sign_up.clone(),
            patients: self.patients.clone(),
            roster_filter: self.roster_filter.clone(),
            filter_cursor: self.filter_cursor,
            selected_patient: self.selected_patient,
            confirm_delete: self.confirm_delete,
            patient_form: self.patient_form.clone(),
            detail_patient: self.detail_patient.clone(),
            detail_rows: self.detail_rows.clone(),
            selected_row: self.selected_row,
            record_form: self.record_form.clone(),
            upload_prompt: self.upload_prompt.clone(),
            sncr: self.sncr.clone(),
            documents: self.documents.clone(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MedicalRecord, Prescription, Procedure, Role, UserInfo};
    use chrono::Utc;

    fn patient_with_records() -> Patient {
        Patient {
            id: 1,
            user: UserInfo {
                first_name: "Ana".to_string(),
                last_name: "Souza".to_string(),
                ..Default::default()
            },
            cpf: "111.222.333-44".to_string(),
            phone: String::new(),
            address: Default::default(),
            medical_records: vec![MedicalRecord {
                id: 10,
                created_at: Utc::now(),
                prescriptions: vec![Prescription {
                    id: 100,
                    description: "Dipirona".to_string(),
                    prescription_type: PrescriptionType::Comum,
                    sncr_number: None,
                    acquirer_name: None,
                    acquirer_document: None,
                    is_signed: false,
                    signed_at: None,
                    signed_by: None,
                }],
                procedures: vec![Procedure {
                    id: 200,
                    description: "Raio-X".to_string(),
                    is_signed: true,
                    signed_at: Some(Utc::now()),
                    signed_by: None,
                }],
            }],
        }
    }

    #[test]
    fn test_detail_rows_flatten_records_in_order() {
        let rows = detail_rows(&patient_with_records());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], DetailRow::Record { record_id: 10 });
        assert_eq!(
            rows[1],
            DetailRow::Document {
                record_id: 10,
                kind: DocumentKind::Prescription,
                document_id: 100,
                is_signed: false,
            }
        );
        assert_eq!(
            rows[2],
            DetailRow::Document {
                record_id: 10,
                kind: DocumentKind::Procedure,
                document_id: 200,
                is_signed: true,
            }
        );
    }

    #[test]
    fn test_filter_matches_name_and_cpf() {
        let patients = vec![patient_with_records()];
        assert_eq!(filter_patients(&patients, "ana").len(), 1);
        assert_eq!(filter_patients(&patients, "souza").len(), 1);
        assert_eq!(filter_patients(&patients, "111.222").len(), 1);
        assert_eq!(filter_patients(&patients, "zzz").len(), 0);
    }

    #[test]
    fn test_sncr_submit_requires_concrete_subtype() {
        let mut sncr = SncrState {
            input: "SNCR-001\nSNCR-002".to_string(),
            ..Default::default()
        };
        // ALL selected: blocked before any request is sent
        assert!(!sncr.can_submit());
        sncr.filter = Some(PrescriptionType::B1Azul);
        assert!(sncr.can_submit());
        sncr.input = "   \n ".to_string();
        assert!(!sncr.can_submit());
    }

    #[test]
    fn test_sncr_filter_cycles_through_controlled_types() {
        let mut sncr = SncrState::default();
        assert!(sncr.filter.is_none());
        for expected in PrescriptionType::CONTROLLED {
            sncr.cycle_filter();
            assert_eq!(sncr.filter, Some(expected));
        }
        sncr.cycle_filter();
        assert!(sncr.filter.is_none());
    }

    #[test]
    fn test_record_form_skips_acquirer_for_common_type() {
        let mut form = RecordForm::new(DocumentKind::Prescription, 10);
        form.next_field();
        assert_eq!(form.field, RecordField::Type);
        form.next_field();
        assert_eq!(form.field, RecordField::Description);

        form.prescription_type = PrescriptionType::B1Azul;
        form.next_field();
        form.next_field();
        assert_eq!(form.field, RecordField::AcquirerName);
    }

    #[test]
    fn test_record_form_payload_drops_acquirer_for_common() {
        let mut form = RecordForm::new(DocumentKind::Prescription, 10);
        form.description = "Dipirona 500mg".to_string();
        form.acquirer_name = "José".to_string();
        let payload = form.to_prescription_payload();
        assert!(payload.acquirer_name.is_none());

        form.prescription_type = PrescriptionType::A1Amarela;
        let payload = form.to_prescription_payload();
        assert_eq!(payload.acquirer_name.as_deref(), Some("José"));
    }

    #[test]
    fn test_initial_screen_follows_role() {
        let doctor = AppState::new(Some(Session {
            token: "t".to_string(),
            role: Role::Medico,
            full_name: "Dra. Ana".to_string(),
        }));
        assert_eq!(doctor.screen, Screen::Patients);

        let patient = AppState::new(Some(Session {
            token: "t".to_string(),
            role: Role::Paciente,
            full_name: "João".to_string(),
        }));
        assert_eq!(patient.screen, Screen::Documents);

        assert_eq!(AppState::new(None).screen, Screen::Login);
    }

    #[test]
    fn test_text_form_editing_is_utf8_aware() {
        let mut form = TextForm::login();
        for c in "joão".chars() {
            form.insert_char(c);
        }
        assert_eq!(form.value(login_field::USERNAME), "joão");
        form.backspace();
        assert_eq!(form.value(login_field::USERNAME), "joã");
        form.cursor_left();
        form.cursor_right();
        assert_eq!(form.cursor, "joã".len());
    }
}
