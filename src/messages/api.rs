//! API messages - communication between App and API layers

use std::path::PathBuf;

use crate::models::{
    CepAddress, NewPrescription, NewProcedure, Patient, PatientDocuments, PatientPayload,
    PrescriptionType, SignUpPayload, SncrNumber,
};
use crate::session::Session;
use crate::signing::DocumentKind;

/// Commands sent from App layer to API layer
#[derive(Debug, Clone)]
pub enum ApiCommand {
    // Auth
    Login {
        id: u64,
        username: String,
        password: String,
    },
    Logout {
        id: u64,
    },
    SignUp {
        id: u64,
        payload: SignUpPayload,
    },

    // Patients
    FetchPatients {
        id: u64,
    },
    FetchPatient {
        id: u64,
        patient_id: u64,
    },
    CreatePatient {
        id: u64,
        payload: PatientPayload,
    },
    UpdatePatient {
        id: u64,
        patient_id: u64,
        payload: PatientPayload,
    },
    DeletePatient {
        id: u64,
        patient_id: u64,
    },

    // Medical records
    CreateMedicalRecord {
        id: u64,
        patient_id: u64,
    },
    CreatePrescription {
        id: u64,
        patient_id: u64,
        payload: NewPrescription,
    },
    CreateProcedure {
        id: u64,
        patient_id: u64,
        payload: NewProcedure,
    },

    // Document exchange
    DownloadUnsigned {
        id: u64,
        kind: DocumentKind,
        document_id: u64,
    },
    UploadSigned {
        id: u64,
        kind: DocumentKind,
        document_id: u64,
        patient_id: u64,
        file_path: PathBuf,
    },
    DownloadSigned {
        id: u64,
        kind: DocumentKind,
        document_id: u64,
    },

    // Patient-facing documents
    FetchPatientDocuments {
        id: u64,
    },

    // Address lookup
    LookupCep {
        id: u64,
        cep: String,
    },

    // SNCR registry
    FetchSncrNumbers {
        id: u64,
    },
    AddSncrNumbers {
        id: u64,
        numbers: String,
        prescription_type: PrescriptionType,
    },

    /// Shutdown the API actor
    Shutdown,
}

impl ApiCommand {
    /// Short name for logging; never includes payload data
    pub fn name(&self) -> &'static str {
        match self {
            ApiCommand::Login { .. } => "login",
            ApiCommand::Logout { .. } => "logout",
            ApiCommand::SignUp { .. } => "sign_up",
            ApiCommand::FetchPatients { .. } => "fetch_patients",
            ApiCommand::FetchPatient { .. } => "fetch_patient",
            ApiCommand::CreatePatient { .. } => "create_patient",
            ApiCommand::UpdatePatient { .. } => "update_patient",
            ApiCommand::DeletePatient { .. } => "delete_patient",
            ApiCommand::CreateMedicalRecord { .. } => "create_medical_record",
            ApiCommand::CreatePrescription { .. } => "create_prescription",
            ApiCommand::CreateProcedure { .. } => "create_procedure",
            ApiCommand::DownloadUnsigned { .. } => "download_unsigned",
            ApiCommand::UploadSigned { .. } => "upload_signed",
            ApiCommand::DownloadSigned { .. } => "download_signed",
            ApiCommand::FetchPatientDocuments { .. } => "fetch_patient_documents",
            ApiCommand::LookupCep { .. } => "lookup_cep",
            ApiCommand::FetchSncrNumbers { .. } => "fetch_sncr_numbers",
            ApiCommand::AddSncrNumbers { .. } => "add_sncr_numbers",
            ApiCommand::Shutdown => "shutdown",
        }
    }
}

/// Responses sent from API layer to App layer
#[derive(Debug, Clone)]
pub enum ApiResponse {
    LoggedIn {
        id: u64,
        session: Session,
    },
    LoggedOut {
        id: u64,
    },
    SignedUp {
        id: u64,
    },

    Patients {
        id: u64,
        patients: Vec<Patient>,
    },
    Patient {
        id: u64,
        patient: Box<Patient>,
    },
    PatientSaved {
        id: u64,
        patient: Box<Patient>,
        created: bool,
    },
    PatientDeleted {
        id: u64,
        patient_id: u64,
    },

    MedicalRecordCreated {
        id: u64,
        patient_id: u64,
    },
    PrescriptionCreated {
        id: u64,
        patient_id: u64,
    },
    ProcedureCreated {
        id: u64,
        patient_id: u64,
    },

    UnsignedDownloaded {
        id: u64,
        kind: DocumentKind,
        document_id: u64,
        path: PathBuf,
    },
    SignedUploaded {
        id: u64,
        kind: DocumentKind,
        document_id: u64,
        patient_id: u64,
    },
    SignedDownloaded {
        id: u64,
        kind: DocumentKind,
        document_id: u64,
        path: PathBuf,
    },

    PatientDocuments {
        id: u64,
        payload: Box<PatientDocuments>,
    },

    CepResolved {
        id: u64,
        address: CepAddress,
    },

    SncrNumbers {
        id: u64,
        numbers: Vec<SncrNumber>,
    },
    SncrAdded {
        id: u64,
        submitted: usize,
    },

    /// Any command that failed, with the user-facing message
    Failure {
        id: u64,
        message: String,
    },
}

impl ApiResponse {
    /// Get the request ID the response correlates to
    pub fn id(&self) -> u64 {
        match self {
            ApiResponse::LoggedIn { id, .. } => *id,
            ApiResponse::LoggedOut { id } => *id,
            ApiResponse::SignedUp { id } => *id,
            ApiResponse::Patients { id, .. } => *id,
            ApiResponse::Patient { id, .. } => *id,
            ApiResponse::PatientSaved { id, .. } => *id,
            ApiResponse::PatientDeleted { id, .. } => *id,
            ApiResponse::MedicalRecordCreated { id, .. } => *id,
            ApiResponse::PrescriptionCreated { id, .. } => *id,
            ApiResponse::ProcedureCreated { id, .. } => *id,
            ApiResponse::UnsignedDownloaded { id, .. } => *id,
            ApiResponse::SignedUploaded { id, .. } => *id,
            ApiResponse::SignedDownloaded { id, .. } => *id,
            ApiResponse::PatientDocuments { id, .. } => *id,
            ApiResponse::CepResolved { id, .. } => *id,
            ApiResponse::SncrNumbers { id, .. } => *id,
            ApiResponse::SncrAdded { id, .. } => *id,
            ApiResponse::Failure { id, .. } => *id,
        }
    }
}
