use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account role returned by the token-auth endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "MEDICO")]
    Medico,
    #[serde(rename = "PACIENTE")]
    Paciente,
}

impl Role {
    #[allow(dead_code)] // wire value, serialization goes through serde
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Medico => "MEDICO",
            Role::Paciente => "PACIENTE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::Medico => "Médico",
            Role::Paciente => "Paciente",
        }
    }
}

/// Prescription subtype. Everything except `Comum` is a controlled
/// prescription and carries acquirer identity fields plus an SNCR number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PrescriptionType {
    #[default]
    #[serde(rename = "COMUM")]
    Comum,
    #[serde(rename = "A1_AMARELA")]
    A1Amarela,
    #[serde(rename = "B1_AZUL")]
    B1Azul,
    #[serde(rename = "B2_AZUL")]
    B2Azul,
    #[serde(rename = "C1_BRANCA")]
    C1Branca,
    #[serde(rename = "C2_BRANCA")]
    C2Branca,
    #[serde(rename = "ANTIMICROBIANO")]
    Antimicrobiano,
}

impl PrescriptionType {
    pub const ALL: [PrescriptionType; 7] = [
        PrescriptionType::Comum,
        PrescriptionType::A1Amarela,
        PrescriptionType::B1Azul,
        PrescriptionType::B2Azul,
        PrescriptionType::C1Branca,
        PrescriptionType::C2Branca,
        PrescriptionType::Antimicrobiano,
    ];

    /// Subtypes that require an externally issued SNCR number
    pub const CONTROLLED: [PrescriptionType; 6] = [
        PrescriptionType::A1Amarela,
        PrescriptionType::B1Azul,
        PrescriptionType::B2Azul,
        PrescriptionType::C1Branca,
        PrescriptionType::C2Branca,
        PrescriptionType::Antimicrobiano,
    ];

    #[allow(dead_code)] // wire value, serialization goes through serde
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionType::Comum => "COMUM",
            PrescriptionType::A1Amarela => "A1_AMARELA",
            PrescriptionType::B1Azul => "B1_AZUL",
            PrescriptionType::B2Azul => "B2_AZUL",
            PrescriptionType::C1Branca => "C1_BRANCA",
            PrescriptionType::C2Branca => "C2_BRANCA",
            PrescriptionType::Antimicrobiano => "ANTIMICROBIANO",
        }
    }

    /// Display label, as printed on the physical form
    pub fn label(&self) -> &'static str {
        match self {
            PrescriptionType::Comum => "Comum",
            PrescriptionType::A1Amarela => "Notificação de Receita A1 (Amarela)",
            PrescriptionType::B1Azul => "Notificação de Receita B1 (Azul)",
            PrescriptionType::B2Azul => "Notificação de Receita B2 (Azul)",
            PrescriptionType::C1Branca => "Receita de Controle Especial (Branca - Duas Vias)",
            PrescriptionType::C2Branca => "Receita de Controle Especial (Branca - Retinoides)",
            PrescriptionType::Antimicrobiano => "Receita de Antimicrobiano (Branca - Duas Vias)",
        }
    }

    pub fn is_controlled(&self) -> bool {
        !matches!(self, PrescriptionType::Comum)
    }

    pub fn next(&self) -> PrescriptionType {
        let idx = Self::ALL.iter().position(|t| t == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Lifecycle of a controlled-prescription number in the registry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SncrStatus {
    #[serde(rename = "DISPONIVEL")]
    Disponivel,
    #[serde(rename = "UTILIZADO")]
    Utilizado,
    #[serde(rename = "CANCELADO")]
    Cancelado,
}

impl SncrStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SncrStatus::Disponivel => "Disponível",
            SncrStatus::Utilizado => "Utilizado",
            SncrStatus::Cancelado => "Cancelado",
        }
    }
}

/// Account fields nested inside a patient record
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl UserInfo {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Identity of the doctor who signed a document
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignerInfo {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub crm: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub cep: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    // DRF serializes decimals as strings; only displayed, never computed on
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
}

impl Address {
    pub fn summary(&self) -> String {
        format!(
            "{}, {} - {}/{}",
            self.street, self.number, self.city, self.state
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Patient {
    pub id: u64,
    pub user: UserInfo,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Address,
    #[serde(default)]
    pub medical_records: Vec<MedicalRecord>,
}

/// One dated prontuário entry grouping prescriptions and procedures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prescription {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prescription_type: PrescriptionType,
    #[serde(default)]
    pub sncr_number: Option<String>,
    #[serde(default)]
    pub acquirer_name: Option<String>,
    #[serde(default)]
    pub acquirer_document: Option<String>,
    #[serde(default)]
    pub is_signed: bool,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_by: Option<SignerInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Procedure {
    pub id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_signed: bool,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_by: Option<SignerInfo>,
}

/// Registry entry for an externally issued controlled-prescription number
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SncrNumber {
    pub id: u64,
    pub number: String,
    pub prescription_type: PrescriptionType,
    pub status: SncrStatus,
    pub created_at: DateTime<Utc>,
}

/// Row in the patient-facing signed documents listing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientDocument {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub id: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub signed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub doctor_crm: Option<String>,
    #[serde(default)]
    pub signed_document: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientDocuments {
    pub patient: Patient,
    #[serde(default)]
    pub documents: Vec<PatientDocument>,
}

/// ViaCEP lookup result. A bad CEP answers `{"erro": true}` with 200.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CepAddress {
    #[serde(default)]
    pub logradouro: String,
    #[serde(default)]
    pub bairro: String,
    #[serde(default)]
    pub localidade: String,
    #[serde(default)]
    pub uf: String,
    #[serde(default)]
    pub erro: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    #[serde(default)]
    pub full_name: String,
}

/// The patient listing may come back bare or paginated depending on the
/// server's pagination settings; accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PatientListPayload {
    Plain(Vec<Patient>),
    Paginated { results: Vec<Patient> },
}

impl PatientListPayload {
    pub fn into_vec(self) -> Vec<Patient> {
        match self {
            PatientListPayload::Plain(patients) => patients,
            PatientListPayload::Paginated { results } => results,
        }
    }
}

// ============================================================================
// Outbound payloads
// ============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct UserPayload {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AddressPayload {
    pub cep: String,
    pub street: String,
    pub number: String,
    pub complement: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PatientPayload {
    pub user: UserPayload,
    pub cpf: String,
    pub phone: String,
    pub address: AddressPayload,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewPrescription {
    pub medical_record: u64,
    pub description: String,
    pub prescription_type: PrescriptionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquirer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquirer_document: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct NewProcedure {
    pub medical_record: u64,
    pub description: String,
}

/// Doctor self-registration payload
#[derive(Clone, Debug, Serialize)]
pub struct SignUpPayload {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub crm: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_list_accepts_bare_array() {
        let body = r#"[{"id": 1, "user": {"first_name": "Ana", "last_name": "Souza"}}]"#;
        let payload: PatientListPayload = serde_json::from_str(body).unwrap();
        let patients = payload.into_vec();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].user.full_name(), "Ana Souza");
    }

    #[test]
    fn test_patient_list_accepts_paginated_payload() {
        let body = r#"{"count": 1, "results": [{"id": 7, "user": {}, "cpf": "123"}]}"#;
        let payload: PatientListPayload = serde_json::from_str(body).unwrap();
        let patients = payload.into_vec();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].id, 7);
    }

    #[test]
    fn test_prescription_type_round_trip() {
        let json = serde_json::to_string(&PrescriptionType::B1Azul).unwrap();
        assert_eq!(json, "\"B1_AZUL\"");
        let back: PrescriptionType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PrescriptionType::B1Azul);
    }

    #[test]
    fn test_prescription_defaults_to_common_type() {
        let body = r#"{"id": 3, "description": "Dipirona 500mg"}"#;
        let p: Prescription = serde_json::from_str(body).unwrap();
        assert_eq!(p.prescription_type, PrescriptionType::Comum);
        assert!(!p.prescription_type.is_controlled());
        assert!(!p.is_signed);
    }

    #[test]
    fn test_controlled_types_exclude_common() {
        assert!(PrescriptionType::CONTROLLED
            .iter()
            .all(|t| t.is_controlled()));
        assert!(!PrescriptionType::CONTROLLED.contains(&PrescriptionType::Comum));
    }

    #[test]
    fn test_role_parses_server_values() {
        let role: Role = serde_json::from_str("\"MEDICO\"").unwrap();
        assert_eq!(role, Role::Medico);
        let role: Role = serde_json::from_str("\"PACIENTE\"").unwrap();
        assert_eq!(role, Role::Paciente);
    }
}
