//! HTTP client wrapper - centralizes the base URL and session token
//!
//! Every method is one endpoint of the medical record API. Non-2xx replies
//! are converted to the single user-facing message via the error surface;
//! transport failures are mapped to short Portuguese notices.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::json;

use crate::api::error::user_message;
use crate::models::{
    CepAddress, LoginRequest, LoginResponse, NewPrescription, NewProcedure, Patient,
    PatientDocuments, PatientListPayload, PatientPayload, PrescriptionType, SignUpPayload,
    SncrNumber,
};
use crate::session::Session;
use crate::signing::{filename_from_disposition, DocumentKind};

/// Create an HTTP client with default configuration
pub fn create_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// API gateway wrapper. Cloning is cheap; clones share the session, so a
/// login observed by one clone is visible to all.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<RwLock<Option<Session>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Option<Session>) -> Self {
        ApiClient {
            http: create_client(),
            base_url: base_url.into(),
            session: Arc::new(RwLock::new(session)),
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    pub fn set_session(&self, session: Option<Session>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token() {
            Some(token) => builder.header("Authorization", format!("Token {}", token)),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.get(self.url(path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.post(self.url(path)))
    }

    fn put(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.put(self.url(path)))
    }

    fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.http.delete(self.url(path)))
    }

    // ========================
    // Auth
    // ========================

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = send(
            self.post("/api/api-token-auth/").json(&request),
            "Falha no login. Verifique suas credenciais.",
        )
        .await?;
        response
            .json()
            .await
            .context("resposta inválida do servidor")
    }

    pub async fn sign_up_doctor(&self, payload: &SignUpPayload) -> Result<()> {
        send(
            self.post("/api/users/").json(payload),
            "Falha no cadastro. Verifique os dados e tente novamente.",
        )
        .await?;
        Ok(())
    }

    // ========================
    // Patients
    // ========================

    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        let response = send(self.get("/api/patients/"), "Falha ao buscar pacientes.").await?;
        let payload: PatientListPayload = response
            .json()
            .await
            .context("resposta inválida do servidor")?;
        Ok(payload.into_vec())
    }

    pub async fn fetch_patient(&self, patient_id: u64) -> Result<Patient> {
        let response = send(
            self.get(&format!("/api/patients/{}/", patient_id)),
            "Falha ao buscar os dados do paciente.",
        )
        .await?;
        response
            .json()
            .await
            .context("resposta inválida do servidor")
    }

    pub async fn create_patient(&self, payload: &PatientPayload) -> Result<Patient> {
        let response = send(
            self.post("/api/patients/").json(payload),
            "Erro ao adicionar paciente.",
        )
        .await?;
        response
            .json()
            .await
            .context("resposta inválida do servidor")
    }

    pub async fn update_patient(&self, patient_id: u64, payload: &PatientPayload) -> Result<Patient> {
        let response = send(
            self.put(&format!("/api/patients/{}/", patient_id)).json(payload),
            "Erro ao atualizar paciente.",
        )
        .await?;
        response
            .json()
            .await
            .context("resposta inválida do servidor")
    }

    pub async fn delete_patient(&self, patient_id: u64) -> Result<()> {
        send(
            self.delete(&format!("/api/patients/{}/", patient_id)),
            "Erro ao excluir paciente.",
        )
        .await?;
        Ok(())
    }

    // ========================
    // Medical records
    // ========================

    pub async fn create_medical_record(&self, patient_id: u64) -> Result<()> {
        send(
            self.post("/api/medical-records/").json(&json!({ "patient": patient_id })),
            "Erro ao criar entrada no prontuário.",
        )
        .await?;
        Ok(())
    }

    pub async fn create_prescription(&self, payload: &NewPrescription) -> Result<()> {
        send(
            self.post("/api/prescriptions/").json(payload),
            "Falha ao adicionar receita.",
        )
        .await?;
        Ok(())
    }

    pub async fn create_procedure(&self, payload: &NewProcedure) -> Result<()> {
        send(
            self.post("/api/procedures/").json(payload),
            "Falha ao adicionar procedimento.",
        )
        .await?;
        Ok(())
    }

    // ========================
    // Document exchange
    // ========================

    pub async fn download_unsigned_pdf(
        &self,
        kind: DocumentKind,
        document_id: u64,
    ) -> Result<Vec<u8>> {
        let path = format!(
            "/api/{}/{}/download_unsigned_pdf/",
            kind.api_segment(),
            document_id
        );
        let response = send(self.get(&path), "Falha no download do PDF.").await?;
        let bytes = response
            .bytes()
            .await
            .context("falha ao ler o PDF recebido")?;
        Ok(bytes.to_vec())
    }

    /// Upload a signed artifact as multipart form data under the `file` field
    pub async fn upload_signed_document(
        &self,
        kind: DocumentKind,
        document_id: u64,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")
            .context("tipo de arquivo inválido")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let path = format!(
            "/api/{}/{}/upload_signed_document/",
            kind.api_segment(),
            document_id
        );
        send(
            self.post(&path).multipart(form),
            "Falha ao enviar o documento.",
        )
        .await?;
        Ok(())
    }

    /// Fetch a signed artifact; returns the bytes and the filename suggested
    /// by the server (or the synthesized fallback).
    pub async fn download_signed_document(
        &self,
        kind: DocumentKind,
        document_id: u64,
    ) -> Result<(Vec<u8>, String)> {
        let path = format!(
            "/api/{}/{}/download_signed_document/",
            kind.api_segment(),
            document_id
        );
        let response = send(self.get(&path), "Falha no download do PDF assinado.").await?;

        let disposition = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let filename = filename_from_disposition(disposition.as_deref(), kind, document_id);

        let bytes = response
            .bytes()
            .await
            .context("falha ao ler o PDF recebido")?;
        Ok((bytes.to_vec(), filename))
    }

    // ========================
    // Patient documents
    // ========================

    pub async fn fetch_patient_documents(&self) -> Result<PatientDocuments> {
        let response = send(
            self.get("/api/patient-documents/"),
            "Falha ao buscar os documentos.",
        )
        .await?;
        response
            .json()
            .await
            .context("resposta inválida do servidor")
    }

    // ========================
    // Address lookup
    // ========================

    pub async fn lookup_cep(&self, cep: &str) -> Result<CepAddress> {
        let response = send(
            self.get(&format!("/api/viacep/{}/", cep)),
            "Falha ao consultar o CEP.",
        )
        .await?;
        let address: CepAddress = response
            .json()
            .await
            .context("resposta inválida do servidor")?;
        if address.erro {
            bail!("CEP não encontrado.");
        }
        Ok(address)
    }

    // ========================
    // SNCR registry
    // ========================

    pub async fn list_sncr_numbers(&self) -> Result<Vec<SncrNumber>> {
        let response = send(
            self.get("/api/sncr-numbers/"),
            "Falha ao buscar os números.",
        )
        .await?;
        response
            .json()
            .await
            .context("resposta inválida do servidor")
    }

    /// Bulk-submit newline-separated registry numbers for one subtype
    pub async fn add_sncr_numbers(
        &self,
        numbers: &str,
        prescription_type: PrescriptionType,
    ) -> Result<()> {
        send(
            self.post("/api/sncr-numbers/").json(&json!({
                "number": numbers,
                "prescription_type": prescription_type,
            })),
            "Erro ao adicionar os números.",
        )
        .await?;
        Ok(())
    }
}

/// Execute a request, mapping transport failures and non-2xx replies to the
/// single user-facing message.
async fn send(builder: reqwest::RequestBuilder, fallback: &str) -> Result<reqwest::Response> {
    let response = builder
        .send()
        .await
        .map_err(|e| anyhow!(transport_message(&e)))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, "API call failed");
    bail!(user_message(&body, fallback))
}

fn transport_message(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Tempo de resposta esgotado (30s).".to_string()
    } else if error.is_connect() {
        format!("Falha de conexão: {}", error)
    } else {
        format!("Falha na requisição: {}", error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new("http://localhost:8000/", None);
        assert_eq!(
            client.url("/api/patients/"),
            "http://localhost:8000/api/patients/"
        );
    }

    #[test]
    fn test_session_is_shared_between_clones() {
        let client = ApiClient::new("http://localhost:8000", None);
        let clone = client.clone();

        clone.set_session(Some(Session {
            token: "tok".to_string(),
            role: crate::models::Role::Medico,
            full_name: "Dr. X".to_string(),
        }));
        assert_eq!(client.token().as_deref(), Some("tok"));

        client.set_session(None);
        assert!(clone.session().is_none());
    }
}
