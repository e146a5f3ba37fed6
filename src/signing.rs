//! Signed-document exchange workflow
//!
//! Moves a clinical document from drafted to signed without the client ever
//! touching the cryptographic signature itself: the unsigned PDF is
//! downloaded, signed by the user in an external desktop application, and
//! uploaded back. The server is the single source of truth for the signed
//! status; after a successful upload the owning patient record is re-fetched
//! rather than reconciled locally.

use std::sync::OnceLock;

use anyhow::{bail, Result};
use regex::Regex;

/// Kind of clinical document that goes through the signature exchange
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Prescription,
    Procedure,
}

impl DocumentKind {
    /// Path segment of the kind-specific API routes
    pub fn api_segment(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "prescriptions",
            DocumentKind::Procedure => "procedures",
        }
    }

    /// Prefix used when synthesizing local filenames
    pub fn slug(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "prescription",
            DocumentKind::Procedure => "procedure",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "Receita",
            DocumentKind::Procedure => "Procedimento",
        }
    }

    /// Map the `type` field of the patient-documents listing back to a kind
    pub fn from_doc_type(value: &str) -> Option<DocumentKind> {
        match value.to_lowercase().as_str() {
            "prescription" | "receita" => Some(DocumentKind::Prescription),
            "procedure" | "procedimento" => Some(DocumentKind::Procedure),
            _ => None,
        }
    }
}

/// Stages of the exchange. The terminal state is reached only after the
/// server has accepted the upload and the re-fetched record confirms it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningState {
    Drafted,
    UnsignedDownloaded,
    SignedUploaded,
    Signed,
}

/// Tracks one document through the exchange. Transition methods reject
/// skipped steps; re-downloading is allowed and never regresses the state.
#[derive(Clone, Debug)]
pub struct SigningExchange {
    pub kind: DocumentKind,
    pub document_id: u64,
    state: SigningState,
}

impl SigningExchange {
    pub fn new(kind: DocumentKind, document_id: u64) -> Self {
        SigningExchange {
            kind,
            document_id,
            state: SigningState::Drafted,
        }
    }

    pub fn state(&self) -> SigningState {
        self.state
    }

    #[allow(dead_code)] // exercised through state() by the app layer
    pub fn is_terminal(&self) -> bool {
        self.state == SigningState::Signed
    }

    /// The unsigned artifact was fetched and saved locally
    pub fn mark_downloaded(&mut self) -> Result<()> {
        match self.state {
            SigningState::Drafted | SigningState::UnsignedDownloaded => {
                self.state = SigningState::UnsignedDownloaded;
                Ok(())
            }
            // Re-downloading after upload is harmless but must not regress
            SigningState::SignedUploaded | SigningState::Signed => Ok(()),
        }
    }

    /// The signed artifact was accepted by the server
    pub fn mark_uploaded(&mut self) -> Result<()> {
        match self.state {
            SigningState::UnsignedDownloaded => {
                self.state = SigningState::SignedUploaded;
                Ok(())
            }
            SigningState::Drafted => {
                bail!("o documento não assinado ainda não foi baixado")
            }
            SigningState::SignedUploaded | SigningState::Signed => {
                bail!("o documento assinado já foi enviado")
            }
        }
    }

    /// The re-fetched record shows the document as signed
    pub fn confirm_signed(&mut self) -> Result<()> {
        match self.state {
            SigningState::SignedUploaded => {
                self.state = SigningState::Signed;
                Ok(())
            }
            SigningState::Signed => Ok(()),
            _ => bail!("o servidor ainda não confirmou a assinatura"),
        }
    }
}

/// Instruction steps shown after the unsigned PDF is saved locally
pub const SIGNING_STEPS: [(&str, &str); 4] = [
    (
        "Abra o Assinador ITI",
        "Localize e abra o programa Assinador ITI (ou outro de sua preferência) e carregue o PDF que você acabou de baixar.",
    ),
    (
        "Assine o Documento",
        "Siga os passos do programa para assinar o documento com seu certificado digital A3. Pode ser necessário inserir a senha (PIN) do seu token.",
    ),
    (
        "Salve o Novo Arquivo",
        "O programa criará um novo arquivo PDF assinado. Salve-o em um local fácil de encontrar.",
    ),
    (
        "Envie o Arquivo Correto",
        "Volte para esta tela e use a opção de envio para submeter o novo arquivo que você acabou de salvar.",
    ),
];

/// Local filename for a freshly downloaded unsigned artifact
pub fn unsigned_filename(kind: DocumentKind, document_id: u64) -> String {
    format!("{}_{}_unsigned.pdf", kind.slug(), document_id)
}

/// Fallback filename for a signed artifact when the server suggests none
pub fn fallback_signed_filename(kind: DocumentKind, document_id: u64) -> String {
    format!("{}_{}_signed.pdf", kind.slug(), document_id)
}

fn filename_regex() -> &'static Regex {
    static FILENAME_REGEX: OnceLock<Regex> = OnceLock::new();
    FILENAME_REGEX.get_or_init(|| {
        Regex::new(r#"filename[^;=\n]*=\s*(?:"([^"\n]*)"|'([^'\n]*)'|([^;\n]*))"#).unwrap()
    })
}

/// Extract the filename suggested by a `Content-Disposition` header,
/// honoring it only for attachments, with the synthesized name as fallback.
pub fn filename_from_disposition(
    disposition: Option<&str>,
    kind: DocumentKind,
    document_id: u64,
) -> String {
    let fallback = fallback_signed_filename(kind, document_id);

    let Some(value) = disposition else {
        return fallback;
    };
    if !value.contains("attachment") {
        return fallback;
    }

    let Some(captures) = filename_regex().captures(value) else {
        return fallback;
    };
    let name = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))
        .map(|m| m.as_str().trim())
        .unwrap_or("");

    if name.is_empty() {
        fallback
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_filename_is_extracted() {
        let name = filename_from_disposition(
            Some(r#"attachment; filename="foo.pdf""#),
            DocumentKind::Prescription,
            1,
        );
        assert_eq!(name, "foo.pdf");
    }

    #[test]
    fn test_unquoted_filename_is_extracted() {
        let name = filename_from_disposition(
            Some("attachment; filename=receita_3.pdf"),
            DocumentKind::Prescription,
            3,
        );
        assert_eq!(name, "receita_3.pdf");
    }

    #[test]
    fn test_missing_header_falls_back() {
        let name = filename_from_disposition(None, DocumentKind::Procedure, 42);
        assert_eq!(name, "procedure_42_signed.pdf");
    }

    #[test]
    fn test_inline_disposition_falls_back() {
        let name = filename_from_disposition(
            Some("inline; filename=\"nope.pdf\""),
            DocumentKind::Prescription,
            9,
        );
        assert_eq!(name, "prescription_9_signed.pdf");
    }

    #[test]
    fn test_malformed_header_falls_back() {
        let name =
            filename_from_disposition(Some("attachment; filename="), DocumentKind::Procedure, 7);
        assert_eq!(name, "procedure_7_signed.pdf");
    }

    #[test]
    fn test_exchange_happy_path() {
        let mut exchange = SigningExchange::new(DocumentKind::Prescription, 1);
        assert_eq!(exchange.state(), SigningState::Drafted);
        exchange.mark_downloaded().unwrap();
        assert_eq!(exchange.state(), SigningState::UnsignedDownloaded);
        exchange.mark_uploaded().unwrap();
        assert_eq!(exchange.state(), SigningState::SignedUploaded);
        exchange.confirm_signed().unwrap();
        assert!(exchange.is_terminal());
    }

    #[test]
    fn test_upload_before_download_is_rejected() {
        let mut exchange = SigningExchange::new(DocumentKind::Procedure, 2);
        assert!(exchange.mark_uploaded().is_err());
        assert_eq!(exchange.state(), SigningState::Drafted);
    }

    #[test]
    fn test_confirm_before_upload_is_rejected() {
        let mut exchange = SigningExchange::new(DocumentKind::Prescription, 3);
        exchange.mark_downloaded().unwrap();
        assert!(exchange.confirm_signed().is_err());
        assert_eq!(exchange.state(), SigningState::UnsignedDownloaded);
    }

    #[test]
    fn test_redownload_does_not_regress() {
        let mut exchange = SigningExchange::new(DocumentKind::Prescription, 4);
        exchange.mark_downloaded().unwrap();
        exchange.mark_uploaded().unwrap();
        exchange.mark_downloaded().unwrap();
        assert_eq!(exchange.state(), SigningState::SignedUploaded);
    }

    #[test]
    fn test_duplicate_upload_is_rejected() {
        let mut exchange = SigningExchange::new(DocumentKind::Procedure, 5);
        exchange.mark_downloaded().unwrap();
        exchange.mark_uploaded().unwrap();
        assert!(exchange.mark_uploaded().is_err());
    }

    #[test]
    fn test_doc_type_mapping() {
        assert_eq!(
            DocumentKind::from_doc_type("Receita"),
            Some(DocumentKind::Prescription)
        );
        assert_eq!(
            DocumentKind::from_doc_type("procedure"),
            Some(DocumentKind::Procedure)
        );
        assert_eq!(DocumentKind::from_doc_type("exame"), None);
    }
}
