//! API actor - executes API commands in the Tokio async runtime
//!
//! Owns the API client and the session store: login and logout mutate the
//! session here, so there is a single writer. Download commands also write
//! the fetched PDF to the download directory before reporting success.

use anyhow::Context;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::api::client::ApiClient;
use crate::messages::{ApiCommand, ApiResponse};
use crate::session::{download_dir, Session, SessionStore};
use crate::signing::unsigned_filename;

/// API actor that processes commands from the App layer
pub struct ApiActor {
    client: ApiClient,
    store: SessionStore,
    response_tx: mpsc::UnboundedSender<ApiResponse>,
    tasks: JoinSet<()>,
}

impl ApiActor {
    pub fn new(
        client: ApiClient,
        store: SessionStore,
        response_tx: mpsc::UnboundedSender<ApiResponse>,
    ) -> Self {
        ApiActor {
            client,
            store,
            response_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Run the API actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<ApiCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ApiCommand::Shutdown) | None => break,
                        Some(command) => {
                            tracing::info!(command = command.name(), "Executing API command");
                            let client = self.client.clone();
                            let store = self.store.clone();
                            let response_tx = self.response_tx.clone();
                            self.tasks.spawn(async move {
                                let response = execute(client, store, command).await;
                                let _ = response_tx.send(response);
                            });
                        }
                    }
                }

                // Clean up completed tasks
                Some(_result) = self.tasks.join_next() => {}
            }
        }
    }
}

/// Run one command to completion, converting any error into a `Failure`
/// carrying the user-facing message.
async fn execute(client: ApiClient, store: SessionStore, command: ApiCommand) -> ApiResponse {
    match command {
        ApiCommand::Login {
            id,
            username,
            password,
        } => match client.login(&username, &password).await {
            Ok(login) => {
                let session = Session {
                    token: login.token,
                    role: login.role,
                    full_name: login.full_name,
                };
                client.set_session(Some(session.clone()));
                if let Err(error) = store.save(&session) {
                    tracing::warn!(error = %error, "Failed to persist session");
                }
                ApiResponse::LoggedIn { id, session }
            }
            Err(error) => failure(id, error),
        },

        ApiCommand::Logout { id } => {
            client.set_session(None);
            if let Err(error) = store.clear() {
                tracing::warn!(error = %error, "Failed to clear persisted session");
            }
            ApiResponse::LoggedOut { id }
        }

        ApiCommand::SignUp { id, payload } => match client.sign_up_doctor(&payload).await {
            Ok(()) => ApiResponse::SignedUp { id },
            Err(error) => failure(id, error),
        },

        ApiCommand::FetchPatients { id } => match client.list_patients().await {
            Ok(patients) => ApiResponse::Patients { id, patients },
            Err(error) => failure(id, error),
        },

        ApiCommand::FetchPatient { id, patient_id } => match client.fetch_patient(patient_id).await
        {
            Ok(patient) => ApiResponse::Patient {
                id,
                patient: Box::new(patient),
            },
            Err(error) => failure(id, error),
        },

        ApiCommand::CreatePatient { id, payload } => match client.create_patient(&payload).await {
            Ok(patient) => ApiResponse::PatientSaved {
                id,
                patient: Box::new(patient),
                created: true,
            },
            Err(error) => failure(id, error),
        },

        ApiCommand::UpdatePatient {
            id,
            patient_id,
            payload,
        } => match client.update_patient(patient_id, &payload).await {
            Ok(patient) => ApiResponse::PatientSaved {
                id,
                patient: Box::new(patient),
                created: false,
            },
            Err(error) => failure(id, error),
        },

        ApiCommand::DeletePatient { id, patient_id } => {
            match client.delete_patient(patient_id).await {
                Ok(()) => ApiResponse::PatientDeleted { id, patient_id },
                Err(error) => failure(id, error),
            }
        }

        ApiCommand::CreateMedicalRecord { id, patient_id } => {
            match client.create_medical_record(patient_id).await {
                Ok(()) => ApiResponse::MedicalRecordCreated { id, patient_id },
                Err(error) => failure(id, error),
            }
        }

        ApiCommand::CreatePrescription {
            id,
            patient_id,
            payload,
        } => match client.create_prescription(&payload).await {
            Ok(()) => ApiResponse::PrescriptionCreated { id, patient_id },
            Err(error) => failure(id, error),
        },

        ApiCommand::CreateProcedure {
            id,
            patient_id,
            payload,
        } => match client.create_procedure(&payload).await {
            Ok(()) => ApiResponse::ProcedureCreated { id, patient_id },
            Err(error) => failure(id, error),
        },

        ApiCommand::DownloadUnsigned {
            id,
            kind,
            document_id,
        } => {
            let result = async {
                let bytes = client.download_unsigned_pdf(kind, document_id).await?;
                let dir = download_dir();
                tokio::fs::create_dir_all(&dir)
                    .await
                    .context("falha ao criar a pasta de downloads")?;
                let path = dir.join(unsigned_filename(kind, document_id));
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("falha ao salvar {}", path.display()))?;
                Ok::<_, anyhow::Error>(path)
            }
            .await;
            match result {
                Ok(path) => ApiResponse::UnsignedDownloaded {
                    id,
                    kind,
                    document_id,
                    path,
                },
                Err(error) => failure(id, error),
            }
        }

        ApiCommand::UploadSigned {
            id,
            kind,
            document_id,
            patient_id,
            file_path,
        } => {
            let result = async {
                let bytes = tokio::fs::read(&file_path)
                    .await
                    .with_context(|| format!("não foi possível ler {}", file_path.display()))?;
                let filename = file_path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("signed.pdf")
                    .to_string();
                client
                    .upload_signed_document(kind, document_id, &filename, bytes)
                    .await
            }
            .await;
            match result {
                Ok(()) => ApiResponse::SignedUploaded {
                    id,
                    kind,
                    document_id,
                    patient_id,
                },
                Err(error) => failure(id, error),
            }
        }

        ApiCommand::DownloadSigned {
            id,
            kind,
            document_id,
        } => {
            let result = async {
                let (bytes, filename) = client.download_signed_document(kind, document_id).await?;
                let dir = download_dir();
                tokio::fs::create_dir_all(&dir)
                    .await
                    .context("falha ao criar a pasta de downloads")?;
                let path = dir.join(filename);
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("falha ao salvar {}", path.display()))?;
                Ok::<_, anyhow::Error>(path)
            }
            .await;
            match result {
                Ok(path) => ApiResponse::SignedDownloaded {
                    id,
                    kind,
                    document_id,
                    path,
                },
                Err(error) => failure(id, error),
            }
        }

        ApiCommand::FetchPatientDocuments { id } => match client.fetch_patient_documents().await {
            Ok(payload) => ApiResponse::PatientDocuments {
                id,
                payload: Box::new(payload),
            },
            Err(error) => failure(id, error),
        },

        ApiCommand::LookupCep { id, cep } => match client.lookup_cep(&cep).await {
            Ok(address) => ApiResponse::CepResolved { id, address },
            Err(error) => failure(id, error),
        },

        ApiCommand::FetchSncrNumbers { id } => match client.list_sncr_numbers().await {
            Ok(numbers) => ApiResponse::SncrNumbers { id, numbers },
            Err(error) => failure(id, error),
        },

        ApiCommand::AddSncrNumbers {
            id,
            numbers,
            prescription_type,
        } => {
            let submitted = numbers.lines().filter(|l| !l.trim().is_empty()).count();
            match client.add_sncr_numbers(&numbers, prescription_type).await {
                Ok(()) => ApiResponse::SncrAdded { id, submitted },
                Err(error) => failure(id, error),
            }
        }

        // Handled by the run loop before spawning
        ApiCommand::Shutdown => ApiResponse::Failure {
            id: 0,
            message: String::new(),
        },
    }
}

fn failure(id: u64, error: anyhow::Error) -> ApiResponse {
    tracing::warn!(id, error = %error, "API command failed");
    ApiResponse::Failure {
        id,
        message: error.to_string(),
    }
}
