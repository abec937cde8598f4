use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;
use crate::services::{
    account::{ChangePasswordError, InviteError},
    aso_launch::LaunchError,
    dates::DateError,
    member_import::ImportError,
};

#[derive(Error, Debug)]
pub enum AppError {
    /// A backend call failed; `message` is what the user is told
    #[error("{message}: {source}")]
    Backend {
        message: &'static str,
        #[source]
        source: BackendError,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// `map_err` adapter attaching a user-facing message to a backend failure
    pub fn backend(message: &'static str) -> impl FnOnce(BackendError) -> AppError {
        move |source| AppError::Backend { message, source }
    }
}

impl From<DateError> for AppError {
    fn from(e: DateError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<ImportError> for AppError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Backend(source) => AppError::Backend {
                message: "Erro ao importar integrantes",
                source,
            },
            other => AppError::Import(other.to_string()),
        }
    }
}

impl From<LaunchError> for AppError {
    fn from(e: LaunchError) -> Self {
        match e {
            LaunchError::MemberNotFound => AppError::NotFound(e.to_string()),
            LaunchError::Backend(source) => AppError::Backend {
                message: "Erro ao lançar ASO",
                source,
            },
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<ChangePasswordError> for AppError {
    fn from(e: ChangePasswordError) -> Self {
        match e {
            ChangePasswordError::Invalid(e) => AppError::Validation(e.to_string()),
            ChangePasswordError::Backend(source) => AppError::Backend {
                message: "Erro ao alterar senha",
                source,
            },
        }
    }
}

impl From<InviteError> for AppError {
    fn from(e: InviteError) -> Self {
        match e {
            InviteError::MissingEmail => AppError::Validation(e.to_string()),
            InviteError::Backend(source) => AppError::Backend {
                message: "Erro ao enviar convite",
                source,
            },
        }
    }
}

fn backend_response(message: &str, source: &BackendError) -> (StatusCode, String) {
    match source {
        BackendError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            "Sessão expirada. Faça login novamente.".to_string(),
        ),
        BackendError::InvalidCredentials(detail) => {
            (StatusCode::UNAUTHORIZED, format!("{}: {}", message, detail))
        }
        BackendError::ApiError { status, message: detail } if status.is_client_error() => {
            (StatusCode::BAD_REQUEST, format!("{}: {}", message, detail))
        }
        BackendError::ApiError { .. } | BackendError::HttpError(_) => {
            (StatusCode::BAD_GATEWAY, message.to_string())
        }
        BackendError::MissingFilter(_) => (StatusCode::INTERNAL_SERVER_ERROR, message.to_string()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_debug = format!("{:?}", self);

        let (status, error_message) = match &self {
            AppError::Backend { message, source } => backend_response(message, source),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Autenticação necessária. Faça login.".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Import(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro interno do servidor".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::warn!(error = %self, status = %status, "Request rejected");
        }

        let body = Json(json!({
            "error": error_debug,
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_backend_errors_map_to_status() {
        let expired = AppError::backend("Erro ao carregar integrantes")(BackendError::Unauthorized);
        assert_eq!(expired.into_response().status(), StatusCode::UNAUTHORIZED);

        let rejected = AppError::backend("Erro ao salvar")(BackendError::ApiError {
            status: reqwest::StatusCode::CONFLICT,
            message: "duplicate key value violates unique constraint".to_string(),
        });
        let response = rejected.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_of(response).await["message"],
            "Erro ao salvar: duplicate key value violates unique constraint"
        );

        let down = AppError::backend("Erro ao salvar")(BackendError::ApiError {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            message: "upstream".to_string(),
        });
        assert_eq!(down.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_service_errors_convert() {
        let response = AppError::from(ImportError::Empty).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await["message"], "Arquivo vazio ou inválido.");

        let response = AppError::from(LaunchError::MemberNotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(InviteError::MissingEmail).into_response();
        assert_eq!(body_of(response).await["message"], "Email é obrigatório");
    }
}
