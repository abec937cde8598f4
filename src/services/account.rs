use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::{BackendClient, BackendError};
use crate::services::audit::{actions, log_action};

pub const INVITE_FUNCTION: &str = "invite-user";
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Error, Debug, PartialEq)]
pub enum PasswordError {
    #[error("Por favor, preencha todos os campos.")]
    Missing,

    #[error("As senhas não coincidem.")]
    Mismatch,

    #[error("A nova senha deve conter no mínimo 8 caracteres, incluindo letras e números.")]
    TooWeak,
}

#[derive(Error, Debug)]
pub enum InviteError {
    #[error("Email é obrigatório")]
    MissingEmail,

    #[error("Erro ao enviar convite: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordChange {
    pub password: String,
    pub confirmation: String,
}

impl PasswordChange {
    pub fn validate(&self) -> Result<(), PasswordError> {
        if self.password.is_empty() || self.confirmation.is_empty() {
            return Err(PasswordError::Missing);
        }
        if self.password != self.confirmation {
            return Err(PasswordError::Mismatch);
        }

        let has_letter = self.password.chars().any(char::is_alphabetic);
        let has_digit = self.password.chars().any(|c| c.is_ascii_digit());
        if self.password.chars().count() < MIN_PASSWORD_LEN || !has_letter || !has_digit {
            return Err(PasswordError::TooWeak);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invite {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl Invite {
    fn normalized(&self) -> Result<Self, InviteError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(InviteError::MissingEmail);
        }
        Ok(Self {
            email: email.to_string(),
            name: self.name.trim().to_string(),
        })
    }
}

/// Validates and sends the new password for the user behind `token`
pub async fn change_password(
    backend: &BackendClient,
    token: &str,
    change: &PasswordChange,
) -> Result<(), ChangePasswordError> {
    change.validate()?;
    backend.update_password(token, &change.password).await?;

    tracing::info!("Password changed");
    log_action(backend, token, actions::PASSWORD_CHANGE, "", None).await;
    Ok(())
}

#[derive(Error, Debug)]
pub enum ChangePasswordError {
    #[error(transparent)]
    Invalid(#[from] PasswordError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Asks the invite function to create the account and mail the invitation
pub async fn invite_user(
    backend: &BackendClient,
    token: &str,
    invite: &Invite,
) -> Result<serde_json::Value, InviteError> {
    let invite = invite.normalized()?;
    let response: serde_json::Value = backend.invoke(token, INVITE_FUNCTION, &invite).await?;

    tracing::info!(email = %invite.email, "User invited");
    log_action(backend, token, actions::USER_INVITE, &invite.email, None).await;
    Ok(response)
}
