//! Sign-in, sign-up, and federated authentication flows.
//!
//! Every failure surfaced to the user is one fixed human-readable string
//! derived from the provider's error code; unrecognized provider errors are
//! logged and collapsed into the generic message for the attempted flow.
//! Nothing here is retried automatically.

use crate::{
    backend::contracts::{AuthGateway, AuthGatewayError, FederatedFlow},
    domain::identity::Identity,
};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const EMAIL_IN_USE: &str = "Email already in use";
pub const WEAK_PASSWORD: &str = "Password should be at least 6 characters";
pub const SIGN_IN_FAILED: &str = "Failed to sign in. Please try again.";
pub const SIGN_UP_FAILED: &str = "Failed to create account. Please try again.";
pub const POPUP_BLOCKED_HELP: &str =
    "Failed to sign in. Please check your popup blocker settings.";

const AUTH_SIGN_IN_FAILED: &str = "AUTH_SIGN_IN_FAILED";
const AUTH_SIGN_UP_FAILED: &str = "AUTH_SIGN_UP_FAILED";
const AUTH_FEDERATED_FAILED: &str = "AUTH_FEDERATED_FAILED";

pub fn sign_in_with_password(
    gateway: &dyn AuthGateway,
    email: &str,
    password: &str,
) -> Result<Identity, &'static str> {
    gateway
        .sign_in_with_password(email, password)
        .map_err(|error| {
            tracing::warn!(code = AUTH_SIGN_IN_FAILED, error = %error, "email sign-in failed");
            sign_in_error_message(&error)
        })
}

pub fn sign_up_with_password(
    gateway: &dyn AuthGateway,
    email: &str,
    password: &str,
) -> Result<Identity, &'static str> {
    gateway
        .sign_up_with_password(email, password)
        .map_err(|error| {
            tracing::warn!(code = AUTH_SIGN_UP_FAILED, error = %error, "sign-up failed");
            sign_up_error_message(&error)
        })
}

/// Interactive federated sign-in: the popup flow first, then the full-page
/// redirect flow if the popup is blocked.
pub fn sign_in_federated(gateway: &dyn AuthGateway) -> Result<Identity, &'static str> {
    match gateway.sign_in_federated(FederatedFlow::Popup) {
        Ok(identity) => Ok(identity),
        Err(AuthGatewayError::PopupBlocked) => gateway
            .sign_in_federated(FederatedFlow::Redirect)
            .map_err(|error| {
                tracing::warn!(
                    code = AUTH_FEDERATED_FAILED,
                    error = %error,
                    "federated redirect fallback failed"
                );
                POPUP_BLOCKED_HELP
            }),
        Err(error) => {
            tracing::warn!(code = AUTH_FEDERATED_FAILED, error = %error, "federated sign-in failed");
            Err(SIGN_IN_FAILED)
        }
    }
}

fn sign_in_error_message(error: &AuthGatewayError) -> &'static str {
    match error {
        AuthGatewayError::InvalidCredential => INVALID_CREDENTIALS,
        _ => SIGN_IN_FAILED,
    }
}

fn sign_up_error_message(error: &AuthGatewayError) -> &'static str {
    match error {
        AuthGatewayError::EmailInUse => EMAIL_IN_USE,
        AuthGatewayError::WeakPassword => WEAK_PASSWORD,
        _ => SIGN_UP_FAILED,
    }
}
