//! Capability-token authentication
//!
//! A presented token resolves to admin scope (every wallet) or to one
//! cosigner of one wallet. Anything else is an authentication error.

use crate::multisig::error::MultisigError;
use crate::multisig::token::Token;
use crate::multisig::wallet::MultisigWallet;

/// Resolved caller scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Admin,
    Cosigner { wallet_id: String, cosigner_id: u8 },
}

impl Scope {
    pub fn is_admin(&self) -> bool {
        matches!(self, Scope::Admin)
    }

    /// Cosigner id, or `AuthenticationError` for admin callers
    pub fn cosigner_id(&self) -> Result<u8, MultisigError> {
        match self {
            Scope::Cosigner { cosigner_id, .. } => Ok(*cosigner_id),
            Scope::Admin => Err(MultisigError::AuthenticationError),
        }
    }
}

/// Token validator
#[derive(Clone)]
pub struct AuthGate {
    admin_token: Token,
}

impl AuthGate {
    pub fn new(admin_token: Token) -> Self {
        Self { admin_token }
    }

    /// Extract the token from an `Authorization: Bearer <hex>` value
    pub fn parse_bearer(header: &str) -> Option<&str> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        Some(token.trim())
    }

    /// Parse a presented token, failing `BadToken` when malformed
    pub fn parse_strict(token: &str) -> Result<Token, MultisigError> {
        Token::from_hex(token).ok_or(MultisigError::BadToken)
    }

    pub fn is_admin(&self, token: Option<&str>) -> bool {
        token.and_then(Token::from_hex) == Some(self.admin_token)
    }

    /// Admin scope or `AuthenticationError`
    pub fn require_admin(&self, token: Option<&str>) -> Result<Scope, MultisigError> {
        if self.is_admin(token) {
            Ok(Scope::Admin)
        } else {
            log::debug!("Rejected admin request");
            Err(MultisigError::AuthenticationError)
        }
    }

    /// Resolve the caller's scope against `wallet`
    pub fn authorize(
        &self,
        token: Option<&str>,
        wallet: &MultisigWallet,
    ) -> Result<Scope, MultisigError> {
        if self.is_admin(token) {
            return Ok(Scope::Admin);
        }

        self.require_cosigner(token, wallet)
    }

    /// Cosigner scope for `wallet`; admin is not accepted
    pub fn require_cosigner(
        &self,
        token: Option<&str>,
        wallet: &MultisigWallet,
    ) -> Result<Scope, MultisigError> {
        let cosigner = token
            .and_then(Token::from_hex)
            .and_then(|token| wallet.cosigner_by_token(&token))
            .ok_or_else(|| {
                log::debug!("Rejected token for wallet {}", wallet.id);
                MultisigError::AuthenticationError
            })?;

        Ok(Scope::Cosigner {
            wallet_id: wallet.id.clone(),
            cosigner_id: cosigner.id,
        })
    }
}
