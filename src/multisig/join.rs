//! Cosigner onboarding gated by the wallet's join key

use crate::multisig::auth::AuthGate;
use crate::multisig::cosigner::CosignerOptions;
use crate::multisig::error::MultisigError;
use crate::multisig::wallet::MultisigWallet;

/// Outcome of a successful join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub cosigner_id: u8,
    /// The join completed the cosigner set
    pub initialized: bool,
}

/// Check a presented join key without touching the wallet
///
/// The key is checked first: only a holder of the current or retired key
/// learns that the wallet is full.
pub fn check_join(wallet: &MultisigWallet, join_key: &str) -> Result<(), MultisigError> {
    let presented = Some(AuthGate::parse_strict(join_key)?);

    if presented == wallet.join_key {
        if wallet.is_full() {
            return Err(MultisigError::WalletFull);
        }
        return Ok(());
    }

    if wallet.initialized && presented == wallet.retired_join_key {
        return Err(MultisigError::WalletFull);
    }

    Err(MultisigError::BadToken)
}

/// Validate the join key and append the cosigner
///
/// Retires the join key when the wallet becomes full.
pub fn admit(
    wallet: &mut MultisigWallet,
    join_key: &str,
    options: CosignerOptions,
) -> Result<Admission, MultisigError> {
    check_join(wallet, join_key)?;

    let cosigner_id = wallet.add_cosigner(options)?.id;
    let initialized = wallet.refresh_initialized();

    Ok(Admission {
        cosigner_id,
        initialized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::multisig::token::Token;
    use crate::multisig::wallet::tests::empty_wallet;

    fn options(name: &str) -> CosignerOptions {
        CosignerOptions {
            name: name.to_string(),
            key: KeyPair::generate().public_key_hex(),
            ..Default::default()
        }
    }

    #[test]
    fn test_join_until_initialized() {
        let mut wallet = empty_wallet(2, 2);
        let key = wallet.join_key.unwrap().to_hex();
        wallet.add_cosigner(options("cosigner1")).unwrap();

        let admission = admit(&mut wallet, &key, options("cosigner2")).unwrap();
        assert_eq!(admission.cosigner_id, 1);
        assert!(admission.initialized);
        assert!(wallet.initialized);
        assert!(wallet.join_key.is_none());

        assert!(matches!(
            admit(&mut wallet, &key, options("cosigner3")),
            Err(MultisigError::WalletFull)
        ));
    }

    #[test]
    fn test_wrong_key_does_not_mutate() {
        let mut wallet = empty_wallet(2, 3);
        wallet.add_cosigner(options("cosigner1")).unwrap();

        let wrong = Token::generate().to_hex();
        for key in [wrong.as_str(), "", "not-hex"] {
            assert!(matches!(
                admit(&mut wallet, key, options("mallory")),
                Err(MultisigError::BadToken)
            ));
        }
        assert_eq!(wallet.cosigners.len(), 1);
    }

    #[test]
    fn test_full_wallet_hidden_from_strangers() {
        let mut wallet = empty_wallet(1, 1);
        let key = wallet.join_key.unwrap().to_hex();
        admit(&mut wallet, &key, options("cosigner1")).unwrap();
        assert!(wallet.initialized);

        // Without the key, a full wallet looks like any other
        let stranger = Token::generate().to_hex();
        assert!(matches!(
            check_join(&wallet, &stranger),
            Err(MultisigError::BadToken)
        ));
        assert!(matches!(
            check_join(&wallet, "not-hex"),
            Err(MultisigError::BadToken)
        ));
        assert!(matches!(
            check_join(&wallet, &key),
            Err(MultisigError::WalletFull)
        ));
    }

    #[test]
    fn test_partial_join_keeps_key() {
        let mut wallet = empty_wallet(2, 3);
        let key = wallet.join_key.unwrap().to_hex();
        wallet.add_cosigner(options("cosigner1")).unwrap();

        let admission = admit(&mut wallet, &key, options("cosigner2")).unwrap();
        assert!(!admission.initialized);
        assert!(wallet.join_key.is_some());
        assert!(check_join(&wallet, &key).is_ok());
    }
}
