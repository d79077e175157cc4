//! Non-hardened child key derivation and shared address generation
//!
//! Each cosigner registers one account key. Per-address keys are derived
//! from it with an additive tweak:
//!
//! `child = parent + SHA256(parent || branch || index) * G`
//!
//! so anyone holding the account public key can compute every child public
//! key, while only the holder of the account secret can sign for them.

use secp256k1::{PublicKey, Scalar, Secp256k1, SecretKey};

use super::hash::{double_sha256, hash160, sha256};
use super::keys::{KeyError, KeyPair};

/// P2SH version byte (addresses start with '3')
pub const SCRIPT_ADDRESS_VERSION: u8 = 0x05;

fn tweak(parent: &PublicKey, branch: u32, index: u32) -> Result<Scalar, KeyError> {
    let mut data = parent.serialize().to_vec();
    data.extend_from_slice(&branch.to_be_bytes());
    data.extend_from_slice(&index.to_be_bytes());

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&sha256(&data));
    Scalar::from_be_bytes(bytes).map_err(|_| KeyError::DerivationFailed { branch, index })
}

/// Derive the child public key at `branch/index`
pub fn derive_public_key(
    parent: &PublicKey,
    branch: u32,
    index: u32,
) -> Result<PublicKey, KeyError> {
    let secp = Secp256k1::verification_only();
    let tweak = tweak(parent, branch, index)?;
    (*parent)
        .add_exp_tweak(&secp, &tweak)
        .map_err(|_| KeyError::DerivationFailed { branch, index })
}

/// Derive the child secret key at `branch/index`
pub fn derive_secret_key(
    parent: &SecretKey,
    branch: u32,
    index: u32,
) -> Result<SecretKey, KeyError> {
    let secp = Secp256k1::signing_only();
    let public = PublicKey::from_secret_key(&secp, parent);
    let tweak = tweak(&public, branch, index)?;
    (*parent)
        .add_tweak(&tweak)
        .map_err(|_| KeyError::DerivationFailed { branch, index })
}

/// Derive the child key pair at `branch/index`
pub fn derive_key_pair(parent: &KeyPair, branch: u32, index: u32) -> Result<KeyPair, KeyError> {
    let secret = derive_secret_key(&parent.secret_key, branch, index)?;
    Ok(KeyPair::from_secret_key(secret))
}

/// Sort keys by their compressed encoding (BIP-67 style)
pub fn sorted_keys(keys: &[PublicKey]) -> Vec<PublicKey> {
    let mut sorted = keys.to_vec();
    sorted.sort_by_key(|k| k.serialize());
    sorted
}

/// Redeem script data: `m || sorted pubkeys || n`
pub fn redeem_script(m: u8, keys: &[PublicKey]) -> Vec<u8> {
    let mut script = vec![m];
    for key in sorted_keys(keys) {
        script.extend_from_slice(&key.serialize());
    }
    script.push(keys.len() as u8);
    script
}

/// Generate the P2SH-style shared address for an m-of-n key set
///
/// Address = Base58Check(version || RIPEMD160(SHA256(redeem_script)))
pub fn multisig_address(m: u8, keys: &[PublicKey]) -> String {
    let mut address_bytes = vec![SCRIPT_ADDRESS_VERSION];
    address_bytes.extend_from_slice(&hash160(&redeem_script(m, keys)));

    let checksum = double_sha256(&address_bytes);
    address_bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(address_bytes).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_and_secret_derivation_agree() {
        let account = KeyPair::generate();

        let child = derive_key_pair(&account, 0, 7).unwrap();
        let child_public = derive_public_key(&account.public_key, 0, 7).unwrap();

        assert_eq!(child.public_key, child_public);
        assert_ne!(child_public, account.public_key);
    }

    #[test]
    fn test_paths_produce_distinct_keys() {
        let account = KeyPair::generate();
        let receive = derive_public_key(&account.public_key, 0, 1).unwrap();
        let change = derive_public_key(&account.public_key, 1, 1).unwrap();
        let next = derive_public_key(&account.public_key, 0, 2).unwrap();

        assert_ne!(receive, change);
        assert_ne!(receive, next);
    }

    #[test]
    fn test_address_is_order_independent() {
        let a = KeyPair::generate().public_key;
        let b = KeyPair::generate().public_key;

        let first = multisig_address(2, &[a, b]);
        let second = multisig_address(2, &[b, a]);

        assert_eq!(first, second);
        assert!(first.starts_with('3'));
        assert_ne!(first, multisig_address(1, &[a, b]));
    }
}
