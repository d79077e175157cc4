//! Signature validation and merging
//!
//! Each cosigner submits one compact signature per input, made with the
//! child of their account key at the input's path. Valid signatures land in
//! the cosigner's slot of every input.

use crate::core::Transaction;
use crate::crypto::{
    derive_key_pair, derive_public_key, redeem_script, sorted_keys, verify_signature, KeyError,
    KeyPair,
};
use crate::multisig::error::MultisigError;
use crate::multisig::wallet::MultisigWallet;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};

/// Redeem script view of one input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputScript {
    pub m: u8,
    /// Sorted derived public keys (hex)
    pub keys: Vec<String>,
    /// Hex redeem script
    pub script: String,
}

/// Validates cosigner signatures against a wallet's keys
pub struct SignatureAggregator<'a> {
    wallet: &'a MultisigWallet,
}

impl<'a> SignatureAggregator<'a> {
    pub fn new(wallet: &'a MultisigWallet) -> Self {
        Self { wallet }
    }

    /// Verify one signature per input for `cosigner_id`
    ///
    /// Returns the decoded signatures in input order.
    pub fn verify(
        &self,
        tx: &Transaction,
        cosigner_id: u8,
        signatures: &[String],
    ) -> Result<Vec<Vec<u8>>, MultisigError> {
        let account = self
            .wallet
            .cosigner(cosigner_id)
            .ok_or(MultisigError::AuthenticationError)?
            .public_key()?;

        if signatures.len() != tx.inputs.len() {
            return Err(MultisigError::InvalidSignature);
        }

        tx.inputs
            .iter()
            .zip(signatures)
            .enumerate()
            .map(|(i, (input, signature))| {
                let bytes = hex::decode(signature).map_err(|_| MultisigError::InvalidSignature)?;
                let child = derive_public_key(&account, input.path.branch, input.path.index)
                    .map_err(|_| MultisigError::InvalidSignature)?;
                let sighash = tx.sighash(i).map_err(|_| MultisigError::InvalidSignature)?;

                match verify_signature(&child, &sighash, &bytes) {
                    Ok(true) => Ok(bytes),
                    _ => Err(MultisigError::InvalidSignature),
                }
            })
            .collect()
    }

    /// Verify and merge a cosigner's signatures
    ///
    /// The transaction is untouched unless every signature is valid.
    pub fn apply(
        &self,
        tx: &mut Transaction,
        cosigner_id: u8,
        signatures: &[String],
    ) -> Result<(), MultisigError> {
        let verified = self.verify(tx, cosigner_id, signatures)?;
        let slot = cosigner_id as usize;

        for (input, signature) in tx.inputs.iter_mut().zip(verified) {
            if input.signatures.len() <= slot {
                input.signatures.resize(self.wallet.n as usize, None);
            }
            input.signatures[slot] = Some(hex::encode(signature));
        }

        Ok(())
    }

    /// Check every input carries the threshold of signatures
    pub fn finalize(&self, tx: &Transaction) -> Result<(), MultisigError> {
        if !tx.is_fully_signed(self.wallet.m) {
            return Err(MultisigError::InvalidState(format!(
                "transaction needs {} signatures per input",
                self.wallet.m
            )));
        }
        Ok(())
    }

    /// Redeem script per input
    pub fn scripts(&self, tx: &Transaction) -> Result<Vec<InputScript>, MultisigError> {
        let accounts = self
            .wallet
            .cosigners
            .iter()
            .map(|c| c.public_key())
            .collect::<Result<Vec<PublicKey>, _>>()?;

        tx.inputs
            .iter()
            .map(|input| {
                let children = accounts
                    .iter()
                    .map(|key| derive_public_key(key, input.path.branch, input.path.index))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| MultisigError::InvalidOptions(e.to_string()))?;

                Ok(InputScript {
                    m: self.wallet.m,
                    keys: sorted_keys(&children)
                        .iter()
                        .map(|k| hex::encode(k.serialize()))
                        .collect(),
                    script: hex::encode(redeem_script(self.wallet.m, &children)),
                })
            })
            .collect()
    }
}

/// Sign every input with children of `account`
///
/// Produces the signature vector a cosigner submits when approving.
pub fn sign_inputs(tx: &Transaction, account: &KeyPair) -> Result<Vec<String>, KeyError> {
    tx.inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let child = derive_key_pair(account, input.path.branch, input.path.index)?;
            let sighash = tx
                .sighash(i)
                .map_err(|_| KeyError::InvalidSignature)?;
            Ok(hex::encode(child.sign(&sighash)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Coin, KeyPath, Outpoint, TxInput, TxOutput};
    use crate::multisig::cosigner::CosignerOptions;
    use crate::multisig::wallet::tests::empty_wallet;

    fn setup(m: u8, n: u8) -> (MultisigWallet, Vec<KeyPair>, Transaction) {
        let mut wallet = empty_wallet(m, n);
        let keys: Vec<KeyPair> = (0..n).map(|_| KeyPair::generate()).collect();
        for (i, key) in keys.iter().enumerate() {
            wallet
                .add_cosigner(CosignerOptions {
                    name: format!("cosigner{}", i + 1),
                    key: key.public_key_hex(),
                    ..Default::default()
                })
                .unwrap();
        }

        let inputs = (0..2)
            .map(|i| {
                let coin = Coin {
                    outpoint: Outpoint::new("cc".repeat(32), i),
                    value: 30_000,
                    address: "3shared".to_string(),
                    path: KeyPath::receive(i + 1),
                    height: Some(1),
                };
                TxInput::unsigned(&coin, n)
            })
            .collect();
        let tx = Transaction::new(
            inputs,
            vec![TxOutput {
                address: "1dest".to_string(),
                value: 50_000,
            }],
        );

        (wallet, keys, tx)
    }

    #[test]
    fn test_apply_valid_signatures() {
        let (wallet, keys, mut tx) = setup(2, 3);
        let aggregator = SignatureAggregator::new(&wallet);

        let signatures = sign_inputs(&tx, &keys[1]).unwrap();
        aggregator.apply(&mut tx, 1, &signatures).unwrap();

        for input in &tx.inputs {
            assert!(input.signatures[1].is_some());
            assert_eq!(input.signature_count(), 1);
        }
        assert!(aggregator.finalize(&tx).is_err());

        let signatures = sign_inputs(&tx, &keys[2]).unwrap();
        aggregator.apply(&mut tx, 2, &signatures).unwrap();
        assert!(aggregator.finalize(&tx).is_ok());
    }

    #[test]
    fn test_wrong_key_leaves_tx_untouched() {
        let (wallet, keys, mut tx) = setup(2, 2);
        let aggregator = SignatureAggregator::new(&wallet);
        let before = tx.clone();

        // Cosigner 0's signatures submitted as cosigner 1
        let signatures = sign_inputs(&tx, &keys[0]).unwrap();
        assert!(matches!(
            aggregator.apply(&mut tx, 1, &signatures),
            Err(MultisigError::InvalidSignature)
        ));
        assert_eq!(tx, before);
    }

    #[test]
    fn test_malformed_signatures() {
        let (wallet, keys, mut tx) = setup(2, 2);
        let aggregator = SignatureAggregator::new(&wallet);

        let mut signatures = sign_inputs(&tx, &keys[0]).unwrap();
        signatures.pop();
        assert!(aggregator.apply(&mut tx, 0, &signatures).is_err());

        let garbage = vec!["zz".to_string(), "00".to_string()];
        assert!(aggregator.apply(&mut tx, 0, &garbage).is_err());

        // Good first input, bad second
        let mut signatures = sign_inputs(&tx, &keys[0]).unwrap();
        signatures[1] = signatures[0].clone();
        assert!(aggregator.apply(&mut tx, 0, &signatures).is_err());
        assert_eq!(tx.inputs[0].signature_count(), 0);
    }

    #[test]
    fn test_scripts_per_input() {
        let (wallet, _, tx) = setup(2, 3);
        let scripts = SignatureAggregator::new(&wallet).scripts(&tx).unwrap();

        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].m, 2);
        assert_eq!(scripts[0].keys.len(), 3);
        assert_ne!(scripts[0].keys, scripts[1].keys);

        let mut sorted = scripts[0].keys.clone();
        sorted.sort();
        assert_eq!(sorted, scripts[0].keys);
    }
}
