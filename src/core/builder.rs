use crate::core::{
    Ledger, Transaction, TransactionKind, Utxo, UtxoRef, COINBASE_SENDER, SYSTEM_SENTINEL,
};
use crate::error::{LedgerError, Result};
use crate::utils::current_timestamp;
use crate::wallet::{canonical_payload, derive_account_id, sign, verify, AccountRegistry};
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Outputs picked to cover an amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    pub selected: Vec<Utxo>,
    pub total: u64,
}

impl CoinSelection {
    pub fn change(&self, amount: u64) -> u64 {
        self.total.saturating_sub(amount)
    }

    fn outpoints(&self) -> Vec<UtxoRef> {
        self.selected.iter().map(Utxo::outpoint).collect()
    }
}

/// Assembles and checks transactions against the committed UTXO set.
pub struct TransactionBuilder {
    ledger: Arc<Ledger>,
    registry: Arc<dyn AccountRegistry>,
    pool_account: String,
}

impl TransactionBuilder {
    pub fn new(
        ledger: Arc<Ledger>,
        registry: Arc<dyn AccountRegistry>,
        pool_account: &str,
    ) -> TransactionBuilder {
        TransactionBuilder {
            ledger,
            registry,
            pool_account: pool_account.to_string(),
        }
    }

    pub fn pool_account(&self) -> &str {
        &self.pool_account
    }

    /// Greedy selection, largest output first. Equal amounts are ordered by
    /// (origin tx, index) so the choice is deterministic.
    pub fn select_unspent_outputs(&self, account_id: &str, amount: u64) -> Result<CoinSelection> {
        let mut candidates = self.ledger.unspent_outputs(account_id);
        candidates.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.origin_tx.cmp(&b.origin_tx))
                .then_with(|| a.index.cmp(&b.index))
        });

        let mut selection = CoinSelection {
            selected: Vec::new(),
            total: 0,
        };
        for utxo in &candidates {
            if selection.total >= amount {
                break;
            }
            selection.total = selection.total.saturating_add(utxo.amount);
            selection.selected.push(utxo.clone());
        }

        if selection.total < amount {
            return Err(LedgerError::InsufficientBalance {
                required: amount,
                available: selection.total,
            });
        }
        Ok(selection)
    }

    /// Builds and signs a transfer. Output 0 pays the receiver, output 1
    /// returns change to the sender when the selection overshoots.
    pub fn build_transfer(
        &self,
        sender_id: &str,
        receiver_id: &str,
        amount: u64,
        note: &str,
        public_key: &str,
        private_key: &str,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidTransaction(
                "Amount must be positive".to_string(),
            ));
        }
        for account in [sender_id, receiver_id] {
            if !self.registry.contains(account) {
                return Err(LedgerError::AccountNotFound(account.to_string()));
            }
        }

        let selection = self.select_unspent_outputs(sender_id, amount)?;
        let id = format!("tx-{}", Uuid::new_v4());
        let timestamp = current_timestamp()?;

        let mut outputs = vec![Utxo::new(&id, 0, receiver_id, amount)];
        let change = selection.change(amount);
        if change > 0 {
            outputs.push(Utxo::new(&id, 1, sender_id, change));
        }

        let payload = canonical_payload(sender_id, receiver_id, amount, timestamp, note)?;
        let signature = sign(private_key, &payload)?;

        debug!(
            "Built transfer {id}: {} inputs, {amount} to {receiver_id}, change {change}",
            selection.selected.len()
        );
        Ok(Transaction {
            id,
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            amount,
            note: note.to_string(),
            timestamp,
            public_key: public_key.to_lowercase(),
            signature,
            inputs: selection.outpoints(),
            outputs,
            kind: TransactionKind::Transfer,
        })
    }

    /// Checks a user transfer before it is queued, in order: signature,
    /// sender identity, inputs, then value conservation.
    ///
    /// Reward and levy transactions are authored by the ledger and are never
    /// routed through here.
    pub fn validate(&self, tx: &Transaction) -> Result<()> {
        if tx.is_system() || tx.sender_id == COINBASE_SENDER {
            return Err(LedgerError::InvalidTransaction(format!(
                "{} transactions cannot be submitted",
                tx.kind
            )));
        }

        let payload = tx.signing_payload()?;
        if !verify(&tx.public_key, &payload, &tx.signature) {
            return Err(LedgerError::SignatureInvalid(format!(
                "signature on {} does not verify",
                tx.id
            )));
        }

        let derived = derive_account_id(&tx.public_key)?;
        if derived != tx.sender_id {
            return Err(LedgerError::IdentityMismatch {
                declared: tx.sender_id.clone(),
                derived,
            });
        }

        let input_total = self.ledger.inspect_utxos(|utxos| -> Result<u64> {
            let mut seen = HashSet::new();
            let mut total = 0u64;
            for input in &tx.inputs {
                if !seen.insert(input) {
                    return Err(LedgerError::DoubleSpend(format!(
                        "UTXO {input} listed twice"
                    )));
                }
                let utxo = utxos
                    .get(input)
                    .ok_or_else(|| LedgerError::UtxoNotFound(input.to_string()))?;
                if utxo.spent {
                    return Err(LedgerError::DoubleSpend(format!(
                        "UTXO {input} already spent"
                    )));
                }
                if utxo.owner != tx.sender_id {
                    return Err(LedgerError::DoubleSpend(format!(
                        "UTXO {input} is not owned by {}",
                        tx.sender_id
                    )));
                }
                total = total.checked_add(utxo.amount).ok_or_else(|| {
                    LedgerError::InvalidTransaction("Input value overflow".to_string())
                })?;
            }
            Ok(total)
        })?;

        let output_total = tx.output_total()?;
        if input_total != output_total {
            return Err(LedgerError::AmountMismatch {
                inputs: input_total,
                outputs: output_total,
            });
        }

        // The signature covers (receiver, amount) but not the outputs, so the
        // outputs must agree with the signed fields.
        let pays_receiver = tx
            .outputs
            .first()
            .is_some_and(|out| out.owner == tx.receiver_id && out.amount == tx.amount);
        let rest_is_change = tx.outputs.iter().skip(1).all(|out| out.owner == tx.sender_id);
        if !pays_receiver || !rest_is_change {
            return Err(LedgerError::InvalidTransaction(
                "outputs do not match the signed transfer".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds a levy deduction moving `levy_amount` from `account_id` to the
    /// pool account.
    ///
    /// Unlike a transfer, `sender_id` is the debited holder while the public
    /// key and signature are the `"system"` sentinel: the ledger authors the
    /// deduction and the holder never signs it.
    pub fn build_levy(&self, account_id: &str, levy_amount: u64) -> Result<Transaction> {
        if levy_amount == 0 {
            return Err(LedgerError::InvalidTransaction(
                "Levy amount must be positive".to_string(),
            ));
        }
        if account_id == self.pool_account {
            return Err(LedgerError::InvalidTransaction(
                "The pool account is not levied".to_string(),
            ));
        }

        let selection = self.select_unspent_outputs(account_id, levy_amount)?;
        let id = format!("levy-{}", Uuid::new_v4());

        let mut outputs = vec![Utxo::new(&id, 0, &self.pool_account, levy_amount)];
        let change = selection.change(levy_amount);
        if change > 0 {
            outputs.push(Utxo::new(&id, 1, account_id, change));
        }

        info!("Built levy {id}: {levy_amount} from {account_id}");
        Ok(Transaction {
            id,
            sender_id: account_id.to_string(),
            receiver_id: self.pool_account.clone(),
            amount: levy_amount,
            note: "Periodic levy deduction".to_string(),
            timestamp: current_timestamp()?,
            public_key: SYSTEM_SENTINEL.to_string(),
            signature: SYSTEM_SENTINEL.to_string(),
            inputs: selection.outpoints(),
            outputs,
            kind: TransactionKind::Levy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MiningConfig, MiningPolicy};
    use crate::storage::UtxoSet;
    use crate::wallet::{InMemoryRegistry, KeyPair};

    struct Fixture {
        builder: TransactionBuilder,
        ledger: Arc<Ledger>,
        alice: KeyPair,
        alice_id: String,
        bob_id: String,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(Ledger::with_genesis_timestamp(
            &MiningConfig {
                difficulty: 1,
                max_iterations: 100_000,
                reward: 50,
                policy: MiningPolicy::Strict,
            },
            1_700_000_000,
        ));
        let registry = Arc::new(InMemoryRegistry::new());
        let alice = KeyPair::generate().unwrap();
        let bob = KeyPair::generate().unwrap();
        let alice_id = registry.register(&alice.public_key, None).unwrap().account_id;
        let bob_id = registry.register(&bob.public_key, None).unwrap().account_id;

        let builder = TransactionBuilder::new(ledger.clone(), registry, "LEVY_POOL");
        Fixture {
            builder,
            ledger,
            alice,
            alice_id,
            bob_id,
        }
    }

    fn fund(ledger: &Ledger, owner: &str, outputs: &[(&str, u64)]) {
        ledger.restore_utxos(
            outputs
                .iter()
                .map(|(origin, amount)| Utxo::new(origin, 0, owner, *amount))
                .collect(),
        );
    }

    fn transfer(f: &Fixture, amount: u64) -> Result<Transaction> {
        f.builder.build_transfer(
            &f.alice_id,
            &f.bob_id,
            amount,
            "rent",
            &f.alice.public_key,
            &f.alice.private_key,
        )
    }

    #[test]
    fn test_selection_prefers_largest_outputs() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 70), ("b", 30), ("c", 10)]);

        let selection = f.builder.select_unspent_outputs(&f.alice_id, 65).unwrap();
        assert_eq!(selection.total, 70);
        assert_eq!(selection.selected.len(), 1);
        assert_eq!(selection.selected[0].origin_tx, "a");

        let selection = f.builder.select_unspent_outputs(&f.alice_id, 95).unwrap();
        assert_eq!(selection.total, 100);
        assert_eq!(selection.change(95), 5);
    }

    #[test]
    fn test_selection_tie_break_is_deterministic() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("b", 10), ("a", 10), ("c", 10)]);
        let selection = f.builder.select_unspent_outputs(&f.alice_id, 15).unwrap();
        let origins: Vec<&str> = selection.selected.iter().map(|u| u.origin_tx.as_str()).collect();
        assert_eq!(origins, vec!["a", "b"]);
    }

    #[test]
    fn test_selection_insufficient_balance() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 30), ("b", 10)]);
        assert_eq!(
            f.builder.select_unspent_outputs(&f.alice_id, 65),
            Err(LedgerError::InsufficientBalance {
                required: 65,
                available: 40
            })
        );
    }

    #[test]
    fn test_transfer_outputs_and_change() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 70), ("b", 30), ("c", 10)]);

        let tx = transfer(&f, 65).unwrap();
        assert!(tx.id.starts_with("tx-"));
        assert_eq!(tx.inputs, vec![UtxoRef::new("a", 0)]);
        let outs: Vec<(String, u64)> = tx.outputs.iter().map(|o| (o.owner.clone(), o.amount)).collect();
        assert_eq!(outs, vec![(f.bob_id.clone(), 65), (f.alice_id.clone(), 5)]);
        assert_eq!(tx.outputs[1].index, 1);
        assert!(f.builder.validate(&tx).is_ok());
    }

    #[test]
    fn test_exact_transfer_has_no_change_output() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 40)]);
        let tx = transfer(&f, 40).unwrap();
        assert_eq!(tx.outputs.len(), 1);
        assert!(f.builder.validate(&tx).is_ok());
    }

    #[test]
    fn test_transfer_rejects_zero_and_unknown_accounts() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 40)]);
        assert!(matches!(transfer(&f, 0), Err(LedgerError::InvalidTransaction(_))));

        let err = f
            .builder
            .build_transfer(
                &f.alice_id,
                "nobody",
                5,
                "",
                &f.alice.public_key,
                &f.alice.private_key,
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::AccountNotFound("nobody".to_string()));
    }

    #[test]
    fn test_validate_rejects_tampered_amount() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 70)]);
        let mut tx = transfer(&f, 65).unwrap();
        tx.amount = 66;
        assert!(matches!(f.builder.validate(&tx), Err(LedgerError::SignatureInvalid(_))));
    }

    #[test]
    fn test_validate_rejects_foreign_key() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 70)]);
        let mallory = KeyPair::generate().unwrap();

        // Signed by mallory, claiming to be alice
        let tx = f
            .builder
            .build_transfer(
                &f.alice_id,
                &f.bob_id,
                10,
                "",
                &mallory.public_key,
                &mallory.private_key,
            )
            .unwrap();
        match f.builder.validate(&tx) {
            Err(LedgerError::IdentityMismatch { declared, derived }) => {
                assert_eq!(declared, f.alice_id);
                assert_eq!(derived, mallory.account_id().unwrap());
            }
            other => panic!("expected IdentityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_spent_and_duplicate_inputs() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 70)]);
        let tx = transfer(&f, 65).unwrap();

        let mut doubled = tx.clone();
        doubled.inputs.push(doubled.inputs[0].clone());
        assert!(matches!(f.builder.validate(&doubled), Err(LedgerError::DoubleSpend(_))));

        f.ledger.append_pending(tx.clone());
        f.ledger.seal("miner").unwrap();
        assert!(matches!(f.builder.validate(&tx), Err(LedgerError::DoubleSpend(_))));
    }

    #[test]
    fn test_validate_rejects_missing_input_and_value_creation() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 70)]);
        let tx = transfer(&f, 65).unwrap();

        let mut missing = tx.clone();
        missing.inputs = vec![UtxoRef::new("ghost", 0)];
        assert_eq!(
            f.builder.validate(&missing),
            Err(LedgerError::UtxoNotFound("ghost:0".to_string()))
        );

        let mut inflated = tx.clone();
        inflated.outputs[1].amount = 500;
        assert_eq!(
            f.builder.validate(&inflated),
            Err(LedgerError::AmountMismatch {
                inputs: 70,
                outputs: 565
            })
        );

        let mut redirected = tx;
        redirected.outputs[0].owner = redirected.outputs[1].owner.clone();
        assert!(matches!(
            f.builder.validate(&redirected),
            Err(LedgerError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_validate_rejects_misowned_input() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 70)]);
        fund(&f.ledger, &f.bob_id, &[("b", 70)]);
        let mut tx = transfer(&f, 65).unwrap();
        tx.inputs = vec![UtxoRef::new("b", 0)];
        match f.builder.validate(&tx) {
            Err(LedgerError::DoubleSpend(msg)) => assert!(msg.contains("not owned by")),
            other => panic!("expected DoubleSpend, got {other:?}"),
        }
    }

    #[test]
    fn test_build_levy_is_self_authorizing() {
        let f = fixture();
        fund(&f.ledger, &f.alice_id, &[("a", 1000)]);

        let tx = f.builder.build_levy(&f.alice_id, 25).unwrap();
        assert!(tx.id.starts_with("levy-"));
        assert_eq!(tx.kind, TransactionKind::Levy);
        assert_eq!(tx.sender_id, f.alice_id);
        assert_eq!(tx.receiver_id, "LEVY_POOL");
        assert_eq!(tx.public_key, "system");
        assert_eq!(tx.signature, "system");
        assert_eq!(tx.outputs[0].amount, 25);
        assert_eq!(tx.outputs[1].amount, 975);
        assert!(f.builder.validate(&tx).is_err());
        assert!(f.builder.build_levy("LEVY_POOL", 5).is_err());
    }

    #[test]
    fn test_selection_sees_only_committed_outputs() {
        let f = fixture();
        let empty = f.ledger.inspect_utxos(UtxoSet::len);
        assert_eq!(empty, 0);
        assert!(f.builder.select_unspent_outputs(&f.alice_id, 1).is_err());
    }
}
