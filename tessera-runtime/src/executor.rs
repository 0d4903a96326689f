use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use tessera_storage::state_db::StateDb;
use tessera_types::block::Block;
use tessera_types::transaction::{Transaction, TxKind};

use crate::error::ExecError;
use crate::events::{Emitter, Event, EventKind};
use crate::{asset, economy, market, session};

/// Passed to every handler: the chain state, the block being executed, the
/// triggering transaction, and the event emitter.
pub struct Context<'a> {
    pub state: &'a mut StateDb,
    pub block: &'a Block,
    pub tx: &'a Transaction,
    pub emitter: &'a Emitter,
}

impl Context<'_> {
    /// Decode the transaction payload into its typed form.
    pub(crate) fn decode_payload<T: DeserializeOwned>(
        &self,
        kind: &'static str,
    ) -> Result<T, ExecError> {
        serde_json::from_value(self.tx.payload.clone()).map_err(|e| ExecError::InvalidPayload {
            kind,
            reason: e.to_string(),
        })
    }

    /// Emit a domain event carrying this transaction's id and block height.
    pub(crate) fn emit(&self, kind: EventKind, data: Value) {
        self.emitter.emit(Event {
            kind,
            tx_id: self.tx.id.clone(),
            block_height: self.block.header.height,
            data,
        });
    }
}

/// Applies transactions to the state with per-transaction snapshot isolation.
pub struct Executor {
    emitter: Arc<Emitter>,
}

impl Executor {
    pub fn new(emitter: Arc<Emitter>) -> Self {
        Self { emitter }
    }

    /// Apply all transactions in `block` sequentially. A failing transaction
    /// fails the whole block; the caller rewinds through an outer snapshot
    /// taken before block execution. The block_commit event is emitted by
    /// consensus after signing so it carries the final block hash.
    pub fn execute_block(&self, state: &mut StateDb, block: &Block) -> Result<(), ExecError> {
        for tx in &block.transactions {
            self.execute_tx(state, block, tx)
                .map_err(|e| ExecError::TxFailed {
                    id: tx.id.clone(),
                    source: Box::new(e),
                })?;
        }
        Ok(())
    }

    /// Verify and execute a single transaction with snapshot/rollback.
    pub fn execute_tx(
        &self,
        state: &mut StateDb,
        block: &Block,
        tx: &Transaction,
    ) -> Result<(), ExecError> {
        tx.verify()?;

        let snap = state.snapshot();
        if let Err(e) = self.apply_tx(state, block, tx) {
            state.revert_to(snap)?;
            return Err(e);
        }

        self.emitter.emit(Event {
            kind: EventKind::TxExecuted,
            tx_id: tx.id.clone(),
            block_height: block.header.height,
            data: serde_json::json!({ "type": tx.kind.as_str(), "from": tx.from }),
        });
        Ok(())
    }

    /// Deduct the fee, advance the nonce, credit the proposer, then dispatch
    /// to the handler for the transaction kind.
    fn apply_tx(&self, state: &mut StateDb, block: &Block, tx: &Transaction) -> Result<(), ExecError> {
        let mut sender = state.get_account(&tx.from)?;
        if sender.nonce != tx.nonce {
            return Err(ExecError::InvalidNonce {
                expected: sender.nonce,
                got: tx.nonce,
            });
        }
        if sender.balance < tx.fee {
            return Err(ExecError::InsufficientBalance {
                have: sender.balance,
                need: tx.fee,
            });
        }
        if sender.nonce == u64::MAX {
            return Err(ExecError::NonceOverflow(tx.from.clone()));
        }
        sender.balance -= tx.fee;
        sender.nonce += 1;

        // The fee moves to the block proposer. When the proposer is the
        // sender, the credit folds into the already-loaded record; a separate
        // load-and-store here would overwrite the nonce bump with stale data.
        let proposer = &block.header.proposer;
        if proposer == &tx.from {
            sender.balance = sender
                .balance
                .checked_add(tx.fee)
                .ok_or_else(|| ExecError::BalanceOverflow(proposer.clone()))?;
            state.set_account(&sender)?;
        } else {
            state.set_account(&sender)?;
            let mut prop = state.get_account(proposer)?;
            prop.balance = prop
                .balance
                .checked_add(tx.fee)
                .ok_or_else(|| ExecError::BalanceOverflow(proposer.clone()))?;
            state.set_account(&prop)?;
        }

        let mut ctx = Context {
            state,
            block,
            tx,
            emitter: &self.emitter,
        };
        dispatch(&mut ctx)
    }
}

/// Route a transaction to its handler. Unknown kinds never reach this point;
/// they already fail TxKind deserialization.
fn dispatch(ctx: &mut Context) -> Result<(), ExecError> {
    match ctx.tx.kind {
        TxKind::Transfer => economy::transfer(ctx),
        TxKind::RegisterTemplate => asset::register_template(ctx),
        TxKind::MintAsset => asset::mint_asset(ctx),
        TxKind::BurnAsset => asset::burn_asset(ctx),
        TxKind::TransferAsset => asset::transfer_asset(ctx),
        TxKind::ListMarket => market::list_market(ctx),
        TxKind::BuyMarket => market::buy_market(ctx),
        TxKind::SessionOpen => session::session_open(ctx),
        TxKind::SessionResult => session::session_result(ctx),
    }
}
