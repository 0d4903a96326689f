use serde_json::json;

use tessera_types::transaction::TransferPayload;

use crate::error::ExecError;
use crate::events::EventKind;
use crate::executor::Context;

/// Move native tokens from the sender to the recipient.
pub fn transfer(ctx: &mut Context) -> Result<(), ExecError> {
    let p: TransferPayload = ctx.decode_payload("transfer")?;
    if p.amount == 0 {
        return Err(ExecError::ZeroAmount);
    }
    if p.to.is_empty() {
        return Err(ExecError::MissingRecipient);
    }

    let mut sender = ctx.state.get_account(&ctx.tx.from)?;
    if sender.balance < p.amount {
        return Err(ExecError::InsufficientBalance {
            have: sender.balance,
            need: p.amount,
        });
    }
    sender.balance -= p.amount;
    ctx.state.set_account(&sender)?;

    let mut recipient = ctx.state.get_account(&p.to)?;
    recipient.balance = recipient
        .balance
        .checked_add(p.amount)
        .ok_or_else(|| ExecError::BalanceOverflow(p.to.clone()))?;
    ctx.state.set_account(&recipient)?;

    ctx.emit(
        EventKind::TokenTransfer,
        json!({ "from": ctx.tx.from, "to": p.to, "amount": p.amount }),
    );
    Ok(())
}
