use std::collections::BTreeMap;

use serde_json::json;

use tessera_types::state::{Session, SESSION_CLOSED, SESSION_OPEN};
use tessera_types::transaction::{SessionOpenPayload, SessionResultPayload};

use crate::error::ExecError;
use crate::events::EventKind;
use crate::executor::Context;

/// Open a game session and lock `stakes` tokens from each player.
pub fn session_open(ctx: &mut Context) -> Result<(), ExecError> {
    let p: SessionOpenPayload = ctx.decode_payload("session_open")?;
    if p.session_id.is_empty() {
        return Err(ExecError::MissingSessionId);
    }
    if p.players.is_empty() {
        return Err(ExecError::NoPlayers);
    }

    // Distinguish a genuine duplicate from a backing-store failure.
    match ctx.state.get_session(&p.session_id) {
        Ok(_) => return Err(ExecError::SessionExists(p.session_id)),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    if p.stakes > 0 {
        for player in &p.players {
            let mut acc = ctx.state.get_account(player)?;
            if acc.balance < p.stakes {
                return Err(ExecError::InsufficientStakes {
                    player: player.clone(),
                    have: acc.balance,
                    need: p.stakes,
                });
            }
            acc.balance -= p.stakes;
            ctx.state.set_account(&acc)?;
        }
    }

    let session = Session {
        id: p.session_id.clone(),
        game_id: p.game_id.clone(),
        creator: ctx.tx.from.clone(),
        players: p.players.clone(),
        stakes: p.stakes,
        status: SESSION_OPEN.to_string(),
        outcome: BTreeMap::new(),
        created_at: ctx.block.header.timestamp,
        closed_at: 0,
    };
    ctx.state.set_session(&session)?;

    ctx.emit(
        EventKind::SessionOpen,
        json!({ "session_id": p.session_id, "game_id": p.game_id, "players": p.players }),
    );
    Ok(())
}

/// Close a session and distribute rewards. Total rewards may not exceed the
/// locked stakes, so settling a session never creates tokens.
pub fn session_result(ctx: &mut Context) -> Result<(), ExecError> {
    let p: SessionResultPayload = ctx.decode_payload("session_result")?;

    let mut session = match ctx.state.get_session(&p.session_id) {
        Ok(s) => s,
        Err(e) if e.is_not_found() => return Err(ExecError::SessionNotFound(p.session_id)),
        Err(e) => return Err(e.into()),
    };
    if session.status != SESSION_OPEN {
        return Err(ExecError::SessionClosed(p.session_id));
    }

    // Each addition is bounded by the remaining headroom, so the running
    // total cannot overflow before the comparison.
    let total_stakes = session.stakes.saturating_mul(session.players.len() as u64);
    let mut total_rewards: u64 = 0;
    for reward in p.outcome.values() {
        if *reward > total_stakes - total_rewards {
            return Err(ExecError::RewardsExceedStakes {
                total: total_stakes,
            });
        }
        total_rewards += reward;
    }

    for (pubkey, reward) in &p.outcome {
        let mut acc = ctx.state.get_account(pubkey)?;
        acc.balance = acc
            .balance
            .checked_add(*reward)
            .ok_or_else(|| ExecError::BalanceOverflow(pubkey.clone()))?;
        ctx.state.set_account(&acc)?;
    }

    session.status = SESSION_CLOSED.to_string();
    session.outcome = p.outcome;
    session.closed_at = ctx.block.header.timestamp;
    ctx.state.set_session(&session)?;

    ctx.emit(
        EventKind::SessionClose,
        json!({ "session_id": p.session_id }),
    );
    Ok(())
}
