use serde_json::json;

use tessera_crypto::hash::sha256_hex;
use tessera_crypto::keys::pubkey_from_hex;
use tessera_types::state::{Asset, AssetTemplate};
use tessera_types::transaction::{
    BurnAssetPayload, MintAssetPayload, RegisterTemplatePayload, TransferAssetPayload,
};

use crate::error::ExecError;
use crate::events::EventKind;
use crate::executor::Context;

/// Register a new asset template. Templates are immutable; re-registering an
/// existing id fails.
pub fn register_template(ctx: &mut Context) -> Result<(), ExecError> {
    let p: RegisterTemplatePayload = ctx.decode_payload("register_template")?;
    if p.id.is_empty() {
        return Err(ExecError::MissingTemplateId);
    }

    match ctx.state.get_template(&p.id) {
        Ok(_) => return Err(ExecError::TemplateExists(p.id)),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let template = AssetTemplate {
        id: p.id.clone(),
        name: p.name,
        schema: p.schema,
        tradeable: p.tradeable,
        creator: ctx.tx.from.clone(),
    };
    ctx.state.set_template(&template)?;

    ctx.emit(
        EventKind::TemplateRegistered,
        json!({ "template_id": p.id, "creator": ctx.tx.from }),
    );
    Ok(())
}

/// Mint a new asset from a registered template. The asset id is
/// deterministic: H(tx_id ++ ":asset:" ++ template_id).
pub fn mint_asset(ctx: &mut Context) -> Result<(), ExecError> {
    let p: MintAssetPayload = ctx.decode_payload("mint_asset")?;
    if p.template_id.is_empty() {
        return Err(ExecError::MissingTemplateId);
    }

    let template = match ctx.state.get_template(&p.template_id) {
        Ok(t) => t,
        Err(e) if e.is_not_found() => return Err(ExecError::TemplateNotFound(p.template_id)),
        Err(e) => return Err(e.into()),
    };

    let owner = if p.owner.is_empty() {
        ctx.tx.from.clone()
    } else {
        pubkey_from_hex(&p.owner)?;
        p.owner
    };

    let asset_id = sha256_hex(format!("{}:asset:{}", ctx.tx.id, p.template_id).as_bytes());

    let asset = Asset {
        id: asset_id.clone(),
        template_id: p.template_id.clone(),
        owner: owner.clone(),
        properties: p.properties,
        tradeable: template.tradeable,
        minted_at: ctx.block.header.timestamp,
        active_listing_id: String::new(),
    };
    ctx.state.set_asset(&asset)?;

    ctx.emit(
        EventKind::AssetMinted,
        json!({ "asset_id": asset_id, "template_id": p.template_id, "owner": owner }),
    );
    Ok(())
}

/// Permanently destroy an asset owned by the sender.
pub fn burn_asset(ctx: &mut Context) -> Result<(), ExecError> {
    let p: BurnAssetPayload = ctx.decode_payload("burn_asset")?;

    let asset = match ctx.state.get_asset(&p.asset_id) {
        Ok(a) => a,
        Err(e) if e.is_not_found() => return Err(ExecError::AssetNotFound(p.asset_id)),
        Err(e) => return Err(e.into()),
    };
    if asset.owner != ctx.tx.from {
        return Err(ExecError::NotAssetOwner { action: "burn" });
    }
    if !asset.active_listing_id.is_empty() {
        return Err(ExecError::AssetListed {
            asset_id: p.asset_id,
            action: "burning",
        });
    }

    ctx.state.delete_asset(&p.asset_id);

    ctx.emit(
        EventKind::AssetBurned,
        json!({ "asset_id": p.asset_id, "owner": asset.owner }),
    );
    Ok(())
}

/// Move a tradeable, unlisted asset to a new owner.
pub fn transfer_asset(ctx: &mut Context) -> Result<(), ExecError> {
    let p: TransferAssetPayload = ctx.decode_payload("transfer_asset")?;
    if p.to.is_empty() {
        return Err(ExecError::MissingRecipient);
    }
    pubkey_from_hex(&p.to)?;

    let mut asset = match ctx.state.get_asset(&p.asset_id) {
        Ok(a) => a,
        Err(e) if e.is_not_found() => return Err(ExecError::AssetNotFound(p.asset_id)),
        Err(e) => return Err(e.into()),
    };
    if asset.owner != ctx.tx.from {
        return Err(ExecError::NotAssetOwner { action: "transfer" });
    }
    if !asset.tradeable {
        return Err(ExecError::NotTradeable(p.asset_id));
    }
    if !asset.active_listing_id.is_empty() {
        return Err(ExecError::AssetListed {
            asset_id: p.asset_id,
            action: "transferring",
        });
    }

    asset.owner = p.to.clone();
    ctx.state.set_asset(&asset)?;

    ctx.emit(
        EventKind::AssetTransfer,
        json!({ "asset_id": p.asset_id, "from": ctx.tx.from, "to": p.to }),
    );
    Ok(())
}
