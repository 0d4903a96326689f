use serde_json::json;

use tessera_crypto::hash::sha256_hex;
use tessera_types::state::MarketListing;
use tessera_types::transaction::{BuyMarketPayload, ListMarketPayload};

use crate::error::ExecError;
use crate::events::EventKind;
use crate::executor::Context;

/// List an asset for sale. The listing id is deterministic:
/// H(tx_id ++ ":listing:" ++ asset_id).
pub fn list_market(ctx: &mut Context) -> Result<(), ExecError> {
    let p: ListMarketPayload = ctx.decode_payload("list_market")?;
    if p.price == 0 {
        return Err(ExecError::ZeroPrice);
    }

    let mut asset = match ctx.state.get_asset(&p.asset_id) {
        Ok(a) => a,
        Err(e) if e.is_not_found() => return Err(ExecError::AssetNotFound(p.asset_id)),
        Err(e) => return Err(e.into()),
    };
    if asset.owner != ctx.tx.from {
        return Err(ExecError::NotAssetOwner { action: "list" });
    }
    if !asset.tradeable {
        return Err(ExecError::NotTradeable(p.asset_id));
    }
    if !asset.active_listing_id.is_empty() {
        return Err(ExecError::AssetListed {
            asset_id: p.asset_id,
            action: "listing",
        });
    }

    let listing_id = sha256_hex(format!("{}:listing:{}", ctx.tx.id, p.asset_id).as_bytes());

    let listing = MarketListing {
        id: listing_id.clone(),
        asset_id: p.asset_id.clone(),
        seller: ctx.tx.from.clone(),
        price: p.price,
        active: true,
        created_at: ctx.block.header.timestamp,
    };
    ctx.state.set_listing(&listing)?;

    // Mark the asset so it cannot be listed, transferred, or burned while
    // the listing is live.
    asset.active_listing_id = listing_id.clone();
    ctx.state.set_asset(&asset)?;

    ctx.emit(
        EventKind::MarketList,
        json!({ "listing_id": listing_id, "asset_id": p.asset_id, "price": p.price }),
    );
    Ok(())
}

/// Purchase an active listing: tokens move to the seller, the asset moves to
/// the buyer, and the listing deactivates.
pub fn buy_market(ctx: &mut Context) -> Result<(), ExecError> {
    let p: BuyMarketPayload = ctx.decode_payload("buy_market")?;

    let mut listing = match ctx.state.get_listing(&p.listing_id) {
        Ok(l) => l,
        Err(e) if e.is_not_found() => return Err(ExecError::ListingNotFound(p.listing_id)),
        Err(e) => return Err(e.into()),
    };
    if !listing.active {
        return Err(ExecError::ListingInactive(p.listing_id));
    }
    if listing.seller == ctx.tx.from {
        return Err(ExecError::OwnListing);
    }

    let mut buyer = ctx.state.get_account(&ctx.tx.from)?;
    if buyer.balance < listing.price {
        return Err(ExecError::InsufficientBalance {
            have: buyer.balance,
            need: listing.price,
        });
    }
    buyer.balance -= listing.price;
    ctx.state.set_account(&buyer)?;

    let mut seller = ctx.state.get_account(&listing.seller)?;
    seller.balance = seller
        .balance
        .checked_add(listing.price)
        .ok_or_else(|| ExecError::BalanceOverflow(listing.seller.clone()))?;
    ctx.state.set_account(&seller)?;

    // Reassign the asset and clear its active listing marker.
    let mut asset = match ctx.state.get_asset(&listing.asset_id) {
        Ok(a) => a,
        Err(e) if e.is_not_found() => return Err(ExecError::AssetNotFound(listing.asset_id)),
        Err(e) => return Err(e.into()),
    };
    asset.owner = ctx.tx.from.clone();
    asset.active_listing_id = String::new();
    ctx.state.set_asset(&asset)?;

    listing.active = false;
    ctx.state.set_listing(&listing)?;

    ctx.emit(
        EventKind::MarketBuy,
        json!({
            "listing_id": p.listing_id,
            "asset_id": listing.asset_id,
            "buyer": ctx.tx.from,
            "seller": listing.seller,
            "price": listing.price,
        }),
    );
    Ok(())
}
