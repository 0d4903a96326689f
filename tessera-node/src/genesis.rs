use tessera_crypto::hash::sha256_hex;
use tessera_crypto::keys::Keypair;
use tessera_storage::state_db::StateDb;
use tessera_types::block::Block;
use tessera_types::constants::GENESIS_PREV_HASH;
use tessera_types::genesis::GenesisConfig;
use tessera_types::state::Account;

use crate::error::NodeError;

/// Build and commit block 0 from the genesis config.
///
/// The alloc map is credited, the state root computed, and the state
/// committed before the block is assembled. Every field of the header is
/// derived from the config (including the fixed genesis timestamp and the
/// bootstrap proposer), so all nodes of a chain produce the identical genesis
/// hash. Only the bootstrap validator holds the proposer key and signs;
/// replicas construct the same unsigned block locally.
pub fn create_genesis_block(
    genesis: &GenesisConfig,
    proposer: &str,
    state: &mut StateDb,
    keypair: &Keypair,
) -> Result<Block, NodeError> {
    for (pubkey_hex, balance) in &genesis.alloc {
        state.set_account(&Account {
            address: pubkey_hex.clone(),
            balance: *balance,
            nonce: 0,
        })?;
    }

    let state_root = state.compute_root()?;
    state.commit()?;

    let mut block = Block::new(
        &genesis.chain_id,
        0,
        GENESIS_PREV_HASH,
        proposer,
        genesis.timestamp,
        Vec::new(),
    );
    block.header.state_root = state_root;
    // Genesis marker: the tx_root carries the chain id.
    block.header.tx_root = sha256_hex(genesis.chain_id.as_bytes());

    if keypair.public_key_hex() == proposer {
        block.sign(keypair);
    } else {
        block.hash = block.compute_hash();
    }
    Ok(block)
}
