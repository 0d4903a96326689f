//! End-to-end integration tests exercising the full tessera flow:
//! genesis → mempool → block production → state verification, and the
//! block-exchange sync loop between two nodes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{watch, Mutex};

use tessera_chain::{now_ns, Authority, Blockchain, ChainError, Mempool};
use tessera_crypto::hash::sha256_hex;
use tessera_crypto::keys::Keypair;
use tessera_net::{Node as NetNode, Syncer};
use tessera_node::genesis::create_genesis_block;
use tessera_runtime::{Emitter, ExecError, Executor};
use tessera_storage::block_store::KvBlockStore;
use tessera_storage::memory::MemoryStore;
use tessera_storage::state_db::StateDb;
use tessera_types::block::Block;
use tessera_types::genesis::GenesisConfig;
use tessera_types::state::SESSION_CLOSED;
use tessera_types::transaction::{Transaction, TxKind};

const CHAIN_ID: &str = "tessera-e2e";
const GENESIS_TIMESTAMP: i64 = 1_700_000_000_000_000_000;

struct TestNode {
    chain: Arc<Blockchain>,
    state: Arc<Mutex<StateDb>>,
    mempool: Arc<Mempool>,
    authority: Arc<Authority>,
    syncer: Arc<Syncer>,
}

/// Build a full single-process stack over in-memory storage, with the
/// genesis alloc committed and block 0 added.
async fn make_node(keypair: Keypair, validators: Vec<String>, alloc: &[(String, u64)]) -> TestNode {
    let store = Arc::new(MemoryStore::new());
    let chain = Arc::new(Blockchain::new(Arc::new(KvBlockStore::new(store.clone()))));
    let state = Arc::new(Mutex::new(StateDb::new(store)));

    let mut genesis = GenesisConfig {
        chain_id: CHAIN_ID.to_string(),
        alloc: Default::default(),
        timestamp: GENESIS_TIMESTAMP,
    };
    for (addr, balance) in alloc {
        genesis.alloc.insert(addr.clone(), *balance);
    }

    let genesis_block = {
        let mut st = state.lock().await;
        create_genesis_block(&genesis, &validators[0], &mut st, &keypair).unwrap()
    };
    chain.add_block(&genesis_block).unwrap();

    let emitter = Arc::new(Emitter::new());
    let executor = Arc::new(Executor::new(emitter.clone()));
    let mempool = Arc::new(Mempool::new());
    let authority = Arc::new(Authority::new(
        CHAIN_ID.to_string(),
        validators,
        500,
        keypair,
        chain.clone(),
        state.clone(),
        mempool.clone(),
        executor.clone(),
        emitter,
    ));
    let syncer = Syncer::new(chain.clone(), authority.clone(), executor, state.clone());

    TestNode {
        chain,
        state,
        mempool,
        authority,
        syncer,
    }
}

fn signed_tx(
    kp: &Keypair,
    kind: TxKind,
    nonce: u64,
    fee: u64,
    payload: serde_json::Value,
) -> Transaction {
    let mut tx = Transaction::new(
        kind,
        CHAIN_ID,
        &kp.public_key_hex(),
        nonce,
        fee,
        now_ns(),
        payload,
    );
    tx.sign(kp);
    tx
}

async fn balance(node: &TestNode, address: &str) -> u64 {
    node.state.lock().await.get_account(address).unwrap().balance
}

async fn nonce(node: &TestNode, address: &str) -> u64 {
    node.state.lock().await.get_account(address).unwrap().nonce
}

#[tokio::test]
async fn test_transfer_scenario() {
    let validator = Keypair::generate();
    let alice = Keypair::generate();
    let bob = Keypair::generate();

    let node = make_node(
        Keypair::from_seed(&validator.seed()),
        vec![validator.public_key_hex()],
        &[(alice.public_key_hex(), 1_000)],
    )
    .await;

    let tx = signed_tx(
        &alice,
        TxKind::Transfer,
        0,
        0,
        json!({"to": bob.public_key_hex(), "amount": 300}),
    );
    node.mempool.add(tx).unwrap();

    let block = node.authority.produce_block().await.unwrap();
    assert_eq!(block.header.height, 1);
    assert_eq!(block.transactions.len(), 1);

    assert_eq!(balance(&node, &alice.public_key_hex()).await, 700);
    assert_eq!(nonce(&node, &alice.public_key_hex()).await, 1);
    assert_eq!(balance(&node, &bob.public_key_hex()).await, 300);
}

#[tokio::test]
async fn test_replay_rejected_scenario() {
    let validator = Keypair::generate();
    let alice = Keypair::generate();
    let bob = Keypair::generate();

    let node = make_node(
        Keypair::from_seed(&validator.seed()),
        vec![validator.public_key_hex()],
        &[(alice.public_key_hex(), 1_000)],
    )
    .await;

    let tx = signed_tx(
        &alice,
        TxKind::Transfer,
        0,
        0,
        json!({"to": bob.public_key_hex(), "amount": 300}),
    );
    node.mempool.add(tx.clone()).unwrap();
    node.authority.produce_block().await.unwrap();

    // Replaying the identical transaction fails on the nonce check and the
    // whole block is rejected.
    node.mempool.add(tx).unwrap();
    let err = node.authority.produce_block().await.unwrap_err();
    match err {
        ChainError::Execution(ExecError::TxFailed { source, .. }) => {
            assert!(matches!(
                *source,
                ExecError::InvalidNonce { expected: 1, got: 0 }
            ));
            assert!(source
                .to_string()
                .contains("invalid nonce: expected 1 got 0"));
        }
        other => panic!("unexpected error: {}", other),
    }

    // State unchanged by the replay attempt.
    assert_eq!(node.chain.height(), 1);
    assert_eq!(balance(&node, &alice.public_key_hex()).await, 700);
    assert_eq!(balance(&node, &bob.public_key_hex()).await, 300);
}

#[tokio::test]
async fn test_mint_transfer_burn_scenario() {
    let validator = Keypair::generate();
    let creator = Keypair::generate();
    let p1 = Keypair::generate();
    let p2 = Keypair::generate();

    let node = make_node(
        Keypair::from_seed(&validator.seed()),
        vec![validator.public_key_hex()],
        &[(creator.public_key_hex(), 1_000)],
    )
    .await;

    // Register the template and mint an asset for P1 in one block.
    node.mempool
        .add(signed_tx(
            &creator,
            TxKind::RegisterTemplate,
            0,
            0,
            json!({"id": "sword", "name": "Sword", "schema": {}, "tradeable": true}),
        ))
        .unwrap();
    let mint_tx = signed_tx(
        &creator,
        TxKind::MintAsset,
        1,
        0,
        json!({"template_id": "sword", "owner": p1.public_key_hex()}),
    );
    let mint_tx_id = mint_tx.id.clone();
    node.mempool.add(mint_tx).unwrap();
    node.authority.produce_block().await.unwrap();

    let asset_id = sha256_hex(format!("{}:asset:sword", mint_tx_id).as_bytes());
    {
        let state = node.state.lock().await;
        let asset = state.get_asset(&asset_id).unwrap();
        assert_eq!(asset.owner, p1.public_key_hex());
        assert!(asset.tradeable);
    }

    // P1 hands the asset to P2.
    node.mempool
        .add(signed_tx(
            &p1,
            TxKind::TransferAsset,
            0,
            0,
            json!({"asset_id": asset_id, "to": p2.public_key_hex()}),
        ))
        .unwrap();
    node.authority.produce_block().await.unwrap();
    assert_eq!(
        node.state.lock().await.get_asset(&asset_id).unwrap().owner,
        p2.public_key_hex()
    );

    // P2 burns it.
    node.mempool
        .add(signed_tx(
            &p2,
            TxKind::BurnAsset,
            0,
            0,
            json!({"asset_id": asset_id}),
        ))
        .unwrap();
    node.authority.produce_block().await.unwrap();
    assert!(node
        .state
        .lock()
        .await
        .get_asset(&asset_id)
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_market_roundtrip_scenario() {
    let validator = Keypair::generate();
    let p1 = Keypair::generate();
    let p2 = Keypair::generate();

    let node = make_node(
        Keypair::from_seed(&validator.seed()),
        vec![validator.public_key_hex()],
        &[(p1.public_key_hex(), 60_000), (p2.public_key_hex(), 1_000)],
    )
    .await;

    // P2 creates and owns an asset.
    node.mempool
        .add(signed_tx(
            &p2,
            TxKind::RegisterTemplate,
            0,
            0,
            json!({"id": "card", "name": "Card", "schema": {}, "tradeable": true}),
        ))
        .unwrap();
    let mint_tx = signed_tx(&p2, TxKind::MintAsset, 1, 0, json!({"template_id": "card"}));
    let mint_tx_id = mint_tx.id.clone();
    node.mempool.add(mint_tx).unwrap();
    node.authority.produce_block().await.unwrap();
    let asset_id = sha256_hex(format!("{}:asset:card", mint_tx_id).as_bytes());

    // P2 lists it at 50 000.
    let list_tx = signed_tx(
        &p2,
        TxKind::ListMarket,
        2,
        0,
        json!({"asset_id": asset_id, "price": 50_000}),
    );
    let list_tx_id = list_tx.id.clone();
    node.mempool.add(list_tx).unwrap();
    node.authority.produce_block().await.unwrap();
    let listing_id = sha256_hex(format!("{}:listing:{}", list_tx_id, asset_id).as_bytes());
    {
        let state = node.state.lock().await;
        assert!(state.get_listing(&listing_id).unwrap().active);
        assert_eq!(
            state.get_asset(&asset_id).unwrap().active_listing_id,
            listing_id
        );
    }

    // P1 buys it.
    let p1_before = balance(&node, &p1.public_key_hex()).await;
    let p2_before = balance(&node, &p2.public_key_hex()).await;
    node.mempool
        .add(signed_tx(
            &p1,
            TxKind::BuyMarket,
            0,
            0,
            json!({"listing_id": listing_id}),
        ))
        .unwrap();
    node.authority.produce_block().await.unwrap();

    let state = node.state.lock().await;
    let asset = state.get_asset(&asset_id).unwrap();
    assert_eq!(asset.owner, p1.public_key_hex());
    assert!(asset.active_listing_id.is_empty());
    assert!(!state.get_listing(&listing_id).unwrap().active);
    drop(state);

    assert_eq!(
        balance(&node, &p1.public_key_hex()).await,
        p1_before - 50_000
    );
    assert_eq!(
        balance(&node, &p2.public_key_hex()).await,
        p2_before + 50_000
    );
}

#[tokio::test]
async fn test_session_scenario() {
    let validator = Keypair::generate();
    let referee = Keypair::generate();
    let p1 = Keypair::generate();
    let p2 = Keypair::generate();

    let node = make_node(
        Keypair::from_seed(&validator.seed()),
        vec![validator.public_key_hex()],
        &[(p1.public_key_hex(), 50_000), (p2.public_key_hex(), 50_000)],
    )
    .await;

    node.mempool
        .add(signed_tx(
            &referee,
            TxKind::SessionOpen,
            0,
            0,
            json!({
                "session_id": "m1",
                "game_id": "arena",
                "players": [p1.public_key_hex(), p2.public_key_hex()],
                "stakes": 10_000,
            }),
        ))
        .unwrap();
    node.authority.produce_block().await.unwrap();

    assert_eq!(balance(&node, &p1.public_key_hex()).await, 40_000);
    assert_eq!(balance(&node, &p2.public_key_hex()).await, 40_000);

    node.mempool
        .add(signed_tx(
            &referee,
            TxKind::SessionResult,
            1,
            0,
            json!({
                "session_id": "m1",
                "outcome": { (p1.public_key_hex()): 20_000, (p2.public_key_hex()): 0 },
            }),
        ))
        .unwrap();
    node.authority.produce_block().await.unwrap();

    assert_eq!(balance(&node, &p1.public_key_hex()).await, 60_000);
    assert_eq!(balance(&node, &p2.public_key_hex()).await, 40_000);
    assert_eq!(
        node.state.lock().await.get_session("m1").unwrap().status,
        SESSION_CLOSED
    );

    // A second settlement on the same session fails and the block with it
    // is rejected.
    node.mempool
        .add(signed_tx(
            &referee,
            TxKind::SessionResult,
            2,
            0,
            json!({"session_id": "m1", "outcome": {}}),
        ))
        .unwrap();
    assert!(node.authority.produce_block().await.is_err());
}

/// Produce five blocks on the producer, each carrying one transaction kind.
async fn produce_mixed_chain(node: &TestNode, creator: &Keypair, p1: &Keypair) -> Vec<Block> {
    let mut blocks = Vec::new();

    // 1: token transfer
    node.mempool
        .add(signed_tx(
            creator,
            TxKind::Transfer,
            0,
            0,
            json!({"to": p1.public_key_hex(), "amount": 5_000}),
        ))
        .unwrap();
    blocks.push(node.authority.produce_block().await.unwrap());

    // 2: template registration
    node.mempool
        .add(signed_tx(
            creator,
            TxKind::RegisterTemplate,
            1,
            0,
            json!({"id": "relic", "name": "Relic", "schema": {}, "tradeable": true}),
        ))
        .unwrap();
    blocks.push(node.authority.produce_block().await.unwrap());

    // 3: mint
    let mint_tx = signed_tx(
        creator,
        TxKind::MintAsset,
        2,
        0,
        json!({"template_id": "relic"}),
    );
    let mint_tx_id = mint_tx.id.clone();
    node.mempool.add(mint_tx).unwrap();
    blocks.push(node.authority.produce_block().await.unwrap());
    let asset_id = sha256_hex(format!("{}:asset:relic", mint_tx_id).as_bytes());

    // 4: market listing
    node.mempool
        .add(signed_tx(
            creator,
            TxKind::ListMarket,
            3,
            0,
            json!({"asset_id": asset_id, "price": 123}),
        ))
        .unwrap();
    blocks.push(node.authority.produce_block().await.unwrap());

    // 5: session open
    node.mempool
        .add(signed_tx(
            creator,
            TxKind::SessionOpen,
            4,
            0,
            json!({
                "session_id": "s1",
                "game_id": "g",
                "players": [p1.public_key_hex()],
                "stakes": 100,
            }),
        ))
        .unwrap();
    blocks.push(node.authority.produce_block().await.unwrap());

    blocks
}

#[tokio::test]
async fn test_two_node_state_root_agreement() {
    let validator = Keypair::generate();
    let creator = Keypair::generate();
    let p1 = Keypair::generate();
    let validators = vec![validator.public_key_hex()];
    let alloc = vec![
        (creator.public_key_hex(), 100_000),
        (p1.public_key_hex(), 10_000),
    ];

    let node_a = make_node(
        Keypair::from_seed(&validator.seed()),
        validators.clone(),
        &alloc,
    )
    .await;
    let node_b = make_node(Keypair::generate(), validators, &alloc).await;

    // Identical genesis on both sides.
    assert_eq!(
        node_a.chain.tip().unwrap().hash,
        node_b.chain.tip().unwrap().hash
    );

    let blocks = produce_mixed_chain(&node_a, &creator, &p1).await;
    assert_eq!(node_a.chain.height(), 5);

    // B pulls the chain over TCP via get_blocks.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr_a = probe.local_addr().unwrap().to_string();
    drop(probe);

    let net_a = NetNode::new("node-a", &addr_a, node_a.mempool.clone());
    node_a.syncer.register(&net_a);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    net_a.start(shutdown_rx).await.unwrap();

    let net_b = NetNode::new("node-b", "127.0.0.1:0", node_b.mempool.clone());
    node_b.syncer.register(&net_b);
    let peer_a = net_b.add_peer("node-a", &addr_a).await.unwrap();
    node_b
        .syncer
        .request_blocks(&peer_a, node_b.chain.height() + 1)
        .await
        .unwrap();

    // Wait for B to reach height 5.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while node_b.chain.height() < 5 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "sync did not complete: B at height {}",
            node_b.chain.height()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Every accepted block carried a state root that B recomputed and
    // matched; the tips and final roots agree exactly.
    for block in &blocks {
        let b_block = node_b
            .chain
            .get_block_by_height(block.header.height)
            .unwrap()
            .unwrap();
        assert_eq!(b_block.hash, block.hash);
        assert_eq!(b_block.header.state_root, block.header.state_root);
    }
    let root_a = node_a.state.lock().await.compute_root().unwrap();
    let root_b = node_b.state.lock().await.compute_root().unwrap();
    assert_eq!(root_a, root_b);
}

#[tokio::test]
async fn test_tampered_block_halts_sync() {
    let validator = Keypair::generate();
    let creator = Keypair::generate();
    let p1 = Keypair::generate();
    let validators = vec![validator.public_key_hex()];
    let alloc = vec![
        (creator.public_key_hex(), 100_000),
        (p1.public_key_hex(), 10_000),
    ];

    let node_a = make_node(
        Keypair::from_seed(&validator.seed()),
        validators.clone(),
        &alloc,
    )
    .await;
    let node_b = make_node(Keypair::generate(), validators, &alloc).await;

    let mut blocks = produce_mixed_chain(&node_a, &creator, &p1).await;

    // Flip a bit of block 3 in transit.
    let tampered = &mut blocks[2];
    let mut root = tampered.header.state_root.clone().into_bytes();
    root[0] = if root[0] == b'0' { b'1' } else { b'0' };
    tampered.header.state_root = String::from_utf8(root).unwrap();

    // B applies the batch in order and stops at the tampered block.
    for block in &blocks {
        if node_b.syncer.apply_block(block).await.is_err() {
            break;
        }
    }
    assert_eq!(node_b.chain.height(), 2);

    // The later blocks cannot apply either; they chain from the rejected one.
    assert!(node_b.syncer.apply_block(&blocks[3]).await.is_err());
    assert_eq!(node_b.chain.height(), 2);
}
