/// Integration tests that wire together all crates end-to-end.
///
/// These tests exercise the full data path:
///   Feed entry / submission → Miner → ChainStore → blocks.jsonl → Validator → export
///
/// Each test runs a node against its own temporary data directory.
use std::{fs, path::Path, sync::Arc};

use bicle_audit::{Finding, SerializedChain};
use bicle_chain::{Block, GENESIS_HASH};
use bicle_node::{
    Command, FeedEntry, FeedSource, MineOutcome, Node, NodeConfig, NodeError, Reply, StaticFeed,
};

fn entry(title: &str, link: &str) -> FeedEntry {
    FeedEntry {
        title: Some(title.into()),
        link: Some(link.into()),
        published: Some(1_762_400_000),
        category: Some("tech".into()),
    }
}

fn three_story_feed() -> Vec<Arc<dyn FeedSource>> {
    vec![Arc::new(StaticFeed::new(
        "Wired",
        vec![
            entry("Chip exports tighten", "https://wired.example/chips"),
            entry("Robotaxis expand", "https://wired.example/robotaxis"),
            entry("Open models gain ground", "https://wired.example/models"),
        ],
    ))]
}

/// Rewrite the title of item `item` in block `index` directly in the block log.
fn tamper_title(data_dir: &Path, index: usize, item: usize, title: &str) {
    let path = data_dir.join("blocks.jsonl");
    let raw = fs::read_to_string(&path).unwrap();
    let lines: Vec<String> = raw
        .lines()
        .enumerate()
        .map(|(n, line)| {
            if n != index {
                return line.to_string();
            }
            let mut block: serde_json::Value = serde_json::from_str(line).unwrap();
            block["items"][item]["title"] = serde_json::Value::from(title);
            serde_json::to_string(&block).unwrap()
        })
        .collect();
    fs::write(&path, lines.join("\n") + "\n").unwrap();
}

// ── Chain lifecycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn mine_tamper_verify_export() {
    let dir = tempfile::tempdir().unwrap();

    {
        let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), three_story_feed())
            .await
            .unwrap();

        let genesis = node.store().get(0).await.unwrap();
        assert_eq!(genesis, Block::genesis());
        assert_eq!(genesis.block_hash, GENESIS_HASH);

        let MineOutcome::Mined(block) = node.mine().await.unwrap().outcome else {
            panic!("first pass should mine a block");
        };
        assert_eq!(block.index, 1);
        assert_eq!(block.items.len(), 3);
        assert_eq!(block.previous_block_hash, genesis.block_hash);
        let expected: Vec<_> = block.items.iter().map(|i| i.fingerprint().unwrap()).collect();
        assert_eq!(block.item_fingerprints, expected);

        let again = node.mine().await.unwrap();
        assert!(matches!(again.outcome, MineOutcome::NoNewItems));
        assert_eq!(node.store().len().await, 2);

        node.shutdown().await.unwrap();
    }

    tamper_title(dir.path(), 1, 1, "Robotaxis banned everywhere");

    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
        .await
        .expect("item tampering alone does not stop the node");

    let report = node.verify(None).await.unwrap();
    assert!(!report.is_valid());
    assert_eq!(
        report.findings,
        vec![Finding::ItemTampered {
            block_index: 1,
            item_index: 1
        }]
    );

    let export = node
        .export(Some("0..1".parse().unwrap()))
        .await
        .expect("export succeeds on a tampered chain");
    let json = export.to_json().unwrap();
    let audited = SerializedChain::from_json(&json).unwrap().verify().unwrap();
    assert_eq!(audited.findings, report.findings);
    assert!(!audited.is_valid());
}

#[tokio::test]
async fn appends_are_sequential() {
    let dir = tempfile::tempdir().unwrap();
    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
        .await
        .unwrap();

    for k in 1..=4u64 {
        node.submit(format!("https://seq.example/{k}"), None, None)
            .await
            .unwrap();
        let MineOutcome::Mined(block) = node.mine().await.unwrap().outcome else {
            panic!("pass {k} should mine");
        };
        assert_eq!(block.index, k);
        assert_eq!(node.store().len().await, k as usize + 1);
    }

    let chain = node.store().snapshot().await;
    for (position, block) in chain.blocks().iter().enumerate() {
        assert_eq!(block.index, position as u64);
    }
}

#[tokio::test]
async fn concurrent_mining_never_forks() {
    let dir = tempfile::tempdir().unwrap();
    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
        .await
        .unwrap();
    let node = Arc::new(node);

    for k in 0..6 {
        node.submit(format!("https://race.example/{k}"), None, None)
            .await
            .unwrap();
    }

    let passes: Vec<_> = (0..4)
        .map(|_| {
            let node = Arc::clone(&node);
            tokio::spawn(async move { node.mine().await })
        })
        .collect();
    for pass in passes {
        pass.await.unwrap().unwrap();
    }

    let report = node.verify(None).await.unwrap();
    assert!(report.is_valid(), "{report}");
    let chain = node.store().snapshot().await;
    let mined: usize = chain.blocks()[1..].iter().map(|b| b.items.len()).sum();
    assert_eq!(mined, 6, "every submission mined exactly once");
}

#[tokio::test]
async fn export_verdict_matches_live_validation() {
    let dir = tempfile::tempdir().unwrap();
    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), three_story_feed())
        .await
        .unwrap();
    node.mine().await.unwrap();
    node.submit("https://extra.example".into(), Some("Extra".into()), None)
        .await
        .unwrap();
    node.mine().await.unwrap();

    let live = node.verify(None).await.unwrap();
    let export = node.export(None).await.unwrap();
    let audited = SerializedChain::from_json(&export.to_json().unwrap())
        .unwrap()
        .verify()
        .unwrap();
    assert_eq!(audited.is_valid(), live.is_valid());
    assert!(audited.is_valid());
}

// ── Startup and persistence ─────────────────────────────────────────────────

#[tokio::test]
async fn structural_damage_refuses_startup() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), three_story_feed())
            .await
            .unwrap();
        node.mine().await.unwrap();
    }

    let path = dir.path().join("blocks.jsonl");
    let raw = fs::read_to_string(&path).unwrap();
    let mut lines: Vec<serde_json::Value> =
        raw.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    lines[1]["timestamp"] = serde_json::Value::from(0);
    let rewritten: Vec<String> = lines.iter().map(|v| v.to_string()).collect();
    fs::write(&path, rewritten.join("\n") + "\n").unwrap();

    match Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new()).await {
        Err(NodeError::CorruptChain(report)) => {
            assert!(report
                .findings
                .contains(&Finding::BlockTampered { block_index: 1 }));
        }
        Err(other) => panic!("expected CorruptChain, got {other}"),
        Ok(_) => panic!("expected CorruptChain, node started"),
    }
}

#[tokio::test]
async fn pending_submissions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
            .await
            .unwrap();
        node.submit("https://later.example".into(), Some("Later".into()), Some("bob".into()))
            .await
            .unwrap();
        node.shutdown().await.unwrap();
    }

    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
        .await
        .unwrap();
    assert_eq!(node.status().await.pending, 1);

    let MineOutcome::Mined(block) = node.mine().await.unwrap().outcome else {
        panic!("pending submission should be mined");
    };
    assert_eq!(block.items[0].url, "https://later.example");
    assert_eq!(node.status().await.pending, 0);
}

// ── Command surface ─────────────────────────────────────────────────────────

#[tokio::test]
async fn bot_commands_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
        .await
        .unwrap();

    let submit: Command = "/submit https://cmd.example Quantum chips arrive".parse().unwrap();
    assert!(matches!(node.handle(submit).await.unwrap(), Reply::Submitted { .. }));

    let Reply::Mined(block) = node.handle("/mine".parse().unwrap()).await.unwrap() else {
        panic!("expected a mined block");
    };
    assert_eq!(block.items[0].title, "Quantum chips arrive");

    let Reply::Block(shown) = node.handle("/block 1".parse().unwrap()).await.unwrap() else {
        panic!("expected a block");
    };
    assert_eq!(shown, block);

    let Reply::Stats(stats) = node.handle("/stats".parse().unwrap()).await.unwrap() else {
        panic!("expected stats");
    };
    assert_eq!(stats.total_items, 2);

    let Reply::Status(status) = node.handle("/status".parse().unwrap()).await.unwrap() else {
        panic!("expected status");
    };
    assert!(status.integrity_ok);
    assert_eq!(status.blocks, 2);

    let Reply::Proof(blocks) = node.handle("/proof".parse().unwrap()).await.unwrap() else {
        panic!("expected proof");
    };
    assert_eq!(blocks.len(), 2);

    let missing = node.handle("/verify 0..9".parse().unwrap()).await;
    assert!(matches!(missing, Err(NodeError::Audit(_))));
}

// ── Queue persistence failures ──────────────────────────────────────────────

#[tokio::test]
async fn unwritable_queue_rejects_submission_without_queueing_it() {
    let dir = tempfile::tempdir().unwrap();
    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
        .await
        .unwrap();

    // A directory in place of the queue file makes every save fail.
    fs::create_dir(dir.path().join("pending.json")).unwrap();

    let result = node.submit("https://lost.example".into(), None, None).await;
    assert!(matches!(result, Err(NodeError::Io(_))));
    assert_eq!(node.status().await.pending, 0);
}

#[tokio::test]
async fn unwritable_queue_still_reports_the_mined_block() {
    let dir = tempfile::tempdir().unwrap();
    let (node, _events) = Node::with_feeds(NodeConfig::in_dir(dir.path()), Vec::new())
        .await
        .unwrap();
    node.submit("https://kept.example".into(), Some("Kept".into()), None)
        .await
        .unwrap();

    let pending = dir.path().join("pending.json");
    fs::remove_file(&pending).unwrap();
    fs::create_dir(&pending).unwrap();

    let report = node.mine().await.expect("the block is committed");
    let MineOutcome::Mined(block) = report.outcome else {
        panic!("the pending submission should be mined");
    };
    assert_eq!(block.index, 1);
    assert!(matches!(report.queue_error, Some(NodeError::Io(_))));
    assert_eq!(node.store().len().await, 2);
    assert_eq!(node.status().await.pending, 0);
}
