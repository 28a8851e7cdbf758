//! End-to-end episode tests over the public API, with scripted model
//! responses and mock retrievers.

use hypoforge::episode::{EpisodeConfig, EpisodeController};
use hypoforge::guardrail::BlocklistGuardrail;
use hypoforge::model::{Context, Direction, GeneSignal};
use hypoforge::provider::ScriptedProvider;
use hypoforge::retriever::{RetrievedPassage, StaticRetriever, UnavailableRetriever};
use std::sync::Arc;

fn context() -> Context {
    Context::new(
        vec![
            GeneSignal::new("TP53", Direction::Down),
            GeneSignal::new("BRCA1", Direction::Down),
        ],
        "triple negative breast cancer",
        "cisplatin resistance",
    )
    .with_known_hypotheses(vec!["PARP synthetic lethality".to_string()])
}

fn hypothesis_json(short: &str) -> String {
    format!(
        r#"{{
            "short_description": "{}", "long_description": "{} in detail",
            "novelty": 5, "not_novel": "none", "missing": "none",
            "superfluous": "none",
            "anomaly": {{"raised": false, "reason": ""}},
            "biohazard": {{"raised": false, "reason": ""}},
            "references": ["PMID:1"], "relation_to_literature": "extends"
        }}"#,
        short, short
    )
}

fn slate_json(shorts: &[&str]) -> String {
    let objects: Vec<String> = shorts.iter().map(|s| hypothesis_json(s)).collect();
    format!("[{}]", objects.join(","))
}

fn verdict_json(novelty: u8) -> String {
    format!(
        r#"{{
            "novelty": {}, "not_novel": "prior art", "missing": "dosing",
            "superfluous": "none",
            "anomaly": {{"raised": false, "reason": ""}},
            "biohazard": {{"raised": false, "reason": ""}},
            "references": ["PMID:2"], "relation_to_literature": "extends"
        }}"#,
        novelty
    )
}

fn biohazard_verdict_json(novelty: u8) -> String {
    format!(
        r#"{{
            "novelty": {}, "not_novel": "none", "missing": "none",
            "superfluous": "none",
            "anomaly": {{"raised": false, "reason": ""}},
            "biohazard": {{"raised": true, "reason": "dual-use method"}},
            "references": [], "relation_to_literature": "none"
        }}"#,
        novelty
    )
}

fn config(slate_size: usize, max_rounds: u32) -> EpisodeConfig {
    EpisodeConfig {
        slate_size,
        max_rounds,
        provider_retries: 0,
        retrieval_retries: 0,
        reformat_retries: 0,
        backoff_ms: 1,
        max_concurrent_calls: 1,
        ..EpisodeConfig::default()
    }
}

// === Scenario: full episode, slate of three, all accepted on round 0 ===

#[tokio::test]
async fn episode_accepts_full_slate_in_creation_order() {
    // Identical verdicts keep the test independent of lineage scheduling.
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_response(&slate_json(&["alpha", "beta", "gamma"]))
            .with_response(&verdict_json(9))
            .with_response(&verdict_json(9))
            .with_response(&verdict_json(9)),
    );
    let retriever = Arc::new(StaticRetriever::new(vec![RetrievedPassage {
        text: "PARP inhibitors in TNBC".to_string(),
        source: "PMID:1".to_string(),
        similarity: 0.9,
    }]));
    let controller = EpisodeController::new(provider, retriever, config(3, 2)).unwrap();

    let report = controller.run(context()).await.unwrap();
    assert_eq!(report.records.len(), 3);
    assert_eq!(report.accepted_count(), 3);
    assert!(report.failures.is_empty());

    let shorts: Vec<&str> = report
        .records
        .iter()
        .map(|r| r.short_description.as_str())
        .collect();
    assert_eq!(shorts, vec!["alpha", "beta", "gamma"]);
    for record in &report.records {
        assert!(record.fully_accepted);
        assert!(record.grounded);
        assert_eq!(record.rounds, 1);
        assert_eq!(record.novelty, 9);
    }
}

// === Scenario: rejection then revision then acceptance, single lineage ===

#[tokio::test]
async fn episode_revises_until_accepted() {
    // Call order for one lineage: slate, round-0 verdict, revision,
    // round-1 verdict.
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_response(&slate_json(&["vague idea"]))
            .with_response(&verdict_json(4))
            .with_response(&hypothesis_json("sharper idea"))
            .with_response(&verdict_json(8)),
    );
    let controller = EpisodeController::new(
        provider,
        Arc::new(StaticRetriever::empty()),
        config(1, 3),
    )
    .unwrap();

    let report = controller.run(context()).await.unwrap();
    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert!(record.fully_accepted);
    assert_eq!(record.short_description, "sharper idea");
    assert_eq!(record.rounds, 2);
    assert_eq!(record.novelty, 8);
}

// === Scenario: exhaustion surfaces the best rejected attempt ===

#[tokio::test]
async fn exhausted_lineage_surfaces_best_attempt() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_response(&slate_json(&["idea"]))
            .with_response(&verdict_json(5))
            .with_response(&hypothesis_json("weaker revision"))
            .with_response(&verdict_json(3)),
    );
    let controller = EpisodeController::new(
        provider,
        Arc::new(StaticRetriever::empty()),
        config(1, 2),
    )
    .unwrap();

    let report = controller.run(context()).await.unwrap();
    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert!(!record.fully_accepted);
    // Round 0 scored higher, so its hypothesis is the one emitted.
    assert_eq!(record.short_description, "idea");
    assert_eq!(record.novelty, 5);
    assert_eq!(report.accepted_count(), 0);
}

// === Scenario: a biohazard flag on every round is never accepted ===

#[tokio::test]
async fn biohazard_every_round_never_reaches_accepted() {
    // Top novelty every round; the biohazard flag alone must keep the
    // lineage from acceptance until the budget runs out.
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_response(&slate_json(&["risky idea"]))
            .with_response(&biohazard_verdict_json(10))
            .with_response(&hypothesis_json("still risky"))
            .with_response(&biohazard_verdict_json(10))
            .with_response(&hypothesis_json("risky again"))
            .with_response(&biohazard_verdict_json(10)),
    );
    let controller = EpisodeController::new(
        provider,
        Arc::new(StaticRetriever::empty()),
        config(1, 3),
    )
    .unwrap();

    let report = controller.run(context()).await.unwrap();
    assert_eq!(report.accepted_count(), 0);
    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert!(!record.fully_accepted);
    assert_eq!(record.rounds, 1, "ties on novelty emit the earliest round");
    assert_eq!(record.biohazard, "dual-use method");
}

// === Scenario: retrieval outage degrades to ungrounded, never aborts ===

#[tokio::test]
async fn retrieval_outage_yields_ungrounded_hypotheses() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_response(&slate_json(&["ungrounded idea"]))
            .with_response(&verdict_json(9)),
    );
    let controller = EpisodeController::new(
        provider,
        Arc::new(UnavailableRetriever),
        config(1, 1),
    )
    .unwrap();

    let report = controller.run(context()).await.unwrap();
    assert_eq!(report.records.len(), 1);
    assert!(report.records[0].fully_accepted);
    assert!(!report.records[0].grounded, "marked as drafted without literature");
}

// === Scenario: guardrail block consumes a round, revision recovers ===

#[tokio::test]
async fn guardrail_block_forces_a_revision_round() {
    // The blocked round skips the critic model call, so the script is:
    // slate, revision, round-1 verdict.
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_response(&slate_json(&["aerosolized delivery of the payload"]))
            .with_response(&hypothesis_json("intravenous delivery instead"))
            .with_response(&verdict_json(8)),
    );
    let controller = EpisodeController::with_guardrail(
        provider,
        Arc::new(StaticRetriever::empty()),
        config(1, 2),
        Some(Arc::new(BlocklistGuardrail::new(vec![
            "aerosolized".to_string(),
        ]))),
    )
    .unwrap();

    let report = controller.run(context()).await.unwrap();
    assert_eq!(report.records.len(), 1);
    let record = &report.records[0];
    assert!(record.fully_accepted);
    assert_eq!(record.short_description, "intravenous delivery instead");
    assert_eq!(record.rounds, 2);
}

// === Scenario: the report writes a readable CSV ===

#[tokio::test]
async fn episode_report_writes_csv() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_response(&slate_json(&["alpha", "beta"]))
            .with_response(&verdict_json(9))
            .with_response(&verdict_json(9)),
    );
    let controller = EpisodeController::new(
        provider,
        Arc::new(StaticRetriever::empty()),
        config(2, 1),
    )
    .unwrap();

    let report = controller.run(context()).await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hypotheses.csv");
    report.write_csv(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap();
    assert_eq!(header.split(',').count(), 10);
    assert_eq!(lines.count(), 2, "one row per emitted hypothesis");
    assert!(text.contains("alpha"));
    assert!(text.contains("beta"));
}
