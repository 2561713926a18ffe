mod common;

use anyhow::Result;
use common::{
    MemoryIndex, MemoryIndexClient, Op, catalog, cross_tenant_mutator, mutator, recommend_rule,
};
use idxsync::{
    EngineError, MutationTarget, Operation, OperationStatus, Outcome, RecommendCopyMode,
    RecommendCopyRequest, RecommendModel, TargetStatus,
};
use std::sync::Arc;

const MODEL: RecommendModel = RecommendModel::RelatedProducts;

fn source() -> MemoryIndex {
    catalog()
        .recommend_rules(
            MODEL,
            vec![
                recommend_rule("boost-1", "1"),
                recommend_rule("boost-6", "6"),
                recommend_rule("boost-7", "7"),
            ],
        )
        .recommend_rules(
            RecommendModel::BoughtTogether,
            vec![recommend_rule("bundle", "2")],
        )
}

fn target_with(ids: &[&str]) -> MemoryIndex {
    MemoryIndex::default().recommend_rules(
        MODEL,
        ids.iter().map(|id| recommend_rule(id, "legacy")).collect(),
    )
}

#[tokio::test]
async fn test_merge_upserts_and_keeps_target_rules() -> Result<()> {
    let client = Arc::new(
        MemoryIndexClient::new("APP")
            .with_index("products", source())
            .with_index("products_de", target_with(&["boost-1", "local"])),
    );
    let mutator = mutator(client.clone());

    let report = mutator
        .copy_recommend_rules(
            &[MutationTarget::primary("products_de")],
            &RecommendCopyRequest::new("products", MODEL),
            false,
        )
        .await?;

    assert_eq!(report.status, OperationStatus::Completed);
    assert_eq!(report.records_affected(), 3);
    let target = client.index("products_de").unwrap();
    assert_eq!(
        target.recommend_ids(MODEL),
        vec!["boost-1", "local", "boost-6", "boost-7"]
    );
    // the source copy overwrote the target's rule with the same id
    let boost = &target.recommend_rules[&MODEL][0];
    assert_eq!(boost.body["condition"]["context"], "1");
    // other models are untouched
    assert!(target.recommend_ids(RecommendModel::BoughtTogether).is_empty());
    assert_eq!(client.count(Op::DeleteRecommendRule), 0);
    Ok(())
}

#[tokio::test]
async fn test_replace_removes_stale_target_rules() -> Result<()> {
    let client = Arc::new(
        MemoryIndexClient::new("APP")
            .with_index("products", source())
            .with_index("products_de", target_with(&["local", "stale"])),
    );
    let mutator = mutator(client.clone());

    let request = RecommendCopyRequest::new("products", MODEL).mode(RecommendCopyMode::Replace);
    let report = mutator
        .copy_recommend_rules(&[MutationTarget::primary("products_de")], &request, true)
        .await?;

    assert_eq!(report.status, OperationStatus::Completed);
    assert_eq!(
        client.index("products_de").unwrap().recommend_ids(MODEL),
        vec!["boost-1", "boost-6", "boost-7"]
    );
    assert_eq!(client.count(Op::DeleteRecommendRule), 2);
    assert_eq!(client.count(Op::SaveRecommendRules), 1);
    Ok(())
}

#[tokio::test]
async fn test_unconfirmed_replace_makes_no_calls() {
    let client = Arc::new(MemoryIndexClient::new("APP").with_index("products", source()));
    let mutator = mutator(client.clone());

    let request = RecommendCopyRequest::new("products", MODEL).mode(RecommendCopyMode::Replace);
    let err = mutator
        .copy_recommend_rules(&[MutationTarget::primary("products_de")], &request, false)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::DestructiveAction { .. }));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_replace_onto_missing_target_creates_rules() -> Result<()> {
    let client = Arc::new(MemoryIndexClient::new("APP").with_index("products", source()));
    let mutator = mutator(client.clone());

    let request = RecommendCopyRequest::new("products", MODEL).mode(RecommendCopyMode::Replace);
    let report = mutator
        .copy_recommend_rules(&[MutationTarget::primary("fresh")], &request, true)
        .await?;

    assert_eq!(report.status, OperationStatus::Completed);
    assert_eq!(client.index("fresh").unwrap().recommend_ids(MODEL).len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_target_failure_does_not_stop_others() -> Result<()> {
    let source_client = Arc::new(MemoryIndexClient::new("SRC").with_index("products", source()));
    let destination = Arc::new(MemoryIndexClient::new("DST"));
    destination.fail("T2", Op::SaveRecommendRules, 500);
    let mutator = cross_tenant_mutator(source_client.clone(), destination.clone());

    let targets = [
        MutationTarget::secondary("T1"),
        MutationTarget::secondary("T2"),
        MutationTarget::secondary("T3"),
    ];
    let report = mutator
        .copy_recommend_rules(&targets, &RecommendCopyRequest::new("products", MODEL), false)
        .await?;

    assert_eq!(report.status, OperationStatus::CompletedWithFailures);
    assert!(report.results[0].is_success());
    assert!(matches!(report.results[1].status, TargetStatus::Failure(_)));
    assert!(report.results[2].is_success());
    assert_eq!(destination.index("T3").unwrap().recommend_ids(MODEL).len(), 3);
    assert!(source_client.writes().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_empty_source_writes_nothing() -> Result<()> {
    let client = Arc::new(
        MemoryIndexClient::new("APP")
            .with_index("products", catalog())
            .with_index("products_de", target_with(&["local"])),
    );
    let mutator = mutator(client.clone());

    let request = RecommendCopyRequest::new("products", MODEL).mode(RecommendCopyMode::Replace);
    let report = mutator
        .copy_recommend_rules(&[MutationTarget::primary("products_de")], &request, true)
        .await?;

    assert_eq!(report.status, OperationStatus::NothingMatched);
    assert!(client.writes().is_empty());
    assert_eq!(client.index("products_de").unwrap().recommend_ids(MODEL), vec!["local"]);
    Ok(())
}

#[tokio::test]
async fn test_source_as_target_rejected() {
    let client = Arc::new(MemoryIndexClient::new("APP").with_index("products", source()));
    let mutator = mutator(client.clone());

    let err = mutator
        .copy_recommend_rules(
            &[MutationTarget::primary("products")],
            &RecommendCopyRequest::new("products", MODEL),
            false,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Validation { .. }));
    assert!(client.writes().is_empty());
}

#[tokio::test]
async fn test_apply_dispatches_recommend_copy() -> Result<()> {
    let client = Arc::new(MemoryIndexClient::new("APP").with_index("products", source()));
    let mutator = mutator(client.clone());

    let outcome = mutator
        .apply(
            Operation::CopyRecommendRules {
                request: RecommendCopyRequest::new("products", RecommendModel::BoughtTogether),
                confirmed: false,
            },
            &[MutationTarget::primary("products_de")],
        )
        .await?;

    match outcome {
        Outcome::Mutated(report) => assert_eq!(report.records_affected(), 1),
        Outcome::Exported(_) => panic!("recommend copy must not export"),
    }
    assert_eq!(
        client
            .index("products_de")
            .unwrap()
            .recommend_ids(RecommendModel::BoughtTogether),
        vec!["bundle"]
    );
    Ok(())
}
