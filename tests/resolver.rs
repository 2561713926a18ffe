mod common;

use anyhow::Result;
use common::{MemoryIndex, MemoryIndexClient, Op, catalog, test_config};
use idxsync::{
    EngineError, FilterClause, IdentifierResolver, ProgressLog, RawValueList, ResolutionMode,
    Selection,
};

fn sorted_ids(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[tokio::test]
async fn test_resolve_by_identifier_reports_unmatched() -> Result<()> {
    let client = MemoryIndexClient::new("APP").with_index("products", catalog());
    let config = test_config();
    let log = ProgressLog::new();
    let resolver = IdentifierResolver::new(&client, &config, &log);

    let raw = RawValueList::parse("1, 3\n99;1");
    let resolution = resolver
        .resolve("products", &raw, &ResolutionMode::ByIdentifier, None)
        .await?;

    assert_eq!(resolution.ids(), vec!["1", "3"]);
    assert_eq!(resolution.requested, 3);
    assert_eq!(resolution.unmatched, vec!["99"]);
    assert!(resolution.attribute.is_none());
    assert_eq!(client.count(Op::GetObjects), 1);
    Ok(())
}

#[tokio::test]
async fn test_resolve_by_distinct_attribute_is_idempotent() -> Result<()> {
    let client = MemoryIndexClient::new("APP").with_index("products", catalog());
    let config = test_config();
    let log = ProgressLog::new();
    let resolver = IdentifierResolver::new(&client, &config, &log);

    let raw = RawValueList::parse("G1 G3");
    let first = resolver
        .resolve("products", &raw, &ResolutionMode::by_distinct(), None)
        .await?;
    let second = resolver
        .resolve("products", &raw, &ResolutionMode::by_distinct(), None)
        .await?;

    assert_eq!(first.attribute.as_deref(), Some("group"));
    assert_eq!(first.len(), 6);
    assert_eq!(sorted_ids(first.ids()), sorted_ids(second.ids()));
    assert!(first.unmatched.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_explicit_attribute_skips_settings_lookup() -> Result<()> {
    let client = MemoryIndexClient::new("APP").with_index("products", catalog());
    let config = test_config();
    let log = ProgressLog::new();
    let resolver = IdentifierResolver::new(&client, &config, &log);

    let raw = RawValueList::parse("red|purple");
    let resolution = resolver
        .resolve("products", &raw, &ResolutionMode::by_attribute("color"), None)
        .await?;

    assert_eq!(sorted_ids(resolution.ids()), vec!["1", "6", "7"]);
    assert_eq!(resolution.unmatched, vec!["purple"]);
    assert_eq!(client.count(Op::GetSettings), 0);
    assert!(
        log.events()
            .iter()
            .any(|e| e.message.contains("no matching objects for color \"purple\""))
    );
    Ok(())
}

#[tokio::test]
async fn test_missing_distinct_attribute_is_configuration_error() {
    let index = MemoryIndex::with_records(vec![common::product("1", "G1", "red", 1.0)]);
    let client = MemoryIndexClient::new("APP").with_index("plain", index);
    let config = test_config();
    let log = ProgressLog::new();
    let resolver = IdentifierResolver::new(&client, &config, &log);

    let err = resolver
        .resolve(
            "plain",
            &RawValueList::parse("G1"),
            &ResolutionMode::by_distinct(),
            None,
        )
        .await
        .unwrap_err();

    match err {
        EngineError::Configuration { index, .. } => assert_eq!(index, "plain"),
        other => panic!("expected a configuration error, got {:?}", other),
    }
    assert_eq!(client.count(Op::Browse), 0);
}

#[tokio::test]
async fn test_empty_input_fails_before_any_call() {
    let client = MemoryIndexClient::new("APP").with_index("products", catalog());
    let config = test_config();
    let log = ProgressLog::new();
    let resolver = IdentifierResolver::new(&client, &config, &log);

    let err = resolver
        .resolve(
            "products",
            &RawValueList::parse(" ,; \n"),
            &ResolutionMode::by_distinct(),
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::EmptyInput { .. }));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_index_name_with_whitespace_is_rejected() {
    let client = MemoryIndexClient::new("APP").with_index("products", catalog());
    let config = test_config();
    let log = ProgressLog::new();
    let resolver = IdentifierResolver::new(&client, &config, &log);

    let err = resolver
        .resolve_selection("my products", &Selection::ids(RawValueList::parse("1")), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation { .. }));
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn test_filters_with_distinct_keep_one_per_value() -> Result<()> {
    let client = MemoryIndexClient::new("APP").with_index("products", catalog());
    let config = test_config();
    let log = ProgressLog::new();
    let resolver = IdentifierResolver::new(&client, &config, &log);

    let selection = Selection::Filters {
        clauses: vec![FilterClause::parse("group:G1")?],
        distinct: true,
    };
    let columns = vec!["price".to_string()];
    let resolution = resolver
        .resolve_selection("products", &selection, Some(columns.as_slice()))
        .await?;

    assert_eq!(resolution.ids(), vec!["1"]);
    assert_eq!(resolution.attribute.as_deref(), Some("group"));
    assert!(resolution.records[0].get("price").is_some());

    let selection = Selection::Filters {
        clauses: vec![
            FilterClause::parse("group:G1")?,
            FilterClause::parse("color=\"blue\"")?,
        ],
        distinct: false,
    };
    let resolution = resolver
        .resolve_selection("products", &selection, None)
        .await?;
    assert_eq!(resolution.ids(), vec!["2"]);
    Ok(())
}
