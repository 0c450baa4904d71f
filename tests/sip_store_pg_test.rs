//! PostgreSQL SipStore Integration Tests
#![cfg(feature = "postgres")]

use sipdesk::config::DatabaseConfig;
use sipdesk::domain::dispatch_rule::{SipDispatchRule, SipDispatchRuleInfo};
use sipdesk::domain::sip_store::SipStore;
use sipdesk::domain::sip_trunk::{
    CreateSipTrunkRequest, SipInboundTrunkInfo, SipOutboundTrunkInfo,
};
use sipdesk::infrastructure::persistence::{create_pool, run_migrations, PgSipStore};
use sqlx::PgPool;

#[tokio::test]
#[ignore] // Requires database
async fn test_trunk_views() {
    let pool = setup_database().await;
    let store = PgSipStore::new(pool.clone());

    let mut inbound = SipInboundTrunkInfo::new("office").with_numbers(["+15550100"]);
    inbound.sip_trunk_id = "ST_pgtest_in".to_string();
    store
        .store_sip_inbound_trunk(&inbound)
        .await
        .expect("Failed to store inbound trunk");

    let mut outbound = SipOutboundTrunkInfo::new("carrier", "sip.carrier.net");
    outbound.sip_trunk_id = "ST_pgtest_out".to_string();
    store
        .store_sip_outbound_trunk(&outbound)
        .await
        .expect("Failed to store outbound trunk");

    let mut legacy = CreateSipTrunkRequest {
        outbound_address: "sip.legacy.net".to_string(),
        outbound_number: "+15550200".to_string(),
        ..Default::default()
    }
    .to_info();
    legacy.sip_trunk_id = "ST_pgtest_legacy".to_string();
    store
        .store_sip_trunk(&legacy)
        .await
        .expect("Failed to store legacy trunk");

    let loaded = store.load_sip_inbound_trunk("ST_pgtest_in").await.unwrap();
    assert_eq!(loaded, Some(inbound));
    assert!(store
        .load_sip_inbound_trunk("ST_pgtest_out")
        .await
        .unwrap()
        .is_none());

    let legacy_out = store
        .load_sip_outbound_trunk("ST_pgtest_legacy")
        .await
        .unwrap()
        .expect("legacy trunk has an outbound view");
    assert_eq!(legacy_out.address, "sip.legacy.net");

    let inbound_ids: Vec<String> = store
        .list_sip_inbound_trunk()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.sip_trunk_id)
        .filter(|id| id.starts_with("ST_pgtest_"))
        .collect();
    assert_eq!(inbound_ids, vec!["ST_pgtest_in", "ST_pgtest_legacy"]);

    assert!(store.delete_sip_trunk("ST_pgtest_out").await.unwrap());
    assert!(!store.delete_sip_trunk("ST_pgtest_out").await.unwrap());

    cleanup_database(pool).await;
}

#[tokio::test]
#[ignore] // Requires database
async fn test_dispatch_rule_trunk_index() {
    let pool = setup_database().await;
    let store = PgSipStore::new(pool.clone());

    let rule = |id: &str, trunks: &[&str]| {
        let mut rule = SipDispatchRuleInfo::new(SipDispatchRule::Direct {
            room_name: "lobby".to_string(),
            pin: String::new(),
        })
        .with_trunks(trunks.iter().copied());
        rule.sip_dispatch_rule_id = id.to_string();
        rule
    };

    store
        .store_sip_dispatch_rule(&rule("SDR_pgtest_a", &["ST_pgtest_1"]))
        .await
        .expect("Failed to store rule");
    store
        .store_sip_dispatch_rule(&rule("SDR_pgtest_b", &["ST_pgtest_1", "ST_pgtest_2"]))
        .await
        .expect("Failed to store rule");

    let ids = |rules: Vec<SipDispatchRuleInfo>| {
        rules
            .into_iter()
            .map(|r| r.sip_dispatch_rule_id)
            .filter(|id| id.starts_with("SDR_pgtest_"))
            .collect::<Vec<_>>()
    };

    let for_one = store
        .list_sip_dispatch_rule_by_trunk("ST_pgtest_1")
        .await
        .unwrap();
    assert_eq!(ids(for_one), vec!["SDR_pgtest_a", "SDR_pgtest_b"]);

    let b = store
        .load_sip_dispatch_rule("SDR_pgtest_b")
        .await
        .unwrap()
        .expect("rule was stored");
    store.delete_sip_dispatch_rule(&b).await.unwrap();

    let for_two = store
        .list_sip_dispatch_rule_by_trunk("ST_pgtest_2")
        .await
        .unwrap();
    assert!(ids(for_two).is_empty());

    cleanup_database(pool).await;
}

async fn setup_database() -> PgPool {
    let db_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/sipdesk_test".to_string());

    let config = DatabaseConfig {
        url: db_url,
        max_connections: 5,
        min_connections: 1,
        ..Default::default()
    };

    let pool = create_pool(&config).await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

async fn cleanup_database(pool: PgPool) {
    // Clean up test data
    sqlx::query("DELETE FROM sip_dispatch_rules WHERE id LIKE 'SDR_pgtest_%'")
        .execute(&pool)
        .await
        .ok();
    sqlx::query("DELETE FROM sip_trunks WHERE id LIKE 'ST_pgtest_%'")
        .execute(&pool)
        .await
        .ok();
    pool.close().await;
}
