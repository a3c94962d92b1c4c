//! Integration test: credential issuance across agents.

use std::collections::BTreeSet;
use std::sync::Arc;

use tessera_agent::AgentError;
use tessera_core::{AttributeValue, CoreError, IssuanceState};
use tessera_credentials::CredentialError;
use tessera_events::Event;
use tessera_integration_tests::{
    attributes, issue_to, link, parties, transcript_schema, transcript_values,
};

#[tokio::test]
async fn test_issue_and_store_transcript() {
    let p = parties();
    let schema = transcript_schema(&p.faber);
    issue_to(&p.faber, &p.alice, &schema, transcript_values()).await;

    let held = p.alice.wallet().get(&schema).expect("stored");
    assert_eq!(held.credential.get("degree"), Some(&AttributeValue::from("Bachelor of Science, Marketing")));
    assert_eq!(p.faber.issuer().issued_count(), 1);

    let received = p
        .alice
        .events()
        .history()
        .into_iter()
        .filter(|r| matches!(r.event, Event::ClaimReceived { .. }))
        .count();
    assert_eq!(received, 1);
}

#[tokio::test]
async fn test_concurrent_issue_yields_one_credential() {
    let p = parties();
    let schema = transcript_schema(&p.faber);

    // the same transcript offered over two links to Alice, claimed at once
    let mut nonces = Vec::new();
    for _ in 0..2 {
        let nonce = link(&p.alice, &p.faber, Vec::new()).await;
        p.faber
            .send_offer(&p.alice, &nonce, &schema, transcript_values())
            .unwrap();
        nonces.push(nonce);
    }
    let claims = nonces.iter().map(|nonce| {
        let alice = Arc::clone(&p.alice);
        let faber = Arc::clone(&p.faber);
        let nonce = nonce.clone();
        async move { alice.request_claim(&faber, &nonce, "Transcript").await }
    });
    let ids: BTreeSet<String> = futures::future::join_all(claims)
        .await
        .into_iter()
        .map(|r| r.unwrap().id().to_string())
        .collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(p.faber.issuer().issued_count(), 1);
    assert_eq!(p.alice.wallet().count(), 1);
}

#[tokio::test]
async fn test_unrequested_reoffer_is_not_issued() {
    let p = parties();
    let schema = transcript_schema(&p.faber);
    let nonce = issue_to(&p.faber, &p.alice, &schema, transcript_values()).await;

    let offer = p
        .faber
        .send_offer(&p.alice, &nonce, &schema, transcript_values())
        .unwrap();
    let calls = (0..4).map(|_| {
        let faber = Arc::clone(&p.faber);
        let offer_id = offer.id.clone();
        async move { faber.issuer().issue(&offer_id).await }
    });
    for result in futures::future::join_all(calls).await {
        assert!(matches!(
            result,
            Err(CredentialError::Core(CoreError::InvalidIssuanceTransition {
                from: IssuanceState::Offered,
                ..
            }))
        ));
    }
    assert_eq!(
        p.faber.issuer().offer_by_id(&offer.id).unwrap().state,
        IssuanceState::Offered
    );
    assert_eq!(p.faber.issuer().issued_count(), 1);
}

#[tokio::test]
async fn test_reissue_through_agents_is_idempotent() {
    let p = parties();
    let schema = transcript_schema(&p.faber);
    let nonce = issue_to(&p.faber, &p.alice, &schema, transcript_values()).await;
    let first = p.alice.wallet().get(&schema).unwrap();

    p.faber
        .send_offer(&p.alice, &nonce, &schema, transcript_values())
        .unwrap();
    let second = p
        .alice
        .request_claim(&p.faber, &nonce, "Transcript")
        .await
        .unwrap();
    assert_eq!(second.id(), first.id());
    assert_eq!(p.alice.wallet().count(), 1);

    // storing the same credential concurrently keeps one copy
    let stores = (0..4).map(|_| p.alice.store_credential(second.clone()));
    for result in futures::future::join_all(stores).await {
        result.unwrap();
    }
    assert_eq!(p.alice.wallet().count(), 1);
}

#[tokio::test]
async fn test_offer_rejects_schema_mismatch() {
    let p = parties();
    let schema = transcript_schema(&p.faber);
    let nonce = link(&p.alice, &p.faber, Vec::new()).await;

    let missing = attributes(&[("student_name", "Alice Garcia".into())]);
    assert!(matches!(
        p.faber.send_offer(&p.alice, &nonce, &schema, missing),
        Err(AgentError::Credential(CredentialError::SchemaMismatch { .. }))
    ));

    let mut wrong_type = transcript_values();
    wrong_type.insert("year".into(), 2015i64.into());
    assert!(matches!(
        p.faber.send_offer(&p.alice, &nonce, &schema, wrong_type),
        Err(AgentError::Credential(CredentialError::SchemaMismatch { .. }))
    ));
}

#[tokio::test]
async fn test_offer_over_unlinked_party_rejected() {
    let p = parties();
    let schema = transcript_schema(&p.faber);
    // Alice is linked to Acme, not Faber
    let nonce = link(&p.alice, &p.acme, Vec::new()).await;
    assert!(matches!(
        p.faber.send_offer(&p.alice, &nonce, &schema, transcript_values()),
        Err(AgentError::Credential(CredentialError::InvalidLink { .. }))
    ));
}

#[tokio::test]
async fn test_claim_available_event() {
    let p = parties();
    let schema = transcript_schema(&p.faber);
    let nonce = link(&p.alice, &p.faber, Vec::new()).await;
    p.faber
        .send_offer(&p.alice, &nonce, &schema, transcript_values())
        .unwrap();

    let event = p
        .alice
        .events()
        .wait_for_link("claim_available", &nonce, std::time::Duration::from_secs(1))
        .await
        .unwrap();
    assert!(matches!(event, Event::ClaimAvailable { schema_key, .. } if schema_key == schema));
    assert_eq!(p.faber.issuer().available_claims(p.alice.identifier(), &nonce).len(), 1);
}
