//! Integration test: invitation signatures and the link lifecycle between
//! published agents.

use tessera_agent::AgentError;
use tessera_core::{AttributeType, LinkState, ProofRequest};
use tessera_events::Event;
use tessera_integration_tests::{link, parties};
use tessera_links::{Invitation, LinkError};

#[tokio::test]
async fn test_invitation_verifies_only_with_current_key() {
    let p = parties();
    let invitation = p.faber.invite(Vec::new()).unwrap();
    let faber = p.pool.registry().resolve(p.faber.identifier()).unwrap();
    assert!(invitation.verify(&faber).is_ok());

    // another identity's key never verifies it
    let acme = p.pool.registry().resolve(p.acme.identifier()).unwrap();
    assert!(matches!(
        invitation.verify(&acme),
        Err(LinkError::InvalidSignature(_))
    ));

    p.faber.rotate_key().unwrap();
    let rotated = p.pool.registry().resolve(p.faber.identifier()).unwrap();
    assert!(matches!(
        invitation.verify(&rotated),
        Err(LinkError::InvalidSignature(_))
    ));
    assert_eq!(p.pool.registry().history(p.faber.identifier()).len(), 2);

    let fresh = p.faber.invite(Vec::new()).unwrap();
    assert!(fresh.verify(&rotated).is_ok());
}

#[tokio::test]
async fn test_tampered_invitation_rejected() {
    let p = parties();
    let invitation = p.faber.invite(Vec::new()).unwrap();

    let mut renamed = invitation.clone();
    renamed.body.endpoint = "10.0.0.1:5555".into();
    assert!(matches!(
        p.alice.links().receive_invitation(&renamed.to_json().unwrap()).await,
        Err(LinkError::InvalidSignature(_))
    ));

    // claiming another party's identifier with Faber's signature
    let mut impersonated = invitation.clone();
    impersonated.body.identifier = p.acme.identifier().clone();
    assert!(matches!(
        p.alice.links().receive_invitation(&impersonated.to_json().unwrap()).await,
        Err(LinkError::InvalidSignature(_))
    ));

    assert!(p.alice.links().links().is_empty());
}

#[tokio::test]
async fn test_link_lifecycle_events() {
    let p = parties();
    let nonce = link(&p.alice, &p.faber, Vec::new()).await;

    let kinds: Vec<&str> = p
        .alice
        .events()
        .history()
        .iter()
        .filter(|r| r.event.nonce() == Some(nonce.as_str()))
        .map(|r| r.event.kind())
        .collect();
    assert_eq!(kinds, vec!["link_created", "link_synced", "link_accepted"]);

    let stored = p.alice.links().link(&nonce).unwrap();
    assert_eq!(stored.state, LinkState::Accepted);
    assert_eq!(stored.remote_identity, *p.faber.identifier());
    assert!(stored.synced_at.is_some());

    let issued = p.faber.links().issued_invitation(&nonce).unwrap();
    assert!(issued.accepted);
    assert_eq!(issued.counterpart.as_ref(), Some(p.alice.identifier()));
    assert!(p
        .faber
        .events()
        .history()
        .iter()
        .any(|r| matches!(&r.event, Event::LinkAccepted { nonce: n, .. } if *n == nonce)));
}

#[tokio::test]
async fn test_receiving_twice_returns_existing_link() {
    let p = parties();
    let invitation = p.faber.invite(Vec::new()).unwrap();
    let document = invitation.to_json().unwrap();

    let first = p.alice.links().receive_invitation(&document).await.unwrap();
    let second = p.alice.links().receive_invitation(&document).await.unwrap();
    assert_eq!(first.invitation_nonce, second.invitation_nonce);
    assert_eq!(p.alice.links().links().len(), 1);
    assert_eq!(
        p.alice.links().find_link_by_name("Faber College").unwrap().invitation_nonce,
        invitation.body.nonce
    );
}

#[tokio::test]
async fn test_ping_over_accepted_link() {
    let p = parties();
    let nonce = link(&p.alice, &p.thrift, Vec::new()).await;
    p.alice.ping(&nonce).await.unwrap();
    assert!(p
        .alice
        .events()
        .history()
        .iter()
        .any(|r| matches!(&r.event, Event::Pong { nonce: n } if *n == nonce)));

    assert!(matches!(
        p.alice.ping("00000000000000000000000000000000").await,
        Err(AgentError::Link(LinkError::UnknownLink(_)))
    ));
}

#[tokio::test]
async fn test_accept_after_expire_fails() {
    let p = parties();
    let invitation = p.faber.invite(Vec::new()).unwrap();
    let link = p
        .alice
        .links()
        .receive_invitation(&invitation.to_json().unwrap())
        .await
        .unwrap();
    p.alice.links().expire_link(&link.invitation_nonce).unwrap();
    assert!(p.alice.links().accept_link(&link.invitation_nonce).await.is_err());
}

#[test]
fn test_proof_request_subset_rule() {
    let ok = ProofRequest::from_parts(
        "Name-Proof",
        "0.1",
        &[("first_name", AttributeType::String), ("last_name", AttributeType::String)],
        &["first_name"],
    )
    .unwrap();
    assert!(ok
        .verifiable_attributes()
        .iter()
        .all(|a| ok.attributes().contains_key(a)));

    assert!(ProofRequest::from_parts(
        "Name-Proof",
        "0.1",
        &[("first_name", AttributeType::String)],
        &["ssn"],
    )
    .is_err());

    // the same rule applies to documents received from elsewhere
    let document = r#"{
        "link-invitation": {
            "name": "Thrift Bank",
            "identifier": "9jegUr9vAMqoqQQUEAiCBYNQDnUbTktQY9nNspxfasZW",
            "nonce": "77fbf9dc8c8e6acde33de98c6d747b28c",
            "endpoint": "127.0.0.1:7777"
        },
        "proof-requests": [{
            "name": "Loan-Application-KYC",
            "version": "0.1",
            "attributes": {"first_name": "string"},
            "verifiableAttributes": ["first_name", "ssn"]
        }],
        "sig": "sdf"
    }"#;
    assert!(matches!(
        Invitation::from_json(document),
        Err(LinkError::MalformedInvitation(_))
    ));
}
