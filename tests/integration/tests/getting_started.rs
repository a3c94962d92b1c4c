//! Integration test: the getting-started walkthrough end to end, and the
//! sample invitation documents from the guide.

use tessera_agent::walkthrough;
use tessera_core::{AttributeValue, Identifier, Role};
use tessera_crypto::KeyPair;
use tessera_identity::Identity;
use tessera_integration_tests::{fast_config, parties, ACME_INVITE, FABER_INVITE, THRIFT_INVITE};
use tessera_links::{Invitation, LinkError};

#[tokio::test]
async fn test_walkthrough_produces_all_proofs() {
    let report = walkthrough::run(&fast_config()).await.expect("walkthrough");

    assert_eq!(report.credentials, vec!["Job-Certificate", "Transcript"]);
    assert_eq!(report.proofs.len(), 3);

    let job = &report.proofs[0];
    assert_eq!(job.request_name, "Job-Application");
    assert_eq!(job.attributes["status"], AttributeValue::from("graduated"));
    assert_eq!(job.attributes["ssn"], AttributeValue::from("123-45-6789"));
    let mut self_attested = job.self_attested.clone();
    self_attested.sort();
    assert_eq!(self_attested, vec!["first_name", "last_name", "phone_number"]);

    let basic = &report.proofs[1];
    assert_eq!(basic.issuers.len(), 1);
    assert_eq!(basic.attributes["employee_status"], AttributeValue::from("Permanent"));

    let kyc = &report.proofs[2];
    assert_eq!(kyc.issuers.len(), 2);
    assert_eq!(kyc.attributes["first_name"], AttributeValue::from("Alice"));
}

#[tokio::test]
async fn test_walkthrough_uses_configured_holder() {
    let mut config = fast_config();
    config.agent.name = "Bob".into();
    config.agent.endpoint = "127.0.0.1:5900".into();
    let report = walkthrough::run(&config).await.expect("walkthrough");
    assert_eq!(report.proofs.len(), 3);
}

#[test]
fn test_sample_invitations_parse() {
    let faber = Invitation::from_json(FABER_INVITE).unwrap();
    assert_eq!(faber.body.name, "Faber College");
    assert_eq!(faber.body.nonce, walkthrough::FABER_NONCE);
    assert!(faber.proof_requests.is_empty());

    let thrift = Invitation::from_json(THRIFT_INVITE).unwrap();
    assert_eq!(thrift.body.endpoint, "127.0.0.1:7777");
    assert_eq!(thrift.proof_requests.len(), 3);
    let kyc = thrift.proof_request("Loan-Application-KYC").unwrap();
    assert_eq!(kyc.verifiable_attributes(), ["first_name", "last_name", "ssn"]);

    let acme = Invitation::from_json(ACME_INVITE).unwrap();
    assert_eq!(acme.sig, "sdf");
    let job = acme.proof_request("Job-Application").unwrap();
    assert_eq!(job.version(), "0.2");
    assert_eq!(job.attributes().len(), 6);
    assert!(!job.is_verifiable("phone_number"));
}

#[tokio::test]
async fn test_sample_invitations_from_unpublished_issuers() {
    let p = parties();
    for document in [FABER_INVITE, THRIFT_INVITE, ACME_INVITE] {
        assert!(matches!(
            p.alice.links().receive_invitation(document).await,
            Err(LinkError::UnknownIssuer(_))
        ));
    }
    assert!(p.alice.links().links().is_empty());
}

#[test]
fn test_placeholder_signature_rejected() {
    let acme = Invitation::from_json(ACME_INVITE).unwrap();
    let key = KeyPair::generate();
    let claimed = Identity::new(
        Identifier::new("7YD5NKn3P4wVJLesAmA1rr7sLPqW9mR1nhFdKD518k21").unwrap(),
        key.verkey(),
        Role::TrustAnchor,
        Some("127.0.0.1:6666".into()),
    );
    assert!(matches!(
        acme.verify(&claimed),
        Err(LinkError::InvalidSignature(_))
    ));
}

#[tokio::test]
async fn test_placeholder_signature_on_published_issuer() {
    let p = parties();
    let mut invitation = p
        .acme
        .invite_with_nonce(walkthrough::ACME_NONCE, vec![walkthrough::job_application().unwrap()])
        .unwrap();
    invitation.sig = "sdf".into();

    let result = p
        .alice
        .links()
        .receive_invitation(&invitation.to_json().unwrap())
        .await;
    assert!(matches!(result, Err(LinkError::InvalidSignature(_))));
    assert!(p.alice.links().link(walkthrough::ACME_NONCE).is_none());
}
