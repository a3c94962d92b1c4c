//! Integration test: proof requests answered by a holder and checked by
//! the party that sent them.

use tessera_agent::walkthrough::{job_application, loan_application_kyc, name_proof};
use tessera_agent::AgentError;
use tessera_core::{AttributeType, AttributeValue, Attributes, Predicate, ProofRequest};
use tessera_events::Event;
use tessera_integration_tests::{
    attributes, issue_to, job_certificate_schema, job_certificate_values, link, parties,
    transcript_schema, transcript_values,
};
use tessera_proof::ProofError;

fn applicant_details() -> Attributes {
    attributes(&[
        ("first_name", "Alice".into()),
        ("last_name", "Garcia".into()),
        ("phone_number", "123-456-7890".into()),
    ])
}

#[tokio::test]
async fn test_job_application_reveals_only_requested() {
    let p = parties();
    let transcript = transcript_schema(&p.faber);
    issue_to(&p.faber, &p.alice, &transcript, transcript_values()).await;

    let nonce = link(&p.alice, &p.acme, vec![job_application().unwrap()]).await;
    let verified = p
        .alice
        .send_proof(&p.acme, &nonce, "Job-Application", &applicant_details())
        .await
        .unwrap();

    assert_eq!(verified.holder, *p.alice.identifier());
    assert_eq!(verified.issuers, vec![p.faber.identifier().clone()]);
    assert_eq!(verified.attributes.len(), 6);
    assert!(!verified.attributes.contains_key("student_name"));
    assert!(!verified.attributes.contains_key("year"));

    assert!(p
        .acme
        .events()
        .history()
        .iter()
        .any(|r| matches!(&r.event, Event::ProofVerified { name, valid: true } if name == "Job-Application")));
}

#[tokio::test]
async fn test_missing_credential_is_insufficient() {
    let p = parties();
    let nonce = link(&p.alice, &p.acme, vec![job_application().unwrap()]).await;
    let result = p
        .alice
        .send_proof(&p.acme, &nonce, "Job-Application", &applicant_details())
        .await;
    match result {
        Err(AgentError::Proof(ProofError::InsufficientCredentials { missing, .. })) => {
            assert_eq!(missing, vec!["degree", "ssn", "status"]);
        }
        other => panic!("expected insufficient credentials, got {:?}", other.map(|v| v.request_name)),
    }
}

#[tokio::test]
async fn test_kyc_combines_two_issuers() {
    let p = parties();
    let transcript = transcript_schema(&p.faber);
    let certificate = job_certificate_schema(&p.acme);
    issue_to(&p.faber, &p.alice, &transcript, transcript_values()).await;
    issue_to(&p.acme, &p.alice, &certificate, job_certificate_values(3)).await;

    let nonce = link(
        &p.alice,
        &p.thrift,
        vec![loan_application_kyc().unwrap(), name_proof().unwrap()],
    )
    .await;
    let kyc = p
        .alice
        .send_proof(&p.thrift, &nonce, "Loan-Application-KYC", &Attributes::new())
        .await
        .unwrap();
    assert_eq!(kyc.issuers.len(), 2);
    assert_eq!(kyc.attributes["ssn"], AttributeValue::from("123-45-6789"));

    // a name alone comes from one credential
    let names = p
        .alice
        .send_proof(&p.thrift, &nonce, "Name-Proof", &Attributes::new())
        .await
        .unwrap();
    assert_eq!(names.issuers, vec![p.acme.identifier().clone()]);
}

#[tokio::test]
async fn test_experience_predicate() {
    let p = parties();
    let certificate = job_certificate_schema(&p.acme);
    issue_to(&p.acme, &p.alice, &certificate, job_certificate_values(3)).await;

    let request = |threshold| {
        ProofRequest::from_parts(
            &format!("Experience-{}", threshold),
            "0.1",
            &[
                ("employee_status", AttributeType::String),
                ("experience", AttributeType::Int),
            ],
            &["employee_status"],
        )
        .unwrap()
        .with_predicate(Predicate::at_least("experience", threshold))
        .unwrap()
    };
    let nonce = link(&p.alice, &p.thrift, vec![request(2), request(5)]).await;

    let verified = p
        .alice
        .send_proof(&p.thrift, &nonce, "Experience-2", &Attributes::new())
        .await
        .unwrap();
    assert_eq!(verified.predicates, vec![Predicate::at_least("experience", 2)]);
    assert!(!verified.attributes.contains_key("experience"));

    assert!(matches!(
        p.alice
            .send_proof(&p.thrift, &nonce, "Experience-5", &Attributes::new())
            .await,
        Err(AgentError::Proof(ProofError::InsufficientCredentials { .. }))
    ));
}

#[tokio::test]
async fn test_revoked_credential_cannot_be_used() {
    let p = parties();
    let transcript = transcript_schema(&p.faber);
    issue_to(&p.faber, &p.alice, &transcript, transcript_values()).await;
    let held = p.alice.wallet().get(&transcript).unwrap();

    let nonce = link(&p.alice, &p.acme, vec![job_application().unwrap()]).await;
    let proof = p
        .alice
        .send_proof(&p.acme, &nonce, "Job-Application", &applicant_details())
        .await;
    assert!(proof.is_ok());

    p.faber.revoke(held.id()).await.unwrap();
    assert!(matches!(
        p.alice
            .send_proof(&p.acme, &nonce, "Job-Application", &applicant_details())
            .await,
        Err(AgentError::Proof(ProofError::InsufficientCredentials { .. }))
    ));
}

#[tokio::test]
async fn test_issuer_rotation_invalidates_presented_credentials() {
    let p = parties();
    let transcript = transcript_schema(&p.faber);
    issue_to(&p.faber, &p.alice, &transcript, transcript_values()).await;
    let nonce = link(&p.alice, &p.acme, vec![job_application().unwrap()]).await;

    p.faber.rotate_key().unwrap();
    let result = p
        .alice
        .send_proof(&p.acme, &nonce, "Job-Application", &applicant_details())
        .await;
    assert!(matches!(
        result,
        Err(AgentError::Proof(ProofError::ProofInvalid(_)))
    ));
    assert!(p
        .alice
        .events()
        .history()
        .iter()
        .any(|r| matches!(&r.event, Event::ProofVerified { valid: false, .. })));
}

#[tokio::test]
async fn test_proof_from_other_party_rejected() {
    let p = parties();
    let transcript = transcript_schema(&p.faber);
    issue_to(&p.faber, &p.alice, &transcript, transcript_values()).await;

    // Acme's invitation was accepted by Thrift, not Alice
    let nonce = link(&p.thrift, &p.acme, vec![job_application().unwrap()]).await;
    let request = job_application().unwrap();
    let proof = tessera_proof::Prover::new(p.pool.revocations().clone())
        .build_proof(&request, p.alice.wallet(), &applicant_details())
        .unwrap();

    assert!(matches!(
        p.acme.verify_proof(&nonce, &proof).await,
        Err(AgentError::NotCounterpart { .. })
    ));
}

#[tokio::test]
async fn test_unknown_proof_request() {
    let p = parties();
    let nonce = link(&p.alice, &p.acme, vec![job_application().unwrap()]).await;
    assert!(matches!(
        p.alice
            .send_proof(&p.acme, &nonce, "Loan-Application-KYC", &Attributes::new())
            .await,
        Err(AgentError::UnknownProofRequest { .. })
    ));
}
