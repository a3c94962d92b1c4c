//! The getting-started scenario: Alice collects a transcript from Faber
//! College, applies for a job at Acme Corp, and applies for a loan at
//! Thrift Bank.

use std::sync::Arc;
use std::time::Duration;

use tessera_core::{AttributeType, AttributeValue, Attributes, ProofRequest, Role};
use tessera_events::Event;
use tessera_proof::VerifiedProof;

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::pool::Pool;

pub const FABER_NONCE: &str = "b1134a647eb818069c089e7694f63e6d";
pub const ACME_NONCE: &str = "57fbf9dc8c8e6acde33de98c6d747b28c";
pub const THRIFT_NONCE: &str = "77fbf9dc8c8e6acde33de98c6d747b28c";

/// How long to wait for any single event.
const WAIT_TIMEOUT: Duration = Duration::from_secs(20);

/// What the walkthrough produced.
#[derive(Debug, Clone)]
pub struct WalkthroughReport {
    /// Schema names of the credentials Alice holds, in schema-key order.
    pub credentials: Vec<String>,
    /// Proofs accepted by their verifiers, in the order they were sent.
    pub proofs: Vec<VerifiedProof>,
}

pub struct Parties {
    pub pool: Pool,
    pub steward: Arc<Agent>,
    pub faber: Arc<Agent>,
    pub acme: Arc<Agent>,
    pub thrift: Arc<Agent>,
    pub alice: Arc<Agent>,
}

/// Bring up the pool: a steward, three trust anchors and the configured
/// holder.
pub fn start_parties(config: &AgentConfig) -> Result<Parties, AgentError> {
    let pool = Pool::new(config.engine.clone());
    let steward = pool.bootstrap_steward("Steward", "127.0.0.1:5400")?;
    let faber = pool.onboard(&steward, "Faber College", "127.0.0.1:5555", Role::TrustAnchor)?;
    let acme = pool.onboard(&steward, "Acme Corp", "127.0.0.1:6666", Role::TrustAnchor)?;
    let thrift = pool.onboard(&steward, "Thrift Bank", "127.0.0.1:7777", Role::TrustAnchor)?;
    let alice = pool.onboard(&faber, &config.agent.name, &config.agent.endpoint, Role::User)?;
    Ok(Parties {
        pool,
        steward,
        faber,
        acme,
        thrift,
        alice,
    })
}

pub fn job_application() -> Result<ProofRequest, AgentError> {
    Ok(ProofRequest::from_parts(
        "Job-Application",
        "0.2",
        &[
            ("first_name", AttributeType::String),
            ("last_name", AttributeType::String),
            ("phone_number", AttributeType::String),
            ("degree", AttributeType::String),
            ("status", AttributeType::String),
            ("ssn", AttributeType::String),
        ],
        &["degree", "status", "ssn"],
    )?)
}

pub fn loan_application_basic() -> Result<ProofRequest, AgentError> {
    Ok(ProofRequest::from_parts(
        "Loan-Application-Basic",
        "0.1",
        &[
            ("salary_bracket", AttributeType::String),
            ("employee_status", AttributeType::String),
        ],
        &["salary_bracket", "employee_status"],
    )?)
}

pub fn loan_application_kyc() -> Result<ProofRequest, AgentError> {
    Ok(ProofRequest::from_parts(
        "Loan-Application-KYC",
        "0.1",
        &[
            ("first_name", AttributeType::String),
            ("last_name", AttributeType::String),
            ("ssn", AttributeType::String),
        ],
        &["first_name", "last_name", "ssn"],
    )?)
}

pub fn name_proof() -> Result<ProofRequest, AgentError> {
    Ok(ProofRequest::from_parts(
        "Name-Proof",
        "0.1",
        &[
            ("first_name", AttributeType::String),
            ("last_name", AttributeType::String),
        ],
        &["first_name", "last_name"],
    )?)
}

fn attributes(pairs: &[(&str, AttributeValue)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Run the whole scenario in-process.
pub async fn run(config: &AgentConfig) -> Result<WalkthroughReport, AgentError> {
    let parties = start_parties(config)?;
    let Parties {
        faber,
        acme,
        thrift,
        alice,
        ..
    } = &parties;
    let mut proofs = Vec::new();

    // Faber College: link, then the transcript
    let transcript = faber.publish_schema(
        "Transcript",
        "1.2",
        &[
            ("student_name", AttributeType::String),
            ("ssn", AttributeType::String),
            ("degree", AttributeType::String),
            ("year", AttributeType::String),
            ("status", AttributeType::String),
        ],
    )?;
    let invitation = faber.invite_with_nonce(FABER_NONCE, Vec::new())?;
    establish_link(alice, &invitation.to_json()?).await?;
    alice.ping(FABER_NONCE).await?;
    alice
        .events()
        .wait_for_link("pong", FABER_NONCE, WAIT_TIMEOUT)
        .await?;

    faber.send_offer(
        alice,
        FABER_NONCE,
        &transcript.key,
        attributes(&[
            ("student_name", "Alice Garcia".into()),
            ("ssn", "123-45-6789".into()),
            ("degree", "Bachelor of Science, Marketing".into()),
            ("year", "2015".into()),
            ("status", "graduated".into()),
        ]),
    )?;
    wait_for_claim_available(alice, FABER_NONCE, "Transcript").await?;
    alice.request_claim(faber, FABER_NONCE, "Transcript").await?;
    wait_for_claim_received(alice, "Transcript").await?;

    // Acme Corp: job application, then the job certificate
    let job_certificate = acme.publish_schema(
        "Job-Certificate",
        "0.2",
        &[
            ("first_name", AttributeType::String),
            ("last_name", AttributeType::String),
            ("salary_bracket", AttributeType::String),
            ("employee_status", AttributeType::String),
            ("experience", AttributeType::Int),
        ],
    )?;
    let invitation = acme.invite_with_nonce(ACME_NONCE, vec![job_application()?])?;
    establish_link(alice, &invitation.to_json()?).await?;

    let self_attested = attributes(&[
        ("first_name", "Alice".into()),
        ("last_name", "Garcia".into()),
        ("phone_number", "123-456-7890".into()),
    ]);
    proofs.push(
        alice
            .send_proof(acme, ACME_NONCE, "Job-Application", &self_attested)
            .await?,
    );
    wait_for_proof(acme, "Job-Application").await?;

    acme.send_offer(
        alice,
        ACME_NONCE,
        &job_certificate.key,
        attributes(&[
            ("first_name", "Alice".into()),
            ("last_name", "Garcia".into()),
            ("salary_bracket", "between $50,000 to $100,000".into()),
            ("employee_status", "Permanent".into()),
            ("experience", 3i64.into()),
        ]),
    )?;
    wait_for_claim_available(alice, ACME_NONCE, "Job-Certificate").await?;
    alice.request_claim(acme, ACME_NONCE, "Job-Certificate").await?;
    wait_for_claim_received(alice, "Job-Certificate").await?;

    // Thrift Bank: basic loan application, then KYC
    let invitation = thrift.invite_with_nonce(
        THRIFT_NONCE,
        vec![loan_application_basic()?, loan_application_kyc()?, name_proof()?],
    )?;
    establish_link(alice, &invitation.to_json()?).await?;

    for request in ["Loan-Application-Basic", "Loan-Application-KYC"] {
        proofs.push(
            alice
                .send_proof(thrift, THRIFT_NONCE, request, &Attributes::new())
                .await?,
        );
        wait_for_proof(thrift, request).await?;
    }

    let credentials = alice
        .wallet()
        .all()
        .iter()
        .map(|c| c.schema_key().name.clone())
        .collect();
    tracing::info!(holder = %alice.name(), proofs = proofs.len(), "walkthrough complete");
    Ok(WalkthroughReport {
        credentials,
        proofs,
    })
}

async fn establish_link(holder: &Agent, document: &str) -> Result<(), AgentError> {
    let link = holder.links().receive_invitation(document).await?;
    let nonce = link.invitation_nonce.as_str();
    holder.links().sync_link(nonce).await?;
    holder
        .events()
        .wait_for_link("link_synced", nonce, WAIT_TIMEOUT)
        .await?;
    holder.links().accept_link(nonce).await?;
    holder
        .events()
        .wait_for_link("link_accepted", nonce, WAIT_TIMEOUT)
        .await?;
    Ok(())
}

async fn wait_for_claim_available(holder: &Agent, nonce: &str, name: &str) -> Result<(), AgentError> {
    holder
        .events()
        .wait_for(
            |e| {
                matches!(e, Event::ClaimAvailable { nonce: n, schema_key }
                    if n == nonce && schema_key.name == name)
            },
            WAIT_TIMEOUT,
        )
        .await?;
    Ok(())
}

async fn wait_for_claim_received(holder: &Agent, name: &str) -> Result<(), AgentError> {
    holder
        .events()
        .wait_for(
            |e| matches!(e, Event::ClaimReceived { schema_key, .. } if schema_key.name == name),
            WAIT_TIMEOUT,
        )
        .await?;
    Ok(())
}

async fn wait_for_proof(verifier: &Agent, name: &str) -> Result<(), AgentError> {
    verifier
        .events()
        .wait_for(
            |e| matches!(e, Event::ProofVerified { name: n, valid: true } if n == name),
            WAIT_TIMEOUT,
        )
        .await?;
    Ok(())
}
