//! Fixtures shared by the integration tests.

use std::sync::Arc;

use tessera_agent::walkthrough::{self, Parties};
use tessera_agent::{Agent, AgentConfig};
use tessera_core::{AttributeType, AttributeValue, Attributes, ProofRequest, RetryPolicy, SchemaKey};

/// Sample documents from the getting-started guide. Their issuers are not
/// published on a fresh pool, and Acme's signature is a placeholder.
pub const FABER_INVITE: &str = r#"{
  "link-invitation": {
    "name": "Faber College",
    "identifier": "FuN98eH2eZybECWkofW6A9BKJxxnTatBCopfUiNxo6ZB",
    "nonce": "b1134a647eb818069c089e7694f63e6d",
    "endpoint": "127.0.0.1:5555"
  },
  "sig": "4QKqkwv9gXmc3Sw7YFkGm2vdF6ViZz9FKZcNJGh6pjnjgBXRqZ17Sk8bUDSb6hsXHoPxrzq2F51eDn1DKAaCzhqP"
}"#;

pub const THRIFT_INVITE: &str = r#"{
  "link-invitation": {
    "name": "Thrift Bank",
    "identifier": "9jegUr9vAMqoqQQUEAiCBYNQDnUbTktQY9nNspxfasZW",
    "nonce": "77fbf9dc8c8e6acde33de98c6d747b28c",
    "endpoint": "127.0.0.1:7777"
  },
  "proof-requests": [{
      "name": "Loan-Application-Basic",
      "version": "0.1",
      "attributes": {
            "salary_bracket": "string",
            "employee_status": "string"
       },
       "verifiableAttributes": ["salary_bracket", "employee_status"]
    }, {
      "name": "Loan-Application-KYC",
      "version": "0.1",
      "attributes": {
            "first_name": "string",
            "last_name": "string",
            "ssn": "string"
      },
      "verifiableAttributes": ["first_name", "last_name", "ssn"]
    }, {
      "name": "Name-Proof",
      "version": "0.1",
      "attributes": {
            "first_name": "string",
            "last_name": "string"
      },
      "verifiableAttributes": ["first_name", "last_name"]
    }],
  "sig": "D1vU5fbtJbqWKdCoVJgqHBLLhh5CYspikuEXdnBVVyCnLHiYC9ZsZrDWpz3GkFFGvfC4RQ4kuB64vUFLo3F7Xk6"
}"#;

pub const ACME_INVITE: &str = r#"{
    "link-invitation": {
        "name": "Acme Corp",
        "identifier": "7YD5NKn3P4wVJLesAmA1rr7sLPqW9mR1nhFdKD518k21",
        "nonce": "57fbf9dc8c8e6acde33de98c6d747b28c",
        "endpoint": "127.0.0.1:6666"
    },
    "proof-requests": [{
      "name": "Job-Application",
      "version": "0.2",
      "attributes": {
          "first_name": "string",
          "last_name": "string",
          "phone_number": "string",
          "degree": "string",
          "status": "string",
          "ssn": "string"
      },
      "verifiableAttributes": ["degree", "status", "ssn"]
    }],
    "sig": "sdf"
}"#;

/// Agent config with short retry delays.
pub fn fast_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.engine.retry = RetryPolicy {
        initial_delay_ms: 1,
        max_delay_ms: 10,
        max_attempts: 3,
        ..RetryPolicy::default()
    };
    config.engine.transport_timeout_ms = 500;
    config
}

pub fn parties() -> Parties {
    walkthrough::start_parties(&fast_config()).expect("pool should start")
}

pub fn attributes(pairs: &[(&str, AttributeValue)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Have `holder` accept a fresh invitation from `inviter`. Returns the nonce.
pub async fn link(holder: &Agent, inviter: &Agent, proof_requests: Vec<ProofRequest>) -> String {
    let invitation = inviter.invite(proof_requests).expect("invite");
    let link = holder
        .accept_invitation(&invitation.to_json().expect("json"))
        .await
        .expect("link should be accepted");
    assert!(link.is_accepted());
    invitation.body.nonce
}

pub fn transcript_schema(faber: &Agent) -> SchemaKey {
    faber
        .publish_schema(
            "Transcript",
            "1.2",
            &[
                ("student_name", AttributeType::String),
                ("ssn", AttributeType::String),
                ("degree", AttributeType::String),
                ("year", AttributeType::String),
                ("status", AttributeType::String),
            ],
        )
        .expect("publish transcript")
        .key
}

pub fn transcript_values() -> Attributes {
    attributes(&[
        ("student_name", "Alice Garcia".into()),
        ("ssn", "123-45-6789".into()),
        ("degree", "Bachelor of Science, Marketing".into()),
        ("year", "2015".into()),
        ("status", "graduated".into()),
    ])
}

pub fn job_certificate_schema(acme: &Agent) -> SchemaKey {
    acme.publish_schema(
        "Job-Certificate",
        "0.2",
        &[
            ("first_name", AttributeType::String),
            ("last_name", AttributeType::String),
            ("salary_bracket", AttributeType::String),
            ("employee_status", AttributeType::String),
            ("experience", AttributeType::Int),
        ],
    )
    .expect("publish job certificate")
    .key
}

pub fn job_certificate_values(experience: i64) -> Attributes {
    attributes(&[
        ("first_name", "Alice".into()),
        ("last_name", "Garcia".into()),
        ("salary_bracket", "between $50,000 to $100,000".into()),
        ("employee_status", "Permanent".into()),
        ("experience", experience.into()),
    ])
}

/// Link `holder` to `issuer`, offer `values` under `schema` and collect it.
pub async fn issue_to(
    issuer: &Arc<Agent>,
    holder: &Arc<Agent>,
    schema: &SchemaKey,
    values: Attributes,
) -> String {
    let nonce = link(holder, issuer, Vec::new()).await;
    issuer
        .send_offer(holder, &nonce, schema, values)
        .expect("offer");
    holder
        .request_claim(issuer, &nonce, &schema.name)
        .await
        .expect("claim");
    nonce
}
