use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use tessera_core::{Attributes, ProofRequest, SchemaKey};
use tessera_credentials::{HeldCredential, RevocationRegistry};

use crate::error::ProofError;

/// Above this many candidate credentials the cover is built greedily instead
/// of by exhaustive search.
pub const EXACT_SEARCH_LIMIT: usize = 16;

/// Credentials chosen to answer a proof request.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Ordered by schema key.
    credentials: Vec<HeldCredential>,
    /// Attribute name → index into `credentials`.
    sources: BTreeMap<String, usize>,
}

impl Selection {
    pub fn credentials(&self) -> &[HeldCredential] {
        &self.credentials
    }

    /// The credential that supplies `attr`, if it comes from one.
    pub fn source(&self, attr: &str) -> Option<&HeldCredential> {
        self.sources
            .get(attr)
            .and_then(|&idx| self.credentials.get(idx))
    }

    pub fn schema_keys(&self) -> Vec<&SchemaKey> {
        self.credentials.iter().map(|c| c.schema_key()).collect()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Requested attributes that must be backed by a credential.
///
/// Verifiable and predicate attributes always are. A plain attribute is
/// not when a self-attested value of the requested type is supplied.
pub fn required_attributes(request: &ProofRequest, self_attested: &Attributes) -> Vec<String> {
    request
        .attributes()
        .iter()
        .filter(|(name, ty)| {
            request.is_verifiable(name)
                || request.predicate_for(name).is_some()
                || !self_attested
                    .get(name.as_str())
                    .is_some_and(|v| v.matches_type(**ty))
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Whether `held` can supply `attr` for `request`: the attribute is present
/// with the requested type and satisfies any predicate on it.
pub fn covers(request: &ProofRequest, held: &HeldCredential, attr: &str) -> bool {
    let (Some(ty), Some(value)) = (request.attributes().get(attr), held.credential.get(attr))
    else {
        return false;
    };
    if !value.matches_type(*ty) || held.opening(attr).is_none() {
        return false;
    }
    match request.predicate_for(attr) {
        Some(predicate) => value.as_int().is_some_and(|v| predicate.holds_for(v)),
        None => true,
    }
}

/// Pick the smallest set of credentials that together supply every
/// attribute the request needs from credentials.
///
/// Revoked and expired credentials are never picked. Among covers of equal
/// size the one earliest in schema-key order wins.
pub fn select_credentials(
    request: &ProofRequest,
    credentials: &[HeldCredential],
    self_attested: &Attributes,
    revocations: Option<&RevocationRegistry>,
) -> Result<Selection, ProofError> {
    let required = required_attributes(request, self_attested);
    let now = Utc::now();

    let mut candidates: Vec<&HeldCredential> = credentials
        .iter()
        .filter(|held| {
            let signed = &held.credential.signed;
            if signed.is_expired_at(now) {
                tracing::debug!(credential_id = %held.id(), "skipping expired credential");
                return false;
            }
            if revocations.is_some_and(|r| r.is_revoked(held.id(), &signed.issuer)) {
                tracing::debug!(credential_id = %held.id(), "skipping revoked credential");
                return false;
            }
            true
        })
        .filter(|held| required.iter().any(|attr| covers(request, held, attr)))
        .collect();
    candidates.sort_by(|a, b| {
        a.schema_key()
            .cmp(b.schema_key())
            .then_with(|| a.id().cmp(b.id()))
    });

    let missing: Vec<String> = required
        .iter()
        .filter(|attr| !candidates.iter().any(|c| covers(request, c, attr)))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ProofError::InsufficientCredentials {
            request: request.name().to_string(),
            missing,
        });
    }
    if required.is_empty() {
        return Ok(Selection::default());
    }

    let coverage: Vec<BTreeSet<usize>> = candidates
        .iter()
        .map(|held| {
            required
                .iter()
                .enumerate()
                .filter(|(_, attr)| covers(request, held, attr))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let chosen = if candidates.len() <= EXACT_SEARCH_LIMIT && required.len() <= 64 {
        exact_cover(&coverage, required.len())
            .unwrap_or_else(|| greedy_cover(&coverage, required.len()))
    } else {
        tracing::debug!(
            candidates = candidates.len(),
            "too many candidates for exact search, using greedy cover"
        );
        greedy_cover(&coverage, required.len())
    };

    let credentials: Vec<HeldCredential> = chosen.iter().map(|&i| candidates[i].clone()).collect();
    let mut sources = BTreeMap::new();
    for (attr_idx, attr) in required.iter().enumerate() {
        if let Some(pos) = chosen.iter().position(|&c| coverage[c].contains(&attr_idx)) {
            sources.insert(attr.clone(), pos);
        }
    }

    tracing::debug!(
        request = request.name(),
        selected = credentials.len(),
        candidates = candidates.len(),
        "credentials selected"
    );
    Ok(Selection {
        credentials,
        sources,
    })
}

/// Smallest cover by increasing size; within a size, the first combination
/// in index order.
fn exact_cover(coverage: &[BTreeSet<usize>], attr_count: usize) -> Option<Vec<usize>> {
    let masks: Vec<u64> = coverage
        .iter()
        .map(|set| set.iter().fold(0u64, |mask, &i| mask | (1 << i)))
        .collect();
    let full = if attr_count == 64 {
        u64::MAX
    } else {
        (1u64 << attr_count) - 1
    };

    let mut picked = Vec::new();
    (1..=masks.len()).find_map(|size| {
        picked.clear();
        search(&masks, full, size, 0, 0, &mut picked).then(|| picked.clone())
    })
}

fn search(
    masks: &[u64],
    full: u64,
    size: usize,
    start: usize,
    covered: u64,
    picked: &mut Vec<usize>,
) -> bool {
    if picked.len() == size {
        return covered == full;
    }
    for i in start..masks.len() {
        if masks.len() - i < size - picked.len() {
            break;
        }
        picked.push(i);
        if search(masks, full, size, i + 1, covered | masks[i], picked) {
            return true;
        }
        picked.pop();
    }
    false
}

fn greedy_cover(coverage: &[BTreeSet<usize>], attr_count: usize) -> Vec<usize> {
    let mut covered = BTreeSet::new();
    let mut chosen = Vec::new();
    while covered.len() < attr_count {
        let best = coverage
            .iter()
            .enumerate()
            .map(|(i, set)| (i, set.difference(&covered).count()))
            .filter(|(_, gain)| *gain > 0)
            // max_by_key keeps the last maximum; reverse to prefer the lowest index
            .rev()
            .max_by_key(|(_, gain)| *gain);
        let Some((i, _)) = best else { break };
        covered.extend(coverage[i].iter().copied());
        chosen.push(i);
    }
    chosen.sort_unstable();
    chosen
}
