use rand::RngCore;

/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Fresh 32-byte salt from the thread RNG.
pub fn random_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Salted commitment: H(value || salt).
pub fn create_commitment(value: &[u8], salt: &[u8; 32]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(value);
    hasher.update(salt);
    *hasher.finalize().as_bytes()
}

pub fn verify_commitment(value: &[u8], salt: &[u8; 32], commitment: &Hash) -> bool {
    create_commitment(value, salt) == *commitment
}


/// Serde adapter for 32-byte values carried as hex strings.
pub mod hex32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}
