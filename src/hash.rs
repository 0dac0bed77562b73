use crate::error::Result;
use crate::ring::IdSpace;
use sha2::{Digest, Sha256};

/// Derives a ring id for a node that was started without an explicit one.
pub fn generate_node_id(addr: &str, space: &IdSpace) -> Result<u64> {
    let hash = generate_hash64(addr.as_bytes())?;
    Ok(space.wrap(hash))
}

pub fn generate_hash64(input: &[u8]) -> Result<u64> {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let hash = hasher.finalize();
    let hash_bytes = &hash[..8];
    let hash_array: [u8; 8] = hash_bytes.try_into()?;
    let output = u64::from_be_bytes(hash_array);

    Ok(output)
}

#[test]
fn test_generate_hash64() -> Result<()> {
    let key = "key".to_owned();
    let hash = generate_hash64(key.as_bytes())?;
    let hash_retry = generate_hash64(key.as_bytes())?;

    assert_eq!(hash, hash_retry);
    Ok(())
}

#[test]
fn test_generate_node_id() -> Result<()> {
    let space = IdSpace::new(8)?;
    let id = generate_node_id("http://127.0.0.1:5000", &space)?;
    let id_retry = generate_node_id("http://127.0.0.1:5000", &space)?;

    assert_eq!(id, id_retry);
    assert!(id < space.size());
    Ok(())
}
