//! CID (Content Identifier) utilities
//!
//! Every backend derives handles the same way: CIDv1, `raw` codec, BLAKE3-256
//! multihash. An IPFS node asked for `cid-codec=raw&mhtype=blake3` produces
//! the identical CID for the identical bytes.

use crate::{BlockStoreError, Result};
use cid::{Cid, Version};
use multihash_codetable::{Code, MultihashDigest};

/// Multicodec code for raw binary blocks
pub const RAW_CODEC: u64 = 0x55;

/// Path prefix used by IPFS gateways
pub const IPFS_PATH_PREFIX: &str = "/ipfs/";

/// Create the CID of a block
pub fn create_cid(data: &[u8]) -> Cid {
    Cid::new_v1(RAW_CODEC, Code::Blake3_256.digest(data))
}

/// Verify that data matches a CID
///
/// The digest is recomputed with the CID's own hash function, so CIDs minted
/// elsewhere (e.g. SHA2-256 by a gateway) verify as well. Unknown hash
/// functions never verify.
pub fn verify_cid(data: &[u8], cid: &Cid) -> bool {
    let Ok(code) = Code::try_from(cid.hash().code()) else {
        return false;
    };
    let digest = code.digest(data);
    digest.digest() == cid.hash().digest()
}

/// Parse a CID from a string, accepting the `/ipfs/<cid>` gateway form
pub fn parse_cid(s: &str) -> Result<Cid> {
    let trimmed = s.trim();
    let raw = trimmed.strip_prefix(IPFS_PATH_PREFIX).unwrap_or(trimmed);
    raw.trim_end_matches('/')
        .parse()
        .map_err(|e: cid::Error| BlockStoreError::InvalidCid(format!("{}: {}", s, e)))
}

/// Render a CID as a gateway path
pub fn cid_to_path(cid: &Cid) -> String {
    format!("{}{}", IPFS_PATH_PREFIX, cid)
}

/// Check whether a CID was produced by [`create_cid`]
pub fn is_native(cid: &Cid) -> bool {
    cid.version() == Version::V1
        && cid.codec() == RAW_CODEC
        && cid.hash().code() == u64::from(Code::Blake3_256)
}
