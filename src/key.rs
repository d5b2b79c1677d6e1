use bitcoin::{
    hashes::{sha256, Hash},
    Address, Script,
};
use std::{fmt, str::FromStr};

/// Index key of a transaction output: SHA-256 over the raw locking-script bytes.
///
/// Every output paying to the same script (address reuse) shares one key, so a
/// lookup by key returns every transaction that ever paid to that script.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputKey(pub [u8; 32]);

impl OutputKey {
    /// Derive the key for a `scriptPubKey`.
    pub fn from_script(script: &Script) -> Self {
        Self(sha256::Hash::hash(script.as_bytes()).to_byte_array())
    }

    /// Derive the key for an address (via its `scriptPubKey`).
    pub fn from_address(address: &Address) -> Self {
        Self::from_script(&address.script_pubkey())
    }

    /// Raw digest bytes, as stored.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OutputKey({self})")
    }
}

impl FromStr for OutputKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Self(out))
    }
}
