//! Banano wallet generation.
//!
//! A wallet is derived from 32 random seed bytes: the private key for account
//! index 0 is `blake2b-256(seed || index_be)`, the public key is Ed25519 with
//! Blake2b-512 as the expansion hash, and the address is the Nano base32
//! encoding of the public key followed by a 5-byte Blake2b checksum.

use crate::errors::AppError;
use blake2::digest::consts::{U32, U5};
use blake2::{Blake2b, Blake2b512, Digest};
use curve25519_dalek::edwards::EdwardsPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::fmt;

/// Nano's base32 alphabet (no `0`, `2`, `l`, `v`).
const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

pub const ADDRESS_PREFIX: &str = "ban_";

/// Encoded length of the public key part of an address (256 bits + 4 padding bits).
const KEY_CHARS: usize = 52;
const CHECKSUM_CHARS: usize = 8;

type Blake2b256 = Blake2b<U32>;
type Blake2b40 = Blake2b<U5>;

/// A freshly generated wallet. The secret is the hex encoded seed.
#[derive(Clone, PartialEq, Eq)]
pub struct Wallet {
    pub address: String,
    pub secret: String,
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl Wallet {
    /// Generates a wallet from OS randomness.
    ///
    /// A failing randomness source is reported, never retried.
    pub fn generate() -> Result<Self, AppError> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| AppError::KeyDerivation(format!("OS randomness unavailable: {}", e)))?;
        Ok(Self::from_seed(&seed))
    }

    /// Deterministically derives the first account of `seed`.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let private_key = derive_private_key(seed, 0);
        let public_key = public_key(&private_key);
        Self {
            address: public_key_to_address(&public_key),
            secret: hex::encode(seed),
        }
    }
}

/// Derives the private key for account `index` of `seed`.
pub fn derive_private_key(seed: &[u8; 32], index: u32) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(seed);
    hasher.update(index.to_be_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Ed25519 public key using Blake2b-512 in place of SHA-512.
pub fn public_key(private_key: &[u8; 32]) -> [u8; 32] {
    let expanded = Blake2b512::digest(private_key);
    let mut scalar = [0u8; 32];
    scalar.copy_from_slice(&expanded[..32]);
    EdwardsPoint::mul_base_clamped(scalar).compress().to_bytes()
}

fn address_checksum(public_key: &[u8]) -> [u8; 5] {
    let mut checksum = [0u8; 5];
    checksum.copy_from_slice(&Blake2b40::digest(public_key));
    checksum.reverse();
    checksum
}

pub fn public_key_to_address(public_key: &[u8; 32]) -> String {
    let mut address = String::with_capacity(ADDRESS_PREFIX.len() + KEY_CHARS + CHECKSUM_CHARS);
    address.push_str(ADDRESS_PREFIX);
    address.push_str(&encode_base32(public_key, 4));
    address.push_str(&encode_base32(&address_checksum(public_key), 0));
    address
}

/// Decodes an address back into its public key, verifying the checksum.
pub fn address_to_public_key(address: &str) -> Result<[u8; 32], AppError> {
    let body = address
        .strip_prefix(ADDRESS_PREFIX)
        .or_else(|| address.strip_prefix("nano_"))
        .or_else(|| address.strip_prefix("xrb_"))
        .ok_or_else(|| AppError::Decode(format!("unknown address prefix: {}", address)))?;

    if body.len() != KEY_CHARS + CHECKSUM_CHARS || !body.is_ascii() {
        return Err(AppError::Decode(format!("invalid address length: {}", address)));
    }

    let (key_part, checksum_part) = body.split_at(KEY_CHARS);
    let key_bytes = decode_base32(key_part, 4)
        .ok_or_else(|| AppError::Decode(format!("invalid address encoding: {}", address)))?;
    let mut public_key = [0u8; 32];
    public_key.copy_from_slice(&key_bytes);

    if encode_base32(&address_checksum(&public_key), 0) != checksum_part {
        return Err(AppError::Decode(format!("invalid address checksum: {}", address)));
    }
    Ok(public_key)
}

pub fn validate_address(address: &str) -> bool {
    address_to_public_key(address).is_ok()
}

/// Encodes `bytes` preceded by `pad_bits` zero bits, five bits per character.
fn encode_base32(bytes: &[u8], pad_bits: u32) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + pad_bits as usize) / 5);
    let mut acc: u32 = 0;
    let mut bits = pad_bits;
    for &byte in bytes {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 0x1f) as usize] as char);
        }
        acc &= (1 << bits) - 1;
    }
    out
}

fn decode_base32(encoded: &str, pad_bits: u32) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut skip = pad_bits;
    for c in encoded.bytes() {
        let value = ALPHABET.iter().position(|&a| a == c)? as u32;
        acc = (acc << 5) | value;
        bits += 5;
        if skip > 0 && bits >= skip {
            // leading padding bits must be zero
            if acc >> (bits - skip) != 0 {
                return None;
            }
            bits -= skip;
            acc &= (1 << bits) - 1;
            skip = 0;
        }
        if skip == 0 && bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    if bits != 0 || acc != 0 {
        return None;
    }
    Some(out)
}

/// A batch of wallets sent to the trait API in a single request.
pub struct WalletBatch {
    addresses: Vec<String>,
    secrets: HashMap<String, String>,
}

impl WalletBatch {
    /// Generates `size` independent wallets.
    pub fn generate(size: usize) -> Result<Self, AppError> {
        if size == 0 {
            return Err(AppError::Config("batch size must be at least 1".to_string()));
        }
        let wallets = (0..size)
            .map(|_| Wallet::generate())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_wallets(wallets))
    }

    pub fn from_wallets(wallets: impl IntoIterator<Item = Wallet>) -> Self {
        let mut addresses = Vec::new();
        let mut secrets = HashMap::new();
        for wallet in wallets {
            addresses.push(wallet.address.clone());
            secrets.insert(wallet.address, wallet.secret);
        }
        Self { addresses, secrets }
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn secret_for(&self, address: &str) -> Option<&str> {
        self.secrets.get(address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
