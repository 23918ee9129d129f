//! Contract address derivation

use fugue_crypto::keccak256;
use fugue_primitives::Address;
use rlp::RlpStream;

/// Derive the address of a contract created by `creator` at `nonce`.
///
/// The address is the low 160 bits of the Keccak-256 hash of the RLP
/// list `[creator, nonce]`, where `nonce` is the creator's nonce just
/// before the creation was counted. Pure and deterministic: the same
/// pair always yields the same address.
pub fn compute_contract_address(creator: Address, nonce: u64) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(&creator);
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}
