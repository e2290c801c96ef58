#![no_main]

use libfuzzer_sys::fuzz_target;
use onions_core::{verify_proof, verify_root, MerkleProof};

fuzz_target!(|data: &[u8]| {
    // First 32 bytes are the claimed root, the rest a JSON proof
    if data.len() < 32 {
        return;
    }
    let mut root = [0u8; 32];
    root.copy_from_slice(&data[..32]);
    let Ok(proof) = serde_json::from_slice::<MerkleProof>(&data[32..]) else { return };
    let _ = verify_proof(&root, &proof, "fuzz.tor", None);
    let _ = verify_root(&root, &proof);
});
