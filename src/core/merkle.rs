use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};

/// Merkle tree over a block's transaction ids.
///
/// Ids are sorted before hashing, so the root does not depend on the order
/// transactions appear in the block. Leaves are `sha256_hex(id)`, parents are
/// `sha256_hex(left ‖ right)` over the hex strings, and an odd trailing node
/// is carried up to the next level unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerkleTree {
    /// levels[0] holds the leaves, the last level holds the root
    levels: Vec<Vec<String>>,
    ids: Vec<String>,
}

/// Inclusion proof for a single transaction id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub transaction_id: String,
    pub merkle_root: String,
    pub proof_path: Vec<ProofElement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofElement {
    /// Sibling hash
    pub hash: String,
    /// true if the sibling sits on the right
    pub is_right: bool,
}

impl MerkleTree {
    pub fn new<S: AsRef<str>>(transaction_ids: &[S]) -> MerkleTree {
        let mut ids: Vec<String> = transaction_ids
            .iter()
            .map(|id| id.as_ref().to_string())
            .collect();
        ids.sort();

        let mut levels = Vec::new();
        if !ids.is_empty() {
            let mut current: Vec<String> = ids.iter().map(|id| sha256_hex(id.as_bytes())).collect();
            while current.len() > 1 {
                let next = current
                    .chunks(2)
                    .map(|pair| match pair {
                        [left, right] => hash_pair(left, right),
                        [carried] => carried.clone(),
                        _ => unreachable!("chunks(2) yields one or two items"),
                    })
                    .collect();
                levels.push(current);
                current = next;
            }
            levels.push(current);
        }

        MerkleTree { levels, ids }
    }

    /// Root of the tree, or the empty string for a block without transactions.
    pub fn root(&self) -> String {
        self.levels
            .last()
            .and_then(|level| level.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn calculate_merkle_root<S: AsRef<str>>(transaction_ids: &[S]) -> String {
        MerkleTree::new(transaction_ids).root()
    }

    pub fn leaf_count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn generate_proof(&self, transaction_id: &str) -> Option<MerkleProof> {
        let mut idx = self.ids.binary_search_by(|id| id.as_str().cmp(transaction_id)).ok()?;
        let mut proof_path = Vec::new();

        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            if idx % 2 == 0 {
                // A carried node has no sibling at this level
                if let Some(sibling) = level.get(idx + 1) {
                    proof_path.push(ProofElement {
                        hash: sibling.clone(),
                        is_right: true,
                    });
                }
            } else {
                proof_path.push(ProofElement {
                    hash: level[idx - 1].clone(),
                    is_right: false,
                });
            }
            idx /= 2;
        }

        Some(MerkleProof {
            transaction_id: transaction_id.to_string(),
            merkle_root: self.root(),
            proof_path,
        })
    }

    pub fn verify_proof(proof: &MerkleProof) -> bool {
        let computed = proof.proof_path.iter().fold(
            sha256_hex(proof.transaction_id.as_bytes()),
            |current, element| {
                if element.is_right {
                    hash_pair(&current, &element.hash)
                } else {
                    hash_pair(&element.hash, &current)
                }
            },
        );
        computed == proof.merkle_root
    }
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut combined = String::with_capacity(left.len() + right.len());
    combined.push_str(left);
    combined.push_str(right);
    sha256_hex(combined.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root() {
        let ids: Vec<String> = vec![];
        assert_eq!(MerkleTree::calculate_merkle_root(&ids), "");
        assert!(MerkleTree::new(&ids).is_empty());
    }

    #[test]
    fn test_single_leaf_root_is_leaf_hash() {
        assert_eq!(
            MerkleTree::calculate_merkle_root(&["tx-1"]),
            sha256_hex(b"tx-1")
        );
    }

    #[test]
    fn test_three_leaves_carry_last_node() {
        let a = sha256_hex(b"a");
        let b = sha256_hex(b"b");
        let c = sha256_hex(b"c");
        let expected = hash_pair(&hash_pair(&a, &b), &c);
        assert_eq!(MerkleTree::calculate_merkle_root(&["a", "b", "c"]), expected);
    }

    #[test]
    fn test_root_ignores_insertion_order() {
        let forward = MerkleTree::calculate_merkle_root(&["coinbase-1-0", "tx-a", "tx-b", "levy-c"]);
        let shuffled = MerkleTree::calculate_merkle_root(&["tx-b", "levy-c", "coinbase-1-0", "tx-a"]);
        assert_eq!(forward, shuffled);
        assert_ne!(
            forward,
            MerkleTree::calculate_merkle_root(&["coinbase-1-0", "tx-a", "tx-b"])
        );
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        let ids: Vec<String> = (0..7).map(|i| format!("tx-{i}")).collect();
        let tree = MerkleTree::new(&ids);
        assert_eq!(tree.leaf_count(), 7);

        for id in &ids {
            let proof = tree.generate_proof(id).unwrap();
            assert_eq!(proof.merkle_root, tree.root());
            assert!(MerkleTree::verify_proof(&proof), "proof failed for {id}");
        }
        assert!(tree.generate_proof("tx-missing").is_none());
    }

    #[test]
    fn test_tampered_proof_fails() {
        let tree = MerkleTree::new(&["a", "b", "c", "d"]);
        let mut proof = tree.generate_proof("c").unwrap();
        proof.transaction_id = "x".to_string();
        assert!(!MerkleTree::verify_proof(&proof));
    }
}
