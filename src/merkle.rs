//! Sorted-pair keccak256 Merkle tree used for airdrop entitlements.
//!
//! Leaves are sorted by their hash bytes, each pair is sorted before hashing
//! and an odd node at the end of a level is promoted unchanged. Proofs list
//! one hash per level; a promoted node lists itself.

use alloy::primitives::{Address, B256, U256, keccak256};

/// `keccak256(address ‖ uint256 big-endian)`, the same packing an on-chain
/// claim recomputes.
pub fn leaf_hash(wallet: Address, amount: U256) -> B256 {
    let mut packed = [0u8; 52];
    packed[..20].copy_from_slice(wallet.as_slice());
    packed[20..].copy_from_slice(&amount.to_be_bytes::<32>());
    keccak256(packed)
}

/// Hash two nodes in ascending byte order.
pub fn hash_pair(a: B256, b: B256) -> B256 {
    let (lo, hi) = if b < a { (b, a) } else { (a, b) };
    let mut packed = [0u8; 64];
    packed[..32].copy_from_slice(lo.as_slice());
    packed[32..].copy_from_slice(hi.as_slice());
    keccak256(packed)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<B256>>,
}

impl MerkleTree {
    pub fn from_leaves(mut leaves: Vec<B256>) -> Self {
        leaves.sort_unstable();

        let mut levels = vec![leaves];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let current = &levels[levels.len() - 1];
            // A trailing single node reduces to itself.
            let next = current
                .chunks(2)
                .filter_map(|pair| pair.iter().copied().reduce(hash_pair))
                .collect();
            levels.push(next);
        }

        Self { levels }
    }

    /// Root of the tree; zero for an empty tree.
    pub fn root(&self) -> B256 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(B256::ZERO)
    }

    pub fn leaves(&self) -> &[B256] {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// Index of a leaf in the sorted leaf level.
    pub fn position(&self, leaf: &B256) -> Option<usize> {
        self.levels[0].binary_search(leaf).ok()
    }

    pub fn proof(&self, index: usize) -> Option<Vec<B256>> {
        if index >= self.len() {
            return None;
        }

        let mut proof = Vec::with_capacity(self.levels.len().saturating_sub(1));
        let mut pos = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = if pos % 2 == 0 {
                level.get(pos + 1).unwrap_or(&level[pos])
            } else {
                &level[pos - 1]
            };
            proof.push(*sibling);
            pos /= 2;
        }
        Some(proof)
    }
}

/// Recompute the root from a leaf and its proof. A proof element equal to
/// the running hash marks a promoted node and is skipped.
pub fn verify_proof(leaf: B256, proof: &[B256], root: B256) -> bool {
    let computed = proof.iter().fold(leaf, |node, sibling| {
        if *sibling == node {
            node
        } else {
            hash_pair(node, *sibling)
        }
    });
    computed == root
}

/// A wallet's entry in a built reward tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardLeaf {
    pub wallet: Address,
    pub amount: U256,
    pub leaf: B256,
    pub proof: Vec<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardTree {
    pub root: B256,
    /// Ordered like the sorted leaf level.
    pub entries: Vec<RewardLeaf>,
}

/// Build the tree over `(wallet, amount)` pairs and attach each wallet's proof.
/// Input order does not affect the result.
pub fn build_reward_tree(rewards: &[(Address, U256)]) -> RewardTree {
    let mut hashed: Vec<(B256, Address, U256)> = rewards
        .iter()
        .map(|(wallet, amount)| (leaf_hash(*wallet, *amount), *wallet, *amount))
        .collect();
    hashed.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let tree = MerkleTree::from_leaves(hashed.iter().map(|(leaf, _, _)| *leaf).collect());
    let entries = hashed
        .into_iter()
        .enumerate()
        .map(|(index, (leaf, wallet, amount))| RewardLeaf {
            wallet,
            amount,
            leaf,
            proof: tree.proof(index).unwrap_or_default(),
        })
        .collect();

    RewardTree {
        root: tree.root(),
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(n: u64) -> Address {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&n.to_be_bytes());
        Address::from(bytes)
    }

    fn rewards(n: u64) -> Vec<(Address, U256)> {
        (1..=n).map(|i| (wallet(i), U256::from(i * 1_000))).collect()
    }

    fn assert_round_trip(tree: &RewardTree) {
        for entry in &tree.entries {
            assert!(
                verify_proof(entry.leaf, &entry.proof, tree.root),
                "proof failed for {}",
                entry.wallet
            );
        }
    }

    #[test]
    fn leaf_hash_packs_address_and_amount() {
        let w = wallet(0xaa);
        let amount = U256::from(100);
        let mut expected = w.to_vec();
        expected.extend_from_slice(&amount.to_be_bytes::<32>());
        assert_eq!(leaf_hash(w, amount), keccak256(&expected));
    }

    #[test]
    fn pair_hash_is_order_independent() {
        let a = B256::repeat_byte(1);
        let b = B256::repeat_byte(2);
        assert_eq!(hash_pair(a, b), hash_pair(b, a));
    }

    #[test]
    fn empty_tree_has_zero_root() {
        let tree = build_reward_tree(&[]);
        assert_eq!(tree.root, B256::ZERO);
        assert!(tree.entries.is_empty());
    }

    #[test]
    fn single_leaf_is_root() {
        let tree = build_reward_tree(&rewards(1));
        assert_eq!(tree.root, tree.entries[0].leaf);
        assert!(tree.entries[0].proof.is_empty());
        assert_round_trip(&tree);
    }

    #[test]
    fn two_wallets_pair_once() {
        let aa = Address::repeat_byte(0xaa);
        let bb = Address::repeat_byte(0xbb);
        let tree = build_reward_tree(&[(aa, U256::from(100)), (bb, U256::from(50))]);

        let leaf_aa = leaf_hash(aa, U256::from(100));
        let leaf_bb = leaf_hash(bb, U256::from(50));
        assert_eq!(tree.root, hash_pair(leaf_aa, leaf_bb));

        for entry in &tree.entries {
            assert_eq!(entry.proof.len(), 1);
            let other = if entry.wallet == aa { leaf_bb } else { leaf_aa };
            assert_eq!(entry.proof[0], other);
        }
        assert_round_trip(&tree);
    }

    #[test]
    fn odd_node_is_promoted() {
        let tree = build_reward_tree(&rewards(3));
        let leaves: Vec<B256> = tree.entries.iter().map(|e| e.leaf).collect();
        assert_eq!(
            tree.root,
            hash_pair(hash_pair(leaves[0], leaves[1]), leaves[2])
        );

        // The promoted leaf records itself, then the paired subtree.
        let last = &tree.entries[2];
        assert_eq!(last.proof, vec![last.leaf, hash_pair(leaves[0], leaves[1])]);
        assert_round_trip(&tree);
    }

    #[test]
    fn odd_node_is_promoted_through_several_levels() {
        let tree = build_reward_tree(&rewards(5));
        let l: Vec<B256> = tree.entries.iter().map(|e| e.leaf).collect();
        let left = hash_pair(hash_pair(l[0], l[1]), hash_pair(l[2], l[3]));
        assert_eq!(tree.root, hash_pair(left, l[4]));

        let last = &tree.entries[4];
        assert_eq!(last.proof, vec![l[4], l[4], left]);
        assert_round_trip(&tree);
    }

    #[test]
    fn thousand_leaves_round_trip() {
        let tree = build_reward_tree(&rewards(1000));
        assert_eq!(tree.entries.len(), 1000);
        assert!(tree.entries.iter().all(|e| e.proof.len() == 10));
        assert_round_trip(&tree);
    }

    #[test]
    fn build_is_deterministic_over_input_order() {
        let forward = rewards(37);
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = build_reward_tree(&forward);
        let b = build_reward_tree(&reversed);
        assert_eq!(a.root, b.root);
        assert_eq!(a.entries, b.entries);
    }

    #[test]
    fn tampered_amount_fails_verification() {
        let tree = build_reward_tree(&rewards(4));
        let entry = &tree.entries[1];
        let forged = leaf_hash(entry.wallet, entry.amount + U256::from(1));
        assert!(!verify_proof(forged, &entry.proof, tree.root));
    }

    #[test]
    fn position_finds_sorted_index() {
        let tree = MerkleTree::from_leaves(vec![
            B256::repeat_byte(3),
            B256::repeat_byte(1),
            B256::repeat_byte(2),
        ]);
        assert_eq!(tree.position(&B256::repeat_byte(1)), Some(0));
        assert_eq!(tree.position(&B256::repeat_byte(3)), Some(2));
        assert_eq!(tree.proof(3), None);
    }
}
