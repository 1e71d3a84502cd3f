//! Single-generation fingerprint cache.
//!
//! Keyed by the active script's fingerprint: asking for a different
//! fingerprint drops the previous bucket wholesale, which is exactly the
//! lifetime of the node ids stored inside it (the substrate's fingerprint
//! changes precisely when rewrites land). The no-hash slot survives
//! generation changes for callers that key purely by content.
//!
//! The engine is single-threaded by design, so the cache is a thread-local
//! singleton; the orchestrator resets it at the start of each job.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use unweave_arborist::NodeId;
use unweave_common::Fingerprint;
use unweave_syntax::ast::Node;

/// Context-collection cache key: by origin identity plus content, or by
/// content alone (so structurally identical origins share work).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextKey {
    NodeContent(NodeId, Fingerprint),
    ContentOnly(Fingerprint),
}

/// Memoised sandbox verdict for a fragment.
#[derive(Clone, Debug)]
pub enum EvalOutcome {
    Literal(Node),
    Bad,
}

#[derive(Default)]
pub struct Bucket {
    pub contexts: FxHashMap<ContextKey, Vec<NodeId>>,
    pub evals: FxHashMap<Fingerprint, EvalOutcome>,
}

#[derive(Default)]
struct FingerprintCache {
    active: Option<Fingerprint>,
    bucket: Bucket,
    /// The distinguished slot for `Fingerprint::NONE`; never invalidated by
    /// other keys.
    no_hash: Bucket,
}

thread_local! {
    static CACHE: RefCell<FingerprintCache> = RefCell::new(FingerprintCache::default());
}

/// Run `f` against the bucket for fingerprint `key`. A key change drops the
/// previous generation's bucket first.
pub fn with_bucket<R>(key: Fingerprint, f: impl FnOnce(&mut Bucket) -> R) -> R {
    CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if key.is_none() {
            return f(&mut cache.no_hash);
        }
        if cache.active != Some(key) {
            cache.active = Some(key);
            cache.bucket = Bucket::default();
        }
        f(&mut cache.bucket)
    })
}

/// Empty the current bucket but keep the active fingerprint.
pub fn flush() {
    CACHE.with(|cache| {
        cache.borrow_mut().bucket = Bucket::default();
    });
}

/// Drop everything, including the no-hash slot. The orchestrator calls this
/// once per job.
pub fn reset() {
    CACHE.with(|cache| {
        *cache.borrow_mut() = FingerprintCache::default();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(text: &str) -> Fingerprint {
        Fingerprint::of(text)
    }

    #[test]
    fn test_same_key_hits_same_bucket() {
        reset();
        with_bucket(fp("a"), |b| {
            b.evals.insert(fp("frag"), EvalOutcome::Bad);
        });
        let hit = with_bucket(fp("a"), |b| b.evals.contains_key(&fp("frag")));
        assert!(hit);
    }

    #[test]
    fn test_new_key_invalidates_previous_generation() {
        reset();
        with_bucket(fp("a"), |b| {
            b.evals.insert(fp("frag"), EvalOutcome::Bad);
        });
        with_bucket(fp("b"), |_| {});
        let hit = with_bucket(fp("a"), |b| b.evals.contains_key(&fp("frag")));
        assert!(!hit, "bucket for a prior fingerprint must be dropped");
    }

    #[test]
    fn test_no_hash_slot_survives_generations() {
        reset();
        with_bucket(Fingerprint::NONE, |b| {
            b.evals.insert(fp("frag"), EvalOutcome::Bad);
        });
        with_bucket(fp("a"), |_| {});
        with_bucket(fp("b"), |_| {});
        let hit = with_bucket(Fingerprint::NONE, |b| b.evals.contains_key(&fp("frag")));
        assert!(hit, "the no-hash slot is not keyed by generation");
    }

    #[test]
    fn test_flush_keeps_active_key() {
        reset();
        with_bucket(fp("a"), |b| {
            b.evals.insert(fp("frag"), EvalOutcome::Bad);
        });
        flush();
        let hit = with_bucket(fp("a"), |b| b.evals.contains_key(&fp("frag")));
        assert!(!hit, "flush empties the bucket");
    }
}
