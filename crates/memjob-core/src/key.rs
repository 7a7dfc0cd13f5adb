//! Comparator-parameterized keys.
//!
//! The engine is constructed once with a single [`KeyComparer`] and every
//! ordered structure — the per-family expiration indices, the per-state job
//! index, sorted-set member ordering — uses that same comparer. Mixing
//! comparers between indices is an easy way to introduce a bug; wrapping
//! every stored key in [`EngineKey`] makes that structurally impossible,
//! since `Ord`/`Eq`/`Hash` on `EngineKey` always delegate to the comparer it
//! was built with.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Equality + ordering strategy applied uniformly to all collection keys.
pub trait KeyComparer: fmt::Debug + Send + Sync {
    /// Order `a` relative to `b`.
    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Whether `a` and `b` are the same key under this comparer.
    fn equals(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    /// Feed `value` into `state` such that two keys considered equal by
    /// [`KeyComparer::equals`] always hash identically.
    fn hash_into(&self, value: &str, state: &mut dyn Hasher);
}

/// Default comparer: plain byte-wise (`Ord` on `str`) ordering.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdinalKeyComparer;

impl KeyComparer for OrdinalKeyComparer {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.cmp(b)
    }

    fn hash_into(&self, value: &str, mut state: &mut dyn Hasher) {
        value.hash(&mut state);
    }
}

/// Case-insensitive comparer (ASCII case folding).
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseInsensitiveKeyComparer;

impl KeyComparer for CaseInsensitiveKeyComparer {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase))
    }

    fn hash_into(&self, value: &str, mut state: &mut dyn Hasher) {
        for c in value.chars().flat_map(char::to_lowercase) {
            c.hash(&mut state);
        }
    }
}

/// A key (or sorted-set member, or hash field) as stored inside the engine.
///
/// Cheap to clone (`Arc<str>` + `Arc<dyn KeyComparer>`); `Ord`/`Eq`/`Hash`
/// delegate to the shared comparer, so two `EngineKey`s can only be compared
/// meaningfully when they were built from the same engine.
#[derive(Clone)]
pub struct EngineKey {
    raw: Arc<str>,
    comparer: Arc<dyn KeyComparer>,
}

impl EngineKey {
    /// Build a key from a borrowed string and the engine's comparer.
    pub fn new(raw: &str, comparer: Arc<dyn KeyComparer>) -> Self {
        Self {
            raw: Arc::from(raw),
            comparer,
        }
    }

    /// The underlying string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Build a new key with the same comparer but a different value.
    pub fn with_value(&self, raw: &str) -> Self {
        Self::new(raw, self.comparer.clone())
    }
}

impl fmt::Debug for EngineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EngineKey").field(&self.raw).finish()
    }
}

impl fmt::Display for EngineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for EngineKey {
    fn eq(&self, other: &Self) -> bool {
        self.comparer.equals(&self.raw, &other.raw)
    }
}

impl Eq for EngineKey {}

impl PartialOrd for EngineKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EngineKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparer.compare(&self.raw, &other.raw)
    }
}

impl Hash for EngineKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.comparer.hash_into(&self.raw, state);
    }
}

impl AsRef<str> for EngineKey {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str, comparer: Arc<dyn KeyComparer>) -> EngineKey {
        EngineKey::new(raw, comparer)
    }

    #[test]
    fn ordinal_is_case_sensitive() {
        let c: Arc<dyn KeyComparer> = Arc::new(OrdinalKeyComparer);
        assert_ne!(key("Job", c.clone()), key("job", c));
    }

    #[test]
    fn case_insensitive_treats_folded_forms_as_equal() {
        let c: Arc<dyn KeyComparer> = Arc::new(CaseInsensitiveKeyComparer);
        assert_eq!(key("Job", c.clone()), key("job", c));
    }

    #[test]
    fn case_insensitive_equal_keys_hash_equal() {
        use std::collections::hash_map::DefaultHasher;

        let c: Arc<dyn KeyComparer> = Arc::new(CaseInsensitiveKeyComparer);
        let a = key("Job", c.clone());
        let b = key("job", c);

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn ordering_matches_natural_str_order_for_ordinal() {
        let c: Arc<dyn KeyComparer> = Arc::new(OrdinalKeyComparer);
        assert_eq!(key("a", c.clone()).cmp(&key("b", c)), Ordering::Less);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(k: &EngineKey) -> u64 {
        let mut h = DefaultHasher::new();
        k.hash(&mut h);
        h.finish()
    }

    proptest! {
        /// Any key equals itself case-folded, and the two hash identically —
        /// the invariant `EngineKey`'s `Eq`/`Hash` impls exist to guarantee.
        #[test]
        fn case_insensitive_key_equals_its_own_case_variants(s in "[a-zA-Z0-9_]{0,32}") {
            let comparer: Arc<dyn KeyComparer> = Arc::new(CaseInsensitiveKeyComparer);
            let lower = EngineKey::new(&s.to_lowercase(), comparer.clone());
            let upper = EngineKey::new(&s.to_uppercase(), comparer);
            prop_assert_eq!(&lower, &upper);
            prop_assert_eq!(hash_of(&lower), hash_of(&upper));
        }

        /// Ordinal comparison is a strict total order consistent with `str`'s.
        #[test]
        fn ordinal_comparison_matches_str_ordering(a in ".{0,16}", b in ".{0,16}") {
            let comparer: Arc<dyn KeyComparer> = Arc::new(OrdinalKeyComparer);
            let ka = EngineKey::new(&a, comparer.clone());
            let kb = EngineKey::new(&b, comparer);
            prop_assert_eq!(ka.cmp(&kb), a.as_str().cmp(b.as_str()));
        }
    }
}
