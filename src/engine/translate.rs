//! Translation between the view's address space and the backing
//! collection's address space.
//!
//! Both directions walk the index set member by member. Cost is
//! proportional to the target ordinal, which is acceptable because the set
//! is expected to be sparse and walks short relative to the backing
//! collection; callers needing random access over huge views should not be
//! using a linear membership structure in the first place.

use super::index_set::IndexSet;
use super::types::{PrivateIndex, PublicIndex};

/// Private index of the member at public ordinal `public`, or `None` when
/// `public` is out of `[0, len)`.
pub fn public_to_private(set: &IndexSet, public: PublicIndex) -> Option<PrivateIndex> {
    let mut current = set.first_index()?;
    for _ in 0..public {
        current = set.index_after(current)?;
    }
    Some(current)
}

/// Public ordinal of the member `private`, or `None` when `private` is not
/// in the set.
pub fn private_to_public(set: &IndexSet, private: PrivateIndex) -> Option<PublicIndex> {
    let mut current = set.first_index()?;
    let mut ordinal = 0;
    while current < private {
        current = set.index_after(current)?;
        ordinal += 1;
    }
    if current == private {
        Some(ordinal)
    } else {
        None
    }
}

/// Public ordinal `private` occupies, or would occupy if added: the number
/// of members strictly below it.
pub fn rank(set: &IndexSet, private: PrivateIndex) -> PublicIndex {
    let mut ordinal = 0;
    let mut current = set.first_index();
    while let Some(index) = current {
        if index >= private {
            break;
        }
        ordinal += 1;
        current = set.index_after(index);
    }
    ordinal
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> IndexSet {
        [2, 5, 6, 9].into_iter().collect()
    }

    #[test]
    fn test_public_to_private() {
        let set = sample();
        assert_eq!(public_to_private(&set, 0), Some(2));
        assert_eq!(public_to_private(&set, 2), Some(6));
        assert_eq!(public_to_private(&set, 3), Some(9));
        assert_eq!(public_to_private(&set, 4), None);
    }

    #[test]
    fn test_private_to_public() {
        let set = sample();
        assert_eq!(private_to_public(&set, 2), Some(0));
        assert_eq!(private_to_public(&set, 9), Some(3));
        assert_eq!(private_to_public(&set, 4), None);
        assert_eq!(private_to_public(&set, 11), None);
    }

    #[test]
    fn test_round_trip() {
        let set = sample();
        for public in 0..set.len() {
            let private = public_to_private(&set, public).unwrap();
            assert_eq!(private_to_public(&set, private), Some(public));
        }
    }

    #[test]
    fn test_rank_for_absent_index() {
        let set = sample();
        assert_eq!(rank(&set, 0), 0);
        assert_eq!(rank(&set, 4), 1);
        assert_eq!(rank(&set, 7), 3);
        assert_eq!(rank(&set, 100), 4);
    }

    #[test]
    fn test_empty_set() {
        let set = IndexSet::new();
        assert_eq!(public_to_private(&set, 0), None);
        assert_eq!(private_to_public(&set, 0), None);
        assert_eq!(rank(&set, 5), 0);
    }
}
