//! Persisted bitmasks agree with the generated `B(x,i)` test and word count.

use proptest::prelude::*;
use snnc_compiler::connectivity::{bitmask_words, BIT_MACRO};
use snnc_storage::ConnectivityBitmask;

/// Rust rendition of `B(x,i) ((x) & (0x80000000 >> (i)))`
fn b(x: u32, i: u32) -> bool {
    x & (0x8000_0000u32 >> i) != 0
}

fn generated_test(words: &[u32], n_post: u32, pre: u32, post: u32) -> bool {
    let gid = u64::from(pre) * u64::from(n_post) + u64::from(post);
    b(words[(gid >> 5) as usize], (gid & 31) as u32)
}

#[test]
fn macro_is_msb_first() {
    assert_eq!(BIT_MACRO, "#define B(x,i) ((x) & (0x80000000 >> (i)))");
    let mut mask = ConnectivityBitmask::new(1, 32);
    mask.set(0, 0).unwrap();
    assert_eq!(mask.words(), &[0x8000_0000]);
}

proptest! {
    #[test]
    fn storage_bits_match_generated_test(
        n_pre in 1u32..12,
        n_post in 1u32..70,
        picks in prop::collection::vec((0u32..12, 0u32..70), 0..40),
    ) {
        let mut mask = ConnectivityBitmask::new(n_pre, n_post);
        let picks: Vec<(u32, u32)> = picks
            .into_iter()
            .filter(|(i, j)| *i < n_pre && *j < n_post)
            .collect();
        for (i, j) in &picks {
            mask.set(*i, *j).unwrap();
        }
        prop_assert_eq!(mask.words().len() as u64, bitmask_words(n_pre, n_post));
        for i in 0..n_pre {
            for j in 0..n_post {
                let expected = picks.contains(&(i, j));
                prop_assert_eq!(generated_test(mask.words(), n_post, i, j), expected);
            }
        }
    }
}
