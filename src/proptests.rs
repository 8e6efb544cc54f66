use super::*;

use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Op {
    Insert(Orthotope),
    /// Remove the n-th handle ever issued (modulo the number issued).
    Remove(usize),
    Query(Orthotope),
}

fn orthotope_strategy() -> impl Strategy<Value = Orthotope> + Clone {
    // Small coordinate space so that items overlap and collide often.
    (
        prop::array::uniform3(-64i32..64),
        prop::array::uniform3(0i32..24),
    )
        .prop_map(|(p0, extent)| Orthotope {
            p0,
            p1: [p0[0] + extent[0], p0[1] + extent[1], p0[2] + extent[2]],
        })
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let orth = orthotope_strategy();
    let op = prop_oneof![
        50 => orth.clone().prop_map(Op::Insert),
        30 => any::<usize>().prop_map(Op::Remove),
        20 => orth.prop_map(Op::Query),
    ];
    prop::collection::vec(op, 0..=600)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_brute_force(ops in ops_strategy()) {
        let mut t: Bvh<usize> = Bvh::new();
        // Every handle ever issued, with the item it refers to while live.
        let mut issued: Vec<(ItemRef, Option<Orthotope>)> = Vec::new();

        for op in ops {
            match op {
                Op::Insert(orth) => {
                    let id = issued.len();
                    let r = t.insert(orth, id);
                    issued.push((r, Some(orth)));
                }
                Op::Remove(n) => {
                    if issued.is_empty() {
                        continue;
                    }
                    let id = n % issued.len();
                    let (r, live) = issued[id];
                    let got = t.remove(r);
                    if live.is_some() {
                        prop_assert_eq!(got, Some(id));
                        issued[id].1 = None;
                    } else {
                        prop_assert_eq!(got, None);
                    }
                }
                Op::Query(region) => {
                    let mut got: Vec<usize> = t.query(&region).map(|(_, v)| *v).collect();
                    got.sort_unstable();
                    let expected: Vec<usize> = issued
                        .iter()
                        .enumerate()
                        .filter_map(|(id, (_, o))| o.filter(|o| o.intersects(&region)).map(|_| id))
                        .collect();
                    prop_assert_eq!(got, expected);
                }
            }

            let live = issued.iter().filter(|(_, o)| o.is_some()).count();
            prop_assert_eq!(t.len(), live);
            prop_assert!(t.verify().is_ok(), "{:?}", t.verify());
        }
    }

    #[test]
    fn prop_insert_only_depth_bound(items in prop::collection::vec(orthotope_strategy(), 1..=400)) {
        let mut t: Bvh<()> = Bvh::new();
        for orth in &items {
            t.insert(*orth, ());
        }
        prop_assert!(t.verify().is_ok());
        // Fib(depth + 1) <= n for an AVL tree whose leaves hold the items.
        let n = items.len() as f64;
        let bound = 1.4405 * (n + 2.0).log2() + 1.0;
        prop_assert!((t.depth() as f64) <= bound, "depth {} for {} items", t.depth(), items.len());
    }
}
