use chrono::{TimeZone, Utc};
use completion_core::{
    AggregateCompletionPolicy, CompletableItemContainer, CompletedItem, CompletedItemContainer,
    CompletionPolicy, Ntiid, PrincipalId, Progress,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const ITEMS: [&str; 5] = ["tag:a", "tag:b", "tag:c", "tag:d", "tag:e"];
const PRINCIPALS: [&str; 4] = ["alice", "bob", "carol", "dave"];

#[derive(Debug, Clone)]
enum ClassifyOp {
    Required(usize, bool),
    Optional(usize, bool),
    RemoveRequired(usize),
    RemoveOptional(usize),
}

fn arb_classify_op() -> impl Strategy<Value = ClassifyOp> {
    let idx = 0..ITEMS.len();
    prop_oneof![
        (idx.clone(), any::<bool>()).prop_map(|(i, upper)| ClassifyOp::Required(i, upper)),
        (idx.clone(), any::<bool>()).prop_map(|(i, upper)| ClassifyOp::Optional(i, upper)),
        idx.clone().prop_map(ClassifyOp::RemoveRequired),
        idx.prop_map(ClassifyOp::RemoveOptional),
    ]
}

fn spelled(i: usize, upper: bool) -> Ntiid {
    if upper {
        Ntiid::new(ITEMS[i].to_uppercase())
    } else {
        Ntiid::new(ITEMS[i])
    }
}

fn record(principal: &str, item: &str, success: bool) -> CompletedItem {
    CompletedItem::detached(
        PrincipalId::new(principal),
        Ntiid::new(item),
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    )
    .with_success(success)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn required_and_optional_are_exclusive(ops in prop::collection::vec(arb_classify_op(), 0..40)) {
        let mut container = CompletableItemContainer::new();
        // Model: key index -> Some(true) required, Some(false) optional.
        let mut model: HashMap<usize, bool> = HashMap::new();

        for op in &ops {
            match *op {
                ClassifyOp::Required(i, upper) => {
                    container.add_required_item(&spelled(i, upper));
                    model.insert(i, true);
                }
                ClassifyOp::Optional(i, upper) => {
                    container.add_optional_item(&spelled(i, upper));
                    model.insert(i, false);
                }
                ClassifyOp::RemoveRequired(i) => {
                    if model.get(&i) == Some(&true) {
                        model.remove(&i);
                    }
                    container.remove_required_item(&spelled(i, false));
                }
                ClassifyOp::RemoveOptional(i) => {
                    if model.get(&i) == Some(&false) {
                        model.remove(&i);
                    }
                    container.remove_optional_item(&spelled(i, true));
                }
            }
        }

        for (i, _) in ITEMS.iter().enumerate() {
            let key = spelled(i, false);
            let required = container.is_item_required(&key);
            let optional = container.is_item_optional(&key);
            prop_assert!(!(required && optional));
            prop_assert_eq!(required, model.get(&i) == Some(&true));
            prop_assert_eq!(optional, model.get(&i) == Some(&false));
        }
        prop_assert_eq!(
            container.get_required_item_count(),
            model.values().filter(|r| **r).count()
        );
        prop_assert_eq!(
            container.get_optional_item_count(),
            model.values().filter(|r| !**r).count()
        );
        prop_assert_eq!(container.required_keys().count(), container.get_required_item_count());
    }

    #[test]
    fn threshold_boundary_is_inclusive(max in 1_u32..200, hit in 0_u32..=200, delta in 0_u32..=200) {
        let threshold = hit.min(max);
        let absolute = delta.min(max);
        let percentage = f64::from(threshold) / f64::from(max);
        let policy = AggregateCompletionPolicy::with_percentage(percentage).unwrap();

        let progress = Progress::new("tag:item", PrincipalId::new("u"))
            .with_amounts(f64::from(absolute), Some(f64::from(max)));
        let complete = policy.is_complete(Some(&progress)).is_some();

        prop_assert_eq!(complete, absolute >= threshold);
    }

    #[test]
    fn unsuccessful_sub_items_decide_success(bad in prop::collection::btree_set("[a-z]{1,6}", 0..4)) {
        let policy = AggregateCompletionPolicy::default();
        let progress = Progress::new("tag:item", PrincipalId::new("u"))
            .with_amounts(3.0, Some(3.0))
            .with_unsuccessful(bad.iter().map(|s| Ntiid::new(format!("tag:{s}"))));
        let completed = policy.is_complete(Some(&progress)).unwrap();
        prop_assert_eq!(completed.success(), bad.is_empty());
        prop_assert_eq!(completed.principal(), &PrincipalId::new("u"));
    }

    #[test]
    fn principals_stay_isolated_and_counts_match(
        inserts in prop::collection::vec((0..PRINCIPALS.len(), 0..ITEMS.len(), any::<bool>()), 0..60),
        foreign in prop::collection::vec((0..PRINCIPALS.len(), 0..PRINCIPALS.len(), 0..ITEMS.len()), 0..10),
    ) {
        let mut bulk = CompletedItemContainer::new();
        let mut holders: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();

        for &(p, i, success) in &inserts {
            let principal = PrincipalId::new(PRINCIPALS[p]);
            bulk.get_or_create(&principal)
                .add_completed_item(record(PRINCIPALS[p], ITEMS[i], success))
                .unwrap();
            holders.entry(i).or_default().insert(p);
        }

        for &(owner, other, i) in &foreign {
            if owner == other {
                continue;
            }
            let container = bulk.get_or_create(&PrincipalId::new(PRINCIPALS[owner]));
            let before = container.len();
            prop_assert!(container
                .add_completed_item(record(PRINCIPALS[other], ITEMS[i], true))
                .is_err());
            prop_assert_eq!(container.len(), before);
        }

        for container in bulk.iter() {
            for completed in container.iter() {
                prop_assert!(completed.principal().matches(container.principal()));
            }
        }

        for (i, item) in ITEMS.iter().enumerate() {
            let expected = holders.get(&i).map_or(0, BTreeSet::len);
            prop_assert_eq!(bulk.get_completed_item_count(&Ntiid::new(*item)), expected);
            prop_assert_eq!(bulk.get_completed_items(&Ntiid::new(item.to_uppercase())).len(), expected);
        }
    }
}
