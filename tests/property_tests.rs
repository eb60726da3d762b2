/// Property-based tests using proptest
/// Tests invariants of the vanity filter and address encoding
use legion_van::filter::{normalize, FilterSpec, TraitSlot};
use legion_van::models::Traits;
use legion_van::wallet::{address_to_public_key, public_key_to_address, validate_address, Wallet};
use proptest::prelude::*;

fn traits_strategy() -> impl Strategy<Value = Traits> {
    prop::collection::vec("[abc]{0,4}", 8).prop_map(|v| Traits {
        background_color: v[0].clone(),
        glasses: v[1].clone(),
        hat: v[2].clone(),
        misc: v[3].clone(),
        mouth: v[4].clone(),
        shirt_pants: v[5].clone(),
        shoes: v[6].clone(),
        tail: v[7].clone(),
    })
}

fn spec_strategy() -> impl Strategy<Value = FilterSpec> {
    prop::collection::vec(prop::collection::vec("[abc]{0,3}", 0..4), 7).prop_map(|slots| {
        TraitSlot::ALL
            .iter()
            .zip(slots)
            .fold(FilterSpec::default(), |spec, (slot, prefixes)| {
                spec.with(*slot, prefixes)
            })
    })
}

// Property: filter semantics
proptest! {
    #[test]
    fn empty_spec_accepts_everything(traits in traits_strategy()) {
        prop_assert!(FilterSpec::default().matches(&traits));
    }

    #[test]
    fn single_slot_is_a_prefix_test(prefixes in prop::collection::vec("[abc]{0,3}", 1..4), hat in "[abc]{0,4}") {
        let spec = FilterSpec::default().with(TraitSlot::Hat, prefixes.clone());
        let traits = Traits { hat: hat.clone(), ..Traits::default() };
        let expected = prefixes.iter().any(|p| hat.starts_with(p.as_str()));
        prop_assert_eq!(spec.matches(&traits), expected);
    }

    #[test]
    fn slots_are_combined_with_and(spec in spec_strategy(), traits in traits_strategy()) {
        let per_slot = TraitSlot::ALL.iter().all(|slot| {
            let only = FilterSpec::default().with(*slot, spec.slot(*slot).to_vec());
            only.matches(&traits)
        });
        prop_assert_eq!(spec.matches(&traits), per_slot);
    }
}

// Property: normalization
proptest! {
    #[test]
    fn normalize_is_idempotent(spec in spec_strategy()) {
        let once = spec.normalized();
        prop_assert_eq!(once.normalized(), once);
    }

    #[test]
    fn normalize_preserves_matches(spec in spec_strategy(), traits in traits_strategy()) {
        prop_assert_eq!(normalize(&spec).matches(&traits), spec.matches(&traits));
    }

    #[test]
    fn normalized_slots_are_sorted_and_prefix_free(spec in spec_strategy()) {
        let normalized = spec.normalized();
        for slot in TraitSlot::ALL {
            let prefixes = normalized.slot(slot);
            prop_assert!(prefixes.windows(2).all(|w| w[0] < w[1]));
            for (i, a) in prefixes.iter().enumerate() {
                for (j, b) in prefixes.iter().enumerate() {
                    if i != j {
                        prop_assert!(!b.starts_with(a.as_str()));
                    }
                }
            }
        }
    }
}

// Property: address encoding
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn address_round_trips(seed in prop::array::uniform32(any::<u8>())) {
        let wallet = Wallet::from_seed(&seed);
        prop_assert!(validate_address(&wallet.address));
        prop_assert_eq!(wallet.address.len(), 64);
        let key = address_to_public_key(&wallet.address).unwrap();
        prop_assert_eq!(public_key_to_address(&key), wallet.address);
    }

    #[test]
    fn address_validation_never_panics(input in "\\PC*") {
        let _ = validate_address(&input);
    }
}
