//! Property-based tests for the conduit core model.

use conduit_core::filter::FilterConfig;
use conduit_core::id::ResourceTypeId;
use conduit_core::item::{Inventory, ItemContainer};
use conduit_core::pos::BlockPos;
use proptest::prelude::*;

fn arb_ops() -> impl Strategy<Value = Vec<(bool, u32, u32)>> {
    prop::collection::vec((any::<bool>(), 0u32..4, 0u32..100), 1..50)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Inserted minus extracted always equals what the inventory holds, and
    // no slot ever exceeds its capacity.
    #[test]
    fn inventory_conserves_items(ops in arb_ops()) {
        let mut inv = Inventory::new(4, 64);
        let mut expected: u64 = 0;
        for (insert, ty, qty) in ops {
            if insert {
                expected += u64::from(inv.insert(ResourceTypeId(ty), qty));
            } else {
                expected -= u64::from(inv.extract(ty as usize, qty));
            }
        }
        prop_assert_eq!(u64::from(inv.total()), expected);
        for slot in &inv.slots {
            prop_assert!(slot.quantity() <= slot.capacity);
        }
    }

    // Toggling the mode of a non-empty filter flips every verdict.
    #[test]
    fn toggle_inverts_filter(entries in prop::collection::btree_set(0u32..20, 1..10), item in 0u32..20) {
        let mut filter = FilterConfig::whitelist(entries.into_iter().map(ResourceTypeId));
        let before = filter.permits(ResourceTypeId(item));
        filter.toggle_mode();
        prop_assert_eq!(filter.permits(ResourceTypeId(item)), !before);
    }

    #[test]
    fn block_pos_display_parses_back(x in -1000i32..1000, y in -64i32..320, z in -1000i32..1000) {
        let pos = BlockPos::new(x, y, z);
        prop_assert_eq!(pos.to_string().parse::<BlockPos>(), Ok(pos));
    }
}
