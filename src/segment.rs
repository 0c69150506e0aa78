//! Segment resolver.
//!
//! Large graphs are shipped as segments that are registered up front but
//! defined lazily. A segment reserves composite ids `pack(segment, local)`;
//! the first load of a reserved id asks the segment's definer to `define`
//! it, then loading proceeds normally.
//!
//! Segment 0 is the main segment. It reserves nothing and is the fallback
//! definer for any id no other segment reserved.
//!
//! # Composite ids
//!
//! ```text
//!  31            16 15             0
//! ┌────────────────┬────────────────┐
//! │   segment id   │    local id    │
//! └────────────────┴────────────────┘
//! ```

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::SegmentError;
use crate::runtime::Runtime;
use crate::unit::UnitId;

/// Bits the segment id is shifted by.
pub const ID_MASK_SHIFT: u32 = 16;

/// Mask selecting the local id.
pub const LOCAL_ID_MASK: u32 = (1 << ID_MASK_SHIFT) - 1;

/// The main (fallback) segment.
pub const MAIN_SEGMENT: u16 = 0;

/// Compose a unit id from a segment id and a segment-local id.
#[inline]
pub const fn pack(segment_id: u16, local_id: u16) -> u32 {
    ((segment_id as u32) << ID_MASK_SHIFT) | local_id as u32
}

/// Split a composite unit id into `(segment_id, local_id)`.
#[inline]
pub const fn unpack(id: u32) -> (u16, u16) {
    ((id >> ID_MASK_SHIFT) as u16, (id & LOCAL_ID_MASK) as u16)
}

/// Called with an id it is expected to `define` on the runtime.
pub type SegmentDefiner = Rc<dyn Fn(&Runtime, &UnitId)>;

// =============================================================================
// SegmentTable
// =============================================================================

/// Registered segments and the ids they still owe a definition for.
#[derive(Default)]
pub struct SegmentTable {
    definers: FxHashMap<u16, SegmentDefiner>,
    /// Reserved id -> owning segment. Entries leave once the definer ran.
    owners: FxHashMap<UnitId, u16>,
    /// Ids a definer has already been asked for.
    attempted: FxHashSet<UnitId>,
}

impl SegmentTable {
    /// Install a segment's definer and reserve its ids.
    ///
    /// Ids that are already defined or already reserved are skipped.
    pub fn register(
        &mut self,
        segment_id: u16,
        definer: SegmentDefiner,
        local_ids: &[u16],
        is_defined: impl Fn(&UnitId) -> bool,
    ) -> Result<usize, SegmentError> {
        match (segment_id, local_ids.is_empty()) {
            (MAIN_SEGMENT, false) => return Err(SegmentError::MainSegmentWithIds),
            (id, true) if id != MAIN_SEGMENT => return Err(SegmentError::MissingIds(id)),
            _ => {}
        }

        self.definers.insert(segment_id, definer);

        let mut reserved = 0;
        for &local in local_ids {
            let id = UnitId::Num(pack(segment_id, local));
            if is_defined(&id) || self.owners.contains_key(&id) {
                continue;
            }
            self.owners.insert(id, segment_id);
            reserved += 1;
        }
        Ok(reserved)
    }

    /// Claim the definer responsible for `id`, at most once per id.
    pub fn claim(&mut self, id: &UnitId) -> Option<SegmentDefiner> {
        if self.definers.is_empty() || !self.attempted.insert(id.clone()) {
            return None;
        }
        let segment_id = self.owners.remove(id).unwrap_or(MAIN_SEGMENT);
        self.definers.get(&segment_id).cloned()
    }

    /// Owning segment of a reserved, not yet defined id.
    #[inline]
    pub fn owner(&self, id: &UnitId) -> Option<u16> {
        self.owners.get(id).copied()
    }

    #[inline]
    pub fn is_registered(&self, segment_id: u16) -> bool {
        self.definers.contains_key(&segment_id)
    }

    pub fn reset(&mut self) {
        self.definers.clear();
        self.owners.clear();
        self.attempted.clear();
    }
}

// =============================================================================
// Runtime integration
// =============================================================================

impl Runtime {
    /// Register a segment without calling its definer.
    ///
    /// Returns how many ids were newly reserved.
    pub fn register_segment<F>(
        &self,
        segment_id: u16,
        definer: F,
        local_ids: &[u16],
    ) -> Result<usize, SegmentError>
    where
        F: Fn(&Runtime, &UnitId) + 'static,
    {
        let registry = self.registry.borrow();
        let reserved = self.segments.borrow_mut().register(
            segment_id,
            Rc::new(definer),
            local_ids,
            |id| registry.contains(id),
        )?;
        crate::debug!("segment"; "registered #{} ({} ids reserved)", segment_id, reserved);
        Ok(reserved)
    }

    /// Owning segment of a reserved id that has not been defined yet.
    pub fn segment_of(&self, id: impl Into<UnitId>) -> Option<u16> {
        self.segments.borrow().owner(&id.into())
    }

    /// Give the responsible segment a chance to define `id`.
    pub(crate) fn define_from_segment(&self, id: &UnitId) {
        let definer = self.segments.borrow_mut().claim(id);
        if let Some(definer) = definer {
            crate::debug!("segment"; "defining unit {} on demand", id);
            definer(self, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use proptest::prelude::*;

    use super::*;
    use crate::error::LoadError;
    use crate::unit::{UnitDef, Value};

    proptest! {
        #[test]
        fn test_pack_unpack_roundtrip(segment in any::<u16>(), local in any::<u16>()) {
            prop_assert_eq!(unpack(pack(segment, local)), (segment, local));
        }

        #[test]
        fn test_unpack_pack_roundtrip(id in any::<u32>()) {
            let (segment, local) = unpack(id);
            prop_assert_eq!(pack(segment, local), id);
        }
    }

    #[test]
    fn test_pack_layout() {
        assert_eq!(pack(0, 7), 7);
        assert_eq!(pack(1, 0), 0x1_0000);
        assert_eq!(pack(u16::MAX, u16::MAX), u32::MAX);
        assert_eq!(unpack(0x0003_0002), (3, 2));
    }

    /// Definer that defines whatever it is asked for, counting calls.
    fn counting_definer(calls: Rc<Cell<usize>>) -> impl Fn(&Runtime, &UnitId) + 'static {
        move |runtime: &Runtime, id: &UnitId| {
            calls.set(calls.get() + 1);
            let (segment, local) = unpack(id.as_num().unwrap_or_default());
            runtime.define(UnitDef::new(id, move |ctx| {
                ctx.export("segment", u32::from(segment));
                ctx.export("local", u32::from(local));
                Ok(())
            }));
        }
    }

    #[test]
    fn test_registration_does_not_define() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));

        let reserved = runtime
            .register_segment(2, counting_definer(calls.clone()), &[0, 1, 5])
            .unwrap();

        assert_eq!(reserved, 3);
        assert_eq!(calls.get(), 0);
        assert!(runtime.is_empty());
        assert_eq!(runtime.segment_of(pack(2, 5)), Some(2));
    }

    #[test]
    fn test_load_defines_reserved_unit_once() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        runtime
            .register_segment(3, counting_definer(calls.clone()), &[9])
            .unwrap();

        let id = pack(3, 9);
        let first = runtime.load(id).unwrap();
        let second = runtime.load(id).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert_eq!(first.get("segment"), Value::from(3));
        assert_eq!(first.get("local"), Value::from(9));
        assert_eq!(runtime.segment_of(id), None);
    }

    #[test]
    fn test_dependency_into_segment() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        runtime
            .register_segment(1, counting_definer(calls.clone()), &[4])
            .unwrap();
        runtime.define(
            UnitDef::new(0, |ctx| {
                let dep = ctx.require(0)?;
                ctx.set_exports(dep.get("local"));
                Ok(())
            })
            .deps([pack(1, 4)]),
        );

        assert_eq!(runtime.load(0).unwrap(), Value::from(4));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_main_segment_is_fallback() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        runtime
            .register_segment(MAIN_SEGMENT, counting_definer(calls.clone()), &[])
            .unwrap();

        assert_eq!(runtime.load(42).unwrap().get("local"), Value::from(42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_definer_that_defines_nothing() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        let count = calls.clone();
        runtime
            .register_segment(4, move |_: &Runtime, _: &UnitId| count.set(count.get() + 1), &[1])
            .unwrap();

        let id = pack(4, 1);
        assert!(matches!(runtime.load(id), Err(LoadError::UnknownUnit { .. })));
        assert!(matches!(runtime.load(id), Err(LoadError::UnknownUnit { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unreserved_id_without_main_segment_is_unknown() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        runtime
            .register_segment(5, counting_definer(calls.clone()), &[1])
            .unwrap();

        assert!(matches!(
            runtime.load(pack(5, 2)),
            Err(LoadError::UnknownUnit { .. })
        ));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_defined_ids_are_not_reserved() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        runtime.define(UnitDef::new(pack(6, 1), |_| Ok(())));

        let reserved = runtime
            .register_segment(6, counting_definer(calls.clone()), &[1, 2])
            .unwrap();

        assert_eq!(reserved, 1);
        assert_eq!(runtime.segment_of(pack(6, 1)), None);
        runtime.load(pack(6, 1)).unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_reregistration_reserves_only_new_ids() {
        let calls = Rc::new(Cell::new(0));
        let mut table = SegmentTable::default();

        let first = table
            .register(7, Rc::new(counting_definer(calls.clone())), &[1, 2], |_| false)
            .unwrap();
        let second = table
            .register(7, Rc::new(counting_definer(calls)), &[2, 3], |_| false)
            .unwrap();

        assert_eq!((first, second), (2, 1));
        assert_eq!(table.owner(&UnitId::Num(pack(7, 3))), Some(7));
        assert!(table.is_registered(7));
        assert!(!table.is_registered(8));
    }

    #[test]
    fn test_invalid_registrations() {
        let runtime = Runtime::new();
        let noop = |_: &Runtime, _: &UnitId| {};

        assert_eq!(
            runtime.register_segment(MAIN_SEGMENT, noop, &[1]),
            Err(SegmentError::MainSegmentWithIds)
        );
        assert_eq!(
            runtime.register_segment(3, noop, &[]),
            Err(SegmentError::MissingIds(3))
        );
    }

    #[test]
    fn test_reset_forgets_segments() {
        let runtime = Runtime::new();
        let calls = Rc::new(Cell::new(0));
        runtime
            .register_segment(1, counting_definer(calls.clone()), &[1])
            .unwrap();

        runtime.reset();

        assert!(runtime.load(pack(1, 1)).is_err());
        assert_eq!(calls.get(), 0);
    }
}
