//! Integration tests for the full ledger pipeline.
//!
//! Tests: Ledger / Engine → Journal → EventStore → InventoryIndex → QueryService
//!
//! Verifies:
//! - Allocation, dispatch and relocation scenarios end to end
//! - Rejected movements leave every holding unchanged
//! - Rebuilding the index from the log equals the incrementally maintained one
//! - Per-voucher and per-container serialization under real threads

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::thread;

    use chrono::NaiveDate;
    use proptest::prelude::*;

    use wms_catalog::InMemoryCatalog;
    use wms_core::{ContainerId, DomainError, MaterialCode, MaterialQuantity, VoucherId};
    use wms_events::EventBus;
    use wms_inventory::LocationNamer;
    use wms_receiving::{IntakeLine, Voucher, VoucherIntake};

    use crate::error::LedgerError;
    use crate::journal::Journal;
    use crate::movement_engine::MovementEngine;
    use crate::projections::IndexError;
    use crate::query_service::QueryService;
    use crate::receiving_ledger::ReceivingLedger;

    struct Harness {
        journal: Arc<Journal>,
        ledger: ReceivingLedger,
        engine: MovementEngine,
        query: QueryService,
    }

    fn vid(raw: &str) -> VoucherId {
        VoucherId::new(raw).unwrap()
    }

    fn cid(raw: &str) -> ContainerId {
        ContainerId::new(raw).unwrap()
    }

    fn mat(raw: &str) -> MaterialCode {
        MaterialCode::new(raw).unwrap()
    }

    fn line(material: &str, quantity: i64) -> MaterialQuantity {
        MaterialQuantity::new(mat(material), quantity)
    }

    fn voucher(id: &str, lines: &[(&str, i64)]) -> Voucher {
        Voucher::open(VoucherIntake {
            id: vid(id),
            supplier: "ABC".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 8, 20).unwrap(),
            lines: lines
                .iter()
                .map(|(m, q)| IntakeLine {
                    material: mat(m),
                    quantity: *q,
                })
                .collect(),
        })
        .unwrap()
    }

    fn setup(vouchers: Vec<Voucher>) -> Harness {
        let journal = Arc::new(Journal::in_memory());
        let ledger = ReceivingLedger::with_vouchers(Arc::clone(&journal), vouchers).unwrap();
        let engine = MovementEngine::new(Arc::clone(&journal), LocationNamer::default());
        let query = QueryService::new(journal.index().clone(), Arc::new(InMemoryCatalog::new()));
        Harness {
            journal,
            ledger,
            engine,
            query,
        }
    }

    /// `byContainer` as a plain map.
    fn contents(h: &Harness, container: &str) -> BTreeMap<String, i64> {
        h.query
            .by_container(&cid(container))
            .unwrap()
            .lines
            .into_iter()
            .map(|l| (l.material.to_string(), l.quantity))
            .collect()
    }

    fn map(entries: &[(&str, i64)]) -> BTreeMap<String, i64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn allocate_clamp_and_finalize_scenario() {
        let h = setup(vec![voucher("V1", &[("M1", 5)])]);

        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 3).unwrap();
        assert_eq!(h.ledger.get_voucher(&vid("V1")).unwrap().lines()[0].pending_quantity(), 2);
        assert_eq!(contents(&h, "C1"), map(&[("M1", 3)]));

        let clamped = h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 10).unwrap();
        assert_eq!(clamped.allocation.quantity, 2);
        assert_eq!(clamped.pending_after, 0);
        assert_eq!(contents(&h, "C1"), map(&[("M1", 5)]));

        h.ledger.finalize(&vid("V1")).unwrap();
        assert!(h.ledger.list_vouchers(None).unwrap().is_empty());
        assert!(h.journal.verify_index().unwrap());
    }

    #[test]
    fn dispatch_scenario_rejects_overdraw_then_prunes() {
        let h = setup(vec![voucher("V1", &[("M1", 5)])]);
        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 5).unwrap();

        let err = h.engine.dispatch(&cid("C1"), &[line("M1", 6)]).unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::InsufficientQuantity { .. })));
        assert_eq!(contents(&h, "C1"), map(&[("M1", 5)]));

        h.engine.dispatch(&cid("C1"), &[line("M1", 5)]).unwrap();
        assert_eq!(contents(&h, "C1"), map(&[]));
        assert_eq!(h.query.by_material(&mat("M1")).total, 0);
    }

    #[test]
    fn rejected_material_relocation_leaves_both_containers_unchanged() {
        let h = setup(vec![voucher("V1", &[("M1", 5), ("M2", 2)])]);
        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 5).unwrap();
        h.ledger.allocate(&vid("V1"), 1, &cid("C1"), 2).unwrap();
        let position = h.journal.index().read().position();

        let err = h
            .engine
            .relocate_material(&cid("C1"), &[line("M1", 4), line("M2", 3)], &cid("C2"))
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::InsufficientQuantity { .. })));

        assert_eq!(contents(&h, "C1"), map(&[("M1", 5), ("M2", 2)]));
        assert!(h.query.by_container(&cid("C2")).is_err());
        assert_eq!(h.journal.index().read().position(), position);
    }

    #[test]
    fn same_container_relocation_is_rejected() {
        let h = setup(vec![voucher("V1", &[("M1", 5)])]);
        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 5).unwrap();

        let err = h
            .engine
            .relocate_material(&cid("C1"), &[line("M1", 1)], &cid("C1"))
            .unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::SameContainer("C1".to_string())));
        assert_eq!(contents(&h, "C1"), map(&[("M1", 5)]));
    }

    #[test]
    fn relocated_container_shows_up_at_its_location() {
        let h = setup(vec![voucher("2025-0044356", &[("MS130.9000.8404", 3)])]);
        h.ledger
            .allocate(&vid("2025-0044356"), 0, &cid("LPN-000123"), 3)
            .unwrap();
        h.engine
            .relocate_container(&cid("LPN-000123"), "ALM01-ZNC15-EST03-NIV02")
            .unwrap();

        let report = h.query.by_material(&mat("MS130.9000.8404"));
        assert_eq!(report.total, 3);
        assert_eq!(
            report.placements[0].location.as_ref().map(|l| l.as_str()),
            Some("ALM01-ZNC15-EST03-NIV02")
        );

        // Moving material keeps the destination's own location.
        h.engine
            .relocate_material(&cid("LPN-000123"), &[line("MS130.9000.8404", 1)], &cid("LPN-000124"))
            .unwrap();
        let target = h.query.by_container(&cid("LPN-000124")).unwrap();
        assert_eq!(target.location, None);
    }

    #[test]
    fn subscribers_receive_every_commit_in_position_order() {
        let h = setup(vec![voucher("V1", &[("M1", 5)])]);
        let sub = h.journal.bus().subscribe();

        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 5).unwrap();
        h.engine.dispatch(&cid("C1"), &[line("M1", 1)]).unwrap();
        h.ledger.finalize(&vid("V1")).unwrap();

        let received: Vec<_> = sub
            .drain()
            .iter()
            .map(|e| (e.position(), e.stream_type().to_string()))
            .collect();
        assert_eq!(
            received,
            vec![
                (1, "receiving.voucher".to_string()),
                (2, "inventory.container".to_string()),
                (3, "receiving.voucher".to_string()),
            ]
        );
    }

    #[test]
    fn concurrent_allocations_never_over_allocate_a_line() {
        let h = Arc::new(setup(vec![voucher("V1", &[("M1", 20)])]));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let h = Arc::clone(&h);
                thread::spawn(move || {
                    let container = cid(&format!("C{t}"));
                    (0..10)
                        .filter_map(|_| h.ledger.allocate(&vid("V1"), 0, &container, 1).ok())
                        .map(|r| r.allocation.quantity)
                        .sum::<i64>()
                })
            })
            .collect();
        let allocated: i64 = handles.into_iter().map(|t| t.join().unwrap()).sum();

        assert_eq!(allocated, 20);
        let voucher = h.ledger.get_voucher(&vid("V1")).unwrap();
        assert_eq!(voucher.lines()[0].pending_quantity(), 0);
        assert!(voucher.lines()[0].is_balanced());
        assert_eq!(h.query.by_material(&mat("M1")).total, 20);
        assert!(h.journal.verify_index().unwrap());
    }

    #[test]
    fn concurrent_dispatches_never_overdraw_a_container() {
        let h = Arc::new(setup(vec![voucher("V1", &[("M1", 10)])]));
        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 10).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let h = Arc::clone(&h);
                thread::spawn(move || {
                    (0..5)
                        .filter(|_| h.engine.dispatch(&cid("C1"), &[line("M1", 1)]).is_ok())
                        .count()
                })
            })
            .collect();
        let dispatched: usize = handles.into_iter().map(|t| t.join().unwrap()).sum();

        assert_eq!(dispatched, 10);
        assert_eq!(contents(&h, "C1"), map(&[]));
        assert!(h.journal.verify_index().unwrap());
    }

    #[test]
    fn opposite_material_relocations_do_not_deadlock() {
        let h = Arc::new(setup(vec![voucher("V1", &[("M1", 50), ("M2", 50)])]));
        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 50).unwrap();
        h.ledger.allocate(&vid("V1"), 1, &cid("C2"), 50).unwrap();

        let forward = {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _ = h.engine.relocate_material(&cid("C1"), &[line("M1", 1)], &cid("C2"));
                }
            })
        };
        let backward = {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _ = h.engine.relocate_material(&cid("C2"), &[line("M2", 1)], &cid("C1"));
                }
            })
        };
        forward.join().unwrap();
        backward.join().unwrap();

        assert_eq!(contents(&h, "C1"), map(&[("M2", 50)]));
        assert_eq!(contents(&h, "C2"), map(&[("M1", 50)]));
    }

    #[test]
    fn overflowing_allocation_is_rejected_and_the_ledger_keeps_working() {
        let h = setup(vec![
            voucher("V1", &[("M1", i64::MAX)]),
            voucher("V2", &[("M1", 1)]),
            voucher("V3", &[("M2", 5)]),
        ]);
        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), i64::MAX).unwrap();

        let err = h.ledger.allocate(&vid("V2"), 0, &cid("C1"), 1).unwrap_err();
        assert!(matches!(err, LedgerError::Index(IndexError::Overflow { .. })));
        assert_eq!(contents(&h, "C1"), map(&[("M1", i64::MAX)]));
        let v2 = h.ledger.get_voucher(&vid("V2")).unwrap();
        assert_eq!(v2.lines()[0].pending_quantity(), 1);
        assert_eq!(h.journal.stream_version(wms_receiving::VOUCHER_STREAM, "V2").unwrap(), 0);

        // Unrelated work still commits.
        h.ledger.allocate(&vid("V3"), 0, &cid("C9"), 5).unwrap();
        assert_eq!(contents(&h, "C9"), map(&[("M2", 5)]));

        // Once there is room again, the same voucher commits at its old version.
        h.engine.dispatch(&cid("C1"), &[line("M1", 1)]).unwrap();
        h.ledger.allocate(&vid("V2"), 0, &cid("C1"), 1).unwrap();
        assert_eq!(contents(&h, "C1"), map(&[("M1", i64::MAX)]));
        assert!(h.journal.verify_index().unwrap());
    }

    #[test]
    fn duplicate_selections_that_overflow_are_rejected() {
        let h = setup(vec![voucher("V1", &[("M1", 5)])]);
        h.ledger.allocate(&vid("V1"), 0, &cid("C1"), 5).unwrap();

        let err = h
            .engine
            .dispatch(&cid("C1"), &[line("M1", i64::MAX), line("M1", i64::MAX)])
            .unwrap_err();
        assert!(matches!(err.domain(), Some(DomainError::InvalidQuantity(_))));
        assert_eq!(contents(&h, "C1"), map(&[("M1", 5)]));
        assert!(h.journal.verify_index().unwrap());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Allocate { line: usize, container: u8, quantity: i64 },
        Dispatch { container: u8, material: usize, quantity: i64 },
        RelocateMaterial { source: u8, destination: u8, material: usize, quantity: i64 },
        RelocateContainer { container: u8, zone: usize, shelf: u8 },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 0u8..4, -1i64..8)
                .prop_map(|(line, container, quantity)| Op::Allocate { line, container, quantity }),
            (0u8..4, 0usize..3, -1i64..6)
                .prop_map(|(container, material, quantity)| Op::Dispatch { container, material, quantity }),
            (0u8..4, 0u8..4, 0usize..3, -1i64..6).prop_map(|(source, destination, material, quantity)| {
                Op::RelocateMaterial { source, destination, material, quantity }
            }),
            (0u8..4, 0usize..39, 0u8..=100)
                .prop_map(|(container, zone, shelf)| Op::RelocateContainer { container, zone, shelf }),
        ]
    }

    const MATERIALS: [&str; 3] = ["M0", "M1", "M2"];

    fn container(n: u8) -> ContainerId {
        cid(&LocationNamer::format_container(u32::from(n)))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: for any interleaving of operations, folding the full log
        /// from scratch yields the incrementally maintained index, and every
        /// material's total equals allocated minus dispatched.
        #[test]
        fn rebuild_equals_incremental(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let h = setup(vec![voucher("VP", &[("M0", 30), ("M1", 30), ("M2", 30)])]);
            let namer = LocationNamer::default();
            let zones: Vec<_> = wms_inventory::Zone::all().collect();
            let mut expected: BTreeMap<String, i64> = BTreeMap::new();

            for op in ops {
                let before = h.journal.index().snapshot();
                match op {
                    Op::Allocate { line, container: c, quantity } => {
                        if let Ok(r) = h.ledger.allocate(&vid("VP"), line, &container(c), quantity) {
                            *expected.entry(r.material.to_string()).or_insert(0) += r.allocation.quantity;
                        }
                    }
                    Op::Dispatch { container: c, material, quantity } => {
                        let selection = [line(MATERIALS[material], quantity)];
                        match h.engine.dispatch(&container(c), &selection) {
                            Ok(_) => {
                                *expected.entry(MATERIALS[material].to_string()).or_insert(0) -= quantity;
                            }
                            Err(_) => {
                                prop_assert_eq!(&h.journal.index().snapshot(), &before);
                            }
                        }
                    }
                    Op::RelocateMaterial { source, destination, material, quantity } => {
                        let selection = [line(MATERIALS[material], quantity)];
                        if h.engine
                            .relocate_material(&container(source), &selection, &container(destination))
                            .is_err()
                        {
                            prop_assert_eq!(&h.journal.index().snapshot(), &before);
                        }
                    }
                    Op::RelocateContainer { container: c, zone, shelf } => {
                        let raw = format!("{}-{}-EST{shelf:02}-NIV01", namer.warehouse(), zones[zone]);
                        let _ = h.engine.relocate_container(&container(c), &raw);
                    }
                }
            }

            prop_assert!(h.journal.verify_index().unwrap());

            expected.retain(|_, q| *q != 0);
            let totals: BTreeMap<String, i64> = h
                .journal
                .index()
                .read()
                .totals()
                .into_iter()
                .map(|(m, q)| (m.to_string(), q))
                .collect();
            prop_assert_eq!(totals, expected);

            let voucher = h.ledger.get_voucher(&vid("VP")).unwrap();
            for l in voucher.lines() {
                prop_assert!(l.is_balanced());
            }
        }
    }
}
