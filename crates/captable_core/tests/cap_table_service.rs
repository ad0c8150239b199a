use captable_core::db::open_db_in_memory;
use captable_core::repo::store::StoreError;
use captable_core::service::{
    AllocationDraft, ConversionChoice, HolderRef, OverageDecision, RoundDraft,
    DEFAULT_COMPANY_NAME,
};
use captable_core::{
    AllocationType, CapTable, CapTableService, CapTableStore, CapacityWarning, DilutionInput,
    RoundTerms, ServiceError, SqliteCapTableStore, StoreResult, ValidationError,
};
use std::cell::{Cell, RefCell};
use uuid::Uuid;

/// Store whose saves can be switched to fail.
#[derive(Default)]
struct FlakyStore {
    failing: Cell<bool>,
    saved: RefCell<Option<CapTable>>,
}

impl CapTableStore for FlakyStore {
    fn load(&self) -> StoreResult<Option<CapTable>> {
        Ok(self.saved.borrow().clone())
    }

    fn save(&self, cap_table: &CapTable) -> StoreResult<()> {
        if self.failing.get() {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        *self.saved.borrow_mut() = Some(cap_table.clone());
        Ok(())
    }
}

fn service() -> CapTableService<FlakyStore> {
    CapTableService::open(FlakyStore::default(), 1.2).unwrap()
}

fn safe_terms(cap: f64, target: Option<f64>) -> RoundTerms {
    RoundTerms::Safe {
        valuation_cap: cap,
        target_investment: target,
        conversion: None,
    }
}

#[test]
fn open_on_empty_store_starts_untitled_document() {
    let service = service();
    assert_eq!(service.cap_table().company_name, DEFAULT_COMPANY_NAME);
    assert!(service.cap_table().rounds.is_empty());
    assert!(!service.is_dirty());
}

#[test]
fn mutations_are_saved_and_reloaded_from_sqlite() {
    let conn = open_db_in_memory().unwrap();
    {
        let store = SqliteCapTableStore::try_new(&conn).unwrap();
        let mut service = CapTableService::open(store, 1.2).unwrap();
        service.rename_company("Acme").unwrap();
        let round_id = service
            .add_round(RoundDraft::new("Founders", RoundTerms::Common))
            .unwrap()
            .value;
        let outcome = service
            .add_allocation(
                round_id,
                AllocationDraft::shares("Alice", 1_000, AllocationType::Common),
                OverageDecision::Reject,
            )
            .unwrap();
        assert!(outcome.is_saved());
    }

    let store = SqliteCapTableStore::try_new(&conn).unwrap();
    let reopened = CapTableService::open(store, 1.2).unwrap();
    assert_eq!(reopened.cap_table().company_name, "Acme");
    assert_eq!(reopened.cap_table().revision, 3);
    assert_eq!(reopened.summary().issued_shares, 1_000);
    assert_eq!(reopened.ownership()[0].holder_name, "Alice");
}

#[test]
fn rejected_mutations_leave_state_unchanged() {
    let mut service = service();
    let pool_id = service
        .add_round(RoundDraft::new(
            "Pool",
            RoundTerms::EquityPool {
                authorized_size: 100,
            },
        ))
        .unwrap()
        .value;
    let before = service.cap_table().clone();

    let err = service
        .add_allocation(
            pool_id,
            AllocationDraft::shares("Employee", 150, AllocationType::Option),
            OverageDecision::Accept,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::PoolOverAuthorized { .. })
    ));

    let err = service
        .add_round(RoundDraft::new(
            "Bad seed",
            RoundTerms::Priced {
                price_per_share: 0.0,
                money_raised: None,
            },
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::NonPositivePrice(_))
    ));

    let err = service
        .add_round(RoundDraft::new("   ", safe_terms(1_000_000.0, None)))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::EmptyRoundName)
    ));

    let err = service.rename_company(" ").unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::EmptyCompanyName)
    ));

    assert_eq!(service.cap_table(), &before);
}

#[test]
fn unknown_ids_are_reported() {
    let mut service = service();
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.delete_round(missing).unwrap_err(),
        ServiceError::RoundNotFound(id) if id == missing
    ));
    assert!(matches!(
        service.delete_allocation(missing).unwrap_err(),
        ServiceError::AllocationNotFound(id) if id == missing
    ));

    let round_id = service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap()
        .value;
    let draft = AllocationDraft {
        holder: HolderRef::Id(missing),
        ..AllocationDraft::shares("ignored", 10, AllocationType::Common)
    };
    assert!(matches!(
        service
            .add_allocation(round_id, draft, OverageDecision::Reject)
            .unwrap_err(),
        ServiceError::HolderNotFound(id) if id == missing
    ));
}

#[test]
fn overages_need_explicit_acceptance() {
    let mut service = service();
    let safe_id = service
        .add_round(RoundDraft::new("SAFE", safe_terms(5_000_000.0, Some(100_000.0))))
        .unwrap()
        .value;

    let draft = AllocationDraft::investment("Investor", 150_000.0, AllocationType::Preferred);
    let err = service
        .add_allocation(safe_id, draft.clone(), OverageDecision::Reject)
        .unwrap_err();
    match err {
        ServiceError::Overage(warnings) => {
            assert_eq!(warnings.len(), 1);
            assert!(matches!(warnings[0], CapacityWarning::SafeOverTarget { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(service.cap_table().rounds[0].allocations.is_empty());

    let outcome = service
        .add_allocation(safe_id, draft, OverageDecision::Accept)
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(service.cap_table().rounds[0].allocations.len(), 1);

    // The accepted overage does not block unrelated mutations.
    service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap();
}

#[test]
fn failed_save_keeps_in_memory_change_until_retry() {
    let mut service = service();
    service.store().failing.set(true);

    let outcome = service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap();

    assert!(!outcome.is_saved());
    assert!(service.is_dirty());
    assert_eq!(service.cap_table().rounds.len(), 1);
    assert!(service.store().saved.borrow().is_none());

    assert!(service.retry_save().is_err());
    service.store().failing.set(false);
    service.retry_save().unwrap();
    assert!(!service.is_dirty());
    assert_eq!(
        service.store().saved.borrow().as_ref().unwrap().rounds.len(),
        1
    );
}

#[test]
fn priced_round_converts_safes_atomically() {
    let mut service = service();
    let common_id = service
        .add_round(RoundDraft::new("Common", RoundTerms::Common))
        .unwrap()
        .value;
    service
        .add_allocation(
            common_id,
            AllocationDraft::shares("Alice", 10_000_000, AllocationType::Common),
            OverageDecision::Reject,
        )
        .unwrap();
    let safe_id = service
        .add_round(RoundDraft::new("SAFE", safe_terms(5_000_000.0, None)))
        .unwrap()
        .value;
    service
        .add_allocation(
            safe_id,
            AllocationDraft::investment("Investor", 500_000.0, AllocationType::Preferred),
            OverageDecision::Reject,
        )
        .unwrap();

    let preview = service.preview_conversion(1.0).unwrap();
    assert_eq!(preview.total_converted_shares(), 1_000_000);
    assert!(service.cap_table().has_unconverted_safes());

    let outcome = service
        .add_priced_round(
            RoundDraft::new(
                "Seed",
                RoundTerms::Priced {
                    price_per_share: 1.0,
                    money_raised: None,
                },
            ),
            vec![AllocationDraft::shares(
                "Lead",
                2_000_000,
                AllocationType::Preferred,
            )],
            ConversionChoice::Convert,
            OverageDecision::Reject,
        )
        .unwrap();

    assert_eq!(outcome.value.conversion, Some(preview));
    assert!(!service.cap_table().has_unconverted_safes());
    assert!(service.cap_table().has_priced_round());
    assert_eq!(service.summary().issued_shares, 13_000_000);
    assert_eq!(service.summary().effective_price_per_share, Some(1.0));

    let later_safe = service
        .add_round(RoundDraft::new("Bridge SAFE", safe_terms(20_000_000.0, None)))
        .unwrap()
        .value;
    service
        .add_allocation(
            later_safe,
            AllocationDraft::investment("Angel", 50_000.0, AllocationType::Preferred),
            OverageDecision::Reject,
        )
        .unwrap();
    let rounds_before = service.cap_table().rounds.len();

    let err = service
        .add_priced_round(
            RoundDraft::new(
                "Series A",
                RoundTerms::Priced {
                    price_per_share: 3.0,
                    money_raised: None,
                },
            ),
            Vec::new(),
            ConversionChoice::Convert,
            OverageDecision::Reject,
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::PricedRoundExists));
    assert_eq!(service.cap_table().rounds.len(), rounds_before);
    assert!(service.cap_table().has_unconverted_safes());
}

#[test]
fn failed_priced_round_does_not_convert() {
    let mut service = service();
    let safe_id = service
        .add_round(RoundDraft::new("SAFE", safe_terms(5_000_000.0, None)))
        .unwrap()
        .value;
    service
        .add_allocation(
            safe_id,
            AllocationDraft::investment("Investor", 100.0, AllocationType::Preferred),
            OverageDecision::Reject,
        )
        .unwrap();

    let err = service
        .add_priced_round(
            RoundDraft::new(
                "Seed",
                RoundTerms::Priced {
                    price_per_share: 1.0,
                    money_raised: Some(10.0),
                },
            ),
            vec![AllocationDraft::shares("Lead", 50, AllocationType::Preferred)],
            ConversionChoice::Convert,
            OverageDecision::Reject,
        )
        .unwrap_err();

    assert!(matches!(err, ServiceError::Overage(_)));
    assert!(service.cap_table().has_unconverted_safes());
    assert_eq!(service.cap_table().rounds.len(), 1);

    let err = service
        .add_priced_round(
            RoundDraft::new("Common", RoundTerms::Common),
            Vec::new(),
            ConversionChoice::Convert,
            OverageDecision::Reject,
        )
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotPricedRound));
}

#[test]
fn update_round_keeps_conversion_and_allocations() {
    let mut service = service();
    let safe_id = service
        .add_round(RoundDraft::new("SAFE", safe_terms(1_000_000.0, None)))
        .unwrap()
        .value;
    service
        .add_allocation(
            safe_id,
            AllocationDraft::investment("Investor", 10_000.0, AllocationType::Preferred),
            OverageDecision::Reject,
        )
        .unwrap();
    service
        .add_priced_round(
            RoundDraft::new(
                "Seed",
                RoundTerms::Priced {
                    price_per_share: 1.0,
                    money_raised: None,
                },
            ),
            Vec::new(),
            ConversionChoice::Convert,
            OverageDecision::Reject,
        )
        .unwrap();

    let mut draft = RoundDraft::new("SAFE 2023", safe_terms(1_000_000.0, Some(20_000.0)));
    draft.color = Some("#123456".to_string());
    service
        .update_round(safe_id, draft, OverageDecision::Reject)
        .unwrap();

    let round = service.cap_table().round(safe_id).unwrap();
    assert_eq!(round.name, "SAFE 2023");
    assert_eq!(round.color, "#123456");
    assert!(!round.is_unconverted_safe());
    assert_eq!(round.allocations.len(), 1);
}

#[test]
fn delete_round_cascades_to_allocations() {
    let mut service = service();
    let round_id = service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap()
        .value;
    let allocation_id = service
        .add_allocation(
            round_id,
            AllocationDraft::shares("Alice", 100, AllocationType::Common),
            OverageDecision::Reject,
        )
        .unwrap()
        .value;

    let removed = service.delete_round(round_id).unwrap().value;

    assert_eq!(removed.allocations.len(), 1);
    assert!(service.cap_table().find_allocation(allocation_id).is_none());
    assert_eq!(service.summary().issued_shares, 0);
}

#[test]
fn holders_can_be_renamed_without_losing_stake() {
    let mut service = service();
    let round_id = service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap()
        .value;
    let alice = service.ensure_holder("Alice").unwrap().value;
    service
        .add_allocation(
            round_id,
            AllocationDraft {
                holder: HolderRef::Id(alice),
                ..AllocationDraft::shares("", 700, AllocationType::Common)
            },
            OverageDecision::Reject,
        )
        .unwrap();
    service.ensure_holder("Bob").unwrap();

    service.rename_holder(alice, "Alice Smith").unwrap();
    assert!(matches!(
        service.rename_holder(alice, "Bob").unwrap_err(),
        ServiceError::Validation(ValidationError::DuplicateHolderName(_))
    ));

    let rows = service.ownership();
    assert_eq!(rows[0].holder_id, alice);
    assert_eq!(rows[0].holder_name, "Alice Smith");
    assert_eq!(rows[0].shares, 700);
}

#[test]
fn update_allocation_replaces_fields() {
    let mut service = service();
    let round_id = service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap()
        .value;
    let allocation_id = service
        .add_allocation(
            round_id,
            AllocationDraft::shares("Alice", 100, AllocationType::Common),
            OverageDecision::Reject,
        )
        .unwrap()
        .value;

    let mut draft = AllocationDraft::shares("Alice", 250, AllocationType::Rsu);
    draft.vesting = Some("monthly".to_string());
    service
        .update_allocation(allocation_id, draft, OverageDecision::Reject)
        .unwrap();

    let (_, allocation) = service.cap_table().find_allocation(allocation_id).unwrap();
    assert_eq!(allocation.shares, 250);
    assert_eq!(allocation.kind, AllocationType::Rsu);
    assert_eq!(allocation.vesting.as_deref(), Some("monthly"));

    let err = service
        .update_allocation(
            allocation_id,
            AllocationDraft::shares("Alice", 0, AllocationType::Common),
            OverageDecision::Reject,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::NonPositiveShares(_))
    ));
}

#[test]
fn authorized_shares_can_be_set_or_suggested() {
    let mut service = service();
    let round_id = service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap()
        .value;
    service
        .add_allocation(
            round_id,
            AllocationDraft::shares("Alice", 1_000, AllocationType::Common),
            OverageDecision::Reject,
        )
        .unwrap();

    service.set_authorized_shares(500).unwrap();
    assert!(service.summary().over_allocated);

    let suggested = service.auto_authorize().unwrap().value;
    assert_eq!(suggested, 1_200);
    assert_eq!(service.cap_table().authorized_shares, 1_200);
    assert!(!service.summary().over_allocated);
}

#[test]
fn dilution_projection_reads_current_table() {
    let mut service = service();
    let round_id = service
        .add_round(RoundDraft::new("Founders", RoundTerms::Common))
        .unwrap()
        .value;
    service
        .add_allocation(
            round_id,
            AllocationDraft::shares("Alice", 1_000, AllocationType::Common),
            OverageDecision::Reject,
        )
        .unwrap();

    let projection = service
        .project_dilution(&DilutionInput {
            price_per_share: 1.0,
            money_raised: 1_000.0,
        })
        .unwrap();
    assert_eq!(projection.post_money_total_shares, 2_000.0);
    assert!(matches!(
        service
            .project_dilution(&DilutionInput {
                price_per_share: -1.0,
                money_raised: 1.0,
            })
            .unwrap_err(),
        ServiceError::Dilution(_)
    ));
}

#[test]
fn csv_import_replaces_rounds_but_keeps_company_settings() {
    let mut service = service();
    service.rename_company("Acme").unwrap();
    service.set_authorized_shares(5_000).unwrap();
    service
        .add_round(RoundDraft::new("Old round", RoundTerms::Common))
        .unwrap();

    let input = "round_name,round_kind,holder,shares\nFounders,common,Alice,1000\n";
    service.import_csv(input, OverageDecision::Reject).unwrap();

    let table = service.cap_table();
    assert_eq!(table.company_name, "Acme");
    assert_eq!(table.authorized_shares, 5_000);
    assert_eq!(table.rounds.len(), 1);
    assert_eq!(table.rounds[0].name, "Founders");

    let exported = service.export_csv().unwrap();
    assert!(exported.contains("Founders,common"));

    let before = service.cap_table().clone();
    assert!(matches!(
        service
            .import_csv("holder\nAlice\n", OverageDecision::Reject)
            .unwrap_err(),
        ServiceError::Exchange(_)
    ));
    assert_eq!(service.cap_table(), &before);
}

#[test]
fn csv_import_over_round_targets_needs_acceptance() {
    let mut service = service();
    service
        .add_round(RoundDraft::new("Old round", RoundTerms::Common))
        .unwrap();
    let before = service.cap_table().clone();

    let input = "\
round_name,round_kind,price_per_share,valuation_cap,target_amount,holder,shares,investment
Seed,priced,1,,100,Lead,150,
SAFE,safe,,1000000,500,Angel,,800
";
    match service.import_csv(input, OverageDecision::Reject).unwrap_err() {
        ServiceError::Overage(warnings) => {
            assert_eq!(warnings.len(), 2);
            assert!(warnings
                .iter()
                .any(|warning| matches!(warning, CapacityWarning::SafeOverTarget { .. })));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.cap_table(), &before);
    assert_eq!(service.store().saved.borrow().as_ref(), Some(&before));

    let outcome = service.import_csv(input, OverageDecision::Accept).unwrap();
    assert_eq!(outcome.warnings.len(), 2);
    assert_eq!(service.cap_table().rounds.len(), 2);
    assert_eq!(service.cap_table().rounds[0].name, "Seed");
}
