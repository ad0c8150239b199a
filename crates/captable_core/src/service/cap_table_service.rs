//! Cap-table use-case service.
//!
//! # Responsibility
//! - Own the in-memory document and apply validated mutations to it.
//! - Persist the whole document after every committed mutation.
//! - Expose the derived views (summary, ownership, tree, projections).
//!
//! # Invariants
//! - Mutations run on a staged copy; a rejected mutation leaves the
//!   committed document untouched.
//! - A committed document always passes `CapTable::validate()`.
//! - Soft overages on rounds touched by a mutation block it unless the
//!   caller passes `OverageDecision::Accept`.
//! - A failed save never rolls back the in-memory change; it is logged,
//!   reported in the `Outcome` and the service stays dirty until a later
//!   save succeeds.

use crate::calc::capacity::{check_round_capacity, CapacityWarning};
use crate::calc::conversion::{
    convert_safes, preview_conversion, ConversionError, ConversionPreview,
};
use crate::calc::dilution::{project_dilution, DilutionError, DilutionInput, DilutionProjection};
use crate::calc::ownership::{fully_diluted_shares, ownership_by_holder, HolderOwnership};
use crate::calc::summary::{company_summary, suggested_authorized_shares, CompanySummary};
use crate::exchange::{export_table, import_table, ExchangeError};
use crate::model::allocation::{Allocation, AllocationId, AllocationType};
use crate::model::cap_table::CapTable;
use crate::model::holder::HolderId;
use crate::model::round::{default_round_color, Round, RoundId, RoundTerms};
use crate::model::validation::ValidationError;
use crate::repo::store::{CapTableStore, StoreError};
use crate::view::tree::{ownership_tree, OwnershipNode};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name given to a document created from an empty store.
pub const DEFAULT_COMPANY_NAME: &str = "Untitled company";

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service error for cap-table use-cases.
#[derive(Debug)]
pub enum ServiceError {
    Validation(ValidationError),
    /// Soft overages the caller did not accept.
    Overage(Vec<CapacityWarning>),
    RoundNotFound(RoundId),
    AllocationNotFound(AllocationId),
    HolderNotFound(HolderId),
    /// SAFE conversion was requested for a round without a share price.
    NotPricedRound,
    /// SAFE conversion was requested after the first priced round.
    PricedRoundExists,
    Conversion(ConversionError),
    Dilution(DilutionError),
    Exchange(ExchangeError),
    Store(StoreError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Overage(warnings) => {
                write!(f, "{} overage(s) need acceptance", warnings.len())?;
                for warning in warnings {
                    write!(f, "; {warning}")?;
                }
                Ok(())
            }
            Self::RoundNotFound(id) => write!(f, "round not found: {id}"),
            Self::AllocationNotFound(id) => write!(f, "allocation not found: {id}"),
            Self::HolderNotFound(id) => write!(f, "holder not found: {id}"),
            Self::NotPricedRound => write!(f, "SAFE conversion requires a priced round"),
            Self::PricedRoundExists => {
                write!(f, "SAFE conversion only runs with the first priced round")
            }
            Self::Conversion(err) => write!(f, "{err}"),
            Self::Dilution(err) => write!(f, "{err}"),
            Self::Exchange(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Conversion(err) => Some(err),
            Self::Dilution(err) => Some(err),
            Self::Exchange(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for ServiceError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::UnknownHolder(id) => Self::HolderNotFound(id),
            other => Self::Validation(other),
        }
    }
}

impl From<ConversionError> for ServiceError {
    fn from(value: ConversionError) -> Self {
        Self::Conversion(value)
    }
}

impl From<DilutionError> for ServiceError {
    fn from(value: DilutionError) -> Self {
        Self::Dilution(value)
    }
}

impl From<ExchangeError> for ServiceError {
    fn from(value: ExchangeError) -> Self {
        Self::Exchange(value)
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Caller's answer to soft capacity warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverageDecision {
    #[default]
    Reject,
    Accept,
}

/// Whether a new priced round converts pending SAFEs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionChoice {
    #[default]
    Skip,
    Convert,
}

/// Editable round fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundDraft {
    pub name: String,
    pub date: Option<NaiveDate>,
    /// Palette color by position when `None`.
    pub color: Option<String>,
    pub terms: RoundTerms,
}

impl RoundDraft {
    pub fn new(name: impl Into<String>, terms: RoundTerms) -> Self {
        Self {
            name: name.into(),
            date: None,
            color: None,
            terms,
        }
    }
}

/// Reference to an existing holder, or a name to register on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderRef {
    Id(HolderId),
    Name(String),
}

/// Editable allocation fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationDraft {
    pub holder: HolderRef,
    pub shares: u64,
    pub investment: Option<f64>,
    pub kind: AllocationType,
    pub vesting: Option<String>,
    pub notes: Option<String>,
}

impl AllocationDraft {
    /// Share grant for a named holder.
    pub fn shares(holder: impl Into<String>, shares: u64, kind: AllocationType) -> Self {
        Self {
            holder: HolderRef::Name(holder.into()),
            shares,
            investment: None,
            kind,
            vesting: None,
            notes: None,
        }
    }

    /// Investment-driven SAFE allocation for a named holder.
    pub fn investment(holder: impl Into<String>, amount: f64, kind: AllocationType) -> Self {
        Self {
            investment: Some(amount),
            ..Self::shares(holder, 0, kind)
        }
    }
}

/// Result of a committed mutation.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    /// Overages the caller accepted.
    pub warnings: Vec<CapacityWarning>,
    /// Save failure; the in-memory change is kept regardless.
    pub save_error: Option<StoreError>,
}

impl<T> Outcome<T> {
    pub fn is_saved(&self) -> bool {
        self.save_error.is_none()
    }
}

/// Result of `add_priced_round`.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedRound {
    pub round_id: RoundId,
    /// Conversion applied before the round was added, if requested.
    pub conversion: Option<ConversionPreview>,
}

/// Cap-table service facade over a document store.
pub struct CapTableService<S: CapTableStore> {
    store: S,
    cap_table: CapTable,
    authorized_headroom: f64,
    dirty: bool,
}

impl<S: CapTableStore> CapTableService<S> {
    /// Loads the stored document, or starts an empty one when none exists.
    ///
    /// # Errors
    /// - `Store` when the store fails to load. The service never starts
    ///   empty over a store it could not read.
    pub fn open(store: S, authorized_headroom: f64) -> ServiceResult<Self> {
        let loaded = store.load()?;
        let cap_table = match loaded {
            Some(cap_table) => {
                info!(
                    "event=service_open module=service status=ok source=store rounds={}",
                    cap_table.rounds.len()
                );
                cap_table
            }
            None => {
                info!("event=service_open module=service status=ok source=empty");
                CapTable::new(DEFAULT_COMPANY_NAME)
            }
        };
        Ok(Self {
            store,
            cap_table,
            authorized_headroom,
            dirty: false,
        })
    }

    pub fn cap_table(&self) -> &CapTable {
        &self.cap_table
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns whether a committed change has not reached the store yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Saves the current document again, typically after a failed save.
    pub fn retry_save(&mut self) -> ServiceResult<()> {
        match self.persist("retry_save") {
            None => Ok(()),
            Some(err) => Err(ServiceError::Store(err)),
        }
    }

    pub fn rename_company(&mut self, name: &str) -> ServiceResult<Outcome<()>> {
        let trimmed = name.trim().to_string();
        self.commit("rename_company", OverageDecision::Reject, |table| {
            table.company_name = trimmed;
            Ok(())
        })
    }

    pub fn set_authorized_shares(&mut self, shares: u64) -> ServiceResult<Outcome<()>> {
        self.commit("set_authorized", OverageDecision::Reject, |table| {
            table.authorized_shares = shares;
            Ok(())
        })
    }

    /// Sets authorized shares to the suggestion derived from fully-diluted
    /// shares and the configured headroom; returns the new value.
    pub fn auto_authorize(&mut self) -> ServiceResult<Outcome<u64>> {
        let suggested = suggested_authorized_shares(
            fully_diluted_shares(&self.cap_table),
            self.authorized_headroom,
        );
        self.commit("auto_authorize", OverageDecision::Reject, |table| {
            table.authorized_shares = suggested;
            Ok(suggested)
        })
    }

    /// Returns the holder named `name`, registering it when absent.
    pub fn ensure_holder(&mut self, name: &str) -> ServiceResult<Outcome<HolderId>> {
        self.commit("ensure_holder", OverageDecision::Reject, |table| {
            Ok(table.ensure_holder(name)?)
        })
    }

    pub fn rename_holder(&mut self, id: HolderId, name: &str) -> ServiceResult<Outcome<()>> {
        self.commit("rename_holder", OverageDecision::Reject, |table| {
            Ok(table.rename_holder(id, name)?)
        })
    }

    /// Appends a new round without allocations.
    pub fn add_round(&mut self, draft: RoundDraft) -> ServiceResult<Outcome<RoundId>> {
        self.commit("add_round", OverageDecision::Reject, |table| {
            let round = build_round(table, draft);
            let id = round.id;
            table.rounds.push(round);
            Ok(id)
        })
    }

    /// Replaces a round's editable fields, keeping its id and allocations.
    ///
    /// A SAFE round keeps its conversion record unless the draft carries one.
    pub fn update_round(
        &mut self,
        id: RoundId,
        draft: RoundDraft,
        decision: OverageDecision,
    ) -> ServiceResult<Outcome<()>> {
        self.commit("update_round", decision, |table| {
            let round = table.round_mut(id).ok_or(ServiceError::RoundNotFound(id))?;
            let previous_conversion = match &round.terms {
                RoundTerms::Safe { conversion, .. } => *conversion,
                _ => None,
            };

            round.name = draft.name.trim().to_string();
            round.date = draft.date;
            if let Some(color) = draft.color {
                round.color = color;
            }
            round.terms = draft.terms;
            if let RoundTerms::Safe { conversion, .. } = &mut round.terms {
                if conversion.is_none() {
                    *conversion = previous_conversion;
                }
            }
            Ok(())
        })
    }

    /// Deletes a round and every allocation it owns.
    pub fn delete_round(&mut self, id: RoundId) -> ServiceResult<Outcome<Round>> {
        self.commit("delete_round", OverageDecision::Reject, |table| {
            table.remove_round(id).ok_or(ServiceError::RoundNotFound(id))
        })
    }

    pub fn add_allocation(
        &mut self,
        round_id: RoundId,
        draft: AllocationDraft,
        decision: OverageDecision,
    ) -> ServiceResult<Outcome<AllocationId>> {
        self.commit("add_allocation", decision, |table| {
            let holder_id = resolve_holder(table, &draft.holder)?;
            let round = table
                .round_mut(round_id)
                .ok_or(ServiceError::RoundNotFound(round_id))?;
            let mut allocation = Allocation::new(holder_id, draft.shares, draft.kind);
            allocation.investment = draft.investment;
            allocation.vesting = draft.vesting;
            allocation.notes = draft.notes;
            let id = allocation.id;
            round.allocations.push(allocation);
            Ok(id)
        })
    }

    /// Replaces an allocation's editable fields, keeping its id, round and
    /// conversion history.
    pub fn update_allocation(
        &mut self,
        id: AllocationId,
        draft: AllocationDraft,
        decision: OverageDecision,
    ) -> ServiceResult<Outcome<()>> {
        self.commit("update_allocation", decision, |table| {
            let holder_id = resolve_holder(table, &draft.holder)?;
            let allocation = table
                .rounds
                .iter_mut()
                .find_map(|round| round.allocation_mut(id))
                .ok_or(ServiceError::AllocationNotFound(id))?;
            allocation.holder_id = holder_id;
            allocation.shares = draft.shares;
            allocation.investment = draft.investment;
            allocation.kind = draft.kind;
            allocation.vesting = draft.vesting;
            allocation.notes = draft.notes;
            Ok(())
        })
    }

    pub fn delete_allocation(&mut self, id: AllocationId) -> ServiceResult<Outcome<Allocation>> {
        self.commit("delete_allocation", OverageDecision::Reject, |table| {
            table
                .rounds
                .iter_mut()
                .find_map(|round| round.remove_allocation(id))
                .ok_or(ServiceError::AllocationNotFound(id))
        })
    }

    /// Previews SAFE conversion at `new_round_price` without mutating.
    pub fn preview_conversion(&self, new_round_price: f64) -> ServiceResult<ConversionPreview> {
        Ok(preview_conversion(&self.cap_table, new_round_price)?)
    }

    /// Adds a priced round, first converting pending SAFEs when requested.
    ///
    /// Conversion is only offered with the first priced round of the table.
    /// Conversion and insertion commit together or not at all.
    pub fn add_priced_round(
        &mut self,
        draft: RoundDraft,
        allocations: Vec<AllocationDraft>,
        choice: ConversionChoice,
        decision: OverageDecision,
    ) -> ServiceResult<Outcome<PricedRound>> {
        let price = draft
            .terms
            .price_per_share()
            .ok_or(ServiceError::NotPricedRound)?;
        if choice == ConversionChoice::Convert && self.cap_table.has_priced_round() {
            warn!(
                "event=doc_mutate module=service status=rejected op=add_priced_round error=priced_round_exists"
            );
            return Err(ServiceError::PricedRoundExists);
        }

        self.commit("add_priced_round", decision, |table| {
            let conversion = match choice {
                ConversionChoice::Convert => Some(convert_safes(table, price)?),
                ConversionChoice::Skip => None,
            };

            let mut round = build_round(table, draft);
            for allocation_draft in allocations {
                let holder_id = resolve_holder(table, &allocation_draft.holder)?;
                let mut allocation =
                    Allocation::new(holder_id, allocation_draft.shares, allocation_draft.kind);
                allocation.investment = allocation_draft.investment;
                allocation.vesting = allocation_draft.vesting;
                allocation.notes = allocation_draft.notes;
                round.allocations.push(allocation);
            }
            let round_id = round.id;
            table.rounds.push(round);
            Ok(PricedRound {
                round_id,
                conversion,
            })
        })
    }

    pub fn project_dilution(&self, input: &DilutionInput) -> ServiceResult<DilutionProjection> {
        Ok(project_dilution(&self.cap_table, input)?)
    }

    pub fn summary(&self) -> CompanySummary {
        company_summary(&self.cap_table, self.authorized_headroom)
    }

    pub fn ownership(&self) -> Vec<HolderOwnership> {
        ownership_by_holder(&self.cap_table)
    }

    pub fn ownership_tree(&self) -> OwnershipNode {
        ownership_tree(&self.cap_table)
    }

    pub fn export_csv(&self) -> ServiceResult<String> {
        Ok(export_table(&self.cap_table)?)
    }

    /// Replaces rounds, allocations and holders with the imported table.
    ///
    /// The company name and authorized share count are kept, since the
    /// tabular format does not carry them. Every imported round counts as
    /// touched, so overages in the file need `OverageDecision::Accept`.
    pub fn import_csv(
        &mut self,
        input: &str,
        decision: OverageDecision,
    ) -> ServiceResult<Outcome<()>> {
        let mut imported = import_table(&self.cap_table.company_name, input)?;
        imported.authorized_shares = self.cap_table.authorized_shares;
        self.commit("import_csv", decision, |table| {
            *table = imported;
            Ok(())
        })
    }

    fn commit<T>(
        &mut self,
        op: &'static str,
        decision: OverageDecision,
        mutate: impl FnOnce(&mut CapTable) -> ServiceResult<T>,
    ) -> ServiceResult<Outcome<T>> {
        let mut staged = self.cap_table.clone();
        let value = mutate(&mut staged).map_err(|err| {
            warn!("event=doc_mutate module=service status=rejected op={op} error={err}");
            err
        })?;
        staged.validate().map_err(|err| {
            warn!("event=doc_mutate module=service status=invalid op={op} error={err}");
            ServiceError::from(err)
        })?;

        let warnings = touched_round_warnings(&self.cap_table, &staged);
        if !warnings.is_empty() && decision == OverageDecision::Reject {
            warn!(
                "event=doc_mutate module=service status=overage op={op} warnings={}",
                warnings.len()
            );
            return Err(ServiceError::Overage(warnings));
        }

        staged.revision = self.cap_table.revision + 1;
        self.cap_table = staged;
        self.dirty = true;
        info!(
            "event=doc_mutate module=service status=ok op={op} revision={} rounds={} warnings={}",
            self.cap_table.revision,
            self.cap_table.rounds.len(),
            warnings.len()
        );

        let save_error = self.persist(op);
        Ok(Outcome {
            value,
            warnings,
            save_error,
        })
    }

    fn persist(&mut self, op: &'static str) -> Option<StoreError> {
        match self.store.save(&self.cap_table) {
            Ok(()) => {
                self.dirty = false;
                None
            }
            Err(err) => {
                warn!("event=doc_save module=service status=error op={op} error={err}");
                Some(err)
            }
        }
    }
}

fn build_round(table: &CapTable, draft: RoundDraft) -> Round {
    let mut round = Round::new(draft.name.trim(), draft.terms);
    round.date = draft.date;
    round.color = draft
        .color
        .unwrap_or_else(|| default_round_color(table.rounds.len()).to_string());
    round
}

fn resolve_holder(table: &mut CapTable, holder: &HolderRef) -> ServiceResult<HolderId> {
    match holder {
        HolderRef::Id(id) => table
            .holder(*id)
            .map(|holder| holder.id)
            .ok_or(ServiceError::HolderNotFound(*id)),
        HolderRef::Name(name) => Ok(table.ensure_holder(name)?),
    }
}

/// Capacity warnings of rounds that are new or changed in `staged`.
fn touched_round_warnings(current: &CapTable, staged: &CapTable) -> Vec<CapacityWarning> {
    staged
        .rounds
        .iter()
        .filter(|round| current.round(round.id) != Some(*round))
        .flat_map(check_round_capacity)
        .collect()
}
