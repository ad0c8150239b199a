//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate model validation, calculators and the document store into
//!   use-case level APIs.
//! - Keep CLI callers decoupled from storage details.

pub mod cap_table_service;

pub use cap_table_service::{
    AllocationDraft, CapTableService, ConversionChoice, HolderRef, OverageDecision, Outcome,
    PricedRound, RoundDraft, ServiceError, ServiceResult, DEFAULT_COMPANY_NAME,
};
