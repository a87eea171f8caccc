//! Data quality gate.
//!
//! The [`Validator`] asserts the invariants of a cleaned dataset before it may
//! be persisted. It runs all checks, aggregates the violations into a
//! [`ValidationReport`], and hands back a [`ValidatedFrame`] only when every
//! check passes.

mod validator;

pub use validator::{
    CheckResult, QualityCheck, REVENUE_TOLERANCE, ValidatedFrame, ValidationReport, Validator,
};
