//! Extract-reshape-load pipeline for DHIS2 aggregate health reports.
//!
//! A sync pass pulls data values per configured dataset and organisation
//! unit, pivots them from long to wide form and replaces one Postgres table
//! per dataset. A separate resolution pass rewrites the composite
//! `{dataElementId}_{categoryOptionComboId}` column names into readable
//! names using cached metadata dictionaries.

pub mod cli;
pub mod client;
pub mod config;
pub mod identifier;
pub mod metadata;
pub mod resolve;
pub mod store;
pub mod sync;
pub mod table;
