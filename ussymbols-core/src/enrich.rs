//! Optional enrichment results.
//!
//! Enrichment steps (regulator identifiers, IPO dates) may fail without
//! failing the run. Their outcome is an explicit value the caller logs and
//! branches on.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Enrichment<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Enrichment::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn from_result<E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Enrichment::Available(v),
            Err(e) => Enrichment::unavailable(e.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Enrichment::Available(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Enrichment::Available(_) => None,
            Enrichment::Unavailable { reason } => Some(reason),
        }
    }

    pub fn as_ref(&self) -> Enrichment<&T> {
        match self {
            Enrichment::Available(v) => Enrichment::Available(v),
            Enrichment::Unavailable { reason } => Enrichment::Unavailable {
                reason: reason.clone(),
            },
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Enrichment::Available(v) => Some(v),
            Enrichment::Unavailable { .. } => None,
        }
    }
}
