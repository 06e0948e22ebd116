use std::fmt::Display;

use serde::{Deserialize, Serialize};
use strum_macros::{Display as StrumDisplay, EnumDiscriminants};
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::Direction;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(ErrorKind))]
#[strum_discriminants(derive(Hash, Serialize, Deserialize, StrumDisplay, ToSchema))]
pub enum ReachabilityError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("traffic not allowed: {message}")]
    TrafficNotAllowed {
        resource_id: String,
        direction: Direction,
        message: String,
    },

    #[error("missing route: {message}")]
    MissingRoute {
        route_table_ids: Vec<String>,
        message: String,
    },

    #[error("cidr overlap: {0}")]
    CidrOverlap(String),

    #[error("route table association error: {0}")]
    RouteTableAssociation(String),
}

impl ReachabilityError {
    pub fn kind(&self) -> ErrorKind {
        self.into()
    }

    /// The resource the failure points at, when there is exactly one.
    pub fn resource_id(&self) -> Option<&str> {
        match self {
            ReachabilityError::TrafficNotAllowed { resource_id, .. } if !resource_id.is_empty() => {
                Some(resource_id)
            }
            ReachabilityError::MissingRoute {
                route_table_ids, ..
            } if route_table_ids.len() == 1 => route_table_ids.first().map(String::as_str),
            _ => None,
        }
    }

    /// Prefix the diagnostic with path context. Kind and resource ids are kept.
    pub fn with_context(self, context: impl Display) -> Self {
        match self {
            ReachabilityError::Validation(msg) => {
                ReachabilityError::Validation(format!("{context}: {msg}"))
            }
            ReachabilityError::TrafficNotAllowed {
                resource_id,
                direction,
                message,
            } => ReachabilityError::TrafficNotAllowed {
                resource_id,
                direction,
                message: format!("{context}: {message}"),
            },
            ReachabilityError::MissingRoute {
                route_table_ids,
                message,
            } => ReachabilityError::MissingRoute {
                route_table_ids,
                message: format!("{context}: {message}"),
            },
            ReachabilityError::CidrOverlap(msg) => {
                ReachabilityError::CidrOverlap(format!("{context}: {msg}"))
            }
            ReachabilityError::RouteTableAssociation(msg) => {
                ReachabilityError::RouteTableAssociation(format!("{context}: {msg}"))
            }
        }
    }

    /// The diagnostic without the kind prefix, as surfaced to operators.
    pub fn message(&self) -> &str {
        match self {
            ReachabilityError::Validation(msg)
            | ReachabilityError::CidrOverlap(msg)
            | ReachabilityError::RouteTableAssociation(msg) => msg,
            ReachabilityError::TrafficNotAllowed { message, .. }
            | ReachabilityError::MissingRoute { message, .. } => message,
        }
    }
}

impl From<ipnet::AddrParseError> for ReachabilityError {
    fn from(err: ipnet::AddrParseError) -> Self {
        ReachabilityError::Validation(err.to_string())
    }
}

impl From<std::net::AddrParseError> for ReachabilityError {
    fn from(err: std::net::AddrParseError) -> Self {
        ReachabilityError::Validation(err.to_string())
    }
}

impl From<ipnet::PrefixLenError> for ReachabilityError {
    fn from(err: ipnet::PrefixLenError) -> Self {
        ReachabilityError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for ReachabilityError {
    fn from(err: serde_json::Error) -> Self {
        ReachabilityError::Validation(err.to_string())
    }
}
