//! Error types for the habitat engine.
//!
//! Load-time problems are reported as [`HabitatError::Data`] or [`HabitatError::Config`], invalid
//! lifecycle transitions as [`HabitatError::State`] and out-of-domain values produced while
//! stepping as [`HabitatError::Numeric`]. Errors raised while stepping a site are wrapped in
//! [`HabitatError::Site`] so that the caller always learns which site failed.
use crate::id::IDLike;
use crate::site::SiteID;
use crate::species::SpeciesID;
use thiserror::Error;

/// A `Result` with [`HabitatError`] as the error type
pub type HabitatResult<T> = Result<T, HabitatError>;

/// The broad category of a [`HabitatError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorKind {
    /// Malformed or inconsistent input
    Data,
    /// Invalid species or model parameters
    Config,
    /// Invalid lifecycle transition
    State,
    /// Out-of-domain value produced during a step
    Numeric,
    /// The run was cancelled
    Cancelled,
}

/// Errors raised by the habitat engine
#[derive(Debug, Error, PartialEq)]
pub enum HabitatError {
    #[error("Invalid data for {entity}: {message}")]
    Data { entity: String, message: String },

    #[error("Invalid configuration for {entity}: {message}")]
    Config { entity: String, message: String },

    #[error("Invalid state for {entity}: {message}")]
    State { entity: String, message: String },

    #[error("Species {species} produced out-of-domain value {value} at step {step}")]
    Numeric {
        species: SpeciesID,
        step: usize,
        value: f64,
    },

    #[error("Run cancelled before step {step}")]
    Cancelled { step: usize },

    #[error("Site {site}: {source}")]
    Site {
        site: SiteID,
        #[source]
        source: Box<HabitatError>,
    },
}

impl HabitatError {
    /// Create a [`HabitatError::Data`] for the given entity
    pub fn data(entity: impl ToString, message: impl Into<String>) -> Self {
        Self::Data {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Create a [`HabitatError::Config`] for the given entity
    pub fn config(entity: impl ToString, message: impl Into<String>) -> Self {
        Self::Config {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Create a [`HabitatError::State`] for the given entity
    pub fn state(entity: impl ToString, message: impl Into<String>) -> Self {
        Self::State {
            entity: entity.to_string(),
            message: message.into(),
        }
    }

    /// Attach the ID of the site at which this error occurred
    pub fn at_site(self, site: &SiteID) -> Self {
        Self::Site {
            site: site.clone(),
            source: Box::new(self),
        }
    }

    /// The category of this error, looking through site wrappers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Data { .. } => ErrorKind::Data,
            Self::Config { .. } => ErrorKind::Config,
            Self::State { .. } => ErrorKind::State,
            Self::Numeric { .. } => ErrorKind::Numeric,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Site { source, .. } => source.kind(),
        }
    }

    /// The site at which the error occurred, if known
    pub fn site(&self) -> Option<&SiteID> {
        match self {
            Self::Site { site, .. } => Some(site),
            _ => None,
        }
    }

    /// The time step at which the error occurred, if known
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Numeric { step, .. } | Self::Cancelled { step } => Some(*step),
            Self::Site { source, .. } => source.step(),
            _ => None,
        }
    }
}

/// Describe an ID for use as the entity of an error
pub(crate) fn entity<ID: IDLike>(kind: &str, id: &ID) -> String {
    format!("{kind} {id}")
}
