//! Sites are locations with a time series of environmental conditions.
use crate::association::AssociationID;
use crate::community::{Community, StepRecord};
use crate::driver::DriverVector;
use crate::error::{HabitatError, HabitatResult};
use crate::id::{define_id_getter, define_id_type};
use crate::species::Species;
use std::sync::Arc;

define_id_type! {SiteID}

/// A measured or modelled plot
#[derive(Debug, Clone)]
pub struct Site {
    /// Unique identifier
    pub id: SiteID,
    /// Display name (defaults to the ID)
    pub name: String,
    /// If set, only the species of this association are tracked at the site
    pub association: Option<AssociationID>,
    drivers: Vec<DriverVector>,
    community: Community,
}
define_id_getter! {Site, SiteID}

impl Site {
    /// Create a new site with an uninitialized community
    pub fn new(
        id: SiteID,
        name: Option<String>,
        association: Option<AssociationID>,
        drivers: Vec<DriverVector>,
    ) -> Self {
        let name = name.unwrap_or_else(|| id.to_string());
        Self {
            id,
            name,
            association,
            drivers,
            community: Community::new(),
        }
    }

    /// The driver series, one vector per time step
    pub fn drivers(&self) -> &[DriverVector] {
        &self.drivers
    }

    /// The community at this site
    pub fn community(&self) -> &Community {
        &self.community
    }

    /// The trajectory of the community at this site
    pub fn trajectory(&self) -> &[StepRecord] {
        self.community.trajectory()
    }

    /// (Re)initialize the community, attaching the site ID to any error
    pub(crate) fn initialize(&mut self, species: Vec<Arc<Species>>, gamma: f64) -> HabitatResult<()> {
        self.community
            .initialize(species, gamma)
            .map_err(|err| err.at_site(&self.id))
    }

    /// Step the community with the drivers of time step `t`
    pub(crate) fn step(&mut self, t: usize, dt: f64) -> HabitatResult<()> {
        let Some(drivers) = self.drivers.get(t) else {
            return Err(HabitatError::data(
                format!("site {}", self.id),
                format!("no drivers for step {t}"),
            ));
        };

        self.community
            .step(drivers, dt)
            .map(|_| ())
            .map_err(|err| err.at_site(&self.id))
    }

    /// Finish the run for this site
    pub(crate) fn complete(&mut self) -> HabitatResult<()> {
        self.community
            .complete()
            .map_err(|err| err.at_site(&self.id))
    }
}
