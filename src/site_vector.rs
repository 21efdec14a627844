//! The top-level container of a simulation: every site, the species catalog and the configuration.
//!
//! Sites are independent of each other, so within a time step they can be stepped in parallel.
//! Time steps are always processed in order.
use crate::catalog::SpeciesCatalog;
use crate::community::{Lifecycle, StepRecord};
use crate::error::{HabitatError, HabitatResult, entity};
use crate::parameters::ModelParameters;
use crate::site::{Site, SiteID};
use crate::species::{Species, SpeciesID};
use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A flag which can be used to stop a run between two time steps
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a new flag which is not set
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stops before the next time step
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The trajectories of every site, in site order
pub type Results<'a> = IndexMap<SiteID, &'a [StepRecord]>;

/// An ordered collection of sites sharing a species catalog and configuration
#[derive(Debug)]
pub struct SiteVector {
    sites: Vec<Site>,
    catalog: Arc<SpeciesCatalog>,
    parameters: ModelParameters,
    series_length: usize,
}

impl SiteVector {
    /// Create a new [`SiteVector`] and initialize the community of every site.
    ///
    /// Sites bound to an association track the species of that association; all other sites
    /// track every species in the catalog.
    ///
    /// # Arguments
    ///
    /// * `sites` - The sites, in simulation order
    /// * `catalog` - The species catalog
    /// * `parameters` - Simulation configuration
    pub fn new(
        sites: Vec<Site>,
        catalog: Arc<SpeciesCatalog>,
        parameters: ModelParameters,
    ) -> HabitatResult<Self> {
        parameters
            .validate()
            .map_err(|err| HabitatError::config("model parameters", err.to_string()))?;
        for species in catalog.species().values() {
            species.validate(catalog.variables(), parameters.dt)?;
        }

        let series_length = check_sites(&sites, &catalog)?;
        if let Some(count) = parameters.time_step_count
            && count > series_length
        {
            return Err(HabitatError::data(
                "model parameters",
                format!(
                    "time_step_count ({count}) exceeds the length of the driver series ({series_length})"
                ),
            ));
        }

        let mut site_vector = Self {
            sites,
            catalog,
            parameters,
            series_length,
        };
        site_vector.reset()?;

        Ok(site_vector)
    }

    /// Re-initialize every community so that the simulation can be run again
    pub fn reset(&mut self) -> HabitatResult<()> {
        let gamma = self.parameters.gamma;
        for site in &mut self.sites {
            let species = tracked_species(site, &self.catalog)?;
            site.initialize(species, gamma)?;
        }

        Ok(())
    }

    /// Run the simulation for the configured number of time steps
    pub fn run_configured(&mut self, cancel: &CancelFlag) -> HabitatResult<()> {
        self.run(self.time_step_count(), cancel)
    }

    /// Run the simulation.
    ///
    /// At every time step, every site's community is stepped with that site's drivers. The
    /// cancel flag is checked before each step; a step which has started always completes for
    /// every site. On error the run is aborted and the error of the first failing site (in site
    /// order) is returned.
    ///
    /// # Arguments
    ///
    /// * `time_step_count` - Number of time steps to simulate
    /// * `cancel` - Flag to stop the run between two steps
    pub fn run(&mut self, time_step_count: usize, cancel: &CancelFlag) -> HabitatResult<()> {
        if time_step_count > self.series_length {
            return Err(HabitatError::data(
                "sites",
                format!(
                    "cannot run {time_step_count} steps with driver series of length {}",
                    self.series_length
                ),
            ));
        }

        if let Some(site) = self
            .sites
            .iter()
            .find(|site| site.community().lifecycle() != Lifecycle::Initialized)
        {
            return Err(HabitatError::state(
                entity("site", &site.id),
                "simulation has already been run; reset before running again",
            ));
        }

        info!(
            "Running {} sites for {time_step_count} time steps",
            self.sites.len()
        );
        for t in 0..time_step_count {
            if cancel.is_cancelled() {
                info!("Run cancelled before step {t}");
                return Err(HabitatError::Cancelled { step: t });
            }

            self.step_all(t)?;
            debug!("Completed step {t} (time {})", self.parameters.time_at(t));
        }

        for site in &mut self.sites {
            site.complete()?;
        }

        Ok(())
    }

    /// Step every site once
    fn step_all(&mut self, t: usize) -> HabitatResult<()> {
        let dt = self.parameters.dt;
        let outcomes: Vec<HabitatResult<()>> = if self.parameters.parallel {
            self.sites.par_iter_mut().map(|site| site.step(t, dt)).collect()
        } else {
            self.sites.iter_mut().map(|site| site.step(t, dt)).collect()
        };

        outcomes.into_iter().collect()
    }

    /// The trajectory of every site.
    ///
    /// Only available once a run has completed.
    pub fn results(&self) -> HabitatResult<Results<'_>> {
        if let Some(site) = self
            .sites
            .iter()
            .find(|site| !site.community().is_completed())
        {
            return Err(HabitatError::state(
                entity("site", &site.id),
                "results requested before the simulation completed",
            ));
        }

        Ok(self
            .sites
            .iter()
            .map(|site| (site.id.clone(), site.trajectory()))
            .collect())
    }

    /// The number of time steps to run when not specified explicitly
    pub fn time_step_count(&self) -> usize {
        self.parameters.time_step_count.unwrap_or(self.series_length)
    }

    /// The length of every site's driver series
    pub fn series_length(&self) -> usize {
        self.series_length
    }

    /// The sites, in simulation order
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Look up a site
    pub fn get(&self, id: &str) -> Option<&Site> {
        self.sites.iter().find(|site| &*site.id.0 == id)
    }

    /// The IDs of the sites, in simulation order
    pub fn site_ids(&self) -> impl Iterator<Item = &SiteID> {
        self.sites.iter().map(|site| &site.id)
    }

    /// The IDs of the species in the catalog
    pub fn species_ids(&self) -> impl Iterator<Item = &SpeciesID> {
        self.catalog.species_ids()
    }

    /// The species catalog
    pub fn catalog(&self) -> &Arc<SpeciesCatalog> {
        &self.catalog
    }

    /// The simulation configuration
    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }
}

/// Check sites against each other and the catalog, returning the common series length
fn check_sites(sites: &[Site], catalog: &SpeciesCatalog) -> HabitatResult<usize> {
    let Some(first) = sites.first() else {
        return Err(HabitatError::data("sites", "no sites defined"));
    };
    let series_length = first.drivers().len();
    let dims = catalog.variables().dims();

    let mut ids = IndexSet::new();
    for site in sites {
        let name = entity("site", &site.id);
        if !ids.insert(site.id.clone()) {
            return Err(HabitatError::data(name, "duplicate site"));
        }

        if site.drivers().len() != series_length {
            return Err(HabitatError::data(
                name,
                format!(
                    "driver series has {} steps, but site {} has {series_length}",
                    site.drivers().len(),
                    first.id
                ),
            ));
        }

        for (t, drivers) in site.drivers().iter().enumerate() {
            if drivers.len() != dims {
                return Err(HabitatError::data(
                    name,
                    format!("expected {dims} driver values at step {t}, got {}", drivers.len()),
                ));
            }
            if !drivers.is_finite() {
                return Err(HabitatError::data(
                    name,
                    format!("non-finite driver value at step {t}"),
                ));
            }
        }

        if let Some(association) = &site.association {
            let association = catalog
                .get_association(&association.0)
                .map_err(|err| err.at_site(&site.id))?;
            if association.is_empty() {
                return Err(HabitatError::config(
                    name,
                    format!("association {} has no species", association.id),
                ));
            }
        }
    }

    Ok(series_length)
}

/// The species tracked at a site
fn tracked_species(site: &Site, catalog: &SpeciesCatalog) -> HabitatResult<Vec<Arc<Species>>> {
    match &site.association {
        Some(id) => Ok(catalog
            .get_association(&id.0)
            .map_err(|err| err.at_site(&site.id))?
            .species
            .clone()),
        None => Ok(catalog.species().values().cloned().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DriverVector;
    use crate::error::ErrorKind;
    use crate::fixture::{assert_error_kind, flow_catalog, scenario_sites};
    use crate::association::AssociationMap;
    use crate::species::{LifeHistory, SpeciesMap};
    use rstest::rstest;

    fn site(id: &str, values: &[f64]) -> Site {
        Site::new(
            id.into(),
            None,
            None,
            values.iter().map(|&v| DriverVector::new(vec![v])).collect(),
        )
    }

    fn run(sites: Vec<Site>, catalog: Arc<SpeciesCatalog>, parallel: bool) -> SiteVector {
        let parameters = ModelParameters {
            parallel,
            ..ModelParameters::default()
        };
        let mut site_vector = SiteVector::new(sites, catalog, parameters).unwrap();
        site_vector.run_configured(&CancelFlag::new()).unwrap();
        site_vector
    }

    fn point_trajectory(site_vector: &SiteVector, site_id: &str) -> Vec<f64> {
        site_vector
            .get(site_id)
            .unwrap()
            .community()
            .species_trajectory("point")
            .unwrap()
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_two_site_scenario(
        flow_catalog: Arc<SpeciesCatalog>,
        scenario_sites: Vec<Site>,
        #[case] parallel: bool,
    ) {
        let site_vector = run(scenario_sites, flow_catalog, parallel);
        assert_eq!(point_trajectory(&site_vector, "A"), [1.0, 1.0, 1.0]);
        assert_eq!(point_trajectory(&site_vector, "B"), [0.0, 1.0, 0.0]);

        let results = site_vector.results().unwrap();
        assert_eq!(
            results.keys().map(ToString::to_string).collect::<Vec<_>>(),
            ["A", "B"]
        );
        assert!(results.values().all(|trajectory| trajectory.len() == 3));
    }

    #[rstest]
    fn test_deterministic(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let first = run(scenario_sites.clone(), flow_catalog.clone(), true);
        let second = run(scenario_sites, flow_catalog, true);
        assert_eq!(first.results().unwrap(), second.results().unwrap());
    }

    #[rstest]
    fn test_site_order_independent(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let forward = run(scenario_sites.clone(), flow_catalog.clone(), true);
        let reversed = run(scenario_sites.into_iter().rev().collect(), flow_catalog, true);
        assert_eq!(reversed.site_ids().next().unwrap().to_string(), "B");
        for id in ["A", "B"] {
            assert_eq!(
                forward.get(id).unwrap().trajectory(),
                reversed.get(id).unwrap().trajectory()
            );
        }
    }

    #[rstest]
    fn test_results_before_run(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let site_vector =
            SiteVector::new(scenario_sites, flow_catalog, ModelParameters::default()).unwrap();
        assert_error_kind!(site_vector.results(), ErrorKind::State);
    }

    #[rstest]
    fn test_run_twice_needs_reset(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let mut site_vector = run(scenario_sites, flow_catalog, false);
        assert_error_kind!(site_vector.run(3, &CancelFlag::new()), ErrorKind::State);

        site_vector.reset().unwrap();
        site_vector.run(2, &CancelFlag::new()).unwrap();
        assert_eq!(point_trajectory(&site_vector, "B"), [0.0, 1.0]);
    }

    #[rstest]
    fn test_run_too_many_steps(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let mut site_vector =
            SiteVector::new(scenario_sites, flow_catalog, ModelParameters::default()).unwrap();
        assert_error_kind!(site_vector.run(4, &CancelFlag::new()), ErrorKind::Data);
    }

    #[rstest]
    fn test_run_zero_steps(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let mut site_vector =
            SiteVector::new(scenario_sites, flow_catalog, ModelParameters::default()).unwrap();
        site_vector.run(0, &CancelFlag::new()).unwrap();
        assert!(site_vector.results().unwrap().values().all(|t| t.is_empty()));
    }

    #[rstest]
    fn test_cancelled(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let mut site_vector =
            SiteVector::new(scenario_sites, flow_catalog, ModelParameters::default()).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = site_vector.run(3, &cancel).unwrap_err();
        assert_eq!(err, HabitatError::Cancelled { step: 0 });
        assert_error_kind!(site_vector.results(), ErrorKind::State);
    }

    #[rstest]
    fn test_mismatched_series_length(flow_catalog: Arc<SpeciesCatalog>) {
        let sites = vec![site("A", &[10.0, 10.0, 10.0]), site("B", &[10.0, 10.0])];
        assert_error_kind!(
            SiteVector::new(sites, flow_catalog, ModelParameters::default()),
            ErrorKind::Data
        );
    }

    #[rstest]
    fn test_duplicate_site(flow_catalog: Arc<SpeciesCatalog>) {
        let sites = vec![site("A", &[10.0]), site("A", &[10.0])];
        assert_error_kind!(
            SiteVector::new(sites, flow_catalog, ModelParameters::default()),
            ErrorKind::Data
        );
    }

    #[rstest]
    fn test_wrong_driver_dims(flow_catalog: Arc<SpeciesCatalog>) {
        let sites = vec![Site::new(
            "A".into(),
            None,
            None,
            vec![DriverVector::new(vec![10.0, 1.0])],
        )];
        assert_error_kind!(
            SiteVector::new(sites, flow_catalog, ModelParameters::default()),
            ErrorKind::Data
        );
    }

    #[rstest]
    fn test_non_finite_driver(flow_catalog: Arc<SpeciesCatalog>) {
        let sites = vec![site("A", &[10.0, f64::NAN])];
        assert_error_kind!(
            SiteVector::new(sites, flow_catalog, ModelParameters::default()),
            ErrorKind::Data
        );
    }

    #[rstest]
    fn test_unknown_association(flow_catalog: Arc<SpeciesCatalog>) {
        let mut site = site("A", &[10.0]);
        site.association = Some("9999".into());
        let err = SiteVector::new(vec![site], flow_catalog, ModelParameters::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert_eq!(err.site(), Some(&SiteID::new("A")));
    }

    #[rstest]
    fn test_numeric_error_reports_site_and_step(
        flow_catalog: Arc<SpeciesCatalog>,
        scenario_sites: Vec<Site>,
    ) {
        // Rates which violate the stability bound for this dt, bypassing catalog validation
        let mut species = flow_catalog.get_species("point").unwrap().as_ref().clone();
        species.life_history = Some(LifeHistory {
            growth_rate: 2.0,
            mortality_rate: 0.0,
        });
        let species: Arc<Species> = species.into();

        let mut site_vector =
            SiteVector::new(scenario_sites, flow_catalog, ModelParameters::default()).unwrap();
        for site in &mut site_vector.sites {
            site.initialize(vec![species.clone()], 0.2).unwrap();
        }

        // Site A is suitable from the first step, site B only from the second
        let err = site_vector.run(3, &CancelFlag::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Numeric);
        assert_eq!(err.site(), Some(&SiteID::new("A")));
        assert_eq!(err.step(), Some(0));
    }

    #[rstest]
    #[case(1.0, true)]
    #[case(0.5, true)]
    #[case(3.0, false)]
    fn test_life_history_checked_against_time_step(
        flow_catalog: Arc<SpeciesCatalog>,
        scenario_sites: Vec<Site>,
        #[case] dt: f64,
        #[case] valid: bool,
    ) {
        // Stable for a time step of 1, which the catalog is checked against
        let mut species = flow_catalog.get_species("point").unwrap().as_ref().clone();
        species.life_history = Some(LifeHistory {
            growth_rate: 0.9,
            mortality_rate: 0.1,
        });
        let catalog = SpeciesCatalog::new(
            flow_catalog.variables().clone(),
            SpeciesMap::from([(species.id.clone(), Arc::new(species))]),
            AssociationMap::new(),
            1.0,
        )
        .unwrap();

        let parameters = ModelParameters {
            dt,
            ..ModelParameters::default()
        };
        let result = SiteVector::new(scenario_sites, catalog.into(), parameters);
        if valid {
            assert!(result.is_ok());
        } else {
            assert_error_kind!(result, ErrorKind::Config);
        }
    }

    #[rstest]
    fn test_time_step_count_too_long(flow_catalog: Arc<SpeciesCatalog>, scenario_sites: Vec<Site>) {
        let parameters = ModelParameters {
            time_step_count: Some(10),
            ..ModelParameters::default()
        };
        assert_error_kind!(
            SiteVector::new(scenario_sites, flow_catalog, parameters),
            ErrorKind::Data
        );
    }
}
