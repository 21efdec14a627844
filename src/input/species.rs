//! Code for reading species and their niches from CSV files.
use super::*;
use crate::driver::{DriverRange, DriverVector};
use crate::error::entity;
use crate::id::define_id_getter;
use crate::species::{LifeHistory, Species, SpeciesID, SpeciesMap};
use crate::variable::VariableSet;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const SPECIES_FILE_NAME: &str = "species.csv";
const SPECIES_NICHES_FILE_NAME: &str = "species_niches.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct SpeciesRaw {
    id: SpeciesID,
    name: String,
    growth_rate: Option<f64>,
    mortality_rate: Option<f64>,
    initial_state: Option<f64>,
}
define_id_getter! {SpeciesRaw, SpeciesID}

/// One row of the species niches file: the four trapezoid points for one variable
#[derive(Debug, Deserialize, PartialEq)]
struct SpeciesNicheRaw {
    species_id: String,
    variable_id: String,
    pess_min: f64,
    opt_min: f64,
    opt_max: f64,
    pess_max: f64,
}

/// The niche points of a species, one entry per variable in variable order
type NichePoints = Vec<Option<[f64; 4]>>;

/// Read species information from the species and species niches files.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `variables` - The driver variables of the model
///
/// # Returns
///
/// A map of species, with the IDs as keys, in the order of the species file
pub fn read_species(model_dir: &Path, variables: &VariableSet) -> Result<SpeciesMap> {
    let species_file = model_dir.join(SPECIES_FILE_NAME);
    let descriptions = read_csv_id_file::<SpeciesRaw, SpeciesID>(&species_file)?;

    let niches_file = model_dir.join(SPECIES_NICHES_FILE_NAME);
    let niches = read_csv(&niches_file)?;
    let mut niches = read_niches_from_iter(niches, &descriptions, variables)
        .with_context(|| input_err_msg(&niches_file))?;

    descriptions
        .into_values()
        .map(|raw| {
            let points = niches.remove(&raw.id).unwrap_or_default();
            let species = create_species(raw, points, variables)?;
            Ok((species.id.clone(), Arc::new(species)))
        })
        .process_results(|iter| iter.collect())
}

fn read_niches_from_iter<I>(
    iter: I,
    descriptions: &IndexMap<SpeciesID, SpeciesRaw>,
    variables: &VariableSet,
) -> Result<HashMap<SpeciesID, NichePoints>>
where
    I: Iterator<Item = SpeciesNicheRaw>,
{
    let mut niches: HashMap<SpeciesID, NichePoints> = HashMap::new();
    for row in iter {
        let species_id = descriptions
            .get_key_value(row.species_id.as_str())
            .map(|(id, _)| id.clone())
            .ok_or_else(|| HabitatError::data(format!("species {}", row.species_id), "unknown species"))?;
        let index = variables.index_of(&row.variable_id).ok_or_else(|| {
            HabitatError::data(format!("variable {}", row.variable_id), "unknown variable")
        })?;

        let points = niches
            .entry(species_id.clone())
            .or_insert_with(|| vec![None; variables.dims()]);
        let old = points[index].replace([row.pess_min, row.opt_min, row.opt_max, row.pess_max]);
        if old.is_some() {
            Err(HabitatError::data(
                entity("species", &species_id),
                format!("niche for variable {} defined more than once", row.variable_id),
            ))?;
        }
    }

    Ok(niches)
}

/// Assemble a species from its description and niche points
fn create_species(
    raw: SpeciesRaw,
    points: NichePoints,
    variables: &VariableSet,
) -> Result<Species, HabitatError> {
    let name = entity("species", &raw.id);
    if points.is_empty() {
        return Err(HabitatError::config(name, "no niche defined"));
    }

    let mut corners = [const { Vec::new() }; 4];
    for (variable, point) in variables.iter().zip(points) {
        let Some(point) = point else {
            return Err(HabitatError::config(
                name,
                format!("no niche defined for variable {}", variable.id),
            ));
        };
        for (corner, value) in corners.iter_mut().zip(point) {
            corner.push(value);
        }
    }
    let [pess_min, opt_min, opt_max, pess_max] = corners.map(DriverVector::new);

    let life_history = match (raw.growth_rate, raw.mortality_rate) {
        (Some(growth_rate), Some(mortality_rate)) => Some(LifeHistory {
            growth_rate,
            mortality_rate,
        }),
        (None, None) => None,
        _ => {
            return Err(HabitatError::config(
                name,
                "growth_rate and mortality_rate must be given together",
            ));
        }
    };

    Ok(Species {
        id: raw.id,
        name: raw.name,
        pessimum: DriverRange::new(pess_min, pess_max),
        optimum: DriverRange::new(opt_min, opt_max),
        life_history,
        initial_state: raw.initial_state.unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixture::{assert_error_kind, variables};
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn raw(id: &str) -> SpeciesRaw {
        SpeciesRaw {
            id: id.into(),
            name: "Sedge".into(),
            growth_rate: None,
            mortality_rate: None,
            initial_state: None,
        }
    }

    fn niche(species_id: &str, variable_id: &str, points: [f64; 4]) -> SpeciesNicheRaw {
        let [pess_min, opt_min, opt_max, pess_max] = points;
        SpeciesNicheRaw {
            species_id: species_id.into(),
            variable_id: variable_id.into(),
            pess_min,
            opt_min,
            opt_max,
            pess_max,
        }
    }

    fn descriptions() -> IndexMap<SpeciesID, SpeciesRaw> {
        [raw("Carex nigra")]
            .into_iter()
            .map(|raw| (raw.id.clone(), raw))
            .collect()
    }

    #[rstest]
    fn test_create_species(variables: VariableSet) {
        let rows = [
            niche("Carex nigra", "moisture", [0.2, 0.4, 0.7, 0.9]),
            niche("Carex nigra", "pH", [4.0, 6.0, 8.0, 9.0]),
        ];
        let mut niches =
            read_niches_from_iter(rows.into_iter(), &descriptions(), &variables).unwrap();
        let points = niches.remove("Carex nigra").unwrap();
        let species = create_species(raw("Carex nigra"), points, &variables).unwrap();

        assert_eq!(species.pessimum.min, DriverVector::new(vec![4.0, 0.2]));
        assert_eq!(species.optimum.max, DriverVector::new(vec![8.0, 0.7]));
        assert_eq!(species.life_history, None);
        assert_eq!(species.initial_state, 0.0);
    }

    #[rstest]
    fn test_missing_niche_parameter(variables: VariableSet) {
        let rows = [niche("Carex nigra", "pH", [4.0, 6.0, 8.0, 9.0])];
        let mut niches =
            read_niches_from_iter(rows.into_iter(), &descriptions(), &variables).unwrap();
        let points = niches.remove("Carex nigra").unwrap();
        assert_error_kind!(
            create_species(raw("Carex nigra"), points, &variables),
            ErrorKind::Config
        );

        // No niche at all
        assert_error_kind!(
            create_species(raw("Carex nigra"), Vec::new(), &variables),
            ErrorKind::Config
        );
    }

    #[rstest]
    fn test_half_life_history(variables: VariableSet) {
        let mut raw = raw("Carex nigra");
        raw.growth_rate = Some(0.5);
        let points = vec![Some([4.0, 6.0, 8.0, 9.0]), Some([0.2, 0.4, 0.7, 0.9])];
        assert_error_kind!(create_species(raw, points, &variables), ErrorKind::Config);
    }

    #[rstest]
    #[case(niche("Quercus robur", "pH", [4.0, 6.0, 8.0, 9.0]))]
    #[case(niche("Carex nigra", "BS", [4.0, 6.0, 8.0, 9.0]))]
    fn test_niche_unknown_id(variables: VariableSet, #[case] row: SpeciesNicheRaw) {
        let err = read_niches_from_iter(std::iter::once(row), &descriptions(), &variables)
            .unwrap_err();
        assert_eq!(habitat_error(&err).unwrap().kind(), ErrorKind::Data);
    }

    #[rstest]
    fn test_niche_duplicate(variables: VariableSet) {
        let rows = [
            niche("Carex nigra", "pH", [4.0, 6.0, 8.0, 9.0]),
            niche("Carex nigra", "pH", [4.0, 6.0, 8.0, 9.0]),
        ];
        let err =
            read_niches_from_iter(rows.into_iter(), &descriptions(), &variables).unwrap_err();
        assert_eq!(habitat_error(&err).unwrap().kind(), ErrorKind::Data);
    }

    #[rstest]
    fn test_read_species(variables: VariableSet) {
        let dir = tempdir().unwrap();
        {
            let mut file = File::create(dir.path().join(SPECIES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "id,name,growth_rate,mortality_rate,initial_state
CN,Carex nigra,0.5,0.1,0.2
CP,Caltha palustris,,,"
            )
            .unwrap();
            let mut file = File::create(dir.path().join(SPECIES_NICHES_FILE_NAME)).unwrap();
            writeln!(
                file,
                "species_id,variable_id,pess_min,opt_min,opt_max,pess_max
CN,pH,4,6,8,9
CN,moisture,0.2,0.4,0.7,0.9
CP,pH,5,6.5,9,10
CP,moisture,0.3,0.35,0.75,0.8"
            )
            .unwrap();
        }

        let species = read_species(dir.path(), &variables).unwrap();
        assert_eq!(
            species.keys().map(ToString::to_string).collect_vec(),
            ["CN", "CP"]
        );
        let carex = &species["CN"];
        assert_eq!(carex.name, "Carex nigra");
        assert_eq!(
            carex.life_history,
            Some(LifeHistory {
                growth_rate: 0.5,
                mortality_rate: 0.1
            })
        );
        assert_eq!(carex.initial_state, 0.2);
        assert_eq!(species["CP"].life_history, None);
    }
}
