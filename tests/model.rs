//! Integration tests which load and run models through the library API.
use bern::error::ErrorKind;
use bern::input::{habitat_error, load_model};
use bern::site_vector::{CancelFlag, SiteVector};
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Get the path to the demo model.
fn get_model_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join("simple")
}

/// Write the given files to a model directory
fn write_model(dir: &Path, files: &[(&str, &str)]) {
    for (file_name, contents) in files {
        fs::write(dir.join(file_name), contents).unwrap();
    }
}

/// A model with a single variable (flow) and a species which only tolerates a flow of exactly 10
const POINT_MODEL: [(&str, &str); 5] = [
    ("variables.csv", "id,description,min,max\nflow,River flow,0,100\n"),
    ("species.csv", "id,name\npoint,Point species\n"),
    (
        "species_niches.csv",
        "species_id,variable_id,pess_min,opt_min,opt_max,pess_max\npoint,flow,10,10,10,10\n",
    ),
    ("sites.csv", "id,name,association_id\nA,,\nB,,\n"),
    (
        "drivers.csv",
        "site_id,step,variable_id,value
A,0,flow,10
A,1,flow,10
A,2,flow,10
B,0,flow,5
B,1,flow,10
B,2,flow,5
",
    ),
];

fn run(site_vector: &mut SiteVector) {
    site_vector.run_configured(&CancelFlag::new()).unwrap();
}

/// Load the demo model
#[test]
fn test_load_demo_model() {
    let site_vector = load_model(get_model_dir()).unwrap();
    assert_eq!(
        site_vector.site_ids().map(ToString::to_string).collect_vec(),
        ["wet", "mesic", "open"]
    );
    assert_eq!(site_vector.time_step_count(), 4);
    assert_eq!(site_vector.species_ids().count(), 3);
    assert_eq!(site_vector.catalog().associations().len(), 2);

    // Bound sites track the steady species of their association, others every species
    let tracked = |id| {
        site_vector
            .get(id)
            .unwrap()
            .community()
            .species_ids()
            .map(ToString::to_string)
            .collect_vec()
    };
    assert_eq!(tracked("wet"), ["CNIG", "CPAL"]);
    assert_eq!(tracked("mesic"), ["FRUB"]);
    assert_eq!(tracked("open"), ["CNIG", "CPAL", "FRUB"]);
}

/// Run the demo model and check the results are well formed
#[test]
fn test_run_demo_model() {
    let mut site_vector = load_model(get_model_dir()).unwrap();
    run(&mut site_vector);

    let results = site_vector.results().unwrap();
    assert_eq!(results.len(), 3);
    for trajectory in results.values() {
        assert_eq!(trajectory.len(), 4);
        for record in *trajectory {
            assert!(record.state.iter().all(|s| (0.0..=1.0).contains(s)));
            assert!(record.suitability.iter().all(|s| (0.0..=1.0).contains(s)));
            assert!((0.0..=1.0).contains(&record.possibility));
        }
    }

    // Both species are within their optimum at the wet site in the first year
    let first = &results["wet"][0];
    assert_eq!(first.suitability, [1.0, 1.0]);
}

/// Runs with the same inputs give identical results, whether or not sites are stepped in parallel
#[test]
fn test_run_deterministic() {
    let mut first = load_model(get_model_dir()).unwrap();
    run(&mut first);
    let mut second = load_model(get_model_dir()).unwrap();
    run(&mut second);
    assert_eq!(first.results().unwrap(), second.results().unwrap());

    let dir = tempdir().unwrap();
    for entry in fs::read_dir(get_model_dir()).unwrap() {
        let entry = entry.unwrap();
        fs::copy(entry.path(), dir.path().join(entry.file_name())).unwrap();
    }
    fs::write(dir.path().join("model.toml"), "start_time = 2020\nparallel = false\n").unwrap();
    let mut sequential = load_model(dir.path()).unwrap();
    run(&mut sequential);
    assert_eq!(first.results().unwrap(), sequential.results().unwrap());
}

/// Site A is always suitable and site B only at the second step
#[test]
fn test_two_site_scenario() {
    let dir = tempdir().unwrap();
    write_model(dir.path(), &POINT_MODEL);

    let mut site_vector = load_model(dir.path()).unwrap();
    run(&mut site_vector);

    let state = |id| {
        site_vector
            .get(id)
            .unwrap()
            .community()
            .species_trajectory("point")
            .unwrap()
    };
    assert_eq!(state("A"), [1.0, 1.0, 1.0]);
    assert_eq!(state("B"), [0.0, 1.0, 0.0]);
}

/// A species without a niche for every variable is a configuration error
#[test]
fn test_missing_niche_parameter() {
    let dir = tempdir().unwrap();
    write_model(dir.path(), &POINT_MODEL);
    write_model(
        dir.path(),
        &[
            (
                "variables.csv",
                "id,description,min,max\nflow,River flow,0,100\ntemp,Water temperature,0,30\n",
            ),
            (
                "drivers.csv",
                "site_id,step,variable_id,value\nA,0,flow,10\nA,0,temp,12\nB,0,flow,5\nB,0,temp,14\n",
            ),
        ],
    );

    let err = load_model(dir.path()).unwrap_err();
    assert_eq!(habitat_error(&err).unwrap().kind(), ErrorKind::Config);
}

/// Driver series of different lengths are rejected
#[test]
fn test_mismatched_series() {
    let dir = tempdir().unwrap();
    write_model(dir.path(), &POINT_MODEL);
    write_model(
        dir.path(),
        &[(
            "drivers.csv",
            "site_id,step,variable_id,value\nA,0,flow,10\nA,1,flow,10\nB,0,flow,5\n",
        )],
    );

    let err = load_model(dir.path()).unwrap_err();
    assert_eq!(habitat_error(&err).unwrap().kind(), ErrorKind::Data);
}

/// Invalid model parameters are a configuration error
#[test]
fn test_invalid_model_parameters() {
    let dir = tempdir().unwrap();
    write_model(dir.path(), &POINT_MODEL);
    write_model(dir.path(), &[("model.toml", "dt = -1\n")]);

    let err = load_model(dir.path()).unwrap_err();
    assert_eq!(habitat_error(&err).unwrap().kind(), ErrorKind::Config);
}
