use nlte_core::common::config::load_solver_config;
use nlte_core::common::constants::POPULATION_SUM_TOLERANCE;
use nlte_core::molecule::load_lamda;
use nlte_core::solver::BlendSet;
use nlte_core::{Grid, GridPoint, PhysicalModel, PointStatus, PopulationSolver, SingularPolicy};
use std::fs;
use tempfile::TempDir;

const CO_LAMDA: &str = "!MOLECULE
CO
!MOLECULAR WEIGHT
28.0
!NUMBER OF ENERGY LEVELS
3
!LEVEL + ENERGIES(cm^-1) + WEIGHT + J
    1     0.000000000  1.0     0
    2     3.845033413  3.0     1
    3    11.534919938  5.0     2
!NUMBER OF RADIATIVE TRANSITIONS
2
!TRANS + UP + LOW + EINSTEINA(s^-1) + FREQ(GHz) + E_u(K)
    1     2     1  7.203e-08          115.2712018     5.53
    2     3     2  6.910e-07          230.5380000    16.60
!NUMBER OF COLL PARTNERS
1
!COLLISIONS BETWEEN
2 CO-pH2
!NUMBER OF COLL TRANS
3
!NUMBER OF COLL TEMPS
4
!COLL TEMPS
    2.0    5.0   10.0   20.0
!TRANS + UP + LOW + COLLRATES(cm^3 s^-1)
    1     2     1  2.000E-11  2.500E-11  3.000E-11  3.200E-11
    2     3     1  1.000E-11  1.100E-11  1.200E-11  1.300E-11
    3     3     2  4.000E-11  4.100E-11  4.200E-11  4.300E-11
";

struct TwoSpeciesCloud;

impl PhysicalModel for TwoSpeciesCloud {
    fn densities(&self, _position: [f64; 3]) -> Vec<f64> {
        vec![1.0e10]
    }

    fn gas_temperature(&self, _position: [f64; 3]) -> f64 {
        15.0
    }

    fn abundances(&self, _position: [f64; 3]) -> Vec<f64> {
        vec![1.0e-18, 1.0e-18]
    }

    fn doppler(&self, _position: [f64; 3]) -> f64 {
        150.0
    }

    fn velocity(&self, position: [f64; 3]) -> [f64; 3] {
        [position[0] * 1.0e-12, 0.0, 0.0]
    }
}

#[test]
fn blended_species_loaded_from_disk_converge_with_unit_sums() {
    let temp = TempDir::new().expect("tempdir should be created");
    let co_path = temp.path().join("co.dat");
    let shifted_path = temp.path().join("co-shifted.dat");
    let config_path = temp.path().join("solver.json");
    fs::write(&co_path, CO_LAMDA).expect("write CO data");
    fs::write(
        &shifted_path,
        CO_LAMDA
            .replacen("\nCO\n", "\nCO-shifted\n", 1)
            .replace("115.2712018", "115.2722018"),
    )
    .expect("write shifted data");
    fs::write(
        &config_path,
        r#"{
  "blend": true,
  "maxSweeps": 12,
  "goalRun": 3,
  "threads": 2,
  "singularPolicy": "abort"
}"#,
    )
    .expect("write config");

    let config = load_solver_config(&config_path).expect("config should load");
    assert!(config.blend);
    assert_eq!(config.singular_policy, SingularPolicy::Abort);
    let species = vec![
        load_lamda(&co_path).expect("CO should parse"),
        load_lamda(&shifted_path).expect("shifted CO should parse"),
    ];

    let blends = BlendSet::detect(&species, config.blend_threshold);
    assert_eq!(blends.len(), 4);
    let partner = &blends.partners_of(0, 0)[0];
    assert_eq!((partner.species, partner.line), (1, 0));
    assert!(partner.delta_v > 0.0);

    let points = (0..4)
        .map(|index| {
            let position = [index as f64 * 1.0e11, 0.0, 0.0];
            if index == 0 || index == 3 {
                GridPoint::sink(index, position)
            } else {
                GridPoint::new(index, position)
            }
        })
        .collect();
    let mut grid = Grid::new(points).expect("grid");
    for index in 1..4 {
        grid.connect(index - 1, index).expect("chain link");
    }
    grid.evaluate_physics(&TwoSpeciesCloud);

    let solver = PopulationSolver::new(config, species).expect("solver");
    let report = solver.solve(&mut grid).expect("run should succeed");

    assert_eq!(report.converged_count(), 2, "{}", report.summary_line());
    for index in 1..3 {
        let point = grid.point(index);
        assert_eq!(point.status, PointStatus::Converged);
        for state in &point.populations {
            assert!((state.population_sum() - 1.0).abs() <= POPULATION_SUM_TOLERANCE);
            assert!(state.pops.iter().all(|pop| pop.is_finite() && *pop > 0.0));
        }
    }
}

#[test]
fn unreadable_molecule_file_is_an_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let error = load_lamda(temp.path().join("missing.dat")).expect_err("file does not exist");
    assert_eq!(
        error.category(),
        nlte_core::NlteErrorCategory::IoSystemError
    );
}
