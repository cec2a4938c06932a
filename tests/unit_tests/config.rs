use sparse_heat::assembly::form::LevelCoupling;
use sparse_heat::config::{LinearSolverKind, SolverConfig};

#[test]
fn missing_fields_take_defaults() {
    let config: SolverConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, SolverConfig::default());
    assert_eq!(config.end_time, 1.0);
    assert_eq!(config.deg, 1);
    assert_eq!(config.level_coupling, LevelCoupling::Adjacent);
    assert_eq!(config.linear_solver, LinearSolverKind::Cg);
    config.validate().unwrap();
}

#[test]
fn parse_partial_config() {
    let json = r#"{
        "end_time": 0.5,
        "num_levels": 3,
        "level_coupling": "full",
        "linear_solver": "cholesky"
    }"#;
    let config: SolverConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.end_time, 0.5);
    assert_eq!(config.num_levels, 3);
    assert_eq!(config.level_coupling, LevelCoupling::Full);
    assert_eq!(config.linear_solver, LinearSolverKind::Cholesky);
    assert_eq!(config.min_temporal_level, SolverConfig::default().min_temporal_level);

    let roundtrip: SolverConfig = serde_json::from_str(&serde_json::to_string(&config).unwrap()).unwrap();
    assert_eq!(roundtrip, config);
}

#[test]
fn unknown_solver_is_rejected() {
    let result = serde_json::from_str::<SolverConfig>(r#"{ "linear_solver": "gmres" }"#);
    assert!(result.is_err());
}

#[test]
fn validate_rejects_unsupported_parameters() {
    let invalid = [
        SolverConfig {
            deg: 2,
            ..SolverConfig::default()
        },
        SolverConfig {
            num_levels: 0,
            ..SolverConfig::default()
        },
        SolverConfig {
            end_time: 0.0,
            ..SolverConfig::default()
        },
        SolverConfig {
            end_time: f64::NAN,
            ..SolverConfig::default()
        },
        SolverConfig {
            cg_tolerance: -1.0,
            ..SolverConfig::default()
        },
    ];
    for config in invalid {
        assert!(config.validate().is_err(), "{:?} should be invalid", config);
    }
}
