use super::*;

fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
    Table::from_rows(
        columns.iter().copied(),
        rows.iter().map(|r| r.iter().map(|v| Cell::parse(v)).collect()).collect(),
    )
    .unwrap()
}

fn v1_tables() -> ProblemTables {
    ProblemTables {
        conditions: vec![table(&[CONDITION_ID], &[&["c0"]])],
        observables: vec![table(
            &[OBSERVABLE_ID, OBSERVABLE_FORMULA, NOISE_FORMULA],
            &[&["obs_a", "A", "0.5"]],
        )],
        measurements: vec![table(
            &[OBSERVABLE_ID, SIMULATION_CONDITION_ID, TIME, MEASUREMENT],
            &[&["obs_a", "c0", "0", "0.7"], &["obs_a", "c0", "10", "0.1"]],
        )],
        experiments: Vec::new(),
        parameters: table(
            &[PARAMETER_ID, PARAMETER_SCALE, LOWER_BOUND, UPPER_BOUND, NOMINAL_VALUE, ESTIMATE],
            &[
                &["a0", "lin", "0", "10", "1", "1"],
                &["b0", "lin", "0", "10", "0", "1"],
                &["k1", "lin", "0", "10", "0.8", "1"],
                &["k2", "lin", "0", "10", "0.6", "1"],
            ],
        ),
        mapping: None,
    }
}

fn v2_tables() -> ProblemTables {
    ProblemTables {
        conditions: vec![table(
            &[CONDITION_ID, TARGET_ID, TARGET_VALUE],
            &[&["c0", "k1", "0.8"]],
        )],
        observables: vec![table(
            &[OBSERVABLE_ID, OBSERVABLE_FORMULA, NOISE_FORMULA, NOISE_DISTRIBUTION],
            &[&["obs_a", "A", "noiseParameter1_obs_a", "normal"]],
        )],
        measurements: vec![table(
            &[OBSERVABLE_ID, EXPERIMENT_ID, TIME, MEASUREMENT, NOISE_PARAMETERS],
            &[&["obs_a", "e0", "0", "0.7", "0.5"]],
        )],
        experiments: vec![table(&[EXPERIMENT_ID, TIME, CONDITION_ID], &[&["e0", "0", "c0"]])],
        parameters: table(
            &[PARAMETER_ID, LOWER_BOUND, UPPER_BOUND, NOMINAL_VALUE, ESTIMATE],
            &[&["a0", "0", "10", "1", "true"], &["k2", "", "", "0.6", "false"]],
        ),
        mapping: None,
    }
}

fn errors(issues: &[LintIssue]) -> Vec<String> {
    issues.iter().filter(|i| i.is_error()).map(|i| i.message.clone()).collect()
}

#[test]
fn valid_v1_problem_is_clean() {
    let issues = lint_tables(FormatVersion::V1, &v1_tables());
    assert!(errors(&issues).is_empty(), "{issues:?}");
}

#[test]
fn valid_v2_problem_is_clean() {
    let issues = lint_tables(FormatVersion::V2, &v2_tables());
    assert!(errors(&issues).is_empty(), "{issues:?}");
}

#[test]
fn unknown_observable_reference() {
    let mut t = v1_tables();
    t.measurements[0] = table(
        &[OBSERVABLE_ID, SIMULATION_CONDITION_ID, TIME, MEASUREMENT],
        &[&["obs_x", "c0", "0", "0.7"]],
    );
    let errs = errors(&lint_tables(FormatVersion::V1, &t));
    assert!(errs.iter().any(|e| e.contains("unknown observableId 'obs_x'")), "{errs:?}");
}

#[test]
fn missing_required_column() {
    let mut t = v1_tables();
    t.observables[0] = table(&[OBSERVABLE_ID, OBSERVABLE_FORMULA], &[&["obs_a", "A"]]);
    let errs = errors(&lint_tables(FormatVersion::V1, &t));
    assert!(errs.iter().any(|e| e.contains("noiseFormula")), "{errs:?}");
}

#[test]
fn duplicate_parameter_id() {
    let mut t = v1_tables();
    t.parameters.push_row(["k1", "lin", "0", "10", "0.8", "1"].map(Cell::parse).to_vec()).unwrap();
    let errs = errors(&lint_tables(FormatVersion::V1, &t));
    assert!(errs.iter().any(|e| e.contains("duplicate parameterId 'k1'")), "{errs:?}");
}

#[test]
fn noise_override_count_must_match_placeholders() {
    let mut t = v2_tables();
    t.measurements[0] = table(
        &[OBSERVABLE_ID, EXPERIMENT_ID, TIME, MEASUREMENT, NOISE_PARAMETERS],
        &[&["obs_a", "e0", "0", "0.7", "0.5;0.2"]],
    );
    let errs = errors(&lint_tables(FormatVersion::V2, &t));
    assert!(errs.iter().any(|e| e.contains("2 noise override(s)")), "{errs:?}");
}

#[test]
fn override_may_name_a_parameter() {
    let mut t = v2_tables();
    t.measurements[0] = table(
        &[OBSERVABLE_ID, EXPERIMENT_ID, TIME, MEASUREMENT, NOISE_PARAMETERS],
        &[&["obs_a", "e0", "0", "0.7", "a0"]],
    );
    assert!(errors(&lint_tables(FormatVersion::V2, &t)).is_empty());

    t.measurements[0] = table(
        &[OBSERVABLE_ID, EXPERIMENT_ID, TIME, MEASUREMENT, NOISE_PARAMETERS],
        &[&["obs_a", "e0", "0", "0.7", "nope"]],
    );
    assert_eq!(errors(&lint_tables(FormatVersion::V2, &t)).len(), 1);
}

#[test]
fn v1_rejects_experiments_and_mapping() {
    let mut t = v1_tables();
    t.experiments = v2_tables().experiments;
    t.mapping = Some(table(&[PETAB_ENTITY_ID, MODEL_ENTITY_ID], &[&["x", "k1"]]));
    let errs = errors(&lint_tables(FormatVersion::V1, &t));
    assert!(errs.iter().any(|e| e.contains("experiment")));
    assert!(errs.iter().any(|e| e.contains("mapping")));
}

#[test]
fn v2_rejects_v1_noise_columns() {
    let mut t = v2_tables();
    t.observables[0] = table(
        &[OBSERVABLE_ID, OBSERVABLE_FORMULA, NOISE_FORMULA, NOISE_DISTRIBUTION],
        &[&["obs_a", "A", "noiseParameter1_obs_a", "lognormal"]],
    );
    let errs = errors(&lint_tables(FormatVersion::V2, &t));
    assert!(errs.iter().any(|e| e.contains("invalid noiseDistribution")), "{errs:?}");
}

#[test]
fn mapping_alias_counts_as_parameter() {
    let mut t = v2_tables();
    t.mapping = Some(table(&[PETAB_ENTITY_ID, MODEL_ENTITY_ID], &[&["sigma", "a0"]]));
    t.measurements[0] = table(
        &[OBSERVABLE_ID, EXPERIMENT_ID, TIME, MEASUREMENT, NOISE_PARAMETERS],
        &[&["obs_a", "e0", "0", "0.7", "sigma"]],
    );
    assert!(errors(&lint_tables(FormatVersion::V2, &t)).is_empty());
}

#[test]
fn estimate_flag_per_version() {
    assert_eq!(parse_estimate(FormatVersion::V1, &Cell::parse("1")), Some(true));
    assert_eq!(parse_estimate(FormatVersion::V1, &Cell::parse("true")), None);
    assert_eq!(parse_estimate(FormatVersion::V2, &Cell::parse("False")), Some(false));
    assert_eq!(parse_estimate(FormatVersion::V2, &Cell::parse("0")), None);
}

#[test]
fn fixed_parameter_needs_nominal_value() {
    let mut t = v2_tables();
    t.parameters = table(
        &[PARAMETER_ID, LOWER_BOUND, UPPER_BOUND, NOMINAL_VALUE, ESTIMATE],
        &[&["k2", "", "", "", "false"]],
    );
    let errs = errors(&lint_tables(FormatVersion::V2, &t));
    assert!(errs.iter().any(|e| e.contains("without nominalValue")), "{errs:?}");
}

#[test]
fn prior_parameter_counts() {
    assert_eq!(prior_parameter_count(FormatVersion::V2, "normal"), Some(2));
    assert_eq!(prior_parameter_count(FormatVersion::V2, "exponential"), Some(1));
    assert_eq!(prior_parameter_count(FormatVersion::V2, "parameterScaleNormal"), None);
    assert_eq!(prior_parameter_count(FormatVersion::V1, "parameterScaleNormal"), Some(2));

    let mut t = v2_tables();
    t.parameters = table(
        &[PARAMETER_ID, LOWER_BOUND, UPPER_BOUND, NOMINAL_VALUE, ESTIMATE, PRIOR_DISTRIBUTION, PRIOR_PARAMETERS],
        &[&["a0", "0", "10", "1", "true", "rayleigh", "1;2"]],
    );
    let errs = errors(&lint_tables(FormatVersion::V2, &t));
    assert!(errs.iter().any(|e| e.contains("takes 1 parameter(s), got 2")), "{errs:?}");
}

#[test]
fn invalid_formula_is_reported() {
    let mut t = v1_tables();
    t.observables[0] = table(
        &[OBSERVABLE_ID, OBSERVABLE_FORMULA, NOISE_FORMULA],
        &[&["obs_a", "A +", "1"]],
    );
    let errs = errors(&lint_tables(FormatVersion::V1, &t));
    assert!(errs.iter().any(|e| e.contains("observableFormula")), "{errs:?}");
}

#[test]
fn placeholder_indices() {
    assert_eq!(placeholder_index("noiseParameter2_obs_a", "noiseParameter", "obs_a"), Some(2));
    assert_eq!(placeholder_index("noiseParameter2_obs_b", "noiseParameter", "obs_a"), None);
    assert_eq!(placeholder_index("noiseParameter0_obs_a", "noiseParameter", "obs_a"), None);
}

#[test]
fn builtin_linter_reports_unloadable_manifest() {
    let issues = BuiltinLinter.lint(Path::new("/nonexistent/_0001.yaml")).unwrap();
    assert_eq!(issues.len(), 1);
    assert!(issues[0].is_error());
}

#[test]
fn command_linter_rejects_empty_argv() {
    assert!(CommandLinter::from_argv(&[]).is_err());
}
