//! PEtab column names and enumerated values.

// measurement / simulation tables
pub const OBSERVABLE_ID: &str = "observableId";
pub const SIMULATION_CONDITION_ID: &str = "simulationConditionId";
pub const PREEQUILIBRATION_CONDITION_ID: &str = "preequilibrationConditionId";
pub const EXPERIMENT_ID: &str = "experimentId";
pub const TIME: &str = "time";
pub const MEASUREMENT: &str = "measurement";
pub const SIMULATION: &str = "simulation";
pub const OBSERVABLE_PARAMETERS: &str = "observableParameters";
pub const NOISE_PARAMETERS: &str = "noiseParameters";
pub const DATASET_ID: &str = "datasetId";
pub const REPLICATE_ID: &str = "replicateId";

// observable table
pub const OBSERVABLE_NAME: &str = "observableName";
pub const OBSERVABLE_FORMULA: &str = "observableFormula";
pub const OBSERVABLE_TRANSFORMATION: &str = "observableTransformation";
pub const NOISE_FORMULA: &str = "noiseFormula";
pub const NOISE_DISTRIBUTION: &str = "noiseDistribution";

// condition table
pub const CONDITION_ID: &str = "conditionId";
pub const CONDITION_NAME: &str = "conditionName";
pub const TARGET_ID: &str = "targetId";
pub const TARGET_VALUE: &str = "targetValue";

// parameter table
pub const PARAMETER_ID: &str = "parameterId";
pub const PARAMETER_NAME: &str = "parameterName";
pub const PARAMETER_SCALE: &str = "parameterScale";
pub const LOWER_BOUND: &str = "lowerBound";
pub const UPPER_BOUND: &str = "upperBound";
pub const NOMINAL_VALUE: &str = "nominalValue";
pub const ESTIMATE: &str = "estimate";
pub const INITIALIZATION_PRIOR_TYPE: &str = "initializationPriorType";
pub const INITIALIZATION_PRIOR_PARAMETERS: &str = "initializationPriorParameters";
pub const OBJECTIVE_PRIOR_TYPE: &str = "objectivePriorType";
pub const OBJECTIVE_PRIOR_PARAMETERS: &str = "objectivePriorParameters";
pub const PRIOR_DISTRIBUTION: &str = "priorDistribution";
pub const PRIOR_PARAMETERS: &str = "priorParameters";

// mapping table
pub const PETAB_ENTITY_ID: &str = "petabEntityId";
pub const MODEL_ENTITY_ID: &str = "modelEntityId";

// enumerated values
pub const LIN: &str = "lin";
pub const LOG: &str = "log";
pub const LOG10: &str = "log10";
pub const NORMAL: &str = "normal";
pub const LAPLACE: &str = "laplace";
pub const LOG_NORMAL: &str = "log-normal";
pub const LOG_LAPLACE: &str = "log-laplace";

/// Valid `parameterScale` values (v1).
pub const PARAMETER_SCALES: [&str; 3] = [LIN, LOG, LOG10];

/// Valid `observableTransformation` values (v1).
pub const OBSERVABLE_TRANSFORMATIONS: [&str; 3] = [LIN, LOG, LOG10];

/// Valid `noiseDistribution` values per major version.
pub const NOISE_DISTRIBUTIONS_V1: [&str; 2] = [NORMAL, LAPLACE];
pub const NOISE_DISTRIBUTIONS_V2: [&str; 4] = [NORMAL, LAPLACE, LOG_NORMAL, LOG_LAPLACE];

/// Separator of per-row parameter overrides.
pub const PARAMETER_SEPARATOR: char = ';';

/// Placeholder for the `k`-th (1-based) noise parameter of `observable_id`.
pub fn noise_placeholder(k: usize, observable_id: &str) -> String {
    format!("noiseParameter{k}_{observable_id}")
}

/// Placeholder for the `k`-th (1-based) observable parameter of `observable_id`.
pub fn observable_placeholder(k: usize, observable_id: &str) -> String {
    format!("observableParameter{k}_{observable_id}")
}
