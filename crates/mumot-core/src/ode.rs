//! Numeric views of the derived ODEs: evaluation, vector-field sampling, and continuation
//! requests for an external bifurcation tool.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::DEFAULT_SYSTEM_SIZE;
use crate::error::{MumotError, Result};
use crate::expr::{Expr, Symbol};
use crate::model::Model;

/// Numerically evaluable right-hand sides.
///
/// Argument order: reactants (sorted), rates (sorted), then the system size when the model has
/// one. A rate that also names a reactant is passed once, in the reactant slot.
#[derive(Debug, Clone, PartialEq)]
pub struct OdeSystem {
    reactants: Vec<Symbol>,
    args: Vec<Symbol>,
    positions: BTreeMap<Symbol, usize>,
    equations: Vec<Expr>,
}

impl OdeSystem {
    #[must_use]
    pub fn new(model: &Model) -> Self {
        let reactants: Vec<Symbol> = model.equations().keys().cloned().collect();
        let args: Vec<Symbol> = reactants
            .iter()
            .chain(model.rates().iter().filter(|rate| !model.reactants().contains(*rate)))
            .chain(model.system_size())
            .cloned()
            .collect();
        let positions = args
            .iter()
            .enumerate()
            .map(|(i, symbol)| (symbol.clone(), i))
            .collect();
        let equations = model.equations().values().cloned().collect();
        Self {
            reactants,
            args,
            positions,
            equations,
        }
    }

    #[must_use]
    pub fn reactants(&self) -> &[Symbol] {
        &self.reactants
    }

    #[must_use]
    pub fn args(&self) -> &[Symbol] {
        &self.args
    }

    /// One derivative per reactant for `values` laid out as [`OdeSystem::args`].
    pub fn derivatives(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.args.len() {
            return Err(MumotError::config(format!(
                "expected {} argument values, got {}",
                self.args.len(),
                values.len()
            )));
        }
        let lookup = |symbol: &Symbol| self.positions.get(symbol).map(|&i| values[i]);
        self.equations
            .iter()
            .map(|equation| equation.eval_with(&lookup))
            .collect()
    }

    /// Derivative of one reactant under named bindings.
    pub fn derivative(&self, reactant: &Symbol, bindings: &BTreeMap<Symbol, f64>) -> Result<f64> {
        let index = self
            .reactants
            .iter()
            .position(|r| r == reactant)
            .ok_or_else(|| MumotError::config(format!("'{reactant}' has no equation")))?;
        self.equations[index].eval(bindings)
    }
}

impl Model {
    #[must_use]
    pub fn ode_system(&self) -> OdeSystem {
        OdeSystem::new(self)
    }
}

/// One mesh point of a sampled field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSample {
    pub point: Vec<f64>,
    pub derivative: Vec<f64>,
    /// `ln |d/dt|`; `None` where the field vanishes.
    pub log_speed: Option<f64>,
    /// Outside the simplex (`x + y > 1`), where no population can be.
    pub masked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub state_variables: Vec<Symbol>,
    pub mesh_points: usize,
    pub samples: Vec<FieldSample>,
}

/// Samples the derivative of two or three state variables on a regular mesh over the unit
/// square (or cube), with the system size fixed to one.
#[derive(Debug, Clone)]
pub struct FieldSampler {
    state_variables: Vec<Symbol>,
    equations: Vec<Expr>,
    bindings: BTreeMap<Symbol, f64>,
    mesh_points: usize,
}

impl FieldSampler {
    /// `bindings` must cover every rate and every reactant that is not a state variable.
    pub fn new(
        model: &Model,
        state_variables: &[Symbol],
        bindings: &BTreeMap<Symbol, f64>,
        mesh_points: usize,
    ) -> Result<Self> {
        model.check_state_variables(state_variables)?;
        if mesh_points < 2 {
            return Err(MumotError::config("mesh needs at least two points per axis"));
        }
        let mut bindings = bindings.clone();
        if let Some(size) = model.system_size() {
            bindings.insert(size.clone(), DEFAULT_SYSTEM_SIZE);
        }
        for symbol in model.equations().values().flat_map(Expr::symbols) {
            if !state_variables.contains(&symbol) && !bindings.contains_key(&symbol) {
                return Err(MumotError::config(format!(
                    "'{symbol}' must be bound or substituted before sampling a field"
                )));
            }
        }
        let equations = state_variables
            .iter()
            .map(|variable| {
                model.equation(variable).cloned().ok_or_else(|| {
                    MumotError::config(format!("'{variable}' has no equation"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            state_variables: state_variables.to_vec(),
            equations,
            bindings,
            mesh_points,
        })
    }

    fn coordinate(&self, index: usize) -> f64 {
        index as f64 / (self.mesh_points - 1) as f64
    }

    fn sample_point(&self, indices: &[usize]) -> Result<FieldSample> {
        let point: Vec<f64> = indices.iter().map(|&i| self.coordinate(i)).collect();
        let lookup = |symbol: &Symbol| {
            self.state_variables
                .iter()
                .position(|v| v == symbol)
                .map(|i| point[i])
                .or_else(|| self.bindings.get(symbol).copied())
        };
        let derivative = self
            .equations
            .iter()
            .map(|equation| equation.eval_with(&lookup))
            .collect::<Result<Vec<f64>>>()?;
        let magnitude = derivative.iter().map(|d| d * d).sum::<f64>().sqrt();
        let masked = indices.len() == 2 && indices[0] + indices[1] > self.mesh_points - 1;
        Ok(FieldSample {
            point,
            derivative,
            log_speed: (magnitude > 0.0).then(|| magnitude.ln()),
            masked,
        })
    }

    /// Evaluate the whole mesh; rows are computed in parallel and returned in mesh order
    /// (last state variable varying slowest).
    pub fn sample(&self) -> Result<VectorField> {
        let n = self.mesh_points;
        let dims = self.state_variables.len();
        let rows = n.pow(dims as u32 - 1);
        let chunks: Vec<Vec<FieldSample>> = (0..rows)
            .into_par_iter()
            .map(|row| {
                (0..n)
                    .map(|first| {
                        let mut indices = vec![first];
                        let mut rest = row;
                        for _ in 1..dims {
                            indices.push(rest % n);
                            rest /= n;
                        }
                        self.sample_point(&indices)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(mesh_points = n, dims, "vector field sampled");
        Ok(VectorField {
            state_variables: self.state_variables.clone(),
            mesh_points: n,
            samples: chunks.into_iter().flatten().collect(),
        })
    }
}

/// Continuation direction along the equilibrium curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Backward,
    Forward,
}

/// Everything an external continuation tool needs to trace an equilibrium curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationRequest {
    pub name: String,
    /// Curve type; equilibrium-point curves are the only kind requested.
    pub curve_type: String,
    /// Reactant → right-hand side.
    pub varspecs: BTreeMap<String, String>,
    pub pars: BTreeMap<String, f64>,
    pub ics: BTreeMap<String, f64>,
    pub free_parameter: String,
    pub state_variable: String,
    pub max_num_points: u32,
    pub max_step_size: f64,
    pub min_step_size: f64,
    pub step_size: f64,
    /// Bifurcation labels to detect: limit points and branch points.
    pub locate: Vec<String>,
    /// Keep eigenvalues so stable and unstable branches can be told apart.
    pub save_eigen: bool,
}

impl ContinuationRequest {
    /// Build a request for `free_parameter` (a rate) against `state_variable`.
    ///
    /// Initial conditions spread the system size evenly over the reactants.
    pub fn new(
        model: &Model,
        free_parameter: &Symbol,
        state_variable: &Symbol,
        values: &BTreeMap<Symbol, f64>,
    ) -> Result<Self> {
        let Some(system_size) = model.system_size() else {
            return Err(MumotError::config(
                "cannot attempt bifurcation analysis until the system size is set with a substitution",
            ));
        };
        if !model.rates().contains(free_parameter) {
            return Err(MumotError::config(format!(
                "bifurcation parameter '{free_parameter}' is not a rate of the model"
            )));
        }
        if model.equation(state_variable).is_none() {
            return Err(MumotError::config(format!(
                "'{state_variable}' is not a reactant of the model"
            )));
        }
        let values = model.rate_values(values)?;
        let size = values.get(system_size).copied().unwrap_or(DEFAULT_SYSTEM_SIZE);
        let share = size / model.reactants().len() as f64;
        Ok(Self {
            name: "EQ1".to_owned(),
            curve_type: "EP-C".to_owned(),
            varspecs: model
                .equations()
                .iter()
                .map(|(reactant, rhs)| (reactant.to_string(), rhs.to_string()))
                .collect(),
            pars: values
                .iter()
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
            ics: model
                .reactants()
                .iter()
                .map(|reactant| (reactant.to_string(), share))
                .collect(),
            free_parameter: free_parameter.to_string(),
            state_variable: state_variable.to_string(),
            max_num_points: 450,
            max_step_size: 1e-1,
            min_step_size: 1e-5,
            step_size: 2e-3,
            locate: vec!["LP".to_owned(), "BP".to_owned()],
            save_eigen: true,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BifurcationPoint {
    pub parameter: f64,
    pub state: f64,
    /// `None` when the backend did not report eigenvalues.
    pub stable: Option<bool>,
    /// Detected bifurcation label (`LP`, `BP`), if any.
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BifurcationCurve {
    pub points: Vec<BifurcationPoint>,
    /// Directions that failed, with the backend's message.
    pub failures: Vec<(Direction, String)>,
}

/// External numerical continuation tool.
pub trait ContinuationBackend {
    fn continue_equilibria(
        &self,
        request: &ContinuationRequest,
        direction: Direction,
    ) -> Result<Vec<BifurcationPoint>>;
}

/// Trace the equilibrium curve backward then forward.
///
/// A failing direction is recorded and the other still runs; only when both fail is the
/// result a numerical error.
pub fn bifurcation(
    request: &ContinuationRequest,
    backend: &dyn ContinuationBackend,
) -> Result<BifurcationCurve> {
    info!(
        free_parameter = %request.free_parameter,
        state_variable = %request.state_variable,
        "starting bifurcation analysis"
    );
    let mut curve = BifurcationCurve::default();
    for direction in [Direction::Backward, Direction::Forward] {
        match backend.continue_equilibria(request, direction) {
            Ok(points) => {
                if direction == Direction::Backward {
                    curve.points.extend(points.into_iter().rev());
                } else {
                    curve.points.extend(points);
                }
            }
            Err(err) => {
                let message = match err {
                    MumotError::Numerical(message) => message,
                    other => other.to_string(),
                };
                warn!(?direction, %message, "continuation failure");
                curve.failures.push((direction, message));
            }
        }
    }
    if curve.points.is_empty() && curve.failures.len() == 2 {
        let summary = curve
            .failures
            .iter()
            .map(|(direction, message)| format!("{direction:?}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(MumotError::numerical(format!("continuation failed ({summary})")));
    }
    Ok(curve)
}

impl BifurcationCurve {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}
