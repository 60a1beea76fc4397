//! Model definitions: the code fragments and symbol lists shared by groups.
//!
//! A model is pure description. Groups reference a model through an `Arc`
//! and supply the concrete parameter values and initial state.

use std::fmt;

/// Named, typed state variable (or extra global parameter)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    /// Identifier used in `$(name)` placeholders
    pub name: String,
    /// C type of the generated storage
    pub ty: String,
}

impl Var {
    /// Create a variable
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// Signature of a derived-parameter function: `(raw params, dt) -> value`
pub type DerivedFn = fn(&[f64], f64) -> f64;

/// Parameter computed once from the raw parameters and the integration step
#[derive(Clone)]
pub struct DerivedParam {
    /// Identifier used in `$(name)` placeholders
    pub name: String,
    /// Closed-form expression
    pub func: DerivedFn,
}

impl DerivedParam {
    /// Create a derived parameter
    pub fn new(name: impl Into<String>, func: DerivedFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Evaluate against raw parameter values
    pub fn evaluate(&self, params: &[f64], dt: f64) -> f64 {
        (self.func)(params, dt)
    }
}

impl fmt::Debug for DerivedParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedParam").field("name", &self.name).finish()
    }
}

impl PartialEq for DerivedParam {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn vars_from(list: &[(&str, &str)]) -> Vec<Var> {
    list.iter().map(|(n, t)| Var::new(*n, *t)).collect()
}

fn names_from(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Neuron model: state update, threshold and reset fragments
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NeuronModel {
    /// Model name (used in diagnostics)
    pub name: String,
    /// Ordered state variables
    pub vars: Vec<Var>,
    /// Ordered parameter names
    pub params: Vec<String>,
    /// Ordered derived parameters
    pub derived_params: Vec<DerivedParam>,
    /// Per-step update code
    pub sim_code: String,
    /// Spike predicate; `None` disables true-spike detection
    pub threshold_condition_code: Option<String>,
    /// Code run on a true spike
    pub reset_code: Option<String>,
    /// Parameters passed as arguments of the generated neuron step
    pub extra_global_params: Vec<Var>,
}

impl NeuronModel {
    /// Empty model with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the state variables as `(name, type)` pairs
    pub fn with_vars(mut self, vars: &[(&str, &str)]) -> Self {
        self.vars = vars_from(vars);
        self
    }

    /// Set the parameter names
    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = names_from(params);
        self
    }

    /// Add a derived parameter
    pub fn with_derived(mut self, name: &str, func: DerivedFn) -> Self {
        self.derived_params.push(DerivedParam::new(name, func));
        self
    }

    /// Set the simulation code
    pub fn with_sim_code(mut self, code: impl Into<String>) -> Self {
        self.sim_code = code.into();
        self
    }

    /// Set the threshold predicate
    pub fn with_threshold(mut self, code: impl Into<String>) -> Self {
        self.threshold_condition_code = Some(code.into());
        self
    }

    /// Set the reset code
    pub fn with_reset(mut self, code: impl Into<String>) -> Self {
        self.reset_code = Some(code.into());
        self
    }

    /// Set the extra global parameters as `(name, type)` pairs
    pub fn with_extra_globals(mut self, globals: &[(&str, &str)]) -> Self {
        self.extra_global_params = vars_from(globals);
        self
    }

    /// Position of a variable by name
    pub fn var_index(&self, name: &str) -> Option<usize> {
        self.vars.iter().position(|v| v.name == name)
    }
}

/// Postsynaptic model: turns the per-connection accumulator into current
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PostsynapticModel {
    /// Model name
    pub name: String,
    /// Ordered state variables
    pub vars: Vec<Var>,
    /// Ordered parameter names
    pub params: Vec<String>,
    /// Ordered derived parameters
    pub derived_params: Vec<DerivedParam>,
    /// Expression added to `Isyn`
    pub apply_input_code: String,
    /// Code run on `$(inSyn)` after the neuron update
    pub decay_code: String,
}

impl PostsynapticModel {
    /// Empty model with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the state variables
    pub fn with_vars(mut self, vars: &[(&str, &str)]) -> Self {
        self.vars = vars_from(vars);
        self
    }

    /// Set the parameter names
    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = names_from(params);
        self
    }

    /// Add a derived parameter
    pub fn with_derived(mut self, name: &str, func: DerivedFn) -> Self {
        self.derived_params.push(DerivedParam::new(name, func));
        self
    }

    /// Set the apply-input expression
    pub fn with_apply_input(mut self, code: impl Into<String>) -> Self {
        self.apply_input_code = code.into();
        self
    }

    /// Set the decay code
    pub fn with_decay(mut self, code: impl Into<String>) -> Self {
        self.decay_code = code.into();
        self
    }
}

/// Weight update model: what one active connection adds to its target
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightUpdateModel {
    /// Model name
    pub name: String,
    /// Ordered parameter names
    pub params: Vec<String>,
    /// Ordered derived parameters
    pub derived_params: Vec<DerivedParam>,
    /// Expression added to the target accumulator
    pub input_code: String,
    /// Presynaptic event predicate; when set the synapse propagates spike events
    pub event_threshold_code: Option<String>,
    /// Supports the piecewise learning rule
    pub learning: bool,
}

impl WeightUpdateModel {
    /// Empty model with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the parameter names
    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = names_from(params);
        self
    }

    /// Add a derived parameter
    pub fn with_derived(mut self, name: &str, func: DerivedFn) -> Self {
        self.derived_params.push(DerivedParam::new(name, func));
        self
    }

    /// Set the input expression
    pub fn with_input(mut self, code: impl Into<String>) -> Self {
        self.input_code = code.into();
        self
    }

    /// Set the presynaptic event predicate
    pub fn with_event_threshold(mut self, code: impl Into<String>) -> Self {
        self.event_threshold_code = Some(code.into());
        self
    }

    /// Mark as learning-capable
    pub fn learning(mut self) -> Self {
        self.learning = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fragments() {
        let m = NeuronModel::new("toy")
            .with_vars(&[("V", "scalar"), ("U", "scalar")])
            .with_params(&["a"])
            .with_derived("twoA", |p, _| 2.0 * p[0])
            .with_sim_code("$(V) += $(a);")
            .with_threshold("$(V) > 1.0");
        assert_eq!(m.var_index("U"), Some(1));
        assert_eq!(m.var_index("W"), None);
        assert_eq!(m.derived_params[0].evaluate(&[3.0], 0.1), 6.0);
        assert!(m.reset_code.is_none());
    }
}
