//! Regime fragments for component-style neuron descriptions.
//!
//! A component is a small state machine: each regime integrates its time
//! derivatives with forward Euler and leaves through triggered transitions.
//! The fragments emitted here are plain C meant to be spliced into a neuron
//! model's sim code; `_regimeID` holds the active regime.

use std::collections::BTreeMap;

use snnc_model::code::is_identifier;

use crate::code_stream::CodeStream;
use crate::{CompilerError, Result};

/// Named sub-expressions, expanded in place wherever their name appears
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aliases {
    map: BTreeMap<String, String>,
}

impl Aliases {
    /// No aliases
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name`; earlier aliases used in `expr` are expanded immediately
    pub fn define(&mut self, name: impl Into<String>, expr: &str) -> Result<()> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(CompilerError::Message(format!(
                "alias name '{name}' is not an identifier"
            )));
        }
        let expanded = self.expand(expr);
        self.map.insert(name, expanded);
        Ok(())
    }

    /// Number of aliases
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when no alias is defined
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Replace every whole-identifier occurrence of an alias with `(expr)`
    pub fn expand(&self, code: &str) -> String {
        let mut out = String::with_capacity(code.len());
        let mut rest = code;
        while let Some(c) = rest.chars().next() {
            if c == '_' || c.is_ascii_alphanumeric() {
                // a word starting with a digit is a numeric literal, never an alias
                let numeric = c.is_ascii_digit();
                let end = rest
                    .find(|ch: char| !(ch == '_' || ch.is_ascii_alphanumeric() || (numeric && ch == '.')))
                    .unwrap_or(rest.len());
                let word = &rest[..end];
                match self.map.get(word) {
                    Some(expr) if !numeric => {
                        out.push('(');
                        out.push_str(expr);
                        out.push(')');
                    }
                    _ => out.push_str(word),
                }
                rest = &rest[end..];
            } else {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
        out
    }
}

/// `variable = expr` applied when a transition fires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateAssignment {
    /// Assigned variable
    pub variable: String,
    /// Right-hand side
    pub expr: String,
}

/// Triggered transition out of a regime
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    /// Trigger predicate; a transition without one cannot be emitted
    pub trigger: Option<String>,
    /// Assignments run when the trigger holds
    pub assignments: Vec<StateAssignment>,
    /// Regime entered afterwards
    pub target: u32,
}

/// `d(variable)/dt = expr`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeDerivative {
    /// Integrated variable
    pub variable: String,
    /// Rate of change
    pub expr: String,
}

/// One regime of a component
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Regime {
    /// Regime name, used in diagnostics
    pub name: String,
    /// Derivatives integrated while the regime is active
    pub derivatives: Vec<TimeDerivative>,
    /// Outgoing transitions, tested in order
    pub transitions: Vec<Transition>,
}

/// Writes regime fragments with a fixed alias set
#[derive(Debug, Clone, Copy)]
pub struct RegimeEmitter<'a> {
    aliases: &'a Aliases,
}

impl<'a> RegimeEmitter<'a> {
    /// Emitter expanding `aliases`
    pub fn new(aliases: &'a Aliases) -> Self {
        Self { aliases }
    }

    /// `if(trigger) { assignments; _regimeID = target; }`
    ///
    /// The regime id is only written when the transition leaves `current`.
    pub fn emit_condition(
        &self,
        transition: &Transition,
        current: u32,
        context: &str,
        os: &mut CodeStream,
    ) -> Result<()> {
        let trigger = transition
            .trigger
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CompilerError::MissingTrigger {
                context: context.to_string(),
                target: transition.target,
            })?;
        os.open_with(format!("if({})", self.aliases.expand(trigger)), 70);
        for a in &transition.assignments {
            os.line(format!("{} = {};", a.variable, self.aliases.expand(&a.expr)));
        }
        if transition.target != current {
            os.line(format!("_regimeID = {};", transition.target));
        }
        os.close(70);
        Ok(())
    }

    /// `var += DT * (expr);`
    pub fn emit_time_derivative(&self, derivative: &TimeDerivative, os: &mut CodeStream) {
        os.line(format!(
            "{} += DT * ({});",
            derivative.variable,
            self.aliases.expand(&derivative.expr)
        ));
    }

    /// Dispatch on `_regimeID`: derivatives first, then transitions, per regime
    pub fn emit_regimes(&self, regimes: &[Regime], os: &mut CodeStream) -> Result<()> {
        for (id, regime) in regimes.iter().enumerate() {
            let id = u32::try_from(id)
                .map_err(|_| CompilerError::Message("too many regimes".to_string()))?;
            let head = if id == 0 { "if" } else { "else if" };
            os.open_with(format!("{head}(_regimeID == {id})"), 71);
            for d in &regime.derivatives {
                self.emit_time_derivative(d, os);
            }
            let context = format!("regime '{}'", regime.name);
            for t in &regime.transitions {
                self.emit_condition(t, id, &context, os)?;
            }
            os.close(71);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> Aliases {
        let mut a = Aliases::new();
        a.define("I_total", "I_syn + I_ext").unwrap();
        a.define("drive", "I_total / C").unwrap();
        a
    }

    #[test]
    fn expands_whole_identifiers_only() {
        let a = aliases();
        assert_eq!(a.expand("V + drive"), "V + ((I_syn + I_ext) / C)");
        assert_eq!(a.expand("drive_x + xdrive"), "drive_x + xdrive");
        assert_eq!(a.expand("1e3 * drive2"), "1e3 * drive2");
    }

    #[test]
    fn condition_writes_assignments_and_target() {
        let a = aliases();
        let t = Transition {
            trigger: Some("V > Vt".into()),
            assignments: vec![StateAssignment {
                variable: "V".into(),
                expr: "Vr".into(),
            }],
            target: 1,
        };
        let mut os = CodeStream::new();
        RegimeEmitter::new(&a).emit_condition(&t, 0, "regime 'integrating'", &mut os).unwrap();
        let text = os.finish("test").unwrap();
        assert_eq!(text, "if(V > Vt) {\n    V = Vr;\n    _regimeID = 1;\n}\n");
    }

    #[test]
    fn self_transition_keeps_regime() {
        let a = Aliases::new();
        let t = Transition {
            trigger: Some("t > 5".into()),
            assignments: vec![],
            target: 2,
        };
        let mut os = CodeStream::new();
        RegimeEmitter::new(&a).emit_condition(&t, 2, "r", &mut os).unwrap();
        assert!(!os.as_str().contains("_regimeID"));
    }

    #[test]
    fn missing_trigger_is_an_error() {
        let a = Aliases::new();
        let t = Transition {
            trigger: None,
            assignments: vec![],
            target: 1,
        };
        let mut os = CodeStream::new();
        let err = RegimeEmitter::new(&a)
            .emit_condition(&t, 0, "regime 'refractory'", &mut os)
            .unwrap_err();
        assert!(matches!(err, CompilerError::MissingTrigger { target: 1, .. }));
    }

    #[test]
    fn derivative_is_forward_euler() {
        let a = aliases();
        let mut os = CodeStream::new();
        RegimeEmitter::new(&a).emit_time_derivative(
            &TimeDerivative {
                variable: "V".into(),
                expr: "drive - V / tau".into(),
            },
            &mut os,
        );
        assert_eq!(os.as_str(), "V += DT * (((I_syn + I_ext) / C) - V / tau);\n");
    }

    #[test]
    fn regimes_dispatch_on_id() {
        let a = Aliases::new();
        let regimes = vec![
            Regime {
                name: "integrating".into(),
                derivatives: vec![TimeDerivative {
                    variable: "V".into(),
                    expr: "-V".into(),
                }],
                transitions: vec![Transition {
                    trigger: Some("V > 1".into()),
                    assignments: vec![],
                    target: 1,
                }],
            },
            Regime {
                name: "refractory".into(),
                derivatives: vec![],
                transitions: vec![Transition {
                    trigger: Some("t > tr".into()),
                    assignments: vec![],
                    target: 0,
                }],
            },
        ];
        let mut os = CodeStream::new();
        RegimeEmitter::new(&a).emit_regimes(&regimes, &mut os).unwrap();
        let text = os.finish("test").unwrap();
        assert!(text.contains("if(_regimeID == 0) {"));
        assert!(text.contains("else if(_regimeID == 1) {"));
        assert!(text.contains("_regimeID = 0;"));
    }
}
