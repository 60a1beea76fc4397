//! Placeholder resolution against a layered symbol table.
//!
//! A fragment is tokenized once; each `$(name)` token is looked up through
//! the layers in [`LayerKind`] order and the first hit is spliced in.
//! Replacement text is emitted verbatim and never scanned again.

use std::collections::BTreeMap;

use snnc_model::code::{tokenize, Token};
use snnc_model::Precision;

use crate::{CompilerError, Result};

/// Role of a layer; resolution walks these in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    /// Per-instance state variables (and `_pre`/`_post` neuron variables in synapse code)
    Vars,
    /// `Isyn`, `inSyn` and the connection weight `g`
    SynapticInput,
    /// Own parameters
    Params,
    /// Own derived parameters
    DerivedParams,
    /// Postsynaptic model parameters, derived parameters and state
    Postsynaptic,
    /// Extra global parameters passed to the step function
    ExtraGlobals,
    /// `id`, `t`, `DT` and friends
    Builtins,
}

impl LayerKind {
    /// All kinds in resolution order
    pub const ORDER: [LayerKind; 7] = [
        LayerKind::Vars,
        LayerKind::SynapticInput,
        LayerKind::Params,
        LayerKind::DerivedParams,
        LayerKind::Postsynaptic,
        LayerKind::ExtraGlobals,
        LayerKind::Builtins,
    ];
}

/// Render a numeric parameter as a C literal in the given precision
pub fn literal(value: f64, precision: Precision) -> String {
    if value.is_nan() {
        return "NAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INFINITY" } else { "(-INFINITY)" }.to_string();
    }
    let body = format!("{:?}", value.abs());
    let body = if body.contains(['.', 'e']) {
        body
    } else {
        format!("{body}.0")
    };
    let suffix = match precision {
        Precision::Float => "f",
        Precision::Double => "",
    };
    if value.is_sign_negative() && value != 0.0 {
        format!("(-{body}{suffix})")
    } else {
        format!("{body}{suffix}")
    }
}

/// Identifier-to-expression mapping, organised in fixed-order layers
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    layers: BTreeMap<LayerKind, BTreeMap<String, String>>,
}

impl SymbolTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` in `layer`. Fails if the replacement itself contains a placeholder.
    pub fn bind(
        &mut self,
        layer: LayerKind,
        name: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        let replacement = replacement.into();
        if replacement.contains("$(") {
            return Err(CompilerError::PlaceholderInReplacement { name, replacement });
        }
        self.layers.entry(layer).or_default().insert(name, replacement);
        Ok(())
    }

    /// Bind a list of parameter names to literal values
    pub fn bind_values(
        &mut self,
        layer: LayerKind,
        names: impl IntoIterator<Item = impl Into<String>>,
        values: &[f64],
        precision: Precision,
    ) -> Result<()> {
        for (name, value) in names.into_iter().zip(values) {
            self.bind(layer, name, literal(*value, precision))?;
        }
        Ok(())
    }

    /// First binding of `name`, walking layers in order
    pub fn resolve(&self, name: &str) -> Option<&str> {
        LayerKind::ORDER
            .iter()
            .filter_map(|k| self.layers.get(k))
            .find_map(|layer| layer.get(name))
            .map(String::as_str)
    }

    /// Expand every placeholder; an unknown one fails naming it and `context`
    pub fn substitute(&self, code: &str, context: &str) -> Result<String> {
        let mut out = String::with_capacity(code.len());
        for token in tokenize(code) {
            match token {
                Token::Text(text) => out.push_str(text),
                Token::Placeholder(name) => match self.resolve(name) {
                    Some(rep) => out.push_str(rep),
                    None => {
                        return Err(CompilerError::UnresolvedPlaceholder {
                            name: name.to_string(),
                            context: context.to_string(),
                        })
                    }
                },
                Token::Unterminated(rest) => {
                    return Err(CompilerError::UnresolvedPlaceholder {
                        name: rest.to_string(),
                        context: context.to_string(),
                    })
                }
            }
        }
        Ok(out)
    }

    /// Expand known placeholders and leave the rest in place
    pub fn substitute_partial(&self, code: &str) -> String {
        tokenize(code)
            .into_iter()
            .map(|token| match token {
                Token::Placeholder(name) => self
                    .resolve(name)
                    .map(str::to_string)
                    .unwrap_or_else(|| token.source()),
                other => other.source(),
            })
            .collect()
    }
}
