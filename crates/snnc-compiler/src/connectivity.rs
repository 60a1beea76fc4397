//! Connection iteration and weight resolution shared by propagation and learning.
//!
//! Inside a presynaptic loop (`ipre` defined) the connection loop defines
//! `ipost` and, where a stored weight is addressed, `syn`. Inside a
//! postsynaptic loop (`ipost` defined) the reverse loop defines `ipre` and
//! `syn`.

use snnc_model::{Connectivity, SynapseGroup, WeightStorage};

use crate::backend::EmitContext;
use crate::code_stream::CodeStream;
use crate::naming::field;
use crate::substitution::SymbolTable;
use crate::{CompilerError, Result};

/// `B(x,i)`: test bit `i` of word `x`, most significant bit first
pub const BIT_MACRO: &str = "#define B(x,i) ((x) & (0x80000000 >> (i)))";

/// Words needed for one bit per (pre, post) pair
pub fn bitmask_words(n_pre: u32, n_post: u32) -> u64 {
    (u64::from(n_pre) * u64::from(n_post)).div_ceil(32)
}

/// True when a stored per-connection array is indexed by `syn`
pub fn addresses_synapse(sg: &SynapseGroup) -> bool {
    matches!(sg.weights(), WeightStorage::Individual) || sg.is_learning()
}

/// Weight expression for one active connection
pub fn weight_expr(cx: &EmitContext<'_>, sg: &SynapseGroup, table: &SymbolTable) -> Result<String> {
    Ok(match sg.weights() {
        WeightStorage::Global(value) => cx.literal(*value),
        WeightStorage::Individual => format!("{}[syn]", field(sg.name(), "g")),
        WeightStorage::Computed(expr) => format!(
            "({})",
            table.substitute(expr, &format!("computed weight of '{}'", sg.name()))?
        ),
    })
}

/// Emit the loop over the active connections of `ipre` and run `body` inside it
pub fn for_each_connection(
    os: &mut CodeStream,
    sg: &SynapseGroup,
    n_post: u32,
    id: u32,
    body: impl FnOnce(&mut CodeStream) -> Result<()>,
) -> Result<()> {
    let name = sg.name();
    match sg.connectivity() {
        Connectivity::Dense => {
            os.open_with(format!("for (unsigned int ipost = 0; ipost < {n_post}; ipost++)"), id);
            if addresses_synapse(sg) {
                os.line(format!("unsigned int syn = ipre * {n_post} + ipost;"));
            }
            body(os)?;
            os.close(id);
        }
        Connectivity::Sparse => {
            let ind_in_g = field(name, "indInG");
            os.open_with(
                format!("for (unsigned int syn = {ind_in_g}[ipre]; syn < {ind_in_g}[ipre + 1]; syn++)"),
                id,
            );
            os.line(format!("unsigned int ipost = {}[syn];", field(name, "ind")));
            body(os)?;
            os.close(id);
        }
        Connectivity::Bitmask => {
            os.open_with(format!("for (unsigned int ipost = 0; ipost < {n_post}; ipost++)"), id);
            os.line(format!("unsigned int gid = ipre * {n_post} + ipost;"));
            os.open_with(format!("if (B({}[gid >> 5], gid & 31))", field(name, "gp")), id + 1);
            body(os)?;
            os.close(id + 1);
            os.close(id);
        }
    }
    Ok(())
}

/// Emit the loop over every source connected to `ipost` and run `body` inside it.
///
/// Sparse groups walk the reverse index built by `initializeSparse`.
pub fn for_each_incoming(
    os: &mut CodeStream,
    sg: &SynapseGroup,
    n_pre: u32,
    n_post: u32,
    id: u32,
    body: impl FnOnce(&mut CodeStream) -> Result<()>,
) -> Result<()> {
    let name = sg.name();
    match sg.connectivity() {
        Connectivity::Dense => {
            os.open_with(format!("for (unsigned int ipre = 0; ipre < {n_pre}; ipre++)"), id);
            os.line(format!("unsigned int syn = ipre * {n_post} + ipost;"));
            body(os)?;
            os.close(id);
        }
        Connectivity::Sparse => {
            let rev = field(name, "revIndInG");
            os.open_with(
                format!("for (unsigned int r = {rev}[ipost]; r < {rev}[ipost + 1]; r++)"),
                id,
            );
            os.line(format!("unsigned int ipre = {}[r];", field(name, "revInd")));
            os.line(format!("unsigned int syn = {}[r];", field(name, "remap")));
            body(os)?;
            os.close(id);
        }
        Connectivity::Bitmask => {
            return Err(CompilerError::Message(format!(
                "synapse group '{name}': bitmask connectivity has no stored weights to learn"
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_count_rounds_up() {
        assert_eq!(bitmask_words(1, 1), 1);
        assert_eq!(bitmask_words(4, 8), 1);
        assert_eq!(bitmask_words(3, 11), 2);
        assert_eq!(bitmask_words(100, 1000), 3125);
    }
}
