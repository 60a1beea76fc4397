//! Persisted connectivity layout.
//!
//! A sparse connectivity file is three flat little-endian arrays with no
//! header or framing, read in this order:
//!
//! 1. weights: `connN` values in the model precision
//! 2. `indInG`: `sourceCount + 1` x `u32`
//! 3. `ind`: `connN` x `i32`
//!
//! The same arrays may also live in three separate files. Every section
//! must be read in full; a short read is a data-corruption error.

use crate::error::{Result, StorageError};
use crate::sparse::SparseProjection;
use snnc_model::Precision;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Weight array in either precision
#[derive(Debug, Clone, PartialEq)]
pub enum WeightValues {
    /// 32-bit values
    F32(Vec<f32>),
    /// 64-bit values
    F64(Vec<f64>),
}

impl WeightValues {
    /// `count` zeros in the given precision
    pub fn zeros(precision: Precision, count: usize) -> Self {
        match precision {
            Precision::Float => WeightValues::F32(vec![0.0; count]),
            Precision::Double => WeightValues::F64(vec![0.0; count]),
        }
    }

    /// Convert from `f64` values into the given precision
    pub fn from_f64(precision: Precision, values: &[f64]) -> Self {
        match precision {
            Precision::Float => WeightValues::F32(values.iter().map(|&v| v as f32).collect()),
            Precision::Double => WeightValues::F64(values.to_vec()),
        }
    }

    /// Element count
    pub fn len(&self) -> usize {
        match self {
            WeightValues::F32(v) => v.len(),
            WeightValues::F64(v) => v.len(),
        }
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Precision of the stored values
    pub fn precision(&self) -> Precision {
        match self {
            WeightValues::F32(_) => Precision::Float,
            WeightValues::F64(_) => Precision::Double,
        }
    }

    /// Values widened to `f64`
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            WeightValues::F32(v) => v.iter().map(|&x| f64::from(x)).collect(),
            WeightValues::F64(v) => v.clone(),
        }
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            WeightValues::F32(v) => {
                for x in v {
                    writer.write_all(&x.to_le_bytes())?;
                }
            }
            WeightValues::F64(v) => {
                for x in v {
                    writer.write_all(&x.to_le_bytes())?;
                }
            }
        }
        Ok(())
    }

    fn read_from<R: Read>(reader: &mut R, precision: Precision, count: usize) -> Result<Self> {
        let bytes = read_section(reader, "weights", count * precision.byte_width())?;
        Ok(match precision {
            Precision::Float => WeightValues::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            Precision::Double => WeightValues::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
        })
    }
}

/// Sizes needed to read an unframed connectivity stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseLayout {
    /// Weight precision
    pub precision: Precision,
    /// Source population size
    pub source_count: u32,
    /// Target population size
    pub target_count: u32,
    /// Connection count
    pub conn_n: usize,
}

impl SparseLayout {
    /// Total byte length of a single-stream file with this layout
    pub fn byte_len(&self) -> usize {
        self.conn_n * (self.precision.byte_width() + 4) + (self.source_count as usize + 1) * 4
    }

    /// Derive `connN` from the byte length of a single-stream file
    pub fn infer(
        byte_len: usize,
        precision: Precision,
        source_count: u32,
        target_count: u32,
    ) -> Result<Self> {
        let rows = (source_count as usize + 1) * 4;
        let per_conn = precision.byte_width() + 4;
        if byte_len < rows || (byte_len - rows) % per_conn != 0 {
            return Err(StorageError::invalid_format(format!(
                "{byte_len} bytes is not a {} connectivity file for {source_count} sources",
                precision.c_type()
            )));
        }
        Ok(Self {
            precision,
            source_count,
            target_count,
            conn_n: (byte_len - rows) / per_conn,
        })
    }
}

/// Read exactly `len` bytes, reporting how many arrived when the source runs dry
pub fn read_section<R: Read>(reader: &mut R, section: &'static str, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut got = 0;
    while got < len {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if got < len {
        return Err(StorageError::ShortRead {
            section,
            expected: len,
            got,
        });
    }
    Ok(buf)
}

fn read_ind_in_g<R: Read>(reader: &mut R, source_count: u32) -> Result<Vec<u32>> {
    let bytes = read_section(reader, "indInG", (source_count as usize + 1) * 4)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn read_ind<R: Read>(reader: &mut R, conn_n: usize) -> Result<Vec<u32>> {
    let bytes = read_section(reader, "ind", conn_n * 4)?;
    bytes
        .chunks_exact(4)
        .enumerate()
        .map(|(i, c)| {
            let v = i32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            u32::try_from(v)
                .map_err(|_| StorageError::invalid_format(format!("ind[{i}] is negative ({v})")))
        })
        .collect()
}

fn write_ind_in_g<W: Write>(writer: &mut W, proj: &SparseProjection) -> Result<()> {
    for x in proj.ind_in_g() {
        writer.write_all(&x.to_le_bytes())?;
    }
    Ok(())
}

fn write_ind<W: Write>(writer: &mut W, proj: &SparseProjection) -> Result<()> {
    for &x in proj.ind() {
        let v = i32::try_from(x)
            .map_err(|_| StorageError::invalid_format(format!("target index {x} exceeds i32")))?;
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn check_weight_count(weights: &WeightValues, proj: &SparseProjection) -> Result<()> {
    if weights.len() != proj.conn_n() {
        return Err(StorageError::invalid_format(format!(
            "{} weights for {} connections",
            weights.len(),
            proj.conn_n()
        )));
    }
    Ok(())
}

/// Write weights, `indInG` and `ind` back to back
pub fn write_sparse<W: Write>(writer: &mut W, weights: &WeightValues, proj: &SparseProjection) -> Result<()> {
    check_weight_count(weights, proj)?;
    weights.write_to(writer)?;
    write_ind_in_g(writer, proj)?;
    write_ind(writer, proj)?;
    Ok(())
}

/// Read a single-stream connectivity file; trailing bytes are rejected
pub fn read_sparse<R: Read>(reader: &mut R, layout: SparseLayout) -> Result<(WeightValues, SparseProjection)> {
    let weights = WeightValues::read_from(reader, layout.precision, layout.conn_n)?;
    let ind_in_g = read_ind_in_g(reader, layout.source_count)?;
    let ind = read_ind(reader, layout.conn_n)?;

    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        return Err(StorageError::invalid_format("trailing bytes after ind section"));
    }

    let proj = SparseProjection::from_parts(ind_in_g, ind, layout.target_count)?;
    log::debug!(
        "read sparse projection: {} sources, {} connections",
        layout.source_count,
        proj.conn_n()
    );
    Ok((weights, proj))
}

/// Read the three arrays from separate sources
pub fn read_sparse_split<A: Read, B: Read, C: Read>(
    weights: &mut A,
    ind_in_g: &mut B,
    ind: &mut C,
    layout: SparseLayout,
) -> Result<(WeightValues, SparseProjection)> {
    let weights = WeightValues::read_from(weights, layout.precision, layout.conn_n)?;
    let ind_in_g = read_ind_in_g(ind_in_g, layout.source_count)?;
    let ind = read_ind(ind, layout.conn_n)?;
    let proj = SparseProjection::from_parts(ind_in_g, ind, layout.target_count)?;
    Ok((weights, proj))
}

/// Write the three arrays to separate sinks
pub fn write_sparse_split<A: Write, B: Write, C: Write>(
    weights_out: &mut A,
    ind_in_g_out: &mut B,
    ind_out: &mut C,
    weights: &WeightValues,
    proj: &SparseProjection,
) -> Result<()> {
    check_weight_count(weights, proj)?;
    weights.write_to(weights_out)?;
    write_ind_in_g(ind_in_g_out, proj)?;
    write_ind(ind_out, proj)?;
    Ok(())
}

/// Write a dense `num_pre x num_post` weight matrix, row-major
pub fn write_dense_weights<W: Write>(writer: &mut W, weights: &WeightValues) -> Result<()> {
    weights.write_to(writer)
}

/// Read a dense weight matrix of `count` values
pub fn read_dense_weights<R: Read>(reader: &mut R, precision: Precision, count: usize) -> Result<WeightValues> {
    WeightValues::read_from(reader, precision, count)
}

/// Save a single-stream connectivity file
pub fn save_sparse_file<P: AsRef<Path>>(path: P, weights: &WeightValues, proj: &SparseProjection) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    write_sparse(&mut writer, weights, proj)?;
    writer.flush()?;
    log::info!(
        "wrote {} connections to {}",
        proj.conn_n(),
        path.as_ref().display()
    );
    Ok(())
}

/// Load a single-stream connectivity file, inferring `connN` from its length
pub fn load_sparse_file<P: AsRef<Path>>(
    path: P,
    precision: Precision,
    source_count: u32,
    target_count: u32,
) -> Result<(WeightValues, SparseProjection)> {
    let file = File::open(path.as_ref())?;
    let len = usize::try_from(file.metadata()?.len())
        .map_err(|_| StorageError::invalid_format("file too large"))?;
    let layout = SparseLayout::infer(len, precision, source_count, target_count)?;
    read_sparse(&mut BufReader::new(file), layout)
}
