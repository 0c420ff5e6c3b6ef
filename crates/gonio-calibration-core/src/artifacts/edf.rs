//! Minimal ESRF Data Format writer.
//!
//! Single-image files: an ASCII `{ key = value ; }` header padded to a
//! multiple of 512 bytes, followed by little-endian `f64` pixels in row-major
//! order. `Dim_1` is the fast (column) axis.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::ArtifactError;
use crate::Image;

const BLOCK: usize = 512;

/// Header block for an image of `rows x cols` doubles.
pub fn edf_header(rows: usize, cols: usize) -> String {
    let size = rows * cols * std::mem::size_of::<f64>();
    let mut header = format!(
        "{{\n\
         HeaderID = EH:000001:000000:000000 ;\n\
         Image = 1 ;\n\
         ByteOrder = LowByteFirst ;\n\
         DataType = DoubleValue ;\n\
         Dim_1 = {cols} ;\n\
         Dim_2 = {rows} ;\n\
         Size = {size} ;\n"
    );
    let closing = "}\n";
    let used = header.len() + closing.len();
    let padding = (BLOCK - used % BLOCK) % BLOCK;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push_str(closing);
    header
}

/// Encode an image as EDF bytes.
pub fn encode_edf(image: &Image) -> Vec<u8> {
    let (rows, cols) = image.shape();
    let header = edf_header(rows, cols);
    let mut out = Vec::with_capacity(header.len() + rows * cols * 8);
    out.extend_from_slice(header.as_bytes());
    for r in 0..rows {
        for value in image.row(r).iter() {
            // Writing into a Vec cannot fail.
            let _ = out.write_f64::<LittleEndian>(*value);
        }
    }
    out
}

/// Write `image` to `path` as EDF, replacing any existing file.
pub fn write_edf(path: impl AsRef<Path>, image: &Image) -> Result<(), ArtifactError> {
    let path = path.as_ref();
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&encode_edf(image)).map_err(io_err)?;
    writer.flush().map_err(io_err)?;
    log::debug!("wrote {}x{} frame to {}", image.nrows(), image.ncols(), path.display());
    Ok(())
}
