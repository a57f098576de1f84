use anyhow::{bail, ensure, Context, Result};
use cozy_chess::{Board, Color, Piece};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 8] = b"PIENNUE1";

const KINDS: [Piece; 6] = [Piece::Pawn, Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen, Piece::King];

/// Supported input encodings, chosen by `input_dim`.
pub const COUNT_FEATURES: usize = 12;
pub const SQUARE_FEATURES: usize = 12 * 64;
pub const MAX_HIDDEN: usize = 4096;

const HEADER_BYTES: u64 = 8 + 4 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetMeta {
    pub version: u32,
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
}

/// One hidden layer (ReLU) value network. Output is centipawns from White's side.
#[derive(Debug, Clone)]
pub struct ValueNet {
    pub meta: NetMeta,
    w1: Vec<f32>, // hidden_dim x input_dim
    b1: Vec<f32>, // hidden_dim
    w2: Vec<f32>, // hidden_dim (single output)
    b2: f32,
}

impl ValueNet {
    pub fn from_parts(
        input_dim: usize,
        hidden_dim: usize,
        w1: Vec<f32>,
        b1: Vec<f32>,
        w2: Vec<f32>,
        b2: f32,
    ) -> Result<Self> {
        ensure!(input_dim == COUNT_FEATURES || input_dim == SQUARE_FEATURES, "unsupported input_dim {input_dim}");
        ensure!(w1.len() == hidden_dim * input_dim, "w1 has {} weights, expected {}", w1.len(), hidden_dim * input_dim);
        ensure!(b1.len() == hidden_dim && w2.len() == hidden_dim, "hidden layer size mismatch");
        Ok(Self { meta: NetMeta { version: 1, input_dim, hidden_dim, output_dim: 1 }, w1, b1, w2, b2 })
    }

    // Format:
    // magic: 8 bytes b"PIENNUE1"
    // u32 version, u32 input_dim, u32 hidden_dim, u32 output_dim (LE)
    // f32 w1[hidden_dim * input_dim], b1[hidden_dim], w2[output_dim * hidden_dim], b2[output_dim]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(&path).with_context(|| format!("open value net: {}", path.as_ref().display()))?;
        let file_len = f.metadata().context("stat value net")?.len();
        let mut r = BufReader::new(f);
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic).context("read magic")?;
        if &magic != MAGIC { bail!("bad value net magic"); }
        let mut read_u32 = |what: &str| -> Result<u32> {
            let mut b = [0u8; 4];
            r.read_exact(&mut b).with_context(|| format!("read {what}"))?;
            Ok(u32::from_le_bytes(b))
        };
        let version = read_u32("version")?;
        let input_dim = read_u32("input_dim")? as usize;
        let hidden_dim = read_u32("hidden_dim")? as usize;
        let output_dim = read_u32("output_dim")? as usize;
        ensure!(output_dim == 1, "value net must have a single output, got {output_dim}");
        ensure!(input_dim == COUNT_FEATURES || input_dim == SQUARE_FEATURES, "unsupported input_dim {input_dim}");
        ensure!(hidden_dim > 0 && hidden_dim <= MAX_HIDDEN, "hidden_dim {hidden_dim} outside 1..={MAX_HIDDEN}");
        // sizes are bounded above, so this cannot overflow
        let payload = ((hidden_dim * input_dim + 2 * hidden_dim + 1) * 4) as u64;
        ensure!(
            file_len == HEADER_BYTES + payload,
            "value net file is {file_len} bytes, header describes {}",
            HEADER_BYTES + payload
        );
        let mut read_f32s = |n: usize, what: &str| -> Result<Vec<f32>> {
            let mut buf = vec![0u8; n * 4];
            r.read_exact(&mut buf).with_context(|| format!("read {n} f32s of {what}"))?;
            Ok(buf.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
        };
        let w1 = read_f32s(hidden_dim * input_dim, "w1")?;
        let b1 = read_f32s(hidden_dim, "b1")?;
        let w2 = read_f32s(hidden_dim, "w2")?;
        let b2 = read_f32s(1, "b2")?[0];
        let mut net = Self::from_parts(input_dim, hidden_dim, w1, b1, w2, b2)?;
        net.meta.version = version;
        Ok(net)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let f = File::create(&path).with_context(|| format!("create value net: {}", path.as_ref().display()))?;
        let mut w = BufWriter::new(f);
        w.write_all(MAGIC)?;
        for v in [self.meta.version, self.meta.input_dim as u32, self.meta.hidden_dim as u32, 1] {
            w.write_all(&v.to_le_bytes())?;
        }
        for v in self.w1.iter().chain(&self.b1).chain(&self.w2).chain(std::iter::once(&self.b2)) {
            w.write_all(&v.to_le_bytes())?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn evaluate(&self, board: &Board) -> i32 {
        let x = self.features(board);
        let n = self.meta.input_dim;
        let mut out = self.b2;
        for j in 0..self.meta.hidden_dim {
            let row = &self.w1[j * n..(j + 1) * n];
            let sum: f32 = self.b1[j] + row.iter().zip(&x).map(|(w, v)| w * v).sum::<f32>();
            if sum > 0.0 { out += self.w2[j] * sum; }
        }
        if out.is_finite() { out.round() as i32 } else { 0 }
    }

    fn features(&self, board: &Board) -> Vec<f32> {
        let mut out = vec![0f32; self.meta.input_dim];
        for (i, &p) in KINDS.iter().enumerate() {
            for (side, &color) in [Color::White, Color::Black].iter().enumerate() {
                let bb = board.pieces(p) & board.colors(color);
                if self.meta.input_dim == COUNT_FEATURES {
                    out[side * 6 + i] = bb.into_iter().count() as f32;
                } else {
                    for sq in bb { out[(side * 6 + i) * 64 + sq as usize] = 1.0; }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // hidden unit 0 sees white material, unit 1 black material
    fn material_net() -> ValueNet {
        let values = [100.0, 300.0, 300.0, 500.0, 900.0, 0.0];
        let mut w1 = vec![0f32; 2 * COUNT_FEATURES];
        for i in 0..6 {
            w1[i] = values[i];
            w1[COUNT_FEATURES + 6 + i] = values[i];
        }
        ValueNet::from_parts(COUNT_FEATURES, 2, w1, vec![0.0, 0.0], vec![1.0, -1.0], 0.0).unwrap()
    }

    #[test]
    fn counts_material_from_white_side() {
        let net = material_net();
        assert_eq!(net.evaluate(&Board::default()), 0);
        let b = Board::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1", false).unwrap();
        assert_eq!(net.evaluate(&b), 900);
    }

    #[test]
    fn save_then_load_preserves_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.bin");
        let net = material_net();
        net.save(&path).unwrap();
        let loaded = ValueNet::load(&path).unwrap();
        assert_eq!(loaded.meta, net.meta);
        let b = Board::from_fen("4k3/8/8/8/8/8/8/3RK3 w - - 0 1", false).unwrap();
        assert_eq!(loaded.evaluate(&b), 500);
    }

    #[test]
    fn rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        let mut bytes = MAGIC.to_vec();
        for v in [1u32, 12, 4, 1] { bytes.extend_from_slice(&v.to_le_bytes()); }
        bytes.extend_from_slice(&[0u8; 10]);
        std::fs::write(&path, bytes).unwrap();
        let err = ValueNet::load(&path).unwrap_err();
        assert!(err.to_string().contains("header describes"), "{err:#}");
    }

    fn header_only(dir: &Path, dims: [u32; 4]) -> std::path::PathBuf {
        let path = dir.join("header.bin");
        let mut bytes = MAGIC.to_vec();
        for v in dims { bytes.extend_from_slice(&v.to_le_bytes()); }
        bytes.extend_from_slice(&[0u8; 64]);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn oversized_header_is_refused_before_reading_weights() {
        let dir = tempfile::tempdir().unwrap();
        let huge = header_only(dir.path(), [1, 768, u32::MAX, 1]);
        let err = ValueNet::load(&huge).unwrap_err();
        assert!(err.to_string().contains("hidden_dim"), "{err:#}");

        let odd_input = header_only(dir.path(), [1, u32::MAX, 4, 1]);
        let err = ValueNet::load(&odd_input).unwrap_err();
        assert!(err.to_string().contains("input_dim"), "{err:#}");
    }
}
