use std::fmt;

const MB: f64 = 1024.0 * 1024.0;

/// Size statistics and per-stage counts for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub input_size: u64,
    pub output_size: u64,
    pub primitives_compressed: usize,
    pub primitives_skipped: usize,
    pub images_resized: usize,
    /// The rewritten file came out larger, so the input was passed through.
    pub kept_original: bool,
}

impl Report {
    /// `(1 - output / input) * 100`; zero for an empty input.
    pub fn ratio_percent(&self) -> f64 {
        if self.input_size == 0 {
            return 0.0;
        }
        (1.0 - self.output_size as f64 / self.input_size as f64) * 100.0
    }

    pub fn input_mb(&self) -> f64 {
        self.input_size as f64 / MB
    }

    pub fn output_mb(&self) -> f64 {
        self.output_size as f64 / MB
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input size: {:.2} MB", self.input_mb())?;
        writeln!(f, "Output size: {:.2} MB", self.output_mb())?;
        write!(f, "Compression ratio: {:.1}%", self.ratio_percent())
    }
}
