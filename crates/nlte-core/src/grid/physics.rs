use crate::common::constants::{CLIGHT, DEFAULT_GAS_TO_DUST};
use crate::domain::{NlteError, NlteResult};
use crate::numerics::interpolate_log_log;
use std::fs;
use std::path::Path;

/// Source of the physical conditions sampled onto the grid.
///
/// Implementations are supplied by the caller; the solver only ever sees the
/// values copied into each [`GridPoint`](super::GridPoint).
pub trait PhysicalModel {
    /// Number density per collision partner [m^-3].
    fn densities(&self, position: [f64; 3]) -> Vec<f64>;

    fn gas_temperature(&self, position: [f64; 3]) -> f64;

    fn dust_temperature(&self, position: [f64; 3]) -> f64 {
        self.gas_temperature(position)
    }

    /// Abundance per species relative to the first density component.
    fn abundances(&self, position: [f64; 3]) -> Vec<f64>;

    /// Turbulent Doppler b parameter [m s^-1].
    fn doppler(&self, position: [f64; 3]) -> f64;

    fn velocity(&self, position: [f64; 3]) -> [f64; 3];

    fn gas_to_dust(&self, _position: [f64; 3]) -> f64 {
        DEFAULT_GAS_TO_DUST
    }
}

/// Dust mass opacity as a function of wavelength.
#[derive(Debug, Clone, PartialEq)]
pub struct DustOpacityTable {
    /// Wavelength nodes [um], strictly increasing.
    wavelengths: Vec<f64>,
    /// Mass opacity at each node [cm^2 g^-1].
    opacities: Vec<f64>,
}

impl DustOpacityTable {
    pub fn new(wavelengths: Vec<f64>, opacities: Vec<f64>) -> NlteResult<Self> {
        if wavelengths.is_empty() || wavelengths.len() != opacities.len() {
            return Err(NlteError::input_validation(
                "DUST.TABLE_SHAPE",
                format!(
                    "dust table needs matching non-empty columns, got {} wavelengths and {} opacities",
                    wavelengths.len(),
                    opacities.len()
                ),
            ));
        }
        let increasing = wavelengths.windows(2).all(|pair| pair[1] > pair[0]);
        if !increasing || wavelengths.iter().any(|value| !(value.is_finite() && *value > 0.0)) {
            return Err(NlteError::input_validation(
                "DUST.WAVELENGTHS",
                "dust wavelengths must be positive and strictly increasing",
            ));
        }
        if opacities
            .iter()
            .any(|value| !(value.is_finite() && *value >= 0.0))
        {
            return Err(NlteError::input_validation(
                "DUST.OPACITIES",
                "dust opacities must be non-negative and finite",
            ));
        }

        Ok(Self {
            wavelengths,
            opacities,
        })
    }

    /// Parses a two-column text table (wavelength in um, opacity in cm^2/g).
    /// Blank lines and lines starting with `#` or `!` are skipped.
    pub fn parse(source: &str) -> NlteResult<Self> {
        let mut wavelengths = Vec::new();
        let mut opacities = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let mut columns = trimmed.split_whitespace().map(str::parse::<f64>);
            match (columns.next(), columns.next()) {
                (Some(Ok(wavelength)), Some(Ok(opacity))) => {
                    wavelengths.push(wavelength);
                    opacities.push(opacity);
                }
                _ => {
                    return Err(NlteError::input_validation(
                        "DUST.PARSE",
                        format!("dust table line {} is not two numeric columns", index + 1),
                    ));
                }
            }
        }

        Self::new(wavelengths, opacities)
    }

    pub fn load(path: impl AsRef<Path>) -> NlteResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| {
            NlteError::io_system(
                "IO.DUST_READ",
                format!("failed to read dust table '{}': {source}", path.display()),
            )
        })?;
        Self::parse(&source)
    }

    /// Mass opacity at `frequency` [Hz] in SI units [m^2 kg^-1].
    pub fn opacity(&self, frequency: f64) -> f64 {
        if self.wavelengths.len() == 1 {
            return self.opacities[0] * 0.1;
        }
        let wavelength_um = CLIGHT / frequency * 1.0e6;
        interpolate_log_log(&self.wavelengths, &self.opacities, wavelength_um) * 0.1
    }
}

#[cfg(test)]
mod tests {
    use super::DustOpacityTable;
    use crate::common::constants::CLIGHT;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn opacity_interpolates_power_law_and_converts_units() {
        let table = DustOpacityTable::new(vec![100.0, 1000.0], vec![100.0, 1.0])
            .expect("table should validate");
        // 300 um sits a factor 3 along a slope of -2
        let frequency = CLIGHT / 300.0e-6;
        let expected = 100.0 / 9.0 * 0.1;
        let actual = table.opacity(frequency);
        assert!(((actual - expected) / expected).abs() <= 1.0e-10, "{actual}");
    }

    #[test]
    fn parse_skips_comments_and_rejects_bad_rows() {
        let table = DustOpacityTable::parse("# lambda kappa\n1.0e2 10.0\n\n1.0e3 0.5\n")
            .expect("table should parse");
        assert!(table.opacity(CLIGHT / 100.0e-6) > table.opacity(CLIGHT / 1000.0e-6));

        let error = DustOpacityTable::parse("1.0 2.0\nabc\n").expect_err("bad row");
        assert_eq!(error.placeholder(), "DUST.PARSE");

        let error = DustOpacityTable::new(vec![2.0, 1.0], vec![1.0, 1.0])
            .expect_err("decreasing wavelengths");
        assert_eq!(error.placeholder(), "DUST.WAVELENGTHS");
    }

    #[test]
    fn load_reads_table_from_disk() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("jena.tab");
        fs::write(&path, "1.0 5.0\n10.0 0.5\n").expect("fixture should be written");
        let table = DustOpacityTable::load(&path).expect("table should load");
        assert!(table.opacity(CLIGHT / 1.0e-6) > 0.0);

        let error = DustOpacityTable::load(temp.path().join("missing.tab"))
            .expect_err("missing file");
        assert_eq!(error.placeholder(), "IO.DUST_READ");
    }
}
