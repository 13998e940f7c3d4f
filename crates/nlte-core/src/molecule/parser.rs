//! Reader for the Leiden LAMDA molecular catalogue text format.
//!
//! Lines starting with `!` are section headers and are skipped; the remaining
//! lines are consumed in catalogue order. Frequencies are read in GHz and
//! collision rates in cm^3 s^-1, both converted to SI, and 1-based level
//! indices become 0-based.

use super::model::{
    CollisionPartner, CollisionalTransition, EnergyLevel, LineSpec, MolecularSpecies,
};
use crate::domain::{NlteError, NlteResult};
use std::fs;
use std::path::Path;

const GHZ_TO_HZ: f64 = 1.0e9;
const CM3_TO_M3: f64 = 1.0e-6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LamdaParseError {
    #[error("catalogue ended while reading {section}")]
    UnexpectedEnd { section: &'static str },
    #[error("line {line}: {section} expects {expected} values, found {found}")]
    MissingValues {
        line: usize,
        section: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: invalid {section} value '{token}'")]
    InvalidValue {
        line: usize,
        section: &'static str,
        token: String,
    },
    #[error("line {line}: {section} index {index} is out of range")]
    IndexOutOfRange {
        line: usize,
        section: &'static str,
        index: usize,
    },
}

struct DataLine<'a> {
    number: usize,
    text: &'a str,
}

struct LineCursor<'a> {
    lines: Vec<DataLine<'a>>,
    position: usize,
}

impl<'a> LineCursor<'a> {
    fn new(source: &'a str) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .filter_map(|(index, text)| {
                let trimmed = text.trim();
                (!trimmed.is_empty() && !trimmed.starts_with('!')).then_some(DataLine {
                    number: index + 1,
                    text: trimmed,
                })
            })
            .collect();
        Self { lines, position: 0 }
    }

    fn next_line(&mut self, section: &'static str) -> Result<&DataLine<'a>, LamdaParseError> {
        let line = self
            .lines
            .get(self.position)
            .ok_or(LamdaParseError::UnexpectedEnd { section })?;
        self.position += 1;
        Ok(line)
    }

    fn next_count(&mut self, section: &'static str) -> Result<usize, LamdaParseError> {
        let line = self.next_line(section)?;
        let token = first_token(line, section)?;
        parse_token(token, line.number, section)
    }

    fn next_value(&mut self, section: &'static str) -> Result<f64, LamdaParseError> {
        let line = self.next_line(section)?;
        let token = first_token(line, section)?;
        parse_token(token, line.number, section)
    }

    /// Reads `count` numeric values that may be spread over several lines.
    fn next_values(
        &mut self,
        count: usize,
        section: &'static str,
    ) -> Result<Vec<f64>, LamdaParseError> {
        let mut values = Vec::with_capacity(count);
        while values.len() < count {
            let line = self.next_line(section)?;
            for token in line.text.split_whitespace() {
                if values.len() == count {
                    break;
                }
                values.push(parse_token(token, line.number, section)?);
            }
        }
        Ok(values)
    }
}

fn first_token<'a>(line: &DataLine<'a>, section: &'static str) -> Result<&'a str, LamdaParseError> {
    line.text
        .split_whitespace()
        .next()
        .ok_or(LamdaParseError::MissingValues {
            line: line.number,
            section,
            expected: 1,
            found: 0,
        })
}

fn parse_token<T: std::str::FromStr>(
    token: &str,
    line: usize,
    section: &'static str,
) -> Result<T, LamdaParseError> {
    token.parse().map_err(|_| LamdaParseError::InvalidValue {
        line,
        section,
        token: token.to_string(),
    })
}

fn split_columns<'a>(
    line: &DataLine<'a>,
    section: &'static str,
    expected: usize,
) -> Result<Vec<&'a str>, LamdaParseError> {
    let columns: Vec<&str> = line.text.split_whitespace().collect();
    if columns.len() < expected {
        return Err(LamdaParseError::MissingValues {
            line: line.number,
            section,
            expected,
            found: columns.len(),
        });
    }
    Ok(columns)
}

fn level_index(
    token: &str,
    line: usize,
    section: &'static str,
    level_count: usize,
) -> Result<usize, LamdaParseError> {
    let one_based: usize = parse_token(token, line, section)?;
    if one_based == 0 || one_based > level_count {
        return Err(LamdaParseError::IndexOutOfRange {
            line,
            section,
            index: one_based,
        });
    }
    Ok(one_based - 1)
}

fn parse_catalogue(source: &str) -> Result<ParsedCatalogue, LamdaParseError> {
    let mut cursor = LineCursor::new(source);

    let name = cursor.next_line("molecule name")?.text.to_string();
    let molecular_weight = cursor.next_value("molecular weight")?;

    let level_count = cursor.next_count("level count")?;
    let mut levels = Vec::with_capacity(level_count);
    for _ in 0..level_count {
        let line = cursor.next_line("energy levels")?;
        let columns = split_columns(line, "energy levels", 3)?;
        let energy = parse_token(columns[1], line.number, "energy levels")?;
        let weight = parse_token(columns[2], line.number, "energy levels")?;
        levels.push(EnergyLevel::new(weight, energy));
    }

    let line_count = cursor.next_count("radiative transition count")?;
    let mut lines = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        let line = cursor.next_line("radiative transitions")?;
        let columns = split_columns(line, "radiative transitions", 5)?;
        let upper = level_index(columns[1], line.number, "radiative transitions", level_count)?;
        let lower = level_index(columns[2], line.number, "radiative transitions", level_count)?;
        let einstein_a = parse_token(columns[3], line.number, "radiative transitions")?;
        let frequency_ghz: f64 = parse_token(columns[4], line.number, "radiative transitions")?;
        lines.push(LineSpec {
            upper,
            lower,
            einstein_a,
            frequency: frequency_ghz * GHZ_TO_HZ,
        });
    }

    let partner_count = cursor.next_count("collision partner count")?;
    let mut partners = Vec::with_capacity(partner_count);
    for _ in 0..partner_count {
        let header = cursor.next_line("collision partner")?;
        let columns = split_columns(header, "collision partner", 1)?;
        let partner_id = parse_token(columns[0], header.number, "collision partner")?;
        let label = columns[1..].join(" ");

        let transition_count = cursor.next_count("collisional transition count")?;
        let temperature_count = cursor.next_count("collision temperature count")?;
        let temperatures = cursor.next_values(temperature_count, "collision temperatures")?;

        let mut transitions = Vec::with_capacity(transition_count);
        for _ in 0..transition_count {
            let line = cursor.next_line("collision rates")?;
            let columns = split_columns(line, "collision rates", 3 + temperature_count)?;
            let upper = level_index(columns[1], line.number, "collision rates", level_count)?;
            let lower = level_index(columns[2], line.number, "collision rates", level_count)?;
            let rates = columns[3..3 + temperature_count]
                .iter()
                .map(|token| {
                    parse_token::<f64>(token, line.number, "collision rates")
                        .map(|rate| rate * CM3_TO_M3)
                })
                .collect::<Result<Vec<_>, _>>()?;
            transitions.push(CollisionalTransition {
                upper,
                lower,
                rates,
            });
        }

        partners.push(CollisionPartner {
            partner_id,
            label,
            temperatures,
            transitions,
        });
    }

    Ok(ParsedCatalogue {
        name,
        molecular_weight,
        levels,
        lines,
        partners,
    })
}

struct ParsedCatalogue {
    name: String,
    molecular_weight: f64,
    levels: Vec<EnergyLevel>,
    lines: Vec<LineSpec>,
    partners: Vec<CollisionPartner>,
}

pub fn parse_lamda(source: &str) -> NlteResult<MolecularSpecies> {
    let catalogue = parse_catalogue(source).map_err(|error| {
        NlteError::input_validation("CONFIG.MOLDATA_PARSE", error.to_string())
    })?;
    MolecularSpecies::new(
        catalogue.name,
        catalogue.molecular_weight,
        catalogue.levels,
        catalogue.lines,
        catalogue.partners,
    )
}

pub fn load_lamda(path: impl AsRef<Path>) -> NlteResult<MolecularSpecies> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| {
        NlteError::io_system(
            "IO.MOLDATA_READ",
            format!("failed to read molecular data '{}': {}", path.display(), source),
        )
    })?;
    parse_lamda(&source)
}
