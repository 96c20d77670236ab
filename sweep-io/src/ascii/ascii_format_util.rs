use anyhow::{bail, Result};

// Maps the columns of an ascii line to the attributes of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnType {
    Skip,
    CoordinateX,
    CoordinateY,
    CoordinateZ,
    Intensity,    //F32
    Ring,         //U16
    RelativeTime, //F32
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ColumnType {
    //s - skip this column
    //x - x coordinate
    //y - y coordinate
    //z - z coordinate
    //i - intensity
    //r - ring index
    //t - time relative to the sweep start, in [0, 1]
    pub(crate) fn get_parse_layout(format: &str) -> Result<Vec<ColumnType>> {
        let mut parse_layout = Vec::<ColumnType>::new();
        for character in format.chars() {
            match character {
                's' => parse_layout.push(ColumnType::Skip),
                'x' => parse_layout.push(ColumnType::CoordinateX),
                'y' => parse_layout.push(ColumnType::CoordinateY),
                'z' => parse_layout.push(ColumnType::CoordinateZ),
                'i' => parse_layout.push(ColumnType::Intensity),
                'r' => parse_layout.push(ColumnType::Ring),
                't' => parse_layout.push(ColumnType::RelativeTime),
                _ => {
                    bail!(
                        "FormatError can't interpret format literal '{}' in format string '{}'.",
                        character,
                        format
                    );
                }
            }
        }
        for required in [
            ColumnType::CoordinateX,
            ColumnType::CoordinateY,
            ColumnType::CoordinateZ,
        ]
        .iter()
        {
            if !parse_layout.contains(required) {
                bail!(
                    "FormatError format string '{}' has no column for {}.",
                    format,
                    required
                );
            }
        }
        Ok(parse_layout)
    }

    pub(crate) fn literal(&self) -> char {
        match self {
            ColumnType::Skip => 's',
            ColumnType::CoordinateX => 'x',
            ColumnType::CoordinateY => 'y',
            ColumnType::CoordinateZ => 'z',
            ColumnType::Intensity => 'i',
            ColumnType::Ring => 'r',
            ColumnType::RelativeTime => 't',
        }
    }
}

pub(crate) fn generate_parse_error(column: &ColumnType) -> String {
    format!(
        "ParseError at parsing {} for format literal '{}'.",
        column,
        column.literal()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout() -> Result<()> {
        let layout = ColumnType::get_parse_layout("xyzsirt")?;
        assert_eq!(
            vec![
                ColumnType::CoordinateX,
                ColumnType::CoordinateY,
                ColumnType::CoordinateZ,
                ColumnType::Skip,
                ColumnType::Intensity,
                ColumnType::Ring,
                ColumnType::RelativeTime,
            ],
            layout
        );
        Ok(())
    }

    #[test]
    fn test_unknown_literal_fails() {
        assert!(ColumnType::get_parse_layout("xyzq").is_err());
    }

    #[test]
    fn test_missing_coordinate_fails() {
        assert!(ColumnType::get_parse_layout("xyi").is_err());
    }
}
