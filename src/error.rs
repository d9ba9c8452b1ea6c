use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// The measures in a registry do not agree on who owns which output key.
#[derive(Debug, Clone)]
pub struct MeasureConfigError {
    pub msg: String,
}

impl Display for MeasureConfigError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "measure configuration error: {}", self.msg)
    }
}

impl Error for MeasureConfigError {}

/// An existing output file was written with a different set of columns.
#[derive(Debug, Clone)]
pub struct OutputSchemaError {
    pub expected: Vec<String>,
    pub found: Vec<String>,
}

impl Display for OutputSchemaError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "output header mismatch: expected [{}], found [{}]",
            self.expected.join(","),
            self.found.join(",")
        )
    }
}

impl Error for OutputSchemaError {}
