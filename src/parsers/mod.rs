pub mod cobertura;
pub mod lcov;

use crate::detect::Format;
use crate::error::Result;
use crate::model::CoverageData;

/// Every format parser implements this trait.
pub trait Parser {
    /// Parse the input bytes into our uniform coverage model.
    fn parse(&self, input: &[u8]) -> Result<CoverageData>;
}

/// Parse `content` with the parser for a text coverage format.
///
/// SQLite stores are opened directly and never reach a parser.
pub fn parse_with_format(format: Format, content: &[u8]) -> Result<CoverageData> {
    match format {
        Format::Cobertura => cobertura::CoberturaParser.parse(content),
        Format::Lcov => lcov::LcovParser.parse(content),
        Format::Sqlite => Err(crate::error::DiffCovError::Other(
            "SQLite stores are not parsed; open them with db::open_existing".to_string(),
        )),
    }
}
