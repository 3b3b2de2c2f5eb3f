pub mod enrich_edges;
pub mod parse_kml;

use log::{info, error};

use crate::errors::{Error, Result};

/// A staged job: read the sources, turn them into the output shape, write it.
/// Implementors report whether their output already exists so a rerun can be
/// skipped. Existing output is only replaced by `load`, after the earlier
/// stages succeeded.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self) -> Result<bool>;

    fn extract(&mut self) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, output: Self::Output) -> Result<()>;

    fn process(&mut self) -> Result<()> {
        let etl_name = self.etl_name().to_string();
        let stage_failed = |stage: &str, err: Error| {
            error!(
                etl_name = etl_name.as_str(),
                stage = stage,
                kind = err.kind.as_str(),
                err = err.message.as_str();
                "Stage failed with error"
            );
            err
        };

        info!(etl_name = etl_name.as_str(); "Starting ETL process");
        if self.is_cached()? {
            info!(etl_name = etl_name.as_str(); "Output exists, nothing to do");
            return Ok(());
        }

        info!(etl_name = etl_name.as_str(); "Extracting");
        let input = self.extract().map_err(|err| stage_failed("extract", err))?;

        info!(etl_name = etl_name.as_str(); "Transforming");
        let output = self.transform(input).map_err(|err| stage_failed("transform", err))?;

        info!(etl_name = etl_name.as_str(); "Loading");
        self.load(output).map_err(|err| stage_failed("load", err))?;

        info!(etl_name = etl_name.as_str(); "Process finished");
        Ok(())
    }
}
