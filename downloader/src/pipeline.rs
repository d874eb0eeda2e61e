//! The Generate action: validate, call, flatten, package.

use chrono::NaiveDate;
use solaredge::{
    export, flatten, ApiError, ExportBundle, ExportError, Gateway, NamingContext, Operation,
    ParamError, RawParams,
};
use thiserror::Error;
use tracing::{error, info};

use crate::sites::SiteDirectory;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("site {0:?} is not in the site list")]
    InvalidSite(String),
    #[error("unknown operation {0:?}")]
    UnknownOperation(String),
    #[error(transparent)]
    Params(#[from] ParamError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("no data returned for {0}")]
    NoData(Operation),
    #[error("packaging failed: {0}")]
    Export(ExportError),
}

impl GenerateError {
    pub fn user_message(&self) -> String {
        match self {
            GenerateError::InvalidSite(_) => "Invalid site selected.".to_string(),
            GenerateError::UnknownOperation(_) => "Please select a valid API endpoint.".to_string(),
            GenerateError::Params(e) => e.user_message(),
            GenerateError::Api(e) => e.user_message(),
            GenerateError::NoData(op) => {
                format!("No data found in the API response for '{op}'. Nothing to download.")
            }
            GenerateError::Export(_) => "Could not prepare the download files.".to_string(),
        }
    }

    /// An empty result is a warning, not a failure.
    pub fn is_warning(&self) -> bool {
        matches!(self, GenerateError::NoData(_))
    }
}

/// One Generate request as selected on the form.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub site: String,
    pub operation: String,
    pub params: RawParams,
}

/// Runs the whole pipeline. Nothing touches the network before the site and
/// parameters have been validated.
pub async fn generate(
    gateway: &Gateway,
    sites: &SiteDirectory,
    req: &GenerateRequest,
    today: NaiveDate,
) -> Result<ExportBundle, GenerateError> {
    let site = sites
        .lookup(&req.site)
        .ok_or_else(|| GenerateError::InvalidSite(req.site.clone()))?;
    let operation = Operation::from_slug(&req.operation)
        .ok_or_else(|| GenerateError::UnknownOperation(req.operation.clone()))?;
    let call = operation.prepare(&site.id, &req.params)?;

    let raw = gateway.call(&call.endpoint, &call.query).await?;

    let flattened = flatten(operation, &raw);
    if flattened.is_empty() {
        info!(site_id = %site.id, %operation, "response contained no rows");
        return Err(GenerateError::NoData(operation));
    }

    let ctx = NamingContext {
        site_id: &site.id,
        operation,
        time_unit: call.time_unit,
        generated_on: today,
    };
    let bundle = export::package(&raw, &flattened, &ctx).map_err(|e| match e {
        ExportError::NoData => GenerateError::NoData(operation),
        other => {
            error!(error = %other, "failed to package export");
            GenerateError::Export(other)
        }
    })?;

    info!(
        site_id = %site.id,
        %operation,
        rows = flattened.rows.len(),
        file = %bundle.filename_base,
        "export ready"
    );
    Ok(bundle)
}
