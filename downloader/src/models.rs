//! Form bodies accepted by the downloader's HTTP surface.

use serde::Deserialize;
use solaredge::RawParams;

use crate::pipeline::GenerateRequest;

/// Body of `POST /login`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Body of `POST /generate`. Fields an operation does not use are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub site: String,
    #[serde(default)]
    pub operation: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub time_unit: Option<String>,
}

impl From<GenerateForm> for GenerateRequest {
    fn from(form: GenerateForm) -> Self {
        GenerateRequest {
            site: form.site,
            operation: form.operation,
            params: RawParams {
                start_date: form.start_date,
                end_date: form.end_date,
                start_time: form.start_time,
                end_time: form.end_time,
                time_unit: form.time_unit,
            },
        }
    }
}
