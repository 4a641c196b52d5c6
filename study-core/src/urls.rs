//! Exit and survey URL augmentation with study covariates.

use url::Url;

use crate::error::{StudyError, StudyResult};

/// Study covariates appended to every survey URL
#[derive(Debug, Clone, PartialEq)]
pub struct Covariates {
    pub study: String,
    pub variation: Option<String>,
    pub addon_id: String,
    pub addon_version: String,
}

impl Covariates {
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        vec![
            ("study".to_string(), self.study.clone()),
            ("variation".to_string(), self.variation.clone().unwrap_or_default()),
            ("addon".to_string(), self.addon_id.clone()),
            ("addonVersion".to_string(), self.addon_version.clone()),
        ]
    }
}

/// Merge `params` into the query of `base`. Existing keys with the same name
/// are replaced; other existing query pairs keep their order.
pub fn augment_url(base: &str, params: &[(String, String)]) -> StudyResult<String> {
    let mut url = Url::parse(base)
        .map_err(|e| StudyError::invalid_config(format!("invalid url '{}': {}", base, e)))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !params.iter().any(|(p, _)| p == k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() && params.is_empty() {
        url.set_query(None);
        return Ok(url.to_string());
    }

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in kept.iter().chain(params.iter()) {
            pairs.append_pair(k, v);
        }
    }
    Ok(url.to_string())
}
