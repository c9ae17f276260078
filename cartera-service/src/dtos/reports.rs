use serde::Deserialize;

/// Raw analytics filters; invalid values fall back to defaults.
#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(alias = "pos")]
    pub pdv: Option<String>,
    pub prov: Option<String>,
    pub d1: Option<String>,
    pub d2: Option<String>,
}
