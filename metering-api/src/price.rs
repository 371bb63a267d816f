use crate::config::MeteringOptions;
use serde::Serialize;

/// Public view of the configured cost model.
///
/// Kept separate from `PriceInfo` so config keys can change without breaking
/// the API.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub retention_day: u32,
    pub currency: String,
    pub cpu_per_core_per_hour: f64,
    pub mem_per_gigabytes_per_hour: f64,
    pub ingress_network_traffic_per_megabytes_per_hour: f64,
    pub egress_network_traffic_per_megabytes_per_hour: f64,
    pub pvc_per_gigabytes_per_hour: f64,
}

impl From<&MeteringOptions> for PriceResponse {
    fn from(options: &MeteringOptions) -> Self {
        let price_info = &options.billing.price_info;
        PriceResponse {
            retention_day: options.retention_day,
            currency: price_info.currency_unit.clone(),
            cpu_per_core_per_hour: price_info.cpu_per_core_per_hour,
            mem_per_gigabytes_per_hour: price_info.mem_per_gigabytes_per_hour,
            ingress_network_traffic_per_megabytes_per_hour: price_info
                .ingress_network_traffic_per_megabytes_per_hour,
            egress_network_traffic_per_megabytes_per_hour: price_info
                .egress_network_traffic_per_megabytes_per_hour,
            pvc_per_gigabytes_per_hour: price_info.pvc_per_gigabytes_per_hour,
        }
    }
}
