//! Business rules deciding whether a product may be reprocessed on demand

use crate::config::AdmissionWindow;
use crate::error::Rejection;
use crate::types::{Parameters, ProductInfo};
use chrono::{DateTime, NaiveDateTime, Utc};

/// Metadata attribute naming the mission
pub const SATELLITE_NAME: &str = "Satellite name";
/// Metadata attribute naming the product type
pub const PRODUCT_TYPE: &str = "Product type";
/// Metadata attribute carrying the tile identifier sent to the service
pub const PDI_IDENTIFIER: &str = "Level-1C PDI Identifier";
/// Metadata attribute carrying the end of the sensing period
pub const SENSING_STOP: &str = "Sensing stop";

const SENTINEL_2: &str = "Sentinel-2";
const LEVEL_1C: &str = "S2MSI1C";

/// Accept `product` for reprocessing at instant `now`, or say why not
///
/// Both window bounds are inclusive.
pub fn check_product(
    product: &ProductInfo,
    parameters: &Parameters,
    window: &AdmissionWindow,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    if !parameters.is_empty() {
        return Err(Rejection::UnexpectedParameters);
    }
    if product.get(SATELLITE_NAME) != Some(SENTINEL_2) {
        return Err(Rejection::WrongMission);
    }
    if product.get(PRODUCT_TYPE) != Some(LEVEL_1C) {
        return Err(Rejection::WrongProductType);
    }
    if !product.contains(PDI_IDENTIFIER) {
        return Err(Rejection::MissingAttribute(PDI_IDENTIFIER));
    }

    let sensing = product
        .get(SENSING_STOP)
        .ok_or(Rejection::MissingAttribute(SENSING_STOP))?;
    let sensing = parse_sensing_date(sensing)
        .ok_or_else(|| Rejection::InvalidSensingDate(sensing.to_string()))?;

    if window.start.is_some_and(|start| sensing < start.resolve(now)) {
        return Err(Rejection::TooOld);
    }
    if window.end.is_some_and(|end| sensing > end.resolve(now)) {
        return Err(Rejection::TooYoung);
    }
    Ok(())
}

/// `2018-03-05T10:10:21.024Z`; the zone designator is optional and means UTC
fn parse_sensing_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text.trim_end_matches('Z'), "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|date| date.and_utc())
}
