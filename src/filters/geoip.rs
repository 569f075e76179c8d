use super::Filter;
use crate::config::{require_str, FilterConfig};
use crate::core::Message;
use async_trait::async_trait;
use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::str::FromStr;

/// On an IPv4/IPv6 literal in `payload[field]`, looks up country, city,
/// region, latitude and longitude via a MaxMind-format database and overlays
/// `geoip_country_code`, `geoip_city_name`, `geoip_region_name`,
/// `geoip_latitude`, `geoip_longitude`. A value that isn't a literal IP, or
/// one the database has no record for, passes through unchanged.
pub struct GeoipFilter {
    field: String,
    reader: Reader<Vec<u8>>,
}

impl GeoipFilter {
    pub fn new(cfg: &FilterConfig) -> anyhow::Result<Self> {
        let db_path = require_str(&cfg.options, "geoip", &cfg.name, "db_path")?;
        let reader = Reader::open_readfile(db_path)
            .map_err(|e| anyhow::anyhow!("geoip filter '{}': failed to open database '{}': {}", cfg.name, db_path, e))?;
        Ok(Self { field: cfg.field.clone(), reader })
    }
}

#[async_trait]
impl Filter for GeoipFilter {
    async fn process(&mut self, mut msg: Message) -> anyhow::Result<Option<Message>> {
        let Some(value) = msg.payload.get(&self.field) else {
            return Ok(Some(msg));
        };
        let Ok(ip) = IpAddr::from_str(value) else {
            return Ok(Some(msg));
        };

        let Ok(city) = self.reader.lookup::<geoip2::City>(ip) else {
            return Ok(Some(msg));
        };

        if let Some(country) = city.country.as_ref().and_then(|c| c.iso_code) {
            msg.payload.insert("geoip_country_code".to_string(), country.to_string());
        }
        if let Some(name) = city
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|n| n.get("en"))
        {
            msg.payload.insert("geoip_city_name".to_string(), name.to_string());
        }
        if let Some(name) = city
            .subdivisions
            .as_ref()
            .and_then(|s| s.first())
            .and_then(|s| s.names.as_ref())
            .and_then(|n| n.get("en"))
        {
            msg.payload.insert("geoip_region_name".to_string(), name.to_string());
        }
        if let Some(location) = &city.location {
            if let Some(lat) = location.latitude {
                msg.payload.insert("geoip_latitude".to_string(), lat.to_string());
            }
            if let Some(lon) = location.longitude {
                msg.payload.insert("geoip_longitude".to_string(), lon.to_string());
            }
        }

        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_db_path_is_a_construction_error() {
        let err = GeoipFilter::new(&FilterConfig {
            name: "geo1".into(),
            plugin: "geoip".into(),
            field: "content".into(),
            queue: 8192,
            threads: 1,
            service_interval: 65535,
            debug: false,
            options: Default::default(),
        });
        assert!(err.is_err());
    }
}
