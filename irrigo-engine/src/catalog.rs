use irrigo_core::{GeoPoint, Region, RegionId, SoilId, SoilType};
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("unknown region: {0}")]
    UnknownRegion(String),
    #[error("unknown soil type {soil} for region {region}")]
    UnknownSoil { region: RegionId, soil: String },
    #[error("soil type {soil} in region {region} has non-positive watering multiplier {multiplier}")]
    InvalidMultiplier {
        region: RegionId,
        soil: SoilId,
        multiplier: f64,
    },
    #[error("region {0} is defined more than once")]
    DuplicateRegion(RegionId),
    #[error("region {0} has no soil types")]
    NoSoils(RegionId),
    #[error("catalog has no regions")]
    Empty,
}

/// A region and the soil types offered for it, as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionEntry {
    pub id: RegionId,
    pub name: String,
    pub location: GeoPoint,
    pub soils: Vec<SoilType>,
}

/// Static mapping from (region, soil type) to a watering multiplier.
///
/// Regions keep their configured order so listings are stable. Lookups by
/// region or soil identifier ignore case.
#[derive(Debug, Clone)]
pub struct SoilCatalog {
    regions: Vec<(Region, Vec<SoilType>)>,
}

impl SoilCatalog {
    pub fn from_entries(entries: Vec<RegionEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut regions: Vec<(Region, Vec<SoilType>)> = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = RegionId::new(entry.id.as_str());
            if regions.iter().any(|(r, _)| r.id == id) {
                return Err(CatalogError::DuplicateRegion(id));
            }
            if entry.soils.is_empty() {
                return Err(CatalogError::NoSoils(id));
            }

            let mut soils = Vec::with_capacity(entry.soils.len());
            for soil in entry.soils {
                let multiplier = soil.watering_multiplier.into_inner();
                let soil_id = SoilId::new(soil.id.as_str());
                if multiplier <= 0.0 {
                    return Err(CatalogError::InvalidMultiplier {
                        region: id,
                        soil: soil_id,
                        multiplier,
                    });
                }
                soils.push(SoilType { id: soil_id, ..soil });
            }

            let region = Region {
                id,
                name: entry.name.into_boxed_str(),
                location: entry.location,
            };
            regions.push((region, soils));
        }

        Ok(Self { regions })
    }

    /// The three Vidarbha regions with the uniform sandy/clay/loamy catalog.
    pub fn builtin() -> Self {
        let regions = [
            ("nagpur", "Nagpur", 21.1458, 79.0882),
            ("amravati", "Amravati", 20.9374, 77.7796),
            ("yavatmal", "Yavatmal", 20.3888, 78.1204),
        ]
        .into_iter()
        .map(|(id, name, lat, lon)| {
            (
                Region {
                    id: RegionId::new(id),
                    name: name.into(),
                    location: GeoPoint { lat, lon },
                },
                default_soils(),
            )
        })
        .collect();

        Self { regions }
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().map(|(region, _)| region)
    }

    pub fn region(&self, id: &str) -> Result<&Region, CatalogError> {
        self.entry(id).map(|(region, _)| region)
    }

    pub fn soils(&self, region: &str) -> Result<&[SoilType], CatalogError> {
        self.entry(region).map(|(_, soils)| soils.as_slice())
    }

    pub fn soil(&self, region: &str, soil: &str) -> Result<&SoilType, CatalogError> {
        let (region, soils) = self.entry(region)?;
        let soil_id = SoilId::new(soil);
        soils
            .iter()
            .find(|s| s.id == soil_id)
            .ok_or_else(|| CatalogError::UnknownSoil {
                region: region.id.clone(),
                soil: soil.to_string(),
            })
    }

    pub fn multiplier(&self, region: &str, soil: &str) -> Result<f64, CatalogError> {
        self.soil(region, soil)
            .map(|s| s.watering_multiplier.into_inner())
    }

    /// Human readable hint listing the valid region identifiers.
    pub fn invalid_region_message(&self) -> String {
        let ids: Vec<&str> = self.regions().map(|r| r.id.as_str()).collect();
        let listed = match ids.as_slice() {
            [] => String::new(),
            [only] => only.to_string(),
            [init @ .., last] => format!("{}, or {}", init.join(", "), last),
        };
        format!("Invalid region. Please use: {listed}")
    }

    fn entry(&self, id: &str) -> Result<&(Region, Vec<SoilType>), CatalogError> {
        let id = RegionId::new(id);
        self.regions
            .iter()
            .find(|(region, _)| region.id == id)
            .ok_or_else(|| CatalogError::UnknownRegion(id.to_string()))
    }
}

impl Default for SoilCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn default_soils() -> Vec<SoilType> {
    [
        ("sandy", "Sandy Soil", "Drains quickly, needs frequent watering", 1.5),
        ("clay", "Clay Soil", "Retains water well, less frequent watering", 0.7),
        ("loamy", "Loamy Soil", "Perfect balance, moderate watering", 1.0),
    ]
    .into_iter()
    .filter_map(|(id, name, description, multiplier)| {
        Some(SoilType {
            id: SoilId::new(id),
            name: name.into(),
            description: description.into(),
            watering_multiplier: NotNan::new(multiplier).ok()?,
        })
    })
    .collect()
}
