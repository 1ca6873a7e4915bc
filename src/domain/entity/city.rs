use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// CityDescriptor はアップロードされたインポートドキュメントの1エントリ。
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CityDescriptor {
    pub name: String,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub population: Option<i64>,
    #[serde(default)]
    pub capital: bool,
    #[serde(default)]
    pub government: Option<String>,
}

impl CityDescriptor {
    /// 行の作成を試みる前に適用する構造検証。
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("city name must not be blank".to_string());
        }
        if let Some(area) = self.area {
            if area <= 0.0 {
                return Err(format!("city '{}': area must be positive", self.name));
            }
        }
        if let Some(population) = self.population {
            if population < 1 {
                return Err(format!("city '{}': population must be at least 1", self.name));
            }
        }
        Ok(())
    }
}

/// City は受理された各ディスクリプタから作成されるドメインレコード。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub id: Uuid,
    pub name: String,
    pub area: Option<f64>,
    pub population: Option<i64>,
    pub capital: bool,
    pub government: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl City {
    pub fn from_descriptor(descriptor: &CityDescriptor, created_by: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: descriptor.name.clone(),
            area: descriptor.area,
            population: descriptor.population,
            capital: descriptor.capital,
            government: descriptor.government.clone(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_parses_with_name_only() {
        let descriptor: CityDescriptor = serde_json::from_str(r#"{"name": "A"}"#).unwrap();
        assert_eq!(descriptor.name, "A");
        assert!(descriptor.area.is_none());
        assert!(!descriptor.capital);
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn test_descriptor_rejects_blank_name() {
        let descriptor: CityDescriptor = serde_json::from_str(r#"{"name": "  "}"#).unwrap();
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_descriptor_rejects_non_positive_area() {
        let descriptor: CityDescriptor =
            serde_json::from_str(r#"{"name": "A", "area": -2.5}"#).unwrap();
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_descriptor_rejects_zero_population() {
        let descriptor: CityDescriptor =
            serde_json::from_str(r#"{"name": "A", "population": 0}"#).unwrap();
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_city_from_descriptor_copies_fields() {
        let descriptor: CityDescriptor = serde_json::from_str(
            r#"{"name": "Springfield", "area": 41.8, "population": 116000, "capital": true}"#,
        )
        .unwrap();
        let city = City::from_descriptor(&descriptor, "operator");
        assert_eq!(city.name, "Springfield");
        assert_eq!(city.area, Some(41.8));
        assert_eq!(city.population, Some(116000));
        assert!(city.capital);
        assert_eq!(city.created_by, "operator");
    }
}
