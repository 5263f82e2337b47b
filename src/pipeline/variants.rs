//! Named pipeline variants trading speed for output quality

use serde::Serialize;

/// Specification of one pipeline variant
#[derive(Debug, Clone, Serialize)]
pub struct VariantSpec {
    pub key: String,
    pub name: String,
    /// Checkpoint suffix forwarded to the compute collaborator
    pub checkpoint_suffix: String,
    pub steps: u32,
    pub cfg_scale: f32,
    pub estimated_time: String,
    pub estimated_secs: u64,
    pub description: String,
}

/// Catalog of the variants this deployment can load
#[derive(Debug, Clone)]
pub struct VariantCatalog {
    variants: Vec<VariantSpec>,
}

impl Default for VariantCatalog {
    fn default() -> Self {
        Self {
            variants: vec![
                VariantSpec {
                    key: "4-step".to_string(),
                    name: "Lightning 4-step (Ultra Fast)".to_string(),
                    checkpoint_suffix: "lightningv2.0-4steps".to_string(),
                    steps: 4,
                    cfg_scale: 1.0,
                    estimated_time: "~20 seconds".to_string(),
                    estimated_secs: 20,
                    description: "Ultra-fast generation with good quality".to_string(),
                },
                VariantSpec {
                    key: "8-step".to_string(),
                    name: "Lightning 8-step (Fast)".to_string(),
                    checkpoint_suffix: "lightningv2.0-8steps".to_string(),
                    steps: 8,
                    cfg_scale: 1.0,
                    estimated_time: "~40 seconds".to_string(),
                    estimated_secs: 40,
                    description: "Fast generation with better quality".to_string(),
                },
                VariantSpec {
                    key: "40-step".to_string(),
                    name: "Standard 40-step (Best Quality)".to_string(),
                    checkpoint_suffix: String::new(),
                    steps: 40,
                    cfg_scale: 4.0,
                    estimated_time: "~3 minutes".to_string(),
                    estimated_secs: 180,
                    description: "Best quality, slower generation".to_string(),
                },
            ],
        }
    }
}

impl VariantCatalog {
    pub fn get(&self, key: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.key == key)
    }

    pub fn all(&self) -> &[VariantSpec] {
        &self.variants
    }

    pub fn keys(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.key.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let catalog = VariantCatalog::default();
        assert_eq!(catalog.all().len(), 3);

        let fast = catalog.get("4-step").unwrap();
        assert_eq!(fast.steps, 4);
        assert_eq!(fast.cfg_scale, 1.0);

        let quality = catalog.get("40-step").unwrap();
        assert_eq!(quality.steps, 40);
        assert!(quality.checkpoint_suffix.is_empty());

        assert!(catalog.get("2-step").is_none());
    }

    #[test]
    fn test_catalog_keys() {
        let catalog = VariantCatalog::default();
        assert_eq!(catalog.keys(), vec!["4-step", "8-step", "40-step"]);
    }
}
