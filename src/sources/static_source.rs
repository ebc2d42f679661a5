use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use super::{DataSource, FetchOptions, Payload};
use crate::location::Location;

/// In-memory source serving fixed payloads per grid cell.
///
/// Cells without a record yield an empty payload, which consumers treat as
/// "no data" rather than a provider failure.
pub struct StaticSource {
    name: String,
    records: HashMap<String, Payload>,
}

impl StaticSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: HashMap::new(),
        }
    }

    /// Attach a payload to the cell containing `location`.
    pub fn with_record(mut self, location: &Location, payload: Payload) -> Self {
        self.insert(location, payload);
        self
    }

    pub fn insert(&mut self, location: &Location, payload: Payload) {
        self.records
            .insert(location.grid_hash().to_string(), payload);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DataSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, location: &Location, _options: &FetchOptions) -> Result<Payload> {
        Ok(self
            .records
            .get(location.grid_hash())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_serves_record_for_cell() {
        let home = Location::new(40.666, -111.897);
        let mut payload = Payload::new();
        payload.insert("neighbors_in_program".to_string(), json!(2));
        let source = StaticSource::new("property").with_record(&home, payload.clone());

        // Same rounded cell, different exact coordinates
        let nearby = Location::new(40.66612, -111.89688);
        let got = source.fetch(&nearby, &FetchOptions::new()).await.unwrap();
        assert_eq!(got, payload);
    }

    #[tokio::test]
    async fn test_unknown_cell_is_empty() {
        let source = StaticSource::new("property");
        let got = source
            .fetch(&Location::new(1.0, 1.0), &FetchOptions::new())
            .await
            .unwrap();
        assert!(got.is_empty());
        assert!(source.is_empty());
    }
}
