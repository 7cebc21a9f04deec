/*!
Helpers to load MQTT contracts and check payloads against them

A contract is a JSON file with `name`, `version`, `topic`, `type`, `description` and a
`schema`. The schema understands the subset of JSON Schema used by the contracts of
this repository: `type`, `required`, `properties`, `items`, `enum`, `minimum`,
`maximum`, `minItems`, `maxItems`.
*/

use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Contract {
    pub name: String,
    pub version: String,
    pub topic: String,
    pub contract_type: String,
    pub schema: Value,
    pub description: Option<String>,
}

impl Contract {
    /// Checks a payload against the contract schema.
    pub fn validate(&self, payload: &Value) -> Result<()> {
        validate_value(&self.schema, payload, "$")
    }

    /// Whether a concrete topic matches the contract topic (`{placeholder}` segments
    /// match any single level).
    pub fn matches_topic(&self, topic: &str) -> bool {
        let pattern: Vec<&str> = self.topic.split('/').collect();
        let actual: Vec<&str> = topic.split('/').collect();
        pattern.len() == actual.len()
            && pattern.iter().zip(&actual).all(|(p, a)| {
                (p.starts_with('{') && p.ends_with('}') && !a.is_empty()) || p == a
            })
    }

    /// Fields listed in the schema's `required` array
    pub fn required_fields(&self) -> Vec<String> {
        self.schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str().map(|s| s.to_string())).collect())
            .unwrap_or_default()
    }
}

/// Loads and indexes contracts from JSON files
pub struct ContractLoader {
    contracts: HashMap<String, Contract>,
    contracts_dir: PathBuf,
}

impl ContractLoader {
    pub fn new<P: AsRef<Path>>(contracts_dir: P) -> Self {
        Self {
            contracts: HashMap::new(),
            contracts_dir: contracts_dir.as_ref().to_path_buf(),
        }
    }

    /// Loads every contract of `<contracts_dir>/mqtt`
    pub fn load_mqtt_contracts(&mut self) -> Result<usize> {
        let mqtt_dir = self.contracts_dir.join("mqtt");
        self.load_contracts_from_dir(&mqtt_dir)
    }

    fn load_contracts_from_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            log::warn!("Contracts directory not found: {}", dir.display());
            return Ok(0);
        }

        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                match self.load_contract(&path) {
                    Ok(contract) => {
                        log::info!("📜 Loaded contract: {}", contract.name);
                        self.contracts.insert(contract.name.clone(), contract);
                        count += 1;
                    }
                    Err(e) => {
                        log::warn!("⚠️ Failed to load contract {}: {}", path.display(), e);
                    }
                }
            }
        }

        Ok(count)
    }

    fn load_contract(&self, path: &Path) -> Result<Contract> {
        let content = std::fs::read_to_string(path)?;
        let json: Value = serde_json::from_str(&content)?;

        let file_stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unnamed")
            .to_string();

        Ok(Contract {
            name: json.get("name").and_then(|v| v.as_str()).map(|s| s.to_string()).unwrap_or(file_stem),
            version: json.get("version").and_then(|v| v.as_str()).unwrap_or("v1").to_string(),
            topic: json.get("topic").and_then(|v| v.as_str()).unwrap_or("").to_string(),
            contract_type: json.get("type").and_then(|v| v.as_str()).unwrap_or("event").to_string(),
            schema: json.get("schema").cloned().unwrap_or_else(|| Value::Object(Map::new())),
            description: json.get("description").and_then(|v| v.as_str()).map(|s| s.to_string()),
        })
    }

    pub fn get_contract(&self, name: &str) -> Option<&Contract> {
        self.contracts.get(name)
    }

    /// Validates a raw MQTT payload published on `topic` against the matching contract.
    pub fn validate_publish(&self, topic: &str, payload: &[u8]) -> Result<&Contract> {
        let Some(contract) = self.contracts.values().find(|c| c.matches_topic(topic)) else {
            bail!("no contract for topic {}", topic);
        };
        let value: Value = serde_json::from_slice(payload)?;
        contract.validate(&value)?;
        Ok(contract)
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn validate_value(schema: &Value, value: &Value, path: &str) -> Result<()> {
    if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
        if !type_matches(expected, value) {
            bail!("{}: expected {}, got {}", path, expected, value);
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array()) {
        if !allowed.contains(value) {
            bail!("{}: {} is not one of {:?}", path, value, allowed);
        }
    }

    if let Some(number) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(|m| m.as_f64()) {
            if number < min {
                bail!("{}: {} is below minimum {}", path, number, min);
            }
        }
        if let Some(max) = schema.get("maximum").and_then(|m| m.as_f64()) {
            if number > max {
                bail!("{}: {} is above maximum {}", path, number, max);
            }
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
            for field in required.iter().filter_map(|f| f.as_str()) {
                if !object.contains_key(field) {
                    bail!("{}: missing required field '{}'", path, field);
                }
            }
        }
        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            for (field, field_schema) in props {
                if let Some(field_value) = object.get(field) {
                    validate_value(field_schema, field_value, &format!("{}.{}", path, field))?;
                }
            }
        }
    }

    if let Some(items) = value.as_array() {
        if let Some(min) = schema.get("minItems").and_then(|m| m.as_u64()) {
            if (items.len() as u64) < min {
                bail!("{}: {} items, at least {} expected", path, items.len(), min);
            }
        }
        if let Some(max) = schema.get("maxItems").and_then(|m| m.as_u64()) {
            if (items.len() as u64) > max {
                bail!("{}: {} items, at most {} expected", path, items.len(), max);
            }
        }
        if let Some(item_schema) = schema.get("items") {
            for (i, item) in items.iter().enumerate() {
                validate_value(item_schema, item, &format!("{}[{}]", path, i))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn reading_contract() -> Contract {
        Contract {
            name: "reading@v1".into(),
            version: "v1".into(),
            topic: "mediciones/{nodo}".into(),
            contract_type: "event".into(),
            description: None,
            schema: json!({
                "type": "object",
                "required": ["nodo", "sensores", "nivelBateria"],
                "properties": {
                    "nodo": { "type": "string" },
                    "nivelBateria": { "type": "integer", "minimum": 85, "maximum": 100 },
                    "sensores": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "required": ["tipoSensor", "valor"],
                            "properties": {
                                "tipoSensor": { "type": "string", "enum": ["temperature", "humidity"] },
                                "valor": { "type": "number" }
                            }
                        }
                    }
                }
            }),
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        let contract = reading_contract();
        let payload = json!({
            "nodo": "agri-sensor-01",
            "nivelBateria": 90,
            "sensores": [{ "tipoSensor": "temperature", "valor": 21.5 }]
        });
        assert!(contract.validate(&payload).is_ok());
        assert_eq!(contract.required_fields(), vec!["nodo", "sensores", "nivelBateria"]);
    }

    #[test]
    fn test_violations_are_reported_with_path() {
        let contract = reading_contract();

        let missing = json!({ "nodo": "a", "sensores": [{ "tipoSensor": "temperature", "valor": 1.0 }] });
        let err = contract.validate(&missing).unwrap_err().to_string();
        assert!(err.contains("nivelBateria"), "{}", err);

        let bad_enum = json!({
            "nodo": "a", "nivelBateria": 90,
            "sensores": [{ "tipoSensor": "wind", "valor": 1.0 }]
        });
        let err = contract.validate(&bad_enum).unwrap_err().to_string();
        assert!(err.contains("$.sensores[0].tipoSensor"), "{}", err);

        let out_of_range = json!({ "nodo": "a", "nivelBateria": 101, "sensores": [] });
        assert!(contract.validate(&out_of_range).is_err());

        let wrong_type = json!({ "nodo": "a", "nivelBateria": 90.5, "sensores": [{ "tipoSensor": "humidity", "valor": 1 }] });
        assert!(contract.validate(&wrong_type).is_err());
    }

    #[test]
    fn test_topic_placeholders() {
        let contract = reading_contract();
        assert!(contract.matches_topic("mediciones/agri-sensor-01"));
        assert!(!contract.matches_topic("mediciones/"));
        assert!(!contract.matches_topic("mediciones/a/b"));
        assert!(!contract.matches_topic("medidas/agri-sensor-01"));
    }

    #[test]
    fn test_loader_reads_mqtt_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mqtt_dir = dir.path().join("mqtt");
        std::fs::create_dir_all(&mqtt_dir).unwrap();

        let mut file = std::fs::File::create(mqtt_dir.join("ping@v1.json")).unwrap();
        write!(
            file,
            r#"{{ "topic": "ping/{{id}}", "schema": {{ "type": "object", "required": ["id"] }} }}"#
        )
        .unwrap();
        std::fs::write(mqtt_dir.join("notes.txt"), "ignored").unwrap();

        let mut loader = ContractLoader::new(dir.path());
        assert_eq!(loader.load_mqtt_contracts().unwrap(), 1);

        let contract = loader.get_contract("ping@v1").unwrap();
        assert_eq!(contract.version, "v1");
        assert_eq!(contract.contract_type, "event");

        assert!(loader.validate_publish("ping/42", br#"{"id": 42}"#).is_ok());
        assert!(loader.validate_publish("ping/42", br#"{}"#).is_err());
        assert!(loader.validate_publish("pong/42", br#"{"id": 42}"#).is_err());
    }
}
