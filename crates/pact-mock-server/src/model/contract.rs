//! The parsed contract: parties, interactions and metadata.

use super::http::{Request, Response};
use crate::error::ContractError;
use serde_json::{json, Map, Value};

/// Consumer or provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Party {
    pub name: String,
}

impl Party {
    pub fn new(name: impl Into<String>) -> Self {
        Party { name: name.into() }
    }
}

/// One expected request and the response to serve for it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interaction {
    pub description: String,
    pub provider_state: Option<String>,
    pub request: Request,
    pub response: Response,
}

impl Interaction {
    pub fn new(description: impl Into<String>) -> Self {
        Interaction {
            description: description.into(),
            ..Interaction::default()
        }
    }

    fn from_json(location: &str, value: &Value) -> Result<Self, ContractError> {
        let object = value
            .as_object()
            .ok_or_else(|| ContractError::invalid(location, "expected a JSON object"))?;

        let description = match object.get("description") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(ContractError::invalid(
                    format!("{location}.description"),
                    "expected a string",
                ))
            }
        };

        let provider_state = provider_state(object, location)?;

        let request = match object.get("request") {
            None => return Err(ContractError::MissingField(format!("{location}.request"))),
            Some(request) => Request::from_json(&format!("{location}.request"), request)?,
        };
        let response = match object.get("response") {
            None => Response::default(),
            Some(response) => Response::from_json(&format!("{location}.response"), response)?,
        };

        Ok(Interaction {
            description,
            provider_state,
            request,
            response,
        })
    }

    /// The interaction as written to a pact file.
    pub fn to_json(&self) -> Value {
        let mut interaction = json!({
            "description": self.description,
            "request": self.request.to_pact_json(),
            "response": self.response.to_pact_json(),
        });
        if let Some(state) = &self.provider_state {
            interaction["providerState"] = json!(state);
        }
        interaction
    }

    /// Interactions with the same description and provider state describe
    /// the same expectation.
    fn same_key(&self, other: &Interaction) -> bool {
        self.description == other.description && self.provider_state == other.provider_state
    }
}

fn provider_state(
    object: &Map<String, Value>,
    location: &str,
) -> Result<Option<String>, ContractError> {
    for key in ["provider_state", "providerState"] {
        match object.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::String(state)) => return Ok(Some(state.clone())),
            Some(_) => {
                return Err(ContractError::invalid(
                    format!("{location}.{key}"),
                    "expected a string",
                ))
            }
        }
    }
    let first = object
        .get("providerStates")
        .and_then(Value::as_array)
        .and_then(|states| states.first())
        .and_then(|state| state.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(first)
}

/// Written when the contract did not declare a specification version.
const DEFAULT_SPEC_VERSION: &str = "3.0.0";

/// Contract metadata. The specification version is pulled out; every other
/// key is kept as it was.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub spec_version: Option<String>,
    pub extra: Map<String, Value>,
}

impl Metadata {
    fn from_json(value: Option<&Value>) -> Self {
        let Some(Value::Object(object)) = value else {
            return Metadata::default();
        };

        let mut spec_version = None;
        let mut extra = Map::new();
        for (key, value) in object {
            match key.as_str() {
                "pact-specification" | "pactSpecification" => {
                    spec_version = value
                        .get("version")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                "pactSpecificationVersion" => {
                    spec_version = value.as_str().map(str::to_string);
                }
                _ => {
                    extra.insert(key.clone(), value.clone());
                }
            }
        }
        Metadata {
            spec_version,
            extra,
        }
    }

    fn to_json(&self) -> Value {
        let mut metadata = self.extra.clone();
        metadata.insert(
            "pactSpecification".to_string(),
            json!({"version": self.spec_version.as_deref().unwrap_or(DEFAULT_SPEC_VERSION)}),
        );
        Value::Object(metadata)
    }
}

/// A parsed contract. Immutable once loaded into a mock server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Contract {
    pub consumer: Party,
    pub provider: Party,
    pub interactions: Vec<Interaction>,
    pub metadata: Metadata,
}

impl Contract {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Contract {
            consumer: Party::new(consumer),
            provider: Party::new(provider),
            ..Contract::default()
        }
    }

    /// Parse contract text.
    pub fn from_json_str(text: &str) -> Result<Self, ContractError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ContractError::InvalidJson(e.to_string()))?;
        Contract::from_json(&value)
    }

    /// Build a contract from an already-parsed JSON document.
    pub fn from_json(value: &Value) -> Result<Self, ContractError> {
        let object = value
            .as_object()
            .ok_or_else(|| ContractError::invalid("$", "contract must be a JSON object"))?;

        let consumer = party(object, "consumer")?;
        let provider = party(object, "provider")?;

        let interactions = match object.get("interactions") {
            None | Some(Value::Null) => {
                return Err(ContractError::MissingField("interactions".to_string()))
            }
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| Interaction::from_json(&format!("interactions[{i}]"), item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ContractError::invalid(
                    "interactions",
                    "expected an array",
                ))
            }
        };

        Ok(Contract {
            consumer,
            provider,
            interactions,
            metadata: Metadata::from_json(object.get("metadata")),
        })
    }

    /// Append an interaction and return its index.
    pub fn add_interaction(&mut self, interaction: Interaction) -> usize {
        self.interactions.push(interaction);
        self.interactions.len() - 1
    }

    /// The contract as a pact file document.
    pub fn to_json(&self) -> Value {
        json!({
            "consumer": {"name": self.consumer.name},
            "provider": {"name": self.provider.name},
            "interactions": self.interactions.iter().map(Interaction::to_json).collect::<Vec<_>>(),
            "metadata": self.metadata.to_json(),
        })
    }

    /// File name of this contract's pact file: `<consumer>-<provider>.json`.
    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.consumer.name, self.provider.name)
    }

    /// Fold `other`'s interactions into this contract.
    ///
    /// Interactions already present (same description and provider state)
    /// must be identical; new ones are appended in order.
    pub fn merge(&mut self, other: &Contract) -> Result<(), ContractError> {
        if self.consumer != other.consumer || self.provider != other.provider {
            return Err(ContractError::MergeConflict(format!(
                "pact for {} -> {} can not be merged into pact for {} -> {}",
                other.consumer.name, other.provider.name, self.consumer.name, self.provider.name
            )));
        }
        for incoming in &other.interactions {
            match self.interactions.iter().find(|i| i.same_key(incoming)) {
                Some(existing) if existing.to_json() == incoming.to_json() => {}
                Some(_) => {
                    return Err(ContractError::MergeConflict(format!(
                        "interaction '{}' differs from the one already in the pact file",
                        incoming.description
                    )))
                }
                None => self.interactions.push(incoming.clone()),
            }
        }
        for (key, value) in &other.metadata.extra {
            self.metadata.extra.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

fn party(object: &Map<String, Value>, key: &str) -> Result<Party, ContractError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(Party::default()),
        Some(Value::Object(party)) => match party.get("name") {
            None | Some(Value::Null) => Ok(Party::default()),
            Some(Value::String(name)) => Ok(Party::new(name.clone())),
            Some(_) => Err(ContractError::invalid(
                format!("{key}.name"),
                "expected a string",
            )),
        },
        Some(_) => Err(ContractError::invalid(key, "expected a JSON object")),
    }
}
