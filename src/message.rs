//! Typed telemetry message model.
//!
//! The wire carries JSON objects whose shape has drifted across client
//! protocol revisions: an early schema with no `type` discriminator, and a
//! later tagged schema with `full_update` and `control` variants. Rather than
//! probing untyped key/value maps at validation time, decoding converts each
//! payload into a typed representation up front, and validation becomes a
//! pure function over that form.
//!
//! Per-field presence and shape are modeled with the [`Field`] lattice:
//! a field is `Missing`, `Present` with the expected type, or `Invalid` with
//! whatever the client actually sent. This keeps one malformed field from
//! failing the whole decode — the validator decides what each state means.

use serde_json::Value;

/// Presence/shape state of a single message field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// Key absent from the payload.
    Missing,
    /// Key present but the value has the wrong shape; the raw value is kept
    /// for diagnostics.
    Invalid(Value),
    /// Key present with the expected type.
    Present(T),
}

impl<T> Field<T> {
    /// Whether the key was absent entirely.
    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }

    /// Whether the key was present (regardless of shape).
    pub fn is_set(&self) -> bool {
        !self.is_missing()
    }

    /// The well-typed value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// One element of a `units` array.
///
/// Units are expected to be objects; anything else is preserved so the
/// validator can report it. A unit's `position`, when present, is expected to
/// be a coordinate array.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitRecord {
    Unit {
        /// `None` when the unit carries no position at all.
        position: Option<Field<Vec<Value>>>,
    },
    NotAnObject(Value),
}

/// Periodic game-state snapshot (`type = "full_update"`).
#[derive(Debug, Clone, PartialEq)]
pub struct FullUpdate {
    pub schema_version: Field<String>,
    pub timestamp: Field<f64>,
    pub game_frame: Field<i64>,
    pub game_time: Field<f64>,
    pub is_paused: Field<bool>,
    pub game_speed: Field<f64>,
    pub teams: Field<Vec<Value>>,
    pub units: Field<Vec<UnitRecord>>,
    pub is_spectator: Field<bool>,
    pub sequence: Field<i64>,
}

/// Control event (`type = "control"`).
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub schema_version: Field<String>,
    pub timestamp: Field<f64>,
    pub action: Field<String>,
}

/// Pre-revision packet with no `type` discriminator.
#[derive(Debug, Clone, PartialEq)]
pub struct Legacy {
    pub schema_version: Field<String>,
    pub game_frame: Field<i64>,
    pub game_seconds: Field<f64>,
    pub teams: Field<Vec<Value>>,
    pub units: Field<Vec<UnitRecord>>,
}

/// Typed body of a decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageBody {
    FullUpdate(FullUpdate),
    Control(Control),
    Legacy(Legacy),
    /// `type` carried a value that is not a recognized variant name.
    Unknown { type_name: String },
}

/// One decoded application event.
///
/// Carries both the typed body (for validation and statistics) and the
/// original JSON value (for the last-message dump and revalidation paths).
/// Clones are independent; the statistics aggregator and the last-message
/// holder each keep their own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    body: MessageBody,
    raw: Value,
}

impl Message {
    /// Build the typed representation from a decoded JSON object.
    ///
    /// Returns `None` when the payload is not a JSON object — that is a
    /// decode-level failure, not a validation verdict.
    pub fn from_value(raw: Value) -> Option<Self> {
        let map = raw.as_object()?;

        let body = match map.get("type") {
            None => MessageBody::Legacy(Legacy {
                schema_version: string_field(map, "schema_version"),
                game_frame: integer_field(map, "game_frame"),
                game_seconds: number_field(map, "game_seconds"),
                teams: array_field(map, "teams"),
                units: units_field(map),
            }),
            Some(Value::String(name)) if name == "full_update" => {
                MessageBody::FullUpdate(FullUpdate {
                    schema_version: string_field(map, "schema_version"),
                    timestamp: number_field(map, "timestamp"),
                    game_frame: integer_field(map, "game_frame"),
                    game_time: number_field(map, "game_time"),
                    is_paused: bool_field(map, "is_paused"),
                    game_speed: number_field(map, "game_speed"),
                    teams: array_field(map, "teams"),
                    units: units_field(map),
                    is_spectator: bool_field(map, "is_spectator"),
                    sequence: integer_field(map, "sequence"),
                })
            }
            Some(Value::String(name)) if name == "control" => MessageBody::Control(Control {
                schema_version: string_field(map, "schema_version"),
                timestamp: number_field(map, "timestamp"),
                action: string_field(map, "action"),
            }),
            Some(Value::String(name)) => MessageBody::Unknown { type_name: name.clone() },
            Some(other) => MessageBody::Unknown { type_name: other.to_string() },
        };

        Some(Self { body, raw })
    }

    /// Typed body for validation and statistics.
    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Original decoded JSON, for dumps and diagnostics.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Stable label for per-variant statistics counters.
    pub fn variant_label(&self) -> &'static str {
        match &self.body {
            MessageBody::FullUpdate(_) => "full_update",
            MessageBody::Control(_) => "control",
            MessageBody::Legacy(_) => "legacy",
            MessageBody::Unknown { .. } => "unknown",
        }
    }

    /// The declared schema version, when one was sent.
    pub fn schema_version(&self) -> Option<&str> {
        let field = match &self.body {
            MessageBody::FullUpdate(update) => &update.schema_version,
            MessageBody::Control(control) => &control.schema_version,
            MessageBody::Legacy(legacy) => &legacy.schema_version,
            MessageBody::Unknown { .. } => return None,
        };
        field.value().map(String::as_str)
    }

    /// Number of units in a well-formed `units` array, when present.
    pub fn unit_count(&self) -> Option<usize> {
        let units = match &self.body {
            MessageBody::FullUpdate(update) => &update.units,
            MessageBody::Legacy(legacy) => &legacy.units,
            _ => return None,
        };
        units.value().map(Vec::len)
    }

    /// The `sequence` counter of a `full_update`, when well-formed.
    pub fn sequence(&self) -> Option<i64> {
        match &self.body {
            MessageBody::FullUpdate(update) => update.sequence.value().copied(),
            _ => None,
        }
    }
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Field<String> {
    match map.get(key) {
        None => Field::Missing,
        Some(Value::String(s)) => Field::Present(s.clone()),
        Some(other) => Field::Invalid(other.clone()),
    }
}

fn integer_field(map: &serde_json::Map<String, Value>, key: &str) -> Field<i64> {
    match map.get(key) {
        None => Field::Missing,
        Some(value @ Value::Number(n)) => match n.as_i64() {
            Some(i) => Field::Present(i),
            None => Field::Invalid(value.clone()),
        },
        Some(other) => Field::Invalid(other.clone()),
    }
}

fn number_field(map: &serde_json::Map<String, Value>, key: &str) -> Field<f64> {
    match map.get(key) {
        None => Field::Missing,
        Some(value @ Value::Number(n)) => match n.as_f64() {
            Some(f) => Field::Present(f),
            None => Field::Invalid(value.clone()),
        },
        Some(other) => Field::Invalid(other.clone()),
    }
}

fn bool_field(map: &serde_json::Map<String, Value>, key: &str) -> Field<bool> {
    match map.get(key) {
        None => Field::Missing,
        Some(Value::Bool(b)) => Field::Present(*b),
        Some(other) => Field::Invalid(other.clone()),
    }
}

fn array_field(map: &serde_json::Map<String, Value>, key: &str) -> Field<Vec<Value>> {
    match map.get(key) {
        None => Field::Missing,
        Some(Value::Array(items)) => Field::Present(items.clone()),
        Some(other) => Field::Invalid(other.clone()),
    }
}

fn units_field(map: &serde_json::Map<String, Value>) -> Field<Vec<UnitRecord>> {
    match map.get("units") {
        None => Field::Missing,
        Some(Value::Array(items)) => {
            let units = items
                .iter()
                .map(|item| match item {
                    Value::Object(unit) => {
                        let position = unit.get("position").map(|pos| match pos {
                            Value::Array(coords) => Field::Present(coords.clone()),
                            other => Field::Invalid(other.clone()),
                        });
                        UnitRecord::Unit { position }
                    }
                    other => UnitRecord::NotAnObject(other.clone()),
                })
                .collect();
            Field::Present(units)
        }
        Some(other) => Field::Invalid(other.clone()),
    }
}
