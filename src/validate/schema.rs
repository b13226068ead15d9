//! Structural and type validation against the telemetry schema.
//!
//! The schema has two generations. The legacy (untagged) packet requires
//! `game_frame`, `game_seconds`, `teams`, and `units`, each absence reported
//! as its own error. The tagged transmission-protocol packets (`full_update`,
//! `control`) each carry a fixed required field set, and all missing names
//! are aggregated into a single error so one truncated packet produces one
//! diagnostic, not eleven.
//!
//! Version drift is tolerated by design: a missing `schema_version` is a
//! warning, a mismatched one is a warning, and only structural breakage is
//! an error. Malformed `position` values inside units degrade to a counted
//! warning rather than failing the whole packet.

use crate::message::{Field, FullUpdate, Legacy, Message, MessageBody, UnitRecord};
use crate::validate::ValidationVerdict;

/// Required field names for a `full_update` packet.
const FULL_UPDATE_REQUIRED: &[&str] = &[
    "type",
    "schema_version",
    "timestamp",
    "game_frame",
    "game_time",
    "is_paused",
    "game_speed",
    "teams",
    "units",
    "is_spectator",
    "sequence",
];

/// Required field names for a `control` packet.
const CONTROL_REQUIRED: &[&str] = &["type", "schema_version", "timestamp", "action"];

/// Required field names for a legacy (untagged) packet.
const LEGACY_REQUIRED: &[&str] = &["game_frame", "game_seconds", "teams", "units"];

/// Stateful schema validator for one harness.
///
/// Validation itself is pure over the typed message; the state is bookkeeping
/// for downstream reporting: the last schema version a client declared and
/// the last message that validated clean.
#[derive(Debug)]
pub struct SchemaValidator {
    accepted_version: String,
    last_schema_version: Option<String>,
    last_known_good: Option<Message>,
}

impl SchemaValidator {
    pub fn new(accepted_version: impl Into<String>) -> Self {
        Self {
            accepted_version: accepted_version.into(),
            last_schema_version: None,
            last_known_good: None,
        }
    }

    /// Last schema version any client declared, valid packet or not.
    pub fn last_schema_version(&self) -> Option<&str> {
        self.last_schema_version.as_deref()
    }

    /// Last message that validated with zero errors.
    pub fn last_known_good(&self) -> Option<&Message> {
        self.last_known_good.as_ref()
    }

    /// Validate one message, retaining it as last-known-good on a clean pass.
    pub fn validate(&mut self, message: &Message) -> ValidationVerdict {
        let verdict = self.evaluate(message);

        if let Some(version) = message.schema_version() {
            self.last_schema_version = Some(version.to_string());
        }
        if verdict.passed() {
            self.last_known_good = Some(message.clone());
        }

        verdict
    }

    /// Pure evaluation without side effects; used by the revalidation path.
    pub fn evaluate(&self, message: &Message) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::default();

        match message.body() {
            MessageBody::Legacy(legacy) => self.check_legacy(legacy, &mut verdict),
            MessageBody::FullUpdate(update) => self.check_full_update(update, &mut verdict),
            MessageBody::Control(control) => {
                let missing: Vec<&str> = [
                    ("schema_version", control.schema_version.is_missing()),
                    ("timestamp", control.timestamp.is_missing()),
                    ("action", control.action.is_missing()),
                ]
                .iter()
                .filter(|(_, missing)| *missing)
                .map(|(name, _)| *name)
                .collect();
                push_aggregate_missing(&missing, CONTROL_REQUIRED, &mut verdict);
                self.check_version(&control.schema_version, &mut verdict);
            }
            MessageBody::Unknown { type_name } => {
                verdict.errors.push(format!("Unrecognized message type: {type_name}"));
            }
        }

        verdict
    }

    fn check_legacy(&self, legacy: &Legacy, verdict: &mut ValidationVerdict) {
        for (name, missing) in [
            ("game_frame", legacy.game_frame.is_missing()),
            ("game_seconds", legacy.game_seconds.is_missing()),
            ("teams", legacy.teams.is_missing()),
            ("units", legacy.units.is_missing()),
        ] {
            if missing {
                verdict.errors.push(format!("Missing required field: {name}"));
            }
        }

        self.check_version(&legacy.schema_version, verdict);

        if matches!(legacy.game_frame, Field::Invalid(_)) {
            verdict.errors.push("game_frame must be integer".to_string());
        }
        if matches!(legacy.game_seconds, Field::Invalid(_)) {
            verdict.errors.push("game_seconds must be number".to_string());
        }
        check_units(&legacy.units, verdict);
    }

    fn check_full_update(&self, update: &FullUpdate, verdict: &mut ValidationVerdict) {
        // `type` is inherently present on a tagged variant
        let missing: Vec<&str> = [
            ("schema_version", update.schema_version.is_missing()),
            ("timestamp", update.timestamp.is_missing()),
            ("game_frame", update.game_frame.is_missing()),
            ("game_time", update.game_time.is_missing()),
            ("is_paused", update.is_paused.is_missing()),
            ("game_speed", update.game_speed.is_missing()),
            ("teams", update.teams.is_missing()),
            ("units", update.units.is_missing()),
            ("is_spectator", update.is_spectator.is_missing()),
            ("sequence", update.sequence.is_missing()),
        ]
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| *name)
        .collect();
        push_aggregate_missing(&missing, FULL_UPDATE_REQUIRED, verdict);

        self.check_version(&update.schema_version, verdict);

        if matches!(update.game_frame, Field::Invalid(_)) {
            verdict.errors.push("game_frame must be integer".to_string());
        }
        if matches!(update.game_time, Field::Invalid(_)) {
            verdict.errors.push("game_time must be number".to_string());
        }
        check_units(&update.units, verdict);
    }

    fn check_version(&self, version: &Field<String>, verdict: &mut ValidationVerdict) {
        match version {
            Field::Missing => {
                verdict.warnings.push("Schema version not specified".to_string());
            }
            Field::Invalid(_) => {
                verdict.warnings.push("Schema version is not a string".to_string());
            }
            Field::Present(declared) if *declared != self.accepted_version => {
                verdict.warnings.push(format!(
                    "Schema version mismatch: expected {}, got {declared}",
                    self.accepted_version
                ));
            }
            Field::Present(_) => {}
        }
    }
}

fn push_aggregate_missing(missing: &[&str], required: &[&str], verdict: &mut ValidationVerdict) {
    if missing.is_empty() {
        return;
    }
    debug_assert!(missing.iter().all(|name| required.contains(name)));
    verdict.errors.push(format!("Missing required fields: {}", missing.join(", ")));
}

fn check_units(units: &Field<Vec<UnitRecord>>, verdict: &mut ValidationVerdict) {
    match units {
        Field::Missing => {}
        Field::Invalid(_) => {
            verdict.errors.push("units must be array".to_string());
        }
        Field::Present(records) => {
            let mut invalid_positions = 0usize;
            for record in records {
                match record {
                    UnitRecord::NotAnObject(_) => {
                        verdict.errors.push("Unit must be object".to_string());
                    }
                    UnitRecord::Unit { position: Some(Field::Invalid(_)) } => {
                        invalid_positions += 1;
                    }
                    UnitRecord::Unit { .. } => {}
                }
            }
            if invalid_positions > 0 {
                verdict
                    .warnings
                    .push(format!("{invalid_positions} units with invalid positions"));
            }
        }
    }
}
