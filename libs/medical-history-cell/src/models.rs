// libs/medical-history-cell/src/models.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};
use std::fmt;

// ==============================================================================
// TIMELINE VIEW MODELS
// ==============================================================================

/// One displayable clinical event in a patient's history view. Constructed
/// fresh on every aggregation call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Stable per source record: `"<kind>-<source_id>"`, report sub-entries
    /// get an extra `-<sub>` segment.
    pub id: String,
    pub kind: TimelineKind,
    pub date: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub source_ref: SourceRef,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Consultation,
    Prescription,
    Radio,
    Operation,
}

impl fmt::Display for TimelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineKind::Consultation => write!(f, "consultation"),
            TimelineKind::Prescription => write!(f, "prescription"),
            TimelineKind::Radio => write!(f, "radio"),
            TimelineKind::Operation => write!(f, "operation"),
        }
    }
}

/// Pointer back to the originating record for drill-down.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub record: String,
    pub id: Uuid,
}

// ==============================================================================
// TIMELINE FILTER MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimelineFilter {
    pub kind: Option<TimelineKindFilter>,
    pub search: Option<String>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKindFilter {
    All,
    Consultation,
    Prescription,
    Radio,
    Operation,
}

impl TimelineKindFilter {
    pub fn matches(&self, kind: TimelineKind) -> bool {
        match self {
            TimelineKindFilter::All => true,
            TimelineKindFilter::Consultation => kind == TimelineKind::Consultation,
            TimelineKindFilter::Prescription => kind == TimelineKind::Prescription,
            TimelineKindFilter::Radio => kind == TimelineKind::Radio,
            TimelineKindFilter::Operation => kind == TimelineKind::Operation,
        }
    }
}

// ==============================================================================
// PERSISTED RECORD SHAPES
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

/// Appointment row as returned for a patient, with the nested doctor
/// reference and the radio/operation join collections embedded by the
/// persistence layer.
#[derive(Debug, Clone, Deserialize)]
pub struct PatientAppointmentRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub diagnosis: Option<String>,
    pub consultation_notes: Option<String>,
    /// Embedded report blob, kept raw here; parsed soft by the aggregator.
    pub consultation_reports: Option<Value>,
    pub prescription_id: Option<Uuid>,
    pub doctor: Option<DoctorSummary>,
    #[serde(default)]
    pub radios: Vec<RadioResultRecord>,
    #[serde(default)]
    pub operations: Vec<OperationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl DoctorSummary {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One free-form clinical note embedded within an appointment. All fields
/// are optional on the wire; a report missing its own date inherits the
/// appointment's.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsultationReport {
    pub id: Option<Uuid>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RadioResultRecord {
    pub id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub radio_type: Option<String>,
    pub result: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationRecord {
    pub id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub name: Option<String>,
    pub notes: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Standalone per-patient medical record carrying radio/operation rows not
/// tied to a specific appointment.
#[derive(Debug, Clone, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub radios: Vec<RadioResultRecord>,
    #[serde(default)]
    pub operations: Vec<OperationRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    #[serde(default)]
    pub medications: Vec<Medication>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Medication {
    pub name: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub duration: Option<String>,
}

impl Medication {
    /// `"<name> - <dosage> <frequency> pendant <duration>"`; a medication
    /// with no name renders as `"Médicament"`.
    pub fn summary_line(&self) -> String {
        let name = self.name.as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Médicament");

        format!("{} - {} {} pendant {}",
                name,
                self.dosage.as_deref().unwrap_or(""),
                self.frequency.as_deref().unwrap_or(""),
                self.duration.as_deref().unwrap_or(""))
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum MedicalHistoryError {
    #[error("Patient not found")]
    PatientNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
