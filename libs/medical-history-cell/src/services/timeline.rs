use std::collections::HashSet;

use chrono::{DateTime, Utc, NaiveDate};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    ConsultationReport, Medication, MedicalHistoryError, MedicalRecord, OperationRecord,
    Patient, PatientAppointmentRecord, Prescription, RadioResultRecord, SourceRef,
    TimelineEntry, TimelineFilter, TimelineKind,
};

pub struct MedicalHistoryService {
    supabase: SupabaseClient,
}

impl MedicalHistoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Aggregate a patient's consultations, prescriptions, radio results and
    /// operations into one normalized list, deduplicated by source record
    /// and sorted by date descending (stable for equal dates).
    pub async fn build_timeline(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<TimelineEntry>, MedicalHistoryError> {
        debug!("Building medical timeline for patient {}", patient_id);

        self.get_patient(patient_id, auth_token).await?;

        let appointments = self.get_patient_appointments(patient_id, auth_token).await?;

        let mut entries = Vec::new();

        for appointment in &appointments {
            self.collect_appointment_entries(appointment, &mut entries, auth_token).await?;
        }

        if let Some(record) = self.get_patient_medical_record(patient_id, auth_token).await? {
            collect_medical_record_entries(&record, &mut entries);
        }

        dedup_by_source(&mut entries);

        // Stable: entries sharing a date keep their emission order
        entries.sort_by(|a, b| b.date.cmp(&a.date));

        debug!("Timeline for patient {} has {} entries", patient_id, entries.len());
        Ok(entries)
    }

    // ==============================================================================
    // ENTRY COLLECTION
    // ==============================================================================

    async fn collect_appointment_entries(
        &self,
        appointment: &PatientAppointmentRecord,
        entries: &mut Vec<TimelineEntry>,
        auth_token: &str,
    ) -> Result<(), MedicalHistoryError> {
        let appointment_date = start_of_day(appointment.date);

        let diagnosis = appointment.diagnosis.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let notes = appointment.consultation_notes.as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        if diagnosis.is_some() || notes.is_some() {
            let description = match (notes, &appointment.doctor) {
                (Some(notes), _) => notes.to_string(),
                (None, Some(doctor)) => format!("Consultation with Dr {}", doctor.full_name()),
                (None, None) => String::new(),
            };

            entries.push(TimelineEntry {
                id: format!("consultation-{}", appointment.id),
                kind: TimelineKind::Consultation,
                date: appointment_date,
                title: diagnosis.unwrap_or("Consultation").to_string(),
                description,
                source_ref: SourceRef {
                    record: "appointments".to_string(),
                    id: appointment.id,
                },
            });
        }

        for (index, report) in parse_consultation_reports(appointment).into_iter().enumerate() {
            let sub = report.id
                .map(|id| id.to_string())
                .unwrap_or_else(|| index.to_string());

            entries.push(TimelineEntry {
                id: format!("consultation-{}-{}", appointment.id, sub),
                kind: TimelineKind::Consultation,
                date: report.date.map(start_of_day).unwrap_or(appointment_date),
                title: report.title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or("Consultation report")
                    .to_string(),
                description: report.content.unwrap_or_default(),
                source_ref: SourceRef {
                    record: "appointments".to_string(),
                    id: appointment.id,
                },
            });
        }

        if let Some(prescription_id) = appointment.prescription_id {
            match self.get_prescription_with_medications(prescription_id, auth_token).await? {
                Some(prescription) => {
                    entries.push(TimelineEntry {
                        id: format!("prescription-{}", prescription.id),
                        kind: TimelineKind::Prescription,
                        date: appointment_date,
                        title: "Prescription".to_string(),
                        description: prescription.medications.iter()
                            .map(Medication::summary_line)
                            .collect::<Vec<_>>()
                            .join("; "),
                        source_ref: SourceRef {
                            record: "prescriptions".to_string(),
                            id: prescription.id,
                        },
                    });
                },
                None => {
                    warn!("Skipping dangling prescription {} on appointment {}",
                          prescription_id, appointment.id);
                },
            }
        }

        for radio in &appointment.radios {
            entries.push(radio_entry(radio, radio.date.map(start_of_day).unwrap_or(appointment_date)));
        }

        for operation in &appointment.operations {
            entries.push(operation_entry(operation, operation.date.map(start_of_day).unwrap_or(appointment_date)));
        }

        Ok(())
    }

    // ==============================================================================
    // PERSISTENCE LOOKUPS
    // ==============================================================================

    async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, MedicalHistoryError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| MedicalHistoryError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(MedicalHistoryError::PatientNotFound);
        };

        serde_json::from_value(row)
            .map_err(|e| MedicalHistoryError::DatabaseError(format!("Failed to parse patient: {}", e)))
    }

    async fn get_patient_appointments(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<PatientAppointmentRecord>, MedicalHistoryError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&select=*,doctor:doctors(id,first_name,last_name),radios:radio_results(*),operations:operations(*)&order=date.desc",
            patient_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| MedicalHistoryError::DatabaseError(e.to_string()))?;

        let appointments: Vec<PatientAppointmentRecord> = result.into_iter()
            .map(|apt| serde_json::from_value(apt))
            .collect::<std::result::Result<Vec<PatientAppointmentRecord>, _>>()
            .map_err(|e| MedicalHistoryError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }

    async fn get_patient_medical_record(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<MedicalRecord>, MedicalHistoryError> {
        let path = format!(
            "/rest/v1/medical_records?patient_id=eq.{}&select=*,radios:radio_results(*),operations:operations(*)",
            patient_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| MedicalHistoryError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Ok(None);
        };

        let record: MedicalRecord = serde_json::from_value(row)
            .map_err(|e| MedicalHistoryError::DatabaseError(format!("Failed to parse medical record: {}", e)))?;

        Ok(Some(record))
    }

    async fn get_prescription_with_medications(
        &self,
        prescription_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Prescription>, MedicalHistoryError> {
        let path = format!(
            "/rest/v1/prescriptions?id=eq.{}&select=*,medications(*)",
            prescription_id
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| MedicalHistoryError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Ok(None);
        };

        let prescription: Prescription = serde_json::from_value(row)
            .map_err(|e| MedicalHistoryError::DatabaseError(format!("Failed to parse prescription: {}", e)))?;

        Ok(Some(prescription))
    }
}

/// Apply the UI-side filters to an already built timeline. Pure, no I/O;
/// filters compose with AND and applying the same filter twice is a no-op.
pub fn filter_timeline(entries: Vec<TimelineEntry>, filter: &TimelineFilter) -> Vec<TimelineEntry> {
    let search = filter.search.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    // Inclusive bounds over the whole calendar day on each side
    let range_start = filter.date_start.map(start_of_day);
    let range_end = filter.date_end.map(end_of_day);

    entries.into_iter()
        .filter(|entry| filter.kind.map_or(true, |kind| kind.matches(entry.kind)))
        .filter(|entry| search.as_deref().map_or(true, |needle| {
            entry.title.to_lowercase().contains(needle)
                || entry.description.to_lowercase().contains(needle)
        }))
        .filter(|entry| range_start.map_or(true, |start| entry.date >= start))
        .filter(|entry| range_end.map_or(true, |end| entry.date <= end))
        .collect()
}

// ==============================================================================
// PRIVATE HELPERS
// ==============================================================================

fn collect_medical_record_entries(record: &MedicalRecord, entries: &mut Vec<TimelineEntry>) {
    // Appointment-tied rows are emitted through their appointment, with the
    // appointment's date as fallback; only the standalone ones belong here.
    let fallback = record.created_at;

    for radio in record.radios.iter().filter(|r| r.appointment_id.is_none()) {
        entries.push(radio_entry(radio, radio.date.map(start_of_day).unwrap_or(fallback)));
    }

    for operation in record.operations.iter().filter(|o| o.appointment_id.is_none()) {
        entries.push(operation_entry(operation, operation.date.map(start_of_day).unwrap_or(fallback)));
    }
}

fn radio_entry(radio: &RadioResultRecord, date: DateTime<Utc>) -> TimelineEntry {
    TimelineEntry {
        id: format!("radio-{}", radio.id),
        kind: TimelineKind::Radio,
        date,
        title: radio.radio_type.as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or("Radio")
            .to_string(),
        description: radio.result.clone().unwrap_or_default(),
        source_ref: SourceRef {
            record: "radio_results".to_string(),
            id: radio.id,
        },
    }
}

fn operation_entry(operation: &OperationRecord, date: DateTime<Utc>) -> TimelineEntry {
    TimelineEntry {
        id: format!("operation-{}", operation.id),
        kind: TimelineKind::Operation,
        date,
        title: operation.name.as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Operation")
            .to_string(),
        description: operation.notes.clone().unwrap_or_default(),
        source_ref: SourceRef {
            record: "operations".to_string(),
            id: operation.id,
        },
    }
}

/// Soft parse of the embedded report blob. The column may hold the array
/// directly or a stringified form of it; anything unreadable drops only the
/// report-derived entries of this appointment.
fn parse_consultation_reports(appointment: &PatientAppointmentRecord) -> Vec<ConsultationReport> {
    let Some(raw) = &appointment.consultation_reports else {
        return Vec::new();
    };

    let parsed = match raw {
        Value::Null => return Vec::new(),
        Value::String(text) => serde_json::from_str::<Vec<ConsultationReport>>(text),
        other => serde_json::from_value(other.clone()),
    };

    match parsed {
        Ok(reports) => reports,
        Err(e) => {
            warn!("Skipping malformed consultation reports on appointment {}: {}",
                  appointment.id, e);
            Vec::new()
        },
    }
}

fn dedup_by_source(entries: &mut Vec<TimelineEntry>) {
    let mut seen = HashSet::new();
    entries.retain(|entry| seen.insert(entry.id.clone()));
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59).unwrap().and_utc()
}
