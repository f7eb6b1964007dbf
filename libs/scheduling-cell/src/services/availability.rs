use chrono::{NaiveDate, NaiveTime, Timelike};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, AvailabilityCheck, Doctor, SchedulingError
};

pub struct AvailabilityCheckService {
    supabase: SupabaseClient,
}

impl AvailabilityCheckService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Check whether a doctor is free for the `[time, time + duration)` slot
    /// on `date`, scanning all non-cancelled appointments booked for that
    /// doctor on that date. Intervals are half-open: an appointment ending
    /// exactly when the candidate starts does not conflict.
    pub async fn check_availability(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: &str,
        duration_minutes: i32,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<AvailabilityCheck, SchedulingError> {
        debug!("Checking availability for doctor {} on {} at {} for {} minutes",
               doctor_id, date, time, duration_minutes);

        // Reject malformed input before touching persistence
        if duration_minutes < 1 {
            return Err(SchedulingError::ValidationError(
                format!("duration_minutes must be at least 1, got {}", duration_minutes)
            ));
        }

        let candidate_start = minutes_since_midnight(time)
            .ok_or_else(|| SchedulingError::ValidationError(
                format!("invalid time of day: {}", time)
            ))?;
        let candidate_end = candidate_start + duration_minutes;

        let doctor = self.get_doctor(doctor_id, auth_token).await?;

        let booked = self.get_doctor_appointments_for_date(
            doctor_id,
            date,
            exclude_appointment_id,
            auth_token,
        ).await?;

        debug!("Dr {} has {} booked appointments on {}", doctor.full_name(), booked.len(), date);

        for appointment in booked {
            if !self.is_blocking_appointment(&appointment.status) {
                continue;
            }

            // A stored row we cannot interpret must fail the check: silently
            // skipping it could hide a real conflict.
            let booked_start = minutes_since_midnight(&appointment.time)
                .ok_or_else(|| SchedulingError::DatabaseError(
                    format!("appointment {} has an unreadable time value: {}",
                            appointment.id, appointment.time)
                ))?;
            let booked_end = booked_start + appointment.duration_minutes;

            if intervals_overlap(candidate_start, candidate_end, booked_start, booked_end) {
                warn!("Conflict detected for doctor {}: appointment {} occupies {} for {} minutes",
                      doctor_id, appointment.id, appointment.time, appointment.duration_minutes);

                return Ok(AvailabilityCheck {
                    available: false,
                    conflicting_appointment_id: Some(appointment.id),
                });
            }
        }

        Ok(AvailabilityCheck {
            available: true,
            conflicting_appointment_id: None,
        })
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, SchedulingError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let Some(row) = result.into_iter().next() else {
            return Err(SchedulingError::DoctorNotFound);
        };

        serde_json::from_value(row)
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse doctor: {}", e)))
    }

    async fn get_doctor_appointments_for_date(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("date=eq.{}", date),
            "status=neq.cancelled".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}&order=time.asc", query_parts.join("&"));

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| SchedulingError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = result.into_iter()
            .map(|apt| serde_json::from_value(apt))
            .collect::<std::result::Result<Vec<Appointment>, _>>()
            .map_err(|e| SchedulingError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }

    fn is_blocking_appointment(&self, status: &AppointmentStatus) -> bool {
        // Only cancellation releases a slot; completed and no-show bookings
        // still occupied it for conflict purposes on the day in question.
        !matches!(status, AppointmentStatus::Cancelled)
    }
}

/// Minutes since midnight for a `"HH:MM"` 24-hour time string.
pub fn minutes_since_midnight(time: &str) -> Option<i32> {
    let parsed = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
    Some((parsed.hour() * 60 + parsed.minute()) as i32)
}

/// Half-open interval overlap: `[start1, end1)` intersects `[start2, end2)`.
pub fn intervals_overlap(start1: i32, end1: i32, start2: i32, end2: i32) -> bool {
    start1 < end2 && start2 < end1
}
