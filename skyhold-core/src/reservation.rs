use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Reservation status in the booking lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Initiated,
    Pending,
    Booked,
    Cancelled,
}

impl ReservationStatus {
    /// Statuses a reservation may still leave.
    pub const OPEN: [ReservationStatus; 2] = [ReservationStatus::Initiated, ReservationStatus::Pending];

    pub fn is_terminal(self) -> bool {
        matches!(self, ReservationStatus::Booked | ReservationStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Initiated => "INITIATED",
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Booked => "BOOKED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INITIATED" => Ok(ReservationStatus::Initiated),
            "PENDING" => Ok(ReservationStatus::Pending),
            "BOOKED" => Ok(ReservationStatus::Booked),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            other => Err(format!("unknown reservation status: {}", other)),
        }
    }
}

/// Input to the booking engine, validated before any transaction opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReservation {
    pub flight_ref: String,
    pub user_ref: String,
    pub seat_count: u32,
}

impl NewReservation {
    pub fn validate(&self) -> Result<(), String> {
        if self.flight_ref.trim().is_empty() {
            return Err("flight_ref must not be empty".to_string());
        }
        if self.user_ref.trim().is_empty() {
            return Err("user_ref must not be empty".to_string());
        }
        if self.seat_count < 1 {
            return Err("seat_count must be at least 1".to_string());
        }
        Ok(())
    }
}

/// A seat-booking attempt and its lifecycle status.
///
/// `total_cost` is in minor currency units and is fixed at creation.
/// `created_at` never changes and is the only input to expiry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub id: Uuid,
    pub flight_ref: String,
    pub user_ref: String,
    pub seat_count: u32,
    pub total_cost: i64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(request: NewReservation, total_cost: i64, now: DateTime<Utc>) -> Self {
        // Postgres keeps microseconds
        let now = now.trunc_subsecs(6);
        Self {
            id: Uuid::new_v4(),
            flight_ref: request.flight_ref,
            user_ref: request.user_ref,
            seat_count: request.seat_count,
            total_cost,
            status: ReservationStatus::Initiated,
            created_at: now,
            updated_at: now,
        }
    }

    /// True once more than `window` has passed since creation.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.created_at > window
    }

    pub fn is_owned_by(&self, user_ref: &str) -> bool {
        self.user_ref == user_ref
    }
}
