use serde::{Deserialize, Serialize};

/// Dashboard counters. Field names follow the dashboard's camelCase contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub total_doctors: u64,
    pub total_bookings: u64,
    pub today_bookings: u64,
    /// Appointments still in `scheduled`.
    pub pending_bookings: u64,
    pub completed_bookings: u64,
    #[serde(rename = "totalEMRs")]
    pub total_emrs: u64,
}
