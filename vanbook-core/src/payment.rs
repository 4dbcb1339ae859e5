use serde::{Deserialize, Serialize};

/// Result reported by the slip-verification service for an uploaded bank
/// transfer slip. Only the amount check happens on our side; the slip image
/// itself is verified upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlipVerification {
    /// Where the uploaded slip image was stored.
    pub slip_file_name: String,
    /// Bank transaction reference printed on the slip.
    pub transaction_ref: String,
    /// Transferred amount in satang.
    pub amount: i32,
}

impl SlipVerification {
    /// How much is still owed, if the transfer falls short of `amount_due`.
    pub fn shortfall(&self, amount_due: i32) -> Option<i32> {
        (self.amount < amount_due).then(|| amount_due - self.amount)
    }

    pub fn covers(&self, amount_due: i32) -> bool {
        self.shortfall(amount_due).is_none()
    }
}
