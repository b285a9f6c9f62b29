use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One vending machine / POS booking.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDateTime,
    pub amount: f64,
    pub restaurant: String,
    pub location: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VentopayMonthlyBilling {
    pub year: i32,
    pub month: u32,
    pub transactions: Vec<Transaction>,
    pub total: f64,
}

/// Hidden ASP.NET postback fields; the first three are usually empty but
/// still have to be posted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AspNetState {
    pub last_focus: String,
    pub event_target: String,
    pub event_argument: String,
    pub view_state: String,
    pub view_state_generator: String,
    pub event_validation: String,
}

impl AspNetState {
    /// Form fields in the order a browser submits them.
    pub fn form_fields(&self) -> Vec<(String, String)> {
        vec![
            ("__LASTFOCUS".to_string(), self.last_focus.clone()),
            ("__EVENTTARGET".to_string(), self.event_target.clone()),
            ("__EVENTARGUMENT".to_string(), self.event_argument.clone()),
            ("__VIEWSTATE".to_string(), self.view_state.clone()),
            ("__VIEWSTATEGENERATOR".to_string(), self.view_state_generator.clone()),
            ("__EVENTVALIDATION".to_string(), self.event_validation.clone()),
        ]
    }
}
