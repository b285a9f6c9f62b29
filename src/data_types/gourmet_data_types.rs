use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Opaque ids the site wants back on every write call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub username: String,
    pub shop_model_id: String,
    pub eater_id: String,
    pub staff_group_id: String,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MenuCategory {
    Menu1,
    Menu2,
    Menu3,
    SoupAndSalad,
    Unknown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub id: String,
    pub day: NaiveDate,
    pub title: String,
    pub subtitle: String,
    pub allergens: Vec<String>,
    pub available: bool,
    pub ordered: bool,
    pub category: MenuCategory,
    pub price: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OrderedMenu {
    pub position_id: String,
    pub eating_cycle_id: String,
    pub date: NaiveDateTime,
    pub title: String,
    pub subtitle: String,
    pub approved: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BillingItem {
    pub id: String,
    pub article_id: String,
    pub count: i32,
    pub description: String,
    pub total: f64,
    pub subsidy: f64,
    pub discount_value: f64,
    pub is_custom_menu: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bill {
    pub bill_nr: i64,
    pub bill_date: NaiveDateTime,
    pub location: String,
    pub items: Vec<BillingItem>,
    /// net amount after subsidy and discount
    pub billing: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GourmetMonthlyBilling {
    /// `YYYY-MM`
    pub month_key: String,
    pub bills: Vec<Bill>,
    pub total_gross: f64,
    pub total_subsidy: f64,
    pub total_discount: f64,
    pub total_billing: f64,
}

/// Something the caller wants to order.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub date: NaiveDate,
    pub menu_id: String,
}

/// Hidden per-form tokens (`ufprt` / `__ncforminfo`), must accompany every POST.
#[derive(Debug, Clone, PartialEq)]
pub struct FormTokens {
    pub csrf_token: String,
    pub anti_forgery_token: String,
}

/// Whether the orders page currently shows its cancel controls.
///
/// The site encodes this inverted: a hidden `editMode` of `"False"` means
/// edit mode is active, anything else means it is not.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EditModeState {
    InEditMode,
    NotInEditMode,
}

impl EditModeState {
    pub fn from_wire(flag: &str) -> Self {
        if flag == "False" {
            EditModeState::InEditMode
        } else {
            EditModeState::NotInEditMode
        }
    }

    /// Value to echo back when posting the toggle form.
    pub fn wire_value(self) -> &'static str {
        match self {
            EditModeState::InEditMode => "False",
            EditModeState::NotInEditMode => "True",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditModeFormData {
    pub state: EditModeState,
    pub tokens: FormTokens,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelOrderFormData {
    pub position_id: String,
    pub eating_cycle_id: String,
    /// echoed verbatim, the site keys deletion on it
    pub date: String,
    pub csrf_token: String,
    pub anti_forgery_token: Option<String>,
}

// wire types of the umbraco json endpoints

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AddToCartRequest {
    #[serde(rename = "eaterId")]
    pub eater_id: String,
    #[serde(rename = "shopModelId")]
    pub shop_model_id: String,
    #[serde(rename = "staffgroupId")]
    pub staff_group_id: String,
    pub dates: Vec<AddToCartDate>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AddToCartDate {
    /// `MM-dd-yyyy`
    pub date: String,
    #[serde(rename = "menuIds")]
    pub menu_ids: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AddToCartResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BillingRequest {
    #[serde(rename = "eaterId")]
    pub eater_id: String,
    #[serde(rename = "shopModelId")]
    pub shop_model_id: String,
    #[serde(rename = "checkLastMonthNumber")]
    pub check_last_month_number: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct BillingApiItem {
    pub id: String,
    pub article_id: String,
    pub count: i32,
    pub description: String,
    pub total: f64,
    pub subsidy: f64,
    pub discount_value: f64,
    pub is_custom_menu: bool,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct BillingApiBill {
    pub bill_nr: i64,
    pub bill_date: String,
    pub location: String,
    #[serde(default)]
    pub billing_item_info: Vec<BillingApiItem>,
    pub billing: f64,
}
