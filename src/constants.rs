use std::time::Duration;

pub const GOURMET_BASE_URL: &str = "https://alaclickneu.gourmet.at";
pub const GOURMET_START_PATH: &str = "/start/";
pub const GOURMET_MENUS_PATH: &str = "/menus/";
pub const GOURMET_ORDERS_PATH: &str = "/bestellungen/";
pub const GOURMET_ADD_TO_CART_PATH: &str = "/umbraco/api/AlaCartApi/AddToMenuesCart";
pub const GOURMET_BILLING_PATH: &str = "/umbraco/api/AlaMyBillingApi/GetMyBillings";

pub const VENTOPAY_BASE_URL: &str = "https://my.ventopay.com/mocca.website";
pub const VENTOPAY_LOGIN_PATH: &str = "/Login.aspx";
pub const VENTOPAY_TRANSACTIONS_PATH: &str = "/Transaktionen.aspx";
pub const VENTOPAY_LOGOUT_PATH: &str = "/Ausloggen.aspx";
pub const VENTOPAY_COMPANY_ID: &str = "0da8d3ec-0178-47d5-9ccd-a996f04acb61";

/// Upper bound for menu pagination, the site has never shown more than a handful.
pub const MAX_MENU_PAGES: u32 = 10;

/// Both portals run on Vienna wall-clock time, order cut-offs included.
pub const SITE_TIMEZONE: chrono_tz::Tz = chrono_tz::Europe::Vienna;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// Gourmet form field names
pub const FIELD_CSRF: &str = "ufprt";
pub const FIELD_ANTI_FORGERY: &str = "__ncforminfo";
pub const FIELD_EDIT_MODE: &str = "editMode";
pub const FIELD_POSITION_ID: &str = "cp_PositionId";
pub const FIELD_EATING_CYCLE_PREFIX: &str = "cp_EatingCycleId_";
pub const FIELD_DATE_PREFIX: &str = "cp_Date_";
