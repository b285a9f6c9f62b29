use std::time::Instant;

use chrono::{Months, NaiveDate};

use crate::config::SiteConfig;
use crate::constants::{
    VENTOPAY_COMPANY_ID, VENTOPAY_LOGIN_PATH, VENTOPAY_LOGOUT_PATH, VENTOPAY_TRANSACTIONS_PATH,
};
use crate::data_backend::format_ventopay_date;
use crate::data_backend::ventopay_parser::{extract_aspnet_state, is_logged_in, parse_transactions};
use crate::data_types::ventopay_data_types::{Transaction, VentopayMonthlyBilling};
use crate::data_types::Credentials;
use crate::errors::{ClientError, Result};
use crate::http_session::{FormEncoding, HttpSession};

const SITE: &str = "Ventopay";

/// Client for the Ventopay vending / POS portal.
pub struct VentopayApi {
    session: HttpSession,
    credentials: Option<Credentials>,
    logged_in: bool,
}

impl VentopayApi {
    pub fn new(config: SiteConfig) -> Result<Self> {
        Ok(VentopayApi {
            session: HttpSession::new(config, FormEncoding::UrlEncoded)?,
            credentials: None,
            logged_in: false,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.logged_in
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let now = Instant::now();

        if self.logged_in {
            let current = self.session.get(VENTOPAY_TRANSACTIONS_PATH, &[]).await;
            if current.is_ok_and(|html| is_logged_in(&html)) {
                log::info!("{} session still active, logging out first", SITE);
                if let Err(e) = self.session.get(VENTOPAY_LOGOUT_PATH, &[]).await {
                    log::warn!("{} stale session logout failed: {}", SITE, e);
                }
            }
            self.session.reset()?;
        }
        self.logged_in = false;
        self.credentials = None;

        let login_html = self.session.get(VENTOPAY_LOGIN_PATH, &[]).await?;
        let state = extract_aspnet_state(&login_html)?;

        let mut fields = state.form_fields();
        fields.extend([
            ("DropDownList1".to_string(), VENTOPAY_COMPANY_ID.to_string()),
            ("TxtUsername".to_string(), username.to_string()),
            ("TxtPassword".to_string(), password.to_string()),
            ("BtnLogin".to_string(), "Login".to_string()),
            ("languageRadio".to_string(), "DE".to_string()),
        ]);

        let resp_html = self.session.post_form(VENTOPAY_LOGIN_PATH, &fields).await?;
        if !is_logged_in(&resp_html) {
            log::warn!("{} login rejected for {}", SITE, username);
            return Err(ClientError::LoginFailure { site: SITE });
        }

        log::info!("{} login as {} ({:.2?})", SITE, username, now.elapsed());
        self.credentials = Some(Credentials::new(username, password));
        self.logged_in = true;
        Ok(())
    }

    /// Same contract as the Gourmet variant: at most one silent re-login per fetch.
    async fn fetch_authenticated(&mut self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let html = self.session.get(path, params).await?;
        if is_logged_in(&html) {
            return Ok(html);
        }
        self.logged_in = false;

        let Some(creds) = self.credentials.clone() else {
            return Err(ClientError::SessionExpired);
        };

        log::info!("{} session expired on {}, logging in again", SITE, path);
        self.login(&creds.username, &creds.password).await?;

        let html = self.session.get(path, params).await?;
        if is_logged_in(&html) {
            Ok(html)
        } else {
            log::error!("{} session lost again right after re-login", SITE);
            self.logged_in = false;
            Err(ClientError::SessionExpired)
        }
    }

    /// Transactions between `from` and `until` (both inclusive), without
    /// Gourmet canteen bookings.
    pub async fn get_transactions(
        &mut self,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Transaction>> {
        let params = [
            ("fromDate", format_ventopay_date(from)),
            ("untilDate", format_ventopay_date(until)),
        ];
        let html = self
            .fetch_authenticated(VENTOPAY_TRANSACTIONS_PATH, &params)
            .await?;

        let transactions = parse_transactions(&html);
        log::debug!("{} transactions {} - {}", transactions.len(), from, until);
        Ok(transactions)
    }

    pub async fn get_billing_month(&mut self, year: i32, month: u32) -> Result<VentopayMonthlyBilling> {
        let invalid = || ClientError::parse(format!("invalid billing month {}-{}", year, month));
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(invalid)?;

        let transactions = self.get_transactions(first, last).await?;
        Ok(VentopayMonthlyBilling {
            year,
            month,
            total: transactions.iter().map(|t| t.amount).sum(),
            transactions,
        })
    }

    /// Best-effort remote logout; local state is always cleared.
    pub async fn logout(&mut self) -> Result<()> {
        match self.session.get(VENTOPAY_LOGOUT_PATH, &[]).await {
            Ok(_) => log::info!("{} logged out", SITE),
            Err(e) => log::warn!("{} logout failed, clearing session anyway: {}", SITE, e),
        }

        self.logged_in = false;
        self.credentials = None;
        self.session.reset()
    }
}
