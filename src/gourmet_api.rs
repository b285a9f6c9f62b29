use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{Datelike, Months, NaiveDate};

use crate::config::SiteConfig;
use crate::constants::{
    FIELD_ANTI_FORGERY, FIELD_CSRF, FIELD_DATE_PREFIX, FIELD_EATING_CYCLE_PREFIX,
    FIELD_EDIT_MODE, FIELD_POSITION_ID, GOURMET_ADD_TO_CART_PATH, GOURMET_BILLING_PATH,
    GOURMET_MENUS_PATH, GOURMET_ORDERS_PATH, GOURMET_START_PATH, MAX_MENU_PAGES,
};
use crate::data_backend::billing_mapper::{map_bills, summarize_month};
use crate::data_backend::format_gourmet_date;
use crate::data_backend::gourmet_parser::{
    extract_cancel_order_form_data, extract_edit_mode_form_data, extract_login_form_tokens,
    extract_logout_form_tokens, extract_user_info, has_next_menu_page, is_logged_in,
    parse_menu_items, parse_ordered_menus,
};
use crate::data_types::gourmet_data_types::{
    AddToCartDate, AddToCartRequest, AddToCartResponse, Bill, BillingApiBill, BillingRequest,
    CartItem, EditModeFormData, EditModeState, FormTokens, GourmetMonthlyBilling, MenuItem,
    OrderedMenu, UserInfo,
};
use crate::data_types::Credentials;
use crate::errors::{ClientError, Result};
use crate::http_session::{FormEncoding, HttpSession};

const SITE: &str = "Gourmet";

fn token_fields(tokens: &FormTokens) -> [(String, String); 2] {
    [
        (FIELD_CSRF.to_string(), tokens.csrf_token.clone()),
        (FIELD_ANTI_FORGERY.to_string(), tokens.anti_forgery_token.clone()),
    ]
}

/// Client for the Gourmet cafeteria portal.
///
/// Operations take `&mut self`: one session, one request sequence at a time.
/// Interleaved edit mode toggles would leave the remote orders page in an
/// undefined state.
pub struct GourmetApi {
    session: HttpSession,
    user_info: Option<UserInfo>,
    credentials: Option<Credentials>,
}

impl GourmetApi {
    pub fn new(config: SiteConfig) -> Result<Self> {
        Ok(GourmetApi {
            session: HttpSession::new(config, FormEncoding::Multipart)?,
            user_info: None,
            credentials: None,
        })
    }

    pub fn user_info(&self) -> Option<&UserInfo> {
        self.user_info.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_info.is_some()
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<UserInfo> {
        self.user_info = None;
        self.credentials = None;

        let now = Instant::now();
        let mut start_html = self.session.get(GOURMET_START_PATH, &[]).await?;

        // leftover cookies from an earlier session, log out before starting over
        if is_logged_in(&start_html) {
            log::info!("{} session still active, logging out first", SITE);
            if let Err(e) = self.post_logout(&start_html).await {
                log::warn!("{} stale session logout failed: {}", SITE, e);
            }
            self.session.reset()?;
            start_html = self.session.get(GOURMET_START_PATH, &[]).await?;
        }

        let tokens = extract_login_form_tokens(&start_html)?;
        let mut fields = vec![
            ("Username".to_string(), username.to_string()),
            ("Password".to_string(), password.to_string()),
            ("RememberMe".to_string(), "false".to_string()),
        ];
        fields.extend(token_fields(&tokens));

        let resp_html = self.session.post_form(GOURMET_START_PATH, &fields).await?;
        if !is_logged_in(&resp_html) {
            log::warn!("{} login rejected for {}", SITE, username);
            return Err(ClientError::LoginFailure { site: SITE });
        }

        // the redirect target does not always carry the hidden ids
        let user_info = match extract_user_info(&resp_html) {
            Ok(info) => info,
            Err(_) => {
                let start_html = self.session.get(GOURMET_START_PATH, &[]).await?;
                extract_user_info(&start_html)?
            }
        };

        log::info!("{} login as {} ({:.2?})", SITE, user_info.username, now.elapsed());
        self.user_info = Some(user_info.clone());
        self.credentials = Some(Credentials::new(username, password));
        Ok(user_info)
    }

    /// GETs `path` and makes sure the page belongs to a live session.
    ///
    /// A logged out page triggers one silent re-login with the remembered
    /// credentials and one refetch. Without credentials, or if the refetch is
    /// still logged out, the session is gone for good.
    async fn fetch_authenticated(&mut self, path: &str, params: &[(&str, String)]) -> Result<String> {
        let html = self.session.get(path, params).await?;
        if is_logged_in(&html) {
            return Ok(html);
        }

        let Some(creds) = self.credentials.clone() else {
            self.user_info = None;
            return Err(ClientError::SessionExpired);
        };

        log::info!("{} session expired on {}, logging in again", SITE, path);
        self.login(&creds.username, &creds.password).await?;

        let html = self.session.get(path, params).await?;
        if is_logged_in(&html) {
            Ok(html)
        } else {
            log::error!("{} session lost again right after re-login", SITE);
            Err(ClientError::SessionExpired)
        }
    }

    /// All menu items across the paginated menus listing, in page order.
    pub async fn get_menus(&mut self) -> Result<Vec<MenuItem>> {
        let now = Instant::now();
        let mut items = Vec::new();

        for page in 0..MAX_MENU_PAGES {
            let params = match page {
                0 => Vec::new(),
                n => vec![("page", n.to_string())],
            };
            let html = self.fetch_authenticated(GOURMET_MENUS_PATH, &params).await?;

            if self.user_info.is_none() {
                match extract_user_info(&html) {
                    Ok(info) => self.user_info = Some(info),
                    Err(e) => log::debug!("no user info on menus page {}: {}", page, e),
                }
            }

            items.extend(parse_menu_items(&html));
            if !has_next_menu_page(&html) {
                break;
            }
            if page + 1 == MAX_MENU_PAGES {
                log::warn!("{} menus still paginated after {} pages", SITE, MAX_MENU_PAGES);
            }
        }

        log::debug!("fetched {} menu items ({:.2?})", items.len(), now.elapsed());
        Ok(items)
    }

    pub async fn get_orders(&mut self) -> Result<Vec<OrderedMenu>> {
        let html = self.fetch_authenticated(GOURMET_ORDERS_PATH, &[]).await?;
        Ok(parse_ordered_menus(&html))
    }

    /// Puts menus into the cart, one batch of menu ids per day.
    ///
    /// Orders stay unconfirmed until [`GourmetApi::confirm_orders`] runs.
    pub async fn add_to_cart(&mut self, items: &[CartItem]) -> Result<()> {
        let user_info = self.user_info.clone().ok_or(ClientError::NotLoggedIn)?;
        if items.is_empty() {
            return Ok(());
        }

        let mut by_day: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
        for item in items {
            by_day.entry(item.date).or_default().push(item.menu_id.clone());
        }

        let request = AddToCartRequest {
            eater_id: user_info.eater_id,
            shop_model_id: user_info.shop_model_id,
            staff_group_id: user_info.staff_group_id,
            dates: by_day
                .into_iter()
                .map(|(day, menu_ids)| AddToCartDate {
                    date: format_gourmet_date(day),
                    menu_ids,
                })
                .collect(),
        };

        let resp: AddToCartResponse = self
            .session
            .post_json(GOURMET_ADD_TO_CART_PATH, &request)
            .await?;
        if !resp.success {
            let message = resp.message.unwrap_or_else(|| "unknown error".to_string());
            log::warn!("{} rejected cart: {}", SITE, message);
            return Err(ClientError::CartFailure(message));
        }

        log::info!("added {} menus for {} days to cart", items.len(), request.dates.len());
        Ok(())
    }

    async fn post_edit_mode_toggle(&mut self, form: &EditModeFormData) -> Result<String> {
        let mut fields = vec![(
            FIELD_EDIT_MODE.to_string(),
            form.state.wire_value().to_string(),
        )];
        fields.extend(token_fields(&form.tokens));
        self.session.post_form(GOURMET_ORDERS_PATH, &fields).await
    }

    /// Confirms pending orders by leaving edit mode. A no-op when the orders
    /// page is not in edit mode.
    pub async fn confirm_orders(&mut self) -> Result<()> {
        let html = self.fetch_authenticated(GOURMET_ORDERS_PATH, &[]).await?;
        let form = extract_edit_mode_form_data(&html)?;

        match form.state {
            EditModeState::InEditMode => {
                self.post_edit_mode_toggle(&form).await?;
                log::info!("{} orders confirmed", SITE);
            }
            EditModeState::NotInEditMode => log::debug!("orders already confirmed"),
        }
        Ok(())
    }

    /// Cancels the given order positions.
    ///
    /// Enters edit mode first (verified by a refetch), cancels position by
    /// position on freshly fetched pages and leaves edit mode again, also
    /// when a cancellation failed halfway.
    pub async fn cancel_orders(&mut self, position_ids: &[String]) -> Result<()> {
        let mut html = self.fetch_authenticated(GOURMET_ORDERS_PATH, &[]).await?;
        let form = extract_edit_mode_form_data(&html)?;

        if form.state == EditModeState::NotInEditMode {
            self.post_edit_mode_toggle(&form).await?;
            // the POST redirect does not reliably reflect the new state
            html = self.fetch_authenticated(GOURMET_ORDERS_PATH, &[]).await?;
            if extract_edit_mode_form_data(&html)?.state != EditModeState::InEditMode {
                log::error!("{} orders page did not switch to edit mode", SITE);
                return Err(ClientError::EditModeTransition);
            }
            log::info!("{} entered edit mode", SITE);
        }

        let outcome = self.cancel_positions(&mut html, position_ids).await;
        if let Err(e) = &outcome {
            log::warn!("cancelling orders failed, leaving edit mode: {}", e);
            html = match self.session.get(GOURMET_ORDERS_PATH, &[]).await {
                Ok(html) => html,
                Err(refetch_err) => {
                    log::warn!("could not refetch orders page: {}", refetch_err);
                    return outcome;
                }
            };
        }

        let exited = self.leave_edit_mode(&html).await;
        match outcome {
            Err(e) => {
                if let Err(exit_err) = exited {
                    log::warn!("could not leave edit mode: {}", exit_err);
                }
                Err(e)
            }
            Ok(()) => exited,
        }
    }

    /// One POST per position, each followed by a fresh GET; cancelling
    /// invalidates the tokens of every other form on the page.
    async fn cancel_positions(&mut self, html: &mut String, position_ids: &[String]) -> Result<()> {
        for position_id in position_ids {
            let form = extract_cancel_order_form_data(html.as_str(), position_id)?;

            let mut fields = vec![
                (FIELD_POSITION_ID.to_string(), form.position_id.clone()),
                (
                    format!("{}{}", FIELD_EATING_CYCLE_PREFIX, position_id),
                    form.eating_cycle_id,
                ),
                (format!("{}{}", FIELD_DATE_PREFIX, position_id), form.date),
                (FIELD_CSRF.to_string(), form.csrf_token),
            ];
            if let Some(anti_forgery) = form.anti_forgery_token {
                fields.push((FIELD_ANTI_FORGERY.to_string(), anti_forgery));
            }

            self.session.post_form(GOURMET_ORDERS_PATH, &fields).await?;
            log::info!("{} cancelled order position {}", SITE, position_id);

            *html = self.fetch_authenticated(GOURMET_ORDERS_PATH, &[]).await?;
        }
        Ok(())
    }

    async fn leave_edit_mode(&mut self, html: &str) -> Result<()> {
        let form = extract_edit_mode_form_data(html)?;
        if form.state == EditModeState::InEditMode {
            self.post_edit_mode_toggle(&form).await?;
            log::info!("{} left edit mode", SITE);
        }
        Ok(())
    }

    /// Bills of the month `month_offset` months back, 0 being the current one.
    pub async fn get_billings(&mut self, month_offset: u32) -> Result<Vec<Bill>> {
        if self.user_info.is_none() {
            return Err(ClientError::NotLoggedIn);
        }

        // session check, a dead session answers the json api with a login page
        self.fetch_authenticated(GOURMET_START_PATH, &[]).await?;
        let user_info = self.user_info.clone().ok_or(ClientError::NotLoggedIn)?;

        let request = BillingRequest {
            eater_id: user_info.eater_id,
            shop_model_id: user_info.shop_model_id,
            check_last_month_number: month_offset.to_string(),
        };
        let raw: Vec<BillingApiBill> = self.session.post_json(GOURMET_BILLING_PATH, &request).await?;

        log::debug!("{} bills for month offset {}", raw.len(), month_offset);
        map_bills(raw)
    }

    /// Bills and totals of the month lying `month_offset` months before `today`.
    pub async fn get_billing_month(
        &mut self,
        month_offset: u32,
        today: NaiveDate,
    ) -> Result<GourmetMonthlyBilling> {
        let month_start = today
            .with_day(1)
            .and_then(|first| first.checked_sub_months(Months::new(month_offset)))
            .ok_or_else(|| ClientError::parse(format!("month offset {} out of range", month_offset)))?;

        let bills = self.get_billings(month_offset).await?;
        Ok(summarize_month(month_start.year(), month_start.month(), bills))
    }

    async fn post_logout(&mut self, html: &str) -> Result<()> {
        let tokens = extract_logout_form_tokens(html)?;
        self.session
            .post_form(GOURMET_START_PATH, &token_fields(&tokens))
            .await?;
        Ok(())
    }

    /// Best-effort remote logout; local state is always cleared.
    pub async fn logout(&mut self) -> Result<()> {
        let remote = match self.session.get(GOURMET_START_PATH, &[]).await {
            Ok(html) => self.post_logout(&html).await,
            Err(e) => Err(e),
        };
        match remote {
            Ok(()) => log::info!("{} logged out", SITE),
            Err(e) => log::warn!("{} logout failed, clearing session anyway: {}", SITE, e),
        }

        self.user_info = None;
        self.credentials = None;
        self.session.reset()
    }
}
