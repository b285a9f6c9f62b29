use std::time::Instant;

use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use selectors::attr::CaseSensitivity;
use static_init::dynamic;

use crate::constants::{
    FIELD_ANTI_FORGERY, FIELD_CSRF, FIELD_DATE_PREFIX, FIELD_EATING_CYCLE_PREFIX,
    FIELD_EDIT_MODE, FIELD_POSITION_ID,
};
use crate::data_backend::{
    direct_text, find_input, full_text, input_value, parse_gourmet_date, parse_gourmet_order_date,
    site_now,
};
use crate::data_types::gourmet_data_types::{
    CancelOrderFormData, EditModeFormData, EditModeState, FormTokens, MenuCategory, MenuItem,
    OrderedMenu, UserInfo,
};
use crate::errors::{ClientError, Result};

const SOUP_SALAD_PATTERN: &str = "SUPPE & SALAT";

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn tokens_in(form: Option<ElementRef<'_>>, context: &str) -> Result<FormTokens> {
    let csrf_token = form
        .and_then(|f| non_empty(input_value(f, FIELD_CSRF)))
        .ok_or_else(|| ClientError::parse(format!("Could not find ufprt in form: {}", context)))?;
    let anti_forgery_token = form
        .and_then(|f| non_empty(input_value(f, FIELD_ANTI_FORGERY)))
        .ok_or_else(|| {
            ClientError::parse(format!("Could not find __ncforminfo in form: {}", context))
        })?;

    Ok(FormTokens {
        csrf_token,
        anti_forgery_token,
    })
}

/// Pulls `ufprt` and `__ncforminfo` out of the first form matching `form_selector`.
pub fn extract_form_tokens(html: &str, form_selector: &str) -> Result<FormTokens> {
    let selector = Selector::parse(form_selector)
        .map_err(|e| ClientError::parse(format!("bad selector '{}': {:?}", form_selector, e)))?;
    let document = Html::parse_document(html);
    tokens_in(document.select(&selector).next(), form_selector)
}

/// The login form is the first form on the start page.
pub fn extract_login_form_tokens(html: &str) -> Result<FormTokens> {
    extract_form_tokens(html, "form")
}

/// Any one marker is enough, the templates expose different subsets.
pub fn is_logged_in(html: &str) -> bool {
    html.contains("/einstellungen/")
        || html.contains("btnHeaderLogout")
        || html.contains(r#"class="loginname""#)
        || html.contains(r#"id="eater""#)
}

pub fn extract_user_info(html: &str) -> Result<UserInfo> {
    #[dynamic]
    static SHOP_MODEL: Selector = Selector::parse("#shopModel").unwrap();
    #[dynamic]
    static EATER: Selector = Selector::parse("#eater").unwrap();
    #[dynamic]
    static STAFF_GROUP: Selector = Selector::parse("#staffGroup").unwrap();
    #[dynamic]
    static LOGIN_NAME: Selector = Selector::parse("span.loginname").unwrap();

    let document = Html::parse_document(html);
    let value_of = |sel: &Selector| {
        document
            .select(sel)
            .next()
            .and_then(|el| el.value().attr("value"))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    match (value_of(&*SHOP_MODEL), value_of(&*EATER), value_of(&*STAFF_GROUP)) {
        (Some(shop_model_id), Some(eater_id), Some(staff_group_id)) => Ok(UserInfo {
            username: document
                .select(&LOGIN_NAME)
                .next()
                .map(full_text)
                .unwrap_or_default(),
            shop_model_id,
            eater_id,
            staff_group_id,
        }),
        _ => Err(ClientError::parse("Could not extract user info from page")),
    }
}

pub fn detect_category(title: &str) -> MenuCategory {
    #[dynamic]
    static RE: Regex = Regex::new(r"(?i)MEN(?:Ü|ü|U)\s+(I{1,3})").unwrap();

    if title.contains(SOUP_SALAD_PATTERN) {
        return MenuCategory::SoupAndSalad;
    }

    match RE.captures(title).and_then(|caps| caps.get(1)).map(|m| m.len()) {
        Some(1) => MenuCategory::Menu1,
        Some(2) => MenuCategory::Menu2,
        Some(3) => MenuCategory::Menu3,
        _ => MenuCategory::Unknown,
    }
}

/// Menu items of one menus page.
///
/// Only the desktop block (`div.row.hide-sm-down`) is read, the site renders
/// every meal a second time for small screens. An item is `available` when it
/// has an order checkbox at all, `ordered` when that checkbox is checked.
pub fn parse_menu_items(html: &str) -> Vec<MenuItem> {
    #[dynamic]
    static MEAL: Selector = Selector::parse("div.row.hide-sm-down .meal").unwrap();
    #[dynamic]
    static OPEN_INFO: Selector = Selector::parse(".open_info.menu-article-detail").unwrap();
    #[dynamic]
    static TITLE: Selector = Selector::parse(".title").unwrap();
    #[dynamic]
    static SUBTITLE: Selector = Selector::parse(".subtitle").unwrap();
    #[dynamic]
    static ALLERGEN: Selector = Selector::parse("li.allergen").unwrap();
    #[dynamic]
    static CHECKBOX: Selector = Selector::parse(r#"input[type="checkbox"]"#).unwrap();
    #[dynamic]
    static PRICE: Selector = Selector::parse(".price span").unwrap();

    let now = Instant::now();
    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for meal in document.select(&MEAL) {
        let Some(open_info) = meal.select(&OPEN_INFO).next() else {
            continue;
        };
        let (Some(id), Some(date_str)) = (
            open_info.value().attr("data-id"),
            open_info.value().attr("data-date"),
        ) else {
            continue;
        };
        let day = match parse_gourmet_date(date_str) {
            Ok(day) => day,
            Err(e) => {
                log::warn!("skipping menu {}: {}", id, e);
                continue;
            }
        };

        let title = meal.select(&TITLE).next().map(direct_text).unwrap_or_default();
        let subtitle = meal.select(&SUBTITLE).next().map(full_text).unwrap_or_default();

        let allergens = meal
            .select(&ALLERGEN)
            .next()
            .map(full_text)
            .unwrap_or_default()
            .split(',')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        let checkbox = meal.select(&CHECKBOX).find(|input| {
            input
                .value()
                .has_class("menu-clicked", CaseSensitivity::CaseSensitive)
        });
        let available = checkbox.is_some();
        let ordered = checkbox.is_some_and(|input| input.value().attr("checked").is_some());

        let price = meal.select(&PRICE).next().map(full_text).unwrap_or_default();

        items.push(MenuItem {
            id: id.to_string(),
            day,
            category: detect_category(&title),
            title,
            subtitle,
            allergens,
            available,
            ordered,
            price,
        });
    }

    log::debug!("parsed {} menu items: {:.2?}", items.len(), now.elapsed());
    items
}

pub fn has_next_menu_page(html: &str) -> bool {
    #[dynamic]
    static NEXT: Selector = Selector::parse(r#"a[class*="menues-next"]"#).unwrap();

    Html::parse_document(html).select(&NEXT).next().is_some()
}

/// Orders listed on the orders page.
///
/// The site marks confirmed orders either with a `fa-check` icon or a
/// `checkmark` span, depending on the template.
pub fn parse_ordered_menus(html: &str) -> Vec<OrderedMenu> {
    #[dynamic]
    static ORDER_ITEM: Selector =
        Selector::parse(r#"div.order-item, div[class*="order-item"]"#).unwrap();
    #[dynamic]
    static TITLE: Selector = Selector::parse(".title").unwrap();
    #[dynamic]
    static SUBTITLE: Selector = Selector::parse(".subtitle").unwrap();
    #[dynamic]
    static CHECK_ICON: Selector = Selector::parse(".fa-check").unwrap();
    #[dynamic]
    static CHECKMARK: Selector = Selector::parse(".checkmark").unwrap();

    let document = Html::parse_document(html);
    let mut orders = Vec::new();

    for item in document.select(&ORDER_ITEM) {
        let Some(position_id) = non_empty(input_value(item, FIELD_POSITION_ID)) else {
            continue;
        };

        let prefixed = |prefix: &str| {
            find_input(item, &|name| name.starts_with(prefix))
                .and_then(|input| input.value().attr("value"))
                .unwrap_or_default()
                .to_string()
        };
        let eating_cycle_id = prefixed(FIELD_EATING_CYCLE_PREFIX);
        let date_str = prefixed(FIELD_DATE_PREFIX);

        let date = match parse_gourmet_order_date(&date_str) {
            Ok(date) => date,
            Err(e) => {
                log::warn!("order {} has no usable date ({}), using now", position_id, e);
                site_now()
            }
        };

        let approved =
            item.select(&CHECK_ICON).next().is_some() || item.select(&CHECKMARK).next().is_some();

        orders.push(OrderedMenu {
            position_id,
            eating_cycle_id,
            date,
            title: item.select(&TITLE).next().map(direct_text).unwrap_or_default(),
            subtitle: item.select(&SUBTITLE).next().map(full_text).unwrap_or_default(),
            approved,
        });
    }

    orders
}

pub fn extract_edit_mode_form_data(html: &str) -> Result<EditModeFormData> {
    #[dynamic]
    static TOGGLE_FORM: Selector = Selector::parse("form.form-toggleEditMode").unwrap();

    let document = Html::parse_document(html);
    let form = document
        .select(&TOGGLE_FORM)
        .next()
        .ok_or_else(|| ClientError::parse("Could not extract edit mode form data"))?;

    // a missing flag reads like "True", i.e. not in edit mode
    let flag = input_value(form, FIELD_EDIT_MODE).unwrap_or_else(|| "True".to_string());

    Ok(EditModeFormData {
        state: EditModeState::from_wire(&flag),
        tokens: tokens_in(Some(form), "form.form-toggleEditMode")?,
    })
}

/// Form data for cancelling one order position, only present in edit mode.
///
/// Looks up `form#form_{position_id}_cp` first, then any form carrying a
/// `cp_PositionId` input with that value.
pub fn extract_cancel_order_form_data(html: &str, position_id: &str) -> Result<CancelOrderFormData> {
    #[dynamic]
    static FORM: Selector = Selector::parse("form").unwrap();

    let document = Html::parse_document(html);
    let form_id = format!("form_{}_cp", position_id);

    let form = document
        .select(&FORM)
        .find(|form| form.value().id() == Some(form_id.as_str()))
        .or_else(|| {
            document.select(&FORM).find(|form| {
                input_value(*form, FIELD_POSITION_ID).as_deref() == Some(position_id)
            })
        });

    let missing =
        || ClientError::parse(format!("Could not extract cancel form data for position: {}", position_id));
    let form = form.ok_or_else(missing)?;
    let csrf_token = non_empty(input_value(form, FIELD_CSRF)).ok_or_else(missing)?;

    let prefixed = |prefix: &str| {
        find_input(form, &|name| name.starts_with(prefix))
            .and_then(|input| input.value().attr("value"))
            .unwrap_or_default()
            .to_string()
    };

    Ok(CancelOrderFormData {
        position_id: position_id.to_string(),
        eating_cycle_id: prefixed(FIELD_EATING_CYCLE_PREFIX),
        date: prefixed(FIELD_DATE_PREFIX),
        csrf_token,
        anti_forgery_token: non_empty(input_value(form, FIELD_ANTI_FORGERY)),
    })
}

/// Tokens of the form holding the header logout button.
pub fn extract_logout_form_tokens(html: &str) -> Result<FormTokens> {
    #[dynamic]
    static FORM: Selector = Selector::parse("form").unwrap();
    #[dynamic]
    static BUTTON: Selector = Selector::parse("button").unwrap();

    let document = Html::parse_document(html);
    let form = document
        .select(&FORM)
        .find(|form| {
            form.select(&BUTTON).any(|button| {
                button.value().id() == Some("btnHeaderLogout") || full_text(button).contains("Logout")
            })
        })
        .ok_or_else(|| ClientError::parse("Could not find logout form"))?;

    tokens_in(Some(form), "logout form")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const LOGIN_PAGE: &str = include_str!("../../tests/fixtures/gourmet/login-page.html");
    const LOGIN_SUCCESS: &str = include_str!("../../tests/fixtures/gourmet/login-success.html");
    const LOGIN_FAILED: &str = include_str!("../../tests/fixtures/gourmet/login-failed.html");
    const MENUS_PAGE_0: &str = include_str!("../../tests/fixtures/gourmet/menus-page-0.html");
    const MENUS_PAGE_1: &str = include_str!("../../tests/fixtures/gourmet/menus-page-1.html");
    const ORDERS_PAGE: &str = include_str!("../../tests/fixtures/gourmet/orders-page.html");
    const ORDERS_EDIT_MODE: &str =
        include_str!("../../tests/fixtures/gourmet/orders-page-edit-mode.html");

    #[test]
    fn login_tokens() {
        let tokens = extract_login_form_tokens(LOGIN_PAGE).unwrap();
        assert_eq!(tokens.csrf_token, "CSRF-TOKEN-LOGIN-ABC123");
        assert_eq!(tokens.anti_forgery_token, "NCFORM-TOKEN-LOGIN-XYZ789");
    }

    #[test]
    fn missing_tokens_are_parse_errors() {
        let err = extract_form_tokens("<html><form></form></html>", "form").unwrap_err();
        assert!(err.to_string().contains("ufprt"));

        let only_csrf = r#"<html><form><input name="ufprt" value="x" /></form></html>"#;
        let err = extract_form_tokens(only_csrf, "form").unwrap_err();
        assert!(matches!(err, ClientError::Parse(_)));
        assert!(err.to_string().contains("__ncforminfo"));
    }

    #[test]
    fn logged_in_markers() {
        assert!(is_logged_in(LOGIN_SUCCESS));
        assert!(is_logged_in(MENUS_PAGE_0));
        assert!(!is_logged_in(LOGIN_PAGE));
        assert!(!is_logged_in(LOGIN_FAILED));
        assert!(is_logged_in(r#"<button id="btnHeaderLogout">x</button>"#));
    }

    #[test]
    fn user_info() {
        let info = extract_user_info(LOGIN_SUCCESS).unwrap();
        assert_eq!(
            info,
            UserInfo {
                username: "TestUser".into(),
                shop_model_id: "SM-TEST-123".into(),
                eater_id: "EATER-TEST-456".into(),
                staff_group_id: "SG-TEST-789".into(),
            }
        );

        let err = extract_user_info("<html><body></body></html>").unwrap_err();
        assert!(err.to_string().contains("Could not extract user info"));
    }

    #[test]
    fn menu_items_from_desktop_layout_only() {
        let items = parse_menu_items(MENUS_PAGE_0);
        assert_eq!(items.len(), 7);

        let first = &items[0];
        assert_eq!(first.id, "menu-001");
        assert_eq!(first.day, NaiveDate::from_ymd_opt(2026, 2, 9).unwrap());
        assert_eq!(first.title, "MENÜ I");
        assert_eq!(first.subtitle, "Wiener Schnitzel mit Kartoffelsalat");
        assert_eq!(first.allergens, vec!["A", "C", "G"]);
        assert_eq!(first.category, MenuCategory::Menu1);
        assert_eq!(first.price, "€ 5,50");
        assert!(first.available);
        assert!(!first.ordered);

        let categories: Vec<_> = items.iter().map(|i| i.category).collect();
        assert_eq!(
            &categories[..4],
            &[
                MenuCategory::Menu1,
                MenuCategory::Menu2,
                MenuCategory::Menu3,
                MenuCategory::SoupAndSalad
            ]
        );

        let ordered = items
            .iter()
            .find(|i| i.subtitle == "Schweinsbraten mit Knödel")
            .unwrap();
        assert!(ordered.available && ordered.ordered);

        let unavailable = items
            .iter()
            .find(|i| i.subtitle == "Gebratener Lachs mit Dillsauce")
            .unwrap();
        assert!(!unavailable.available && !unavailable.ordered);

        let no_allergens = items.iter().find(|i| i.subtitle == "Reis mit Gemüse").unwrap();
        assert!(no_allergens.allergens.is_empty());
    }

    #[test]
    fn category_detection() {
        assert_eq!(detect_category("MENÜ I"), MenuCategory::Menu1);
        assert_eq!(detect_category("MENU II"), MenuCategory::Menu2);
        assert_eq!(detect_category("Menü III"), MenuCategory::Menu3);
        assert_eq!(detect_category("SUPPE & SALAT"), MenuCategory::SoupAndSalad);
        assert_eq!(detect_category("Tagesteller"), MenuCategory::Unknown);
    }

    #[test]
    fn next_page_marker() {
        assert!(has_next_menu_page(MENUS_PAGE_0));
        assert!(!has_next_menu_page(MENUS_PAGE_1));
        assert_eq!(parse_menu_items(MENUS_PAGE_1).len(), 2);
    }

    #[test]
    fn ordered_menus() {
        let orders = parse_ordered_menus(ORDERS_PAGE);
        assert_eq!(orders.len(), 3);

        assert_eq!(orders[0].position_id, "POS-001");
        assert_eq!(orders[0].eating_cycle_id, "EC-001");
        assert_eq!(orders[0].title, "MENÜ I");
        assert_eq!(orders[0].subtitle, "Wiener Schnitzel mit Kartoffelsalat");
        assert_eq!(
            orders[0].date,
            NaiveDate::from_ymd_opt(2026, 2, 10).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert!(orders[0].approved);
        assert!(!orders[1].approved);
        assert!(orders[2].approved);
    }

    #[test]
    fn edit_mode_state() {
        let normal = extract_edit_mode_form_data(ORDERS_PAGE).unwrap();
        assert_eq!(normal.state, EditModeState::NotInEditMode);
        assert_eq!(normal.tokens.csrf_token, "CSRF-TOKEN-EDITMODE-ENTER-555");

        let editing = extract_edit_mode_form_data(ORDERS_EDIT_MODE).unwrap();
        assert_eq!(editing.state, EditModeState::InEditMode);
        assert_eq!(editing.tokens.csrf_token, "CSRF-TOKEN-EDITMODE-EXIT-777");
        assert_eq!(editing.tokens.anti_forgery_token, "NCFORM-TOKEN-EDITMODE-EXIT-888");

        assert!(extract_edit_mode_form_data(LOGIN_PAGE).is_err());
    }

    #[test]
    fn cancel_form_by_id_and_by_fallback() {
        let by_id = extract_cancel_order_form_data(ORDERS_EDIT_MODE, "POS-001").unwrap();
        assert_eq!(
            by_id,
            CancelOrderFormData {
                position_id: "POS-001".into(),
                eating_cycle_id: "EC-001".into(),
                date: "10.02.2026 00:00:00".into(),
                csrf_token: "CSRF-TOKEN-CANCEL-001".into(),
                anti_forgery_token: Some("NCFORM-TOKEN-CANCEL-001".into()),
            }
        );

        // POS-003's form has no id, found through its position input
        let fallback = extract_cancel_order_form_data(ORDERS_EDIT_MODE, "POS-003").unwrap();
        assert_eq!(fallback.eating_cycle_id, "EC-003");
        assert_eq!(fallback.csrf_token, "CSRF-TOKEN-CANCEL-003");
        assert_eq!(fallback.anti_forgery_token, None);

        assert!(extract_cancel_order_form_data(ORDERS_PAGE, "POS-001").is_err());
        assert!(extract_cancel_order_form_data(ORDERS_EDIT_MODE, "POS-999").is_err());
    }

    #[test]
    fn logout_tokens() {
        let tokens = extract_logout_form_tokens(LOGIN_SUCCESS).unwrap();
        assert_eq!(tokens.csrf_token, "CSRF-TOKEN-LOGOUT-DEF456");
        assert_eq!(tokens.anti_forgery_token, "NCFORM-TOKEN-LOGOUT-UVW012");

        assert!(extract_logout_form_tokens(LOGIN_PAGE).is_err());
    }
}
