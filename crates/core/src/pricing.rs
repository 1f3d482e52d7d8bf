//! Discount application.
//!
//! Pricing is a pure function of the line items, the rule set and the
//! current time. Matching rules are applied one after another to the running
//! price in ascending rule ID order, so two 10% rules produce 19% off rather
//! than 20%. The running price is clamped at zero after every step.
//!
//! Weekday restrictions are evaluated in the timezone of `now`; pass the
//! store's local time (e.g. `Utc::now().with_timezone(&store_offset)`) so a
//! weekday-only promotion ends at the store's midnight, not UTC's.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{CartTotals, DiscountRule, DiscountValue, LineItem, PricedLineItem};

/// Decimal places kept in effective prices.
const PRICE_SCALE: u32 = 2;

/// Whether a rule is active, inside its date window and allowed today.
#[must_use]
pub fn is_currently_valid<Tz: TimeZone>(rule: &DiscountRule, now: &DateTime<Tz>) -> bool {
    if !rule.is_active {
        return false;
    }

    let instant = now.with_timezone(&Utc);
    if rule.start_date.is_some_and(|start| instant < start) {
        return false;
    }
    if rule.end_date.is_some_and(|end| instant > end) {
        return false;
    }

    if rule.days_of_week.is_empty() {
        return true;
    }
    let today = u8::try_from(now.weekday().num_days_from_sunday()).unwrap_or(u8::MAX);
    rule.days_of_week.contains(&today)
}

/// Price each item against the rules valid at `now`.
///
/// Returns one [`PricedLineItem`] per input item, in input order. Items no
/// rule matches keep their list price.
#[must_use]
pub fn apply_discounts<Tz: TimeZone>(
    items: &[LineItem],
    rules: &[DiscountRule],
    now: &DateTime<Tz>,
) -> Vec<PricedLineItem> {
    let mut valid: Vec<&DiscountRule> = rules
        .iter()
        .filter(|rule| is_currently_valid(rule, now))
        .collect();
    valid.sort_by_key(|rule| rule.id);

    items.iter().map(|item| price_item(item, &valid)).collect()
}

/// Sum list prices, savings and the amount due.
#[must_use]
pub fn quote_totals(items: &[PricedLineItem]) -> CartTotals {
    items.iter().fold(CartTotals::default(), |totals, item| {
        let subtotal = totals.subtotal + item.list_total();
        let total = totals.total + item.line_total();
        CartTotals {
            subtotal,
            discount: subtotal - total,
            total,
        }
    })
}

fn price_item(item: &LineItem, rules: &[&DiscountRule]) -> PricedLineItem {
    let mut price = item.unit_price;
    let mut applied_rules = Vec::new();

    for rule in rules
        .iter()
        .filter(|rule| rule.scope.matches(&item.product_id, item.category.as_deref()))
    {
        if let Some(next) = discounted(price, rule.value()) {
            price = next;
            applied_rules.push(rule.id);
        }
    }

    let effective_price = if applied_rules.is_empty() {
        item.unit_price
    } else {
        price.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
    };

    PricedLineItem {
        product_id: item.product_id.clone(),
        category: item.category.clone(),
        unit_price: item.unit_price,
        effective_price,
        quantity: item.quantity,
        applied_rules,
    }
}

/// One discount step. `None` when the rule cannot be applied (negative
/// amount or arithmetic overflow), in which case the price is left as is.
fn discounted(price: Decimal, value: DiscountValue) -> Option<Decimal> {
    let next = match value {
        DiscountValue::Percentage(fraction) if fraction.is_sign_negative() => return None,
        DiscountValue::Fixed(amount) if amount.is_sign_negative() => return None,
        DiscountValue::Percentage(fraction) => price.checked_mul(Decimal::ONE - fraction)?,
        DiscountValue::Fixed(amount) => price.checked_sub(amount)?,
    };
    Some(next.max(Decimal::ZERO))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, FixedOffset};

    use super::*;
    use crate::types::{DiscountKind, DiscountRuleId, DiscountScope, ProductId};

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    /// Sunday 2024-06-02, midday UTC.
    fn sunday() -> DateTime<Utc> {
        "2024-06-02T12:00:00Z".parse().unwrap()
    }

    fn percent_rule(id: i32, fraction: &str) -> DiscountRule {
        DiscountRule {
            id: DiscountRuleId::new(id),
            name: None,
            is_active: true,
            start_date: Some(sunday() - Duration::days(30)),
            end_date: Some(sunday() + Duration::days(30)),
            days_of_week: Vec::new(),
            scope: DiscountScope::All,
            discount_type: DiscountKind::Percentage,
            discount_value: dec(fraction),
        }
    }

    #[test]
    fn test_single_percentage_rule() {
        let items = [LineItem::new("p1", dec("100"), 1)];
        let priced = apply_discounts(&items, &[percent_rule(1, "0.1")], &sunday());

        assert_eq!(priced[0].effective_price, dec("90"));
        assert_eq!(priced[0].unit_price, dec("100"));
        assert_eq!(priced[0].applied_rules, vec![DiscountRuleId::new(1)]);
    }

    #[test]
    fn test_percentage_rules_compound() {
        let items = [LineItem::new("p1", dec("100"), 1)];
        let rules = [percent_rule(2, "0.1"), percent_rule(1, "0.1")];
        let priced = apply_discounts(&items, &rules, &sunday());

        assert_eq!(priced[0].effective_price, dec("81"));
        assert_eq!(
            priced[0].applied_rules,
            vec![DiscountRuleId::new(1), DiscountRuleId::new(2)]
        );
    }

    #[test]
    fn test_rules_apply_in_ascending_id_order() {
        // fixed 10 then 50%: (100 - 10) * 0.5 = 45; the reverse would give 40
        let mut fixed = percent_rule(1, "10");
        fixed.discount_type = DiscountKind::Fixed;
        let half = percent_rule(5, "0.5");

        let items = [LineItem::new("p1", dec("100"), 1)];
        let priced = apply_discounts(&items, &[half, fixed], &sunday());

        assert_eq!(priced[0].effective_price, dec("45"));
    }

    #[test]
    fn test_weekday_rule_skips_sunday() {
        let mut weekdays = percent_rule(1, "0.1");
        weekdays.days_of_week = vec![1, 2, 3, 4, 5];

        assert!(!is_currently_valid(&weekdays, &sunday()));

        let items = [LineItem::new("p1", dec("100"), 1)];
        let priced = apply_discounts(&items, &[weekdays], &sunday());
        assert_eq!(priced[0].effective_price, dec("100"));
        assert!(priced[0].applied_rules.is_empty());
    }

    #[test]
    fn test_weekday_uses_timezone_of_now() {
        // 01:00 UTC Monday is still Sunday evening in Buenos Aires
        let mut weekdays = percent_rule(1, "0.1");
        weekdays.days_of_week = vec![1, 2, 3, 4, 5];

        let monday_utc: DateTime<Utc> = "2024-06-03T01:00:00Z".parse().unwrap();
        let buenos_aires = FixedOffset::west_opt(3 * 3600).unwrap();

        assert!(is_currently_valid(&weekdays, &monday_utc));
        assert!(!is_currently_valid(
            &weekdays,
            &monday_utc.with_timezone(&buenos_aires)
        ));
    }

    #[test]
    fn test_price_clamped_at_zero() {
        let items = [LineItem::new("p1", dec("10"), 1)];
        let priced = apply_discounts(&items, &[percent_rule(1, "2.0")], &sunday());
        assert_eq!(priced[0].effective_price, Decimal::ZERO);

        let mut fixed = percent_rule(2, "25");
        fixed.discount_type = DiscountKind::Fixed;
        let priced = apply_discounts(&items, &[fixed], &sunday());
        assert_eq!(priced[0].effective_price, Decimal::ZERO);
    }

    #[test]
    fn test_inactive_and_out_of_window_rules_ignored() {
        let mut inactive = percent_rule(1, "0.1");
        inactive.is_active = false;

        let mut expired = percent_rule(2, "0.1");
        expired.end_date = Some(sunday() - Duration::days(1));

        let mut upcoming = percent_rule(3, "0.1");
        upcoming.start_date = Some(sunday() + Duration::seconds(1));

        let items = [LineItem::new("p1", dec("100"), 1)];
        let priced = apply_discounts(&items, &[inactive, expired, upcoming], &sunday());
        assert_eq!(priced[0].effective_price, dec("100"));
    }

    #[test]
    fn test_open_date_window_is_unbounded() {
        let mut open = percent_rule(1, "0.1");
        open.start_date = None;
        open.end_date = None;
        assert!(is_currently_valid(&open, &sunday()));
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let mut edge = percent_rule(1, "0.1");
        edge.start_date = Some(sunday());
        edge.end_date = Some(sunday());
        assert!(is_currently_valid(&edge, &sunday()));
    }

    #[test]
    fn test_scope_limits_which_items_are_discounted() {
        let mut malbec_only = percent_rule(1, "0.5");
        malbec_only.scope = DiscountScope::Products {
            ids: vec![ProductId::new("malbec")],
        };
        let mut whites = percent_rule(2, "0.1");
        whites.scope = DiscountScope::Categories {
            names: vec!["blancos".to_string()],
        };

        let items = [
            LineItem::new("malbec", dec("200"), 2).with_category("Tintos"),
            LineItem::new("torrontes", dec("50"), 1).with_category("Blancos"),
            LineItem::new("rosado", dec("40"), 3),
        ];
        let priced = apply_discounts(&items, &[malbec_only, whites], &sunday());

        assert_eq!(priced[0].effective_price, dec("100"));
        assert_eq!(priced[1].effective_price, dec("45"));
        assert_eq!(priced[2].effective_price, dec("40"));
        assert_eq!(priced[2].product_id, ProductId::new("rosado"));
    }

    #[test]
    fn test_negative_discount_is_ignored() {
        let items = [LineItem::new("p1", dec("100"), 1)];
        let priced = apply_discounts(&items, &[percent_rule(1, "-0.5")], &sunday());
        assert_eq!(priced[0].effective_price, dec("100"));
        assert!(priced[0].applied_rules.is_empty());
    }

    #[test]
    fn test_effective_price_rounded_to_cents() {
        let items = [LineItem::new("p1", dec("9.99"), 1)];
        let priced = apply_discounts(&items, &[percent_rule(1, "0.15")], &sunday());
        // 9.99 * 0.85 = 8.4915
        assert_eq!(priced[0].effective_price, dec("8.49"));
    }

    #[test]
    fn test_inputs_are_not_modified() {
        let items = vec![LineItem::new("p1", dec("100"), 1)];
        let rules = vec![percent_rule(1, "0.2")];
        let before = (items.clone(), rules.clone());

        let _ = apply_discounts(&items, &rules, &sunday());

        assert_eq!((items, rules), before);
    }

    #[test]
    fn test_end_to_end_single_product() {
        let now = Utc::now();
        let rule: DiscountRule = serde_json::from_value(serde_json::json!({
            "id": 1,
            "is_active": true,
            "scope": "p1",
            "discount_value": 0.2,
            "start_date": (now - Duration::days(1)).to_rfc3339(),
            "end_date": (now + Duration::days(1)).to_rfc3339(),
            "days_of_week": []
        }))
        .unwrap();

        let items = [LineItem::new("p1", dec("100"), 1)];
        let priced = apply_discounts(&items, &[rule], &now);

        assert_eq!(priced.len(), 1);
        assert_eq!(priced[0].product_id, ProductId::new("p1"));
        assert_eq!(priced[0].unit_price, dec("100"));
        assert_eq!(priced[0].effective_price, dec("80"));
        assert_eq!(priced[0].quantity, 1);
    }

    #[test]
    fn test_quote_totals() {
        let items = [
            LineItem::new("a", dec("100"), 2),
            LineItem::new("b", dec("30"), 1),
        ];
        let mut only_a = percent_rule(1, "0.25");
        only_a.scope = DiscountScope::Products {
            ids: vec![ProductId::new("a")],
        };
        let priced = apply_discounts(&items, &[only_a], &sunday());
        let totals = quote_totals(&priced);

        assert_eq!(totals.subtotal, dec("230"));
        assert_eq!(totals.discount, dec("50"));
        assert_eq!(totals.total, dec("180"));
        assert_eq!(priced[0].savings(), dec("50"));
    }
}
