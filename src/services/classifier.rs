//! Line item classification
//!
//! Every raw line item ends up in exactly one of:
//! - the print signal (control item, never invoiced)
//! - withheld: counted into at least one exclusive category, never invoiced
//! - invoiced, possibly also counted into non-exclusive categories
//!
//! `classify_item` decides one item in isolation; `classify` folds the
//! per-item outcomes of an order into buckets and the invoice list.

use crate::domain::order::RawLineItem;
use crate::domain::transaction::NormalizedItem;
use crate::infra::config::{RowLayout, SyncRules};
use crate::services::tax::tax_tier;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Reference written for items without a catalog id
pub const NO_REFERENCE: &str = "none-available";

/// Variation name the source attaches to items without variations
const DEFAULT_VARIATION: &str = "Regular";

/// Control signals carried by line items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Print,
}

/// One item counted under a category key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryHit {
    /// Index into `SyncRules::categories`
    pub category: usize,
    pub key: String,
    pub quantity: Decimal,
}

/// What to do with a single line item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Signal(Signal),
    Withhold(Vec<CategoryHit>),
    Emit { item: NormalizedItem, hits: Vec<CategoryHit> },
}

/// Accumulated quantities for one category within one order
#[derive(Debug, Clone, PartialEq)]
pub struct AuxBucket {
    pub category: String,
    pub channel: String,
    pub layout: RowLayout,
    pub exclusive: bool,
    pub quantities: BTreeMap<String, Decimal>,
    /// Free-form fields captured from withheld items (note, metadata)
    pub extra: BTreeMap<String, String>,
}

impl AuxBucket {
    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    fn add(&mut self, key: &str, quantity: Decimal) {
        *self.quantities.entry(key.to_string()).or_insert(Decimal::ZERO) += quantity;
    }

    fn capture(&mut self, item: &RawLineItem) {
        if let Some(note) = item.note.as_deref().filter(|n| !n.is_empty()) {
            self.extra.entry("Note".to_string()).or_insert_with(|| note.to_string());
        }
        for (key, value) in &item.metadata {
            self.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// Per-order classification result
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedItems {
    pub print_flag: bool,
    /// One bucket per configured category, in configuration order
    pub buckets: Vec<AuxBucket>,
    pub invoiced_items: Vec<NormalizedItem>,
    /// Titles of invoiced items that carried no price and were invoiced at zero
    pub unpriced_items: Vec<String>,
}

impl ClassifiedItems {
    fn empty(rules: &SyncRules) -> Self {
        let buckets = rules
            .categories
            .iter()
            .map(|c| AuxBucket {
                category: c.name.clone(),
                channel: c.channel.clone(),
                layout: c.layout,
                exclusive: c.exclusive,
                quantities: BTreeMap::new(),
                extra: BTreeMap::new(),
            })
            .collect();
        Self { print_flag: false, buckets, invoiced_items: Vec::new(), unpriced_items: Vec::new() }
    }

    /// Buckets that received at least one item
    pub fn non_empty_buckets(&self) -> impl Iterator<Item = &AuxBucket> {
        self.buckets.iter().filter(|b| !b.is_empty())
    }
}

/// Reshape a raw item into the invoice format
pub fn normalize_item(item: &RawLineItem, default_tax_tier: &str) -> NormalizedItem {
    let name = item.name.as_deref().unwrap_or_default();
    let title = match item.variation_name.as_deref() {
        Some(variation) if !variation.is_empty() && variation != DEFAULT_VARIATION => {
            format!("{} {}", name, variation)
        }
        _ => name.to_string(),
    };

    // Only one tax may apply per invoice line; the first listed wins
    let percentage = item
        .taxes
        .first()
        .and_then(|t| t.percentage.as_deref())
        .unwrap_or_default();

    NormalizedItem {
        reference: item
            .catalog_object_id
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| NO_REFERENCE.to_string()),
        title,
        qty: item.quantity,
        gross_price: item.base_price_money.map(|m| m.to_decimal()).unwrap_or_default(),
        tax_id: tax_tier(percentage, default_tax_tier).to_string(),
    }
}

/// Decide the fate of one line item
pub fn classify_item(item: &RawLineItem, rules: &SyncRules) -> ItemOutcome {
    let reference = item.catalog_object_id.as_deref();

    if reference.is_some() && reference == rules.print_reference.as_deref() {
        return ItemOutcome::Signal(Signal::Print);
    }

    let hits: Vec<CategoryHit> = match reference {
        Some(reference) => rules
            .categories
            .iter()
            .enumerate()
            .filter_map(|(idx, category)| {
                category.key_for(reference).map(|key| CategoryHit {
                    category: idx,
                    key: key.to_string(),
                    quantity: item.quantity,
                })
            })
            .collect(),
        None => Vec::new(),
    };

    if hits.iter().any(|hit| rules.categories[hit.category].exclusive) {
        return ItemOutcome::Withhold(hits);
    }

    ItemOutcome::Emit { item: normalize_item(item, &rules.default_tax_tier), hits }
}

/// Classify all line items of one order, preserving their order
pub fn classify(items: &[RawLineItem], rules: &SyncRules) -> ClassifiedItems {
    let mut classified = ClassifiedItems::empty(rules);

    for raw in items {
        match classify_item(raw, rules) {
            ItemOutcome::Signal(Signal::Print) => classified.print_flag = true,
            ItemOutcome::Withhold(hits) => {
                for hit in hits {
                    let bucket = &mut classified.buckets[hit.category];
                    bucket.add(&hit.key, hit.quantity);
                    if bucket.exclusive {
                        bucket.capture(raw);
                    }
                }
            }
            ItemOutcome::Emit { item, hits } => {
                for hit in hits {
                    classified.buckets[hit.category].add(&hit.key, hit.quantity);
                }
                if raw.base_price_money.is_none() {
                    classified.unpriced_items.push(item.title.clone());
                }
                classified.invoiced_items.push(item);
            }
        }
    }

    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{LineItemTax, Money};
    use crate::infra::config::{Category, CategoryItem};

    fn item(reference: Option<&str>, name: &str, variation: &str, qty: i64, cents: i64) -> RawLineItem {
        RawLineItem {
            uid: None,
            catalog_object_id: reference.map(str::to_string),
            name: Some(name.to_string()),
            variation_name: Some(variation.to_string()),
            quantity: Decimal::from(qty),
            base_price_money: Some(Money { amount: cents }),
            taxes: vec![],
            note: None,
            metadata: BTreeMap::new(),
        }
    }

    fn with_tax(mut raw: RawLineItem, percentages: &[&str]) -> RawLineItem {
        raw.taxes = percentages
            .iter()
            .map(|p| LineItemTax { name: None, percentage: Some(p.to_string()) })
            .collect();
        raw
    }

    fn rules() -> SyncRules {
        SyncRules {
            print_reference: Some("PRINT".to_string()),
            categories: vec![
                Category {
                    name: "menu".to_string(),
                    channel: "menu-report".to_string(),
                    exclusive: true,
                    layout: RowLayout::Badge,
                    items: vec![
                        CategoryItem { reference: "M1".to_string(), key: "soup".to_string() },
                        CategoryItem { reference: "M2".to_string(), key: "main".to_string() },
                        CategoryItem { reference: "M3".to_string(), key: "soup".to_string() },
                    ],
                },
                Category {
                    name: "reservations".to_string(),
                    channel: "reservations".to_string(),
                    exclusive: false,
                    layout: RowLayout::Reservation,
                    items: vec![CategoryItem {
                        reference: "R1".to_string(),
                        key: "cake".to_string(),
                    }],
                },
            ],
            ..SyncRules::default()
        }
    }

    #[test]
    fn test_title_suppresses_regular_variation() {
        let normalized = normalize_item(&item(Some("A"), "Coffee", "Regular", 1, 80), "ISE");
        assert_eq!(normalized.title, "Coffee");

        let normalized = normalize_item(&item(Some("A"), "Coffee", "Large", 1, 120), "ISE");
        assert_eq!(normalized.title, "Coffee Large");
    }

    #[test]
    fn test_normalize_item_fields() {
        let raw = with_tax(item(None, "Bread", "Regular", 3, 12345), &["6", "23"]);
        let normalized = normalize_item(&raw, "ISE");

        assert_eq!(normalized.reference, NO_REFERENCE);
        assert_eq!(normalized.qty, Decimal::from(3));
        assert_eq!(normalized.gross_price, "123.45".parse::<Decimal>().unwrap());
        assert_eq!(normalized.tax_id, "RED");
    }

    #[test]
    fn test_price_normalization() {
        for (cents, expected) in [(0, "0"), (1, "0.01"), (12345, "123.45"), (100, "1")] {
            let normalized = normalize_item(&item(Some("A"), "X", "Regular", 1, cents), "ISE");
            assert_eq!(normalized.gross_price, expected.parse::<Decimal>().unwrap());
        }
    }

    #[test]
    fn test_missing_taxes_use_default_tier() {
        let normalized = normalize_item(&item(Some("A"), "X", "Regular", 1, 100), "ISE");
        assert_eq!(normalized.tax_id, "ISE");

        let raw = with_tax(item(Some("A"), "X", "Regular", 1, 100), &["99"]);
        assert_eq!(normalize_item(&raw, "OUT").tax_id, "OUT");
    }

    #[test]
    fn test_classify_item_outcomes() {
        let rules = rules();

        assert_eq!(
            classify_item(&item(Some("PRINT"), "Print", "Regular", 1, 0), &rules),
            ItemOutcome::Signal(Signal::Print)
        );

        match classify_item(&item(Some("M2"), "Menu", "Regular", 2, 900), &rules) {
            ItemOutcome::Withhold(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].key, "main");
                assert_eq!(hits[0].quantity, Decimal::from(2));
            }
            other => panic!("expected withhold, got {:?}", other),
        }

        match classify_item(&item(Some("R1"), "Cake", "Regular", 1, 2500), &rules) {
            ItemOutcome::Emit { item, hits } => {
                assert_eq!(item.reference, "R1");
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].category, 1);
            }
            other => panic!("expected emit, got {:?}", other),
        }

        assert!(matches!(
            classify_item(&item(Some("OTHER"), "Tea", "Regular", 1, 100), &rules),
            ItemOutcome::Emit { hits, .. } if hits.is_empty()
        ));
    }

    #[test]
    fn test_item_without_reference_never_matches_print() {
        let rules = SyncRules { print_reference: None, ..rules() };
        let outcome = classify_item(&item(None, "Loose", "Regular", 1, 100), &rules);
        assert!(matches!(outcome, ItemOutcome::Emit { .. }));
    }

    #[test]
    fn test_missing_price_invoiced_at_zero_and_reported() {
        let mut loose = item(Some("A"), "Loose", "Regular", 1, 0);
        loose.base_price_money = None;
        let priced = item(Some("B"), "Bread", "Regular", 1, 150);
        let mut print = item(Some("PRINT"), "Print", "Regular", 1, 0);
        print.base_price_money = None;

        let classified = classify(&[loose, priced, print], &rules());
        assert_eq!(classified.invoiced_items[0].gross_price, Decimal::ZERO);
        assert_eq!(classified.unpriced_items, vec!["Loose".to_string()]);
    }

    #[test]
    fn test_print_only_order() {
        let classified = classify(&[item(Some("PRINT"), "Print", "Regular", 1, 0)], &rules());
        assert!(classified.print_flag);
        assert!(classified.invoiced_items.is_empty());
        assert_eq!(classified.non_empty_buckets().count(), 0);
    }

    #[test]
    fn test_accumulates_quantities_per_key() {
        let items = vec![
            item(Some("M1"), "Soup", "Regular", 1, 0),
            item(Some("M2"), "Main", "Regular", 2, 0),
            item(Some("M3"), "Soup XL", "Regular", 3, 0),
            item(Some("R1"), "Cake", "Regular", 1, 2500),
            item(Some("R1"), "Cake", "Regular", 2, 2500),
        ];
        let classified = classify(&items, &rules());

        let menu = &classified.buckets[0];
        assert_eq!(menu.quantities.get("soup"), Some(&Decimal::from(4)));
        assert_eq!(menu.quantities.get("main"), Some(&Decimal::from(2)));

        let reservations = &classified.buckets[1];
        assert_eq!(reservations.quantities.get("cake"), Some(&Decimal::from(3)));

        // Reservation items are invoiced as well, menu items are not
        assert_eq!(classified.invoiced_items.len(), 2);
        assert!(classified.invoiced_items.iter().all(|i| i.reference == "R1"));
    }

    #[test]
    fn test_partition_accounts_for_every_item() {
        let rules = rules();
        let items = vec![
            item(Some("PRINT"), "Print", "Regular", 1, 0),
            item(Some("M1"), "Soup", "Regular", 1, 0),
            item(Some("R1"), "Cake", "Regular", 1, 2500),
            item(Some("X"), "Tea", "Regular", 1, 100),
            item(None, "Open item", "", 1, 500),
            item(Some("PRINT"), "Print", "Regular", 1, 0),
        ];

        let mut signals = 0;
        let mut withheld = 0;
        let mut emitted = 0;
        for raw in &items {
            match classify_item(raw, &rules) {
                ItemOutcome::Signal(_) => signals += 1,
                ItemOutcome::Withhold(_) => withheld += 1,
                ItemOutcome::Emit { .. } => emitted += 1,
            }
        }
        assert_eq!(signals + withheld + emitted, items.len());

        let classified = classify(&items, &rules);
        assert!(classified.print_flag);
        assert_eq!(classified.invoiced_items.len(), emitted);
        assert_eq!(withheld, 1);
        assert_eq!(signals, 2);
    }

    #[test]
    fn test_invoiced_items_keep_input_order() {
        let items = vec![
            item(Some("B"), "Second", "Regular", 1, 100),
            item(Some("PRINT"), "Print", "Regular", 1, 0),
            item(Some("A"), "First", "Regular", 1, 100),
        ];
        let classified = classify(&items, &rules());
        let titles: Vec<&str> = classified.invoiced_items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "First"]);
    }

    #[test]
    fn test_exclusive_bucket_captures_extra_fields() {
        let mut soup = item(Some("M1"), "Soup", "Regular", 1, 0);
        soup.note = Some("no salt".to_string());
        soup.metadata.insert("table".to_string(), "4".to_string());
        let mut main = item(Some("M2"), "Main", "Regular", 1, 0);
        main.note = Some("later".to_string());
        let mut cake = item(Some("R1"), "Cake", "Regular", 1, 2500);
        cake.note = Some("birthday".to_string());

        let classified = classify(&[soup, main, cake], &rules());

        let menu = &classified.buckets[0];
        assert_eq!(menu.extra.get("Note").map(String::as_str), Some("no salt"));
        assert_eq!(menu.extra.get("table").map(String::as_str), Some("4"));
        assert!(classified.buckets[1].extra.is_empty());
    }

    #[test]
    fn test_item_in_both_categories_is_withheld_and_counted_twice() {
        let mut rules = rules();
        rules.categories[1]
            .items
            .push(CategoryItem { reference: "M1".to_string(), key: "soup-pickup".to_string() });

        let classified = classify(&[item(Some("M1"), "Soup", "Regular", 2, 0)], &rules);
        assert!(classified.invoiced_items.is_empty());
        assert_eq!(classified.buckets[0].quantities.get("soup"), Some(&Decimal::from(2)));
        assert_eq!(
            classified.buckets[1].quantities.get("soup-pickup"),
            Some(&Decimal::from(2))
        );
    }
}
