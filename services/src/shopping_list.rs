//! Aggregation and plain-text rendering of a user's shopping list.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::database::ShoppingListItem;

pub const FILENAME: &str = "shopping_list.txt";
pub const HEADER: &str = "Shopping list";
pub const FOOTER: &str = "Happy cooking!";

/// Sums amounts per `(name, measurement_unit)`.
///
/// The result is ordered by name, then unit, comparing raw bytes like the
/// `COLLATE "C"` ordering of the Postgres query. Ingredients that share a name
/// but not a unit stay on separate lines.
pub fn aggregate<I>(lines: I) -> Vec<ShoppingListItem>
where
    I: IntoIterator<Item = (String, String, i64)>,
{
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for (name, unit, amount) in lines {
        *totals.entry((name, unit)).or_default() += amount;
    }
    totals
        .into_iter()
        .map(|((name, measurement_unit), total_amount)| ShoppingListItem {
            name,
            measurement_unit,
            total_amount,
        })
        .collect()
}

/// Renders the downloadable text document.
///
/// An empty cart still produces the header and footer.
pub fn render(items: &[ShoppingListItem]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{HEADER}");
    let _ = writeln!(out);
    for item in items {
        let _ = writeln!(
            out,
            "{} ({}) - {}",
            item.name, item.measurement_unit, item.total_amount
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{FOOTER}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, unit: &str, amount: i64) -> (String, String, i64) {
        (name.to_owned(), unit.to_owned(), amount)
    }

    #[test]
    fn sums_amounts_across_recipes() {
        let items = aggregate(vec![
            line("flour", "g", 200),
            line("egg", "pcs", 2),
            line("flour", "g", 300),
        ]);

        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: "egg".to_owned(),
                    measurement_unit: "pcs".to_owned(),
                    total_amount: 2,
                },
                ShoppingListItem {
                    name: "flour".to_owned(),
                    measurement_unit: "g".to_owned(),
                    total_amount: 500,
                },
            ]
        );
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let items = aggregate(vec![line("sugar", "g", 100), line("sugar", "tbsp", 2)]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].measurement_unit, "g");
        assert_eq!(items[1].measurement_unit, "tbsp");
    }

    #[test]
    fn orders_names_by_bytes() {
        let items = aggregate(vec![
            line("apple", "pcs", 1),
            line("Zucchini", "pcs", 1),
            line("Émincé", "g", 1),
        ]);
        let names: Vec<&str> = items.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, ["Zucchini", "apple", "Émincé"]);
    }

    #[test]
    fn render_lists_each_item() {
        let items = aggregate(vec![line("flour", "g", 500), line("egg", "pcs", 3)]);
        let text = render(&items);

        assert!(text.starts_with("Shopping list\n"));
        assert!(text.contains("egg (pcs) - 3\n"));
        assert!(text.contains("flour (g) - 500\n"));
        assert!(text.trim_end().ends_with("Happy cooking!"));
        assert!(text.find("egg").unwrap() < text.find("flour").unwrap());
    }

    #[test]
    fn render_empty_list_keeps_frame() {
        assert_eq!(render(&[]), "Shopping list\n\n\nHappy cooking!\n");
    }
}
