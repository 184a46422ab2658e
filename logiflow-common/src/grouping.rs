//! Address grouping of packages into stops
//!
//! Packages sharing a normalized address key become one stop. Stops are
//! numbered in the order their key is first seen, starting after the stops
//! a route already has. Stop-level recipient fields come from the first
//! package of each group; later packages keep their own fields at package
//! level only.

use std::collections::HashMap;

use crate::models::Package;

/// Anything carrying a delivery address (import rows, unassigned packages)
pub trait AddressSource {
    fn address(&self) -> Option<&str>;
    fn city(&self) -> Option<&str>;
    fn postal_code(&self) -> Option<&str>;
    fn recipient_name(&self) -> Option<&str>;
    fn phone(&self) -> Option<&str>;
    fn access_code(&self) -> Option<&str>;
    fn instructions(&self) -> Option<&str>;
}

impl AddressSource for Package {
    fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
    fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }
    fn postal_code(&self) -> Option<&str> {
        self.postal_code.as_deref()
    }
    fn recipient_name(&self) -> Option<&str> {
        self.recipient_name.as_deref()
    }
    fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
    fn access_code(&self) -> Option<&str> {
        self.access_code.as_deref()
    }
    fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}

/// Which address components form the grouping key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// Street + postal code (route built from a package selection)
    StreetPostalCode,
    /// Street + postal code + city (bulk import)
    StreetPostalCodeCity,
}

/// One stop to be created, owning the items grouped under it
#[derive(Debug, Clone)]
pub struct StopDraft<T> {
    pub stop_number: i64,
    pub recipient_name: Option<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub phone: Option<String>,
    pub access_code: Option<String>,
    pub instructions: Option<String>,
    pub items: Vec<T>,
}

/// Grouping result
#[derive(Debug, Clone)]
pub struct Grouping<T> {
    pub stops: Vec<StopDraft<T>>,
    /// Items missing address, city or postal code
    pub skipped: Vec<T>,
}

impl<T> Grouping<T> {
    pub fn item_count(&self) -> usize {
        self.stops.iter().map(|s| s.items.len()).sum()
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn owned(value: Option<&str>) -> Option<String> {
    present(value).map(str::to_string)
}

/// Build the grouping key, or `None` when an address component is missing
pub fn address_key<T: AddressSource>(item: &T, key: GroupKey) -> Option<String> {
    let street = present(item.address())?.to_lowercase();
    let postal = present(item.postal_code())?;
    let city = present(item.city())?;

    Some(match key {
        GroupKey::StreetPostalCode => format!("{}|{}", street, postal),
        GroupKey::StreetPostalCodeCity => format!("{}|{}|{}", street, postal, city.to_lowercase()),
    })
}

/// Group items into stops by normalized address
///
/// `existing_stop_count` lets an import append to a route that already has
/// stops: the first new stop is numbered `existing_stop_count + 1`.
pub fn group_by_address<T, I>(items: I, key: GroupKey, existing_stop_count: i64) -> Grouping<T>
where
    T: AddressSource,
    I: IntoIterator<Item = T>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut stops: Vec<StopDraft<T>> = Vec::new();
    let mut skipped = Vec::new();

    for item in items {
        let Some(group_key) = address_key(&item, key) else {
            skipped.push(item);
            continue;
        };

        match index.get(&group_key) {
            Some(&pos) => stops[pos].items.push(item),
            None => {
                let stop_number = existing_stop_count + stops.len() as i64 + 1;
                let draft = StopDraft {
                    stop_number,
                    recipient_name: owned(item.recipient_name()),
                    address: present(item.address()).unwrap_or_default().to_string(),
                    city: present(item.city()).unwrap_or_default().to_string(),
                    postal_code: present(item.postal_code()).unwrap_or_default().to_string(),
                    phone: owned(item.phone()),
                    access_code: owned(item.access_code()),
                    instructions: owned(item.instructions()),
                    items: vec![item],
                };
                index.insert(group_key, stops.len());
                stops.push(draft);
            }
        }
    }

    Grouping { stops, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Row {
        address: Option<String>,
        city: Option<String>,
        postal_code: Option<String>,
        recipient: Option<String>,
        barcode: &'static str,
    }

    impl AddressSource for Row {
        fn address(&self) -> Option<&str> {
            self.address.as_deref()
        }
        fn city(&self) -> Option<&str> {
            self.city.as_deref()
        }
        fn postal_code(&self) -> Option<&str> {
            self.postal_code.as_deref()
        }
        fn recipient_name(&self) -> Option<&str> {
            self.recipient.as_deref()
        }
        fn phone(&self) -> Option<&str> {
            None
        }
        fn access_code(&self) -> Option<&str> {
            None
        }
        fn instructions(&self) -> Option<&str> {
            None
        }
    }

    fn row(address: &str, postal: &str, barcode: &'static str) -> Row {
        Row {
            address: Some(address.to_string()),
            city: Some("Paris".to_string()),
            postal_code: Some(postal.to_string()),
            recipient: None,
            barcode,
        }
    }

    fn barcodes(stop: &StopDraft<Row>) -> Vec<&'static str> {
        stop.items.iter().map(|r| r.barcode).collect()
    }

    #[test]
    fn test_case_insensitive_same_postal_code_collapses() {
        let rows = vec![
            row("12 Rue X", "75001", "A"),
            row("12 rue x", "75001", "B"),
            row("12 Rue X", "69000", "C"),
        ];

        let grouping = group_by_address(rows, GroupKey::StreetPostalCode, 0);

        assert_eq!(grouping.stops.len(), 2);
        assert_eq!(barcodes(&grouping.stops[0]), vec!["A", "B"]);
        assert_eq!(barcodes(&grouping.stops[1]), vec!["C"]);
        assert_eq!(grouping.stops[0].stop_number, 1);
        assert_eq!(grouping.stops[1].stop_number, 2);
        assert!(grouping.skipped.is_empty());
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let rows = vec![row("  8 Avenue Foch ", "75116", "A"), row("8 avenue foch", "75116", "B")];
        let grouping = group_by_address(rows, GroupKey::StreetPostalCode, 0);
        assert_eq!(grouping.stops.len(), 1);
        assert_eq!(grouping.stops[0].address, "8 Avenue Foch");
    }

    #[test]
    fn test_numbering_continues_after_existing_stops() {
        let rows = vec![row("1 Rue A", "75001", "A"), row("2 Rue B", "75001", "B")];
        let grouping = group_by_address(rows, GroupKey::StreetPostalCodeCity, 4);
        let numbers: Vec<i64> = grouping.stops.iter().map(|s| s.stop_number).collect();
        assert_eq!(numbers, vec![5, 6]);
    }

    #[test]
    fn test_first_seen_order_is_kept() {
        let rows = vec![
            row("3 Rue C", "75003", "C1"),
            row("1 Rue A", "75001", "A1"),
            row("3 rue c", "75003", "C2"),
        ];
        let grouping = group_by_address(rows, GroupKey::StreetPostalCode, 0);
        assert_eq!(grouping.stops[0].address, "3 Rue C");
        assert_eq!(barcodes(&grouping.stops[0]), vec!["C1", "C2"]);
        assert_eq!(grouping.stops[1].address, "1 Rue A");
    }

    #[test]
    fn test_first_row_wins_stop_fields() {
        let mut first = row("5 Rue D", "75005", "A");
        first.recipient = Some("Alice".to_string());
        let mut second = row("5 Rue D", "75005", "B");
        second.recipient = Some("Bob".to_string());

        let grouping = group_by_address(vec![first, second], GroupKey::StreetPostalCode, 0);
        assert_eq!(grouping.stops[0].recipient_name.as_deref(), Some("Alice"));
        // package-level data survives
        assert_eq!(grouping.stops[0].items[1].recipient.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_incomplete_rows_are_dropped() {
        let mut no_city = row("1 Rue A", "75001", "X");
        no_city.city = None;
        let mut blank_postal = row("1 Rue A", "   ", "Y");
        blank_postal.city = Some("Paris".to_string());
        let no_address = Row {
            address: None,
            ..row("", "75001", "Z")
        };

        let grouping = group_by_address(
            vec![no_city, blank_postal, no_address, row("1 Rue A", "75001", "OK")],
            GroupKey::StreetPostalCodeCity,
            0,
        );

        assert_eq!(grouping.stops.len(), 1);
        assert_eq!(grouping.skipped.len(), 3);
        assert_eq!(grouping.item_count(), 1);
    }

    #[test]
    fn test_city_only_matters_for_import_key() {
        let mut lyon = row("1 Rue A", "75001", "B");
        lyon.city = Some("Lyon".to_string());
        let rows = vec![row("1 Rue A", "75001", "A"), lyon];

        let by_postal = group_by_address(rows.clone(), GroupKey::StreetPostalCode, 0);
        assert_eq!(by_postal.stops.len(), 1);

        let by_city = group_by_address(rows, GroupKey::StreetPostalCodeCity, 0);
        assert_eq!(by_city.stops.len(), 2);
    }
}
