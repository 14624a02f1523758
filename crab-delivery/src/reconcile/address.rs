//! Delivery address matching
//!
//! Best effort: exact postcode match among similar street names, then the
//! most similar street, then the concrete house/box row. Anything that does
//! not resolve falls back to the platform's free-text address.

use std::sync::Arc;

use shared::order::AddressMatch;
use shared::platform::DeliveryAddress;

use crate::db::{AddressRepository, Street};

/// Stored when the platform sent no address at all (collection orders)
pub const NO_DELIVERY_ADDRESS: &str = "No delivery address";

const BOX_PREFIXES: [&str; 5] = ["boîte", "boite", "bte", "box", "bus"];

pub struct AddressResolver {
    repo: Arc<dyn AddressRepository>,
    search_limit: i64,
}

impl AddressResolver {
    pub fn new(repo: Arc<dyn AddressRepository>, search_limit: i64) -> Self {
        Self { repo, search_limit }
    }

    /// Always yields exactly one of address id or raw text.
    pub async fn resolve(&self, address: Option<&DeliveryAddress>) -> AddressMatch {
        let Some(address) = address else {
            return AddressMatch::Raw {
                text: NO_DELIVERY_ADDRESS.to_string(),
            };
        };

        if let Some(address_id) = self.lookup(address).await {
            return AddressMatch::Resolved { address_id };
        }

        let text = format_raw_address(address);
        tracing::info!(address = %text, "No matching address, keeping platform text");
        AddressMatch::Raw {
            text: if text.is_empty() {
                NO_DELIVERY_ADDRESS.to_string()
            } else {
                text
            },
        }
    }

    async fn lookup(&self, address: &DeliveryAddress) -> Option<String> {
        let street_query = address.street.trim();
        let house_number = address.number.trim();
        if street_query.is_empty() || house_number.is_empty() {
            return None;
        }

        let candidates = match self
            .repo
            .search_street_names(street_query, self.search_limit)
            .await
        {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, street = street_query, "Street search failed");
                return None;
            }
        };

        let street = pick_street(&candidates, &address.postal_code, street_query)?;
        let box_number = parse_box_number(&address.address_line_2);

        match self
            .repo
            .get_final_address(&street.id, house_number, box_number.as_deref())
            .await
        {
            Ok(Some(found)) => {
                tracing::debug!(address_id = %found.id, street_id = %street.id, "Address matched");
                Some(found.id)
            }
            Ok(None) => {
                tracing::info!(
                    street_id = %street.id,
                    house_number,
                    box_number = ?box_number,
                    "No address row for house number"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, street_id = %street.id, "Address lookup failed");
                None
            }
        }
    }
}

/// Postcode match wins; otherwise the most similar candidate.
fn pick_street<'a>(candidates: &'a [Street], postcode: &str, query: &str) -> Option<&'a Street> {
    let postcode = postcode.trim();
    if let Some(exact) = candidates
        .iter()
        .find(|s| !postcode.is_empty() && s.postcode == postcode)
    {
        return Some(exact);
    }

    let best = candidates.first()?;
    tracing::warn!(
        query,
        matched = %best.street_name,
        postcode = %best.postcode,
        "Using fuzzy street match"
    );
    Some(best)
}

/// Box number from the secondary address line: "bte 3", "Bus 2A", "box: 12".
pub fn parse_box_number(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    for prefix in BOX_PREFIXES {
        let matches_prefix = line
            .get(..prefix.len())
            .is_some_and(|head| head.to_lowercase() == prefix);
        if !matches_prefix {
            continue;
        }
        let rest = &line[prefix.len()..];
        let value = rest.trim_start_matches([' ', '.', ':', '-']);
        // "business park" is not a box
        if value.len() == rest.len() && rest.starts_with(char::is_alphabetic) {
            continue;
        }
        let value = value.trim();
        return (!value.is_empty()).then(|| value.to_string());
    }

    Some(line.to_string())
}

/// "street, number, secondary line, postcode, city", skipping empty parts.
pub fn format_raw_address(address: &DeliveryAddress) -> String {
    let street = address.street.trim();
    let number = address.number.trim();
    let first_line: Vec<&str> = if street.is_empty() && number.is_empty() {
        vec![address.address_line_1.trim()]
    } else {
        vec![street, number]
    };

    first_line
        .into_iter()
        .chain([
            address.address_line_2.trim(),
            address.postal_code.trim(),
            address.city.trim(),
        ])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Address, MemoryAddressRepository};

    fn street(id: &str, name: &str, postcode: &str) -> Street {
        Street {
            id: id.into(),
            street_name: name.into(),
            municipality_name: "Bruxelles".into(),
            postcode: postcode.into(),
        }
    }

    fn address(id: &str, house: &str, box_number: Option<&str>, postcode: &str) -> Address {
        Address {
            id: id.into(),
            street_name: "Rue Neuve".into(),
            house_number: house.into(),
            box_number: box_number.map(str::to_string),
            municipality_name: "Bruxelles".into(),
            postcode: postcode.into(),
            distance: 1200.0,
        }
    }

    fn resolver() -> AddressResolver {
        let repo = MemoryAddressRepository::new()
            .with_street(street("s-1000", "Rue Neuve", "1000"))
            .with_street(street("s-1080", "Rue Neuve", "1080"))
            .with_address("s-1000", address("a-1000-12", "12", None, "1000"))
            .with_address("s-1080", address("a-1080-12", "12", None, "1080"))
            .with_address("s-1080", address("a-1080-12-b3", "12", Some("3"), "1080"));
        AddressResolver::new(Arc::new(repo), 5)
    }

    fn delivery(street: &str, number: &str, line2: &str, postcode: &str) -> DeliveryAddress {
        DeliveryAddress {
            street: street.into(),
            number: number.into(),
            postal_code: postcode.into(),
            city: "Bruxelles".into(),
            address_line_1: format!("{street} {number}"),
            address_line_2: line2.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn exact_postcode_match_wins() {
        let result = resolver()
            .resolve(Some(&delivery("Rue Neuve", "12", "", "1080")))
            .await;
        assert_eq!(
            result,
            AddressMatch::Resolved {
                address_id: "a-1080-12".into()
            }
        );
    }

    #[tokio::test]
    async fn box_number_selects_the_unit() {
        let result = resolver()
            .resolve(Some(&delivery("Rue Neuve", "12", "bte 3", "1080")))
            .await;
        assert_eq!(result.address_id(), Some("a-1080-12-b3"));
        assert_eq!(result.address_extra(), None);
    }

    #[tokio::test]
    async fn fuzzy_match_falls_back_to_first_candidate() {
        // postcode matches neither candidate
        let result = resolver()
            .resolve(Some(&delivery("Rue Neuve", "12", "", "9999")))
            .await;
        assert_eq!(result.address_id(), Some("a-1000-12"));
    }

    #[tokio::test]
    async fn unknown_house_number_keeps_raw_text() {
        let result = resolver()
            .resolve(Some(&delivery("Rue Neuve", "999", "bus 4", "1000")))
            .await;
        assert_eq!(
            result,
            AddressMatch::Raw {
                text: "Rue Neuve, 999, bus 4, 1000, Bruxelles".into()
            }
        );
    }

    #[tokio::test]
    async fn unknown_street_keeps_raw_text() {
        let result = resolver()
            .resolve(Some(&delivery("Avenue Louise", "5", "", "1050")))
            .await;
        assert!(result.address_id().is_none());
        assert_eq!(
            result.address_extra(),
            Some("Avenue Louise, 5, 1050, Bruxelles")
        );
    }

    #[tokio::test]
    async fn missing_address_is_never_empty() {
        let result = resolver().resolve(None).await;
        assert_eq!(result.address_extra(), Some(NO_DELIVERY_ADDRESS));

        let result = resolver().resolve(Some(&DeliveryAddress::default())).await;
        assert_eq!(result.address_extra(), Some(NO_DELIVERY_ADDRESS));
    }

    #[test]
    fn box_prefixes_are_stripped() {
        assert_eq!(parse_box_number("bte 3").as_deref(), Some("3"));
        assert_eq!(parse_box_number("Bte. 3").as_deref(), Some("3"));
        assert_eq!(parse_box_number("boîte 12").as_deref(), Some("12"));
        assert_eq!(parse_box_number("Boite:4B").as_deref(), Some("4B"));
        assert_eq!(parse_box_number("BOX 7").as_deref(), Some("7"));
        assert_eq!(parse_box_number("bus 2").as_deref(), Some("2"));
        assert_eq!(parse_box_number("bus2").as_deref(), Some("2"));
        assert_eq!(parse_box_number("  5 ").as_deref(), Some("5"));
        assert_eq!(parse_box_number("business park").as_deref(), Some("business park"));
        assert_eq!(parse_box_number("bte"), None);
        assert_eq!(parse_box_number("   "), None);
    }

    #[test]
    fn raw_address_uses_line_one_without_street() {
        let addr = DeliveryAddress {
            address_line_1: "Grand-Place 1".into(),
            postal_code: "1000".into(),
            city: "Bruxelles".into(),
            ..Default::default()
        };
        assert_eq!(format_raw_address(&addr), "Grand-Place 1, 1000, Bruxelles");
    }
}
