//! Maps places-provider fields onto the CRM's address and industry vocabulary.

use crate::models::{Address, AddressComponent};

/// Provider category tag → industry label. Lookup order is the caller's tag order.
const INDUSTRY_MAP: &[(&str, &str)] = &[
    ("general_contractor", "Bauunternehmen"),
    ("roofing_contractor", "Dachdecker"),
    ("electrician", "Elektriker"),
    ("plumber", "Installateur"),
    ("painter", "Maler"),
    ("construction_company", "Baufirma"),
];

/// Builds an [`Address`] from structured address components.
///
/// A component fills at most one field, checked in the order route, street number,
/// postal code, locality, country. Unknown roles are ignored and missing roles leave
/// the field unset.
pub fn parse_address(components: &[AddressComponent]) -> Address {
    let mut address = Address::default();

    for component in components {
        let has = |role: &str| component.types.iter().any(|t| t == role);
        let value = Some(component.long_text.clone());

        if has("route") {
            address.street = value;
        } else if has("street_number") {
            address.house_number = value;
        } else if has("postal_code") {
            address.postal_code = value;
        } else if has("locality") {
            address.city = value;
        } else if has("country") {
            address.country = value;
        }
    }

    address
}

/// Returns the industry label of the first tag present in the lookup table.
pub fn map_industry<S: AsRef<str>>(types: &[S]) -> Option<String> {
    types.iter().find_map(|tag| {
        INDUSTRY_MAP
            .iter()
            .find(|(key, _)| *key == tag.as_ref())
            .map(|(_, label)| label.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(types: &[&str], long_text: &str) -> AddressComponent {
        AddressComponent {
            long_text: long_text.to_string(),
            short_text: None,
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_address_only_populates_present_roles() {
        let address = parse_address(&[
            component(&["route"], "Hauptstrasse"),
            component(&["postal_code"], "10115"),
        ]);

        assert_eq!(
            address,
            Address {
                street: Some("Hauptstrasse".to_string()),
                postal_code: Some("10115".to_string()),
                ..Default::default()
            }
        );
        let value = serde_json::to_value(&address).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"strasse": "Hauptstrasse", "plz": "10115"})
        );
    }

    #[test]
    fn test_parse_address_full_and_unknown_roles() {
        let address = parse_address(&[
            component(&["street_number"], "12a"),
            component(&["route"], "Torstraße"),
            component(&["sublocality_level_1", "political"], "Mitte"),
            component(&["locality", "political"], "Berlin"),
            component(&["administrative_area_level_1", "political"], "Berlin"),
            component(&["country", "political"], "Deutschland"),
            component(&["postal_code"], "10119"),
        ]);

        assert_eq!(address.street.as_deref(), Some("Torstraße"));
        assert_eq!(address.house_number.as_deref(), Some("12a"));
        assert_eq!(address.postal_code.as_deref(), Some("10119"));
        assert_eq!(address.city.as_deref(), Some("Berlin"));
        assert_eq!(address.country.as_deref(), Some("Deutschland"));
    }

    #[test]
    fn test_parse_address_empty() {
        assert_eq!(parse_address(&[]), Address::default());
    }

    #[test]
    fn test_map_industry_first_known_tag_wins() {
        let tags = ["point_of_interest", "painter", "roofing_contractor"];
        assert_eq!(map_industry(&tags).as_deref(), Some("Maler"));

        let tags = ["roofing_contractor", "painter"];
        assert_eq!(map_industry(&tags).as_deref(), Some("Dachdecker"));
    }

    #[test]
    fn test_map_industry_no_match() {
        assert_eq!(map_industry(&["establishment", "store"]), None);
        assert_eq!(map_industry::<&str>(&[]), None);
    }
}
