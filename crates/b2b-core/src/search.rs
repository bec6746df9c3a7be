//! Free-text filter over customer records.
//!
//! Pure function over the record set: no caching here, see
//! `b2b_people::PeopleView` for memoization.

use crate::models::Customer;

/// Lowercased, space-joined text a query is matched against.
///
/// Covers first name, last name, email, phone, street, city, state and zip.
pub fn search_haystack(customer: &Customer) -> String {
    let f = &customer.fields;
    [
        f.first_name.as_str(),
        f.last_name.as_str(),
        f.email.as_str(),
        f.phone.as_str(),
        f.street_address.as_str(),
        f.city.as_str(),
        f.state.as_str(),
        f.zip.as_str(),
    ]
    .join(" ")
    .to_lowercase()
}

/// Records whose haystack contains `query`, case-insensitively, in store order.
///
/// A blank query returns every record unchanged.
pub fn search_customers<'a>(records: &'a [Customer], query: &str) -> Vec<&'a Customer> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }
    records
        .iter()
        .filter(|c| search_haystack(c).contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerFields, OwnerId};
    use chrono::Utc;

    fn customer(first: &str, last: &str, city: &str) -> Customer {
        let now = Utc::now();
        Customer {
            id: crate::new_v7(),
            owner: OwnerId::new("o").unwrap(),
            fields: CustomerFields {
                first_name: first.into(),
                last_name: last.into(),
                city: city.into(),
                ..Default::default()
            },
            pictures: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn sample() -> Vec<Customer> {
        vec![
            customer("Ann", "Lee", "Portland"),
            customer("Bob", "Kim", "Salem"),
            customer("Cleo", "Leeds", "Bend"),
        ]
    }

    #[test]
    fn test_empty_query_returns_all_in_order() {
        let records = sample();
        let hits = search_customers(&records, "");
        let ids: Vec<_> = hits.iter().map(|c| c.id).collect();
        let expected: Vec<_> = records.iter().map(|c| c.id).collect();
        assert_eq!(ids, expected);
        assert_eq!(search_customers(&records, "   ").len(), 3);
    }

    #[test]
    fn test_lee_matches_only_ann_among_ann_and_bob() {
        let records = vec![customer("Ann", "Lee", ""), customer("Bob", "Kim", "")];
        let hits = search_customers(&records, "lee");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields.first_name, "Ann");
    }

    #[test]
    fn test_case_insensitive_and_across_fields() {
        let records = sample();
        assert_eq!(search_customers(&records, "SALEM").len(), 1);
        assert_eq!(search_customers(&records, "ann lee").len(), 1);
    }

    #[test]
    fn test_result_is_subsequence() {
        let records = sample();
        let hits = search_customers(&records, "lee");
        assert_eq!(hits.len(), 2);
        let positions: Vec<usize> = hits
            .iter()
            .map(|h| records.iter().position(|r| r.id == h.id).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_notes_are_not_searched() {
        let mut c = customer("Ann", "Lee", "");
        c.fields.notes = "wants a deck".into();
        assert!(search_customers(std::slice::from_ref(&c), "deck").is_empty());
    }
}
