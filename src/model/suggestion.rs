use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One entry of the address autocomplete list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AddressSuggestion {
    /// Display label, e.g. "Hauptstraße, 5, 10115, Berlin"
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub housenumber: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
}

impl AddressSuggestion {
    /// Build a suggestion from the geocoder's address parts
    ///
    /// The label joins the non-empty parts in street, house number, postcode,
    /// city order.
    pub fn from_parts(
        street: Option<String>,
        housenumber: Option<String>,
        postcode: Option<String>,
        city: Option<String>,
    ) -> Self {
        let label = [&street, &housenumber, &postcode, &city]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            label,
            city,
            street,
            housenumber,
            postcode,
        }
    }
}
