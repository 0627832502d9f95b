//! Shipping contacts: per-user delivery addresses referenced by orders.
//!
//! A contact belongs to exactly one user through an explicit owner
//! reference; only the owner may use it for confirmation or change it.

use serde::{Deserialize, Serialize};

use crate::types::{ContactId, UserId};

/// A shipping address plus phone, owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Unique contact id.
    pub id: ContactId,
    /// The owning user.
    pub owner: UserId,
    /// City.
    pub city: String,
    /// Street.
    pub street: String,
    /// House number.
    pub house: Option<String>,
    /// Housing block.
    pub structure: Option<String>,
    /// Building.
    pub building: Option<String>,
    /// Apartment.
    pub apartment: Option<String>,
    /// Contact phone number.
    pub phone: String,
}

/// Fields for creating a contact; the id and owner are supplied by the
/// engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    /// City.
    pub city: String,
    /// Street.
    pub street: String,
    /// House number.
    pub house: Option<String>,
    /// Housing block.
    pub structure: Option<String>,
    /// Building.
    pub building: Option<String>,
    /// Apartment.
    pub apartment: Option<String>,
    /// Contact phone number.
    pub phone: String,
}

impl NewContact {
    /// Materializes the contact under the given owner.
    pub fn into_contact(self, owner: UserId) -> Contact {
        Contact {
            id: ContactId::generate(),
            owner,
            city: self.city,
            street: self.street,
            house: self.house,
            structure: self.structure,
            building: self.building,
            apartment: self.apartment,
            phone: self.phone,
        }
    }
}

/// A partial update: only the provided fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    /// New city, if changing.
    pub city: Option<String>,
    /// New street, if changing.
    pub street: Option<String>,
    /// New house number, if changing.
    pub house: Option<String>,
    /// New housing block, if changing.
    pub structure: Option<String>,
    /// New building, if changing.
    pub building: Option<String>,
    /// New apartment, if changing.
    pub apartment: Option<String>,
    /// New phone number, if changing.
    pub phone: Option<String>,
}

impl ContactUpdate {
    /// Applies the update to an existing contact. Owner and id never change.
    pub fn apply_to(self, contact: &mut Contact) {
        if let Some(city) = self.city {
            contact.city = city;
        }
        if let Some(street) = self.street {
            contact.street = street;
        }
        if let Some(house) = self.house {
            contact.house = Some(house);
        }
        if let Some(structure) = self.structure {
            contact.structure = Some(structure);
        }
        if let Some(building) = self.building {
            contact.building = Some(building);
        }
        if let Some(apartment) = self.apartment {
            contact.apartment = Some(apartment);
        }
        if let Some(phone) = self.phone {
            contact.phone = phone;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewContact {
        NewContact {
            city: "Moscow".to_string(),
            street: "Arbat".to_string(),
            house: Some("10".to_string()),
            structure: None,
            building: None,
            apartment: Some("42".to_string()),
            phone: "+7 900 000-00-00".to_string(),
        }
    }

    #[test]
    fn into_contact_assigns_owner_and_fresh_id() {
        let owner = UserId::generate();
        let contact = sample().into_contact(owner);
        assert_eq!(contact.owner, owner);
        assert_eq!(contact.city, "Moscow");
    }

    #[test]
    fn update_changes_only_provided_fields() {
        let owner = UserId::generate();
        let mut contact = sample().into_contact(owner);
        let original_id = contact.id;

        ContactUpdate {
            street: Some("Tverskaya".to_string()),
            phone: Some("+7 911 111-11-11".to_string()),
            ..ContactUpdate::default()
        }
        .apply_to(&mut contact);

        assert_eq!(contact.id, original_id);
        assert_eq!(contact.owner, owner);
        assert_eq!(contact.street, "Tverskaya");
        assert_eq!(contact.phone, "+7 911 111-11-11");
        assert_eq!(contact.city, "Moscow");
        assert_eq!(contact.apartment.as_deref(), Some("42"));
    }
}
