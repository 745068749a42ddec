//! Form binding for owners.
//!
//! [`OwnerForm`] is the only shape a request body is decoded into. It has no
//! `id` field, so an `id` submitted by a client is dropped during decoding and
//! ids can only come from storage (create) or from the URL path (update).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{Owner, OwnerId};

pub const TELEPHONE_MAX_DIGITS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Groups messages by field name for display next to each input.
pub fn errors_by_field(errors: &[FieldError]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for error in errors {
        grouped
            .entry(error.field.clone())
            .or_default()
            .push(error.message.clone());
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated<T> {
    Valid(T),
    Invalid(Vec<FieldError>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OwnerForm {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub telephone: String,
}

impl OwnerForm {
    pub fn from_owner(owner: &Owner) -> Self {
        Self {
            first_name: owner.first_name.clone(),
            last_name: owner.last_name.clone(),
            address: owner.address.clone(),
            city: owner.city.clone(),
            telephone: owner.telephone.clone(),
        }
    }

    pub fn trimmed(self) -> Self {
        Self {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            address: self.address.trim().to_string(),
            city: self.city.trim().to_string(),
            telephone: self.telephone.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        for (field, value) in [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("address", &self.address),
            ("city", &self.city),
        ] {
            if value.trim().is_empty() {
                errors.push(not_blank(field));
            }
        }

        let telephone = self.telephone.trim();
        if telephone.is_empty() {
            errors.push(not_blank("telephone"));
        } else if telephone.len() > TELEPHONE_MAX_DIGITS
            || !telephone.chars().all(|c| c.is_ascii_digit())
        {
            errors.push(FieldError::new(
                "telephone",
                "digits",
                format!(
                    "numeric value out of bounds (<{TELEPHONE_MAX_DIGITS} digits>.<0 digits> expected)"
                ),
            ));
        }
        errors
    }

    /// Trims, validates and, when valid, produces a new unsaved owner.
    pub fn bind(self) -> Validated<Owner> {
        let form = self.trimmed();
        let errors = form.validate();
        if !errors.is_empty() {
            return Validated::Invalid(errors);
        }
        let mut owner = Owner::default();
        form.apply_to(&mut owner);
        Validated::Valid(owner)
    }

    /// Copies every bindable field onto `owner`, leaving its id and pets alone.
    pub fn apply_to(self, owner: &mut Owner) {
        owner.first_name = self.first_name;
        owner.last_name = self.last_name;
        owner.address = self.address;
        owner.city = self.city;
        owner.telephone = self.telephone;
    }

    /// Like [`OwnerForm::bind`], but the result carries the path-supplied id.
    pub fn bind_with_id(self, owner_id: OwnerId) -> Validated<Owner> {
        match self.bind() {
            Validated::Valid(mut owner) => {
                owner.id = Some(owner_id);
                Validated::Valid(owner)
            }
            invalid => invalid,
        }
    }
}

fn not_blank(field: &str) -> FieldError {
    FieldError::new(field, "notBlank", "must not be blank")
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
