//! Source genealogical data as supplied by the data-management layer.
//!
//! The layout engine only ever reads these types. Missing fields fall back to
//! their defaults so partially filled exports still load.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid family data: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnershipStatus {
    Married,
    Partners,
    Divorced,
    Separated,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PartnershipStatus {
    /// Whether the relationship has ended.
    pub fn is_ended(self) -> bool {
        matches!(self, Self::Divorced | Self::Separated)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LifeEvent {
    pub date: Option<String>,
    pub place: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub birth: Option<LifeEvent>,
    pub death: Option<LifeEvent>,
    pub partnerships: Vec<String>,
    pub parent_ids: Vec<String>,
    pub child_ids: Vec<String>,
}

impl Person {
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Partnership {
    pub id: String,
    pub person1_id: String,
    pub person2_id: Option<String>,
    pub child_ids: Vec<String>,
    pub status: PartnershipStatus,
    pub start_date: Option<String>,
    pub start_place: Option<String>,
    pub end_date: Option<String>,
    pub note: Option<String>,
}

impl Partnership {
    /// Both partner ids, skipping an absent second partner.
    pub fn partners(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.person1_id.as_str())
            .chain(self.person2_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    pub fn involves(&self, person_id: &str) -> bool {
        self.partners().any(|id| id == person_id)
    }

    pub fn partner_of(&self, person_id: &str) -> Option<&str> {
        if self.person1_id == person_id {
            self.person2_id.as_deref().filter(|id| !id.is_empty())
        } else if self.person2_id.as_deref() == Some(person_id) {
            Some(self.person1_id.as_str()).filter(|id| !id.is_empty())
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StromData {
    pub persons: BTreeMap<String, Person>,
    pub partnerships: BTreeMap<String, Partnership>,
}

impl StromData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(input: &str) -> Result<Self, DataError> {
        let data: StromData = serde_json::from_str(input)?;
        Ok(data.normalized())
    }

    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Fills record ids from their map keys when the record omits them.
    pub fn normalized(mut self) -> Self {
        for (key, person) in self.persons.iter_mut() {
            if person.id.is_empty() {
                person.id = key.clone();
            }
        }
        for (key, partnership) in self.partnerships.iter_mut() {
            if partnership.id.is_empty() {
                partnership.id = key.clone();
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.persons.get(id)
    }

    /// Partnerships a person takes part in: the person's own list first, then
    /// any partnership naming the person that the list forgot.
    pub fn partnerships_of(&self, person_id: &str) -> Vec<&Partnership> {
        let mut out: Vec<&Partnership> = Vec::new();
        if let Some(person) = self.persons.get(person_id) {
            for pid in &person.partnerships {
                if let Some(partnership) = self.partnerships.get(pid)
                    && partnership.involves(person_id)
                    && !out.iter().any(|p| p.id == partnership.id)
                {
                    out.push(partnership);
                }
            }
        }
        for partnership in self.partnerships.values() {
            if partnership.involves(person_id) && !out.iter().any(|p| p.id == partnership.id) {
                out.push(partnership);
            }
        }
        out
    }

    /// Partnerships listing the person as a child.
    pub fn parent_partnerships_of(&self, person_id: &str) -> Vec<&Partnership> {
        self.partnerships
            .values()
            .filter(|p| p.child_ids.iter().any(|c| c == person_id))
            .collect()
    }

    pub fn insert_person(&mut self, person: Person) {
        self.persons.insert(person.id.clone(), person);
    }

    /// Adds a partnership and mirrors it onto the partners' and children's records.
    pub fn insert_partnership(&mut self, partnership: Partnership) {
        let partners: Vec<String> = partnership.partners().map(str::to_string).collect();
        for partner in &partners {
            if let Some(person) = self.persons.get_mut(partner)
                && !person.partnerships.contains(&partnership.id)
            {
                person.partnerships.push(partnership.id.clone());
            }
        }
        for child in &partnership.child_ids {
            if let Some(person) = self.persons.get_mut(child) {
                for partner in &partners {
                    if !person.parent_ids.contains(partner) {
                        person.parent_ids.push(partner.clone());
                    }
                }
            }
            for partner in &partners {
                if let Some(person) = self.persons.get_mut(partner)
                    && !person.child_ids.contains(child)
                {
                    person.child_ids.push(child.clone());
                }
            }
        }
        self.partnerships.insert(partnership.id.clone(), partnership);
    }
}
