//! Wire types for the meal-request backend.
//!
//! Field names follow the backend's camelCase JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Reference data
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
  pub id: u64,
  pub name: String,
}

/// The unit that files requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
  pub id: u64,
  pub full_name: String,
  pub username: String,
  #[serde(default)]
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub description: String,
}

/// Administrative identity, distinct from [`Employee`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  pub id: u64,
  pub username: String,
  pub full_name: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub roles: Vec<Role>,
  #[serde(default = "default_active", alias = "isActive")]
  pub active: bool,
}

fn default_active() -> bool {
  true
}

impl User {
  pub fn has_role(&self, name: &str) -> bool {
    self.roles.iter().any(|r| r.name.eq_ignore_ascii_case(name))
  }

  /// Users without roles are valid; they just get no elevated access.
  pub fn is_elevated(&self) -> bool {
    !self.roles.is_empty()
  }
}

// ============================================================================
// Meals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
  Lunch,
  Dinner,
}

impl MealType {
  /// Lenient parse of a raw meal type; surrounding whitespace and ASCII case
  /// are ignored. Anything else is unknown.
  pub fn parse(raw: &str) -> Option<Self> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("lunch") {
      Some(MealType::Lunch)
    } else if raw.eq_ignore_ascii_case("dinner") {
      Some(MealType::Dinner)
    } else {
      None
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      MealType::Lunch => "lunch",
      MealType::Dinner => "dinner",
    }
  }

  pub fn toggle(self) -> Self {
    match self {
      MealType::Lunch => MealType::Dinner,
      MealType::Dinner => MealType::Lunch,
    }
  }
}

impl fmt::Display for MealType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Raw per-submission meal record as accepted by the backend.
///
/// `meal_type` is kept as the raw string so malformed records survive
/// deserialization and can be reported by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
  #[serde(default)]
  pub id: u64,
  #[serde(default)]
  pub employee: String,
  #[serde(default)]
  pub department: String,
  #[serde(default)]
  pub department_id: Option<u64>,
  #[serde(rename = "type", alias = "mealType", default)]
  pub meal_type: String,
  #[serde(default)]
  pub date: String,
}

impl Meal {
  pub fn parsed_type(&self) -> Option<MealType> {
    MealType::parse(&self.meal_type)
  }

  /// Whether this record falls on `day`. Dates may carry a time suffix.
  pub fn is_on(&self, day: NaiveDate) -> bool {
    self.date.starts_with(&day.format("%Y-%m-%d").to_string())
  }
}

/// Body of a meal-request creation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMealRequest {
  pub employee: String,
  pub department: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub department_id: Option<u64>,
  #[serde(rename = "type")]
  pub meal_type: MealType,
  pub date: NaiveDate,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
}
