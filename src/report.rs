//! Per-department meal totals.
//!
//! [`aggregate`] turns the flat list of meal records into one row per
//! department. It is a pure function: the same records always give the same
//! report, whatever order they arrived in.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::api::types::{Meal, MealType};

/// One aggregated table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
  /// 1-based position in the report
  pub id: usize,
  pub department: String,
  pub department_id: Option<u64>,
  pub dinner_requests: u32,
  pub lunch_requests: u32,
}

impl ReportRow {
  pub fn total(&self) -> u32 {
    self.dinner_requests + self.lunch_requests
  }
}

/// Data-quality problem found while aggregating. Never fatal.
///
/// Ordered by kind, then meal id, which is the order a report lists them in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AggregationWarning {
  /// Record whose meal type is neither lunch nor dinner; left out of both counts
  UnknownMealType {
    meal_id: u64,
    department: String,
    meal_type: String,
  },
  /// Record with no department; it cannot be placed in any row
  MissingDepartment { meal_id: u64 },
  /// Records naming a department without an id, where several departments
  /// carry that name; they were counted under the lowest id
  AmbiguousDepartment {
    department: String,
    department_id: u64,
    records: u32,
  },
}

impl fmt::Display for AggregationWarning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AggregationWarning::UnknownMealType {
        meal_id,
        department,
        meal_type,
      } => write!(
        f,
        "meal {} in {} has unknown type '{}'",
        meal_id, department, meal_type
      ),
      AggregationWarning::MissingDepartment { meal_id } => {
        write!(f, "meal {} has no department", meal_id)
      }
      AggregationWarning::AmbiguousDepartment {
        department,
        department_id,
        records,
      } => write!(
        f,
        "{} meal(s) name {} without an id; counted under department {}",
        records, department, department_id
      ),
    }
  }
}

/// Aggregated rows plus whatever was wrong with the input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
  pub rows: Vec<ReportRow>,
  pub warnings: Vec<AggregationWarning>,
}

impl Report {
  /// Overall (lunch, dinner) totals
  pub fn totals(&self) -> (u32, u32) {
    self.rows.iter().fold((0, 0), |(lunch, dinner), row| {
      (lunch + row.lunch_requests, dinner + row.dinner_requests)
    })
  }

  pub fn is_clean(&self) -> bool {
    self.warnings.is_empty()
  }
}

/// Plain-text table, one line per row, then totals and warnings.
impl fmt::Display for Report {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let width = self
      .rows
      .iter()
      .map(|r| r.department.chars().count())
      .chain(["DEPARTMENT".len()])
      .max()
      .unwrap_or(0);

    writeln!(f, "{:>3}  {:<width$}  {:>6}  {:>6}", "#", "DEPARTMENT", "LUNCH", "DINNER")?;
    for row in &self.rows {
      writeln!(
        f,
        "{:>3}  {:<width$}  {:>6}  {:>6}",
        row.id, row.department, row.lunch_requests, row.dinner_requests
      )?;
    }
    let (lunch, dinner) = self.totals();
    writeln!(f, "{:>3}  {:<width$}  {:>6}  {:>6}", "", "TOTAL", lunch, dinner)?;

    for warning in &self.warnings {
      writeln!(f, "warning: {}", warning)?;
    }
    Ok(())
  }
}

/// Departments are identified by id when the backend sends one and by name
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum DepartmentKey {
  Id(u64),
  Name(String),
}

#[derive(Debug)]
struct Tally {
  /// Smallest non-blank name seen for the department, so the row does not
  /// depend on which record came first
  name: String,
  id: Option<u64>,
  lunch: u32,
  dinner: u32,
  /// Records counted, including ones with an unknown meal type
  records: u32,
}

impl Tally {
  fn offer_name(&mut self, name: &str) {
    if !name.is_empty() && (self.name.is_empty() || name < self.name.as_str()) {
      self.name = name.to_string();
    }
  }
}

/// Group meal records by department and count lunches and dinners.
///
/// Rows are ordered by department name, then id, so repeated renders of the
/// same data are stable. Departments only seen with malformed records still
/// get a row with zero counts.
pub fn aggregate(meals: &[Meal]) -> Report {
  let mut tallies: BTreeMap<DepartmentKey, Tally> = BTreeMap::new();
  let mut warnings = Vec::new();
  let mut unknown_types = Vec::new();

  for meal in meals {
    let name = meal.department.trim();
    if name.is_empty() && meal.department_id.is_none() {
      warnings.push(AggregationWarning::MissingDepartment { meal_id: meal.id });
      continue;
    }

    let key = match meal.department_id {
      Some(id) => DepartmentKey::Id(id),
      None => DepartmentKey::Name(name.to_string()),
    };
    let tally = tallies.entry(key.clone()).or_insert_with(|| Tally {
      name: String::new(),
      id: meal.department_id,
      lunch: 0,
      dinner: 0,
      records: 0,
    });
    tally.offer_name(name);
    tally.records += 1;

    match meal.parsed_type() {
      Some(MealType::Lunch) => tally.lunch += 1,
      Some(MealType::Dinner) => tally.dinner += 1,
      None => unknown_types.push((meal.id, key, meal.meal_type.clone())),
    }
  }

  // Named only once every record of the department has been seen
  for (meal_id, key, meal_type) in unknown_types {
    let department = tallies
      .get(&key)
      .map(|t| t.name.clone())
      .unwrap_or_default();
    warnings.push(AggregationWarning::UnknownMealType {
      meal_id,
      department,
      meal_type,
    });
  }

  let mut tallies = fold_unidentified(tallies.into_values().collect(), &mut warnings);
  tallies.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
  warnings.sort();

  let rows = tallies
    .into_iter()
    .enumerate()
    .map(|(index, tally)| ReportRow {
      id: index + 1,
      department: tally.name,
      department_id: tally.id,
      dinner_requests: tally.dinner,
      lunch_requests: tally.lunch,
    })
    .collect();

  if !warnings.is_empty() {
    warn!(count = warnings.len(), "meal records with data-quality problems");
  }

  Report { rows, warnings }
}

/// Merge name-only tallies into the id-keyed tally of the same name. With
/// several such tallies the lowest id wins and a warning is recorded; a name
/// with no id-keyed match keeps its own row.
fn fold_unidentified(tallies: Vec<Tally>, warnings: &mut Vec<AggregationWarning>) -> Vec<Tally> {
  let (mut identified, named): (Vec<Tally>, Vec<Tally>) =
    tallies.into_iter().partition(|t| t.id.is_some());

  let mut unmatched = Vec::new();
  for tally in named {
    let mut candidates: Vec<&mut Tally> = identified
      .iter_mut()
      .filter(|t| t.name == tally.name)
      .collect();
    candidates.sort_by_key(|t| t.id);

    let ambiguous = candidates.len() > 1;
    match candidates.into_iter().next() {
      Some(target) => {
        if ambiguous {
          warnings.push(AggregationWarning::AmbiguousDepartment {
            department: tally.name.clone(),
            department_id: target.id.unwrap_or_default(),
            records: tally.records,
          });
        }
        target.lunch += tally.lunch;
        target.dinner += tally.dinner;
        target.records += tally.records;
      }
      None => unmatched.push(tally),
    }
  }

  identified.extend(unmatched);
  identified
}
