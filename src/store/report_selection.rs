//! Report view state: the meals behind the report, the day being looked at,
//! and the highlighted row.
//!
//! The aggregated [`Report`] is recomputed whenever the meals or the date
//! filter change, so rendering never aggregates.

use chrono::{Days, NaiveDate};

use super::{
  clamp_selection, step_selection, Feature, ResourceFeed, Store, StoreDeps, StoreState,
};
use crate::api::types::Meal;
use crate::api::{ApiError, Resource};
use crate::report::{aggregate, Report, ReportRow};

/// Which meals the report counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
  #[default]
  All,
  On(NaiveDate),
}

impl DateFilter {
  pub fn matches(self, meal: &Meal) -> bool {
    match self {
      DateFilter::All => true,
      DateFilter::On(day) => meal.is_on(day),
    }
  }

  pub fn label(self) -> String {
    match self {
      DateFilter::All => "all dates".to_string(),
      DateFilter::On(day) => day.format("%Y-%m-%d").to_string(),
    }
  }
}

#[derive(Debug, Default)]
pub struct ReportState {
  pub meals: Vec<Meal>,
  pub date: DateFilter,
  pub selected: Option<usize>,
  report: Report,
}

impl ReportState {
  pub fn report(&self) -> &Report {
    &self.report
  }

  pub fn selected_row(&self) -> Option<&ReportRow> {
    self.selected.and_then(|i| self.report.rows.get(i))
  }
}

#[derive(Debug, Default)]
pub struct ReportPatch {
  pub meals: Option<Vec<Meal>>,
  pub date: Option<DateFilter>,
  pub selected: Option<usize>,
}

impl StoreState for ReportState {
  type Patch = ReportPatch;

  fn merge(&mut self, patch: ReportPatch) {
    let reaggregate = patch.meals.is_some() || patch.date.is_some();
    if let Some(meals) = patch.meals {
      self.meals = meals;
    }
    if let Some(date) = patch.date {
      self.date = date;
    }
    if reaggregate {
      let filtered: Vec<Meal> = self
        .meals
        .iter()
        .filter(|m| self.date.matches(m))
        .cloned()
        .collect();
      self.report = aggregate(&filtered);
    }
    if let Some(selected) = patch.selected {
      self.selected = Some(selected);
    }
    self.selected = clamp_selection(self.selected, self.report.rows.len());
  }
}

/// Store behind the report view
pub struct ReportStore {
  store: Store<ReportState>,
  meals: ResourceFeed<Meal>,
}

impl ReportStore {
  pub fn new(deps: StoreDeps) -> Self {
    let store = Store::new(Feature::Report);
    let meals = ResourceFeed::new(&deps.cache, Resource::Meals.into(), store.scope().token());
    Self { store, meals }
  }

  pub fn load(&mut self) {
    self.meals.load();
  }

  /// Drop the shared cached list and fetch it again.
  pub fn refresh(&mut self) {
    self.meals.refresh();
  }

  /// Apply a finished fetch. Returns `true` if anything changed.
  ///
  /// The list also reloads on its own once the shared meals entry is
  /// invalidated, for instance by a submit in another view.
  pub fn poll(&mut self) -> bool {
    if self.store.is_disposed() || !self.meals.poll() {
      return false;
    }
    if let Some(meals) = self.meals.records() {
      let meals = meals.to_vec();
      self.store.update(ReportPatch {
        meals: Some(meals),
        ..ReportPatch::default()
      });
    }
    true
  }

  pub fn get_state(&self) -> &ReportState {
    self.store.get_state()
  }

  pub fn update(&mut self, patch: ReportPatch) {
    self.store.update(patch);
  }

  pub fn report(&self) -> &Report {
    self.get_state().report()
  }

  pub fn is_loading(&self) -> bool {
    self.meals.is_loading()
  }

  pub fn error(&self) -> Option<&ApiError> {
    self.meals.error()
  }

  pub fn set_date(&mut self, date: DateFilter) {
    self.update(ReportPatch {
      date: Some(date),
      ..ReportPatch::default()
    });
  }

  /// Move the day filter by `days`; with no day selected, start from `today`.
  pub fn shift_date(&mut self, days: i64, today: NaiveDate) {
    let next = match self.get_state().date {
      DateFilter::All => today,
      DateFilter::On(day) => {
        let step = Days::new(days.unsigned_abs());
        let moved = if days < 0 {
          day.checked_sub_days(step)
        } else {
          day.checked_add_days(step)
        };
        moved.unwrap_or(day)
      }
    };
    self.set_date(DateFilter::On(next));
  }

  pub fn select_next(&mut self) {
    self.step(1);
  }

  pub fn select_prev(&mut self) {
    self.step(-1);
  }

  fn step(&mut self, delta: isize) {
    let state = self.get_state();
    if let Some(selected) = step_selection(state.selected, state.report().rows.len(), delta) {
      self.update(ReportPatch {
        selected: Some(selected),
        ..ReportPatch::default()
      });
    }
  }

  pub fn dispose(&self) {
    self.store.dispose();
  }
}
